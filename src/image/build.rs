//! Image builds
//!
//! Stages a throwaway build context for a plan and hands it to the
//! container engine. The image tag comes from the plan's final layer
//! hash, so an existing tag means an identical image is already present.

use crate::config::ConfigManager;
use crate::error::{BerthError, BerthResult};
use crate::image::plan::{
    BuildPlan, CONTAINERFILE, LAUNCHER_FILE, LAUNCH_CONFIG_FILE, REQUIREMENTS_FILE, SOURCE_DIR,
};
use crate::orchestration::ContainerRuntime;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Build options from the command line
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Rebuild even when the tag exists, bypassing the engine cache
    pub no_cache: bool,
}

/// Result of building an image
#[derive(Debug)]
pub struct BuildOutcome {
    /// Full image tag (e.g. "berth-app:a1b2c3d4e5f6")
    pub image_tag: String,

    /// Whether the image was already present (no build ran)
    pub was_cached: bool,
}

/// Build the image described by `plan`.
///
/// Skips the build when the tag already exists. On failure the engine
/// discards intermediate containers and no tag is applied; the staged
/// context is always removed.
pub async fn build_image(
    runtime: &dyn ContainerRuntime,
    plan: &BuildPlan,
    options: BuildOptions,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> BerthResult<BuildOutcome> {
    let image_tag = plan.image_tag();
    debug!("Planned image tag: {}", image_tag);

    if !options.no_cache && runtime.image_exists(&image_tag).await.unwrap_or(false) {
        info!("Image already built: {}", image_tag);
        return Ok(BuildOutcome {
            image_tag,
            was_cached: true,
        });
    }

    let context_dir = prepare_build_context(&ConfigManager::builds_dir(), plan).await?;

    let result = runtime
        .build_image_with_progress(&context_dir, &image_tag, options.no_cache, on_output)
        .await;

    // Clean up build context (best-effort)
    if let Err(e) = tokio::fs::remove_dir_all(&context_dir).await {
        warn!("Failed to remove build context {}: {}", context_dir.display(), e);
    }

    result?;
    info!("Built image {}", image_tag);

    Ok(BuildOutcome {
        image_tag,
        was_cached: false,
    })
}

/// Stage Containerfile, canonical requirements, source files and (in
/// launcher mode) the launcher binary and its config into a fresh
/// directory under `builds_dir`.
pub async fn prepare_build_context(builds_dir: &Path, plan: &BuildPlan) -> BerthResult<PathBuf> {
    let context_dir = builds_dir.join(uuid::Uuid::new_v4().to_string());
    tokio::fs::create_dir_all(&context_dir)
        .await
        .map_err(|e| BerthError::io("creating build context", e))?;

    match stage(&context_dir, plan).await {
        Ok(()) => Ok(context_dir),
        Err(e) => {
            let _ = tokio::fs::remove_dir_all(&context_dir).await;
            Err(e)
        }
    }
}

async fn stage(context_dir: &Path, plan: &BuildPlan) -> BerthResult<()> {
    tokio::fs::write(context_dir.join(CONTAINERFILE), plan.containerfile())
        .await
        .map_err(|e| BerthError::io("writing Containerfile", e))?;

    tokio::fs::write(context_dir.join(REQUIREMENTS_FILE), plan.requirements())
        .await
        .map_err(|e| BerthError::io(format!("writing {}", REQUIREMENTS_FILE), e))?;

    let source_dir = context_dir.join(SOURCE_DIR);
    tokio::fs::create_dir_all(&source_dir)
        .await
        .map_err(|e| BerthError::io("creating source directory", e))?;
    plan.inputs().source.stage(&source_dir).await?;

    if let Some(ref launcher) = plan.inputs().launcher {
        let target = context_dir.join(LAUNCHER_FILE);
        tokio::fs::copy(&launcher.path, &target)
            .await
            .map_err(|e| BerthError::io("staging launcher binary", e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o755);
            tokio::fs::set_permissions(&target, perms)
                .await
                .map_err(|e| BerthError::io("setting launcher permissions", e))?;
        }
    }

    if let Some(launch_config) = plan.launch_config() {
        tokio::fs::write(context_dir.join(LAUNCH_CONFIG_FILE), launch_config)
            .await
            .map_err(|e| BerthError::io(format!("writing {}", LAUNCH_CONFIG_FILE), e))?;
    }

    debug!("Staged build context at {}", context_dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::image::plan::BuildInputs;
    use crate::orchestration::{ContainerConfig, ContainerRuntime};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records builds instead of running an engine
    #[derive(Default)]
    struct FakeRuntime {
        existing: Vec<String>,
        fail_build: bool,
        builds: Mutex<Vec<(PathBuf, String, bool, bool)>>,
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn is_available(&self) -> BerthResult<bool> {
            Ok(true)
        }
        async fn ensure_ready(&self) -> BerthResult<()> {
            Ok(())
        }
        async fn image_exists(&self, image: &str) -> BerthResult<bool> {
            Ok(self.existing.iter().any(|i| i == image))
        }
        async fn build_image_with_progress(
            &self,
            context_dir: &Path,
            tag: &str,
            no_cache: bool,
            on_output: &(dyn Fn(String) + Send + Sync),
        ) -> BerthResult<()> {
            let staged = context_dir.join(CONTAINERFILE).exists()
                && context_dir.join(REQUIREMENTS_FILE).exists()
                && context_dir.join(SOURCE_DIR).join("app.py").exists();
            self.builds.lock().unwrap().push((
                context_dir.to_path_buf(),
                tag.to_string(),
                no_cache,
                staged,
            ));
            on_output("STEP 1/8: FROM python:3.11-slim".to_string());
            if self.fail_build {
                return Err(BerthError::BuildFailed {
                    tag: tag.to_string(),
                    output: "E: Unable to locate package nope".to_string(),
                });
            }
            Ok(())
        }
        async fn image_remove(&self, _image: &str) -> BerthResult<()> {
            Ok(())
        }
        async fn run(&self, _config: &ContainerConfig) -> BerthResult<String> {
            Ok("c0ffee".to_string())
        }
        async fn stop(&self, _container_id: &str, _grace_secs: u32) -> BerthResult<()> {
            Ok(())
        }
        async fn kill(&self, _container_id: &str) -> BerthResult<()> {
            Ok(())
        }
        async fn remove(&self, _container_id: &str) -> BerthResult<()> {
            Ok(())
        }
        async fn logs(&self, _container_id: &str, _lines: u32) -> BerthResult<String> {
            Ok(String::new())
        }
        async fn logs_follow(&self, _container_id: &str) -> BerthResult<()> {
            Ok(())
        }
        fn runtime_name(&self) -> &'static str {
            "fake"
        }
    }

    fn plan_for(dir: &Path) -> BuildPlan {
        std::fs::write(dir.join("requirements.txt"), "fastapi==0.95\n").unwrap();
        std::fs::write(dir.join("app.py"), "app = None\n").unwrap();
        let config = Config::default();
        let inputs = BuildInputs::collect(&config, dir).unwrap();
        BuildPlan::new(&config, inputs).unwrap()
    }

    #[tokio::test]
    async fn cached_tag_skips_build() {
        let project = TempDir::new().unwrap();
        let plan = plan_for(project.path());
        let runtime = FakeRuntime {
            existing: vec![plan.image_tag()],
            ..Default::default()
        };

        let outcome = build_image(&runtime, &plan, BuildOptions::default(), &|_| {})
            .await
            .unwrap();
        assert!(outcome.was_cached);
        assert!(runtime.builds.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn build_stages_context_and_cleans_up() {
        let project = TempDir::new().unwrap();
        let plan = plan_for(project.path());
        let runtime = FakeRuntime::default();

        let outcome = build_image(&runtime, &plan, BuildOptions { no_cache: true }, &|_| {})
            .await
            .unwrap();
        assert!(!outcome.was_cached);

        let builds = runtime.builds.lock().unwrap();
        let (context, tag, no_cache, staged) = &builds[0];
        assert_eq!(tag, &plan.image_tag());
        assert!(*no_cache);
        assert!(*staged);
        assert!(!context.exists());
    }

    #[tokio::test]
    async fn failed_build_propagates_and_cleans_up() {
        let project = TempDir::new().unwrap();
        let plan = plan_for(project.path());
        let runtime = FakeRuntime {
            fail_build: true,
            ..Default::default()
        };

        let err = build_image(&runtime, &plan, BuildOptions::default(), &|_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, BerthError::BuildFailed { .. }));

        let builds = runtime.builds.lock().unwrap();
        assert!(!builds[0].0.exists());
    }

    #[tokio::test]
    async fn prepare_context_writes_canonical_requirements() {
        let project = TempDir::new().unwrap();
        let builds = TempDir::new().unwrap();
        let plan = plan_for(project.path());

        let context = prepare_build_context(builds.path(), &plan).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(context.join(REQUIREMENTS_FILE)).unwrap(),
            "fastapi==0.95\n"
        );
        assert_eq!(
            std::fs::read_to_string(context.join(CONTAINERFILE)).unwrap(),
            plan.containerfile()
        );
    }

    #[tokio::test]
    async fn launcher_context_carries_launch_config() {
        let project = TempDir::new().unwrap();
        let builds = TempDir::new().unwrap();
        std::fs::write(project.path().join("requirements.txt"), "fastapi==0.95\n").unwrap();
        std::fs::write(project.path().join("app.py"), "api = None\n").unwrap();
        let fake = project.path().join("fake-berth");
        std::fs::write(&fake, b"\x7fELF").unwrap();

        let mut config = Config::default();
        config.image.entrypoint = crate::config::schema::EntrypointMode::Launcher;
        config.launch.app = "app:api".to_string();
        let mut inputs = BuildInputs::collect(&Config::default(), project.path()).unwrap();
        inputs.launcher = Some(crate::image::plan::LauncherBinary::from_path(&fake).unwrap());
        let plan = BuildPlan::new(&config, inputs).unwrap();

        let context = prepare_build_context(builds.path(), &plan).await.unwrap();
        let staged = std::fs::read_to_string(context.join(LAUNCH_CONFIG_FILE)).unwrap();
        assert!(staged.contains("app = \"app:api\""));
        assert!(context.join(LAUNCHER_FILE).exists());
    }
}
