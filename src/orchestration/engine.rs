//! CLI container engine runtime
//!
//! Implements the ContainerRuntime trait by shelling out to `podman` or
//! `docker`. Both accept the same arguments for everything berth does,
//! apart from a couple of podman-only build flags.

use crate::error::{BerthError, BerthResult};
use crate::orchestration::container::ContainerConfig;
use crate::orchestration::runtime::ContainerRuntime;
use crate::orchestration::{build_error_output, stream_child_output};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Supported engine binaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Podman,
    Docker,
}

impl Engine {
    /// Parse an engine name from config
    pub fn parse(name: &str) -> BerthResult<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "podman" => Ok(Self::Podman),
            "docker" => Ok(Self::Docker),
            other => Err(BerthError::UnsupportedEngine(other.to_string())),
        }
    }

    /// Binary name
    pub fn binary(&self) -> &'static str {
        match self {
            Self::Podman => "podman",
            Self::Docker => "docker",
        }
    }

    /// Arguments for `build`, context directory last
    pub fn build_args(&self, context_dir: &Path, tag: &str, no_cache: bool) -> Vec<String> {
        let mut args = vec!["build".to_string()];

        if *self == Self::Podman {
            args.push("--layers".to_string());
        }
        // Drop intermediate containers, including those of a failed step
        args.push("--force-rm".to_string());
        if no_cache {
            args.push("--no-cache".to_string());
        }

        args.push("-f".to_string());
        args.push(
            context_dir
                .join(crate::image::plan::CONTAINERFILE)
                .to_string_lossy()
                .into_owned(),
        );
        args.push("-t".to_string());
        args.push(tag.to_string());
        args.push(context_dir.to_string_lossy().into_owned());
        args
    }
}

/// Container runtime backed by an engine CLI
pub struct CliRuntime {
    engine: Engine,
}

impl CliRuntime {
    /// Create a runtime for `engine`
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Engine in use
    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// Check if the engine binary is installed
    async fn engine_installed(&self) -> bool {
        Command::new(self.engine.binary())
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Execute an engine command and return the output
    async fn exec(&self, args: &[&str]) -> BerthResult<std::process::Output> {
        debug!("Executing: {} {:?}", self.engine.binary(), args);

        Command::new(self.engine.binary())
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| BerthError::command_failed(format!("{} {:?}", self.engine.binary(), args), e))
    }

    /// Execute an engine command interactively
    async fn exec_interactive(&self, args: &[&str]) -> BerthResult<i32> {
        debug!("Executing interactively: {} {:?}", self.engine.binary(), args);

        let status = Command::new(self.engine.binary())
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| BerthError::command_failed(format!("{} {:?}", self.engine.binary(), args), e))?;

        Ok(status.code().unwrap_or(-1))
    }

    /// Run a command that only reports success or stderr
    async fn exec_checked(&self, args: &[&str]) -> BerthResult<()> {
        let output = self.exec(args).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(BerthError::command_exec(
                format!("{} {}", self.engine.binary(), args.first().unwrap_or(&"")),
                stderr,
            ))
        }
    }
}

#[async_trait]
impl ContainerRuntime for CliRuntime {
    async fn is_available(&self) -> BerthResult<bool> {
        Ok(self.engine_installed().await)
    }

    async fn ensure_ready(&self) -> BerthResult<()> {
        if !self.engine_installed().await {
            return Err(BerthError::EngineNotFound(self.engine.binary().to_string()));
        }

        let output = self.exec(&["info"]).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BerthError::command_exec(
                format!("{} info", self.engine.binary()),
                stderr,
            ));
        }

        Ok(())
    }

    async fn image_exists(&self, image: &str) -> BerthResult<bool> {
        let output = match self.engine {
            Engine::Podman => self.exec(&["image", "exists", image]).await?,
            Engine::Docker => self.exec(&["image", "inspect", image]).await?,
        };
        Ok(output.status.success())
    }

    async fn build_image_with_progress(
        &self,
        context_dir: &Path,
        tag: &str,
        no_cache: bool,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> BerthResult<()> {
        let args = self.engine.build_args(context_dir, tag, no_cache);
        info!("Building image {} with {}", tag, self.engine.binary());
        debug!("Executing: {} {:?}", self.engine.binary(), args);

        let mut child = Command::new(self.engine.binary())
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BerthError::command_failed(format!("{} build", self.engine.binary()), e))?;

        let lines = stream_child_output(&mut child, on_output).await;

        let status = child
            .wait()
            .await
            .map_err(|e| BerthError::command_failed(format!("{} build", self.engine.binary()), e))?;

        if status.success() {
            Ok(())
        } else {
            let combined = lines.join("\n");
            Err(BerthError::BuildFailed {
                tag: tag.to_string(),
                output: build_error_output(&combined, ""),
            })
        }
    }

    async fn image_remove(&self, image: &str) -> BerthResult<()> {
        self.exec_checked(&["rmi", image]).await
    }

    async fn run(&self, config: &ContainerConfig) -> BerthResult<String> {
        let mut args = vec!["run".to_string()];
        args.extend(config.run_args());

        debug!("Running container: {} {:?}", self.engine.binary(), args);

        let args_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.exec(&args_refs).await?;

        if output.status.success() {
            let container_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
            info!(
                "Container started: {}",
                &container_id[..12.min(container_id.len())]
            );
            Ok(container_id)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(BerthError::ContainerStart(stderr.trim().to_string()))
        }
    }

    async fn stop(&self, container_id: &str, grace_secs: u32) -> BerthResult<()> {
        debug!("Stopping container {} (grace {}s)", container_id, grace_secs);
        let grace = grace_secs.to_string();
        self.exec_checked(&["stop", "-t", &grace, container_id]).await
    }

    async fn kill(&self, container_id: &str) -> BerthResult<()> {
        debug!("Killing container: {}", container_id);
        self.exec_checked(&["kill", container_id]).await
    }

    async fn remove(&self, container_id: &str) -> BerthResult<()> {
        debug!("Removing container: {}", container_id);

        let output = self.exec(&["rm", "-f", container_id]).await?;

        if output.status.success() {
            Ok(())
        } else {
            // Ignore error if container doesn't exist
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.to_lowercase().contains("no such container") {
                Ok(())
            } else {
                Err(BerthError::command_exec(
                    format!("{} rm", self.engine.binary()),
                    stderr,
                ))
            }
        }
    }

    async fn logs(&self, container_id: &str, lines: u32) -> BerthResult<String> {
        let tail_arg = if lines == 0 {
            "all".to_string()
        } else {
            lines.to_string()
        };

        let output = self.exec(&["logs", "--tail", &tail_arg, container_id]).await?;

        if !output.status.success() {
            return Err(BerthError::ContainerNotFound(container_id.to_string()));
        }

        // Servers log to stderr; show both streams
        let mut logs = String::from_utf8_lossy(&output.stdout).to_string();
        logs.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(logs)
    }

    async fn logs_follow(&self, container_id: &str) -> BerthResult<()> {
        self.exec_interactive(&["logs", "-f", container_id]).await?;
        Ok(())
    }

    fn runtime_name(&self) -> &'static str {
        match self.engine {
            Engine::Podman => "Podman",
            Engine::Docker => "Docker",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_parse() {
        assert_eq!(Engine::parse("podman").unwrap(), Engine::Podman);
        assert_eq!(Engine::parse(" Docker ").unwrap(), Engine::Docker);
        assert!(matches!(
            Engine::parse("lxc"),
            Err(BerthError::UnsupportedEngine(_))
        ));
    }

    #[test]
    fn podman_build_args_discard_failed_layers() {
        let args = Engine::Podman.build_args(Path::new("/tmp/ctx"), "app:abc", false);
        assert_eq!(args[0], "build");
        assert!(args.contains(&"--layers".to_string()));
        assert!(args.contains(&"--force-rm".to_string()));
        assert!(!args.contains(&"--no-cache".to_string()));
        assert_eq!(args.last().unwrap(), "/tmp/ctx");
        assert!(args.windows(2).any(|w| w[0] == "-t" && w[1] == "app:abc"));
    }

    #[test]
    fn docker_build_args_no_cache() {
        let args = Engine::Docker.build_args(Path::new("/tmp/ctx"), "app:abc", true);
        assert!(!args.contains(&"--layers".to_string()));
        assert!(args.contains(&"--force-rm".to_string()));
        assert!(args.contains(&"--no-cache".to_string()));
    }

    #[test]
    fn runtime_name() {
        assert_eq!(CliRuntime::new(Engine::Podman).runtime_name(), "Podman");
        assert_eq!(CliRuntime::new(Engine::Docker).runtime_name(), "Docker");
    }
}
