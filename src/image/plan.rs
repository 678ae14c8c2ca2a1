//! Build planning
//!
//! Turns a project's config, dependency manifest and source tree into an
//! ordered set of layers (base, OS packages, dependencies, source) and the
//! Containerfile that builds them. The dependency layer is planned from the
//! base, the OS packages and the manifest only, so editing source files
//! never invalidates the dependency install.

use crate::config::schema::{EntrypointMode, GeneralConfig, LaunchConfig};
use crate::config::Config;
use crate::error::{BerthError, BerthResult};
use crate::image::layer::{Layer, LayerKind};
use crate::image::manifest::DependencyManifest;
use crate::image::source::SourceTree;
use crate::launch::AppRef;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Containerfile name inside the build context
pub const CONTAINERFILE: &str = "Containerfile";

/// Canonical manifest name inside the build context
pub const REQUIREMENTS_FILE: &str = "berth-requirements.txt";

/// Source directory inside the build context
pub const SOURCE_DIR: &str = "app";

/// Launcher binary name inside the build context
pub const LAUNCHER_FILE: &str = "berth";

/// Where the launcher lands in the image
pub const LAUNCHER_IMAGE_PATH: &str = "/usr/local/bin/berth";

/// Launcher config name inside the build context
pub const LAUNCH_CONFIG_FILE: &str = "berth-launch.toml";

/// Where the launcher config lands in the image
pub const LAUNCH_CONFIG_IMAGE_PATH: &str = "/etc/berth/berth.toml";

/// The launcher executable copied into the image in launcher mode
#[derive(Debug, Clone)]
pub struct LauncherBinary {
    pub path: PathBuf,
    pub digest: String,
}

impl LauncherBinary {
    /// Hash the running executable
    pub fn current() -> BerthResult<Self> {
        let path = std::env::current_exe()
            .map_err(|e| BerthError::io("locating the berth executable", e))?;
        Self::from_path(&path)
    }

    /// Hash an executable at `path`
    pub fn from_path(path: &Path) -> BerthResult<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| BerthError::io(format!("reading {}", path.display()), e))?;
        let digest = hex::encode(Sha256::digest(&bytes));
        Ok(Self {
            path: path.to_path_buf(),
            digest,
        })
    }
}

/// Everything a plan reads from disk
#[derive(Debug, Clone)]
pub struct BuildInputs {
    pub manifest: DependencyManifest,
    pub source: SourceTree,
    pub launcher: Option<LauncherBinary>,
}

impl BuildInputs {
    /// Read the manifest and scan the source tree for a project
    pub fn collect(config: &Config, project_dir: &Path) -> BerthResult<Self> {
        let manifest_path = project_dir.join(&config.dependencies.manifest);
        let manifest = DependencyManifest::from_file(&manifest_path)?;
        debug!(
            "Loaded {} dependencies from {}",
            manifest.len(),
            manifest_path.display()
        );

        // The manifest ships in its own layer; keep it out of the source copy
        let source_root = project_dir.join(&config.source.dir);
        let mut excludes = config.source.exclude.clone();
        if manifest_path.parent() == Some(source_root.as_path()) {
            if let Some(name) = manifest_path.file_name().and_then(|n| n.to_str()) {
                excludes.push(name.to_string());
            }
        }
        let source = SourceTree::scan(&source_root, &excludes)?;

        let launcher = match config.image.entrypoint {
            EntrypointMode::Shell => None,
            EntrypointMode::Launcher => Some(LauncherBinary::current()?),
        };

        Ok(Self {
            manifest,
            source,
            launcher,
        })
    }
}

/// Settings the launcher reads inside the image.
///
/// The project's berth.toml is not part of the source copy, so the
/// resolved sections are baked in as their own file.
#[derive(Debug, Serialize)]
struct LaunchConfigFile<'a> {
    general: &'a GeneralConfig,
    launch: &'a LaunchConfig,
}

/// A fully planned image build
#[derive(Debug, Clone)]
pub struct BuildPlan {
    image_name: String,
    base: String,
    layers: Vec<Layer>,
    requirements: String,
    launch_config: Option<String>,
    inputs: BuildInputs,
}

/// Serializable view of a plan, for `berth plan --format json`
#[derive(Debug, Serialize)]
pub struct PlanSummary<'a> {
    pub image_tag: String,
    pub base: &'a str,
    pub dependencies: usize,
    pub source_files: usize,
    pub layers: &'a [Layer],
}

impl BuildPlan {
    /// Plan all four layers from config and collected inputs
    pub fn new(config: &Config, inputs: BuildInputs) -> BerthResult<Self> {
        validate_base(&config.image.base)?;
        validate_image_name(&config.image.name)?;
        AppRef::parse(&config.launch.app)?;

        let packages = normalize_packages(&config.packages.os)?;

        let base = Layer::new(
            LayerKind::Base,
            vec![
                format!("FROM {}", config.image.base),
                format!("WORKDIR {}", config.image.workdir),
            ],
            None,
            None,
        );

        let os_packages = Layer::new(
            LayerKind::OsPackages,
            os_package_instructions(&packages),
            None,
            Some(&base),
        );

        let requirements = inputs.manifest.render_requirements();
        let dependencies = Layer::new(
            LayerKind::Dependencies,
            vec![
                format!("COPY {} ./requirements.txt", REQUIREMENTS_FILE),
                "RUN pip install --no-cache-dir -r requirements.txt".to_string(),
            ],
            Some(inputs.manifest.digest()),
            Some(&os_packages),
        );

        let launch_config = match inputs.launcher {
            Some(_) => Some(toml::to_string(&LaunchConfigFile {
                general: &config.general,
                launch: &config.launch,
            })?),
            None => None,
        };

        let source = Layer::new(
            LayerKind::Source,
            source_instructions(config, inputs.launcher.is_some()),
            Some(source_digest(&inputs, launch_config.as_deref())),
            Some(&dependencies),
        );

        Ok(Self {
            image_name: config.image.name.clone(),
            base: config.image.base.clone(),
            layers: vec![base, os_packages, dependencies, source],
            requirements,
            launch_config,
            inputs,
        })
    }

    /// Layers in build order
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Layer of a given kind
    pub fn layer(&self, kind: LayerKind) -> &Layer {
        // Every plan holds exactly one layer per kind, in `LayerKind::all()` order
        &self.layers[kind as usize]
    }

    /// Base image reference
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Content-addressed image tag derived from the final layer
    pub fn image_tag(&self) -> String {
        format!("{}:{}", self.image_name, self.layer(LayerKind::Source).short_hash())
    }

    /// Canonical requirements text staged into the build context
    pub fn requirements(&self) -> &str {
        &self.requirements
    }

    /// Launcher config staged into the image, in launcher mode
    pub fn launch_config(&self) -> Option<&str> {
        self.launch_config.as_deref()
    }

    /// Inputs the plan was computed from
    pub fn inputs(&self) -> &BuildInputs {
        &self.inputs
    }

    /// Summary for machine-readable output
    pub fn summary(&self) -> PlanSummary<'_> {
        PlanSummary {
            image_tag: self.image_tag(),
            base: &self.base,
            dependencies: self.inputs.manifest.len(),
            source_files: self.inputs.source.files().len(),
            layers: &self.layers,
        }
    }

    /// Render the Containerfile
    ///
    /// Instruction order mirrors the layer order exactly, so the engine's
    /// own build cache breaks at the same point the layer hashes do.
    pub fn containerfile(&self) -> String {
        let mut lines = Vec::new();

        for layer in &self.layers {
            if layer.instructions.is_empty() {
                continue;
            }
            lines.push(format!("# Layer: {} ({})", layer.kind, layer.short_hash()));
            lines.extend(layer.instructions.iter().cloned());
            lines.push(String::new());
        }

        lines.join("\n")
    }
}

fn os_package_instructions(packages: &[String]) -> Vec<String> {
    if packages.is_empty() {
        return vec![];
    }

    // One RUN: the index purge lands in the same layer as the install, so
    // lists never persist and installed packages are untouched.
    vec![format!(
        "RUN apt-get update && apt-get install -y --no-install-recommends {} && rm -rf /var/lib/apt/lists/*",
        packages.join(" ")
    )]
}

fn source_instructions(config: &Config, with_launcher: bool) -> Vec<String> {
    let mut lines = Vec::new();

    if with_launcher {
        lines.push(format!("COPY {} {}", LAUNCHER_FILE, LAUNCHER_IMAGE_PATH));
        lines.push(format!("COPY {} {}", LAUNCH_CONFIG_FILE, LAUNCH_CONFIG_IMAGE_PATH));
    }
    lines.push(format!("COPY {}/ ./", SOURCE_DIR));

    for (key, value) in image_env(config) {
        lines.push(format!("ENV {}={}", key, dockerfile_quote(&value)));
    }

    lines.push(format!("EXPOSE {}", config.launch.port));

    if with_launcher {
        lines.push(format!(
            "CMD [\"{}\", \"--config\", \"{}\", \"launch\"]",
            LAUNCHER_IMAGE_PATH, LAUNCH_CONFIG_IMAGE_PATH
        ));
    } else {
        lines.push(format!("CMD {}", shell_cmd(config)));
    }

    lines
}

/// Environment baked into the image, sorted by key
fn image_env(config: &Config) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("PYTHONDONTWRITEBYTECODE".to_string(), "1".to_string());
    env.insert("PORT".to_string(), config.launch.port.to_string());
    env.extend(config.image.env.iter().map(|(k, v)| (k.clone(), v.clone())));
    // Unbuffered output is not negotiable: the log collector reads it live
    env.insert("PYTHONUNBUFFERED".to_string(), "1".to_string());
    env
}

/// Shell-form command. `exec` makes the server replace `/bin/sh`, so the
/// engine's stop signal reaches the server directly.
fn shell_cmd(config: &Config) -> String {
    let launch = &config.launch;
    let mut parts = vec![
        "exec".to_string(),
        shell_quote(&launch.server),
        shell_quote(&launch.app),
        "--host".to_string(),
        shell_quote(&launch.host),
        "--port".to_string(),
        format!("\"${{PORT:-{}}}\"", launch.port),
    ];
    parts.extend(launch.args.iter().map(|a| shell_quote(a)));
    parts.join(" ")
}

fn source_digest(inputs: &BuildInputs, launch_config: Option<&str>) -> String {
    match &inputs.launcher {
        None => inputs.source.digest().to_string(),
        Some(launcher) => {
            let mut hasher = Sha256::new();
            hasher.update(inputs.source.digest().as_bytes());
            hasher.update(launcher.digest.as_bytes());
            hasher.update(launch_config.unwrap_or_default().as_bytes());
            hex::encode(hasher.finalize())
        }
    }
}

/// Sort and dedupe OS packages so the declared order never moves the hash
fn normalize_packages(packages: &[String]) -> BerthResult<Vec<String>> {
    let mut out: Vec<String> = Vec::with_capacity(packages.len());
    for pkg in packages {
        let pkg = pkg.trim();
        let valid = !pkg.is_empty()
            && pkg.starts_with(|c: char| c.is_ascii_alphanumeric())
            && pkg
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-' | ':' | '=' | '~'));
        if !valid {
            return Err(BerthError::ConfigInvalid {
                path: PathBuf::from("packages.os"),
                reason: format!("invalid package name: {:?}", pkg),
            });
        }
        out.push(pkg.to_string());
    }
    out.sort();
    out.dedup();
    Ok(out)
}

fn validate_base(base: &str) -> BerthResult<()> {
    if base.is_empty() || base.chars().any(char::is_whitespace) {
        return Err(BerthError::BaseImageInvalid(base.to_string()));
    }

    let last = base.rsplit('/').next().unwrap_or(base);
    let pinned = base.contains('@') || last.contains(':');
    if !pinned {
        return Err(BerthError::BaseImageInvalid(format!(
            "{} (pin a tag or digest)",
            base
        )));
    }
    if last.ends_with(":latest") {
        warn!("Base image {} uses the floating 'latest' tag", base);
    }
    Ok(())
}

fn validate_image_name(name: &str) -> BerthResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-' | '/'));
    if valid {
        Ok(())
    } else {
        Err(BerthError::ConfigInvalid {
            path: PathBuf::from("image.name"),
            reason: format!("invalid image name: {:?}", name),
        })
    }
}

/// Quote a value for a Containerfile ENV instruction.
/// Embedded double quotes and backslashes are escaped to prevent injection.
fn dockerfile_quote(value: &str) -> String {
    if value.is_empty()
        || value.contains('$')
        || value.contains(' ')
        || value.contains('"')
        || value.contains('\\')
    {
        let escaped = value
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('$', "\\$");
        format!("\"{}\"", escaped)
    } else {
        value.to_string()
    }
}

/// Single-quote a word for `/bin/sh` unless it is plainly safe
fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | ','));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}
