//! Configuration schema for Berth
//!
//! Configuration is stored per project in `berth.toml`. Every section is
//! optional; a project with no config file builds `python:3.11-slim` with
//! `requirements.txt` and serves `app:app` on port 8080.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Image identity and base runtime
    pub image: ImageConfig,

    /// OS-level packages needed to compile native extensions
    pub packages: PackagesConfig,

    /// Language dependency manifest
    pub dependencies: DependenciesConfig,

    /// Application source tree
    pub source: SourceConfig,

    /// Server process started by the launcher
    pub launch: LaunchConfig,

    /// Container engine settings
    pub runtime: RuntimeConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// How the image starts the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntrypointMode {
    /// `CMD exec <server> ...` in shell form; the shell replaces itself
    #[default]
    Shell,
    /// Copy this binary into the image and run `berth launch`
    Launcher,
}

/// Image settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// Repository name for the built image (tag is content-derived)
    pub name: String,

    /// Pinned base runtime reference
    pub base: String,

    /// Working directory inside the image
    pub workdir: String,

    /// Extra environment baked into the image
    pub env: HashMap<String, String>,

    /// Container entrypoint style
    pub entrypoint: EntrypointMode,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            name: "berth-app".to_string(),
            base: "python:3.11-slim".to_string(),
            workdir: "/app".to_string(),
            env: HashMap::new(),
            entrypoint: EntrypointMode::Shell,
        }
    }
}

/// OS package settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagesConfig {
    /// Packages installed with the base image's package manager
    pub os: Vec<String>,
}

impl Default for PackagesConfig {
    fn default() -> Self {
        Self {
            os: vec!["build-essential".to_string()],
        }
    }
}

/// Dependency manifest settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DependenciesConfig {
    /// Manifest path relative to the project root
    pub manifest: PathBuf,
}

impl Default for DependenciesConfig {
    fn default() -> Self {
        Self {
            manifest: PathBuf::from("requirements.txt"),
        }
    }
}

/// Source tree settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Source directory relative to the project root
    pub dir: PathBuf,

    /// Extra file or directory names to leave out of the image
    pub exclude: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            exclude: vec![],
        }
    }
}

/// Launcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// ASGI application reference (`module:callable`)
    pub app: String,

    /// Server program
    pub server: String,

    /// Interface to bind
    pub host: String,

    /// Port used when `PORT` is unset
    pub port: u16,

    /// Extra server arguments appended after host and port
    pub args: Vec<String>,

    /// Probe the port before exec so bind failures surface immediately
    pub preflight_bind: bool,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            app: "app:app".to_string(),
            server: "uvicorn".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            args: vec![],
            preflight_bind: true,
        }
    }
}

/// Container engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Engine binary: "podman" or "docker"
    pub engine: String,

    /// Seconds to wait after SIGTERM before the engine kills the container
    pub grace_period_secs: u32,

    /// Host port to publish (defaults to the container port)
    pub host_port: Option<u16>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            engine: "podman".to_string(),
            grace_period_secs: 10,
            host_port: None,
        }
    }
}
