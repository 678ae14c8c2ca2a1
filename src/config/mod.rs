//! Configuration management for Berth

pub mod schema;

pub use schema::Config;

use crate::error::{BerthError, BerthResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Project config file name
pub const CONFIG_FILE_NAME: &str = "berth.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Config manager for `berth.toml` inside a project directory
    pub fn for_project(project_dir: &Path) -> Self {
        Self {
            config_path: project_dir.join(CONFIG_FILE_NAME),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the state directory path
    pub fn state_dir() -> PathBuf {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("berth")
    }

    /// Get the deployments directory path
    pub fn deployments_dir() -> PathBuf {
        Self::state_dir().join("deployments")
    }

    /// Get the build context scratch directory path
    pub fn builds_dir() -> PathBuf {
        Self::state_dir().join("builds")
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub async fn load(&self) -> BerthResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> BerthResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| BerthError::io(format!("reading config from {}", path.display()), e))?;

        Self::parse(path, &content)
    }

    /// Load configuration without an async runtime.
    ///
    /// The launcher runs before any server work and must not spin up
    /// tokio just to read one file.
    pub fn load_blocking(&self) -> BerthResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(&self.config_path).map_err(|e| {
            BerthError::io(
                format!("reading config from {}", self.config_path.display()),
                e,
            )
        })?;

        Self::parse(&self.config_path, &content)
    }

    fn parse(path: &Path, content: &str) -> BerthResult<Config> {
        toml::from_str(content).map_err(|e| BerthError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Ensure all state directories exist
    pub async fn ensure_state_dirs() -> BerthResult<()> {
        let dirs = [
            Self::state_dir(),
            Self::deployments_dir(),
            Self::builds_dir(),
        ];

        for dir in &dirs {
            fs::create_dir_all(dir).await.map_err(|e| {
                BerthError::io(format!("creating directory {}", dir.display()), e)
            })?;
        }

        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}
