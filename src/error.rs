//! Error types for Berth
//!
//! All modules use `BerthResult<T>` as their return type. Every error in
//! this crate is terminal: nothing here retries, restart policy belongs to
//! whatever orchestrates the container.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Berth operations
pub type BerthResult<T> = Result<T, BerthError>;

/// Broad failure class, used for reporting and exit handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The image build was aborted; no image was tagged
    BuildFatal,
    /// The server could not be started; the process exits non-zero
    StartFatal,
    /// Anything else (engine plumbing, config, state files)
    Operational,
}

/// All errors that can occur in Berth
#[derive(Error, Debug)]
pub enum BerthError {
    // Engine errors
    #[error("Container engine not found: {0}")]
    EngineNotFound(String),

    #[error("Unsupported container engine: {0}. Use podman or docker.")]
    UnsupportedEngine(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    // Build errors
    #[error("Invalid dependency manifest {path}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("Duplicate dependency in {path}: {name}")]
    ManifestDuplicate { path: PathBuf, name: String },

    #[error("Invalid base image reference: {0}")]
    BaseImageInvalid(String),

    #[error("Source files under {0} changed during the build")]
    SourceChanged(PathBuf),

    #[error("Image build failed for {tag}:\n{output}")]
    BuildFailed { tag: String, output: String },

    // Launch errors
    #[error("Invalid PORT value: {0}")]
    InvalidPort(String),

    #[error("Invalid application reference '{reference}': {reason}")]
    InvalidAppRef { reference: String, reason: String },

    #[error("Cannot bind {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to exec server {program}: {source}")]
    ExecFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process replacement is only supported on Unix")]
    ExecUnsupported,

    // Deployment errors
    #[error("Deployment not found: {0}")]
    DeploymentNotFound(String),

    #[error("Deployment already exists: {0}")]
    DeploymentExists(String),

    // Container errors
    #[error("Container failed to start: {0}")]
    ContainerStart(String),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, stderr: {stderr}")]
    CommandExecution { command: String, stderr: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl BerthError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Classify the error
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ManifestInvalid { .. }
            | Self::ManifestDuplicate { .. }
            | Self::BaseImageInvalid(_)
            | Self::SourceChanged(_)
            | Self::BuildFailed { .. } => ErrorClass::BuildFatal,
            Self::InvalidPort(_)
            | Self::InvalidAppRef { .. }
            | Self::BindFailed { .. }
            | Self::ExecFailed { .. }
            | Self::ExecUnsupported => ErrorClass::StartFatal,
            _ => ErrorClass::Operational,
        }
    }

    /// Check if error is retryable.
    ///
    /// Build- and start-fatal errors never are; only a container that
    /// failed to come up may succeed on a second `berth run`.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ContainerStart(_))
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::EngineNotFound(_) => Some("Install podman, or set runtime.engine = \"docker\""),
            Self::ManifestDuplicate { .. } => Some("List each dependency exactly once"),
            Self::SourceChanged(_) => Some("Run the build again once edits are saved"),
            Self::BindFailed { source, .. } => match source.kind() {
                std::io::ErrorKind::AddrInUse => Some("Another process owns the port. Set PORT"),
                std::io::ErrorKind::PermissionDenied => {
                    Some("Ports below 1024 need privileges. Use PORT=8080")
                }
                _ => None,
            },
            Self::InvalidAppRef { .. } => Some("Use the form module:callable, e.g. app:app"),
            Self::ExecFailed { .. } => Some("Is the server installed in the image?"),
            _ => None,
        }
    }
}
