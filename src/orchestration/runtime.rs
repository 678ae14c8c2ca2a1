//! Container runtime abstraction
//!
//! Provides a trait for the engine operations berth needs: building the
//! planned image and running it as a detached service.

use crate::error::BerthResult;
use crate::orchestration::container::ContainerConfig;
use async_trait::async_trait;
use std::path::Path;

/// Abstract container runtime interface
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check if the runtime is available on this system
    async fn is_available(&self) -> BerthResult<bool>;

    /// Ensure the runtime is ready to build and run
    async fn ensure_ready(&self) -> BerthResult<()>;

    /// Check if an image tag exists locally
    async fn image_exists(&self, image: &str) -> BerthResult<bool>;

    /// Build an image from a staged context, streaming output lines.
    ///
    /// Implementations must not leave a tag behind when the build fails.
    async fn build_image_with_progress(
        &self,
        context_dir: &Path,
        tag: &str,
        no_cache: bool,
        on_output: &(dyn Fn(String) + Send + Sync),
    ) -> BerthResult<()>;

    /// Build an image without progress reporting
    async fn build_image(&self, context_dir: &Path, tag: &str, no_cache: bool) -> BerthResult<()> {
        self.build_image_with_progress(context_dir, tag, no_cache, &|_| {})
            .await
    }

    /// Remove an image
    async fn image_remove(&self, image: &str) -> BerthResult<()>;

    /// Run a detached container and return the container ID
    async fn run(&self, config: &ContainerConfig) -> BerthResult<String>;

    /// Stop a container, allowing `grace_secs` after SIGTERM before SIGKILL
    async fn stop(&self, container_id: &str, grace_secs: u32) -> BerthResult<()>;

    /// Kill a container immediately
    async fn kill(&self, container_id: &str) -> BerthResult<()>;

    /// Remove a container
    async fn remove(&self, container_id: &str) -> BerthResult<()>;

    /// Get container logs
    async fn logs(&self, container_id: &str, lines: u32) -> BerthResult<String>;

    /// Follow container logs interactively
    async fn logs_follow(&self, container_id: &str) -> BerthResult<()>;

    /// Get the human-readable runtime name for display
    fn runtime_name(&self) -> &'static str;
}
