//! Runtime factory for creating the configured container runtime

use crate::config::Config;
use crate::error::BerthResult;
use crate::orchestration::engine::{CliRuntime, Engine};
use crate::orchestration::runtime::ContainerRuntime;

/// Create the container runtime named by `runtime.engine`
pub fn create_runtime(config: &Config) -> BerthResult<Box<dyn ContainerRuntime>> {
    let engine = Engine::parse(&config.runtime.engine)?;
    Ok(Box::new(CliRuntime::new(engine)))
}
