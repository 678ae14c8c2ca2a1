//! Logs command - view deployment logs

use crate::cli::args::LogsArgs;
use crate::config::Config;
use crate::deploy::DeploymentManager;
use crate::error::{BerthError, BerthResult};
use crate::orchestration::create_runtime;

/// Execute the logs command
pub async fn execute(args: LogsArgs, config: &Config) -> BerthResult<()> {
    let manager = DeploymentManager::new().await?;

    let deployment = manager.require(&args.name).await?;

    let container_id = deployment
        .container_id
        .as_ref()
        .ok_or_else(|| BerthError::ContainerNotFound(args.name.clone()))?;

    let runtime = create_runtime(config)?;

    if args.follow {
        runtime.logs_follow(container_id).await?;
    } else {
        let logs = runtime.logs(container_id, args.lines).await?;
        print!("{}", logs);
    }

    Ok(())
}
