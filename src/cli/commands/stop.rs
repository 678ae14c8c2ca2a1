//! Stop command - stop a running deployment

use crate::cli::args::StopArgs;
use crate::config::Config;
use crate::deploy::{DeploymentManager, DeploymentStatus};
use crate::error::BerthResult;
use crate::orchestration::create_runtime;
use crate::ui::{self, TaskSpinner, UiContext};

/// Execute the stop command
pub async fn execute(args: StopArgs, config: &Config) -> BerthResult<()> {
    let ctx = UiContext::detect();
    let manager = DeploymentManager::new().await?;

    let deployment = manager.require(&args.name).await?;

    if !deployment.status.is_active() {
        ui::step_warn(
            &ctx,
            &format!(
                "Deployment {} is already {}",
                args.name,
                format!("{:?}", deployment.status).to_lowercase()
            ),
        );
        return Ok(());
    }

    if let Some(container_id) = &deployment.container_id {
        let runtime = create_runtime(config)?;
        let grace = config.runtime.grace_period_secs;

        let mut spinner = TaskSpinner::new(&ctx);
        if args.force {
            spinner.start(&format!("Killing {}...", args.name));
            runtime.kill(container_id).await?;
        } else {
            // SIGTERM first; the engine escalates to SIGKILL after the grace period
            spinner.start(&format!("Stopping {} (up to {}s)...", args.name, grace));
            runtime.stop(container_id, grace).await?;
        }

        runtime.remove(container_id).await?;
        spinner.stop(&format!("Deployment {} stopped", args.name));
    } else {
        ui::step_ok(&ctx, &format!("Deployment {} stopped", args.name));
    }

    manager
        .update_status(&args.name, DeploymentStatus::Stopped)
        .await?;

    Ok(())
}
