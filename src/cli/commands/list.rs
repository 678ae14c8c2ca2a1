//! List command - show deployments

use crate::cli::args::{ListArgs, OutputFormat};
use crate::deploy::{Deployment, DeploymentManager, DeploymentStatus};
use crate::error::BerthResult;
use crate::ui::{self, UiContext};
use console::style;

/// Execute the list command
pub async fn execute(args: ListArgs) -> BerthResult<()> {
    let manager = DeploymentManager::new().await?;
    let deployments = manager.list().await?;

    let filtered: Vec<_> = if args.all {
        deployments
    } else {
        deployments
            .into_iter()
            .filter(|d| d.status.is_active())
            .collect()
    };

    if filtered.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => {
                let ctx = UiContext::detect();
                ui::step_info(&ctx, "No active deployments");
            }
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&filtered),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&filtered)?),
        OutputFormat::Plain => {
            for deployment in &filtered {
                println!("{}", deployment.name);
            }
        }
    }

    Ok(())
}

fn print_table(deployments: &[Deployment]) {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "Deployments");

    println!(
        "{:<20} {:<10} {:<12} {:<17} {:<30}",
        style("NAME").bold(),
        style("STATUS").bold(),
        style("PORTS").bold(),
        style("STARTED").bold(),
        style("IMAGE").bold()
    );
    println!("{}", "-".repeat(89));

    for deployment in deployments {
        let status = match deployment.status {
            DeploymentStatus::Running => style("running").green(),
            DeploymentStatus::Starting => style("starting").yellow(),
            DeploymentStatus::Stopped => style("stopped").dim(),
            DeploymentStatus::Failed => style("failed").red(),
        };

        let ports = format!("{}->{}", deployment.host_port, deployment.container_port);
        let started = deployment.created_at.format("%Y-%m-%d %H:%M").to_string();

        println!(
            "{:<20} {:<10} {:<12} {:<17} {:<30}",
            deployment.name, status, ports, started, deployment.image_tag
        );
    }

    println!();
    println!("{} deployment(s)", deployments.len());
}
