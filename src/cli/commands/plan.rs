//! Plan command - show layers and hashes without building

use crate::cli::args::{OutputFormat, PlanArgs};
use crate::config::Config;
use crate::error::BerthResult;
use crate::image::{BuildInputs, BuildPlan};
use crate::ui::{self, UiContext};
use console::style;
use std::path::Path;

/// Execute the plan command
pub async fn execute(args: PlanArgs, config: &Config, project_dir: &Path) -> BerthResult<()> {
    let inputs = BuildInputs::collect(config, project_dir)?;
    let plan = BuildPlan::new(config, inputs)?;

    if args.containerfile {
        print!("{}", plan.containerfile());
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&plan),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&plan.summary())?),
        OutputFormat::Plain => {
            for layer in plan.layers() {
                println!("{} {}", layer.kind, layer.hash);
            }
        }
    }

    Ok(())
}

fn print_table(plan: &BuildPlan) {
    let ctx = UiContext::detect();
    ui::intro(&ctx, "Image plan");

    let summary = plan.summary();
    ui::key_value(&ctx, "Tag", &summary.image_tag);
    ui::key_value(&ctx, "Base", summary.base);
    ui::key_value(&ctx, "Dependencies", &summary.dependencies.to_string());
    ui::key_value(&ctx, "Source files", &summary.source_files.to_string());
    println!();

    println!(
        "{:<14} {:<14} {:<8} {}",
        style("LAYER").bold(),
        style("HASH").bold(),
        style("STEPS").bold(),
        style("INPUT").bold()
    );
    println!("{}", "-".repeat(56));

    for layer in plan.layers() {
        let input = layer
            .content_digest
            .as_deref()
            .map(|d| format!("sha256:{}", &d[..d.len().min(12)]))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "{:<14} {:<14} {:<8} {}",
            layer.kind.as_str(),
            style(layer.short_hash()).cyan(),
            layer.instructions.len(),
            style(input).dim()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn plan_runs_for_minimal_project() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("requirements.txt"), "fastapi==0.95\n").unwrap();
        std::fs::write(temp.path().join("app.py"), "app = None\n").unwrap();

        let args = PlanArgs {
            format: OutputFormat::Plain,
            containerfile: false,
        };
        execute(args, &Config::default(), temp.path()).await.unwrap();
    }

    #[tokio::test]
    async fn plan_fails_without_manifest() {
        let temp = TempDir::new().unwrap();
        let args = PlanArgs {
            format: OutputFormat::Table,
            containerfile: false,
        };
        assert!(execute(args, &Config::default(), temp.path()).await.is_err());
    }
}
