//! Build command - build the layered image

use crate::cli::args::BuildArgs;
use crate::config::Config;
use crate::error::BerthResult;
use crate::image::{build_image, BuildInputs, BuildOptions, BuildOutcome, BuildPlan};
use crate::orchestration::{create_runtime, ContainerRuntime};
use crate::ui::{self, BuildProgress, TaskSpinner, UiContext};
use std::path::Path;
use tracing::debug;

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config, project_dir: &Path) -> BerthResult<()> {
    let ctx = UiContext::detect();
    let runtime = create_runtime(config)?;

    let outcome = build_project(&ctx, runtime.as_ref(), config, project_dir, args.no_cache).await?;

    if outcome.was_cached {
        ui::step_ok_detail(&ctx, "Image up to date", &outcome.image_tag);
    } else {
        ui::step_ok_detail(&ctx, "Image built", &outcome.image_tag);
    }

    Ok(())
}

/// Plan and build the project image, with spinner and build progress
pub(crate) async fn build_project(
    ctx: &UiContext,
    runtime: &dyn ContainerRuntime,
    config: &Config,
    project_dir: &Path,
    no_cache: bool,
) -> BerthResult<BuildOutcome> {
    let mut spinner = TaskSpinner::new(ctx);
    spinner.start(&format!("Checking {}...", runtime.runtime_name()));

    if let Err(e) = runtime.ensure_ready().await {
        spinner.stop_error(&format!("{} is not ready", runtime.runtime_name()));
        return Err(e);
    }

    spinner.message("Planning layers...");
    let plan = match BuildInputs::collect(config, project_dir).and_then(|i| BuildPlan::new(config, i))
    {
        Ok(plan) => plan,
        Err(e) => {
            spinner.stop_error("Planning failed");
            return Err(e);
        }
    };
    spinner.clear();

    for layer in plan.layers() {
        debug!("{} layer {}", layer.kind, layer.short_hash());
    }

    let progress = BuildProgress::new(ctx, &plan.image_tag());
    let result = build_image(
        runtime,
        &plan,
        BuildOptions { no_cache },
        &|line| progress.on_line(line),
    )
    .await;
    let cached_steps = progress.finish();

    if let Ok(ref outcome) = result {
        if !outcome.was_cached && cached_steps > 0 {
            ui::remark(ctx, &format!("{} step(s) reused from the layer cache", cached_steps));
        }
    }

    result
}
