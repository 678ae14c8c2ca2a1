//! Init command - create a project berth.toml

use crate::cli::args::InitArgs;
use crate::config::CONFIG_FILE_NAME;
use crate::error::{BerthError, BerthResult};
use crate::ui::{self, UiContext};
use std::path::Path;
use tokio::fs;

/// Template for project config
const INIT_TEMPLATE: &str = r#"# Berth project configuration
# Every value below is the default; uncomment to change it.

[image]
name = "berth-app"
base = "python:3.11-slim"       # pin a tag or @sha256 digest
# workdir = "/app"
# entrypoint = "shell"          # shell: CMD exec <server>; launcher: berth launch

# [image.env]
# LOG_LEVEL = "info"

[packages]
os = ["build-essential"]        # needed to compile native wheels

[dependencies]
manifest = "requirements.txt"   # .txt, .json or .toml

[source]
# dir = "."
# exclude = ["tests", "docs"]

[launch]
app = "app:app"                 # module:callable
# server = "uvicorn"
# host = "0.0.0.0"
port = 8080                     # PORT overrides at runtime
# args = ["--proxy-headers"]
# preflight_bind = true

[runtime]
# engine = "podman"             # podman or docker
# grace_period_secs = 10
# host_port = 8080
"#;

/// Execute the init command
pub async fn execute(args: InitArgs, project_dir: &Path) -> BerthResult<()> {
    let ctx = UiContext::detect();

    let target_dir = args.path.as_deref().unwrap_or(project_dir);
    let config_path = target_dir.join(CONFIG_FILE_NAME);

    if config_path.exists() && !args.force {
        return Err(BerthError::User(format!(
            "{} already exists. Use --force to overwrite.",
            config_path.display()
        )));
    }

    ensure_dir(target_dir).await?;

    fs::write(&config_path, INIT_TEMPLATE)
        .await
        .map_err(|e| BerthError::io(format!("writing {}", config_path.display()), e))?;

    ui::step_ok_detail(
        &ctx,
        "Created project config",
        &config_path.display().to_string(),
    );

    Ok(())
}

async fn ensure_dir(dir: &Path) -> BerthResult<()> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| BerthError::io(format!("creating directory {}", dir.display()), e))?;
    }
    Ok(())
}
