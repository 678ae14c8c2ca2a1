//! Run command - start the image as a detached service

use crate::cli::args::RunArgs;
use crate::cli::commands::build::build_project;
use crate::config::Config;
use crate::deploy::{Deployment, DeploymentManager, DeploymentStatus};
use crate::error::{BerthError, BerthResult};
use crate::launch::env::PORT_VAR;
use crate::launch::LaunchEnv;
use crate::orchestration::{create_runtime, ContainerConfig, ContainerRuntime, PortMapping};
use crate::ui::{self, TaskSpinner, UiContext};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, warn};

/// Label identifying containers started by berth
const MANAGED_LABEL: &str = "io.berth.deployment";

/// Execute the run command
pub async fn execute(args: RunArgs, config: &Config, project_dir: &Path) -> BerthResult<()> {
    let ctx = UiContext::detect();
    let runtime = create_runtime(config)?;
    debug!("Using runtime: {}", runtime.runtime_name());

    // Container names cannot hold registry paths
    let name = args.name.clone().unwrap_or_else(|| {
        config
            .image
            .name
            .rsplit('/')
            .next()
            .unwrap_or(&config.image.name)
            .to_string()
    });
    let manager = DeploymentManager::new().await?;
    clear_stale(&manager, runtime.as_ref(), &name).await?;

    let outcome = build_project(&ctx, runtime.as_ref(), config, project_dir, args.no_cache).await?;

    let container_config = container_config(&args, config, &name, &outcome.image_tag)?;
    let (host_port, container_port) = container_config
        .ports
        .first()
        .map(|p| (p.host, p.container))
        .unwrap_or((config.launch.port, config.launch.port));

    let deployment = Deployment::new(
        name.clone(),
        project_dir.to_path_buf(),
        outcome.image_tag.clone(),
        host_port,
        container_port,
    );
    manager.create(&deployment).await?;

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start("Starting container...");

    let container_id = match runtime.run(&container_config).await {
        Ok(id) => id,
        Err(e) => {
            spinner.stop_error("Container failed to start");
            manager.update_status(&name, DeploymentStatus::Failed).await?;
            return Err(e);
        }
    };

    manager.set_container_id(&name, &container_id).await?;
    manager.update_status(&name, DeploymentStatus::Running).await?;

    let short_id = &container_id[..container_id.len().min(12)];
    spinner.stop(&format!("Deployment {} started (container: {})", name, short_id));

    ui::key_value(&ctx, "Listening", &format!("http://localhost:{}", host_port));
    ui::remark(&ctx, &format!("Logs: berth logs {}", name));
    ui::remark(&ctx, &format!("Stop: berth stop {}", name));

    Ok(())
}

/// Remove the container of an inactive record that reuses `name`
async fn clear_stale(
    manager: &DeploymentManager,
    runtime: &dyn ContainerRuntime,
    name: &str,
) -> BerthResult<()> {
    if let Some(existing) = manager.get(name).await? {
        if existing.status.is_active() {
            return Err(BerthError::DeploymentExists(name.to_string()));
        }
        if let Some(container_id) = existing.container_id {
            if let Err(e) = runtime.remove(&container_id).await {
                warn!("Could not remove old container {}: {}", container_id, e);
            }
        }
    }
    Ok(())
}

fn container_config(
    args: &RunArgs,
    config: &Config,
    name: &str,
    image_tag: &str,
) -> BerthResult<ContainerConfig> {
    let overrides: HashMap<String, String> = args.env.iter().cloned().collect();

    // Same resolution the launcher applies inside the container
    let launch_env = LaunchEnv::resolve(&overrides, &config.launch)?;
    let container_port = launch_env.port;
    let host_port = args
        .host_port
        .or(config.runtime.host_port)
        .unwrap_or(container_port);

    let mut env: BTreeMap<String, String> = overrides.into_iter().collect();
    env.insert(PORT_VAR.to_string(), container_port.to_string());

    let mut labels = BTreeMap::new();
    labels.insert(MANAGED_LABEL.to_string(), name.to_string());

    Ok(ContainerConfig {
        image: image_tag.to_string(),
        name: name.to_string(),
        env,
        ports: vec![PortMapping {
            host: host_port,
            container: container_port,
        }],
        stop_timeout_secs: config.runtime.grace_period_secs,
        labels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(env: &[(&str, &str)], host_port: Option<u16>) -> RunArgs {
        RunArgs {
            name: None,
            host_port,
            env: env
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            no_cache: false,
        }
    }

    #[test]
    fn default_ports_follow_launch_port() {
        let config = Config::default();
        let cc = container_config(&run_args(&[], None), &config, "web", "berth-app:abc").unwrap();

        assert_eq!(cc.ports, vec![PortMapping { host: 8080, container: 8080 }]);
        assert_eq!(cc.env.get("PORT").map(String::as_str), Some("8080"));
        assert_eq!(cc.stop_timeout_secs, 10);
        assert_eq!(cc.labels.get(MANAGED_LABEL).map(String::as_str), Some("web"));
    }

    #[test]
    fn port_override_moves_container_port() {
        let config = Config::default();
        let cc = container_config(
            &run_args(&[("PORT", "9090")], Some(80)),
            &config,
            "web",
            "berth-app:abc",
        )
        .unwrap();

        assert_eq!(cc.ports, vec![PortMapping { host: 80, container: 9090 }]);
        assert_eq!(cc.env.get("PORT").map(String::as_str), Some("9090"));
    }

    #[test]
    fn configured_host_port_used() {
        let mut config = Config::default();
        config.runtime.host_port = Some(3000);
        let cc = container_config(&run_args(&[], None), &config, "web", "img:1").unwrap();
        assert_eq!(cc.ports[0].host, 3000);
    }

    #[test]
    fn invalid_port_rejected_before_start() {
        let err = container_config(
            &run_args(&[("PORT", "http")], None),
            &Config::default(),
            "web",
            "img:1",
        )
        .unwrap_err();
        assert!(matches!(err, BerthError::InvalidPort(_)));
    }
}
