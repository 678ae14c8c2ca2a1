//! Container run configuration shared by runtime implementations

use std::collections::BTreeMap;
use std::fmt;

/// A published port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.container)
    }
}

/// Container configuration for running a service
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Image tag to run
    pub image: String,
    /// Container name
    pub name: String,
    /// Environment variables (sorted for stable argument order)
    pub env: BTreeMap<String, String>,
    /// Published ports
    pub ports: Vec<PortMapping>,
    /// Seconds the engine waits after SIGTERM on stop
    pub stop_timeout_secs: u32,
    /// Labels attached to the container
    pub labels: BTreeMap<String, String>,
}

impl ContainerConfig {
    /// Arguments for `<engine> run` after the subcommand
    pub fn run_args(&self) -> Vec<String> {
        let mut args = vec![
            "-d".to_string(),
            "--name".to_string(),
            self.name.clone(),
            "--stop-timeout".to_string(),
            self.stop_timeout_secs.to_string(),
        ];

        for port in &self.ports {
            args.push("-p".to_string());
            args.push(port.to_string());
        }

        for (k, v) in &self.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", k, v));
        }

        for (k, v) in &self.labels {
            args.push("--label".to_string());
            args.push(format!("{}={}", k, v));
        }

        args.push(self.image.clone());
        args
    }
}
