//! Server command construction

use crate::config::schema::LaunchConfig;
use crate::launch::env::{LaunchEnv, PORT_VAR, UNBUFFERED_VAR};
use std::collections::BTreeMap;
use std::fmt;

/// The server process the launcher becomes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Set on top of the inherited environment
    pub env: BTreeMap<String, String>,
}

impl ServerCommand {
    /// `<server> <app> --host <host> --port <port> [--workers N] [extra args]`
    pub fn build(env: &LaunchEnv, config: &LaunchConfig) -> Self {
        let mut args = vec![
            env.app.to_string(),
            "--host".to_string(),
            env.host.clone(),
            "--port".to_string(),
            env.port.to_string(),
        ];

        if let Some(workers) = env.workers {
            args.push("--workers".to_string());
            args.push(workers.to_string());
        }

        args.extend(config.args.iter().cloned());

        let mut overrides = BTreeMap::new();
        overrides.insert(UNBUFFERED_VAR.to_string(), "1".to_string());
        overrides.insert(PORT_VAR.to_string(), env.port.to_string());

        Self {
            program: config.server.clone(),
            args,
            env: overrides,
        }
    }

    /// A `std::process::Command` ready to spawn or exec
    pub fn to_command(&self) -> std::process::Command {
        let mut cmd = std::process::Command::new(&self.program);
        cmd.args(&self.args).envs(&self.env);
        cmd
    }
}

impl fmt::Display for ServerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}
