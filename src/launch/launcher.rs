//! Container entrypoint
//!
//! The launcher resolves the environment, optionally probes the port, and
//! then replaces itself with the server via `execvp`. It never forks and
//! waits: after exec the server *is* the container's primary process, so
//! SIGTERM/SIGINT from the engine reach it directly and draining and
//! termination are the server's own business.
//!
//! ```text
//! Created -> ResolvingEnv -> Binding -> Serving (exec) -> Draining -> Terminated
//!               |              |          |
//!               +--------------+----------+--> Terminated (non-zero exit)
//! ```

use crate::config::schema::LaunchConfig;
use crate::error::{BerthError, BerthResult};
use crate::launch::command::ServerCommand;
use crate::launch::env::LaunchEnv;
use std::collections::HashMap;
use std::io::Write;
use std::net::TcpListener;
use tracing::{debug, info};

/// Launcher lifecycle, up to the point the server takes over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    Created,
    ResolvingEnv,
    Binding,
    Serving,
    /// Owned by the server after exec; entered on SIGTERM/SIGINT
    Draining,
    Terminated,
}

/// Single-shot entrypoint for the server process
#[derive(Debug)]
pub struct Launcher<'a> {
    config: &'a LaunchConfig,
    state: LaunchState,
}

impl<'a> Launcher<'a> {
    pub fn new(config: &'a LaunchConfig) -> Self {
        Self {
            config,
            state: LaunchState::Created,
        }
    }

    pub fn state(&self) -> LaunchState {
        self.state
    }

    fn transition(&mut self, next: LaunchState) {
        debug!("Launcher {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Resolve the environment and check the port.
    ///
    /// Any failure is start-fatal and leaves the launcher `Terminated`.
    pub fn prepare(&mut self, vars: &HashMap<String, String>) -> BerthResult<ServerCommand> {
        self.transition(LaunchState::ResolvingEnv);
        let env = match LaunchEnv::resolve(vars, self.config) {
            Ok(env) => env,
            Err(e) => return Err(self.fail(e)),
        };

        self.transition(LaunchState::Binding);
        if self.config.preflight_bind {
            if let Err(e) = preflight_bind(&env) {
                return Err(self.fail(e));
            }
        }

        Ok(ServerCommand::build(&env, self.config))
    }

    /// Replace the current process with the server.
    ///
    /// Only returns if exec itself failed.
    pub fn exec(&mut self, command: &ServerCommand) -> BerthError {
        self.transition(LaunchState::Serving);
        info!("Starting server: {}", command);

        // Nothing buffered may be lost when the image is replaced
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();

        let err = exec_replace(command);
        self.fail(err)
    }

    fn fail(&mut self, err: BerthError) -> BerthError {
        debug!("Launch failed: {}", err);
        self.transition(LaunchState::Terminated);
        err
    }
}

/// Bind and immediately release the server's address.
///
/// Surfaces "address in use" and "permission denied" before exec, with the
/// probe socket closed again by the time the server binds.
pub fn preflight_bind(env: &LaunchEnv) -> BerthResult<()> {
    let addr = env.bind_addr();
    match TcpListener::bind((env.host.as_str(), env.port)) {
        Ok(listener) => {
            drop(listener);
            debug!("Port check passed for {}", addr);
            Ok(())
        }
        Err(source) => Err(BerthError::BindFailed { addr, source }),
    }
}

#[cfg(unix)]
fn exec_replace(command: &ServerCommand) -> BerthError {
    use std::os::unix::process::CommandExt;

    let source = command.to_command().exec();
    BerthError::ExecFailed {
        program: command.program.clone(),
        source,
    }
}

#[cfg(not(unix))]
fn exec_replace(_command: &ServerCommand) -> BerthError {
    BerthError::ExecUnsupported
}
