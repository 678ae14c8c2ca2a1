//! Runtime environment resolution
//!
//! The launcher reads the process environment exactly once, into an
//! explicit map, and resolves it into a [`LaunchEnv`] that is passed by
//! reference from then on.

use crate::config::schema::LaunchConfig;
use crate::error::{BerthError, BerthResult};
use crate::launch::app_ref::AppRef;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Overrides the listening port
pub const PORT_VAR: &str = "PORT";

/// Overrides the bind interface
pub const HOST_VAR: &str = "HOST";

/// Overrides the application reference
pub const APP_MODULE_VAR: &str = "APP_MODULE";

/// Optional server worker count
pub const WORKERS_VAR: &str = "WEB_CONCURRENCY";

/// Forces unbuffered Python output
pub const UNBUFFERED_VAR: &str = "PYTHONUNBUFFERED";

/// Resolved, read-only launch environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchEnv {
    pub host: String,
    pub port: u16,
    pub app: AppRef,
    pub workers: Option<u32>,
}

impl LaunchEnv {
    /// Snapshot the current process environment
    pub fn capture() -> HashMap<String, String> {
        std::env::vars().collect()
    }

    /// Resolve from an environment snapshot, falling back to config
    pub fn resolve(vars: &HashMap<String, String>, config: &LaunchConfig) -> BerthResult<Self> {
        let port = match non_empty(vars, PORT_VAR) {
            Some(raw) => parse_port(raw)?,
            None => config.port,
        };
        if port == 0 {
            return Err(BerthError::InvalidPort("0".to_string()));
        }

        let host = non_empty(vars, HOST_VAR)
            .unwrap_or(&config.host)
            .to_string();

        let app = AppRef::parse(non_empty(vars, APP_MODULE_VAR).unwrap_or(&config.app))?;

        let workers = non_empty(vars, WORKERS_VAR).and_then(|raw| match raw.parse::<u32>() {
            Ok(n) if n > 0 => Some(n),
            _ => {
                warn!("Ignoring invalid {}={:?}", WORKERS_VAR, raw);
                None
            }
        });

        let env = Self {
            host,
            port,
            app,
            workers,
        };
        debug!("Resolved launch environment: {:?}", env);
        Ok(env)
    }

    /// `host:port` as the server will bind it
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn non_empty<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn parse_port(raw: &str) -> BerthResult<u16> {
    match raw.parse::<u16>() {
        Ok(0) | Err(_) => Err(BerthError::InvalidPort(raw.to_string())),
        Ok(port) => Ok(port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn port_defaults_to_8080() {
        let env = LaunchEnv::resolve(&vars(&[]), &LaunchConfig::default()).unwrap();
        assert_eq!(env.port, 8080);
        assert_eq!(env.host, "0.0.0.0");
        assert_eq!(env.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn port_from_env() {
        let env = LaunchEnv::resolve(&vars(&[("PORT", "9090")]), &LaunchConfig::default()).unwrap();
        assert_eq!(env.port, 9090);
    }

    #[test]
    fn empty_port_means_unset() {
        let env = LaunchEnv::resolve(&vars(&[("PORT", " ")]), &LaunchConfig::default()).unwrap();
        assert_eq!(env.port, 8080);
    }

    #[test]
    fn invalid_port_is_fatal() {
        for bad in ["http", "0", "65536", "-1"] {
            let err = LaunchEnv::resolve(&vars(&[("PORT", bad)]), &LaunchConfig::default())
                .unwrap_err();
            assert!(matches!(err, BerthError::InvalidPort(_)), "{}", bad);
        }
    }

    #[test]
    fn app_module_override() {
        let env = LaunchEnv::resolve(
            &vars(&[("APP_MODULE", "api.main:app")]),
            &LaunchConfig::default(),
        )
        .unwrap();
        assert_eq!(env.app.to_string(), "api.main:app");

        let err = LaunchEnv::resolve(&vars(&[("APP_MODULE", "main")]), &LaunchConfig::default())
            .unwrap_err();
        assert!(matches!(err, BerthError::InvalidAppRef { .. }));
    }

    #[test]
    fn workers_ignored_when_invalid() {
        let config = LaunchConfig::default();
        let env = LaunchEnv::resolve(&vars(&[("WEB_CONCURRENCY", "4")]), &config).unwrap();
        assert_eq!(env.workers, Some(4));

        let env = LaunchEnv::resolve(&vars(&[("WEB_CONCURRENCY", "lots")]), &config).unwrap();
        assert_eq!(env.workers, None);
    }

    #[test]
    fn ipv6_bind_addr() {
        let env = LaunchEnv::resolve(&vars(&[("HOST", "::")]), &LaunchConfig::default()).unwrap();
        assert_eq!(env.bind_addr(), "[::]:8080");
    }

    #[test]
    #[serial_test::serial]
    fn capture_snapshots_process_env() {
        std::env::set_var("PORT", "9090");
        let snapshot = LaunchEnv::capture();
        std::env::remove_var("PORT");

        // Later changes to the process env do not leak into the snapshot
        let env = LaunchEnv::resolve(&snapshot, &LaunchConfig::default()).unwrap();
        assert_eq!(env.port, 9090);
    }
}
