//! Process launcher
//!
//! Runs as the container's entrypoint: resolves `PORT` and friends once,
//! then becomes the ASGI server process.

pub mod app_ref;
pub mod command;
pub mod env;
pub mod launcher;

pub use app_ref::AppRef;
pub use command::ServerCommand;
pub use env::LaunchEnv;
pub use launcher::{preflight_bind, LaunchState, Launcher};
