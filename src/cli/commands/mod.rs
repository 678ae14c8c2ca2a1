//! CLI command implementations

pub mod build;
pub mod config;
pub mod init;
pub mod launch;
pub mod list;
pub mod logs;
pub mod plan;
pub mod run;
pub mod stop;

pub use build::execute as build;
pub use config::execute as config;
pub use init::execute as init;
pub use launch::execute as launch;
pub use list::execute as list;
pub use logs::execute as logs;
pub use plan::execute as plan;
pub use run::execute as run;
pub use stop::execute as stop;
