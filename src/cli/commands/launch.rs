//! Launch command - container entrypoint
//!
//! Runs without a tokio runtime: nothing may be in flight when the
//! process image is replaced.

use crate::cli::args::LaunchArgs;
use crate::config::Config;
use crate::error::BerthResult;
use crate::launch::{LaunchEnv, Launcher};

/// Execute the launch command.
///
/// Returns only on failure, or after printing the command in dry-run mode.
pub fn execute(args: LaunchArgs, config: &Config) -> BerthResult<()> {
    let vars = LaunchEnv::capture();
    let mut launcher = Launcher::new(&config.launch);
    let command = launcher.prepare(&vars)?;

    if args.dry_run {
        println!("{}", command);
        return Ok(());
    }

    Err(launcher.exec(&command))
}
