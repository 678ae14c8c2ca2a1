//! UI module for consistent CLI output
//!
//! Uses `cliclack` step logging and spinners in a terminal, with
//! automatic fallback to plain output in CI/non-interactive environments.
//!
//! # Example
//!
//! ```rust,ignore
//! use berth::ui::{self, UiContext, TaskSpinner};
//!
//! let ctx = UiContext::detect();
//!
//! let mut spinner = TaskSpinner::new(&ctx);
//! spinner.start("Checking podman...");
//! // ... do work ...
//! spinner.stop("podman ready");
//!
//! ui::step_ok_detail(&ctx, "Image built", "berth-app:3f2a9c1d0b7e");
//! ```

mod context;
mod output;
mod progress;
mod theme;

pub use context::UiContext;
pub use output::{intro, key_value, remark, step_info, step_ok, step_ok_detail, step_warn};
pub use progress::{BuildProgress, TaskSpinner};
pub use theme::{init_theme, BerthTheme};
