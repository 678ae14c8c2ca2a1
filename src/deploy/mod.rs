//! Deployment tracking for containers started with `berth run`

pub mod manager;
pub mod state;

pub use manager::DeploymentManager;
pub use state::{Deployment, DeploymentStatus};
