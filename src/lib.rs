//! Berth - layered images and a process launcher for ASGI services
//!
//! Plans a four-layer container image (base, OS packages, language
//! dependencies, application source) with chained content hashes, builds
//! it with podman or docker, and serves as the image's entrypoint: it
//! resolves `PORT` and replaces itself with the server process.

pub mod cli;
pub mod config;
pub mod deploy;
pub mod error;
pub mod image;
pub mod launch;
pub mod orchestration;
pub mod ui;

pub use error::{BerthError, BerthResult};
