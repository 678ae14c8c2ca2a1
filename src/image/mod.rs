//! Layered image builder
//!
//! An image is planned as four content-addressed layers (base runtime, OS
//! packages, language dependencies, application source) and built through
//! the configured container engine. Source-only edits leave the
//! dependency layer, and with it the engine's cached install, untouched.

pub mod build;
pub mod layer;
pub mod manifest;
pub mod plan;
pub mod source;

pub use build::{build_image, BuildOptions, BuildOutcome};
pub use layer::{Layer, LayerKind};
pub use manifest::{Dependency, DependencyManifest};
pub use plan::{BuildInputs, BuildPlan};
pub use source::SourceTree;
