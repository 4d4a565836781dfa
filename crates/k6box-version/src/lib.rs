#![forbid(unsafe_code)]
//! Version, constraint, and identity types shared by every other crate in
//! the workspace.
//!
//! Nothing here knows about scripts, registries, or builders; it only knows
//! how to parse, compare, and format the handful of small grammars the rest
//! of the launcher is built on.

pub mod artifact;
pub mod canonical;
pub mod constraint;
pub mod error;
pub mod module;
pub mod platform;
pub mod version;

pub use artifact::Artifact;
pub use constraint::Constraint;
pub use error::VersionError;
pub use module::{Module, Modules};
pub use platform::{Arch, Os, Platform};
pub use version::Version;
