#![forbid(unsafe_code)]
//! Script analysis: scan a script and its local imports for plugin
//! dependencies and `use k6` version directives (§4.2).
//!
//! Nothing here resolves a dependency name to a source module; that's
//! `k6box-resolver`'s job. This crate only knows how to read scripts and
//! build up the `Dependencies` set the resolver consumes.

pub mod analyser;
pub mod dependency;
pub mod error;

pub use analyser::{analyse, FsOpener, ScriptOpener};
pub use dependency::{Dependencies, Dependency};
pub use error::DepsError;
