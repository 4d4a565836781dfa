#![forbid(unsafe_code)]
//! Dependency resolution: a remote extension registry, a per-module
//! release finder, and a resolver that composes them into a single
//! `deps -> modules` transform (§4.3-§4.5).

pub mod auth;
pub mod error;
pub mod http_cache;
pub mod registry;
pub mod release;
pub mod resolver;

pub use error::ResolverError;
pub use registry::{ExtensionType, RegistryClient, RegistryEntry, DEFAULT_CATALOG_URL, DEFAULT_FILTER};
pub use release::ReleaseFinder;
pub use resolver::{ResolveOutcome, Resolver};
