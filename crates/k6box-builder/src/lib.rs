#![forbid(unsafe_code)]
//! Build orchestration (§4.6, §4.7): turn a resolved module set into host
//! binary bytes via one of three interchangeable engines, plus the cache
//! probe that lets an existing binary stand in for a fresh build.

pub mod builder;
pub mod container;
pub mod context;
pub mod error;
pub mod factory;
pub mod native;
pub mod preload;
pub mod probe;
pub mod service;

pub use builder::{Builder, EngineKind};
pub use context::{BuildContext, Replacement};
pub use error::BuilderError;
pub use factory::{new_builder, EngineSelection};
pub use preload::preload;
pub use probe::{enrich_from_probe, probe};
