//! The `Builder` contract (§4.7): one narrow `build` operation plus an
//! `engine()` tag, implemented identically by all three engines so the
//! launcher, the preloader, and the service handler can consume whichever
//! one the factory selected without caring which it is (§9 "Builder
//! composition vs. inheritance").

use std::fmt;
use std::io::Write;

use k6box_version::Modules;

use crate::context::BuildContext;
use crate::error::BuilderError;

/// Which concrete engine produced (or will produce) an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Native,
    Container,
    Service,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineKind::Native => "native",
            EngineKind::Container => "container",
            EngineKind::Service => "service",
        };
        f.write_str(s)
    }
}

/// A build backend capable of turning a resolved `Modules` set into host
/// binary bytes, streamed into `sink`. Three implementations exist
/// (`NativeEngine`, `ContainerEngine`, `ServiceEngine`); callers never
/// match on which one they hold.
pub trait Builder: Send + Sync {
    fn engine(&self) -> EngineKind;

    /// Compile `modules` for the platform carried in `ctx` (or the host
    /// platform if none was set) and write the resulting executable
    /// bytes to `sink`.
    ///
    /// # Errors
    /// Returns a [`BuilderError`] variant appropriate to the concrete
    /// engine: toolchain failure, container step failure, or service
    /// non-2xx response.
    fn build(&self, ctx: &BuildContext, modules: &Modules, sink: &mut dyn Write) -> Result<(), BuilderError>;
}
