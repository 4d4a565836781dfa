//! Preload (§4.7.4): warm build caches by driving a builder once per
//! platform with the output discarded, using the same bounded-rayon
//! fan-out the release finder uses for concurrent tag lookups.

use k6box_version::{Modules, Platform};

use crate::builder::{Builder, EngineKind};
use crate::context::BuildContext;
use crate::error::BuilderError;

use rayon::prelude::*;

/// Drive `builder` once per entry in `platforms`, discarding each
/// build's output. Errors from individual platforms are collected
/// rather than short-circuiting, so one unsupported combination doesn't
/// hide results for the others.
///
/// # Errors
/// Returns [`BuilderError::PreloadUnsupportedByService`] immediately if
/// `builder` is the service engine (§4.7.4 "forbidden with the service
/// engine"); otherwise returns the first per-platform error, if any,
/// after every platform has been attempted.
pub fn preload(builder: &dyn Builder, modules: &Modules, platforms: &[Platform]) -> Result<(), BuilderError> {
    if builder.engine() == EngineKind::Service {
        return Err(BuilderError::PreloadUnsupportedByService);
    }

    let results: Vec<Result<(), BuilderError>> = platforms
        .par_iter()
        .map(|platform| {
            let ctx = BuildContext::new().with_platform(*platform);
            let mut sink = std::io::sink();
            builder.build(&ctx, modules, &mut sink)
        })
        .collect();

    results.into_iter().find(Result::is_err).unwrap_or(Ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuilderError;
    use std::io::Write;

    struct StubServiceEngine;

    impl Builder for StubServiceEngine {
        fn engine(&self) -> EngineKind {
            EngineKind::Service
        }
        fn build(&self, _ctx: &BuildContext, _modules: &Modules, _sink: &mut dyn Write) -> Result<(), BuilderError> {
            unreachable!("preload must reject the service engine before calling build")
        }
    }

    struct StubFailingEngine;

    impl Builder for StubFailingEngine {
        fn engine(&self) -> EngineKind {
            EngineKind::Native
        }
        fn build(&self, _ctx: &BuildContext, _modules: &Modules, _sink: &mut dyn Write) -> Result<(), BuilderError> {
            Err(BuilderError::ToolchainFailed {
                message: "stub failure".to_owned(),
            })
        }
    }

    #[test]
    fn rejects_service_engine_outright() {
        let err = preload(&StubServiceEngine, &Modules::new(), &[Platform::new("linux", "amd64").unwrap()])
            .unwrap_err();
        assert!(matches!(err, BuilderError::PreloadUnsupportedByService));
    }

    #[test]
    fn surfaces_per_platform_failures() {
        let platforms = vec![
            Platform::new("linux", "amd64").unwrap(),
            Platform::new("darwin", "arm64").unwrap(),
        ];
        let err = preload(&StubFailingEngine, &Modules::new(), &platforms).unwrap_err();
        assert!(matches!(err, BuilderError::ToolchainFailed { .. }));
    }

    #[test]
    fn empty_platform_list_is_a_no_op() {
        let result = preload(&StubFailingEngine, &Modules::new(), &[]);
        assert!(result.is_ok());
    }
}
