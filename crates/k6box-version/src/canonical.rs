//! Canonical build-service URL path and ETag computation.
//!
//! This is "the single source of cache-key truth shared by server and
//! service client" (§4.8): both `k6box-service` (the HTTP server) and the
//! service engine client in `k6box-builder` call these free functions
//! rather than each computing their own notion of "canonical", so the two
//! can never drift apart.

use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::artifact::{canonical_list, Artifact};
use crate::platform::Platform;

/// The canonical URL path for a platform and artifact set, e.g.
/// `/linux/amd64/k6@v0.49.0,k6/x/faker@v0.3.1`.
#[must_use]
pub fn canonical_path(platform: &Platform, artifacts: &[Artifact]) -> String {
    format!("/{platform}/{}", canonical_list(artifacts))
}

/// URL-safe base64 of the SHA-256 of the canonical path. Per §8
/// "cache-key integrity", two artifact sets produce the same ETag iff
/// their canonical textual forms are byte-identical.
#[must_use]
pub fn etag(canonical_path: &str) -> String {
    let digest = Sha256::digest(canonical_path.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    fn platform() -> Platform {
        Platform::new("linux", "amd64").unwrap()
    }

    #[test]
    fn etag_is_stable_for_equal_canonical_forms() {
        let a = vec![
            Artifact::new("k6", Version::parse("0.49.0").unwrap()),
            Artifact::new("k6/x/faker", Version::parse("0.3.1").unwrap()),
        ];
        let b = vec![
            Artifact::new("k6/x/faker", Version::parse("0.3.1").unwrap()),
            Artifact::new("k6", Version::parse("0.49.0").unwrap()),
        ];
        let path_a = canonical_path(&platform(), &a);
        let path_b = canonical_path(&platform(), &b);
        assert_eq!(path_a, path_b);
        assert_eq!(etag(&path_a), etag(&path_b));
    }

    #[test]
    fn etag_differs_for_different_versions() {
        let a = vec![Artifact::new("k6", Version::parse("0.49.0").unwrap())];
        let b = vec![Artifact::new("k6", Version::parse("0.50.0").unwrap())];
        let path_a = canonical_path(&platform(), &a);
        let path_b = canonical_path(&platform(), &b);
        assert_ne!(etag(&path_a), etag(&path_b));
    }
}
