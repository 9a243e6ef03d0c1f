use sha2::{Digest, Sha256};

use crate::entities::SiteId;

/// Deterministic content fingerprint of a (site, path) pair.
///
/// Doubles as the cache key suffix and the store uniqueness constraint. The
/// path is expected to be canonical already; fingerprinting does not
/// normalize.
pub fn fingerprint(site: SiteId, path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(site.0.to_string().as_bytes());
    hasher.update(path.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        assert_eq!(
            fingerprint(SiteId(1), "/test_path"),
            fingerprint(SiteId(1), "/test_path")
        );
    }

    #[test]
    fn test_varies_by_site_and_path() {
        let base = fingerprint(SiteId(1), "/test_path");
        assert_ne!(base, fingerprint(SiteId(2), "/test_path"));
        assert_ne!(base, fingerprint(SiteId(1), "/other_path"));
    }

    #[test]
    fn test_hex_shape() {
        let digest = fingerprint(SiteId(1), "/");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
