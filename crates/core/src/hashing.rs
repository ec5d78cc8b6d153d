//! SHA-256 hex digests for note fingerprints.
//!
//! The fingerprint is what gets anchored on-chain in place of the full
//! note body, so it must be stable for identical title/content pairs.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Fingerprint a note from its title and content.
///
/// The two fields are joined with a NUL separator so that moving text
/// between title and content changes the digest.
pub fn note_fingerprint(title: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_produces_known_hash() {
        let hash = sha256_hex(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn fingerprint_is_stable() {
        let a = note_fingerprint("Hello", "world");
        assert_eq!(a, note_fingerprint("Hello", "world"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_separates_fields() {
        assert_ne!(
            note_fingerprint("ab", "c"),
            note_fingerprint("a", "bc"),
        );
    }
}
