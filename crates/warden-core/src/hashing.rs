//! Shared SHA-256 helpers used by both the content store (validating
//! uploaded blobs) and the canonicalizer (hashing warning-line text).

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 digest of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex_encode(&digest)
}

/// Lowercase hex SHA-256 digest of a UTF-8 string, after trimming and
/// collapsing internal whitespace runs to a single space.
pub fn sha256_hex_normalized(text: &str) -> String {
    sha256_hex(normalize_whitespace(text).as_bytes())
}

/// Trim the string and collapse runs of whitespace to a single space —
/// the normalization the canonicalizer applies to warning-line text before
/// folding it into the stable report hash.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize_whitespace("  a   b\tc\n"), "a b c");
    }

    #[test]
    fn sha256_is_stable() {
        assert_eq!(sha256_hex(b"hello"), sha256_hex(b"hello"));
        assert_ne!(sha256_hex(b"hello"), sha256_hex(b"world"));
    }

    #[test]
    fn normalized_hash_ignores_whitespace_changes() {
        let a = sha256_hex_normalized("int   x = 1;");
        let b = sha256_hex_normalized("int x = 1;");
        assert_eq!(a, b);
    }
}
