//! Path-to-key codec.
//!
//! Backend keys are the hex expansion of a path's UTF-8 bytes, two lowercase
//! digits per byte. The expansion is injective, never produces characters a
//! backend could reserve, and `decode(encode(p)) == p` for every path.
//! Encoding also preserves prefixes: if `a` is a path prefix of `b`, then
//! `encode(a)` is a string prefix of `encode(b)`, which is what makes
//! existence probes and directory listings by key prefix work.

use thiserror::Error;

/// Every relative path is resolved against this fixed directory; there is no
/// real working-directory tracking in this layer.
pub const FAKE_CWD: &str = "/fake_cwd";

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("decoded key is not utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Resolve a caller-supplied path to an absolute one.
pub fn absolute(pathname: &str) -> String {
    if pathname.starts_with('/') {
        pathname.to_string()
    } else {
        format!("{FAKE_CWD}/{pathname}")
    }
}

/// Render a path as a backend key. Total: never fails for any `&str`.
pub fn encode(path: &str) -> String {
    hex::encode(path.as_bytes())
}

/// Exact inverse of [`encode`]. Fails on keys this codec did not produce.
pub fn decode(key: &str) -> Result<String, KeyError> {
    Ok(String::from_utf8(hex::decode(key)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        for p in ["/a.txt", "", "/", "/fake_cwd/nested/deep.bin", "/данные/ファイル.txt"] {
            assert_eq!(decode(&encode(p)).unwrap(), p);
        }
    }

    #[test]
    fn test_encode_is_lowercase_hex_only() {
        let key = encode("/Ab9/Ж");
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(!key.contains('/'));
    }

    #[test]
    fn test_distinct_paths_distinct_keys() {
        assert_ne!(encode("/a"), encode("/b"));
        assert_ne!(encode("/ab"), encode("/a/b"));
    }

    #[test]
    fn test_prefix_preservation() {
        assert!(encode("/dir/file").starts_with(&encode("/dir/")));
    }

    #[test]
    fn test_relative_paths_resolve_against_fake_cwd() {
        assert_eq!(absolute("notes.txt"), "/fake_cwd/notes.txt");
        assert_eq!(absolute("/notes.txt"), "/notes.txt");
    }

    #[test]
    fn test_decode_rejects_foreign_keys() {
        assert!(decode("zz").is_err());
        assert!(decode("2f6").is_err()); // odd length
        assert!(decode("ff").is_err()); // not utf-8
    }
}
