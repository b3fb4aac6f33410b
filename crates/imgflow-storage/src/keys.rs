//! Key validation and URL building shared by all backends.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::traits::{StorageError, StorageResult};

/// Characters left as-is in a URL path segment (RFC 3986 unreserved)
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Reject keys that are empty, absolute, or have a `..` segment.
///
/// Dots inside a segment (`a..b.jpg`) are fine; notification parsing applies the same rule.
pub fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if storage_key.starts_with('/') || storage_key.split('/').any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// `{base}/{key}` with each key segment percent-encoded.
pub fn join_url(base_url: &str, storage_key: &str) -> String {
    let encoded: Vec<String> = storage_key
        .split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect();
    format!("{}/{}", base_url.trim_end_matches('/'), encoded.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("u1/170000-abcde.jpg").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/etc/passwd").is_err());
        assert!(validate_key("u1/../../etc").is_err());
        assert!(validate_key("..").is_err());
        assert!(validate_key("u1/..").is_err());
    }

    #[test]
    fn test_validate_key_allows_dots_within_segments() {
        assert!(validate_key("u1/a..b.jpg").is_ok());
        assert!(validate_key("a..b/170000-abcde.png").is_ok());
        assert!(validate_key("u1/a..b_thumb_150.jpg").is_ok());
    }

    #[test]
    fn test_join_url_encodes_segments() {
        assert_eq!(
            join_url("https://cdn.example.com/", "u1/a.jpg"),
            "https://cdn.example.com/u1/a.jpg"
        );
        assert_eq!(
            join_url("https://cdn.example.com", "u1/my photo+1.jpg"),
            "https://cdn.example.com/u1/my%20photo%2B1.jpg"
        );
    }
}
