//! Admin-key authentication: constant-time
//! comparison, fail-closed if the key is unconfigured or the header is
//! absent — even when the configured key is the empty string.

use crate::api::error::ApiError;

pub fn verify_admin_key(configured_key: Option<&str>, provided_header: Option<&str>) -> Result<(), ApiError> {
    let (Some(configured), Some(provided)) = (configured_key, provided_header) else {
        return Err(ApiError::auth_failed());
    };

    if constant_time_eq(configured.as_bytes(), provided.as_bytes()) {
        Ok(())
    } else {
        Err(ApiError::auth_failed())
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_when_key_unconfigured() {
        assert!(verify_admin_key(None, Some("anything")).is_err());
    }

    #[test]
    fn rejects_when_header_absent_even_if_configured_key_is_empty() {
        assert!(verify_admin_key(Some(""), None).is_err());
    }

    #[test]
    fn accepts_matching_key() {
        assert!(verify_admin_key(Some("secret"), Some("secret")).is_ok());
    }

    #[test]
    fn rejects_mismatched_key() {
        assert!(verify_admin_key(Some("secret"), Some("wrong")).is_err());
    }

    #[test]
    fn constant_time_eq_rejects_different_lengths() {
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
