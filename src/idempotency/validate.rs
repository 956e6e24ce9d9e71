//! Idempotency key validation.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_KEY_NAMESPACES;
use crate::error::GuardError;

/// Longest key accepted, in characters.
pub const MAX_KEY_LENGTH: usize = 255;

/// Length of a content hash key in hex characters.
pub const CONTENT_HASH_LENGTH: usize = 64;

/// The recognized shape of a valid key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyFormat {
    /// 64 hexadecimal characters.
    ContentHash,
    /// Canonical hyphenated UUID.
    Uuid,
    /// `namespace:...` with a known namespace prefix.
    Namespaced,
    /// Any other string over `[A-Za-z0-9_:-]`.
    Generic,
}

impl KeyFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyFormat::ContentHash => "content_hash",
            KeyFormat::Uuid => "uuid",
            KeyFormat::Namespaced => "namespaced",
            KeyFormat::Generic => "generic",
        }
    }
}

/// Returns true for characters allowed anywhere in a key.
#[inline]
pub(crate) fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':')
}

/// Validates `key` and classifies it.
///
/// A key is valid when it is non-empty, at most [`MAX_KEY_LENGTH`]
/// characters, and made only of `[A-Za-z0-9_:-]`. `known_namespaces` only
/// affects classification, never acceptance.
pub fn validate_key<S: AsRef<str>>(
    key: &str,
    known_namespaces: &[S],
) -> Result<KeyFormat, GuardError> {
    if key.is_empty() {
        return Err(GuardError::validation("idempotency key is empty"));
    }

    let length = key.chars().count();
    if length > MAX_KEY_LENGTH {
        return Err(GuardError::validation(format!(
            "idempotency key is {} characters, maximum is {}",
            length, MAX_KEY_LENGTH
        )));
    }

    if length == CONTENT_HASH_LENGTH && key.chars().all(|c| c.is_ascii_hexdigit()) {
        return Ok(KeyFormat::ContentHash);
    }

    // try_parse also accepts the simple, braced and urn forms; only the
    // 36-character hyphenated form counts.
    if length == 36 && uuid::Uuid::try_parse(key).is_ok() {
        return Ok(KeyFormat::Uuid);
    }

    if let Some((position, c)) = key.chars().enumerate().find(|(_, c)| !is_key_char(*c)) {
        return Err(GuardError::validation(format!(
            "idempotency key contains invalid character {:?} at position {}",
            c, position
        )));
    }

    if let Some((namespace, rest)) = key.split_once(':') {
        let known = known_namespaces.iter().any(|ns| ns.as_ref() == namespace);
        if known && !rest.split(':').any(str::is_empty) {
            return Ok(KeyFormat::Namespaced);
        }
    }

    Ok(KeyFormat::Generic)
}

/// Validates `key` against the default namespace list.
pub fn validate(key: &str) -> Result<KeyFormat, GuardError> {
    validate_key(key, DEFAULT_KEY_NAMESPACES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_fails() {
        let err = validate("").unwrap_err();
        assert!(matches!(err, GuardError::Validation { .. }));
    }

    #[test]
    fn test_namespaced_key() {
        assert_eq!(
            validate("order:user123:default-checkout").unwrap(),
            KeyFormat::Namespaced
        );
        // Unknown prefix is still acceptable, just generic.
        assert_eq!(validate("widget:7").unwrap(), KeyFormat::Generic);
        // Known prefix with an empty segment is not namespaced.
        assert_eq!(validate("order::7").unwrap(), KeyFormat::Generic);
    }

    #[test]
    fn test_custom_namespaces() {
        assert_eq!(
            validate_key("widget:7", &["widget"]).unwrap(),
            KeyFormat::Namespaced
        );
    }

    #[test]
    fn test_invalid_characters_fail() {
        let err = validate("not valid!!").unwrap_err();
        assert!(err.to_string().contains("position 3"));
        assert!(validate("café").is_err());
    }

    #[test]
    fn test_content_hash_and_uuid() {
        let hash = "a".repeat(64);
        assert_eq!(validate(&hash).unwrap(), KeyFormat::ContentHash);
        assert_eq!(
            validate("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap(),
            KeyFormat::Uuid
        );
        // Simple form is not a canonical UUID.
        assert_eq!(
            validate("67e5504410b1426f9247bb680e5fe0c8").unwrap(),
            KeyFormat::Generic
        );
        // 63 hex characters is just a generic key.
        assert_eq!(validate(&"b".repeat(63)).unwrap(), KeyFormat::Generic);
    }

    #[test]
    fn test_length_limit() {
        assert!(validate(&"k".repeat(MAX_KEY_LENGTH)).is_ok());
        assert!(validate(&"k".repeat(MAX_KEY_LENGTH + 1)).is_err());
    }
}
