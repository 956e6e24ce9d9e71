//! Deterministic idempotency key construction.
//!
//! A key must describe the logical operation, not the attempt: the same parts
//! always produce the same key, in any process and on every replay. None of
//! the builders here read the clock, a random source or process state.
//!
//! Three shapes are available:
//!
//! - [`build_key`]: `namespace:part:part`, readable and the usual choice
//! - [`content_hash_key`]: 64 hex characters derived from a serialized payload
//! - [`uuid_key`]: a UUID-shaped key derived from namespace and parts
//!
//! # Example
//!
//! ```rust
//! use durable_guards::idempotency::build_key;
//!
//! let key = build_key("order", &["user123", "default-checkout"]).unwrap();
//! assert_eq!(key, "order:user123:default-checkout");
//!
//! // No parts: the namespace alone
//! assert_eq!(build_key::<&str>("order", &[]).unwrap(), "order");
//! ```

use std::fmt;
use std::ops::Deref;

use blake2::{Blake2b512, Digest};
use serde::{Deserialize, Serialize};

use crate::error::GuardError;
use crate::idempotency::validate::{is_key_char, validate_key, KeyFormat, MAX_KEY_LENGTH};

/// Separator between namespace and parts.
pub const KEY_SEPARATOR: char = ':';

/// An immutable, validated idempotency key. Equality is exact string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Validates `key` and wraps it.
    pub fn parse(key: impl Into<String>) -> Result<Self, GuardError> {
        let key = key.into();
        validate_key::<&str>(&key, &[])?;
        Ok(Self(key))
    }

    /// Wraps `key` without validation.
    #[inline]
    pub fn new_unchecked(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns a reference to the inner string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the inner string value.
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Classifies the key against the given namespace prefixes.
    pub fn format<S: AsRef<str>>(&self, known_namespaces: &[S]) -> KeyFormat {
        validate_key(&self.0, known_namespaces).unwrap_or(KeyFormat::Generic)
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for IdempotencyKey {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for IdempotencyKey {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for IdempotencyKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for IdempotencyKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl TryFrom<String> for IdempotencyKey {
    type Error = GuardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<IdempotencyKey> for String {
    fn from(key: IdempotencyKey) -> Self {
        key.0
    }
}

/// Builds `namespace:part1:part2:...`.
///
/// Fails with [`GuardError::KeyGeneration`] if the namespace or any part is
/// empty, contains a character outside `[A-Za-z0-9_-]` (the namespace) or
/// `[A-Za-z0-9_:-]` (parts), or if the result exceeds the maximum key length.
pub fn build_key<S: AsRef<str>>(namespace: &str, parts: &[S]) -> Result<IdempotencyKey, GuardError> {
    check_segment("namespace", namespace, false)?;
    for (i, part) in parts.iter().enumerate() {
        check_segment(&format!("part {}", i), part.as_ref(), true)?;
    }

    let mut key = String::with_capacity(
        namespace.len() + parts.iter().map(|p| p.as_ref().len() + 1).sum::<usize>(),
    );
    key.push_str(namespace);
    for part in parts {
        key.push(KEY_SEPARATOR);
        key.push_str(part.as_ref());
    }

    if key.len() > MAX_KEY_LENGTH {
        return Err(GuardError::key_generation(format!(
            "key for namespace '{}' is {} characters, maximum is {}",
            namespace,
            key.len(),
            MAX_KEY_LENGTH
        )));
    }
    Ok(IdempotencyKey(key))
}

fn check_segment(what: &str, value: &str, allow_separator: bool) -> Result<(), GuardError> {
    if value.is_empty() {
        return Err(GuardError::key_generation(format!("{} is empty", what)));
    }
    if let Some(c) = value
        .chars()
        .find(|c| !is_key_char(*c) || (!allow_separator && *c == KEY_SEPARATOR))
    {
        return Err(GuardError::key_generation(format!(
            "{} '{}' contains invalid character {:?}",
            what, value, c
        )));
    }
    Ok(())
}

/// Derives a 64-character hex key from `namespace` and the JSON form of `payload`.
///
/// The payload must serialize deterministically: use ordered maps
/// (`BTreeMap`, [`OrderedMap`](crate::OrderedMap)) rather than `HashMap`.
pub fn content_hash_key<T: Serialize + ?Sized>(
    namespace: &str,
    payload: &T,
) -> Result<IdempotencyKey, GuardError> {
    check_segment("namespace", namespace, false)?;
    let bytes = serde_json::to_vec(payload)
        .map_err(|e| GuardError::key_generation(format!("payload is not serializable: {}", e)))?;

    let mut hasher = Blake2b512::new();
    hasher.update(namespace.as_bytes());
    hasher.update([0u8]);
    hasher.update(&bytes);
    let digest = hasher.finalize();

    Ok(IdempotencyKey(hex::encode(&digest[..32])))
}

/// Derives a UUID-shaped key from `namespace` and `parts`.
///
/// Segments are length-prefixed before hashing, so `["ab", "c"]` and
/// `["a", "bc"]` produce different keys.
pub fn uuid_key<S: AsRef<str>>(namespace: &str, parts: &[S]) -> Result<IdempotencyKey, GuardError> {
    check_segment("namespace", namespace, false)?;

    let mut hasher = Blake2b512::new();
    for segment in std::iter::once(namespace).chain(parts.iter().map(|p| p.as_ref())) {
        hasher.update((segment.len() as u64).to_le_bytes());
        hasher.update(segment.as_bytes());
    }
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    let uuid = uuid::Builder::from_random_bytes(bytes).into_uuid();
    Ok(IdempotencyKey(uuid.hyphenated().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_build_key_joins_parts() {
        let key = build_key("order", &["user123", "default-checkout"]).unwrap();
        assert_eq!(key.as_str(), "order:user123:default-checkout");
    }

    #[test]
    fn test_build_key_without_parts() {
        let key = build_key::<String>("payment", &[]).unwrap();
        assert_eq!(key, "payment");
    }

    #[test]
    fn test_build_key_accepts_owned_parts() {
        let parts = vec!["u-1".to_string(), 42.to_string()];
        assert_eq!(build_key("cart", &parts).unwrap(), "cart:u-1:42");
    }

    #[test]
    fn test_build_key_rejects_bad_input() {
        assert!(matches!(
            build_key::<&str>("", &[]),
            Err(GuardError::KeyGeneration { .. })
        ));
        assert!(build_key("order", &["user123", ""]).is_err());
        assert!(build_key("order", &["user 123"]).is_err());
        assert!(build_key::<&str>("ord:er", &[]).is_err());

        let long = "x".repeat(MAX_KEY_LENGTH);
        let err = build_key("order", &[long.as_str()]).unwrap_err();
        assert!(err.to_string().contains("maximum"));
    }

    #[test]
    fn test_built_keys_validate() {
        let key = build_key("order", &["a", "b:c", "d_e-f"]).unwrap();
        assert!(IdempotencyKey::parse(key.as_str()).is_ok());
    }

    #[test]
    fn test_content_hash_key_is_stable_hex() {
        let mut payload = BTreeMap::new();
        payload.insert("amount", 4200);
        payload.insert("currency_minor", 2);

        let a = content_hash_key("charge", &payload).unwrap();
        let b = content_hash_key("charge", &payload).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a.format::<&str>(&[]), KeyFormat::ContentHash);

        let other = content_hash_key("refund", &payload).unwrap();
        assert_ne!(a, other);
    }

    #[test]
    fn test_uuid_key_is_stable_and_canonical() {
        let a = uuid_key("order", &["user123", "checkout"]).unwrap();
        let b = uuid_key("order", &["user123", "checkout"]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 36);
        assert_eq!(a.format::<&str>(&[]), KeyFormat::Uuid);

        let shifted = uuid_key("order", &["user12", "3checkout"]).unwrap();
        assert_ne!(a, shifted);
    }

    #[test]
    fn test_serde_validates() {
        let key: IdempotencyKey = serde_json::from_str(r#""order:1""#).unwrap();
        assert_eq!(key, "order:1");
        assert!(serde_json::from_str::<IdempotencyKey>(r#""not valid!!""#).is_err());
        assert_eq!(serde_json::to_string(&key).unwrap(), r#""order:1""#);
    }
}
