//! Cache key derivation.
//!
//! A [`Fingerprint`] is the SHA-256 of the canonical JSON encoding of a
//! normalized [`WidgetConfig`]. The encoding follows struct declaration
//! order, never map insertion order, so field-equal configurations always
//! hash identically.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};
use wpp_widget_types::WidgetConfig;

/// Bumped whenever the canonical encoding changes so stale entries miss.
const KEY_SCHEMA: &[u8] = b"wpp.popular.v1\0";

/// Fixed-length hex digest identifying one normalized configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Shortened form for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical byte encoding of a configuration.
pub fn canonical_bytes(config: &WidgetConfig) -> Vec<u8> {
    // Only plain strings, integers, booleans and unit enums reach the
    // serializer, none of which can fail.
    serde_json::to_vec(config).unwrap_or_default()
}

/// Derive the cache key of a normalized configuration.
pub fn derive_key(config: &WidgetConfig) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(KEY_SCHEMA);
    hasher.update(canonical_bytes(config));
    Fingerprint(hex::encode(hasher.finalize()))
}
