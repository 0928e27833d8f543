//! Represents an uploaded object: the generated key and where it ended up.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Generated, collision-resistant object name.
///
/// Format: `{unix_millis}_{6-char-random}_{sanitized_basename}{extension}`.
/// Built once per upload by a [`KeyGenerator`](crate::services::key_generator::KeyGenerator)
/// and never mutated afterwards.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    pub(crate) fn from_parts(millis: u64, suffix: &str, sanitized_name: &str) -> Self {
        Self(format!("{}_{}_{}", millis, suffix, sanitized_name))
    }

    #[cfg(test)]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Object key inside a bucket, prefixed by the category folder.
    pub fn in_folder(&self, folder: &str) -> String {
        if folder.is_empty() {
            self.0.clone()
        } else {
            format!("{}/{}", folder.trim_end_matches('/'), self.0)
        }
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a stored object lives and how the outside world reaches it.
///
/// Owned by the object store gateway; metadata and carousel records only keep
/// the URL by value.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ObjectLocation {
    /// Bucket identifier from the static registry.
    pub bucket: String,

    /// Path-like key inside the bucket (e.g. `covers/1700000000000_ab12cd_banner.jpg`).
    pub key: String,

    /// Public URL derived from the bucket's base URL and the key.
    pub url: String,
}
