//! Static registry of the buckets this service manages and their public base URLs.
//!
//! Built once from configuration. Every gateway call checks the registry
//! before touching storage, and public URLs are derived from it only: an
//! unknown bucket or a bucket without a base URL is a configuration error,
//! never a guessed host.

use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

/// One configured bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BucketConfig {
    pub id: String,
    pub public_base_url: Option<String>,
}

impl BucketConfig {
    /// Parse `id=https://base/url` or a bare `id`.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (id, url) = match raw.split_once('=') {
            Some((id, url)) => (id.trim(), Some(url.trim())),
            None => (raw, None),
        };
        let public_base_url = match url {
            Some("") | None => None,
            Some(url) => Some(url.trim_end_matches('/').to_string()),
        };
        Self {
            id: id.to_string(),
            public_base_url,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("bucket `{0}` configured twice")]
    Duplicate(String),
    #[error("bucket `{id}` has a malformed public base URL `{url}`")]
    InvalidBaseUrl { id: String, url: String },
}

#[derive(Clone, Debug, Default)]
pub struct BucketRegistry {
    buckets: BTreeMap<String, Option<String>>,
}

impl BucketRegistry {
    pub fn new(configs: impl IntoIterator<Item = BucketConfig>) -> Result<Self, RegistryError> {
        let mut buckets = BTreeMap::new();
        for cfg in configs {
            ensure_bucket_name_safe(&cfg.id)?;
            if let Some(url) = &cfg.public_base_url {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(RegistryError::InvalidBaseUrl {
                        id: cfg.id,
                        url: url.clone(),
                    });
                }
            }
            if buckets.insert(cfg.id.clone(), cfg.public_base_url).is_some() {
                return Err(RegistryError::Duplicate(cfg.id));
            }
        }
        Ok(Self { buckets })
    }

    pub fn contains(&self, bucket: &str) -> bool {
        self.buckets.contains_key(bucket)
    }

    /// `None` if the bucket is unknown, `Some(None)` if it has no base URL.
    pub fn base_url(&self, bucket: &str) -> Option<Option<&str>> {
        self.buckets.get(bucket).map(|url| url.as_deref())
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    /// Reverse a public URL into `(bucket, key)` by matching base URL prefixes.
    ///
    /// The longest matching base wins so nested base URLs resolve to the most
    /// specific bucket.
    pub fn locate(&self, url: &str) -> Option<(String, String)> {
        self.buckets
            .iter()
            .filter_map(|(id, base)| {
                let base = base.as_deref()?;
                let key = url.strip_prefix(base)?.strip_prefix('/')?;
                (!key.is_empty()).then(|| (base.len(), id, key))
            })
            .max_by_key(|(len, _, _)| *len)
            .map(|(_, id, key)| (id.clone(), key.to_string()))
    }
}

/// S3-style bucket naming: 3–63 chars of lowercase letters, digits, dots and
/// hyphens, alphanumeric at both ends, no `..`/`.-`/`-.`, not an IPv4 address.
fn ensure_bucket_name_safe(name: &str) -> Result<(), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidBucketName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let len = name.len();
    if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
        return Err(invalid("must be between 3 and 63 characters"));
    }
    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return Err(invalid(
            "allowed characters are lowercase letters, digits, dots, and hyphens",
        ));
    }
    if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
        return Err(invalid("must start and end with a lowercase letter or digit"));
    }
    if name.contains("..") || name.contains("-.") || name.contains(".-") {
        return Err(invalid(
            "cannot contain consecutive dots or dot-hyphen combinations",
        ));
    }
    if is_ipv4_like(name) {
        return Err(invalid("must not be formatted like an IP address"));
    }
    Ok(())
}

fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}
