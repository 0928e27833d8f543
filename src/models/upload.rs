//! Upload requests and the static category table they are routed through.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Free-form string attributes attached to an upload (dimensions, alt text...).
pub type Attributes = BTreeMap<String, String>;

/// Target collection of an upload.
///
/// Each category maps to one bucket and one folder inside it, and decides
/// whether a carousel entry must be created once metadata is stored.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Carousel,
    ProductCover,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Carousel, Category::ProductCover];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Carousel => "carousel",
            Category::ProductCover => "product-cover",
        }
    }

    /// Bucket the category's objects are written to.
    pub fn bucket(&self) -> &'static str {
        match self {
            Category::Carousel => "carousel",
            Category::ProductCover => "products",
        }
    }

    /// Folder prefix inside the bucket.
    pub fn folder(&self) -> &'static str {
        "covers"
    }

    /// Whether a successful upload must also produce a carousel entry.
    pub fn requires_feature_record(&self) -> bool {
        matches!(self, Category::Carousel)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category `{}`", s))
    }
}

/// A browser-submitted file on its way into storage.
///
/// The category stays a raw string here: validation belongs to the
/// orchestrator so an unknown category is reported like any other rejection.
#[derive(Clone, Debug)]
pub struct UploadRequest {
    pub payload: Bytes,
    pub content_type: String,
    pub original_filename: String,
    pub category: String,
    pub attributes: Attributes,
}

impl UploadRequest {
    pub fn new(
        category: impl Into<String>,
        original_filename: impl Into<String>,
        content_type: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            payload: payload.into(),
            content_type: content_type.into(),
            original_filename: original_filename.into(),
            category: category.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}
