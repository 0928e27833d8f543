//! Carousel entries: the feature records that drive the storefront banner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// A single carousel slide.
///
/// References its image by URL value, not by metadata id, so a slide may also
/// point at an externally hosted image this service does not manage.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CarouselImage {
    pub id: Uuid,

    pub image_url: String,

    pub alt_text: String,

    /// Display position; lower comes first.
    pub sort_order: i64,

    /// Inactive slides are kept but not shown.
    pub active: bool,

    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct NewCarouselImage {
    pub image_url: String,
    #[serde(default)]
    pub alt_text: String,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl NewCarouselImage {
    #[cfg(test)]
    pub fn into_record(self, id: Uuid, created_at: DateTime<Utc>) -> CarouselImage {
        CarouselImage {
            id,
            image_url: self.image_url,
            alt_text: self.alt_text,
            sort_order: self.sort_order,
            active: self.active,
            created_at,
        }
    }
}

/// Partial update; `None` fields are left untouched.
#[derive(Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CarouselUpdate {
    pub alt_text: Option<String>,
    pub sort_order: Option<i64>,
    pub active: Option<bool>,
}

impl CarouselUpdate {
    pub fn is_empty(&self) -> bool {
        self.alt_text.is_none() && self.sort_order.is_none() && self.active.is_none()
    }

    pub fn apply(&self, image: &mut CarouselImage) {
        if let Some(alt) = &self.alt_text {
            image.alt_text = alt.clone();
        }
        if let Some(order) = self.sort_order {
            image.sort_order = order;
        }
        if let Some(active) = self.active {
            image.active = active;
        }
    }
}

/// Ordering for carousel listings.
#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CarouselOrder {
    /// Ascending display position, oldest first on ties.
    #[default]
    SortOrder,
    /// Newest first.
    CreatedAt,
}

impl FromStr for CarouselOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sort_order" => Ok(CarouselOrder::SortOrder),
            "created_at" => Ok(CarouselOrder::CreatedAt),
            other => Err(format!("unknown carousel order `{}`", other)),
        }
    }
}
