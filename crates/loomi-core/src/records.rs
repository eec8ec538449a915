//! Output record model shared by extractors, the manager, and the CSV writer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Version of the 19-column output schema written to every row.
pub const SCHEMA_VERSION: u32 = 1;

/// Maximum number of gallery images kept per record.
pub const MAX_GALLERY_IMAGES: usize = 10;

/// Output header, in column order. Must match the field order of [`ProductRecord`].
pub const CSV_COLUMNS: [&str; 19] = [
    "style_id",
    "style_slug",
    "color_id",
    "color_name",
    "image_url",
    "gallery_image_urls",
    "product_url",
    "brand_name",
    "source_site",
    "product_title",
    "category",
    "is_apparel",
    "price_raw",
    "price",
    "currency",
    "materials_raw_or_page_text",
    "materials_snippet",
    "scrape_status",
    "schema_version",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeStatus {
    Ok,
    MissingPrice,
    MissingMaterials,
}

impl ScrapeStatus {
    /// Status derived from which fields an extractor managed to fill.
    #[must_use]
    pub fn from_fields(price: Option<f64>, materials: &str) -> Self {
        match price {
            None => Self::MissingPrice,
            Some(p) if p <= 0.0 => Self::MissingPrice,
            Some(_) if materials.trim().is_empty() => Self::MissingMaterials,
            Some(_) => Self::Ok,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::MissingPrice => "missing_price",
            Self::MissingMaterials => "missing_materials",
        }
    }
}

impl fmt::Display for ScrapeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One output row: a single colour variant of a single product style.
///
/// `gallery_image_urls` is stored already joined with the site's separator,
/// since the separator is a per-site extraction concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub style_id: String,
    pub style_slug: String,
    pub color_id: String,
    pub color_name: String,
    pub image_url: String,
    pub gallery_image_urls: String,
    pub product_url: String,
    pub brand_name: String,
    pub source_site: String,
    pub product_title: String,
    pub category: String,
    pub is_apparel: bool,
    pub price_raw: String,
    pub price: Option<f64>,
    pub currency: String,
    pub materials_raw_or_page_text: String,
    pub materials_snippet: String,
    pub scrape_status: ScrapeStatus,
    pub schema_version: u32,
}

impl ProductRecord {
    /// Key under which records are deduplicated in the final output.
    #[must_use]
    pub fn dedup_key(&self) -> (&str, &str) {
        (&self.style_id, &self.color_name)
    }
}
