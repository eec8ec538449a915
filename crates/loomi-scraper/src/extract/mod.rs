//! Pluggable per-site extraction of [`ProductRecord`]s from a fetched page.

pub mod common;
mod gap;
mod shopify;

use std::collections::BTreeMap;
use std::sync::Arc;

use loomi_core::{ProductRecord, SiteProfile};

use crate::error::{ExtractionError, ScraperError};

pub use gap::extract_gap;
pub use shopify::extract_shopify;

/// Turns one product page into records, one per colour variant.
///
/// Implementations run on a blocking thread and must not assume any async context.
pub trait Extractor: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ExtractionError`] when the page holds no usable product data.
    fn extract(
        &self,
        raw: &str,
        product_url: &str,
        profile: &SiteProfile,
    ) -> Result<Vec<ProductRecord>, ExtractionError>;
}

impl<F> Extractor for F
where
    F: Fn(&str, &str, &SiteProfile) -> Result<Vec<ProductRecord>, ExtractionError> + Send + Sync,
{
    fn extract(
        &self,
        raw: &str,
        product_url: &str,
        profile: &SiteProfile,
    ) -> Result<Vec<ProductRecord>, ExtractionError> {
        self(raw, product_url, profile)
    }
}

/// Extractors looked up by the name a [`SiteProfile`] gives in `extractor`.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: BTreeMap<String, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Registry holding the built-in `shopify` and `gap` extractors.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        registry.register("shopify", Arc::new(extract_shopify));
        registry.register("gap", Arc::new(extract_gap));
        registry
    }

    pub fn register(&mut self, name: &str, extractor: Arc<dyn Extractor>) {
        self.extractors.insert(name.to_string(), extractor);
    }

    /// # Errors
    ///
    /// Returns [`ScraperError::UnknownExtractor`] if nothing is registered under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Extractor>, ScraperError> {
        self.extractors
            .get(name)
            .cloned()
            .ok_or_else(|| ScraperError::UnknownExtractor {
                name: name.to_string(),
                available: self.names().join(", "),
            })
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.extractors.keys().map(String::as_str).collect()
    }
}
