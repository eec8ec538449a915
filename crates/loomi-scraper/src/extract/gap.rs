//! Gap Inc. storefronts (Banana Republic): per-style data assigned to
//! `window.gap.properties.styles` in the rendered page.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use loomi_core::{ProductRecord, SiteProfile};
use regex::Regex;
use reqwest::Url;
use scraper::Html;
use serde::Deserialize;

use super::common::{
    assigned_json, categorize, finalize_gallery, gallery_from_page, ld_json_product, normalize_image_url,
    offer_price, select_text, short_hash, RecordDraft,
};
use crate::error::ExtractionError;

static STYLES_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"window\.gap\.properties\.styles\s*=\s*")
        .expect("valid styles regex")
});

const UNKNOWN_TITLE: &str = "Unknown Product";

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StyleJson {
    display_name: Option<String>,
    images: Vec<StyleImage>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StyleImage {
    url: Option<String>,
}

/// Extracts one record per style (colour) from a rendered Gap product page.
///
/// Price and currency come from the schema.org offer; title, materials and
/// gallery from the profile's selectors, with each style's own images used
/// when the page gallery is empty.
///
/// # Errors
///
/// Returns [`ExtractionError::NoProductData`] if the styles assignment is
/// missing or empty, or [`ExtractionError::InvalidJson`] if it does not parse.
pub fn extract_gap(
    raw: &str,
    product_url: &str,
    profile: &SiteProfile,
) -> Result<Vec<ProductRecord>, ExtractionError> {
    let no_data = || ExtractionError::NoProductData {
        url: product_url.to_string(),
    };

    let styles: BTreeMap<String, StyleJson> = assigned_json(raw, &STYLES_ASSIGNMENT)
        .ok_or_else(no_data)?
        .map_err(|source| ExtractionError::InvalidJson {
            url: product_url.to_string(),
            source,
        })?;
    if styles.is_empty() {
        return Err(no_data());
    }

    let document = Html::parse_document(raw);
    let (price, currency) = ld_json_product(&document)
        .map(|p| offer_price(&p))
        .unwrap_or_default();
    let currency = currency.unwrap_or_else(|| "USD".to_string());

    let title = select_text(&document, profile, "product_title")
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let materials = select_text(&document, profile, "materials").unwrap_or_default();
    let (category, is_apparel) = categorize(&title, "Apparel", profile);
    let page_gallery = gallery_from_page(&document, profile);
    let base = Url::parse(&profile.base_url).ok();

    let records = styles
        .into_iter()
        .map(|(style_key, style)| {
            let gallery = if page_gallery.is_empty() {
                base.as_ref().map_or_else(Vec::new, |base| {
                    finalize_gallery(
                        style
                            .images
                            .iter()
                            .filter_map(|img| img.url.as_deref())
                            .filter_map(|src| normalize_image_url(src, base)),
                    )
                })
            } else {
                page_gallery.clone()
            };

            RecordDraft {
                style_id: short_hash(&style_key),
                color_name: style
                    .display_name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| "Default".to_string()),
                style_slug: style_key,
                image_url: String::new(),
                gallery,
                product_url: product_url.to_string(),
                product_title: title.clone(),
                category: category.clone(),
                is_apparel,
                price,
                currency: currency.clone(),
                materials: materials.clone(),
            }
            .finish(profile)
        })
        .collect();

    Ok(records)
}
