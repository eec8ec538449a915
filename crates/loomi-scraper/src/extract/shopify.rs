//! Shopify storefronts: product JSON embedded in the product page.

use std::collections::HashSet;
use std::sync::LazyLock;

use loomi_core::{ProductRecord, SiteProfile};
use regex::Regex;
use reqwest::Url;
use scraper::Html;
use serde::Deserialize;
use serde_json::Value;

use super::common::{
    assigned_json, categorize, finalize_gallery, gallery_from_page, html_to_text, is_placeholder_color,
    ld_json_product, normalize_image_url, number_like, offer_price, script_bodies, select_text,
    short_hash, RecordDraft,
};
use crate::error::ExtractionError;

static ANALYTICS_PRODUCT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ShopifyAnalytics\.meta\.product\s*=\s*")
        .expect("valid analytics regex")
});

const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProductJson {
    title: Option<String>,
    handle: Option<String>,
    description: Option<String>,
    #[serde(rename = "type")]
    product_type: Option<String>,
    variants: Vec<VariantJson>,
    images: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct VariantJson {
    title: Option<String>,
    option1: Option<String>,
    public_title: Option<String>,
    /// Minor currency units.
    price: Option<Value>,
    featured_image: Option<Value>,
}

impl VariantJson {
    fn color(&self) -> Option<String> {
        let from_public_title = || {
            self.public_title
                .as_deref()
                .and_then(|t| t.split(" / ").next())
                .map(str::to_string)
        };
        self.option1
            .clone()
            .or_else(from_public_title)
            .or_else(|| self.title.clone())
            .map(|c| c.trim().to_string())
    }

    fn price(&self) -> Option<f64> {
        self.price
            .as_ref()
            .and_then(number_like)
            .map(|cents| cents / 100.0)
            .filter(|p| *p > 0.0)
    }
}

/// Extracts one record per colour from a Shopify product page.
///
/// Product data is read from the first source present: a `ProductJson`
/// script tag, the `ShopifyAnalytics.meta.product` assignment, or a
/// schema.org `Product` ld+json block.
///
/// # Errors
///
/// Returns [`ExtractionError::NoProductData`] if none of those sources exist
/// or the product has no variants.
pub fn extract_shopify(
    raw: &str,
    product_url: &str,
    profile: &SiteProfile,
) -> Result<Vec<ProductRecord>, ExtractionError> {
    let document = Html::parse_document(raw);
    let no_data = || ExtractionError::NoProductData {
        url: product_url.to_string(),
    };

    let ld_product = ld_json_product(&document);
    let product = product_json_script(&document)
        .or_else(|| analytics_product(raw))
        .or_else(|| ld_product.as_ref().map(product_from_ld_json))
        .ok_or_else(no_data)?;
    if product.variants.is_empty() {
        return Err(no_data());
    }

    let title = product
        .title
        .clone()
        .filter(|t| !t.trim().is_empty())
        .or_else(|| select_text(&document, profile, "product_title"))
        .or_else(|| {
            ld_product
                .as_ref()
                .and_then(|p| p.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_default();

    let style_slug = style_slug(product_url, product.handle.as_deref(), &title);
    let style_id = short_hash(&style_slug);

    let fallback_category = product
        .product_type
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or("Apparel");
    let (category, is_apparel) = categorize(&title, fallback_category, profile);

    let materials = product
        .description
        .as_deref()
        .map(html_to_text)
        .filter(|t| !t.is_empty())
        .or_else(|| select_text(&document, profile, "materials"))
        .unwrap_or_default();

    let currency = ld_product
        .as_ref()
        .and_then(|p| offer_price(p).1)
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

    let base = Url::parse(&profile.base_url).ok();
    let mut gallery = gallery_from_page(&document, profile);
    if gallery.is_empty() {
        if let Some(base) = &base {
            gallery = finalize_gallery(
                product
                    .images
                    .iter()
                    .filter_map(image_src)
                    .filter_map(|src| normalize_image_url(&src, base)),
            );
        }
    }

    let mut seen = HashSet::new();
    let mut records = Vec::new();
    for variant in &product.variants {
        let color = match variant.color() {
            Some(c) if !is_placeholder_color(&c) => c,
            _ => title.clone(),
        };

        let image_url = variant
            .featured_image
            .as_ref()
            .and_then(image_src)
            .zip(base.as_ref())
            .and_then(|(src, base)| normalize_image_url(&src, base))
            .unwrap_or_default();

        let record = RecordDraft {
            style_id: style_id.clone(),
            style_slug: style_slug.clone(),
            color_name: color,
            image_url,
            gallery: gallery.clone(),
            product_url: product_url.to_string(),
            product_title: title.clone(),
            category: category.clone(),
            is_apparel,
            price: variant.price(),
            currency: currency.clone(),
            materials: materials.clone(),
        }
        .finish(profile);

        if seen.insert(record.color_name.clone()) {
            records.push(record);
        }
    }

    Ok(records)
}

fn product_json_script(document: &Html) -> Option<ProductJson> {
    script_bodies(document, r#"script[id^="ProductJson"]"#)
        .iter()
        .find_map(|body| serde_json::from_str(body.trim()).ok())
}

fn analytics_product(raw: &str) -> Option<ProductJson> {
    assigned_json(raw, &ANALYTICS_PRODUCT)?.ok()
}

/// Converts a schema.org product into the embedded-JSON shape, one variant per offer.
fn product_from_ld_json(product: &Value) -> ProductJson {
    let name = product.get("name").and_then(Value::as_str).map(str::to_string);
    let image = product.get("image").cloned();
    let offers: Vec<&Value> = match product.get("offers") {
        Some(Value::Array(list)) => list.iter().collect(),
        Some(obj @ Value::Object(_)) => vec![obj],
        _ => Vec::new(),
    };

    let variants = offers
        .into_iter()
        .map(|offer| VariantJson {
            title: offer
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or_else(|| name.clone()),
            price: offer
                .get("price")
                .and_then(number_like)
                .and_then(|p| serde_json::Number::from_f64((p * 100.0).round()))
                .map(Value::Number),
            featured_image: image.clone(),
            ..VariantJson::default()
        })
        .collect();

    ProductJson {
        title: name,
        description: product
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        variants,
        images: image.into_iter().collect(),
        ..ProductJson::default()
    }
}

/// `src` of an image given as a string, `{src}`, or `{url}` object, or the
/// first entry of a list.
fn image_src(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("src")
            .or_else(|| map.get("url"))
            .and_then(image_src),
        Value::Array(list) => list.first().and_then(image_src),
        _ => None,
    }
}

fn style_slug(product_url: &str, handle: Option<&str>, title: &str) -> String {
    if let Some((_, rest)) = product_url.split_once("/products/") {
        let slug = rest.split(['?', '#', '/']).next().unwrap_or_default();
        if !slug.is_empty() {
            return slug.to_string();
        }
    }
    if let Some(handle) = handle.filter(|h| !h.is_empty()) {
        return handle.to_string();
    }
    slugify(title)
}

fn slugify(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
#[path = "shopify_test.rs"]
mod tests;
