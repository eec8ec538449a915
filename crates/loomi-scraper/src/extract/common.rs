//! Field rules shared by the built-in extractors.

use loomi_core::{ProductRecord, ScrapeStatus, SiteProfile, MAX_GALLERY_IMAGES, SCHEMA_VERSION};
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Length of the materials snippet, in characters.
const SNIPPET_CHARS: usize = 200;

/// Substrings marking an image as site chrome rather than a product photo.
const EXCLUDED_IMAGE_PATTERNS: &[&str] =
    &["logo", "icon", "swatch", "cart", "payment", "badge", "social"];

/// Categories that are not garments.
const NON_APPAREL_CATEGORIES: &[&str] = &["accessories", "bags", "jewelry"];

/// Variant labels that stand in for a real colour name.
const PLACEHOLDER_COLORS: &[&str] = &[
    "default title",
    "default",
    "select color",
    "choose color",
    "color",
];

/// First 12 hex characters of the SHA-256 of `input`.
#[must_use]
pub fn short_hash(input: &str) -> String {
    let mut hex = format!("{:x}", Sha256::digest(input.as_bytes()));
    hex.truncate(12);
    hex
}

#[must_use]
pub fn color_id(style_id: &str, color_name: &str) -> String {
    format!("{style_id}-{}", short_hash(color_name))
}

/// Capitalises the first letter of every word and lowercases the rest.
#[must_use]
pub fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut at_word_start = true;
    for c in input.trim().chars() {
        if c.is_alphanumeric() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = c != '\'';
        }
    }
    out
}

#[must_use]
pub fn is_placeholder_color(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    lower.is_empty() || PLACEHOLDER_COLORS.contains(&lower.as_str())
}

/// Absolute, query-free form of an image `src`.
#[must_use]
pub fn normalize_image_url(src: &str, base: &Url) -> Option<String> {
    let src = src.trim();
    if src.is_empty() || src.starts_with("data:") {
        return None;
    }
    let without_query = src.split('?').next().unwrap_or(src);
    if let Some(rest) = without_query.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    if without_query.starts_with("http://") || without_query.starts_with("https://") {
        return Some(without_query.to_string());
    }
    base.join(without_query).ok().map(|u| u.to_string())
}

#[must_use]
pub fn is_product_image(url: &str) -> bool {
    let lower = url.to_lowercase();
    !EXCLUDED_IMAGE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Filters, de-duplicates and caps already-normalized image URLs, keeping order.
#[must_use]
pub fn finalize_gallery<I>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut gallery: Vec<String> = Vec::new();
    for url in urls {
        if gallery.len() >= MAX_GALLERY_IMAGES {
            break;
        }
        if is_product_image(&url) && !gallery.contains(&url) {
            gallery.push(url);
        }
    }
    gallery
}

/// Image URLs matched by the profile's `gallery_images` selector.
///
/// Uses `src`, then `data-src`, then the first `srcset` candidate.
#[must_use]
pub fn gallery_from_page(document: &Html, profile: &SiteProfile) -> Vec<String> {
    let Ok(base) = Url::parse(&profile.base_url) else {
        return Vec::new();
    };
    let Some(selector) = profile.selector("gallery_images").and_then(parse_selector) else {
        return Vec::new();
    };

    let urls = document.select(&selector).filter_map(|img| {
        let el = img.value();
        let src = el
            .attr("src")
            .or_else(|| el.attr("data-src"))
            .or_else(|| {
                el.attr("srcset")
                    .or_else(|| el.attr("data-srcset"))
                    .and_then(|s| s.split(',').next())
                    .and_then(|candidate| candidate.split_whitespace().next())
            })?;
        normalize_image_url(src, &base)
    });
    finalize_gallery(urls)
}

/// Category implied by the longest `category_keywords` entry found in `title`,
/// else `fallback`. Returns the title-cased category and whether it is apparel.
#[must_use]
pub fn categorize(title: &str, fallback: &str, profile: &SiteProfile) -> (String, bool) {
    let lower = title.to_lowercase();
    let matched = profile
        .category_keywords
        .iter()
        .filter(|(keyword, _)| !keyword.is_empty() && lower.contains(&keyword.to_lowercase()))
        .max_by_key(|(keyword, _)| keyword.len())
        .map(|(_, category)| category.as_str());

    let category = title_case(matched.unwrap_or(fallback));
    let is_apparel = !NON_APPAREL_CATEGORIES.contains(&category.to_lowercase().as_str());
    (category, is_apparel)
}

/// First 200 characters of `text`.
#[must_use]
pub fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_CHARS).collect()
}

#[must_use]
pub fn format_price(price: Option<f64>) -> String {
    match price {
        Some(p) if p > 0.0 => format!("${p:.2}"),
        _ => String::new(),
    }
}

pub(crate) fn parse_selector(raw: &str) -> Option<Selector> {
    Selector::parse(raw).ok()
}

/// Whitespace-collapsed text of an element.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of the first element matching the profile selector `name`.
pub(crate) fn select_text(document: &Html, profile: &SiteProfile, name: &str) -> Option<String> {
    let selector = profile.selector(name).and_then(parse_selector)?;
    document
        .select(&selector)
        .map(element_text)
        .find(|t| !t.is_empty())
}

/// Plain text of an HTML fragment such as a product description.
pub(crate) fn html_to_text(fragment: &str) -> String {
    let parsed = Html::parse_fragment(fragment);
    element_text(parsed.root_element())
}

/// Raw text of every `<script>` element matching `selector`.
pub(crate) fn script_bodies(document: &Html, selector: &str) -> Vec<String> {
    let Some(selector) = parse_selector(selector) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .map(|el| el.text().collect::<String>())
        .collect()
}

/// The JSON object assigned right after the first match of `assignment` in
/// `raw`, decoded up to its own closing brace. `None` when the assignment is
/// absent or not followed by an object.
pub(crate) fn assigned_json<T: DeserializeOwned>(
    raw: &str,
    assignment: &Regex,
) -> Option<Result<T, serde_json::Error>> {
    let start = assignment.find(raw)?.end();
    let rest = &raw[start..];
    if !rest.starts_with('{') {
        return None;
    }
    serde_json::Deserializer::from_str(rest).into_iter::<T>().next()
}

/// The first schema.org `Product` object in any ld+json block.
pub(crate) fn ld_json_product(document: &Html) -> Option<Value> {
    script_bodies(document, r#"script[type="application/ld+json"]"#)
        .iter()
        .filter_map(|body| serde_json::from_str::<Value>(body.trim()).ok())
        .flat_map(|value| match value {
            Value::Array(items) => items,
            Value::Object(_) => {
                let graph = value.get("@graph").and_then(Value::as_array).cloned();
                graph.unwrap_or_else(|| vec![value])
            }
            _ => Vec::new(),
        })
        .find(|item| item.get("@type").and_then(Value::as_str) == Some("Product"))
}

/// Price and currency from a schema.org product's `offers`, which may be
/// an object or a list (the first entry is used).
pub(crate) fn offer_price(product: &Value) -> (Option<f64>, Option<String>) {
    let offer = match product.get("offers") {
        Some(Value::Array(list)) => list.first(),
        Some(obj @ Value::Object(_)) => Some(obj),
        _ => None,
    };
    let Some(offer) = offer else {
        return (None, None);
    };
    let price = offer.get("price").and_then(number_like).filter(|p| *p > 0.0);
    let currency = offer
        .get("priceCurrency")
        .and_then(Value::as_str)
        .map(str::to_string);
    (price, currency)
}

/// A JSON number or numeric string.
pub(crate) fn number_like(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

/// Site-independent parts of a record, completed by [`RecordDraft::finish`].
#[derive(Debug, Clone, Default)]
pub struct RecordDraft {
    pub style_id: String,
    pub style_slug: String,
    pub color_name: String,
    pub image_url: String,
    pub gallery: Vec<String>,
    pub product_url: String,
    pub product_title: String,
    pub category: String,
    pub is_apparel: bool,
    pub price: Option<f64>,
    pub currency: String,
    pub materials: String,
}

impl RecordDraft {
    /// Fills the derived columns: colour id, joined gallery, price text,
    /// snippet, status, and schema version.
    #[must_use]
    pub fn finish(self, profile: &SiteProfile) -> ProductRecord {
        let color_name = title_case(&self.color_name);
        let price = self.price.filter(|p| *p > 0.0);
        let image_url = if self.image_url.is_empty() {
            self.gallery.first().cloned().unwrap_or_default()
        } else {
            self.image_url
        };

        ProductRecord {
            color_id: color_id(&self.style_id, &color_name),
            style_id: self.style_id,
            style_slug: self.style_slug,
            color_name,
            image_url,
            gallery_image_urls: self.gallery.join(&profile.gallery_separator),
            product_url: self.product_url,
            brand_name: profile.brand_name.clone(),
            source_site: profile.source_site.clone(),
            product_title: self.product_title,
            category: self.category,
            is_apparel: self.is_apparel,
            price_raw: format_price(price),
            price,
            currency: self.currency,
            materials_snippet: snippet(&self.materials),
            scrape_status: ScrapeStatus::from_fields(price, &self.materials),
            materials_raw_or_page_text: self.materials,
            schema_version: SCHEMA_VERSION,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loomi_core::SiteRegistry;

    fn profile() -> SiteProfile {
        SiteRegistry::builtin()
            .unwrap()
            .get("buddhapants")
            .unwrap()
            .clone()
    }

    #[test]
    fn short_hash_is_twelve_hex_chars() {
        let h = short_hash("harem-pants");
        assert_eq!(h.len(), 12);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(h, short_hash("harem-pants"));
        assert_ne!(h, short_hash("wrap-top"));
    }

    #[test]
    fn title_case_words() {
        assert_eq!(title_case("MIDNIGHT blue"), "Midnight Blue");
        assert_eq!(title_case("sea-green"), "Sea-Green");
        assert_eq!(title_case("women's tops"), "Women's Tops");
    }

    #[test]
    fn placeholder_colours() {
        assert!(is_placeholder_color("Default Title"));
        assert!(is_placeholder_color("  "));
        assert!(!is_placeholder_color("Indigo"));
    }

    #[test]
    fn normalize_image_urls() {
        let base = Url::parse("https://www.buddhapants.com").unwrap();
        assert_eq!(
            normalize_image_url("//cdn.shopify.com/a.jpg?v=123", &base).as_deref(),
            Some("https://cdn.shopify.com/a.jpg")
        );
        assert_eq!(
            normalize_image_url("/files/b.jpg", &base).as_deref(),
            Some("https://www.buddhapants.com/files/b.jpg")
        );
        assert_eq!(normalize_image_url("data:image/png;base64,AA", &base), None);
    }

    #[test]
    fn gallery_excludes_chrome_and_caps() {
        let mut urls = vec![
            "https://cdn.example.com/logo.png".to_string(),
            "https://cdn.example.com/payment-icons.svg".to_string(),
            "https://cdn.example.com/p0.jpg".to_string(),
            "https://cdn.example.com/p0.jpg".to_string(),
        ];
        urls.extend((1..20).map(|i| format!("https://cdn.example.com/p{i}.jpg")));
        let gallery = finalize_gallery(urls);
        assert_eq!(gallery.len(), MAX_GALLERY_IMAGES);
        assert_eq!(gallery[0], "https://cdn.example.com/p0.jpg");
        assert_eq!(gallery[1], "https://cdn.example.com/p1.jpg");
    }

    #[test]
    fn gallery_from_page_reads_src_and_srcset() {
        let html = r#"
            <div class="product__media"><img src="//cdn.shopify.com/one.jpg?v=1"></div>
            <div class="product__media"><img srcset="//cdn.shopify.com/two.jpg 1x, //cdn.shopify.com/two@2x.jpg 2x"></div>
            <div class="product__media"><img src="//cdn.shopify.com/swatch-red.jpg"></div>
        "#;
        let doc = Html::parse_document(html);
        assert_eq!(
            gallery_from_page(&doc, &profile()),
            vec![
                "https://cdn.shopify.com/one.jpg",
                "https://cdn.shopify.com/two.jpg"
            ]
        );
    }

    #[test]
    fn categorize_prefers_longest_keyword() {
        let p = profile();
        assert_eq!(categorize("Harem Jumpsuit", "Apparel", &p), ("Jumpsuits".to_string(), true));
        assert_eq!(categorize("Hemp Harem Pants", "Apparel", &p), ("Pants".to_string(), true));
        assert_eq!(categorize("Festival Fanny Pack", "Apparel", &p), ("Accessories".to_string(), false));
        assert_eq!(categorize("Mystery Item", "apparel", &p), ("Apparel".to_string(), true));
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let text = "é".repeat(300);
        assert_eq!(snippet(&text).chars().count(), 200);
    }

    #[test]
    fn offer_price_handles_object_and_list() {
        let obj: Value = serde_json::json!({"offers": {"price": "89.50", "priceCurrency": "USD"}});
        assert_eq!(offer_price(&obj), (Some(89.5), Some("USD".to_string())));
        let list: Value = serde_json::json!({"offers": [{"price": 12, "priceCurrency": "CAD"}]});
        assert_eq!(offer_price(&list), (Some(12.0), Some("CAD".to_string())));
        assert_eq!(offer_price(&serde_json::json!({})), (None, None));
    }

    #[test]
    fn ld_json_product_searches_graph() {
        let html = r#"<script type="application/ld+json">
            {"@context":"https://schema.org","@graph":[{"@type":"Organization"},{"@type":"Product","name":"Wrap Top"}]}
        </script>"#;
        let doc = Html::parse_document(html);
        let product = ld_json_product(&doc).unwrap();
        assert_eq!(product["name"], "Wrap Top");
    }

    #[test]
    fn finish_derives_status_and_ids() {
        let record = RecordDraft {
            style_id: "abc123abc123".to_string(),
            style_slug: "wrap-top".to_string(),
            color_name: "sky blue".to_string(),
            gallery: vec!["https://cdn/a.jpg".to_string(), "https://cdn/b.jpg".to_string()],
            product_url: "https://www.buddhapants.com/products/wrap-top".to_string(),
            product_title: "Wrap Top".to_string(),
            category: "Tops".to_string(),
            is_apparel: true,
            price: Some(48.0),
            currency: "USD".to_string(),
            materials: String::new(),
            ..RecordDraft::default()
        }
        .finish(&profile());

        assert_eq!(record.color_name, "Sky Blue");
        assert_eq!(record.color_id, format!("abc123abc123-{}", short_hash("Sky Blue")));
        assert_eq!(record.image_url, "https://cdn/a.jpg");
        assert_eq!(record.gallery_image_urls, "https://cdn/a.jpg|https://cdn/b.jpg");
        assert_eq!(record.price_raw, "$48.00");
        assert_eq!(record.scrape_status, ScrapeStatus::MissingMaterials);
        assert_eq!(record.brand_name, "Buddha Pants");
        assert_eq!(record.schema_version, SCHEMA_VERSION);
    }
}
