//! Product-link discovery on collection pages.

use std::collections::BTreeSet;

use loomi_core::SiteProfile;
use reqwest::Url;
use scraper::{Html, Selector};

/// Used when a profile declares no `product_links` selector.
const FALLBACK_LINK_SELECTOR: &str = "a[href]";

/// Product page URLs linked from a collection page, sorted and unique.
///
/// The profile's `product_links` selector is a comma-separated list; each
/// selector is tried in order and the first that yields a product link wins.
/// Links are resolved against the profile's `base_url` and kept only if they
/// contain one of its `product_url_patterns` (all links pass when none are set).
#[must_use]
pub fn extract_product_links(html: &str, profile: &SiteProfile) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(base) = Url::parse(&profile.base_url) else {
        tracing::warn!(site = %profile.key, base_url = %profile.base_url, "invalid base_url");
        return Vec::new();
    };

    let selectors = profile
        .selector("product_links")
        .unwrap_or(FALLBACK_LINK_SELECTOR);

    for raw in selectors.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let selector = match Selector::parse(raw) {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(site = %profile.key, selector = raw, error = %e, "skipping bad selector");
                continue;
            }
        };

        let links: BTreeSet<String> = document
            .select(&selector)
            .filter_map(|el| el.value().attr("href"))
            .filter_map(|href| resolve(&base, href))
            .filter(|url| is_product_url(url, profile))
            .collect();

        if !links.is_empty() {
            return links.into_iter().collect();
        }
    }

    Vec::new()
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

fn is_product_url(url: &str, profile: &SiteProfile) -> bool {
    profile.product_url_patterns.is_empty()
        || profile
            .product_url_patterns
            .iter()
            .any(|pattern| url.contains(pattern.as_str()))
}

/// `url` with its `page` query parameter set to `page`. Page 1 is the URL itself.
#[must_use]
pub fn paginated_url(url: &str, page: u32) -> String {
    if page <= 1 {
        return url.to_string();
    }
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| k != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut pairs = parsed.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        pairs.append_pair("page", &page.to_string());
    }
    parsed.to_string()
}
