use super::*;
use loomi_core::{ScrapeStatus, SiteRegistry};

fn profile() -> SiteProfile {
    SiteRegistry::builtin()
        .unwrap()
        .get("buddhapants")
        .unwrap()
        .clone()
}

const URL: &str = "https://www.buddhapants.com/products/hemp-harem-pants?variant=42";

fn product_json_page() -> String {
    r#"<html><head>
        <script type="application/ld+json">
          {"@type":"Product","name":"Hemp Harem Pants","offers":{"price":"68.00","priceCurrency":"USD"}}
        </script>
    </head><body>
        <h1 class="product__title">Hemp Harem Pants</h1>
        <div class="product__media"><img src="//cdn.shopify.com/files/harem-1.jpg?v=1"></div>
        <div class="product__media"><img src="//cdn.shopify.com/files/harem-2.jpg?v=1"></div>
        <script type="application/json" id="ProductJson-product-template">
        {
          "title": "Hemp Harem Pants",
          "handle": "hemp-harem-pants",
          "type": "Pants",
          "description": "<p>55% hemp, 45% organic cotton.</p>",
          "variants": [
            {"title": "Indigo / S", "option1": "Indigo", "price": 6800,
             "featured_image": {"src": "//cdn.shopify.com/files/harem-indigo.jpg?v=3"}},
            {"title": "Indigo / M", "option1": "Indigo", "price": 6800},
            {"title": "Sage / S", "option1": "sage", "price": 7200}
          ]
        }
        </script>
    </body></html>"#
        .to_string()
}

#[test]
fn product_json_yields_one_record_per_colour() {
    let records = extract_shopify(&product_json_page(), URL, &profile()).unwrap();
    assert_eq!(records.len(), 2);

    let indigo = &records[0];
    assert_eq!(indigo.color_name, "Indigo");
    assert_eq!(indigo.style_slug, "hemp-harem-pants");
    assert_eq!(indigo.style_id, short_hash("hemp-harem-pants"));
    assert_eq!(indigo.price, Some(68.0));
    assert_eq!(indigo.price_raw, "$68.00");
    assert_eq!(indigo.currency, "USD");
    assert_eq!(indigo.category, "Pants");
    assert!(indigo.is_apparel);
    assert_eq!(indigo.image_url, "https://cdn.shopify.com/files/harem-indigo.jpg");
    assert_eq!(
        indigo.gallery_image_urls,
        "https://cdn.shopify.com/files/harem-1.jpg|https://cdn.shopify.com/files/harem-2.jpg"
    );
    assert_eq!(indigo.materials_raw_or_page_text, "55% hemp, 45% organic cotton.");
    assert_eq!(indigo.scrape_status, ScrapeStatus::Ok);
    assert_eq!(indigo.brand_name, "Buddha Pants");
    assert_eq!(indigo.product_url, URL);

    let sage = &records[1];
    assert_eq!(sage.color_name, "Sage");
    assert_eq!(sage.price, Some(72.0));
    assert_eq!(sage.image_url, "https://cdn.shopify.com/files/harem-1.jpg");
    assert_ne!(sage.color_id, indigo.color_id);
}

#[test]
fn analytics_meta_is_used_without_product_json() {
    let page = r#"<html><body>
        <h1 class="product__title">Wrap Top</h1>
        <div class="product__description">100% organic cotton</div>
        <script>
          window.ShopifyAnalytics = window.ShopifyAnalytics || {};
          window.ShopifyAnalytics.meta.product = {"id":1,"type":"","variants":[{"id":11,"price":4800,"public_title":"Black / S"},{"id":12,"price":4800,"public_title":"Black / M"}]};
        </script>
    </body></html>"#;
    let records = extract_shopify(page, "https://www.buddhapants.com/products/wrap-top", &profile())
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].product_title, "Wrap Top");
    assert_eq!(records[0].color_name, "Black");
    assert_eq!(records[0].price, Some(48.0));
    assert_eq!(records[0].category, "Tops");
    assert_eq!(records[0].materials_raw_or_page_text, "100% organic cotton");
}

#[test]
fn analytics_meta_with_inline_css_in_a_string() {
    let page = r#"<html><body>
        <h1 class="product__title">Wrap Top</h1>
        <script>
          window.ShopifyAnalytics.meta.product = {"id":1,"description":"<style>.a{color:red};</style>","variants":[{"id":11,"price":4800,"public_title":"Black / S"}]};
          window.ShopifyAnalytics.meta.page = {};
        </script>
    </body></html>"#;
    let records = extract_shopify(page, "https://www.buddhapants.com/products/wrap-top", &profile())
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].color_name, "Black");
    assert_eq!(records[0].price, Some(48.0));
}

#[test]
fn ld_json_fallback_uses_title_as_colour_and_reports_missing_materials() {
    let page = r#"<html><head>
        <script type="application/ld+json">
          {"@type":"Product","name":"Festival Fanny Pack","image":"https://cdn.shopify.com/fanny.jpg",
           "offers":[{"price":"24.00","priceCurrency":"CAD"}]}
        </script>
    </head><body></body></html>"#;
    let records = extract_shopify(
        page,
        "https://www.buddhapants.com/products/festival-fanny-pack",
        &profile(),
    )
    .unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.color_name, "Festival Fanny Pack");
    assert_eq!(record.price, Some(24.0));
    assert_eq!(record.currency, "CAD");
    assert_eq!(record.category, "Accessories");
    assert!(!record.is_apparel);
    assert_eq!(record.image_url, "https://cdn.shopify.com/fanny.jpg");
    assert_eq!(record.scrape_status, ScrapeStatus::MissingMaterials);
}

#[test]
fn placeholder_variant_title_is_replaced_by_product_title() {
    let page = r#"<script id="ProductJson-main">
        {"title":"Yoga Mat Bag","description":"cotton canvas","variants":[{"title":"Default Title","price":0}]}
    </script>"#;
    let records = extract_shopify(
        page,
        "https://www.buddhapants.com/products/yoga-mat-bag",
        &profile(),
    )
    .unwrap();
    assert_eq!(records[0].color_name, "Yoga Mat Bag");
    assert_eq!(records[0].price, None);
    assert_eq!(records[0].scrape_status, ScrapeStatus::MissingPrice);
}

#[test]
fn page_without_product_data_is_an_error() {
    let err = extract_shopify("<html><body>Not found</body></html>", URL, &profile()).unwrap_err();
    assert!(matches!(err, ExtractionError::NoProductData { .. }));
}

#[test]
fn style_slug_prefers_url_then_handle_then_title() {
    assert_eq!(style_slug(URL, Some("other"), "x"), "hemp-harem-pants");
    assert_eq!(
        style_slug("https://shop.example.com/p/1", Some("wrap-top"), "x"),
        "wrap-top"
    );
    assert_eq!(
        style_slug("https://shop.example.com/p/1", None, "Wrap Top (Black)"),
        "wrap-top-black"
    );
}
