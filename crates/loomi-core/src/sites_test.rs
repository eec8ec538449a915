use super::*;

const TWO_SITES: &str = r#"
sites:
  - key: alpha
    display_name: Alpha
    base_url: https://alpha.example.com
    collection_urls: [https://alpha.example.com/collections/all]
    output_file: alpha.csv
    strategies: [static_fetch, browser_render]
    extractor: shopify
    brand_name: Alpha
    source_site: alpha.example.com
  - key: beta
    display_name: Beta
    base_url: https://beta.example.com
    collection_urls: [https://beta.example.com/browse]
    output_file: beta.csv
    strategies: [browser_render]
    extractor: gap
    brand_name: Beta
    source_site: beta.example.com
"#;

fn browserless() -> EnvironmentCapabilities {
    EnvironmentCapabilities {
        sandboxed: true,
        browser_engine_importable: true,
        browser_launchable: false,
    }
}

#[test]
fn builtin_registry_loads_both_sites() {
    let registry = SiteRegistry::builtin().unwrap();
    assert_eq!(registry.keys(), vec!["buddhapants", "bananarepublic"]);
    assert!(registry.get(DEFAULT_SITE_KEY).is_some());
}

#[test]
fn builtin_profiles_declare_expected_strategies() {
    let registry = SiteRegistry::builtin().unwrap();
    let bp = registry.get("buddhapants").unwrap();
    assert_eq!(bp.strategies, vec![StrategyKind::StaticFetch]);
    assert_eq!(bp.extractor, "shopify");
    assert_eq!(bp.max_collection_pages, 10);

    let br = registry.get("bananarepublic").unwrap();
    assert_eq!(br.strategies, vec![StrategyKind::BrowserRender]);
    assert_eq!(br.collection_urls.len(), 8);
    assert_eq!(br.gallery_separator, ";");
}

#[test]
fn defaults_apply_for_optional_fields() {
    let registry = SiteRegistry::from_yaml(TWO_SITES).unwrap();
    let alpha = registry.get("alpha").unwrap();
    assert_eq!(alpha.max_collection_pages, 1);
    assert_eq!(alpha.gallery_separator, "|");
    assert!(alpha.selectors.is_empty());
    assert!(alpha.product_url_patterns.is_empty());
}

#[test]
fn ordered_viable_strategies_preserves_declared_order() {
    let registry = SiteRegistry::from_yaml(TWO_SITES).unwrap();
    let alpha = registry.get("alpha").unwrap();
    assert_eq!(
        alpha.ordered_viable_strategies(&EnvironmentCapabilities::with_browser()),
        vec![StrategyKind::StaticFetch, StrategyKind::BrowserRender]
    );
    assert_eq!(
        alpha.ordered_viable_strategies(&browserless()),
        vec![StrategyKind::StaticFetch]
    );
}

#[test]
fn browser_only_profile_has_no_viable_strategy_without_browser() {
    let registry = SiteRegistry::builtin().unwrap();
    for caps in [browserless(), EnvironmentCapabilities::static_only()] {
        for site in registry.iter() {
            let viable = site.ordered_viable_strategies(&caps);
            assert!(
                !viable.contains(&StrategyKind::BrowserRender),
                "site {} offered browser rendering without a browser",
                site.key
            );
        }
        let br = registry.get("bananarepublic").unwrap();
        assert!(br.ordered_viable_strategies(&caps).is_empty());
    }
}

#[test]
fn strategy_chain_joins_names() {
    let registry = SiteRegistry::from_yaml(TWO_SITES).unwrap();
    assert_eq!(
        registry.get("alpha").unwrap().strategy_chain(),
        "static_fetch -> browser_render"
    );
}

#[test]
fn selector_ignores_blank_entries() {
    let mut registry = SiteRegistry::builtin().unwrap();
    let site = registry.sites.first_mut().unwrap();
    site.selectors.insert("price".to_string(), "  ".to_string());
    assert_eq!(site.selector("price"), None);
    assert_eq!(site.selector("product_title"), Some("h1.product__title"));
}

#[test]
fn validate_rejects_duplicate_keys() {
    let yaml = TWO_SITES.replace("key: beta", "key: alpha");
    let err = SiteRegistry::from_yaml(&yaml).unwrap_err();
    assert!(err.to_string().contains("duplicate site key: 'alpha'"));
}

#[test]
fn validate_rejects_empty_strategy_list() {
    let yaml = TWO_SITES.replace("strategies: [browser_render]", "strategies: []");
    let err = SiteRegistry::from_yaml(&yaml).unwrap_err();
    assert!(err.to_string().contains("at least one strategy"));
}

#[test]
fn validate_rejects_non_http_base_url() {
    let yaml = TWO_SITES.replace("https://beta.example.com\n", "ftp://beta.example.com\n");
    let err = SiteRegistry::from_yaml(&yaml).unwrap_err();
    assert!(err.to_string().contains("http:// or https://"));
}

#[test]
fn validate_rejects_missing_collections() {
    let yaml = TWO_SITES.replace(
        "collection_urls: [https://beta.example.com/browse]",
        "collection_urls: []",
    );
    let err = SiteRegistry::from_yaml(&yaml).unwrap_err();
    assert!(err.to_string().contains("at least one collection URL"));
}

#[test]
fn unknown_strategy_name_is_a_parse_error() {
    let yaml = TWO_SITES.replace("[browser_render]", "[carrier_pigeon]");
    let err = SiteRegistry::from_yaml(&yaml).unwrap_err();
    assert!(matches!(err, ConfigError::SitesFileParse(_)));
}

#[test]
fn load_sites_reports_missing_file() {
    let err = load_sites(Path::new("/nonexistent/loomi/sites.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::SitesFileIo { .. }));
}
