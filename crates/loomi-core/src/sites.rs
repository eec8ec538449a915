use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::capabilities::EnvironmentCapabilities;
use crate::ConfigError;

/// Site scraped when the CLI is run without a site argument.
pub const DEFAULT_SITE_KEY: &str = "buddhapants";

const BUILTIN_SITES: &str = include_str!("../../../config/sites.yaml");

/// The two ways a page can be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    StaticFetch,
    BrowserRender,
}

impl StrategyKind {
    /// Whether this strategy can run given the probed environment.
    #[must_use]
    pub fn is_viable(self, caps: &EnvironmentCapabilities) -> bool {
        match self {
            StrategyKind::StaticFetch => true,
            StrategyKind::BrowserRender => caps.browser_launchable,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::StaticFetch => "static_fetch",
            StrategyKind::BrowserRender => "browser_render",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn default_max_collection_pages() -> u32 {
    1
}

fn default_gallery_separator() -> String {
    "|".to_string()
}

/// Declarative description of one target site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    pub key: String,
    pub display_name: String,
    pub base_url: String,
    pub collection_urls: Vec<String>,
    pub output_file: String,
    /// Acceptable strategies in priority order.
    pub strategies: Vec<StrategyKind>,
    #[serde(default)]
    pub selectors: BTreeMap<String, String>,
    /// Keyword found in a product title mapped to the category it implies.
    #[serde(default)]
    pub category_keywords: BTreeMap<String, String>,
    /// Name of the registered extraction function.
    pub extractor: String,
    /// Substrings a link must contain to count as a product page.
    #[serde(default)]
    pub product_url_patterns: Vec<String>,
    pub brand_name: String,
    pub source_site: String,
    #[serde(default = "default_max_collection_pages")]
    pub max_collection_pages: u32,
    #[serde(default = "default_gallery_separator")]
    pub gallery_separator: String,
}

impl SiteProfile {
    /// Configured strategies that can run under `caps`, in declared order.
    #[must_use]
    pub fn ordered_viable_strategies(&self, caps: &EnvironmentCapabilities) -> Vec<StrategyKind> {
        self.strategies
            .iter()
            .copied()
            .filter(|kind| kind.is_viable(caps))
            .collect()
    }

    /// Selector registered under `name`, if any.
    #[must_use]
    pub fn selector(&self, name: &str) -> Option<&str> {
        self.selectors
            .get(name)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Strategy chain rendered as `static_fetch -> browser_render`.
    #[must_use]
    pub fn strategy_chain(&self) -> String {
        self.strategies
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

#[derive(Debug, Deserialize)]
struct SitesFile {
    sites: Vec<SiteProfile>,
}

/// Site profiles keyed by `key`, kept in declaration order.
#[derive(Debug, Clone)]
pub struct SiteRegistry {
    sites: Vec<SiteProfile>,
}

impl SiteRegistry {
    /// Profiles compiled into the binary from `config/sites.yaml`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the embedded file fails to parse or validate.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml(BUILTIN_SITES)
    }

    /// Parse and validate a registry from YAML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the text cannot be parsed or fails validation.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let file: SitesFile = serde_yaml::from_str(content).map_err(ConfigError::SitesFileParse)?;
        validate_sites(&file.sites)?;
        Ok(Self { sites: file.sites })
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SiteProfile> {
        self.sites.iter().find(|s| s.key == key)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.sites.iter().map(|s| s.key.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteProfile> {
        self.sites.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// Load and validate site profiles from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_sites(path: &Path) -> Result<SiteRegistry, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::SitesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    SiteRegistry::from_yaml(&content)
}

fn validate_sites(sites: &[SiteProfile]) -> Result<(), ConfigError> {
    if sites.is_empty() {
        return Err(ConfigError::Validation(
            "at least one site must be configured".to_string(),
        ));
    }

    let mut seen_keys = HashSet::new();

    for site in sites {
        if site.key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "site key must be non-empty".to_string(),
            ));
        }

        if !seen_keys.insert(site.key.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate site key: '{}'",
                site.key
            )));
        }

        if !(site.base_url.starts_with("http://") || site.base_url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "site '{}' has base_url '{}'; must start with http:// or https://",
                site.key, site.base_url
            )));
        }

        if site.collection_urls.is_empty() {
            return Err(ConfigError::Validation(format!(
                "site '{}' must list at least one collection URL",
                site.key
            )));
        }

        if site.strategies.is_empty() {
            return Err(ConfigError::Validation(format!(
                "site '{}' must list at least one strategy",
                site.key
            )));
        }

        if site.output_file.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "site '{}' has an empty output_file",
                site.key
            )));
        }

        if site.extractor.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "site '{}' must name an extractor",
                site.key
            )));
        }

        if site.max_collection_pages == 0 {
            return Err(ConfigError::Validation(format!(
                "site '{}' has max_collection_pages 0; must be at least 1",
                site.key
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "sites_test.rs"]
mod tests;
