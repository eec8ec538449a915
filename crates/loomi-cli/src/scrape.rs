//! Handlers behind the CLI flags.
//!
//! Called from `main` once config and logging are set up. Every outcome of a
//! scrape, including having no usable strategy, is returned as a summary; only
//! configuration problems and output failures become errors.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use loomi_core::{AppConfig, EnvironmentCapabilities, SiteProfile, SiteRegistry};
use loomi_scraper::{
    EnvironmentProbe, ExtractorRegistry, ProbeOptions, ScrapeManager, ScrapeSettings,
    ScrapeSummary,
};

/// Per-invocation overrides of the configured scrape settings.
#[derive(Debug, Default)]
pub(crate) struct RunOptions {
    pub fresh: bool,
    pub workers: Option<usize>,
}

/// Site profiles from `path`, or the built-in profiles when `None`.
pub(crate) fn load_registry(path: Option<&Path>) -> anyhow::Result<SiteRegistry> {
    let registry = match path {
        Some(path) => loomi_core::load_sites(path)?,
        None => SiteRegistry::builtin()?,
    };
    Ok(registry)
}

/// Looks up `site_key`, naming the known sites when it is not configured.
pub(crate) fn resolve_site<'a>(
    registry: &'a SiteRegistry,
    site_key: &str,
) -> anyhow::Result<&'a SiteProfile> {
    registry.get(site_key).ok_or_else(|| {
        anyhow::anyhow!(
            "unknown site '{site_key}' (available: {})",
            registry.keys().join(", ")
        )
    })
}

pub(crate) fn format_sites(registry: &SiteRegistry) -> String {
    let mut out = String::from("Configured sites:\n");
    for site in registry.iter() {
        let _ = writeln!(
            out,
            "  {:<16} {:<20} {}",
            site.key,
            site.display_name,
            site.strategy_chain()
        );
    }
    out
}

pub(crate) fn format_capabilities(caps: &EnvironmentCapabilities) -> String {
    let mut out = String::from("Environment capabilities:\n");
    for (label, value) in caps.flags() {
        let mark = if value { "✓" } else { "✗" };
        let _ = writeln!(out, "  {mark} {label}");
    }
    if let Some(blocker) = caps.browser_blocker() {
        let _ = writeln!(out, "  browser rendering unavailable: {blocker}");
    }
    out
}

pub(crate) async fn probe(config: &AppConfig) -> EnvironmentCapabilities {
    EnvironmentProbe::probe(&ProbeOptions::from_config(config)).await
}

/// Scrapes one site end to end and returns what happened.
///
/// # Errors
///
/// Returns an error if the site is unknown, its extractor is not registered,
/// or the output cannot be read or written.
pub(crate) async fn run_site(
    config: &AppConfig,
    registry: &SiteRegistry,
    site_key: &str,
    options: &RunOptions,
) -> anyhow::Result<ScrapeSummary> {
    let profile = resolve_site(registry, site_key)?;
    let extractor = ExtractorRegistry::with_defaults().get(&profile.extractor)?;

    let mut settings = ScrapeSettings::from_config(config, profile);
    settings.resume = !options.fresh;
    if let Some(workers) = options.workers {
        settings.max_workers = workers.max(1);
    }

    let caps = probe(config).await;
    tracing::info!(
        site = %profile.key,
        chain = %profile.strategy_chain(),
        output = %settings.output_path.display(),
        resume = settings.resume,
        "starting scrape"
    );

    let manager = ScrapeManager::new(Arc::new(profile.clone()), extractor, caps, settings);
    let summary = manager.run().await?;
    Ok(summary)
}
