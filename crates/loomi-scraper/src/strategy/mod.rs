//! The two ways of fetching a page, behind one uniform surface.
//!
//! Both variants retry retryable [`FetchError`]s with exponential backoff and
//! honour the shared [`AdaptiveRateLimiter`] before every request.

mod browser_render;
mod static_fetch;

use std::sync::Arc;

use loomi_core::{EnvironmentCapabilities, SiteProfile, StrategyKind};

pub use browser_render::BrowserRenderStrategy;
pub use static_fetch::StaticFetchStrategy;

use crate::error::FetchError;
use crate::rate_limit::AdaptiveRateLimiter;
use crate::retry::retry_with_backoff;
use crate::settings::ScrapeSettings;

/// Result of preparing a strategy for one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Ready to fetch the listed collection URLs.
    Ready { collection_urls: Vec<String> },
    /// The strategy cannot be used for this site; the reason is user-facing.
    Unavailable(String),
}

pub enum Strategy {
    StaticFetch(StaticFetchStrategy),
    BrowserRender(BrowserRenderStrategy),
}

impl Strategy {
    /// Builds the strategy for `kind`. The client and limiter are shared across strategies.
    #[must_use]
    pub fn new(
        kind: StrategyKind,
        settings: &ScrapeSettings,
        client: reqwest::Client,
        limiter: Arc<AdaptiveRateLimiter>,
    ) -> Self {
        match kind {
            StrategyKind::StaticFetch => Strategy::StaticFetch(StaticFetchStrategy::new(
                client,
                limiter,
                &settings.user_agent,
            )),
            StrategyKind::BrowserRender => Strategy::BrowserRender(BrowserRenderStrategy::new(
                settings.browser.clone(),
                limiter,
            )),
        }
    }

    #[must_use]
    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::StaticFetch(_) => StrategyKind::StaticFetch,
            Strategy::BrowserRender(_) => StrategyKind::BrowserRender,
        }
    }

    #[must_use]
    pub fn is_viable(&self, caps: &EnvironmentCapabilities) -> bool {
        self.kind().is_viable(caps)
    }

    /// Product-page concurrency this strategy supports given the configured pool size.
    #[must_use]
    pub fn product_concurrency(&self, configured: usize) -> usize {
        match self {
            Strategy::StaticFetch(_) => configured.max(1),
            Strategy::BrowserRender(_) => 1,
        }
    }

    /// Acquires whatever the strategy needs before the first fetch for `profile`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::EngineLaunch`] if the browser engine cannot start.
    pub async fn prepare(&mut self, profile: &SiteProfile) -> Result<Readiness, FetchError> {
        match self {
            Strategy::StaticFetch(s) => Ok(s.prepare(profile).await),
            Strategy::BrowserRender(s) => s.prepare(profile).await,
        }
    }

    /// Loads robots.txt for any host among `urls` not seen yet, so that
    /// [`Strategy::allows`] can answer for them.
    pub async fn load_robots(&mut self, urls: &[String]) {
        if let Strategy::StaticFetch(s) = self {
            s.load_robots(urls.iter().map(String::as_str)).await;
        }
    }

    /// Whether `url` may be fetched by this strategy.
    #[must_use]
    pub fn allows(&self, url: &str) -> bool {
        match self {
            Strategy::StaticFetch(s) => s.allows(url),
            Strategy::BrowserRender(_) => true,
        }
    }

    /// Fetches a collection page, retrying retryable failures.
    ///
    /// # Errors
    ///
    /// Returns the last [`FetchError`] once retries are exhausted, or the first
    /// non-retryable one.
    pub async fn fetch_collection(
        &self,
        url: &str,
        settings: &ScrapeSettings,
    ) -> Result<String, FetchError> {
        retry_with_backoff(
            settings.max_retries,
            settings.retry_backoff_base_ms,
            || async move {
                match self {
                    Strategy::StaticFetch(s) => s.fetch(url).await,
                    Strategy::BrowserRender(s) => s.fetch(url, true).await,
                }
            },
        )
        .await
    }

    /// Fetches a product page, retrying retryable failures.
    ///
    /// # Errors
    ///
    /// Returns the last [`FetchError`] once retries are exhausted, or the first
    /// non-retryable one.
    pub async fn fetch_product(
        &self,
        url: &str,
        settings: &ScrapeSettings,
    ) -> Result<String, FetchError> {
        retry_with_backoff(
            settings.max_retries,
            settings.retry_backoff_base_ms,
            || async move {
                match self {
                    Strategy::StaticFetch(s) => s.fetch(url).await,
                    Strategy::BrowserRender(s) => s.fetch(url, false).await,
                }
            },
        )
        .await
    }

    /// Releases anything acquired in [`Strategy::prepare`].
    pub async fn shutdown(&mut self) {
        if let Strategy::BrowserRender(s) = self {
            s.shutdown().await;
        }
    }
}
