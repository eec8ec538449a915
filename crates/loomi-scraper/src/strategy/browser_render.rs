use std::sync::Arc;

use loomi_core::SiteProfile;
use tokio::sync::Mutex;

use super::Readiness;
use crate::browser::{BrowserOptions, BrowserSession};
use crate::error::FetchError;
use crate::rate_limit::AdaptiveRateLimiter;
use crate::robots::host_of;

/// Renders pages in one headless browser owned by this strategy.
///
/// The browser is launched in [`BrowserRenderStrategy::prepare`] and released
/// in [`BrowserRenderStrategy::shutdown`], or when the strategy is dropped.
pub struct BrowserRenderStrategy {
    options: BrowserOptions,
    limiter: Arc<AdaptiveRateLimiter>,
    session: Mutex<Option<BrowserSession>>,
}

impl BrowserRenderStrategy {
    pub(crate) fn new(options: BrowserOptions, limiter: Arc<AdaptiveRateLimiter>) -> Self {
        Self {
            options,
            limiter,
            session: Mutex::new(None),
        }
    }

    pub(crate) async fn prepare(&mut self, profile: &SiteProfile) -> Result<Readiness, FetchError> {
        let slot = self.session.get_mut();
        if slot.is_none() {
            *slot = Some(BrowserSession::launch(&self.options).await?);
        }
        Ok(Readiness::Ready {
            collection_urls: profile.collection_urls.clone(),
        })
    }

    pub(crate) async fn fetch(&self, url: &str, scroll: bool) -> Result<String, FetchError> {
        if let Some(host) = host_of(url) {
            self.limiter.wait(&host).await;
        }

        let guard = self.session.lock().await;
        let session = guard.as_ref().ok_or_else(|| FetchError::EngineLaunch {
            reason: "browser not started".to_string(),
        })?;
        session.render(url, scroll).await
    }

    pub(crate) async fn shutdown(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.close().await;
            tracing::debug!("headless browser closed");
        }
    }
}
