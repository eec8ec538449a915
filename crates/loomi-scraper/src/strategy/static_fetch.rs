use std::sync::Arc;

use loomi_core::SiteProfile;
use reqwest::{Client, StatusCode};

use super::Readiness;
use crate::error::FetchError;
use crate::rate_limit::AdaptiveRateLimiter;
use crate::robots::{host_of, RobotsPolicy};

/// Plain HTTP fetching over a shared connection pool.
///
/// robots.txt for the site's own hosts is loaded in
/// [`StaticFetchStrategy::prepare`] and for product hosts once links are
/// known; the policy is read-only while product pages are fetched.
pub struct StaticFetchStrategy {
    client: Client,
    limiter: Arc<AdaptiveRateLimiter>,
    robots: RobotsPolicy,
}

impl StaticFetchStrategy {
    pub(crate) fn new(client: Client, limiter: Arc<AdaptiveRateLimiter>, user_agent: &str) -> Self {
        Self {
            client,
            limiter,
            robots: RobotsPolicy::new(user_agent),
        }
    }

    /// Loads robots.txt and keeps only the collection URLs it allows.
    pub(crate) async fn prepare(&mut self, profile: &SiteProfile) -> Readiness {
        let urls = std::iter::once(profile.base_url.as_str())
            .chain(profile.collection_urls.iter().map(String::as_str));
        self.robots.prefetch(&self.client, urls).await;

        let (allowed, blocked): (Vec<String>, Vec<String>) = profile
            .collection_urls
            .iter()
            .cloned()
            .partition(|url| self.robots.is_allowed(url));

        for url in &blocked {
            tracing::warn!(site = %profile.key, url = %url, "collection disallowed by robots.txt");
        }

        if allowed.is_empty() {
            let hosts: Vec<String> = blocked.iter().filter_map(|u| host_of(u)).collect();
            return Readiness::Unavailable(format!(
                "robots.txt disallows every collection page on {}",
                dedup_join(hosts)
            ));
        }

        Readiness::Ready {
            collection_urls: allowed,
        }
    }

    pub(crate) async fn load_robots<'a>(&mut self, urls: impl IntoIterator<Item = &'a str>) {
        self.robots.prefetch(&self.client, urls).await;
    }

    pub(crate) fn allows(&self, url: &str) -> bool {
        self.robots.is_allowed(url)
    }

    /// One GET, paced by the limiter. A 429 slows every later request to the host.
    pub(crate) async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let host = host_of(url).ok_or_else(|| FetchError::Permanent {
            url: url.to_string(),
            reason: "URL has no host".to_string(),
        })?;

        self.limiter.wait(&host).await;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            self.limiter.record_rate_limit(&host);
        }
        if !status.is_success() {
            return Err(FetchError::from_status(url, status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))
    }
}

fn dedup_join(mut items: Vec<String>) -> String {
    items.sort();
    items.dedup();
    items.join(", ")
}
