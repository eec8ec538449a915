//! robots.txt policy, fetched once per host before any page request.

use std::collections::HashMap;

use reqwest::{Client, Url};
use robotstxt::DefaultMatcher;

/// `host[:port]` of `url`, or `None` for URLs without a host.
pub(crate) fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Cached robots.txt bodies keyed by host.
///
/// A host whose robots.txt could not be fetched, or returned a non-success
/// status, allows everything. The cache is filled by [`RobotsPolicy::prefetch`]
/// and only read afterwards.
#[derive(Debug, Default)]
pub struct RobotsPolicy {
    user_agent: String,
    bodies: HashMap<String, Option<String>>,
}

impl RobotsPolicy {
    #[must_use]
    pub fn new(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            bodies: HashMap::new(),
        }
    }

    /// Fetches robots.txt for every host in `urls` not already cached.
    pub async fn prefetch<'a, I>(&mut self, client: &Client, urls: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for url in urls {
            let (Ok(parsed), Some(host)) = (Url::parse(url), host_of(url)) else {
                continue;
            };
            if self.bodies.contains_key(&host) {
                continue;
            }

            let robots_url = format!("{}://{host}/robots.txt", parsed.scheme());
            let body = fetch_robots(client, &robots_url).await;
            tracing::debug!(host = %host, found = body.is_some(), "robots.txt loaded");
            self.bodies.insert(host, body);
        }
    }

    /// Inserts a robots.txt body for `host` (as `host[:port]`) directly.
    pub fn insert(&mut self, host: &str, body: Option<String>) {
        self.bodies.insert(host.to_string(), body);
    }

    /// Whether the configured user agent may fetch `url`.
    ///
    /// Answers from the cache only; a host that was never prefetched is allowed.
    #[must_use]
    pub fn is_allowed(&self, url: &str) -> bool {
        let Some(host) = host_of(url) else {
            return true;
        };
        match self.bodies.get(&host) {
            Some(Some(body)) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(body, &self.user_agent, url)
            }
            _ => true,
        }
    }
}

async fn fetch_robots(client: &Client, robots_url: &str) -> Option<String> {
    match client.get(robots_url).send().await {
        Ok(resp) if resp.status().is_success() => resp.text().await.ok(),
        Ok(resp) => {
            tracing::debug!(url = robots_url, status = %resp.status(), "no robots.txt");
            None
        }
        Err(e) => {
            tracing::debug!(url = robots_url, error = %e, "robots.txt fetch failed");
            None
        }
    }
}
