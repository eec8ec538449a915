//! Headless browser session used by the probe and the browser rendering strategy.
//!
//! The engine is only compiled in with the `browser` feature. Without it,
//! launching always fails with [`FetchError::EngineLaunch`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use loomi_core::AppConfig;

use crate::error::FetchError;

/// Well-known install locations checked before searching `PATH`.
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

const CHROME_COMMANDS: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
];

/// Counts DOM nodes so the scroll loop can tell when lazy loading has stopped.
#[cfg(feature = "browser")]
const NODE_COUNT_SCRIPT: &str = "document.getElementsByTagName('*').length";

#[cfg(feature = "browser")]
const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight)";

/// Pause after each scroll for lazy content to arrive.
#[cfg(feature = "browser")]
const SCROLL_PAUSE: Duration = Duration::from_secs(1);

/// Pause after navigating to a product page for client-side rendering to finish.
#[cfg(feature = "browser")]
const PRODUCT_SETTLE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub chrome_path: Option<PathBuf>,
    pub page_timeout: Duration,
    pub scroll_attempts: u32,
    pub user_agent: String,
}

impl BrowserOptions {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            chrome_path: config.chrome_path.clone(),
            page_timeout: Duration::from_secs(config.browser_page_timeout_secs),
            scroll_attempts: config.browser_scroll_attempts,
            user_agent: config.scraper_user_agent.clone(),
        }
    }
}

/// Locates a Chrome or Chromium executable.
///
/// An explicit path is used only if it exists; otherwise the well-known install
/// locations are checked, then `PATH`.
#[must_use]
pub fn find_chrome(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    CHROME_PATHS
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
        .or_else(|| CHROME_COMMANDS.iter().find_map(|cmd| which::which(cmd).ok()))
}

/// A running headless browser.
///
/// Dropping the session kills the browser process and stops its event
/// handler; [`BrowserSession::close`] does the same gracefully.
#[cfg(feature = "browser")]
pub struct BrowserSession {
    browser: chromiumoxide::Browser,
    handler: tokio::task::JoinHandle<()>,
    options: BrowserOptions,
}

#[cfg(feature = "browser")]
impl BrowserSession {
    /// Launches a headless browser.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::EngineLaunch`] if no executable is found or the
    /// process fails to start.
    pub async fn launch(options: &BrowserOptions) -> Result<Self, FetchError> {
        use chromiumoxide::{Browser, BrowserConfig};
        use futures::StreamExt;

        let chrome = find_chrome(options.chrome_path.as_deref()).ok_or_else(|| {
            FetchError::EngineLaunch {
                reason: "no Chrome or Chromium executable found".to_string(),
            }
        })?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome)
            .request_timeout(options.page_timeout)
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg(format!("--user-agent={}", options.user_agent))
            .build()
            .map_err(|reason| FetchError::EngineLaunch { reason })?;

        let (browser, mut handler) =
            Browser::launch(config)
                .await
                .map_err(|e| FetchError::EngineLaunch {
                    reason: e.to_string(),
                })?;

        let handler = tokio::spawn(async move { while handler.next().await.is_some() {} });

        tracing::debug!("headless browser launched");
        Ok(Self {
            browser,
            handler,
            options: options.clone(),
        })
    }

    /// Navigates a fresh page to `url` and returns the rendered DOM.
    ///
    /// With `scroll` set, the page is scrolled to the bottom until the DOM
    /// stops growing or the configured scroll cap is reached. The page is
    /// closed whether or not rendering succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Timeout`] if navigation exceeds the page timeout,
    /// or [`FetchError::Transient`] for other engine failures.
    pub async fn render(&self, url: &str, scroll: bool) -> Result<String, FetchError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| engine_error(url, &e))?;

        let result = self.render_on(&page, url, scroll).await;

        if let Err(e) = page.close().await {
            tracing::debug!(url, error = %e, "failed to close browser page");
        }
        result
    }

    async fn render_on(
        &self,
        page: &chromiumoxide::Page,
        url: &str,
        scroll: bool,
    ) -> Result<String, FetchError> {
        match tokio::time::timeout(self.options.page_timeout, page.goto(url)).await {
            Err(_) => {
                return Err(FetchError::Timeout {
                    url: url.to_string(),
                })
            }
            Ok(Err(e)) => return Err(engine_error(url, &e)),
            Ok(Ok(_)) => {}
        }

        if scroll {
            let mut last = node_count(page).await;
            for attempt in 0..self.options.scroll_attempts {
                page.evaluate(SCROLL_SCRIPT)
                    .await
                    .map_err(|e| engine_error(url, &e))?;
                tokio::time::sleep(SCROLL_PAUSE).await;

                let count = node_count(page).await;
                if count <= last {
                    tracing::debug!(url, attempt, nodes = count, "no new content after scroll");
                    break;
                }
                last = count;
            }
        } else {
            tokio::time::sleep(PRODUCT_SETTLE).await;
        }

        page.content().await.map_err(|e| engine_error(url, &e))
    }

    /// Closes the browser and waits for the process to exit.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::debug!(error = %e, "browser close failed");
        }
        if let Err(e) = self.browser.wait().await {
            tracing::debug!(error = %e, "browser wait failed");
        }
        self.handler.abort();
    }
}

#[cfg(feature = "browser")]
impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

#[cfg(feature = "browser")]
async fn node_count(page: &chromiumoxide::Page) -> i64 {
    match page.evaluate(NODE_COUNT_SCRIPT).await {
        Ok(result) => result.into_value::<i64>().unwrap_or(0),
        Err(_) => 0,
    }
}

#[cfg(feature = "browser")]
fn engine_error(url: &str, err: &chromiumoxide::error::CdpError) -> FetchError {
    FetchError::Transient {
        url: url.to_string(),
        status: None,
        reason: err.to_string(),
    }
}

/// Stand-in used when the crate is built without a browser engine.
#[cfg(not(feature = "browser"))]
pub struct BrowserSession {
    _private: (),
}

#[cfg(not(feature = "browser"))]
impl BrowserSession {
    /// Always fails: no engine is compiled in.
    ///
    /// # Errors
    ///
    /// Always returns [`FetchError::EngineLaunch`].
    #[allow(clippy::unused_async)]
    pub async fn launch(_options: &BrowserOptions) -> Result<Self, FetchError> {
        Err(FetchError::EngineLaunch {
            reason: "built without the `browser` feature".to_string(),
        })
    }

    /// Unreachable in practice since no session can be launched.
    ///
    /// # Errors
    ///
    /// Always returns [`FetchError::EngineLaunch`].
    #[allow(clippy::unused_async)]
    pub async fn render(&self, _url: &str, _scroll: bool) -> Result<String, FetchError> {
        Err(FetchError::EngineLaunch {
            reason: "built without the `browser` feature".to_string(),
        })
    }

    #[allow(clippy::unused_async)]
    pub async fn close(self) {}
}
