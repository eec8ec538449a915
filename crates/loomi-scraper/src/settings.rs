use std::path::PathBuf;
use std::time::Duration;

use loomi_core::{AppConfig, SiteProfile};

use crate::browser::BrowserOptions;

/// Everything a [`crate::ScrapeManager`] run needs besides the profile itself.
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Product-page concurrency for static fetching. Browser rendering always uses one.
    pub max_workers: usize,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub max_products: usize,
    /// Write a `.partial` checkpoint every N successful products. `0` disables it.
    pub save_interval: usize,
    /// Skip product URLs already present in `output_path` and keep their rows.
    pub resume: bool,
    pub output_path: PathBuf,
    pub browser: BrowserOptions,
}

impl ScrapeSettings {
    /// Settings for scraping `profile` under `config`, with resume enabled.
    #[must_use]
    pub fn from_config(config: &AppConfig, profile: &SiteProfile) -> Self {
        Self {
            request_timeout: Duration::from_secs(config.scraper_request_timeout_secs),
            user_agent: config.scraper_user_agent.clone(),
            max_workers: config.scraper_max_workers.max(1),
            max_retries: config.scraper_max_retries,
            retry_backoff_base_ms: config.scraper_retry_backoff_base_ms,
            min_delay: Duration::from_millis(config.scraper_min_delay_ms),
            max_delay: Duration::from_millis(config.scraper_max_delay_ms),
            max_products: config.scraper_max_products,
            save_interval: config.scraper_save_interval,
            resume: true,
            output_path: config.output_path(&profile.output_file),
            browser: BrowserOptions::from_config(config),
        }
    }

    /// Path of the in-progress checkpoint file next to the output.
    #[must_use]
    pub fn partial_path(&self) -> PathBuf {
        let mut name = self.output_path.as_os_str().to_owned();
        name.push(".partial");
        PathBuf::from(name)
    }
}
