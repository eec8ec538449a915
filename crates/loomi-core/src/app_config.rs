use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log_level: String,
    /// YAML file of site profiles. `None` uses the profiles compiled into the binary.
    pub sites_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Forces the environment probe to report a sandbox, disabling browser rendering.
    pub force_sandboxed: bool,
    pub chrome_path: Option<PathBuf>,
    pub scraper_request_timeout_secs: u64,
    pub scraper_user_agent: String,
    pub scraper_max_workers: usize,
    pub scraper_max_retries: u32,
    pub scraper_retry_backoff_base_ms: u64,
    pub scraper_min_delay_ms: u64,
    pub scraper_max_delay_ms: u64,
    pub scraper_max_products: usize,
    pub scraper_save_interval: usize,
    pub browser_scroll_attempts: u32,
    pub browser_page_timeout_secs: u64,
}

impl AppConfig {
    /// Resolves a site's output file name against the configured output directory.
    #[must_use]
    pub fn output_path(&self, output_file: &str) -> PathBuf {
        self.output_dir.join(output_file)
    }
}
