use crate::app_config::AppConfig;
use crate::ConfigError;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a variable is present but cannot be parsed.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a variable is present but cannot be parsed.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Every setting has a default, so the only failure mode is a value that is
/// set but unparseable.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_flag = |var: &str| -> Result<bool, ConfigError> {
        match lookup(var) {
            Err(_) => Ok(false),
            Ok(raw) => parse_bool(&raw).ok_or_else(|| {
                invalid(var, format!("expected true/false/1/0, got \"{raw}\""))
            }),
        }
    };

    let log_level = or_default("LOOMI_LOG_LEVEL", "info");
    let sites_path = lookup("LOOMI_SITES_PATH").ok().map(PathBuf::from);
    let output_dir = PathBuf::from(or_default("LOOMI_OUTPUT_DIR", "."));
    let force_sandboxed = parse_flag("LOOMI_SANDBOXED")?;
    let chrome_path = lookup("LOOMI_CHROME_PATH").ok().map(PathBuf::from);

    let scraper_request_timeout_secs = parse_u64("LOOMI_SCRAPER_REQUEST_TIMEOUT_SECS", "30")?;
    let scraper_user_agent = or_default("LOOMI_SCRAPER_USER_AGENT", DEFAULT_USER_AGENT);
    let scraper_max_workers = parse_usize("LOOMI_SCRAPER_MAX_WORKERS", "5")?;
    let scraper_max_retries = parse_u32("LOOMI_SCRAPER_MAX_RETRIES", "3")?;
    let scraper_retry_backoff_base_ms = parse_u64("LOOMI_SCRAPER_RETRY_BACKOFF_BASE_MS", "1000")?;
    let scraper_min_delay_ms = parse_u64("LOOMI_SCRAPER_MIN_DELAY_MS", "300")?;
    let scraper_max_delay_ms = parse_u64("LOOMI_SCRAPER_MAX_DELAY_MS", "10000")?;
    let scraper_max_products = parse_usize("LOOMI_SCRAPER_MAX_PRODUCTS", "100")?;
    let scraper_save_interval = parse_usize("LOOMI_SCRAPER_SAVE_INTERVAL", "25")?;
    let browser_scroll_attempts = parse_u32("LOOMI_BROWSER_SCROLL_ATTEMPTS", "10")?;
    let browser_page_timeout_secs = parse_u64("LOOMI_BROWSER_PAGE_TIMEOUT_SECS", "60")?;

    if scraper_max_delay_ms == 0 {
        return Err(invalid(
            "LOOMI_SCRAPER_MAX_DELAY_MS",
            "must be greater than 0 so rate-limited hosts can be slowed down".to_string(),
        ));
    }
    if scraper_min_delay_ms > scraper_max_delay_ms {
        return Err(invalid(
            "LOOMI_SCRAPER_MIN_DELAY_MS",
            format!(
                "minimum delay {scraper_min_delay_ms}ms exceeds maximum delay {scraper_max_delay_ms}ms"
            ),
        ));
    }

    Ok(AppConfig {
        log_level,
        sites_path,
        output_dir,
        force_sandboxed,
        chrome_path,
        scraper_request_timeout_secs,
        scraper_user_agent,
        scraper_max_workers,
        scraper_max_retries,
        scraper_retry_backoff_base_ms,
        scraper_min_delay_ms,
        scraper_max_delay_ms,
        scraper_max_products,
        scraper_save_interval,
        browser_scroll_attempts,
        browser_page_timeout_secs,
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::env::VarError;
    use std::path::PathBuf;

    use super::*;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("1"), Some(true));
        assert_eq!(parse_bool("YES"), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn build_app_config_uses_defaults_for_empty_env() {
        let map: HashMap<&str, &str> = HashMap::new();
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.log_level, "info");
        assert!(cfg.sites_path.is_none());
        assert_eq!(cfg.output_dir, PathBuf::from("."));
        assert!(!cfg.force_sandboxed);
        assert!(cfg.chrome_path.is_none());
        assert_eq!(cfg.scraper_request_timeout_secs, 30);
        assert_eq!(cfg.scraper_user_agent, DEFAULT_USER_AGENT);
        assert_eq!(cfg.scraper_max_workers, 5);
        assert_eq!(cfg.scraper_max_retries, 3);
        assert_eq!(cfg.scraper_retry_backoff_base_ms, 1000);
        assert_eq!(cfg.scraper_min_delay_ms, 300);
        assert_eq!(cfg.scraper_max_delay_ms, 10_000);
        assert_eq!(cfg.scraper_max_products, 100);
        assert_eq!(cfg.scraper_save_interval, 25);
        assert_eq!(cfg.browser_scroll_attempts, 10);
        assert_eq!(cfg.browser_page_timeout_secs, 60);
    }

    #[test]
    fn build_app_config_reads_overrides() {
        let mut map = HashMap::new();
        map.insert("LOOMI_SITES_PATH", "/etc/loomi/sites.yaml");
        map.insert("LOOMI_OUTPUT_DIR", "/tmp/out");
        map.insert("LOOMI_SANDBOXED", "1");
        map.insert("LOOMI_SCRAPER_MAX_WORKERS", "8");
        map.insert("LOOMI_SCRAPER_USER_AGENT", "loomi-test/1.0");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.sites_path, Some(PathBuf::from("/etc/loomi/sites.yaml")));
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/out"));
        assert!(cfg.force_sandboxed);
        assert_eq!(cfg.scraper_max_workers, 8);
        assert_eq!(cfg.scraper_user_agent, "loomi-test/1.0");
    }

    #[test]
    fn build_app_config_rejects_invalid_worker_count() {
        let mut map = HashMap::new();
        map.insert("LOOMI_SCRAPER_MAX_WORKERS", "lots");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "LOOMI_SCRAPER_MAX_WORKERS"),
            "expected InvalidEnvVar(LOOMI_SCRAPER_MAX_WORKERS), got: {result:?}"
        );
    }

    #[test]
    fn build_app_config_rejects_invalid_sandbox_flag() {
        let mut map = HashMap::new();
        map.insert("LOOMI_SANDBOXED", "sometimes");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "LOOMI_SANDBOXED"),
            "expected InvalidEnvVar(LOOMI_SANDBOXED), got: {result:?}"
        );
    }

    #[test]
    fn build_app_config_rejects_inverted_delay_bounds() {
        let mut map = HashMap::new();
        map.insert("LOOMI_SCRAPER_MIN_DELAY_MS", "5000");
        map.insert("LOOMI_SCRAPER_MAX_DELAY_MS", "1000");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "LOOMI_SCRAPER_MIN_DELAY_MS"),
            "expected InvalidEnvVar(LOOMI_SCRAPER_MIN_DELAY_MS), got: {result:?}"
        );
    }

    #[test]
    fn build_app_config_accepts_zero_min_delay_but_not_zero_ceiling() {
        let mut map = HashMap::new();
        map.insert("LOOMI_SCRAPER_MIN_DELAY_MS", "0");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.scraper_min_delay_ms, 0);

        map.insert("LOOMI_SCRAPER_MAX_DELAY_MS", "0");
        let result = build_app_config(lookup_from_map(&map));
        assert!(
            matches!(result, Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "LOOMI_SCRAPER_MAX_DELAY_MS"),
            "expected InvalidEnvVar(LOOMI_SCRAPER_MAX_DELAY_MS), got: {result:?}"
        );
    }

    #[test]
    fn output_path_joins_output_dir() {
        let mut map = HashMap::new();
        map.insert("LOOMI_OUTPUT_DIR", "data");
        let cfg = build_app_config(lookup_from_map(&map)).unwrap();
        assert_eq!(
            cfg.output_path("buddhapants_raw.csv"),
            PathBuf::from("data").join("buddhapants_raw.csv")
        );
    }
}
