pub mod app_config;
pub mod capabilities;
pub mod config;
pub mod records;
pub mod sites;

pub use app_config::AppConfig;
pub use capabilities::EnvironmentCapabilities;
pub use config::{load_app_config, load_app_config_from_env};
pub use records::{ProductRecord, ScrapeStatus, CSV_COLUMNS, MAX_GALLERY_IMAGES, SCHEMA_VERSION};
pub use sites::{load_sites, SiteProfile, SiteRegistry, StrategyKind, DEFAULT_SITE_KEY};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read sites file {path}: {source}")]
    SitesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sites file: {0}")]
    SitesFileParse(#[from] serde_yaml::Error),

    #[error("site configuration invalid: {0}")]
    Validation(String),
}
