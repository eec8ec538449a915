pub mod browser;
pub mod error;
pub mod extract;
pub mod links;
pub mod manager;
pub mod output;
pub mod probe;
pub mod rate_limit;
mod retry;
pub mod robots;
pub mod settings;
pub mod strategy;

pub use error::{ExtractionError, FetchError, ScraperError, StrategyError};
pub use extract::{Extractor, ExtractorRegistry};
pub use manager::{
    AttemptOutcome, ProductCounts, RunOutcome, ScrapeAttemptResult, ScrapeManager, ScrapeSummary,
    TriedStrategy,
};
pub use probe::{EnvironmentProbe, ProbeOptions};
pub use rate_limit::AdaptiveRateLimiter;
pub use robots::RobotsPolicy;
pub use settings::ScrapeSettings;
