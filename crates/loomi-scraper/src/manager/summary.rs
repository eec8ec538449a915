use std::fmt;
use std::ops::AddAssign;
use std::path::PathBuf;

use loomi_core::{EnvironmentCapabilities, ProductRecord, StrategyKind};

use crate::error::StrategyError;

/// Per-product tallies for one strategy attempt, or summed over a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductCounts {
    /// Product pages fetched or attempted.
    pub attempted: usize,
    /// Product pages that yielded at least one record.
    pub succeeded: usize,
    /// Product URLs not fetched: already scraped, or disallowed by robots.txt.
    pub skipped: usize,
    /// Product pages whose fetch or extraction failed.
    pub failed: usize,
}

impl AddAssign for ProductCounts {
    fn add_assign(&mut self, other: Self) {
        self.attempted += other.attempted;
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

#[derive(Debug)]
pub enum AttemptOutcome {
    Success(Vec<ProductRecord>),
    Unavailable(String),
    Failed(StrategyError),
}

/// Outcome of running one strategy against one site.
#[derive(Debug)]
pub struct ScrapeAttemptResult {
    pub strategy: StrategyKind,
    pub outcome: AttemptOutcome,
    pub counts: ProductCounts,
}

impl ScrapeAttemptResult {
    pub(crate) fn unavailable(strategy: StrategyKind, reason: String) -> Self {
        Self {
            strategy,
            outcome: AttemptOutcome::Unavailable(reason),
            counts: ProductCounts::default(),
        }
    }

    pub(crate) fn failed(
        strategy: StrategyKind,
        error: StrategyError,
        counts: ProductCounts,
    ) -> Self {
        Self {
            strategy,
            outcome: AttemptOutcome::Failed(error),
            counts,
        }
    }
}

/// A strategy that was tried and did not produce records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriedStrategy {
    pub strategy: StrategyKind,
    pub reason: String,
}

/// Terminal state of a site run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { strategy: StrategyKind },
    /// No configured strategy is viable in this environment. Nothing was fetched.
    NoViableStrategy {
        configured: Vec<StrategyKind>,
        missing: Vec<TriedStrategy>,
    },
    /// Every viable strategy was tried and none produced records.
    AllStrategiesExhausted { tried: Vec<TriedStrategy> },
}

impl RunOutcome {
    /// Outcome for a site whose strategies all fail the capability check.
    #[must_use]
    pub fn no_viable_strategy(configured: &[StrategyKind], caps: &EnvironmentCapabilities) -> Self {
        let missing = configured
            .iter()
            .filter(|kind| !kind.is_viable(caps))
            .map(|&strategy| TriedStrategy {
                strategy,
                reason: match strategy {
                    StrategyKind::BrowserRender => caps
                        .browser_blocker()
                        .unwrap_or("browser rendering unavailable")
                        .to_string(),
                    StrategyKind::StaticFetch => "static fetching unavailable".to_string(),
                },
            })
            .collect();
        RunOutcome::NoViableStrategy {
            configured: configured.to_vec(),
            missing,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }
}

/// What a [`crate::ScrapeManager`] run did, for printing to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub site: String,
    pub outcome: RunOutcome,
    /// Tallies summed over every strategy attempted.
    pub counts: ProductCounts,
    /// Rows in the final output file, including rows kept from a previous run.
    pub records_written: usize,
    pub output_path: Option<PathBuf>,
}

impl fmt::Display for ScrapeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            RunOutcome::Completed { strategy } => {
                writeln!(f, "Scrape of {} completed using {strategy}.", self.site)?;
            }
            RunOutcome::NoViableStrategy {
                configured,
                missing,
            } => {
                let chain: Vec<&str> = configured.iter().map(|k| k.name()).collect();
                writeln!(
                    f,
                    "All strategies exhausted for {}: no viable strategy in this environment \
                     (configured: {}).",
                    self.site,
                    chain.join(" -> ")
                )?;
                for m in missing {
                    writeln!(f, "  {}: {}", m.strategy, m.reason)?;
                }
            }
            RunOutcome::AllStrategiesExhausted { tried } => {
                writeln!(f, "All strategies exhausted for {}.", self.site)?;
                for t in tried {
                    writeln!(f, "  {} failed: {}", t.strategy, t.reason)?;
                }
            }
        }

        writeln!(
            f,
            "  products: {} attempted, {} succeeded, {} skipped, {} failed",
            self.counts.attempted, self.counts.succeeded, self.counts.skipped, self.counts.failed
        )?;
        match &self.output_path {
            Some(path) => write!(f, "  wrote {} rows to {}", self.records_written, path.display()),
            None => write!(f, "  no output written"),
        }
    }
}
