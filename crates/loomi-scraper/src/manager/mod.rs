//! One site run: strategy selection and fallback, product fetching, dedup and output.

mod summary;

pub use summary::{
    AttemptOutcome, ProductCounts, RunOutcome, ScrapeAttemptResult, ScrapeSummary, TriedStrategy,
};

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use csv::ByteRecord;
use futures::stream::{self, StreamExt};
use loomi_core::{EnvironmentCapabilities, ProductRecord, SiteProfile};
use thiserror::Error;

use crate::error::{ExtractionError, FetchError, ScraperError, StrategyError};
use crate::extract::Extractor;
use crate::links::{extract_product_links, paginated_url};
use crate::output::{self, ExistingOutput};
use crate::rate_limit::AdaptiveRateLimiter;
use crate::settings::ScrapeSettings;
use crate::strategy::{Readiness, Strategy};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a single product page produced no records.
#[derive(Debug, Error)]
enum ProductError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

/// Runs the configured strategies for one site, in declared order, until one
/// produces records.
///
/// The capability snapshot is passed in rather than probed here, so a run is
/// fully determined by its constructor arguments.
pub struct ScrapeManager {
    profile: Arc<SiteProfile>,
    extractor: Arc<dyn Extractor>,
    capabilities: EnvironmentCapabilities,
    settings: ScrapeSettings,
}

impl ScrapeManager {
    #[must_use]
    pub fn new(
        profile: Arc<SiteProfile>,
        extractor: Arc<dyn Extractor>,
        capabilities: EnvironmentCapabilities,
        settings: ScrapeSettings,
    ) -> Self {
        Self {
            profile,
            extractor,
            capabilities,
            settings,
        }
    }

    /// Scrapes the site and writes its CSV.
    ///
    /// Having no viable strategy, or every strategy failing, is reported in the
    /// returned summary rather than as an error; nothing is written in either case.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError`] if the existing output cannot be read, the HTTP
    /// client cannot be built, or the final CSV cannot be written.
    pub async fn run(&self) -> Result<ScrapeSummary, ScraperError> {
        let site = self.profile.key.clone();

        let viable = self.profile.ordered_viable_strategies(&self.capabilities);
        if viable.is_empty() {
            tracing::warn!(
                site = %site,
                chain = %self.profile.strategy_chain(),
                "no viable strategy in this environment"
            );
            return Ok(ScrapeSummary {
                site,
                outcome: RunOutcome::no_viable_strategy(
                    &self.profile.strategies,
                    &self.capabilities,
                ),
                counts: ProductCounts::default(),
                records_written: 0,
                output_path: None,
            });
        }

        let existing = if self.settings.resume {
            output::load_existing(&self.settings.output_path)?
        } else {
            ExistingOutput::default()
        };
        if existing.rows() > 0 {
            tracing::info!(
                site = %site,
                rows = existing.rows(),
                products = existing.product_urls.len(),
                "resuming from existing output"
            );
        }

        let client = build_client(&self.settings)?;
        let limiter = Arc::new(AdaptiveRateLimiter::new(
            self.settings.min_delay,
            self.settings.max_delay,
        ));

        let mut tried = Vec::new();
        let mut counts = ProductCounts::default();
        for kind in viable {
            tracing::info!(site = %site, strategy = %kind, "trying strategy");
            let mut strategy =
                Strategy::new(kind, &self.settings, client.clone(), Arc::clone(&limiter));
            let attempt = self.attempt(&mut strategy, &existing).await;
            strategy.shutdown().await;
            counts += attempt.counts;

            let reason = match attempt.outcome {
                AttemptOutcome::Success(records) => {
                    return self.finish(site, kind, counts, existing, records).await;
                }
                AttemptOutcome::Unavailable(reason) => reason,
                AttemptOutcome::Failed(err) => err.to_string(),
            };
            tracing::warn!(site = %site, strategy = %kind, reason = %reason, "strategy failed");
            tried.push(TriedStrategy {
                strategy: kind,
                reason,
            });
        }

        Ok(ScrapeSummary {
            site,
            outcome: RunOutcome::AllStrategiesExhausted { tried },
            counts,
            records_written: 0,
            output_path: None,
        })
    }

    async fn attempt(
        &self,
        strategy: &mut Strategy,
        existing: &ExistingOutput,
    ) -> ScrapeAttemptResult {
        let already_scraped = &existing.product_urls;
        let kind = strategy.kind();
        let collection_urls = match strategy.prepare(&self.profile).await {
            Ok(Readiness::Ready { collection_urls }) => collection_urls,
            Ok(Readiness::Unavailable(reason)) => {
                return ScrapeAttemptResult::unavailable(kind, reason);
            }
            Err(e) => {
                return ScrapeAttemptResult::failed(kind, e.into(), ProductCounts::default());
            }
        };

        let links = match self
            .discover_products(strategy, &collection_urls, already_scraped)
            .await
        {
            Ok(links) => links,
            Err(e) => {
                return ScrapeAttemptResult::failed(kind, e.into(), ProductCounts::default());
            }
        };
        if links.is_empty() {
            let error = StrategyError::NoProductLinks {
                collections: collection_urls.len(),
            };
            return ScrapeAttemptResult::failed(kind, error, ProductCounts::default());
        }

        // Product links may point at hosts no collection page lives on.
        strategy.load_robots(&links).await;
        let strategy: &Strategy = strategy;

        let mut counts = ProductCounts::default();
        let mut pending = Vec::new();
        for url in links {
            if already_scraped.contains(&url) {
                counts.skipped += 1;
            } else if !strategy.allows(&url) {
                tracing::debug!(url = %url, "product disallowed by robots.txt");
                counts.skipped += 1;
            } else {
                pending.push(url);
            }
        }
        if self.settings.max_products > 0 {
            pending.truncate(self.settings.max_products);
        }

        let records = self
            .fetch_products(strategy, pending, existing, &mut counts)
            .await;
        if counts.attempted > 0 && counts.succeeded == 0 {
            let error = StrategyError::AllProductsFailed {
                attempted: counts.attempted,
            };
            return ScrapeAttemptResult::failed(kind, error, counts);
        }

        ScrapeAttemptResult {
            strategy: kind,
            outcome: AttemptOutcome::Success(records),
            counts,
        }
    }

    /// Walks every collection page, sequentially, gathering product URLs.
    ///
    /// A failure on the first page of a collection fails the strategy; a
    /// failure on a later page only ends that collection's pagination.
    async fn discover_products(
        &self,
        strategy: &Strategy,
        collection_urls: &[String],
        already_scraped: &HashSet<String>,
    ) -> Result<Vec<String>, FetchError> {
        let cap = self.settings.max_products;
        let max_pages = self.profile.max_collection_pages.max(1);
        let mut links = BTreeSet::new();

        'collections: for collection in collection_urls {
            for page in 1..=max_pages {
                let url = paginated_url(collection, page);
                if page > 1 && !strategy.allows(&url) {
                    break;
                }

                let html = match strategy.fetch_collection(&url, &self.settings).await {
                    Ok(html) => html,
                    Err(e) if page == 1 => return Err(e),
                    Err(e) => {
                        tracing::debug!(url = %url, error = %e, "stopping pagination");
                        break;
                    }
                };

                let before = links.len();
                links.extend(extract_product_links(&html, &self.profile));
                let found = links.len() - before;
                tracing::debug!(url = %url, page, found, "collection page parsed");

                let fresh = links
                    .iter()
                    .filter(|u| !already_scraped.contains(*u))
                    .count();
                if cap > 0 && fresh >= cap {
                    tracing::info!(site = %self.profile.key, cap, "product cap reached");
                    break 'collections;
                }
                if found == 0 {
                    break;
                }
            }
        }

        tracing::info!(site = %self.profile.key, products = links.len(), "product links discovered");
        Ok(links.into_iter().collect())
    }

    async fn fetch_products(
        &self,
        strategy: &Strategy,
        pending: Vec<String>,
        existing: &ExistingOutput,
        counts: &mut ProductCounts,
    ) -> Vec<ProductRecord> {
        let concurrency = strategy.product_concurrency(self.settings.max_workers);
        tracing::info!(
            site = %self.profile.key,
            products = pending.len(),
            concurrency,
            "fetching product pages"
        );

        let mut results = stream::iter(pending)
            .map(|url| async move {
                let outcome = self.scrape_product(strategy, &url).await;
                (url, outcome)
            })
            .buffer_unordered(concurrency);

        let mut records = Vec::new();
        let mut since_checkpoint = 0usize;
        while let Some((url, outcome)) = results.next().await {
            counts.attempted += 1;
            match outcome {
                Ok(product_records) => {
                    counts.succeeded += 1;
                    tracing::debug!(url = %url, records = product_records.len(), "product scraped");
                    records.extend(product_records);

                    since_checkpoint += 1;
                    if self.settings.save_interval > 0
                        && since_checkpoint >= self.settings.save_interval
                    {
                        since_checkpoint = 0;
                        self.checkpoint(existing, &records).await;
                    }
                }
                Err(e) => {
                    counts.failed += 1;
                    tracing::warn!(url = %url, error = %e, "product failed");
                }
            }
        }
        records
    }

    /// Fetches one product page and runs the site's extractor on a blocking
    /// thread. A panicking extractor fails only this product.
    async fn scrape_product(
        &self,
        strategy: &Strategy,
        url: &str,
    ) -> Result<Vec<ProductRecord>, ProductError> {
        let raw = strategy.fetch_product(url, &self.settings).await?;

        let extractor = Arc::clone(&self.extractor);
        let profile = Arc::clone(&self.profile);
        let product_url = url.to_string();
        let joined =
            tokio::task::spawn_blocking(move || extractor.extract(&raw, &product_url, &profile))
                .await;

        let records = match joined {
            Ok(result) => result?,
            Err(e) => {
                return Err(ExtractionError::Panicked {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
                .into());
            }
        };
        if records.is_empty() {
            return Err(ExtractionError::NoProductData {
                url: url.to_string(),
            }
            .into());
        }
        Ok(records)
    }

    /// Best-effort write of everything gathered so far to the `.partial` file.
    async fn checkpoint(&self, existing: &ExistingOutput, records: &[ProductRecord]) {
        let path = self.settings.partial_path();
        let rows = output::dedupe(existing.records.iter().chain(records).cloned().collect());
        let carried = existing.carried.clone();
        let total = rows.len() + carried.len();

        match write_blocking(path.clone(), rows, carried).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), rows = total, "checkpoint written");
            }
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "checkpoint failed"),
        }
    }

    async fn finish(
        &self,
        site: String,
        strategy: loomi_core::StrategyKind,
        counts: ProductCounts,
        existing: ExistingOutput,
        records: Vec<ProductRecord>,
    ) -> Result<ScrapeSummary, ScraperError> {
        let ExistingOutput {
            records: mut rows,
            carried,
            ..
        } = existing;
        rows.extend(records);
        let rows = output::dedupe(rows);
        let total = rows.len() + carried.len();

        let path = &self.settings.output_path;
        write_blocking(path.clone(), rows, carried).await?;
        output::remove_if_exists(&self.settings.partial_path())?;
        tracing::info!(
            site = %site,
            strategy = %strategy,
            rows = total,
            path = %path.display(),
            "output written"
        );

        Ok(ScrapeSummary {
            site,
            outcome: RunOutcome::Completed { strategy },
            counts,
            records_written: total,
            output_path: Some(path.clone()),
        })
    }
}

/// Runs the CSV write on the blocking pool so the product stream keeps its thread.
async fn write_blocking(
    path: PathBuf,
    rows: Vec<ProductRecord>,
    carried: Vec<ByteRecord>,
) -> Result<(), ScraperError> {
    let display = path.display().to_string();
    tokio::task::spawn_blocking(move || output::write_records(&path, &rows, &carried))
        .await
        .map_err(|e| ScraperError::Io {
            path: display,
            source: std::io::Error::other(e),
        })?
}

fn build_client(settings: &ScrapeSettings) -> Result<reqwest::Client, ScraperError> {
    let client = reqwest::Client::builder()
        .timeout(settings.request_timeout)
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(settings.user_agent.as_str())
        .build()?;
    Ok(client)
}
