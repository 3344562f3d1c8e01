use crate::aggregator::{DetailAggregator, FrequencyTable};
use crate::config::HarvestConfig;
use crate::fetcher::RateLimitedFetcher;
use crate::paginator::ListingPaginator;
use crate::report::SkillReport;
use crate::Result;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Counters describing one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestStats {
    pub pages_requested: u32,
    pub pages_failed: u32,
    /// Detail fetches initiated, successful or not.
    pub details_attempted: u64,
    pub details_failed: u64,
}

/// The state a run leaves behind: the skill counts and the percentage denominator.
#[derive(Debug, Default, Clone)]
pub struct HarvestRun {
    pub table: FrequencyTable,
    /// Incremented once per item whose detail fetch was started, even if it failed.
    pub total_count: u64,
    pub stats: HarvestStats,
}

impl HarvestRun {
    /// Ranks the run's table into a report.
    pub fn report(&self, top_n: usize) -> SkillReport {
        SkillReport::new(&self.table, self.total_count, top_n, self.stats)
    }
}

/// The `Harvester` struct drives a full run: every listing page, then every detail record.
pub struct Harvester {
    config: HarvestConfig,
    paginator: ListingPaginator,
    aggregator: DetailAggregator,
}

impl Harvester {
    /// Creates a new `Harvester` with the given configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Harvester`, or an error if the HTTP client could not be created.
    pub fn new(config: HarvestConfig) -> Result<Self> {
        let fetcher = Arc::new(RateLimitedFetcher::new(&config.api, config.pacing)?);
        let paginator = ListingPaginator::new(
            fetcher.clone(),
            config.api.listing_endpoint.clone(),
            config.pages_per_query,
            config.page_size,
        );
        let aggregator = DetailAggregator::new(fetcher, config.api.detail_endpoint.clone());

        Ok(Self {
            config,
            paginator,
            aggregator,
        })
    }

    /// Runs the whole crawl sequentially.
    ///
    /// Each item's detail record is fetched as soon as the item is read from its page.
    /// Failed requests are logged and skipped; a malformed listing page or detail record
    /// aborts the run.
    pub async fn run(&self) -> Result<HarvestRun> {
        let progress = if self.config.report.show_progress {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
                pb.set_style(style);
            }
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        } else {
            ProgressBar::hidden()
        };

        let pages_before = self.paginator.stats();
        let mut run = HarvestRun::default();
        let items = self.paginator.items(&self.config.queries);
        futures::pin_mut!(items);

        while let Some(item) = items.next().await {
            let item = match item {
                Ok(item) => item,
                Err(e) => {
                    progress.abandon_with_message("Aborted: malformed listing page");
                    return Err(e);
                }
            };
            run.total_count += 1;
            progress.set_message(format!("Fetching vacancy {} (#{})", item.id, run.total_count));

            match self.aggregator.aggregate(&item.id, &mut run.table).await {
                Ok(true) => {}
                Ok(false) => run.stats.details_failed += 1,
                Err(e) => {
                    progress.abandon_with_message(format!("Aborted at vacancy {}", item.id));
                    return Err(e);
                }
            }
        }

        let pages = self.paginator.stats();
        run.stats.pages_requested = pages.requested - pages_before.requested;
        run.stats.pages_failed = pages.failed - pages_before.failed;
        run.stats.details_attempted = run.total_count;

        progress.finish_with_message(format!(
            "Completed: {} vacancies, {} distinct skills",
            run.total_count,
            run.table.len()
        ));
        info!(
            "Run finished: {} of {} pages failed, {} of {} vacancies failed",
            run.stats.pages_failed,
            run.stats.pages_requested,
            run.stats.details_failed,
            run.stats.details_attempted
        );

        Ok(run)
    }

    /// Runs the crawl and ranks the result.
    pub async fn harvest(&self) -> Result<SkillReport> {
        let run = self.run().await?;
        Ok(run.report(self.config.report.top_n))
    }
}
