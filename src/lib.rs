use std::path::PathBuf;
use thiserror::Error;

pub mod aggregator;
pub mod config;
pub mod export;
pub mod fetcher;
pub mod harvest;
pub mod paginator;
pub mod report;

// Re-export commonly used types
pub use aggregator::{DetailAggregator, FrequencyTable};
pub use self::config::{HarvestConfig, PacingPolicy};
pub use fetcher::{FetchOutcome, RateLimitedFetcher, RequestKind};
pub use harvest::{HarvestRun, HarvestStats, Harvester};
pub use paginator::{ListingItem, ListingPaginator, PageRequest};
pub use report::{RankedEntry, SkillReport};

/// The `HarvestError` enum represents the unrecoverable errors of a harvesting run.
///
/// Expected per-request failures (non-2xx statuses, transport problems) are not
/// errors; they are reported through [`FetchOutcome`] and handled where they occur.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Represents a failure to build the HTTP client.
    #[error("HTTP client setup failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Represents a response body that is not the expected JSON document.
    #[error("Malformed JSON in {context}: {source}")]
    Parse {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    /// Represents a filesystem failure while writing an export.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Represents a failure while serializing CSV rows.
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),
    /// Represents an invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),
}

/// A type alias for `Result` with the `HarvestError` error type.
pub type Result<T> = std::result::Result<T, HarvestError>;

// Constants

/// The source tag attached to every ranked entry.
pub const SOURCE_TAG: &str = "hh.ru";
/// The description placeholder attached to every ranked entry.
pub const DESCRIPTION_PLACEHOLDER: &str = "No description available";
/// The default number of listing pages fetched per query.
pub const DEFAULT_PAGES_PER_QUERY: u32 = 3;
/// The default number of items requested per listing page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;
/// The default number of entries kept in the ranking.
pub const DEFAULT_TOP_N: usize = 20;
/// The default CSV export path, relative to the working directory.
pub const DEFAULT_CSV_PATH: &str = "competencies.csv";
