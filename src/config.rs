use crate::{HarvestError, Result};
use ::config::{Config, Environment, File};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::time::Duration;

/// The `HarvestConfig` struct holds the configuration settings for a harvesting run.
/// It includes the search queries, the page budget, the upstream API, pacing and reporting settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// The search queries, crawled in this order.
    #[serde(deserialize_with = "list_or_comma_separated")]
    pub queries: Vec<String>,
    /// The number of listing pages fetched for every query.
    pub pages_per_query: u32,
    /// The number of items requested per listing page.
    pub page_size: u32,
    /// The upstream API settings.
    pub api: ApiConfig,
    /// The delays inserted around outbound requests.
    pub pacing: PacingPolicy,
    /// The ranking and export settings.
    pub report: ReportConfig,
}

/// The `ApiConfig` struct holds the endpoints and client identity used for outbound requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// The listing (search) endpoint.
    pub listing_endpoint: String,
    /// The detail endpoint; the item identifier is appended as a path segment.
    pub detail_endpoint: String,
    /// The user agent string sent with every request. The upstream rejects unknown clients.
    pub user_agent: String,
    /// The timeout for a single HTTP request, in seconds.
    pub timeout_secs: u64,
}

/// The `PacingPolicy` struct holds the mandatory waits applied around requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacingPolicy {
    /// The wait before every listing-page request, in milliseconds.
    pub page_delay_ms: u64,
    /// The wait before every detail request, in milliseconds.
    pub detail_delay_ms: u64,
    /// The extra wait after a request answered with HTTP 403, in milliseconds.
    pub forbidden_backoff_ms: u64,
}

/// The `ReportConfig` struct holds the ranking and export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// The number of top skills kept in the ranking.
    pub top_n: usize,
    /// The CSV export path.
    pub csv_path: String,
    /// The number of decimals shown for percentages in the console table.
    pub table_precision: usize,
    /// Whether a progress spinner is drawn while detail records are fetched.
    pub show_progress: bool,
}

impl Default for HarvestConfig {
    /// Provides default values for the `HarvestConfig` struct.
    ///
    /// # Returns
    ///
    /// A `HarvestConfig` instance crawling hh.ru for the usual developer queries.
    fn default() -> Self {
        Self {
            queries: [
                "Программист",
                "Backend-разработчик",
                "Frontend-разработчик",
                "SQL разработчик",
                "Python разработчик",
                "JavaScript разработчик",
            ]
            .iter()
            .map(|q| q.to_string())
            .collect(),
            pages_per_query: crate::DEFAULT_PAGES_PER_QUERY,
            page_size: crate::DEFAULT_PAGE_SIZE,
            api: ApiConfig::default(),
            pacing: PacingPolicy::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listing_endpoint: String::from("https://api.hh.ru/vacancies"),
            detail_endpoint: String::from("https://api.hh.ru/vacancies"),
            user_agent: String::from(
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            ),
            timeout_secs: 30,
        }
    }
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            page_delay_ms: 1000,
            detail_delay_ms: 500,
            forbidden_backoff_ms: 5000,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: crate::DEFAULT_TOP_N,
            csv_path: String::from(crate::DEFAULT_CSV_PATH),
            table_precision: 0,
            show_progress: true,
        }
    }
}

impl PacingPolicy {
    /// A policy without any waits, for tests and local mirrors.
    pub fn none() -> Self {
        Self {
            page_delay_ms: 0,
            detail_delay_ms: 0,
            forbidden_backoff_ms: 0,
        }
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn detail_delay(&self) -> Duration {
        Duration::from_millis(self.detail_delay_ms)
    }

    pub fn forbidden_backoff(&self) -> Duration {
        Duration::from_millis(self.forbidden_backoff_ms)
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl HarvestConfig {
    /// Loads the configuration from defaults, an optional file and the environment.
    ///
    /// Sources are layered in this order, later ones winning:
    /// built-in defaults, the given file (or `skillstat.{toml,json,yaml}` in the
    /// working directory when `path` is `None`), then `SKILLSTAT__*` variables
    /// (`SKILLSTAT__REPORT__TOP_N=10`, `SKILLSTAT__QUERIES=Rust,Go`).
    ///
    /// # Arguments
    ///
    /// * `path` - An optional configuration file. A missing explicit file is an error.
    ///
    /// # Returns
    ///
    /// A validated `HarvestConfig`, or a `HarvestError::Config` describing the problem.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_layered(path, Environment::default())
    }

    fn load_layered(path: Option<&Path>, environment: Environment) -> Result<Self> {
        let defaults = Config::try_from(&HarvestConfig::default())?;

        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("skillstat").required(false),
        };

        let config: HarvestConfig = Config::builder()
            .add_source(defaults)
            .add_source(file)
            .add_source(
                environment
                    .prefix("SKILLSTAT")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the pipeline relies on.
    pub fn validate(&self) -> Result<()> {
        let problem = if self.queries.is_empty() {
            Some("at least one query is required")
        } else if self.pages_per_query == 0 {
            Some("pages_per_query must be greater than zero")
        } else if self.page_size == 0 {
            Some("page_size must be greater than zero")
        } else if self.report.top_n == 0 {
            Some("report.top_n must be greater than zero")
        } else {
            None
        };

        match problem {
            Some(message) => Err(HarvestError::Config(::config::ConfigError::Message(
                message.to_string(),
            ))),
            None => Ok(()),
        }
    }
}

/// Accepts the queries either as a list (config files) or as one comma separated
/// string (environment variables). Values are never type-guessed.
fn list_or_comma_separated<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Queries {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Queries::deserialize(deserializer)? {
        Queries::List(queries) => queries,
        Queries::Joined(joined) => joined
            .split(',')
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect(),
    })
}
