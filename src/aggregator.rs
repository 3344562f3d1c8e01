use crate::fetcher::{FetchOutcome, RateLimitedFetcher, RequestKind};
use crate::paginator::scalar_to_string;
use crate::{HarvestError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Occurrence counts per skill name.
///
/// Names are matched exactly (case-sensitive). Iteration follows first-insertion
/// order, which is what ranking falls back to for equal counts.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyTable {
    counts: IndexMap<String, u64>,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one occurrence of `name`, creating the entry at 1 if absent.
    pub fn increment(&mut self, name: &str) {
        match self.counts.get_mut(name) {
            Some(count) => *count += 1,
            None => {
                self.counts.insert(name.to_string(), 1);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.counts.get(name).copied()
    }

    /// The number of distinct skill names.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Entries in first-encountered order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(name, count)| (name.as_str(), *count))
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for FrequencyTable {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        Self {
            counts: iter.into_iter().map(|(name, count)| (name.into(), count)).collect(),
        }
    }
}

/// The part of a detail record the aggregator reads.
#[derive(Debug, Default, Deserialize)]
pub struct DetailRecord {
    #[serde(default)]
    pub key_skills: Option<Vec<Option<KeySkill>>>,
}

#[derive(Debug, Deserialize)]
pub struct KeySkill {
    #[serde(default)]
    pub name: Option<Value>,
}

impl DetailRecord {
    /// Skill names in record order, duplicates kept. Entries without a name are skipped.
    pub fn skill_names(&self) -> impl Iterator<Item = String> + '_ {
        self.key_skills
            .iter()
            .flatten()
            .flatten()
            .filter_map(|skill| skill.name.as_ref().and_then(scalar_to_string))
    }

    /// Adds every skill of this record to `table`.
    pub fn merge_into(&self, table: &mut FrequencyTable) {
        for name in self.skill_names() {
            table.increment(&name);
        }
    }
}

/// The `DetailAggregator` struct fetches detail records and merges their skills into a table.
pub struct DetailAggregator {
    /// The paced fetcher shared with the listing stage.
    fetcher: Arc<RateLimitedFetcher>,
    detail_endpoint: String,
}

impl DetailAggregator {
    pub fn new(fetcher: Arc<RateLimitedFetcher>, detail_endpoint: impl Into<String>) -> Self {
        Self {
            fetcher,
            detail_endpoint: detail_endpoint.into(),
        }
    }

    /// The detail URL of an item.
    pub fn detail_url(&self, item_id: &str) -> String {
        format!(
            "{}/{}",
            self.detail_endpoint.trim_end_matches('/'),
            urlencoding::encode(item_id)
        )
    }

    /// Fetches the detail record of `item_id` and merges its skills into `table`.
    ///
    /// HTTP and transport failures are logged and leave `table` untouched. A body that
    /// is not a JSON detail record is an error and ends the run.
    ///
    /// # Arguments
    ///
    /// * `item_id` - The item identifier from a listing page.
    /// * `table` - The running frequency table.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if the record was merged, `Ok(false)` if the fetch failed and the item
    /// was skipped, or a parse error for a malformed body.
    #[instrument(skip(self, table))]
    pub async fn aggregate(&self, item_id: &str, table: &mut FrequencyTable) -> Result<bool> {
        let url = self.detail_url(item_id);
        let outcome = self.fetcher.fetch(&url, RequestKind::Detail).await;

        let body = match outcome {
            FetchOutcome::Success(body) => body,
            FetchOutcome::HttpError { status, .. } => {
                warn!("Failed to fetch vacancy {}: HTTP {}", item_id, status);
                self.fetcher.back_off_if_forbidden(&outcome).await;
                return Ok(false);
            }
            FetchOutcome::TransportError(message) => {
                warn!("Failed to fetch vacancy {}: {}", item_id, message);
                return Ok(false);
            }
        };

        let record: DetailRecord =
            serde_json::from_str(&body).map_err(|source| HarvestError::Parse {
                context: format!("vacancy {}", item_id),
                source,
            })?;
        record.merge_into(table);
        debug!("Merged vacancy {}", item_id);
        Ok(true)
    }
}
