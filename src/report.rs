use crate::aggregator::FrequencyTable;
use crate::harvest::HarvestStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub name: String,
    pub source: String,
    pub description: String,
    pub count: u64,
    /// `100 * count / total`, or 0 when nothing was processed.
    pub percent: f64,
}

/// Ranks `table` by descending count and keeps the first `top_n` entries.
///
/// The sort is stable, so equal counts keep the table's first-encountered order.
pub fn rank(table: &FrequencyTable, total_count: u64, top_n: usize) -> Vec<RankedEntry> {
    let mut entries: Vec<(&str, u64)> = table.iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));

    entries
        .into_iter()
        .take(top_n)
        .map(|(name, count)| RankedEntry {
            name: name.to_string(),
            source: crate::SOURCE_TAG.to_string(),
            description: crate::DESCRIPTION_PLACEHOLDER.to_string(),
            count,
            percent: percent_of(count, total_count),
        })
        .collect()
}

fn percent_of(count: u64, total_count: u64) -> f64 {
    if total_count == 0 {
        0.0
    } else {
        count as f64 * 100.0 / total_count as f64
    }
}

/// The `SkillReport` struct is the result of one run: the ranking and what it was computed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillReport {
    pub entries: Vec<RankedEntry>,
    /// The percentage denominator: detail fetches initiated.
    pub total_count: u64,
    pub distinct_skills: usize,
    pub stats: HarvestStats,
    pub generated_at: DateTime<Utc>,
}

impl SkillReport {
    /// Builds the report of a finished run.
    pub fn new(
        table: &FrequencyTable,
        total_count: u64,
        top_n: usize,
        stats: HarvestStats,
    ) -> Self {
        Self {
            entries: rank(table, total_count, top_n),
            total_count,
            distinct_skills: table.len(),
            stats,
            generated_at: Utc::now(),
        }
    }
}
