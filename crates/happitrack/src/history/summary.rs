use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::LogEntry;
use crate::mood::scorer::round_one_decimal;

/// Arithmetic mean of the entry scores; 0 for an empty history.
pub fn average_score(entries: &[LogEntry]) -> f64 {
    if entries.is_empty() {
        return 0.0;
    }
    let total: f64 = entries.iter().map(|entry| entry.score.value()).sum();
    total / entries.len() as f64
}

/// Aggregate view rendered next to the history listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySummary {
    pub count: usize,
    pub average: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lowest: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highest: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<DateTime<Utc>>,
}

impl HistorySummary {
    pub fn from_entries(entries: &[LogEntry]) -> Self {
        let scores = entries.iter().map(|entry| entry.score.value());
        Self {
            count: entries.len(),
            average: round_one_decimal(average_score(entries)),
            lowest: scores.clone().reduce(f64::min),
            highest: scores.reduce(f64::max),
            latest: entries.iter().map(|entry| entry.recorded_at).max(),
        }
    }
}
