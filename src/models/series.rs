use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::FlowRecord;

/// Display name and issuer for one fund in a source's catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundInfo {
    pub name: String,
    pub issuer: String,
}

/// Series-level metadata persisted alongside the daily flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesMetadata {
    pub description: String,
    pub source: String,
    pub etf_info: BTreeMap<String, FundInfo>,
    pub tickers: Vec<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

/// The durable per-source document: metadata scaffold plus the date-keyed
/// flow series. This JSON layout is the contract the dashboard reads.
///
/// Invariant: `daily_flows` is sorted ascending by date with at most one
/// record per date. The store owns all read-modify-write access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSeries {
    pub metadata: SeriesMetadata,
    pub daily_flows: Vec<FlowRecord>,
}

impl SourceSeries {
    pub fn record_count(&self) -> usize {
        self.daily_flows.len()
    }

    pub fn latest(&self) -> Option<&FlowRecord> {
        self.daily_flows.last()
    }
}
