use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One day's per-ticker net flows plus the aggregate total, in US$M.
///
/// `flows` always carries the full ticker set declared for the source;
/// tickers the source did not report for that day are stored as 0.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub date: NaiveDate,
    pub flows: BTreeMap<String, f64>,
    pub total: f64,
}

impl FlowRecord {
    /// True when the record carries no information at all: every per-ticker
    /// flow is zero and the total is zero. Sources intermittently return
    /// such records for days already captured with real detail; the store
    /// must never let one of them clobber a detailed record.
    pub fn is_empty_update(&self) -> bool {
        self.total == 0.0 && self.flows.values().all(|v| *v == 0.0)
    }
}
