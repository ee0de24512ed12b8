//! Durable per-source series store: load, merge by date, atomic write-back.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::constants::DEBUG_ARTIFACT_PREFIX;
use crate::error::{Error, Result};
use crate::models::{FlowRecord, SeriesMetadata, SourceSeries};

/// Counts returned by a merge, for observability.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub added: usize,
    pub updated: usize,
    /// Existing detailed records an empty update tried to overwrite.
    pub preserved: usize,
}

/// Merge a batch of freshly extracted records into a series.
///
/// Upsert by date: unknown dates append, known dates replace — except that
/// an all-zero record never replaces one holding non-zero detail (sources
/// intermittently return successful-but-empty responses for days already
/// captured). The collection is re-sorted afterwards to guard against
/// out-of-order batches, and `last_updated` is refreshed.
pub fn merge_records(
    series: &mut SourceSeries,
    new_records: Vec<FlowRecord>,
    tickers: &[String],
) -> MergeStats {
    let mut stats = MergeStats::default();

    for record in new_records {
        match series.daily_flows.iter().position(|r| r.date == record.date) {
            Some(idx) => {
                let existing = &series.daily_flows[idx];
                if record.is_empty_update() && !existing.is_empty_update() {
                    debug!("Keeping detailed record for {} over empty update", record.date);
                    stats.preserved += 1;
                    continue;
                }
                if *existing != record {
                    series.daily_flows[idx] = record;
                    stats.updated += 1;
                }
            }
            None => {
                series.daily_flows.push(record);
                stats.added += 1;
            }
        }
    }

    series.daily_flows.sort_by_key(|r| r.date);
    series.metadata.tickers = tickers.to_vec();
    series.metadata.last_updated = Some(Utc::now());
    stats
}

/// Owns read-modify-write access to the series files in one data directory.
pub struct FlowStore {
    data_dir: PathBuf,
}

impl FlowStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn series_path(&self, source: &SourceConfig) -> PathBuf {
        self.data_dir.join(&source.output_file)
    }

    /// Load the persisted series, or build the metadata scaffold on first
    /// sight of a source.
    pub fn load_or_init(&self, source: &SourceConfig) -> Result<SourceSeries> {
        let path = self.series_path(source);
        if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| Error::Persistence(format!("read {}: {}", path.display(), e)))?;
            let series = serde_json::from_str(&raw)
                .map_err(|e| Error::Persistence(format!("decode {}: {}", path.display(), e)))?;
            return Ok(series);
        }
        debug!("No existing series at {}, starting empty", path.display());
        Ok(SourceSeries {
            metadata: SeriesMetadata {
                description: source.description.clone(),
                source: source.source_label.clone(),
                etf_info: source.funds.iter().cloned().collect(),
                tickers: source.tickers(),
                last_updated: None,
            },
            daily_flows: Vec::new(),
        })
    }

    /// Whole-file replace via temp file + rename, so a failed write never
    /// leaves a half-written series behind.
    pub fn save(&self, source: &SourceConfig, series: &SourceSeries) -> Result<()> {
        fs::create_dir_all(&self.data_dir)
            .map_err(|e| Error::Persistence(format!("create data dir: {}", e)))?;

        let path = self.series_path(source);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(series)
            .map_err(|e| Error::Persistence(format!("encode series: {}", e)))?;

        fs::write(&tmp, json)
            .map_err(|e| Error::Persistence(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &path)
            .map_err(|e| Error::Persistence(format!("rename to {}: {}", path.display(), e)))?;

        info!(
            "Saved {} records → {}",
            series.daily_flows.len(),
            path.display()
        );
        Ok(())
    }

    /// Dump raw fetched content for offline inspection after a failed run.
    /// Diagnostic only; nothing ever reads it back.
    pub fn write_debug_artifact(&self, key: &str, content: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.data_dir)
            .map_err(|e| Error::Persistence(format!("create data dir: {}", e)))?;
        let path = self
            .data_dir
            .join(format!("{}{}.html", DEBUG_ARTIFACT_PREFIX, key));
        fs::write(&path, content)
            .map_err(|e| Error::Persistence(format!("write {}: {}", path.display(), e)))?;
        Ok(path)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{btc_source, SourceConfig};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn record(day: u32, values: &[(&str, f64)], total: f64) -> FlowRecord {
        FlowRecord {
            date: NaiveDate::from_ymd_opt(2026, 1, day).unwrap(),
            flows: values.iter().map(|(t, v)| (t.to_string(), *v)).collect(),
            total,
        }
    }

    fn empty_series(source: &SourceConfig) -> SourceSeries {
        FlowStore::new("unused").load_or_init(source).unwrap()
    }

    #[test]
    fn test_merge_appends_and_sorts() {
        let source = btc_source();
        let mut series = empty_series(&source);
        let tickers = source.tickers();

        let batch = vec![
            record(5, &[("IBIT", 2.0)], 2.0),
            record(1, &[("IBIT", 1.0)], 1.0),
            record(3, &[("IBIT", 3.0)], 3.0),
        ];
        let stats = merge_records(&mut series, batch, &tickers);
        assert_eq!(stats.added, 3);
        assert_eq!(stats.updated, 0);

        let dates: Vec<String> = series.daily_flows.iter().map(|r| r.date.to_string()).collect();
        assert_eq!(dates, vec!["2026-01-01", "2026-01-03", "2026-01-05"]);
        assert!(series.metadata.last_updated.is_some());
    }

    #[test]
    fn test_merge_is_idempotent() {
        let source = btc_source();
        let mut series = empty_series(&source);
        let tickers = source.tickers();
        let batch = vec![record(1, &[("IBIT", 1.0)], 1.0), record(2, &[("IBIT", 2.0)], 2.0)];

        merge_records(&mut series, batch.clone(), &tickers);
        let once = series.daily_flows.clone();
        merge_records(&mut series, batch, &tickers);
        assert_eq!(series.daily_flows, once);
    }

    #[test]
    fn test_merge_replaces_by_date() {
        let source = btc_source();
        let mut series = empty_series(&source);
        let tickers = source.tickers();

        merge_records(&mut series, vec![record(1, &[("IBIT", 1.0)], 1.0)], &tickers);
        let stats = merge_records(&mut series, vec![record(1, &[("IBIT", 9.0)], 9.0)], &tickers);
        assert_eq!(stats.added, 0);
        assert_eq!(stats.updated, 1);
        assert_eq!(series.daily_flows.len(), 1);
        assert_eq!(series.daily_flows[0].total, 9.0);
    }

    #[test]
    fn test_empty_update_never_reduces_detail() {
        let source = btc_source();
        let mut series = empty_series(&source);
        let tickers = source.tickers();

        merge_records(
            &mut series,
            vec![record(1, &[("IBIT", 120.5), ("FBTC", -3.0)], 117.5)],
            &tickers,
        );
        let detailed = series.daily_flows[0].clone();

        let stats = merge_records(
            &mut series,
            vec![record(1, &[("IBIT", 0.0), ("FBTC", 0.0)], 0.0)],
            &tickers,
        );
        assert_eq!(stats.preserved, 1);
        assert_eq!(stats.updated, 0);
        assert_eq!(series.daily_flows[0], detailed);

        // An empty record may still replace an empty one.
        let mut empty = empty_series(&source);
        merge_records(&mut empty, vec![record(2, &[("IBIT", 0.0)], 0.0)], &tickers);
        let stats = merge_records(&mut empty, vec![record(2, &[("IBIT", 0.0)], 0.0)], &tickers);
        assert_eq!(stats.preserved, 0);
    }

    #[test]
    fn test_no_duplicate_dates_after_merge() {
        let source = btc_source();
        let mut series = empty_series(&source);
        let tickers = source.tickers();

        // Batch containing the same date twice: last one wins.
        let batch = vec![record(1, &[("IBIT", 1.0)], 1.0), record(1, &[("IBIT", 2.0)], 2.0)];
        merge_records(&mut series, batch, &tickers);
        assert_eq!(series.daily_flows.len(), 1);
        assert_eq!(series.daily_flows[0].total, 2.0);
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempdir().unwrap();
        let store = FlowStore::new(dir.path());
        let source = btc_source();

        let mut series = store.load_or_init(&source).unwrap();
        assert_eq!(series.daily_flows.len(), 0);
        assert_eq!(series.metadata.tickers, source.tickers());

        merge_records(
            &mut series,
            vec![record(1, &[("IBIT", 10.0)], 10.0)],
            &source.tickers(),
        );
        store.save(&source, &series).unwrap();

        let reloaded = store.load_or_init(&source).unwrap();
        assert_eq!(reloaded.daily_flows, series.daily_flows);
        assert_eq!(reloaded.metadata.description, source.description);
        // No stray temp file left behind.
        assert!(!store.series_path(&source).with_extension("json.tmp").exists());
    }

    #[test]
    fn test_debug_artifact_path() {
        let dir = tempdir().unwrap();
        let store = FlowStore::new(dir.path());
        let path = store.write_debug_artifact("eth", "<html>challenge</html>").unwrap();
        assert!(path.ends_with("_debug_eth.html"));
        assert_eq!(fs::read_to_string(path).unwrap(), "<html>challenge</html>");
    }
}
