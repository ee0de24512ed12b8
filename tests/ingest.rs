//! End-to-end ingestion over the public API: extract a table, merge it into
//! a fresh series, persist, and re-ingest a noisier batch without losing data.

use etfflows::config::{btc_source, eth_source};
use etfflows::services::{extract_records, merge_records, FlowStore};
use tempfile::tempdir;

const BTC_PAGE: &str = r#"
<html><body>
  <table>
    <thead>
      <tr><th>Date</th><th>IBIT</th><th>FBTC</th><th>GBTC</th><th>Totals</th></tr>
    </thead>
    <tbody>
      <tr><td>Feb 03, 2026</td><td>120.5</td><td>(30.2)</td><td>0.0</td><td>90.3</td></tr>
      <tr><td>Feb 04, 2026</td><td>50.0</td><td>10.0</td><td>(5.0)</td><td>55.0</td></tr>
      <tr><td>Feb 05, 2026</td><td>-</td><td>-</td><td>-</td><td>-</td></tr>
      <tr><td>Total</td><td>170.5</td><td>(20.2)</td><td>(5.0)</td><td>145.3</td></tr>
    </tbody>
  </table>
</body></html>"#;

#[test]
fn ingest_merge_and_reingest_round_trip() {
    let dir = tempdir().unwrap();
    let store = FlowStore::new(dir.path());
    let source = btc_source();

    // First pull: two data rows survive (pending day and summary row drop).
    let extraction = extract_records(BTC_PAGE, &source);
    assert_eq!(extraction.tickers, vec!["IBIT", "FBTC", "GBTC"]);
    assert_eq!(extraction.records.len(), 2);
    assert_eq!(extraction.records[0].date.to_string(), "2026-02-03");
    assert_eq!(extraction.records[0].flows["FBTC"], -30.2);
    assert_eq!(extraction.records[0].total, 90.3);

    let mut series = store.load_or_init(&source).unwrap();
    let stats = merge_records(&mut series, extraction.records, &extraction.tickers);
    assert_eq!((stats.added, stats.updated), (2, 0));
    store.save(&source, &series).unwrap();

    // Second pull: the source now reports Feb 04 as all zeros (a known
    // empty-update glitch) and adds Feb 05 for real.
    let next_page = BTC_PAGE
        .replace(
            "<tr><td>Feb 04, 2026</td><td>50.0</td><td>10.0</td><td>(5.0)</td><td>55.0</td></tr>",
            "<tr><td>Feb 04, 2026</td><td>0.0</td><td>0.0</td><td>0.0</td><td>0.0</td></tr>",
        )
        .replace(
            "<tr><td>Feb 05, 2026</td><td>-</td><td>-</td><td>-</td><td>-</td></tr>",
            "<tr><td>Feb 05, 2026</td><td>7.5</td><td>-</td><td>-</td><td>7.5</td></tr>",
        );

    let mut series = store.load_or_init(&source).unwrap();
    let extraction = extract_records(&next_page, &source);
    let stats = merge_records(&mut series, extraction.records, &extraction.tickers);
    assert_eq!(stats.added, 1); // Feb 05
    assert_eq!(stats.preserved, 1); // Feb 04 detail kept
    store.save(&source, &series).unwrap();

    let reloaded = store.load_or_init(&source).unwrap();
    let dates: Vec<String> = reloaded
        .daily_flows
        .iter()
        .map(|r| r.date.to_string())
        .collect();
    assert_eq!(dates, vec!["2026-02-03", "2026-02-04", "2026-02-05"]);
    // Feb 04 still holds the original detail.
    assert_eq!(reloaded.daily_flows[1].flows["IBIT"], 50.0);
    assert_eq!(reloaded.daily_flows[1].total, 55.0);
    // Feb 05 carries the partial day: reported tickers only, rest zero.
    assert_eq!(reloaded.daily_flows[2].flows["IBIT"], 7.5);
    assert_eq!(reloaded.daily_flows[2].flows["FBTC"], 0.0);
    assert_eq!(reloaded.daily_flows[2].total, 7.5);
}

#[test]
fn merging_same_extraction_twice_is_idempotent() {
    let source = eth_source();
    let page = r#"<table class="etf">
          <thead>
            <tr><th>Ethereum Flows</th></tr>
            <tr><th></th><th>ETHA</th><th>FETH</th><th>Total</th></tr>
          </thead>
          <tbody>
            <tr><td>23 Jan 2026</td><td>44.5</td><td>(4.5)</td><td>40.0</td></tr>
          </tbody>
        </table>"#;

    let dir = tempdir().unwrap();
    let store = FlowStore::new(dir.path());
    let mut series = store.load_or_init(&source).unwrap();

    let first = extract_records(page, &source);
    merge_records(&mut series, first.records, &first.tickers);
    let snapshot = series.daily_flows.clone();

    let second = extract_records(page, &source);
    let stats = merge_records(&mut series, second.records, &second.tickers);
    assert_eq!(stats.added, 0);
    assert_eq!(stats.updated, 0);
    assert_eq!(series.daily_flows, snapshot);
}
