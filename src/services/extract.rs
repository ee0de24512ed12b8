//! Tolerant record extraction from heterogeneous page content.
//!
//! Strategies run in order over the whole content; the first one producing
//! at least one record wins. Row and cell problems degrade to skip/zero and
//! never abort a run; only a total miss (no records from any strategy) is a
//! whole-source failure, which the pipeline turns into a debug artifact.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{DateGrammar, SourceConfig};
use crate::constants::SKIP_LABELS;
use crate::models::FlowRecord;
use crate::services::normalize::{
    normalize_magnitude, parse_calendar_date, parse_flow_value, round1,
};
use crate::services::resolver::TickerCatalog;

// Symbol shape for header discovery: short uppercase token.
static TICKER_SHAPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{2,5}$").unwrap());

/// Candidate field names for loose API-style payloads, first present wins.
const DATE_KEYS: &[&str] = &["date", "day", "time", "timestamp"];
const FUND_KEYS: &[&str] = &["ticker", "symbol", "fund", "etf", "name"];
const VALUE_KEYS: &[&str] = &["flow", "net_flow", "netFlow", "value", "amount"];
const FLOWS_KEYS: &[&str] = &["flows", "funds", "breakdown"];
const TOTAL_KEYS: &[&str] = &["total", "net_total", "netTotal", "total_flow"];

/// Output of one extraction run: the records plus the ticker order they were
/// parsed against (header-discovered for structural tables, declared
/// otherwise). The ticker order feeds series metadata on merge.
#[derive(Debug)]
pub struct Extraction {
    pub tickers: Vec<String>,
    pub records: Vec<FlowRecord>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Run the extraction strategies over fetched content.
///
/// Returns an empty extraction when nothing matched; the caller treats that
/// as a whole-source failure for the run.
pub fn extract_records(content: &str, source: &SourceConfig) -> Extraction {
    let catalog = TickerCatalog::new(&source.funds);

    if let Some(extraction) = structural_table(content, source) {
        info!(
            "Structural table strategy matched: {} records",
            extraction.records.len()
        );
        return finish(extraction);
    }
    if let Some(extraction) = delimited_table(content, source) {
        info!(
            "Delimited table strategy matched: {} records",
            extraction.records.len()
        );
        return finish(extraction);
    }
    if let Some(extraction) = embedded_structured(content, source, &catalog) {
        info!(
            "Embedded data strategy matched: {} records",
            extraction.records.len()
        );
        return finish(extraction);
    }

    warn!("No extraction strategy matched for {}", source.key);
    Extraction {
        tickers: source.tickers(),
        records: Vec::new(),
    }
}

fn finish(mut extraction: Extraction) -> Extraction {
    extraction.records.sort_by_key(|r| r.date);
    extraction
}

// ── Shared row policy ───────────────────────────────────────────────────────

/// Turn one positional row into a record, or skip it.
///
/// Skips: label rows (Total/Average/...), rows whose first cell is not a
/// date, and rows where every ticker cell is the pending marker (the
/// current-day placeholder must not become a zero-flow day). Unparseable
/// flow cells fall back to 0.0 without dropping the row.
fn row_to_record(cells: &[String], tickers: &[String], grammar: DateGrammar) -> Option<FlowRecord> {
    let first = cells.first()?.trim();
    if SKIP_LABELS.contains(&first) {
        return None;
    }
    let date = parse_calendar_date(first, grammar)?;

    let mut flows = BTreeMap::new();
    let mut all_pending = true;
    for (i, ticker) in tickers.iter().enumerate() {
        let value = cells.get(i + 1).and_then(|c| parse_flow_value(c));
        if value.is_some() {
            all_pending = false;
        }
        flows.insert(ticker.clone(), value.unwrap_or(0.0));
    }

    if all_pending {
        debug!("Skipping all-pending row for {}", date);
        return None;
    }

    // Total column sits after the last ticker column; fall back to the sum
    // when it is absent or unparseable.
    let total = cells
        .get(tickers.len() + 1)
        .and_then(|c| parse_flow_value(c))
        .unwrap_or_else(|| round1(flows.values().sum()));

    Some(FlowRecord { date, flows, total })
}

// ── Strategy 1: structural HTML table ───────────────────────────────────────

fn cell_text(el: ElementRef) -> String {
    el.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn header_tickers(cells: &[String]) -> Vec<String> {
    cells
        .iter()
        .map(|c| c.trim())
        .filter(|c| TICKER_SHAPE_RE.is_match(c) && !SKIP_LABELS.contains(c))
        .map(|c| c.to_string())
        .collect()
}

fn structural_table(content: &str, source: &SourceConfig) -> Option<Extraction> {
    let doc = Html::parse_document(content);
    let marker_sel = Selector::parse(&source.table_selector).ok()?;
    let table_sel = Selector::parse("table").ok()?;

    let mut tables: Vec<ElementRef> = doc.select(&marker_sel).collect();
    if tables.is_empty() {
        tables = doc.select(&table_sel).collect();
    }

    for table in tables {
        if let Some(extraction) = parse_html_table(table, source) {
            if !extraction.records.is_empty() {
                return Some(extraction);
            }
        }
    }
    None
}

fn parse_html_table(table: ElementRef, source: &SourceConfig) -> Option<Extraction> {
    let tr_sel = Selector::parse("tr").ok()?;
    let th_sel = Selector::parse("th").ok()?;
    let td_sel = Selector::parse("td").ok()?;
    let thead_sel = Selector::parse("thead").ok()?;
    let tbody_sel = Selector::parse("tbody").ok()?;

    // Header discovery: take the header row with the most ticker-shaped
    // cells. Farside puts tickers in the second thead row, bitbo in the
    // only one; this handles both without per-source cases.
    let mut tickers: Vec<String> = Vec::new();
    if let Some(thead) = table.select(&thead_sel).next() {
        for tr in thead.select(&tr_sel) {
            let cells: Vec<String> = tr.select(&th_sel).map(cell_text).collect();
            let found = header_tickers(&cells);
            if found.len() > tickers.len() {
                tickers = found;
            }
        }
    } else if let Some(first_tr) = table.select(&tr_sel).next() {
        let cells: Vec<String> = first_tr
            .select(&th_sel)
            .chain(first_tr.select(&td_sel))
            .map(cell_text)
            .collect();
        tickers = header_tickers(&cells);
    }

    if tickers.is_empty() {
        debug!("No tickers discovered in table header");
        return None;
    }

    let body_rows: Vec<ElementRef> = match table.select(&tbody_sel).next() {
        Some(tbody) => tbody.select(&tr_sel).collect(),
        // No tbody: every tr that has td cells is a body row.
        None => table.select(&tr_sel).collect(),
    };

    let mut records = Vec::new();
    for tr in body_rows {
        let cells: Vec<String> = tr.select(&td_sel).map(cell_text).collect();
        if cells.is_empty() {
            continue;
        }
        if let Some(record) = row_to_record(&cells, &tickers, source.date_grammar) {
            records.push(record);
        }
    }

    Some(Extraction { tickers, records })
}

// ── Strategy 2: delimiter-separated rows ────────────────────────────────────

/// Pipe-delimited row-per-line layout. No header discovery: column order is
/// the source's declared ticker order.
fn delimited_table(content: &str, source: &SourceConfig) -> Option<Extraction> {
    let tickers = source.tickers();
    let mut records = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if !line.contains('|') {
            continue;
        }
        let cells: Vec<String> = line
            .trim_matches('|')
            .split('|')
            .map(|c| c.trim().to_string())
            .collect();
        // Header and |---| decoration lines fail date parsing and drop out
        // through the shared row policy.
        if let Some(record) = row_to_record(&cells, &tickers, source.date_grammar) {
            records.push(record);
        }
    }

    if records.is_empty() {
        None
    } else {
        Some(Extraction { tickers, records })
    }
}

// ── Strategy 3: embedded structured data ────────────────────────────────────

fn embedded_structured(
    content: &str,
    source: &SourceConfig,
    catalog: &TickerCatalog,
) -> Option<Extraction> {
    for slice in candidate_json_arrays(content) {
        let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(slice) else {
            continue;
        };
        if !entries
            .iter()
            .any(|e| e.as_object().is_some_and(|o| first_present(o, DATE_KEYS).is_some()))
        {
            continue;
        }
        let records = records_from_entries(&entries, source, catalog);
        if !records.is_empty() {
            return Some(Extraction {
                tickers: source.tickers(),
                records,
            });
        }
    }
    None
}

/// Find `[{...}]` slices in markup that could be JSON arrays of objects.
/// String-aware depth scan; parse attempts are left to the caller.
fn candidate_json_arrays(content: &str) -> Vec<&str> {
    let bytes = content.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'[' {
            let mut j = i + 1;
            while j < bytes.len() && (bytes[j] as char).is_whitespace() {
                j += 1;
            }
            if j < bytes.len() && bytes[j] == b'{' {
                if let Some(end) = scan_balanced(bytes, i) {
                    out.push(&content[i..=end]);
                    i = end + 1;
                    continue;
                }
            }
        }
        i += 1;
    }
    out
}

fn scan_balanced(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => depth += 1,
            b']' | b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn first_present<'a>(
    obj: &'a serde_json::Map<String, Value>,
    keys: &[&str],
) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn entry_date(obj: &serde_json::Map<String, Value>, grammar: DateGrammar) -> Option<NaiveDate> {
    match first_present(obj, DATE_KEYS)? {
        Value::String(s) => parse_calendar_date(s, grammar),
        Value::Number(n) => parse_calendar_date(&n.to_string(), grammar),
        _ => None,
    }
}

fn entry_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().map(normalize_magnitude),
        Value::String(s) => parse_flow_value(s).map(normalize_magnitude),
        _ => None,
    }
}

/// Per-entry field resolution for loose API payloads: candidate key lists,
/// identity resolution for free-text fund names, magnitude normalization.
///
/// Two shapes are handled: one entry per day carrying a flows map, and one
/// entry per fund per day carrying name + value. Unresolved fund names are
/// dropped from per-fund detail but still count toward the day's total.
pub fn records_from_entries(
    entries: &[Value],
    source: &SourceConfig,
    catalog: &TickerCatalog,
) -> Vec<FlowRecord> {
    let grammar = source.date_grammar;
    let declared = source.tickers();
    let mut by_date: BTreeMap<NaiveDate, (BTreeMap<String, f64>, f64, Option<f64>)> =
        BTreeMap::new();

    for entry in entries {
        let Some(obj) = entry.as_object() else {
            continue;
        };
        let Some(date) = entry_date(obj, grammar) else {
            debug!("Skipping entry with unresolvable date");
            continue;
        };

        let slot = by_date.entry(date).or_insert_with(|| {
            (BTreeMap::new(), 0.0, None)
        });

        if let Some(Value::Object(flow_map)) = first_present(obj, FLOWS_KEYS) {
            // Per-day shape: keys are fund identifiers, values are flows.
            for (name, raw) in flow_map {
                let Some(value) = entry_value(raw) else {
                    continue;
                };
                if let Some(ticker) = catalog.resolve(name) {
                    *slot.0.entry(ticker).or_insert(0.0) += value;
                }
                slot.1 += value;
            }
            if let Some(total) = first_present(obj, TOTAL_KEYS).and_then(entry_value) {
                slot.2 = Some(total);
            }
        } else if let (Some(Value::String(name)), Some(raw)) =
            (first_present(obj, FUND_KEYS), first_present(obj, VALUE_KEYS))
        {
            // Per-fund shape: group entries by date, resolve each name.
            let Some(value) = entry_value(raw) else {
                continue;
            };
            if let Some(ticker) = catalog.resolve(name) {
                *slot.0.entry(ticker).or_insert(0.0) += value;
            }
            slot.1 += value;
        }
    }

    let mut records = Vec::new();
    for (date, (resolved, sum, reported_total)) in by_date {
        if resolved.is_empty() && reported_total.is_none() {
            continue;
        }
        // All declared tickers present, default 0.
        let mut flows: BTreeMap<String, f64> = declared
            .iter()
            .map(|t| (t.clone(), 0.0))
            .collect();
        for (ticker, value) in resolved {
            flows.insert(ticker, round1(value));
        }
        let total = reported_total.unwrap_or_else(|| round1(sum));
        records.push(FlowRecord { date, flows, total });
    }
    records
}
