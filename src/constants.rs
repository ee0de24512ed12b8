//! Ingestion thresholds and shared table-format constants.

/// Minimum byte length for fetched content to count as a real page.
/// Cloudflare challenge pages are consistently smaller than this.
pub const MIN_VALID_CONTENT_BYTES: usize = 5000;

/// Per-request network timeout in seconds.
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Overall cap per fetch strategy in seconds (curl wall clock, browser page load).
pub const STRATEGY_TIMEOUT_SECS: u64 = 60;

/// Delay between consecutive source fetches, to avoid rate limiting.
pub const POLITE_DELAY_SECS: u64 = 3;

/// Summary/decoration row labels that must never be parsed as data rows.
pub const SKIP_LABELS: &[&str] = &["Seed", "Total", "Totals", "Average", "Maximum", "Minimum"];

/// Values above this absolute magnitude are assumed to be reported in raw
/// currency units rather than millions, and are rescaled by 1e6.
///
/// This is a heuristic with no authoritative confirmation from any source
/// API. Keep the behavior as-is for compatibility with previously captured
/// series; do not tighten it.
pub const RAW_UNIT_CUTOFF: f64 = 50_000.0;

/// Filename prefix for raw-content debug artifacts written on extraction failure.
pub const DEBUG_ARTIFACT_PREFIX: &str = "_debug_";

/// Browser-like User-Agent sent by the direct HTTP and curl transports.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
