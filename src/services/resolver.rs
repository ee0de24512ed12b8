//! Maps free-text fund identifiers from API payloads to canonical tickers.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::models::FundInfo;

// Short uppercase token inside brackets or parentheses, e.g. "(IBIT)".
static BRACKET_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[(\[]([A-Z]{2,6})[)\]]").unwrap());

/// A source's canonical ticker set with display names, used to resolve the
/// free-text fund identifiers that API-style payloads report.
#[derive(Debug, Clone)]
pub struct TickerCatalog {
    entries: Vec<(String, String)>, // (ticker, display name)
}

impl TickerCatalog {
    pub fn new(funds: &[(String, FundInfo)]) -> Self {
        Self {
            entries: funds
                .iter()
                .map(|(t, info)| (t.clone(), info.name.clone()))
                .collect(),
        }
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(t, _)| t.as_str())
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.entries.iter().any(|(t, _)| t == ticker)
    }

    /// Resolve a free-text fund name or symbol to a canonical ticker.
    ///
    /// Resolution order, first match wins:
    /// 1. exact ticker symbol
    /// 2. exact display name
    /// 3. case-insensitive match on either
    /// 4. case-insensitive substring match, either direction
    /// 5. bracketed uppercase token that is itself a known ticker
    pub fn resolve(&self, input: &str) -> Option<String> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        for (ticker, _) in &self.entries {
            if ticker == input {
                return Some(ticker.clone());
            }
        }

        for (ticker, name) in &self.entries {
            if name == input {
                return Some(ticker.clone());
            }
        }

        let lower = input.to_lowercase();
        for (ticker, name) in &self.entries {
            if ticker.to_lowercase() == lower || name.to_lowercase() == lower {
                return Some(ticker.clone());
            }
        }

        for (ticker, name) in &self.entries {
            let name_lower = name.to_lowercase();
            let ticker_lower = ticker.to_lowercase();
            if lower.contains(&name_lower)
                || name_lower.contains(&lower)
                || lower.contains(&ticker_lower)
            {
                return Some(ticker.clone());
            }
        }

        if let Some(caps) = BRACKET_TOKEN_RE.captures(input) {
            let token = &caps[1];
            if self.contains(token) {
                return Some(token.to_string());
            }
        }

        warn!("Unresolved fund identifier: '{}'", input);
        None
    }
}
