//! Per-source ingestion configuration.
//!
//! Each source is an immutable `SourceConfig` value built by one of the
//! functions below and passed into the pipeline at construction time, so
//! independent sources (and tests) never share catalog state.

use crate::models::FundInfo;
use crate::utils::api_key_from_env;

/// Textual date grammar used by a source's table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateGrammar {
    /// "Feb 04, 2026"
    MonthDayYear,
    /// "23 Jan 2026"
    DayMonthYear,
}

/// Everything the pipeline needs to know about one external source.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Short key used on the CLI and in artifact filenames ("btc", "eth").
    pub key: String,
    pub url: String,
    /// Series filename inside the data directory.
    pub output_file: String,
    pub description: String,
    /// Human-readable source label stored in series metadata.
    pub source_label: String,
    /// Ticker catalog in the source's declared column order.
    pub funds: Vec<(String, FundInfo)>,
    pub date_grammar: DateGrammar,
    /// Structural marker expected in valid fetched content.
    pub content_marker: String,
    /// CSS selector addressing the flow table in the page.
    pub table_selector: String,
    /// API key for authenticated sources, resolved from the environment by
    /// the caller. The pipeline treats it as an opaque string.
    pub api_key: Option<String>,
}

impl SourceConfig {
    /// Declared ticker symbols, in source column order.
    pub fn tickers(&self) -> Vec<String> {
        self.funds.iter().map(|(t, _)| t.clone()).collect()
    }
}

fn fund(ticker: &str, name: &str, issuer: &str) -> (String, FundInfo) {
    (
        ticker.to_string(),
        FundInfo {
            name: name.to_string(),
            issuer: issuer.to_string(),
        },
    )
}

pub fn btc_source() -> SourceConfig {
    SourceConfig {
        key: "btc".to_string(),
        url: "https://bitbo.io/treasuries/etf-flows/".to_string(),
        output_file: "etf_flows.json".to_string(),
        description: "Bitcoin Spot ETF Daily Net Flows (US$M)".to_string(),
        source_label: "bitbo.io/treasuries/etf-flows".to_string(),
        funds: vec![
            fund("IBIT", "iShares Bitcoin Trust", "BlackRock"),
            fund("FBTC", "Wise Origin Bitcoin Fund", "Fidelity"),
            fund("GBTC", "Grayscale Bitcoin Trust", "Grayscale"),
            fund("BTC", "Grayscale Bitcoin Mini Trust", "Grayscale"),
            fund("BITB", "Bitwise Bitcoin ETF", "Bitwise"),
            fund("ARKB", "ARK 21Shares Bitcoin ETF", "ARK/21Shares"),
            fund("HODL", "VanEck Bitcoin ETF", "VanEck"),
            fund("BTCO", "Invesco Galaxy Bitcoin ETF", "Invesco"),
            fund("BRRR", "Valkyrie Bitcoin Fund", "CoinShares"),
            fund("EZBC", "Franklin Bitcoin ETF", "Franklin Templeton"),
            fund("BTCW", "WisdomTree Bitcoin Fund", "WisdomTree"),
            fund("DEFI", "Hashdex Bitcoin ETF", "Hashdex"),
        ],
        date_grammar: DateGrammar::MonthDayYear,
        content_marker: "<table".to_string(),
        table_selector: "table".to_string(),
        api_key: api_key_from_env("BITBO_API_KEY"),
    }
}

pub fn eth_source() -> SourceConfig {
    SourceConfig {
        key: "eth".to_string(),
        url: "https://farside.co.uk/eth/".to_string(),
        output_file: "eth_etf_flows.json".to_string(),
        description: "Ethereum Spot ETF Daily Net Flows (US$M)".to_string(),
        source_label: "farside.co.uk".to_string(),
        funds: vec![
            fund("ETHA", "iShares Ethereum Trust", "BlackRock"),
            fund("FETH", "Fidelity Ethereum Fund", "Fidelity"),
            fund("ETHW", "Bitwise Ethereum ETF", "Bitwise"),
            fund("TETH", "21Shares Core Ethereum ETF", "21Shares"),
            fund("ETHV", "VanEck Ethereum ETF", "VanEck"),
            fund("QETH", "Invesco Galaxy Ethereum ETF", "Invesco"),
            fund("EZET", "Franklin Ethereum ETF", "Franklin Templeton"),
            fund("ETHE", "Grayscale Ethereum Trust", "Grayscale"),
            fund("ETH", "Grayscale Ethereum Mini Trust", "Grayscale"),
        ],
        date_grammar: DateGrammar::DayMonthYear,
        content_marker: "class=\"etf\"".to_string(),
        table_selector: "table.etf".to_string(),
        api_key: None,
    }
}

pub fn sol_source() -> SourceConfig {
    SourceConfig {
        key: "sol".to_string(),
        url: "https://farside.co.uk/sol/".to_string(),
        output_file: "sol_etf_flows.json".to_string(),
        description: "Solana Spot ETF Daily Net Flows (US$M)".to_string(),
        source_label: "farside.co.uk".to_string(),
        funds: vec![
            fund("BSOL", "Bitwise Solana Staking ETF", "Bitwise"),
            fund("VSOL", "VanEck Solana ETF", "VanEck"),
            fund("FSOL", "Fidelity Solana Fund", "Fidelity"),
            fund("TSOL", "21Shares Core Solana ETF", "21Shares"),
            fund("SOEZ", "Franklin Solana ETF", "Franklin Templeton"),
            fund("GSOL", "Grayscale Solana Trust", "Grayscale"),
        ],
        date_grammar: DateGrammar::DayMonthYear,
        content_marker: "class=\"etf\"".to_string(),
        table_selector: "table.etf".to_string(),
        api_key: None,
    }
}

/// All built-in sources, in ingestion order.
pub fn builtin_sources() -> Vec<SourceConfig> {
    vec![btc_source(), eth_source(), sol_source()]
}

/// Resolve CLI source keys to configs. Empty input selects every source.
pub fn select_sources(keys: &[String]) -> Result<Vec<SourceConfig>, crate::error::Error> {
    let all = builtin_sources();
    if keys.is_empty() {
        return Ok(all);
    }
    let mut selected = Vec::new();
    for key in keys {
        let key = key.to_lowercase();
        match all.iter().find(|s| s.key == key) {
            Some(source) => selected.push(source.clone()),
            None => {
                let known: Vec<&str> = all.iter().map(|s| s.key.as_str()).collect();
                return Err(crate::error::Error::Config(format!(
                    "unknown source '{}' (available: {})",
                    key,
                    known.join(", ")
                )));
            }
        }
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sources_are_distinct() {
        let sources = builtin_sources();
        assert_eq!(sources.len(), 3);
        let keys: Vec<_> = sources.iter().map(|s| s.key.clone()).collect();
        assert_eq!(keys, vec!["btc", "eth", "sol"]);
        for s in &sources {
            assert!(!s.funds.is_empty());
            assert!(s.url.starts_with("https://"));
        }
    }

    #[test]
    fn test_select_sources() {
        let all = select_sources(&[]).unwrap();
        assert_eq!(all.len(), 3);

        let picked = select_sources(&["SOL".to_string()]).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].key, "sol");

        assert!(select_sources(&["doge".to_string()]).is_err());
    }
}
