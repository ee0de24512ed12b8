//! Layered transport chain for fetching flow tables from anti-bot sources.
//!
//! Strategies run in a fixed priority order; the first one whose content
//! passes the validator wins. A strategy whose runtime dependency is missing
//! reports `Unavailable` and is skipped, never treated as a hard failure.

use std::process::Command;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::constants::{BROWSER_USER_AGENT, FETCH_TIMEOUT_SECS, MIN_VALID_CONTENT_BYTES};
use crate::error::Error;

/// Result of a single transport attempt.
pub enum FetchOutcome {
    Content(String),
    /// Strategy cannot run in this environment (missing binary/feature).
    Unavailable(String),
    /// Strategy ran and failed (network error, timeout, bad status).
    Failed(String),
}

pub trait FetchStrategy {
    fn name(&self) -> &'static str;
    fn attempt(&self, source: &SourceConfig) -> FetchOutcome;
}

/// Validates that fetched bytes are the real page, not a bot challenge.
pub struct ContentCheck {
    pub min_bytes: usize,
    pub markers: Vec<String>,
}

impl ContentCheck {
    pub fn for_source(source: &SourceConfig) -> Self {
        // The loose "<table" marker matches pages that renamed the table
        // class but still carry the data.
        Self {
            min_bytes: MIN_VALID_CONTENT_BYTES,
            markers: vec![source.content_marker.clone(), "<table".to_string()],
        }
    }

    pub fn validate(&self, content: &str) -> bool {
        if content.len() < self.min_bytes {
            debug!("Content too short ({} bytes)", content.len());
            return false;
        }
        if !self.markers.iter().any(|m| content.contains(m.as_str())) {
            debug!("No structural marker in {} bytes", content.len());
            return false;
        }
        true
    }
}

/// Direct HTTP client with browser-like headers.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl FetchStrategy for HttpFetcher {
    fn name(&self) -> &'static str {
        "http"
    }

    fn attempt(&self, source: &SourceConfig) -> FetchOutcome {
        let mut request = self
            .client
            .get(&source.url)
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Cache-Control", "no-cache")
            .header("Upgrade-Insecure-Requests", "1");

        if let Some(ref api_key) = source.api_key {
            request = request.header("Authorization", format!("Apikey {}", api_key));
        }

        match request.send() {
            Ok(resp) => {
                let status = resp.status();
                if !status.is_success() {
                    return FetchOutcome::Failed(format!("status {}", status));
                }
                match resp.text() {
                    Ok(body) => FetchOutcome::Content(body),
                    Err(e) => FetchOutcome::Failed(format!("body read: {}", e)),
                }
            }
            Err(e) => FetchOutcome::Failed(e.to_string()),
        }
    }
}

/// Headless Chromium transport for pages behind JavaScript challenges.
/// Compiled in only with the `browser` feature; reports `Unavailable` when
/// no Chrome binary can be launched.
#[cfg(feature = "browser")]
pub struct BrowserFetcher;

#[cfg(feature = "browser")]
impl FetchStrategy for BrowserFetcher {
    fn name(&self) -> &'static str {
        "browser"
    }

    fn attempt(&self, source: &SourceConfig) -> FetchOutcome {
        use headless_chrome::{Browser, LaunchOptions};

        let options = match LaunchOptions::default_builder()
            .headless(true)
            .idle_browser_timeout(Duration::from_secs(crate::constants::STRATEGY_TIMEOUT_SECS))
            .build()
        {
            Ok(o) => o,
            Err(e) => return FetchOutcome::Unavailable(e.to_string()),
        };
        let browser = match Browser::new(options) {
            Ok(b) => b,
            Err(e) => return FetchOutcome::Unavailable(format!("launch: {}", e)),
        };

        let result = (|| -> Result<String, String> {
            let tab = browser.new_tab().map_err(|e| e.to_string())?;
            tab.set_default_timeout(Duration::from_secs(FETCH_TIMEOUT_SECS));
            tab.navigate_to(&source.url).map_err(|e| e.to_string())?;
            tab.wait_until_navigated().map_err(|e| e.to_string())?;
            // Best effort: the page is still worth validating even if the
            // marker element never shows up.
            let _ = tab.wait_for_element("table");
            tab.get_content().map_err(|e| e.to_string())
        })();

        match result {
            Ok(html) => FetchOutcome::Content(html),
            Err(e) => FetchOutcome::Failed(e),
        }
    }
}

/// Shell-level curl fallback with the full browser header set.
pub struct CurlFetcher;

impl FetchStrategy for CurlFetcher {
    fn name(&self) -> &'static str {
        "curl"
    }

    fn attempt(&self, source: &SourceConfig) -> FetchOutcome {
        let max_time = FETCH_TIMEOUT_SECS.to_string();
        let mut cmd = Command::new("curl");
        cmd.arg("-sL")
            .arg("--max-time")
            .arg(&max_time)
            .arg("-H")
            .arg(format!("User-Agent: {}", BROWSER_USER_AGENT))
            .arg("-H")
            .arg("Accept: text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .arg("-H")
            .arg("Accept-Language: en-US,en;q=0.9")
            .arg("-H")
            .arg("Accept-Encoding: identity")
            .arg("-H")
            .arg("Cache-Control: no-cache")
            .arg("-H")
            .arg("Sec-Fetch-Dest: document")
            .arg("-H")
            .arg("Sec-Fetch-Mode: navigate")
            .arg("-H")
            .arg("Sec-Fetch-Site: none")
            .arg("-H")
            .arg("Upgrade-Insecure-Requests: 1");

        if let Some(ref api_key) = source.api_key {
            cmd.arg("-H").arg(format!("Authorization: Apikey {}", api_key));
        }
        cmd.arg(&source.url);

        match cmd.output() {
            Ok(output) => {
                if !output.status.success() {
                    return FetchOutcome::Failed(format!("exit code {:?}", output.status.code()));
                }
                match String::from_utf8(output.stdout) {
                    Ok(body) => FetchOutcome::Content(body),
                    Err(e) => FetchOutcome::Failed(format!("non-utf8 body: {}", e)),
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                FetchOutcome::Unavailable("curl binary not found".to_string())
            }
            Err(e) => FetchOutcome::Failed(e.to_string()),
        }
    }
}

/// Outcome of a whole chain run: validated content, or the attempt log plus
/// whatever raw content was last seen (kept for the debug artifact).
#[derive(Debug)]
pub struct FetchFailure {
    pub attempts: Vec<String>,
    pub last_content: Option<String>,
}

pub struct FetchChain {
    strategies: Vec<Box<dyn FetchStrategy>>,
}

impl FetchChain {
    pub fn new(strategies: Vec<Box<dyn FetchStrategy>>) -> Self {
        Self { strategies }
    }

    /// Run strategies in priority order until one yields validated content.
    pub fn fetch(&self, source: &SourceConfig) -> Result<String, FetchFailure> {
        let check = ContentCheck::for_source(source);
        let mut attempts = Vec::new();
        let mut last_content: Option<String> = None;

        for strategy in &self.strategies {
            info!("Fetching {} via {}", source.url, strategy.name());
            match strategy.attempt(source) {
                FetchOutcome::Content(body) => {
                    if check.validate(&body) {
                        info!("{} OK — {} bytes", strategy.name(), body.len());
                        return Ok(body);
                    }
                    warn!(
                        "{} returned {} bytes but content failed validation",
                        strategy.name(),
                        body.len()
                    );
                    attempts.push(format!("{}: invalid content ({} bytes)", strategy.name(), body.len()));
                    last_content = Some(body);
                }
                FetchOutcome::Unavailable(reason) => {
                    debug!("{} unavailable: {}", strategy.name(), reason);
                    attempts.push(format!("{}: unavailable ({})", strategy.name(), reason));
                }
                FetchOutcome::Failed(reason) => {
                    warn!("{} failed: {}", strategy.name(), reason);
                    attempts.push(format!("{}: {}", strategy.name(), reason));
                }
            }
        }

        Err(FetchFailure {
            attempts,
            last_content,
        })
    }
}

/// The default transport chain: direct HTTP, headless browser when compiled
/// in, curl as last resort.
pub fn default_chain() -> Result<FetchChain, Error> {
    let mut strategies: Vec<Box<dyn FetchStrategy>> = vec![Box::new(HttpFetcher::new()?)];
    #[cfg(feature = "browser")]
    strategies.push(Box::new(BrowserFetcher));
    strategies.push(Box::new(CurlFetcher));
    Ok(FetchChain::new(strategies))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::eth_source;

    struct Canned(FetchOutcome);

    impl FetchStrategy for Canned {
        fn name(&self) -> &'static str {
            "canned"
        }

        fn attempt(&self, _source: &SourceConfig) -> FetchOutcome {
            match &self.0 {
                FetchOutcome::Content(s) => FetchOutcome::Content(s.clone()),
                FetchOutcome::Unavailable(s) => FetchOutcome::Unavailable(s.clone()),
                FetchOutcome::Failed(s) => FetchOutcome::Failed(s.clone()),
            }
        }
    }

    fn big_page(marker: &str) -> String {
        format!("<html>{}{}</html>", marker, "x".repeat(MIN_VALID_CONTENT_BYTES))
    }

    #[test]
    fn test_content_check() {
        let source = eth_source();
        let check = ContentCheck::for_source(&source);
        assert!(check.validate(&big_page("<table class=\"etf\">")));
        // Loose marker: plain table also passes.
        assert!(check.validate(&big_page("<table>")));
        // Challenge page: short.
        assert!(!check.validate("<html>checking your browser</html>"));
        // Long but no table at all.
        assert!(!check.validate(&"x".repeat(MIN_VALID_CONTENT_BYTES + 100)));
    }

    #[test]
    fn test_chain_takes_first_valid() {
        let source = eth_source();
        let chain = FetchChain::new(vec![
            Box::new(Canned(FetchOutcome::Unavailable("not installed".into()))),
            Box::new(Canned(FetchOutcome::Failed("timeout".into()))),
            Box::new(Canned(FetchOutcome::Content(big_page("<table>")))),
        ]);
        let body = chain.fetch(&source).unwrap();
        assert!(body.contains("<table>"));
    }

    #[test]
    fn test_chain_exhaustion_keeps_last_content() {
        let source = eth_source();
        let challenge = "cf-challenge".to_string();
        let chain = FetchChain::new(vec![
            Box::new(Canned(FetchOutcome::Failed("dns".into()))),
            Box::new(Canned(FetchOutcome::Content(challenge.clone()))),
        ]);
        let failure = chain.fetch(&source).unwrap_err();
        assert_eq!(failure.attempts.len(), 2);
        assert_eq!(failure.last_content.as_deref(), Some(challenge.as_str()));
    }
}
