use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};

use common::{Error, Result, Symbol, UniverseSource};

/// Universe read from a remote CSV whose first column is the ticker.
///
/// The default source is the S&P 500 constituents list; its first line is a
/// header and is skipped.
pub struct CsvUniverse {
    url: String,
    http: Client,
}

impl CsvUniverse {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }
}

#[async_trait]
impl UniverseSource for CsvUniverse {
    async fn fetch_universe(&self) -> Result<Vec<Symbol>> {
        debug!(url = %self.url, "Fetching universe list");
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("universe fetch failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Provider(format!("universe fetch: HTTP {status}")));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Provider(format!("universe body: {e}")))?;

        let symbols = parse_universe_csv(&body);
        if symbols.is_empty() {
            return Err(Error::Provider("universe list is empty".into()));
        }
        info!(count = symbols.len(), "Universe list loaded");
        Ok(symbols)
    }
}

/// First column of every non-empty line after the header.
fn parse_universe_csv(body: &str) -> Vec<Symbol> {
    body.lines()
        .skip(1)
        .filter_map(|line| {
            let first = line.split(',').next()?.trim().trim_matches('"');
            (!first.is_empty()).then(|| Symbol::new(first))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_header_and_takes_first_column() {
        let csv = "Symbol,Security,GICS Sector\nMMM,3M,Industrials\nAOS,A. O. Smith,Industrials\r\nBRK.B,Berkshire Hathaway,Financials\n";
        let symbols = parse_universe_csv(csv);
        let names: Vec<&str> = symbols.iter().map(|s| s.display()).collect();
        assert_eq!(names, vec!["MMM", "AOS", "BRK.B"]);
        assert_eq!(symbols[2].lookup(), "BRK-B");
    }

    #[test]
    fn blank_lines_and_quotes_are_tolerated() {
        let csv = "Symbol,Name\n\n\"ABT\",\"Abbott\"\n   \n";
        let symbols = parse_universe_csv(csv);
        assert_eq!(symbols, vec![Symbol::new("ABT")]);
    }

    #[test]
    fn header_only_yields_nothing() {
        assert!(parse_universe_csv("Symbol,Security\n").is_empty());
    }
}
