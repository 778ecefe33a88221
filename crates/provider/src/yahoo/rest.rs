use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use common::{
    DailyClose, Error, IntradaySample, MarketDataGateway, PriceSample, Result, Symbol,
};

use super::chart::{parse_chart, ChartResult};

const BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Yahoo rejects requests without a browser-like agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) marketwatch/0.1";

/// REST client for the Yahoo Finance chart API. Used for latest prices and
/// the daily/intraday history behind reference prices.
pub struct YahooClient {
    base_url: String,
    http: Client,
}

impl YahooClient {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_base_url(BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    fn chart_url(&self, symbol: &Symbol, range: &str, interval: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid provider URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| Error::Config("provider URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["v8", "finance", "chart", symbol.lookup()]);
        url.query_pairs_mut()
            .append_pair("range", range)
            .append_pair("interval", interval);
        Ok(url)
    }

    async fn chart(&self, symbol: &Symbol, range: &str, interval: &str) -> Result<ChartResult> {
        let url = self.chart_url(symbol, range, interval)?;
        debug!(symbol = %symbol, %range, %interval, "Fetching chart");

        let resp = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(format!("{symbol}: {e}"))
            } else {
                Error::Http(e.to_string())
            }
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        // Yahoo reports unknown symbols as 404 with a JSON error body.
        if !status.is_success() && status.as_u16() != 404 {
            return Err(Error::Provider(format!("{symbol}: HTTP {status}")));
        }
        parse_chart(symbol, &body)
    }
}

#[async_trait]
impl MarketDataGateway for YahooClient {
    async fn latest_price(&self, symbol: &Symbol) -> Result<PriceSample> {
        self.chart(symbol, "1d", "1m").await?.latest(symbol)
    }

    async fn daily_closes(&self, symbol: &Symbol, days: u32) -> Result<Vec<DailyClose>> {
        let range = format!("{days}d");
        Ok(self.chart(symbol, &range, "1d").await?.daily())
    }

    async fn intraday_series(&self, symbol: &Symbol, days: u32) -> Result<Vec<IntradaySample>> {
        let range = format!("{days}d");
        Ok(self.chart(symbol, &range, "5m").await?.intraday())
    }
}
