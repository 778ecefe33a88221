use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use serde::Deserialize;

use common::{DailyClose, Error, IntradaySample, PriceSample, Result, Symbol};

// ─── Yahoo chart JSON ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    regular_market_time: Option<i64>,
    /// Exchange offset from UTC in seconds (e.g. -14400 for New York in summer).
    #[serde(rename = "gmtoffset", default)]
    gmt_offset: i32,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

pub(crate) fn parse_chart(symbol: &Symbol, body: &str) -> Result<ChartResult> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|e| Error::Provider(format!("{symbol}: malformed chart response: {e}")))?;

    if let Some(err) = envelope.chart.error {
        return Err(Error::Provider(format!(
            "{symbol}: {} ({})",
            err.description, err.code
        )));
    }

    envelope
        .chart
        .result
        .and_then(|mut results| (!results.is_empty()).then(|| results.swap_remove(0)))
        .ok_or_else(|| Error::Provider(format!("{symbol}: empty chart result")))
}

impl ChartResult {
    /// `(timestamp, close)` pairs with missing or non-finite closes dropped.
    fn closes(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        let closes = self
            .indicators
            .quote
            .first()
            .map(|q| q.close.as_slice())
            .unwrap_or_default();
        self.timestamp
            .iter()
            .zip(closes)
            .filter_map(|(&ts, &close)| close.filter(|c| c.is_finite()).map(|c| (ts, c)))
    }

    /// Latest price: the regular market price when present, otherwise the
    /// last close in the series.
    pub(crate) fn latest(&self, symbol: &Symbol) -> Result<PriceSample> {
        let fallback = self.closes().last();

        let price = self
            .meta
            .regular_market_price
            .filter(|p| p.is_finite())
            .or(fallback.map(|(_, c)| c))
            .ok_or_else(|| Error::Provider(format!("{symbol}: no price in chart response")))?;

        let observed_at = self
            .meta
            .regular_market_time
            .or(fallback.map(|(ts, _)| ts))
            .and_then(from_unix)
            .unwrap_or_else(Utc::now);

        Ok(PriceSample::new(symbol.clone(), price, observed_at))
    }

    /// Daily bars, dated in the exchange's local calendar.
    pub(crate) fn daily(&self) -> Vec<DailyClose> {
        let offset = FixedOffset::east_opt(self.meta.gmt_offset).unwrap_or_else(|| Utc.fix());
        self.closes()
            .filter_map(|(ts, close)| {
                let at = from_unix(ts)?;
                Some(DailyClose {
                    date: at.with_timezone(&offset).date_naive(),
                    close,
                })
            })
            .collect()
    }

    pub(crate) fn intraday(&self) -> Vec<IntradaySample> {
        self.closes()
            .filter_map(|(ts, price)| {
                Some(IntradaySample {
                    observed_at: from_unix(ts)?,
                    price,
                })
            })
            .collect()
    }
}

fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const DAILY: &str = r#"{
        "chart": {
            "result": [{
                "meta": {
                    "symbol": "AAPL",
                    "regularMarketPrice": 190.25,
                    "regularMarketTime": 1717185600,
                    "gmtoffset": -14400
                },
                "timestamp": [1716811800, 1716898200, 1716984600, 1717071000, 1717157400],
                "indicators": {
                    "quote": [{ "close": [189.99, null, 187.43, 190.29, 192.25] }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn parses_latest_price_from_meta() {
        let symbol = Symbol::new("AAPL");
        let chart = parse_chart(&symbol, DAILY).unwrap();
        let sample = chart.latest(&symbol).unwrap();
        assert_eq!(sample.price, 190.25);
        assert_eq!(sample.observed_at.timestamp(), 1717185600);
    }

    #[test]
    fn daily_drops_null_closes_and_dates_in_exchange_time() {
        let symbol = Symbol::new("AAPL");
        let chart = parse_chart(&symbol, DAILY).unwrap();
        let daily = chart.daily();
        assert_eq!(daily.len(), 4);
        // 1716811800 is 2024-05-27 12:10 UTC, 08:10 in New York.
        assert_eq!(daily[0].date, NaiveDate::from_ymd_opt(2024, 5, 27).unwrap());
        assert_eq!(daily[3].close, 192.25);
    }

    #[test]
    fn falls_back_to_last_close_without_market_price() {
        let body = r#"{"chart":{"result":[{"meta":{"gmtoffset":0},
            "timestamp":[100,200],"indicators":{"quote":[{"close":[1.5,2.5]}]}}],"error":null}}"#;
        let symbol = Symbol::new("X");
        let sample = parse_chart(&symbol, body).unwrap().latest(&symbol).unwrap();
        assert_eq!(sample.price, 2.5);
        assert_eq!(sample.observed_at.timestamp(), 200);
    }

    #[test]
    fn provider_error_body_is_reported() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart(&Symbol::new("ZZZZ"), body).unwrap_err();
        assert!(matches!(err, Error::Provider(msg) if msg.contains("delisted")));
    }

    #[test]
    fn garbage_body_is_a_provider_error() {
        let err = parse_chart(&Symbol::new("AAPL"), "<html>rate limited</html>").unwrap_err();
        assert!(err.is_provider_failure());
    }
}
