use std::sync::Arc;

use chrono::{Datelike, Weekday};
use chrono_tz::Tz;
use tracing::{debug, warn};

use common::{
    Basis, DailyClose, Error, IntradaySample, MarketDataGateway, ReferencePrice, Result, Symbol,
};

use crate::baseline::Baselines;

/// Trading days requested when looking for the previous close. Covers a
/// long weekend plus a holiday.
const DAILY_LOOKBACK: u32 = 5;
/// Calendar days of intraday bars requested for the week-start basis.
const INTRADAY_LOOKBACK: u32 = 5;

/// Resolves the price a current price is compared against, per basis.
pub struct ReferencePriceResolver {
    gateway: Arc<dyn MarketDataGateway>,
    tz: Tz,
    baselines: Option<Baselines>,
}

impl ReferencePriceResolver {
    pub fn new(gateway: Arc<dyn MarketDataGateway>, tz: Tz) -> Self {
        Self {
            gateway,
            tz,
            baselines: None,
        }
    }

    /// Serve `Basis::LastTick` from a detector's baselines.
    pub fn with_baselines(mut self, baselines: Baselines) -> Self {
        self.baselines = Some(baselines);
        self
    }

    pub async fn resolve(&self, symbol: &Symbol, basis: Basis) -> Result<ReferencePrice> {
        let price = match basis {
            Basis::LastTick => self.last_tick(symbol).await?,
            Basis::PreviousClose => self.previous_close(symbol).await?,
            Basis::WeekStart => match self.week_start(symbol).await {
                Ok(Some(price)) => price,
                Ok(None) => {
                    debug!(symbol = %symbol, "No Monday bar this week, using previous close");
                    return self.fallback(symbol).await;
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Intraday fetch failed, using previous close");
                    return self.fallback(symbol).await;
                }
            },
        };

        Ok(ReferencePrice {
            symbol: symbol.clone(),
            price,
            basis,
        })
    }

    async fn fallback(&self, symbol: &Symbol) -> Result<ReferencePrice> {
        let price = self.previous_close(symbol).await?;
        Ok(ReferencePrice {
            symbol: symbol.clone(),
            price,
            basis: Basis::PreviousClose,
        })
    }

    async fn last_tick(&self, symbol: &Symbol) -> Result<f64> {
        let baselines = self
            .baselines
            .as_ref()
            .ok_or_else(|| Error::Config("last-tick basis needs detector baselines".into()))?;
        baselines
            .get(symbol)
            .await
            .map(|sample| sample.price)
            .ok_or_else(|| Error::Provider(format!("{symbol}: no previous tick recorded")))
    }

    async fn previous_close(&self, symbol: &Symbol) -> Result<f64> {
        let closes = self.gateway.daily_closes(symbol, DAILY_LOOKBACK).await?;
        previous_close_of(&closes)
            .ok_or_else(|| Error::Provider(format!("{symbol}: fewer than two daily closes")))
    }

    async fn week_start(&self, symbol: &Symbol) -> Result<Option<f64>> {
        let samples = self
            .gateway
            .intraday_series(symbol, INTRADAY_LOOKBACK)
            .await?;
        Ok(week_start_of(&samples, self.tz))
    }
}

/// Close of the last completed session: the second-to-last daily bar, the
/// last one being today's still-forming bar.
pub fn previous_close_of(closes: &[DailyClose]) -> Option<f64> {
    closes
        .len()
        .checked_sub(2)
        .map(|i| closes[i].close)
        .filter(|close| close.is_finite())
}

/// Price of the first intraday bar of the latest local week's Monday.
///
/// `None` when that week has no Monday bar (Monday holiday), so the caller
/// falls back to the previous close.
pub fn week_start_of(samples: &[IntradaySample], tz: Tz) -> Option<f64> {
    let latest = samples.iter().max_by_key(|s| s.observed_at)?;
    let week = latest.observed_at.with_timezone(&tz).iso_week();

    let mut this_week: Vec<&IntradaySample> = samples
        .iter()
        .filter(|s| s.observed_at.with_timezone(&tz).iso_week() == week)
        .collect();
    this_week.sort_by_key(|s| s.observed_at);

    this_week
        .iter()
        .find(|s| s.observed_at.with_timezone(&tz).weekday() == Weekday::Mon)
        .map(|s| s.price)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use common::testing::ScriptedGateway;
    use common::PriceSample;

    const NY: Tz = chrono_tz::America::New_York;

    fn close(day: u32, close: f64) -> DailyClose {
        DailyClose {
            date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
            close,
        }
    }

    fn bar(day: u32, hour: u32, minute: u32, price: f64) -> IntradaySample {
        // June 2024 is EDT, UTC-4.
        IntradaySample {
            observed_at: Utc
                .with_ymd_and_hms(2024, 6, day, hour + 4, minute, 0)
                .unwrap(),
            price,
        }
    }

    #[test]
    fn previous_close_is_second_to_last_bar() {
        let closes = [close(10, 100.0), close(11, 101.0), close(12, 102.5)];
        assert_eq!(previous_close_of(&closes), Some(101.0));
    }

    #[test]
    fn previous_close_needs_two_bars() {
        assert_eq!(previous_close_of(&[close(12, 102.5)]), None);
        assert_eq!(previous_close_of(&[]), None);
    }

    #[test]
    fn week_start_is_first_monday_bar() {
        // 2024-06-10 is a Monday.
        let samples = [
            bar(7, 15, 55, 90.0),
            bar(10, 9, 30, 100.0),
            bar(10, 9, 35, 101.0),
            bar(12, 15, 55, 110.0),
        ];
        assert_eq!(week_start_of(&samples, NY), Some(100.0));
    }

    #[test]
    fn week_start_without_monday_bar_is_none() {
        let samples = [bar(7, 15, 55, 90.0), bar(11, 9, 30, 95.0), bar(12, 10, 0, 96.0)];
        assert_eq!(week_start_of(&samples, NY), None);
    }

    #[tokio::test]
    async fn monday_holiday_week_falls_back_to_previous_close() {
        // 2024-05-27 was Memorial Day; the week's bars start on Tuesday.
        let tuesday = |day: u32, hour: u32, price: f64| IntradaySample {
            observed_at: Utc.with_ymd_and_hms(2024, 5, day, hour + 4, 30, 0).unwrap(),
            price,
        };
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.set_intraday(
            "AAPL",
            vec![tuesday(28, 9, 95.0), tuesday(29, 10, 96.0), tuesday(30, 11, 97.0)],
        );
        gateway.set_daily("AAPL", vec![close(11, 190.0), close(12, 195.0)]);
        let resolver = ReferencePriceResolver::new(gateway, NY);

        let reference = resolver
            .resolve(&Symbol::new("AAPL"), Basis::WeekStart)
            .await
            .unwrap();

        assert_eq!(reference.price, 190.0);
        assert_eq!(reference.basis, Basis::PreviousClose);
    }

    #[test]
    fn week_start_of_nothing_is_none() {
        assert_eq!(week_start_of(&[], NY), None);
    }

    #[tokio::test]
    async fn resolves_previous_close_from_gateway() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.set_daily("AAPL", vec![close(11, 190.0), close(12, 195.0)]);
        let resolver = ReferencePriceResolver::new(gateway, NY);

        let reference = resolver
            .resolve(&Symbol::new("AAPL"), Basis::PreviousClose)
            .await
            .unwrap();

        assert_eq!(reference.price, 190.0);
        assert_eq!(reference.basis, Basis::PreviousClose);
    }

    #[tokio::test]
    async fn short_daily_history_is_a_provider_error() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.set_daily("NEW", vec![close(12, 10.0)]);
        let resolver = ReferencePriceResolver::new(gateway, NY);

        let err = resolver
            .resolve(&Symbol::new("NEW"), Basis::PreviousClose)
            .await
            .unwrap_err();
        assert!(err.is_provider_failure());
    }

    #[tokio::test]
    async fn week_start_falls_back_to_previous_close() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.set_daily("AAPL", vec![close(11, 190.0), close(12, 195.0)]);
        let resolver = ReferencePriceResolver::new(gateway, NY);

        let reference = resolver
            .resolve(&Symbol::new("AAPL"), Basis::WeekStart)
            .await
            .unwrap();

        assert_eq!(reference.price, 190.0);
        assert_eq!(reference.basis, Basis::PreviousClose);
    }

    #[tokio::test]
    async fn week_start_from_intraday_series() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.set_intraday("AAPL", vec![bar(10, 9, 30, 180.0), bar(12, 11, 0, 185.0)]);
        let resolver = ReferencePriceResolver::new(gateway, NY);

        let reference = resolver
            .resolve(&Symbol::new("AAPL"), Basis::WeekStart)
            .await
            .unwrap();

        assert_eq!(reference.price, 180.0);
        assert_eq!(reference.basis, Basis::WeekStart);
    }

    #[tokio::test]
    async fn last_tick_reads_detector_baselines() {
        let baselines = Baselines::new();
        baselines
            .observe(PriceSample::new(Symbol::new("MSFT"), 410.0, Utc::now()))
            .await;
        let resolver =
            ReferencePriceResolver::new(Arc::new(ScriptedGateway::new()), NY).with_baselines(baselines);

        let reference = resolver
            .resolve(&Symbol::new("MSFT"), Basis::LastTick)
            .await
            .unwrap();
        assert_eq!(reference.price, 410.0);

        assert!(resolver
            .resolve(&Symbol::new("AAPL"), Basis::LastTick)
            .await
            .is_err());
    }
}
