use std::time::Duration;

use common::{Error, MarketDataGateway, PriceSample, Result, Symbol};

/// Fetch the latest price for one symbol, bounded by `limit`.
///
/// A timeout or an unusable price is reported as a provider failure for
/// this symbol only. The returned sample carries the caller's symbol so
/// display form survives the provider round trip.
pub(crate) async fn fetch_bounded(
    gateway: &dyn MarketDataGateway,
    symbol: &Symbol,
    limit: Duration,
) -> Result<PriceSample> {
    let sample = tokio::time::timeout(limit, gateway.latest_price(symbol))
        .await
        .map_err(|_| Error::Timeout(format!("{symbol}: no answer within {limit:?}")))??;

    if !sample.price.is_finite() || sample.price < 0.0 {
        return Err(Error::Provider(format!(
            "{symbol}: unusable price {}",
            sample.price
        )));
    }

    Ok(PriceSample {
        symbol: symbol.clone(),
        ..sample
    })
}
