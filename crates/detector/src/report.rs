use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use common::{Basis, MarketDataGateway, MoverEvent, Symbol};

use crate::change::evaluate;
use crate::fetch::fetch_bounded;
use crate::outcome::{BatchResult, SymbolOutcome};
use crate::reference::ReferencePriceResolver;

/// Full change report over a symbol list against a fixed basis.
///
/// Unlike the detectors there is no threshold and no baseline update:
/// every symbol whose current and reference prices resolve is listed.
pub struct ChangeReporter {
    gateway: Arc<dyn MarketDataGateway>,
    resolver: Arc<ReferencePriceResolver>,
    fetch_timeout: Duration,
}

impl ChangeReporter {
    pub fn new(
        gateway: Arc<dyn MarketDataGateway>,
        resolver: Arc<ReferencePriceResolver>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            resolver,
            fetch_timeout,
        }
    }

    pub async fn report(&self, symbols: &[Symbol], basis: Basis) -> BatchResult {
        let mut result = BatchResult::default();

        for symbol in symbols {
            let outcome = match self.resolve_one(symbol, basis).await {
                Ok(event) => SymbolOutcome::Mover(event),
                Err(e) => {
                    warn!(symbol = %symbol, basis = %basis, error = %e, "Dropping symbol from report");
                    SymbolOutcome::Failed(e.to_string())
                }
            };
            result.push(symbol.clone(), outcome);
        }

        info!(
            basis = %basis,
            symbols = symbols.len(),
            listed = result.events().len(),
            "Change report built"
        );
        result
    }

    async fn resolve_one(&self, symbol: &Symbol, basis: Basis) -> common::Result<MoverEvent> {
        let current = fetch_bounded(self.gateway.as_ref(), symbol, self.fetch_timeout).await?;
        let reference = tokio::time::timeout(self.fetch_timeout, self.resolver.resolve(symbol, basis))
            .await
            .map_err(|_| common::Error::Timeout(format!("{symbol}: reference price not resolved in time")))??;

        let change = evaluate(symbol, current.price, reference.price);
        Ok(MoverEvent::new(change, current.observed_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use common::testing::ScriptedGateway;
    use common::DailyClose;

    fn closes(prev: f64, today: f64) -> Vec<DailyClose> {
        vec![
            DailyClose {
                date: NaiveDate::from_ymd_opt(2024, 6, 11).unwrap(),
                close: prev,
            },
            DailyClose {
                date: NaiveDate::from_ymd_opt(2024, 6, 12).unwrap(),
                close: today,
            },
        ]
    }

    fn reporter(gateway: Arc<ScriptedGateway>) -> ChangeReporter {
        let resolver = ReferencePriceResolver::new(gateway.clone(), chrono_tz::America::New_York);
        ChangeReporter::new(gateway, Arc::new(resolver), Duration::from_secs(2))
    }

    #[tokio::test]
    async fn lists_every_resolved_symbol_regardless_of_size() {
        let gateway = Arc::new(ScriptedGateway::with_prices(&[("AAPL", 100.1), ("MSFT", 420.0)]));
        gateway.set_daily("AAPL", closes(100.0, 100.1));
        gateway.set_daily("MSFT", closes(400.0, 420.0));

        let result = reporter(gateway)
            .report(&[Symbol::new("AAPL"), Symbol::new("MSFT")], Basis::PreviousClose)
            .await;

        let events = result.events();
        assert_eq!(events.len(), 2);
        assert!((events[0].change.percent_change - 0.1).abs() < 1e-9);
        assert!((events[1].change.percent_change - 5.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unresolvable_symbols_are_left_out() {
        let gateway = Arc::new(ScriptedGateway::with_prices(&[("AAPL", 101.0), ("NEW", 5.0)]));
        gateway.set_daily("AAPL", closes(100.0, 101.0));

        let result = reporter(gateway)
            .report(&[Symbol::new("AAPL"), Symbol::new("NEW")], Basis::PreviousClose)
            .await;

        assert_eq!(result.events().len(), 1);
        assert_eq!(result.failures(), vec![&Symbol::new("NEW")]);
    }
}
