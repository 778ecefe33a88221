use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use common::{MarketDataGateway, Symbol};

use crate::baseline::Baselines;
use crate::fetch::fetch_bounded;
use crate::outcome::{classify, BatchResult, SymbolOutcome};

/// Tick-over-tick mover detection for the user's watchlist.
///
/// Every tick compares each symbol's latest price with the price seen on the
/// previous tick, then replaces the stored price whether or not the move was
/// reported.
pub struct WatchlistChangeDetector {
    gateway: Arc<dyn MarketDataGateway>,
    baselines: Baselines,
    threshold_percent: f64,
    fetch_timeout: Duration,
}

impl WatchlistChangeDetector {
    pub fn new(
        gateway: Arc<dyn MarketDataGateway>,
        baselines: Baselines,
        threshold_percent: f64,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            baselines,
            threshold_percent,
            fetch_timeout,
        }
    }

    pub fn baselines(&self) -> &Baselines {
        &self.baselines
    }

    pub fn threshold_percent(&self) -> f64 {
        self.threshold_percent
    }

    /// Run one tick over `symbols`, which the caller snapshots at tick start.
    ///
    /// Symbols are processed sequentially in the given order. A failing
    /// symbol is reported as `Failed` and the rest of the tick continues.
    pub async fn tick(&self, symbols: &[Symbol]) -> BatchResult {
        let mut result = BatchResult::default();

        for symbol in symbols {
            let fetched = fetch_bounded(self.gateway.as_ref(), symbol, self.fetch_timeout).await;
            let outcome = classify(&self.baselines, symbol, fetched, self.threshold_percent).await;
            result.push(symbol.clone(), outcome);
        }

        let movers = result.count(|o| matches!(o, SymbolOutcome::Mover(_)));
        let failed = result.failures().len();
        if movers > 0 {
            info!(
                symbols = symbols.len(),
                movers,
                failed,
                threshold = self.threshold_percent,
                "Watchlist tick found movers"
            );
        } else {
            debug!(symbols = symbols.len(), failed, "Watchlist tick found no movers");
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testing::ScriptedGateway;

    fn symbols(names: &[&str]) -> Vec<Symbol> {
        names.iter().map(Symbol::new).collect()
    }

    fn detector(gateway: Arc<ScriptedGateway>, threshold: f64) -> WatchlistChangeDetector {
        WatchlistChangeDetector::new(gateway, Baselines::new(), threshold, Duration::from_secs(2))
    }

    #[tokio::test]
    async fn first_observation_never_emits() {
        let gateway = Arc::new(ScriptedGateway::with_prices(&[("AAPL", 100.0)]));
        let detector = detector(gateway, 1.0);

        let result = detector.tick(&symbols(&["AAPL"])).await;

        assert!(result.events().is_empty());
        assert!(matches!(
            result.outcome(&Symbol::new("AAPL")),
            Some(SymbolOutcome::Baselined)
        ));
    }

    #[tokio::test]
    async fn unchanged_price_emits_nothing_on_second_tick() {
        let gateway = Arc::new(ScriptedGateway::with_prices(&[("AAPL", 100.0)]));
        let detector = detector(gateway, 1.0);
        let watch = symbols(&["AAPL"]);

        detector.tick(&watch).await;
        let result = detector.tick(&watch).await;

        assert!(result.events().is_empty());
    }

    #[tokio::test]
    async fn one_and_a_half_percent_rise_is_a_mover() {
        let gateway = Arc::new(ScriptedGateway::with_prices(&[("AAPL", 100.0)]));
        let detector = detector(gateway.clone(), 1.0);
        let watch = symbols(&["AAPL"]);

        detector.tick(&watch).await;
        gateway.set_price("AAPL", 101.5);
        let events = detector.tick(&watch).await.into_events();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].symbol, Symbol::new("AAPL"));
        assert!((events[0].change.percent_change - 1.5).abs() < 1e-9);
        assert_eq!(events[0].change.reference, 100.0);
    }

    #[tokio::test]
    async fn small_move_updates_baseline_without_event() {
        let gateway = Arc::new(ScriptedGateway::with_prices(&[("AAPL", 100.0)]));
        let detector = detector(gateway.clone(), 1.0);
        let watch = symbols(&["AAPL"]);

        detector.tick(&watch).await;
        gateway.set_price("AAPL", 100.5);
        let result = detector.tick(&watch).await;

        assert!(result.events().is_empty());
        let baseline = detector.baselines().get(&Symbol::new("AAPL")).await.unwrap();
        assert_eq!(baseline.price, 100.5);
    }

    #[tokio::test]
    async fn baseline_slides_after_a_reported_move() {
        let gateway = Arc::new(ScriptedGateway::with_prices(&[("AAPL", 100.0)]));
        let detector = detector(gateway.clone(), 1.0);
        let watch = symbols(&["AAPL"]);

        detector.tick(&watch).await;
        gateway.set_price("AAPL", 102.0);
        assert_eq!(detector.tick(&watch).await.events().len(), 1);

        // Same price again: no double count against the old baseline.
        assert!(detector.tick(&watch).await.events().is_empty());
    }

    #[tokio::test]
    async fn one_failing_symbol_does_not_stop_the_others() {
        let gateway = Arc::new(ScriptedGateway::with_prices(&[
            ("A", 10.0),
            ("B", 20.0),
            ("X", 30.0),
            ("C", 40.0),
            ("D", 50.0),
        ]));
        let detector = detector(gateway.clone(), 1.0);
        let watch = symbols(&["A", "B", "X", "C", "D"]);
        detector.tick(&watch).await;

        for (s, p) in [("A", 11.0), ("B", 22.0), ("X", 60.0), ("C", 44.0), ("D", 55.0)] {
            gateway.set_price(s, p);
        }
        gateway.fail("X");

        let result = detector.tick(&watch).await;

        assert_eq!(result.len(), 5);
        assert_eq!(result.events().len(), 4);
        assert_eq!(result.failures(), vec![&Symbol::new("X")]);
        let x = detector.baselines().get(&Symbol::new("X")).await.unwrap();
        assert_eq!(x.price, 30.0, "failed symbol keeps its previous baseline");
    }

    #[tokio::test]
    async fn failure_on_first_sighting_leaves_no_baseline() {
        let gateway = Arc::new(ScriptedGateway::new());
        gateway.fail("AAPL");
        let detector = detector(gateway, 1.0);

        let result = detector.tick(&symbols(&["AAPL"])).await;

        assert_eq!(result.failures().len(), 1);
        assert!(detector.baselines().is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_provider_call_times_out_as_failure() {
        let gateway = Arc::new(ScriptedGateway::with_prices(&[("SLOW", 1.0), ("FAST", 2.0)]));
        gateway.hang("SLOW");
        let detector = detector(gateway, 1.0);

        let result = detector.tick(&symbols(&["SLOW", "FAST"])).await;

        assert!(matches!(
            result.outcome(&Symbol::new("SLOW")),
            Some(SymbolOutcome::Failed(msg)) if msg.contains("timed out")
        ));
        assert!(matches!(
            result.outcome(&Symbol::new("FAST")),
            Some(SymbolOutcome::Baselined)
        ));
    }

    #[tokio::test]
    async fn symbols_processed_in_snapshot_order() {
        let gateway = Arc::new(ScriptedGateway::with_prices(&[("C", 1.0), ("A", 1.0), ("B", 1.0)]));
        let detector = detector(gateway.clone(), 1.0);

        detector.tick(&symbols(&["C", "A", "B"])).await;

        assert_eq!(gateway.calls(), vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn membership_change_between_ticks_is_tolerated() {
        let gateway = Arc::new(ScriptedGateway::with_prices(&[("AAPL", 100.0), ("MSFT", 300.0)]));
        let detector = detector(gateway.clone(), 1.0);

        detector.tick(&symbols(&["AAPL"])).await;
        gateway.set_price("AAPL", 105.0);
        gateway.set_price("MSFT", 330.0);
        let result = detector.tick(&symbols(&["AAPL", "MSFT"])).await;

        assert_eq!(result.events().len(), 1);
        assert!(matches!(
            result.outcome(&Symbol::new("MSFT")),
            Some(SymbolOutcome::Baselined)
        ));
    }
}
