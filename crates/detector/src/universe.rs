use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use common::{Error, MarketDataGateway, Result, Symbol, UniverseSource, Watchlist};

use crate::baseline::Baselines;
use crate::fetch::fetch_bounded;
use crate::outcome::{classify, BatchResult, SymbolOutcome};

/// Round-robin mover scan over a universe too large to poll in full.
///
/// The universe is loaded on first use and cached. Every call to [`scan`]
/// takes the next batch after the cursor, so `ceil(n / batch)` consecutive
/// scans cover every symbol once.
///
/// [`scan`]: UniverseRotationScanner::scan
pub struct UniverseRotationScanner {
    source: Arc<dyn UniverseSource>,
    gateway: Arc<dyn MarketDataGateway>,
    watchlist: Watchlist,
    baselines: Baselines,
    fetch_timeout: Duration,
    concurrency: usize,
    universe: Option<Vec<Symbol>>,
    cursor: usize,
}

impl UniverseRotationScanner {
    pub fn new(
        source: Arc<dyn UniverseSource>,
        gateway: Arc<dyn MarketDataGateway>,
        watchlist: Watchlist,
        baselines: Baselines,
        fetch_timeout: Duration,
        concurrency: usize,
    ) -> Self {
        Self {
            source,
            gateway,
            watchlist,
            baselines,
            fetch_timeout,
            concurrency: concurrency.max(1),
            universe: None,
            cursor: 0,
        }
    }

    pub fn baselines(&self) -> &Baselines {
        &self.baselines
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Size of the loaded universe, `None` before the first successful load.
    pub fn universe_len(&self) -> Option<usize> {
        self.universe.as_ref().map(Vec::len)
    }

    /// Forget the cached universe and rewind. The next scan reloads.
    pub fn reset(&mut self) {
        self.universe = None;
        self.cursor = 0;
    }

    /// Scan the next batch of the universe.
    ///
    /// Fails only when the universe cannot be loaded; the cursor is then left
    /// where it was. Per-symbol provider failures are reported in the result.
    pub async fn scan(&mut self, threshold_percent: f64, batch_size: usize) -> Result<BatchResult> {
        if batch_size == 0 {
            return Err(Error::Config("universe batch_size must be at least 1".into()));
        }

        self.ensure_loaded().await?;
        let universe = self.universe.as_deref().unwrap_or_default();
        if universe.is_empty() {
            debug!("Universe is empty, nothing to scan");
            return Ok(BatchResult::default());
        }
        let take = batch_size.min(universe.len());
        let batch: Vec<Symbol> = (0..take)
            .map(|i| universe[(self.cursor + i) % universe.len()].clone())
            .collect();
        self.cursor = (self.cursor + take) % universe.len();

        let watched: HashSet<Symbol> = self.watchlist.snapshot().await.into_iter().collect();
        let to_fetch: Vec<Symbol> = batch
            .iter()
            .filter(|s| !watched.contains(s))
            .cloned()
            .collect();

        // Futures own their inputs; the scan runs on a spawned task.
        let gateway = Arc::clone(&self.gateway);
        let limit = self.fetch_timeout;
        let mut fetched = stream::iter(to_fetch)
            .map(move |symbol| {
                let gateway = Arc::clone(&gateway);
                async move { fetch_bounded(gateway.as_ref(), &symbol, limit).await }
            })
            .buffered(self.concurrency);

        let mut result = BatchResult::default();
        for symbol in &batch {
            if watched.contains(symbol) {
                result.push(symbol.clone(), SymbolOutcome::Skipped);
                continue;
            }
            let outcome = match fetched.next().await {
                Some(sample) => classify(&self.baselines, symbol, sample, threshold_percent).await,
                None => SymbolOutcome::Failed("fetch stream ended early".into()),
            };
            result.push(symbol.clone(), outcome);
        }

        let movers = result.count(|o| matches!(o, SymbolOutcome::Mover(_)));
        info!(
            batch = batch.len(),
            skipped = result.count(|o| matches!(o, SymbolOutcome::Skipped)),
            failed = result.failures().len(),
            movers,
            cursor = self.cursor,
            "Universe batch scanned"
        );

        Ok(result)
    }

    async fn ensure_loaded(&mut self) -> Result<()> {
        if self.universe.is_some() {
            return Ok(());
        }
        let symbols = self.source.fetch_universe().await.map_err(|e| {
            warn!(error = %e, "Universe load failed, will retry next scan");
            e
        })?;
        info!(symbols = symbols.len(), "Universe loaded");
        self.cursor = 0;
        self.universe = Some(symbols);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testing::{MemoryWatchlistStore, ScriptedGateway, ScriptedUniverse};

    async fn watchlist(symbols: &[&str]) -> Watchlist {
        Watchlist::load(Arc::new(MemoryWatchlistStore::with(symbols))).await
    }

    fn gateway_for(symbols: &[&str]) -> Arc<ScriptedGateway> {
        let prices: Vec<(&str, f64)> = symbols.iter().map(|s| (*s, 100.0)).collect();
        Arc::new(ScriptedGateway::with_prices(&prices))
    }

    async fn scanner(
        universe: Arc<ScriptedUniverse>,
        gateway: Arc<ScriptedGateway>,
        watched: &[&str],
    ) -> UniverseRotationScanner {
        UniverseRotationScanner::new(
            universe,
            gateway,
            watchlist(watched).await,
            Baselines::new(),
            Duration::from_secs(2),
            4,
        )
    }

    fn names(result: &BatchResult) -> Vec<String> {
        result.symbols().iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn batches_rotate_and_wrap() {
        let universe = Arc::new(ScriptedUniverse::new(&["A", "B", "C"]));
        let mut scanner = scanner(universe, gateway_for(&["A", "B", "C"]), &[]).await;

        assert_eq!(names(&scanner.scan(3.0, 2).await.unwrap()), ["A", "B"]);
        assert_eq!(names(&scanner.scan(3.0, 2).await.unwrap()), ["C", "A"]);
        assert_eq!(names(&scanner.scan(3.0, 2).await.unwrap()), ["B", "C"]);
    }

    #[tokio::test]
    async fn scan_runs_on_a_spawned_task() {
        let universe = Arc::new(ScriptedUniverse::new(&["A", "B", "C"]));
        let scanner = scanner(universe, gateway_for(&["A", "B", "C"]), &[]).await;
        let scanner = Arc::new(tokio::sync::Mutex::new(scanner));

        let worker = Arc::clone(&scanner);
        let result = tokio::spawn(async move { worker.lock().await.scan(3.0, 2).await })
            .await
            .unwrap()
            .unwrap();

        assert_eq!(names(&result), ["A", "B"]);
        assert_eq!(scanner.lock().await.cursor(), 2);
    }

    #[tokio::test]
    async fn watchlist_symbols_are_always_skipped() {
        let universe = Arc::new(ScriptedUniverse::new(&["A", "B", "C"]));
        let gateway = gateway_for(&["A", "B", "C"]);
        let mut scanner = scanner(universe, gateway.clone(), &["B"]).await;

        for _ in 0..3 {
            let result = scanner.scan(3.0, 2).await.unwrap();
            if let Some(outcome) = result.outcome(&Symbol::new("B")) {
                assert!(matches!(outcome, SymbolOutcome::Skipped));
            }
        }
        assert!(!gateway.calls().contains(&"B".to_string()));
    }

    #[tokio::test]
    async fn watchlist_exclusion_matches_either_class_share_spelling() {
        let universe = Arc::new(ScriptedUniverse::new(&["BRK.B", "AAPL"]));
        let gateway = gateway_for(&["BRK-B", "AAPL"]);
        let mut scanner = scanner(universe, gateway.clone(), &["BRK-B"]).await;

        let result = scanner.scan(3.0, 2).await.unwrap();

        assert!(matches!(
            result.outcome(&Symbol::new("BRK.B")),
            Some(SymbolOutcome::Skipped)
        ));
        assert_eq!(gateway.calls(), ["AAPL"]);
    }

    #[tokio::test]
    async fn failed_load_leaves_cursor_and_retries() {
        let universe = Arc::new(ScriptedUniverse::new(&["A", "B", "C"]));
        universe.set_failing(true);
        let mut scanner = scanner(universe.clone(), gateway_for(&["A", "B", "C"]), &[]).await;

        assert!(scanner.scan(3.0, 2).await.is_err());
        assert_eq!(scanner.cursor(), 0);
        assert_eq!(scanner.universe_len(), None);

        universe.set_failing(false);
        assert_eq!(names(&scanner.scan(3.0, 2).await.unwrap()), ["A", "B"]);
        assert_eq!(universe.fetches(), 2);
    }

    #[tokio::test]
    async fn universe_is_loaded_once() {
        let universe = Arc::new(ScriptedUniverse::new(&["A", "B"]));
        let mut scanner = scanner(universe.clone(), gateway_for(&["A", "B"]), &[]).await;

        for _ in 0..4 {
            scanner.scan(3.0, 1).await.unwrap();
        }
        assert_eq!(universe.fetches(), 1);

        scanner.reset();
        scanner.scan(3.0, 1).await.unwrap();
        assert_eq!(universe.fetches(), 2);
    }

    #[tokio::test]
    async fn batch_larger_than_universe_visits_each_symbol_once() {
        let universe = Arc::new(ScriptedUniverse::new(&["A", "B", "C"]));
        let mut scanner = scanner(universe, gateway_for(&["A", "B", "C"]), &[]).await;

        let result = scanner.scan(3.0, 10).await.unwrap();
        assert_eq!(names(&result), ["A", "B", "C"]);
        assert_eq!(scanner.cursor(), 0);
    }

    #[tokio::test]
    async fn empty_universe_scans_nothing() {
        let universe = Arc::new(ScriptedUniverse::new(&[]));
        let mut scanner = scanner(universe, gateway_for(&[]), &[]).await;

        assert!(scanner.scan(3.0, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_batch_is_rejected() {
        let universe = Arc::new(ScriptedUniverse::new(&["A"]));
        let mut scanner = scanner(universe, gateway_for(&["A"]), &[]).await;

        assert!(matches!(scanner.scan(3.0, 0).await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn movers_reported_in_batch_order() {
        let symbols = ["A", "B", "C", "D"];
        let universe = Arc::new(ScriptedUniverse::new(&symbols));
        let gateway = gateway_for(&symbols);
        let mut scanner = scanner(universe, gateway.clone(), &[]).await;

        scanner.scan(3.0, 4).await.unwrap();
        gateway.set_price("A", 104.0);
        gateway.set_price("B", 101.0);
        gateway.set_price("C", 95.0);
        gateway.fail("D");

        let result = scanner.scan(3.0, 4).await.unwrap();
        let movers: Vec<String> = result.events().iter().map(|e| e.symbol.to_string()).collect();

        assert_eq!(movers, ["A", "C"]);
        assert_eq!(result.failures(), vec![&Symbol::new("D")]);
        assert!(matches!(
            result.outcome(&Symbol::new("B")),
            Some(SymbolOutcome::BelowThreshold(_))
        ));
    }
}
