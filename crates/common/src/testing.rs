//! Scripted in-memory collaborators for tests.
//!
//! Enabled in downstream crates through the `testing` feature on their
//! dev-dependency on `common`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    AlertSink, DailyClose, Error, IntradaySample, JobKind, MarketDataGateway, MoverEvent,
    PriceSample, Result, Symbol, UniverseSource, WatchlistStore,
};

/// Gateway whose answers are set per symbol by the test.
#[derive(Default)]
pub struct ScriptedGateway {
    prices: Mutex<HashMap<Symbol, f64>>,
    daily: Mutex<HashMap<Symbol, Vec<DailyClose>>>,
    intraday: Mutex<HashMap<Symbol, Vec<IntradaySample>>>,
    failing: Mutex<HashSet<Symbol>>,
    hanging: Mutex<HashSet<Symbol>>,
    calls: Mutex<Vec<Symbol>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prices(prices: &[(&str, f64)]) -> Self {
        let gw = Self::new();
        for (symbol, price) in prices {
            gw.set_price(symbol, *price);
        }
        gw
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.prices.lock().unwrap().insert(Symbol::new(symbol), price);
    }

    pub fn set_daily(&self, symbol: &str, closes: Vec<DailyClose>) {
        self.daily.lock().unwrap().insert(Symbol::new(symbol), closes);
    }

    pub fn set_intraday(&self, symbol: &str, samples: Vec<IntradaySample>) {
        self.intraday
            .lock()
            .unwrap()
            .insert(Symbol::new(symbol), samples);
    }

    /// Make every call for `symbol` fail until `recover` is called.
    pub fn fail(&self, symbol: &str) {
        self.failing.lock().unwrap().insert(Symbol::new(symbol));
    }

    pub fn recover(&self, symbol: &str) {
        self.failing.lock().unwrap().remove(&Symbol::new(symbol));
    }

    /// Make `latest_price` for `symbol` never answer in test time.
    pub fn hang(&self, symbol: &str) {
        self.hanging.lock().unwrap().insert(Symbol::new(symbol));
    }

    /// Symbols passed to `latest_price`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.display().to_string())
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn check_failing(&self, symbol: &Symbol) -> Result<()> {
        if self.failing.lock().unwrap().contains(symbol) {
            return Err(Error::Provider(format!("scripted failure for {symbol}")));
        }
        Ok(())
    }
}

#[async_trait]
impl MarketDataGateway for ScriptedGateway {
    async fn latest_price(&self, symbol: &Symbol) -> Result<PriceSample> {
        self.calls.lock().unwrap().push(symbol.clone());
        self.check_failing(symbol)?;

        let hanging = self.hanging.lock().unwrap().contains(symbol);
        if hanging {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        let price = self
            .prices
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .ok_or_else(|| Error::Provider(format!("no scripted price for {symbol}")))?;
        Ok(PriceSample::new(symbol.clone(), price, Utc::now()))
    }

    async fn daily_closes(&self, symbol: &Symbol, days: u32) -> Result<Vec<DailyClose>> {
        self.check_failing(symbol)?;
        let closes = self
            .daily
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default();
        let skip = closes.len().saturating_sub(days as usize);
        Ok(closes.into_iter().skip(skip).collect())
    }

    async fn intraday_series(&self, symbol: &Symbol, _days: u32) -> Result<Vec<IntradaySample>> {
        self.check_failing(symbol)?;
        Ok(self
            .intraday
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default())
    }
}

/// Universe source backed by a fixed list, with a failure switch.
#[derive(Default)]
pub struct ScriptedUniverse {
    symbols: Mutex<Vec<Symbol>>,
    failing: AtomicBool,
    fetches: AtomicUsize,
}

impl ScriptedUniverse {
    pub fn new(symbols: &[&str]) -> Self {
        Self {
            symbols: Mutex::new(symbols.iter().map(Symbol::new).collect()),
            ..Default::default()
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of fetch attempts, including failed ones.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UniverseSource for ScriptedUniverse {
    async fn fetch_universe(&self) -> Result<Vec<Symbol>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Provider("scripted universe outage".into()));
        }
        Ok(self.symbols.lock().unwrap().clone())
    }
}

/// Watchlist store that keeps everything in memory.
#[derive(Default)]
pub struct MemoryWatchlistStore {
    symbols: tokio::sync::Mutex<Vec<Symbol>>,
}

impl MemoryWatchlistStore {
    pub fn with(symbols: &[&str]) -> Self {
        Self {
            symbols: tokio::sync::Mutex::new(symbols.iter().map(Symbol::new).collect()),
        }
    }

    pub async fn saved(&self) -> Vec<Symbol> {
        self.symbols.lock().await.clone()
    }
}

#[async_trait]
impl WatchlistStore for MemoryWatchlistStore {
    async fn load(&self) -> Result<Vec<Symbol>> {
        Ok(self.symbols.lock().await.clone())
    }

    async fn save(&self, symbols: &[Symbol]) -> Result<()> {
        *self.symbols.lock().await = symbols.to_vec();
        Ok(())
    }
}

/// Sink that records every publish call.
#[derive(Default)]
pub struct RecordingSink {
    published: Mutex<Vec<(JobKind, Vec<MoverEvent>)>>,
}

impl RecordingSink {
    pub fn published(&self) -> Vec<(JobKind, Vec<MoverEvent>)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn on_mover_events(&self, job: JobKind, events: &[MoverEvent]) {
        self.published.lock().unwrap().push((job, events.to_vec()));
    }
}
