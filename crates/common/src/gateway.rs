use async_trait::async_trait;

use crate::{DailyClose, IntradaySample, JobKind, MoverEvent, PriceSample, Result, Symbol};

/// Abstraction over the remote market-data provider.
///
/// `YahooClient` in `crates/provider` implements this against the Yahoo
/// Finance chart API. Implementations may fail or rate-limit at any time;
/// callers treat every error as a per-symbol miss.
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// Latest traded price for a symbol.
    async fn latest_price(&self, symbol: &Symbol) -> Result<PriceSample>;

    /// Daily closes for the last `days` sessions, oldest first. The last
    /// element is today's still-forming bar while the market is open. May
    /// return fewer than `days` entries.
    async fn daily_closes(&self, symbol: &Symbol, days: u32) -> Result<Vec<DailyClose>>;

    /// Intraday closes over the last `days` sessions, oldest first.
    async fn intraday_series(&self, symbol: &Symbol, days: u32) -> Result<Vec<IntradaySample>>;
}

/// Source of the large symbol universe scanned in rotation.
#[async_trait]
pub trait UniverseSource: Send + Sync {
    async fn fetch_universe(&self) -> Result<Vec<Symbol>>;
}

/// Persistence for watchlist membership. Best effort: callers log failures
/// and keep their in-memory copy.
#[async_trait]
pub trait WatchlistStore: Send + Sync {
    async fn load(&self) -> Result<Vec<Symbol>>;
    async fn save(&self, symbols: &[Symbol]) -> Result<()>;
}

/// Receives the aggregated result of one job firing.
///
/// Called at most once per firing and never with an empty slice.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn on_mover_events(&self, job: JobKind, events: &[MoverEvent]);
}
