use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A ticker as typed by a user, plus the provider-safe form used for lookups.
///
/// Class shares are written with a dot by most listings (`BRK.B`) but the
/// data provider expects a hyphen (`BRK-B`). Equality and hashing use the
/// lookup form, so both spellings name the same symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Symbol {
    display: String,
    lookup: String,
}

impl Symbol {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let display = raw.as_ref().trim().to_uppercase();
        let lookup = display.replace('.', "-");
        Self { display, lookup }
    }

    /// Form shown to users.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Form sent to the data provider.
    pub fn lookup(&self) -> &str {
        &self.lookup
    }

    pub fn asset_class(&self) -> AssetClass {
        AssetClass::of(self)
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.lookup == other.lookup
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.lookup.hash(state);
    }
}

impl From<String> for Symbol {
    fn from(raw: String) -> Self {
        Symbol::new(raw)
    }
}

impl From<&str> for Symbol {
    fn from(raw: &str) -> Self {
        Symbol::new(raw)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.display
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display)
    }
}

/// Broad instrument category, inferred from ticker notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetClass {
    Stock,
    Index,
    Crypto,
    Commodity,
    Futures,
    Forex,
}

impl AssetClass {
    const CRYPTO_SUFFIXES: [&'static str; 4] = ["-USD", "-USDT", "-USDC", "-DAI"];
    const COMMODITIES: [&'static str; 4] = ["GC=F", "CL=F", "SI=F", "NG=F"];

    pub fn of(symbol: &Symbol) -> Self {
        let s = symbol.lookup();
        if s.starts_with('^') {
            AssetClass::Index
        } else if Self::CRYPTO_SUFFIXES.iter().any(|suffix| s.ends_with(suffix)) {
            AssetClass::Crypto
        } else if Self::COMMODITIES.contains(&s) {
            AssetClass::Commodity
        } else if s.ends_with("=F") {
            AssetClass::Futures
        } else if s.ends_with("=X") {
            AssetClass::Forex
        } else {
            AssetClass::Stock
        }
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetClass::Stock => write!(f, "stock"),
            AssetClass::Index => write!(f, "index"),
            AssetClass::Crypto => write!(f, "crypto"),
            AssetClass::Commodity => write!(f, "commodity"),
            AssetClass::Futures => write!(f, "futures"),
            AssetClass::Forex => write!(f, "forex"),
        }
    }
}

/// A price observed from the provider at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub symbol: Symbol,
    pub price: f64,
    pub observed_at: DateTime<Utc>,
}

impl PriceSample {
    pub fn new(symbol: Symbol, price: f64, observed_at: DateTime<Utc>) -> Self {
        Self {
            symbol,
            price,
            observed_at,
        }
    }
}

/// One completed (or still-forming, for the last element) daily bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyClose {
    pub date: NaiveDate,
    pub close: f64,
}

/// One intraday bar close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntradaySample {
    pub observed_at: DateTime<Utc>,
    pub price: f64,
}

/// What a current price is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Basis {
    LastTick,
    PreviousClose,
    WeekStart,
}

impl std::fmt::Display for Basis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Basis::LastTick => write!(f, "last tick"),
            Basis::PreviousClose => write!(f, "previous close"),
            Basis::WeekStart => write!(f, "week start"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePrice {
    pub symbol: Symbol,
    pub price: f64,
    pub basis: Basis,
}

/// Change of a current price against a reference price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub symbol: Symbol,
    pub current: f64,
    pub reference: f64,
    pub absolute_change: f64,
    pub percent_change: f64,
}

/// A qualifying change, ready to be published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoverEvent {
    pub id: uuid::Uuid,
    pub symbol: Symbol,
    pub change: ChangeRecord,
    pub timestamp: DateTime<Utc>,
}

impl MoverEvent {
    pub fn new(change: ChangeRecord, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            symbol: change.symbol.clone(),
            change,
            timestamp,
        }
    }
}

/// Scheduled jobs. Passed to the alert sink so it can title its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    WatchlistChanges,
    UniverseMovers,
    OpenReport,
    WeekendReport,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [
        JobKind::WatchlistChanges,
        JobKind::UniverseMovers,
        JobKind::OpenReport,
        JobKind::WeekendReport,
    ];

    /// Report jobs list every symbol; the others only list threshold breaches.
    pub fn is_report(&self) -> bool {
        matches!(self, JobKind::OpenReport | JobKind::WeekendReport)
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobKind::WatchlistChanges => write!(f, "watchlist_changes"),
            JobKind::UniverseMovers => write!(f, "universe_movers"),
            JobKind::OpenReport => write!(f, "open_report"),
            JobKind::WeekendReport => write!(f, "weekend_report"),
        }
    }
}

/// Lifecycle of a scheduled job firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[default]
    Idle,
    Running,
    Suppressed,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Idle => write!(f, "idle"),
            JobState::Running => write!(f, "running"),
            JobState::Suppressed => write!(f, "suppressed"),
        }
    }
}

/// Side of a paper trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "TEXT", rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}
