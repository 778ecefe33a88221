pub mod config;
pub mod error;
pub mod gateway;
pub mod types;
pub mod watchlist;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::Config;
pub use error::{Error, Result};
pub use gateway::{AlertSink, MarketDataGateway, UniverseSource, WatchlistStore};
pub use types::*;
pub use watchlist::{JsonWatchlistStore, Watchlist};
