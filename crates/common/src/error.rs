use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider timed out: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("State corruption: {0}")]
    StateCorruption(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Portfolio '{0}' not found")]
    PortfolioNotFound(String),

    #[error("Portfolio '{0}' already exists")]
    PortfolioExists(String),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Insufficient funds: need ${needed:.2}, balance ${balance:.2}")]
    InsufficientFunds { needed: f64, balance: f64 },

    #[error("Insufficient shares of {symbol}: requested {requested}, held {held}")]
    InsufficientShares {
        symbol: String,
        requested: f64,
        held: f64,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for failures that only cost one symbol its data for one tick.
    pub fn is_provider_failure(&self) -> bool {
        matches!(self, Error::Provider(_) | Error::Timeout(_) | Error::Http(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
