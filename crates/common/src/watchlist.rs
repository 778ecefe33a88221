use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{Result, Symbol, WatchlistStore};

/// On-disk shape of the watchlist file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct WatchlistFile {
    #[serde(default)]
    symbols: Vec<Symbol>,
}

/// Watchlist persisted as `{"symbols": [...]}` in a JSON file.
pub struct JsonWatchlistStore {
    path: PathBuf,
}

impl JsonWatchlistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl WatchlistStore for JsonWatchlistStore {
    async fn load(&self) -> Result<Vec<Symbol>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                let file: WatchlistFile = serde_json::from_str(&content)?;
                Ok(file.symbols)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "Watchlist file missing, creating an empty one");
                self.save(&[]).await?;
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, symbols: &[Symbol]) -> Result<()> {
        let file = WatchlistFile {
            symbols: symbols.to_vec(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

/// Shared, mutable watchlist membership.
///
/// Chat commands add and remove symbols while detector ticks run; detectors
/// take a `snapshot()` at tick start and never iterate the live list.
#[derive(Clone)]
pub struct Watchlist {
    symbols: Arc<RwLock<Vec<Symbol>>>,
    store: Arc<dyn WatchlistStore>,
}

impl Watchlist {
    /// Load membership from the store. A failed load starts empty.
    pub async fn load(store: Arc<dyn WatchlistStore>) -> Self {
        let symbols = match store.load().await {
            Ok(symbols) => dedup(symbols),
            Err(e) => {
                warn!(error = %e, "Failed to load watchlist, starting empty");
                Vec::new()
            }
        };
        info!(count = symbols.len(), "Watchlist loaded");
        Self {
            symbols: Arc::new(RwLock::new(symbols)),
            store,
        }
    }

    pub async fn snapshot(&self) -> Vec<Symbol> {
        self.symbols.read().await.clone()
    }

    pub async fn contains(&self, symbol: &Symbol) -> bool {
        self.symbols.read().await.contains(symbol)
    }

    /// Add a symbol. Returns `false` if it was already present.
    pub async fn add(&self, symbol: Symbol) -> bool {
        let mut symbols = self.symbols.write().await;
        if symbols.contains(&symbol) {
            return false;
        }
        symbols.push(symbol);
        self.persist(&symbols).await;
        true
    }

    /// Remove a symbol. Returns `false` if it was not present.
    pub async fn remove(&self, symbol: &Symbol) -> bool {
        let mut symbols = self.symbols.write().await;
        let Some(idx) = symbols.iter().position(|s| s == symbol) else {
            return false;
        };
        symbols.remove(idx);
        self.persist(&symbols).await;
        true
    }

    async fn persist(&self, symbols: &[Symbol]) {
        if let Err(e) = self.store.save(symbols).await {
            warn!(error = %e, "Failed to persist watchlist");
        }
    }
}

fn dedup(symbols: Vec<Symbol>) -> Vec<Symbol> {
    let mut out: Vec<Symbol> = Vec::with_capacity(symbols.len());
    for s in symbols {
        if !out.contains(&s) {
            out.push(s);
        }
    }
    out
}
