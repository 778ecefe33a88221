use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use common::{ChangeRecord, PriceSample, Symbol};

use crate::change::evaluate;

/// Last observed sample per symbol for one detector.
///
/// Each detector owns its own instance; the watchlist and universe maps are
/// never shared. Clones share the same map (the resolver reads it for the
/// last-tick basis).
#[derive(Clone, Default)]
pub struct Baselines {
    inner: Arc<RwLock<HashMap<Symbol, PriceSample>>>,
}

impl Baselines {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, symbol: &Symbol) -> Option<PriceSample> {
        self.inner.read().await.get(symbol).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }

    /// Compare `sample` against the stored baseline, then store `sample`.
    ///
    /// Returns `None` on first sighting. The overwrite is unconditional, so
    /// each tick measures movement since the previous tick only.
    pub async fn observe(&self, sample: PriceSample) -> Option<ChangeRecord> {
        let mut map = self.inner.write().await;
        let change = map
            .get(&sample.symbol)
            .map(|prior| evaluate(&sample.symbol, sample.price, prior.price));
        map.insert(sample.symbol.clone(), sample);
        change
    }
}
