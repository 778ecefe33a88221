use tracing::warn;

use common::{ChangeRecord, MoverEvent, PriceSample, Result, Symbol};

use crate::baseline::Baselines;
use crate::change::is_significant;

/// What happened to one symbol during a tick or scan.
#[derive(Debug, Clone)]
pub enum SymbolOutcome {
    /// First sighting: baseline stored, nothing to compare.
    Baselined,
    /// Compared, but the move was under the threshold.
    BelowThreshold(ChangeRecord),
    /// Compared and the move reached the threshold.
    Mover(MoverEvent),
    /// Not evaluated by this detector (already covered elsewhere).
    Skipped,
    /// Provider failed; baseline untouched.
    Failed(String),
}

/// Per-symbol outcomes of one detector run, in processing order.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    outcomes: Vec<(Symbol, SymbolOutcome)>,
}

impl BatchResult {
    pub fn push(&mut self, symbol: Symbol, outcome: SymbolOutcome) {
        self.outcomes.push((symbol, outcome));
    }

    pub fn outcomes(&self) -> &[(Symbol, SymbolOutcome)] {
        &self.outcomes
    }

    /// Symbols in the order they were processed.
    pub fn symbols(&self) -> Vec<&Symbol> {
        self.outcomes.iter().map(|(s, _)| s).collect()
    }

    pub fn outcome(&self, symbol: &Symbol) -> Option<&SymbolOutcome> {
        self.outcomes
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, o)| o)
    }

    pub fn events(&self) -> Vec<&MoverEvent> {
        self.outcomes
            .iter()
            .filter_map(|(_, o)| match o {
                SymbolOutcome::Mover(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    pub fn into_events(self) -> Vec<MoverEvent> {
        self.outcomes
            .into_iter()
            .filter_map(|(_, o)| match o {
                SymbolOutcome::Mover(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> Vec<&Symbol> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, SymbolOutcome::Failed(_)))
            .map(|(s, _)| s)
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&SymbolOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Turn one fetch result into an outcome, updating `baselines` on success.
pub(crate) async fn classify(
    baselines: &Baselines,
    symbol: &Symbol,
    fetched: Result<PriceSample>,
    threshold_percent: f64,
) -> SymbolOutcome {
    let sample = match fetched {
        Ok(sample) => sample,
        Err(e) => {
            warn!(symbol = %symbol, error = %e, "Price fetch failed, skipping symbol this tick");
            return SymbolOutcome::Failed(e.to_string());
        }
    };

    let observed_at = sample.observed_at;
    match baselines.observe(sample).await {
        None => SymbolOutcome::Baselined,
        Some(change) if is_significant(&change, threshold_percent) => {
            SymbolOutcome::Mover(MoverEvent::new(change, observed_at))
        }
        Some(change) => SymbolOutcome::BelowThreshold(change),
    }
}
