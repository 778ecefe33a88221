pub mod baseline;
pub mod change;
mod fetch;
pub mod outcome;
pub mod reference;
pub mod report;
pub mod universe;
pub mod watchlist;

pub use baseline::Baselines;
pub use change::{evaluate, is_significant, percent_change};
pub use outcome::{BatchResult, SymbolOutcome};
pub use reference::ReferencePriceResolver;
pub use report::ChangeReporter;
pub use universe::UniverseRotationScanner;
pub use watchlist::WatchlistChangeDetector;
