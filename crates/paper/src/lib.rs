pub mod ledger;
pub mod trader;

pub use ledger::{Holding, Ledger, PortfolioInfo, TradeReceipt};
pub use trader::{HoldingValue, PaperTrader, PortfolioSummary};
