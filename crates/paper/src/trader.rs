use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::warn;

use common::{Error, MarketDataGateway, OrderSide, Result, Symbol};

use crate::ledger::{Ledger, TradeReceipt};

/// One holding valued at the current market price.
///
/// The price fields are `None` when the quote could not be fetched.
#[derive(Debug, Clone, Serialize)]
pub struct HoldingValue {
    pub symbol: Symbol,
    pub shares: f64,
    pub cost_basis: f64,
    pub price: Option<f64>,
    pub value: Option<f64>,
    pub gain: Option<f64>,
    pub gain_percent: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    pub name: String,
    pub balance: f64,
    pub holdings: Vec<HoldingValue>,
    pub holdings_value: f64,
    pub total_value: f64,
    pub total_return: f64,
    pub total_return_percent: f64,
}

/// Market orders against the paper ledger, filled at the latest quote.
#[derive(Clone)]
pub struct PaperTrader {
    ledger: Ledger,
    gateway: Arc<dyn MarketDataGateway>,
    quote_timeout: Duration,
}

impl PaperTrader {
    pub fn new(ledger: Ledger, gateway: Arc<dyn MarketDataGateway>, quote_timeout: Duration) -> Self {
        Self {
            ledger,
            gateway,
            quote_timeout,
        }
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub async fn buy(&self, portfolio: &str, symbol: &Symbol, shares: f64) -> Result<TradeReceipt> {
        self.trade(portfolio, symbol, OrderSide::Buy, shares).await
    }

    pub async fn sell(&self, portfolio: &str, symbol: &Symbol, shares: f64) -> Result<TradeReceipt> {
        self.trade(portfolio, symbol, OrderSide::Sell, shares).await
    }

    async fn trade(
        &self,
        portfolio: &str,
        symbol: &Symbol,
        side: OrderSide,
        shares: f64,
    ) -> Result<TradeReceipt> {
        let price = self.quote(symbol).await?;
        self.ledger
            .record_trade(portfolio, symbol, side, shares, price)
            .await
    }

    async fn quote(&self, symbol: &Symbol) -> Result<f64> {
        let sample = tokio::time::timeout(self.quote_timeout, self.gateway.latest_price(symbol))
            .await
            .map_err(|_| Error::Timeout(format!("{symbol}: no quote within {:?}", self.quote_timeout)))??;
        if !sample.price.is_finite() || sample.price <= 0.0 {
            return Err(Error::Provider(format!("{symbol}: unusable quote {}", sample.price)));
        }
        Ok(sample.price)
    }

    /// Value every holding at the current price.
    ///
    /// Returns are measured on priced holdings only; a holding without a
    /// quote is listed with its cost basis and no value.
    pub async fn summary(&self, portfolio: &str) -> Result<PortfolioSummary> {
        let balance = self.ledger.balance(portfolio).await?;
        let holdings = self.ledger.holdings(portfolio).await?;

        let mut valued = Vec::with_capacity(holdings.len());
        let (mut holdings_value, mut total_return) = (0.0, 0.0);

        for holding in holdings {
            let price = match self.quote(&holding.symbol).await {
                Ok(price) => Some(price),
                Err(e) => {
                    warn!(symbol = %holding.symbol, error = %e, "No quote for holding, listing without value");
                    None
                }
            };
            let value = price.map(|p| p * holding.shares);
            let gain = value.map(|v| v - holding.cost_basis);
            if let (Some(v), Some(g)) = (value, gain) {
                holdings_value += v;
                total_return += g;
            }
            valued.push(HoldingValue {
                gain_percent: gain
                    .filter(|_| holding.cost_basis > 0.0)
                    .map(|g| g / holding.cost_basis * 100.0),
                symbol: holding.symbol,
                shares: holding.shares,
                cost_basis: holding.cost_basis,
                price,
                value,
                gain,
            });
        }

        let total_value = balance + holdings_value;
        let invested = total_value - total_return;
        let total_return_percent = if invested > 0.0 {
            total_return / invested * 100.0
        } else {
            0.0
        };

        Ok(PortfolioSummary {
            name: portfolio.to_string(),
            balance,
            holdings: valued,
            holdings_value,
            total_value,
            total_return,
            total_return_percent,
        })
    }
}
