use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use tracing::info;

use common::{Error, OrderSide, Result, Symbol};

/// Shares below this are treated as zero (float residue from partial sells).
const SHARE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PortfolioInfo {
    pub name: String,
    pub initial_balance: f64,
    pub balance: f64,
    pub created_at: String,
}

/// Net position in one symbol.
#[derive(Debug, Clone, Serialize)]
pub struct Holding {
    pub symbol: Symbol,
    pub shares: f64,
    /// Net cash spent: buys minus sell proceeds.
    pub cost_basis: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeReceipt {
    pub portfolio: String,
    pub symbol: Symbol,
    pub side: OrderSide,
    pub shares: f64,
    pub price_per_share: f64,
    pub total_price: f64,
    pub new_balance: f64,
    pub executed_at: DateTime<Utc>,
}

/// SQLite-backed paper portfolios.
#[derive(Clone)]
pub struct Ledger {
    db: SqlitePool,
}

impl Ledger {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Open (creating if needed) the database at `url` and apply migrations.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let db = SqlitePoolOptions::new().connect_with(options).await?;
        let ledger = Self::new(db);
        ledger.migrate().await?;
        Ok(ledger)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.db)
            .await
            .map_err(sqlx::Error::from)?;
        info!("Ledger migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }

    pub async fn create_portfolio(&self, name: &str, initial_balance: f64) -> Result<PortfolioInfo> {
        let name = valid_name(name)?;
        if !initial_balance.is_finite() || initial_balance <= 0.0 {
            return Err(Error::InvalidOrder(format!(
                "initial balance must be positive, got {initial_balance}"
            )));
        }

        let mut tx = self.db.begin().await?;
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT portfolio_id FROM portfolios WHERE name = ?1")
                .bind(name)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_some() {
            return Err(Error::PortfolioExists(name.to_string()));
        }

        let now = Utc::now().to_rfc3339();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO portfolios (name, initial_balance, created_at) VALUES (?1, ?2, ?3)
             RETURNING portfolio_id",
        )
        .bind(name)
        .bind(initial_balance)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO balances (portfolio_id, balance, recorded_at) VALUES (?1, ?2, ?3)")
            .bind(id)
            .bind(initial_balance)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(portfolio = %name, balance = initial_balance, "Portfolio created");
        Ok(PortfolioInfo {
            name: name.to_string(),
            initial_balance,
            balance: initial_balance,
            created_at: now,
        })
    }

    pub async fn rename_portfolio(&self, old: &str, new: &str) -> Result<()> {
        let new = valid_name(new)?;
        let mut tx = self.db.begin().await?;

        let taken: Option<i64> =
            sqlx::query_scalar("SELECT portfolio_id FROM portfolios WHERE name = ?1")
                .bind(new)
                .fetch_optional(&mut *tx)
                .await?;
        if taken.is_some() {
            return Err(Error::PortfolioExists(new.to_string()));
        }

        let renamed = sqlx::query("UPDATE portfolios SET name = ?1 WHERE name = ?2")
            .bind(new)
            .bind(old)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if renamed == 0 {
            return Err(Error::PortfolioNotFound(old.to_string()));
        }
        tx.commit().await?;

        info!(from = %old, to = %new, "Portfolio renamed");
        Ok(())
    }

    /// Remove a portfolio with its balance history and trades.
    pub async fn delete_portfolio(&self, name: &str) -> Result<()> {
        let mut tx = self.db.begin().await?;
        let id = portfolio_id(&mut tx, name).await?;

        for table in ["transactions", "balances", "portfolios"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE portfolio_id = ?1"))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        info!(portfolio = %name, "Portfolio deleted");
        Ok(())
    }

    pub async fn list_portfolios(&self) -> Result<Vec<PortfolioInfo>> {
        let rows = sqlx::query_as::<_, PortfolioInfo>(
            r#"
            SELECT p.name, p.initial_balance, p.created_at,
                   COALESCE(
                       (SELECT b.balance FROM balances b
                        WHERE b.portfolio_id = p.portfolio_id
                        ORDER BY b.balance_id DESC LIMIT 1),
                       p.initial_balance
                   ) AS balance
            FROM portfolios p
            ORDER BY p.name
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    pub async fn portfolio(&self, name: &str) -> Result<PortfolioInfo> {
        self.list_portfolios()
            .await?
            .into_iter()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::PortfolioNotFound(name.to_string()))
    }

    pub async fn balance(&self, name: &str) -> Result<f64> {
        let mut conn = self.db.acquire().await?;
        let id = portfolio_id(&mut conn, name).await?;
        current_balance(&mut conn, id).await
    }

    /// Apply one trade atomically: the transaction row and the new balance
    /// row are written together or not at all.
    pub async fn record_trade(
        &self,
        name: &str,
        symbol: &Symbol,
        side: OrderSide,
        shares: f64,
        price: f64,
    ) -> Result<TradeReceipt> {
        if !shares.is_finite() || shares <= 0.0 {
            return Err(Error::InvalidOrder(format!("shares must be positive, got {shares}")));
        }
        if !price.is_finite() || price <= 0.0 {
            return Err(Error::InvalidOrder(format!("{symbol}: no usable price ({price})")));
        }

        let mut tx = self.db.begin().await?;
        let id = portfolio_id(&mut tx, name).await?;
        let balance = current_balance(&mut tx, id).await?;
        let total = shares * price;

        let new_balance = match side {
            OrderSide::Buy => {
                if total > balance {
                    return Err(Error::InsufficientFunds {
                        needed: total,
                        balance,
                    });
                }
                balance - total
            }
            OrderSide::Sell => {
                let held: f64 = sqlx::query_scalar(
                    "SELECT COALESCE(SUM(CASE WHEN side = 'BUY' THEN shares ELSE -shares END), 0.0)
                     FROM transactions WHERE portfolio_id = ?1 AND symbol = ?2",
                )
                .bind(id)
                .bind(symbol.lookup())
                .fetch_one(&mut *tx)
                .await?;
                if shares > held + SHARE_EPSILON {
                    return Err(Error::InsufficientShares {
                        symbol: symbol.to_string(),
                        requested: shares,
                        held,
                    });
                }
                balance + total
            }
        };

        let executed_at = Utc::now();
        let stamp = executed_at.to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO transactions
                (portfolio_id, symbol, display_symbol, side, shares, price_per_share, total_price, executed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(id)
        .bind(symbol.lookup())
        .bind(symbol.display())
        .bind(side.to_string())
        .bind(shares)
        .bind(price)
        .bind(total)
        .bind(&stamp)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO balances (portfolio_id, balance, recorded_at) VALUES (?1, ?2, ?3)")
            .bind(id)
            .bind(new_balance)
            .bind(&stamp)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(
            portfolio = %name,
            symbol = %symbol,
            side = %side,
            shares,
            price,
            new_balance,
            "Paper trade recorded"
        );
        Ok(TradeReceipt {
            portfolio: name.to_string(),
            symbol: symbol.clone(),
            side,
            shares,
            price_per_share: price,
            total_price: total,
            new_balance,
            executed_at,
        })
    }

    /// Symbols with a positive net share count, by symbol.
    ///
    /// A position is keyed by lookup form and shown in the spelling of its
    /// first trade.
    pub async fn holdings(&self, name: &str) -> Result<Vec<Holding>> {
        let mut conn = self.db.acquire().await?;
        let id = portfolio_id(&mut conn, name).await?;

        let rows: Vec<(String, f64, f64)> = sqlx::query_as(
            r#"
            SELECT (SELECT earliest.display_symbol FROM transactions AS earliest
                    WHERE earliest.portfolio_id = transactions.portfolio_id
                      AND earliest.symbol = transactions.symbol
                    ORDER BY earliest.transaction_id LIMIT 1) AS display_symbol,
                   SUM(CASE WHEN side = 'BUY' THEN shares ELSE -shares END) AS net_shares,
                   SUM(CASE WHEN side = 'BUY' THEN total_price ELSE -total_price END) AS cost_basis
            FROM transactions
            WHERE portfolio_id = ?1
            GROUP BY symbol
            HAVING net_shares > ?2
            ORDER BY symbol
            "#,
        )
        .bind(id)
        .bind(SHARE_EPSILON)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(symbol, shares, cost_basis)| Holding {
                symbol: Symbol::new(symbol),
                shares,
                cost_basis,
            })
            .collect())
    }
}

fn valid_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(Error::InvalidOrder(format!(
            "portfolio name '{name}' must be one non-empty word"
        )));
    }
    Ok(name)
}

async fn portfolio_id(conn: &mut sqlx::SqliteConnection, name: &str) -> Result<i64> {
    sqlx::query_scalar("SELECT portfolio_id FROM portfolios WHERE name = ?1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| Error::PortfolioNotFound(name.to_string()))
}

async fn current_balance(conn: &mut sqlx::SqliteConnection, id: i64) -> Result<f64> {
    let balance: Option<f64> = sqlx::query_scalar(
        "SELECT balance FROM balances WHERE portfolio_id = ?1 ORDER BY balance_id DESC LIMIT 1",
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    balance.ok_or_else(|| Error::StateCorruption(format!("portfolio {id} has no balance row")))
}
