use std::sync::Arc;
use std::time::Duration;

use teloxide::{dispatching::UpdateHandler, prelude::*, utils::command::BotCommands};
use tracing::{info, warn};

use common::{JobKind, MarketDataGateway, Result, Symbol, Watchlist};
use paper::PaperTrader;
use scheduler::{SchedulerCommand, SchedulerHandle};

use crate::format::{
    format_portfolios, format_quote, format_receipt, format_status, format_summary,
    format_watchlist, money, split_message, MAX_MESSAGE_CHARS,
};

type HandlerResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Dependencies injected into every handler via `dptree`.
#[derive(Clone)]
pub struct BotDeps {
    pub watchlist: Watchlist,
    pub scheduler: SchedulerHandle,
    pub trader: PaperTrader,
    pub gateway: Arc<dyn MarketDataGateway>,
    pub quote_timeout: Duration,
}

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Market watch commands:")]
pub enum Command {
    #[command(description = "Show this help")]
    Help,
    #[command(description = "Latest price: /price AAPL MSFT")]
    Price(String),
    #[command(description = "Add a symbol to the watchlist: /add AAPL")]
    Add(String),
    #[command(description = "Remove a symbol from the watchlist: /remove AAPL")]
    Remove(String),
    #[command(description = "Show the watchlist with prices")]
    Watchlist,
    #[command(description = "Show alert job status")]
    Status,
    #[command(description = "Pause all alerts")]
    Pause,
    #[command(description = "Resume alerts")]
    Resume,
    #[command(description = "Send the open report now")]
    Report,
    #[command(description = "Create a paper portfolio: /create NAME BALANCE", parse_with = "split")]
    Create { name: String, balance: f64 },
    #[command(description = "Rename a portfolio: /rename OLD NEW", parse_with = "split")]
    Rename { old: String, new: String },
    #[command(description = "Delete a portfolio: /delete NAME")]
    Delete(String),
    #[command(description = "List portfolios")]
    Portfolios,
    #[command(description = "Holdings and returns: /view NAME")]
    View(String),
    #[command(description = "Cash balance: /balance NAME")]
    Balance(String),
    #[command(description = "Paper buy: /buy NAME SYM SHARES", parse_with = "split")]
    Buy {
        portfolio: String,
        symbol: String,
        shares: f64,
    },
    #[command(description = "Paper sell: /sell NAME SYM SHARES", parse_with = "split")]
    Sell {
        portfolio: String,
        symbol: String,
        shares: f64,
    },
}

/// Start the Telegram bot in long-polling mode.
pub async fn start_bot(bot: Bot, deps: BotDeps) {
    let deps = Arc::new(deps);

    info!("Telegram bot starting (long-polling)");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![deps])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn schema() -> UpdateHandler<Box<dyn std::error::Error + Send + Sync>> {
    let command_handler = teloxide::filter_command::<Command, _>().endpoint(handle_command);

    Update::filter_message().branch(command_handler)
}

async fn handle_command(bot: Bot, msg: Message, cmd: Command, deps: Arc<BotDeps>) -> HandlerResult {
    info!(chat = %msg.chat.id, command = ?cmd, "Command received");
    let reply = respond(cmd, &deps).await;
    for chunk in split_message(&reply, MAX_MESSAGE_CHARS) {
        bot.send_message(msg.chat.id, chunk).await?;
    }
    Ok(())
}

/// Execute one command and build the reply text.
pub async fn respond(cmd: Command, deps: &BotDeps) -> String {
    match cmd {
        Command::Help => Command::descriptions().to_string(),
        Command::Price(args) => {
            let symbols = parse_symbols(&args);
            if symbols.is_empty() {
                return "Please provide at least one symbol: /price AAPL".to_string();
            }
            quotes(deps, &symbols).await.join("\n")
        }
        Command::Add(raw) => match parse_symbol(&raw) {
            Some(symbol) if deps.watchlist.add(symbol.clone()).await => {
                format!("Added {symbol} to the watchlist.")
            }
            Some(symbol) => format!("{symbol} is already on the watchlist."),
            None => "Usage: /add SYM".to_string(),
        },
        Command::Remove(raw) => match parse_symbol(&raw) {
            Some(symbol) if deps.watchlist.remove(&symbol).await => {
                format!("Removed {symbol} from the watchlist.")
            }
            Some(symbol) => format!("{symbol} is not on the watchlist."),
            None => "Usage: /remove SYM".to_string(),
        },
        Command::Watchlist => {
            let symbols = deps.watchlist.snapshot().await;
            if symbols.is_empty() {
                return format_watchlist(&symbols);
            }
            format!("{}\n\n{}", format_watchlist(&symbols), quotes(deps, &symbols).await.join("\n"))
        }
        Command::Status => {
            let paused = deps.scheduler.is_paused().await;
            format_status(paused, &deps.scheduler.statuses().await)
        }
        Command::Pause => {
            deps.scheduler.send(SchedulerCommand::Pause).await;
            "Alerts paused. /resume to restart.".to_string()
        }
        Command::Resume => {
            deps.scheduler.send(SchedulerCommand::Resume).await;
            "Alerts resumed.".to_string()
        }
        Command::Report => {
            deps.scheduler
                .send(SchedulerCommand::RunNow(JobKind::OpenReport))
                .await;
            "Open report requested (skipped on weekends).".to_string()
        }
        Command::Create { name, balance } => reply(
            deps.trader
                .ledger()
                .create_portfolio(&name, balance)
                .await
                .map(|p| format!("Created portfolio {} with {}.", p.name, money(p.balance))),
        ),
        Command::Rename { old, new } => reply(
            deps.trader
                .ledger()
                .rename_portfolio(&old, &new)
                .await
                .map(|_| format!("Renamed {old} to {new}.")),
        ),
        Command::Delete(name) => reply(
            deps.trader
                .ledger()
                .delete_portfolio(name.trim())
                .await
                .map(|_| format!("Deleted portfolio {}.", name.trim())),
        ),
        Command::Portfolios => reply(
            deps.trader
                .ledger()
                .list_portfolios()
                .await
                .map(|all| format_portfolios(&all)),
        ),
        Command::View(name) => reply(
            deps.trader
                .summary(name.trim())
                .await
                .map(|s| format_summary(&s)),
        ),
        Command::Balance(name) => reply(
            deps.trader
                .ledger()
                .balance(name.trim())
                .await
                .map(|b| format!("{}: {}", name.trim(), money(b))),
        ),
        Command::Buy {
            portfolio,
            symbol,
            shares,
        } => reply(
            deps.trader
                .buy(&portfolio, &Symbol::new(symbol), shares)
                .await
                .map(|r| format_receipt(&r)),
        ),
        Command::Sell {
            portfolio,
            symbol,
            shares,
        } => reply(
            deps.trader
                .sell(&portfolio, &Symbol::new(symbol), shares)
                .await
                .map(|r| format_receipt(&r)),
        ),
    }
}

fn reply(result: Result<String>) -> String {
    result.unwrap_or_else(|e| {
        warn!(error = %e, "Command failed");
        format!("Error: {e}")
    })
}

fn parse_symbol(raw: &str) -> Option<Symbol> {
    let raw = raw.trim();
    let valid = !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
    valid.then(|| Symbol::new(raw))
}

fn parse_symbols(raw: &str) -> Vec<Symbol> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter_map(parse_symbol)
        .collect()
}

async fn quotes(deps: &BotDeps, symbols: &[Symbol]) -> Vec<String> {
    let mut lines = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let quote = tokio::time::timeout(deps.quote_timeout, deps.gateway.latest_price(symbol)).await;
        lines.push(match quote {
            Ok(Ok(sample)) => format_quote(symbol, sample.price),
            Ok(Err(e)) => {
                warn!(symbol = %symbol, error = %e, "Quote failed");
                format!("{symbol}: could not get price")
            }
            Err(_) => format!("{symbol}: timed out"),
        });
    }
    lines
}

/// Send a proactive alert to all configured chat IDs.
pub async fn send_alert(bot: &Bot, chat_ids: &[ChatId], message: &str) {
    for &chat_id in chat_ids {
        if let Err(e) = bot.send_message(chat_id, message).await {
            warn!(chat_id = ?chat_id, error = %e, "Failed to send Telegram alert");
        }
    }
}
