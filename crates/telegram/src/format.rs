//! Plain-text rendering of alerts and command replies.

use common::{JobKind, MoverEvent, Symbol};
use paper::{PortfolioInfo, PortfolioSummary, TradeReceipt};
use scheduler::JobStatus;

/// Universe alerts name at most this many symbols in the title.
const TITLE_SYMBOLS: usize = 5;
/// Report lines at or beyond this magnitude get a star.
const STAR_PERCENT: f64 = 2.0;
/// Telegram rejects messages longer than 4096 characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

pub fn money(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let cents = format!("{:.2}", value.abs());
    let (whole, frac) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{sign}${grouped}.{frac}")
}

pub fn signed_percent(pct: f64) -> String {
    let sign = if pct >= 0.0 { "+" } else { "" };
    format!("{sign}{pct:.2}%")
}

fn arrow(pct: f64) -> &'static str {
    if pct >= 0.0 {
        "🟢"
    } else {
        "🔴"
    }
}

fn title(job: JobKind, events: &[MoverEvent]) -> String {
    let names = |limit: usize| {
        events
            .iter()
            .take(limit)
            .map(|e| e.symbol.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    match job {
        JobKind::WatchlistChanges => {
            format!("ALERT: Big Price Movement for {}", names(events.len()))
        }
        JobKind::UniverseMovers => {
            let more = if events.len() > TITLE_SYMBOLS { "..." } else { "" };
            format!(
                "S&P 500 ALERT: Big Price Movement for {}{more}",
                names(TITLE_SYMBOLS)
            )
        }
        JobKind::OpenReport => "Market Open Report".to_string(),
        JobKind::WeekendReport => "Weekend Market Report (market closed)".to_string(),
    }
}

/// One message body for one publish call.
pub fn format_movers(job: JobKind, events: &[MoverEvent]) -> String {
    let mut out = title(job, events);
    out.push('\n');
    for event in events {
        let pct = event.change.percent_change;
        let star = if job.is_report() && pct.abs() >= STAR_PERCENT {
            "⭐ "
        } else {
            ""
        };
        out.push_str(&format!(
            "\n{star}{} {}  {}  {}",
            arrow(pct),
            event.symbol,
            money(event.change.current),
            signed_percent(pct)
        ));
    }
    out
}

/// Split on line boundaries so every chunk fits in one Telegram message.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if !current.is_empty() && current.chars().count() + line.chars().count() + 1 > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

pub fn format_quote(symbol: &Symbol, price: f64) -> String {
    format!("{symbol}: {}", money(price))
}

pub fn format_watchlist(symbols: &[Symbol]) -> String {
    if symbols.is_empty() {
        return "Watchlist is empty. Add symbols with /add SYM".to_string();
    }
    let list = symbols
        .iter()
        .map(Symbol::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("Watchlist ({}): {list}", symbols.len())
}

pub fn format_status(paused: bool, statuses: &[JobStatus]) -> String {
    let mut out = format!(
        "Alerts: {}\n",
        if paused { "PAUSED" } else { "active" }
    );
    for status in statuses {
        let last = status
            .last_run
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        out.push_str(&format!(
            "\n{}: {} (last run {last}, {} events)",
            status.kind, status.state, status.last_event_count
        ));
    }
    out
}

pub fn format_portfolios(portfolios: &[PortfolioInfo]) -> String {
    if portfolios.is_empty() {
        return "No portfolios yet. Create one with /create NAME BALANCE".to_string();
    }
    let mut out = String::from("Portfolios:");
    for p in portfolios {
        out.push_str(&format!(
            "\n{}: {} (started with {})",
            p.name,
            money(p.balance),
            money(p.initial_balance)
        ));
    }
    out
}

pub fn format_receipt(receipt: &TradeReceipt) -> String {
    format!(
        "{} {} {} x {} @ {} = {}\nNew balance: {}",
        receipt.portfolio,
        receipt.side,
        receipt.shares,
        receipt.symbol,
        money(receipt.price_per_share),
        money(receipt.total_price),
        money(receipt.new_balance)
    )
}

pub fn format_summary(summary: &PortfolioSummary) -> String {
    let mut out = format!(
        "Portfolio {}\nCash: {}\nHoldings: {}\nTotal: {}\nReturn: {} ({})",
        summary.name,
        money(summary.balance),
        money(summary.holdings_value),
        money(summary.total_value),
        money(summary.total_return),
        signed_percent(summary.total_return_percent)
    );
    if summary.holdings.is_empty() {
        out.push_str("\n\nNo holdings.");
        return out;
    }
    out.push('\n');
    for h in &summary.holdings {
        match (h.price, h.value, h.gain, h.gain_percent) {
            (Some(price), Some(value), Some(gain), pct) => out.push_str(&format!(
                "\n{} x{}  {}  value {}  {} ({})",
                h.symbol,
                h.shares,
                money(price),
                money(value),
                money(gain),
                pct.map(signed_percent).unwrap_or_else(|| "n/a".into())
            )),
            _ => out.push_str(&format!(
                "\n{} x{}  cost {}  (no quote)",
                h.symbol,
                h.shares,
                money(h.cost_basis)
            )),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::ChangeRecord;

    fn event(symbol: &str, current: f64, pct: f64) -> MoverEvent {
        MoverEvent::new(
            ChangeRecord {
                symbol: Symbol::new(symbol),
                current,
                reference: current / (1.0 + pct / 100.0),
                absolute_change: 0.0,
                percent_change: pct,
            },
            Utc::now(),
        )
    }

    #[test]
    fn money_groups_thousands() {
        assert_eq!(money(0.5), "$0.50");
        assert_eq!(money(1234.5), "$1,234.50");
        assert_eq!(money(1_000_000.0), "$1,000,000.00");
        assert_eq!(money(-950.0), "-$950.00");
    }

    #[test]
    fn watchlist_alert_lists_all_symbols() {
        let text = format_movers(
            JobKind::WatchlistChanges,
            &[event("AAPL", 101.5, 1.5), event("TSLA", 180.0, -2.25)],
        );
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("ALERT: Big Price Movement for AAPL, TSLA"));
        assert!(text.contains("🟢 AAPL  $101.50  +1.50%"));
        assert!(text.contains("🔴 TSLA  $180.00  -2.25%"));
        assert!(!text.contains('⭐'));
    }

    #[test]
    fn universe_title_truncates_after_five() {
        let events: Vec<MoverEvent> = ["A", "B", "C", "D", "E", "F"]
            .iter()
            .map(|s| event(s, 10.0, 4.0))
            .collect();
        let text = format_movers(JobKind::UniverseMovers, &events);
        assert!(text.starts_with("S&P 500 ALERT: Big Price Movement for A, B, C, D, E...\n"));
        assert!(text.contains("🟢 F"));

        let short = format_movers(JobKind::UniverseMovers, &events[..2]);
        assert!(short.starts_with("S&P 500 ALERT: Big Price Movement for A, B\n"));
    }

    #[test]
    fn report_stars_big_moves() {
        let text = format_movers(
            JobKind::OpenReport,
            &[event("AAPL", 100.0, 0.4), event("NVDA", 120.0, -2.0)],
        );
        assert!(text.contains("\n🟢 AAPL"));
        assert!(text.contains("\n⭐ 🔴 NVDA"));
    }

    #[test]
    fn split_respects_limit_and_lines() {
        let text = (0..50).map(|i| format!("line {i:02}")).collect::<Vec<_>>().join("\n");
        let chunks = split_message(&text, 40);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 40));
        assert_eq!(chunks.join("\n"), text);
    }
}
