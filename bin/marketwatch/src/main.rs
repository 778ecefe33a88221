use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use common::{Config, JsonWatchlistStore, MarketDataGateway, Watchlist};
use detector::{
    Baselines, ChangeReporter, ReferencePriceResolver, UniverseRotationScanner,
    WatchlistChangeDetector,
};
use paper::{Ledger, PaperTrader};
use provider::{CsvUniverse, YahooClient};
use scheduler::{
    AlertFileConfig, AlertScheduler, FanoutSink, MarketCalendar, MoverLog, ReportJob,
    UniverseJob, WatchlistJob,
};
use telegram_ctrl::{start_bot, BotDeps, TelegramSink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    let alerts = AlertFileConfig::load(&cfg.alerts_config_path)
        .with_context(|| format!("loading {}", cfg.alerts_config_path))?;
    let calendar = MarketCalendar::from_config(&alerts.market)?;
    let report_at = alerts.report.time()?;
    let timeout = Duration::from_secs(cfg.provider_timeout_secs);
    info!(
        watchlist_threshold = alerts.watchlist.threshold_percent,
        universe_threshold = alerts.universe.threshold_percent,
        tz = %calendar.tz(),
        "Market watch starting"
    );

    // ── Database ──────────────────────────────────────────────────────────────
    let ledger = Ledger::connect(&cfg.database_url)
        .await
        .context("opening paper ledger")?;
    info!("Database ready");

    // ── Market data ───────────────────────────────────────────────────────────
    let gateway: Arc<dyn MarketDataGateway> = Arc::new(YahooClient::new(timeout)?);
    let universe = Arc::new(CsvUniverse::new(cfg.universe_url.clone(), timeout)?);
    let watchlist = Watchlist::load(Arc::new(JsonWatchlistStore::new(&cfg.watchlist_path))).await;

    // The watchlist detector and the universe scanner keep separate baselines.
    let watch_baselines = Baselines::new();
    let detector = WatchlistChangeDetector::new(
        gateway.clone(),
        watch_baselines.clone(),
        alerts.watchlist.threshold_percent,
        timeout,
    );
    let scanner = UniverseRotationScanner::new(
        universe,
        gateway.clone(),
        watchlist.clone(),
        Baselines::new(),
        timeout,
        alerts.universe.concurrency,
    );
    let resolver = Arc::new(
        ReferencePriceResolver::new(gateway.clone(), calendar.tz()).with_baselines(watch_baselines),
    );
    let reporter = Arc::new(ChangeReporter::new(gateway.clone(), resolver, timeout));

    // ── Alert sinks ───────────────────────────────────────────────────────────
    let bot = teloxide::Bot::new(cfg.telegram_token.clone());
    let movers = MoverLog::default();
    let sink = FanoutSink::new()
        .with(Arc::new(TelegramSink::new(bot.clone(), cfg.telegram_chat_id)))
        .with(Arc::new(movers.clone()));

    // ── Scheduler ─────────────────────────────────────────────────────────────
    let (mut alert_scheduler, scheduler_handle) = AlertScheduler::new(calendar, Arc::new(sink));
    alert_scheduler
        .register(Arc::new(WatchlistJob::new(
            watchlist.clone(),
            detector,
            alerts.watchlist.poll_interval(),
        )))
        .await;
    alert_scheduler
        .register(Arc::new(UniverseJob::new(
            scanner,
            alerts.universe.threshold_percent,
            alerts.universe.batch_size,
            alerts.universe.poll_interval(),
        )))
        .await;
    alert_scheduler
        .register(Arc::new(ReportJob::open(watchlist.clone(), reporter.clone(), report_at)))
        .await;
    alert_scheduler
        .register(Arc::new(ReportJob::weekend(watchlist.clone(), reporter, report_at)))
        .await;

    // ── Front-ends ────────────────────────────────────────────────────────────
    let trader = PaperTrader::new(ledger, gateway.clone(), timeout);
    let bot_deps = BotDeps {
        watchlist: watchlist.clone(),
        scheduler: scheduler_handle.clone(),
        trader: trader.clone(),
        gateway,
        quote_timeout: timeout,
    };
    let api_state = api::AppState {
        watchlist,
        scheduler: scheduler_handle,
        movers,
        trader,
        dashboard_token: cfg.dashboard_token.clone(),
    };

    // ── Spawn all tasks ───────────────────────────────────────────────────────
    let port = cfg.dashboard_port;
    tokio::spawn(alert_scheduler.run());
    tokio::spawn(start_bot(bot, bot_deps));
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_state, port).await {
            error!(error = %e, "Status API stopped");
        }
    });

    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting.");
    Ok(())
}
