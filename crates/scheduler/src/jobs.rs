use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc, Weekday};
use tokio::sync::Mutex;

use common::{AssetClass, Basis, Error, JobKind, MoverEvent, Result, Watchlist};
use detector::{ChangeReporter, UniverseRotationScanner, WatchlistChangeDetector};

use crate::calendar::MarketCalendar;

/// When a job fires.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Trigger {
    Every(Duration),
    /// Local time of day in the market timezone.
    DailyAt(NaiveTime),
}

/// What must hold at firing time for the job to do any work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gate {
    MarketHours(AssetClass),
    Weekdays,
    Saturday,
}

impl Gate {
    pub fn is_open(&self, calendar: &MarketCalendar, now: DateTime<Utc>) -> bool {
        match self {
            Gate::MarketHours(class) => calendar.is_open(*class, now),
            Gate::Weekdays => calendar.is_weekday(now),
            Gate::Saturday => calendar.weekday(now) == Weekday::Sat,
        }
    }
}

/// A scheduled unit of work producing mover events.
#[async_trait]
pub trait Job: Send + Sync {
    fn kind(&self) -> JobKind;
    fn trigger(&self) -> Trigger;
    fn gate(&self) -> Gate;
    async fn run(&self) -> Result<Vec<MoverEvent>>;
}

/// Tick-over-tick changes for the watchlist.
///
/// Ticks are serialized on the detector lock: a run-now overlapping the
/// interval trigger waits, so each baseline is read then written by one
/// tick at a time.
pub struct WatchlistJob {
    watchlist: Watchlist,
    detector: Mutex<WatchlistChangeDetector>,
    interval: Duration,
}

impl WatchlistJob {
    pub fn new(watchlist: Watchlist, detector: WatchlistChangeDetector, interval: Duration) -> Self {
        Self {
            watchlist,
            detector: Mutex::new(detector),
            interval,
        }
    }
}

#[async_trait]
impl Job for WatchlistJob {
    fn kind(&self) -> JobKind {
        JobKind::WatchlistChanges
    }

    fn trigger(&self) -> Trigger {
        Trigger::Every(self.interval)
    }

    fn gate(&self) -> Gate {
        Gate::MarketHours(AssetClass::Stock)
    }

    async fn run(&self) -> Result<Vec<MoverEvent>> {
        let detector = self.detector.lock().await;
        let symbols = self.watchlist.snapshot().await;
        Ok(detector.tick(&symbols).await.into_events())
    }
}

/// Rotating scan over the market universe.
///
/// The scan body runs on its own task; firings are serialized on the
/// scanner lock so overlapping runs never share a cursor position.
pub struct UniverseJob {
    scanner: Arc<Mutex<UniverseRotationScanner>>,
    threshold_percent: f64,
    batch_size: usize,
    interval: Duration,
}

impl UniverseJob {
    pub fn new(
        scanner: UniverseRotationScanner,
        threshold_percent: f64,
        batch_size: usize,
        interval: Duration,
    ) -> Self {
        Self {
            scanner: Arc::new(Mutex::new(scanner)),
            threshold_percent,
            batch_size,
            interval,
        }
    }
}

#[async_trait]
impl Job for UniverseJob {
    fn kind(&self) -> JobKind {
        JobKind::UniverseMovers
    }

    fn trigger(&self) -> Trigger {
        Trigger::Every(self.interval)
    }

    fn gate(&self) -> Gate {
        Gate::MarketHours(AssetClass::Stock)
    }

    async fn run(&self) -> Result<Vec<MoverEvent>> {
        let scanner = self.scanner.clone();
        let (threshold, batch_size) = (self.threshold_percent, self.batch_size);
        let result = tokio::spawn(async move {
            scanner.lock().await.scan(threshold, batch_size).await
        })
        .await
        .map_err(|e| Error::Other(format!("universe scan task failed: {e}")))??;
        Ok(result.into_events())
    }
}

/// Full watchlist report at a fixed local time.
pub struct ReportJob {
    kind: JobKind,
    basis: Basis,
    gate: Gate,
    at: NaiveTime,
    watchlist: Watchlist,
    reporter: Arc<ChangeReporter>,
}

impl ReportJob {
    /// Weekday report against the previous session's close.
    pub fn open(watchlist: Watchlist, reporter: Arc<ChangeReporter>, at: NaiveTime) -> Self {
        Self {
            kind: JobKind::OpenReport,
            basis: Basis::PreviousClose,
            gate: Gate::Weekdays,
            at,
            watchlist,
            reporter,
        }
    }

    /// Saturday summary of the week's change.
    pub fn weekend(watchlist: Watchlist, reporter: Arc<ChangeReporter>, at: NaiveTime) -> Self {
        Self {
            kind: JobKind::WeekendReport,
            basis: Basis::WeekStart,
            gate: Gate::Saturday,
            at,
            watchlist,
            reporter,
        }
    }
}

#[async_trait]
impl Job for ReportJob {
    fn kind(&self) -> JobKind {
        self.kind
    }

    fn trigger(&self) -> Trigger {
        Trigger::DailyAt(self.at)
    }

    fn gate(&self) -> Gate {
        self.gate
    }

    async fn run(&self) -> Result<Vec<MoverEvent>> {
        let symbols = self.watchlist.snapshot().await;
        Ok(self.reporter.report(&symbols, self.basis).await.into_events())
    }
}
