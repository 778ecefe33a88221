use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use common::{AlertSink, JobKind, JobState};

use crate::calendar::MarketCalendar;
use crate::jobs::{Job, Trigger};

/// Operator commands accepted by a running scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerCommand {
    Pause,
    Resume,
    /// Fire a job immediately. Gating still applies.
    RunNow(JobKind),
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub kind: JobKind,
    pub state: JobState,
    pub last_run: Option<DateTime<Utc>>,
    pub last_event_count: usize,
}

impl JobStatus {
    fn idle(kind: JobKind) -> Self {
        Self {
            kind,
            state: JobState::Idle,
            last_run: None,
            last_event_count: 0,
        }
    }
}

type Statuses = Arc<RwLock<HashMap<JobKind, JobStatus>>>;

/// Cloneable handle passed to the chat and API front-ends.
#[derive(Clone)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    statuses: Statuses,
    paused: Arc<RwLock<bool>>,
}

impl SchedulerHandle {
    pub async fn send(&self, cmd: SchedulerCommand) {
        if self.command_tx.send(cmd).await.is_err() {
            warn!(command = ?cmd, "Scheduler is not running, command dropped");
        }
    }

    pub async fn is_paused(&self) -> bool {
        *self.paused.read().await
    }

    /// Status of every registered job, in `JobKind::ALL` order.
    pub async fn statuses(&self) -> Vec<JobStatus> {
        let statuses = self.statuses.read().await;
        JobKind::ALL
            .iter()
            .filter_map(|kind| statuses.get(kind).cloned())
            .collect()
    }
}

/// Fires one job against the calendar and routes its events to the sink.
#[derive(Clone)]
struct Dispatcher {
    calendar: Arc<MarketCalendar>,
    sink: Arc<dyn AlertSink>,
    statuses: Statuses,
    paused: Arc<RwLock<bool>>,
}

impl Dispatcher {
    async fn set_state(&self, kind: JobKind, state: JobState) {
        self.statuses
            .write()
            .await
            .entry(kind)
            .or_insert_with(|| JobStatus::idle(kind))
            .state = state;
    }

    async fn fire(&self, job: &dyn Job, now: DateTime<Utc>) -> JobState {
        let kind = job.kind();

        if *self.paused.read().await {
            debug!(job = %kind, "Scheduler paused, firing suppressed");
            self.set_state(kind, JobState::Suppressed).await;
            return JobState::Suppressed;
        }
        if !job.gate().is_open(&self.calendar, now) {
            debug!(job = %kind, gate = ?job.gate(), "Gate closed, firing suppressed");
            self.set_state(kind, JobState::Suppressed).await;
            return JobState::Suppressed;
        }

        self.set_state(kind, JobState::Running).await;
        let count = match job.run().await {
            Ok(events) => {
                if !events.is_empty() {
                    info!(job = %kind, events = events.len(), "Publishing movers");
                    self.sink.on_mover_events(kind, &events).await;
                }
                events.len()
            }
            Err(e) => {
                warn!(job = %kind, error = %e, "Job failed, will retry at next trigger");
                0
            }
        };

        let mut statuses = self.statuses.write().await;
        let status = statuses.entry(kind).or_insert_with(|| JobStatus::idle(kind));
        status.state = JobState::Idle;
        status.last_run = Some(now);
        status.last_event_count = count;
        JobState::Idle
    }
}

/// Next instant at local time `at` in `tz` strictly after `now`.
///
/// Local times skipped by a DST jump move to the following day.
pub fn next_daily(now: DateTime<Utc>, at: NaiveTime, tz: Tz) -> DateTime<Utc> {
    now.with_timezone(&tz)
        .date_naive()
        .iter_days()
        .take(3)
        .filter_map(|day| day.and_time(at).and_local_timezone(tz).earliest())
        .map(|t| t.with_timezone(&Utc))
        .find(|t| *t > now)
        .unwrap_or(now + ChronoDuration::days(1))
}

/// Runs registered jobs on their triggers and executes operator commands.
pub struct AlertScheduler {
    jobs: HashMap<JobKind, Arc<dyn Job>>,
    dispatcher: Dispatcher,
    command_rx: mpsc::Receiver<SchedulerCommand>,
}

impl AlertScheduler {
    pub fn new(calendar: MarketCalendar, sink: Arc<dyn AlertSink>) -> (Self, SchedulerHandle) {
        let (command_tx, command_rx) = mpsc::channel(16);
        let statuses: Statuses = Arc::new(RwLock::new(HashMap::new()));
        let paused = Arc::new(RwLock::new(false));

        let handle = SchedulerHandle {
            command_tx,
            statuses: statuses.clone(),
            paused: paused.clone(),
        };
        let scheduler = Self {
            jobs: HashMap::new(),
            dispatcher: Dispatcher {
                calendar: Arc::new(calendar),
                sink,
                statuses,
                paused,
            },
            command_rx,
        };
        (scheduler, handle)
    }

    /// Register a job. A second job of the same kind replaces the first.
    pub async fn register(&mut self, job: Arc<dyn Job>) {
        let kind = job.kind();
        info!(job = %kind, trigger = ?job.trigger(), gate = ?job.gate(), "Registered job");
        self.dispatcher
            .statuses
            .write()
            .await
            .insert(kind, JobStatus::idle(kind));
        self.jobs.insert(kind, job);
    }

    /// Fire the job of `kind` once as if its trigger elapsed at `now`.
    ///
    /// Returns the state the firing ended in, or `None` for an unknown job.
    pub async fn fire(&self, kind: JobKind, now: DateTime<Utc>) -> Option<JobState> {
        let job = self.jobs.get(&kind)?;
        Some(self.dispatcher.fire(job.as_ref(), now).await)
    }

    /// Spawn one trigger loop per job, then process commands until every
    /// handle is dropped. Call from `tokio::spawn`.
    pub async fn run(mut self) {
        let tz = self.dispatcher.calendar.tz();
        let loops: Vec<_> = self
            .jobs
            .values()
            .map(|job| tokio::spawn(trigger_loop(self.dispatcher.clone(), job.clone(), tz)))
            .collect();
        info!(jobs = loops.len(), "Alert scheduler running");

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                SchedulerCommand::Pause => {
                    *self.dispatcher.paused.write().await = true;
                    info!("Scheduler paused, all jobs suppressed");
                }
                SchedulerCommand::Resume => {
                    *self.dispatcher.paused.write().await = false;
                    info!("Scheduler resumed");
                }
                SchedulerCommand::RunNow(kind) => match self.jobs.get(&kind) {
                    Some(job) => {
                        info!(job = %kind, "Manual run requested");
                        let dispatcher = self.dispatcher.clone();
                        let job = job.clone();
                        tokio::spawn(async move {
                            dispatcher.fire(job.as_ref(), Utc::now()).await;
                        });
                    }
                    None => warn!(job = %kind, "Manual run for unregistered job ignored"),
                },
            }
        }

        warn!("Scheduler command channel closed, stopping jobs");
        for handle in loops {
            handle.abort();
        }
    }
}

async fn trigger_loop(dispatcher: Dispatcher, job: Arc<dyn Job>, tz: Tz) {
    match job.trigger() {
        Trigger::Every(period) => {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                dispatcher.fire(job.as_ref(), Utc::now()).await;
            }
        }
        Trigger::DailyAt(at) => loop {
            let now = Utc::now();
            let next = next_daily(now, at, tz);
            debug!(job = %job.kind(), next = %next, "Waiting for daily trigger");
            tokio::time::sleep((next - now).to_std().unwrap_or_default()).await;
            dispatcher.fire(job.as_ref(), Utc::now()).await;
        },
    }
}
