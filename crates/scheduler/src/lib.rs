pub mod calendar;
pub mod config;
pub mod jobs;
pub mod scheduler;
pub mod sink;

pub use calendar::{MarketCalendar, MarketHours};
pub use config::AlertFileConfig;
pub use jobs::{Gate, Job, ReportJob, Trigger, UniverseJob, WatchlistJob};
pub use scheduler::{next_daily, AlertScheduler, JobStatus, SchedulerCommand, SchedulerHandle};
pub use sink::{FanoutSink, LoggedMover, MoverLog};
