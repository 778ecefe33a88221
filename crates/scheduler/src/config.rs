use std::path::Path;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::info;

use common::{Error, Result};

/// Alert tuning file (TOML). Every field has a default.
///
/// Example `config/alerts.toml`:
/// ```toml
/// [watchlist]
/// threshold_percent = 1.0
/// poll_interval_minutes = 5
///
/// [universe]
/// threshold_percent = 3.0
/// batch_size = 50
/// poll_interval_minutes = 15
/// concurrency = 8
///
/// [report]
/// hour = 9
/// minute = 30
///
/// [market]
/// timezone = "America/New_York"
/// open = "09:30"
/// close = "16:00"
/// include_extended_hours = false
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AlertFileConfig {
    pub watchlist: WatchlistSection,
    pub universe: UniverseSection,
    pub report: ReportSection,
    pub market: MarketSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchlistSection {
    pub threshold_percent: f64,
    pub poll_interval_minutes: u64,
}

/// Longest accepted poll interval: one week.
pub const MAX_POLL_INTERVAL_MINUTES: u64 = 7 * 24 * 60;

impl WatchlistSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_minutes * 60)
    }
}

impl Default for WatchlistSection {
    fn default() -> Self {
        Self {
            threshold_percent: 1.0,
            poll_interval_minutes: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UniverseSection {
    pub threshold_percent: f64,
    /// Symbols checked per scan.
    pub batch_size: usize,
    pub poll_interval_minutes: u64,
    /// Provider calls in flight at once during a scan.
    pub concurrency: usize,
}

impl UniverseSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_minutes * 60)
    }
}

impl Default for UniverseSection {
    fn default() -> Self {
        Self {
            threshold_percent: 3.0,
            batch_size: 50,
            poll_interval_minutes: 15,
            concurrency: 8,
        }
    }
}

/// Local time (market timezone) of the daily report jobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportSection {
    pub hour: u32,
    pub minute: u32,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self { hour: 9, minute: 30 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MarketSection {
    pub timezone: String,
    /// Regular session open, `HH:MM` local.
    pub open: String,
    /// Regular session close, `HH:MM` local, exclusive.
    pub close: String,
    /// Widen the session to 04:00-20:00 local.
    pub include_extended_hours: bool,
}

impl Default for MarketSection {
    fn default() -> Self {
        Self {
            timezone: "America/New_York".into(),
            open: "09:30".into(),
            close: "16:00".into(),
            include_extended_hours: false,
        }
    }
}

impl MarketSection {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| Error::Config(format!("unknown market timezone '{}': {e}", self.timezone)))
    }

    pub fn open_time(&self) -> Result<NaiveTime> {
        parse_hh_mm("market.open", &self.open)
    }

    pub fn close_time(&self) -> Result<NaiveTime> {
        parse_hh_mm("market.close", &self.close)
    }
}

impl ReportSection {
    pub fn time(&self) -> Result<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).ok_or_else(|| {
            Error::Config(format!(
                "report time {:02}:{:02} is out of range",
                self.hour, self.minute
            ))
        })
    }
}

fn parse_hh_mm(field: &str, value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|e| Error::Config(format!("{field} '{value}' is not HH:MM: {e}")))
}

impl AlertFileConfig {
    /// Load and validate. A missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "No alert config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), "Loaded alert config");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("malformed alert config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        check_threshold("watchlist.threshold_percent", self.watchlist.threshold_percent)?;
        check_threshold("universe.threshold_percent", self.universe.threshold_percent)?;
        check_interval("watchlist.poll_interval_minutes", self.watchlist.poll_interval_minutes)?;
        check_interval("universe.poll_interval_minutes", self.universe.poll_interval_minutes)?;
        check_nonzero("universe.batch_size", self.universe.batch_size)?;
        check_nonzero("universe.concurrency", self.universe.concurrency)?;

        self.report.time()?;
        self.market.tz()?;
        let (open, close) = (self.market.open_time()?, self.market.close_time()?);
        if open >= close {
            return Err(Error::Config(format!(
                "market.open {open} must be before market.close {close}"
            )));
        }
        Ok(())
    }
}

fn check_threshold(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::Config(format!("{field} must be a positive number, got {value}")));
    }
    Ok(())
}

fn check_nonzero(field: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(Error::Config(format!("{field} must be at least 1")));
    }
    Ok(())
}

fn check_interval(field: &str, minutes: u64) -> Result<()> {
    if !(1..=MAX_POLL_INTERVAL_MINUTES).contains(&minutes) {
        return Err(Error::Config(format!(
            "{field} must be between 1 and {MAX_POLL_INTERVAL_MINUTES}, got {minutes}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = AlertFileConfig::parse("").unwrap();
        assert_eq!(config.watchlist.threshold_percent, 1.0);
        assert_eq!(config.watchlist.poll_interval_minutes, 5);
        assert_eq!(config.universe.threshold_percent, 3.0);
        assert_eq!(config.universe.batch_size, 50);
        assert_eq!(config.universe.poll_interval_minutes, 15);
        assert_eq!(config.report.time().unwrap(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(config.market.tz().unwrap(), chrono_tz::America::New_York);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = AlertFileConfig::parse(
            r#"
            [universe]
            batch_size = 25

            [market]
            include_extended_hours = true
            "#,
        )
        .unwrap();
        assert_eq!(config.universe.batch_size, 25);
        assert_eq!(config.universe.threshold_percent, 3.0);
        assert!(config.market.include_extended_hours);
        assert_eq!(config.market.open, "09:30");
    }

    #[test]
    fn poll_intervals_convert_to_durations() {
        let config = AlertFileConfig::parse(
            "[universe]\npoll_interval_minutes = 10080",
        )
        .unwrap();
        assert_eq!(config.watchlist.poll_interval(), Duration::from_secs(300));
        assert_eq!(config.universe.poll_interval(), Duration::from_secs(7 * 24 * 3600));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let config = AlertFileConfig::load("/nonexistent/alerts.toml").unwrap();
        assert_eq!(config.universe.batch_size, 50);
    }

    #[test]
    fn rejects_bad_values() {
        let cases = [
            "[watchlist]\nthreshold_percent = 0.0",
            "[watchlist]\nthreshold_percent = -1.0",
            "[universe]\nthreshold_percent = nan",
            "[universe]\nbatch_size = 0",
            "[universe]\nconcurrency = 0",
            "[watchlist]\npoll_interval_minutes = 0",
            "[universe]\npoll_interval_minutes = 10081",
            "[watchlist]\npoll_interval_minutes = 9223372036854775807",
            "[report]\nhour = 24",
            "[report]\nminute = 60",
            "[market]\ntimezone = \"Mars/Olympus\"",
            "[market]\nopen = \"16:00\"\nclose = \"09:30\"",
            "[market]\nopen = \"9h30\"",
            "[watchlist\nthreshold_percent = 1.0",
        ];
        for case in cases {
            assert!(
                matches!(AlertFileConfig::parse(case), Err(Error::Config(_))),
                "expected config error for {case:?}"
            );
        }
    }
}
