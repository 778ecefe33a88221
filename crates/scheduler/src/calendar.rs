use chrono::{DateTime, Datelike, NaiveTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;

use common::{AssetClass, Result};

use crate::config::MarketSection;

const MINUTES_PER_DAY: u32 = 24 * 60;
const EXTENDED_OPEN: u32 = 4 * 60;
const EXTENDED_CLOSE: u32 = 20 * 60;

/// Trading session as local minutes of day, `[open, close)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketHours {
    open: u32,
    close: u32,
}

impl MarketHours {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            open: minute_of_day(&open),
            close: minute_of_day(&close),
        }
    }

    pub fn regular() -> Self {
        Self {
            open: 9 * 60 + 30,
            close: 16 * 60,
        }
    }

    pub fn extended() -> Self {
        Self {
            open: EXTENDED_OPEN,
            close: EXTENDED_CLOSE,
        }
    }

    fn contains(&self, minute: u32) -> bool {
        minute < MINUTES_PER_DAY && self.open <= minute && minute < self.close
    }
}

fn minute_of_day(t: &impl Timelike) -> u32 {
    t.hour() * 60 + t.minute()
}

/// Single source of truth for "is this market trading now".
#[derive(Debug, Clone)]
pub struct MarketCalendar {
    tz: Tz,
    hours: MarketHours,
}

impl Default for MarketCalendar {
    fn default() -> Self {
        Self::new(chrono_tz::America::New_York, MarketHours::regular())
    }
}

impl MarketCalendar {
    pub fn new(tz: Tz, hours: MarketHours) -> Self {
        Self { tz, hours }
    }

    pub fn from_config(market: &MarketSection) -> Result<Self> {
        let hours = if market.include_extended_hours {
            MarketHours::extended()
        } else {
            MarketHours::new(market.open_time()?, market.close_time()?)
        };
        Ok(Self::new(market.tz()?, hours))
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn weekday(&self, at: DateTime<Utc>) -> Weekday {
        at.with_timezone(&self.tz).weekday()
    }

    pub fn is_weekday(&self, at: DateTime<Utc>) -> bool {
        !matches!(self.weekday(at), Weekday::Sat | Weekday::Sun)
    }

    /// Whether instruments of `class` trade at `at`.
    ///
    /// Crypto never closes. Forex and futures follow weekdays only. Exchange
    /// listed classes also need the local time inside the session.
    pub fn is_open(&self, class: AssetClass, at: DateTime<Utc>) -> bool {
        match class {
            AssetClass::Crypto => true,
            AssetClass::Forex | AssetClass::Futures => self.is_weekday(at),
            AssetClass::Stock | AssetClass::Index | AssetClass::Commodity => {
                let local = at.with_timezone(&self.tz);
                self.is_weekday(at) && self.hours.contains(minute_of_day(&local))
            }
        }
    }
}
