use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use common::AssetClass;
use proptest::prelude::*;
use scheduler::{next_daily, MarketCalendar};

const NY: chrono_tz::Tz = chrono_tz::America::New_York;

fn instant(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

proptest! {
    /// Exchange-listed classes are closed whenever the local clock is outside
    /// 09:30-16:00 or it is a weekend.
    #[test]
    fn stock_open_only_in_session(secs in 946_684_800i64..4_102_444_800i64) {
        let at = instant(secs);
        let local = at.with_timezone(&NY);
        let minute = local.hour() * 60 + local.minute();
        let weekend = matches!(local.weekday(), Weekday::Sat | Weekday::Sun);
        let expected = !weekend && (570..960).contains(&minute);

        let cal = MarketCalendar::default();
        prop_assert_eq!(cal.is_open(AssetClass::Stock, at), expected);
        prop_assert!(cal.is_open(AssetClass::Crypto, at));
    }

    #[test]
    fn next_daily_is_within_a_day_and_on_time(
        secs in 946_684_800i64..4_102_444_800i64,
        hour in 0u32..24,
        minute in 0u32..60,
    ) {
        let now = instant(secs);
        let at = NaiveTime::from_hms_opt(hour, minute, 0).unwrap();
        let next = next_daily(now, at, NY);

        prop_assert!(next > now);
        prop_assert!(next - now <= chrono::Duration::hours(49));
        let local = next.with_timezone(&NY);
        // Only a DST gap may shift the wall-clock time.
        if local.date_naive() == now.with_timezone(&NY).date_naive() {
            prop_assert_eq!((local.hour(), local.minute()), (hour, minute));
        }
    }
}
