use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use std::fmt;
use std::sync::Arc;

type NowFn = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Trading sessions, inclusive on both ends (exchange-local time)
const SESSIONS: [((u32, u32), (u32, u32)); 2] = [((9, 30), (11, 30)), ((13, 0), (15, 0))];

/// Exchange calendar: weekdays with a morning and an afternoon session.
#[derive(Clone)]
pub struct MarketClock {
    tz: Tz,
    now: NowFn,
}

impl MarketClock {
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            now: Arc::new(Utc::now),
        }
    }

    /// Replace the wall clock, mainly for tests
    pub fn with_now<F>(mut self, now: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.now = Arc::new(now);
        self
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now)()
    }

    /// Current exchange-local wall time
    pub fn local_now(&self) -> NaiveDateTime {
        self.now().with_timezone(&self.tz).naive_local()
    }

    pub fn today(&self) -> NaiveDate {
        self.local_now().date()
    }

    pub fn is_open(&self, at: DateTime<Utc>) -> bool {
        is_session_time(at.with_timezone(&self.tz).naive_local())
    }

    pub fn is_open_now(&self) -> bool {
        self.is_open(self.now())
    }
}

impl fmt::Debug for MarketClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketClock").field("tz", &self.tz).finish()
    }
}

/// True when an exchange-local timestamp falls inside a trading session.
/// Compared at whole-second precision, so 11:30:00.005 still counts as 11:30:00.
pub fn is_session_time(local: NaiveDateTime) -> bool {
    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }

    let secs = local.num_seconds_from_midnight();
    SESSIONS.iter().any(|&((oh, om), (ch, cm))| {
        let open = (oh * 60 + om) * 60;
        let close = (ch * 60 + cm) * 60;
        secs >= open && secs <= close
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_weekend_closed() {
        // 2024-06-15 is a Saturday
        assert!(!is_session_time(local(2024, 6, 15, 10, 0)));
        assert!(!is_session_time(local(2024, 6, 16, 14, 0)));
    }

    #[test]
    fn test_weekday_sessions() {
        // 2024-06-17 is a Monday
        assert!(is_session_time(local(2024, 6, 17, 10, 0)));
        assert!(is_session_time(local(2024, 6, 17, 14, 0)));
        assert!(!is_session_time(local(2024, 6, 17, 12, 0)));
        assert!(!is_session_time(local(2024, 6, 17, 9, 0)));
        assert!(!is_session_time(local(2024, 6, 17, 15, 1)));
    }

    #[test]
    fn test_session_bounds_inclusive() {
        assert!(is_session_time(local(2024, 6, 17, 9, 30)));
        assert!(is_session_time(local(2024, 6, 17, 11, 30)));
        assert!(is_session_time(local(2024, 6, 17, 13, 0)));
        assert!(is_session_time(local(2024, 6, 17, 15, 0)));
        assert!(!is_session_time(local(2024, 6, 17, 9, 29)));
        assert!(!is_session_time(local(2024, 6, 17, 12, 59)));
    }

    #[test]
    fn test_closing_bounds_ignore_subseconds() {
        let at = |h, m, s, ms| {
            NaiveDate::from_ymd_opt(2024, 6, 17)
                .unwrap()
                .and_hms_milli_opt(h, m, s, ms)
                .unwrap()
        };
        assert!(is_session_time(at(11, 30, 0, 5)));
        assert!(is_session_time(at(15, 0, 0, 5)));
        assert!(is_session_time(at(11, 30, 0, 999)));
        assert!(!is_session_time(at(11, 30, 1, 0)));
        assert!(!is_session_time(at(15, 0, 1, 0)));
        assert!(!is_session_time(at(9, 29, 59, 999)));
    }

    #[test]
    fn test_clock_converts_to_exchange_time() {
        // 02:00 UTC is 10:00 in Shanghai
        let at = Utc.with_ymd_and_hms(2024, 6, 17, 2, 0, 0).unwrap();
        let clock = MarketClock::new(chrono_tz::Asia::Shanghai).with_now(move || at);
        assert!(clock.is_open_now());
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 6, 17).unwrap());

        // 04:00 UTC is the lunch break
        let lunch = Utc.with_ymd_and_hms(2024, 6, 17, 4, 0, 0).unwrap();
        assert!(!clock.is_open(lunch));
    }
}
