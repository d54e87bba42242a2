use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};

/// Source of "now" for everything that depends on the current date: the live
/// tail point, the 1D interpolation window and the cache completeness gate.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    fn yesterday(&self) -> NaiveDate {
        self.today() - Duration::days(1)
    }

    /// Midnight UTC of the current day.
    fn start_of_today(&self) -> DateTime<Utc> {
        start_of_day(self.today())
    }
}

/// Midnight UTC of `date`, used as the timestamp of daily points.
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    /// A clock pinned to `hour`:00 UTC on `date`.
    pub fn at(date: NaiveDate, hour: u32) -> Self {
        Self::new(start_of_day(date) + Duration::hours(i64::from(hour)))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }
}
