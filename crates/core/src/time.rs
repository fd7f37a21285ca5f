use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDateTime, Offset, TimeZone, Utc};

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// Time zone used to interpret offset-less attempt dates and to render them.
///
/// `Local` follows the viewer's system zone. `Fixed` pins an offset, which keeps
/// normalization deterministic in tests and headless tooling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayZone {
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl DisplayZone {
    /// UTC as a fixed display zone.
    #[must_use]
    pub fn utc() -> Self {
        Self::Fixed(Utc.fix())
    }

    /// Resolve wall-clock components in this zone to an instant.
    ///
    /// Ambiguous times (DST fold) resolve to the earlier instant. Times that fall in
    /// a DST gap are shifted forward by one hour.
    #[must_use]
    pub fn resolve_local(&self, naive: NaiveDateTime) -> Option<DateTime<FixedOffset>> {
        match self {
            DisplayZone::Local => Local
                .from_local_datetime(&naive)
                .earliest()
                .or_else(|| {
                    Local
                        .from_local_datetime(&(naive + Duration::hours(1)))
                        .earliest()
                })
                .map(|dt| dt.fixed_offset()),
            DisplayZone::Fixed(offset) => offset.from_local_datetime(&naive).single(),
        }
    }

    /// Wall-clock components of an instant as seen in this zone.
    #[must_use]
    pub fn wall_clock<Tz: TimeZone>(&self, instant: &DateTime<Tz>) -> NaiveDateTime {
        match self {
            DisplayZone::Local => instant.with_timezone(&Local).naive_local(),
            DisplayZone::Fixed(offset) => instant.with_timezone(offset).naive_local(),
        }
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn fixed_clock_advances() {
        let mut clock = fixed_clock();
        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now(), fixed_now() + Duration::seconds(90));
    }

    #[test]
    fn fixed_zone_round_trips_wall_clock() {
        let zone = DisplayZone::Fixed(FixedOffset::east_opt(5 * 3600).unwrap());
        let naive = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(14, 30, 0)
            .unwrap();
        let instant = zone.resolve_local(naive).unwrap();
        assert_eq!(instant.timestamp(), naive.and_utc().timestamp() - 5 * 3600);
        assert_eq!(zone.wall_clock(&instant), naive);
    }
}
