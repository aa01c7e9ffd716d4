use chrono::{DateTime, Duration, Utc};

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

    /// Returns a copy of this clock moved forward by `delta`.
    #[must_use]
    pub fn advanced(mut self, delta: Duration) -> Self {
        self.advance(delta);
        self
    }
}

/// Whole seconds in `delta`, rounded up. Negative spans clamp to zero.
#[must_use]
pub fn ceil_seconds(delta: Duration) -> u32 {
    ceil_div_millis(delta, 1_000)
}

/// Whole minutes in `delta`, rounded up. Negative spans clamp to zero.
#[must_use]
pub fn ceil_minutes(delta: Duration) -> u32 {
    ceil_div_millis(delta, 60_000)
}

fn ceil_div_millis(delta: Duration, unit_ms: i64) -> u32 {
    let ms = delta.num_milliseconds();
    if ms <= 0 {
        return 0;
    }
    let units = (ms + unit_ms - 1) / unit_ms;
    u32::try_from(units).unwrap_or(u32::MAX)
}

/// Serde adapter for backend timestamps.
///
/// Reads RFC 3339 and the zoneless `YYYY-MM-DDTHH:MM[:SS]` form that admin
/// forms submit, taking the latter as UTC. Writes RFC 3339.
pub mod wire_date {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    const ZONELESS_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid date `{raw}`")))
    }

    /// Parse any accepted timestamp form. A bare `YYYY-MM-DD` means midnight UTC.
    #[must_use]
    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
            return Some(at.with_timezone(&Utc));
        }
        ZONELESS_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|date| date.and_hms_opt(0, 0, 0))
            })
            .map(|naive| naive.and_utc())
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

    #[test]
    fn ceil_seconds_rounds_partial_seconds_up() {
        assert_eq!(ceil_seconds(Duration::milliseconds(1)), 1);
        assert_eq!(ceil_seconds(Duration::milliseconds(1_000)), 1);
        assert_eq!(ceil_seconds(Duration::milliseconds(1_001)), 2);
        assert_eq!(ceil_seconds(Duration::zero()), 0);
        assert_eq!(ceil_seconds(Duration::seconds(-5)), 0);
    }

    #[test]
    fn ceil_minutes_rounds_partial_minutes_up() {
        assert_eq!(ceil_minutes(Duration::seconds(1)), 1);
        assert_eq!(ceil_minutes(Duration::seconds(60)), 1);
        assert_eq!(ceil_minutes(Duration::seconds(61)), 2);
        assert_eq!(ceil_minutes(Duration::zero()), 0);
    }

    #[test]
    fn wire_date_accepts_zoneless_form_input() {
        let expected = DateTime::parse_from_rfc3339("2024-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(wire_date::parse("2024-01-01T10:00"), Some(expected));
        assert_eq!(wire_date::parse("2024-01-01T10:00:00"), Some(expected));
        assert_eq!(wire_date::parse("2024-01-01T10:00:00.000Z"), Some(expected));
        assert_eq!(wire_date::parse("2024-01-01T12:00:00+02:00"), Some(expected));
        assert_eq!(
            wire_date::parse("2024-01-01"),
            Some(expected - Duration::hours(10))
        );
        assert_eq!(wire_date::parse("next tuesday"), None);
    }

    #[test]
    fn advanced_moves_fixed_clock_only() {
        let clock = fixed_clock().advanced(Duration::seconds(30));
        assert_eq!(clock.now(), fixed_now() + Duration::seconds(30));

        let mut real = Clock::default_clock();
        real.advance(Duration::days(1));
        assert!(matches!(real, Clock::Default));
    }
}
