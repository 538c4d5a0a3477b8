use crate::error::GridError;

/// A duration expressed the way the grid's wire format does: days, hours,
/// minutes, seconds. `DD` is optional on parse (`HH:MM:SS` is accepted too)
/// but always present on format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WallTime {
    days: u32,
    hours: u32,
    minutes: u32,
    seconds: u32,
}

impl WallTime {
    pub fn from_secs(total: u64) -> Self {
        let seconds = (total % 60) as u32;
        let total = total / 60;
        let minutes = (total % 60) as u32;
        let total = total / 60;
        let hours = (total % 24) as u32;
        let days = (total / 24) as u32;
        Self {
            days,
            hours,
            minutes,
            seconds,
        }
    }

    pub fn as_secs(&self) -> u64 {
        ((self.days as u64 * 24) + self.hours as u64) * 3600
            + self.minutes as u64 * 60
            + self.seconds as u64
    }

    /// Parses `DD:HH:MM:SS` or `HH:MM:SS`. Fields must be numeric and
    /// in-range (HH 0-23, MM/SS 0-59); `DD` is unbounded.
    pub fn parse(s: &str) -> Result<Self, GridError> {
        let parts: Vec<&str> = s.split(':').collect();
        let (days, hours, minutes, seconds) = match parts.as_slice() {
            [h, m, s] => ("0", *h, *m, *s),
            [d, h, m, s] => (*d, *h, *m, *s),
            _ => {
                return Err(GridError::InvalidWallTimeFormat(format!(
                    "expected DD:HH:MM:SS or HH:MM:SS, got: {s}"
                )))
            }
        };

        let parse_field = |field: &str| -> Result<u32, GridError> {
            field
                .parse::<u32>()
                .map_err(|_| GridError::InvalidWallTimeFormat(format!("non-numeric field: {field}")))
        };

        let days: u32 = parse_field(days)?;
        let hours = parse_field(hours)?;
        let minutes = parse_field(minutes)?;
        let seconds = parse_field(seconds)?;

        if hours > 23 {
            return Err(GridError::InvalidWallTimeFormat(format!(
                "hours out of range (0-23): {hours}"
            )));
        }
        if minutes > 59 {
            return Err(GridError::InvalidWallTimeFormat(format!(
                "minutes out of range (0-59): {minutes}"
            )));
        }
        if seconds > 59 {
            return Err(GridError::InvalidWallTimeFormat(format!(
                "seconds out of range (0-59): {seconds}"
            )));
        }

        Ok(Self {
            days,
            hours,
            minutes,
            seconds,
        })
    }

    /// Canonical `DD:HH:MM:SS`, zero-padded two-digit fields (days may exceed
    /// two digits, it is not clamped).
    pub fn format(&self) -> String {
        format!(
            "{:02}:{:02}:{:02}:{:02}",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

impl std::fmt::Display for WallTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_format() {
        let wt = WallTime::parse("01:02:03:04").unwrap();
        assert_eq!(wt.as_secs(), ((1 * 24 + 2) * 3600) + 3 * 60 + 4);
    }

    #[test]
    fn parses_without_days() {
        let wt = WallTime::parse("10:00:00").unwrap();
        assert_eq!(wt.as_secs(), 10 * 3600);
    }

    #[test]
    fn rejects_out_of_range_hours() {
        assert!(WallTime::parse("24:00:00").is_err());
    }

    #[test]
    fn rejects_non_numeric() {
        assert!(WallTime::parse("aa:00:00").is_err());
    }

    #[test]
    fn format_is_canonical_and_round_trips() {
        let wt = WallTime::parse("1:2:3:4").unwrap();
        assert_eq!(wt.format(), "01:02:03:04");
        assert_eq!(WallTime::parse(&wt.format()).unwrap(), wt);
    }

    #[test]
    fn from_secs_round_trips_through_format() {
        let wt = WallTime::from_secs(90_061);
        assert_eq!(WallTime::parse(&wt.format()).unwrap(), wt);
    }
}
