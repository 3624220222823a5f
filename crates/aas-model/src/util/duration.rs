//! ISO 8601 / `xs:duration` parsing and formatting.
//!
//! Durations keep their calendar components (`P1M` and `P30D` are distinct)
//! because months and years have no fixed length.

use std::fmt;
use std::str::FromStr;

const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// Error type for duration parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationParseError {
    pub message: String,
}

impl fmt::Display for DurationParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for DurationParseError {}

fn invalid(text: &str, what: &str) -> DurationParseError {
    DurationParseError {
        message: format!("Invalid duration {:?}: {}", text, what),
    }
}

/// An `xs:duration` value such as `-P1Y2M3DT4H5M6.5S`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct XsdDuration {
    pub negative: bool,
    pub years: u32,
    pub months: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    /// Fractional seconds in nanoseconds (0 to 999,999,999).
    pub nanos: u32,
}

impl XsdDuration {
    /// Creates a positive duration of whole seconds.
    pub fn from_seconds(seconds: u32) -> Self {
        Self {
            seconds,
            ..Self::default()
        }
    }

    /// Returns true if every component is zero.
    pub fn is_zero(&self) -> bool {
        self.years == 0
            && self.months == 0
            && self.days == 0
            && self.hours == 0
            && self.minutes == 0
            && self.seconds == 0
            && self.nanos == 0
    }

    /// Converts to a `std::time::Duration` when no calendar components are present.
    ///
    /// Returns None for negative durations or durations with years/months.
    pub fn to_std(&self) -> Option<std::time::Duration> {
        if self.negative || self.years != 0 || self.months != 0 {
            return None;
        }
        let secs = self.days as u64 * 86_400
            + self.hours as u64 * 3_600
            + self.minutes as u64 * 60
            + self.seconds as u64;
        Some(std::time::Duration::new(secs, self.nanos))
    }
}

/// Parses fractional seconds digits and returns nanoseconds.
fn parse_fraction(frac: &str, text: &str) -> Result<u32, DurationParseError> {
    if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(text, "bad fractional seconds"));
    }
    // Pad or truncate to 9 digits (nanoseconds)
    let mut padded = frac.to_string();
    while padded.len() < 9 {
        padded.push('0');
    }
    padded.truncate(9);
    padded
        .parse()
        .map_err(|_| invalid(text, "bad fractional seconds"))
}

impl FromStr for XsdDuration {
    type Err = DurationParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let s = text.trim();
        let (negative, rest) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let body = rest
            .strip_prefix('P')
            .ok_or_else(|| invalid(text, "missing 'P' designator"))?;

        let (date_part, time_part) = match body.split_once('T') {
            Some((d, t)) => {
                if t.is_empty() {
                    return Err(invalid(text, "'T' without time components"));
                }
                (d, Some(t))
            }
            None => (body, None),
        };

        let mut out = XsdDuration {
            negative,
            ..XsdDuration::default()
        };
        let mut seen_any = false;

        // Date components in fixed order Y, M, D
        let mut order = 0;
        let mut digits = String::new();
        for c in date_part.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            let rank = match c {
                'Y' => 1,
                'M' => 2,
                'D' => 3,
                _ => return Err(invalid(text, "unexpected designator")),
            };
            if digits.is_empty() || rank <= order {
                return Err(invalid(text, "components out of order"));
            }
            let value: u32 = digits.parse().map_err(|_| invalid(text, "number too large"))?;
            match c {
                'Y' => out.years = value,
                'M' => out.months = value,
                _ => out.days = value,
            }
            order = rank;
            digits.clear();
            seen_any = true;
        }
        if !digits.is_empty() {
            return Err(invalid(text, "number without designator"));
        }

        if let Some(time_part) = time_part {
            let mut order = 0;
            for c in time_part.chars() {
                if c.is_ascii_digit() || c == '.' {
                    digits.push(c);
                    continue;
                }
                let rank = match c {
                    'H' => 1,
                    'M' => 2,
                    'S' => 3,
                    _ => return Err(invalid(text, "unexpected designator")),
                };
                if digits.is_empty() || rank <= order {
                    return Err(invalid(text, "components out of order"));
                }
                if c == 'S' {
                    let (whole, frac) = match digits.split_once('.') {
                        Some((w, f)) => (w, Some(f)),
                        None => (digits.as_str(), None),
                    };
                    if whole.is_empty() {
                        return Err(invalid(text, "bad seconds"));
                    }
                    out.seconds = whole.parse().map_err(|_| invalid(text, "bad seconds"))?;
                    if let Some(frac) = frac {
                        out.nanos = parse_fraction(frac, text)?;
                    }
                } else {
                    if digits.contains('.') {
                        return Err(invalid(text, "fraction only allowed on seconds"));
                    }
                    let value: u32 =
                        digits.parse().map_err(|_| invalid(text, "number too large"))?;
                    if c == 'H' {
                        out.hours = value;
                    } else {
                        out.minutes = value;
                    }
                }
                order = rank;
                digits.clear();
                seen_any = true;
            }
            if !digits.is_empty() {
                return Err(invalid(text, "number without designator"));
            }
        }

        if !seen_any {
            return Err(invalid(text, "no components"));
        }
        Ok(out)
    }
}

impl fmt::Display for XsdDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative && !self.is_zero() {
            f.write_str("-")?;
        }
        f.write_str("P")?;
        if self.years != 0 {
            write!(f, "{}Y", self.years)?;
        }
        if self.months != 0 {
            write!(f, "{}M", self.months)?;
        }
        if self.days != 0 {
            write!(f, "{}D", self.days)?;
        }
        let has_time = self.hours != 0 || self.minutes != 0 || self.seconds != 0 || self.nanos != 0;
        if has_time {
            f.write_str("T")?;
            if self.hours != 0 {
                write!(f, "{}H", self.hours)?;
            }
            if self.minutes != 0 {
                write!(f, "{}M", self.minutes)?;
            }
            if self.seconds != 0 || self.nanos != 0 {
                write!(f, "{}", self.seconds)?;
                if self.nanos != 0 {
                    let frac = format!("{:09}", self.nanos % NANOS_PER_SECOND);
                    write!(f, ".{}", frac.trim_end_matches('0'))?;
                }
                f.write_str("S")?;
            }
        } else if self.is_zero() {
            f.write_str("T0S")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_duration() {
        let d: XsdDuration = "P1Y2M3DT4H5M6.5S".parse().unwrap();
        assert_eq!(d.years, 1);
        assert_eq!(d.months, 2);
        assert_eq!(d.days, 3);
        assert_eq!(d.hours, 4);
        assert_eq!(d.minutes, 5);
        assert_eq!(d.seconds, 6);
        assert_eq!(d.nanos, 500_000_000);
        assert!(!d.negative);
        assert_eq!(d.to_string(), "P1Y2M3DT4H5M6.5S");
    }

    #[test]
    fn test_parse_negative_and_time_only() {
        let d: XsdDuration = "-PT90M".parse().unwrap();
        assert!(d.negative);
        assert_eq!(d.minutes, 90);
        assert_eq!(d.to_string(), "-PT90M");
        assert_eq!(d.to_std(), None);

        let d: XsdDuration = "PT1H30M".parse().unwrap();
        assert_eq!(d.to_std(), Some(std::time::Duration::from_secs(5400)));
    }

    #[test]
    fn test_zero_formats_canonically() {
        let d: XsdDuration = "P0D".parse().unwrap();
        assert!(d.is_zero());
        assert_eq!(d.to_string(), "PT0S");
        assert_eq!(XsdDuration::default().to_string(), "PT0S");
    }

    #[test]
    fn test_month_and_minute_disambiguated_by_t() {
        let d: XsdDuration = "P1MT1M".parse().unwrap();
        assert_eq!(d.months, 1);
        assert_eq!(d.minutes, 1);
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in ["", "P", "PT", "1D", "P1H", "PT1D", "P1D2Y", "P1.5D", "PT1.S", "P1", "PT-1S"] {
            assert!(bad.parse::<XsdDuration>().is_err(), "accepted {:?}", bad);
        }
    }
}
