use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::BookingError;
use crate::model::{Span, Timestamp};

lazy_static! {
    static ref CLOCK_TIME: Regex = Regex::new(r"^([0-1]?[0-9]|2[0-3]):[0-5][0-9]$").unwrap();
}

/// Wall-clock time of day at minute resolution ("HH:mm").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
}

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self, BookingError> {
        if hour > 23 || minute > 59 {
            return Err(BookingError::Format(format!("{hour}:{minute:02}")));
        }
        Ok(Self { hour, minute })
    }

    pub fn as_naive_time(&self) -> NaiveTime {
        // hour/minute are range-checked on construction
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl std::fmt::Display for ClockTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl std::str::FromStr for ClockTime {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_clock_time(s)
    }
}

/// Parse "H:mm" / "HH:mm" (00:00 through 23:59).
pub fn parse_clock_time(s: &str) -> Result<ClockTime, BookingError> {
    if !CLOCK_TIME.is_match(s) {
        return Err(BookingError::Format(s.to_string()));
    }
    let (hour, minute) = s
        .split_once(':')
        .ok_or_else(|| BookingError::Format(s.to_string()))?;
    let hour = hour
        .parse()
        .map_err(|_| BookingError::Format(s.to_string()))?;
    let minute = minute
        .parse()
        .map_err(|_| BookingError::Format(s.to_string()))?;
    ClockTime::new(hour, minute)
}

/// Anchor a time of day to a calendar date, zero seconds.
pub fn combine(date: NaiveDate, time: ClockTime) -> Timestamp {
    date.and_time(time.as_naive_time())
}

/// Half-open overlap: `[a_start, a_end)` and `[b_start, b_end)` share at least one instant.
/// Touching endpoints do not overlap.
pub fn intervals_overlap(
    a_start: Timestamp,
    a_end: Timestamp,
    b_start: Timestamp,
    b_end: Timestamp,
) -> bool {
    a_start < b_end && a_end > b_start
}

/// `[00:00, next day 00:00)` for the calendar day of `date`.
/// Fails on the last representable day, which has no next midnight.
pub fn day_span(date: NaiveDate) -> Result<Span, BookingError> {
    let start = date.and_time(NaiveTime::MIN);
    let end = start
        .checked_add_signed(Duration::days(1))
        .ok_or_else(|| BookingError::Validation(format!("date out of range: {date}")))?;
    Ok(Span::new(start, end))
}

/// Truncate a timestamp to the minute.
pub fn to_minute(ts: Timestamp) -> Timestamp {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

pub fn format_clock(ts: &NaiveDateTime) -> String {
    ts.format("%H:%M").to_string()
}

/// Presentation label for a slot: "HH:mm - HH:mm".
pub fn format_slot_label(span: &Span) -> String {
    format!("{} - {}", format_clock(&span.start), format_clock(&span.end))
}

/// Parse a "HH:mm - HH:mm" label back into timestamps on `date`.
pub fn parse_slot_label(date: NaiveDate, label: &str) -> Result<Span, BookingError> {
    let invalid = || BookingError::Validation(format!("invalid slot label: {label:?}"));
    let (start, end) = label.split_once(" - ").ok_or_else(invalid)?;
    let start = parse_clock_time(start.trim()).map_err(|_| invalid())?;
    let end = parse_clock_time(end.trim()).map_err(|_| invalid())?;
    if end <= start {
        return Err(invalid());
    }
    Ok(Span::new(combine(date, start), combine(date, end)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, 7).unwrap()
    }

    fn at(h: u32, m: u32) -> Timestamp {
        day().and_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn parse_accepts_single_and_double_digit_hours() {
        assert_eq!(parse_clock_time("09:00").unwrap(), ClockTime { hour: 9, minute: 0 });
        assert_eq!(parse_clock_time("9:05").unwrap(), ClockTime { hour: 9, minute: 5 });
        assert_eq!(parse_clock_time("23:59").unwrap(), ClockTime { hour: 23, minute: 59 });
        assert_eq!(parse_clock_time("0:00").unwrap(), ClockTime { hour: 0, minute: 0 });
    }

    #[test]
    fn parse_rejects_malformed() {
        for s in ["24:00", "12:60", "12", "12:5", " 12:00", "12:00 ", "ab:cd", "", "123:00", "12-00"] {
            assert!(
                matches!(parse_clock_time(s), Err(BookingError::Format(_))),
                "{s:?} should be rejected"
            );
        }
    }

    #[test]
    fn combine_anchors_to_date_with_zero_seconds() {
        let t = combine(day(), ClockTime::new(10, 30).unwrap());
        assert_eq!(t, at(10, 30));
        assert_eq!(t.second(), 0);
    }

    #[test]
    fn overlap_is_half_open() {
        assert!(intervals_overlap(at(9, 0), at(10, 0), at(9, 30), at(10, 30)));
        assert!(intervals_overlap(at(9, 30), at(10, 30), at(9, 0), at(10, 0)));
        assert!(intervals_overlap(at(9, 0), at(12, 0), at(10, 0), at(11, 0)));
        assert!(!intervals_overlap(at(9, 0), at(10, 0), at(10, 0), at(11, 0)));
        assert!(!intervals_overlap(at(10, 0), at(11, 0), at(9, 0), at(10, 0)));
    }

    #[test]
    fn slot_label_roundtrip() {
        let span = Span::new(at(9, 0), at(10, 15));
        let label = format_slot_label(&span);
        assert_eq!(label, "09:00 - 10:15");
        assert_eq!(parse_slot_label(day(), &label).unwrap(), span);
    }

    #[test]
    fn slot_label_rejects_garbage() {
        assert!(matches!(parse_slot_label(day(), "09:00-10:00"), Err(BookingError::Validation(_))));
        assert!(matches!(parse_slot_label(day(), "10:00 - 09:00"), Err(BookingError::Validation(_))));
        assert!(matches!(parse_slot_label(day(), "9am - 10am"), Err(BookingError::Validation(_))));
    }

    #[test]
    fn day_span_covers_whole_day() {
        let span = day_span(day()).unwrap();
        assert_eq!(span.start, at(0, 0));
        assert_eq!(span.duration_minutes(), 24 * 60);
    }

    #[test]
    fn day_span_at_calendar_end_is_rejected() {
        assert!(matches!(day_span(NaiveDate::MAX), Err(BookingError::Validation(_))));
        assert!(day_span(NaiveDate::MAX.pred_opt().unwrap()).is_ok());
    }
}
