use crate::error::{RepostatError, Result};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

pub fn day_key(timestamp: &DateTime<Utc>) -> NaiveDate {
    timestamp.date_naive()
}

pub fn month_key(timestamp: &DateTime<Utc>) -> String {
    format!("{}-{:02}", timestamp.year(), timestamp.month())
}

/// Every day from `start` to `end`, both included.
pub fn days_between(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |day| *day <= end)
}

/// Parses a filter bound: RFC3339, `YYYY-MM-DD`, or a relative duration such
/// as `2weeks` / `90d ago`. A bare date used as an upper bound covers the
/// whole day.
pub fn parse_bound(input: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let time = if end_of_day {
            date.and_hms_opt(23, 59, 59)
        } else {
            date.and_hms_opt(0, 0, 0)
        };
        if let Some(datetime) = time {
            return Ok(Utc.from_utc_datetime(&datetime));
        }
    }

    let relative = input.strip_suffix("ago").unwrap_or(input).trim();
    if let Ok(duration) = humantime::parse_duration(relative) {
        let delta = chrono::Duration::from_std(duration)
            .map_err(|_| RepostatError::InvalidFilter(format!("Duration overflow for '{input}'")))?;
        return Utc::now()
            .checked_sub_signed(delta)
            .ok_or_else(|| RepostatError::InvalidFilter(format!("Duration overflow for '{input}'")));
    }

    Err(RepostatError::InvalidFilter(format!(
        "Invalid date '{input}' (expected RFC3339, YYYY-MM-DD or a duration like 30d)"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_key_is_zero_padded() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 10, 0, 0).unwrap();
        assert_eq!(month_key(&ts), "2024-03");
    }

    #[test]
    fn day_span_is_inclusive() {
        let start = NaiveDate::from_ymd_opt(2024, 2, 28).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let days: Vec<NaiveDate> = days_between(start, end).collect();
        assert_eq!(days.len(), 3);
        assert!(days_between(end, start).next().is_none());
    }

    #[test]
    fn bare_dates_cover_the_whole_day_as_upper_bound() {
        let since = parse_bound("2024-01-05", false).unwrap();
        let until = parse_bound("2024-01-05", true).unwrap();
        assert_eq!(since, Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap());
        assert_eq!(until, Utc.with_ymd_and_hms(2024, 1, 5, 23, 59, 59).unwrap());
    }

    #[test]
    fn rfc3339_keeps_the_instant() {
        let parsed = parse_bound("2024-01-05T10:00:00+02:00", false).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 1, 5, 8, 0, 0).unwrap());
    }

    #[test]
    fn relative_bounds_are_in_the_past() {
        let parsed = parse_bound("2days ago", false).unwrap();
        assert!(parsed < Utc::now());
        assert!(matches!(parse_bound("someday", false), Err(RepostatError::InvalidFilter(_))));
    }
}
