//! Lenient date parsing for template values.
//!
//! Accepts the formats that show up in filled-in case forms: ISO dates,
//! day-first numeric dates with `.`, `/` or `-`, two-digit years, bare
//! times, English long dates and a few relative words. A blank string parses
//! as the current moment.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};

use super::patterns::{DATE_DMY, DATE_LONG, DATE_LONG_MONTH_FIRST, DATE_YMD, TIME_ONLY};

/// Parse `text` relative to the local clock.
pub fn parse_lenient(text: &str) -> Option<NaiveDateTime> {
    parse_lenient_at(text, Local::now().naive_local())
}

/// Parse `text`, resolving blank, relative and time-only input against `now`.
pub fn parse_lenient_at(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let text = text.trim();
    let today = now.date();

    match text.to_lowercase().as_str() {
        "" | "now" => return Some(now),
        "today" => return today.and_hms_opt(0, 0, 0),
        "yesterday" => return (today - Duration::days(1)).and_hms_opt(0, 0, 0),
        "tomorrow" => return (today + Duration::days(1)).and_hms_opt(0, 0, 0),
        _ => {}
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_local());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed);
    }

    // YYYY-MM-DD [HH:MM[:SS]]
    if let Some(caps) = DATE_YMD.captures(text) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        return with_time(date, caps.get(4), caps.get(5), caps.get(6));
    }

    // DD.MM.YYYY [HH:MM[:SS]]
    if let Some(caps) = DATE_DMY.captures(text) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year = parse_year(&caps[3]);
        let date = NaiveDate::from_ymd_opt(year, month, day)?;
        return with_time(date, caps.get(4), caps.get(5), caps.get(6));
    }

    if let Some(caps) = DATE_LONG.captures(text) {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_to_number(&caps[2])?;
        let year: i32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0);
    }

    if let Some(caps) = DATE_LONG_MONTH_FIRST.captures(text) {
        let month = month_to_number(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0);
    }

    if let Some(caps) = TIME_ONLY.captures(text) {
        return with_time(today, caps.get(1), caps.get(2), caps.get(3));
    }

    None
}

/// Calendar date of a non-blank value.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    if text.trim().is_empty() {
        return None;
    }
    parse_lenient(text).map(|value| value.date())
}

/// Whether `text` parses.
pub fn is_date(text: &str) -> bool {
    parse_lenient(text).is_some()
}

fn with_time(
    date: NaiveDate,
    hour: Option<regex::Match<'_>>,
    minute: Option<regex::Match<'_>>,
    second: Option<regex::Match<'_>>,
) -> Option<NaiveDateTime> {
    let number = |m: Option<regex::Match<'_>>| -> Option<u32> {
        match m {
            Some(m) => m.as_str().parse().ok(),
            None => Some(0),
        }
    };
    let time = NaiveTime::from_hms_opt(number(hour)?, number(minute)?, number(second)?)?;
    Some(date.and_time(time))
}

fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if s.len() <= 2 {
        // Two-digit year: assume 2000s for 00-50, 1900s for 51-99
        if year <= 50 { 2000 + year } else { 1900 + year }
    } else {
        year
    }
}

fn month_to_number(month: &str) -> Option<u32> {
    let month = month.to_lowercase();
    let number = match month.get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(number)
}
