//! Relative publication dates ("il y a 2 jours", "yesterday") turned into
//! calendar dates against the run's reference instant.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;

/// A normalized publication date
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishedAt {
    /// Day precision (`2024-03-13`)
    Day(NaiveDate),
    /// Minute or hour offsets keep the time of day
    Moment(NaiveDateTime),
    /// Input that could not be normalized, kept as shown on the page
    Verbatim(String),
}

impl fmt::Display for PublishedAt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishedAt::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            PublishedAt::Moment(at) => write!(f, "{}", at.format("%Y-%m-%d %H:%M:%S")),
            PublishedAt::Verbatim(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for PublishedAt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

static OFFSET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(\d+)\s*(minutes?|mins?|heures?|hours?|hrs?|h|jours?|days?|semaines?|weeks?|mois|months?|années?|ans?|years?)\b",
    )
    .expect("valid offset pattern")
});

const LITERAL_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y"];

enum Unit {
    Minutes,
    Hours,
    Days,
}

/// Convert a relative date shown on a listing into an absolute one.
///
/// Unknown input is returned unchanged as [`PublishedAt::Verbatim`].
pub fn normalize(raw: &str, now: NaiveDateTime) -> PublishedAt {
    let text = raw.trim().to_lowercase().replace('\u{2019}', "'");
    let today = now.date();

    if text.starts_with("aujourd'hui") || text.starts_with("today") {
        return PublishedAt::Day(today);
    }

    if text.starts_with("hier") || text.starts_with("yesterday") {
        if let Some(day) = today.pred_opt() {
            return PublishedAt::Day(day);
        }
    }

    if ["quelques instants", "à l'instant", "a l'instant", "just now", "moments ago"]
        .iter()
        .any(|phrase| text.contains(phrase))
    {
        return PublishedAt::Moment(now);
    }

    if let Some(normalized) = offset(&text, now) {
        return normalized;
    }

    for format in LITERAL_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&text, format) {
            return PublishedAt::Day(date);
        }
    }

    PublishedAt::Verbatim(raw.to_string())
}

fn offset(text: &str, now: NaiveDateTime) -> Option<PublishedAt> {
    let caps = OFFSET.captures(text)?;
    let count: i64 = caps[1].parse().ok()?;

    let (unit, factor) = match &caps[2] {
        u if u.starts_with("min") => (Unit::Minutes, 1),
        u if u.starts_with('h') => (Unit::Hours, 1),
        u if u.starts_with("jour") || u.starts_with("day") => (Unit::Days, 1),
        u if u.starts_with("semaine") || u.starts_with("week") => (Unit::Days, 7),
        u if u.starts_with("mois") || u.starts_with("month") => (Unit::Days, 30),
        _ => (Unit::Days, 365),
    };

    let amount = count.checked_mul(factor)?;
    match unit {
        Unit::Minutes => now
            .checked_sub_signed(Duration::try_minutes(amount)?)
            .map(PublishedAt::Moment),
        Unit::Hours => now
            .checked_sub_signed(Duration::try_hours(amount)?)
            .map(PublishedAt::Moment),
        Unit::Days => now
            .checked_sub_signed(Duration::try_days(amount)?)
            .map(|at| PublishedAt::Day(at.date())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> PublishedAt {
        PublishedAt::Day(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn today_and_yesterday() {
        assert_eq!(normalize("today", now()), day(2024, 3, 15));
        assert_eq!(normalize("Aujourd'hui 09:12", now()), day(2024, 3, 15));
        assert_eq!(normalize("Aujourd\u{2019}hui", now()), day(2024, 3, 15));
        assert_eq!(normalize("yesterday", now()), day(2024, 3, 14));
        assert_eq!(normalize("Hier", now()), day(2024, 3, 14));
    }

    #[test]
    fn day_offsets() {
        assert_eq!(normalize("2 days ago", now()), day(2024, 3, 13));
        assert_eq!(normalize("il y a 20 jours", now()), day(2024, 2, 24));
        assert_eq!(normalize("il y a 1 semaine", now()), day(2024, 3, 8));
        assert_eq!(normalize("il y a 2 mois", now()), day(2024, 1, 15));
        assert_eq!(normalize("il y a 1 an", now()), day(2023, 3, 16));
    }

    #[test]
    fn hour_and_minute_offsets_keep_time() {
        let at = |h, m| PublishedAt::Moment(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap().and_hms_opt(h, m, 0).unwrap());

        assert_eq!(normalize("3 hours ago", now()), at(7, 30));
        assert_eq!(normalize("il y a 5 heures", now()), at(5, 30));
        assert_eq!(normalize("il y a 12 minutes", now()), at(10, 18));
        assert_eq!(normalize("il y a quelques instants", now()), PublishedAt::Moment(now()));
    }

    #[test]
    fn literal_dates() {
        assert_eq!(normalize("2024-01-02", now()), day(2024, 1, 2));
        assert_eq!(normalize("02/01/2024", now()), day(2024, 1, 2));
    }

    #[test]
    fn unknown_input_is_returned_unchanged() {
        let raw = "  publié récemment ";
        assert_eq!(normalize(raw, now()), PublishedAt::Verbatim(raw.to_string()));
        assert_eq!(normalize(raw, now()).to_string(), raw);
        assert_eq!(normalize("", now()), PublishedAt::Verbatim(String::new()));
    }

    #[test]
    fn absurd_offsets_fall_back_to_verbatim() {
        let raw = "il y a 99999999999999 ans";
        assert_eq!(normalize(raw, now()), PublishedAt::Verbatim(raw.to_string()));
    }

    #[test]
    fn rendering() {
        assert_eq!(day(2024, 3, 5).to_string(), "2024-03-05");
        assert_eq!(normalize("2 hours ago", now()).to_string(), "2024-03-15 08:30:00");
    }
}
