use chrono::{Datelike, Month, NaiveDate, NaiveDateTime};

/// Parses a calendar date, discarding any time of day.
///
/// `formats` are tried in order. Returns `None` for empty or unparsable
/// input; the caller never gets a fabricated date.
pub fn parse_date<S: AsRef<str>>(s: &str, formats: &[S]) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    formats.iter().find_map(|format| {
        let format = format.as_ref();
        NaiveDateTime::parse_from_str(s, format)
            .map(|dt| dt.date())
            .or_else(|_| NaiveDate::parse_from_str(s, format))
            .ok()
    })
}

/// Whole days from `from` to `to`; `None` if either side is missing.
pub fn days_between(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Option<i64> {
    Some((to? - from?).num_days())
}

/// English month name, e.g. `"January"`.
pub fn month_name(date: NaiveDate) -> &'static str {
    // month() is always 1..=12
    Month::try_from(date.month() as u8)
        .map(|m| m.name())
        .unwrap_or_default()
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMATS: &[&str] = &["%Y-%m-%d", "%Y-%m-%d %H:%M:%S", "%d/%m/%Y"];

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_plain_date() {
        assert_eq!(parse_date("2023-01-04", FORMATS), Some(ymd(2023, 1, 4)));
    }

    #[test]
    fn test_time_of_day_is_discarded() {
        assert_eq!(
            parse_date("2023-01-04 23:59:00", FORMATS),
            Some(ymd(2023, 1, 4))
        );
    }

    #[test]
    fn test_french_day_first() {
        assert_eq!(parse_date("04/01/2023", FORMATS), Some(ymd(2023, 1, 4)));
    }

    #[test]
    fn test_garbage_and_empty_are_missing() {
        assert_eq!(parse_date("pas de date", FORMATS), None);
        assert_eq!(parse_date("", FORMATS), None);
        assert_eq!(parse_date("2023-02-30", FORMATS), None);
    }

    #[test]
    fn test_days_between() {
        assert_eq!(
            days_between(Some(ymd(2023, 1, 1)), Some(ymd(2023, 1, 4))),
            Some(3)
        );
        assert_eq!(
            days_between(Some(ymd(2023, 1, 4)), Some(ymd(2023, 1, 1))),
            Some(-3)
        );
        assert_eq!(days_between(None, Some(ymd(2023, 1, 4))), None);
    }

    #[test]
    fn test_month_name() {
        assert_eq!(month_name(ymd(2023, 1, 4)), "January");
        assert_eq!(month_name(ymd(2023, 12, 31)), "December");
    }
}
