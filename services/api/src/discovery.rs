//! Date windows and search helpers for the discovery read paths.

use std::str::FromStr;

use chrono::{Datelike, Days, Months, NaiveDate};

/// Days after today covered by the upcoming-events slider.
pub const SLIDER_DAYS: u64 = 7;

/// Date ordering for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            other => Err(format!("sort must be 'asc' or 'desc', got '{other}'")),
        }
    }
}

/// Escape `%`, `_` and `\` so a search term matches literally inside `ILIKE`.
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Inclusive date range `[today, today + 7]` for the slider.
pub fn slider_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let end = today.checked_add_days(Days::new(SLIDER_DAYS)).unwrap_or(NaiveDate::MAX);
    (today, end)
}

/// Inclusive first and last day of a calendar month.
///
/// Returns `None` for a month outside 1..=12 or a year chrono cannot represent.
pub fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let last = first
        .checked_add_months(Months::new(1))?
        .pred_opt()?;
    Some((first, last))
}

/// The month containing `today`, as `(year, month)`.
pub fn current_month(today: NaiveDate) -> (i32, u32) {
    (today.year(), today.month())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn escape_like_neutralises_wildcards() {
        assert_eq!(escape_like("work"), "work");
        assert_eq!(escape_like("100%_off\\"), "100\\%\\_off\\\\");
    }

    #[test]
    fn slider_covers_seven_days_inclusive() {
        let (from, to) = slider_window(date(2026, 12, 28));
        assert_eq!(from, date(2026, 12, 28));
        assert_eq!(to, date(2027, 1, 4));
    }

    #[rstest]
    #[case(2026, 2, date(2026, 2, 1), date(2026, 2, 28))]
    #[case(2028, 2, date(2028, 2, 1), date(2028, 2, 29))]
    #[case(2026, 12, date(2026, 12, 1), date(2026, 12, 31))]
    fn month_bounds_cover_whole_month(
        #[case] year: i32,
        #[case] month: u32,
        #[case] first: NaiveDate,
        #[case] last: NaiveDate,
    ) {
        assert_eq!(month_bounds(year, month), Some((first, last)));
    }

    #[test]
    fn month_bounds_rejects_bad_month() {
        assert_eq!(month_bounds(2026, 0), None);
        assert_eq!(month_bounds(2026, 13), None);
    }

    #[test]
    fn sort_order_parses() {
        assert_eq!("DESC".parse::<SortOrder>().unwrap(), SortOrder::Descending);
        assert_eq!("asc".parse::<SortOrder>().unwrap(), SortOrder::Ascending);
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    proptest! {
        #[test]
        fn every_day_of_month_is_inside_bounds(year in 1970i32..2200, month in 1u32..=12, day in 1u32..=31) {
            let (first, last) = month_bounds(year, month).unwrap();
            if let Some(d) = NaiveDate::from_ymd_opt(year, month, day) {
                prop_assert!(first <= d && d <= last);
            }
            prop_assert_eq!(last.succ_opt().unwrap().day(), 1);
        }

        #[test]
        fn slider_window_spans_exactly_seven_days(days in 0i64..100_000) {
            let today = date(1970, 1, 1) + chrono::Duration::days(days);
            let (from, to) = slider_window(today);
            prop_assert_eq!((to - from).num_days(), 7);
        }
    }
}
