//! Period labels and Live Register date arithmetic.

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Parse a PxStat month label into the first day of that month.
///
/// Accepts `2023M01`, `202301`, `2023-01` and `2023 January` (full or
/// abbreviated month name).
pub fn parse_month(label: &str) -> Option<NaiveDate> {
    let s = label.trim();
    if let Some((y, m)) = s.split_once('M').or_else(|| s.split_once('-'))
        && let (Ok(y), Ok(m)) = (y.parse::<i32>(), m.parse::<u32>())
    {
        return month_start(y, m);
    }
    if s.len() == 6 && s.bytes().all(|b| b.is_ascii_digit()) {
        return month_start(s[..4].parse().ok()?, s[4..].parse().ok()?);
    }
    NaiveDate::parse_from_str(&format!("{s} 1"), "%Y %B %d").ok()
}

/// First day of `year`-`month`.
pub fn month_start(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Last day of the month containing `date`.
pub fn month_end(date: NaiveDate) -> Option<NaiveDate> {
    let (y, m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    month_start(y, m)?.pred_opt()
}

/// Last `weekday` of the month containing `date`.
pub fn last_weekday_of_month(date: NaiveDate, weekday: Weekday) -> Option<NaiveDate> {
    let end = month_end(date)?;
    let back = (7 + end.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    end.checked_sub_days(Days::new(u64::from(back)))
}

/// Live Register reference dates moved from Fridays to Thursdays in May 2015.
pub fn thursday_switch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 5, 1).unwrap_or(NaiveDate::MIN)
}

/// Live Register reference date for the month containing `month`: last
/// Friday before May 2015, last Thursday from then on.
pub fn reference_date(month: NaiveDate) -> Option<NaiveDate> {
    let start = month_start(month.year(), month.month())?;
    let weekday = if start < thursday_switch() {
        Weekday::Fri
    } else {
        Weekday::Thu
    };
    last_weekday_of_month(start, weekday)
}

/// The administrative extract date: the Sunday after `reference`.
pub fn extract_date(reference: NaiveDate) -> Option<NaiveDate> {
    let ahead = 7 - reference.weekday().num_days_from_sunday();
    reference.checked_add_days(Days::new(u64::from(ahead)))
}

/// Iterate month starts from `start` to `end`, inclusive of both months.
pub fn months_between(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let first = month_start(start.year(), start.month());
    std::iter::successors(first, |d| d.checked_add_months(chrono::Months::new(1)))
        .take_while(move |d| *d <= end)
}
