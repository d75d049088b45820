use chrono::{Datelike, NaiveDate, Utc};

/// All pay-period arithmetic runs on civil dates. "Today" is the current
/// UTC date; ranges are inclusive on both ends.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .unwrap()
        .pred_opt()
        .unwrap()
}

/// Day 1-15 falls in the first half, day 16 onward in the second.
pub fn semi_monthly(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    if date.day() <= 15 {
        first_half(date)
    } else {
        second_half(date)
    }
}

pub fn first_half(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap();
    let end = NaiveDate::from_ymd_opt(date.year(), date.month(), 15).unwrap();
    (start, end)
}

pub fn second_half(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = NaiveDate::from_ymd_opt(date.year(), date.month(), 16).unwrap();
    (start, last_day_of_month(date.year(), date.month()))
}

pub fn monthly(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = NaiveDate::from_ymd_opt(date.year(), date.month(), 1).unwrap();
    (start, last_day_of_month(date.year(), date.month()))
}

pub fn single_day(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    (date, date)
}

/// Calendar month from a "YYYY-MM" filter value.
pub fn month_range(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)?;
    Some((start, last_day_of_month(year, month)))
}

pub fn year_range(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let end = NaiveDate::from_ymd_opt(year, 12, 31)?;
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn day_15_belongs_to_the_first_half() {
        assert_eq!(semi_monthly(d(2026, 3, 15)), (d(2026, 3, 1), d(2026, 3, 15)));
        assert_eq!(semi_monthly(d(2026, 3, 16)), (d(2026, 3, 16), d(2026, 3, 31)));
        assert_eq!(semi_monthly(d(2026, 3, 1)), (d(2026, 3, 1), d(2026, 3, 15)));
    }

    #[test]
    fn second_half_ends_on_the_month_boundary() {
        assert_eq!(second_half(d(2026, 4, 20)).1, d(2026, 4, 30));
        assert_eq!(second_half(d(2026, 2, 28)).1, d(2026, 2, 28));
        assert_eq!(second_half(d(2024, 2, 20)).1, d(2024, 2, 29));
        assert_eq!(second_half(d(2026, 12, 25)).1, d(2026, 12, 31));
    }

    #[test]
    fn monthly_spans_the_whole_month() {
        assert_eq!(monthly(d(2026, 2, 10)), (d(2026, 2, 1), d(2026, 2, 28)));
        assert_eq!(monthly(d(2026, 12, 31)), (d(2026, 12, 1), d(2026, 12, 31)));
    }

    #[test]
    fn month_range_validates_input() {
        assert_eq!(month_range(2026, 6), Some((d(2026, 6, 1), d(2026, 6, 30))));
        assert_eq!(month_range(2026, 13), None);
        assert_eq!(month_range(2026, 0), None);
    }

    #[test]
    fn year_range_covers_the_calendar_year() {
        assert_eq!(year_range(2026), Some((d(2026, 1, 1), d(2026, 12, 31))));
    }
}
