//! Age arithmetic on calendar dates.

use chrono::{Datelike, Months, NaiveDate};

/// Whole years between `date_of_birth` and `as_of`.
///
/// One year is subtracted while this year's birthday has not yet been
/// reached, comparing `(month, day)` pairs. A 29 February birthday therefore
/// only counts as reached on 1 March in non-leap years.
pub fn compute_age(date_of_birth: NaiveDate, as_of: NaiveDate) -> i32 {
    let years = as_of.year() - date_of_birth.year();
    if (as_of.month(), as_of.day()) < (date_of_birth.month(), date_of_birth.day()) {
        years - 1
    } else {
        years
    }
}

/// The same calendar day `years` years before `date`.
///
/// Falls back to the last day of the month when that day does not exist
/// (29 February in a non-leap year).
pub fn years_before(date: NaiveDate, years: u32) -> Option<NaiveDate> {
    date.checked_sub_months(Months::new(years.checked_mul(12)?))
}

/// Birth-date range `[earliest, latest]` of everyone whose age on `today`
/// lies in `[min_age, max_age]`
pub fn birth_date_range(today: NaiveDate, min_age: u32, max_age: u32) -> Option<(NaiveDate, NaiveDate)> {
    let earliest = years_before(today, max_age.checked_add(1)?)?.succ_opt()?;
    let latest = years_before(today, min_age)?;
    Some((earliest, latest))
}

/// dd/mm/yyyy, as displayed by the admin panel
pub fn format_birth_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_before_and_on_birthday() {
        assert_eq!(compute_age(date(2015, 6, 15), date(2024, 6, 14)), 8);
        assert_eq!(compute_age(date(2015, 6, 15), date(2024, 6, 15)), 9);
        assert_eq!(compute_age(date(2015, 6, 15), date(2024, 12, 31)), 9);
    }

    #[test]
    fn test_leap_day_birthday_is_not_special_cased() {
        let leap = date(2016, 2, 29);
        assert_eq!(compute_age(leap, date(2023, 2, 28)), 6);
        assert_eq!(compute_age(leap, date(2023, 3, 1)), 7);
        assert_eq!(compute_age(leap, date(2024, 2, 29)), 8);
    }

    #[test]
    fn test_age_on_birth_date_is_zero() {
        assert_eq!(compute_age(date(2020, 1, 1), date(2020, 1, 1)), 0);
    }

    #[test]
    fn test_birth_date_range_bounds_match_compute_age() {
        let today = date(2024, 6, 15);
        let (earliest, latest) = birth_date_range(today, 6, 8).unwrap();

        assert_eq!(earliest, date(2015, 6, 16));
        assert_eq!(latest, date(2018, 6, 15));

        assert_eq!(compute_age(earliest, today), 8);
        assert_eq!(compute_age(earliest.pred_opt().unwrap(), today), 9);
        assert_eq!(compute_age(latest, today), 6);
        assert_eq!(compute_age(latest.succ_opt().unwrap(), today), 5);
    }

    #[test]
    fn test_birth_date_range_rejects_unrepresentable_ages() {
        let today = date(2024, 6, 15);
        assert!(birth_date_range(today, 0, u32::MAX).is_none());
        assert!(birth_date_range(today, 0, 1_000_000).is_none());
    }

    #[test]
    fn test_format_birth_date() {
        assert_eq!(format_birth_date(date(2015, 6, 5)), "05/06/2015");
    }
}
