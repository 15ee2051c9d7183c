use chrono::{Datelike, NaiveDate};

/// Age in whole years on `on`. The year only counts once the birthday has
/// been reached; members without a birth date (or born after `on`) are 0.
pub fn age_on(date_of_birth: Option<NaiveDate>, on: NaiveDate) -> i32 {
    let Some(dob) = date_of_birth else {
        return 0;
    };

    let mut age = on.year() - dob.year();
    if (on.month(), on.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }

    age.max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn birthday_not_yet_reached() {
        assert_eq!(age_on(Some(date(2010, 6, 1)), date(2024, 3, 1)), 13);
        assert_eq!(age_on(Some(date(2010, 6, 1)), date(2024, 5, 31)), 13);
    }

    #[test]
    fn birthday_reached() {
        assert_eq!(age_on(Some(date(2010, 6, 1)), date(2024, 6, 1)), 14);
        assert_eq!(age_on(Some(date(2010, 6, 1)), date(2024, 7, 1)), 14);
    }

    #[test]
    fn leap_day_birthday() {
        assert_eq!(age_on(Some(date(2004, 2, 29)), date(2022, 2, 28)), 17);
        assert_eq!(age_on(Some(date(2004, 2, 29)), date(2022, 3, 1)), 18);
    }

    #[test]
    fn missing_or_future_birth_date() {
        assert_eq!(age_on(None, date(2024, 1, 1)), 0);
        assert_eq!(age_on(Some(date(2030, 1, 1)), date(2024, 1, 1)), 0);
    }
}
