//! Business-day arithmetic for the horizon cutoff dates.

use chrono::{Datelike, Days, Local, NaiveDate, Weekday};

use crate::error::KpiError;

/// Returns the `count`-th working day after today, skipping Saturdays and
/// Sundays. The count starts from tomorrow, so `1` on a Friday is the
/// following Monday.
pub fn nth_working_day(count: u32) -> Result<NaiveDate, KpiError> {
    nth_working_day_from(Local::now().date_naive(), count)
}

/// Same as [`nth_working_day`] but counted from an explicit start date.
///
/// `count == 0` is rejected: the cutoff would be ill-defined ("zero working
/// days from now" is neither today nor tomorrow).
pub fn nth_working_day_from(start: NaiveDate, count: u32) -> Result<NaiveDate, KpiError> {
    if count == 0 {
        return Err(KpiError::ZeroHorizon);
    }

    let mut day = start;
    let mut remaining = count;
    loop {
        day = day
            .checked_add_days(Days::new(1))
            .expect("date overflow walking working days");
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            remaining -= 1;
            if remaining == 0 {
                return Ok(day);
            }
        }
    }
}
