use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::model::DateWindow;

/// Ramadan dates and public holidays for a Gregorian year.
pub trait Calendar {
    fn ramadan(&self, year: i32) -> Option<DateWindow>;

    /// Sorted ascending.
    fn public_holidays(&self, year: i32) -> Vec<NaiveDate>;
}

/// Egyptian calendar with tabulated Ramadan estimates.
///
/// Lunar dates are approximations; years outside the table have no known
/// Ramadan window.
#[derive(Debug, Clone, Copy, Default)]
pub struct EgyptianCalendar;

const RAMADAN_ESTIMATES: &[(i32, (u32, u32), (u32, u32))] = &[
    (2024, (3, 11), (4, 9)),
    (2025, (3, 1), (3, 30)),
    (2026, (2, 18), (3, 19)),
    (2027, (2, 8), (3, 9)),
    (2028, (1, 28), (2, 26)),
];

/// (month, day) of fixed-date holidays: Coptic Christmas, January 25,
/// Sinai Liberation, Labour Day, June 30, Revolution Day, Armed Forces Day.
const FIXED_HOLIDAYS: &[(u32, u32)] = &[(1, 7), (1, 25), (4, 25), (5, 1), (6, 30), (7, 23), (10, 6)];

impl Calendar for EgyptianCalendar {
    fn ramadan(&self, year: i32) -> Option<DateWindow> {
        let &(_, (sm, sd), (em, ed)) = RAMADAN_ESTIMATES.iter().find(|(y, _, _)| *y == year)?;
        Some(DateWindow {
            start: NaiveDate::from_ymd_opt(year, sm, sd)?,
            end: NaiveDate::from_ymd_opt(year, em, ed)?,
        })
    }

    fn public_holidays(&self, year: i32) -> Vec<NaiveDate> {
        let mut holidays: Vec<NaiveDate> = FIXED_HOLIDAYS
            .iter()
            .filter_map(|&(m, d)| NaiveDate::from_ymd_opt(year, m, d))
            .collect();

        if let Some(ramadan) = self.ramadan(year) {
            // Eid al-Fitr: three days after Ramadan ends.
            let fitr = ramadan.end + Duration::days(1);
            holidays.extend((0..3).map(|i| fitr + Duration::days(i)));
            // Eid al-Adha: four days, roughly seventy days after Ramadan.
            let adha = ramadan.end + Duration::days(70);
            holidays.extend((0..4).map(|i| adha + Duration::days(i)));
        }

        holidays.sort();
        holidays.dedup();
        holidays
    }
}

/// Friday, the congregational prayer day.
pub fn is_friday(date: NaiveDate) -> bool {
    date.weekday() == Weekday::Fri
}

/// The Egyptian weekend: Friday and Saturday.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Fri | Weekday::Sat)
}
