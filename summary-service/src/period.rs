//! Calendar-window arithmetic in the plants' civil time zone. Every aggregate
//! window is computed on local `Date`s and only converted to UTC instants at
//! the storage boundary.

use time::{Date, Duration, Month, OffsetDateTime, UtcOffset};

/// The current calendar day in the given zone.
pub fn local_today(offset: UtcOffset) -> Date {
    OffsetDateTime::now_utc().to_offset(offset).date()
}

/// `[local-midnight, local-midnight + 24h)` for one day, as UTC-comparable
/// instants for the reading-store query.
pub fn local_day_window(day: Date, offset: UtcOffset) -> (OffsetDateTime, OffsetDateTime) {
    let start = day.midnight().assume_offset(offset);
    (start, start + Duration::days(1))
}

/// The ISO week containing `reference`: `[monday, monday + 7d)`.
pub fn week_window(reference: Date) -> (Date, Date) {
    let monday =
        reference - Duration::days(i64::from(reference.weekday().number_days_from_monday()));
    (monday, monday + Duration::days(7))
}

/// The calendar month containing `reference`: `[first, first-of-next)`.
pub fn month_window(reference: Date) -> (Date, Date) {
    let first = first_of_month(reference.year(), reference.month());
    let next = if reference.month() == Month::December {
        first_of_month(reference.year() + 1, Month::January)
    } else {
        first_of_month(reference.year(), reference.month().next())
    };
    (first, next)
}

/// The calendar year containing `reference`: `[jan 1, next jan 1)`.
pub fn year_window(reference: Date) -> (Date, Date) {
    (
        first_of_month(reference.year(), Month::January),
        first_of_month(reference.year() + 1, Month::January),
    )
}

/// Shift `reference` by whole calendar months, landing on the first of the
/// target month (only the month identity matters to the callers).
pub fn shift_months(reference: Date, offset: i32) -> Date {
    let months = reference.year() * 12 + i32::from(u8::from(reference.month())) - 1 + offset;
    let year = months.div_euclid(12);
    let month = Month::try_from((months.rem_euclid(12) + 1) as u8).expect("month in 1..=12");
    first_of_month(year, month)
}

fn first_of_month(year: i32, month: Month) -> Date {
    Date::from_calendar_date(year, month, 1).expect("first of month is a valid date")
}
