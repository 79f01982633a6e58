use chrono::{Datelike, Duration, Local, NaiveDate};

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// e.g. "Week of June 03, 2024".
pub fn week_label(date: NaiveDate) -> String {
    week_start(date).format("Week of %B %d, %Y").to_string()
}

pub fn current_week_label() -> String {
    week_label(Local::now().date_naive())
}
