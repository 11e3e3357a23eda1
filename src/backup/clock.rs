use chrono::{Local, NaiveDate};

/// Source of "today" for naming archives.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[cfg(test)]
pub struct FixedClock(pub NaiveDate);

#[cfg(test)]
impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Archive stem for a date, e.g. `10-19-2026`. Never contains a path separator.
pub fn archive_stem(date: NaiveDate) -> String {
    date.format("%m-%d-%Y").to_string().replace(['/', '\\'], "-")
}
