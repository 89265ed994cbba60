//! Fluent cron expression builder.

use std::fmt;

use chrono::Weekday;

use crate::error::CronError;
use crate::field::CronField;

const WILDCARD: &str = "*";

/// Builds a five-field cron expression.
///
/// Every field starts as a wildcard. Setters replace one field and validate
/// their input, so a builder never holds an out-of-range value. Shortcuts such
/// as [`daily`](Self::daily) set several fields at once and leave the others
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpressionBuilder {
    minute: String,
    hour: String,
    day_of_month: String,
    month: String,
    day_of_week: String,
}

impl Default for CronExpressionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CronExpressionBuilder {
    /// Create a builder with every field set to `*`.
    pub fn new() -> Self {
        Self {
            minute: WILDCARD.to_string(),
            hour: WILDCARD.to_string(),
            day_of_month: WILDCARD.to_string(),
            month: WILDCARD.to_string(),
            day_of_week: WILDCARD.to_string(),
        }
    }

    /// Return every field to `*`.
    pub fn reset(self) -> Self {
        Self::new()
    }

    /// Join the fields in `minute hour day-of-month month day-of-week` order.
    pub fn build(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.minute, self.hour, self.day_of_month, self.month, self.day_of_week
        )
    }

    fn set(mut self, field: CronField, value: String) -> Self {
        match field {
            CronField::Minute => self.minute = value,
            CronField::Hour => self.hour = value,
            CronField::DayOfMonth => self.day_of_month = value,
            CronField::Month => self.month = value,
            CronField::DayOfWeek => self.day_of_week = value,
        }
        self
    }

    fn single(self, field: CronField, value: u32) -> Result<Self, CronError> {
        let value = field.check(value)?;
        Ok(self.set(field, value.to_string()))
    }

    fn list(self, field: CronField, values: &[u32]) -> Result<Self, CronError> {
        let rendered = field.list(values)?;
        Ok(self.set(field, rendered))
    }

    fn range(self, field: CronField, start: u32, end: u32) -> Result<Self, CronError> {
        let rendered = field.range(start, end)?;
        Ok(self.set(field, rendered))
    }

    fn step(self, field: CronField, step: u32) -> Result<Self, CronError> {
        let rendered = field.step(step)?;
        Ok(self.set(field, rendered))
    }

    // Minute

    pub fn at_minute(self, minute: u32) -> Result<Self, CronError> {
        self.single(CronField::Minute, minute)
    }

    pub fn at_minutes(self, minutes: &[u32]) -> Result<Self, CronError> {
        self.list(CronField::Minute, minutes)
    }

    pub fn minute_range(self, start: u32, end: u32) -> Result<Self, CronError> {
        self.range(CronField::Minute, start, end)
    }

    /// `*/n` in the minute field.
    pub fn every_minutes(self, n: u32) -> Result<Self, CronError> {
        self.step(CronField::Minute, n)
    }

    pub fn every_minute(self) -> Self {
        self.set(CronField::Minute, WILDCARD.to_string())
    }

    // Hour

    pub fn at_hour(self, hour: u32) -> Result<Self, CronError> {
        self.single(CronField::Hour, hour)
    }

    pub fn at_hours(self, hours: &[u32]) -> Result<Self, CronError> {
        self.list(CronField::Hour, hours)
    }

    pub fn hour_range(self, start: u32, end: u32) -> Result<Self, CronError> {
        self.range(CronField::Hour, start, end)
    }

    pub fn every_hours(self, n: u32) -> Result<Self, CronError> {
        self.step(CronField::Hour, n)
    }

    pub fn every_hour(self) -> Self {
        self.set(CronField::Hour, WILDCARD.to_string())
    }

    // Day of month

    pub fn on_day(self, day: u32) -> Result<Self, CronError> {
        self.single(CronField::DayOfMonth, day)
    }

    pub fn on_days(self, days: &[u32]) -> Result<Self, CronError> {
        self.list(CronField::DayOfMonth, days)
    }

    pub fn day_range(self, start: u32, end: u32) -> Result<Self, CronError> {
        self.range(CronField::DayOfMonth, start, end)
    }

    pub fn every_days(self, n: u32) -> Result<Self, CronError> {
        self.step(CronField::DayOfMonth, n)
    }

    pub fn every_day(self) -> Self {
        self.set(CronField::DayOfMonth, WILDCARD.to_string())
    }

    // Month

    pub fn in_month(self, month: u32) -> Result<Self, CronError> {
        self.single(CronField::Month, month)
    }

    pub fn in_months(self, months: &[u32]) -> Result<Self, CronError> {
        self.list(CronField::Month, months)
    }

    pub fn month_range(self, start: u32, end: u32) -> Result<Self, CronError> {
        self.range(CronField::Month, start, end)
    }

    pub fn every_months(self, n: u32) -> Result<Self, CronError> {
        self.step(CronField::Month, n)
    }

    pub fn every_month(self) -> Self {
        self.set(CronField::Month, WILDCARD.to_string())
    }

    // Day of week, Sunday = 0

    pub fn on_day_of_week(self, day: u32) -> Result<Self, CronError> {
        self.single(CronField::DayOfWeek, day)
    }

    pub fn on_weekday(self, day: Weekday) -> Self {
        self.set(CronField::DayOfWeek, day.num_days_from_sunday().to_string())
    }

    pub fn on_days_of_week(self, days: &[u32]) -> Result<Self, CronError> {
        self.list(CronField::DayOfWeek, days)
    }

    pub fn day_of_week_range(self, start: u32, end: u32) -> Result<Self, CronError> {
        self.range(CronField::DayOfWeek, start, end)
    }

    pub fn every_days_of_week(self, n: u32) -> Result<Self, CronError> {
        self.step(CronField::DayOfWeek, n)
    }

    pub fn any_day_of_week(self) -> Self {
        self.set(CronField::DayOfWeek, WILDCARD.to_string())
    }

    // Shortcuts

    /// Every hour at `minute`.
    pub fn hourly(self, minute: u32) -> Result<Self, CronError> {
        Ok(self.at_minute(minute)?.every_hour())
    }

    pub fn daily(self, hour: u32, minute: u32) -> Result<Self, CronError> {
        self.at_minute(minute)?.at_hour(hour)
    }

    pub fn weekly(self, day: Weekday, hour: u32, minute: u32) -> Result<Self, CronError> {
        Ok(self.daily(hour, minute)?.on_weekday(day))
    }

    pub fn monthly(self, day: u32, hour: u32, minute: u32) -> Result<Self, CronError> {
        self.daily(hour, minute)?.on_day(day)
    }

    pub fn yearly(self, month: u32, day: u32, hour: u32, minute: u32) -> Result<Self, CronError> {
        self.monthly(day, hour, minute)?.in_month(month)
    }

    /// Midnight, Monday to Friday.
    pub fn weekdays(self) -> Self {
        self.midnight().set(CronField::DayOfWeek, "1-5".to_string())
    }

    /// Midnight, Saturday and Sunday.
    pub fn weekends(self) -> Self {
        self.midnight().set(CronField::DayOfWeek, "0,6".to_string())
    }

    /// The `occurrence`-th `day` of the month, e.g. the second Tuesday (`2#2`).
    pub fn on_nth_day_of_week(self, day: Weekday, occurrence: u32) -> Result<Self, CronError> {
        if !(1..=5).contains(&occurrence) {
            return Err(CronError::InvalidOccurrence(occurrence));
        }
        let value = format!("{}#{}", day.num_days_from_sunday(), occurrence);
        Ok(self.set(CronField::DayOfWeek, value))
    }

    /// Last day of the month (`L`).
    pub fn last_day_of_month(self) -> Self {
        self.set(CronField::DayOfMonth, "L".to_string())
    }

    /// Last given weekday of the month, e.g. the last Friday (`5L`).
    pub fn last_day_of_week(self, day: Weekday) -> Self {
        self.set(CronField::DayOfWeek, format!("{}L", day.num_days_from_sunday()))
    }

    fn midnight(self) -> Self {
        self.set(CronField::Minute, "0".to_string())
            .set(CronField::Hour, "0".to_string())
    }
}

impl fmt::Display for CronExpressionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}

/// Common cron schedule presets.
pub mod presets {
    /// Every minute.
    pub const EVERY_MINUTE: &str = "* * * * *";

    /// Every 5 minutes.
    pub const EVERY_5_MINUTES: &str = "*/5 * * * *";

    /// Every 15 minutes.
    pub const EVERY_15_MINUTES: &str = "*/15 * * * *";

    /// Every hour on the hour.
    pub const EVERY_HOUR: &str = "0 * * * *";

    /// Every day at midnight.
    pub const DAILY_MIDNIGHT: &str = "0 0 * * *";

    /// Every Sunday at midnight.
    pub const WEEKLY_SUNDAY: &str = "0 0 * * 0";

    /// First day of each month at midnight.
    pub const MONTHLY_FIRST: &str = "0 0 1 * *";
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
