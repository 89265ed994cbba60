//! The five cron fields and their value ranges.

use std::fmt;

use crate::error::CronError;

/// One of the five fields of a cron expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CronField {
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

impl CronField {
    /// Inclusive bounds accepted by the field. Day-of-week counts from Sunday = 0.
    pub fn bounds(self) -> (u32, u32) {
        match self {
            CronField::Minute => (0, 59),
            CronField::Hour => (0, 23),
            CronField::DayOfMonth => (1, 31),
            CronField::Month => (1, 12),
            CronField::DayOfWeek => (0, 6),
        }
    }

    /// Check a single value against the field bounds.
    pub fn check(self, value: u32) -> Result<u32, CronError> {
        let (min, max) = self.bounds();
        if value < min || value > max {
            return Err(CronError::OutOfRange {
                field: self,
                value,
                min,
                max,
            });
        }
        Ok(value)
    }

    /// Render `start-end` after checking both ends.
    pub(crate) fn range(self, start: u32, end: u32) -> Result<String, CronError> {
        self.check(start)?;
        self.check(end)?;
        if start > end {
            return Err(CronError::InvalidRange {
                field: self,
                start,
                end,
            });
        }
        Ok(format!("{}-{}", start, end))
    }

    /// Render a comma separated list after checking every value.
    pub(crate) fn list(self, values: &[u32]) -> Result<String, CronError> {
        if values.is_empty() {
            return Err(CronError::EmptyList(self));
        }
        let rendered = values
            .iter()
            .map(|v| self.check(*v).map(|v| v.to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rendered.join(","))
    }

    /// Render `*/step`.
    pub(crate) fn step(self, step: u32) -> Result<String, CronError> {
        let (min, max) = self.bounds();
        if step == 0 || step > max - min + 1 {
            return Err(CronError::InvalidStep { field: self, step });
        }
        Ok(format!("*/{}", step))
    }
}

impl fmt::Display for CronField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CronField::Minute => "minute",
            CronField::Hour => "hour",
            CronField::DayOfMonth => "day-of-month",
            CronField::Month => "month",
            CronField::DayOfWeek => "day-of-week",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds() {
        assert_eq!(CronField::Minute.bounds(), (0, 59));
        assert_eq!(CronField::DayOfMonth.bounds(), (1, 31));
        assert_eq!(CronField::DayOfWeek.bounds(), (0, 6));
    }

    #[test]
    fn test_check() {
        assert_eq!(CronField::Hour.check(23), Ok(23));
        assert!(matches!(
            CronField::Hour.check(24),
            Err(CronError::OutOfRange { field: CronField::Hour, value: 24, .. })
        ));
        assert!(CronField::Month.check(0).is_err());
    }

    #[test]
    fn test_step_bounds() {
        assert_eq!(CronField::Minute.step(15).unwrap(), "*/15");
        assert!(CronField::Minute.step(0).is_err());
        assert!(CronField::Month.step(13).is_err());
        assert_eq!(CronField::Month.step(12).unwrap(), "*/12");
    }

    #[test]
    fn test_display() {
        assert_eq!(CronField::DayOfMonth.to_string(), "day-of-month");
    }
}
