//! Cron builder errors.

use thiserror::Error;

use crate::field::CronField;

/// Errors raised while building a cron expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    /// A value is outside the range allowed for its field.
    #[error("{field} value {value} is out of range ({min}-{max})")]
    OutOfRange {
        field: CronField,
        value: u32,
        min: u32,
        max: u32,
    },

    /// Range start is after range end.
    #[error("{field} range {start}-{end} is inverted")]
    InvalidRange { field: CronField, start: u32, end: u32 },

    /// Step of an "every N" expression is zero or larger than the field span.
    #[error("{field} step {step} is invalid")]
    InvalidStep { field: CronField, step: u32 },

    /// A value list was empty.
    #[error("{0} list cannot be empty")]
    EmptyList(CronField),

    /// Occurrence for "nth weekday of month" is outside 1-5.
    #[error("occurrence {0} is out of range (1-5)")]
    InvalidOccurrence(u32),
}
