//! # mediaqueue Cron
//!
//! Fluent construction of five-field cron expressions
//! (`minute hour day-of-month month day-of-week`) for the persisted cron job
//! table. Deciding when an expression is due belongs to the scheduler that
//! reads those rows, not to this crate.
//!
//! ```rust
//! use mediaqueue_cron::CronExpressionBuilder;
//!
//! let expr = CronExpressionBuilder::new().daily(6, 30).unwrap().build();
//! assert_eq!(expr, "30 6 * * *");
//! ```

pub mod builder;
pub mod error;
pub mod field;

pub use builder::{CronExpressionBuilder, presets};
pub use error::CronError;
pub use field::CronField;
