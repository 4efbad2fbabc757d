//! Meeting alerts for Google Calendar.
//!
//! Each invocation fetches the events starting within the lead time, shows a
//! blocking alert for every occurrence not alerted before, and remembers what
//! it showed so overlapping scheduled runs stay quiet.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::commands::{RunOptions, RunStatus, run_alerts_impl};
pub use application::run_controller::{AlertedOccurrence, RunReport};
pub use domain::models::{AlertEvent, AlertOutcome, OccurrenceKey};
pub use infrastructure::error::InfraError;
