//! Leave-eligibility and balance-accounting engine.
//!
//! Everything here is synchronous and free of I/O: callers hand in the
//! collections they loaded and persist whatever comes back.

pub mod calendar;
pub mod ledger;
pub mod overlap;
pub mod period;
pub mod report;
pub mod workflow;
