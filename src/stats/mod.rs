//! Run statistics

pub mod metrics;

pub use metrics::{RunStats, RunSummary};
