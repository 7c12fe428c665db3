//! Shared components - common types, errors, and metrics

pub mod errors;
pub mod metrics;
pub mod types;
