//! Application layer - background workers and orchestration

pub mod notifications;
pub mod queue;
pub mod retention;
pub mod scheduler;
pub mod worker;
