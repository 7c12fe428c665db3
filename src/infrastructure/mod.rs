//! Infrastructure layer - HTTP, storage, and delivery adapters

pub mod parsing;
pub mod rate_limiter;
pub mod sources;
pub mod storage;
pub mod telegram;
