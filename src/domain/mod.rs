//! Domain layer - core business logic and entities

pub mod check;
pub mod item;
pub mod notify;
pub mod source;
pub mod storage;
