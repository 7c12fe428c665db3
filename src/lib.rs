//! PriceWatcher - background price monitoring for marketplace products
//! Built with Domain-Driven Design principles

pub mod app;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;

// Re-export main types for convenience
pub use application::notifications::NotificationService;
pub use application::queue::CheckQueue;
pub use application::retention::RetentionWorker;
pub use application::scheduler::CheckScheduler;
pub use application::worker::CheckWorker;
pub use domain::check::decide;
pub use domain::storage::Storage;
