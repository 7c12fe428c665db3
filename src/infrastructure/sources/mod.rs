//! Concrete marketplace sources

pub mod ozon;
