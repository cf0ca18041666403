// src/lib.rs

pub mod config;
pub mod connection;
pub mod core;

// Re-export
pub use crate::connection::Connection;
pub use crate::core::DiloError;
pub use crate::core::lock::RedLock;
