// src/core/lock/mod.rs

//! The counting, auto-expiring distributed lock and the command-execution
//! capability it is built on.

mod executor;
mod redlock;

pub use executor::CommandExecutor;
pub use redlock::RedLock;
