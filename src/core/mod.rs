// src/core/mod.rs

//! The central module containing the protocol and lock logic of dilo.

pub mod errors;
pub mod lock;
pub mod protocol;

pub use errors::DiloError;
pub use protocol::{Command, RespFrame};
