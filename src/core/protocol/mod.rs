// src/core/protocol/mod.rs

//! The RESP wire protocol: the request model and the frame codec.

mod command;
mod resp_frame;

pub use command::{Command, CommandArg};
pub use resp_frame::{RespCodec, RespFrame};
