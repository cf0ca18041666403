// src/core/protocol/command.rs

//! The request model: an ordered sequence of arguments encoded as a RESP
//! array. Every request the client sends is built through this type.

use crate::core::errors::DiloError;
use crate::core::protocol::resp_frame::CRLF;
use bytes::{Bytes, BytesMut};

/// One element of a request.
///
/// The closed set of variants enforces the protocol's construction rule:
/// anything that is not a byte sequence, an integer, or a flat list of byte
/// sequences cannot become part of a command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandArg {
    /// A binary-safe argument, sent as a RESP bulk string.
    Bulk(Bytes),
    /// An integer argument, sent as a RESP integer.
    Int(i64),
    /// A list of keys, flattened in place: each key contributes one bulk
    /// string of its own to the encoded array.
    Keys(Vec<Bytes>),
}

impl From<&str> for CommandArg {
    fn from(s: &str) -> Self {
        // UTF-8 is the only text encoding on the wire.
        CommandArg::Bulk(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for CommandArg {
    fn from(s: String) -> Self {
        CommandArg::Bulk(Bytes::from(s.into_bytes()))
    }
}

impl From<Bytes> for CommandArg {
    fn from(b: Bytes) -> Self {
        CommandArg::Bulk(b)
    }
}

impl From<Vec<u8>> for CommandArg {
    fn from(b: Vec<u8>) -> Self {
        CommandArg::Bulk(Bytes::from(b))
    }
}

impl From<i64> for CommandArg {
    fn from(i: i64) -> Self {
        CommandArg::Int(i)
    }
}

impl From<Vec<Bytes>> for CommandArg {
    fn from(keys: Vec<Bytes>) -> Self {
        CommandArg::Keys(keys)
    }
}

/// One server request, built fluently:
/// `Command::new("BRPOPLPUSH").arg(src).arg(dst).arg("0.2")`.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    args: Vec<CommandArg>,
}

impl Command {
    /// Starts a command with its name.
    pub fn new(name: impl Into<CommandArg>) -> Self {
        Self {
            args: vec![name.into()],
        }
    }

    /// Builds a command from already-constructed arguments.
    pub fn from_args(args: Vec<CommandArg>) -> Self {
        Self { args }
    }

    /// Appends one argument, returning `self` for chaining.
    pub fn arg(mut self, arg: impl Into<CommandArg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// The arguments as constructed (key lists not yet flattened).
    pub fn args(&self) -> &[CommandArg] {
        &self.args
    }

    /// The number of top-level elements the encoded array will carry. A
    /// `Keys` list counts once per key, not once per list.
    fn wire_arity(&self) -> usize {
        self.args
            .iter()
            .map(|arg| match arg {
                CommandArg::Keys(keys) => keys.len(),
                _ => 1,
            })
            .sum()
    }

    /// Encodes the command as a RESP array into `dst`.
    ///
    /// Construction problems (an empty command) are reported before any byte
    /// is written, so no partial request ever reaches the socket from here.
    pub fn encode_into(&self, dst: &mut BytesMut) -> Result<(), DiloError> {
        if self.args.is_empty() {
            return Err(DiloError::InvalidRequest(
                "a command needs at least a name".to_string(),
            ));
        }

        dst.extend_from_slice(b"*");
        dst.extend_from_slice(self.wire_arity().to_string().as_bytes());
        dst.extend_from_slice(CRLF);

        for arg in &self.args {
            match arg {
                CommandArg::Bulk(value) => write_bulk(dst, value),
                CommandArg::Int(value) => {
                    dst.extend_from_slice(b":");
                    dst.extend_from_slice(value.to_string().as_bytes());
                    dst.extend_from_slice(CRLF);
                }
                CommandArg::Keys(keys) => {
                    for key in keys {
                        write_bulk(dst, key);
                    }
                }
            }
        }
        Ok(())
    }
}

fn write_bulk(dst: &mut BytesMut, value: &[u8]) {
    dst.extend_from_slice(b"$");
    dst.extend_from_slice(value.len().to_string().as_bytes());
    dst.extend_from_slice(CRLF);
    dst.extend_from_slice(value);
    dst.extend_from_slice(CRLF);
}
