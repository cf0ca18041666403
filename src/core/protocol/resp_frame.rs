// src/core/protocol/resp_frame.rs

//! Implements the RESP (REdis Serialization Protocol) reply frame and the
//! corresponding `Encoder` and `Decoder` for network communication.

use crate::core::errors::DiloError;
use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// The CRLF (Carriage Return, Line Feed) sequence terminating lines in RESP.
pub(crate) const CRLF: &[u8] = b"\r\n";
const CRLF_LEN: usize = 2;

/// Limit recursion so a misbehaving server cannot overflow the decode stack.
const MAX_RECURSION_DEPTH: usize = 64;

/// An enum representing a single reply frame in the RESP protocol.
///
/// `Null` (a bulk string of length -1) and `NullArray` (an array of length -1)
/// are distinct from an empty bulk string or an empty array; both mean
/// "missing/no value" on the server side.
#[derive(Debug, Clone, PartialEq)]
pub enum RespFrame {
    SimpleString(Bytes),
    Error(String),
    Integer(i64),
    BulkString(Bytes),
    Null,
    NullArray,
    Array(Vec<RespFrame>),
}

impl RespFrame {
    /// Returns the message of the first `Error` frame found in this frame,
    /// searching arrays recursively. An error nested anywhere inside an array
    /// aborts the whole reply rather than becoming one array element.
    ///
    /// The scan runs only after the enclosing frame has been decoded in full,
    /// so the error is raised with the stream position already past the frame
    /// and the connection stays usable. A stricter reading would fail at the
    /// error element itself without waiting for the rest of the array; that
    /// variant leaves the remaining elements unconsumed on the stream, which
    /// is why it is not done here.
    pub fn first_error(&self) -> Option<&str> {
        match self {
            RespFrame::Error(msg) => Some(msg),
            RespFrame::Array(items) => items.iter().find_map(RespFrame::first_error),
            _ => None,
        }
    }

    /// True for the two `-1`-length "missing value" frames.
    pub fn is_null(&self) -> bool {
        matches!(self, RespFrame::Null | RespFrame::NullArray)
    }
}

/// A `tokio_util::codec` implementation for encoding and decoding `RespFrame`s.
///
/// Decoding is incremental: `decode` returns `Ok(None)` until the buffer holds
/// one complete frame, and consumes exactly that frame when it does.
#[derive(Debug, Default)]
pub struct RespCodec;

impl Encoder<RespFrame> for RespCodec {
    type Error = DiloError;

    fn encode(&mut self, item: RespFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            RespFrame::SimpleString(s) => {
                dst.extend_from_slice(b"+");
                dst.extend_from_slice(&s);
                dst.extend_from_slice(CRLF);
            }
            RespFrame::Error(msg) => {
                dst.extend_from_slice(b"-");
                dst.extend_from_slice(msg.as_bytes());
                dst.extend_from_slice(CRLF);
            }
            RespFrame::Integer(i) => {
                dst.extend_from_slice(b":");
                dst.extend_from_slice(i.to_string().as_bytes());
                dst.extend_from_slice(CRLF);
            }
            RespFrame::BulkString(b) => {
                dst.extend_from_slice(b"$");
                dst.extend_from_slice(b.len().to_string().as_bytes());
                dst.extend_from_slice(CRLF);
                dst.extend_from_slice(&b);
                dst.extend_from_slice(CRLF);
            }
            RespFrame::Null => {
                dst.extend_from_slice(b"$-1\r\n");
            }
            RespFrame::NullArray => {
                dst.extend_from_slice(b"*-1\r\n");
            }
            RespFrame::Array(items) => {
                dst.extend_from_slice(b"*");
                dst.extend_from_slice(items.len().to_string().as_bytes());
                dst.extend_from_slice(CRLF);
                for frame in items {
                    self.encode(frame, dst)?;
                }
            }
        }
        Ok(())
    }
}

impl Decoder for RespCodec {
    type Item = RespFrame;
    type Error = DiloError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut bytes = &src[..];
        match decode_frame(&mut bytes, 0) {
            Ok(frame) => {
                let consumed = src.len() - bytes.len();
                src.advance(consumed);
                Ok(Some(frame))
            }
            // `IncompleteData` means the buffer does not yet hold a whole
            // frame; signal the caller to read more. Everything else is fatal.
            Err(DiloError::IncompleteData) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Decodes one frame from the front of `bytes`, advancing the slice past it.
fn decode_frame(bytes: &mut &[u8], depth: usize) -> Result<RespFrame, DiloError> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(DiloError::ProtocolViolation(
            "RESP recursion depth limit exceeded".to_string(),
        ));
    }

    if bytes.is_empty() {
        return Err(DiloError::IncompleteData);
    }

    let tag = bytes[0];
    *bytes = &bytes[1..];

    match tag {
        b'+' => Ok(RespFrame::SimpleString(Bytes::copy_from_slice(read_line(
            bytes,
        )?))),
        b'-' => {
            let line = read_line(bytes)?;
            Ok(RespFrame::Error(
                String::from_utf8_lossy(line).to_string(),
            ))
        }
        b':' => Ok(RespFrame::Integer(read_i64(bytes)?)),
        b'$' => decode_bulk_string(bytes),
        b'*' => decode_array(bytes, depth),
        other => Err(DiloError::ProtocolViolation(format!(
            "unexpected leading byte 0x{other:02x}"
        ))),
    }
}

/// Reads bytes up to the next CR and requires the byte after it to be LF.
/// A CR not followed by LF is a protocol violation.
fn read_line<'a>(bytes: &mut &'a [u8]) -> Result<&'a [u8], DiloError> {
    let Some(pos) = bytes.iter().position(|&b| b == b'\r') else {
        return Err(DiloError::IncompleteData);
    };
    let Some(&next) = bytes.get(pos + 1) else {
        return Err(DiloError::IncompleteData);
    };
    if next != b'\n' {
        return Err(DiloError::ProtocolViolation(
            "expected LF after CR".to_string(),
        ));
    }
    let line = &bytes[..pos];
    *bytes = &bytes[pos + CRLF_LEN..];
    Ok(line)
}

/// Reads a CRLF-terminated ASCII integer, used for `:` replies and the
/// length prefix of `$` and `*` replies.
fn read_i64(bytes: &mut &[u8]) -> Result<i64, DiloError> {
    let line = read_line(bytes)?;
    let text = std::str::from_utf8(line)
        .map_err(|_| DiloError::ProtocolViolation("non-ASCII integer field".to_string()))?;
    Ok(text.parse::<i64>()?)
}

fn decode_bulk_string(bytes: &mut &[u8]) -> Result<RespFrame, DiloError> {
    let len = read_i64(bytes)?;
    if len == -1 {
        return Ok(RespFrame::Null);
    }
    let len = usize::try_from(len)
        .map_err(|_| DiloError::ProtocolViolation("negative bulk string length".to_string()))?;

    if bytes.len() < len + CRLF_LEN {
        return Err(DiloError::IncompleteData);
    }
    if &bytes[len..len + CRLF_LEN] != CRLF {
        return Err(DiloError::ProtocolViolation(
            "bulk string payload not terminated by CRLF".to_string(),
        ));
    }

    let data = Bytes::copy_from_slice(&bytes[..len]);
    *bytes = &bytes[len + CRLF_LEN..];
    Ok(RespFrame::BulkString(data))
}

fn decode_array(bytes: &mut &[u8], depth: usize) -> Result<RespFrame, DiloError> {
    let len = read_i64(bytes)?;
    if len == -1 {
        return Ok(RespFrame::NullArray);
    }
    let len = usize::try_from(len)
        .map_err(|_| DiloError::ProtocolViolation("negative array length".to_string()))?;

    // Cap the pre-allocation; the claimed length is untrusted input.
    let mut items = Vec::with_capacity(len.min(1024));
    for _ in 0..len {
        items.push(decode_frame(bytes, depth + 1)?);
    }
    Ok(RespFrame::Array(items))
}
