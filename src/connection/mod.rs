// src/connection/mod.rs

//! Owns one duplex byte stream and speaks the RESP protocol over it:
//! synchronous request/response via [`Connection::call`] and batched
//! request/response via [`Connection::pipeline`].

use crate::config::ClientConfig;
use crate::core::errors::DiloError;
use crate::core::protocol::{Command, RespCodec, RespFrame};
use bytes::{Bytes, BytesMut};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_util::codec::Decoder;

/// Default size of each of the independent input and output buffers.
pub const DEFAULT_BUFFER_SIZE: usize = 1 << 16;

/// A single client connection.
///
/// The connection is single-stream and single-outstanding-request for `call`;
/// a [`Pipeline`] is the only way to have several requests in flight, and it
/// borrows the connection exclusively for its whole lifetime. There is no
/// internal locking: callers (typically a pool) hand one connection to one
/// concurrent caller at a time.
///
/// The connection never closes the transport itself; destruction is the
/// owning pool's job, informed by [`Connection::created_at`] and
/// [`Connection::last_used_at`].
#[derive(Debug)]
pub struct Connection<S> {
    stream: S,
    codec: RespCodec,
    read_buf: BytesMut,
    write_buf: BytesMut,
    created_at: Instant,
    last_used_at: Instant,
}

impl Connection<TcpStream> {
    /// Connects to the configured address with the configured timeout.
    pub async fn connect(config: &ClientConfig) -> Result<Self, DiloError> {
        let connect_timeout = Duration::from_millis(config.connect_timeout_ms);
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&config.addr))
            .await
            .map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connect to {} timed out", config.addr),
                )
            })??;
        Ok(Self::with_buffer_sizes(
            stream,
            config.read_buffer_size,
            config.write_buffer_size,
        ))
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    /// Wraps an already-established transport with default buffer sizes.
    pub fn new(stream: S) -> Self {
        Self::with_buffer_sizes(stream, DEFAULT_BUFFER_SIZE, DEFAULT_BUFFER_SIZE)
    }

    /// Wraps an already-established transport with explicit buffer sizes.
    pub fn with_buffer_sizes(stream: S, read_buffer: usize, write_buffer: usize) -> Self {
        let now = Instant::now();
        Self {
            stream,
            codec: RespCodec,
            read_buf: BytesMut::with_capacity(read_buffer),
            write_buf: BytesMut::with_capacity(write_buffer),
            created_at: now,
            last_used_at: now,
        }
    }

    /// When this connection was established.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// When this connection last wrote a request.
    pub fn last_used_at(&self) -> Instant {
        self.last_used_at
    }

    /// Executes one command and decodes exactly one reply.
    ///
    /// `Ok(None)` means the server closed the stream cleanly at a frame
    /// boundary. A server `-` error reply (top-level or nested inside an
    /// array) is surfaced as [`DiloError::ServerError`] after the full frame
    /// has been consumed, so the connection remains usable afterwards.
    /// Transport errors are surfaced unmodified and never retried here.
    pub async fn call(&mut self, cmd: &Command) -> Result<Option<RespFrame>, DiloError> {
        cmd.encode_into(&mut self.write_buf)?;
        self.flush().await?;
        match self.read_frame().await? {
            Some(frame) => {
                if let Some(msg) = frame.first_error() {
                    return Err(DiloError::ServerError(msg.to_string()));
                }
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }

    /// Starts a pipeline: commands are written (unflushed) as they are
    /// enqueued, and all replies are read in FIFO order by
    /// [`Pipeline::collect`].
    pub fn pipeline(&mut self) -> Pipeline<'_, S> {
        Pipeline {
            conn: self,
            pending: 0,
        }
    }

    /// Sends `PING` and expects a simple-string acknowledgement back.
    pub async fn ping(&mut self) -> Result<Bytes, DiloError> {
        match self.call(&Command::new("PING")).await? {
            Some(RespFrame::SimpleString(s)) => Ok(s),
            other => Err(DiloError::ProtocolViolation(format!(
                "unexpected PING reply: {other:?}"
            ))),
        }
    }

    /// Writes out everything buffered so far and flushes the transport.
    async fn flush(&mut self) -> Result<(), DiloError> {
        self.stream.write_all(&self.write_buf).await?;
        self.write_buf.clear();
        self.stream.flush().await?;
        self.last_used_at = Instant::now();
        Ok(())
    }

    /// Reads one complete frame, pulling more bytes from the transport as
    /// needed.
    ///
    /// End-of-stream at a frame boundary returns `Ok(None)` (the server
    /// closed cleanly between replies). End-of-stream in the middle of a
    /// frame is a protocol violation rather than a silent truncation.
    pub async fn read_frame(&mut self) -> Result<Option<RespFrame>, DiloError> {
        loop {
            if let Some(frame) = self.codec.decode(&mut self.read_buf)? {
                return Ok(Some(frame));
            }

            let n = self.stream.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                if self.read_buf.is_empty() {
                    return Ok(None);
                }
                return Err(DiloError::ProtocolViolation(
                    "stream ended inside a frame".to_string(),
                ));
            }
        }
    }
}

/// A pipelining cursor: write N requests, then read exactly N replies.
///
/// Replies are paired to requests positionally, by count; the server contract
/// guarantees one top-level reply per request. A pipeline belongs to the one
/// connection that issued it and cannot be shared across callers.
#[derive(Debug)]
pub struct Pipeline<'a, S> {
    conn: &'a mut Connection<S>,
    pending: usize,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Pipeline<'_, S> {
    /// Encodes and buffers one command without flushing.
    pub fn enqueue(&mut self, cmd: &Command) -> Result<&mut Self, DiloError> {
        cmd.encode_into(&mut self.conn.write_buf)?;
        self.pending += 1;
        Ok(self)
    }

    /// Flushes once, then decodes as many replies as were enqueued, in
    /// submission order.
    ///
    /// A clean end-of-stream mid-pipeline fills the remaining slots with
    /// `None`. If any reply carries a server error, the whole batch fails
    /// with [`DiloError::ServerError`] after every frame has been consumed,
    /// keeping the stream position aligned.
    pub async fn collect(self) -> Result<Vec<Option<RespFrame>>, DiloError> {
        self.conn.flush().await?;

        let mut replies = Vec::with_capacity(self.pending);
        let mut closed = false;
        for _ in 0..self.pending {
            if closed {
                replies.push(None);
                continue;
            }
            match self.conn.read_frame().await? {
                Some(frame) => replies.push(Some(frame)),
                None => {
                    closed = true;
                    replies.push(None);
                }
            }
        }

        for frame in replies.iter().flatten() {
            if let Some(msg) = frame.first_error() {
                return Err(DiloError::ServerError(msg.to_string()));
            }
        }
        Ok(replies)
    }

    /// Number of requests written so far.
    pub fn pending(&self) -> usize {
        self.pending
    }
}
