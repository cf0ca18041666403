// src/core/lock/executor.rs

//! The capability the lock protocol depends on: execute a command (or an
//! ordered batch of commands) and get back structured replies.
//!
//! The lock never talks to a transport directly. The host hands it whatever
//! implements this trait, which keeps the protocol testable against scripted
//! executors and independent of any particular connection or pool type.

use crate::connection::Connection;
use crate::core::errors::DiloError;
use crate::core::protocol::{Command, RespFrame};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Executes commands against one server on behalf of a single caller.
///
/// `None` replies mean the server closed the stream cleanly before answering.
#[async_trait]
pub trait CommandExecutor: Send {
    /// Executes one command and returns its reply.
    async fn invoke(&mut self, cmd: Command) -> Result<Option<RespFrame>, DiloError>;

    /// Executes an ordered batch of commands, returning one reply per
    /// command in submission order.
    async fn invoke_all(
        &mut self,
        cmds: Vec<Command>,
    ) -> Result<Vec<Option<RespFrame>>, DiloError>;
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Unpin + Send> CommandExecutor for Connection<S> {
    async fn invoke(&mut self, cmd: Command) -> Result<Option<RespFrame>, DiloError> {
        self.call(&cmd).await
    }

    async fn invoke_all(
        &mut self,
        cmds: Vec<Command>,
    ) -> Result<Vec<Option<RespFrame>>, DiloError> {
        let mut pipe = self.pipeline();
        for cmd in &cmds {
            pipe.enqueue(cmd)?;
        }
        pipe.collect().await
    }
}
