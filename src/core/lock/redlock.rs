// src/core/lock/redlock.rs

//! A bounded-capacity, auto-expiring distributed lock built entirely from
//! primitive server commands.
//!
//! Capacity is modeled as timestamp tokens in two server-side lists: the
//! "open" list holds available tokens, the "close" list holds tokens in use.
//! Acquire and release are list rotations executed atomically by the server
//! (`BRPOPLPUSH` / `RPOPLPUSH`), and a reconciliation script keeps the total
//! token count pinned to `amount` even after the close list expires away
//! under a crashed holder.

use crate::core::errors::DiloError;
use crate::core::lock::CommandExecutor;
use crate::core::protocol::Command;
use tracing::{error, info};

/// Namespace prefix for the lock's keys, so distinct lock names (and other
/// keyspace users) never collide.
const KEY_PREFIX: &str = "dilo:";

/// Expiry applied when the caller passes a non-positive value, in seconds.
const DEFAULT_EXPIRES_SECS: i64 = 600;

/// Re-arms the close list's TTL to the remaining lifetime of its oldest
/// token. Run after a failed acquire, because the pipelined `EXPIRE` of the
/// acquire attempt has just extended a TTL that belongs to some earlier
/// successful holder. KEYS[1] is the close list, ARGV[1] the full expiry.
const CORRECT_EXPIRY_SCRIPT: &str = "local ltime = redis.call('lrange', KEYS[1], 0, 0); \
     if ltime[1] ~= nil then \
     local lock_remain_time = ARGV[1] - (redis.call('time')[1] - ltime[1]); \
     if lock_remain_time > 0 then \
     redis.call('expire', KEYS[1], lock_remain_time); \
     end end";

/// One lock instance models one critical-section attempt; it is not shared
/// between threads. All real mutual exclusion happens server-side.
#[derive(Debug)]
pub struct RedLock {
    name: String,
    amount: i64,
    timeout_ms: u64,
    expires_secs: i64,
    throw_on_timeout: bool,
    log_on_timeout: bool,
    held: bool,
    open_key: String,
    close_key: String,
}

impl RedLock {
    /// Validates the parameters and derives the lock's key names.
    ///
    /// `expires_secs <= 0` falls back to 600 seconds; everything else that is
    /// out of range is a construction error raised before any I/O.
    pub fn new(
        name: &str,
        amount: i64,
        timeout_ms: u64,
        throw_on_timeout: bool,
        log_on_timeout: bool,
        expires_secs: i64,
    ) -> Result<Self, DiloError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DiloError::InvalidRequest(
                "name is required and cannot be empty".to_string(),
            ));
        }
        if timeout_ms < 10 {
            return Err(DiloError::InvalidRequest(
                "timeout must be at least 0.01 seconds (10ms)".to_string(),
            ));
        }
        if amount < 1 {
            return Err(DiloError::InvalidRequest(format!(
                "amount needs to be at least 1, now it is {amount}"
            )));
        }
        let expires_secs = if expires_secs <= 0 {
            DEFAULT_EXPIRES_SECS
        } else {
            expires_secs
        };

        let prefix = format!("{KEY_PREFIX}{name}:");
        Ok(Self {
            name: name.to_string(),
            amount,
            timeout_ms,
            expires_secs,
            throw_on_timeout,
            log_on_timeout,
            held: false,
            open_key: format!("{prefix}open"),
            close_key: format!("{prefix}close"),
        })
    }

    /// The lock's name as given (trimmed).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True only between a verified successful acquire and the next release.
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// The key of the list holding available tokens.
    pub fn open_key(&self) -> &str {
        &self.open_key
    }

    /// The key of the list holding tokens in use.
    pub fn close_key(&self) -> &str {
        &self.close_key
    }

    /// Tries to acquire one unit of the lock's capacity.
    ///
    /// One pipelined round trip does the whole attempt:
    /// 1. reconcile capacity: if the two lists hold fewer than `amount`
    ///    tokens in total, push a fresh one (the server's clock time) onto
    ///    the open list; if they hold more (the close list expired away and
    ///    came back), delete the open list so the total cannot stay above
    ///    `amount`;
    /// 2. `BRPOPLPUSH` a token from open to close, blocking up to the
    ///    configured timeout;
    /// 3. `EXPIRE` the close list so a crashed holder's token returns to
    ///    circulation via the next reconciliation.
    ///
    /// Step 3 runs whether or not step 2 produced a token; when it did not,
    /// the corrective script rewinds the close list's TTL to the remaining
    /// lifetime of its oldest token, and the timeout is then reported per the
    /// `throw_on_timeout` / `log_on_timeout` flags.
    pub async fn acquire<E>(&mut self, executor: &mut E) -> Result<bool, DiloError>
    where
        E: CommandExecutor + ?Sized,
    {
        self.held = false;

        let attempt = vec![
            Command::new("EVAL")
                .arg(self.reconcile_script())
                .arg("1")
                .arg(self.open_key.as_str())
                .arg(self.close_key.as_str()),
            Command::new("BRPOPLPUSH")
                .arg(self.open_key.as_str())
                .arg(self.close_key.as_str())
                .arg(self.timeout_in_seconds()),
            Command::new("EXPIRE")
                .arg(self.close_key.as_str())
                .arg(self.expires_secs.to_string()),
        ];
        let replies = executor.invoke_all(attempt).await?;

        let token = replies.get(1).and_then(|slot| slot.as_ref());
        if token.is_none_or(|frame| frame.is_null()) {
            return self.handle_timeout(executor).await;
        }

        self.held = true;
        Ok(true)
    }

    /// Returns this instance's token to circulation.
    ///
    /// A no-op (no I/O) unless the instance currently holds the lock. If the
    /// pop finds nothing, the token has already been reclaimed by expiry, so
    /// the outcome the release wanted is already in place; that is reported
    /// informationally, not as an error. The held flag is cleared regardless.
    pub async fn release<E>(&mut self, executor: &mut E) -> Result<(), DiloError>
    where
        E: CommandExecutor + ?Sized,
    {
        if !self.held {
            return Ok(());
        }
        self.held = false;

        let unlock = Command::new("RPOPLPUSH")
            .arg(self.close_key.as_str())
            .arg(self.open_key.as_str());
        let reply = executor.invoke(unlock).await?;

        if reply.as_ref().is_none_or(|frame| frame.is_null()) {
            info!(
                lock = %self.name,
                "could not release the lock, token is not present (already expired)"
            );
        }
        Ok(())
    }

    /// Timeout path of [`RedLock::acquire`]: rewind the close list's TTL,
    /// then report per configuration.
    async fn handle_timeout<E>(&self, executor: &mut E) -> Result<bool, DiloError>
    where
        E: CommandExecutor + ?Sized,
    {
        let correct = Command::new("EVAL")
            .arg(CORRECT_EXPIRY_SCRIPT)
            .arg("1")
            .arg(self.close_key.as_str())
            .arg(self.expires_secs.to_string());
        executor.invoke(correct).await?;

        if self.log_on_timeout {
            error!(
                lock = %self.name,
                timeout_secs = %self.timeout_in_seconds(),
                "reached timeout while waiting for the lock"
            );
        }
        if self.throw_on_timeout {
            return Err(DiloError::LockTimeout {
                name: self.name.clone(),
                seconds: self.timeout_in_seconds(),
            });
        }
        Ok(false)
    }

    /// Keeps `open_len + close_len` pinned to `amount`: tops the open list up
    /// by one fresh token when the total is short, and deletes the open list
    /// when the total overshoots (possible after the close list expired).
    /// KEYS[1] is the open list, ARGV[1] the close list. Never blocks and
    /// never itself grants the lock.
    fn reconcile_script(&self) -> String {
        format!(
            "local open_len = redis.call('llen', KEYS[1]); \
             local close_len = redis.call('llen', ARGV[1]); \
             local time = redis.call('time')[1]; \
             if open_len + close_len < {amount} then redis.call('LPUSH', KEYS[1], time) \
             elseif open_len + close_len > {amount} then redis.call('DEL', KEYS[1]) end",
            amount = self.amount
        )
    }

    /// The blocking-pop timeout as the server expects it: fractional seconds
    /// with centisecond resolution (`250` ms becomes `"0.25"`).
    fn timeout_in_seconds(&self) -> String {
        format!("{}", ((self.timeout_ms / 10) as f64) / 100.0)
    }
}
