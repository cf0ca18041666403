// src/main.rs

//! A small demonstration binary: acquire a named lock, hold it for a while,
//! release it. Useful for poking at a live server:
//!
//! `dilo --addr 127.0.0.1:6379 --name job1 --amount 2 --timeout-ms 500 --hold-ms 2000`

use anyhow::Result;
use dilo::config::ClientConfig;
use dilo::{Connection, RedLock};
use std::env;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::filter::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("dilo version {VERSION}");
        return Ok(());
    }

    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .compact()
        .with_ansi(true)
        .init();

    let mut config = match flag_value(&args, "--config") {
        Some(path) => match ClientConfig::from_file(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load configuration: {e}");
                std::process::exit(1);
            }
        },
        None => ClientConfig::default(),
    };
    if let Some(addr) = flag_value(&args, "--addr") {
        config.addr = addr;
    }

    let name = flag_value(&args, "--name").unwrap_or_else(|| "demo".to_string());
    let amount: i64 = flag_value(&args, "--amount")
        .map(|v| v.parse())
        .transpose()?
        .unwrap_or(1);
    let timeout_ms: u64 = flag_value(&args, "--timeout-ms")
        .map(|v| v.parse())
        .transpose()?
        .unwrap_or(1_000);
    let expires_secs: i64 = flag_value(&args, "--expires-secs")
        .map(|v| v.parse())
        .transpose()?
        .unwrap_or(0);
    let hold_ms: u64 = flag_value(&args, "--hold-ms")
        .map(|v| v.parse())
        .transpose()?
        .unwrap_or(1_000);

    let mut conn = Connection::connect(&config).await?;
    conn.ping().await?;
    info!(addr = %config.addr, "connected");

    let mut lock = RedLock::new(&name, amount, timeout_ms, false, true, expires_secs)?;
    if lock.acquire(&mut conn).await? {
        info!(lock = %name, hold_ms, "lock acquired, holding");
        tokio::time::sleep(Duration::from_millis(hold_ms)).await;
        lock.release(&mut conn).await?;
        info!(lock = %name, "lock released");
    } else {
        warn!(lock = %name, "lock not acquired within the timeout");
    }

    Ok(())
}
