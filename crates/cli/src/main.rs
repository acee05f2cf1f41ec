//! # CLI - DriftKV Interactive Shell
//!
//! A REPL-style command-line interface over either storage engine. Reads
//! commands from stdin, executes them against the engine, and prints results
//! to stdout. Designed for both interactive use and scripted testing (pipe
//! commands via stdin). The shell consumes only the shared
//! [`kv::KeyValueStore`] operations, so engine choice is pure configuration.
//!
//! ## Commands
//!
//! ```text
//! SET key value          Insert or update a key-value pair
//! GET key                Look up a key (prints value or "(nil)")
//! DEL key                Delete a key (writes a tombstone)
//! BATCH k=v [k=v ...]    Batch insert; prints the written count
//! SCAN start end [n]     Inclusive range scan, up to n entries (default 1000)
//! COMPACT                Reclaim space held by stale records
//! STATS                  Print engine debug info
//! EXIT / QUIT            Shut down gracefully
//! ```
//!
//! ## Configuration
//!
//! All settings are controlled via environment variables:
//!
//! ```text
//! DRIFTKV_ENGINE       "bitcask" or "lsm"       (default: "bitcask")
//! DRIFTKV_DATA_DIR     data directory            (default: "./data")
//! DRIFTKV_SEGMENT_MB   bitcask segment limit     (default: 128)
//! DRIFTKV_FSYNC_MS     bitcask fsync period      (default: 20, 0 = off)
//! DRIFTKV_MEMTABLE_MB  lsm memtable limit        (default: 16)
//! DRIFTKV_INDEX_EVERY  lsm sparse index stride   (default: 64)
//! ```
//!
//! Logging follows `RUST_LOG` (e.g. `RUST_LOG=debug`).

use anyhow::Result;
use kv::KeyValueStore;
use std::io::{self, BufRead, Write};
use tracing_subscriber::EnvFilter;

/// Reads a configuration value from the environment, falling back to
/// `default`.
fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Either engine, behind one `Debug`-able value. Operations go through
/// [`AnyEngine::as_store`].
#[derive(Debug)]
enum AnyEngine {
    Bitcask(bitcask::Engine),
    Lsm(lsm::Engine),
}

impl AnyEngine {
    fn open_from_env() -> Result<Self> {
        let data_dir = env_or("DRIFTKV_DATA_DIR", "./data");
        match env_or("DRIFTKV_ENGINE", "bitcask").to_lowercase().as_str() {
            "lsm" => {
                let mut config = lsm::Config::new(&data_dir);
                let mb: usize = env_or("DRIFTKV_MEMTABLE_MB", "16").parse().unwrap_or(16);
                config.memtable_byte_limit = mb * 1024 * 1024;
                config.sparse_index_stride =
                    env_or("DRIFTKV_INDEX_EVERY", "64").parse().unwrap_or(64);
                Ok(AnyEngine::Lsm(lsm::Engine::open(config)?))
            }
            _ => {
                let mut config = bitcask::Config::new(&data_dir);
                let mb: u64 = env_or("DRIFTKV_SEGMENT_MB", "128").parse().unwrap_or(128);
                config.segment_byte_limit = mb * 1024 * 1024;
                config.fsync_interval_ms = env_or("DRIFTKV_FSYNC_MS", "20").parse().unwrap_or(20);
                Ok(AnyEngine::Bitcask(bitcask::Engine::open(config)?))
            }
        }
    }

    fn as_store(&self) -> &dyn KeyValueStore {
        match self {
            AnyEngine::Bitcask(engine) => engine,
            AnyEngine::Lsm(engine) => engine,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            AnyEngine::Bitcask(_) => "bitcask",
            AnyEngine::Lsm(_) => "lsm",
        }
    }
}

/// Parses `k=v` pairs for the BATCH command.
fn parse_batch(args: &[&str]) -> Option<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut items = Vec::with_capacity(args.len());
    for pair in args {
        let (k, v) = pair.split_once('=')?;
        items.push((k.as_bytes().to_vec(), v.as_bytes().to_vec()));
    }
    Some(items)
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let engine = AnyEngine::open_from_env()?;
    let store = engine.as_store();
    tracing::info!("engine {} ready", engine.name());

    println!(
        "DriftKV started (engine={}, data_dir={})",
        engine.name(),
        env_or("DRIFTKV_DATA_DIR", "./data")
    );
    println!("Commands: SET key value | GET key | DEL key | BATCH k=v ...");
    println!("          SCAN start end [n] | COMPACT | STATS | EXIT");
    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let parts: Vec<&str> = line.split_whitespace().collect();
        if let Some(cmd) = parts.first() {
            match cmd.to_uppercase().as_str() {
                "SET" => {
                    if parts.len() >= 3 {
                        let value = parts[2..].join(" ");
                        match store.put(parts[1].as_bytes().to_vec(), value.into_bytes()) {
                            Ok(()) => println!("OK"),
                            Err(e) => println!("ERR set failed: {}", e),
                        }
                    } else {
                        println!("ERR usage: SET key value");
                    }
                }
                "GET" => {
                    if let Some(key) = parts.get(1) {
                        match store.read(key.as_bytes()) {
                            Ok(Some(v)) => println!("{}", String::from_utf8_lossy(&v)),
                            Ok(None) => println!("(nil)"),
                            Err(e) => println!("ERR read failed: {}", e),
                        }
                    } else {
                        println!("ERR usage: GET key");
                    }
                }
                "DEL" => {
                    if let Some(key) = parts.get(1) {
                        match store.delete(key.as_bytes()) {
                            Ok(()) => println!("OK"),
                            Err(e) => println!("ERR del failed: {}", e),
                        }
                    } else {
                        println!("ERR usage: DEL key");
                    }
                }
                "BATCH" => match parse_batch(&parts[1..]) {
                    Some(items) if !items.is_empty() => match store.batch_put(items) {
                        Ok(n) => println!("OK ({} written)", n),
                        Err(e) => println!("ERR batch failed: {}", e),
                    },
                    _ => println!("ERR usage: BATCH k=v [k=v ...]"),
                },
                "SCAN" => {
                    if parts.len() >= 3 {
                        let limit: usize =
                            parts.get(3).and_then(|s| s.parse().ok()).unwrap_or(1000);
                        match store.read_range(parts[1].as_bytes(), parts[2].as_bytes(), limit) {
                            Ok(items) if items.is_empty() => println!("(empty)"),
                            Ok(items) => {
                                for (k, v) in &items {
                                    println!(
                                        "{} -> {}",
                                        String::from_utf8_lossy(k),
                                        String::from_utf8_lossy(v)
                                    );
                                }
                                println!("({} entries)", items.len());
                            }
                            Err(e) => println!("ERR scan failed: {}", e),
                        }
                    } else {
                        println!("ERR usage: SCAN start end [n]");
                    }
                }
                "COMPACT" => match store.compact() {
                    Ok(reclaimed) => println!("OK ({} bytes reclaimed)", reclaimed),
                    Err(e) => println!("ERR compact failed: {}", e),
                },
                "STATS" => println!("{:?}", engine),
                "EXIT" | "QUIT" => {
                    store.close()?;
                    println!("bye");
                    break;
                }
                other => println!("unknown command: {}", other),
            }
        }

        print!("> ");
        io::stdout().flush().ok();
    }

    Ok(())
}
