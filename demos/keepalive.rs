//! # Keep-alive Example
//!
//! Holds a connection to `host:port` open until Ctrl-C.
//!
//! Demonstrates:
//! - Wiring a durable `FileStore` (backoff and started flag survive restarts)
//! - Rendering runtime events through `LogWriter`
//! - Recovering the previous run's state, then starting
//!
//! ## Run
//! Runnable examples live under `demos/`; Cargo registers this one as `keepalive`.
//!
//! ```bash
//! # terminal 1: a peer that echoes everything back
//! ncat -l -k 50000 --exec /bin/cat
//!
//! # terminal 2
//! RUST_LOG=linkvisor=debug cargo run --example keepalive -- 127.0.0.1 50000
//! ```
//!
//! Kill the peer and restart it to watch the backoff grow and reset.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use linkvisor::{Config, Endpoint, FileStore, LogWriter, Subscribe, Supervisor};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("linkvisor=info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "127.0.0.1".to_string());
    let port: u16 = match args.next() {
        Some(p) => p.parse().with_context(|| format!("invalid port {p:?}"))?,
        None => 50000,
    };

    let cfg = Config {
        endpoint: Endpoint::new(host, port),
        keep_alive_interval: Duration::from_secs(30),
        ..Config::default()
    };

    let state = std::env::temp_dir().join("linkvisor-keepalive.json");
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    let sup = Supervisor::builder(cfg)
        .with_store(Arc::new(FileStore::new(&state)))
        .with_subscribers(subs)
        .spawn()?;

    println!(" ─► state file: {}", state.display());
    sup.recover_from_prior_state().await?;
    if !sup.status().await?.started {
        sup.start().await?;
    }

    tokio::signal::ctrl_c().await?;
    println!(" ─► stopping...");

    sup.stop().await?;
    sup.shutdown().await?;
    println!("Done");
    Ok(())
}
