//! connpool-probe - exercise a TCP connection pool against one address
//!
//! Reads the pool configuration from `CONNPOOL_*` variables, then runs a few
//! get/release rounds and logs what the pool did.

use rpc_connpool::{load_config, Pool, TcpConnectionFactory};
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = load_config()?;

    // Setup logging
    let log_level = if std::env::var("DEBUG").is_ok() {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let rounds: usize = std::env::var("CONNPOOL_PROBE_ROUNDS")
        .unwrap_or_else(|_| "3".to_string())
        .parse()
        .unwrap_or(3);

    tracing::info!(
        "probing {} capacity={} idle_timeout={:?} ttl={:?} rounds={}",
        cfg.addr,
        cfg.effective_capacity(),
        cfg.idle_timeout,
        cfg.ttl,
        rounds
    );

    let pool = Pool::new(TcpConnectionFactory::from_config(&cfg), cfg);

    for round in 1..=rounds {
        let conn = pool.get().await?;
        let id = conn.id();
        let peer = conn.peer_addr();
        let outcome = conn.release().await;
        let stats = pool.stats();

        tracing::info!(
            "round {}: connection {} to {} -> {:?} (idle={} created={})",
            round,
            id,
            peer,
            outcome,
            stats.idle,
            stats.created
        );
    }

    pool.close().await;
    Ok(())
}
