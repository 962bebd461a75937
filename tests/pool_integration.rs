//! Integration tests for the connection pool over real TCP connections
//!
//! Each test binds an ephemeral listener that accepts and holds streams.

use rpc_connpool::{
    Connection, ConnectionState, Pool, PoolConfig, PoolError, ReleaseOutcome, TcpConnectError,
    TcpConnectionFactory,
};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_test::{assert_err, assert_ok};

/// Start a server that accepts connections and keeps them open
async fn spawn_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    addr
}

fn tcp_pool(config: PoolConfig) -> Pool<TcpConnectionFactory> {
    Pool::new(TcpConnectionFactory::from_config(&config), config)
}

/// capacity=2: three leases, two requeued, the third closed
#[tokio::test]
async fn test_capacity_scenario() {
    let addr = spawn_server().await;
    let pool = tcp_pool(PoolConfig::new(addr.to_string()).capacity(2));

    let a = assert_ok!(pool.get().await);
    let b = assert_ok!(pool.get().await);
    let c = assert_ok!(pool.get().await);
    assert_eq!((a.id(), b.id(), c.id()), (0, 1, 2));
    assert_eq!(pool.stats().idle, 0);

    assert_eq!(a.release().await, ReleaseOutcome::Requeued);
    assert_eq!(b.release().await, ReleaseOutcome::Requeued);
    assert_eq!(c.release().await, ReleaseOutcome::PoolFull);

    let stats = pool.stats();
    assert_eq!(stats.idle, 2);
    assert_eq!(stats.created, 3);
}

/// Released connections are handed out again over the same socket
#[tokio::test]
async fn test_reuses_same_socket() {
    let addr = spawn_server().await;
    let pool = tcp_pool(PoolConfig::new(addr.to_string()));

    let conn = assert_ok!(pool.get().await);
    let local = conn.stream().local_addr().unwrap();
    assert_eq!(conn.peer_addr(), addr);
    conn.release().await;

    let conn = assert_ok!(pool.get().await);
    assert_eq!(conn.id(), 0);
    assert_eq!(conn.stream().local_addr().unwrap(), local);
    assert_eq!(pool.stats().created, 1);
}

/// capacity=1, ttl=50ms: after 60ms the idle connection is replaced
#[tokio::test]
async fn test_ttl_scenario() {
    let addr = spawn_server().await;
    let pool = tcp_pool(
        PoolConfig::new(addr.to_string())
            .capacity(1)
            .ttl(Duration::from_millis(50)),
    );

    let conn = assert_ok!(pool.get().await);
    assert_eq!(conn.id(), 0);
    assert_eq!(conn.release().await, ReleaseOutcome::Requeued);

    tokio::time::sleep(Duration::from_millis(60)).await;

    let conn = assert_ok!(pool.get().await);
    assert_eq!(conn.id(), 1);
    assert_eq!(pool.stats().idle, 0);
}

/// Idle connections past the idle timeout are not reused
#[tokio::test]
async fn test_idle_timeout_scenario() {
    let addr = spawn_server().await;
    let pool = tcp_pool(PoolConfig::new(addr.to_string()).idle_timeout(Duration::from_millis(30)));

    assert_ok!(pool.get().await).release().await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(assert_ok!(pool.get().await).id(), 1);
}

/// A handle closed by the caller is not ready and gets replaced
#[tokio::test]
async fn test_closed_handle_replaced() {
    let addr = spawn_server().await;
    let pool = tcp_pool(PoolConfig::new(addr.to_string()));

    let mut conn = assert_ok!(pool.get().await);
    assert_ok!(conn.close().await);
    assert_eq!(conn.state(), ConnectionState::Shutdown);
    conn.release().await;

    let conn = assert_ok!(pool.get().await);
    assert_eq!(conn.id(), 1);
    assert_eq!(conn.state(), ConnectionState::Ready);
}

/// A connection whose peer hung up is not handed out again
#[tokio::test]
async fn test_peer_closed_connection_replaced() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Accept and immediately drop every stream
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });

    let pool = tcp_pool(PoolConfig::new(addr.to_string()));

    let conn = assert_ok!(pool.get().await);
    for _ in 0..100 {
        if conn.state() != ConnectionState::Ready {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(conn.state(), ConnectionState::Shutdown);
    assert_eq!(conn.release().await, ReleaseOutcome::Requeued);

    let conn = assert_ok!(pool.get().await);
    assert_eq!(conn.id(), 1);
    assert_eq!(pool.stats().created, 2);
}

/// After close every get fails and every release closes the handle
#[tokio::test]
async fn test_post_close_semantics() {
    let addr = spawn_server().await;
    let pool = tcp_pool(PoolConfig::new(addr.to_string()).capacity(2));

    let leased = assert_ok!(pool.get().await);
    assert_ok!(pool.get().await).release().await;

    assert_eq!(pool.close().await, 1);

    let err = assert_err!(pool.get().await);
    assert!(matches!(err, PoolError::Closed));
    assert_eq!(err.to_string(), "connection pool is closed");

    assert_eq!(leased.release().await, ReleaseOutcome::PoolClosed);
    assert_eq!(pool.stats().idle, 0);
    assert_eq!(pool.close().await, 0);
}

/// Dial failures reach the caller unchanged
#[tokio::test]
async fn test_factory_failure_surfaces() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let pool = tcp_pool(PoolConfig::new(addr.to_string()).connect_timeout(Duration::from_secs(1)));

    let err = assert_err!(pool.get().await);
    match err {
        PoolError::Factory(TcpConnectError::Io { addr: failed, .. }) => {
            assert_eq!(failed, addr.to_string());
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(pool.stats().created, 0);
}

/// Concurrent gets never block and never share an id
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_gets_distinct_ids() {
    let addr = spawn_server().await;
    let pool = tcp_pool(PoolConfig::new(addr.to_string()).capacity(4));

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move { pool.get().await.unwrap() })
        })
        .collect();

    let conns: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let ids: HashSet<u64> = conns.iter().map(|c| c.id()).collect();
    assert_eq!(ids.len(), 16);

    let releases: Vec<_> = conns.into_iter().map(|c| tokio::spawn(c.release())).collect();
    futures::future::join_all(releases).await;
    assert_eq!(pool.stats().idle, 4);

    assert_eq!(pool.close().await, 4);
}
