//! Connection Pool
//!
//! Hands out long-lived connections and takes them back, keeping a bounded
//! free-list of idle ones. There is no background sweeper: expiry and
//! liveness are checked lazily whenever an idle connection is taken out.

use crate::config::PoolConfig;
use crate::domain::ports::{Connection, ConnectionFactory};
use crate::domain::value_objects::ConnectionState;
use crossbeam_queue::ArrayQueue;
use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;

type FreeList<C> = ArrayQueue<PooledConnection<C>>;

/// Lock-guarded pool state. The lock is only held for the free-list
/// swap and the id increment, never across handle I/O.
struct PoolState<C> {
    /// `None` once the pool has been closed
    free_list: Option<Arc<FreeList<C>>>,
    closed: bool,
    next_id: u64,
}

/// State shared between a pool and the connections it hands out.
struct Shared<C> {
    addr: String,
    capacity: usize,
    idle_timeout: Duration,
    ttl: Duration,
    state: Mutex<PoolState<C>>,
}

/// Why an idle connection was not reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Eviction {
    Expired,
    IdleTimeout,
    NotReady(ConnectionState),
}

impl std::fmt::Display for Eviction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Eviction::Expired => write!(f, "ttl exceeded"),
            Eviction::IdleTimeout => write!(f, "idle timeout exceeded"),
            Eviction::NotReady(state) => write!(f, "handle not ready ({})", state),
        }
    }
}

impl<C: Connection> Shared<C> {
    fn free_list(&self) -> Option<Arc<FreeList<C>>> {
        self.state.lock().free_list.clone()
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn next_id(&self) -> u64 {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        id
    }

    /// Check an idle connection against ttl, idle timeout and liveness, in that order.
    fn eviction_reason(&self, conn: &PooledConnection<C>, now: Instant) -> Option<Eviction> {
        if !self.ttl.is_zero() && now.saturating_duration_since(conn.created_at) >= self.ttl {
            return Some(Eviction::Expired);
        }
        if !self.idle_timeout.is_zero()
            && now.saturating_duration_since(conn.last_used_at) >= self.idle_timeout
        {
            return Some(Eviction::IdleTimeout);
        }
        let state = conn.handle.state();
        if !state.is_ready() {
            return Some(Eviction::NotReady(state));
        }
        None
    }

    async fn put(&self, conn: PooledConnection<C>) -> ReleaseOutcome {
        let Some(free_list) = self.free_list() else {
            conn.close_handle().await;
            return ReleaseOutcome::PoolClosed;
        };
        self.requeue(&free_list, conn).await
    }

    /// Push `conn` into a free-list obtained before the push.
    async fn requeue(&self, free_list: &FreeList<C>, conn: PooledConnection<C>) -> ReleaseOutcome {
        match free_list.push(conn) {
            Ok(()) => {
                // close() may have drained this free-list before the push landed
                if self.is_closed() {
                    drain(free_list).await;
                    return ReleaseOutcome::PoolClosed;
                }
                ReleaseOutcome::Requeued
            }
            Err(conn) => {
                tracing::debug!(
                    "free-list for {} full ({} idle), closing connection {}",
                    self.addr,
                    self.capacity,
                    conn.id
                );
                conn.close_handle().await;
                ReleaseOutcome::PoolFull
            }
        }
    }
}

/// Close every connection left in `free_list`.
async fn drain<C: Connection>(free_list: &FreeList<C>) -> usize {
    let mut drained = 0;
    while let Some(conn) = free_list.pop() {
        conn.close_handle().await;
        drained += 1;
    }
    drained
}

/// Bounded pool of reusable connections to a single address.
///
/// `capacity` bounds how many connections sit idle, not how many are leased:
/// `get` never waits, it reuses an idle connection or asks the factory for a
/// new one. Under load the number of live connections is therefore not
/// limited by the pool. Callers that need a concurrency limit must put one
/// in front of `get` themselves.
///
/// Cloning a `Pool` is cheap; clones share the same free-list.
pub struct Pool<F: ConnectionFactory> {
    factory: Arc<F>,
    shared: Arc<Shared<F::Connection>>,
}

impl<F: ConnectionFactory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            factory: self.factory.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<F: ConnectionFactory> Pool<F> {
    /// Create a new pool. A capacity of zero is raised to one.
    pub fn new(factory: F, config: PoolConfig) -> Self {
        let capacity = config.effective_capacity();
        Self {
            factory: Arc::new(factory),
            shared: Arc::new(Shared {
                addr: config.addr,
                capacity,
                idle_timeout: config.idle_timeout,
                ttl: config.ttl,
                state: Mutex::new(PoolState {
                    free_list: Some(Arc::new(ArrayQueue::new(capacity))),
                    closed: false,
                    next_id: 0,
                }),
            }),
        }
    }

    /// Address passed to the factory.
    pub fn addr(&self) -> &str {
        &self.shared.addr
    }

    /// Maximum number of idle connections retained.
    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Get a ready connection, reusing an idle one when possible.
    ///
    /// Idle connections that are past their ttl, idle for too long or not
    /// ready are closed and skipped. When the free-list runs dry a new
    /// connection is created. Factory errors are returned as-is.
    pub async fn get(&self) -> Result<PooledConnection<F::Connection>, PoolError<F::Error>> {
        let free_list = self.shared.free_list().ok_or(PoolError::Closed)?;

        while let Some(mut conn) = free_list.pop() {
            match self.shared.eviction_reason(&conn, Instant::now()) {
                None => {
                    conn.touch();
                    return Ok(conn);
                }
                Some(reason) => {
                    tracing::debug!(
                        "evicting connection {} to {}: {}",
                        conn.id,
                        self.shared.addr,
                        reason
                    );
                    conn.close_handle().await;
                }
            }
        }

        let handle = self
            .factory
            .connect(&self.shared.addr)
            .await
            .map_err(PoolError::Factory)?;

        let id = self.shared.next_id();
        tracing::debug!("opened connection {} to {}", id, self.shared.addr);

        Ok(PooledConnection::new(handle, id, Arc::downgrade(&self.shared)))
    }

    /// Close the pool and every idle connection.
    ///
    /// Leased connections are not waited for; they are closed when released.
    /// Returns the number of idle connections drained. Calling it again is a
    /// no-op that returns zero.
    pub async fn close(&self) -> usize {
        let free_list = {
            let mut state = self.shared.state.lock();
            state.closed = true;
            state.free_list.take()
        };

        let Some(free_list) = free_list else {
            return 0;
        };

        let drained = drain(&free_list).await;
        tracing::info!(
            "connection pool for {} closed, drained {} idle connections",
            self.shared.addr,
            drained
        );
        drained
    }

    /// Get pool statistics.
    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        PoolStats {
            addr: self.shared.addr.clone(),
            capacity: self.shared.capacity,
            idle: state.free_list.as_ref().map(|f| f.len()).unwrap_or(0),
            created: state.next_id,
            closed: state.closed,
        }
    }
}

/// A connection leased from a [`Pool`].
///
/// Derefs to the underlying handle. Hand it back with [`release`](Self::release)
/// or close it with [`discard`](Self::discard); simply dropping it drops the
/// handle without offering it back to the pool.
pub struct PooledConnection<C> {
    handle: C,
    id: u64,
    created_at: Instant,
    last_used_at: Instant,
    pool: Weak<Shared<C>>,
}

impl<C: Connection> PooledConnection<C> {
    fn new(handle: C, id: u64, pool: Weak<Shared<C>>) -> Self {
        let now = Instant::now();
        Self {
            handle,
            id,
            created_at: now,
            last_used_at: now,
            pool,
        }
    }

    /// Identifier unique within the owning pool's lifetime.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// When the underlying connection was created.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// When this connection was last handed out.
    pub fn last_used_at(&self) -> Instant {
        self.last_used_at
    }

    /// Borrow the underlying handle.
    pub fn get_ref(&self) -> &C {
        &self.handle
    }

    /// Mutably borrow the underlying handle.
    pub fn get_mut(&mut self) -> &mut C {
        &mut self.handle
    }

    /// Detach the handle from the pool.
    pub fn into_inner(self) -> C {
        self.handle
    }

    /// Return the connection to its pool.
    ///
    /// Never fails and never blocks on pool space: if the pool is closed or
    /// its free-list is full the handle is closed instead.
    pub async fn release(self) -> ReleaseOutcome {
        match self.pool.upgrade() {
            Some(shared) => shared.put(self).await,
            None => {
                self.close_handle().await;
                ReleaseOutcome::PoolClosed
            }
        }
    }

    /// Close the connection without returning it to the pool.
    pub async fn discard(self) {
        tracing::debug!("discarding connection {}", self.id);
        self.close_handle().await;
    }

    fn touch(&mut self) {
        self.last_used_at = Instant::now();
    }

    async fn close_handle(mut self) {
        if let Err(e) = self.handle.close().await {
            tracing::warn!("failed to close connection {}: {}", self.id, e);
        }
    }
}

impl<C> Deref for PooledConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.handle
    }
}

impl<C> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.handle
    }
}

impl<C: std::fmt::Debug> std::fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("last_used_at", &self.last_used_at)
            .field("handle", &self.handle)
            .finish()
    }
}

/// What happened to a connection handed to [`PooledConnection::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Back in the free-list, available for reuse
    Requeued,
    /// Free-list already at capacity; the handle was closed
    PoolFull,
    /// Pool closed (or dropped); the handle was closed
    PoolClosed,
}

/// Pool statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolStats {
    /// Address connections are opened to
    pub addr: String,
    /// Idle retention ceiling
    pub capacity: usize,
    /// Connections currently idle in the free-list
    pub idle: usize,
    /// Connections created so far
    pub created: u64,
    /// Whether the pool has been closed
    pub closed: bool,
}

/// Pool errors.
#[derive(Debug, thiserror::Error)]
pub enum PoolError<E: std::error::Error + 'static> {
    /// `get` was called after `close`
    #[error("connection pool is closed")]
    Closed,
    /// The factory failed to create a connection
    #[error(transparent)]
    Factory(E),
}
