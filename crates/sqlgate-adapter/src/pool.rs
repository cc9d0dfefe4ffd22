//! Per-session connection pooling.
//!
//! Each session owns exactly one pool; the pool owns every connection it
//! ever created. Callers borrow a connection for the duration of one
//! operation and the drop of the guard returns it to the idle list. The
//! pool never hands the same connection to two borrowers.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::{Condvar, Mutex};
use sqlgate_common::constants::{
    CONNECTING, POOL_IDLE_TIMEOUT, POOL_MAX_CONNECTIONS, POOL_MIN_IDLE, POOL_PROBE_TIMEOUT,
};
use sqlgate_xdbc::{Connection, Database};

use crate::errors::{AdapterError, AdapterErrorKind, AdapterResult};

/// How long an idle-list connection may be probed before it is discarded.
const BORROW_VALIDITY_PROBE: Duration = Duration::from_secs(2);

/// Configuration for connection pool behavior.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool.
    pub max_connections: usize,
    /// Idle connections kept alive through reaping.
    pub min_idle: usize,
    /// Maximum time a connection can remain idle before being closed.
    pub idle_timeout: Duration,
    /// Timeout for acquiring a connection from the pool.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: POOL_MAX_CONNECTIONS,
            min_idle: POOL_MIN_IDLE,
            idle_timeout: POOL_IDLE_TIMEOUT,
            acquire_timeout: Duration::from_secs(10),
        }
    }
}

struct IdleConn {
    conn: Box<dyn Connection>,
    idle_since: Instant,
}

struct PoolState {
    idle: VecDeque<IdleConn>,
    /// Connections alive in total: idle plus borrowed.
    total: usize,
    closed: bool,
}

struct PoolInner {
    database: Mutex<Box<dyn Database>>,
    read_only: bool,
    config: PoolConfig,
    state: Mutex<PoolState>,
    available: Condvar,
}

/// A pool of connections to one database, owned by one session.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool").finish_non_exhaustive()
    }
}

impl ConnectionPool {
    pub fn new(database: Box<dyn Database>, read_only: bool, config: PoolConfig) -> Self {
        ConnectionPool {
            inner: Arc::new(PoolInner {
                database: Mutex::new(database),
                read_only,
                config,
                state: Mutex::new(PoolState {
                    idle: VecDeque::new(),
                    total: 0,
                    closed: false,
                }),
                available: Condvar::new(),
            }),
        }
    }

    /// Build a pool and validate one borrow. On any failure the pool is
    /// closed and the error surfaced, so a session never ends up with a
    /// half-alive pool.
    pub fn initialize(
        database: Box<dyn Database>,
        read_only: bool,
        config: PoolConfig,
    ) -> AdapterResult<Self> {
        let pool = Self::new(database, read_only, config);
        match pool.probe() {
            Ok(()) => Ok(pool),
            Err(err) => {
                pool.close();
                Err(err)
            }
        }
    }

    fn probe(&self) -> AdapterResult<()> {
        let mut conn = self.borrow()?;
        let valid = conn.as_mut().is_valid(POOL_PROBE_TIMEOUT)?;
        if !valid {
            return Err(AdapterError::new(
                AdapterErrorKind::Connection,
                "connection validity probe failed",
            ));
        }
        Ok(())
    }

    /// Borrow a connection, waiting up to the configured acquire timeout.
    pub fn borrow(&self) -> AdapterResult<PooledConnection> {
        enum Plan {
            Idle(Box<dyn Connection>),
            Create,
            Wait,
        }

        let deadline = Instant::now() + self.inner.config.acquire_timeout;
        loop {
            let plan = {
                let mut state = self.inner.state.lock();
                if state.closed {
                    return Err(AdapterError::new(
                        AdapterErrorKind::Connection,
                        "connection pool is closed",
                    ));
                }
                self.reap_locked(&mut state);
                if let Some(idle) = state.idle.pop_back() {
                    Plan::Idle(idle.conn)
                } else if state.total < self.inner.config.max_connections {
                    state.total += 1;
                    Plan::Create
                } else {
                    let timeout = deadline.saturating_duration_since(Instant::now());
                    if timeout.is_zero() {
                        return Err(AdapterError::new(
                            AdapterErrorKind::Timeout,
                            format!(
                                "timed out after {:?} waiting for a pooled connection",
                                self.inner.config.acquire_timeout
                            ),
                        ));
                    }
                    self.inner.available.wait_for(&mut state, timeout);
                    Plan::Wait
                }
            };
            match plan {
                Plan::Idle(mut conn) => {
                    // Connections that sat idle may have been dropped by the
                    // server; stale ones are discarded, not handed out.
                    if conn.is_valid(BORROW_VALIDITY_PROBE).unwrap_or(false) {
                        return self.finish_borrow(conn);
                    }
                    let _ = conn.close();
                    self.release_slot();
                }
                Plan::Create => match self.inner.database.lock().new_connection() {
                    Ok(conn) => return self.finish_borrow(conn),
                    Err(err) => {
                        self.release_slot();
                        return Err(AdapterError::new(
                            AdapterErrorKind::Connection,
                            format!("failed to open connection: {err}"),
                        ));
                    }
                },
                Plan::Wait => {}
            }
        }
    }

    fn finish_borrow(&self, mut conn: Box<dyn Connection>) -> AdapterResult<PooledConnection> {
        if self.inner.read_only {
            if let Err(err) = conn.set_read_only(true) {
                let _ = conn.close();
                self.release_slot();
                return Err(AdapterError::new(
                    AdapterErrorKind::Connection,
                    format!("failed to set connection read-only: {err}"),
                ));
            }
        }
        Ok(PooledConnection {
            conn: Some(conn),
            pool: self.inner.clone(),
        })
    }

    fn release_slot(&self) {
        let mut state = self.inner.state.lock();
        state.total = state.total.saturating_sub(1);
        drop(state);
        self.inner.available.notify_one();
    }

    /// Close idle connections that outlived the idle timeout, always keeping
    /// `min_idle` warm.
    fn reap_locked(&self, state: &mut PoolState) {
        let now = Instant::now();
        while state.idle.len() > self.inner.config.min_idle {
            let expired = state
                .idle
                .front()
                .is_some_and(|idle| now.duration_since(idle.idle_since) >= self.inner.config.idle_timeout);
            if !expired {
                break;
            }
            if let Some(mut idle) = state.idle.pop_front() {
                let _ = idle.conn.close();
                state.total = state.total.saturating_sub(1);
            }
        }
    }

    /// Close the pool and every connection it owns. Borrowed connections are
    /// closed when their guards return them.
    pub fn close(&self) {
        let drained = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            let drained = std::mem::take(&mut state.idle);
            state.total = state.total.saturating_sub(drained.len());
            drained
        };
        for mut idle in drained {
            let _ = idle.conn.close();
        }
        self.inner.available.notify_all();
        log::debug!(target: CONNECTING, "connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Number of live connections (idle + borrowed).
    pub fn total_connections(&self) -> usize {
        self.inner.state.lock().total
    }

    pub fn idle_connections(&self) -> usize {
        self.inner.state.lock().idle.len()
    }
}

/// A borrowed connection. Dereferences to [`Connection`]; dropping the guard
/// returns the connection to the pool (or closes it if the pool has been
/// closed in the meantime).
pub struct PooledConnection {
    conn: Option<Box<dyn Connection>>,
    pool: Arc<PoolInner>,
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection").finish_non_exhaustive()
    }
}

impl PooledConnection {
    pub fn as_mut(&mut self) -> &mut dyn Connection {
        self.conn.as_mut().expect("connection already returned").as_mut()
    }
}

impl Deref for PooledConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection already returned").as_ref()
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection already returned").as_mut()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        let mut state = self.pool.state.lock();
        if state.closed {
            state.total = state.total.saturating_sub(1);
            drop(state);
            let _ = conn.close();
        } else {
            state.idle.push_back(IdleConn {
                conn,
                idle_since: Instant::now(),
            });
            drop(state);
        }
        self.pool.available.notify_one();
    }
}

/// Owner of all session pools. At most one pool per session id; publication
/// is first-writer-wins, the losing pool is closed by its creator.
#[derive(Default)]
pub struct PoolManager {
    pools: DashMap<String, ConnectionPool>,
}

impl PoolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a freshly initialized pool for a session. If another
    /// initializer won the race, the given pool is closed and the winner
    /// returned.
    pub fn install(&self, session_id: &str, pool: ConnectionPool) -> ConnectionPool {
        match self.pools.entry(session_id.to_string()) {
            Entry::Occupied(entry) => {
                pool.close();
                entry.get().clone()
            }
            Entry::Vacant(entry) => {
                entry.insert(pool.clone());
                pool
            }
        }
    }

    pub fn get(&self, session_id: &str) -> Option<ConnectionPool> {
        self.pools.get(session_id).map(|entry| entry.clone())
    }

    /// Detach the pool from the map. The caller is responsible for closing it.
    pub fn remove(&self, session_id: &str) -> Option<ConnectionPool> {
        self.pools.remove(session_id).map(|(_, pool)| pool)
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.pools.iter().map(|entry| entry.key().clone()).collect()
    }
}
