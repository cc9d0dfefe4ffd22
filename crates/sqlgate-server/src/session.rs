//! Named sessions.
//!
//! A session is an expiring handle: live while it has been touched within
//! the idle window and has not exceeded its lifetime. Expired sessions are
//! evicted lazily on lookup and by a periodic sweeper. Eviction does not
//! tear down the session's pool or samplers; that is the coordinated
//! disconnect path in the gateway.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde_derive::{Deserialize, Serialize};
use sqlgate_common::constants::{
    CONNECTING, DEFAULT_CONNECT_TIMEOUT_MS, SESSION_IDLE_TIMEOUT, SESSION_MAX_LIFETIME,
    SESSION_SWEEP_INTERVAL,
};
use sqlgate_common::time;
use sqlgate_error::{ErrorCode, GateResult, err};
use uuid::Uuid;

fn default_connection_timeout_ms() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_MS
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectOptions {
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub use_mcp: bool,
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ConnectOptions {
            read_only: false,
            use_mcp: false,
            connection_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Session {
    pub session_id: String,
    pub dsn: String,
    pub db_type: String,
    pub options: ConnectOptions,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn is_live(&self, idle_timeout: TimeDelta, now: DateTime<Utc>) -> bool {
        self.last_accessed_at + idle_timeout > now && self.expires_at > now
    }
}

pub struct SessionManager {
    sessions: DashMap<String, Session>,
    idle_timeout: TimeDelta,
    max_lifetime: TimeDelta,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self::with_timeouts(SESSION_IDLE_TIMEOUT, SESSION_MAX_LIFETIME)
    }

    pub fn with_timeouts(idle_timeout: Duration, max_lifetime: Duration) -> Self {
        SessionManager {
            sessions: DashMap::new(),
            idle_timeout: TimeDelta::from_std(idle_timeout).expect("idle timeout out of range"),
            max_lifetime: TimeDelta::from_std(max_lifetime).expect("max lifetime out of range"),
        }
    }

    /// Create and register a session. No pool is created here; pools come
    /// into existence on the first connection-requiring operation.
    pub fn create(&self, dsn: &str, db_type: &str, options: ConnectOptions) -> Session {
        let now = time::now();
        let session = Session {
            session_id: Uuid::new_v4().to_string(),
            dsn: dsn.to_string(),
            db_type: db_type.to_ascii_lowercase(),
            options,
            created_at: now,
            last_accessed_at: now,
            expires_at: now + self.max_lifetime,
        };
        self.sessions.insert(session.session_id.clone(), session.clone());
        log::info!(
            target: CONNECTING,
            "session {} created for db_type {}",
            session.session_id,
            session.db_type
        );
        session
    }

    /// Look up a live session, refreshing its idle window. Expired sessions
    /// are evicted and reported as absent.
    pub fn get(&self, session_id: &str) -> GateResult<Session> {
        let now = time::now();
        match self.sessions.get_mut(session_id) {
            Some(mut entry) => {
                if !entry.is_live(self.idle_timeout, now) {
                    drop(entry);
                    self.sessions.remove(session_id);
                    return err!(
                        ErrorCode::SessionNotFound,
                        "session '{session_id}' has expired"
                    );
                }
                entry.last_accessed_at = now;
                Ok(entry.clone())
            }
            None => err!(ErrorCode::SessionNotFound, "unknown session '{session_id}'"),
        }
    }

    pub fn remove(&self, session_id: &str) -> Option<Session> {
        self.sessions.remove(session_id).map(|(_, session)| session)
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Evict every expired session; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = time::now();
        let expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| !entry.is_live(self.idle_timeout, now))
            .map(|entry| entry.key().clone())
            .collect();
        for session_id in &expired {
            self.sessions.remove(session_id);
            log::info!(target: CONNECTING, "session {session_id} expired");
        }
        expired.len()
    }

    /// Spawn the periodic expiration sweeper on the current runtime.
    pub fn spawn_sweeper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let swept = manager.sweep();
                if swept > 0 {
                    log::debug!(target: CONNECTING, "sweeper removed {swept} expired session(s)");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get_touches_session() {
        let manager = SessionManager::new();
        let session = manager.create("postgres://db/hr", "Postgres", ConnectOptions::default());
        assert_eq!(session.db_type, "postgres");

        let fetched = manager.get(&session.session_id).unwrap();
        assert!(fetched.last_accessed_at >= session.last_accessed_at);
    }

    #[test]
    fn test_unknown_session_is_not_found() {
        let manager = SessionManager::new();
        let err = manager.get("nope").unwrap_err();
        assert_eq!(err.code, ErrorCode::SessionNotFound);
    }

    #[test]
    fn test_idle_expiry_evicts_on_lookup() {
        let manager =
            SessionManager::with_timeouts(Duration::from_millis(10), SESSION_MAX_LIFETIME);
        let session = manager.create("dsn", "mock", ConnectOptions::default());
        std::thread::sleep(Duration::from_millis(30));

        let err = manager.get(&session.session_id).unwrap_err();
        assert_eq!(err.code, ErrorCode::SessionNotFound);
        // The entry is gone, not merely rejected.
        assert!(manager.session_ids().is_empty());
    }

    #[test]
    fn test_lifetime_expiry_beats_recent_access() {
        let manager =
            SessionManager::with_timeouts(Duration::from_secs(3600), Duration::from_millis(10));
        let session = manager.create("dsn", "mock", ConnectOptions::default());
        std::thread::sleep(Duration::from_millis(30));
        assert!(manager.get(&session.session_id).is_err());
    }

    #[test]
    fn test_sweep_removes_expired_only() {
        let manager =
            SessionManager::with_timeouts(Duration::from_millis(20), SESSION_MAX_LIFETIME);
        let stale = manager.create("dsn", "mock", ConnectOptions::default());
        std::thread::sleep(Duration::from_millis(40));
        let fresh = manager.create("dsn", "mock", ConnectOptions::default());

        assert_eq!(manager.sweep(), 1);
        assert!(manager.get(&stale.session_id).is_err());
        assert!(manager.get(&fresh.session_id).is_ok());
    }

    #[test]
    fn test_connect_options_deserialize_defaults() {
        let options: ConnectOptions = serde_json::from_str("{\"read_only\": true}").unwrap();
        assert!(options.read_only);
        assert!(!options.use_mcp);
        assert_eq!(options.connection_timeout_ms, DEFAULT_CONNECT_TIMEOUT_MS);
    }
}
