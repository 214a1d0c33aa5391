//! Session table for a render server's scheduling endpoint
//!
//! Sessions are handed out with sequential ids. The table refuses new
//! sessions once `max_sessions` are open and drops sessions older than the
//! configured TTL.

use farmdispatch_common::config::WorkerConfig;
use farmdispatch_common::METRICS;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Session identifier; 0 is never issued
pub type SessionId = i64;

/// One open rendering session
#[derive(Debug, Clone)]
pub struct Session {
    /// Client protocol version (any version is accepted)
    pub version: i32,

    /// Requested frame width
    pub res_x: i32,

    /// Requested frame height
    pub res_y: i32,

    /// When the session was opened
    pub opened_at: Instant,
}

struct Inner {
    next_id: SessionId,
    sessions: HashMap<SessionId, Session>,
}

/// Thread-safe table of open sessions
pub struct SessionTable {
    inner: Mutex<Inner>,
    max_sessions: usize,
}

impl SessionTable {
    /// Create a table that admits at most `max_sessions` (0 = unlimited)
    pub fn new(max_sessions: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                sessions: HashMap::new(),
            }),
            max_sessions,
        }
    }

    /// Create a table from worker configuration
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.max_sessions)
    }

    /// Open a session, returning its id, or `None` when the table is full
    pub fn open(&self, version: i32, res_x: i32, res_y: i32) -> Option<SessionId> {
        let mut inner = self.inner.lock();

        if self.max_sessions != 0 && inner.sessions.len() >= self.max_sessions {
            METRICS.worker.sessions_rejected_total.inc();
            debug!("Session table full ({} open)", inner.sessions.len());
            return None;
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.sessions.insert(
            id,
            Session {
                version,
                res_x,
                res_y,
                opened_at: Instant::now(),
            },
        );

        METRICS.worker.sessions_opened_total.inc();
        METRICS.worker.active_sessions.set(inner.sessions.len() as i64);
        Some(id)
    }

    /// Look up a session
    pub fn get(&self, id: SessionId) -> Option<Session> {
        self.inner.lock().sessions.get(&id).cloned()
    }

    /// Drop every session idle for longer than `ttl`, returning how many were dropped
    pub fn reap_expired(&self, ttl: Duration) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.sessions.len();
        inner.sessions.retain(|_, session| session.opened_at.elapsed() <= ttl);
        let expired = before - inner.sessions.len();

        if expired > 0 {
            info!("Expired {} idle sessions", expired);
            METRICS.worker.sessions_expired_total.inc_by(expired as u64);
            METRICS.worker.active_sessions.set(inner.sessions.len() as i64);
        }
        expired
    }

    /// Number of open sessions
    pub fn len(&self) -> usize {
        self.inner.lock().sessions.len()
    }

    /// Whether no sessions are open
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids_start_at_one() {
        let table = SessionTable::new(0);

        assert_eq!(table.open(1, 1920, 1080), Some(1));
        assert_eq!(table.open(1, 1280, 720), Some(2));
        assert_eq!(table.len(), 2);

        let session = table.get(2).unwrap();
        assert_eq!((session.res_x, session.res_y), (1280, 720));
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_refuses_and_recovers() {
        let table = SessionTable::new(1);

        let id = table.open(0, 640, 480).unwrap();
        assert_eq!(table.open(0, 640, 480), None);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(table.reap_expired(Duration::from_secs(30)), 1);
        assert!(table.is_empty());
        assert_eq!(table.open(0, 640, 480), Some(id + 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reap_expired() {
        let table = SessionTable::new(0);
        let stale = table.open(0, 800, 600).unwrap();

        tokio::time::advance(Duration::from_secs(20)).await;
        let fresh = table.open(0, 800, 600).unwrap();
        tokio::time::advance(Duration::from_secs(15)).await;

        assert_eq!(table.reap_expired(Duration::from_secs(30)), 1);
        assert!(table.get(stale).is_none());
        assert!(table.get(fresh).is_some());
        assert_eq!(table.len(), 1);
    }
}
