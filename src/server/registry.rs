//! Registry of live sessions keyed by remote address.
//!
//! The server inserts an entry when a session is admitted and the returned
//! [`SessionGuard`] removes it when the session task ends, including when the
//! task unwinds from a panic.

use std::{net::SocketAddr, sync::Arc, time::SystemTime};

use dashmap::DashMap;

use crate::metrics;

/// Details recorded for a live session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionInfo {
    /// Remote address of the peer.
    pub peer_addr: SocketAddr,
    /// When the session was admitted.
    pub connected_at: SystemTime,
}

/// Concurrent map of live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry(DashMap<SocketAddr, SessionInfo>);

impl SessionRegistry {
    /// Record a new session and return a guard that removes it on drop.
    pub(crate) fn register(self: &Arc<Self>, peer_addr: SocketAddr) -> SessionGuard {
        self.0.insert(
            peer_addr,
            SessionInfo {
                peer_addr,
                connected_at: SystemTime::now(),
            },
        );
        metrics::inc_connections();
        SessionGuard {
            registry: Arc::clone(self),
            peer_addr,
        }
    }

    /// Look up a session by remote address.
    #[must_use]
    pub fn get(&self, peer_addr: &SocketAddr) -> Option<SessionInfo> {
        self.0.get(peer_addr).map(|entry| *entry.value())
    }

    /// Remote addresses of all live sessions, sorted.
    #[must_use]
    pub fn peers(&self) -> Vec<SocketAddr> {
        let mut peers: Vec<SocketAddr> = self.0.iter().map(|entry| *entry.key()).collect();
        peers.sort_unstable();
        peers
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Returns true if no sessions are live.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

/// Removes a session from its registry when dropped.
#[derive(Debug)]
pub(crate) struct SessionGuard {
    registry: Arc<SessionRegistry>,
    peer_addr: SocketAddr,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.0.remove(&self.peer_addr);
        metrics::dec_connections();
    }
}
