use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::models::{PlaybackState, SessionId};

/// Per-session state broadcast channel plus the ordering guard.
struct SessionChannel {
    sender: broadcast::Sender<PlaybackState>,
    /// Highest version published so far; publishes at or below it are
    /// dropped so subscribers observe non-decreasing versions.
    last_version: i64,
}

/// In-process hub delivering accepted playback states to session subscribers.
///
/// Delivery contract: at-least-once per subscriber, versions in
/// non-decreasing order. A slow subscriber past the channel capacity
/// observes `RecvError::Lagged` and must reconcile with a full
/// `get_current` fetch; there is no buffered-history replay.
#[derive(Clone)]
pub struct SessionHub {
    capacity: usize,
    channels: Arc<DashMap<SessionId, SessionChannel>>,
}

impl SessionHub {
    /// Default broadcast channel capacity per session
    pub const DEFAULT_CAPACITY: usize = 256;

    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), channels: Arc::new(DashMap::new()) }
    }

    /// Publish an accepted state to all subscribers of its session.
    ///
    /// Returns the number of subscribers the state was handed to. A state
    /// whose version does not exceed the last published one is dropped
    /// (late or duplicate publish); this is what keeps per-subscriber
    /// delivery monotone even if callers race past the accept path.
    pub fn publish(&self, state: &PlaybackState) -> usize {
        let mut channel = self
            .channels
            .entry(state.session_id.clone())
            .or_insert_with(|| SessionChannel {
                sender: broadcast::channel(self.capacity).0,
                last_version: 0,
            });

        if state.version <= channel.last_version {
            trace!(
                session_id = %state.session_id,
                version = state.version,
                last_version = channel.last_version,
                "Dropping stale publish"
            );
            return 0;
        }
        channel.last_version = state.version;

        // Err means no live subscribers, which is fine
        let delivered = channel.sender.send(state.clone()).unwrap_or(0);
        trace!(
            session_id = %state.session_id,
            version = state.version,
            subscribers = delivered,
            "Published playback state"
        );
        delivered
    }

    /// Subscribe to a session's state broadcasts.
    ///
    /// The receiver only sees states published after this call; callers are
    /// expected to pair subscription with a `get_current` fetch.
    #[must_use]
    pub fn subscribe(&self, session_id: &SessionId) -> broadcast::Receiver<PlaybackState> {
        self.channels
            .entry(session_id.clone())
            .or_insert_with(|| SessionChannel {
                sender: broadcast::channel(self.capacity).0,
                last_version: 0,
            })
            .sender
            .subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self, session_id: &SessionId) -> usize {
        self.channels
            .get(session_id)
            .map_or(0, |channel| channel.sender.receiver_count())
    }

    /// Tear down a session's channel. Live receivers observe `Closed` once
    /// they drain what was already delivered.
    pub fn close_session(&self, session_id: &SessionId) {
        if self.channels.remove(session_id).is_some() {
            debug!(session_id = %session_id, "Session channel closed");
        }
    }
}

impl Default for SessionHub {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ViewerId;
    use chrono::Utc;

    fn state(session_id: &SessionId, version: i64) -> PlaybackState {
        PlaybackState {
            session_id: session_id.clone(),
            version,
            is_playing: true,
            position_seconds: version as f64,
            reference_timestamp: Utc::now(),
            updated_by: ViewerId::new(),
        }
    }

    #[tokio::test]
    async fn test_subscribers_see_non_decreasing_versions() {
        let hub = SessionHub::default();
        let session_id = SessionId::generate();
        let mut rx = hub.subscribe(&session_id);

        hub.publish(&state(&session_id, 1));
        hub.publish(&state(&session_id, 3));
        hub.publish(&state(&session_id, 2)); // late publish, dropped
        hub.publish(&state(&session_id, 3)); // duplicate, dropped

        assert_eq!(rx.recv().await.expect("v1").version, 1);
        assert_eq!(rx.recv().await.expect("v3").version, 3);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_counts_subscribers() {
        let hub = SessionHub::default();
        let session_id = SessionId::generate();

        assert_eq!(hub.publish(&state(&session_id, 1)), 0);

        let _rx1 = hub.subscribe(&session_id);
        let _rx2 = hub.subscribe(&session_id);
        assert_eq!(hub.subscriber_count(&session_id), 2);
        assert_eq!(hub.publish(&state(&session_id, 2)), 2);
    }

    #[tokio::test]
    async fn test_lag_surfaces_instead_of_replay() {
        let hub = SessionHub::new(2);
        let session_id = SessionId::generate();
        let mut rx = hub.subscribe(&session_id);

        for version in 1..=5 {
            hub.publish(&state(&session_id, version));
        }

        // Two slots of capacity: the receiver lost the older versions and is
        // told so, rather than being fed stale history.
        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(missed)) => assert!(missed > 0),
            other => panic!("expected lag signal, got {other:?}"),
        }
        // What remains is the newest window, still in order.
        let next = rx.recv().await.expect("newest window");
        assert!(next.version >= 4);
    }

    #[tokio::test]
    async fn test_close_session_ends_delivery() {
        let hub = SessionHub::default();
        let session_id = SessionId::generate();
        let mut rx = hub.subscribe(&session_id);

        hub.publish(&state(&session_id, 1));
        hub.close_session(&session_id);

        assert_eq!(rx.recv().await.expect("buffered state").version, 1);
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Closed)));
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let hub = SessionHub::default();
        let a = SessionId::generate();
        let b = SessionId::generate();
        let mut rx_a = hub.subscribe(&a);

        hub.publish(&state(&b, 1));
        assert!(rx_a.try_recv().is_err());
    }
}
