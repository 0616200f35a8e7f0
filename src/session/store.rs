// SPDX-License-Identifier: GPL-3.0-only

//! Single source of truth for observable session state
//!
//! The coordinator's session context is the only writer. Readers get
//! immutable `SessionState` snapshots: `current()` from any thread, or the
//! full publication-ordered sequence via `subscribe()`.

use crate::backend::SessionState;
use futures::Stream;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

/// Store holding the latest snapshot and the subscriber list
pub struct SessionStateStore {
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    current: SessionState,
    subscribers: Vec<mpsc::UnboundedSender<SessionState>>,
}

impl SessionStateStore {
    /// Create a store seeded with the default (uninitialized) state
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                current: SessionState::default(),
                subscribers: Vec::new(),
            }),
        }
    }

    /// Latest snapshot. Safe from any thread; snapshots are immutable values
    /// so there is no torn read between fields.
    pub fn current(&self) -> SessionState {
        self.inner.lock().unwrap().current
    }

    /// Publish a new snapshot, replacing the previous one.
    ///
    /// Only the session context may call this. Snapshots reach every
    /// subscriber in publication order; nothing is reordered or coalesced.
    pub fn publish(&self, state: SessionState) {
        let mut inner = self.inner.lock().unwrap();
        inner.current = state;
        // Unbounded sends keep ordering even for slow consumers; a closed
        // receiver just drops out of the list.
        inner.subscribers.retain(|tx| tx.send(state).is_ok());
        debug!(
            authorized = state.authorized,
            running = state.running,
            recording = state.recording,
            flash = state.flash_enabled,
            position = %state.position,
            subscribers = inner.subscribers.len(),
            "Published session state"
        );
    }

    /// Subscribe to the snapshot sequence.
    ///
    /// The stream yields the current snapshot first, then every subsequent
    /// publication, for as long as the subscriber keeps the stream alive.
    pub fn subscribe(&self) -> impl Stream<Item = SessionState> + Send + use<> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        {
            let mut inner = self.inner.lock().unwrap();
            // Seed with the current snapshot under the same lock that guards
            // publication, so the initial element orders correctly against
            // concurrent publishes.
            let _ = tx.send(inner.current);
            inner.subscribers.push(tx);
        }

        async_stream::stream! {
            while let Some(state) = rx.recv().await {
                yield state;
            }
        }
    }
}

impl Default for SessionStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("SessionStateStore")
            .field("current", &inner.current)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CameraPosition;
    use futures::StreamExt;

    #[test]
    fn test_current_returns_latest_snapshot() {
        let store = SessionStateStore::new();
        assert!(!store.current().running);

        let mut state = SessionState::default();
        state.authorized = true;
        state.running = true;
        store.publish(state);

        let snap = store.current();
        assert!(snap.authorized);
        assert!(snap.running);
    }

    #[tokio::test]
    async fn test_subscribe_yields_initial_then_updates_in_order() {
        let store = SessionStateStore::new();
        let mut stream = Box::pin(store.subscribe());

        // Initial snapshot arrives before any publication
        let initial = stream.next().await.unwrap();
        assert_eq!(initial, SessionState::default());

        let mut s1 = SessionState::default();
        s1.running = true;
        let mut s2 = s1;
        s2.flash_enabled = true;
        let mut s3 = s2;
        s3.position = CameraPosition::Front;

        store.publish(s1);
        store.publish(s2);
        store.publish(s3);

        assert_eq!(stream.next().await.unwrap(), s1);
        assert_eq!(stream.next().await.unwrap(), s2);
        assert_eq!(stream.next().await.unwrap(), s3);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let store = SessionStateStore::new();
        {
            let _stream = store.subscribe();
        }
        // First publish after the drop prunes the dead sender
        store.publish(SessionState::default());
        store.publish(SessionState::default());
        assert!(format!("{:?}", store).contains("subscribers: 0"));
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_snapshot_not_history() {
        let store = SessionStateStore::new();
        let mut s1 = SessionState::default();
        s1.running = true;
        store.publish(s1);

        let mut stream = Box::pin(store.subscribe());
        assert_eq!(stream.next().await.unwrap(), s1);
    }
}
