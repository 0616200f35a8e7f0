// SPDX-License-Identifier: GPL-3.0-only

//! Permission gate in front of the platform authorization provider
//!
//! The OS one-time prompt must not be shown twice. The gate serializes
//! `request_access` calls behind an async mutex and re-checks the provider
//! status after acquiring it, so a second caller that raced the first simply
//! observes the already-determined outcome.

use crate::backend::{AuthorizationState, PermissionProvider};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Queries and requests hardware-access authorization
#[derive(Clone)]
pub struct PermissionGate {
    provider: Arc<dyn PermissionProvider>,
    /// Held across an outstanding OS prompt so concurrent requests await the
    /// same outcome instead of issuing a duplicate prompt
    request_lock: Arc<Mutex<()>>,
}

impl PermissionGate {
    /// Wrap a platform permission provider
    pub fn new(provider: Arc<dyn PermissionProvider>) -> Self {
        Self {
            provider,
            request_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Current authorization state (synchronous, cheap)
    pub fn status(&self) -> AuthorizationState {
        self.provider.status()
    }

    /// Request access, suspending until the OS responds.
    ///
    /// Idempotent: if the state is already determined, or another request is
    /// in flight, this resolves with the (shared) outcome without triggering
    /// a second prompt. Never fails; `Denied`/`Restricted` are valid results.
    pub async fn request_access(&self) -> AuthorizationState {
        let _guard = self.request_lock.lock().await;

        // A concurrent request may have resolved while we waited on the lock
        let current = self.provider.status();
        if current.is_determined() {
            debug!(state = %current, "Authorization already determined");
            return current;
        }

        info!("Requesting camera authorization");
        let result = self.provider.request_access().await;
        info!(state = %result, "Authorization request resolved");
        result
    }
}

impl std::fmt::Debug for PermissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PermissionGate")
            .field("status", &self.provider.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Provider that resolves to `Authorized` after a short delay and counts
    /// how many prompts were issued.
    struct CountingProvider {
        state: Arc<StdMutex<AuthorizationState>>,
        prompts: AtomicU32,
    }

    impl CountingProvider {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                state: Arc::new(StdMutex::new(AuthorizationState::NotDetermined)),
                prompts: AtomicU32::new(0),
            })
        }
    }

    impl PermissionProvider for CountingProvider {
        fn status(&self) -> AuthorizationState {
            *self.state.lock().unwrap()
        }

        fn request_access(&self) -> BoxFuture<'static, AuthorizationState> {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            let state = Arc::clone(&self.state);
            Box::pin(async move {
                // Resolve after a delay so a concurrent caller piles up on
                // the gate's request lock while the prompt is outstanding.
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                *state.lock().unwrap() = AuthorizationState::Authorized;
                AuthorizationState::Authorized
            })
        }
    }

    #[tokio::test]
    async fn test_concurrent_requests_prompt_once() {
        let provider = CountingProvider::new();
        let gate = PermissionGate::new(provider.clone() as Arc<dyn PermissionProvider>);

        let g1 = gate.clone();
        let g2 = gate.clone();
        let (a, b) = tokio::join!(g1.request_access(), g2.request_access());

        assert_eq!(a, AuthorizationState::Authorized);
        assert_eq!(b, AuthorizationState::Authorized);
        assert_eq!(provider.prompts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_determined_state_short_circuits() {
        struct DeniedProvider;
        impl PermissionProvider for DeniedProvider {
            fn status(&self) -> AuthorizationState {
                AuthorizationState::Denied
            }
            fn request_access(&self) -> BoxFuture<'static, AuthorizationState> {
                panic!("prompt must not be issued for a determined state");
            }
        }

        let gate = PermissionGate::new(Arc::new(DeniedProvider));
        assert_eq!(gate.request_access().await, AuthorizationState::Denied);
    }
}
