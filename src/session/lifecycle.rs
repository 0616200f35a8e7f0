// SPDX-License-Identifier: GPL-3.0-only

//! App lifecycle handling: foreground/background signals and pre-warming
//!
//! Thin forwarding layer over the coordinator. Pre-warm is a best-effort
//! latency optimization: when the app knows the capture UI is about to open
//! and access is already authorized, the session is initialized eagerly on a
//! background task so it is Ready by the time the UI asks.

use crate::session::coordinator::CaptureCoordinator;
use tracing::{debug, info, warn};

/// Hint passed with a pre-warm request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreWarmHint {
    /// The capture UI is expected to open shortly
    CaptureImminent,
    /// No capture expected; skip eager setup
    CaptureUnlikely,
}

/// Reacts to app lifecycle signals, deciding whether to start, keep, or stop
/// the session
#[derive(Clone, Debug)]
pub struct LifecycleController {
    coordinator: CaptureCoordinator,
}

impl LifecycleController {
    pub fn new(coordinator: CaptureCoordinator) -> Self {
        Self { coordinator }
    }

    /// App moved to the foreground
    pub async fn on_foreground(&self) {
        debug!("App foregrounded");
        if let Err(e) = self.coordinator.resume().await {
            warn!(error = %e, "Resume after foregrounding failed");
        }
    }

    /// App moved to the background
    pub async fn on_background(&self) {
        debug!("App backgrounded");
        self.coordinator.suspend().await;
    }

    /// Best-effort eager initialization.
    ///
    /// Only acts when access is already authorized; never prompts. Runs on a
    /// spawned background task so the caller is not delayed. Concurrency with
    /// an explicit `initialize()` is safe: both paths funnel through the
    /// coordinator's re-entrancy guard, so at most one hardware configuration
    /// happens.
    pub fn prepare_for_pre_warm(&self, hint: PreWarmHint) {
        if hint != PreWarmHint::CaptureImminent {
            debug!(?hint, "Pre-warm skipped for hint");
            return;
        }
        if !self.coordinator.permissions().status().is_authorized() {
            debug!("Pre-warm skipped: not authorized");
            return;
        }
        if self.coordinator.store().current().running {
            debug!("Pre-warm skipped: session already running");
            return;
        }

        info!("Pre-warming capture session");
        let coordinator = self.coordinator.clone();
        tokio::spawn(async move {
            match coordinator.initialize().await {
                Ok(()) => info!("Pre-warm complete"),
                // Best effort only; the explicit initialize path will
                // surface any real error to the UI.
                Err(e) => warn!(error = %e, "Pre-warm failed"),
            }
        });
    }
}
