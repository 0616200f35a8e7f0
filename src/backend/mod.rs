// SPDX-License-Identifier: GPL-3.0-only

//! Capture backend abstraction
//!
//! This module defines the boundary between the session manager and the
//! platform: permissions, device discovery, and the capture graph itself.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  CaptureCoordinator  │  ← State machine, async bridging
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │     DeviceGraph      │  ← Atomic configuration transactions
//! └──────────┬───────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │ CaptureBackend trait │  ← Common interface
//! └──────────┬───────────┘
//!            │
//!            ▼
//!      ┌──────────┐
//!      │ Software │  ← Simulated implementation (no hardware required)
//!      └──────────┘
//! ```
//!
//! Capture and recording results are delivered through fire-once completion
//! callbacks. Backends may invoke them from any thread; the coordinator is
//! responsible for marshaling them back onto the session context.

pub mod software;
pub mod types;

pub use types::*;

use futures::future::BoxFuture;

/// Fire-once completion for a photo capture.
///
/// The backend must invoke this exactly once, possibly from an arbitrary
/// thread. `Err` carries a hardware-reported failure message.
pub type PhotoCompletion = Box<dyn FnOnce(Result<CapturedMedia, String>) + Send + 'static>;

/// Fire-once completion for a recording.
///
/// Invoked exactly once when the recording finalizes: after an explicit stop,
/// after the max-duration bound fires, or on a hardware failure mid-recording.
pub type RecordingCompletion = Box<dyn FnOnce(Result<CapturedMedia, String>) + Send + 'static>;

/// Hardware-access authorization, abstracted over the platform
///
/// Implementations must never fail: `Denied`/`Restricted` are valid results,
/// not errors.
pub trait PermissionProvider: Send + Sync {
    /// Current authorization state (synchronous, cheap)
    fn status(&self) -> AuthorizationState;

    /// Request access, possibly showing the OS one-time prompt.
    ///
    /// Resolves with the resulting state once the OS responds. Callers must
    /// not assume the prompt is shown more than once; the gate above this
    /// trait deduplicates concurrent requests.
    fn request_access(&self) -> BoxFuture<'static, AuthorizationState>;
}

/// Camera device discovery
pub trait DeviceProvider: Send {
    /// The default device for a position, if one exists
    fn default_device(&self, position: CameraPosition) -> Option<DeviceHandle>;
}

/// Complete capture backend trait
///
/// All backends must implement this trait to provide:
/// - Transactional configuration (begin/commit, add/remove input, add output)
/// - Session lifecycle (start/stop)
/// - One-shot capture and recording primitives with completion callbacks
///
/// The capture graph is not safe for concurrent configuration: every method
/// here must only be called from the session context.
pub trait CaptureBackend: Send {
    // ===== Configuration transactions =====

    /// Open a configuration transaction.
    ///
    /// Mutations between `begin_configuration` and `commit_configuration`
    /// become visible atomically on commit; no external observer may see an
    /// intermediate graph with zero inputs or duplicated outputs.
    fn begin_configuration(&mut self);

    /// Commit the open configuration transaction
    fn commit_configuration(&mut self);

    /// Attach an input device to the graph
    ///
    /// # Errors
    /// * `DeviceError::DeviceUnavailable` - The device cannot be opened
    fn add_input(&mut self, device: &DeviceHandle) -> Result<(), crate::errors::DeviceError>;

    /// Detach the current input device, if any
    fn remove_input(&mut self);

    /// Attach an output to the graph
    ///
    /// # Errors
    /// * `DeviceError::OutputUnavailable` - The output could not be attached
    fn add_output(&mut self, output: OutputKind) -> Result<(), crate::errors::DeviceError>;

    /// Detach an output from the graph. No-op when it is not attached.
    fn remove_output(&mut self, output: OutputKind);

    // ===== Session lifecycle =====

    /// Start the capture session. Idempotent.
    fn start(&mut self);

    /// Stop the capture session. Idempotent.
    fn stop(&mut self);

    /// Whether the session is currently running
    fn is_running(&self) -> bool;

    // ===== One-shot capture primitives =====

    /// Issue a single photo capture request.
    ///
    /// The completion is invoked exactly once with the captured media or a
    /// failure, possibly on an arbitrary thread.
    fn capture_photo(&mut self, settings: PhotoSettings, completion: PhotoCompletion);

    /// Start a recording.
    ///
    /// Returns once the hardware has acknowledged recording began (not once
    /// it finishes). The completion fires when the recording finalizes; the
    /// backend must enforce `request.max_duration` so an unterminated
    /// recording self-terminates.
    ///
    /// # Errors
    /// * `Err(String)` - The hardware refused to start recording
    fn start_recording(
        &mut self,
        request: RecordingRequest,
        completion: RecordingCompletion,
    ) -> Result<(), String>;

    /// Stop the active recording and trigger finalization.
    ///
    /// The result is delivered through the completion passed to
    /// [`CaptureBackend::start_recording`]. No-op when nothing is recording.
    fn stop_recording(&mut self);
}
