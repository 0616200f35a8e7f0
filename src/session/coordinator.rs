// SPDX-License-Identifier: GPL-3.0-only

//! Capture coordinator: the session state machine
//!
//! All mutable session state lives inside a single actor task (the "session
//! context"). Callers interact through the cloneable [`CaptureCoordinator`]
//! handle, which sends commands over an mpsc channel and awaits a oneshot
//! reply. Hardware completion callbacks arrive on arbitrary threads and are
//! marshaled back onto the session context by re-sending them as commands
//! through the same channel, so every mutation of the pending-operation
//! slots happens in exactly one place.
//!
//! State machine:
//!
//! ```text
//! Uninitialized → Configuring → Ready ⇄ {Capturing, Recording}
//!                                 ⇅
//!                             Suspended
//! ```

use crate::backend::{
    CaptureBackend, CapturedMedia, CameraPosition, DeviceProvider, PhotoSettings,
    RecordingRequest, SessionState,
};
use crate::config::SessionConfig;
use crate::errors::{DeviceError, SessionError, SessionResult};
use crate::session::graph::DeviceGraph;
use crate::session::permission::PermissionGate;
use crate::session::store::SessionStateStore;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Coordinator lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Configuring,
    Ready,
    Capturing,
    Recording,
    Suspended,
}

/// Kind of in-flight operation tracked by a pending slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperationKind {
    Capture,
    StopRecording,
}

/// In-flight tracking slot for one capture or one recording-stop.
///
/// Holds the consuming reply sender, so resolving the operation more than
/// once is impossible by construction.
struct PendingOperation {
    id: Uuid,
    kind: OperationKind,
    reply: oneshot::Sender<SessionResult<CapturedMedia>>,
}

impl PendingOperation {
    fn new(kind: OperationKind, reply: oneshot::Sender<SessionResult<CapturedMedia>>) -> Self {
        let op = Self {
            id: Uuid::new_v4(),
            kind,
            reply,
        };
        debug!(id = %op.id, kind = ?op.kind, "Pending operation created");
        op
    }

    /// Resolve the operation. A caller that abandoned interest simply drops
    /// the receiving half; the result is discarded but the slot still clears.
    fn resolve(self, result: SessionResult<CapturedMedia>) {
        debug!(id = %self.id, kind = ?self.kind, ok = result.is_ok(), "Pending operation resolved");
        let _ = self.reply.send(result);
    }
}

/// Commands processed by the session context, one at a time
enum Command {
    Initialize {
        reply: oneshot::Sender<SessionResult<()>>,
    },
    CapturePhoto {
        reply: oneshot::Sender<SessionResult<CapturedMedia>>,
    },
    /// Marshaled photo completion (originates on an arbitrary thread)
    PhotoFinished {
        result: Result<CapturedMedia, String>,
    },
    StartRecording {
        reply: oneshot::Sender<SessionResult<()>>,
    },
    StopRecording {
        reply: oneshot::Sender<SessionResult<CapturedMedia>>,
    },
    /// Marshaled recording completion (explicit stop, max-duration stop, or
    /// mid-recording failure)
    RecordingFinished {
        result: Result<CapturedMedia, String>,
    },
    SwitchCamera {
        reply: oneshot::Sender<SessionResult<CameraPosition>>,
    },
    SetFlash {
        enabled: bool,
        reply: oneshot::Sender<SessionResult<()>>,
    },
    Suspend {
        reply: oneshot::Sender<()>,
    },
    Resume {
        /// Result of the handle-side `PermissionGate::status()` check; the
        /// provider lives outside the session context
        still_authorized: bool,
        reply: oneshot::Sender<SessionResult<()>>,
    },
}

/// Handle to the capture session.
///
/// Cloneable; all clones talk to the same session context. This is the only
/// entry point to the underlying capture graph.
#[derive(Clone)]
pub struct CaptureCoordinator {
    tx: mpsc::UnboundedSender<Command>,
    store: Arc<SessionStateStore>,
    permissions: PermissionGate,
}

impl CaptureCoordinator {
    /// Spawn the session context and return a handle to it.
    ///
    /// Nothing touches the hardware until [`CaptureCoordinator::initialize`]
    /// is called.
    pub fn new(
        backend: Box<dyn CaptureBackend>,
        devices: Box<dyn DeviceProvider>,
        permissions: PermissionGate,
        config: SessionConfig,
    ) -> Self {
        let store = Arc::new(SessionStateStore::new());
        let (tx, rx) = mpsc::unbounded_channel();

        let actor = SessionActor {
            graph: DeviceGraph::new(backend, devices),
            store: Arc::clone(&store),
            state: SessionState::default(),
            phase: Phase::Uninitialized,
            pending_photo: None,
            pending_stop: None,
            tx: tx.clone(),
            config,
        };
        tokio::spawn(actor.run(rx));

        Self {
            tx,
            store,
            permissions,
        }
    }

    /// The state store backing this session
    pub fn store(&self) -> Arc<SessionStateStore> {
        Arc::clone(&self.store)
    }

    /// The permission gate backing this session
    pub fn permissions(&self) -> &PermissionGate {
        &self.permissions
    }

    /// Initialize the session: verify permission, configure the capture
    /// graph, and start it.
    ///
    /// Idempotent: re-entrant calls while already Ready (or mid-transition)
    /// perform no second hardware configuration. Pre-warm and explicit UI
    /// calls both funnel through this same guard.
    ///
    /// # Errors
    /// * `SessionError::PermissionDenied` - Access denied or restricted; the
    ///   session stays Uninitialized
    /// * `SessionError::Device` - No usable device or output misconfiguration
    pub async fn initialize(&self) -> SessionResult<()> {
        let mut status = self.permissions.status();
        if !status.is_determined() {
            status = self.permissions.request_access().await;
        }
        if !status.is_authorized() {
            info!(state = %status, "Initialization blocked by permission state");
            return Err(SessionError::PermissionDenied);
        }

        self.request(|reply| Command::Initialize { reply }).await?
    }

    /// Capture a single photo.
    ///
    /// Legal only in Ready with no recording in progress. At most one capture
    /// can be in flight; a second call rejects with `OperationInProgress` and
    /// never issues a duplicate hardware request.
    pub async fn capture_photo(&self) -> SessionResult<CapturedMedia> {
        self.request(|reply| Command::CapturePhoto { reply }).await?
    }

    /// Start a recording.
    ///
    /// Returns once the hardware acknowledged recording began. The recording
    /// keeps running until [`CaptureCoordinator::stop_recording`] or the
    /// configured maximum duration ends it.
    pub async fn start_recording(&self) -> SessionResult<()> {
        self.request(|reply| Command::StartRecording { reply })
            .await?
    }

    /// Stop the active recording and await the finalized video.
    pub async fn stop_recording(&self) -> SessionResult<CapturedMedia> {
        self.request(|reply| Command::StopRecording { reply }).await?
    }

    /// Switch between front and back camera.
    ///
    /// Returns the new active position. On failure the previous position (and
    /// published state) is unchanged.
    pub async fn switch_camera(&self) -> SessionResult<CameraPosition> {
        self.request(|reply| Command::SwitchCamera { reply }).await?
    }

    /// Enable or disable the flash. Takes effect on the next capture.
    pub async fn set_flash(&self, enabled: bool) -> SessionResult<()> {
        self.request(|reply| Command::SetFlash { enabled, reply })
            .await?
    }

    /// Backgrounding: stop the session if Ready.
    ///
    /// An in-flight capture or recording is never aborted; suspension is
    /// skipped while one is outstanding.
    pub async fn suspend(&self) {
        let _ = self.request(|reply| Command::Suspend { reply }).await;
    }

    /// Foregrounding: restart a suspended session if still authorized.
    ///
    /// If authorization was revoked while backgrounded, the session returns
    /// to Uninitialized and `PermissionDenied` is surfaced; a fresh
    /// [`CaptureCoordinator::initialize`] is then required.
    pub async fn resume(&self) -> SessionResult<()> {
        // Status query only; resuming never re-prompts
        let still_authorized = self.permissions.status().is_authorized();
        self.request(|reply| Command::Resume {
            still_authorized,
            reply,
        })
        .await?
    }

    /// Send a command and await its reply. The session context outlives every
    /// handle, so a closed channel only happens at runtime shutdown.
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> SessionResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .map_err(|_| SessionError::SessionNotRunning)?;
        reply_rx.await.map_err(|_| SessionError::SessionNotRunning)
    }
}

impl std::fmt::Debug for CaptureCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureCoordinator")
            .field("state", &self.store.current())
            .finish()
    }
}

/// The session context: exclusive owner of the device graph, the pending
/// operation slots, and the writable session state.
struct SessionActor {
    graph: DeviceGraph,
    store: Arc<SessionStateStore>,
    /// Working copy of the published state
    state: SessionState,
    phase: Phase,
    pending_photo: Option<PendingOperation>,
    pending_stop: Option<PendingOperation>,
    /// Loopback sender used to marshal hardware callbacks onto this context
    tx: mpsc::UnboundedSender<Command>,
    config: SessionConfig,
}

impl SessionActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        debug!("Session context started");
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        debug!("Session context stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Initialize { reply } => {
                let _ = reply.send(self.handle_initialize());
            }
            Command::CapturePhoto { reply } => self.handle_capture_photo(reply),
            Command::PhotoFinished { result } => self.handle_photo_finished(result),
            Command::StartRecording { reply } => {
                let _ = reply.send(self.handle_start_recording());
            }
            Command::StopRecording { reply } => self.handle_stop_recording(reply),
            Command::RecordingFinished { result } => self.handle_recording_finished(result),
            Command::SwitchCamera { reply } => {
                let _ = reply.send(self.handle_switch_camera());
            }
            Command::SetFlash { enabled, reply } => {
                let _ = reply.send(self.handle_set_flash(enabled));
            }
            Command::Suspend { reply } => {
                self.handle_suspend();
                let _ = reply.send(());
            }
            Command::Resume {
                still_authorized,
                reply,
            } => {
                let _ = reply.send(self.handle_resume(still_authorized));
            }
        }
    }

    /// Replace the published snapshot with the current working state
    fn publish(&mut self) {
        self.store.publish(self.state);
    }

    fn handle_initialize(&mut self) -> SessionResult<()> {
        match self.phase {
            Phase::Uninitialized => {}
            // Re-entrancy guard: one hardware configuration transaction, one
            // running=true publication.
            _ => {
                debug!(phase = ?self.phase, "initialize is a no-op in this phase");
                return Ok(());
            }
        }

        self.phase = Phase::Configuring;
        match self.configure_and_start(self.config.default_position) {
            Ok(position) => {
                self.phase = Phase::Ready;
                self.state.authorized = true;
                self.state.running = true;
                self.state.position = position;
                self.publish();
                info!(position = %position, "Session initialized");
                Ok(())
            }
            Err(e) => {
                self.phase = Phase::Uninitialized;
                error!(error = %e, "Session initialization failed");
                Err(e.into())
            }
        }
    }

    /// Configure the graph for `position` and start it, falling back to the
    /// opposite position once if no device exists at the requested one.
    /// Returns the position actually configured.
    fn configure_and_start(
        &mut self,
        position: CameraPosition,
    ) -> Result<CameraPosition, DeviceError> {
        let configured = match self.graph.configure(position) {
            Ok(()) => position,
            Err(DeviceError::DeviceUnavailable(_)) => {
                let fallback = position.opposite();
                warn!(
                    requested = %position,
                    fallback = %fallback,
                    "Requested position unavailable, falling back"
                );
                self.graph.configure(fallback)?;
                fallback
            }
            Err(e) => return Err(e),
        };
        self.graph.start();
        Ok(configured)
    }

    /// Detect an externally stopped session and make the single allowed
    /// restart attempt (a full reconfigure + start, the initialize path).
    /// Returns an error when the restart also fails.
    fn ensure_running(&mut self) -> SessionResult<()> {
        if self.graph.is_running() {
            return Ok(());
        }

        warn!("Session stopped unexpectedly, attempting one restart");
        self.graph.mark_stopped();
        let restarted = self
            .configure_and_start(self.state.position)
            .is_ok()
            && self.graph.is_running();
        if restarted {
            if !self.state.running {
                self.state.running = true;
                self.publish();
            }
            return Ok(());
        }

        self.phase = Phase::Uninitialized;
        // The start attempt above set the graph's cached flag; sync it so a
        // later initialize() does not skip backend.start().
        self.graph.mark_stopped();
        self.state.running = false;
        self.publish();
        Err(SessionError::SessionNotRunning)
    }

    fn handle_capture_photo(&mut self, reply: oneshot::Sender<SessionResult<CapturedMedia>>) {
        if !self.state.authorized {
            let _ = reply.send(Err(SessionError::PermissionDenied));
            return;
        }
        match self.phase {
            Phase::Ready => {}
            Phase::Capturing => {
                debug!("Photo capture rejected: one already in flight");
                let _ = reply.send(Err(SessionError::OperationInProgress));
                return;
            }
            _ => {
                let _ = reply.send(Err(SessionError::NotReady));
                return;
            }
        }
        if let Err(e) = self.ensure_running() {
            let _ = reply.send(Err(e));
            return;
        }

        let settings = PhotoSettings {
            flash: self.state.flash_enabled,
        };
        let operation = PendingOperation::new(OperationKind::Capture, reply);
        info!(id = %operation.id, flash = settings.flash, "Issuing photo capture");
        self.pending_photo = Some(operation);
        self.phase = Phase::Capturing;

        // The completion may fire on any thread; re-enter the session
        // context through the command channel. FnOnce + a single sender use
        // make double resolution impossible.
        let tx = self.tx.clone();
        self.graph.capture_photo(
            settings,
            Box::new(move |result| {
                let _ = tx.send(Command::PhotoFinished { result });
            }),
        );
    }

    fn handle_photo_finished(&mut self, result: Result<CapturedMedia, String>) {
        let Some(operation) = self.pending_photo.take() else {
            warn!("Photo completion with no pending capture, discarding");
            return;
        };
        if self.phase == Phase::Capturing {
            self.phase = Phase::Ready;
        }
        operation.resolve(result.map_err(SessionError::CaptureFailed));
    }

    fn handle_start_recording(&mut self) -> SessionResult<()> {
        if !self.state.authorized {
            return Err(SessionError::PermissionDenied);
        }
        match self.phase {
            Phase::Ready => {}
            Phase::Recording | Phase::Capturing => return Err(SessionError::OperationInProgress),
            _ => return Err(SessionError::NotReady),
        }
        self.ensure_running()?;

        let output_path = self.config.video_output_path();
        if let Some(parent) = output_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return Err(SessionError::RecordingFailed(format!(
                    "Cannot create output directory: {}",
                    e
                )));
            }
        }

        let request = RecordingRequest {
            output_path: output_path.clone(),
            max_duration: self.config.max_recording(),
        };
        info!(
            output = %output_path.display(),
            max_secs = request.max_duration.as_secs(),
            "Starting recording"
        );

        let tx = self.tx.clone();
        self.graph
            .start_recording(
                request,
                Box::new(move |result| {
                    let _ = tx.send(Command::RecordingFinished { result });
                }),
            )
            .map_err(SessionError::RecordingFailed)?;

        self.phase = Phase::Recording;
        self.state.recording = true;
        self.publish();
        Ok(())
    }

    fn handle_stop_recording(&mut self, reply: oneshot::Sender<SessionResult<CapturedMedia>>) {
        if self.phase != Phase::Recording {
            let _ = reply.send(Err(SessionError::NotRecording));
            return;
        }
        if self.pending_stop.is_some() {
            // A stop is already awaiting finalization
            let _ = reply.send(Err(SessionError::OperationInProgress));
            return;
        }

        let operation = PendingOperation::new(OperationKind::StopRecording, reply);
        info!(id = %operation.id, "Stopping recording");
        self.pending_stop = Some(operation);
        self.graph.stop_recording();
    }

    fn handle_recording_finished(&mut self, result: Result<CapturedMedia, String>) {
        if self.phase == Phase::Recording {
            self.phase = Phase::Ready;
        }
        self.state.recording = false;
        self.publish();

        match (self.pending_stop.take(), result) {
            (Some(operation), result) => {
                operation.resolve(result.map_err(SessionError::RecordingFailed));
            }
            (None, Ok(media)) => {
                // Max-duration self-termination: nobody is awaiting the
                // result, the file already landed on disk.
                info!(
                    file = ?media.file,
                    "Recording self-terminated at maximum duration"
                );
            }
            (None, Err(e)) => {
                error!(error = %e, "Recording failed");
            }
        }
    }

    fn handle_switch_camera(&mut self) -> SessionResult<CameraPosition> {
        match self.phase {
            Phase::Ready => {}
            Phase::Capturing | Phase::Recording => return Err(SessionError::OperationInProgress),
            _ => return Err(SessionError::NotReady),
        }

        let target = self.state.position.opposite();
        self.graph.switch_input(target)?;

        self.state.position = target;
        self.publish();
        info!(position = %target, "Camera switched");
        Ok(target)
    }

    fn handle_set_flash(&mut self, enabled: bool) -> SessionResult<()> {
        if self.phase == Phase::Uninitialized {
            return Err(SessionError::NotReady);
        }
        if self.state.flash_enabled != enabled {
            self.state.flash_enabled = enabled;
            self.publish();
            debug!(enabled, "Flash setting updated");
        }
        Ok(())
    }

    fn handle_suspend(&mut self) {
        match self.phase {
            Phase::Ready => {
                info!("Suspending session");
                self.graph.stop();
                self.phase = Phase::Suspended;
                self.state.running = false;
                self.publish();
            }
            Phase::Capturing | Phase::Recording => {
                // Never abort an in-flight hardware operation on
                // backgrounding; the operation completes first.
                debug!(phase = ?self.phase, "Suspend skipped: operation in flight");
            }
            _ => {
                debug!(phase = ?self.phase, "Suspend is a no-op in this phase");
            }
        }
    }

    fn handle_resume(&mut self, still_authorized: bool) -> SessionResult<()> {
        if self.phase != Phase::Suspended {
            debug!(phase = ?self.phase, "Resume is a no-op in this phase");
            return Ok(());
        }

        // Authorization may have been revoked while backgrounded
        if !still_authorized {
            warn!("Authorization revoked while suspended, returning to Uninitialized");
            self.phase = Phase::Uninitialized;
            self.state = SessionState {
                flash_enabled: self.state.flash_enabled,
                position: self.state.position,
                ..SessionState::default()
            };
            self.publish();
            return Err(SessionError::PermissionDenied);
        }

        info!("Resuming session");
        self.graph.start();
        self.phase = Phase::Ready;
        self.state.running = true;
        self.publish();
        Ok(())
    }
}
