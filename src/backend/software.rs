// SPDX-License-Identifier: GPL-3.0-only

//! Software-simulated capture backend
//!
//! A complete backend implementation with no hardware dependency: two
//! simulated devices (front/back), synthetic test-pattern frames, photos
//! encoded as PNG, recordings as animated GIF files. Used by the CLI and
//! available to tests.
//!
//! Completion callbacks are invoked from dedicated OS threads, reproducing
//! the delivery model of a real capture stack where completions arrive on
//! arbitrary threads outside the session context.

use super::types::{
    AuthorizationState, CameraPosition, CapturedMedia, DeviceHandle, OutputKind, PhotoSettings,
    RecordingRequest,
};
use super::{
    CaptureBackend, DeviceProvider, PermissionProvider, PhotoCompletion, RecordingCompletion,
};
use crate::errors::DeviceError;
use futures::future::BoxFuture;
use image::codecs::gif::GifEncoder;
use image::{Delay, Frame, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::mpsc::{RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Synthetic frame dimensions
const FRAME_WIDTH: u32 = 320;
const FRAME_HEIGHT: u32 = 240;

/// Simulated frame interval for recordings (10 fps)
const RECORDING_FRAME_MS: u64 = 100;

/// Permission provider with a scripted prompt outcome.
///
/// Starts `NotDetermined`; the first `request_access` resolves to the
/// configured outcome after a short simulated prompt delay.
pub struct SimulatedPermissions {
    state: Mutex<AuthorizationState>,
    outcome: AuthorizationState,
    prompt_delay: Duration,
}

impl SimulatedPermissions {
    /// Provider whose prompt will grant access
    pub fn granting() -> Arc<Self> {
        Self::with_outcome(AuthorizationState::Authorized)
    }

    /// Provider whose prompt will deny access
    pub fn denying() -> Arc<Self> {
        Self::with_outcome(AuthorizationState::Denied)
    }

    /// Provider resolving the prompt to an arbitrary determined state
    pub fn with_outcome(outcome: AuthorizationState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(AuthorizationState::NotDetermined),
            outcome,
            prompt_delay: Duration::from_millis(20),
        })
    }
}

impl PermissionProvider for SimulatedPermissions {
    fn status(&self) -> AuthorizationState {
        *self.state.lock().unwrap()
    }

    fn request_access(&self) -> BoxFuture<'static, AuthorizationState> {
        let mut state = self.state.lock().unwrap();
        if state.is_determined() {
            let current = *state;
            return Box::pin(async move { current });
        }

        info!("Simulated permission prompt shown");
        // One-shot prompt: the outcome is decided now, delivery is delayed
        // to model the user interaction.
        *state = self.outcome;
        let outcome = self.outcome;
        let delay = self.prompt_delay;
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            outcome
        })
    }
}

/// Device provider over the two simulated cameras
pub struct SimulatedDevices {
    /// Positions that exist on this simulated machine
    available: Vec<CameraPosition>,
}

impl SimulatedDevices {
    /// Both front and back cameras present
    pub fn both() -> Self {
        Self {
            available: vec![CameraPosition::Front, CameraPosition::Back],
        }
    }

    /// Only the given position present
    pub fn only(position: CameraPosition) -> Self {
        Self {
            available: vec![position],
        }
    }
}

impl DeviceProvider for SimulatedDevices {
    fn default_device(&self, position: CameraPosition) -> Option<DeviceHandle> {
        self.available.contains(&position).then(|| DeviceHandle {
            id: format!("sim-{}", position),
            name: format!("Simulated {} camera", position),
            position,
        })
    }
}

/// Active simulated recording
struct RecordingSession {
    stop_tx: Sender<()>,
}

/// Backend state shared with worker threads
struct Inner {
    input: Option<DeviceHandle>,
    outputs: Vec<OutputKind>,
    in_transaction: bool,
    running: bool,
    recording: Option<RecordingSession>,
    /// Monotonic capture counter, used to animate the test pattern
    sequence: u64,
}

/// Software capture backend
pub struct SoftwareBackend {
    shared: Arc<Mutex<Inner>>,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Inner {
                input: None,
                outputs: Vec::new(),
                in_transaction: false,
                running: false,
                recording: None,
                sequence: 0,
            })),
        }
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureBackend for SoftwareBackend {
    fn begin_configuration(&mut self) {
        let mut inner = self.shared.lock().unwrap();
        debug_assert!(!inner.in_transaction, "nested configuration transaction");
        inner.in_transaction = true;
    }

    fn commit_configuration(&mut self) {
        let mut inner = self.shared.lock().unwrap();
        inner.in_transaction = false;
        debug!(
            input = ?inner.input.as_ref().map(|d| &d.id),
            outputs = inner.outputs.len(),
            "Configuration committed"
        );
    }

    fn add_input(&mut self, device: &DeviceHandle) -> Result<(), DeviceError> {
        let mut inner = self.shared.lock().unwrap();
        if inner.input.is_some() {
            // Single-input graph; a real stack would reject this too
            return Err(DeviceError::DeviceUnavailable(device.position));
        }
        inner.input = Some(device.clone());
        Ok(())
    }

    fn remove_input(&mut self) {
        self.shared.lock().unwrap().input = None;
    }

    fn add_output(&mut self, output: OutputKind) -> Result<(), DeviceError> {
        let mut inner = self.shared.lock().unwrap();
        if inner.outputs.contains(&output) {
            return Err(DeviceError::OutputUnavailable(format!(
                "{} output already attached",
                output
            )));
        }
        inner.outputs.push(output);
        Ok(())
    }

    fn remove_output(&mut self, output: OutputKind) {
        self.shared.lock().unwrap().outputs.retain(|o| *o != output);
    }

    fn start(&mut self) {
        self.shared.lock().unwrap().running = true;
    }

    fn stop(&mut self) {
        self.shared.lock().unwrap().running = false;
    }

    fn is_running(&self) -> bool {
        self.shared.lock().unwrap().running
    }

    fn capture_photo(&mut self, settings: PhotoSettings, completion: PhotoCompletion) {
        let (position, sequence, ok) = {
            let mut inner = self.shared.lock().unwrap();
            inner.sequence += 1;
            (
                inner.input.as_ref().map(|d| d.position),
                inner.sequence,
                inner.running && inner.outputs.contains(&OutputKind::StillImage),
            )
        };

        // Deliver on a dedicated thread, as real hardware callbacks would
        std::thread::spawn(move || {
            if !ok {
                completion(Err("Still-image output not available".to_string()));
                return;
            }
            let Some(position) = position else {
                completion(Err("No input device attached".to_string()));
                return;
            };

            // Simulated sensor latency
            std::thread::sleep(Duration::from_millis(15));

            let frame = test_pattern(position, sequence, settings.flash);
            let mut bytes = Vec::new();
            let result = image::DynamicImage::ImageRgba8(frame)
                .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
                .map(|_| CapturedMedia::photo(bytes))
                .map_err(|e| format!("PNG encoding failed: {}", e));
            completion(result);
        });
    }

    fn start_recording(
        &mut self,
        request: RecordingRequest,
        completion: RecordingCompletion,
    ) -> Result<(), String> {
        let mut inner = self.shared.lock().unwrap();
        if inner.recording.is_some() {
            return Err("Recording already in progress".to_string());
        }
        if !inner.running || !inner.outputs.contains(&OutputKind::VideoFile) {
            return Err("Video-file output not available".to_string());
        }
        let Some(position) = inner.input.as_ref().map(|d| d.position) else {
            return Err("No input device attached".to_string());
        };

        let (stop_tx, stop_rx) = std::sync::mpsc::channel();
        inner.recording = Some(RecordingSession { stop_tx });
        let shared = Arc::clone(&self.shared);

        info!(output = %request.output_path.display(), "Simulated recording started");

        std::thread::spawn(move || {
            let started = Instant::now();
            // Wait for an explicit stop or the max-duration bound
            match stop_rx.recv_timeout(request.max_duration) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
                Err(RecvTimeoutError::Timeout) => {
                    warn!("Recording hit maximum duration, self-terminating");
                }
            }
            let elapsed = started.elapsed();
            shared.lock().unwrap().recording = None;

            let result = finalize_recording(position, elapsed, &request.output_path);
            completion(result);
        });

        Ok(())
    }

    fn stop_recording(&mut self) {
        let inner = self.shared.lock().unwrap();
        if let Some(session) = inner.recording.as_ref() {
            // The worker thread finalizes and fires the completion
            let _ = session.stop_tx.send(());
        } else {
            debug!("stop_recording with no active recording, ignoring");
        }
    }
}

/// Encode the recording as an animated GIF and write it to disk
fn finalize_recording(
    position: CameraPosition,
    elapsed: Duration,
    output_path: &std::path::Path,
) -> Result<CapturedMedia, String> {
    let frame_count = (elapsed.as_millis() as u64 / RECORDING_FRAME_MS).clamp(2, 30);

    let mut bytes = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut bytes);
        for seq in 0..frame_count {
            let frame = Frame::from_parts(
                test_pattern(position, seq, false),
                0,
                0,
                Delay::from_numer_denom_ms(RECORDING_FRAME_MS as u32, 1),
            );
            encoder
                .encode_frame(frame)
                .map_err(|e| format!("GIF encoding failed: {}", e))?;
        }
    }

    std::fs::write(output_path, &bytes)
        .map_err(|e| format!("Cannot write recording file: {}", e))?;

    info!(
        path = %output_path.display(),
        frames = frame_count,
        secs = elapsed.as_secs_f32(),
        "Simulated recording finalized"
    );
    Ok(CapturedMedia::video(bytes, output_path.to_path_buf()))
}

/// Generate a synthetic test-pattern frame.
///
/// Diagonal gradient animated by `seq`; the front camera is tinted warm,
/// the back camera cool, and flash brightens the whole pattern.
fn test_pattern(position: CameraPosition, seq: u64, flash: bool) -> RgbaImage {
    let shift = ((seq * 8) % 256) as u32;
    let boost: u16 = if flash { 64 } else { 0 };
    RgbaImage::from_fn(FRAME_WIDTH, FRAME_HEIGHT, |x, y| {
        let g = (((x + y + shift) % 256) as u16 + boost).min(255) as u8;
        match position {
            CameraPosition::Front => Rgba([g, g / 2, 32, 255]),
            CameraPosition::Back => Rgba([32, g / 2, g, 255]),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn configured_backend() -> SoftwareBackend {
        let mut backend = SoftwareBackend::new();
        let devices = SimulatedDevices::both();
        let device = devices.default_device(CameraPosition::Back).unwrap();
        backend.begin_configuration();
        backend.add_input(&device).unwrap();
        backend.add_output(OutputKind::StillImage).unwrap();
        backend.add_output(OutputKind::VideoFile).unwrap();
        backend.commit_configuration();
        backend.start();
        backend
    }

    #[test]
    fn test_photo_completion_delivers_png() {
        let mut backend = configured_backend();
        let (tx, rx) = mpsc::channel();
        backend.capture_photo(
            PhotoSettings { flash: false },
            Box::new(move |result| tx.send(result).unwrap()),
        );

        let media = rx.recv_timeout(Duration::from_secs(2)).unwrap().unwrap();
        // PNG signature
        assert_eq!(&media.bytes[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
        assert!(media.file.is_none());
    }

    #[test]
    fn test_photo_fails_when_not_running() {
        let mut backend = configured_backend();
        backend.stop();

        let (tx, rx) = mpsc::channel();
        backend.capture_photo(
            PhotoSettings::default(),
            Box::new(move |result| tx.send(result).unwrap()),
        );
        assert!(rx.recv_timeout(Duration::from_secs(2)).unwrap().is_err());
    }

    #[test]
    fn test_recording_roundtrip_writes_gif() {
        let mut backend = configured_backend();
        let dir = std::env::temp_dir().join(format!("capture-session-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("clip.gif");

        let (tx, rx) = mpsc::channel();
        backend
            .start_recording(
                RecordingRequest {
                    output_path: path.clone(),
                    max_duration: Duration::from_secs(10),
                },
                Box::new(move |result| tx.send(result).unwrap()),
            )
            .unwrap();

        std::thread::sleep(Duration::from_millis(250));
        backend.stop_recording();

        let media = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(&media.bytes[..6], b"GIF89a");
        assert!(path.exists());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_recording_self_terminates_at_max_duration() {
        let mut backend = configured_backend();
        let dir = std::env::temp_dir().join(format!("capture-session-max-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("short.gif");

        let (tx, rx) = mpsc::channel();
        backend
            .start_recording(
                RecordingRequest {
                    output_path: path.clone(),
                    max_duration: Duration::from_millis(200),
                },
                Box::new(move |result| tx.send(result).unwrap()),
            )
            .unwrap();

        // No stop issued; the bound fires on its own
        let media = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert_eq!(media.kind, crate::backend::MediaKind::Video);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_second_recording_rejected() {
        let mut backend = configured_backend();
        let dir = std::env::temp_dir();
        let request = |name: &str| RecordingRequest {
            output_path: dir.join(name),
            max_duration: Duration::from_secs(5),
        };

        backend
            .start_recording(request("a.gif"), Box::new(|_| {}))
            .unwrap();
        assert!(
            backend
                .start_recording(request("b.gif"), Box::new(|_| {}))
                .is_err()
        );
        backend.stop_recording();
    }

    #[test]
    fn test_duplicate_output_rejected() {
        let mut backend = SoftwareBackend::new();
        backend.begin_configuration();
        backend.add_output(OutputKind::StillImage).unwrap();
        let err = backend.add_output(OutputKind::StillImage).unwrap_err();
        assert!(matches!(err, DeviceError::OutputUnavailable(_)));
        backend.commit_configuration();
    }
}
