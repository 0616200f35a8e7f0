// SPDX-License-Identifier: GPL-3.0-only

//! Device graph: the capture session's input and outputs
//!
//! Owns the underlying capture graph exclusively. Every mutation happens
//! inside a begin/commit configuration transaction so no external observer
//! sees an intermediate graph with zero inputs or duplicated outputs.
//!
//! All methods must be called from the session context; the graph itself is
//! not safe for concurrent configuration.

use crate::backend::{
    CameraPosition, CaptureBackend, DeviceHandle, DeviceProvider, OutputKind, PhotoCompletion,
    PhotoSettings, RecordingCompletion, RecordingRequest,
};
use crate::errors::DeviceError;
use tracing::{debug, info, warn};

/// Owner of the capture graph: one active input, two standard outputs
pub struct DeviceGraph {
    backend: Box<dyn CaptureBackend>,
    devices: Box<dyn DeviceProvider>,
    /// The input currently attached, if configured
    active_input: Option<DeviceHandle>,
    /// The two standard outputs are attached once and kept across input
    /// switches
    outputs_attached: bool,
    running: bool,
}

impl DeviceGraph {
    /// Create a graph over a backend and a device provider.
    ///
    /// Nothing is configured until [`DeviceGraph::configure`] is called
    /// (lazy/on-demand contract).
    pub fn new(backend: Box<dyn CaptureBackend>, devices: Box<dyn DeviceProvider>) -> Self {
        Self {
            backend,
            devices,
            active_input: None,
            outputs_attached: false,
            running: false,
        }
    }

    /// Build a fresh input for `position` and attach the two standard
    /// outputs, as one atomic configuration transaction.
    ///
    /// # Errors
    /// * `DeviceError::DeviceUnavailable` - No device matches `position`
    /// * `DeviceError::OutputUnavailable` - An output could not be attached;
    ///   fatal misconfiguration, not retried
    pub fn configure(&mut self, position: CameraPosition) -> Result<(), DeviceError> {
        let device = self
            .devices
            .default_device(position)
            .ok_or(DeviceError::DeviceUnavailable(position))?;

        info!(device = %device.name, position = %position, "Configuring capture graph");

        self.backend.begin_configuration();

        if self.active_input.is_some() {
            self.backend.remove_input();
        }

        if let Err(e) = self.backend.add_input(&device) {
            // Roll back to the previous input rather than committing an
            // empty graph.
            self.rollback_input();
            self.backend.commit_configuration();
            return Err(e);
        }

        if !self.outputs_attached {
            let mut attached = Vec::new();
            for output in [OutputKind::StillImage, OutputKind::VideoFile] {
                if let Err(e) = self.backend.add_output(output) {
                    warn!(output = %output, error = %e, "Output attachment failed");
                    // Symmetric rollback: detach outputs attached earlier in
                    // this transaction before restoring the input.
                    for prior in attached {
                        self.backend.remove_output(prior);
                    }
                    self.backend.remove_input();
                    self.rollback_input();
                    self.backend.commit_configuration();
                    return Err(e);
                }
                attached.push(output);
            }
            self.outputs_attached = true;
        }

        self.backend.commit_configuration();
        self.active_input = Some(device);
        Ok(())
    }

    /// Swap the active input for one at `position` inside a single atomic
    /// transaction.
    ///
    /// If the new input cannot be added the transaction rolls back to the
    /// previous input; the graph is never left empty.
    pub fn switch_input(&mut self, position: CameraPosition) -> Result<(), DeviceError> {
        // Resolve the target device before touching the graph
        let device = self
            .devices
            .default_device(position)
            .ok_or(DeviceError::DeviceUnavailable(position))?;

        info!(
            from = ?self.active_input.as_ref().map(|d| d.position),
            to = %position,
            "Switching capture input"
        );

        self.backend.begin_configuration();
        self.backend.remove_input();

        if let Err(e) = self.backend.add_input(&device) {
            warn!(error = %e, "New input rejected, rolling back to previous input");
            self.rollback_input();
            self.backend.commit_configuration();
            return Err(e);
        }

        self.backend.commit_configuration();
        self.active_input = Some(device);
        Ok(())
    }

    /// Re-attach the previously active input after a failed mutation.
    ///
    /// Must be called inside an open configuration transaction.
    fn rollback_input(&mut self) {
        if let Some(previous) = self.active_input.clone() {
            if let Err(e) = self.backend.add_input(&previous) {
                // The previous device vanished as well; the graph stays
                // unconfigured and the caller sees the original error.
                warn!(device = %previous.name, error = %e, "Rollback re-attach failed");
                self.active_input = None;
            }
        }
    }

    /// Start the underlying session. No-op if already running.
    pub fn start(&mut self) {
        if self.running {
            debug!("Session already running, start is a no-op");
            return;
        }
        info!("Starting capture session");
        self.backend.start();
        self.running = true;
    }

    /// Stop the underlying session. No-op if already stopped.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        info!("Stopping capture session");
        self.backend.stop();
        self.running = false;
    }

    /// Whether the underlying session reports itself running.
    ///
    /// Queries the backend rather than the cached flag so an externally
    /// stopped session is detected.
    pub fn is_running(&self) -> bool {
        let running = self.backend.is_running();
        if running != self.running {
            warn!(
                cached = self.running,
                actual = running,
                "Session running state diverged from backend"
            );
        }
        running
    }

    /// Whether an input has been configured
    pub fn is_configured(&self) -> bool {
        self.active_input.is_some()
    }

    /// Position of the active input, if configured
    pub fn position(&self) -> Option<CameraPosition> {
        self.active_input.as_ref().map(|d| d.position)
    }

    /// Issue a one-shot photo capture on the still-image output
    pub fn capture_photo(&mut self, settings: PhotoSettings, completion: PhotoCompletion) {
        self.backend.capture_photo(settings, completion);
    }

    /// Start a recording on the video-file output
    pub fn start_recording(
        &mut self,
        request: RecordingRequest,
        completion: RecordingCompletion,
    ) -> Result<(), String> {
        self.backend.start_recording(request, completion)
    }

    /// Stop the active recording; the result arrives via its completion
    pub fn stop_recording(&mut self) {
        self.backend.stop_recording();
    }

    /// Sync the cached running flag after an external stop was detected
    pub fn mark_stopped(&mut self) {
        self.running = false;
    }
}

impl std::fmt::Debug for DeviceGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceGraph")
            .field("active_input", &self.active_input)
            .field("outputs_attached", &self.outputs_attached)
            .field("running", &self.running)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CapturedMedia;
    use std::sync::{Arc, Mutex};

    /// Scriptable backend that records the transaction trace and can be told
    /// to reject specific devices.
    #[derive(Default)]
    struct TraceState {
        trace: Vec<String>,
        inputs: usize,
        outputs: usize,
        reject_device: Option<String>,
        reject_output: Option<OutputKind>,
        running: bool,
    }

    #[derive(Clone, Default)]
    struct TraceBackend {
        state: Arc<Mutex<TraceState>>,
    }

    impl CaptureBackend for TraceBackend {
        fn begin_configuration(&mut self) {
            self.state.lock().unwrap().trace.push("begin".into());
        }
        fn commit_configuration(&mut self) {
            self.state.lock().unwrap().trace.push("commit".into());
        }
        fn add_input(&mut self, device: &DeviceHandle) -> Result<(), DeviceError> {
            let mut s = self.state.lock().unwrap();
            if s.reject_device.as_deref() == Some(device.id.as_str()) {
                s.trace.push(format!("reject:{}", device.id));
                return Err(DeviceError::DeviceUnavailable(device.position));
            }
            s.trace.push(format!("add_input:{}", device.id));
            s.inputs += 1;
            Ok(())
        }
        fn remove_input(&mut self) {
            let mut s = self.state.lock().unwrap();
            s.trace.push("remove_input".into());
            s.inputs = s.inputs.saturating_sub(1);
        }
        fn add_output(&mut self, output: OutputKind) -> Result<(), DeviceError> {
            let mut s = self.state.lock().unwrap();
            if s.reject_output == Some(output) {
                s.trace.push(format!("reject_output:{}", output));
                return Err(DeviceError::OutputUnavailable(format!(
                    "{} rejected",
                    output
                )));
            }
            s.trace.push(format!("add_output:{}", output));
            s.outputs += 1;
            Ok(())
        }
        fn remove_output(&mut self, output: OutputKind) {
            let mut s = self.state.lock().unwrap();
            s.trace.push(format!("remove_output:{}", output));
            s.outputs = s.outputs.saturating_sub(1);
        }
        fn start(&mut self) {
            self.state.lock().unwrap().running = true;
        }
        fn stop(&mut self) {
            self.state.lock().unwrap().running = false;
        }
        fn is_running(&self) -> bool {
            self.state.lock().unwrap().running
        }
        fn capture_photo(&mut self, _settings: PhotoSettings, completion: PhotoCompletion) {
            completion(Ok(CapturedMedia::photo(vec![0u8])));
        }
        fn start_recording(
            &mut self,
            _request: RecordingRequest,
            _completion: RecordingCompletion,
        ) -> Result<(), String> {
            Ok(())
        }
        fn stop_recording(&mut self) {}
    }

    struct TwoCameras;

    impl DeviceProvider for TwoCameras {
        fn default_device(&self, position: CameraPosition) -> Option<DeviceHandle> {
            Some(DeviceHandle {
                id: format!("cam-{}", position),
                name: format!("Simulated {} camera", position),
                position,
            })
        }
    }

    struct BackOnly;

    impl DeviceProvider for BackOnly {
        fn default_device(&self, position: CameraPosition) -> Option<DeviceHandle> {
            (position == CameraPosition::Back).then(|| DeviceHandle {
                id: "cam-back".into(),
                name: "Back camera".into(),
                position,
            })
        }
    }

    fn graph_with(provider: Box<dyn DeviceProvider>) -> (DeviceGraph, TraceBackend) {
        let backend = TraceBackend::default();
        let graph = DeviceGraph::new(Box::new(backend.clone()), provider);
        (graph, backend)
    }

    #[test]
    fn test_configure_attaches_input_and_both_outputs() {
        let (mut graph, backend) = graph_with(Box::new(TwoCameras));
        graph.configure(CameraPosition::Back).unwrap();

        let s = backend.state.lock().unwrap();
        assert_eq!(s.inputs, 1);
        assert_eq!(s.outputs, 2);
        assert_eq!(s.trace.first().map(String::as_str), Some("begin"));
        assert_eq!(s.trace.last().map(String::as_str), Some("commit"));
        drop(s);
        assert_eq!(graph.position(), Some(CameraPosition::Back));
    }

    #[test]
    fn test_configure_missing_device_leaves_graph_untouched() {
        let (mut graph, backend) = graph_with(Box::new(BackOnly));
        let err = graph.configure(CameraPosition::Front).unwrap_err();

        assert_eq!(err, DeviceError::DeviceUnavailable(CameraPosition::Front));
        // Device resolution happens before the transaction opens
        assert!(backend.state.lock().unwrap().trace.is_empty());
        assert!(!graph.is_configured());
    }

    #[test]
    fn test_switch_input_swaps_atomically() {
        let (mut graph, backend) = graph_with(Box::new(TwoCameras));
        graph.configure(CameraPosition::Back).unwrap();
        backend.state.lock().unwrap().trace.clear();

        graph.switch_input(CameraPosition::Front).unwrap();

        let s = backend.state.lock().unwrap();
        assert_eq!(
            s.trace,
            vec!["begin", "remove_input", "add_input:cam-front", "commit"]
        );
        assert_eq!(s.inputs, 1);
        drop(s);
        assert_eq!(graph.position(), Some(CameraPosition::Front));
    }

    #[test]
    fn test_switch_input_rolls_back_on_rejected_device() {
        let (mut graph, backend) = graph_with(Box::new(TwoCameras));
        graph.configure(CameraPosition::Back).unwrap();
        backend.state.lock().unwrap().reject_device = Some("cam-front".into());

        let err = graph.switch_input(CameraPosition::Front).unwrap_err();
        assert_eq!(err, DeviceError::DeviceUnavailable(CameraPosition::Front));

        // Previous input re-attached, graph never committed empty
        let s = backend.state.lock().unwrap();
        assert_eq!(s.inputs, 1);
        assert_eq!(s.trace.last().map(String::as_str), Some("commit"));
        drop(s);
        assert_eq!(graph.position(), Some(CameraPosition::Back));
    }

    #[test]
    fn test_switch_to_missing_position_does_not_open_transaction() {
        let (mut graph, backend) = graph_with(Box::new(BackOnly));
        graph.configure(CameraPosition::Back).unwrap();
        backend.state.lock().unwrap().trace.clear();

        let err = graph.switch_input(CameraPosition::Front).unwrap_err();
        assert_eq!(err, DeviceError::DeviceUnavailable(CameraPosition::Front));
        assert!(backend.state.lock().unwrap().trace.is_empty());
        assert_eq!(graph.position(), Some(CameraPosition::Back));
    }

    #[test]
    fn test_output_failure_rolls_back_attached_outputs() {
        let (mut graph, backend) = graph_with(Box::new(TwoCameras));
        backend.state.lock().unwrap().reject_output = Some(OutputKind::VideoFile);

        let err = graph.configure(CameraPosition::Back).unwrap_err();
        assert!(matches!(err, DeviceError::OutputUnavailable(_)));

        let s = backend.state.lock().unwrap();
        // The still-image output attached first was detached again
        assert_eq!(s.outputs, 0);
        assert_eq!(s.inputs, 0);
        assert_eq!(s.trace.last().map(String::as_str), Some("commit"));
        drop(s);
        assert!(!graph.is_configured());

        // With the fault cleared a retry attaches both outputs cleanly
        backend.state.lock().unwrap().reject_output = None;
        graph.configure(CameraPosition::Back).unwrap();
        assert_eq!(backend.state.lock().unwrap().outputs, 2);
    }

    #[test]
    fn test_start_is_idempotent() {
        let (mut graph, backend) = graph_with(Box::new(TwoCameras));
        graph.configure(CameraPosition::Back).unwrap();

        graph.start();
        graph.start();
        assert!(graph.is_running());

        graph.stop();
        assert!(!backend.state.lock().unwrap().running);
        graph.stop();
    }

    #[test]
    fn test_reconfigure_does_not_duplicate_outputs() {
        let (mut graph, backend) = graph_with(Box::new(TwoCameras));
        graph.configure(CameraPosition::Back).unwrap();
        graph.configure(CameraPosition::Front).unwrap();

        let s = backend.state.lock().unwrap();
        assert_eq!(s.outputs, 2);
        assert_eq!(s.inputs, 1);
    }
}
