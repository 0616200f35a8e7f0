// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture session
//!
//! Two layers: `DeviceError` for failures inside a device-graph transaction,
//! `SessionError` for everything the coordinator surfaces to callers.

use crate::backend::types::CameraPosition;
use std::fmt;

/// Result type alias for session-facing operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors raised by the device graph while building or mutating the
/// capture graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// No physical device matches the requested position
    DeviceUnavailable(CameraPosition),
    /// An output could not be attached. Fatal misconfiguration, not retried.
    OutputUnavailable(String),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::DeviceUnavailable(position) => {
                write!(f, "No camera device available for position: {}", position)
            }
            DeviceError::OutputUnavailable(msg) => {
                write!(f, "Output could not be attached: {}", msg)
            }
        }
    }
}

impl std::error::Error for DeviceError {}

/// Errors surfaced by the capture coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Hardware access was denied or restricted. Recoverable only through an
    /// external settings change; surfaced, never retried.
    PermissionDenied,
    /// Device graph failure (missing device, output misconfiguration)
    Device(DeviceError),
    /// Operation requires the Ready state
    NotReady,
    /// An operation of this kind is already in flight
    OperationInProgress,
    /// Stop requested while no recording is active
    NotRecording,
    /// The underlying session stopped unexpectedly and one restart attempt
    /// also failed
    SessionNotRunning,
    /// Hardware reported a photo capture failure
    CaptureFailed(String),
    /// Hardware reported a failure during recording
    RecordingFailed(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::PermissionDenied => write!(f, "Camera access denied"),
            SessionError::Device(e) => write!(f, "Device error: {}", e),
            SessionError::NotReady => write!(f, "Session is not ready"),
            SessionError::OperationInProgress => {
                write!(f, "An operation of this kind is already in progress")
            }
            SessionError::NotRecording => write!(f, "No recording in progress"),
            SessionError::SessionNotRunning => write!(f, "Session is not running"),
            SessionError::CaptureFailed(msg) => write!(f, "Photo capture failed: {}", msg),
            SessionError::RecordingFailed(msg) => write!(f, "Recording failed: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<DeviceError> for SessionError {
    fn from(err: DeviceError) -> Self {
        SessionError::Device(err)
    }
}
