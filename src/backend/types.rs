// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for capture backends

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Hardware-access authorization state.
///
/// Set once by the permission provider; the only legal transitions are
/// `NotDetermined` to one of the determined states. Determined states are
/// terminal until an external OS-level reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorizationState {
    /// The user has never been asked
    #[default]
    NotDetermined,
    /// The user declined access
    Denied,
    /// Access is blocked by policy (parental controls, MDM profile)
    Restricted,
    /// Access granted
    Authorized,
}

impl AuthorizationState {
    /// Whether this state permits touching the capture hardware
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthorizationState::Authorized)
    }

    /// Whether the one-time OS prompt may still be shown
    pub fn is_determined(&self) -> bool {
        !matches!(self, AuthorizationState::NotDetermined)
    }
}

impl std::fmt::Display for AuthorizationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthorizationState::NotDetermined => write!(f, "not determined"),
            AuthorizationState::Denied => write!(f, "denied"),
            AuthorizationState::Restricted => write!(f, "restricted"),
            AuthorizationState::Authorized => write!(f, "authorized"),
        }
    }
}

/// Physical camera position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CameraPosition {
    /// User-facing camera
    Front,
    /// World-facing camera
    #[default]
    Back,
}

impl CameraPosition {
    /// The other position (used when switching cameras)
    pub fn opposite(&self) -> Self {
        match self {
            CameraPosition::Front => CameraPosition::Back,
            CameraPosition::Back => CameraPosition::Front,
        }
    }
}

impl std::fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraPosition::Front => write!(f, "front"),
            CameraPosition::Back => write!(f, "back"),
        }
    }
}

/// Handle to a physical capture device, resolved by a [`DeviceProvider`]
///
/// [`DeviceProvider`]: crate::backend::DeviceProvider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    /// Stable device identifier (node id, unique name)
    pub id: String,
    /// Human-readable device name
    pub name: String,
    /// Position this device faces
    pub position: CameraPosition,
}

/// The two standard outputs attached to the capture graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Still-image output
    StillImage,
    /// Video-file output
    VideoFile,
}

impl std::fmt::Display for OutputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputKind::StillImage => write!(f, "still-image"),
            OutputKind::VideoFile => write!(f, "video-file"),
        }
    }
}

/// Kind of captured media
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
}

/// One captured photo or finalized recording.
///
/// Created exactly once per successful capture; ownership passes to the
/// caller and the session holds no reference after delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedMedia {
    /// Photo or video
    pub kind: MediaKind,
    /// Encoded media bytes
    pub bytes: Vec<u8>,
    /// On-disk location (videos only; photos are delivered in memory)
    pub file: Option<PathBuf>,
}

impl CapturedMedia {
    /// Wrap photo bytes
    pub fn photo(bytes: Vec<u8>) -> Self {
        Self {
            kind: MediaKind::Photo,
            bytes,
            file: None,
        }
    }

    /// Wrap a finalized video file
    pub fn video(bytes: Vec<u8>, file: PathBuf) -> Self {
        Self {
            kind: MediaKind::Video,
            bytes,
            file: Some(file),
        }
    }
}

/// Per-capture parameters handed to the backend when a photo is requested
#[derive(Debug, Clone, Copy, Default)]
pub struct PhotoSettings {
    /// Fire the flash for this capture
    pub flash: bool,
}

/// Parameters for starting a recording
#[derive(Debug, Clone)]
pub struct RecordingRequest {
    /// Where the finalized file should land
    pub output_path: PathBuf,
    /// Upper bound after which an unterminated recording self-terminates
    pub max_duration: Duration,
}

/// Observable session state.
///
/// An immutable snapshot; the coordinator replaces the whole value on every
/// state-affecting event, so no partial mutation is ever observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionState {
    /// Permission granted and verified
    pub authorized: bool,
    /// Underlying capture session is running
    pub running: bool,
    /// Flash will fire on the next capture
    pub flash_enabled: bool,
    /// A recording is in progress
    pub recording: bool,
    /// Active camera position
    pub position: CameraPosition,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_opposite_is_involutive() {
        assert_eq!(CameraPosition::Front.opposite(), CameraPosition::Back);
        assert_eq!(CameraPosition::Back.opposite(), CameraPosition::Front);
        assert_eq!(
            CameraPosition::Front.opposite().opposite(),
            CameraPosition::Front
        );
    }

    #[test]
    fn test_authorization_predicates() {
        assert!(AuthorizationState::Authorized.is_authorized());
        assert!(!AuthorizationState::Denied.is_authorized());
        assert!(!AuthorizationState::NotDetermined.is_determined());
        assert!(AuthorizationState::Restricted.is_determined());
    }

    #[test]
    fn test_captured_media_constructors() {
        let photo = CapturedMedia::photo(vec![1, 2, 3]);
        assert_eq!(photo.kind, MediaKind::Photo);
        assert!(photo.file.is_none());

        let video = CapturedMedia::video(vec![4, 5], PathBuf::from("/tmp/v.gif"));
        assert_eq!(video.kind, MediaKind::Video);
        assert_eq!(video.file.as_deref(), Some(std::path::Path::new("/tmp/v.gif")));
    }
}
