// SPDX-License-Identifier: GPL-3.0-only

//! capture-session - camera capture session management
//!
//! This library owns a single shared hardware resource (a capture graph with
//! one active input device and two outputs), serializes every mutation of it
//! onto one session context, and bridges hardware completion callbacks into
//! awaited results.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`session`]: Coordinator, device graph, state store, permission gate,
//!   and lifecycle controller
//! - [`backend`]: Platform-collaborator traits and the software-simulated
//!   backend
//! - [`config`]: Session configuration handling
//! - [`errors`]: Error types
//!
//! # Example
//!
//! ```no_run
//! use capture_session::backend::software::{SimulatedDevices, SimulatedPermissions, SoftwareBackend};
//! use capture_session::config::SessionConfig;
//! use capture_session::session::{CaptureCoordinator, PermissionGate};
//!
//! # async fn demo() -> Result<(), capture_session::errors::SessionError> {
//! let coordinator = CaptureCoordinator::new(
//!     Box::new(SoftwareBackend::new()),
//!     Box::new(SimulatedDevices::both()),
//!     PermissionGate::new(SimulatedPermissions::granting()),
//!     SessionConfig::default(),
//! );
//! coordinator.initialize().await?;
//! let photo = coordinator.capture_photo().await?;
//! # let _ = photo;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod errors;
pub mod session;

// Re-export commonly used types
pub use backend::{AuthorizationState, CameraPosition, CapturedMedia, MediaKind, SessionState};
pub use config::SessionConfig;
pub use errors::{DeviceError, SessionError};
pub use session::{CaptureCoordinator, LifecycleController, PermissionGate, PreWarmHint};
