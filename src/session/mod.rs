// SPDX-License-Identifier: GPL-3.0-only

//! Capture session management
//!
//! The session owns one shared hardware resource: a capture graph with a
//! single active input device and two outputs (still-image, video-file).
//! Every mutation of that resource is serialized onto one session context;
//! hardware completion callbacks arriving on arbitrary threads are marshaled
//! back onto it before any shared state is touched.

pub mod coordinator;
pub mod graph;
pub mod lifecycle;
pub mod permission;
pub mod store;

pub use coordinator::CaptureCoordinator;
pub use graph::DeviceGraph;
pub use lifecycle::{LifecycleController, PreWarmHint};
pub use permission::PermissionGate;
pub use store::SessionStateStore;
