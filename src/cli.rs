// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for driving the capture session
//!
//! This module provides command-line functionality for:
//! - Listing simulated devices
//! - Taking photos
//! - Recording videos
//! - Watching the session state stream
//!
//! All commands run against the software backend, so they work on any
//! machine without camera hardware.

use capture_session::backend::software::{
    SimulatedDevices, SimulatedPermissions, SoftwareBackend,
};
use capture_session::backend::{CameraPosition, DeviceProvider, MediaKind};
use capture_session::config::SessionConfig;
use capture_session::session::{CaptureCoordinator, PermissionGate};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Build a coordinator over the software backend
fn make_coordinator(config: SessionConfig) -> CaptureCoordinator {
    CaptureCoordinator::new(
        Box::new(SoftwareBackend::new()),
        Box::new(SimulatedDevices::both()),
        PermissionGate::new(SimulatedPermissions::granting()),
        config,
    )
}

/// List the simulated devices
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let devices = SimulatedDevices::both();

    println!("Available cameras:");
    println!();
    for position in [CameraPosition::Back, CameraPosition::Front] {
        if let Some(device) = devices.default_device(position) {
            println!("  [{}] {} ({})", device.id, device.name, device.position);
        }
    }
    Ok(())
}

/// Take a photo and save it
pub fn take_photo(
    position: Option<CameraPosition>,
    flash: bool,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = SessionConfig::load();
    if let Some(position) = position {
        config.default_position = position;
    }
    let output_path = output.unwrap_or_else(|| config.photo_output_path());

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let coordinator = make_coordinator(config);
        coordinator.initialize().await?;
        coordinator.set_flash(flash).await?;

        println!("Capturing...");
        let media = coordinator.capture_photo().await?;
        debug_assert_eq!(media.kind, MediaKind::Photo);

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&output_path, &media.bytes)?;
        println!("Photo saved: {}", output_path.display());
        Ok::<_, Box<dyn std::error::Error>>(())
    })
}

/// Record a video for `duration` seconds (or until Ctrl+C)
pub fn record_video(
    position: Option<CameraPosition>,
    duration: u64,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = SessionConfig::load();
    if let Some(position) = position {
        config.default_position = position;
    }
    if let Some(path) = output.as_ref() {
        if let Some(parent) = path.parent() {
            config.video_dir = Some(parent.to_path_buf());
        }
    }

    // Ctrl+C stops the recording early
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let coordinator = make_coordinator(config);
        coordinator.initialize().await?;
        coordinator.start_recording().await?;

        println!("Recording... (press Ctrl+C to stop early)");
        let start = Instant::now();
        let target = Duration::from_secs(duration);
        while start.elapsed() < target && !stop_flag.load(Ordering::SeqCst) {
            let elapsed = start.elapsed().as_secs();
            print!("\rRecording: {:02}:{:02}", elapsed / 60, elapsed % 60);
            std::io::Write::flush(&mut std::io::stdout())?;
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        println!();

        let media = coordinator.stop_recording().await?;
        let saved = media.file.ok_or("recording did not produce a file")?;

        // Honor an explicit output filename
        let final_path = match output {
            Some(path) if path.extension().is_some() => {
                std::fs::rename(&saved, &path)?;
                path
            }
            _ => saved,
        };
        println!("Video saved: {}", final_path.display());
        Ok::<_, Box<dyn std::error::Error>>(())
    })
}

/// Subscribe to the state store and print each snapshot while exercising the
/// session
pub fn watch_session() -> Result<(), Box<dyn std::error::Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let coordinator = make_coordinator(SessionConfig::load());

        let mut stream = Box::pin(coordinator.store().subscribe());
        let printer = tokio::spawn(async move {
            while let Some(state) = stream.next().await {
                println!(
                    "state: authorized={} running={} recording={} flash={} position={}",
                    state.authorized,
                    state.running,
                    state.recording,
                    state.flash_enabled,
                    state.position
                );
            }
        });

        coordinator.initialize().await?;
        coordinator.set_flash(true).await?;
        coordinator.switch_camera().await?;
        coordinator.set_flash(false).await?;
        coordinator.suspend().await;
        coordinator.resume().await?;

        // Let the printer drain before tearing down
        tokio::time::sleep(Duration::from_millis(100)).await;
        printer.abort();
        Ok::<_, Box<dyn std::error::Error>>(())
    })
}
