//! Preview image thread.
//!
//! A monitoring affordance, not part of the record stream: once a
//! second the latest color frame is rendered to `monitor.png` in the
//! device directory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use contracts::{ImagePayload, PixelFormat};
use tracing::{debug, warn};

/// Shared latest-frame slot between the RGB-D processor and the
/// preview thread.
#[derive(Clone, Default)]
pub struct PreviewSlot {
    latest: Arc<Mutex<Option<ImagePayload>>>,
}

impl PreviewSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the slot with the newest color frame.
    pub fn publish(&self, image: ImagePayload) {
        *self.latest.lock().expect("preview slot poisoned") = Some(image);
    }

    fn take_latest(&self) -> Option<ImagePayload> {
        self.latest.lock().expect("preview slot poisoned").clone()
    }
}

/// Writes `monitor.png` from the slot at 1 Hz.
pub struct PreviewWriter {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PreviewWriter {
    pub fn spawn(device_dir: &Path, slot: PreviewSlot) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_flag = running.clone();
        let target: PathBuf = device_dir.join("monitor.png");

        let handle = thread::Builder::new()
            .name("rgbd-preview".into())
            .spawn(move || {
                debug!(path = %target.display(), "preview writer started");

                while running_flag.load(Ordering::Relaxed) {
                    if let Some(image) = slot.take_latest() {
                        save_png(&target, &image);
                    }
                    // 1 Hz cadence, woken early on stop.
                    for _ in 0..10 {
                        if !running_flag.load(Ordering::Relaxed) {
                            break;
                        }
                        thread::sleep(Duration::from_millis(100));
                    }
                }

                debug!("preview writer stopped");
            })
            .expect("failed to spawn preview writer");

        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Signal and join. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for PreviewWriter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn save_png(path: &Path, image: &ImagePayload) {
    let color = match image.format {
        PixelFormat::Rgb8 => image::ColorType::Rgb8,
        // Depth frames are not previewed.
        PixelFormat::Z16 => return,
    };

    if let Err(e) = image::save_buffer(path, &image.data, image.width, image.height, color) {
        warn!(path = %path.display(), error = %e, "preview save failed");
    }
}
