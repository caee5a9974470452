//! Raw frame handoff and raw-capture statistics.

use crate::errors::{CameraError, Result};
use crate::results::CaptureResult;
use crate::types::{CameraCapabilities, Size};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// One raw sensor buffer as delivered by the raw reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub size: Size,
    pub pixel_buffer: Vec<u8>,
    /// Sensor timestamp in nanoseconds.
    pub timestamp_ns: u64,
}

impl RawImage {
    pub fn new(size: Size, pixel_buffer: Vec<u8>, timestamp_ns: u64) -> Self {
        Self {
            size,
            pixel_buffer,
            timestamp_ns,
        }
    }
}

/// Persists completed raw frames.
///
/// The core hands over the buffer together with the parameters it was
/// captured with; naming and container format belong to the sink.
pub trait FrameSink: Send {
    fn persist(
        &mut self,
        image: RawImage,
        parameters: &CaptureResult,
        capabilities: &CameraCapabilities,
    ) -> Result<()>;
}

/// Sink that drops every frame. Used when no sink is configured.
#[derive(Debug, Default)]
pub struct DiscardFrameSink;

impl FrameSink for DiscardFrameSink {
    fn persist(
        &mut self,
        image: RawImage,
        _parameters: &CaptureResult,
        _capabilities: &CameraCapabilities,
    ) -> Result<()> {
        log::trace!("Discarding raw frame {} ({})", image.timestamp_ns, image.size);
        Ok(())
    }
}

/// Summary of one raw-capture run, emitted when leaving raw mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCaptureStats {
    pub images_captured: u64,
    pub images_dropped: u64,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub elapsed_ms: u64,
    pub average_fps: f64,
    pub initial_report: Option<CaptureResult>,
}

impl RawCaptureStats {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| CameraError::SessionError(format!("Failed to encode capture stats: {}", e)))
    }
}

/// Counts frames of a raw-capture run.
#[derive(Debug, Clone)]
pub struct RawCaptureCounter {
    started_at: chrono::DateTime<chrono::Utc>,
    started: Instant,
    captured: u64,
    dropped: u64,
}

impl RawCaptureCounter {
    pub fn start() -> Self {
        Self {
            started_at: chrono::Utc::now(),
            started: Instant::now(),
            captured: 0,
            dropped: 0,
        }
    }

    pub fn record_captured(&mut self) {
        self.captured += 1;
    }

    pub fn record_dropped(&mut self) {
        self.dropped += 1;
    }

    pub fn captured(&self) -> u64 {
        self.captured
    }

    pub fn finish(self, initial_report: Option<CaptureResult>) -> RawCaptureStats {
        let elapsed = self.started.elapsed();
        let secs = elapsed.as_secs_f64();
        let average_fps = if secs > 0.0 {
            self.captured as f64 / secs
        } else {
            0.0
        };
        log::info!(
            "Raw capture finished: {} images in {:.1}s ({:.1} fps), {} dropped",
            self.captured,
            secs,
            average_fps,
            self.dropped
        );
        RawCaptureStats {
            images_captured: self.captured,
            images_dropped: self.dropped,
            started_at: self.started_at,
            elapsed_ms: elapsed.as_millis() as u64,
            average_fps,
            initial_report,
        }
    }
}
