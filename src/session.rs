//! Capture session state machine
//!
//! [`CaptureSessionManager`] owns the configured pipeline of the current
//! device instance: its outputs, the preview and raw requests, the zoom
//! ladder and the result tracker. One session per open device; everything
//! here is rebuilt from scratch on every open.

use crate::errors::{CameraError, Result};
use crate::frames::{FrameSink, RawCaptureCounter, RawCaptureStats, RawImage};
use crate::lens::LensSelection;
use crate::platform::{
    CameraDevice, CameraPlatform, CaptureSession, OutputConfig, OutputKind, SessionToken,
};
use crate::request::{CaptureRequest, CaptureRequestBuilder, RawSettings};
use crate::results::{CaptureResult, ResultTracker};
use crate::surface::OutputTarget;
use crate::types::{CameraCapabilities, CaptureMode, FpsRange, Size};
use crate::zoom::{magnification_label, ZoomLadder};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Unconfigured,
    Configuring,
    Ready,
    /// Tearing down a ready session to configure it again.
    Reconfiguring,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Unconfigured => "unconfigured",
            SessionState::Configuring => "configuring",
            SessionState::Ready => "ready",
            SessionState::Reconfiguring => "reconfiguring",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Inputs for configuring a session on a freshly opened device.
#[derive(Debug, Clone)]
pub struct SessionSetup {
    pub selection: LensSelection,
    pub capabilities: CameraCapabilities,
    pub target: OutputTarget,
    pub mode: CaptureMode,
    pub raw: RawSettings,
    pub raw_max_images: u32,
    pub target_fps: u32,
}

/// Current zoom position for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoomUpdate {
    pub progress: usize,
    pub max_progress: usize,
    pub ratio: u32,
}

impl ZoomUpdate {
    pub fn label(&self) -> String {
        magnification_label(self.ratio)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTransition {
    Configuring(SessionToken),
    /// Configuration accepted by the platform; not usable yet.
    Configured,
    Ready { mode: CaptureMode, zoom: ZoomUpdate },
    ConfigureFailed(String),
    /// Ready, but the live request could not be submitted.
    RequestFailed(String),
    /// The surface changed while configuring; the session was dropped and
    /// must be configured again through [`CaptureSessionManager::reconfigure`].
    Reconfigure,
    Ignored,
}

/// Largest supported size that fits the view bounds and shares their aspect
/// ratio, falling back to the first enumerated size.
///
/// Bounds are given in display orientation; for a sensor mounted at 90 or
/// 270 degrees they are transposed before comparing against sensor sizes.
pub fn choose_preview_size(sizes: &[Size], bounds: Size, sensor_orientation: u32) -> Option<Size> {
    let view = if sensor_orientation % 180 != 0 {
        bounds.transposed()
    } else {
        bounds
    };
    sizes
        .iter()
        .filter(|s| s.fits_within(&view) && s.same_aspect(&view))
        .max_by_key(|s| s.area())
        .or_else(|| sizes.first())
        .copied()
}

/// Where the zoom control starts: exactly 1.00x, except on a secondary
/// physical sensor of a composite identity, which starts at its widest.
pub fn initial_progress(ladder: &ZoomLadder, selection: &LensSelection) -> usize {
    if selection.on_secondary_physical() {
        0
    } else {
        ladder.unity_progress()
    }
}

fn build_requests(
    setup: &SessionSetup,
    zoom_ratio: u32,
    fps_range: Option<FpsRange>,
) -> Result<(CaptureRequest, Option<CaptureRequest>)> {
    let physical_id = setup.selection.effective_physical_id().map(str::to_string);

    let preview = CaptureRequestBuilder::preview()
        .add_target(OutputKind::Preview)
        .zoom_ratio(zoom_ratio)
        .fps_range(fps_range)
        .physical_id(physical_id.clone())
        .build()?;

    let raw = if setup.capabilities.raw_capable {
        Some(
            CaptureRequestBuilder::manual(setup.raw)
                .add_target(OutputKind::Raw)
                .zoom_ratio(zoom_ratio)
                .fps_range(fps_range)
                .physical_id(physical_id)
                .build()?,
        )
    } else {
        None
    };

    Ok((preview, raw))
}

/// Owner of the session handle and the requests it runs.
pub struct CaptureSessionManager {
    state: SessionState,
    token: Option<SessionToken>,
    next_sequence: u64,
    session: Option<Box<dyn CaptureSession>>,
    outputs: Vec<OutputConfig>,
    setup: Option<SessionSetup>,
    mode: CaptureMode,
    preview_size: Option<Size>,
    preview_request: Option<CaptureRequest>,
    raw_request: Option<CaptureRequest>,
    ladder: ZoomLadder,
    zoom_progress: usize,
    fps_range: Option<FpsRange>,
    ignored_prefixes: Vec<String>,
    tracker: ResultTracker,
    raw_counter: Option<RawCaptureCounter>,
}

impl Default for CaptureSessionManager {
    fn default() -> Self {
        Self::new(vec![crate::results::DEFAULT_IGNORED_PREFIX.to_string()])
    }
}

impl CaptureSessionManager {
    pub fn new(ignored_prefixes: Vec<String>) -> Self {
        Self {
            state: SessionState::Unconfigured,
            token: None,
            next_sequence: 1,
            session: None,
            outputs: Vec::new(),
            setup: None,
            mode: CaptureMode::Preview,
            preview_size: None,
            preview_request: None,
            raw_request: None,
            ladder: ZoomLadder::unity(),
            zoom_progress: 0,
            fps_range: None,
            tracker: ResultTracker::new(ignored_prefixes.clone()),
            ignored_prefixes,
            raw_counter: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn token(&self) -> Option<SessionToken> {
        self.token
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn ladder(&self) -> &ZoomLadder {
        &self.ladder
    }

    pub fn zoom_progress(&self) -> usize {
        self.zoom_progress
    }

    pub fn fps_range(&self) -> Option<FpsRange> {
        self.fps_range
    }

    pub fn preview_size(&self) -> Option<Size> {
        self.preview_size
    }

    pub fn outputs(&self) -> &[OutputConfig] {
        &self.outputs
    }

    pub fn raw_images_captured(&self) -> u64 {
        self.raw_counter.as_ref().map_or(0, RawCaptureCounter::captured)
    }

    pub fn tracker(&self) -> &ResultTracker {
        &self.tracker
    }

    /// The request currently driving the live output.
    pub fn live_request(&self) -> Option<&CaptureRequest> {
        match self.mode {
            CaptureMode::Preview => self.preview_request.as_ref(),
            CaptureMode::Raw => self.raw_request.as_ref(),
        }
    }

    pub fn zoom_update(&self) -> ZoomUpdate {
        ZoomUpdate {
            progress: self.zoom_progress,
            max_progress: self.ladder.max_progress(),
            ratio: self.ladder.ratio_at(self.zoom_progress as i64),
        }
    }

    fn is_current(&self, token: SessionToken) -> bool {
        self.token == Some(token)
    }

    /// Configure a session on a freshly opened device.
    pub fn configure(&mut self, device: &mut dyn CameraDevice, setup: SessionSetup) -> SessionTransition {
        let (min_zoom, max_zoom) = setup.capabilities.zoom_range;
        self.ladder = ZoomLadder::build(min_zoom, max_zoom).unwrap_or_else(|e| {
            log::warn!("Unusable zoom range on camera {}: {}", setup.selection.identity.logical_id, e);
            ZoomLadder::unity()
        });
        self.zoom_progress = initial_progress(&self.ladder, &setup.selection);
        self.fps_range = FpsRange::select(&setup.capabilities.fps_ranges, setup.target_fps);

        let raw_usable =
            setup.capabilities.raw_capable && setup.capabilities.largest_raw_size().is_some();
        self.mode = match setup.mode {
            CaptureMode::Raw if !raw_usable => {
                log::warn!(
                    "Camera {} has no raw output, configuring preview only",
                    setup.selection.identity.logical_id
                );
                CaptureMode::Preview
            }
            mode => mode,
        };

        self.tracker = ResultTracker::new(self.ignored_prefixes.clone());
        self.raw_counter = None;
        self.setup = Some(setup);
        self.submit_configuration(device)
    }

    fn submit_configuration(&mut self, device: &mut dyn CameraDevice) -> SessionTransition {
        let Some(setup) = &self.setup else {
            self.state = SessionState::Unconfigured;
            return SessionTransition::ConfigureFailed("no session setup".to_string());
        };
        let capabilities = &setup.capabilities;

        let Some(preview_size) = choose_preview_size(
            &capabilities.stream_sizes,
            setup.target.bounds,
            capabilities.sensor_orientation,
        ) else {
            self.state = SessionState::Unconfigured;
            return SessionTransition::ConfigureFailed("no supported preview size".to_string());
        };

        let zoom_ratio = self.ladder.ratio_at(self.zoom_progress as i64);
        let (preview_request, raw_request) = match build_requests(setup, zoom_ratio, self.fps_range) {
            Ok(requests) => requests,
            Err(e) => {
                self.state = SessionState::Unconfigured;
                return SessionTransition::ConfigureFailed(e.to_string());
            }
        };

        let physical_id = setup.selection.effective_physical_id().map(str::to_string);
        let mut outputs = vec![OutputConfig::Preview {
            surface: setup.target.id,
            size: preview_size,
            physical_id: physical_id.clone(),
        }];
        if self.mode == CaptureMode::Raw {
            if let Some(raw_size) = capabilities.largest_raw_size() {
                outputs.push(OutputConfig::RawReader {
                    size: raw_size,
                    max_images: setup.raw_max_images,
                    physical_id,
                });
            }
        }

        let token = SessionToken {
            instance: device.instance(),
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;

        log::info!(
            "Configuring {} on camera {}: preview {}, {} outputs",
            token,
            device.id(),
            preview_size,
            outputs.len()
        );

        self.preview_size = Some(preview_size);
        self.preview_request = Some(preview_request);
        self.raw_request = raw_request;
        self.token = Some(token);
        self.state = SessionState::Configuring;

        let result = device.create_capture_session(&outputs, token);
        self.outputs = outputs;
        match result {
            Ok(()) => SessionTransition::Configuring(token),
            Err(e) => {
                log::error!("Failed to create capture session: {}", e);
                self.state = SessionState::Unconfigured;
                SessionTransition::ConfigureFailed(e.to_string())
            }
        }
    }

    pub fn on_configured(&mut self, token: SessionToken) -> SessionTransition {
        if !self.is_current(token) {
            log::debug!("Ignoring configured callback of stale {}", token);
            return SessionTransition::Ignored;
        }
        log::debug!("Session {} configured", token);
        SessionTransition::Configured
    }

    pub fn on_ready(&mut self, token: SessionToken, mut session: Box<dyn CaptureSession>) -> SessionTransition {
        if !self.is_current(token) || self.state != SessionState::Configuring {
            log::warn!("Closing session {} that is no longer wanted ({})", token, self.state);
            session.close();
            return SessionTransition::Ignored;
        }

        if self.preview_size_is_stale() {
            log::info!("Surface changed while {} was configuring, reconfiguring", token);
            session.close();
            self.state = SessionState::Reconfiguring;
            return SessionTransition::Reconfigure;
        }

        self.session = Some(session);
        self.state = SessionState::Ready;
        log::info!("Session {} ready in {:?} mode", token, self.mode);

        if self.mode == CaptureMode::Raw && self.raw_counter.is_none() {
            self.raw_counter = Some(RawCaptureCounter::start());
        }

        if let Err(e) = self.submit_live() {
            log::error!("Failed to start repeating request: {}", e);
            return SessionTransition::RequestFailed(e.to_string());
        }

        SessionTransition::Ready {
            mode: self.mode,
            zoom: self.zoom_update(),
        }
    }

    pub fn on_configure_failed(&mut self, token: SessionToken) -> SessionTransition {
        if !self.is_current(token) {
            log::debug!("Ignoring configure failure of stale {}", token);
            return SessionTransition::Ignored;
        }
        log::error!("Session {} configuration failed", token);
        self.state = SessionState::Unconfigured;
        self.token = None;
        SessionTransition::ConfigureFailed(format!("session {} configuration failed", token))
    }

    fn submit_live(&mut self) -> Result<()> {
        let request = match self.mode {
            CaptureMode::Preview => self.preview_request.as_ref(),
            CaptureMode::Raw => self.raw_request.as_ref(),
        }
        .ok_or_else(|| CameraError::invalid_state("no live request"))?;
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| CameraError::invalid_state("no capture session"))?;
        session.set_repeating_request(request)
    }

    /// Stop the repeating request, then submit the live one again. The
    /// platform rejects overlapping repeating submissions.
    fn resubmit(&mut self) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| CameraError::invalid_state("no capture session"))?;
        session.stop_repeating()?;
        self.submit_live()
    }

    fn update_live<F>(&mut self, update: F) -> Result<()>
    where
        F: FnOnce(CaptureRequestBuilder) -> CaptureRequestBuilder,
    {
        let slot = match self.mode {
            CaptureMode::Preview => &mut self.preview_request,
            CaptureMode::Raw => &mut self.raw_request,
        };
        let current = slot
            .as_ref()
            .ok_or_else(|| CameraError::invalid_state("no live request"))?;
        let next = update(current.to_builder()).build()?;
        *slot = Some(next);
        Ok(())
    }

    /// Move the zoom to `progress`, clamped into the ladder. Ignored unless
    /// the session is ready.
    pub fn set_zoom(&mut self, progress: i64) -> Option<ZoomUpdate> {
        if self.state != SessionState::Ready {
            log::debug!("Ignoring zoom while session is {}", self.state);
            return None;
        }
        let progress = self.ladder.clamp_progress(progress);
        let ratio = self.ladder.ratio_at(progress as i64);

        if let Err(e) = self.update_live(|b| b.zoom_ratio(ratio)) {
            log::warn!("Failed to update zoom: {}", e);
            return None;
        }
        if let Err(e) = self.resubmit() {
            log::warn!("Failed to resubmit zoomed request: {}", e);
        }
        self.zoom_progress = progress;
        log::debug!("Zoom set to {} ({})", magnification_label(ratio), progress);
        Some(self.zoom_update())
    }

    /// Select the fps range for `target` and apply it. Falls back to the
    /// nearest range when none contains `target`.
    pub fn set_fps(&mut self, target: u32) -> Option<FpsRange> {
        if self.state != SessionState::Ready {
            log::debug!("Ignoring fps change while session is {}", self.state);
            return None;
        }
        let ranges = self.setup.as_ref().map(|s| s.capabilities.fps_ranges.clone())?;
        let Some(range) = FpsRange::select(&ranges, target) else {
            log::warn!("Camera reports no fps ranges");
            return None;
        };
        if !range.contains(target) {
            log::info!("No fps range contains {}, using {}", target, range);
        }

        if let Err(e) = self.update_live(|b| b.fps_range(Some(range))) {
            log::warn!("Failed to update fps: {}", e);
            return None;
        }
        if let Err(e) = self.resubmit() {
            log::warn!("Failed to resubmit request with new fps: {}", e);
        }
        self.fps_range = Some(range);
        Some(range)
    }

    /// Fold a capture result into the tracker while capturing raw.
    pub fn on_capture_completed(&mut self, token: SessionToken, frame_number: u64, result: &CaptureResult) {
        if !self.is_current(token) || self.mode != CaptureMode::Raw {
            return;
        }
        self.tracker.observe(frame_number, result);
    }

    /// Hand a raw frame to the sink together with the latest result.
    pub fn on_raw_image(&mut self, token: SessionToken, image: RawImage, sink: &mut dyn FrameSink) {
        if !self.is_current(token) || self.mode != CaptureMode::Raw {
            log::debug!("Dropping raw image of stale or non-raw session {}", token);
            return;
        }
        let Some(counter) = self.raw_counter.as_mut() else {
            return;
        };
        let (Some(parameters), Some(setup)) = (self.tracker.last(), self.setup.as_ref()) else {
            log::warn!("Dropping raw frame {}: no capture result yet", image.timestamp_ns);
            counter.record_dropped();
            return;
        };
        match sink.persist(image, parameters, &setup.capabilities) {
            Ok(()) => counter.record_captured(),
            Err(e) => {
                log::warn!("Frame sink rejected raw frame: {}", e);
                counter.record_dropped();
            }
        }
    }

    /// Re-configure for new view bounds. A ready session goes through
    /// `Reconfiguring` back to `Configuring`. A session still configuring
    /// picks the bounds up when it becomes ready; otherwise they are used
    /// by the next configuration.
    pub fn surface_changed(
        &mut self,
        device: Option<&mut (dyn CameraDevice + 'static)>,
        platform: &mut dyn CameraPlatform,
        target: OutputTarget,
    ) -> SessionTransition {
        if let Some(setup) = self.setup.as_mut() {
            setup.target = target;
        }
        if self.state != SessionState::Ready {
            return SessionTransition::Ignored;
        }
        let Some(device) = device else {
            return SessionTransition::Ignored;
        };

        log::info!("Surface resized to {}, reconfiguring", target.bounds);
        self.state = SessionState::Reconfiguring;
        self.reconfigure(Some(device), platform)
    }

    /// Configure again with the current setup, dropping the previous
    /// session and its outputs first.
    pub fn reconfigure(
        &mut self,
        device: Option<&mut (dyn CameraDevice + 'static)>,
        platform: &mut dyn CameraPlatform,
    ) -> SessionTransition {
        self.close_session();
        self.release_outputs(platform);
        match device {
            Some(device) => self.submit_configuration(device),
            None => {
                self.state = SessionState::Unconfigured;
                SessionTransition::Ignored
            }
        }
    }

    fn preview_size_is_stale(&self) -> bool {
        let Some(setup) = &self.setup else {
            return false;
        };
        let wanted = choose_preview_size(
            &setup.capabilities.stream_sizes,
            setup.target.bounds,
            setup.capabilities.sensor_orientation,
        );
        wanted.is_some() && wanted != self.preview_size
    }

    fn close_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.stop_repeating() {
                log::debug!("stop_repeating during close failed: {}", e);
            }
            session.close();
        }
    }

    /// Stop the repeating request and close the session. Returns the raw
    /// capture summary when a raw run was in progress.
    pub fn teardown(&mut self) -> Option<RawCaptureStats> {
        self.close_session();
        if self.state != SessionState::Closed {
            log::debug!("Session closed from {}", self.state);
        }
        self.state = SessionState::Closed;
        self.token = None;
        self.preview_request = None;
        self.raw_request = None;
        self.raw_counter
            .take()
            .map(|counter| counter.finish(self.tracker.initial_report().cloned()))
    }

    /// Release every output bound to the last configuration.
    pub fn release_outputs(&mut self, platform: &mut dyn CameraPlatform) {
        for output in self.outputs.drain(..) {
            log::debug!("Releasing {:?} output {}", output.kind(), output.size());
            platform.release_output(&output);
        }
    }
}

impl fmt::Debug for CaptureSessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSessionManager")
            .field("state", &self.state)
            .field("token", &self.token)
            .field("mode", &self.mode)
            .field("zoom_progress", &self.zoom_progress)
            .finish()
    }
}
