//! Camera service
//!
//! [`CameraService`] is the surface the control layer talks to. Every call
//! is marshalled onto the background executor as a command; device
//! callbacks are posted onto the same executor, so one worker owns all
//! device and session state and mutates it in submission order. The caller
//! observes the result through [`UiEvent`]s and [`CameraService::snapshot`].

use crate::config::RawStreamerConfig;
use crate::device::{CameraDeviceController, DeviceState, DeviceTransition, OpenOutcome, ReopenOutcome};
use crate::errors::{CameraError, Result};
use crate::events::{LogUiSink, UiEvent, UiSink};
use crate::executor::BackgroundExecutor;
use crate::frames::{DiscardFrameSink, FrameSink};
use crate::lens::{LensCatalog, LensSelection, LensSwitch};
use crate::permissions::{PermissionGate, StaticPermission};
use crate::platform::{CallbackSink, CameraPlatform, DeviceCallback};
use crate::session::{CaptureSessionManager, SessionSetup, SessionState, SessionTransition};
use crate::surface::OutputTarget;
use crate::types::{CameraCapabilities, CaptureMode, DeviceIdentity, FpsRange};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Point-in-time view of the worker state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraSnapshot {
    pub active: bool,
    pub device_state: DeviceState,
    pub session_state: SessionState,
    pub identity: Option<DeviceIdentity>,
    pub physical_id: Option<String>,
    pub capture_mode: CaptureMode,
    pub zoom_progress: usize,
    pub ladder_len: usize,
    pub fps_range: Option<FpsRange>,
    pub raw_images_captured: u64,
}

impl Default for CameraSnapshot {
    fn default() -> Self {
        Self {
            active: false,
            device_state: DeviceState::Closed,
            session_state: SessionState::Unconfigured,
            identity: None,
            physical_id: None,
            capture_mode: CaptureMode::Preview,
            zoom_progress: 0,
            ladder_len: 0,
            fps_range: None,
            raw_images_captured: 0,
        }
    }
}

enum Command {
    Activate {
        target: OutputTarget,
        camera_id: Option<String>,
        callbacks: CallbackSink,
    },
    Deactivate {
        done: Sender<()>,
    },
    SwitchFacing,
    SwitchLens,
    SetZoom(i64),
    SetFps(u32),
    ToggleCaptureMode,
    SurfaceAvailable(OutputTarget),
    SurfaceChanged {
        width: u32,
        height: u32,
    },
    SurfaceDestroyed,
}

enum WorkerMessage {
    Command(Command),
    Callback(DeviceCallback),
}

/// State owned by the worker thread.
struct Worker {
    config: RawStreamerConfig,
    platform: Box<dyn CameraPlatform>,
    permission: Arc<dyn PermissionGate>,
    ui: Arc<dyn UiSink>,
    frames: Box<dyn FrameSink>,
    device: CameraDeviceController,
    session: CaptureSessionManager,
    selection: Option<LensSelection>,
    capabilities: Option<CameraCapabilities>,
    target: Option<OutputTarget>,
    mode: CaptureMode,
    callbacks: Option<CallbackSink>,
    active: bool,
    teardown_done: Option<Sender<()>>,
    auto_reopen_used: bool,
    snapshot: Arc<RwLock<CameraSnapshot>>,
}

impl Worker {
    fn handle(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Command(command) => self.handle_command(command),
            WorkerMessage::Callback(callback) => self.handle_callback(callback),
        }
        self.publish();
    }

    fn emit(&self, event: UiEvent) {
        self.ui.dispatch(event);
    }

    fn publish(&self) {
        let snapshot = CameraSnapshot {
            active: self.active,
            device_state: self.device.state(),
            session_state: self.session.state(),
            identity: self.selection.as_ref().map(|s| s.identity.clone()),
            physical_id: self
                .selection
                .as_ref()
                .and_then(|s| s.effective_physical_id().map(str::to_string)),
            capture_mode: self.mode,
            zoom_progress: self.session.zoom_progress(),
            ladder_len: self.session.ladder().len(),
            fps_range: self.session.fps_range(),
            raw_images_captured: self.session.raw_images_captured(),
        };
        match self.snapshot.write() {
            Ok(mut slot) => *slot = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Activate {
                target,
                camera_id,
                callbacks,
            } => self.on_activate(target, camera_id, callbacks),
            Command::Deactivate { done } => self.on_deactivate(done),
            Command::SwitchFacing => self.on_switch_facing(),
            Command::SwitchLens => self.on_switch_lens(),
            Command::SetZoom(progress) => {
                if let Some(update) = self.session.set_zoom(progress) {
                    self.emit(UiEvent::ZoomChanged {
                        progress: update.progress,
                        max_progress: update.max_progress,
                        ratio: update.ratio,
                        label: update.label(),
                    });
                }
            }
            Command::SetFps(target) => {
                if let Some(range) = self.session.set_fps(target) {
                    log::info!("Frame rate range set to {} for target {}", range, target);
                }
            }
            Command::ToggleCaptureMode => self.on_toggle_capture_mode(),
            Command::SurfaceAvailable(target) => self.on_surface_available(target),
            Command::SurfaceChanged { width, height } => self.on_surface_changed(width, height),
            Command::SurfaceDestroyed => {
                log::info!("Surface destroyed, closing camera");
                self.close_pipeline();
                self.target = None;
            }
        }
    }

    fn catalog(&self) -> Option<LensCatalog> {
        match LensCatalog::enumerate(self.platform.as_ref()) {
            Ok(catalog) => Some(catalog),
            Err(e) => {
                log::error!("Failed to enumerate cameras: {}", e);
                self.emit(UiEvent::SessionError(e.to_string()));
                None
            }
        }
    }

    fn on_activate(&mut self, target: OutputTarget, camera_id: Option<String>, callbacks: CallbackSink) {
        self.active = true;
        self.target = Some(target);
        self.callbacks = Some(callbacks);
        self.auto_reopen_used = false;

        let Some(catalog) = self.catalog() else {
            return;
        };
        let wanted = camera_id.unwrap_or_else(|| self.config.camera.default_camera_id.clone());
        let identity = match catalog.find(&wanted) {
            Some(identity) => identity.clone(),
            None => match catalog.identities().first() {
                Some(first) => {
                    log::warn!("Camera {} not found, using {}", wanted, first.logical_id);
                    first.clone()
                }
                None => {
                    log::error!("No cameras available");
                    self.emit(UiEvent::SessionError("no camera available".to_string()));
                    return;
                }
            },
        };

        self.select(LensSelection::new(identity));
        self.reopen();
    }

    /// Capabilities belong to the previous selection and are re-read on
    /// the next open.
    fn select(&mut self, selection: LensSelection) {
        self.selection = Some(selection);
        self.capabilities = None;
    }

    /// Reset what the platform never confirmed before the worker stopped,
    /// so the next activation starts from `Closed`.
    fn park(&mut self) {
        self.device.abandon();
        self.teardown_done = None;
        self.callbacks = None;
        self.publish();
    }

    fn on_deactivate(&mut self, done: Sender<()>) {
        log::info!("Deactivating camera service");
        self.active = false;
        self.close_pipeline();
        if self.device.state() == DeviceState::Closed {
            // Ignored if deactivate already gave up waiting.
            let _ = done.send(());
        } else {
            self.teardown_done = Some(done);
        }
    }

    fn on_switch_facing(&mut self) {
        let Some(current) = self.selection.clone() else {
            log::warn!("Cannot switch facing before a camera is selected");
            return;
        };
        let Some(catalog) = self.catalog() else {
            return;
        };
        match catalog.switch_facing(current.identity.facing) {
            Some(next) => {
                log::info!(
                    "Switching from camera {} to {} ({})",
                    current.identity.logical_id,
                    next.logical_id,
                    next.facing
                );
                let facing = next.facing;
                self.select(LensSelection::new(next.clone()));
                self.emit(UiEvent::FacingChanged(facing));
                self.reopen();
            }
            None => self.emit(UiEvent::NoAlternateLens {
                facing: current.identity.facing,
            }),
        }
    }

    fn on_switch_lens(&mut self) {
        let Some(current) = self.selection.clone() else {
            log::warn!("Cannot switch lens before a camera is selected");
            return;
        };
        let Some(catalog) = self.catalog() else {
            return;
        };
        match catalog.switch_lens(&current, self.config.camera.physical_switching) {
            LensSwitch::Logical(next) | LensSwitch::Physical(next) => {
                let facing = next.identity.facing;
                self.select(next);
                self.emit(UiEvent::FacingChanged(facing));
                self.reopen();
            }
            LensSwitch::NoAlternate { facing } => {
                log::info!("No alternate {} lens", facing);
                self.emit(UiEvent::NoAlternateLens { facing });
            }
        }
    }

    fn raw_capable(&mut self) -> bool {
        if let Some(capabilities) = &self.capabilities {
            return capabilities.raw_capable;
        }
        let Some(selection) = &self.selection else {
            return false;
        };
        match self.platform.characteristics(&selection.identity.logical_id) {
            Ok(characteristics) => {
                let capable = characteristics.capabilities.raw_capable;
                self.capabilities = Some(characteristics.capabilities);
                capable
            }
            Err(_) => false,
        }
    }

    fn on_toggle_capture_mode(&mut self) {
        let next = self.mode.toggled();
        if next == CaptureMode::Raw && !self.raw_capable() {
            let camera_id = self
                .selection
                .as_ref()
                .map(|s| s.identity.logical_id.clone())
                .unwrap_or_default();
            log::warn!("Camera {} does not support raw capture", camera_id);
            self.emit(UiEvent::RawUnsupported { camera_id });
            return;
        }
        log::info!("Capture mode {:?} -> {:?}", self.mode, next);
        self.mode = next;
        self.emit(UiEvent::CaptureModeChanged(next));
        self.reopen();
    }

    fn on_surface_available(&mut self, target: OutputTarget) {
        log::debug!("Surface {} available at {}", target.id, target.bounds);
        self.target = Some(target);
        if self.active && self.device.state() == DeviceState::Closed && !self.device.has_pending_open() {
            self.begin_open();
        }
    }

    fn on_surface_changed(&mut self, width: u32, height: u32) {
        let Some(target) = self.target.map(|t| t.resized(width, height)) else {
            return;
        };
        self.target = Some(target);
        let transition =
            self.session
                .surface_changed(self.device.device_mut(), self.platform.as_mut(), target);
        self.apply_session_transition(transition);
    }

    /// Close the current device (if any) and open the selected identity
    /// once the close has settled.
    fn reopen(&mut self) {
        let Some(selection) = self.selection.clone() else {
            return;
        };
        if let Some(stats) = self.session.teardown() {
            self.emit(UiEvent::RawCaptureFinished(stats));
        }
        let outcome = self.device.reopen(selection.identity);
        self.session.release_outputs(self.platform.as_mut());
        if outcome == ReopenOutcome::OpenNow {
            self.begin_open();
        }
    }

    /// Stop repeating, close the session, close the device, then release
    /// the outputs.
    fn close_pipeline(&mut self) {
        if let Some(stats) = self.session.teardown() {
            self.emit(UiEvent::RawCaptureFinished(stats));
        }
        self.device.close();
        self.session.release_outputs(self.platform.as_mut());
    }

    fn begin_open(&mut self) {
        if !self.active {
            return;
        }
        let Some(selection) = self.selection.clone() else {
            return;
        };
        if self.target.is_none() {
            log::info!(
                "Waiting for a surface before opening camera {}",
                selection.identity.logical_id
            );
            return;
        }
        let Some(callbacks) = self.callbacks.clone() else {
            return;
        };

        let capabilities = match self.platform.characteristics(&selection.identity.logical_id) {
            Ok(characteristics) => characteristics.capabilities,
            Err(e) => {
                log::error!(
                    "Failed to read characteristics of camera {}: {}",
                    selection.identity.logical_id,
                    e
                );
                self.emit(UiEvent::SessionError(e.to_string()));
                return;
            }
        };
        if self.mode == CaptureMode::Raw && !capabilities.raw_capable {
            self.mode = CaptureMode::Preview;
            self.emit(UiEvent::RawUnsupported {
                camera_id: selection.identity.logical_id.clone(),
            });
            self.emit(UiEvent::CaptureModeChanged(CaptureMode::Preview));
        }
        self.capabilities = Some(capabilities);

        match self.device.open(
            self.platform.as_mut(),
            selection.identity,
            self.permission.as_ref(),
            callbacks,
        ) {
            Ok(OpenOutcome::Opening(instance)) => log::debug!("Open issued as {}", instance),
            Ok(OpenOutcome::PermissionMissing) => {}
            Err(e) => self.emit(UiEvent::SessionError(e.to_string())),
        }
    }

    fn handle_callback(&mut self, callback: DeviceCallback) {
        log::debug!("Device callback: {:?}", callback);
        match callback {
            DeviceCallback::Opened { instance, device } => {
                let transition = self.device.on_opened(instance, device);
                self.apply_device_transition(transition);
            }
            DeviceCallback::Disconnected { instance } => {
                let transition = self.device.on_disconnected(instance);
                self.apply_device_transition(transition);
            }
            DeviceCallback::Error { instance, code } => {
                let transition = self.device.on_error(instance, code);
                self.apply_device_transition(transition);
            }
            DeviceCallback::Closed { instance } => {
                let transition = self.device.on_closed(instance);
                self.apply_device_transition(transition);
            }
            DeviceCallback::SessionConfigured { token } => {
                let transition = self.session.on_configured(token);
                self.apply_session_transition(transition);
            }
            DeviceCallback::SessionReady { token, session } => {
                let transition = self.session.on_ready(token, session);
                self.apply_session_transition(transition);
            }
            DeviceCallback::SessionConfigureFailed { token } => {
                let transition = self.session.on_configure_failed(token);
                self.apply_session_transition(transition);
            }
            DeviceCallback::CaptureCompleted {
                token,
                frame_number,
                result,
            } => self.session.on_capture_completed(token, frame_number, &result),
            DeviceCallback::RawImageAvailable { token, image } => {
                self.session.on_raw_image(token, image, self.frames.as_mut())
            }
        }
    }

    fn apply_device_transition(&mut self, transition: DeviceTransition) {
        match transition {
            DeviceTransition::Opened { identity, instance } => {
                log::debug!("Configuring session for camera {} ({})", identity.logical_id, instance);
                self.configure_session();
            }
            DeviceTransition::Disconnected { identity } => {
                self.drop_session();
                self.emit(UiEvent::DeviceDisconnected {
                    camera_id: identity.logical_id.clone(),
                });
                if self.active && self.config.camera.auto_reopen_on_disconnect && !self.auto_reopen_used {
                    log::info!("Re-opening camera {} after disconnect", identity.logical_id);
                    self.auto_reopen_used = true;
                    self.device.open_after_close(identity);
                }
                self.settle_if_closed();
            }
            DeviceTransition::Failed { identity, code } => {
                self.drop_session();
                self.emit(UiEvent::DeviceError {
                    camera_id: identity.logical_id,
                    code,
                });
                self.settle_if_closed();
            }
            DeviceTransition::Closed { reopen } => {
                if self.session.state() != SessionState::Closed {
                    self.drop_session();
                }
                match reopen {
                    Some(_) => self.begin_open(),
                    None => self.finish_teardown(),
                }
            }
            DeviceTransition::Ignored => {}
        }
    }

    fn drop_session(&mut self) {
        if let Some(stats) = self.session.teardown() {
            self.emit(UiEvent::RawCaptureFinished(stats));
        }
        self.session.release_outputs(self.platform.as_mut());
    }

    fn settle_if_closed(&mut self) {
        if self.device.state() != DeviceState::Closed {
            return;
        }
        match self.device.take_pending_if_closed() {
            Some(_) => self.begin_open(),
            None => self.finish_teardown(),
        }
    }

    fn finish_teardown(&mut self) {
        if let Some(done) = self.teardown_done.take() {
            let _ = done.send(());
        }
    }

    fn configure_session(&mut self) {
        let (Some(selection), Some(capabilities), Some(target)) =
            (self.selection.clone(), self.capabilities.clone(), self.target)
        else {
            log::warn!("Device opened without selection or surface, closing");
            self.device.close();
            return;
        };
        let setup = SessionSetup {
            selection,
            capabilities,
            target,
            mode: self.mode,
            raw: self.config.raw.settings(),
            raw_max_images: self.config.raw.max_images,
            target_fps: self.config.camera.target_fps,
        };
        let Some(device) = self.device.device_mut() else {
            return;
        };
        let transition = self.session.configure(device, setup);
        self.apply_session_transition(transition);
    }

    fn apply_session_transition(&mut self, transition: SessionTransition) {
        match transition {
            SessionTransition::Ready { mode, zoom } => {
                self.auto_reopen_used = false;
                if let Some(selection) = &self.selection {
                    let event = UiEvent::SessionStarted {
                        logical_id: selection.identity.logical_id.clone(),
                        physical_id: selection.effective_physical_id().map(str::to_string),
                        facing: selection.identity.facing,
                        mode,
                    };
                    if let Some(label) = event.identity_label() {
                        log::info!("Session started: {}", label);
                    }
                    self.emit(event);
                }
                self.emit(UiEvent::ZoomChanged {
                    progress: zoom.progress,
                    max_progress: zoom.max_progress,
                    ratio: zoom.ratio,
                    label: zoom.label(),
                });
            }
            SessionTransition::ConfigureFailed(reason) | SessionTransition::RequestFailed(reason) => {
                self.emit(UiEvent::SessionError(reason));
            }
            SessionTransition::Reconfigure => {
                let transition = self
                    .session
                    .reconfigure(self.device.device_mut(), self.platform.as_mut());
                self.apply_session_transition(transition);
            }
            SessionTransition::Configuring(token) => log::debug!("Waiting for {}", token),
            SessionTransition::Configured | SessionTransition::Ignored => {}
        }
    }
}

/// Builder for [`CameraService`].
pub struct CameraServiceBuilder {
    config: RawStreamerConfig,
    platform: Box<dyn CameraPlatform>,
    permission: Arc<dyn PermissionGate>,
    ui: Arc<dyn UiSink>,
    frames: Box<dyn FrameSink>,
}

impl CameraServiceBuilder {
    pub fn config(mut self, config: RawStreamerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn permission<P: PermissionGate + 'static>(mut self, permission: P) -> Self {
        self.permission = Arc::new(permission);
        self
    }

    pub fn ui_sink<U: UiSink + 'static>(mut self, sink: U) -> Self {
        self.ui = Arc::new(sink);
        self
    }

    pub fn frame_sink<F: FrameSink + 'static>(mut self, sink: F) -> Self {
        self.frames = Box::new(sink);
        self
    }

    pub fn build(self) -> Result<CameraService> {
        self.config.validate().map_err(CameraError::ConfigError)?;
        let snapshot = Arc::new(RwLock::new(CameraSnapshot::default()));
        let worker = Worker {
            device: CameraDeviceController::new(),
            session: CaptureSessionManager::new(self.config.raw.ignored_result_prefixes.clone()),
            config: self.config.clone(),
            platform: self.platform,
            permission: self.permission,
            ui: self.ui,
            frames: self.frames,
            selection: None,
            capabilities: None,
            target: None,
            mode: CaptureMode::Preview,
            callbacks: None,
            active: false,
            teardown_done: None,
            auto_reopen_used: false,
            snapshot: snapshot.clone(),
        };
        Ok(CameraService {
            config: self.config,
            executor: Mutex::new(None),
            parked: Mutex::new(Some(worker)),
            snapshot,
        })
    }
}

/// The camera core.
///
/// The worker thread exists only between [`activate`](Self::activate) and
/// [`deactivate`](Self::deactivate).
pub struct CameraService {
    config: RawStreamerConfig,
    executor: Mutex<Option<BackgroundExecutor<WorkerMessage, Worker>>>,
    parked: Mutex<Option<Worker>>,
    snapshot: Arc<RwLock<CameraSnapshot>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| CameraError::ExecutorError("camera service lock poisoned".to_string()))
}

impl CameraService {
    pub fn builder<P: CameraPlatform + 'static>(platform: P) -> CameraServiceBuilder {
        CameraServiceBuilder {
            config: RawStreamerConfig::default(),
            platform: Box::new(platform),
            permission: Arc::new(StaticPermission::granted()),
            ui: Arc::new(LogUiSink),
            frames: Box::new(DiscardFrameSink),
        }
    }

    pub fn config(&self) -> &RawStreamerConfig {
        &self.config
    }

    /// Start the worker and begin opening `initial_identity` (or the
    /// configured default camera) onto `output_target`.
    pub fn activate(&self, output_target: OutputTarget, initial_identity: Option<&str>) -> Result<()> {
        let mut slot = lock(&self.executor)?;
        if slot.is_some() {
            return Err(CameraError::invalid_state("camera service is already active"));
        }
        let worker = lock(&self.parked)?.take().ok_or_else(|| {
            CameraError::InitializationError("worker state was lost by a failed teardown".to_string())
        })?;

        let executor = BackgroundExecutor::spawn(&self.config.executor.thread_name, worker, Worker::handle)?;
        let handle = executor.handle();
        let callbacks = CallbackSink::new(move |callback| {
            handle.post(WorkerMessage::Callback(callback)).is_ok()
        });
        executor.post(WorkerMessage::Command(Command::Activate {
            target: output_target,
            camera_id: initial_identity.map(str::to_string),
            callbacks,
        }))?;

        log::info!("Camera service activated");
        *slot = Some(executor);
        Ok(())
    }

    /// Tear everything down and join the worker. Safe to call at any time;
    /// a no-op when not active.
    pub fn deactivate(&self) -> Result<()> {
        let mut slot = lock(&self.executor)?;
        let Some(executor) = slot.take() else {
            return Ok(());
        };

        let timeout = self.config.executor.teardown_timeout();
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        match executor.post(WorkerMessage::Command(Command::Deactivate { done: done_tx })) {
            Ok(()) => {
                if done_rx.recv_timeout(timeout).is_err() {
                    log::warn!("Camera teardown did not settle within {:?}", timeout);
                }
            }
            Err(e) => log::warn!("Could not post deactivate: {}", e),
        }

        match executor.shutdown(timeout) {
            Ok(worker) => {
                if let Some(mut worker) = worker {
                    worker.park();
                    *lock(&self.parked)? = Some(worker);
                }
                log::info!("Camera service deactivated");
                Ok(())
            }
            Err(e) => {
                *slot = Some(executor);
                Err(e)
            }
        }
    }

    pub fn is_active(&self) -> bool {
        lock(&self.executor).map(|slot| slot.is_some()).unwrap_or(false)
    }

    fn send(&self, command: Command) -> Result<()> {
        let slot = lock(&self.executor)?;
        let executor = slot
            .as_ref()
            .ok_or_else(|| CameraError::invalid_state("camera service is not active"))?;
        executor.post(WorkerMessage::Command(command))
    }

    /// Switch to the first camera facing the other way. The new facing is
    /// reported as [`UiEvent::FacingChanged`].
    pub fn switch_facing(&self) -> Result<()> {
        self.send(Command::SwitchFacing)
    }

    /// Cycle to the next lens with the same facing.
    pub fn switch_lens(&self) -> Result<()> {
        self.send(Command::SwitchLens)
    }

    pub fn set_zoom(&self, progress: i64) -> Result<()> {
        self.send(Command::SetZoom(progress))
    }

    pub fn set_fps(&self, target: u32) -> Result<()> {
        self.send(Command::SetFps(target))
    }

    pub fn toggle_capture_mode(&self) -> Result<()> {
        self.send(Command::ToggleCaptureMode)
    }

    pub fn surface_available(&self, target: OutputTarget) -> Result<()> {
        self.send(Command::SurfaceAvailable(target))
    }

    pub fn surface_changed(&self, width: u32, height: u32) -> Result<()> {
        self.send(Command::SurfaceChanged { width, height })
    }

    pub fn surface_destroyed(&self) -> Result<()> {
        self.send(Command::SurfaceDestroyed)
    }

    pub fn snapshot(&self) -> CameraSnapshot {
        match self.snapshot.read() {
            Ok(snapshot) => snapshot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Drop for CameraService {
    fn drop(&mut self) {
        if let Err(e) = self.deactivate() {
            log::warn!("Error deactivating camera service in drop: {}", e);
        }
    }
}
