//! Testing utilities for rawstreamer
//!
//! [`SimulatedPlatform`] is an in-memory device API for exercising the
//! camera core without hardware. It answers every call by posting the
//! matching callbacks through the [`CallbackSink`] it was handed, records
//! each call it receives, and flags lifecycle violations: an open issued
//! while another device is still open, a repeating request submitted over
//! a running one, or two sessions streaming on one device.

use crate::errors::{CameraError, DeviceErrorCode, Result};
use crate::events::{UiEvent, UiSink};
use crate::frames::{FrameSink, RawImage};
use crate::platform::{
    CallbackSink, CameraDevice, CameraPlatform, CaptureSession, DeviceCallback, DeviceInstance,
    OutputConfig, OutputKind, SessionToken,
};
use crate::request::{CaptureRequest, RequestKind};
use crate::results::CaptureResult;
use crate::types::{CameraCapabilities, CameraCharacteristics, DeviceIdentity, Facing, FpsRange, Size};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// One call received by the simulated platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    OpenCamera {
        camera_id: String,
        instance: DeviceInstance,
    },
    CloseDevice {
        instance: DeviceInstance,
    },
    CreateSession {
        token: SessionToken,
        outputs: Vec<OutputConfig>,
    },
    SetRepeating {
        token: SessionToken,
        kind: RequestKind,
        zoom_ratio: u32,
        physical_id: Option<String>,
    },
    StopRepeating {
        token: SessionToken,
    },
    CloseSession {
        token: SessionToken,
    },
    ReleaseOutput {
        kind: OutputKind,
    },
}

#[derive(Default)]
struct Inner {
    cameras: Vec<CameraCharacteristics>,
    calls: Vec<PlatformCall>,
    sinks: HashMap<DeviceInstance, CallbackSink>,
    open_devices: HashSet<DeviceInstance>,
    repeating: HashSet<SessionToken>,
    streaming: HashSet<SessionToken>,
    last_session: Option<SessionToken>,
    next_frame: u64,
    violations: Vec<String>,
    hold_ready: bool,
    hold_close: bool,
    held: Vec<(CallbackSink, DeviceCallback)>,
    fail_next_configure: bool,
    fail_next_open: Option<DeviceErrorCode>,
}

impl Inner {
    fn violation(&mut self, message: String) {
        log::error!("Platform violation: {}", message);
        self.violations.push(message);
    }

    fn sink(&self, instance: DeviceInstance) -> Option<CallbackSink> {
        self.sinks.get(&instance).cloned()
    }

    fn drop_sessions_of(&mut self, instance: DeviceInstance) {
        self.repeating.retain(|t| t.instance != instance);
        self.streaming.retain(|t| t.instance != instance);
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    match inner.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// In-memory implementation of [`CameraPlatform`].
///
/// Clones share state, so a test keeps one clone for inspection and hands
/// another to the service.
#[derive(Clone, Default)]
pub struct SimulatedPlatform {
    inner: Arc<Mutex<Inner>>,
}

impl SimulatedPlatform {
    pub fn new(cameras: Vec<CameraCharacteristics>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                cameras,
                next_frame: 1,
                ..Inner::default()
            })),
        }
    }

    /// A typical phone: a composite back camera `"0"` over physical `"2"`
    /// and `"3"`, a front camera `"1"`, and a plain back camera `"4"`.
    pub fn phone() -> Self {
        Self::new(vec![
            raw_camera(
                DeviceIdentity::new("0", Facing::Back).with_physical_ids(["2", "3"]),
                (0.6, 10.0),
            ),
            camera(DeviceIdentity::new("1", Facing::Front), (1.0, 1.0)),
            camera(DeviceIdentity::new("4", Facing::Back), (1.0, 2.0)),
        ])
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        lock(&self.inner).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.inner).calls.clear();
    }

    /// Lifecycle violations seen so far. Empty for a correct core.
    pub fn violations(&self) -> Vec<String> {
        lock(&self.inner).violations.clone()
    }

    pub fn open_device_count(&self) -> usize {
        lock(&self.inner).open_devices.len()
    }

    pub fn opened_camera_ids(&self) -> Vec<String> {
        lock(&self.inner)
            .calls
            .iter()
            .filter_map(|call| match call {
                PlatformCall::OpenCamera { camera_id, .. } => Some(camera_id.clone()),
                _ => None,
            })
            .collect()
    }

    /// The most recent repeating submission.
    pub fn last_repeating(&self) -> Option<PlatformCall> {
        lock(&self.inner)
            .calls
            .iter()
            .rev()
            .find(|call| matches!(call, PlatformCall::SetRepeating { .. }))
            .cloned()
    }

    /// Keep session-ready callbacks back until [`release_held`](Self::release_held).
    pub fn hold_session_ready(&self, hold: bool) {
        lock(&self.inner).hold_ready = hold;
    }

    /// Keep device-closed confirmations back until
    /// [`release_held`](Self::release_held), as a slow camera stack would.
    pub fn hold_device_close(&self, hold: bool) {
        lock(&self.inner).hold_close = hold;
    }

    /// Deliver held callbacks in the order they were produced.
    pub fn release_held(&self) -> usize {
        let held = std::mem::take(&mut lock(&self.inner).held);
        let count = held.len();
        for (sink, callback) in held {
            sink.post(callback);
        }
        count
    }

    pub fn fail_next_configure(&self) {
        lock(&self.inner).fail_next_configure = true;
    }

    /// The next open fails asynchronously with `code`.
    pub fn fail_next_open(&self, code: DeviceErrorCode) {
        lock(&self.inner).fail_next_open = Some(code);
    }

    fn current_instance(inner: &Inner) -> Option<DeviceInstance> {
        inner.open_devices.iter().max().copied()
    }

    /// Report the current device as disconnected.
    pub fn inject_disconnect(&self) -> bool {
        let inner = lock(&self.inner);
        let Some(instance) = Self::current_instance(&inner) else {
            return false;
        };
        match inner.sink(instance) {
            Some(sink) => sink.post(DeviceCallback::Disconnected { instance }),
            None => false,
        }
    }

    /// Report a device error on the current device.
    pub fn inject_error(&self, code: DeviceErrorCode) -> bool {
        let inner = lock(&self.inner);
        let Some(instance) = Self::current_instance(&inner) else {
            return false;
        };
        match inner.sink(instance) {
            Some(sink) => sink.post(DeviceCallback::Error { instance, code }),
            None => false,
        }
    }

    /// Complete a capture on the streaming session.
    pub fn emit_capture(&self, result: CaptureResult) -> bool {
        let mut inner = lock(&self.inner);
        let Some(token) = inner.last_session.filter(|t| inner.streaming.contains(t)) else {
            return false;
        };
        let frame_number = inner.next_frame;
        inner.next_frame += 1;
        match inner.sink(token.instance) {
            Some(sink) => sink.post(DeviceCallback::CaptureCompleted {
                token,
                frame_number,
                result,
            }),
            None => false,
        }
    }

    /// Deliver a raw buffer from the streaming session's raw reader.
    pub fn emit_raw_image(&self, image: RawImage) -> bool {
        let inner = lock(&self.inner);
        let Some(token) = inner.last_session.filter(|t| inner.streaming.contains(t)) else {
            return false;
        };
        match inner.sink(token.instance) {
            Some(sink) => sink.post(DeviceCallback::RawImageAvailable { token, image }),
            None => false,
        }
    }
}

impl CameraPlatform for SimulatedPlatform {
    fn camera_ids(&self) -> Result<Vec<String>> {
        Ok(lock(&self.inner)
            .cameras
            .iter()
            .map(|c| c.identity.logical_id.clone())
            .collect())
    }

    fn characteristics(&self, camera_id: &str) -> Result<CameraCharacteristics> {
        lock(&self.inner)
            .cameras
            .iter()
            .find(|c| c.identity.logical_id == camera_id)
            .cloned()
            .ok_or_else(|| CameraError::not_found("camera", camera_id))
    }

    fn open_camera(
        &mut self,
        camera_id: &str,
        instance: DeviceInstance,
        callbacks: CallbackSink,
    ) -> Result<()> {
        let mut inner = lock(&self.inner);
        if !inner.cameras.iter().any(|c| c.identity.logical_id == camera_id) {
            return Err(CameraError::not_found("camera", camera_id));
        }
        inner.calls.push(PlatformCall::OpenCamera {
            camera_id: camera_id.to_string(),
            instance,
        });
        if !inner.open_devices.is_empty() {
            let still_open: Vec<String> = inner.open_devices.iter().map(|i| i.to_string()).collect();
            inner.violation(format!(
                "open of {} while {} not closed",
                instance,
                still_open.join(", ")
            ));
        }
        inner.sinks.insert(instance, callbacks.clone());

        if let Some(code) = inner.fail_next_open.take() {
            callbacks.post(DeviceCallback::Error { instance, code });
            return Ok(());
        }

        inner.open_devices.insert(instance);
        let device = SimCameraDevice {
            id: camera_id.to_string(),
            instance,
            closed: false,
            inner: self.inner.clone(),
        };
        callbacks.post(DeviceCallback::Opened {
            instance,
            device: Box::new(device),
        });
        Ok(())
    }

    fn release_output(&mut self, output: &OutputConfig) {
        lock(&self.inner).calls.push(PlatformCall::ReleaseOutput { kind: output.kind() });
    }
}

struct SimCameraDevice {
    id: String,
    instance: DeviceInstance,
    closed: bool,
    inner: Arc<Mutex<Inner>>,
}

impl CameraDevice for SimCameraDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn instance(&self) -> DeviceInstance {
        self.instance
    }

    fn create_capture_session(&mut self, outputs: &[OutputConfig], token: SessionToken) -> Result<()> {
        if self.closed {
            return Err(CameraError::invalid_state(format!("{} is closed", self.instance)));
        }
        let mut inner = lock(&self.inner);
        inner.calls.push(PlatformCall::CreateSession {
            token,
            outputs: outputs.to_vec(),
        });
        let Some(sink) = inner.sink(self.instance) else {
            return Err(CameraError::invalid_state("no callback route"));
        };

        if std::mem::take(&mut inner.fail_next_configure) {
            sink.post(DeviceCallback::SessionConfigureFailed { token });
            return Ok(());
        }

        let session = SimCaptureSession {
            token,
            closed: false,
            inner: self.inner.clone(),
        };
        let configured = DeviceCallback::SessionConfigured { token };
        let ready = DeviceCallback::SessionReady {
            token,
            session: Box::new(session),
        };
        if inner.hold_ready {
            inner.held.push((sink.clone(), configured));
            inner.held.push((sink, ready));
        } else {
            sink.post(configured);
            sink.post(ready);
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut inner = lock(&self.inner);
        inner.calls.push(PlatformCall::CloseDevice {
            instance: self.instance,
        });
        inner.open_devices.remove(&self.instance);
        inner.drop_sessions_of(self.instance);
        if let Some(sink) = inner.sink(self.instance) {
            let closed = DeviceCallback::Closed {
                instance: self.instance,
            };
            if inner.hold_close {
                inner.held.push((sink, closed));
            } else {
                sink.post(closed);
            }
        }
    }
}

struct SimCaptureSession {
    token: SessionToken,
    closed: bool,
    inner: Arc<Mutex<Inner>>,
}

impl CaptureSession for SimCaptureSession {
    fn token(&self) -> SessionToken {
        self.token
    }

    fn set_repeating_request(&mut self, request: &CaptureRequest) -> Result<()> {
        if self.closed {
            return Err(CameraError::SessionError(format!("session {} is closed", self.token)));
        }
        let mut inner = lock(&self.inner);
        let token = self.token;
        inner.calls.push(PlatformCall::SetRepeating {
            token,
            kind: request.kind(),
            zoom_ratio: request.zoom_ratio(),
            physical_id: request.physical_id().map(str::to_string),
        });
        if !inner.open_devices.contains(&token.instance) {
            inner.violation(format!("repeating request on {} after its device closed", token));
        }
        if !inner.repeating.insert(token) {
            inner.violation(format!("repeating request submitted over a running one on {}", token));
        }
        let others: Vec<SessionToken> = inner
            .streaming
            .iter()
            .filter(|t| t.instance == token.instance && **t != token)
            .copied()
            .collect();
        if !others.is_empty() {
            inner.violation(format!("{} streaming while {} still streaming", token, others[0]));
        }
        inner.streaming.insert(token);
        inner.last_session = Some(token);
        Ok(())
    }

    fn stop_repeating(&mut self) -> Result<()> {
        if self.closed {
            return Err(CameraError::SessionError(format!("session {} is closed", self.token)));
        }
        let mut inner = lock(&self.inner);
        inner.calls.push(PlatformCall::StopRepeating { token: self.token });
        inner.repeating.remove(&self.token);
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut inner = lock(&self.inner);
        inner.calls.push(PlatformCall::CloseSession { token: self.token });
        inner.repeating.remove(&self.token);
        inner.streaming.remove(&self.token);
    }
}

/// Characteristics of a preview-only camera.
pub fn camera(identity: DeviceIdentity, zoom_range: (f32, f32)) -> CameraCharacteristics {
    CameraCharacteristics {
        identity,
        capabilities: CameraCapabilities {
            zoom_range,
            fps_ranges: vec![FpsRange::new(15, 30), FpsRange::new(30, 30), FpsRange::new(60, 60)],
            ..CameraCapabilities::default()
        },
    }
}

/// Characteristics of a camera with raw sensor output.
pub fn raw_camera(identity: DeviceIdentity, zoom_range: (f32, f32)) -> CameraCharacteristics {
    let mut characteristics = camera(identity, zoom_range);
    characteristics.capabilities.raw_capable = true;
    characteristics.capabilities.raw_sizes = vec![Size::new(4032, 3024), Size::new(2016, 1512)];
    characteristics
}

/// Frame sink that keeps what it was handed.
#[derive(Clone, Default)]
pub struct RecordingFrameSink {
    frames: Arc<Mutex<Vec<(RawImage, CaptureResult)>>>,
}

impl RecordingFrameSink {
    pub fn frames(&self) -> Vec<(RawImage, CaptureResult)> {
        match self.frames.lock() {
            Ok(frames) => frames.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FrameSink for RecordingFrameSink {
    fn persist(
        &mut self,
        image: RawImage,
        parameters: &CaptureResult,
        _capabilities: &CameraCapabilities,
    ) -> Result<()> {
        self.frames
            .lock()
            .map_err(|_| CameraError::invalid_state("frame sink poisoned"))?
            .push((image, parameters.clone()));
        Ok(())
    }
}

/// UI sink that keeps every event.
#[derive(Clone, Default)]
pub struct RecordingUiSink {
    events: Arc<Mutex<Vec<UiEvent>>>,
}

impl RecordingUiSink {
    pub fn events(&self) -> Vec<UiEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn contains(&self, predicate: impl Fn(&UiEvent) -> bool) -> bool {
        self.events().iter().any(predicate)
    }

    pub fn count(&self, predicate: impl Fn(&UiEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl UiSink for RecordingUiSink {
    fn dispatch(&self, event: UiEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Poll `condition` every few milliseconds until it holds or `timeout`
/// passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    loop {
        if condition() {
            return true;
        }
        if start.elapsed() >= timeout {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn channel_sink() -> (CallbackSink, mpsc::Receiver<DeviceCallback>) {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let sink = CallbackSink::new(move |cb| tx.lock().unwrap().send(cb).is_ok());
        (sink, rx)
    }

    #[test]
    fn test_open_posts_opened() {
        let mut platform = SimulatedPlatform::phone();
        let (sink, rx) = channel_sink();
        platform.open_camera("1", DeviceInstance(1), sink).unwrap();
        let callback = rx.try_recv().unwrap();
        assert!(matches!(callback, DeviceCallback::Opened { instance: DeviceInstance(1), .. }));
        assert_eq!(platform.open_device_count(), 1);
    }

    #[test]
    fn test_unknown_camera_rejected() {
        let mut platform = SimulatedPlatform::phone();
        let (sink, _rx) = channel_sink();
        assert!(platform.open_camera("9", DeviceInstance(1), sink).is_err());
        assert!(platform.characteristics("9").is_err());
    }

    #[test]
    fn test_overlapping_open_flagged() {
        let mut platform = SimulatedPlatform::phone();
        let (sink, _rx) = channel_sink();
        platform.open_camera("0", DeviceInstance(1), sink.clone()).unwrap();
        platform.open_camera("1", DeviceInstance(2), sink).unwrap();
        assert_eq!(platform.violations().len(), 1);
    }

    #[test]
    fn test_close_then_open_is_clean() {
        let mut platform = SimulatedPlatform::phone();
        let (sink, rx) = channel_sink();
        platform.open_camera("0", DeviceInstance(1), sink.clone()).unwrap();
        let Ok(DeviceCallback::Opened { mut device, .. }) = rx.try_recv() else {
            panic!("expected opened");
        };
        device.close();
        assert!(matches!(rx.try_recv().unwrap(), DeviceCallback::Closed { .. }));
        platform.open_camera("1", DeviceInstance(2), sink).unwrap();
        assert!(platform.violations().is_empty());
    }

    #[test]
    fn test_held_ready_released_in_order() {
        let mut platform = SimulatedPlatform::phone();
        let (sink, rx) = channel_sink();
        platform.hold_session_ready(true);
        platform.open_camera("0", DeviceInstance(1), sink).unwrap();
        let Ok(DeviceCallback::Opened { mut device, .. }) = rx.try_recv() else {
            panic!("expected opened");
        };
        let token = SessionToken {
            instance: DeviceInstance(1),
            sequence: 1,
        };
        device.create_capture_session(&[], token).unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(platform.release_held(), 2);
        assert!(matches!(rx.try_recv().unwrap(), DeviceCallback::SessionConfigured { .. }));
        assert!(matches!(rx.try_recv().unwrap(), DeviceCallback::SessionReady { .. }));
    }

    #[test]
    fn test_held_close_released_later() {
        let mut platform = SimulatedPlatform::phone();
        let (sink, rx) = channel_sink();
        platform.hold_device_close(true);
        platform.open_camera("0", DeviceInstance(1), sink).unwrap();
        let Ok(DeviceCallback::Opened { mut device, .. }) = rx.try_recv() else {
            panic!("expected opened");
        };
        device.close();
        assert!(rx.try_recv().is_err());
        assert_eq!(platform.open_device_count(), 0);
        assert_eq!(platform.release_held(), 1);
        assert!(matches!(rx.try_recv().unwrap(), DeviceCallback::Closed { .. }));
    }

    #[test]
    fn test_wait_until_times_out() {
        assert!(wait_until(Duration::from_millis(20), || true));
        assert!(!wait_until(Duration::from_millis(20), || false));
    }
}
