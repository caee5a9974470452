//! Device lifecycle state machine
//!
//! [`CameraDeviceController`] owns at most one device handle at a time.
//! Requests (`open`, `close`, `reopen`) start asynchronous platform calls;
//! completions come back through the named `on_*` handlers, each returning
//! a [`DeviceTransition`] for the caller to act on. Every handler checks the
//! callback's [`DeviceInstance`] first, so completions of an earlier
//! open/close cycle never touch the current one.

use crate::errors::{CameraError, DeviceErrorCode, Result};
use crate::permissions::PermissionGate;
use crate::platform::{CallbackSink, CameraDevice, CameraPlatform, DeviceInstance};
use crate::types::DeviceIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceState {
    Closed,
    Opening,
    Open,
    /// Close issued, waiting for the platform to confirm.
    Closing,
    /// Lost to another client or unplugged; handle is being released.
    Disconnected,
    /// Failed with a device error; handle is being released.
    Error,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceState::Closed => "closed",
            DeviceState::Opening => "opening",
            DeviceState::Open => "open",
            DeviceState::Closing => "closing",
            DeviceState::Disconnected => "disconnected",
            DeviceState::Error => "error",
        };
        f.write_str(name)
    }
}

/// Result of an `open` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Opening(DeviceInstance),
    /// Camera permission is missing; nothing happened.
    PermissionMissing,
}

/// Result of a `reopen` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReopenOutcome {
    /// Nothing was open; the caller may open right away.
    OpenNow,
    /// A close is in flight; the open is deferred until `Closed` arrives.
    AfterClose,
}

/// What a device callback changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceTransition {
    /// Device is open and ready for session configuration.
    Opened {
        identity: DeviceIdentity,
        instance: DeviceInstance,
    },
    Disconnected { identity: DeviceIdentity },
    Failed {
        identity: DeviceIdentity,
        code: DeviceErrorCode,
    },
    /// Fully settled in `Closed`. `reopen` carries a deferred open request.
    Closed { reopen: Option<DeviceIdentity> },
    /// Stale or redundant callback.
    Ignored,
}

/// Owner of the single device handle.
pub struct CameraDeviceController {
    state: DeviceState,
    identity: Option<DeviceIdentity>,
    instance: Option<DeviceInstance>,
    next_instance: u64,
    device: Option<Box<dyn CameraDevice>>,
    pending_open: Option<DeviceIdentity>,
    last_error: Option<DeviceErrorCode>,
}

impl Default for CameraDeviceController {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraDeviceController {
    pub fn new() -> Self {
        Self {
            state: DeviceState::Closed,
            identity: None,
            instance: None,
            next_instance: 1,
            device: None,
            pending_open: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn identity(&self) -> Option<&DeviceIdentity> {
        self.identity.as_ref()
    }

    pub fn instance(&self) -> Option<DeviceInstance> {
        self.instance
    }

    pub fn last_error(&self) -> Option<DeviceErrorCode> {
        self.last_error
    }

    pub fn has_pending_open(&self) -> bool {
        self.pending_open.is_some()
    }

    /// The open handle, only while `Open`.
    pub fn device_mut(&mut self) -> Option<&mut (dyn CameraDevice + 'static)> {
        if self.state != DeviceState::Open {
            return None;
        }
        self.device.as_deref_mut()
    }

    fn is_current(&self, instance: DeviceInstance) -> bool {
        self.instance == Some(instance)
    }

    /// Start opening `identity`.
    ///
    /// Requires `Closed`; opening over a live or closing device is rejected,
    /// use [`reopen`](Self::reopen) for that. Missing permission is a silent
    /// no-op.
    pub fn open(
        &mut self,
        platform: &mut dyn CameraPlatform,
        identity: DeviceIdentity,
        permission: &dyn PermissionGate,
        callbacks: CallbackSink,
    ) -> Result<OpenOutcome> {
        if self.state != DeviceState::Closed {
            return Err(CameraError::invalid_state(format!(
                "cannot open camera {} while device is {}",
                identity.logical_id, self.state
            )));
        }
        if !permission.is_camera_permission_granted() {
            log::info!(
                "Camera permission not granted, not opening camera {}",
                identity.logical_id
            );
            return Ok(OpenOutcome::PermissionMissing);
        }

        let instance = DeviceInstance(self.next_instance);
        self.next_instance += 1;

        log::info!("Opening camera {} as {}", identity.logical_id, instance);
        self.state = DeviceState::Opening;
        self.instance = Some(instance);
        self.last_error = None;

        if let Err(e) = platform.open_camera(&identity.logical_id, instance, callbacks) {
            log::error!("Failed to open camera {}: {}", identity.logical_id, e);
            self.state = DeviceState::Closed;
            self.instance = None;
            return Err(e);
        }
        self.identity = Some(identity);
        Ok(OpenOutcome::Opening(instance))
    }

    /// Start closing. Idempotent, and cancels any deferred open.
    pub fn close(&mut self) {
        self.pending_open = None;
        self.begin_close();
    }

    /// Close the current device and open `identity` once `Closed` is
    /// confirmed.
    pub fn reopen(&mut self, identity: DeviceIdentity) -> ReopenOutcome {
        if self.state == DeviceState::Closed {
            return ReopenOutcome::OpenNow;
        }
        log::debug!(
            "Deferring open of camera {} until device is closed",
            identity.logical_id
        );
        self.pending_open = Some(identity);
        self.begin_close();
        ReopenOutcome::AfterClose
    }

    /// Defer an open until the in-flight close settles.
    pub fn open_after_close(&mut self, identity: DeviceIdentity) {
        self.pending_open = Some(identity);
    }

    fn begin_close(&mut self) {
        match self.state {
            DeviceState::Open => {
                if let Some(device) = self.device.as_mut() {
                    log::info!("Closing camera {}", device.id());
                    device.close();
                }
                self.state = DeviceState::Closing;
            }
            DeviceState::Opening => {
                // The handle is closed as soon as it arrives.
                log::debug!("Close requested while opening");
                self.state = DeviceState::Closing;
            }
            DeviceState::Closed
            | DeviceState::Closing
            | DeviceState::Disconnected
            | DeviceState::Error => {}
        }
    }

    pub fn on_opened(
        &mut self,
        instance: DeviceInstance,
        mut device: Box<dyn CameraDevice>,
    ) -> DeviceTransition {
        if !self.is_current(instance) {
            log::warn!("Closing stale device handle {}", instance);
            device.close();
            return DeviceTransition::Ignored;
        }

        match self.state {
            DeviceState::Opening => {
                log::info!("Camera {} opened", device.id());
                self.device = Some(device);
                self.state = DeviceState::Open;
                match &self.identity {
                    Some(identity) => DeviceTransition::Opened {
                        identity: identity.clone(),
                        instance,
                    },
                    None => DeviceTransition::Ignored,
                }
            }
            DeviceState::Closing => {
                log::debug!("Camera {} opened after close was requested", device.id());
                device.close();
                self.device = Some(device);
                DeviceTransition::Ignored
            }
            state => {
                log::warn!("Unexpected open callback in state {}", state);
                device.close();
                DeviceTransition::Ignored
            }
        }
    }

    pub fn on_disconnected(&mut self, instance: DeviceInstance) -> DeviceTransition {
        if !self.is_current(instance) {
            log::debug!("Ignoring disconnect of stale {}", instance);
            return DeviceTransition::Ignored;
        }
        let Some(identity) = self.identity.clone() else {
            return DeviceTransition::Ignored;
        };
        log::warn!("Camera {} disconnected", identity.logical_id);
        self.release(DeviceState::Disconnected);
        DeviceTransition::Disconnected { identity }
    }

    pub fn on_error(&mut self, instance: DeviceInstance, code: DeviceErrorCode) -> DeviceTransition {
        if !self.is_current(instance) {
            log::debug!("Ignoring error {} of stale {}", code, instance);
            return DeviceTransition::Ignored;
        }
        let Some(identity) = self.identity.clone() else {
            return DeviceTransition::Ignored;
        };
        log::error!("Camera {} error: {}", identity.logical_id, code);
        self.last_error = Some(code);
        self.release(DeviceState::Error);
        DeviceTransition::Failed { identity, code }
    }

    /// Close the handle after a disconnect or error. Without a handle there
    /// is nothing to wait for and the device settles in `Closed` at once.
    fn release(&mut self, failed_state: DeviceState) {
        let already_closing = self.state == DeviceState::Closing;
        match self.device.as_mut() {
            Some(device) => {
                if !already_closing {
                    device.close();
                }
                self.state = failed_state;
            }
            None => self.settle_closed(),
        }
    }

    /// Settle in `Closed` without waiting for the platform to confirm a
    /// close already issued. A late `Closed` of the abandoned instance is
    /// then stale.
    pub fn abandon(&mut self) {
        if self.state != DeviceState::Closed {
            log::warn!(
                "Abandoning {} camera {:?} before close was confirmed",
                self.state,
                self.identity.as_ref().map(|i| i.logical_id.as_str())
            );
        }
        self.pending_open = None;
        self.settle_closed();
    }

    fn settle_closed(&mut self) {
        self.state = DeviceState::Closed;
        self.device = None;
        self.instance = None;
    }

    pub fn on_closed(&mut self, instance: DeviceInstance) -> DeviceTransition {
        if !self.is_current(instance) {
            log::debug!("Ignoring close of stale {}", instance);
            return DeviceTransition::Ignored;
        }
        if let Some(identity) = &self.identity {
            log::info!("Camera {} closed", identity.logical_id);
        }
        self.settle_closed();
        DeviceTransition::Closed {
            reopen: self.pending_open.take(),
        }
    }

    /// Settle in `Closed` if the device is already there, handing back any
    /// deferred open. Used after disconnects that carried no handle.
    pub fn take_pending_if_closed(&mut self) -> Option<DeviceIdentity> {
        if self.state == DeviceState::Closed {
            self.pending_open.take()
        } else {
            None
        }
    }
}

impl fmt::Debug for CameraDeviceController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraDeviceController")
            .field("state", &self.state)
            .field("identity", &self.identity)
            .field("instance", &self.instance)
            .field("pending_open", &self.pending_open)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::StaticPermission;
    use crate::platform::{DeviceCallback, OutputConfig, SessionToken};
    use crate::types::{CameraCharacteristics, Facing};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Calls {
        opened: Vec<DeviceInstance>,
        closed: Vec<DeviceInstance>,
    }

    struct FakePlatform {
        calls: Arc<Mutex<Calls>>,
    }

    struct FakeDevice {
        instance: DeviceInstance,
        calls: Arc<Mutex<Calls>>,
    }

    impl CameraDevice for FakeDevice {
        fn id(&self) -> &str {
            "0"
        }

        fn instance(&self) -> DeviceInstance {
            self.instance
        }

        fn create_capture_session(&mut self, _: &[OutputConfig], _: SessionToken) -> Result<()> {
            Ok(())
        }

        fn close(&mut self) {
            self.calls.lock().unwrap().closed.push(self.instance);
        }
    }

    impl CameraPlatform for FakePlatform {
        fn camera_ids(&self) -> Result<Vec<String>> {
            Ok(vec!["0".to_string()])
        }

        fn characteristics(&self, camera_id: &str) -> Result<CameraCharacteristics> {
            Err(CameraError::not_found("camera", camera_id))
        }

        fn open_camera(&mut self, _: &str, instance: DeviceInstance, _: CallbackSink) -> Result<()> {
            self.calls.lock().unwrap().opened.push(instance);
            Ok(())
        }

        fn release_output(&mut self, _: &OutputConfig) {}
    }

    fn setup() -> (CameraDeviceController, FakePlatform, Arc<Mutex<Calls>>, CallbackSink) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let platform = FakePlatform {
            calls: calls.clone(),
        };
        let sink = CallbackSink::new(|_: DeviceCallback| true);
        (CameraDeviceController::new(), platform, calls, sink)
    }

    fn back() -> DeviceIdentity {
        DeviceIdentity::new("0", Facing::Back)
    }

    fn device(instance: DeviceInstance, calls: &Arc<Mutex<Calls>>) -> Box<dyn CameraDevice> {
        Box::new(FakeDevice {
            instance,
            calls: calls.clone(),
        })
    }

    #[test]
    fn test_open_close_cycle() {
        let (mut controller, mut platform, calls, sink) = setup();
        let outcome = controller
            .open(&mut platform, back(), &StaticPermission::granted(), sink)
            .unwrap();
        let OpenOutcome::Opening(instance) = outcome else {
            panic!("expected opening");
        };
        assert_eq!(controller.state(), DeviceState::Opening);

        let transition = controller.on_opened(instance, device(instance, &calls));
        assert!(matches!(transition, DeviceTransition::Opened { .. }));
        assert_eq!(controller.state(), DeviceState::Open);

        controller.close();
        assert_eq!(controller.state(), DeviceState::Closing);
        assert_eq!(calls.lock().unwrap().closed, vec![instance]);

        let transition = controller.on_closed(instance);
        assert_eq!(transition, DeviceTransition::Closed { reopen: None });
        assert_eq!(controller.state(), DeviceState::Closed);
    }

    #[test]
    fn test_abandon_unconfirmed_close() {
        let (mut controller, mut platform, calls, sink) = setup();
        let OpenOutcome::Opening(first) = controller
            .open(&mut platform, back(), &StaticPermission::granted(), sink.clone())
            .unwrap()
        else {
            panic!("expected opening");
        };
        controller.on_opened(first, device(first, &calls));
        assert_eq!(controller.reopen(back()), ReopenOutcome::AfterClose);
        assert_eq!(controller.state(), DeviceState::Closing);

        controller.abandon();
        assert_eq!(controller.state(), DeviceState::Closed);
        assert_eq!(controller.instance(), None);
        assert!(!controller.has_pending_open());
        assert_eq!(controller.on_closed(first), DeviceTransition::Ignored);

        let outcome = controller
            .open(&mut platform, back(), &StaticPermission::granted(), sink)
            .unwrap();
        assert!(matches!(outcome, OpenOutcome::Opening(second) if second != first));
        assert_eq!(calls.lock().unwrap().opened.len(), 2);
    }

    #[test]
    fn test_open_without_permission_is_noop() {
        let (mut controller, mut platform, calls, sink) = setup();
        let outcome = controller
            .open(&mut platform, back(), &StaticPermission::denied(), sink)
            .unwrap();
        assert_eq!(outcome, OpenOutcome::PermissionMissing);
        assert_eq!(controller.state(), DeviceState::Closed);
        assert!(calls.lock().unwrap().opened.is_empty());
    }

    #[test]
    fn test_open_while_open_rejected() {
        let (mut controller, mut platform, _calls, sink) = setup();
        controller
            .open(&mut platform, back(), &StaticPermission::granted(), sink.clone())
            .unwrap();
        let err = controller
            .open(&mut platform, back(), &StaticPermission::granted(), sink)
            .unwrap_err();
        assert!(matches!(err, CameraError::InvalidState(_)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let (mut controller, _platform, calls, _sink) = setup();
        controller.close();
        controller.close();
        assert_eq!(controller.state(), DeviceState::Closed);
        assert!(calls.lock().unwrap().closed.is_empty());
    }

    #[test]
    fn test_reopen_waits_for_closed() {
        let (mut controller, mut platform, calls, sink) = setup();
        let OpenOutcome::Opening(first) = controller
            .open(&mut platform, back(), &StaticPermission::granted(), sink)
            .unwrap()
        else {
            panic!("expected opening");
        };
        controller.on_opened(first, device(first, &calls));

        let front = DeviceIdentity::new("1", Facing::Front);
        assert_eq!(controller.reopen(front.clone()), ReopenOutcome::AfterClose);
        assert_eq!(controller.state(), DeviceState::Closing);
        assert_eq!(calls.lock().unwrap().opened.len(), 1);

        assert_eq!(
            controller.on_closed(first),
            DeviceTransition::Closed {
                reopen: Some(front)
            }
        );
    }

    #[test]
    fn test_close_during_opening_closes_late_handle() {
        let (mut controller, mut platform, calls, sink) = setup();
        let OpenOutcome::Opening(instance) = controller
            .open(&mut platform, back(), &StaticPermission::granted(), sink)
            .unwrap()
        else {
            panic!("expected opening");
        };
        controller.close();
        assert_eq!(
            controller.on_opened(instance, device(instance, &calls)),
            DeviceTransition::Ignored
        );
        assert_eq!(calls.lock().unwrap().closed, vec![instance]);
        assert_eq!(controller.state(), DeviceState::Closing);
        controller.on_closed(instance);
        assert_eq!(controller.state(), DeviceState::Closed);
    }

    #[test]
    fn test_stale_callbacks_ignored() {
        let (mut controller, mut platform, calls, sink) = setup();
        let OpenOutcome::Opening(instance) = controller
            .open(&mut platform, back(), &StaticPermission::granted(), sink)
            .unwrap()
        else {
            panic!("expected opening");
        };
        let stale = DeviceInstance(instance.0 + 100);
        assert_eq!(controller.on_disconnected(stale), DeviceTransition::Ignored);
        assert_eq!(
            controller.on_error(stale, DeviceErrorCode::Device),
            DeviceTransition::Ignored
        );
        assert_eq!(controller.on_opened(stale, device(stale, &calls)), DeviceTransition::Ignored);
        assert_eq!(calls.lock().unwrap().closed, vec![stale]);
        assert_eq!(controller.state(), DeviceState::Opening);
    }

    #[test]
    fn test_error_releases_handle() {
        let (mut controller, mut platform, calls, sink) = setup();
        let OpenOutcome::Opening(instance) = controller
            .open(&mut platform, back(), &StaticPermission::granted(), sink)
            .unwrap()
        else {
            panic!("expected opening");
        };
        controller.on_opened(instance, device(instance, &calls));

        let transition = controller.on_error(instance, DeviceErrorCode::Device);
        assert!(matches!(transition, DeviceTransition::Failed { code: DeviceErrorCode::Device, .. }));
        assert_eq!(controller.state(), DeviceState::Error);
        assert!(controller.device_mut().is_none());
        controller.on_closed(instance);
        assert_eq!(controller.state(), DeviceState::Closed);
        assert_eq!(controller.last_error(), Some(DeviceErrorCode::Device));
    }

    #[test]
    fn test_disconnect_while_opening_settles_immediately() {
        let (mut controller, mut platform, _calls, sink) = setup();
        let OpenOutcome::Opening(instance) = controller
            .open(&mut platform, back(), &StaticPermission::granted(), sink)
            .unwrap()
        else {
            panic!("expected opening");
        };
        assert!(matches!(
            controller.on_disconnected(instance),
            DeviceTransition::Disconnected { .. }
        ));
        assert_eq!(controller.state(), DeviceState::Closed);
    }
}
