//! Contract of the callback-driven device API.
//!
//! Every call here returns immediately. Completion is reported later by the
//! platform posting a [`DeviceCallback`] through the [`CallbackSink`] it was
//! handed at open time; the sink delivers onto the background executor, so
//! callbacks never run concurrently with each other or with control
//! commands.

use crate::errors::{DeviceErrorCode, Result};
use crate::frames::RawImage;
use crate::request::CaptureRequest;
use crate::results::CaptureResult;
use crate::surface::SurfaceId;
use crate::types::{CameraCharacteristics, Size};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifies one open/close cycle of a device. Callbacks tagged with a
/// stale instance are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceInstance(pub u64);

impl fmt::Display for DeviceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device#{}", self.0)
    }
}

/// Identifies one session configuration on one device instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken {
    pub instance: DeviceInstance,
    pub sequence: u64,
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/session#{}", self.instance, self.sequence)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputKind {
    Preview,
    Raw,
}

/// One output of a session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputConfig {
    /// The provider's renderable surface, with its buffer sized to `size`.
    Preview {
        surface: SurfaceId,
        size: Size,
        physical_id: Option<String>,
    },
    /// A platform-side raw sensor reader.
    RawReader {
        size: Size,
        max_images: u32,
        physical_id: Option<String>,
    },
}

impl OutputConfig {
    pub fn kind(&self) -> OutputKind {
        match self {
            OutputConfig::Preview { .. } => OutputKind::Preview,
            OutputConfig::RawReader { .. } => OutputKind::Raw,
        }
    }

    pub fn size(&self) -> Size {
        match self {
            OutputConfig::Preview { size, .. } | OutputConfig::RawReader { size, .. } => *size,
        }
    }

    pub fn physical_id(&self) -> Option<&str> {
        match self {
            OutputConfig::Preview { physical_id, .. }
            | OutputConfig::RawReader { physical_id, .. } => physical_id.as_deref(),
        }
    }
}

/// Entry point of the device API.
pub trait CameraPlatform: Send {
    /// Logical camera ids in the platform's enumeration order.
    fn camera_ids(&self) -> Result<Vec<String>>;

    fn characteristics(&self, camera_id: &str) -> Result<CameraCharacteristics>;

    /// Start opening `camera_id`. Completion arrives as
    /// [`DeviceCallback::Opened`], `Disconnected` or `Error`.
    fn open_camera(
        &mut self,
        camera_id: &str,
        instance: DeviceInstance,
        callbacks: CallbackSink,
    ) -> Result<()>;

    /// Release an output previously bound to a session.
    fn release_output(&mut self, output: &OutputConfig);
}

/// An open device handle. Owned by the device controller.
pub trait CameraDevice: Send {
    fn id(&self) -> &str;

    fn instance(&self) -> DeviceInstance;

    /// Start configuring a session. Completion arrives as
    /// `SessionConfigured` followed by `SessionReady`, or
    /// `SessionConfigureFailed`.
    fn create_capture_session(&mut self, outputs: &[OutputConfig], token: SessionToken)
        -> Result<()>;

    /// Start closing. Completion arrives as [`DeviceCallback::Closed`].
    fn close(&mut self);
}

/// A configured session handle. Owned by the session manager.
pub trait CaptureSession: Send {
    fn token(&self) -> SessionToken;

    fn set_repeating_request(&mut self, request: &CaptureRequest) -> Result<()>;

    fn stop_repeating(&mut self) -> Result<()>;

    fn close(&mut self);
}

/// Asynchronous completions delivered by the device API.
pub enum DeviceCallback {
    Opened {
        instance: DeviceInstance,
        device: Box<dyn CameraDevice>,
    },
    Disconnected {
        instance: DeviceInstance,
    },
    Error {
        instance: DeviceInstance,
        code: DeviceErrorCode,
    },
    Closed {
        instance: DeviceInstance,
    },
    SessionConfigured {
        token: SessionToken,
    },
    SessionReady {
        token: SessionToken,
        session: Box<dyn CaptureSession>,
    },
    SessionConfigureFailed {
        token: SessionToken,
    },
    CaptureCompleted {
        token: SessionToken,
        frame_number: u64,
        result: CaptureResult,
    },
    RawImageAvailable {
        token: SessionToken,
        image: RawImage,
    },
}

impl DeviceCallback {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceCallback::Opened { .. } => "opened",
            DeviceCallback::Disconnected { .. } => "disconnected",
            DeviceCallback::Error { .. } => "error",
            DeviceCallback::Closed { .. } => "closed",
            DeviceCallback::SessionConfigured { .. } => "session_configured",
            DeviceCallback::SessionReady { .. } => "session_ready",
            DeviceCallback::SessionConfigureFailed { .. } => "session_configure_failed",
            DeviceCallback::CaptureCompleted { .. } => "capture_completed",
            DeviceCallback::RawImageAvailable { .. } => "raw_image_available",
        }
    }
}

impl fmt::Debug for DeviceCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceCallback::Opened { instance, device } => f
                .debug_struct("Opened")
                .field("instance", instance)
                .field("device", &device.id())
                .finish(),
            DeviceCallback::Disconnected { instance } | DeviceCallback::Closed { instance } => f
                .debug_struct(self.name())
                .field("instance", instance)
                .finish(),
            DeviceCallback::Error { instance, code } => f
                .debug_struct("Error")
                .field("instance", instance)
                .field("code", code)
                .finish(),
            DeviceCallback::SessionConfigured { token }
            | DeviceCallback::SessionConfigureFailed { token }
            | DeviceCallback::SessionReady { token, .. } => {
                f.debug_struct(self.name()).field("token", token).finish()
            }
            DeviceCallback::CaptureCompleted {
                token,
                frame_number,
                ..
            } => f
                .debug_struct("CaptureCompleted")
                .field("token", token)
                .field("frame_number", frame_number)
                .finish(),
            DeviceCallback::RawImageAvailable { token, image } => f
                .debug_struct("RawImageAvailable")
                .field("token", token)
                .field("size", &image.size)
                .finish(),
        }
    }
}

/// Route by which the platform posts callbacks onto the background executor.
#[derive(Clone)]
pub struct CallbackSink {
    deliver: Arc<dyn Fn(DeviceCallback) -> bool + Send + Sync>,
}

impl CallbackSink {
    pub fn new<F>(deliver: F) -> Self
    where
        F: Fn(DeviceCallback) -> bool + Send + Sync + 'static,
    {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    /// Queue a callback. Returns false once the executor has shut down, in
    /// which case the callback is dropped.
    pub fn post(&self, callback: DeviceCallback) -> bool {
        let name = callback.name();
        let delivered = (self.deliver)(callback);
        if !delivered {
            log::debug!("Dropped '{}' callback: executor is gone", name);
        }
        delivered
    }
}

impl fmt::Debug for CallbackSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackSink").finish_non_exhaustive()
    }
}
