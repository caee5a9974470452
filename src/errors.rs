use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors returned by the camera core.
///
/// Device-level failures (errors, disconnects, configure failures) are not
/// returned from control calls. They are reported through
/// [`UiEvent`](crate::events::UiEvent)s and the core returns to a
/// re-activatable state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CameraError {
    #[error("Camera initialization error: {0}")]
    InitializationError(String),
    #[error("Permission denied error: {0}")]
    PermissionDenied(String),
    #[error("Camera device error: {0}")]
    DeviceError(DeviceErrorCode),
    #[error("Capture session error: {0}")]
    SessionError(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Background executor error: {0}")]
    ExecutorError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl CameraError {
    pub fn invalid_state(message: impl Into<String>) -> Self {
        CameraError::InvalidState(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        CameraError::InvalidArgument(message.into())
    }

    pub fn not_found(entity: &str, id: &str) -> Self {
        CameraError::NotFound(format!("{entity} not found: {id}"))
    }
}

/// Result type for camera core operations.
pub type Result<T> = std::result::Result<T, CameraError>;

/// Error code reported by the device API when an open device fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceErrorCode {
    /// Device is already in use by a higher-priority client.
    InUse,
    /// The system-wide limit of open cameras has been reached.
    MaxCamerasInUse,
    /// Disabled by policy.
    Disabled,
    /// Fatal device error, the device must be reopened.
    Device,
    /// Fatal camera service error.
    Service,
    Other(i32),
}

impl DeviceErrorCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => DeviceErrorCode::InUse,
            2 => DeviceErrorCode::MaxCamerasInUse,
            3 => DeviceErrorCode::Disabled,
            4 => DeviceErrorCode::Device,
            5 => DeviceErrorCode::Service,
            other => DeviceErrorCode::Other(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            DeviceErrorCode::InUse => 1,
            DeviceErrorCode::MaxCamerasInUse => 2,
            DeviceErrorCode::Disabled => 3,
            DeviceErrorCode::Device => 4,
            DeviceErrorCode::Service => 5,
            DeviceErrorCode::Other(code) => *code,
        }
    }

    /// Whether the error means the device cannot be used until reopened
    /// from scratch (as opposed to a contention error).
    pub fn is_fatal(&self) -> bool {
        matches!(self, DeviceErrorCode::Device | DeviceErrorCode::Service)
    }
}

impl fmt::Display for DeviceErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceErrorCode::InUse => write!(f, "camera in use (1)"),
            DeviceErrorCode::MaxCamerasInUse => write!(f, "max cameras in use (2)"),
            DeviceErrorCode::Disabled => write!(f, "camera disabled (3)"),
            DeviceErrorCode::Device => write!(f, "fatal device error (4)"),
            DeviceErrorCode::Service => write!(f, "camera service error (5)"),
            DeviceErrorCode::Other(code) => write!(f, "unknown error ({code})"),
        }
    }
}
