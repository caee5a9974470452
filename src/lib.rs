//! rawstreamer: camera device orchestration over a callback-driven device API
//!
//! This crate drives a platform camera stack on behalf of a preview UI: it
//! picks lenses, opens and closes devices, configures capture sessions,
//! maintains a discrete zoom ladder and streams either a processed preview
//! or unprocessed raw sensor frames.
//!
//! # Features
//! - Facing and lens switching, including physical sub-sensors of composite cameras
//! - Device and session lifecycle with stale-callback rejection
//! - Discrete zoom ladder with clamped progress
//! - Manual raw capture with per-frame parameter tracking
//! - One background worker owning all device state
//!
//! # Usage
//! ```rust,ignore
//! use rawstreamer::{event_channel, CameraService, OutputTarget};
//!
//! let (ui, mut events) = event_channel();
//! let service = CameraService::builder(platform).ui_sink(ui).build()?;
//! service.activate(OutputTarget::new(1, 1080, 1920), None)?;
//! service.set_zoom(4)?;
//! service.switch_facing()?;
//! service.deactivate()?;
//! ```
pub mod config;
pub mod device;
pub mod errors;
pub mod events;
pub mod executor;
pub mod frames;
pub mod lens;
pub mod permissions;
pub mod platform;
pub mod request;
pub mod results;
pub mod service;
pub mod session;
pub mod surface;
pub mod types;
pub mod zoom;

// Testing utilities - simulated device API for offline testing
pub mod testing;

// Re-exports for convenience
pub use config::RawStreamerConfig;
pub use device::{CameraDeviceController, DeviceState};
pub use errors::{CameraError, DeviceErrorCode};
pub use events::{event_channel, ChannelUiSink, LogUiSink, UiEvent, UiSink};
pub use executor::BackgroundExecutor;
pub use frames::{FrameSink, RawCaptureStats, RawImage};
pub use lens::{LensCatalog, LensSelection, LensSwitch};
pub use permissions::{PermissionGate, PermissionStatus, SharedPermission, StaticPermission};
pub use platform::{CallbackSink, CameraDevice, CameraPlatform, CaptureSession, DeviceCallback};
pub use request::{CaptureRequest, CaptureRequestBuilder, RawSettings};
pub use results::{CaptureResult, ParamValue, ResultTracker};
pub use service::{CameraService, CameraServiceBuilder, CameraSnapshot};
pub use session::{CaptureSessionManager, SessionState};
pub use surface::{OutputTarget, SurfaceId};
pub use types::{CameraCapabilities, CameraCharacteristics, CaptureMode, DeviceIdentity, Facing, FpsRange, Size};
pub use zoom::ZoomLadder;

/// Initialize logging for the camera core
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "rawstreamer=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}
