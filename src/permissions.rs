use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Permission status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PermissionStatus {
    /// Permission granted
    Granted,
    /// Permission denied
    Denied,
    /// Permission not determined (user hasn't been asked yet)
    NotDetermined,
    /// Permission restricted (parental controls, etc)
    Restricted,
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStatus::Granted => write!(f, "granted"),
            PermissionStatus::Denied => write!(f, "denied"),
            PermissionStatus::NotDetermined => write!(f, "not_determined"),
            PermissionStatus::Restricted => write!(f, "restricted"),
        }
    }
}

impl PermissionStatus {
    fn to_u8(self) -> u8 {
        match self {
            PermissionStatus::Granted => 0,
            PermissionStatus::Denied => 1,
            PermissionStatus::NotDetermined => 2,
            PermissionStatus::Restricted => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => PermissionStatus::Granted,
            1 => PermissionStatus::Denied,
            3 => PermissionStatus::Restricted,
            _ => PermissionStatus::NotDetermined,
        }
    }
}

/// Answers whether the camera may be opened. Prompting the user is the
/// caller's business; the core only asks.
pub trait PermissionGate: Send + Sync {
    fn status(&self) -> PermissionStatus;

    fn is_camera_permission_granted(&self) -> bool {
        self.status() == PermissionStatus::Granted
    }
}

/// Gate with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticPermission(pub PermissionStatus);

impl StaticPermission {
    pub fn granted() -> Self {
        Self(PermissionStatus::Granted)
    }

    pub fn denied() -> Self {
        Self(PermissionStatus::Denied)
    }
}

impl PermissionGate for StaticPermission {
    fn status(&self) -> PermissionStatus {
        self.0
    }
}

/// Gate whose answer the host updates after a permission prompt returns.
/// Clones share the same status.
#[derive(Debug, Clone)]
pub struct SharedPermission {
    status: Arc<AtomicU8>,
}

impl SharedPermission {
    pub fn new(initial: PermissionStatus) -> Self {
        Self {
            status: Arc::new(AtomicU8::new(initial.to_u8())),
        }
    }

    pub fn set(&self, status: PermissionStatus) {
        log::info!("Camera permission is now {}", status);
        self.status.store(status.to_u8(), Ordering::SeqCst);
    }
}

impl PermissionGate for SharedPermission {
    fn status(&self) -> PermissionStatus {
        PermissionStatus::from_u8(self.status.load(Ordering::SeqCst))
    }
}
