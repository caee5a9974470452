//! Renderable output targets supplied by the surface provider.

use crate::types::Size;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle of a renderable surface owned by the surface provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "surface#{}", self.0)
    }
}

/// A surface the preview can be drawn into, with its current view bounds.
///
/// The core never assumes the surface outlives a device close: every open
/// binds it afresh and every close releases the binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTarget {
    pub id: SurfaceId,
    pub bounds: Size,
}

impl OutputTarget {
    pub fn new(id: u64, width: u32, height: u32) -> Self {
        Self {
            id: SurfaceId(id),
            bounds: Size::new(width, height),
        }
    }

    pub fn resized(&self, width: u32, height: u32) -> Self {
        Self {
            id: self.id,
            bounds: Size::new(width, height),
        }
    }
}
