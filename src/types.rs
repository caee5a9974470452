//! Value types shared across the camera core.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction a sensor faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facing {
    Front,
    Back,
}

impl Facing {
    pub fn opposite(&self) -> Facing {
        match self {
            Facing::Front => Facing::Back,
            Facing::Back => Facing::Front,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Facing::Front => "front",
            Facing::Back => "rear",
        }
    }
}

impl fmt::Display for Facing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A selectable sensor unit as enumerated by the platform.
///
/// `physical_ids` is empty unless the unit is a composite ("logical") sensor
/// fused from several physical sub-sensors. Order is the platform's
/// enumeration order and is never re-sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub logical_id: String,
    pub facing: Facing,
    pub physical_ids: Vec<String>,
}

impl DeviceIdentity {
    pub fn new(logical_id: impl Into<String>, facing: Facing) -> Self {
        Self {
            logical_id: logical_id.into(),
            facing,
            physical_ids: Vec::new(),
        }
    }

    pub fn with_physical_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.physical_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Backed by at least two physical sub-sensors.
    pub fn is_composite(&self) -> bool {
        self.physical_ids.len() > 1
    }

    pub fn first_physical_id(&self) -> Option<&str> {
        self.physical_ids.first().map(String::as_str)
    }
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn transposed(&self) -> Size {
        Size::new(self.height, self.width)
    }

    /// Same aspect ratio as `other`, compared exactly in integers.
    pub fn same_aspect(&self, other: &Size) -> bool {
        u64::from(self.width) * u64::from(other.height)
            == u64::from(self.height) * u64::from(other.width)
    }

    pub fn fits_within(&self, bounds: &Size) -> bool {
        self.width <= bounds.width && self.height <= bounds.height
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Auto-exposure target frame-rate range, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FpsRange {
    pub lower: u32,
    pub upper: u32,
}

impl FpsRange {
    pub const fn new(lower: u32, upper: u32) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, fps: u32) -> bool {
        self.lower <= fps && fps <= self.upper
    }

    pub fn width(&self) -> u32 {
        self.upper.saturating_sub(self.lower)
    }

    /// Distance from `fps` to the nearest bound; zero when contained.
    pub fn distance_to(&self, fps: u32) -> u32 {
        if fps < self.lower {
            self.lower - fps
        } else {
            fps.saturating_sub(self.upper)
        }
    }

    /// Pick the range for `target` from the platform's list.
    ///
    /// The narrowest containing range wins, so an exact `[t, t]` beats any
    /// wider one. With no containing range the nearest range is chosen, ties
    /// going to the narrower one, then to enumeration order.
    pub fn select(ranges: &[FpsRange], target: u32) -> Option<FpsRange> {
        ranges
            .iter()
            .enumerate()
            .min_by_key(|(index, range)| (range.distance_to(target), range.width(), *index))
            .map(|(_, range)| *range)
    }
}

impl fmt::Display for FpsRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.lower, self.upper)
    }
}

/// Static description of one identity, as reported by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraCharacteristics {
    pub identity: DeviceIdentity,
    pub capabilities: CameraCapabilities,
}

/// Per-identity capabilities, queried on every open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraCapabilities {
    /// Optical zoom range `(min, max)`.
    pub zoom_range: (f32, f32),
    pub fps_ranges: Vec<FpsRange>,
    pub raw_capable: bool,
    /// Clockwise rotation of the sensor relative to the device's natural
    /// orientation, in degrees.
    pub sensor_orientation: u32,
    /// Sizes available to the preview surface, in enumeration order.
    pub stream_sizes: Vec<Size>,
    /// Sizes available to raw sensor output.
    pub raw_sizes: Vec<Size>,
}

impl Default for CameraCapabilities {
    fn default() -> Self {
        Self {
            zoom_range: (1.0, 1.0),
            fps_ranges: vec![FpsRange::new(15, 30), FpsRange::new(30, 30)],
            raw_capable: false,
            sensor_orientation: 90,
            stream_sizes: vec![Size::new(1920, 1080), Size::new(1280, 720), Size::new(640, 480)],
            raw_sizes: Vec::new(),
        }
    }
}

impl CameraCapabilities {
    /// Largest raw output size by area.
    pub fn largest_raw_size(&self) -> Option<Size> {
        self.raw_sizes.iter().copied().max_by_key(Size::area)
    }

    /// Whether the sensor is mounted rotated by a quarter turn.
    pub fn is_rotated(&self) -> bool {
        self.sensor_orientation % 180 != 0
    }
}

/// Which request drives the live output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CaptureMode {
    Preview,
    Raw,
}

impl CaptureMode {
    pub fn toggled(&self) -> CaptureMode {
        match self {
            CaptureMode::Preview => CaptureMode::Raw,
            CaptureMode::Raw => CaptureMode::Preview,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fps_select_prefers_exact() {
        let ranges = [FpsRange::new(15, 30), FpsRange::new(30, 30), FpsRange::new(7, 30)];
        assert_eq!(FpsRange::select(&ranges, 30), Some(FpsRange::new(30, 30)));
        assert_eq!(FpsRange::select(&ranges, 20), Some(FpsRange::new(15, 30)));
    }

    #[test]
    fn test_fps_select_falls_back_to_nearest() {
        let ranges = [FpsRange::new(15, 30), FpsRange::new(60, 60)];
        assert_eq!(FpsRange::select(&ranges, 55), Some(FpsRange::new(60, 60)));
        assert_eq!(FpsRange::select(&ranges, 5), Some(FpsRange::new(15, 30)));
        assert_eq!(FpsRange::select(&[], 30), None);
    }

    #[test]
    fn test_size_helpers() {
        let size = Size::new(1920, 1080);
        assert!(size.same_aspect(&Size::new(1280, 720)));
        assert!(!size.same_aspect(&Size::new(640, 480)));
        assert!(Size::new(1280, 720).fits_within(&size));
        assert_eq!(size.transposed(), Size::new(1080, 1920));
    }

    #[test]
    fn test_identity_composite() {
        let single = DeviceIdentity::new("0", Facing::Back);
        assert!(!single.is_composite());
        let fused = DeviceIdentity::new("0", Facing::Back).with_physical_ids(["2", "3"]);
        assert!(fused.is_composite());
        assert_eq!(fused.first_physical_id(), Some("2"));
    }

    #[test]
    fn test_facing_opposite() {
        assert_eq!(Facing::Back.opposite(), Facing::Front);
        assert_eq!(Facing::Front.opposite().opposite(), Facing::Front);
    }
}
