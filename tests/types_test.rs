//! Tests for rawstreamer core types
//!
//! Ensures correct behavior of the value types shared by the lens,
//! session and request modules.

use rawstreamer::types::{
    CameraCapabilities, CaptureMode, DeviceIdentity, Facing, FpsRange, Size,
};

#[cfg(test)]
mod facing_tests {
    use super::*;

    #[test]
    fn test_facing_opposite() {
        assert_eq!(Facing::Front.opposite(), Facing::Back);
        assert_eq!(Facing::Back.opposite(), Facing::Front);
    }

    #[test]
    fn test_facing_as_str() {
        assert_eq!(Facing::Front.as_str(), "front");
        assert_eq!(Facing::Back.as_str(), "rear");
        assert_eq!(Facing::Back.to_string(), "rear");
    }
}

#[cfg(test)]
mod identity_tests {
    use super::*;

    #[test]
    fn test_plain_identity() {
        let identity = DeviceIdentity::new("1", Facing::Front);
        assert!(!identity.is_composite());
        assert_eq!(identity.first_physical_id(), None);
    }

    #[test]
    fn test_single_physical_is_not_composite() {
        let identity = DeviceIdentity::new("0", Facing::Back).with_physical_ids(["2"]);
        assert!(!identity.is_composite());
    }

    #[test]
    fn test_composite_keeps_enumeration_order() {
        let identity = DeviceIdentity::new("0", Facing::Back).with_physical_ids(["3", "2"]);
        assert!(identity.is_composite());
        assert_eq!(identity.first_physical_id(), Some("3"));
    }
}

#[cfg(test)]
mod size_tests {
    use super::*;

    #[test]
    fn test_size_helpers() {
        let size = Size::new(1920, 1080);
        assert_eq!(size.area(), 1920 * 1080);
        assert_eq!(size.transposed(), Size::new(1080, 1920));
        assert!(size.same_aspect(&Size::new(1280, 720)));
        assert!(!size.same_aspect(&Size::new(640, 480)));
        assert!(Size::new(1280, 720).fits_within(&size));
        assert!(!size.fits_within(&Size::new(1280, 720)));
        assert_eq!(size.to_string(), "1920x1080");
    }
}

#[cfg(test)]
mod fps_tests {
    use super::*;

    fn ranges() -> Vec<FpsRange> {
        vec![FpsRange::new(15, 30), FpsRange::new(30, 30), FpsRange::new(7, 15)]
    }

    #[test]
    fn test_exact_range_preferred() {
        assert_eq!(FpsRange::select(&ranges(), 30), Some(FpsRange::new(30, 30)));
    }

    #[test]
    fn test_containing_range_chosen() {
        assert_eq!(FpsRange::select(&ranges(), 20), Some(FpsRange::new(15, 30)));
    }

    #[test]
    fn test_nearest_range_fallback() {
        assert_eq!(FpsRange::select(&ranges(), 60), Some(FpsRange::new(30, 30)));
        assert_eq!(FpsRange::select(&ranges(), 5), Some(FpsRange::new(7, 15)));
        assert_eq!(FpsRange::select(&[], 30), None);
    }

    #[test]
    fn test_distance() {
        let range = FpsRange::new(15, 30);
        assert_eq!(range.distance_to(20), 0);
        assert_eq!(range.distance_to(10), 5);
        assert_eq!(range.distance_to(60), 30);
        assert_eq!(range.width(), 15);
    }
}

#[cfg(test)]
mod capability_tests {
    use super::*;

    #[test]
    fn test_default_capabilities() {
        let caps = CameraCapabilities::default();
        assert_eq!(caps.zoom_range, (1.0, 1.0));
        assert!(!caps.raw_capable);
        assert!(caps.is_rotated());
        assert_eq!(caps.largest_raw_size(), None);
    }

    #[test]
    fn test_largest_raw_size() {
        let caps = CameraCapabilities {
            raw_sizes: vec![Size::new(2016, 1512), Size::new(4032, 3024)],
            ..CameraCapabilities::default()
        };
        assert_eq!(caps.largest_raw_size(), Some(Size::new(4032, 3024)));
    }

    #[test]
    fn test_capture_mode_toggle() {
        assert_eq!(CaptureMode::Preview.toggled(), CaptureMode::Raw);
        assert_eq!(CaptureMode::Raw.toggled(), CaptureMode::Preview);
    }

    #[test]
    fn test_capabilities_serialization() {
        let caps = CameraCapabilities::default();
        let json = serde_json::to_string(&caps).unwrap();
        let back: CameraCapabilities = serde_json::from_str(&json).unwrap();
        assert_eq!(back, caps);
    }
}
