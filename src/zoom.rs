//! Zoom ladder construction
//!
//! Turns the continuous optical zoom range reported by a sensor into an
//! ordered list of discrete zoom ratios (in hundredths, `100` = 1.00x). The
//! index into that list is what a one-dimensional control (a slider) drives,
//! so steps are spaced geometrically: every doubling of magnification gets the
//! same number of steps.

use crate::errors::{CameraError, Result};
use serde::{Deserialize, Serialize};

/// Steps allotted to every doubling of the zoom factor.
pub const STEPS_PER_DOUBLING: usize = 20;

/// Ratio of unity zoom in hundredths.
pub const UNITY: u32 = 100;

/// Guards `ln(ratio)` when `min == max`.
const RATIO_EPSILON: f64 = 1.0e-11;

/// Tolerance (in hundredths) used when checking that a rounded seed does not
/// undershoot the hardware minimum. Absorbs f32 representation noise.
const ROUNDING_TOLERANCE: f64 = 1.0e-3;

/// Discretised, index-addressable zoom ratios for one sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoomLadder {
    ratios: Vec<u32>,
}

impl ZoomLadder {
    /// Build the ladder for the zoom range `[min_zoom, max_zoom]`.
    ///
    /// The result is non-empty, non-decreasing, starts at or above the
    /// hardware minimum and ends at exactly `round(max_zoom * 100)`.
    pub fn build(min_zoom: f32, max_zoom: f32) -> Result<Self> {
        if !min_zoom.is_finite() || !max_zoom.is_finite() || min_zoom <= 0.0 {
            return Err(CameraError::invalid_argument(format!(
                "zoom range must be finite and positive, got [{min_zoom}, {max_zoom}]"
            )));
        }
        if max_zoom < min_zoom {
            return Err(CameraError::invalid_argument(format!(
                "max zoom {max_zoom} is below min zoom {min_zoom}"
            )));
        }

        let min = f64::from(min_zoom);
        let max = f64::from(max_zoom);
        let n_steps = step_budget(min, max);
        let max_ratio = to_hundredths(max);

        let mut seed = to_hundredths(min);
        if f64::from(seed) < min * 100.0 - ROUNDING_TOLERANCE {
            // never imply a wider field of view than the sensor supports
            seed += 1;
        }
        let seed = seed.min(max_ratio);
        let mut ratios = vec![seed];

        if seed < UNITY && max >= 1.0 {
            let n_below = (n_steps / 5).max(1);
            let n_unity = (n_steps / 20).max(1);

            let scale = (1.0 / min).powf(1.0 / n_below as f64);
            let mut zoom = min;
            for _ in 0..n_below - 1 {
                zoom *= scale;
                let ratio = to_hundredths(zoom);
                if ratio > seed {
                    ratios.push(ratio);
                }
            }
            ratios.extend(std::iter::repeat(UNITY).take(n_unity));
        }

        let n_above = n_steps.saturating_sub(ratios.len()).max(1);
        let base = min.max(1.0).min(max);
        let scale = (max / base).powf(1.0 / n_above as f64);
        let mut zoom = base;
        for _ in 0..n_above - 1 {
            zoom *= scale;
            ratios.push(to_hundredths(zoom).min(max_ratio));
        }

        ratios.push(max_ratio);

        log::debug!(
            "Built zoom ladder for [{min_zoom}, {max_zoom}]: {} entries",
            ratios.len()
        );
        Ok(Self { ratios })
    }

    /// Single-entry ladder at 1.00x, for sensors without usable zoom info.
    pub fn unity() -> Self {
        Self {
            ratios: vec![UNITY],
        }
    }

    /// Wrap an existing sequence. Rejects empty or decreasing input.
    pub fn from_ratios(ratios: Vec<u32>) -> Result<Self> {
        if ratios.is_empty() {
            return Err(CameraError::invalid_argument("zoom ladder cannot be empty"));
        }
        if ratios.windows(2).any(|w| w[0] > w[1]) {
            return Err(CameraError::invalid_argument(
                "zoom ladder must be non-decreasing",
            ));
        }
        Ok(Self { ratios })
    }

    pub fn len(&self) -> usize {
        self.ratios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }

    pub fn ratios(&self) -> &[u32] {
        &self.ratios
    }

    /// Highest valid progress value.
    pub fn max_progress(&self) -> usize {
        self.ratios.len().saturating_sub(1)
    }

    /// Clamp an externally supplied progress into `[0, len - 1]`.
    pub fn clamp_progress(&self, progress: i64) -> usize {
        if progress <= 0 {
            0
        } else {
            (progress as usize).min(self.max_progress())
        }
    }

    /// Ratio in hundredths at `progress`, clamped into range.
    pub fn ratio_at(&self, progress: i64) -> u32 {
        self.ratios[self.clamp_progress(progress)]
    }

    /// Zoom factor at `progress`, clamped into range.
    pub fn zoom_factor_at(&self, progress: i64) -> f32 {
        self.ratio_at(progress) as f32 / 100.0
    }

    /// First progress value whose ratio equals `hundredths` exactly.
    pub fn position_of(&self, hundredths: u32) -> Option<usize> {
        self.ratios.iter().position(|&r| r == hundredths)
    }

    /// Progress at which a freshly opened sensor should start: exactly 1.00x
    /// when the ladder contains it, otherwise the widest entry.
    pub fn unity_progress(&self) -> usize {
        self.position_of(UNITY).unwrap_or(0)
    }

    pub fn min_ratio(&self) -> u32 {
        self.ratios[0]
    }

    pub fn max_ratio(&self) -> u32 {
        self.ratios[self.ratios.len() - 1]
    }
}

/// Number of steps for a range: `STEPS_PER_DOUBLING` per doubling, at least 1.
pub fn step_budget(min_zoom: f64, max_zoom: f64) -> usize {
    let ratio = max_zoom / min_zoom;
    let steps = (STEPS_PER_DOUBLING as f64 * (ratio + RATIO_EPSILON).ln()) / 2f64.ln();
    if steps.is_finite() && steps >= 1.0 {
        steps.floor() as usize
    } else {
        1
    }
}

/// Human readable magnification, e.g. `100 -> "1.0x"`, `218 -> "2.18x"`.
pub fn magnification_label(hundredths: u32) -> String {
    let whole = hundredths / 100;
    let frac = hundredths % 100;
    if frac == 0 {
        format!("{whole}.0x")
    } else if frac % 10 == 0 {
        format!("{whole}.{}x", frac / 10)
    } else {
        format!("{whole}.{frac:02}x")
    }
}

fn to_hundredths(zoom: f64) -> u32 {
    (zoom * 100.0).round().max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ultra_wide_scenario() {
        let ladder = ZoomLadder::build(0.6, 8.0).unwrap();
        let first = ladder.min_ratio();
        assert!(first == 60 || first == 61, "unexpected seed {first}");
        assert_eq!(ladder.max_ratio(), 800);
        assert!(ladder.position_of(100).is_some());
        // 20 * log2(8 / 0.6) + 1 ~= 75
        assert!((70..=80).contains(&ladder.len()), "len {}", ladder.len());
    }

    #[test]
    fn test_unity_min_has_no_duplicate_block() {
        let ladder = ZoomLadder::build(1.0, 10.0).unwrap();
        assert_eq!(ladder.min_ratio(), 100);
        assert_eq!(ladder.max_ratio(), 1000);
        let unity_count = ladder.ratios().iter().filter(|&&r| r == 100).count();
        assert!(unity_count <= 2);
    }

    #[test]
    fn test_unity_entries_repeated_for_ultra_wide() {
        let ladder = ZoomLadder::build(0.5, 10.0).unwrap();
        let unity_count = ladder.ratios().iter().filter(|&&r| r == 100).count();
        // n_steps = 86, so 86 / 20 = 4 entries at exactly 1.00x
        assert!(unity_count >= 4, "unity entries {unity_count}");
    }

    #[test]
    fn test_rounding_fix_never_undershoots() {
        let ladder = ZoomLadder::build(0.664, 4.0).unwrap();
        assert!(f64::from(ladder.min_ratio()) >= 66.4);
    }

    #[test]
    fn test_degenerate_range() {
        let ladder = ZoomLadder::build(1.0, 1.0).unwrap();
        assert!(!ladder.is_empty());
        assert_eq!(ladder.max_ratio(), 100);
        assert!(ladder.ratios().iter().all(|&r| r == 100));
    }

    #[test]
    fn test_min_above_unity_stays_monotonic() {
        let ladder = ZoomLadder::build(2.0, 8.0).unwrap();
        assert!(ladder.ratios().windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(ladder.min_ratio(), 200);
    }

    #[test]
    fn test_rejects_invalid_ranges() {
        assert!(ZoomLadder::build(0.0, 2.0).is_err());
        assert!(ZoomLadder::build(2.0, 1.0).is_err());
        assert!(ZoomLadder::build(f32::NAN, 2.0).is_err());
    }

    #[test]
    fn test_clamp_progress() {
        let ladder = ZoomLadder::build(1.0, 4.0).unwrap();
        assert_eq!(ladder.clamp_progress(-5), 0);
        assert_eq!(ladder.clamp_progress(10_000), ladder.max_progress());
        assert_eq!(ladder.ratio_at(10_000), 400);
        assert_eq!(ladder.ratio_at(-1), 100);
    }

    #[test]
    fn test_magnification_label() {
        assert_eq!(magnification_label(100), "1.0x");
        assert_eq!(magnification_label(250), "2.5x");
        assert_eq!(magnification_label(218), "2.18x");
        assert_eq!(magnification_label(61), "0.61x");
        assert_eq!(magnification_label(1000), "10.0x");
    }

    #[test]
    fn test_from_ratios_validation() {
        assert!(ZoomLadder::from_ratios(vec![]).is_err());
        assert!(ZoomLadder::from_ratios(vec![100, 90]).is_err());
        assert!(ZoomLadder::from_ratios(vec![60, 100, 100, 200]).is_ok());
    }
}
