//! Capture request construction
//!
//! A [`CaptureRequest`] is an immutable parameter set: a template plus
//! per-parameter overrides, addressed to one or more outputs. Updating the
//! live request (zoom, fps) means building a new one from the old with
//! [`CaptureRequest::to_builder`] and resubmitting it.

use crate::errors::{CameraError, Result};
use crate::platform::OutputKind;
use crate::types::FpsRange;
use crate::zoom::UNITY;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Base parameter set a request starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestTemplate {
    /// Automatic exposure, focus and white balance for a live preview.
    Preview,
    /// Every automatic stage off; exposure, sensitivity and focus fixed.
    Manual,
}

/// Purpose tag of the live repeating request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    Preview,
    Capture,
}

/// Automatic processing stages a manual request switches off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CorrectionStage {
    AberrationCorrection,
    AeAntibanding,
    AutoWhiteBalance,
    SceneMode,
    EdgeEnhancement,
    HotPixelCorrection,
    OpticalStabilization,
    VideoStabilization,
    NoiseReduction,
    Tonemap,
    LensShading,
}

impl CorrectionStage {
    pub const ALL: [CorrectionStage; 11] = [
        CorrectionStage::AberrationCorrection,
        CorrectionStage::AeAntibanding,
        CorrectionStage::AutoWhiteBalance,
        CorrectionStage::SceneMode,
        CorrectionStage::EdgeEnhancement,
        CorrectionStage::HotPixelCorrection,
        CorrectionStage::OpticalStabilization,
        CorrectionStage::VideoStabilization,
        CorrectionStage::NoiseReduction,
        CorrectionStage::Tonemap,
        CorrectionStage::LensShading,
    ];
}

/// Fixed sensor parameters of the manual template.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSettings {
    pub exposure_time_ns: u64,
    pub iso: u32,
    /// Focus distance in diopters.
    pub focus_distance: f32,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            exposure_time_ns: 10_000,
            iso: 1000,
            focus_distance: 0.001,
        }
    }
}

/// An immutable, submittable parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRequest {
    template: RequestTemplate,
    kind: RequestKind,
    targets: Vec<OutputKind>,
    zoom_ratio: u32,
    fps_range: Option<FpsRange>,
    physical_id: Option<String>,
    manual: Option<RawSettings>,
    exposure_compensation: i32,
    disabled_stages: BTreeSet<CorrectionStage>,
}

impl CaptureRequest {
    pub fn template(&self) -> RequestTemplate {
        self.template
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn targets(&self) -> &[OutputKind] {
        &self.targets
    }

    pub fn targets_output(&self, kind: OutputKind) -> bool {
        self.targets.contains(&kind)
    }

    /// Zoom ratio in hundredths.
    pub fn zoom_ratio(&self) -> u32 {
        self.zoom_ratio
    }

    pub fn fps_range(&self) -> Option<FpsRange> {
        self.fps_range
    }

    pub fn physical_id(&self) -> Option<&str> {
        self.physical_id.as_deref()
    }

    pub fn manual_settings(&self) -> Option<&RawSettings> {
        self.manual.as_ref()
    }

    pub fn exposure_compensation(&self) -> i32 {
        self.exposure_compensation
    }

    pub fn is_stage_disabled(&self, stage: CorrectionStage) -> bool {
        self.disabled_stages.contains(&stage)
    }

    pub fn disabled_stages(&self) -> impl Iterator<Item = CorrectionStage> + '_ {
        self.disabled_stages.iter().copied()
    }

    /// Automatic exposure/focus/white balance are active.
    pub fn is_automatic(&self) -> bool {
        self.template == RequestTemplate::Preview
    }

    /// Start a new request from this one's parameters.
    pub fn to_builder(&self) -> CaptureRequestBuilder {
        CaptureRequestBuilder {
            request: self.clone(),
        }
    }
}

/// Builder for [`CaptureRequest`].
#[derive(Debug, Clone)]
pub struct CaptureRequestBuilder {
    request: CaptureRequest,
}

impl CaptureRequestBuilder {
    /// Preview template, tagged [`RequestKind::Preview`].
    pub fn preview() -> Self {
        Self {
            request: CaptureRequest {
                template: RequestTemplate::Preview,
                kind: RequestKind::Preview,
                targets: Vec::new(),
                zoom_ratio: UNITY,
                fps_range: None,
                physical_id: None,
                manual: None,
                exposure_compensation: 0,
                disabled_stages: BTreeSet::new(),
            },
        }
    }

    /// Manual template with fixed exposure, ISO and focus and every
    /// automatic correction stage disabled, tagged [`RequestKind::Capture`].
    pub fn manual(settings: RawSettings) -> Self {
        Self {
            request: CaptureRequest {
                template: RequestTemplate::Manual,
                kind: RequestKind::Capture,
                targets: Vec::new(),
                zoom_ratio: UNITY,
                fps_range: None,
                physical_id: None,
                manual: Some(settings),
                exposure_compensation: 0,
                disabled_stages: CorrectionStage::ALL.into_iter().collect(),
            },
        }
    }

    pub fn add_target(mut self, target: OutputKind) -> Self {
        if !self.request.targets.contains(&target) {
            self.request.targets.push(target);
        }
        self
    }

    pub fn zoom_ratio(mut self, hundredths: u32) -> Self {
        self.request.zoom_ratio = hundredths;
        self
    }

    pub fn fps_range(mut self, range: Option<FpsRange>) -> Self {
        self.request.fps_range = range;
        self
    }

    pub fn physical_id(mut self, physical_id: Option<String>) -> Self {
        self.request.physical_id = physical_id;
        self
    }

    pub fn build(self) -> Result<CaptureRequest> {
        if self.request.targets.is_empty() {
            return Err(CameraError::invalid_argument(
                "capture request needs at least one output target",
            ));
        }
        if self.request.zoom_ratio == 0 {
            return Err(CameraError::invalid_argument("zoom ratio must be positive"));
        }
        Ok(self.request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_request_defaults() {
        let request = CaptureRequestBuilder::preview()
            .add_target(OutputKind::Preview)
            .build()
            .unwrap();
        assert_eq!(request.kind(), RequestKind::Preview);
        assert!(request.is_automatic());
        assert_eq!(request.zoom_ratio(), 100);
        assert_eq!(request.disabled_stages().count(), 0);
    }

    #[test]
    fn test_manual_request_disables_all_stages() {
        let request = CaptureRequestBuilder::manual(RawSettings::default())
            .add_target(OutputKind::Raw)
            .build()
            .unwrap();
        assert_eq!(request.kind(), RequestKind::Capture);
        assert!(!request.is_automatic());
        for stage in CorrectionStage::ALL {
            assert!(request.is_stage_disabled(stage), "{stage:?} still enabled");
        }
        assert_eq!(request.exposure_compensation(), 0);
        assert_eq!(request.manual_settings().unwrap().iso, 1000);
    }

    #[test]
    fn test_rebuild_keeps_other_parameters() {
        let original = CaptureRequestBuilder::preview()
            .add_target(OutputKind::Preview)
            .fps_range(Some(FpsRange::new(30, 30)))
            .physical_id(Some("2".to_string()))
            .build()
            .unwrap();
        let zoomed = original.to_builder().zoom_ratio(250).build().unwrap();
        assert_eq!(zoomed.zoom_ratio(), 250);
        assert_eq!(zoomed.fps_range(), Some(FpsRange::new(30, 30)));
        assert_eq!(zoomed.physical_id(), Some("2"));
        assert_eq!(original.zoom_ratio(), 100);
    }

    #[test]
    fn test_build_requires_target() {
        assert!(CaptureRequestBuilder::preview().build().is_err());
    }

    #[test]
    fn test_duplicate_target_ignored() {
        let request = CaptureRequestBuilder::preview()
            .add_target(OutputKind::Preview)
            .add_target(OutputKind::Preview)
            .build()
            .unwrap();
        assert_eq!(request.targets().len(), 1);
    }
}
