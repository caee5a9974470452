//! Lens catalog and lens/facing switching.
//!
//! The catalog is enumerated from the platform on every switch request; it
//! is never cached across opens because availability changes (external
//! cameras, policy). Enumeration order defines "next".

use crate::errors::Result;
use crate::platform::CameraPlatform;
use crate::types::{DeviceIdentity, Facing};

/// Identity currently in use, with the physical sub-sensor selected inside
/// a composite identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LensSelection {
    pub identity: DeviceIdentity,
    pub physical_id: Option<String>,
}

impl LensSelection {
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            physical_id: None,
        }
    }

    pub fn with_physical(identity: DeviceIdentity, physical_id: impl Into<String>) -> Self {
        Self {
            identity,
            physical_id: Some(physical_id.into()),
        }
    }

    /// The sub-sensor effectively in use: the explicit choice, or the first
    /// physical id of a composite identity.
    pub fn effective_physical_id(&self) -> Option<&str> {
        if !self.identity.is_composite() {
            return None;
        }
        self.physical_id
            .as_deref()
            .or_else(|| self.identity.first_physical_id())
    }

    /// True when a composite identity runs on a sub-sensor other than its
    /// first one.
    pub fn on_secondary_physical(&self) -> bool {
        match (self.effective_physical_id(), self.identity.first_physical_id()) {
            (Some(active), Some(first)) => active != first,
            _ => false,
        }
    }
}

/// Outcome of a lens switch request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LensSwitch {
    /// Another logical identity with the same facing.
    Logical(LensSelection),
    /// Another physical sub-sensor of the same composite identity.
    Physical(LensSelection),
    /// Nothing to switch to; state must stay unchanged.
    NoAlternate { facing: Facing },
}

/// Snapshot of the identities the platform currently exposes.
#[derive(Debug, Clone, Default)]
pub struct LensCatalog {
    identities: Vec<DeviceIdentity>,
}

impl LensCatalog {
    pub fn from_identities(identities: Vec<DeviceIdentity>) -> Self {
        Self { identities }
    }

    /// Enumerate the platform. Ids whose characteristics cannot be read are
    /// skipped with a warning.
    pub fn enumerate(platform: &dyn CameraPlatform) -> Result<Self> {
        let ids = platform.camera_ids()?;
        let mut identities = Vec::with_capacity(ids.len());
        for id in ids {
            match platform.characteristics(&id) {
                Ok(characteristics) => identities.push(characteristics.identity),
                Err(e) => log::warn!("Skipping camera {}: {}", id, e),
            }
        }
        log::debug!("Enumerated {} camera identities", identities.len());
        Ok(Self { identities })
    }

    pub fn identities(&self) -> &[DeviceIdentity] {
        &self.identities
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn find(&self, logical_id: &str) -> Option<&DeviceIdentity> {
        self.identities.iter().find(|i| i.logical_id == logical_id)
    }

    pub fn first_with_facing(&self, facing: Facing) -> Option<&DeviceIdentity> {
        self.identities.iter().find(|i| i.facing == facing)
    }

    pub fn same_facing(&self, facing: Facing) -> Vec<&DeviceIdentity> {
        self.identities.iter().filter(|i| i.facing == facing).collect()
    }

    /// First identity facing away from `current`, or `None` when every
    /// sensor faces the same way.
    pub fn switch_facing(&self, current: Facing) -> Option<&DeviceIdentity> {
        let target = self.first_with_facing(current.opposite());
        if target.is_none() {
            log::warn!("No {}-facing camera to switch to", current.opposite());
        }
        target
    }

    /// Next lens for `current`.
    ///
    /// Same-facing logical identities take precedence; physical sub-sensor
    /// cycling is only considered when `allow_physical` is set and there is
    /// a single same-facing identity.
    pub fn switch_lens(&self, current: &LensSelection, allow_physical: bool) -> LensSwitch {
        let facing = current.identity.facing;
        let same_facing = self.same_facing(facing);

        if same_facing.len() > 1 {
            let next = match same_facing
                .iter()
                .position(|i| i.logical_id == current.identity.logical_id)
            {
                Some(index) => same_facing[(index + 1) % same_facing.len()],
                None => same_facing[0],
            };
            log::debug!("Next logical lens: {}", next.logical_id);
            return LensSwitch::Logical(LensSelection::new(next.clone()));
        }

        if allow_physical && current.identity.is_composite() {
            let physical_ids = &current.identity.physical_ids;
            let index = current
                .effective_physical_id()
                .and_then(|active| physical_ids.iter().position(|p| p == active))
                .unwrap_or(0);
            let next = &physical_ids[(index + 1) % physical_ids.len()];
            log::debug!(
                "Next physical lens: {} | {}",
                current.identity.logical_id,
                next
            );
            return LensSwitch::Physical(LensSelection::with_physical(
                current.identity.clone(),
                next.clone(),
            ));
        }

        LensSwitch::NoAlternate { facing }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> LensCatalog {
        LensCatalog::from_identities(vec![
            DeviceIdentity::new("0", Facing::Back),
            DeviceIdentity::new("1", Facing::Front),
            DeviceIdentity::new("2", Facing::Back),
            DeviceIdentity::new("3", Facing::Back),
        ])
    }

    #[test]
    fn test_switch_facing_returns_first_opposite() {
        let catalog = catalog();
        assert_eq!(catalog.switch_facing(Facing::Back).unwrap().logical_id, "1");
        assert_eq!(catalog.switch_facing(Facing::Front).unwrap().logical_id, "0");
    }

    #[test]
    fn test_switch_facing_single_facing() {
        let catalog = LensCatalog::from_identities(vec![DeviceIdentity::new("0", Facing::Back)]);
        assert!(catalog.switch_facing(Facing::Back).is_none());
    }

    #[test]
    fn test_switch_lens_cycles_logical() {
        let catalog = catalog();
        let mut current = LensSelection::new(catalog.find("0").unwrap().clone());
        let mut seen = Vec::new();
        for _ in 0..3 {
            match catalog.switch_lens(&current, true) {
                LensSwitch::Logical(next) => {
                    seen.push(next.identity.logical_id.clone());
                    current = next;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(seen, vec!["2", "3", "0"]);
    }

    #[test]
    fn test_switch_lens_cycles_physical() {
        let fused = DeviceIdentity::new("0", Facing::Back).with_physical_ids(["2", "3", "4"]);
        let catalog = LensCatalog::from_identities(vec![
            fused.clone(),
            DeviceIdentity::new("1", Facing::Front),
        ]);
        let mut current = LensSelection::new(fused);
        let mut seen = Vec::new();
        for _ in 0..3 {
            match catalog.switch_lens(&current, true) {
                LensSwitch::Physical(next) => {
                    seen.push(next.physical_id.clone().unwrap());
                    current = next;
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(seen, vec!["3", "4", "2"]);
    }

    #[test]
    fn test_switch_lens_physical_disabled() {
        let fused = DeviceIdentity::new("0", Facing::Back).with_physical_ids(["2", "3"]);
        let catalog = LensCatalog::from_identities(vec![fused.clone()]);
        assert_eq!(
            catalog.switch_lens(&LensSelection::new(fused), false),
            LensSwitch::NoAlternate {
                facing: Facing::Back
            }
        );
    }

    #[test]
    fn test_switch_lens_no_alternate() {
        let catalog = catalog();
        let front = LensSelection::new(catalog.find("1").unwrap().clone());
        assert_eq!(
            catalog.switch_lens(&front, true),
            LensSwitch::NoAlternate {
                facing: Facing::Front
            }
        );
    }

    #[test]
    fn test_secondary_physical_detection() {
        let fused = DeviceIdentity::new("0", Facing::Back).with_physical_ids(["2", "3"]);
        assert!(!LensSelection::new(fused.clone()).on_secondary_physical());
        assert!(LensSelection::with_physical(fused, "3").on_secondary_physical());
    }
}
