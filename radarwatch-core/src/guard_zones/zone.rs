//! Guard zone geometry
//!
//! A zone is either a full circle or an arc (sector of an annulus) described
//! in range/bearing space. Bearings are in degrees, clockwise, and are either
//! relative to the bow or to true north.

use serde::{Deserialize, Serialize};

use crate::angle::{mod_degrees, Resolution, SpokeBearing};
use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardZoneKind {
    Off,
    Arc,
    Circle,
}

impl Default for GuardZoneKind {
    fn default() -> Self {
        GuardZoneKind::Off
    }
}

/// What the zone's bearings are measured from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BearingReference {
    /// Relative to the bow; requires a trusted heading to evaluate
    Vessel,
    /// Relative to true north
    North,
}

impl Default for BearingReference {
    fn default() -> Self {
        BearingReference::Vessel
    }
}

/// How a display should draw the zone. Stored only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStyle {
    Shading,
    Outline,
    Both,
}

impl Default for RenderStyle {
    fn default() -> Self {
        RenderStyle::Shading
    }
}

/// Guard zone definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuardZone {
    pub kind: GuardZoneKind,
    /// Start bearing in degrees (ARC only)
    pub start_bearing: f64,
    /// End bearing in degrees (ARC only); the arc runs clockwise from start
    pub end_bearing: f64,
    /// Inner range in meters
    pub inner_range: f64,
    /// Outer range in meters
    pub outer_range: f64,
    /// Minimum number of strong returns in one rotation that raises the alarm
    pub threshold: u32,
    pub render_style: RenderStyle,
    pub reference: BearingReference,
    /// Only count returns that were strong in at least two of the last three
    /// rotations
    pub multi_sweep_filter: bool,
}

impl Default for GuardZone {
    fn default() -> Self {
        GuardZone {
            kind: GuardZoneKind::Off,
            start_bearing: 0.0,
            end_bearing: 0.0,
            inner_range: 0.0,
            outer_range: 0.0,
            threshold: 1,
            render_style: RenderStyle::default(),
            reference: BearingReference::default(),
            multi_sweep_filter: false,
        }
    }
}

/// Bearing bounds of a zone in a buffer's resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneBearings {
    /// Every bearing
    All,
    /// Clockwise from start to end, both inclusive, wrapping through 0
    Arc(SpokeBearing, SpokeBearing),
}

impl ZoneBearings {
    pub fn contains(&self, resolution: Resolution, bearing: SpokeBearing) -> bool {
        match *self {
            ZoneBearings::All => true,
            ZoneBearings::Arc(start, end) => resolution.is_between(bearing, start, end),
        }
    }

    pub fn iter(&self, resolution: Resolution) -> Box<dyn Iterator<Item = SpokeBearing>> {
        match *self {
            ZoneBearings::All => Box::new(0..resolution.spokes()),
            ZoneBearings::Arc(start, end) => Box::new(resolution.arc(start, end)),
        }
    }
}

impl GuardZone {
    /// Create an arc zone, vessel relative
    pub fn new_arc(
        start_bearing: f64,
        end_bearing: f64,
        inner_range: f64,
        outer_range: f64,
        threshold: u32,
    ) -> Self {
        GuardZone {
            kind: GuardZoneKind::Arc,
            start_bearing,
            end_bearing,
            inner_range,
            outer_range,
            threshold,
            ..Default::default()
        }
    }

    /// Create a full circle zone
    pub fn new_circle(inner_range: f64, outer_range: f64, threshold: u32) -> Self {
        GuardZone {
            kind: GuardZoneKind::Circle,
            inner_range,
            outer_range,
            threshold,
            ..Default::default()
        }
    }

    pub fn with_reference(mut self, reference: BearingReference) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_multi_sweep_filter(mut self, enabled: bool) -> Self {
        self.multi_sweep_filter = enabled;
        self
    }

    pub fn is_active(&self) -> bool {
        self.kind != GuardZoneKind::Off
    }

    /// Check the zone before it is handed to the engine.
    ///
    /// A zone of kind OFF is always accepted; its geometry is kept as is so
    /// it can be switched on again later.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.is_active() {
            return Ok(());
        }
        let invalid = |msg: String| Err(EngineError::InvalidGuardZone(msg));

        if !self.inner_range.is_finite() || !self.outer_range.is_finite() {
            return invalid("ranges must be finite".to_string());
        }
        if self.inner_range < 0.0 {
            return invalid(format!("inner range {} is negative", self.inner_range));
        }
        if self.inner_range > self.outer_range {
            return invalid(format!(
                "inner range {} exceeds outer range {}",
                self.inner_range, self.outer_range
            ));
        }
        if self.threshold == 0 {
            return invalid("threshold must be at least 1".to_string());
        }
        if self.kind == GuardZoneKind::Arc {
            for bearing in [self.start_bearing, self.end_bearing] {
                if !(0.0..360.0).contains(&bearing) {
                    return invalid(format!("bearing {} outside [0, 360)", bearing));
                }
            }
        }
        Ok(())
    }

    /// Bearing bounds in north-referenced raw units.
    ///
    /// `heading` is the trusted true heading in degrees, used to rotate a
    /// vessel-relative arc; `None` means no trusted heading is available.
    /// Returns `None` when the zone can't be placed (OFF, or vessel relative
    /// without heading).
    pub fn bearings(&self, resolution: Resolution, heading: Option<f64>) -> Option<ZoneBearings> {
        let offset = match (self.kind, self.reference) {
            (GuardZoneKind::Off, _) => return None,
            (GuardZoneKind::Circle, _) => return Some(ZoneBearings::All),
            (GuardZoneKind::Arc, BearingReference::North) => 0.0,
            (GuardZoneKind::Arc, BearingReference::Vessel) => heading?,
        };
        let start = resolution.degrees_to_raw(mod_degrees(self.start_bearing + offset));
        let end = resolution.degrees_to_raw(mod_degrees(self.end_bearing + offset));
        Some(ZoneBearings::Arc(start, end))
    }

    /// True if `distance` (meters) lies within the zone's range band
    pub fn contains_range(&self, distance: f64) -> bool {
        distance >= self.inner_range && distance <= self.outer_range
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(GuardZone::new_arc(0.0, 90.0, 0.0, 1000.0, 3).validate().is_ok());
        assert!(GuardZone::new_circle(100.0, 100.0, 1).validate().is_ok());
        assert!(GuardZone::default().validate().is_ok());

        let reversed = GuardZone::new_arc(0.0, 90.0, 1000.0, 500.0, 3);
        assert!(matches!(
            reversed.validate(),
            Err(EngineError::InvalidGuardZone(_))
        ));
        assert!(GuardZone::new_circle(0.0, 500.0, 0).validate().is_err());
        assert!(GuardZone::new_arc(0.0, 360.0, 0.0, 500.0, 1).validate().is_err());
        assert!(GuardZone::new_arc(-1.0, 10.0, 0.0, 500.0, 1).validate().is_err());
        assert!(GuardZone::new_circle(-5.0, 500.0, 1).validate().is_err());
        assert!(GuardZone::new_circle(0.0, f64::NAN, 1).validate().is_err());

        // Off zones keep whatever geometry they have
        let mut off = GuardZone::new_arc(0.0, 90.0, 1000.0, 500.0, 0);
        off.kind = GuardZoneKind::Off;
        assert!(off.validate().is_ok());
    }

    #[test]
    fn test_arc_bearings_wrap() {
        let r = Resolution::Coarse;
        let zone = GuardZone::new_arc(350.0, 10.0, 0.0, 1000.0, 1)
            .with_reference(BearingReference::North);
        let bounds = zone.bearings(r, None).unwrap();
        assert_eq!(bounds, ZoneBearings::Arc(1991, 56));

        assert!(bounds.contains(r, r.degrees_to_raw(355.0)));
        assert!(bounds.contains(r, r.degrees_to_raw(5.0)));
        assert!(bounds.contains(r, 0));
        assert!(!bounds.contains(r, r.degrees_to_raw(180.0)));
        assert_eq!(bounds.iter(r).count(), 2048 - 1991 + 57);
    }

    #[test]
    fn test_vessel_relative_needs_heading() {
        let r = Resolution::Coarse;
        let zone = GuardZone::new_arc(0.0, 90.0, 0.0, 1000.0, 1);
        assert_eq!(zone.bearings(r, None), None);

        // Bow at 270 puts the zone on 270..360
        assert_eq!(
            zone.bearings(r, Some(270.0)),
            Some(ZoneBearings::Arc(1536, 0))
        );
    }

    #[test]
    fn test_circle_covers_everything() {
        let r = Resolution::Fine;
        let zone = GuardZone::new_circle(0.0, 500.0, 1);
        let bounds = zone.bearings(r, None).unwrap();
        assert_eq!(bounds, ZoneBearings::All);
        assert_eq!(bounds.iter(r).count(), 4096);
        assert!(zone.contains_range(500.0));
        assert!(!zone.contains_range(500.1));
    }

    #[test]
    fn test_off_has_no_bearings() {
        assert_eq!(GuardZone::default().bearings(Resolution::Coarse, Some(0.0)), None);
    }

    #[test]
    fn test_zone_from_json() {
        let zone: GuardZone = serde_json::from_str(
            r#"{"kind":"arc","startBearing":10,"endBearing":20,"innerRange":0,
                "outerRange":1852,"threshold":4,"reference":"north"}"#,
        )
        .unwrap();
        assert_eq!(zone.kind, GuardZoneKind::Arc);
        assert_eq!(zone.reference, BearingReference::North);
        assert_eq!(zone.render_style, RenderStyle::Shading);
        assert!(!zone.multi_sweep_filter);
    }
}
