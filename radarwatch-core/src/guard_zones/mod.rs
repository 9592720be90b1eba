//! Guard Zones
//!
//! Every radar owns [`GUARD_ZONES`] zone slots. A zone is scanned once per
//! completed rotation; when enough strong returns fall inside it the alarm is
//! raised, confirmed after a holding period, and can be acknowledged by the
//! operator.
//!
//! - **zone**: zone geometry, bearing reference and validation
//! - **alarm**: per-slot alarm state machine

mod alarm;
mod zone;

pub use alarm::{GuardZoneEvaluator, ZoneAlarmState, ZoneTransition};
pub use zone::{BearingReference, GuardZone, GuardZoneKind, RenderStyle, ZoneBearings};

/// Zone slots per radar
pub const GUARD_ZONES: usize = 2;
