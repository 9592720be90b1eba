//! Engine event sink

use crate::guard_zones::ZoneTransition;
use crate::state::PowerState;

use super::RadarId;

/// Receives engine events. Called without any engine lock held, from
/// whatever thread performed the operation.
///
/// All methods default to doing nothing.
pub trait EngineListener: Send + Sync {
    /// A guard zone changed alarm state
    fn guard_zone_changed(&self, _radar: RadarId, _zone: usize, _transition: ZoneTransition) {}

    /// The radar should be sent a power command
    fn power_command(&self, _radar: RadarId, _state: PowerState) {}

    /// The spoke buffer was cleared (range change or detach)
    fn buffer_reset(&self, _radar: RadarId) {}

    /// The audible alarm should sound now
    fn alarm_sound(&self) {}
}
