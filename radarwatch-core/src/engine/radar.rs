//! Per radar state held by the engine

use serde::{Deserialize, Serialize};

use crate::angle::{Resolution, SpokeBearing};
use crate::config::EngineConfig;
use crate::guard_zones::{GuardZoneEvaluator, ZoneTransition, GUARD_ZONES};
use crate::navdata::HeadingEstimate;
use crate::spoke::SpokeBuffer;
use crate::state::RadarStateMachine;

/// Radar number, 0 for the first radar
pub type RadarId = usize;

/// Identifies one attachment of a radar. Writes must carry the generation
/// they were started under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RadarHandle {
    pub id: RadarId,
    pub generation: u64,
}

/// Result of a spoke write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written {
        /// Bearing in buffer resolution
        bearing: SpokeBearing,
        /// The bearing wrapped past north, a rotation just completed
        rotation_complete: bool,
    },
    /// Write from a detached radar or an older generation
    Discarded,
}

/// A radar attached to the engine with its buffer, zones and power state
#[derive(Debug)]
pub struct ManagedRadar {
    pub id: RadarId,
    generation: u64,
    active: bool,
    /// Resolution of the bearings the radar sends
    input_resolution: Resolution,
    buffer: SpokeBuffer,
    zones: [GuardZoneEvaluator; GUARD_ZONES],
    state: RadarStateMachine,
    last_range: Option<u32>,
    last_bearing: Option<SpokeBearing>,
    rotations: u64,
}

impl ManagedRadar {
    pub fn new(id: RadarId, input_resolution: Resolution, config: &EngineConfig) -> Self {
        ManagedRadar {
            id,
            generation: 1,
            active: true,
            input_resolution,
            buffer: SpokeBuffer::new(config.resolution, config.alarm_threshold),
            zones: Default::default(),
            state: RadarStateMachine::new(),
            last_range: None,
            last_bearing: None,
            rotations: 0,
        }
    }

    pub fn handle(&self) -> RadarHandle {
        RadarHandle {
            id: self.id,
            generation: self.generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn buffer(&self) -> &SpokeBuffer {
        &self.buffer
    }

    pub fn zones(&self) -> &[GuardZoneEvaluator; GUARD_ZONES] {
        &self.zones
    }

    pub fn zone_mut(&mut self, index: usize) -> Option<&mut GuardZoneEvaluator> {
        self.zones.get_mut(index)
    }

    pub fn state(&self) -> &RadarStateMachine {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut RadarStateMachine {
        &mut self.state
    }

    /// Completed rotations since attach
    pub fn rotations(&self) -> u64 {
        self.rotations
    }

    /// Mark inactive and invalidate in-flight writes
    pub(crate) fn detach(&mut self) {
        self.active = false;
        self.generation += 1;
        self.clear_buffer();
    }

    /// Re-activate a detached radar under its current generation
    pub(crate) fn reattach(&mut self, input_resolution: Resolution) {
        self.active = true;
        self.input_resolution = input_resolution;
        self.clear_buffer();
    }

    fn clear_buffer(&mut self) {
        self.buffer.reset();
        self.last_range = None;
        self.last_bearing = None;
    }

    /// True when going from `previous` to `range` mixes incompatible scales
    fn is_drastic_range_change(previous: u32, range: u32, ratio: f64) -> bool {
        if previous == range {
            return false;
        }
        let (lo, hi) = if previous < range {
            (previous, range)
        } else {
            (range, previous)
        };
        lo == 0 || hi as f64 / lo as f64 >= ratio
    }

    /// Store one spoke. Returns the outcome and whether the buffer was reset
    /// because of a range change.
    pub(crate) fn write_spoke(
        &mut self,
        generation: u64,
        bearing_raw: i32,
        range_decimeters: u32,
        intensities: &[u8],
        now: u64,
        config: &EngineConfig,
    ) -> (WriteOutcome, bool) {
        if !self.active || generation != self.generation {
            log::debug!(
                "Radar {}: discarding spoke from generation {} (current {}, active {})",
                self.id,
                generation,
                self.generation,
                self.active
            );
            return (WriteOutcome::Discarded, false);
        }

        let mut reset = false;
        if let Some(previous) = self.last_range {
            if Self::is_drastic_range_change(previous, range_decimeters, config.range_reset_ratio) {
                log::info!(
                    "Radar {}: range changed from {} to {} m, clearing spokes",
                    self.id,
                    previous / 10,
                    range_decimeters / 10
                );
                self.buffer.reset();
                self.last_bearing = None;
                reset = true;
            }
        }
        self.last_range = Some(range_decimeters);

        let bearing = self
            .buffer
            .resolution()
            .convert_from(self.input_resolution, bearing_raw);
        let bearing = self
            .buffer
            .write_spoke(bearing as i32, range_decimeters, intensities, now);

        let rotation_complete = matches!(self.last_bearing, Some(last) if bearing < last);
        if rotation_complete {
            self.rotations += 1;
        }
        self.last_bearing = Some(bearing);

        (
            WriteOutcome::Written {
                bearing,
                rotation_complete,
            },
            reset,
        )
    }

    /// Evaluate both zones against the buffer. Returns the transitions.
    pub(crate) fn evaluate_guard_zones(
        &mut self,
        heading: &HeadingEstimate,
        now: u64,
        config: &EngineConfig,
    ) -> Vec<(usize, ZoneTransition)> {
        let buffer = &self.buffer;
        self.zones
            .iter_mut()
            .enumerate()
            .filter_map(|(index, zone)| {
                zone.evaluate(buffer, heading, now, config)
                    .map(|t| (index, t))
            })
            .collect()
    }
}
