//! RadarEngine - single entry point for all radar data
//!
//! The engine owns every attached radar together with its spoke buffer,
//! guard zones and power state machine, plus one heading/variation store
//! shared by all radars.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │           RadarEngine                                        │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │  ManagedRadar (per radar, behind its own RwLock)       │  │
//! │  │  ├─ SpokeBuffer                                        │  │
//! │  │  ├─ GuardZoneEvaluator x 2                             │  │
//! │  │  └─ RadarStateMachine (+ receive statistics)           │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │  SharedNavData (heading + variation, one RwLock)             │
//! │  EngineListener(s)                                           │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every method takes `&self`, so an engine is normally wrapped in an `Arc`
//! and shared between the receive path, the periodic tick and renderers.
//! The radar map lock is only held long enough to look up a radar; work on a
//! radar happens under that radar's lock alone. Listeners are called after
//! all locks are released.

mod listener;
mod radar;

pub use listener::EngineListener;
pub use radar::{ManagedRadar, RadarHandle, RadarId, WriteOutcome};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::angle::Resolution;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::guard_zones::{GuardZone, ZoneAlarmState, ZoneTransition, GUARD_ZONES};
use crate::legend::{classify_spoke, BlobColor};
use crate::navdata::{
    HeadingEstimate, HeadingSource, SharedNavData, VariationEstimate, VariationSource,
};
use crate::spoke::Spoke;
use crate::state::{PowerState, RadarRuntimeState, ReceiveStatistics, TimedIdle};

type SharedRadar = Arc<RwLock<ManagedRadar>>;

/// Central engine managing all radars.
pub struct RadarEngine {
    config: EngineConfig,
    radars: RwLock<HashMap<RadarId, SharedRadar>>,
    nav: SharedNavData,
    listeners: RwLock<Vec<Arc<dyn EngineListener>>>,
    /// Time the audible alarm last sounded while a zone was confirmed
    last_alarm_sound: Mutex<Option<u64>>,
}

impl Default for RadarEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl RadarEngine {
    pub fn new(config: EngineConfig) -> Self {
        RadarEngine {
            nav: SharedNavData::new(&config),
            config,
            radars: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            last_alarm_sound: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handle to the heading/variation store, for collaborators that only
    /// deal with navigation data
    pub fn nav_data(&self) -> SharedNavData {
        self.nav.clone()
    }

    pub fn add_listener(&self, listener: Arc<dyn EngineListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn notify(&self, f: impl Fn(&dyn EngineListener)) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            f(listener.as_ref());
        }
    }

    // =========================================================================
    // Radar management
    // =========================================================================

    /// Attach a radar that sends bearings in `input_resolution`.
    ///
    /// A detached radar can be attached again under the same id; it keeps its
    /// zones and gets a fresh buffer.
    pub fn attach(
        &self,
        id: RadarId,
        input_resolution: Resolution,
    ) -> Result<RadarHandle, EngineError> {
        let existing = {
            let mut radars = self.radars.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(radar) = radars.get(&id).cloned() {
                radar
            } else {
                let radar = ManagedRadar::new(id, input_resolution, &self.config);
                let handle = radar.handle();
                radars.insert(id, Arc::new(RwLock::new(radar)));
                log::info!("Radar {}: attached", id);
                return Ok(handle);
            }
        };

        let mut radar = existing.write().unwrap_or_else(PoisonError::into_inner);
        if radar.is_active() {
            return Err(EngineError::AlreadyAttached(id));
        }
        radar.reattach(input_resolution);
        log::info!("Radar {}: re-attached, generation {}", id, radar.generation());
        Ok(radar.handle())
    }

    /// Detach a radar. In-flight writes for it are discarded from now on.
    pub fn detach(&self, id: RadarId) -> Result<(), EngineError> {
        self.with_radar_mut(id, |radar| radar.detach())?;
        log::info!("Radar {}: detached", id);
        self.notify(|l| l.buffer_reset(id));
        Ok(())
    }

    /// Ids of all known radars, attached or not, in ascending order
    pub fn radar_ids(&self) -> Vec<RadarId> {
        let mut ids: Vec<RadarId> = self
            .radars
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn handle(&self, id: RadarId) -> Result<RadarHandle, EngineError> {
        self.with_radar(id, |radar| radar.handle())
    }

    pub fn is_active(&self, id: RadarId) -> Result<bool, EngineError> {
        self.with_radar(id, |radar| radar.is_active())
    }

    fn radar(&self, id: RadarId) -> Result<SharedRadar, EngineError> {
        self.radars
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(EngineError::NoSuchRadar(id))
    }

    fn with_radar<T>(
        &self,
        id: RadarId,
        f: impl FnOnce(&ManagedRadar) -> T,
    ) -> Result<T, EngineError> {
        let radar = self.radar(id)?;
        let guard = radar.read().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&*guard))
    }

    fn with_radar_mut<T>(
        &self,
        id: RadarId,
        f: impl FnOnce(&mut ManagedRadar) -> T,
    ) -> Result<T, EngineError> {
        let radar = self.radar(id)?;
        let mut guard = radar.write().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&mut *guard))
    }

    fn check_zone_index(id: RadarId, index: usize) -> Result<(), EngineError> {
        if index >= GUARD_ZONES {
            return Err(EngineError::NoSuchGuardZone { radar: id, index });
        }
        Ok(())
    }

    // =========================================================================
    // Spokes
    // =========================================================================

    /// Store a spoke received under `generation`.
    ///
    /// `bearing_raw` is in the radar's input resolution and is wrapped, never
    /// rejected. Writes for a detached radar or from an older generation
    /// return [`WriteOutcome::Discarded`].
    pub fn write_spoke(
        &self,
        id: RadarId,
        generation: u64,
        bearing_raw: i32,
        range_decimeters: u32,
        intensities: &[u8],
        now: u64,
    ) -> Result<WriteOutcome, EngineError> {
        let (outcome, reset) = self.with_radar_mut(id, |radar| {
            radar.write_spoke(
                generation,
                bearing_raw,
                range_decimeters,
                intensities,
                now,
                &self.config,
            )
        })?;
        if reset {
            self.notify(|l| l.buffer_reset(id));
        }
        Ok(outcome)
    }

    /// Copy of the spoke at `bearing` (buffer resolution, wrapped)
    pub fn snapshot(&self, id: RadarId, bearing: i32) -> Result<Spoke, EngineError> {
        self.with_radar(id, |radar| radar.buffer().snapshot(bearing))
    }

    /// Copies of the spokes on the clockwise arc `start..=end`
    pub fn snapshot_range(
        &self,
        id: RadarId,
        start: i32,
        end: i32,
    ) -> Result<Vec<Spoke>, EngineError> {
        self.with_radar(id, |radar| radar.buffer().snapshot_range(start, end))
    }

    /// Display classification of the spoke at `bearing`
    pub fn blob_colors(&self, id: RadarId, bearing: i32) -> Result<Vec<BlobColor>, EngineError> {
        let spoke = self.snapshot(id, bearing)?;
        Ok(classify_spoke(&spoke, &self.config.display))
    }

    // =========================================================================
    // Heading and variation
    // =========================================================================

    pub fn update_heading(&self, source: HeadingSource, degrees: f64, now: u64) {
        self.nav.update_heading(source, degrees, now);
    }

    /// Returns false when the value was ignored (zero variation from NMEA)
    pub fn update_variation(&self, source: VariationSource, degrees: f64, now: u64) -> bool {
        self.nav.update_variation(source, degrees, now)
    }

    pub fn current_heading(&self, now: u64) -> HeadingEstimate {
        self.nav.current_heading(now)
    }

    pub fn current_variation(&self, now: u64) -> VariationEstimate {
        self.nav.current_variation(now)
    }

    // =========================================================================
    // Guard Zones
    // =========================================================================

    /// Validate and install a zone. The zone's alarm state starts over.
    pub fn set_guard_zone(
        &self,
        id: RadarId,
        index: usize,
        zone: GuardZone,
    ) -> Result<(), EngineError> {
        Self::check_zone_index(id, index)?;
        zone.validate()?;
        self.with_radar_mut(id, |radar| {
            log::info!("Radar {}: guard zone {} set to {:?}", id, index + 1, zone);
            if let Some(slot) = radar.zone_mut(index) {
                slot.set_zone(zone);
            }
        })
    }

    pub fn guard_zone(&self, id: RadarId, index: usize) -> Result<GuardZone, EngineError> {
        Self::check_zone_index(id, index)?;
        self.with_radar(id, |radar| radar.zones()[index].zone().clone())
    }

    pub fn guard_zone_alarm_state(
        &self,
        id: RadarId,
        index: usize,
    ) -> Result<ZoneAlarmState, EngineError> {
        Self::check_zone_index(id, index)?;
        self.with_radar(id, |radar| radar.zones()[index].state())
    }

    /// Evaluate both zones of a radar for the rotation that just completed
    pub fn evaluate_guard_zones(
        &self,
        id: RadarId,
        now: u64,
    ) -> Result<Vec<(usize, ZoneTransition)>, EngineError> {
        let heading = self.nav.current_heading(now);
        let transitions = self.with_radar_mut(id, |radar| {
            if !radar.is_active() {
                return Vec::new();
            }
            radar.evaluate_guard_zones(&heading, now, &self.config)
        })?;

        for (index, t) in &transitions {
            match t.to {
                ZoneAlarmState::AlarmPending | ZoneAlarmState::AlarmConfirmed => log::warn!(
                    "Radar {}: guard zone {} {} with {} returns",
                    id,
                    index + 1,
                    t.to,
                    t.count
                ),
                _ => log::info!("Radar {}: guard zone {} {}", id, index + 1, t.to),
            }
            self.notify(|l| l.guard_zone_changed(id, *index, *t));
        }
        Ok(transitions)
    }

    /// Operator acknowledges the bogeys on every radar. Returns the number of
    /// alarms silenced.
    pub fn confirm_guard_zone_bogeys(&self) -> usize {
        let mut silenced = 0;
        for id in self.radar_ids() {
            let count = self
                .with_radar_mut(id, |radar| {
                    (0..GUARD_ZONES)
                        .filter(|i| radar.zone_mut(*i).is_some_and(|z| z.confirm_bogeys()))
                        .count()
                })
                .unwrap_or(0);
            silenced += count;
        }
        *self
            .last_alarm_sound
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        if silenced > 0 {
            log::info!("Guard zone bogeys confirmed, {} alarm(s) silenced", silenced);
        }
        silenced
    }

    fn any_alarm_sounding(&self) -> bool {
        self.radar_ids().into_iter().any(|id| {
            self.with_radar(id, |radar| {
                radar
                    .zones()
                    .iter()
                    .any(|z| z.is_sounding())
            })
            .unwrap_or(false)
        })
    }

    /// Whether the audible alarm should sound now. Sounds immediately once a
    /// zone is confirmed, then every `alarm_repeat_ms` until acknowledged or
    /// cleared.
    pub fn alarm_sound_due(&self, now: u64) -> bool {
        let confirmed = self.any_alarm_sounding();
        let mut last = self
            .last_alarm_sound
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !confirmed {
            *last = None;
            return false;
        }
        match *last {
            Some(t) if now.saturating_sub(t) < self.config.alarm_repeat_ms => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }

    /// Seconds until the alarm sounds again, if it is sounding
    pub fn alarm_seconds_left(&self, now: u64) -> Option<u64> {
        if !self.any_alarm_sounding() {
            return None;
        }
        let last = (*self
            .last_alarm_sound
            .lock()
            .unwrap_or_else(PoisonError::into_inner))?;
        let next = last + self.config.alarm_repeat_ms;
        Some(next.saturating_sub(now).div_ceil(1000))
    }

    /// Human readable guard zone summary for one radar
    pub fn guard_zone_text(
        &self,
        id: RadarId,
        with_timeout: bool,
        now: u64,
    ) -> Result<String, EngineError> {
        let mut lines: Vec<String> = self.with_radar(id, |radar| {
            radar
                .zones()
                .iter()
                .enumerate()
                .filter(|(_, z)| z.state() != ZoneAlarmState::Inactive)
                .map(|(i, z)| {
                    let count = z
                        .last_count()
                        .map_or_else(|| "-".to_string(), |c| c.to_string());
                    if z.state().is_alarm() {
                        format!("Guard zone {}: {} ({})", i + 1, count, z.state())
                    } else {
                        format!("Guard zone {}: {}", i + 1, count)
                    }
                })
                .collect()
        })?;

        if lines.is_empty() {
            lines.push("No guard zones".to_string());
        }
        if with_timeout {
            if let Some(seconds) = self.alarm_seconds_left(now) {
                lines.push(format!("Next alarm in {} s", seconds));
            }
        }
        Ok(lines.join("\n"))
    }

    // =========================================================================
    // Power state and statistics
    // =========================================================================

    pub fn set_desired_state(&self, id: RadarId, state: PowerState) -> Result<(), EngineError> {
        self.with_radar_mut(id, |radar| radar.state_mut().set_desired(state))
    }

    /// Power state as reported by the radar
    pub fn report_state(&self, id: RadarId, state: PowerState, now: u64) -> Result<(), EngineError> {
        self.with_radar_mut(id, |radar| radar.state_mut().report_actual(state, now))
    }

    pub fn set_timed_idle(
        &self,
        id: RadarId,
        timed_idle: TimedIdle,
        now: u64,
    ) -> Result<(), EngineError> {
        self.with_radar_mut(id, |radar| radar.state_mut().set_timed_idle(timed_idle, now))
    }

    /// Add counters reported by the receive path
    pub fn report_statistics(
        &self,
        id: RadarId,
        delta: &ReceiveStatistics,
    ) -> Result<(), EngineError> {
        self.with_radar_mut(id, |radar| {
            radar.state_mut().report_statistics(delta);
            log::debug!("Radar {}: {}", id, radar.state().statistics());
        })
    }

    pub fn receive_statistics(&self, id: RadarId) -> Result<ReceiveStatistics, EngineError> {
        self.with_radar(id, |radar| radar.state().statistics())
    }

    pub fn reset_statistics(&self, id: RadarId) -> Result<(), EngineError> {
        self.with_radar_mut(id, |radar| radar.state_mut().reset_statistics())
    }

    pub fn runtime_state(&self, id: RadarId) -> Result<RadarRuntimeState, EngineError> {
        self.with_radar(id, |radar| radar.state().runtime_state())
    }

    /// Advance one radar's power schedule; returns the command to send
    pub fn tick_state_machine(
        &self,
        id: RadarId,
        now: u64,
    ) -> Result<Option<PowerState>, EngineError> {
        let command = self.with_radar_mut(id, |radar| {
            if !radar.is_active() {
                return None;
            }
            radar.state_mut().tick(now)
        })?;
        if let Some(state) = command {
            log::info!("Radar {}: requesting {}", id, state);
            self.notify(|l| l.power_command(id, state));
        }
        Ok(command)
    }

    /// Periodic housekeeping: power schedules of all radars and the alarm
    /// sound. Returns the power commands issued.
    pub fn tick(&self, now: u64) -> Vec<(RadarId, PowerState)> {
        let commands: Vec<(RadarId, PowerState)> = self
            .radar_ids()
            .into_iter()
            .filter_map(|id| match self.tick_state_machine(id, now) {
                Ok(Some(state)) => Some((id, state)),
                _ => None,
            })
            .collect();

        if self.alarm_sound_due(now) {
            log::warn!("Guard zone alarm");
            self.notify(|l| l.alarm_sound());
        }
        commands
    }
}
