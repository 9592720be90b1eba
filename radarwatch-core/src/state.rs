//! Radar power state machine
//!
//! Tracks what the radar reports (`actual`) against what the operator or the
//! timed idle schedule wants (`desired`), and decides when a power command
//! has to be sent. Pure state transitions driven by millisecond timestamps;
//! sending the command is up to the receive collaborator.
//!
//! ```text
//!   Off ◄──operator──► Standby ◄──operator / timed idle──► Transmit
//! ```
//!
//! # Usage
//!
//! ```rust
//! use radarwatch_core::state::{PowerState, RadarStateMachine, TimedIdle};
//!
//! let mut sm = RadarStateMachine::new();
//! sm.report_actual(PowerState::Standby, 0);
//! sm.set_desired(PowerState::Transmit);
//! assert_eq!(sm.tick(0), Some(PowerState::Transmit));
//!
//! sm.report_actual(PowerState::Transmit, 100);
//! sm.set_timed_idle(TimedIdle::from_setting(1, 60), 100);
//! assert_eq!(sm.idle_deadline(), Some(100 + 60_000));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::MIN_IDLE_RUN_MS;

/// Resend an unanswered power command after this long
pub const COMMAND_RETRY_MS: u64 = 2_000;
/// Timed idle setting step
pub const TIMED_IDLE_STEP_MS: u64 = 5 * 60_000;
/// Highest timed idle setting (35 minutes)
pub const MAX_TIMED_IDLE_SETTING: u8 = 7;

// =============================================================================
// Power State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    /// Not powered or not seen on the network
    Off,
    Standby,
    Transmit,
}

impl Default for PowerState {
    fn default() -> Self {
        PowerState::Off
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::Off => write!(f, "Off"),
            PowerState::Standby => write!(f, "Standby"),
            PowerState::Transmit => write!(f, "Transmit"),
        }
    }
}

// =============================================================================
// Timed Idle
// =============================================================================

/// Alternating standby / transmit schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimedIdle {
    /// Standby period; 0 disables the schedule
    pub idle_ms: u64,
    /// Transmit period, never shorter than [`MIN_IDLE_RUN_MS`]
    pub run_ms: u64,
}

impl TimedIdle {
    pub fn disabled() -> Self {
        TimedIdle::default()
    }

    /// Build from the operator setting: `setting` 0 is off, 1..=7 selects
    /// 5..=35 minutes of standby. `run_seconds` is the transmit period.
    pub fn from_setting(setting: u8, run_seconds: u64) -> Self {
        TimedIdle {
            idle_ms: setting.min(MAX_TIMED_IDLE_SETTING) as u64 * TIMED_IDLE_STEP_MS,
            run_ms: run_seconds.saturating_mul(1000),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.idle_ms > 0
    }

    /// Transmit period after clamping
    pub fn run_ms(&self) -> u64 {
        self.run_ms.max(MIN_IDLE_RUN_MS)
    }
}

// =============================================================================
// Receive Statistics
// =============================================================================

/// Counters reported by the receive path. Monotonic until reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveStatistics {
    pub packets: u64,
    pub broken_packets: u64,
    pub spokes: u64,
    pub broken_spokes: u64,
    pub missing_spokes: u64,
}

impl ReceiveStatistics {
    /// Add a delta reported by the receive path
    pub fn accumulate(&mut self, delta: &ReceiveStatistics) {
        self.packets = self.packets.saturating_add(delta.packets);
        self.broken_packets = self.broken_packets.saturating_add(delta.broken_packets);
        self.spokes = self.spokes.saturating_add(delta.spokes);
        self.broken_spokes = self.broken_spokes.saturating_add(delta.broken_spokes);
        self.missing_spokes = self.missing_spokes.saturating_add(delta.missing_spokes);
    }

    pub fn reset(&mut self) {
        *self = ReceiveStatistics::default();
    }
}

impl fmt::Display for ReceiveStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} packets ({} broken), {} spokes ({} broken, {} missing)",
            self.packets, self.broken_packets, self.spokes, self.broken_spokes, self.missing_spokes
        )
    }
}

/// Externally visible runtime state of one radar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadarRuntimeState {
    pub actual: PowerState,
    pub desired: Option<PowerState>,
    pub idle_deadline: Option<u64>,
    pub receive_stats: ReceiveStatistics,
}

// =============================================================================
// State Machine
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct RadarStateMachine {
    actual: PowerState,
    /// `None` until the operator or the idle schedule asks for something
    desired: Option<PowerState>,
    timed_idle: TimedIdle,
    idle_deadline: Option<u64>,
    /// Last command handed out and when
    last_command: Option<(PowerState, u64)>,
    stats: ReceiveStatistics,
}

impl RadarStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actual(&self) -> PowerState {
        self.actual
    }

    pub fn desired(&self) -> Option<PowerState> {
        self.desired
    }

    pub fn idle_deadline(&self) -> Option<u64> {
        self.idle_deadline
    }

    pub fn timed_idle(&self) -> TimedIdle {
        self.timed_idle
    }

    pub fn statistics(&self) -> ReceiveStatistics {
        self.stats
    }

    /// Operator request. Off is only ever reached this way.
    pub fn set_desired(&mut self, state: PowerState) {
        if state == PowerState::Off {
            self.idle_deadline = None;
        }
        self.desired = Some(state);
        self.last_command = None;
    }

    /// State reported by the radar itself
    pub fn report_actual(&mut self, state: PowerState, now: u64) {
        if self.actual != state {
            log::debug!("Radar power state {} -> {} at {}", self.actual, state, now);
        }
        self.actual = state;
        if self.desired == Some(state) {
            self.last_command = None;
        }
    }

    /// Start, change or stop the timed idle schedule
    pub fn set_timed_idle(&mut self, timed_idle: TimedIdle, now: u64) {
        self.timed_idle = timed_idle;
        self.idle_deadline = if !timed_idle.is_enabled() {
            None
        } else {
            match self.actual {
                PowerState::Transmit => Some(now + timed_idle.run_ms()),
                PowerState::Standby => Some(now + timed_idle.idle_ms),
                PowerState::Off => None,
            }
        };
    }

    pub fn report_statistics(&mut self, delta: &ReceiveStatistics) {
        self.stats.accumulate(delta);
    }

    pub fn reset_statistics(&mut self) {
        self.stats.reset();
    }

    pub fn runtime_state(&self) -> RadarRuntimeState {
        RadarRuntimeState {
            actual: self.actual,
            desired: self.desired,
            idle_deadline: self.idle_deadline,
            receive_stats: self.stats,
        }
    }

    /// Advance the schedule and return the power command to send now, if any.
    ///
    /// A radar that is Off can't be commanded; it reports Standby once it is
    /// powered. Unanswered commands are repeated every [`COMMAND_RETRY_MS`].
    pub fn tick(&mut self, now: u64) -> Option<PowerState> {
        self.advance_timed_idle(now);

        let desired = self.desired?;
        if desired == self.actual || self.actual == PowerState::Off {
            return None;
        }
        if let Some((state, sent)) = self.last_command {
            if state == desired && now.saturating_sub(sent) < COMMAND_RETRY_MS {
                return None;
            }
        }
        self.last_command = Some((desired, now));
        Some(desired)
    }

    fn advance_timed_idle(&mut self, now: u64) {
        if !self.timed_idle.is_enabled() || self.desired == Some(PowerState::Off) {
            return;
        }
        let Some(deadline) = self.idle_deadline else {
            // Schedule set while Off; start once the radar is up
            if self.actual != PowerState::Off {
                self.set_timed_idle(self.timed_idle, now);
            }
            return;
        };
        if now < deadline {
            return;
        }
        match self.actual {
            PowerState::Transmit => {
                log::info!("Timed idle: going to standby");
                self.desired = Some(PowerState::Standby);
                self.idle_deadline = Some(now + self.timed_idle.idle_ms);
            }
            PowerState::Standby => {
                log::info!("Timed idle: transmitting");
                self.desired = Some(PowerState::Transmit);
                self.idle_deadline = Some(now + self.timed_idle.run_ms());
            }
            PowerState::Off => {}
        }
        self.last_command = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_idle_presets() {
        assert!(!TimedIdle::from_setting(0, 60).is_enabled());
        assert_eq!(TimedIdle::from_setting(1, 60).idle_ms, 5 * 60_000);
        assert_eq!(TimedIdle::from_setting(7, 60).idle_ms, 35 * 60_000);
        assert_eq!(TimedIdle::from_setting(9, 60).idle_ms, 35 * 60_000);

        assert_eq!(TimedIdle::from_setting(1, 10).run_ms(), 30_000);
        assert_eq!(TimedIdle::from_setting(1, 90).run_ms(), 90_000);
    }

    #[test]
    fn test_command_until_reported() {
        let mut sm = RadarStateMachine::new();
        assert_eq!(sm.tick(0), None);

        sm.report_actual(PowerState::Standby, 0);
        assert_eq!(sm.tick(0), None);

        sm.set_desired(PowerState::Transmit);
        assert_eq!(sm.tick(10), Some(PowerState::Transmit));
        assert_eq!(sm.tick(500), None);
        assert_eq!(sm.tick(10 + COMMAND_RETRY_MS), Some(PowerState::Transmit));

        sm.report_actual(PowerState::Transmit, 3_000);
        assert_eq!(sm.tick(10_000), None);
    }

    #[test]
    fn test_off_radar_is_not_commanded() {
        let mut sm = RadarStateMachine::new();
        sm.set_desired(PowerState::Transmit);
        assert_eq!(sm.tick(0), None);
        sm.report_actual(PowerState::Standby, 100);
        assert_eq!(sm.tick(100), Some(PowerState::Transmit));
    }

    #[test]
    fn test_timed_idle_alternates() {
        let mut sm = RadarStateMachine::new();
        sm.report_actual(PowerState::Transmit, 0);
        sm.set_timed_idle(TimedIdle::from_setting(1, 60), 0);
        assert_eq!(sm.idle_deadline(), Some(60_000));

        assert_eq!(sm.tick(59_999), None);
        assert_eq!(sm.tick(60_000), Some(PowerState::Standby));
        assert_eq!(sm.idle_deadline(), Some(60_000 + 300_000));

        sm.report_actual(PowerState::Standby, 60_500);
        assert_eq!(sm.tick(360_000), Some(PowerState::Transmit));
        assert_eq!(sm.idle_deadline(), Some(360_000 + 60_000));
    }

    #[test]
    fn test_timed_idle_never_turns_off() {
        let mut sm = RadarStateMachine::new();
        sm.report_actual(PowerState::Standby, 0);
        sm.set_timed_idle(TimedIdle::from_setting(2, 30), 0);
        sm.set_desired(PowerState::Off);
        assert_eq!(sm.idle_deadline(), None);

        sm.report_actual(PowerState::Off, 100);
        for t in [1_000, 700_000, 2_000_000] {
            assert_eq!(sm.tick(t), None);
            assert_eq!(sm.actual(), PowerState::Off);
        }
    }

    #[test]
    fn test_disable_timed_idle() {
        let mut sm = RadarStateMachine::new();
        sm.report_actual(PowerState::Transmit, 0);
        sm.set_timed_idle(TimedIdle::from_setting(1, 30), 0);
        sm.set_timed_idle(TimedIdle::disabled(), 10);
        assert_eq!(sm.idle_deadline(), None);
        assert_eq!(sm.tick(1_000_000), None);
    }

    #[test]
    fn test_statistics_accumulate_until_reset() {
        let mut sm = RadarStateMachine::new();
        let delta = ReceiveStatistics {
            packets: 10,
            broken_packets: 1,
            spokes: 320,
            broken_spokes: 2,
            missing_spokes: 5,
        };
        sm.report_statistics(&delta);
        sm.report_statistics(&delta);
        assert_eq!(sm.statistics().spokes, 640);
        assert_eq!(sm.runtime_state().receive_stats.missing_spokes, 10);

        // Statistics never drive transitions
        assert_eq!(sm.tick(0), None);

        sm.reset_statistics();
        assert_eq!(sm.statistics(), ReceiveStatistics::default());
    }
}
