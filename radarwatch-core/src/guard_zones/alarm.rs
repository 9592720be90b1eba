//! Guard zone alarm evaluation
//!
//! Each zone slot runs a small state machine driven once per completed
//! rotation:
//!
//! ```text
//! Inactive ──(kind != Off)──► Evaluating ──(count ≥ threshold)──► AlarmPending
//!                                 ▲                                   │
//!                                 │                      held for confirm window
//!                                 │                                   ▼
//!                                 └──────────(clear)───────────── AlarmConfirmed
//! ```
//!
//! `confirm_bogeys` moves a pending or confirmed alarm to a silenced
//! AlarmConfirmed. It stays there while the breach lasts and only a clear
//! rotation ends it.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::zone::GuardZone;
use crate::angle::RETURNS_PER_LINE;
use crate::config::EngineConfig;
use crate::navdata::HeadingEstimate;
use crate::spoke::SpokeBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ZoneAlarmState {
    /// Zone kind is OFF
    Inactive,
    /// Zone is watched, no breach
    Evaluating,
    /// Threshold reached, waiting for the confirmation window
    AlarmPending,
    /// Breach sustained or acknowledged by the operator; sounds the alarm
    /// unless silenced
    AlarmConfirmed,
}

impl Default for ZoneAlarmState {
    fn default() -> Self {
        ZoneAlarmState::Inactive
    }
}

impl ZoneAlarmState {
    pub fn is_alarm(&self) -> bool {
        matches!(
            self,
            ZoneAlarmState::AlarmPending | ZoneAlarmState::AlarmConfirmed
        )
    }
}

impl fmt::Display for ZoneAlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneAlarmState::Inactive => write!(f, "Inactive"),
            ZoneAlarmState::Evaluating => write!(f, "Evaluating"),
            ZoneAlarmState::AlarmPending => write!(f, "Alarm pending"),
            ZoneAlarmState::AlarmConfirmed => write!(f, "Alarm confirmed"),
        }
    }
}

/// A state change produced by one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneTransition {
    pub from: ZoneAlarmState,
    pub to: ZoneAlarmState,
    /// Strong returns counted in the rotation that caused the change
    pub count: u32,
}

/// One guard zone slot: its definition and alarm state
#[derive(Debug, Clone, Default)]
pub struct GuardZoneEvaluator {
    zone: GuardZone,
    state: ZoneAlarmState,
    /// Time of the evaluation that entered AlarmPending
    pending_since: Option<u64>,
    /// Set by `confirm_bogeys`, cleared by the first clear rotation
    silenced: bool,
    last_count: Option<u32>,
}

impl GuardZoneEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zone(&self) -> &GuardZone {
        &self.zone
    }

    pub fn state(&self) -> ZoneAlarmState {
        self.state
    }

    /// Count of the most recent evaluated rotation, `None` if none ran yet
    pub fn last_count(&self) -> Option<u32> {
        self.last_count
    }

    pub fn is_silenced(&self) -> bool {
        self.silenced
    }

    /// Replace the zone definition. Alarm state starts over.
    pub fn set_zone(&mut self, zone: GuardZone) {
        self.state = if zone.is_active() {
            ZoneAlarmState::Evaluating
        } else {
            ZoneAlarmState::Inactive
        };
        self.zone = zone;
        self.pending_since = None;
        self.silenced = false;
        self.last_count = None;
    }

    /// Count strong returns inside the zone.
    ///
    /// `heading` is the trusted true heading, if any. Only spokes fresher than
    /// `max_age_ms` take part. Returns `None` when the zone can't be evaluated
    /// this rotation.
    pub fn count_returns(
        &self,
        buffer: &SpokeBuffer,
        heading: Option<f64>,
        now: u64,
        max_age_ms: u64,
    ) -> Option<u32> {
        let resolution = buffer.resolution();
        let bearings = self.zone.bearings(resolution, heading)?;
        let threshold = buffer.alarm_threshold();

        let mut count = 0;
        for bearing in bearings.iter(resolution) {
            let spoke = buffer.get(bearing as i32);
            if !spoke.is_fresh(now, max_age_ms) || spoke.range_decimeters == 0 {
                continue;
            }
            for index in 0..RETURNS_PER_LINE {
                if !self.zone.contains_range(spoke.distance(index)) {
                    continue;
                }
                let strong = if self.zone.multi_sweep_filter {
                    spoke.has_multi_sweep_return(index)
                } else {
                    spoke.intensity[index] > threshold
                };
                if strong {
                    count += 1;
                }
            }
        }
        Some(count)
    }

    /// Run the state machine for one completed rotation
    pub fn evaluate(
        &mut self,
        buffer: &SpokeBuffer,
        heading: &HeadingEstimate,
        now: u64,
        config: &EngineConfig,
    ) -> Option<ZoneTransition> {
        if !self.zone.is_active() {
            return None;
        }
        let trusted = heading.is_trusted().then_some(heading.value);
        let Some(count) = self.count_returns(buffer, trusted, now, config.max_age_ms()) else {
            log::trace!("Skipping vessel relative guard zone, no trusted heading");
            return None;
        };
        self.last_count = Some(count);

        let from = self.state;
        let to = if count >= self.zone.threshold {
            self.breached(now, config.confirm_window_ms)
        } else {
            self.silenced = false;
            self.pending_since = None;
            ZoneAlarmState::Evaluating
        };
        self.state = to;

        (from != to).then_some(ZoneTransition { from, to, count })
    }

    fn breached(&mut self, now: u64, confirm_window_ms: u64) -> ZoneAlarmState {
        if self.silenced {
            return ZoneAlarmState::AlarmConfirmed;
        }
        match (self.state, self.pending_since) {
            (ZoneAlarmState::AlarmConfirmed, _) => ZoneAlarmState::AlarmConfirmed,
            (ZoneAlarmState::AlarmPending, Some(since))
                if now.saturating_sub(since) >= confirm_window_ms =>
            {
                ZoneAlarmState::AlarmConfirmed
            }
            (ZoneAlarmState::AlarmPending, Some(_)) => ZoneAlarmState::AlarmPending,
            _ => {
                self.pending_since = Some(now);
                ZoneAlarmState::AlarmPending
            }
        }
    }

    /// Operator acknowledgement of the current bogeys.
    ///
    /// A pending or confirmed alarm becomes a silenced AlarmConfirmed and
    /// stays so while the same breach continues. Geometry is untouched.
    /// Returns whether an alarm was silenced.
    pub fn confirm_bogeys(&mut self) -> bool {
        if !self.state.is_alarm() || self.silenced {
            return false;
        }
        self.state = ZoneAlarmState::AlarmConfirmed;
        self.silenced = true;
        true
    }

    /// Confirmed and not acknowledged: the audible alarm is due
    pub fn is_sounding(&self) -> bool {
        self.state == ZoneAlarmState::AlarmConfirmed && !self.silenced
    }
}
