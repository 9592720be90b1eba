//! Emulated radar
//!
//! Produces spokes the way a BR24 receive path would: one packet of 32
//! spokes at a time, bearings relative to the bow converted to north up with
//! the radar's own heading, a single synthetic target that drifts each
//! rotation, and receive statistics per packet. The emulated radar obeys
//! power commands after a short delay.

use log::{debug, info};
use radarwatch_core::angle::mod_degrees;
use radarwatch_core::{
    HeadingSource, PowerState, RadarEngine, RadarHandle, ReceiveStatistics, Resolution,
    WriteOutcome, RETURNS_PER_LINE,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_graceful_shutdown::SubsystemHandle;

use crate::config::EmulatorConfig;
use crate::{now_millis, ServerError};

/// Spokes per data packet
pub const SPOKES_PER_PACKET: u16 = 32;
/// Time the emulated radar takes to follow a power command
const POWER_SWITCH_MS: u64 = 1_000;
/// Half width of the target in degrees
const TARGET_HALF_WIDTH: f64 = 1.0;
/// Returns covered by the target along the spoke
const TARGET_DEPTH: usize = 4;

/// What one packet produced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketOutcome {
    pub written: u32,
    pub discarded: u32,
    pub rotation_complete: bool,
}

pub struct Emulator {
    engine: Arc<RadarEngine>,
    handle: RadarHandle,
    resolution: Resolution,
    config: EmulatorConfig,
    rx_command: mpsc::UnboundedReceiver<PowerState>,
    power: PowerState,
    pending_power: Option<(PowerState, u64)>,
    /// Next bearing relative to the bow, in `resolution` units
    next_spoke: u16,
    heading: f64,
    target_bearing: f64,
    target_distance: f64,
}

impl Emulator {
    pub fn new(
        engine: Arc<RadarEngine>,
        handle: RadarHandle,
        resolution: Resolution,
        config: EmulatorConfig,
        rx_command: mpsc::UnboundedReceiver<PowerState>,
    ) -> Self {
        Emulator {
            engine,
            handle,
            resolution,
            heading: config.heading,
            target_bearing: config.target_bearing,
            target_distance: config.target_distance,
            config,
            rx_command,
            power: PowerState::Off,
            pending_power: None,
            next_spoke: 0,
        }
    }

    pub fn power(&self) -> PowerState {
        self.power
    }

    fn packet_period(&self) -> Duration {
        let packets = (self.resolution.spokes() / SPOKES_PER_PACKET) as u64;
        Duration::from_millis((self.config.rotation_ms / packets).max(1))
    }

    /// Switch on: the radar shows up in standby
    pub fn power_up(&mut self, now: u64) -> Result<(), ServerError> {
        self.set_power(PowerState::Standby, now)
    }

    fn set_power(&mut self, state: PowerState, now: u64) -> Result<(), ServerError> {
        if self.power != state {
            info!("Emulator {}: {} -> {}", self.handle.id, self.power, state);
        }
        self.power = state;
        self.engine.report_state(self.handle.id, state, now)?;
        Ok(())
    }

    /// A power command arrived
    pub fn command(&mut self, state: PowerState, now: u64) {
        debug!("Emulator {}: command {}", self.handle.id, state);
        self.pending_power = Some((state, now + POWER_SWITCH_MS));
    }

    fn follow_commands(&mut self, now: u64) -> Result<(), ServerError> {
        if let Some((state, at)) = self.pending_power {
            if now >= at {
                self.pending_power = None;
                self.set_power(state, now)?;
            }
        }
        Ok(())
    }

    /// One line of returns at `relative` bearing
    fn line(&self, relative: u16) -> Vec<u8> {
        let mut line = vec![0u8; RETURNS_PER_LINE];
        let bearing = mod_degrees(self.resolution.raw_to_degrees(relative as i32) + self.heading);
        let offset = (bearing - self.target_bearing + 180.0).rem_euclid(360.0) - 180.0;
        if offset.abs() > TARGET_HALF_WIDTH {
            return line;
        }
        let start = (self.target_distance / self.config.range_meters as f64
            * RETURNS_PER_LINE as f64) as usize;
        for v in line.iter_mut().skip(start).take(TARGET_DEPTH) {
            *v = 255;
        }
        line
    }

    fn advance_scenario(&mut self) {
        self.heading = mod_degrees(self.heading + self.config.turn_rate);
        self.target_bearing = mod_degrees(self.target_bearing + self.config.target_drift_bearing);
        self.target_distance = (self.target_distance + self.config.target_drift_distance)
            .clamp(0.0, self.config.range_meters as f64);
    }

    /// Emit one packet of spokes. Nothing is sent unless transmitting.
    pub fn packet(&mut self, now: u64) -> Result<PacketOutcome, ServerError> {
        self.follow_commands(now)?;
        let mut outcome = PacketOutcome::default();
        if self.power != PowerState::Transmit {
            return Ok(outcome);
        }

        let id = self.handle.id;
        self.engine.update_heading(HeadingSource::Radar, self.heading, now);
        let heading_raw = self.resolution.degrees_to_raw(self.heading) as i32;
        let range_dm = self.config.range_meters * 10;

        for _ in 0..SPOKES_PER_PACKET {
            let relative = self.next_spoke;
            self.next_spoke = (self.next_spoke + 1) % self.resolution.spokes();
            let line = self.line(relative);
            let bearing = relative as i32 + heading_raw;

            match self.engine.write_spoke(
                id,
                self.handle.generation,
                bearing,
                range_dm,
                &line,
                now,
            )? {
                WriteOutcome::Written {
                    rotation_complete, ..
                } => {
                    outcome.written += 1;
                    if rotation_complete {
                        outcome.rotation_complete = true;
                        self.engine.evaluate_guard_zones(id, now)?;
                        self.advance_scenario();
                    }
                }
                WriteOutcome::Discarded => outcome.discarded += 1,
            }
        }

        self.engine.report_statistics(
            id,
            &ReceiveStatistics {
                packets: 1,
                spokes: outcome.written as u64,
                broken_spokes: outcome.discarded as u64,
                ..Default::default()
            },
        )?;
        Ok(outcome)
    }

    pub async fn run(mut self, subsys: SubsystemHandle) -> Result<(), ServerError> {
        info!(
            "Emulator {}: {} spokes per rotation, {} ms per rotation",
            self.handle.id,
            self.resolution.spokes(),
            self.config.rotation_ms
        );
        self.power_up(now_millis())?;

        let mut ticker = interval(self.packet_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => {
                    info!("Emulator {}: stopped", self.handle.id);
                    return Ok(());
                },
                Some(state) = self.rx_command.recv() => {
                    self.command(state, now_millis());
                },
                _ = ticker.tick() => {
                    let outcome = self.packet(now_millis())?;
                    if outcome.discarded > 0 {
                        debug!("Emulator {}: radar detached, stopping", self.handle.id);
                        return Ok(());
                    }
                },
            }
        }
    }
}
