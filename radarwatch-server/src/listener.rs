use log::{debug, info, warn};
use radarwatch_core::{EngineListener, PowerState, RadarId, ZoneAlarmState, ZoneTransition};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;

/// Routes engine events to the radars' command channels and the log
#[derive(Default)]
pub struct ServerListener {
    command_tx: Mutex<HashMap<RadarId, mpsc::UnboundedSender<PowerState>>>,
    alarms: AtomicU64,
}

impl ServerListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the channel power commands for `radar` are sent on
    pub fn register(&self, radar: RadarId, tx: mpsc::UnboundedSender<PowerState>) {
        self.command_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(radar, tx);
    }

    /// Number of times the audible alarm sounded
    pub fn alarms(&self) -> u64 {
        self.alarms.load(Ordering::Relaxed)
    }
}

impl EngineListener for ServerListener {
    fn guard_zone_changed(&self, radar: RadarId, zone: usize, transition: ZoneTransition) {
        match transition.to {
            ZoneAlarmState::AlarmConfirmed => warn!(
                "Radar {}: guard zone {} confirmed, {} returns",
                radar,
                zone + 1,
                transition.count
            ),
            _ => debug!(
                "Radar {}: guard zone {} {} -> {}",
                radar,
                zone + 1,
                transition.from,
                transition.to
            ),
        }
    }

    fn power_command(&self, radar: RadarId, state: PowerState) {
        let mut channels = self
            .command_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match channels.get(&radar) {
            Some(tx) => {
                if tx.send(state).is_err() {
                    info!("Radar {}: receiver gone, dropping command channel", radar);
                    channels.remove(&radar);
                }
            }
            None => debug!("Radar {}: no command channel for {}", radar, state),
        }
    }

    fn buffer_reset(&self, radar: RadarId) {
        debug!("Radar {}: spoke buffer cleared", radar);
    }

    fn alarm_sound(&self) {
        self.alarms.fetch_add(1, Ordering::Relaxed);
        warn!("*** GUARD ZONE ALARM ***");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_command_routing() {
        let listener = ServerListener::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        listener.register(3, tx);

        listener.power_command(3, PowerState::Transmit);
        listener.power_command(4, PowerState::Standby);
        assert_eq!(rx.try_recv().unwrap(), PowerState::Transmit);
        assert!(rx.try_recv().is_err());

        drop(rx);
        listener.power_command(3, PowerState::Standby);
        assert!(listener.command_tx.lock().unwrap().is_empty());
    }

    #[test]
    fn test_counts_alarms() {
        let listener = ServerListener::new();
        listener.alarm_sound();
        listener.alarm_sound();
        assert_eq!(listener.alarms(), 2);
    }
}
