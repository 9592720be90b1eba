use log::{debug, info};
use radarwatch_core::{PowerState, RadarEngine, RadarId};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tokio_graceful_shutdown::SubsystemHandle;

use crate::{now_millis, ServerError};

/// Interval of the guard zone summary in the debug log
const SUMMARY_INTERVAL_MS: u64 = 10_000;

/// Periodic engine housekeeping: power schedules, command retries and the
/// audible alarm.
pub struct Ticker {
    engine: Arc<RadarEngine>,
    period: Duration,
    last_summary: u64,
}

impl Ticker {
    pub fn new(engine: Arc<RadarEngine>, tick_ms: u64) -> Self {
        Ticker {
            engine,
            period: Duration::from_millis(tick_ms.max(10)),
            last_summary: 0,
        }
    }

    /// One tick; returns the power commands issued
    pub fn tick(&mut self, now: u64) -> Vec<(RadarId, PowerState)> {
        let commands = self.engine.tick(now);

        if now.saturating_sub(self.last_summary) >= SUMMARY_INTERVAL_MS {
            self.last_summary = now;
            for id in self.engine.radar_ids() {
                if let Ok(text) = self.engine.guard_zone_text(id, true, now) {
                    debug!("Radar {}: {}", id, text.replace('\n', ", "));
                }
            }
        }
        commands
    }

    pub async fn run(mut self, subsys: SubsystemHandle) -> Result<(), ServerError> {
        info!("Ticker running every {} ms", self.period.as_millis());
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => {
                    return Ok(());
                },
                _ = ticker.tick() => {
                    self.tick(now_millis());
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radarwatch_core::{EngineListener, Resolution};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Commands(AtomicUsize);

    impl EngineListener for Commands {
        fn power_command(&self, _radar: RadarId, _state: PowerState) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_tick_issues_commands() {
        let engine = Arc::new(RadarEngine::default());
        let commands = Arc::new(Commands::default());
        engine.add_listener(commands.clone());
        engine.attach(0, Resolution::Coarse).unwrap();
        engine.report_state(0, PowerState::Standby, 0).unwrap();
        engine.set_desired_state(0, PowerState::Transmit).unwrap();

        let mut ticker = Ticker::new(engine.clone(), 250);
        assert_eq!(ticker.tick(0), vec![(0, PowerState::Transmit)]);
        assert_eq!(commands.0.load(Ordering::Relaxed), 1);

        engine.report_state(0, PowerState::Transmit, 100).unwrap();
        assert!(ticker.tick(5_000).is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};

        let engine = Arc::new(RadarEngine::default());
        let ticker = Ticker::new(engine, 10);
        let result = Toplevel::new(|s| async move {
            s.start(SubsystemBuilder::new("Ticker", move |a| ticker.run(a)));
            tokio::time::sleep(Duration::from_millis(50)).await;
            s.request_shutdown();
        })
        .handle_shutdown_requests(Duration::from_millis(1000))
        .await;
        tokio_test::assert_ok!(result);
    }
}
