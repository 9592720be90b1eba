//! # Radarwatch Core
//!
//! Platform-independent engine for Navico BR24/3G/4G radar data: spoke
//! storage, heading fusion, guard zone alarms and radar power scheduling.
//!
//! This crate has **no I/O and no async dependencies**. Time is passed in as
//! milliseconds by the caller, so every component can be driven from tests
//! or from any runtime.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  radarwatch-core (pure, no tokio)                           │
//! │  ├── angle/       (bearing arithmetic)                      │
//! │  ├── spoke/       (per radar spoke buffer with history)     │
//! │  ├── navdata/     (heading + variation fusion)              │
//! │  ├── guard_zones/ (zone geometry and alarm state machine)   │
//! │  ├── state/       (power state machine, timed idle)         │
//! │  └── engine/      (RadarEngine tying it all together)       │
//! └─────────────────────────────────────────────────────────────┘
//!                 ▲
//!    ┌────────────┴────────────┐
//!    │  radarwatch-server      │
//!    │  (tokio receive + tick) │
//!    └─────────────────────────┘
//! ```
//!
//! ## Key Modules
//!
//! - [`angle`] - Raw bearing / degree conversion and wrapping
//! - [`spoke`] - [`SpokeBuffer`] storing the latest line per bearing
//! - [`navdata`] - [`HeadingFusion`] and [`VariationFusion`]
//! - [`guard_zones`] - Guard zone definitions and alarm evaluation
//! - [`state`] - [`RadarStateMachine`] with timed idle
//! - [`engine`] - [`RadarEngine`], the thread-safe entry point
//!
//! ## Example
//!
//! ```rust
//! use radarwatch_core::{
//!     GuardZone, HeadingSource, RadarEngine, Resolution, ZoneAlarmState,
//! };
//!
//! let engine = RadarEngine::default();
//! let radar = engine.attach(0, Resolution::Coarse).unwrap();
//! engine
//!     .set_guard_zone(0, 0, GuardZone::new_arc(0.0, 90.0, 0.0, 1000.0, 1))
//!     .unwrap();
//!
//! engine.update_heading(HeadingSource::Radar, 0.0, 0);
//!
//! let mut line = [0u8; 512];
//! line[100] = 255;
//! engine
//!     .write_spoke(0, radar.generation, 256, 10_000, &line, 0)
//!     .unwrap();
//! engine.evaluate_guard_zones(0, 0).unwrap();
//!
//! assert_eq!(
//!     engine.guard_zone_alarm_state(0, 0).unwrap(),
//!     ZoneAlarmState::AlarmPending
//! );
//! ```

pub mod angle;
pub mod config;
pub mod engine;
pub mod error;
pub mod guard_zones;
pub mod legend;
pub mod navdata;
pub mod spoke;
pub mod state;

// Re-export commonly used types
pub use angle::{Resolution, SpokeBearing, LINES_PER_ROTATION, RETURNS_PER_LINE, SPOKES};
pub use config::{DisplayThresholds, EngineConfig};
pub use engine::{EngineListener, ManagedRadar, RadarEngine, RadarHandle, RadarId, WriteOutcome};
pub use error::EngineError;
pub use guard_zones::{
    BearingReference, GuardZone, GuardZoneKind, RenderStyle, ZoneAlarmState, ZoneTransition,
    GUARD_ZONES,
};
pub use legend::BlobColor;
pub use navdata::{
    HeadingEstimate, HeadingFusion, HeadingSource, NavData, VariationEstimate, VariationFusion,
    VariationSource,
};
pub use spoke::{Spoke, SpokeBuffer};
pub use state::{PowerState, RadarRuntimeState, RadarStateMachine, ReceiveStatistics, TimedIdle};
