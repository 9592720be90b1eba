use anyhow::Context;
use directories::ProjectDirs;
use log::{info, warn};
use radarwatch_core::{
    EngineConfig, GuardZone, PowerState, RadarEngine, RadarId, Resolution, TimedIdle,
    GUARD_ZONES,
};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::ServerError;

pub const CONFIG_FILE: &str = "radarwatch.json";

pub fn get_project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "radarwatch", "radarwatch")
}

/// Default location of the configuration file, if the platform has one
pub fn default_config_path() -> Option<PathBuf> {
    get_project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

/// One radar to attach at startup
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RadarConfig {
    pub id: RadarId,
    pub user_name: String,
    /// Resolution of the bearings this radar sends
    pub resolution: Resolution,
    /// At most two zones; missing ones stay off
    pub guard_zones: Vec<GuardZone>,
    /// Timed idle setting, 0 = off, 1 = 5 min ... 7 = 35 min
    pub timed_idle: u8,
    /// Transmit period of a timed idle cycle, in seconds
    pub idle_run_time: u64,
    /// Ask the radar to transmit as soon as it is seen
    pub transmit: bool,
}

impl Default for RadarConfig {
    fn default() -> Self {
        RadarConfig {
            id: 0,
            user_name: String::new(),
            resolution: Resolution::Coarse,
            guard_zones: Vec::new(),
            timed_idle: 0,
            idle_run_time: 30,
            transmit: false,
        }
    }
}

impl RadarConfig {
    pub fn name(&self) -> String {
        if self.user_name.is_empty() {
            format!("Radar {}", self.id)
        } else {
            self.user_name.clone()
        }
    }
}

/// Emulated radar scenario
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EmulatorConfig {
    /// Duration of one antenna rotation
    pub rotation_ms: u64,
    pub range_meters: u32,
    /// Own ship heading at start, degrees true
    pub heading: f64,
    /// Heading change per rotation, degrees
    pub turn_rate: f64,
    /// Target position at start, degrees true and meters
    pub target_bearing: f64,
    pub target_distance: f64,
    /// Target movement per rotation
    pub target_drift_bearing: f64,
    pub target_drift_distance: f64,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        EmulatorConfig {
            rotation_ms: 2_500,
            range_meters: 1852,
            heading: 0.0,
            turn_rate: 0.0,
            target_bearing: 30.0,
            target_distance: 1500.0,
            target_drift_bearing: 0.0,
            target_drift_distance: -10.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    pub engine: EngineConfig,
    pub radars: Vec<RadarConfig>,
    pub emulator: EmulatorConfig,
    /// Interval of the periodic engine tick
    pub tick_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            engine: EngineConfig::default(),
            radars: Vec::new(),
            emulator: EmulatorConfig::default(),
            tick_ms: 250,
        }
    }
}

impl ServerConfig {
    /// Read a configuration file
    pub fn from_file(path: &Path) -> anyhow::Result<ServerConfig> {
        let file = File::open(path)
            .with_context(|| format!("Cannot open config '{}'", path.display()))?;
        let config = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Config '{}' is not valid", path.display()))?;
        Ok(config)
    }

    /// Load the configuration.
    ///
    /// A file given explicitly must exist and parse. Otherwise the default
    /// location is tried and anything wrong with it only results in a
    /// warning and the default configuration.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<ServerConfig> {
        if let Some(path) = explicit {
            let config = Self::from_file(path)?;
            info!("Loaded config from '{}'", path.display());
            return Ok(config);
        }

        let Some(path) = default_config_path() else {
            warn!("No configuration directory on this platform; using defaults");
            return Ok(ServerConfig::default());
        };
        if !path.exists() {
            warn!("No config '{}' yet; using defaults", path.display());
            return Ok(ServerConfig::default());
        }
        match Self::from_file(&path) {
            Ok(config) => {
                info!("Loaded config from '{}'", path.display());
                Ok(config)
            }
            Err(e) => {
                warn!("{:#}; using defaults", e);
                Ok(ServerConfig::default())
            }
        }
    }

    /// Radars to attach, falling back to a single radar 0
    pub fn radars_or_default(&self) -> Vec<RadarConfig> {
        if self.radars.is_empty() {
            vec![RadarConfig::default()]
        } else {
            self.radars.clone()
        }
    }

    /// Attach one radar to the engine and install its settings
    pub fn apply_radar(
        engine: &RadarEngine,
        radar: &RadarConfig,
        now: u64,
    ) -> Result<(), ServerError> {
        if radar.guard_zones.len() > GUARD_ZONES {
            return Err(ServerError::Config(format!(
                "{} has {} guard zones, at most {} are supported",
                radar.name(),
                radar.guard_zones.len(),
                GUARD_ZONES
            )));
        }
        engine.attach(radar.id, radar.resolution)?;
        for (index, zone) in radar.guard_zones.iter().enumerate() {
            engine.set_guard_zone(radar.id, index, zone.clone())?;
        }
        engine.set_timed_idle(
            radar.id,
            TimedIdle::from_setting(radar.timed_idle, radar.idle_run_time),
            now,
        )?;
        if radar.transmit {
            engine.set_desired_state(radar.id, PowerState::Transmit)?;
        }
        info!("{}: attached as radar {}", radar.name(), radar.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radarwatch_core::{GuardZoneKind, ZoneAlarmState};
    use std::io::Write;

    #[test]
    fn test_load_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "engine": {{ "alarmThreshold": 150 }},
                "radars": [
                    {{
                        "id": 1,
                        "userName": "Mast",
                        "resolution": "fine",
                        "guardZones": [
                            {{ "kind": "circle", "innerRange": 0, "outerRange": 500, "threshold": 2 }}
                        ],
                        "timedIdle": 2
                    }}
                ]
            }}"#
        )
        .unwrap();

        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.engine.alarm_threshold, 150);
        assert_eq!(config.radars.len(), 1);
        let radar = &config.radars[0];
        assert_eq!(radar.name(), "Mast");
        assert_eq!(radar.resolution, Resolution::Fine);
        assert_eq!(radar.guard_zones[0].kind, GuardZoneKind::Circle);
        assert_eq!(radar.idle_run_time, 30);
        assert_eq!(config.emulator, EmulatorConfig::default());
    }

    #[test]
    fn test_explicit_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(ServerConfig::load(Some(&missing)).is_err());

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        let err = ServerConfig::load(Some(&broken)).unwrap_err();
        assert!(format!("{:#}", err).contains("is not valid"));
    }

    #[test]
    fn test_apply_radar() {
        let engine = RadarEngine::default();
        let radar = RadarConfig {
            id: 0,
            guard_zones: vec![GuardZone::new_circle(0.0, 500.0, 2)],
            transmit: true,
            ..Default::default()
        };
        ServerConfig::apply_radar(&engine, &radar, 0).unwrap();
        assert_eq!(
            engine.guard_zone_alarm_state(0, 0).unwrap(),
            ZoneAlarmState::Evaluating
        );
        assert_eq!(
            engine.runtime_state(0).unwrap().desired,
            Some(PowerState::Transmit)
        );
    }

    #[test]
    fn test_apply_radar_rejects_bad_zones() {
        let engine = RadarEngine::default();
        let too_many = RadarConfig {
            guard_zones: vec![GuardZone::default(); 3],
            ..Default::default()
        };
        assert!(matches!(
            ServerConfig::apply_radar(&engine, &too_many, 0),
            Err(ServerError::Config(_))
        ));

        let invalid = RadarConfig {
            id: 1,
            guard_zones: vec![GuardZone::new_circle(100.0, 50.0, 1)],
            ..Default::default()
        };
        assert!(matches!(
            ServerConfig::apply_radar(&engine, &invalid, 0),
            Err(ServerError::Engine(_))
        ));
    }
}
