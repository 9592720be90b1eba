//! End-to-end engine scenarios

use std::sync::Arc;
use std::thread;

use radarwatch_core::{
    BearingReference, GuardZone, HeadingSource, RadarEngine, Resolution, VariationSource,
    WriteOutcome, ZoneAlarmState, RETURNS_PER_LINE,
};

/// One strong return at `meters` on a spoke of `range_m` meters
fn line_with_target(range_m: f64, meters: f64) -> Vec<u8> {
    let mut line = vec![0u8; RETURNS_PER_LINE];
    let index = (meters / range_m * RETURNS_PER_LINE as f64) as usize;
    line[index] = 255;
    line
}

fn degrees(d: f64) -> i32 {
    Resolution::Coarse.degrees_to_raw(d) as i32
}

#[test]
fn test_arc_zone_raises_pending_alarm() {
    let engine = RadarEngine::default();
    let radar = engine.attach(0, Resolution::Coarse).unwrap();
    engine
        .set_guard_zone(0, 0, GuardZone::new_arc(0.0, 90.0, 0.0, 1000.0, 3))
        .unwrap();
    engine.update_heading(HeadingSource::Radar, 0.0, 1_000);

    let line = line_with_target(1852.0, 500.0);
    for (i, bearing) in [10.0, 45.0, 80.0].into_iter().enumerate() {
        let outcome = engine
            .write_spoke(0, radar.generation, degrees(bearing), 18_520, &line, 1_000 + i as u64)
            .unwrap();
        assert!(matches!(outcome, WriteOutcome::Written { .. }));
    }

    let transitions = engine.evaluate_guard_zones(0, 1_100).unwrap();
    assert_eq!(transitions.len(), 1);
    assert_eq!(
        engine.guard_zone_alarm_state(0, 0).unwrap(),
        ZoneAlarmState::AlarmPending
    );
    assert_eq!(
        engine.guard_zone_alarm_state(0, 1).unwrap(),
        ZoneAlarmState::Inactive
    );
}

#[test]
fn test_stale_heading_freezes_vessel_zone() {
    let engine = RadarEngine::default();
    let radar = engine.attach(0, Resolution::Coarse).unwrap();
    engine
        .set_guard_zone(0, 0, GuardZone::new_arc(0.0, 90.0, 0.0, 1000.0, 1))
        .unwrap();
    engine.update_heading(HeadingSource::Hdt, 0.0, 0);

    let line = line_with_target(1852.0, 500.0);
    engine
        .write_spoke(0, radar.generation, degrees(45.0), 18_520, &line, 5_500)
        .unwrap();

    // Heading 5.5 s old: no evaluation
    assert!(engine.evaluate_guard_zones(0, 5_500).unwrap().is_empty());
    assert_eq!(engine.current_heading(5_500).source, HeadingSource::None);
    assert_eq!(
        engine.guard_zone_alarm_state(0, 0).unwrap(),
        ZoneAlarmState::Evaluating
    );

    engine.update_heading(HeadingSource::Cog, 0.0, 5_600);
    engine.evaluate_guard_zones(0, 5_600).unwrap();
    assert_eq!(
        engine.guard_zone_alarm_state(0, 0).unwrap(),
        ZoneAlarmState::AlarmPending
    );
}

#[test]
fn test_magnetic_heading_uses_variation() {
    let engine = RadarEngine::default();
    let radar = engine.attach(0, Resolution::Coarse).unwrap();
    // Dead ahead only
    engine
        .set_guard_zone(0, 0, GuardZone::new_arc(355.0, 5.0, 0.0, 1000.0, 1))
        .unwrap();

    engine.update_variation(VariationSource::Wmm, 10.0, 0);
    engine.update_heading(HeadingSource::Hdm, 80.0, 0);
    assert_eq!(engine.current_heading(0).value, 90.0);

    let line = line_with_target(1852.0, 500.0);
    engine
        .write_spoke(0, radar.generation, degrees(90.0), 18_520, &line, 0)
        .unwrap();
    engine.evaluate_guard_zones(0, 0).unwrap();
    assert_eq!(
        engine.guard_zone_alarm_state(0, 0).unwrap(),
        ZoneAlarmState::AlarmPending
    );
}

#[test]
fn test_confirm_and_reraise() {
    let engine = RadarEngine::default();
    let radar = engine.attach(0, Resolution::Coarse).unwrap();
    let zone = GuardZone::new_circle(0.0, 1000.0, 1).with_reference(BearingReference::North);
    engine.set_guard_zone(0, 1, zone).unwrap();

    let target = line_with_target(1852.0, 500.0);
    let empty = vec![0u8; RETURNS_PER_LINE];
    let config = engine.config().clone();

    engine
        .write_spoke(0, radar.generation, 0, 18_520, &target, 0)
        .unwrap();
    engine.evaluate_guard_zones(0, 0).unwrap();
    let t = config.confirm_window_ms;
    engine
        .write_spoke(0, radar.generation, 0, 18_520, &target, t)
        .unwrap();
    engine.evaluate_guard_zones(0, t).unwrap();
    assert_eq!(
        engine.guard_zone_alarm_state(0, 1).unwrap(),
        ZoneAlarmState::AlarmConfirmed
    );

    assert_eq!(engine.confirm_guard_zone_bogeys(), 1);
    assert_eq!(engine.guard_zone(0, 1).unwrap().outer_range, 1000.0);
    engine
        .write_spoke(0, radar.generation, 0, 18_520, &target, t + 100)
        .unwrap();
    engine.evaluate_guard_zones(0, t + 100).unwrap();
    // Bogeys stay visible, the alarm stays quiet
    assert_eq!(
        engine.guard_zone_alarm_state(0, 1).unwrap(),
        ZoneAlarmState::AlarmConfirmed
    );
    assert!(!engine.alarm_sound_due(t + 100));
    assert_eq!(engine.confirm_guard_zone_bogeys(), 0);

    engine
        .write_spoke(0, radar.generation, 0, 18_520, &empty, t + 200)
        .unwrap();
    engine.evaluate_guard_zones(0, t + 200).unwrap();
    assert_eq!(
        engine.guard_zone_alarm_state(0, 1).unwrap(),
        ZoneAlarmState::Evaluating
    );
    engine
        .write_spoke(0, radar.generation, 0, 18_520, &target, t + 300)
        .unwrap();
    engine.evaluate_guard_zones(0, t + 300).unwrap();
    assert_eq!(
        engine.guard_zone_alarm_state(0, 1).unwrap(),
        ZoneAlarmState::AlarmPending
    );
}

#[test]
fn test_concurrent_writers_and_readers() {
    let engine = Arc::new(RadarEngine::default());
    let radar = engine.attach(0, Resolution::Coarse).unwrap();

    let writer = {
        let engine = engine.clone();
        thread::spawn(move || {
            for round in 0..4u8 {
                let line = vec![round * 50 + 1; RETURNS_PER_LINE];
                for bearing in 0..2048 {
                    engine
                        .write_spoke(0, radar.generation, bearing, 18_520, &line, 0)
                        .unwrap();
                }
            }
        })
    };

    let reader = {
        let engine = engine.clone();
        thread::spawn(move || {
            for bearing in (0..2048).cycle().take(20_000) {
                let spoke = engine.snapshot(0, bearing).unwrap();
                // A spoke is never observed half written
                let first = spoke.intensity[0];
                assert!(spoke.intensity.iter().all(|v| *v == first));
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(engine.snapshot(0, 2047).unwrap().intensity[0], 151);
}

#[test]
fn test_detach_during_receive() {
    let engine = Arc::new(RadarEngine::default());
    let radar = engine.attach(1, Resolution::Fine).unwrap();
    let line = vec![255u8; RETURNS_PER_LINE];

    engine
        .write_spoke(1, radar.generation, 100, 18_520, &line, 0)
        .unwrap();
    engine.detach(1).unwrap();

    let outcome = engine
        .write_spoke(1, radar.generation, 102, 18_520, &line, 1)
        .unwrap();
    assert_eq!(outcome, WriteOutcome::Discarded);
    assert!(engine
        .snapshot_range(1, 0, 2047)
        .unwrap()
        .iter()
        .all(|s| s.age.is_none()));
    assert!(!engine.is_active(1).unwrap());
}
