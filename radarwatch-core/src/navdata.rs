//! Heading and magnetic variation fusion
//!
//! Several feeds compete to supply the own-ship heading: the radar itself
//! (gyro referenced), HDT and HDM sentences, and course over ground as a last
//! resort. Magnetic variation comes from the world magnetic model, from the
//! position fix or from an NMEA sentence. Every feed is stored separately with
//! its own timestamp; a read picks the highest priority reading that is still
//! fresh. Staleness is evaluated lazily at read time.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

use crate::angle::mod_degrees;
use crate::config::EngineConfig;

/// A kind of feed that can be fused
pub trait FusionSource: Copy + Eq + std::fmt::Debug + 'static {
    /// Marker for "no trustworthy source"
    const NONE: Self;
    /// Real sources, highest priority first
    const BY_PRIORITY: &'static [Self];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeadingSource {
    None,
    Hdm,
    Hdt,
    Cog,
    Radar,
}

impl FusionSource for HeadingSource {
    const NONE: Self = HeadingSource::None;
    const BY_PRIORITY: &'static [Self] = &[
        HeadingSource::Radar,
        HeadingSource::Hdt,
        HeadingSource::Hdm,
        HeadingSource::Cog,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariationSource {
    None,
    Nmea,
    Fix,
    Wmm,
}

impl FusionSource for VariationSource {
    const NONE: Self = VariationSource::None;
    const BY_PRIORITY: &'static [Self] = &[
        VariationSource::Wmm,
        VariationSource::Fix,
        VariationSource::Nmea,
    ];
}

/// The value a consumer should use, and where it came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimate<S> {
    /// Degrees. When `source` is NONE this is the last stored value and must
    /// not be trusted.
    pub value: f64,
    pub source: S,
    /// Time of the update that produced `value`, if any
    pub last_update: Option<u64>,
}

impl<S: FusionSource> Estimate<S> {
    pub fn is_trusted(&self) -> bool {
        self.source != S::NONE
    }
}

pub type HeadingEstimate = Estimate<HeadingSource>;
pub type VariationEstimate = Estimate<VariationSource>;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Reading<S> {
    source: S,
    value: f64,
    time: u64,
}

/// Priority and timeout based selection between sources
#[derive(Debug, Clone)]
pub struct SourceFusion<S> {
    readings: Vec<Reading<S>>,
    timeout_ms: u64,
}

impl<S: FusionSource> SourceFusion<S> {
    pub fn new(timeout_ms: u64) -> Self {
        SourceFusion {
            readings: Vec::with_capacity(S::BY_PRIORITY.len()),
            timeout_ms,
        }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout_ms
    }

    /// Store a reading. Updates for NONE are ignored.
    pub fn update(&mut self, source: S, value: f64, now: u64) {
        if source == S::NONE {
            return;
        }
        let reading = Reading {
            source,
            value,
            time: now,
        };
        match self.readings.iter_mut().find(|r| r.source == source) {
            Some(r) => *r = reading,
            None => self.readings.push(reading),
        }
    }

    /// Latest stored value of one source, fresh or not
    pub fn stored(&self, source: S) -> Option<f64> {
        self.reading(source).map(|r| r.value)
    }

    fn reading(&self, source: S) -> Option<&Reading<S>> {
        self.readings.iter().find(|r| r.source == source)
    }

    fn is_fresh(&self, reading: &Reading<S>, now: u64) -> bool {
        now.saturating_sub(reading.time) <= self.timeout_ms
    }

    /// Highest priority fresh reading, else the most recent stale value
    /// reported with source NONE
    pub fn current(&self, now: u64) -> Estimate<S> {
        let fresh = S::BY_PRIORITY
            .iter()
            .filter_map(|s| self.reading(*s))
            .find(|r| self.is_fresh(r, now));

        if let Some(r) = fresh {
            return Estimate {
                value: r.value,
                source: r.source,
                last_update: Some(r.time),
            };
        }

        match self.readings.iter().max_by_key(|r| r.time) {
            Some(r) => Estimate {
                value: r.value,
                source: S::NONE,
                last_update: Some(r.time),
            },
            None => Estimate {
                value: 0.0,
                source: S::NONE,
                last_update: None,
            },
        }
    }
}

/// Own-ship heading from RADAR > HDT > HDM > COG
#[derive(Debug, Clone)]
pub struct HeadingFusion {
    fusion: SourceFusion<HeadingSource>,
}

impl HeadingFusion {
    pub fn new(timeout_ms: u64) -> Self {
        HeadingFusion {
            fusion: SourceFusion::new(timeout_ms),
        }
    }

    /// Store a heading in degrees; HDM values are magnetic
    pub fn update(&mut self, source: HeadingSource, degrees: f64, now: u64) {
        self.fusion.update(source, mod_degrees(degrees), now);
    }

    /// True heading, applying `variation` to a magnetic (HDM) reading
    pub fn current(&self, now: u64, variation: f64) -> HeadingEstimate {
        let mut estimate = self.fusion.current(now);
        if estimate.source == HeadingSource::Hdm {
            estimate.value = mod_degrees(estimate.value + variation);
        }
        estimate
    }
}

/// Magnetic variation from WMM > FIX > NMEA
#[derive(Debug, Clone)]
pub struct VariationFusion {
    fusion: SourceFusion<VariationSource>,
}

impl VariationFusion {
    pub fn new(timeout_ms: u64) -> Self {
        VariationFusion {
            fusion: SourceFusion::new(timeout_ms),
        }
    }

    /// Store a variation in degrees (east positive).
    ///
    /// Some NMEA devices send zero when they have no model at all, so a zero
    /// from NMEA is treated as "not provided". Returns whether the value was
    /// stored.
    pub fn update(&mut self, source: VariationSource, degrees: f64, now: u64) -> bool {
        if source == VariationSource::Nmea && degrees == 0.0 {
            log::trace!("Ignoring zero variation from NMEA");
            return false;
        }
        self.fusion.update(source, degrees, now);
        true
    }

    pub fn current(&self, now: u64) -> VariationEstimate {
        self.fusion.current(now)
    }
}

/// Heading and variation together, as consumed by bearing calculations
#[derive(Debug, Clone)]
pub struct NavData {
    heading: HeadingFusion,
    variation: VariationFusion,
}

impl NavData {
    pub fn new(config: &EngineConfig) -> Self {
        NavData {
            heading: HeadingFusion::new(config.heading_timeout_ms),
            variation: VariationFusion::new(config.variation_timeout_ms),
        }
    }

    pub fn update_heading(&mut self, source: HeadingSource, degrees: f64, now: u64) {
        self.heading.update(source, degrees, now);
    }

    pub fn update_variation(&mut self, source: VariationSource, degrees: f64, now: u64) -> bool {
        self.variation.update(source, degrees, now)
    }

    pub fn current_variation(&self, now: u64) -> VariationEstimate {
        self.variation.current(now)
    }

    /// True heading; a magnetic heading is corrected with the current
    /// variation, or used as is when no variation is known
    pub fn current_heading(&self, now: u64) -> HeadingEstimate {
        let variation = self.variation.current(now);
        let v = if variation.is_trusted() {
            variation.value
        } else {
            0.0
        };
        self.heading.current(now, v)
    }
}

/// Thread-safe handle to the single [`NavData`] instance of an engine.
///
/// Updates may come from any radar (RADAR heading) and from the NMEA/position
/// collaborator concurrently.
#[derive(Debug, Clone)]
pub struct SharedNavData {
    inner: Arc<RwLock<NavData>>,
}

impl SharedNavData {
    pub fn new(config: &EngineConfig) -> Self {
        SharedNavData {
            inner: Arc::new(RwLock::new(NavData::new(config))),
        }
    }

    pub fn update_heading(&self, source: HeadingSource, degrees: f64, now: u64) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .update_heading(source, degrees, now);
    }

    pub fn update_variation(&self, source: VariationSource, degrees: f64, now: u64) -> bool {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .update_variation(source, degrees, now)
    }

    pub fn current_heading(&self, now: u64) -> HeadingEstimate {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current_heading(now)
    }

    pub fn current_variation(&self, now: u64) -> VariationEstimate {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current_variation(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nav() -> NavData {
        NavData::new(&EngineConfig::default())
    }

    #[test]
    fn test_hdt_beats_hdm() {
        let mut nav = nav();
        nav.update_heading(HeadingSource::Hdm, 100.0, 1000);
        nav.update_heading(HeadingSource::Hdt, 110.0, 1000);
        let h = nav.current_heading(1500);
        assert_eq!(h.source, HeadingSource::Hdt);
        assert_eq!(h.value, 110.0);
    }

    #[test]
    fn test_radar_beats_everything() {
        let mut nav = nav();
        nav.update_heading(HeadingSource::Radar, 12.0, 0);
        nav.update_heading(HeadingSource::Hdt, 20.0, 100);
        nav.update_heading(HeadingSource::Cog, 30.0, 200);
        assert_eq!(nav.current_heading(300).source, HeadingSource::Radar);
    }

    #[test]
    fn test_cog_only() {
        let mut nav = nav();
        nav.update_heading(HeadingSource::Cog, 245.0, 0);
        let h = nav.current_heading(10);
        assert_eq!(h.source, HeadingSource::Cog);
        assert_eq!(h.value, 245.0);
    }

    #[test]
    fn test_lower_priority_takes_over_when_higher_goes_stale() {
        let mut nav = nav();
        nav.update_heading(HeadingSource::Hdt, 50.0, 0);
        nav.update_heading(HeadingSource::Cog, 55.0, 4_000);
        assert_eq!(nav.current_heading(4_500).source, HeadingSource::Hdt);
        assert_eq!(nav.current_heading(6_000).source, HeadingSource::Cog);
    }

    #[test]
    fn test_heading_times_out() {
        let mut nav = nav();
        nav.update_heading(HeadingSource::Hdt, 77.0, 1_000);
        assert_eq!(nav.current_heading(6_000).source, HeadingSource::Hdt);

        let h = nav.current_heading(6_001);
        assert_eq!(h.source, HeadingSource::None);
        assert!(!h.is_trusted());
        assert_eq!(h.value, 77.0);
        assert_eq!(h.last_update, Some(1_000));
    }

    #[test]
    fn test_no_heading_at_all() {
        let h = nav().current_heading(0);
        assert_eq!(h.source, HeadingSource::None);
        assert_eq!(h.last_update, None);
    }

    #[test]
    fn test_hdm_corrected_with_variation() {
        let mut nav = nav();
        nav.update_variation(VariationSource::Fix, -3.0, 0);
        nav.update_heading(HeadingSource::Hdm, 1.0, 0);
        let h = nav.current_heading(100);
        assert_eq!(h.source, HeadingSource::Hdm);
        assert_eq!(h.value, 358.0);
    }

    #[test]
    fn test_nmea_zero_variation_ignored() {
        let mut nav = nav();
        assert!(nav.update_variation(VariationSource::Wmm, 5.0, 0));
        assert!(!nav.update_variation(VariationSource::Nmea, 0.0, 100));
        let v = nav.current_variation(200);
        assert_eq!(v.source, VariationSource::Wmm);
        assert_eq!(v.value, 5.0);
    }

    #[test]
    fn test_nmea_zero_does_not_overwrite_nmea() {
        let mut nav = nav();
        nav.update_variation(VariationSource::Nmea, 2.5, 0);
        nav.update_variation(VariationSource::Nmea, 0.0, 100);
        let v = nav.current_variation(200);
        assert_eq!(v.value, 2.5);
        assert_eq!(v.last_update, Some(0));
    }

    #[test]
    fn test_wmm_strictly_beats_fix() {
        let mut nav = nav();
        nav.update_variation(VariationSource::Fix, 4.0, 1000);
        nav.update_variation(VariationSource::Wmm, 4.5, 0);
        let v = nav.current_variation(1000);
        assert_eq!(v.source, VariationSource::Wmm);
        assert_eq!(v.value, 4.5);
    }

    #[test]
    fn test_shared_nav_data_across_threads() {
        let shared = SharedNavData::new(&EngineConfig::default());
        let writer = shared.clone();
        std::thread::spawn(move || {
            writer.update_heading(HeadingSource::Radar, 90.0, 10);
        })
        .join()
        .unwrap();
        assert_eq!(shared.current_heading(20).value, 90.0);
    }
}
