//! Bearing arithmetic
//!
//! Radars report bearings in "raw" units: Navico BR24/3G/4G radars can emit up
//! to 4096 spokes per rotation but in practice send 2048. All bearings stored
//! by this crate are expressed in one canonical [`Resolution`] per buffer; the
//! helpers here convert between raw units and degrees and wrap values into a
//! single rotation.

use serde::{Deserialize, Serialize};

/// Finest raw resolution a radar can send
pub const SPOKES: u16 = 4096;
/// Resolution actually used by BR24/3G/4G radars
pub const LINES_PER_ROTATION: u16 = 2048;
/// Number of returns (range cells) per spoke
pub const RETURNS_PER_LINE: usize = 512;
pub const DEGREES_PER_ROTATION: f64 = 360.0;

/// A bearing in raw units, always in `[0, resolution)` once wrapped.
/// 0 is north (or bow for vessel-relative values), positive is clockwise.
pub type SpokeBearing = u16;

/// Angular resolution of a spoke stream or buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// 4096 raw units per rotation
    Fine,
    /// 2048 raw units per rotation
    Coarse,
}

impl Default for Resolution {
    fn default() -> Self {
        Resolution::Coarse
    }
}

impl Resolution {
    /// Number of raw units in one rotation
    pub const fn spokes(self) -> u16 {
        match self {
            Resolution::Fine => SPOKES,
            Resolution::Coarse => LINES_PER_ROTATION,
        }
    }

    /// Wrap any signed raw bearing into `[0, spokes)`.
    ///
    /// `mod_rotation(spokes)` is 0 and `mod_rotation(-1)` is `spokes - 1`.
    #[inline]
    pub fn mod_rotation(self, raw: i32) -> SpokeBearing {
        raw.rem_euclid(self.spokes() as i32) as SpokeBearing
    }

    /// Convert raw units to degrees in `[0, 360)` for wrapped input
    #[inline]
    pub fn raw_to_degrees(self, raw: i32) -> f64 {
        raw as f64 * DEGREES_PER_ROTATION / self.spokes() as f64
    }

    /// Convert degrees to raw units, truncating toward zero, then wrap
    #[inline]
    pub fn degrees_to_raw(self, degrees: f64) -> SpokeBearing {
        let raw = (mod_degrees(degrees) * self.spokes() as f64 / DEGREES_PER_ROTATION) as i32;
        self.mod_rotation(raw)
    }

    /// Re-express a raw bearing of resolution `from` in this resolution
    pub fn convert_from(self, from: Resolution, raw: i32) -> SpokeBearing {
        let wrapped = from.mod_rotation(raw) as i32;
        let scaled = wrapped * self.spokes() as i32 / from.spokes() as i32;
        self.mod_rotation(scaled)
    }

    /// True if `bearing` lies on the clockwise arc from `start` to `end`,
    /// both ends inclusive. An arc with `end < start` passes through 0.
    pub fn is_between(self, bearing: SpokeBearing, start: SpokeBearing, end: SpokeBearing) -> bool {
        if start <= end {
            bearing >= start && bearing <= end
        } else {
            bearing >= start || bearing <= end
        }
    }

    /// All bearings on the clockwise arc `start..=end`, wrapping through 0
    pub fn arc(self, start: SpokeBearing, end: SpokeBearing) -> impl Iterator<Item = SpokeBearing> {
        let spokes = self.spokes() as i32;
        let start = start as i32 % spokes;
        let len = (end as i32 - start).rem_euclid(spokes) + 1;
        (0..len).map(move |i| ((start + i) % spokes) as SpokeBearing)
    }
}

/// Wrap degrees into `[0, 360)`
#[inline]
pub fn mod_degrees(angle: f64) -> f64 {
    let a = angle.rem_euclid(DEGREES_PER_ROTATION);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if a >= DEGREES_PER_ROTATION {
        0.0
    } else {
        a
    }
}
