//! Spoke Buffer
//!
//! Maintains one slot per bearing of a radar rotation. Every slot keeps the
//! most recent return line received at that bearing together with a per-return
//! history register, so that renderers can draw short fading trails and guard
//! zones can filter out single-sweep noise.
//!
//! The buffer itself is a plain owned structure mutated through `&mut self`;
//! the engine places it behind a per-radar lock, so readers always copy whole
//! spokes and can never observe a half-written one.

use crate::angle::{Resolution, SpokeBearing, RETURNS_PER_LINE};

/// Returns per spoke plus the synthetic trailing element used when drawing
pub const SPOKE_DATA_LEN: usize = RETURNS_PER_LINE + 1;

/// `HAS_BIT_COUNT_2[h & 7]` is true when at least two of the three most recent
/// history bits are set
pub const HAS_BIT_COUNT_2: [bool; 8] = [false, false, false, true, false, true, true, true];

/// One angular sample of the radar picture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spoke {
    /// Bearing in the buffer's resolution
    pub bearing: SpokeBearing,
    /// Range of this spoke at capture time, in decimeters
    pub range_decimeters: u32,
    /// Return strength, index 0 at the radar, index 511 at maximum range.
    /// Element 512 duplicates element 511.
    pub intensity: [u8; SPOKE_DATA_LEN],
    /// Per return shift register, the most recent rotation in bit 0
    pub history: [u8; SPOKE_DATA_LEN],
    /// Time of the last write in milliseconds, `None` if never written since
    /// the last reset
    pub age: Option<u64>,
}

impl Spoke {
    pub fn empty(bearing: SpokeBearing) -> Self {
        Spoke {
            bearing,
            range_decimeters: 0,
            intensity: [0; SPOKE_DATA_LEN],
            history: [0; SPOKE_DATA_LEN],
            age: None,
        }
    }

    /// A spoke is usable when it was written no longer than `max_age_ms` ago
    pub fn is_fresh(&self, now: u64, max_age_ms: u64) -> bool {
        match self.age {
            Some(t) => now.saturating_sub(t) <= max_age_ms,
            None => false,
        }
    }

    /// Length in meters covered by one return of this spoke
    pub fn meters_per_return(&self) -> f64 {
        self.range_decimeters as f64 / 10.0 / RETURNS_PER_LINE as f64
    }

    /// Distance from the radar of return `index`, in meters
    pub fn distance(&self, index: usize) -> f64 {
        index as f64 * self.meters_per_return()
    }

    /// True when at least two of the last three rotations were strong at `index`
    pub fn has_multi_sweep_return(&self, index: usize) -> bool {
        HAS_BIT_COUNT_2[(self.history[index] & 7) as usize]
    }
}

/// Circular store of spokes for one radar
#[derive(Debug, Clone)]
pub struct SpokeBuffer {
    resolution: Resolution,
    alarm_threshold: u8,
    spokes: Vec<Spoke>,
    writes: u64,
}

impl SpokeBuffer {
    /// Create a buffer with one empty slot per bearing
    pub fn new(resolution: Resolution, alarm_threshold: u8) -> Self {
        let spokes = (0..resolution.spokes()).map(Spoke::empty).collect();
        SpokeBuffer {
            resolution,
            alarm_threshold,
            spokes,
            writes: 0,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn alarm_threshold(&self) -> u8 {
        self.alarm_threshold
    }

    /// Number of spokes written since creation or the last reset
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Zero every slot and invalidate all ages
    pub fn reset(&mut self) {
        for spoke in &mut self.spokes {
            let bearing = spoke.bearing;
            *spoke = Spoke::empty(bearing);
        }
        self.writes = 0;
    }

    /// Store a return line.
    ///
    /// The bearing is wrapped into the buffer's rotation, never rejected.
    /// `intensities` must hold exactly [`RETURNS_PER_LINE`] values; in release
    /// builds shorter input is zero padded and longer input truncated.
    ///
    /// Returns the wrapped bearing that was written.
    pub fn write_spoke(
        &mut self,
        bearing: i32,
        range_decimeters: u32,
        intensities: &[u8],
        now: u64,
    ) -> SpokeBearing {
        debug_assert_eq!(
            intensities.len(),
            RETURNS_PER_LINE,
            "spoke must carry exactly {} returns",
            RETURNS_PER_LINE
        );

        let bearing = self.resolution.mod_rotation(bearing);
        let threshold = self.alarm_threshold;
        let spoke = &mut self.spokes[bearing as usize];

        spoke.range_decimeters = range_decimeters;
        spoke.age = Some(now);
        for radius in 0..RETURNS_PER_LINE {
            let value = intensities.get(radius).copied().unwrap_or(0);
            spoke.intensity[radius] = value;
            spoke.history[radius] = (spoke.history[radius] << 1) | u8::from(value > threshold);
        }
        spoke.intensity[RETURNS_PER_LINE] = spoke.intensity[RETURNS_PER_LINE - 1];
        spoke.history[RETURNS_PER_LINE] = spoke.history[RETURNS_PER_LINE - 1];

        self.writes += 1;
        bearing
    }

    /// Borrow the slot at a (wrapped) bearing
    pub fn get(&self, bearing: i32) -> &Spoke {
        &self.spokes[self.resolution.mod_rotation(bearing) as usize]
    }

    /// Copy of the slot at a (wrapped) bearing
    pub fn snapshot(&self, bearing: i32) -> Spoke {
        self.get(bearing).clone()
    }

    /// Copies of the slots on the clockwise arc `start..=end`, wrapping through 0
    pub fn snapshot_range(&self, start: i32, end: i32) -> Vec<Spoke> {
        let start = self.resolution.mod_rotation(start);
        let end = self.resolution.mod_rotation(end);
        self.resolution
            .arc(start, end)
            .map(|b| self.spokes[b as usize].clone())
            .collect()
    }

    /// Iterate over all slots in bearing order
    pub fn iter(&self) -> impl Iterator<Item = &Spoke> {
        self.spokes.iter()
    }
}
