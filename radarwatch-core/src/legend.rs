//! Return classification for renderers
//!
//! Maps raw intensities and history registers onto the small set of blob
//! colours a display draws. Drawing itself happens outside this crate.

use serde::{Deserialize, Serialize};

use crate::config::DisplayThresholds;
use crate::spoke::{Spoke, SPOKE_DATA_LEN};

/// Colour class of one return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlobColor {
    None,
    /// Strong return `n` rotations ago but not now; 0 is the most recent
    History(u8),
    Blue,
    Green,
    Red,
}

impl Default for BlobColor {
    fn default() -> Self {
        BlobColor::None
    }
}

/// Number of distinct history shades a display can show
pub const BLOB_HISTORY_COLORS: u8 = 10;

/// Classify a single return
pub fn classify(value: u8, history: u8, thresholds: &DisplayThresholds) -> BlobColor {
    if value >= thresholds.red {
        BlobColor::Red
    } else if value >= thresholds.green {
        BlobColor::Green
    } else if value >= thresholds.blue {
        BlobColor::Blue
    } else if history != 0 {
        let age = (history.trailing_zeros() as u8).min(BLOB_HISTORY_COLORS - 1);
        BlobColor::History(age)
    } else {
        BlobColor::None
    }
}

/// Classify every return of a spoke, including the trailing element
pub fn classify_spoke(spoke: &Spoke, thresholds: &DisplayThresholds) -> Vec<BlobColor> {
    (0..SPOKE_DATA_LEN)
        .map(|i| classify(spoke.intensity[i], spoke.history[i], thresholds))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_strength() {
        let t = DisplayThresholds::default();
        assert_eq!(classify(255, 0, &t), BlobColor::Red);
        assert_eq!(classify(200, 0, &t), BlobColor::Red);
        assert_eq!(classify(150, 0, &t), BlobColor::Green);
        assert_eq!(classify(60, 0, &t), BlobColor::Blue);
        assert_eq!(classify(10, 0, &t), BlobColor::None);
    }

    #[test]
    fn test_classify_history_trail() {
        let t = DisplayThresholds::default();
        // Weak now, strong one and three rotations ago
        assert_eq!(classify(0, 0b1010, &t), BlobColor::History(1));
        assert_eq!(classify(0, 0b1000_0000, &t), BlobColor::History(7));
        // Current strength wins over history
        assert_eq!(classify(120, 0b1, &t), BlobColor::Green);
    }

    #[test]
    fn test_classify_spoke_length() {
        let spoke = Spoke::empty(0);
        let colors = classify_spoke(&spoke, &DisplayThresholds::default());
        assert_eq!(colors.len(), SPOKE_DATA_LEN);
        assert!(colors.iter().all(|c| *c == BlobColor::None));
    }
}
