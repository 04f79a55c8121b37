//! Impact Scoring
//!
//! Maps vote counts on a statement to a bounded, confidence-weighted score.
//! The smoothing constants are fixed: half a vote of prior support over one
//! prior vote, and full confidence at ten votes.

use serde::{Deserialize, Serialize};

/// Votes at which confidence saturates
pub const CONFIDENCE_SATURATION_VOTES: f64 = 10.0;

/// Score derived from up/down vote counts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactScore {
    /// Smoothed approval proportion, strictly inside (0, 1)
    pub raw: f64,
    /// `raw` rescaled to (-1, 1)
    pub normalized: f64,
    /// `raw` as a percentage
    pub percentage: f64,
    /// Vote-count confidence in [0, 1]
    pub confidence: f64,
}

/// Score a statement from its vote counts.
///
/// `raw = (U + 0.5) / (U + D + 1)`, `normalized = (raw - 0.5) * 2`,
/// `percentage = raw * 100`, `confidence = min(1, (U + D) / 10)`.
pub fn score(upvotes: u32, downvotes: u32) -> ImpactScore {
    let up = f64::from(upvotes);
    let down = f64::from(downvotes);
    let total = up + down;

    let raw = (up + 0.5) / (total + 1.0);

    ImpactScore {
        raw,
        normalized: (raw - 0.5) * 2.0,
        percentage: raw * 100.0,
        confidence: (total / CONFIDENCE_SATURATION_VOTES).min(1.0),
    }
}
