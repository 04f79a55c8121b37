//! Recommendation Rule
//!
//! A proposal is acceptable as-is when the total positive category score is
//! at least ten times the magnitude of the total negative score. With no
//! negative score the rule holds vacuously.

use serde::{Deserialize, Serialize};

/// Required ratio of positive to negative score mass
pub const ASYMMETRY_FACTOR: f64 = 10.0;

/// Outcome of the acceptance rule over a set of category scores
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// Whether the proposal is acceptable as-is
    pub acceptable: bool,
    /// Sum of the positive scores (P)
    pub positive_total: f64,
    /// Absolute value of the sum of the negative scores (N)
    pub negative_total: f64,
}

impl Recommendation {
    /// Apply the rule to a collection of scores.
    pub fn from_scores<I>(scores: I) -> Self
    where
        I: IntoIterator<Item = f64>,
    {
        let mut positive_total = 0.0;
        let mut negative = 0.0;
        for s in scores {
            if s > 0.0 {
                positive_total += s;
            } else if s < 0.0 {
                negative += s;
            }
        }
        let negative_total = negative.abs();

        Self {
            acceptable: is_acceptable(positive_total, negative_total),
            positive_total,
            negative_total,
        }
    }
}

/// `P >= 10 * N`. `N = 0` always passes.
pub fn is_acceptable(positive_total: f64, negative_total: f64) -> bool {
    negative_total == 0.0 || positive_total >= ASYMMETRY_FACTOR * negative_total
}
