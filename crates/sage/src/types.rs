//! Shared record and result types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Implicit-feedback interaction between a user and a pin
///
/// `pin_id` is the product key as it appears in the catalog (`"17"`), or a
/// full pin node id (`"pin_17"`); both resolve to the same pin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: String,
    pub pin_id: String,
    pub rating: f32,
}

impl Interaction {
    pub fn new(user_id: impl Into<String>, pin_id: impl Into<String>, rating: f32) -> Self {
        Self {
            user_id: user_id.into(),
            pin_id: pin_id.into(),
            rating,
        }
    }
}

/// Ranking metric reported by the evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Precision: hits / k
    Accuracy,
    /// Recall: hits / |ground truth|
    HitRatio,
    /// Reciprocal rank of the first hit
    Mrr,
    /// Normalized discounted cumulative gain
    Ndcg,
}

impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Accuracy,
        Metric::HitRatio,
        Metric::Mrr,
        Metric::Ndcg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::HitRatio => "hit_ratio",
            Metric::Mrr => "mrr",
            Metric::Ndcg => "ndcg",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mean and population standard deviation of a metric across folds
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricSummary {
    pub mean: f64,
    pub std: f64,
}

impl MetricSummary {
    /// Summarize samples; an empty slice summarizes to zeros
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Self {
            mean,
            std: variance.sqrt(),
        }
    }
}
