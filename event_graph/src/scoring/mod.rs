//! Scoring: how evaluation scores along a path combine into one number.

use serde::{Deserialize, Serialize};

/// Aggregation applied to the ancestor evaluation scores of a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreAggregation {
    /// Score of the deepest event only.
    #[default]
    Last,
    /// Arithmetic mean of the path.
    Mean,
    /// Worst score on the path.
    Min,
    /// Product of all scores.
    Product,
    /// Sum where each step back toward the root is weighted by another factor of `gamma`.
    Discounted { gamma: f64 },
}

impl ScoreAggregation {
    /// Combine root-to-leaf scores. An empty path scores 0.
    pub fn aggregate(&self, scores: &[f64]) -> f64 {
        if scores.is_empty() {
            return 0.0;
        }

        match self {
            ScoreAggregation::Last => scores[scores.len() - 1],
            ScoreAggregation::Mean => scores.iter().sum::<f64>() / scores.len() as f64,
            ScoreAggregation::Min => scores.iter().copied().fold(f64::INFINITY, f64::min),
            ScoreAggregation::Product => scores.iter().product(),
            ScoreAggregation::Discounted { gamma } => {
                let mut weight = 1.0;
                let mut total = 0.0;
                for score in scores.iter().rev() {
                    total += score * weight;
                    weight *= gamma;
                }
                total
            }
        }
    }
}
