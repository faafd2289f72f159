// src/extract/confidence.rs
//! Mention confidence.
//!
//! confidence = round2(w_sentiment * |compound| + w_engagement * min(1, ln(|score| + 1) / divisor))
//!
//! With the default weights (0.7 / 0.3, divisor 10) engagement saturates around
//! e^10 ~ 22k upvotes. Weights are sanitized in config so the sum never exceeds 1.

use crate::config::ConfidenceConfig;

/// Inputs to the confidence model. Built through `new` so the compound is always in [-1,1].
#[derive(Clone, Copy, Debug, Default)]
pub struct ScoreInputs {
    pub sentiment_compound: f64,
    pub engagement: i64,
}

impl ScoreInputs {
    pub fn new(sentiment_compound: f64, engagement: i64) -> Self {
        let c = if sentiment_compound.is_nan() {
            0.0
        } else {
            sentiment_compound.clamp(-1.0, 1.0)
        };
        Self {
            sentiment_compound: c,
            engagement,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ConfidenceScorer {
    cfg: ConfidenceConfig,
}

impl ConfidenceScorer {
    pub fn new(cfg: ConfidenceConfig) -> Self {
        Self { cfg }
    }

    /// Log-scaled engagement in [0,1].
    pub fn engagement_factor(&self, engagement: i64) -> f64 {
        let abs = engagement.unsigned_abs() as f64;
        ((abs + 1.0).ln() / self.cfg.engagement_log_divisor).min(1.0)
    }

    pub fn score(&self, inputs: &ScoreInputs) -> f64 {
        let raw = self.cfg.sentiment_weight * inputs.sentiment_compound.abs()
            + self.cfg.engagement_weight * self.engagement_factor(inputs.engagement);
        round2(raw.clamp(0.0, 1.0))
    }
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
