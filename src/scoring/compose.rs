//! Happiness score composition (pure math).

use super::risk::RiskFlags;
use super::sentiment::{MAX_TONALITY, MIN_TONALITY};
use crate::types::ScoringConfig;

/// Multiplicative penalties applied to tonality. Both lie in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Penalties {
    pub outage: f64,
    pub crisis: f64,
}

impl Default for Penalties {
    fn default() -> Self {
        Self {
            outage: 0.8,
            crisis: 0.9,
        }
    }
}

impl From<&ScoringConfig> for Penalties {
    fn from(config: &ScoringConfig) -> Self {
        Self {
            outage: config.outage_penalty,
            crisis: config.crisis_penalty,
        }
    }
}

/// `clamp(tonality × outage? × crisis?, 1, 10)`.
///
/// Never exceeds `tonality` for any tonality already inside [1, 10].
pub fn happiness_score(tonality: f64, flags: RiskFlags, penalties: &Penalties) -> f64 {
    let mut score = tonality;
    if flags.network_outage {
        score *= penalties.outage;
    }
    if flags.national_crisis {
        score *= penalties.crisis;
    }
    score.clamp(MIN_TONALITY, MAX_TONALITY)
}
