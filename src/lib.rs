//! Customer Happiness Index engine.
//!
//! Feedback transcripts are scored for tonality, adjusted for operational and
//! environmental risk, bucketed in time, and averaged into a per-product CHI
//! that drives Fix / Engage / Reward recommendations and follow-up actions.

pub mod error;
pub mod memo;
pub mod outreach;
pub mod provider;
pub mod scoring;
pub mod source;
pub mod state;
pub mod types;
pub mod weather;

#[cfg(test)]
pub mod test_utils;

pub use error::{ErrorPayload, PipelineError};
pub use state::ChiService;
pub use types::{ChiRow, Config, FeedbackRecord, Recommendation, RecommendationAction, TimePeriod};
