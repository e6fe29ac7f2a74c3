//! Customer Happiness Index pipeline.
//!
//! Records flow through risk evaluation, batched tonality scoring, happiness
//! composition and time bucketing before being averaged per (product, period).

pub mod aggregate;
pub mod analysis;
pub mod buckets;
pub mod compose;
pub mod recommend;
pub mod risk;
pub mod sentiment;

pub use aggregate::{aggregate, ChiPipeline};
pub use analysis::{analyze_transcript, AnalysisReport, ResolutionStatus, TranscriptAnalysis};
pub use compose::{happiness_score, Penalties};
pub use recommend::RecommendationEngine;
pub use risk::{ContextualRiskEvaluator, OutageSignal, RiskFlags, SimulatedOutage, WeatherCache};
pub use sentiment::{ScoringStats, SentimentScorer, ToneCache};
