use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

// =============================================================================
// Records
// =============================================================================

/// One customer interaction as loaded from a record source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub transcript: String,
    pub product_name: String,
    /// Free-form "City, ST", empty when unknown.
    #[serde(default)]
    pub location: String,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(
        transcript: impl Into<String>,
        product_name: impl Into<String>,
        location: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            transcript: transcript.into(),
            product_name: product_name.into(),
            location: location.into(),
            timestamp,
        }
    }
}

/// Equal-population timestamp bucket, Q1 earliest through Q4 latest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimePeriod {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl TimePeriod {
    pub const ALL: [TimePeriod; 4] = [TimePeriod::Q1, TimePeriod::Q2, TimePeriod::Q3, TimePeriod::Q4];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimePeriod::Q1 => "Q1",
            TimePeriod::Q2 => "Q2",
            TimePeriod::Q3 => "Q3",
            TimePeriod::Q4 => "Q4",
        }
    }
}

impl std::fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record with every derived field attached by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub record: FeedbackRecord,
    pub tonality_score: f64,
    pub network_outage: bool,
    pub national_crisis: bool,
    pub happiness_score: f64,
    pub time_period: TimePeriod,
}

/// Aggregate output: mean happiness for one (product, period) group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChiRow {
    pub product_name: String,
    pub time_period: TimePeriod,
    #[serde(rename = "ConsumerHappinessIndex")]
    pub consumer_happiness_index: f64,
}

impl ChiRow {
    /// CHI on the 0–100 percentage scale used by recommendations.
    pub fn percentage(&self) -> u8 {
        chi_percentage(self.consumer_happiness_index)
    }
}

/// Canonical CHI → percentage conversion: `round(chi / 10 * 100)`, clamped to 0–100.
pub fn chi_percentage(chi: f64) -> u8 {
    ((chi / 10.0) * 100.0).round().clamp(0.0, 100.0) as u8
}

// =============================================================================
// Recommendations
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationAction {
    Fix,
    Engage,
    Reward,
}

impl RecommendationAction {
    /// Map a 0–100 CHI percentage to an action. 40 and 70 are both Engage.
    pub fn for_percentage(percentage: u8) -> Self {
        if percentage < 40 {
            RecommendationAction::Fix
        } else if percentage <= 70 {
            RecommendationAction::Engage
        } else {
            RecommendationAction::Reward
        }
    }

    pub fn header(&self) -> &'static str {
        match self {
            RecommendationAction::Fix => "Critical Issues Detected",
            RecommendationAction::Engage => "Gather Deeper Insights",
            RecommendationAction::Reward => "High Customer Satisfaction",
        }
    }

    pub fn color_tag(&self) -> &'static str {
        match self {
            RecommendationAction::Fix => "red",
            RecommendationAction::Engage => "purple",
            RecommendationAction::Reward => "green",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub product: String,
    pub chi_percentage: u8,
    pub action: RecommendationAction,
    pub header: String,
    pub color_tag: String,
    pub points: Vec<String>,
}

// =============================================================================
// Configuration
// =============================================================================

/// Top-level configuration stored in ~/.chi/config.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub outage: OutageConfig,
    #[serde(default = "default_memo_ttl_secs")]
    pub memo_ttl_secs: u64,
    #[serde(default)]
    pub conversation: ConversationConfig,
}

fn default_memo_ttl_secs() -> u64 {
    3600
}

impl Default for Config {
    fn default() -> Self {
        Self {
            completion: CompletionConfig::default(),
            weather: WeatherConfig::default(),
            scoring: ScoringConfig::default(),
            outage: OutageConfig::default(),
            memo_ttl_secs: default_memo_ttl_secs(),
            conversation: ConversationConfig::default(),
        }
    }
}

impl Config {
    /// Reject values that would break score bounds or sampling.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let s = &self.scoring;
        if s.batch_size == 0 {
            return Err(PipelineError::Configuration(
                "scoring.batchSize must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("scoring.outagePenalty", s.outage_penalty),
            ("scoring.crisisPenalty", s.crisis_penalty),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(PipelineError::Configuration(format!(
                    "{} must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        if !(1.0..=10.0).contains(&s.fallback_score) {
            return Err(PipelineError::Configuration(format!(
                "scoring.fallbackScore must be in [1, 10], got {}",
                s.fallback_score
            )));
        }
        let o = &self.outage;
        for (name, value) in [
            ("outage.earlyProbability", o.early_probability),
            ("outage.lateProbability", o.late_probability),
            ("outage.baselineProbability", o.baseline_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::Configuration(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Text-completion (Gemini) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_completion_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_completion_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_completion_timeout_secs() -> u64 {
    30
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_completion_model(),
            base_url: default_completion_base_url(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

/// Weather lookup settings and disaster thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_weather_base_url")]
    pub base_url: String,
    #[serde(default = "default_weather_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub thresholds: DisasterThresholds,
}

fn default_true() -> bool {
    true
}

fn default_weather_base_url() -> String {
    "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline"
        .to_string()
}

fn default_weather_timeout_secs() -> u64 {
    15
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: default_weather_base_url(),
            timeout_secs: default_weather_timeout_secs(),
            thresholds: DisasterThresholds::default(),
        }
    }
}

/// A day counts as a disaster when any aggregate strictly exceeds its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisasterThresholds {
    #[serde(default = "default_max_wind_mph")]
    pub max_wind_mph: f64,
    #[serde(default = "default_precip_inches")]
    pub precip_inches: f64,
    #[serde(default = "default_snow_inches")]
    pub snow_inches: f64,
}

fn default_max_wind_mph() -> f64 {
    74.0
}

fn default_precip_inches() -> f64 {
    4.0
}

fn default_snow_inches() -> f64 {
    24.0
}

impl Default for DisasterThresholds {
    fn default() -> Self {
        Self {
            max_wind_mph: default_max_wind_mph(),
            precip_inches: default_precip_inches(),
            snow_inches: default_snow_inches(),
        }
    }
}

/// Sentiment batching and happiness composition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoringConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between scoring batches; keeps us under the provider's per-minute cap.
    #[serde(default = "default_inter_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,
    #[serde(default = "default_fallback_score")]
    pub fallback_score: f64,
    #[serde(default = "default_outage_penalty")]
    pub outage_penalty: f64,
    #[serde(default = "default_crisis_penalty")]
    pub crisis_penalty: f64,
}

fn default_batch_size() -> usize {
    10
}

fn default_inter_batch_delay_ms() -> u64 {
    6100
}

fn default_fallback_score() -> f64 {
    5.0
}

fn default_outage_penalty() -> f64 {
    0.8
}

fn default_crisis_penalty() -> f64 {
    0.9
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            inter_batch_delay_ms: default_inter_batch_delay_ms(),
            fallback_score: default_fallback_score(),
            outage_penalty: default_outage_penalty(),
            crisis_penalty: default_crisis_penalty(),
        }
    }
}

/// Simulated network-outage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutageConfig {
    #[serde(default = "default_high_risk_product")]
    pub high_risk_product: String,
    #[serde(default = "default_early_probability")]
    pub early_probability: f64,
    #[serde(default = "default_late_probability")]
    pub late_probability: f64,
    #[serde(default = "default_baseline_probability")]
    pub baseline_probability: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_high_risk_product() -> String {
    "Mobile Hotspot".to_string()
}

fn default_early_probability() -> f64 {
    0.60
}

fn default_late_probability() -> f64 {
    0.85
}

fn default_baseline_probability() -> f64 {
    0.05
}

impl Default for OutageConfig {
    fn default() -> Self {
        Self {
            high_risk_product: default_high_risk_product(),
            early_probability: default_early_probability(),
            late_probability: default_late_probability(),
            baseline_probability: default_baseline_probability(),
            seed: None,
        }
    }
}

/// Conversation-simulation (follow-up call) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default = "default_conversation_base_url")]
    pub base_url: String,
    #[serde(default = "default_turns_limit")]
    pub turns_limit: u32,
    #[serde(default = "default_conversation_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_conversation_base_url() -> String {
    "https://api.elevenlabs.io/v1".to_string()
}

fn default_turns_limit() -> u32 {
    8
}

fn default_conversation_timeout_secs() -> u64 {
    60
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            agent_id: None,
            base_url: default_conversation_base_url(),
            turns_limit: default_turns_limit(),
            timeout_secs: default_conversation_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recommendation_boundaries() {
        assert_eq!(RecommendationAction::for_percentage(39), RecommendationAction::Fix);
        assert_eq!(RecommendationAction::for_percentage(40), RecommendationAction::Engage);
        assert_eq!(RecommendationAction::for_percentage(70), RecommendationAction::Engage);
        assert_eq!(RecommendationAction::for_percentage(71), RecommendationAction::Reward);
        assert_eq!(RecommendationAction::for_percentage(0), RecommendationAction::Fix);
        assert_eq!(RecommendationAction::for_percentage(100), RecommendationAction::Reward);
    }

    #[test]
    fn test_chi_percentage() {
        assert_eq!(chi_percentage(7.0), 70);
        assert_eq!(chi_percentage(7.06), 71);
        assert_eq!(chi_percentage(3.94), 39);
        assert_eq!(chi_percentage(10.0), 100);
    }

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: Config = serde_json::from_str("{}").expect("parse");
        assert_eq!(config.scoring.batch_size, 10);
        assert_eq!(config.scoring.inter_batch_delay_ms, 6100);
        assert!((config.scoring.outage_penalty - 0.8).abs() < f64::EPSILON);
        assert!((config.scoring.crisis_penalty - 0.9).abs() < f64::EPSILON);
        assert!((config.weather.thresholds.max_wind_mph - 74.0).abs() < f64::EPSILON);
        assert_eq!(config.outage.high_risk_product, "Mobile Hotspot");
        assert_eq!(config.memo_ttl_secs, 3600);
        assert!(config.weather.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_partial_override() {
        let config: Config = serde_json::from_str(
            r#"{"scoring": {"outagePenalty": 0.5}, "weather": {"thresholds": {"snowInches": 12}}}"#,
        )
        .expect("parse");
        assert!((config.scoring.outage_penalty - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.scoring.batch_size, 10);
        assert!((config.weather.thresholds.snow_inches - 12.0).abs() < f64::EPSILON);
        assert!((config.weather.thresholds.precip_inches - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.scoring.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scoring.crisis_penalty = 1.2;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.outage.late_probability = -0.1;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.scoring.fallback_score = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_chi_row_serializes_index_name() {
        let row = ChiRow {
            product_name: "Magenta Max".to_string(),
            time_period: TimePeriod::Q2,
            consumer_happiness_index: 6.25,
        };
        let json = serde_json::to_value(&row).expect("serialize");
        assert_eq!(json["time_period"], "Q2");
        assert_eq!(json["ConsumerHappinessIndex"], 6.25);
    }
}
