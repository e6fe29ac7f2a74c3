//! Structured analysis of a single transcript.
//!
//! Backs `chi analyze`; the CHI aggregate never calls it. Failures never
//! surface: the caller always gets an analysis, possibly the fallback one.

use serde::{Deserialize, Serialize};

use super::sentiment::{MAX_TONALITY, MIN_TONALITY};
use crate::provider::{extract_json_value, CompletionProvider};

const MAX_KEY_TOPICS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Resolved,
    Unresolved,
    Unclear,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptAnalysis {
    /// Sentiment in [-1, 1].
    pub sentiment_score: f64,
    pub sentiment_summary: String,
    pub location: Option<String>,
    pub resolution_status: ResolutionStatus,
    pub key_topics: Vec<String>,
}

impl TranscriptAnalysis {
    pub fn fallback(reason: &str) -> Self {
        Self {
            sentiment_score: 0.0,
            sentiment_summary: format!("Analysis unavailable: {}", reason),
            location: None,
            resolution_status: ResolutionStatus::Unclear,
            key_topics: vec!["error".to_string(), "api_failure".to_string()],
        }
    }

    /// Sentiment projected linearly onto the [1, 10] tonality scale.
    pub fn tonality(&self) -> f64 {
        let s = self.sentiment_score.clamp(-1.0, 1.0);
        (MIN_TONALITY + (s + 1.0) * 4.5).clamp(MIN_TONALITY, MAX_TONALITY)
    }
}

/// An analysis plus its tonality, as printed by the CLI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    #[serde(flatten)]
    pub analysis: TranscriptAnalysis,
    pub tonality: f64,
}

impl From<TranscriptAnalysis> for AnalysisReport {
    fn from(analysis: TranscriptAnalysis) -> Self {
        let tonality = analysis.tonality();
        Self { analysis, tonality }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    sentiment_score: f64,
    #[serde(default)]
    sentiment_summary: String,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    resolution_status: Option<String>,
    #[serde(default)]
    key_topics: Vec<String>,
}

/// Analyze one transcript. Any provider or parse failure yields the fallback.
pub async fn analyze_transcript(
    provider: &dyn CompletionProvider,
    transcript: &str,
) -> TranscriptAnalysis {
    let prompt = build_analysis_prompt(transcript);
    let schema = analysis_schema();
    let text = match provider.complete(&prompt, Some(&schema)).await {
        Ok(text) => text,
        Err(e) => {
            log::warn!("Transcript analysis failed: {}", e);
            return TranscriptAnalysis::fallback(&e.to_string());
        }
    };
    match parse_analysis(&text) {
        Ok(analysis) => analysis,
        Err(reason) => {
            log::warn!("Transcript analysis unparseable: {}", reason);
            TranscriptAnalysis::fallback(&reason)
        }
    }
}

fn build_analysis_prompt(transcript: &str) -> String {
    format!(
        "Analyze this customer service transcript for a wireless carrier.\n\n\
         Transcript:\n\"{}\"\n\n\
         Return a JSON object with:\n\
         - sentimentScore: number from -1 (very negative) to 1 (very positive)\n\
         - sentimentSummary: one sentence describing the customer's mood\n\
         - location: the customer's \"City, ST\" if mentioned, otherwise null\n\
         - resolutionStatus: one of resolved, unresolved, unclear\n\
         - keyTopics: up to three short topic labels",
        transcript
    )
}

fn analysis_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "sentimentScore": { "type": "NUMBER" },
            "sentimentSummary": { "type": "STRING" },
            "location": { "type": "STRING", "nullable": true },
            "resolutionStatus": {
                "type": "STRING",
                "enum": ["resolved", "unresolved", "unclear"]
            },
            "keyTopics": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": ["sentimentScore", "sentimentSummary", "resolutionStatus", "keyTopics"]
    })
}

fn parse_analysis(text: &str) -> Result<TranscriptAnalysis, String> {
    let json = extract_json_value(text, '{').ok_or_else(|| "no JSON object".to_string())?;
    let raw: RawAnalysis = serde_json::from_str(json).map_err(|e| e.to_string())?;
    if !raw.sentiment_score.is_finite() {
        return Err("sentimentScore is not finite".to_string());
    }

    let location = raw
        .location
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("null"));
    let resolution_status = match raw
        .resolution_status
        .as_deref()
        .map(|s| s.trim().to_ascii_lowercase())
        .as_deref()
    {
        Some("resolved") => ResolutionStatus::Resolved,
        Some("unresolved") => ResolutionStatus::Unresolved,
        _ => ResolutionStatus::Unclear,
    };
    let key_topics = raw
        .key_topics
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .take(MAX_KEY_TOPICS)
        .collect();

    Ok(TranscriptAnalysis {
        sentiment_score: raw.sentiment_score.clamp(-1.0, 1.0),
        sentiment_summary: raw.sentiment_summary.trim().to_string(),
        location,
        resolution_status,
        key_topics,
    })
}
