//! CHI-driven recommendation: Fix, Engage or Reward, with model-written points.
//!
//! Unlike tonality scoring there is no neutral fallback here: a completion that
//! fails or cannot be parsed is returned to the caller as an error.

use serde::Deserialize;

use crate::error::PipelineError;
use crate::provider::{extract_json_value, CompletionProvider};
use crate::types::{Recommendation, RecommendationAction};

/// Transcripts beyond this are not sent to the model.
const MAX_SAMPLE_TRANSCRIPTS: usize = 5;
const MAX_POINTS: usize = 5;

#[derive(Deserialize)]
struct PointsResponse {
    #[serde(default)]
    points: Vec<String>,
}

pub struct RecommendationEngine<'a> {
    provider: &'a dyn CompletionProvider,
}

impl<'a> RecommendationEngine<'a> {
    pub fn new(provider: &'a dyn CompletionProvider) -> Self {
        Self { provider }
    }

    /// Map a CHI percentage to an action and ask the model for justification points.
    pub async fn score_recommendation(
        &self,
        product: &str,
        chi_percentage: u8,
        sample_transcripts: &[String],
    ) -> Result<Recommendation, PipelineError> {
        let chi_percentage = chi_percentage.min(100);
        let action = RecommendationAction::for_percentage(chi_percentage);

        let prompt = build_points_prompt(product, chi_percentage, action, sample_transcripts);
        let schema = points_schema();
        let text = self.provider.complete(&prompt, Some(&schema)).await?;
        let points = parse_points(&text)?;

        log::info!(
            "Recommendation for {}: {:?} at {}% ({} points)",
            product,
            action,
            chi_percentage,
            points.len()
        );

        Ok(Recommendation {
            product: product.to_string(),
            chi_percentage,
            action,
            header: action.header().to_string(),
            color_tag: action.color_tag().to_string(),
            points,
        })
    }
}

fn build_points_prompt(
    product: &str,
    chi_percentage: u8,
    action: RecommendationAction,
    samples: &[String],
) -> String {
    let goal = match action {
        RecommendationAction::Fix => {
            "The product has critical problems. Justify escalating fixes to engineering."
        }
        RecommendationAction::Engage => {
            "Satisfaction is middling. Justify reaching out to customers for deeper feedback."
        }
        RecommendationAction::Reward => {
            "Customers are happy. Justify rewarding loyal customers with targeted promotions."
        }
    };

    let mut prompt = String::with_capacity(1024);
    prompt.push_str("You are a product manager reviewing customer happiness for a wireless carrier.\n");
    prompt.push_str(&format!(
        "Product: {}\nCustomer Happiness Index: {}%\nRecommended action: {:?}\n{}\n\n",
        product, chi_percentage, action, goal
    ));
    if !samples.is_empty() {
        prompt.push_str("Sample customer transcripts:\n");
        for (i, t) in samples.iter().take(MAX_SAMPLE_TRANSCRIPTS).enumerate() {
            prompt.push_str(&format!("{}. \"{}\"\n", i + 1, t.replace(['\n', '\r'], " ")));
        }
        prompt.push('\n');
    }
    prompt.push_str(
        "Respond with ONLY a JSON object of the form {\"points\": [...]} holding \
         three short justification points.",
    );
    prompt
}

fn points_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "points": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": ["points"]
    })
}

/// Parse `{"points": [...]}`. Missing, empty, or unparseable points are errors.
fn parse_points(text: &str) -> Result<Vec<String>, PipelineError> {
    let json = extract_json_value(text, '{').ok_or_else(|| {
        PipelineError::MalformedRecommendation("no JSON object in response".to_string())
    })?;
    let parsed: PointsResponse = serde_json::from_str(json)
        .map_err(|e| PipelineError::MalformedRecommendation(e.to_string()))?;

    let points: Vec<String> = parsed
        .points
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .take(MAX_POINTS)
        .collect();
    if points.is_empty() {
        return Err(PipelineError::MalformedRecommendation(
            "response contained no points".to_string(),
        ));
    }
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use crate::test_utils::ScriptedCompletion;

    fn points_reply() -> ScriptedCompletion {
        ScriptedCompletion::new(|_| {
            Ok(r#"{"points": ["Outages cluster in Dallas", "Churn risk rising", " "]}"#.to_string())
        })
    }

    #[tokio::test]
    async fn test_boundaries_map_to_actions() {
        let provider = points_reply();
        let engine = RecommendationEngine::new(&provider);
        let samples = vec!["my hotspot dies every hour".to_string()];

        for (pct, expected) in [
            (39, RecommendationAction::Fix),
            (40, RecommendationAction::Engage),
            (70, RecommendationAction::Engage),
            (71, RecommendationAction::Reward),
        ] {
            let rec = engine
                .score_recommendation("Mobile Hotspot", pct, &samples)
                .await
                .expect("recommendation");
            assert_eq!(rec.action, expected, "pct {}", pct);
        }
    }

    #[tokio::test]
    async fn test_fix_carries_tag_and_trimmed_points() {
        let provider = points_reply();
        let engine = RecommendationEngine::new(&provider);

        let rec = engine
            .score_recommendation("Mobile Hotspot", 25, &[])
            .await
            .expect("recommendation");

        assert_eq!(rec.header, "Critical Issues Detected");
        assert_eq!(rec.color_tag, "red");
        assert_eq!(rec.points, vec!["Outages cluster in Dallas", "Churn risk rising"]);
    }

    #[tokio::test]
    async fn test_malformed_response_is_hard_error() {
        let provider = ScriptedCompletion::new(|_| Ok("Sure! Here are some ideas.".to_string()));
        let engine = RecommendationEngine::new(&provider);

        let err = engine
            .score_recommendation("Magenta Max", 80, &[])
            .await
            .expect_err("malformed");
        assert!(matches!(err, PipelineError::MalformedRecommendation(_)));
    }

    #[tokio::test]
    async fn test_empty_points_is_hard_error() {
        let provider = ScriptedCompletion::new(|_| Ok(r#"{"points": []}"#.to_string()));
        let engine = RecommendationEngine::new(&provider);
        assert!(engine.score_recommendation("Magenta Max", 55, &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let provider = ScriptedCompletion::failing(ProviderError::Unauthorized("bad key".into()));
        let engine = RecommendationEngine::new(&provider);

        let err = engine
            .score_recommendation("Magenta Max", 55, &[])
            .await
            .expect_err("provider error");
        assert!(matches!(err, PipelineError::Provider(ProviderError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_prompt_caps_sample_transcripts() {
        let provider = points_reply();
        let engine = RecommendationEngine::new(&provider);
        let samples: Vec<String> = (0..9).map(|i| format!("sample {}", i)).collect();

        engine
            .score_recommendation("Business Unlimited", 90, &samples)
            .await
            .expect("recommendation");

        let prompt = &provider.prompts()[0];
        assert!(prompt.contains("sample 4"));
        assert!(!prompt.contains("sample 5"));
        assert!(prompt.contains("Reward"));
    }
}
