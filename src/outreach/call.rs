//! Simulated follow-up calls.
//!
//! A customer persona built from their original feedback is handed to a
//! conversation-simulation agent; the returned turns and call analysis are
//! normalized into a [`CallOutcome`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::OutreachError;
use crate::types::ConversationConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    pub customer_name: String,
    pub customer_phone: String,
    pub transcript: String,
    #[serde(default)]
    pub product: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationTurn {
    pub role: String,
    pub message: String,
    pub time_in_call_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallOutcome {
    pub conversation: Vec<ConversationTurn>,
    /// Raw analysis object from the simulation service.
    pub analysis: serde_json::Value,
    pub call_successful: String,
    pub transcript_summary: String,
}

#[async_trait]
pub trait ConversationSimulator: Send + Sync {
    /// Run a simulated conversation, returning the service's raw JSON response.
    async fn simulate(
        &self,
        persona_prompt: &str,
        turns_limit: u32,
    ) -> Result<serde_json::Value, OutreachError>;
}

// =============================================================================
// ElevenLabs client
// =============================================================================

pub struct ElevenLabsSimulator {
    client: reqwest::Client,
    api_key: String,
    agent_id: String,
    base_url: String,
    timeout_secs: u64,
}

impl ElevenLabsSimulator {
    pub fn new(config: &ConversationConfig) -> Result<Self, OutreachError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(OutreachError::MissingCredential("conversation.apiKey"))?;
        let agent_id = config
            .agent_id
            .clone()
            .filter(|a| !a.trim().is_empty())
            .ok_or(OutreachError::MissingCredential("conversation.agentId"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OutreachError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            agent_id,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/convai/agents/{}/simulate-conversation",
            self.base_url, self.agent_id
        )
    }
}

fn build_simulation_body(persona_prompt: &str, turns_limit: u32) -> serde_json::Value {
    serde_json::json!({
        "simulation_specification": {
            "simulated_user_config": {
                "prompt": { "prompt": persona_prompt }
            }
        },
        "new_turns_limit": turns_limit,
    })
}

#[async_trait]
impl ConversationSimulator for ElevenLabsSimulator {
    async fn simulate(
        &self,
        persona_prompt: &str,
        turns_limit: u32,
    ) -> Result<serde_json::Value, OutreachError> {
        let resp = self
            .client
            .post(self.endpoint())
            .header("xi-api-key", &self.api_key)
            .json(&build_simulation_body(persona_prompt, turns_limit))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OutreachError::Timeout(self.timeout_secs)
                } else {
                    OutreachError::Network(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(OutreachError::Http {
                status: status.as_u16(),
                body,
            });
        }

        resp.json()
            .await
            .map_err(|e| OutreachError::Parse(e.to_string()))
    }
}

// =============================================================================
// Call flow
// =============================================================================

/// Persona the simulated customer plays during the follow-up.
pub fn build_persona_prompt(request: &CallRequest) -> String {
    let product_line = request
        .product
        .as_deref()
        .map(|p| format!(" about {}", p))
        .unwrap_or_default();
    format!(
        "You are {name}, a wireless customer who previously left feedback{product}: \"{feedback}\"\n\n\
         You are receiving a follow-up call to discuss your feedback in more detail.\n\n\
         Instructions:\n\
         - Be conversational and natural\n\
         - Provide specific details about your experience\n\
         - Explain what frustrated you and why it matters\n\
         - Be honest but polite\n\
         - Share what would make the experience better\n\n\
         Keep responses concise (2-3 sentences each turn).",
        name = request.customer_name,
        product = product_line,
        feedback = request.transcript,
    )
}

/// Normalize a raw simulation response. Turns without a message are dropped.
pub fn parse_simulation_response(raw: serde_json::Value) -> CallOutcome {
    let conversation = raw
        .get("simulated_conversation")
        .and_then(|v| v.as_array())
        .map(|turns| {
            turns
                .iter()
                .filter_map(|turn| {
                    let message = turn.get("message").and_then(|m| m.as_str())?;
                    Some(ConversationTurn {
                        role: turn
                            .get("role")
                            .and_then(|r| r.as_str())
                            .unwrap_or("unknown")
                            .to_string(),
                        message: message.to_string(),
                        time_in_call_secs: turn
                            .get("time_in_call_secs")
                            .and_then(|t| t.as_f64())
                            .unwrap_or(0.0),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let analysis = raw
        .get("analysis")
        .filter(|a| a.is_object())
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));
    let field = |name: &str, default: &str| {
        analysis
            .get(name)
            .and_then(|v| v.as_str())
            .unwrap_or(default)
            .to_string()
    };
    let call_successful = field("call_successful", "unknown");
    let transcript_summary = field("transcript_summary", "");

    CallOutcome {
        conversation,
        analysis,
        call_successful,
        transcript_summary,
    }
}

/// Place a simulated follow-up call for one customer.
pub async fn place_follow_up_call(
    simulator: &dyn ConversationSimulator,
    request: &CallRequest,
    turns_limit: u32,
) -> Result<CallOutcome, OutreachError> {
    if request.transcript.trim().is_empty() {
        return Err(OutreachError::InvalidRequest(
            "transcript must not be empty".to_string(),
        ));
    }
    if request.customer_phone.trim().is_empty() {
        return Err(OutreachError::InvalidRequest(
            "customer_phone must not be empty".to_string(),
        ));
    }

    log::info!("Placing follow-up call to {}", request.customer_name);
    let prompt = build_persona_prompt(request);
    let raw = simulator.simulate(&prompt, turns_limit).await?;
    let outcome = parse_simulation_response(raw);
    log::info!(
        "Follow-up call to {} completed: {} turns, successful={}",
        request.customer_name,
        outcome.conversation.len(),
        outcome.call_successful
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct ScriptedSimulator {
        response: serde_json::Value,
        seen: Mutex<Vec<(String, u32)>>,
    }

    impl ScriptedSimulator {
        fn new(response: serde_json::Value) -> Self {
            Self {
                response,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ConversationSimulator for ScriptedSimulator {
        async fn simulate(
            &self,
            persona_prompt: &str,
            turns_limit: u32,
        ) -> Result<serde_json::Value, OutreachError> {
            self.seen.lock().push((persona_prompt.to_string(), turns_limit));
            Ok(self.response.clone())
        }
    }

    fn request() -> CallRequest {
        CallRequest {
            customer_name: "Dana".to_string(),
            customer_phone: "+15555550100".to_string(),
            transcript: "My hotspot drops every afternoon".to_string(),
            product: Some("Mobile Hotspot".to_string()),
        }
    }

    #[test]
    fn test_parse_drops_null_messages_and_defaults() {
        let outcome = parse_simulation_response(serde_json::json!({
            "simulated_conversation": [
                {"role": "agent", "message": "Hi Dana", "time_in_call_secs": 0.5},
                {"role": "user", "message": null, "time_in_call_secs": 1.0},
                {"message": "It keeps dropping"}
            ],
            "analysis": {"call_successful": "success", "transcript_summary": "Hotspot drops"}
        }));

        assert_eq!(outcome.conversation.len(), 2);
        assert_eq!(outcome.conversation[1].role, "unknown");
        assert_eq!(outcome.conversation[1].time_in_call_secs, 0.0);
        assert_eq!(outcome.call_successful, "success");
        assert_eq!(outcome.transcript_summary, "Hotspot drops");
    }

    #[test]
    fn test_parse_missing_analysis_defaults() {
        let outcome = parse_simulation_response(serde_json::json!({}));
        assert!(outcome.conversation.is_empty());
        assert_eq!(outcome.call_successful, "unknown");
        assert_eq!(outcome.transcript_summary, "");
        assert_eq!(outcome.analysis, serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_place_call_builds_persona_and_passes_limit() {
        let sim = ScriptedSimulator::new(serde_json::json!({
            "simulated_conversation": [{"role": "agent", "message": "Hello"}],
            "analysis": {"call_successful": "success"}
        }));

        let outcome = place_follow_up_call(&sim, &request(), 8).await.expect("call");

        assert_eq!(outcome.conversation.len(), 1);
        let seen = sim.seen.lock();
        assert_eq!(seen[0].1, 8);
        assert!(seen[0].0.contains("You are Dana"));
        assert!(seen[0].0.contains("My hotspot drops every afternoon"));
        assert!(seen[0].0.contains("Mobile Hotspot"));
    }

    #[tokio::test]
    async fn test_place_call_rejects_empty_fields() {
        let sim = ScriptedSimulator::new(serde_json::json!({}));

        let mut req = request();
        req.transcript = "   ".to_string();
        let err = place_follow_up_call(&sim, &req, 8).await.expect_err("empty transcript");
        assert!(matches!(err, OutreachError::InvalidRequest(_)));

        let mut req = request();
        req.customer_phone = String::new();
        let err = place_follow_up_call(&sim, &req, 8).await.expect_err("empty phone");
        assert!(matches!(err, OutreachError::InvalidRequest(_)));
        assert!(sim.seen.lock().is_empty());
    }

    #[test]
    fn test_client_requires_credentials() {
        let config = ConversationConfig::default();
        assert!(matches!(
            ElevenLabsSimulator::new(&config),
            Err(OutreachError::MissingCredential("conversation.apiKey"))
        ));
    }

    #[test]
    fn test_endpoint_and_body_shape() {
        let config = ConversationConfig {
            api_key: Some("k".into()),
            agent_id: Some("agent_123".into()),
            ..ConversationConfig::default()
        };
        let sim = ElevenLabsSimulator::new(&config).expect("client");
        assert_eq!(
            sim.endpoint(),
            "https://api.elevenlabs.io/v1/convai/agents/agent_123/simulate-conversation"
        );

        let body = build_simulation_body("persona", 8);
        assert_eq!(body["new_turns_limit"], 8);
        assert_eq!(
            body["simulation_specification"]["simulated_user_config"]["prompt"]["prompt"],
            "persona"
        );
    }
}
