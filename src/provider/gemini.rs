//! Gemini `generateContent` client.
//!
//! Uses reqwest with the `x-goog-api-key` header. Structured output is requested
//! through `generationConfig.responseSchema` with a JSON mime type.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{CompletionProvider, ProviderError};
use crate::types::CompletionConfig;

pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &CompletionConfig, api_key: &str) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Build the request body for a prompt and optional response schema.
fn build_request_body(prompt: &str, schema: Option<&serde_json::Value>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
    });
    if let Some(schema) = schema {
        body["generationConfig"] = serde_json::json!({
            "responseMimeType": "application/json",
            "responseSchema": schema,
        });
    }
    body
}

/// Concatenate the text parts of the first candidate.
fn extract_candidate_text(response: GenerateResponse) -> Result<String, ProviderError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(ProviderError::Malformed(
            "Response contained no candidate text".to_string(),
        ));
    }
    Ok(text)
}

#[async_trait]
impl CompletionProvider for GeminiClient {
    async fn complete(
        &self,
        prompt: &str,
        schema: Option<&serde_json::Value>,
    ) -> Result<String, ProviderError> {
        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request_body(prompt, schema))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout_secs)
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ProviderError::Unauthorized(body),
                429 => ProviderError::RateLimited,
                code => ProviderError::Http { status: code, body },
            });
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("Failed to parse response: {}", e)))?;

        extract_candidate_text(parsed)
    }
}
