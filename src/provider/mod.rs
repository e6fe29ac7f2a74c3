//! Text-completion service boundary.
//!
//! Everything that talks to an LLM goes through [`CompletionProvider`]: a prompt
//! in, a text payload out. Callers that need structured data pass a response
//! schema and parse the returned text themselves.

pub mod gemini;

use async_trait::async_trait;

pub use gemini::GeminiClient;

/// Errors from the completion service.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
    #[error("Rate limit or quota exceeded")]
    RateLimited,
    #[error("Authentication failed: {0}")]
    Unauthorized(String),
    #[error("API error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Returns true for failures that may clear up on their own
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Timeout(_) | ProviderError::RateLimited | ProviderError::Network(_) => {
                true
            }
            ProviderError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// A prompt-in, text-out completion service.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Complete `prompt`. When `schema` is given the service is asked for JSON
    /// matching it; the payload is still returned as raw text.
    async fn complete(
        &self,
        prompt: &str,
        schema: Option<&serde_json::Value>,
    ) -> Result<String, ProviderError>;
}

/// Strip markdown code fences the model sometimes wraps JSON in.
pub fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let without_open = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        return trimmed;
    };
    without_open
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Find the first balanced JSON value starting with `open` (`{` or `[`) in the text.
/// Handles fenced output and prose around the payload.
pub fn extract_json_value(response: &str, open: char) -> Option<&str> {
    let close = match open {
        '{' => '}',
        '[' => ']',
        _ => return None,
    };
    let text = strip_code_fences(response);
    let start = text.find(open)?;
    let candidate = &text[start..];

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;
    for (i, ch) in candidate.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&candidate[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fences("```\n[3]\n```"), "[3]");
        assert_eq!(strip_code_fences("  [4.5]  "), "[4.5]");
    }

    #[test]
    fn test_extract_json_array_with_prose() {
        let text = "Here are the scores: [7.5, 2.0, 9] hope that helps";
        assert_eq!(extract_json_value(text, '['), Some("[7.5, 2.0, 9]"));
    }

    #[test]
    fn test_extract_json_object_nested_and_fenced() {
        let text = "```json\n{\"points\": [\"a\", \"b]\"], \"x\": {\"y\": 1}}\n```";
        assert_eq!(
            extract_json_value(text, '{'),
            Some("{\"points\": [\"a\", \"b]\"], \"x\": {\"y\": 1}}")
        );
    }

    #[test]
    fn test_extract_json_missing() {
        assert_eq!(extract_json_value("no json here", '{'), None);
        assert_eq!(extract_json_value("[1, 2", '['), None);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Timeout(30).is_retryable());
        assert!(ProviderError::RateLimited.is_retryable());
        assert!(ProviderError::Http { status: 503, body: String::new() }.is_retryable());
        assert!(!ProviderError::Http { status: 400, body: String::new() }.is_retryable());
        assert!(!ProviderError::Unauthorized("bad key".into()).is_retryable());
        assert!(!ProviderError::Malformed("x".into()).is_retryable());
    }
}
