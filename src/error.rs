//! Error types for CHI computation
//!
//! Errors are classified by recoverability:
//! - Retryable: provider timeouts, rate limits, network issues
//! - Fatal for the run: configuration, missing credentials, bad or empty datasets
//! - Request-scoped: malformed recommendation output (does not touch computed CHI)

use thiserror::Error;

use crate::provider::ProviderError;

/// Crate-level error for pipeline runs and recommendation requests.
#[derive(Debug, Error)]
pub enum PipelineError {
    // Configuration failures
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    // Dataset failures
    #[error("Required column missing from source: {0}")]
    MissingColumn(String),

    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Invalid record at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Record source error: {0}")]
    Source(String),

    #[error("IO error: {0}")]
    Io(String),

    // Request-scoped failures
    #[error("Malformed recommendation response: {0}")]
    MalformedRecommendation(String),

    #[error("Completion provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl PipelineError {
    /// Returns true if retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Provider(e) => e.is_retryable(),
            PipelineError::Io(_) => true,
            _ => false,
        }
    }

    /// Returns true if the error aborts a whole CHI computation rather than one request
    pub fn is_fatal_for_run(&self) -> bool {
        matches!(
            self,
            PipelineError::Configuration(_)
                | PipelineError::MissingCredential(_)
                | PipelineError::MissingColumn(_)
                | PipelineError::EmptyDataset
                | PipelineError::InvalidRecord { .. }
                | PipelineError::Source(_)
                | PipelineError::Io(_)
        )
    }

    /// Get a user-friendly recovery suggestion
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            PipelineError::Configuration(_) => "Check the values in ~/.chi/config.json.",
            PipelineError::MissingCredential(_) => {
                "Add the missing API key to ~/.chi/config.json."
            }
            PipelineError::MissingColumn(_) => {
                "The source needs transcript, product_name, location and timestamp columns."
            }
            PipelineError::EmptyDataset => "Load at least one feedback record and try again.",
            PipelineError::InvalidRecord { .. } => "Fix or remove the offending record.",
            PipelineError::Source(_) => "Verify the input file or database path.",
            PipelineError::Io(_) => "Check file permissions and try again.",
            PipelineError::MalformedRecommendation(_) => {
                "The model returned unusable output. Request the recommendation again."
            }
            PipelineError::Provider(e) if e.is_retryable() => "Wait a minute and try again.",
            PipelineError::Provider(_) => "Check the completion service API key and model.",
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for PipelineError {
    fn from(err: rusqlite::Error) -> Self {
        PipelineError::Source(err.to_string())
    }
}

/// Serializable error representation for callers
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub message: String,
    pub error_type: ErrorType,
    pub can_retry: bool,
    pub recovery_suggestion: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorType {
    Retryable,
    Fatal,
    RequestScoped,
}

impl From<&PipelineError> for ErrorPayload {
    fn from(err: &PipelineError) -> Self {
        let error_type = if err.is_retryable() {
            ErrorType::Retryable
        } else if err.is_fatal_for_run() {
            ErrorType::Fatal
        } else {
            ErrorType::RequestScoped
        };

        ErrorPayload {
            message: err.to_string(),
            error_type,
            can_retry: err.is_retryable(),
            recovery_suggestion: err.recovery_suggestion().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_failures_are_fatal() {
        assert!(PipelineError::EmptyDataset.is_fatal_for_run());
        assert!(PipelineError::MissingCredential("completion.apiKey").is_fatal_for_run());
        assert!(PipelineError::MissingColumn("timestamp".into()).is_fatal_for_run());
        assert!(!PipelineError::MalformedRecommendation("x".into()).is_fatal_for_run());
    }

    #[test]
    fn test_payload_classification() {
        let payload = ErrorPayload::from(&PipelineError::Provider(ProviderError::Timeout(30)));
        assert_eq!(payload.error_type, ErrorType::Retryable);
        assert!(payload.can_retry);

        let payload = ErrorPayload::from(&PipelineError::MalformedRecommendation("bad".into()));
        assert_eq!(payload.error_type, ErrorType::RequestScoped);
        assert!(!payload.can_retry);

        let payload = ErrorPayload::from(&PipelineError::EmptyDataset);
        assert_eq!(payload.error_type, ErrorType::Fatal);
        assert_eq!(payload.message, "Dataset is empty");
    }
}
