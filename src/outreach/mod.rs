//! Downstream actions taken on CHI results: follow-up calls and operational emails.

pub mod briefs;
pub mod call;

use thiserror::Error;

use crate::provider::ProviderError;

pub use briefs::{
    draft_escalation_ticket, draft_loyalty_promotion, draft_strategy_memo, EmailKind,
    OperationalEmail,
};
pub use call::{
    place_follow_up_call, CallOutcome, CallRequest, ConversationSimulator, ConversationTurn,
    ElevenLabsSimulator,
};

#[derive(Debug, Error)]
pub enum OutreachError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("Completion provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Conversation service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Conversation service timed out after {0}s")]
    Timeout(u64),

    #[error("Failed to parse conversation response: {0}")]
    Parse(String),
}

impl OutreachError {
    pub fn is_retryable(&self) -> bool {
        match self {
            OutreachError::Provider(e) => e.is_retryable(),
            OutreachError::Timeout(_) | OutreachError::Network(_) => true,
            OutreachError::Http { status, .. } => *status == 429 || *status >= 500,
            OutreachError::InvalidRequest(_)
            | OutreachError::MissingCredential(_)
            | OutreachError::Parse(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(OutreachError::Timeout(60).is_retryable());
        assert!(OutreachError::Http { status: 503, body: String::new() }.is_retryable());
        assert!(!OutreachError::Http { status: 400, body: String::new() }.is_retryable());
        assert!(!OutreachError::InvalidRequest("empty".into()).is_retryable());
        assert!(OutreachError::Provider(ProviderError::RateLimited).is_retryable());
    }
}
