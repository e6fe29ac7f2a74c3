//! AI-drafted operational emails.
//!
//! Free-text completions (no response schema) turned into ready-to-send
//! messages for engineering, marketing and product strategy.

use serde::Serialize;

use super::OutreachError;
use crate::provider::{strip_code_fences, CompletionProvider};

const MAX_ITEMS_IN_PROMPT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailKind {
    EscalationTicket,
    LoyaltyPromotion,
    StrategyMemo,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationalEmail {
    pub kind: EmailKind,
    pub product: Option<String>,
    pub subject: String,
    pub body: String,
}

fn numbered(items: &[String]) -> String {
    items
        .iter()
        .filter(|i| !i.trim().is_empty())
        .take(MAX_ITEMS_IN_PROMPT)
        .enumerate()
        .map(|(i, item)| format!("{}. {}", i + 1, item.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn draft(
    provider: &dyn CompletionProvider,
    prompt: &str,
) -> Result<String, OutreachError> {
    let text = provider.complete(prompt, None).await?;
    let body = strip_code_fences(&text).trim().to_string();
    if body.is_empty() {
        return Err(OutreachError::Parse("completion returned no text".to_string()));
    }
    Ok(body)
}

/// Ticket for engineering summarizing technical complaints about a product.
pub async fn draft_escalation_ticket(
    provider: &dyn CompletionProvider,
    product: &str,
    issues: &[String],
) -> Result<OperationalEmail, OutreachError> {
    let reports = numbered(issues);
    if reports.is_empty() {
        return Err(OutreachError::InvalidRequest(
            "at least one issue is required for an escalation".to_string(),
        ));
    }
    let prompt = format!(
        "You are a Product Manager creating a JIRA ticket for the engineering team.\n\n\
         Product: {product}\n\n\
         Customer Technical Reports:\n{reports}\n\n\
         Generate a single, concise JIRA ticket that covers:\n\
         1. Summary (one-line ticket title)\n\
         2. Description (core technical issue)\n\
         3. Affected Locations (if mentioned)\n\
         4. Customer Impact (severity and user experience)\n\
         5. Recommended Priority (P0/P1/P2)\n\n\
         Format as a ready-to-paste JIRA ticket."
    );

    let body = draft(provider, &prompt).await?;
    log::info!("Drafted escalation ticket for {} ({} issues)", product, issues.len());
    Ok(OperationalEmail {
        kind: EmailKind::EscalationTicket,
        product: Some(product.to_string()),
        subject: format!("[Engineering Escalation] {}: customer-reported issues", product),
        body,
    })
}

/// Campaign brief rewarding loyal customers of a well-liked product.
pub async fn draft_loyalty_promotion(
    provider: &dyn CompletionProvider,
    product: &str,
    feedback: &[String],
) -> Result<OperationalEmail, OutreachError> {
    let summary = numbered(feedback);
    let prompt = format!(
        "You are a customer loyalty expert creating promotional offers to reward and \
         retain loyal customers.\n\n\
         Product: {product}\n\n\
         Customer Feedback Summary:\n{summary}\n\n\
         Based on this feedback, write a LOYALTY PROMOTION CAMPAIGN brief with exclusive \
         offers, upgrade incentives, referral bonuses, early access and appreciation \
         gestures. For each promotion give the value proposition, target segment, \
         delivery method, duration and expected retention impact.\n\n\
         Format as a professional brief for the marketing team."
    );

    let body = draft(provider, &prompt).await?;
    log::info!("Drafted loyalty promotion for {}", product);
    Ok(OperationalEmail {
        kind: EmailKind::LoyaltyPromotion,
        product: Some(product.to_string()),
        subject: format!("[Marketing] Loyalty promotion brief: {}", product),
        body,
    })
}

/// Strategy memo from a follow-up call's detailed customer response.
pub async fn draft_strategy_memo(
    provider: &dyn CompletionProvider,
    original_transcript: &str,
    customer_response: &str,
) -> Result<OperationalEmail, OutreachError> {
    if customer_response.trim().is_empty() {
        return Err(OutreachError::InvalidRequest(
            "customer response must not be empty".to_string(),
        ));
    }
    let prompt = format!(
        "You are a Director of Product Strategy.\n\n\
         A customer was contacted for follow-up feedback. Their detailed response:\n\
         \"{customer_response}\"\n\n\
         Original complaint context: \"{original_transcript}\"\n\n\
         Write a Product Strategy Memo with:\n\
         1. Root Cause Problem\n\
         2. Business Impact\n\
         3. Recommendations (2-3 specific, actionable fixes)\n\
         4. One draft user story for the development team\n\n\
         Format professionally as an internal strategy document."
    );

    let body = draft(provider, &prompt).await?;
    log::info!("Drafted strategy memo from follow-up call");
    Ok(OperationalEmail {
        kind: EmailKind::StrategyMemo,
        product: None,
        subject: "[Product Strategy] Follow-up call findings".to_string(),
        body,
    })
}
