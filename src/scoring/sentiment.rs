//! Batched transcript tonality scoring.
//!
//! Unique transcripts are scored in fixed-size batches, one completion call per
//! batch, with a pause between batches to stay under the provider's per-minute
//! cap. A batch that fails, cannot be parsed, or returns the wrong number of
//! scores falls back to the neutral score for every transcript in it.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::provider::{extract_json_value, CompletionProvider};
use crate::types::ScoringConfig;

pub const MIN_TONALITY: f64 = 1.0;
pub const MAX_TONALITY: f64 = 10.0;

/// Per-run map from transcript text to its resolved tonality score.
#[derive(Debug, Clone, Default)]
pub struct ToneCache {
    scores: HashMap<String, f64>,
}

impl ToneCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, transcript: &str) -> Option<f64> {
        self.scores.get(transcript).copied()
    }

    pub fn contains(&self, transcript: &str) -> bool {
        self.scores.contains_key(transcript)
    }

    pub fn insert(&mut self, transcript: String, score: f64) {
        self.scores.insert(transcript, score);
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Counters from one `resolve` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoringStats {
    /// Distinct transcripts seen in the input.
    pub unique: usize,
    /// Distinct transcripts that were not already cached.
    pub uncached: usize,
    pub batches: usize,
    pub fallback_batches: usize,
}

pub struct SentimentScorer<'a> {
    provider: &'a dyn CompletionProvider,
    batch_size: usize,
    inter_batch_delay: Duration,
    fallback_score: f64,
}

impl<'a> SentimentScorer<'a> {
    pub fn new(provider: &'a dyn CompletionProvider, config: &ScoringConfig) -> Self {
        Self {
            provider,
            batch_size: config.batch_size.max(1),
            inter_batch_delay: Duration::from_millis(config.inter_batch_delay_ms),
            fallback_score: config.fallback_score.clamp(MIN_TONALITY, MAX_TONALITY),
        }
    }

    /// Score every transcript not already in `cache`, writing results into it.
    ///
    /// Duplicates are scored once. Batches run strictly one after another.
    pub async fn resolve<'t, I>(&self, transcripts: I, cache: &mut ToneCache) -> ScoringStats
    where
        I: IntoIterator<Item = &'t str>,
    {
        let mut seen = HashSet::new();
        let mut unique = 0;
        let mut pending: Vec<String> = Vec::new();
        for transcript in transcripts {
            if !seen.insert(transcript) {
                continue;
            }
            unique += 1;
            if !cache.contains(transcript) {
                pending.push(transcript.to_string());
            }
        }

        let batches: Vec<&[String]> = pending.chunks(self.batch_size).collect();
        let mut stats = ScoringStats {
            unique,
            uncached: pending.len(),
            batches: batches.len(),
            fallback_batches: 0,
        };

        log::info!(
            "Tonality scoring: {} unique transcripts, {} uncached, {} batches",
            unique,
            pending.len(),
            batches.len()
        );

        for (i, batch) in batches.iter().enumerate() {
            log::info!("  Scoring batch {}/{}", i + 1, batches.len());
            let (scores, fell_back) = self.score_batch(batch).await;
            if fell_back {
                stats.fallback_batches += 1;
            }
            for (transcript, score) in scores {
                cache.insert(transcript, score);
            }

            if i + 1 < batches.len() && !self.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.inter_batch_delay).await;
            }
        }

        stats
    }

    /// Score one batch. The flag is true when the batch fell back to neutral.
    pub async fn score_batch(&self, batch: &[String]) -> (HashMap<String, f64>, bool) {
        let prompt = build_batch_prompt(batch);
        let schema = batch_response_schema();

        let parsed = match self.provider.complete(&prompt, Some(&schema)).await {
            Ok(text) => parse_batch_scores(&text, batch.len()),
            Err(e) => Err(e.to_string()),
        };

        match parsed {
            Ok(scores) => (batch.iter().cloned().zip(scores).collect(), false),
            Err(reason) => {
                log::warn!(
                    "Tonality batch of {} fell back to {}: {}",
                    batch.len(),
                    self.fallback_score,
                    reason
                );
                let scores = batch
                    .iter()
                    .map(|t| (t.clone(), self.fallback_score))
                    .collect();
                (scores, true)
            }
        }
    }
}

/// Numbered transcript list asking for one score per line, in order.
fn build_batch_prompt(batch: &[String]) -> String {
    let mut prompt = String::with_capacity(256 + batch.iter().map(|t| t.len() + 8).sum::<usize>());
    prompt.push_str("Analyze the sentiment of the following customer transcripts. ");
    prompt.push_str("Respond with ONLY a JSON list of floating-point numbers, ");
    prompt.push_str("one for each transcript, in the same order. Each number must be between ");
    prompt.push_str("1.0 (extremely negative) and 10.0 (extremely positive).\n\nTranscripts:\n");
    for (i, transcript) in batch.iter().enumerate() {
        // Keep each transcript on its own numbered line.
        let flat = transcript.replace(['\n', '\r'], " ");
        prompt.push_str(&format!("{}. \"{}\"\n", i + 1, flat));
    }
    prompt
}

fn batch_response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "ARRAY",
        "items": { "type": "NUMBER" }
    })
}

/// Parse a JSON list of scores, clamping each into range.
///
/// Errors on unparseable output, non-numeric entries, or a length mismatch.
pub fn parse_batch_scores(text: &str, expected: usize) -> Result<Vec<f64>, String> {
    let json = extract_json_value(text, '[').ok_or_else(|| "no JSON list in response".to_string())?;
    let values: Vec<serde_json::Value> =
        serde_json::from_str(json).map_err(|e| format!("invalid JSON list: {}", e))?;

    if values.len() != expected {
        return Err(format!(
            "length mismatch: expected {}, got {}",
            expected,
            values.len()
        ));
    }

    values
        .iter()
        .map(|v| {
            let score = match v {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            score
                .filter(|s| s.is_finite())
                .map(|s| s.clamp(MIN_TONALITY, MAX_TONALITY))
                .ok_or_else(|| format!("non-numeric score: {}", v))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use crate::test_utils::{count_numbered_lines, test_config, ScriptedCompletion};

    fn transcripts(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("transcript number {}", i)).collect()
    }

    #[test]
    fn test_parse_clamps_out_of_range() {
        let scores = parse_batch_scores("[0.2, 11.5, 6]", 3).expect("parse");
        assert_eq!(scores, vec![1.0, 10.0, 6.0]);
    }

    #[test]
    fn test_parse_fenced_and_string_numbers() {
        let scores = parse_batch_scores("```json\n[\"7.5\", 3]\n```", 2).expect("parse");
        assert_eq!(scores, vec![7.5, 3.0]);
    }

    #[test]
    fn test_parse_rejects_mismatch_and_garbage() {
        assert!(parse_batch_scores("[5.0, 6.0]", 3).is_err());
        assert!(parse_batch_scores("I cannot help with that", 1).is_err());
        assert!(parse_batch_scores("[5.0, null]", 2).is_err());
    }

    #[test]
    fn test_prompt_numbers_each_transcript_once() {
        let batch = vec!["first\nline".to_string(), "second".to_string()];
        let prompt = build_batch_prompt(&batch);
        assert_eq!(count_numbered_lines(&prompt), 2);
        assert!(prompt.contains("1. \"first line\""));
        assert!(prompt.contains("2. \"second\""));
    }

    #[tokio::test]
    async fn test_batch_count_is_ceil_of_unique_over_size() {
        let provider = ScriptedCompletion::uniform_scores(8.0);
        let config = test_config();
        let scorer = SentimentScorer::new(&provider, &config.scoring);
        let input = transcripts(23);
        let mut cache = ToneCache::new();

        let stats = scorer.resolve(input.iter().map(String::as_str), &mut cache).await;

        assert_eq!(stats.batches, 3);
        assert_eq!(provider.calls(), 3);
        assert_eq!(cache.len(), 23);
        assert_eq!(cache.get("transcript number 22"), Some(8.0));
    }

    #[tokio::test]
    async fn test_duplicates_are_scored_once() {
        let provider = ScriptedCompletion::uniform_scores(6.0);
        let config = test_config();
        let scorer = SentimentScorer::new(&provider, &config.scoring);
        let input = vec!["same complaint"; 12];
        let mut cache = ToneCache::new();

        let stats = scorer.resolve(input, &mut cache).await;

        assert_eq!(stats.unique, 1);
        assert_eq!(provider.calls(), 1);
        assert_eq!(count_numbered_lines(&provider.prompts()[0]), 1);
    }

    #[tokio::test]
    async fn test_cached_transcripts_are_not_rescored() {
        let provider = ScriptedCompletion::uniform_scores(6.0);
        let config = test_config();
        let scorer = SentimentScorer::new(&provider, &config.scoring);
        let input = transcripts(5);
        let mut cache = ToneCache::new();

        scorer.resolve(input.iter().map(String::as_str), &mut cache).await;
        let second = scorer.resolve(input.iter().map(String::as_str), &mut cache).await;

        assert_eq!(provider.calls(), 1);
        assert_eq!(second.uncached, 0);
        assert_eq!(second.batches, 0);
    }

    #[tokio::test]
    async fn test_length_mismatch_falls_back_whole_batch() {
        let provider = ScriptedCompletion::uniform_scores(9.0);
        provider.push(Ok("[9.0, 9.0]".to_string()));
        let config = test_config();
        let scorer = SentimentScorer::new(&provider, &config.scoring);
        let input = transcripts(13);
        let mut cache = ToneCache::new();

        let stats = scorer.resolve(input.iter().map(String::as_str), &mut cache).await;

        assert_eq!(stats.fallback_batches, 1);
        // First batch (10) fell back, second batch (3) scored normally.
        for t in &input[..10] {
            assert_eq!(cache.get(t), Some(5.0));
        }
        for t in &input[10..] {
            assert_eq!(cache.get(t), Some(9.0));
        }
    }

    #[tokio::test]
    async fn test_provider_error_falls_back() {
        let provider = ScriptedCompletion::failing(ProviderError::RateLimited);
        let config = test_config();
        let scorer = SentimentScorer::new(&provider, &config.scoring);
        let mut cache = ToneCache::new();

        let stats = scorer.resolve(vec!["a", "b"], &mut cache).await;

        assert_eq!(stats.fallback_batches, 1);
        assert_eq!(cache.get("a"), Some(5.0));
        assert_eq!(cache.get("b"), Some(5.0));
    }

    #[tokio::test]
    async fn test_custom_batch_size() {
        let provider = ScriptedCompletion::uniform_scores(4.0);
        let mut config = test_config();
        config.scoring.batch_size = 4;
        let scorer = SentimentScorer::new(&provider, &config.scoring);
        let input = transcripts(9);
        let mut cache = ToneCache::new();

        let stats = scorer.resolve(input.iter().map(String::as_str), &mut cache).await;

        assert_eq!(stats.batches, 3);
        assert_eq!(provider.calls(), 3);
    }
}
