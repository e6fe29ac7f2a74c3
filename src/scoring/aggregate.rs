//! CHI aggregation and pipeline orchestration.
//!
//! A [`ChiPipeline`] owns one run's tone and weather caches and executes, in
//! order: risk evaluation, batched tonality scoring, happiness composition,
//! time bucketing, and (product, period) aggregation.

use std::collections::BTreeMap;

use super::buckets::assign_periods;
use super::compose::{happiness_score, Penalties};
use super::risk::{ContextualRiskEvaluator, OutageSignal, WeatherCache};
use super::sentiment::{ScoringStats, SentimentScorer, ToneCache};
use crate::error::PipelineError;
use crate::provider::CompletionProvider;
use crate::types::{ChiRow, Config, FeedbackRecord, ScoredRecord, TimePeriod};
use crate::weather::WeatherLookup;

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean happiness per (product, period), one row per group present.
///
/// Rows come out ordered by product name, then period.
pub fn aggregate(records: &[ScoredRecord]) -> Vec<ChiRow> {
    let mut groups: BTreeMap<(&str, TimePeriod), (f64, usize)> = BTreeMap::new();
    for r in records {
        let entry = groups
            .entry((r.record.product_name.as_str(), r.time_period))
            .or_insert((0.0, 0));
        entry.0 += r.happiness_score;
        entry.1 += 1;
    }

    groups
        .into_iter()
        .map(|((product, period), (sum, count))| ChiRow {
            product_name: product.to_string(),
            time_period: period,
            consumer_happiness_index: round2(sum / count as f64),
        })
        .collect()
}

/// One pipeline invocation: collaborators plus the caches it owns.
pub struct ChiPipeline<'a> {
    scorer: SentimentScorer<'a>,
    risk: ContextualRiskEvaluator<'a>,
    penalties: Penalties,
    tone_cache: ToneCache,
    weather_cache: WeatherCache,
    run_id: String,
    last_stats: ScoringStats,
}

impl<'a> ChiPipeline<'a> {
    pub fn new(
        config: &Config,
        completion: &'a dyn CompletionProvider,
        weather: Option<&'a dyn WeatherLookup>,
        outage: &'a dyn OutageSignal,
    ) -> Self {
        Self {
            scorer: SentimentScorer::new(completion, &config.scoring),
            risk: ContextualRiskEvaluator::new(weather, config.weather.thresholds, outage),
            penalties: Penalties::from(&config.scoring),
            tone_cache: ToneCache::new(),
            weather_cache: WeatherCache::new(),
            run_id: uuid::Uuid::new_v4().to_string(),
            last_stats: ScoringStats::default(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn tone_cache(&self) -> &ToneCache {
        &self.tone_cache
    }

    pub fn weather_cache(&self) -> &WeatherCache {
        &self.weather_cache
    }

    /// Scoring counters from the most recent `score_records` call.
    pub fn last_stats(&self) -> ScoringStats {
        self.last_stats
    }

    /// Attach tonality, risk flags, happiness and period to every record.
    pub async fn score_records(
        &mut self,
        records: &[FeedbackRecord],
    ) -> Result<Vec<ScoredRecord>, PipelineError> {
        if records.is_empty() {
            return Err(PipelineError::EmptyDataset);
        }
        log::info!("CHI run {}: {} records", self.run_id, records.len());

        let flags = self.risk.evaluate(records, &mut self.weather_cache).await;
        let crises = flags.iter().filter(|f| f.national_crisis).count();
        let outages = flags.iter().filter(|f| f.network_outage).count();
        log::info!(
            "CHI run {}: {} outage flags, {} crisis flags ({} weather lookups cached)",
            self.run_id,
            outages,
            crises,
            self.weather_cache.len()
        );

        self.last_stats = self
            .scorer
            .resolve(
                records.iter().map(|r| r.transcript.as_str()),
                &mut self.tone_cache,
            )
            .await;

        let timestamps: Vec<_> = records.iter().map(|r| r.timestamp).collect();
        let periods = assign_periods(&timestamps);

        records
            .iter()
            .zip(flags)
            .zip(periods)
            .map(|((record, flags), time_period)| {
                let tonality = self.tone_cache.get(&record.transcript).ok_or_else(|| {
                    PipelineError::Configuration(format!(
                        "tonality missing for transcript after scoring: {:.40}",
                        record.transcript
                    ))
                })?;
                Ok(ScoredRecord {
                    record: record.clone(),
                    tonality_score: tonality,
                    network_outage: flags.network_outage,
                    national_crisis: flags.national_crisis,
                    happiness_score: happiness_score(tonality, flags, &self.penalties),
                    time_period,
                })
            })
            .collect()
    }

    /// Full run: score every record, then aggregate into CHI rows.
    pub async fn compute(&mut self, records: &[FeedbackRecord]) -> Result<Vec<ChiRow>, PipelineError> {
        let scored = self.score_records(records).await?;
        let rows = aggregate(&scored);
        log::info!("CHI run {}: {} CHI rows", self.run_id, rows.len());
        Ok(rows)
    }
}
