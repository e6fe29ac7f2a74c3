use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::PipelineError;
use crate::memo::ChiMemo;
use crate::provider::{CompletionProvider, GeminiClient};
use crate::scoring::{ChiPipeline, OutageSignal, RecommendationEngine, SimulatedOutage};
use crate::types::{ChiRow, CompletionConfig, Config, FeedbackRecord, Recommendation};
use crate::weather::{VisualCrossingClient, WeatherLookup};

/// Environment variables that fill credentials missing from config.json.
const ENV_OVERRIDES: [(&str, CredentialSlot); 4] = [
    ("GEMINI_API_KEY", CredentialSlot::Completion),
    ("WEATHER_API_KEY", CredentialSlot::Weather),
    ("ELEVENLABS_API_KEY", CredentialSlot::ConversationKey),
    ("ELEVENLABS_AGENT_ID", CredentialSlot::ConversationAgent),
];

#[derive(Clone, Copy)]
enum CredentialSlot {
    Completion,
    Weather,
    ConversationKey,
    ConversationAgent,
}

/// Long-lived service: collaborators, configuration and the CHI memo.
///
/// Each `compute_chi` call builds its own [`ChiPipeline`], so tone and weather
/// caches are never shared between concurrent runs. Only the memo is shared.
pub struct ChiService {
    config: Config,
    completion: Arc<dyn CompletionProvider>,
    weather: Option<Arc<dyn WeatherLookup>>,
    outage: Arc<dyn OutageSignal>,
    memo: ChiMemo,
}

/// Build only the Gemini client, for commands that never touch weather or outages.
pub fn completion_from_config(
    config: &CompletionConfig,
) -> Result<Arc<dyn CompletionProvider>, PipelineError> {
    let key = config
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or(PipelineError::MissingCredential("completion.apiKey"))?;
    Ok(Arc::new(GeminiClient::new(config, key)?))
}

impl ChiService {
    pub fn new(
        config: Config,
        completion: Arc<dyn CompletionProvider>,
        weather: Option<Arc<dyn WeatherLookup>>,
        outage: Arc<dyn OutageSignal>,
    ) -> Self {
        let memo = ChiMemo::new(config.memo_ttl_secs);
        Self {
            config,
            completion,
            weather,
            outage,
            memo,
        }
    }

    /// Build the live service: Gemini completions, Visual Crossing weather, simulated outages.
    pub fn from_config(config: Config) -> Result<Self, PipelineError> {
        config.validate()?;

        let completion = completion_from_config(&config.completion)?;

        let weather: Option<Arc<dyn WeatherLookup>> = if config.weather.enabled {
            let key = config
                .weather
                .api_key
                .as_deref()
                .filter(|k| !k.trim().is_empty())
                .ok_or(PipelineError::MissingCredential("weather.apiKey"))?;
            let client: Arc<dyn WeatherLookup> = Arc::new(
                VisualCrossingClient::new(&config.weather, key)
                    .map_err(|e| PipelineError::Configuration(format!("weather client: {}", e)))?,
            );
            Some(client)
        } else {
            log::info!("Weather lookups disabled; crisis flags will all be false");
            None
        };

        let outage: Arc<dyn OutageSignal> = Arc::new(SimulatedOutage::new(config.outage.clone()));
        Ok(Self::new(config, completion, weather, outage))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn memo(&self) -> &ChiMemo {
        &self.memo
    }

    /// Aggregate CHI rows for `records`.
    ///
    /// With `use_cache`, a fresh memo is returned as-is. Otherwise (or when the
    /// memo is stale) the pipeline runs and a successful result replaces the memo.
    pub async fn compute_chi(
        &self,
        records: &[FeedbackRecord],
        use_cache: bool,
    ) -> Result<Vec<ChiRow>, PipelineError> {
        if use_cache {
            if let Some(rows) = self.memo.fresh() {
                log::debug!("CHI memo hit ({} rows)", rows.len());
                return Ok(rows.as_ref().clone());
            }
        }

        let mut pipeline = ChiPipeline::new(
            &self.config,
            self.completion.as_ref(),
            self.weather.as_deref(),
            self.outage.as_ref(),
        );
        let rows = pipeline.compute(records).await?;
        let stats = pipeline.last_stats();
        log::info!(
            "CHI run {} complete: {} unique transcripts, {} batches ({} fell back)",
            pipeline.run_id(),
            stats.unique,
            stats.batches,
            stats.fallback_batches
        );

        let stored = self.memo.store(rows);
        Ok(stored.as_ref().clone())
    }

    pub async fn score_recommendation(
        &self,
        product: &str,
        chi_percentage: u8,
        sample_transcripts: &[String],
    ) -> Result<Recommendation, PipelineError> {
        RecommendationEngine::new(self.completion.as_ref())
            .score_recommendation(product, chi_percentage, sample_transcripts)
            .await
    }

    /// Recommendation from the product's most recent period CHI.
    pub async fn recommend_for_product(
        &self,
        records: &[FeedbackRecord],
        product: &str,
        max_samples: usize,
    ) -> Result<Recommendation, PipelineError> {
        let rows = self.compute_chi(records, true).await?;
        let latest = rows
            .iter()
            .filter(|r| r.product_name == product)
            .max_by_key(|r| r.time_period)
            .ok_or_else(|| {
                PipelineError::Source(format!("no CHI rows for product '{}'", product))
            })?;
        log::info!(
            "{} latest CHI {} in {} ({}%)",
            product,
            latest.consumer_happiness_index,
            latest.time_period,
            latest.percentage()
        );

        let samples = sample_transcripts(records, product, max_samples);
        self.score_recommendation(product, latest.percentage(), &samples)
            .await
    }
}

/// Up to `limit` distinct transcripts for `product`, most recent first.
pub fn sample_transcripts(records: &[FeedbackRecord], product: &str, limit: usize) -> Vec<String> {
    let mut matching: Vec<&FeedbackRecord> = records
        .iter()
        .filter(|r| r.product_name == product)
        .collect();
    matching.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let mut samples: Vec<String> = Vec::new();
    for r in matching {
        if samples.len() >= limit {
            break;
        }
        if !samples.contains(&r.transcript) {
            samples.push(r.transcript.clone());
        }
    }
    samples
}

// =============================================================================
// Configuration file
// =============================================================================

/// Default config location: `~/.chi/config.json`.
pub fn default_config_path() -> Result<PathBuf, PipelineError> {
    let home = dirs::home_dir()
        .ok_or_else(|| PipelineError::Configuration("Could not find home directory".to_string()))?;
    Ok(home.join(".chi").join("config.json"))
}

/// Load configuration.
///
/// An explicit path must exist. A missing default file yields defaults. In both
/// cases, credentials absent from the file are filled from the environment.
pub fn load_config(path: Option<&Path>) -> Result<Config, PipelineError> {
    let (config_path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (default_config_path()?, false),
    };

    let mut config = if config_path.exists() {
        let content = fs::read_to_string(&config_path)?;
        serde_json::from_str(&content).map_err(|e| {
            PipelineError::Configuration(format!(
                "Failed to parse {}: {}",
                config_path.display(),
                e
            ))
        })?
    } else if explicit {
        return Err(PipelineError::Configuration(format!(
            "Config file not found at {}",
            config_path.display()
        )));
    } else {
        log::info!(
            "No config at {}; using defaults",
            config_path.display()
        );
        Config::default()
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok());
    config.validate()?;
    Ok(config)
}

/// Fill unset credentials from `lookup` (the process environment in production).
pub fn apply_env_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    for (name, slot) in ENV_OVERRIDES {
        let target = match slot {
            CredentialSlot::Completion => &mut config.completion.api_key,
            CredentialSlot::Weather => &mut config.weather.api_key,
            CredentialSlot::ConversationKey => &mut config.conversation.api_key,
            CredentialSlot::ConversationAgent => &mut config.conversation.agent_id,
        };
        if target.as_deref().map_or(true, |v| v.trim().is_empty()) {
            if let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) {
                *target = Some(value);
            }
        }
    }
}
