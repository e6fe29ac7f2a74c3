//! Contextual risk flags: simulated network outage and weather-driven crisis.
//!
//! Both flags are independent. Outage comes from an [`OutageSignal`]; the
//! shipped implementation is a two-phase simulation that can be swapped for a
//! real incident feed. Crisis comes from a per-(location, day) weather lookup
//! that fails open.

use std::collections::HashMap;

use chrono::NaiveDate;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Bernoulli, Distribution};

use crate::types::{DisasterThresholds, FeedbackRecord, OutageConfig};
use crate::weather::WeatherLookup;

/// Source of per-record network-outage flags. Output is positional.
pub trait OutageSignal: Send + Sync {
    fn flag(&self, records: &[FeedbackRecord]) -> Vec<bool>;
}

/// Probabilistic outage simulation.
///
/// Records of the high-risk product are split by timestamp: the earlier half
/// draws with `early_probability`, the later half with `late_probability`.
/// Everything else draws with `baseline_probability`.
pub struct SimulatedOutage {
    config: OutageConfig,
    rng: Mutex<StdRng>,
}

impl SimulatedOutage {
    pub fn new(config: OutageConfig) -> Self {
        let seed = config
            .seed
            .unwrap_or_else(|| uuid::Uuid::new_v4().as_u64_pair().0);
        Self {
            config,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn draw(&self, rng: &mut StdRng, probability: f64) -> bool {
        match Bernoulli::new(probability.clamp(0.0, 1.0)) {
            Ok(dist) => dist.sample(rng),
            Err(_) => false,
        }
    }
}

impl OutageSignal for SimulatedOutage {
    fn flag(&self, records: &[FeedbackRecord]) -> Vec<bool> {
        let mut flags = vec![false; records.len()];

        let mut high_risk: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.product_name == self.config.high_risk_product)
            .map(|(i, _)| i)
            .collect();
        high_risk.sort_by_key(|&i| (records[i].timestamp, i));
        let split = high_risk.len() / 2;

        let mut rng = self.rng.lock();
        for (rank, &i) in high_risk.iter().enumerate() {
            let p = if rank < split {
                self.config.early_probability
            } else {
                self.config.late_probability
            };
            flags[i] = self.draw(&mut rng, p);
        }
        for (i, record) in records.iter().enumerate() {
            if record.product_name != self.config.high_risk_product {
                flags[i] = self.draw(&mut rng, self.config.baseline_probability);
            }
        }
        flags
    }
}

/// Per-run map from (location, day) to the resolved disaster flag.
#[derive(Debug, Clone, Default)]
pub struct WeatherCache {
    entries: HashMap<(String, NaiveDate), bool>,
}

impl WeatherCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, location: &str, date: NaiveDate) -> Option<bool> {
        self.entries.get(&(location.to_string(), date)).copied()
    }

    pub fn insert(&mut self, location: &str, date: NaiveDate, disaster: bool) {
        self.entries.insert((location.to_string(), date), disaster);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RiskFlags {
    pub network_outage: bool,
    pub national_crisis: bool,
}

pub struct ContextualRiskEvaluator<'a> {
    /// `None` when weather lookups are disabled; every record is then crisis-free.
    weather: Option<&'a dyn WeatherLookup>,
    thresholds: DisasterThresholds,
    outage: &'a dyn OutageSignal,
}

impl<'a> ContextualRiskEvaluator<'a> {
    pub fn new(
        weather: Option<&'a dyn WeatherLookup>,
        thresholds: DisasterThresholds,
        outage: &'a dyn OutageSignal,
    ) -> Self {
        Self {
            weather,
            thresholds,
            outage,
        }
    }

    /// Evaluate both flags for every record, positionally.
    pub async fn evaluate(
        &self,
        records: &[FeedbackRecord],
        cache: &mut WeatherCache,
    ) -> Vec<RiskFlags> {
        let outages = self.outage.flag(records);
        let mut flags = Vec::with_capacity(records.len());
        for (record, network_outage) in records.iter().zip(outages) {
            let national_crisis = self.crisis_flag(record, cache).await;
            flags.push(RiskFlags {
                network_outage,
                national_crisis,
            });
        }
        flags
    }

    /// Disaster flag for the record's location and day. Lookup failures map to false.
    pub async fn crisis_flag(&self, record: &FeedbackRecord, cache: &mut WeatherCache) -> bool {
        let Some(weather) = self.weather else {
            return false;
        };
        let location = record.location.trim();
        if location.is_empty() {
            return false;
        }
        let date = record.timestamp.date_naive();
        if let Some(hit) = cache.get(location, date) {
            return hit;
        }

        log::debug!("Weather cache miss: {} on {}", location, date);
        let disaster = match weather.daily(location, date).await {
            Ok(Some(day)) => day.is_disaster(&self.thresholds),
            Ok(None) => false,
            Err(e) => {
                log::warn!("Weather lookup failed for {} on {}: {}", location, date, e);
                false
            }
        };
        cache.insert(location, date, disaster);
        disaster
    }
}
