//! Scripted fakes for the external collaborators.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;

use crate::provider::{CompletionProvider, ProviderError};
use crate::scoring::risk::OutageSignal;
use crate::types::{Config, FeedbackRecord};
use crate::weather::{DailyWeather, WeatherError, WeatherLookup};

type Responder = Box<dyn Fn(&str) -> Result<String, ProviderError> + Send + Sync>;

/// Completion fake: serves queued responses first, then falls back to a responder.
pub struct ScriptedCompletion {
    queue: Mutex<VecDeque<Result<String, ProviderError>>>,
    responder: Responder,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(responder: impl Fn(&str) -> Result<String, ProviderError> + Send + Sync + 'static) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: Box::new(responder),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Replies with `score` for every numbered transcript line in the prompt.
    pub fn uniform_scores(score: f64) -> Self {
        Self::new(move |prompt| {
            let n = count_numbered_lines(prompt);
            let scores: Vec<f64> = vec![score; n];
            Ok(serde_json::to_string(&scores).unwrap_or_default())
        })
    }

    /// Fails every call that is not queued.
    pub fn failing(err: ProviderError) -> Self {
        Self::new(move |_| Err(err.clone()))
    }

    pub fn push(&self, response: Result<String, ProviderError>) -> &Self {
        self.queue.lock().push_back(response);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

/// Count `N. "..."` lines, the shape of a batch scoring prompt.
pub fn count_numbered_lines(prompt: &str) -> usize {
    prompt
        .lines()
        .filter(|line| {
            let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
            !digits.is_empty() && line[digits.len()..].starts_with(". ")
        })
        .count()
}

#[async_trait]
impl CompletionProvider for ScriptedCompletion {
    async fn complete(
        &self,
        prompt: &str,
        _schema: Option<&serde_json::Value>,
    ) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        let queued = self.queue.lock().pop_front();
        match queued {
            Some(response) => response,
            None => (self.responder)(prompt),
        }
    }
}

/// Weather fake keyed by location; unknown locations return no data.
#[derive(Default)]
pub struct FakeWeather {
    days: HashMap<String, DailyWeather>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl FakeWeather {
    pub fn with_day(mut self, location: &str, day: DailyWeather) -> Self {
        self.days.insert(location.to_string(), day);
        self
    }

    pub fn failing_for(mut self, location: &str) -> Self {
        self.failing.insert(location.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WeatherLookup for FakeWeather {
    async fn daily(
        &self,
        location: &str,
        _date: NaiveDate,
    ) -> Result<Option<DailyWeather>, WeatherError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(location) {
            return Err(WeatherError::Timeout);
        }
        Ok(self.days.get(location).copied())
    }
}

/// Outage signal that flags every record the same way.
pub struct FixedOutage(pub bool);

impl OutageSignal for FixedOutage {
    fn flag(&self, records: &[FeedbackRecord]) -> Vec<bool> {
        vec![self.0; records.len()]
    }
}

pub fn hurricane_day() -> DailyWeather {
    DailyWeather {
        windspeedmax: Some(95.0),
        precip: Some(6.0),
        snow: Some(0.0),
    }
}

pub fn ts(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, day, hour, 0, 0)
        .single()
        .expect("valid test timestamp")
}

pub fn record(transcript: &str, product: &str, location: &str, at: DateTime<Utc>) -> FeedbackRecord {
    FeedbackRecord::new(transcript, product, location, at)
}

/// Config with no inter-batch sleep so tests never wait on the clock.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.scoring.inter_batch_delay_ms = 0;
    config.outage.seed = Some(7);
    config
}
