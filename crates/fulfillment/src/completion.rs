//! Debounced, cached address completion.
//!
//! Every keystroke may start its own [`CompletionCache::get_completions`]
//! call. Each call waits out the debounce interval, then drops its result if
//! a newer keystroke was recorded in the meantime. Surviving calls go through
//! a session-wide cache keyed by the exact input text, so the geocoding
//! provider sees each distinct text at most once per session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use common::address::DEFAULT_COUNTRY;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::services::geocoding::GeocodingProvider;

/// Default wait before a keystroke is processed.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(2);

/// Inputs shorter than this get no suggestions.
pub const DEFAULT_MIN_LENGTH: usize = 3;

/// Tuning for completion requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionConfig {
    pub debounce: Duration,
    /// Minimum input length, in characters.
    pub min_length: usize,
    /// Country the provider restricts predictions to.
    pub country: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            min_length: DEFAULT_MIN_LENGTH,
            country: DEFAULT_COUNTRY.to_string(),
        }
    }
}

/// A completion offered to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    /// Full suggested text.
    pub text: String,
    /// Number of characters of the current input it replaces.
    pub replace_len: usize,
}

/// State shared by every completion request of one interactive session.
#[derive(Debug, Default)]
pub struct CompletionSession {
    latest: Mutex<String>,
    cache: tokio::sync::Mutex<HashMap<String, Vec<Suggestion>>>,
}

impl CompletionSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, text: &str) {
        let mut latest = self.latest.lock().unwrap_or_else(PoisonError::into_inner);
        latest.clear();
        latest.push_str(text);
    }

    fn is_latest(&self, text: &str) -> bool {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) == text
    }

    /// Returns the most recently requested text.
    pub fn latest(&self) -> String {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of cached inputs.
    pub async fn cached_len(&self) -> usize {
        self.cache.lock().await.len()
    }
}

/// Debounced completion service over a geocoding provider.
#[derive(Debug)]
pub struct CompletionCache<G> {
    provider: Arc<G>,
    session: Arc<CompletionSession>,
    config: CompletionConfig,
}

impl<G> Clone for CompletionCache<G> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            session: Arc::clone(&self.session),
            config: self.config.clone(),
        }
    }
}

impl<G: GeocodingProvider> CompletionCache<G> {
    pub fn new(
        provider: Arc<G>,
        session: Arc<CompletionSession>,
        config: CompletionConfig,
    ) -> Self {
        Self {
            provider,
            session,
            config,
        }
    }

    pub fn session(&self) -> &Arc<CompletionSession> {
        &self.session
    }

    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    /// Returns suggestions for `text`, or nothing if the call went stale,
    /// the text is too short or the provider failed.
    ///
    /// Provider failures are not cached: a failing text is sent to the
    /// provider again on every keystroke that requests it.
    pub async fn get_completions(&self, text: &str) -> Vec<Suggestion> {
        self.session.record(text);
        if !self.config.debounce.is_zero() {
            tokio::time::sleep(self.config.debounce).await;
        }

        if !self.session.is_latest(text) {
            metrics::counter!("completion_stale_total").increment(1);
            tracing::trace!(text, "superseded by newer input");
            return Vec::new();
        }
        if text.chars().count() < self.config.min_length {
            return Vec::new();
        }

        let mut cache = self.session.cache.lock().await;
        if let Some(hit) = cache.get(text) {
            metrics::counter!("completion_cache_hits_total").increment(1);
            return hit.clone();
        }
        metrics::counter!("completion_cache_misses_total").increment(1);

        match self.provider.autocomplete(text, &self.config.country).await {
            Ok(predictions) => {
                let replace_len = text.chars().count();
                let suggestions: Vec<Suggestion> = predictions
                    .into_iter()
                    .map(|p| Suggestion {
                        text: p.description,
                        replace_len,
                    })
                    .collect();
                cache.insert(text.to_string(), suggestions.clone());
                suggestions
            }
            Err(e) => {
                // Not cached, so the same text is retried on the next keystroke
                tracing::warn!(text, error = %e, "address completion failed");
                Vec::new()
            }
        }
    }
}

impl<G: GeocodingProvider + 'static> CompletionCache<G> {
    /// Runs [`Self::get_completions`] on its own task, one per keystroke.
    pub fn spawn_completions(&self, text: impl Into<String>) -> JoinHandle<Vec<Suggestion>> {
        let this = self.clone();
        let text = text.into();
        tokio::spawn(async move { this.get_completions(&text).await })
    }
}
