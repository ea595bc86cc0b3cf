//! Persistent caching of fitted feature transforms.
//!
//! An existing cached value always wins: once a transform is stored, later
//! sessions reuse it verbatim and ignore their own vectorizer config until
//! the entry is invalidated. Unreadable cached bytes are a hard error and
//! never trigger a silent refit.

use crate::application::ml::vectorizer::{TfidfVectorizer, VectorizerConfig};
use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::ports::BlobStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::info;

/// Typed cache of JSON-serialized values over a [`BlobStore`].
pub struct Cache<V> {
    store: Arc<dyn BlobStore>,
    _value: PhantomData<fn() -> V>,
}

impl<V: Serialize + DeserializeOwned> Cache<V> {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            _value: PhantomData,
        }
    }

    /// Cached value for `key`, if any.
    pub fn get(&self, key: &str) -> PipelineResult<Option<V>> {
        match self.store.read(key)? {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|e| {
                PipelineError::CacheCorruption {
                    key: key.to_string(),
                    reason: e.to_string(),
                }
            }),
        }
    }

    pub fn put(&self, key: &str, value: &V) -> PipelineResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.store.write(key, &bytes)
    }

    /// Returns the cached value, or computes, stores and returns it.
    pub fn get_or_insert_with<F>(&self, key: &str, build: F) -> PipelineResult<V>
    where
        F: FnOnce() -> PipelineResult<V>,
    {
        if let Some(value) = self.get(key)? {
            return Ok(value);
        }
        let value = build()?;
        self.put(key, &value)?;
        Ok(value)
    }

    /// Drops the entry for `key`. Returns whether anything was cached.
    pub fn invalidate(&self, key: &str) -> PipelineResult<bool> {
        self.store.remove(key)
    }
}

/// Cache key used for the movement vectorizer.
pub const MOVEMENT_VECTORIZER_KEY: &str = "movement_vectorizer.json";
pub const SENTIMENT_VECTORIZER_KEY: &str = "sentiment_vectorizer.json";

/// Feature extractor cache bound to one well-known key.
pub struct FeatureCache {
    cache: Cache<TfidfVectorizer>,
    key: String,
}

impl FeatureCache {
    pub fn new(store: Arc<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            cache: Cache::new(store),
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Loads the cached transform, or fits one on `corpus` and stores it.
    ///
    /// `config` only matters when nothing is cached yet.
    pub fn get_or_build<S: AsRef<str>>(
        &self,
        corpus: &[S],
        config: &VectorizerConfig,
    ) -> PipelineResult<TfidfVectorizer> {
        if let Some(existing) = self.cache.get(&self.key)? {
            info!(
                "Vectorizer exists under {}. Loaded ({} features).",
                self.key,
                existing.n_features()
            );
            return Ok(existing);
        }

        info!(
            "Fitting vectorizer on {} training texts (max_features={})",
            corpus.len(),
            config.max_features
        );
        let fitted = TfidfVectorizer::fit(corpus, config)?;
        self.cache.put(&self.key, &fitted)?;
        info!("Vectorizer saved under {}.", self.key);
        Ok(fitted)
    }

    pub fn invalidate(&self) -> PipelineResult<bool> {
        let removed = self.cache.invalidate(&self.key)?;
        if removed {
            info!("Invalidated cached vectorizer {}", self.key);
        }
        Ok(removed)
    }
}
