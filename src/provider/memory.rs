//! In-memory classification provider for testing and single-process use
//!
//! Scripted responses keyed by exact input text, with optional artificial
//! latency and failure injection so orchestration paths (timeout,
//! degradation, reachability flapping) can be exercised deterministically.

use crate::error::{Result, ShieldError};
use crate::provider::ClassificationProvider;
use crate::types::TokenClassification;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// Scripted in-memory classifier
#[derive(Default)]
pub struct MemoryClassifier {
    /// Exact input text → scripted token stream
    responses: RwLock<HashMap<String, Vec<TokenClassification>>>,

    /// Artificial delay applied to every call
    latency: RwLock<Option<Duration>>,

    /// When set, `classify` returns an error
    failing: AtomicBool,

    /// Health probe result; defaults to healthy
    unhealthy: AtomicBool,
}

impl MemoryClassifier {
    /// Create a healthy classifier with no scripted responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the token stream returned for an exact input text
    pub fn script(&self, text: impl Into<String>, tokens: Vec<TokenClassification>) {
        self.responses
            .write()
            .expect("responses lock poisoned")
            .insert(text.into(), tokens);
    }

    /// Apply an artificial delay to every subsequent call
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.write().expect("latency lock poisoned") = latency;
    }

    /// Make subsequent `classify` calls fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Control the health probe result
    pub fn set_healthy(&self, healthy: bool) {
        self.unhealthy.store(!healthy, Ordering::SeqCst);
    }

    async fn apply_latency(&self) {
        let latency = *self.latency.read().expect("latency lock poisoned");
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ClassificationProvider for MemoryClassifier {
    async fn classify(&self, text: &str) -> Result<Vec<TokenClassification>> {
        self.apply_latency().await;

        if self.failing.load(Ordering::SeqCst) {
            return Err(ShieldError::Classification(
                "memory classifier failure injected".to_string(),
            ));
        }

        let responses = self.responses.read().expect("responses lock poisoned");
        Ok(responses.get(text).cloned().unwrap_or_default())
    }

    async fn health(&self) -> Result<bool> {
        self.apply_latency().await;
        Ok(!self.unhealthy.load(Ordering::SeqCst))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
