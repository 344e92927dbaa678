//! Classification provider trait — the boundary to the token classifier
//!
//! The neural classifier itself lives outside this crate (a sidecar
//! process, a WASM bundle, a remote service). Implementations of
//! `ClassificationProvider` adapt whatever transport reaches it to a
//! uniform async call. The engine only ever invokes the provider through
//! [`classify_with_timeout`], so a wedged collaborator can never block a
//! scan indefinitely.

use crate::error::{Result, ShieldError};
use crate::types::TokenClassification;
use async_trait::async_trait;
use std::time::Duration;

pub mod memory;

/// Timeout cap for the first classification call, while the model may
/// still be loading
pub const FIRST_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for steady-state classification calls
pub const STEADY_TIMEOUT: Duration = Duration::from_secs(5);

/// Core trait for token classification backends
#[async_trait]
pub trait ClassificationProvider: Send + Sync {
    /// Classify text into token-level BIO entity classifications
    ///
    /// May suspend while the underlying model loads or computes. Callers
    /// must bound the call with [`classify_with_timeout`].
    async fn classify(&self, text: &str) -> Result<Vec<TokenClassification>>;

    /// Liveness check — true if the provider can currently serve calls
    async fn health(&self) -> Result<bool>;

    /// Provider name (e.g., "memory", "sidecar")
    fn name(&self) -> &str;
}

/// Invoke `classify` under a bounded timeout
///
/// A timeout is reported as `ShieldError::Timeout`; the underlying call
/// is not interrupted — its eventual result is simply never observed.
pub async fn classify_with_timeout(
    provider: &dyn ClassificationProvider,
    text: &str,
    limit: Duration,
) -> Result<Vec<TokenClassification>> {
    match tokio::time::timeout(limit, provider.classify(text)).await {
        Ok(result) => result,
        Err(_) => Err(ShieldError::Timeout(format!(
            "classification exceeded {}ms",
            limit.as_millis()
        ))),
    }
}

/// Invoke `health` under a bounded timeout; any failure counts as unhealthy
pub async fn probe_with_timeout(provider: &dyn ClassificationProvider, limit: Duration) -> bool {
    matches!(
        tokio::time::timeout(limit, provider.health()).await,
        Ok(Ok(true))
    )
}
