//! Scan orchestration — two-phase evaluation over both detection layers
//!
//! The pattern layer always runs synchronously and yields the initial
//! decision before `evaluate` returns. The entity layer runs concurrently
//! when the classifier is reachable; its revised decision arrives through
//! a single-result channel. Classifier failure never fails the scan — the
//! revision degrades to the pattern-only decision and reachability is
//! marked unavailable for the probes to recover.

use crate::aggregate::aggregate;
use crate::debounce::Debouncer;
use crate::patterns::PatternMatcher;
use crate::policy::{classify, RuleTable};
use crate::provider::{
    classify_with_timeout, ClassificationProvider, FIRST_LOAD_TIMEOUT, STEADY_TIMEOUT,
};
use crate::reachability::ReachabilityMonitor;
use crate::types::{ReachabilityState, ScanDecision};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, RwLock};

/// Default token-level confidence floor applied during aggregation,
/// before per-rule thresholds
pub const DEFAULT_ENTITY_THRESHOLD: f64 = 0.5;

/// Two-phase scan result
pub struct Evaluation {
    /// Pattern-layer decision, produced synchronously
    pub initial: ScanDecision,

    /// Entity-layer revision; resolves to the merged decision, or to the
    /// pattern-only decision when the classifier was skipped or failed
    pub revision: RevisionHandle,
}

/// Single-result channel carrying the revised decision
pub struct RevisionHandle {
    rx: oneshot::Receiver<ScanDecision>,
}

impl RevisionHandle {
    /// Await the revised decision
    ///
    /// Returns `None` only if the orchestrator was dropped mid-flight.
    pub async fn wait(self) -> Option<ScanDecision> {
        self.rx.await.ok()
    }
}

/// Coordinates the pattern matcher, the classification collaborator,
/// and the policy evaluator
pub struct ScanOrchestrator {
    matcher: PatternMatcher,
    provider: Arc<dyn ClassificationProvider>,
    reachability: Arc<ReachabilityMonitor>,
    rules: Arc<RwLock<RuleTable>>,
    first_load_timeout: Duration,
    steady_timeout: Duration,
    entity_threshold: f64,
    first_call: AtomicBool,
}

impl ScanOrchestrator {
    /// Create an orchestrator with default timeouts and thresholds
    pub fn new(
        provider: Arc<dyn ClassificationProvider>,
        reachability: Arc<ReachabilityMonitor>,
        rules: RuleTable,
    ) -> Self {
        Self {
            matcher: PatternMatcher::new(),
            provider,
            reachability,
            rules: Arc::new(RwLock::new(rules)),
            first_load_timeout: FIRST_LOAD_TIMEOUT,
            steady_timeout: STEADY_TIMEOUT,
            entity_threshold: DEFAULT_ENTITY_THRESHOLD,
            first_call: AtomicBool::new(true),
        }
    }

    /// Override the classification timeouts
    pub fn with_timeouts(mut self, first_load: Duration, steady: Duration) -> Self {
        self.first_load_timeout = first_load;
        self.steady_timeout = steady;
        self
    }

    /// Override the aggregation confidence floor
    pub fn with_entity_threshold(mut self, threshold: f64) -> Self {
        self.entity_threshold = threshold;
        self
    }

    /// Override the pattern catalogue
    pub fn with_matcher(mut self, matcher: PatternMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    /// Replace the rule table
    pub async fn set_rules(&self, rules: RuleTable) {
        *self.rules.write().await = rules;
    }

    /// Reachability monitor handle
    pub fn reachability(&self) -> &Arc<ReachabilityMonitor> {
        &self.reachability
    }

    fn next_timeout(&self) -> Duration {
        if self.first_call.swap(false, Ordering::SeqCst) {
            self.first_load_timeout
        } else {
            self.steady_timeout
        }
    }

    /// Pattern-layer-only decision, for the fast typing timer
    pub async fn evaluate_patterns(&self, text: &str) -> ScanDecision {
        let findings = self.matcher.scan(text);
        let rules = self.rules.read().await;
        classify(&findings, &rules)
    }

    /// Run a two-phase scan
    ///
    /// The initial decision is computed before this call returns and is
    /// always observable strictly before the revision resolves.
    pub async fn evaluate(&self, text: &str) -> Evaluation {
        let pattern_findings = self.matcher.scan(text);
        let rules = self.rules.read().await.clone();
        let initial = classify(&pattern_findings, &rules);

        let (tx, rx) = oneshot::channel();

        if self.reachability.snapshot() == ReachabilityState::Ready {
            let provider = Arc::clone(&self.provider);
            let reachability = Arc::clone(&self.reachability);
            let text = text.to_string();
            let timeout = self.next_timeout();
            let threshold = self.entity_threshold;
            let fallback = initial.clone();

            tokio::spawn(async move {
                let revised = match classify_with_timeout(provider.as_ref(), &text, timeout).await
                {
                    Ok(tokens)
                        if reachability.snapshot() != ReachabilityState::Unavailable =>
                    {
                        let mut merged = pattern_findings;
                        merged.extend(aggregate(&tokens, threshold));
                        classify(&merged, &rules)
                    }
                    Ok(_) => {
                        // Went unavailable mid-flight: entity layer
                        // contributes nothing
                        fallback
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "Classification failed, degrading to pattern-only"
                        );
                        reachability.mark_unavailable();
                        fallback
                    }
                };
                let _ = tx.send(revised);
            });
        } else {
            tracing::debug!(
                state = ?self.reachability.snapshot(),
                "Classifier not ready, pattern-only scan"
            );
            let _ = tx.send(initial.clone());
        }

        Evaluation {
            initial,
            revision: RevisionHandle { rx },
        }
    }
}

/// Which phase a scheduled scan event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    /// Fast timer: pattern-layer decision
    Initial,
    /// Slow timer: revised decision after the entity layer completed
    Revised,
}

/// One emitted scan result from the typing scheduler
#[derive(Debug)]
pub struct ScheduledScan {
    pub surface_id: String,
    pub generation: u64,
    pub phase: ScanPhase,
    pub decision: ScanDecision,
}

/// Typing-triggered scan scheduling over two independent debounced timers
///
/// The fast timer gates the pattern layer, the slow timer the full
/// two-phase scan. Each restart cancels only its own pending timer. A
/// dispatched classification call runs to completion, but its result is
/// discarded when a newer scan for the same surface has superseded it.
pub struct ScanScheduler {
    orchestrator: Arc<ScanOrchestrator>,
    fast: Debouncer,
    slow: Debouncer,
    generation: AtomicU64,
    latest: Arc<Mutex<HashMap<String, u64>>>,
    tx: mpsc::UnboundedSender<ScheduledScan>,
}

impl ScanScheduler {
    /// Create a scheduler; the receiver yields scan events as they land
    pub fn new(
        orchestrator: Arc<ScanOrchestrator>,
        fast_delay: Duration,
        slow_delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ScheduledScan>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                orchestrator,
                fast: Debouncer::new(fast_delay),
                slow: Debouncer::new(slow_delay),
                generation: AtomicU64::new(0),
                latest: Arc::new(Mutex::new(HashMap::new())),
                tx,
            },
            rx,
        )
    }

    /// Register a text change on a surface; returns the scan generation
    pub fn on_text_changed(&self, surface_id: &str, text: &str) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.latest
            .lock()
            .expect("latest lock poisoned")
            .insert(surface_id.to_string(), generation);

        {
            let orchestrator = Arc::clone(&self.orchestrator);
            let latest = Arc::clone(&self.latest);
            let tx = self.tx.clone();
            let surface_id = surface_id.to_string();
            let text = text.to_string();
            self.fast.schedule(async move {
                let decision = orchestrator.evaluate_patterns(&text).await;
                emit(&latest, &tx, surface_id, generation, ScanPhase::Initial, decision);
            });
        }

        {
            let orchestrator = Arc::clone(&self.orchestrator);
            let latest = Arc::clone(&self.latest);
            let tx = self.tx.clone();
            let surface_id = surface_id.to_string();
            let text = text.to_string();
            self.slow.schedule(async move {
                let evaluation = orchestrator.evaluate(&text).await;
                if let Some(revised) = evaluation.revision.wait().await {
                    emit(&latest, &tx, surface_id, generation, ScanPhase::Revised, revised);
                }
            });
        }

        generation
    }
}

/// Deliver a scan event unless a newer scan superseded this generation
fn emit(
    latest: &Mutex<HashMap<String, u64>>,
    tx: &mpsc::UnboundedSender<ScheduledScan>,
    surface_id: String,
    generation: u64,
    phase: ScanPhase,
    decision: ScanDecision,
) {
    let current = latest
        .lock()
        .expect("latest lock poisoned")
        .get(&surface_id)
        .copied();
    if current != Some(generation) {
        tracing::debug!(
            surface = %surface_id,
            generation,
            "Discarding superseded scan result"
        );
        return;
    }
    let _ = tx.send(ScheduledScan {
        surface_id,
        generation,
        phase,
        decision,
    });
}
