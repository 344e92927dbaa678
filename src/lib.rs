//! # privshield
//!
//! Dual-layer sensitive-data detection, policy evaluation, and
//! optimistic-insertion rollback for user-authored text.
//!
//! ## Overview
//!
//! `privshield` inspects text before it reaches an external destination
//! and decides whether it contains sensitive information. A deterministic
//! regex layer answers synchronously; a probabilistic token-classification
//! layer (reached through a pluggable provider) revises the answer when it
//! is available. The insertion coordinator lets a fast check gate an
//! action immediately while the slower check may still veto it after the
//! fact, safely reversing the committed action.
//!
//! ## Quick Start
//!
//! ```rust
//! use privshield::{MemoryClassifier, ReachabilityMonitor, RuleTable, ScanOrchestrator};
//! use std::sync::Arc;
//!
//! # async fn example() -> privshield::Result<()> {
//! let monitor = Arc::new(ReachabilityMonitor::new());
//! monitor.begin_loading();
//! monitor.mark_ready();
//!
//! let orchestrator = ScanOrchestrator::new(
//!     Arc::new(MemoryClassifier::new()),
//!     monitor,
//!     RuleTable::with_defaults(),
//! );
//!
//! let evaluation = orchestrator.evaluate("Contact john@x.com").await;
//! assert!(evaluation.initial.is_blocking());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **PatternMatcher** — synchronous regex layer, always available
//! - **aggregate** — merges token-level BIO classifications into entities
//! - **classify** — policy evaluation over the merged finding set
//! - **ScanOrchestrator** — two-phase evaluation with degradation
//! - **ReachabilityMonitor** — classifier availability state machine
//! - **InsertionCoordinator** — optimistic commit and compensating rollback
//! - **ClassificationProvider** trait — boundary to the token classifier

pub mod aggregate;
pub mod debounce;
pub mod error;
pub mod orchestrator;
pub mod patterns;
pub mod policy;
pub mod provider;
pub mod reachability;
pub mod rollback;
pub mod rules;
pub mod surface;
pub mod types;

// Re-export core types
pub use aggregate::aggregate;
pub use debounce::Debouncer;
pub use error::{Result, ShieldError};
pub use orchestrator::{
    Evaluation, RevisionHandle, ScanOrchestrator, ScanPhase, ScanScheduler, ScheduledScan,
    DEFAULT_ENTITY_THRESHOLD,
};
pub use patterns::{PatternMatcher, PatternRule, DEFAULT_PATTERNS};
pub use policy::{classify, RuleTable};
pub use provider::{
    classify_with_timeout, probe_with_timeout, ClassificationProvider, FIRST_LOAD_TIMEOUT,
    STEADY_TIMEOUT,
};
pub use reachability::ReachabilityMonitor;
pub use rollback::{
    EngineNotifier, InsertionContext, InsertionCoordinator, InsertionState, MemoryNotifier,
    SubmitOutcome,
};
pub use rules::{FileRuleStore, MemoryRuleStore, RuleStore};
pub use surface::{AnchorKind, MemorySurface, SurfaceAnchor, SurfaceRegistry, TargetSurface};
pub use types::{
    BioTag, EntityCategory, Finding, Outcome, PolicyRule, ReachabilityState, ScanDecision,
    Severity, SourceLayer, Span, TokenClassification, REDACTED_PLACEHOLDER,
};

// Re-export the in-memory provider for convenience
pub use provider::memory::MemoryClassifier;
