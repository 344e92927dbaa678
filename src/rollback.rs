//! Optimistic insertion and compensating rollback
//!
//! A user action is gated by the fast pattern decision and optionally
//! reversed by the slow entity decision. The coordinator owns at most one
//! in-flight `InsertionContext` per surface: the snapshot captured at
//! action time (strictly before any mutation) is the only sound basis for
//! rollback once the original node may have been detached or replaced.
//!
//! State machine per action: `Idle → PendingDecision → { Committed,
//! RolledBack }`. Blocked actions wait for the host's allow/deny choice;
//! warn/clean actions commit optimistically and stay revocable until
//! their revision lands.

use crate::error::{Result, ShieldError};
use crate::surface::{SurfaceAnchor, SurfaceRegistry, TargetSurface};
use crate::types::{Outcome, ScanDecision};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Snapshot of a user action, sufficient to reverse it later
#[derive(Debug, Clone)]
pub struct InsertionContext {
    /// Context identifier (ctx-<uuid>)
    pub id: String,

    /// Surface the action targeted
    pub surface_id: String,

    /// Structural anchor captured at action time, never re-inferred
    pub anchor: SurfaceAnchor,

    /// Full surface content before any mutation
    pub prior_content: String,

    /// Exact text the action inserts
    pub inserted_value: String,

    /// Monotonic stamp; a newer context for the same surface supersedes
    /// this one
    pub generation: u64,
}

/// Lifecycle of one gated action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionState {
    /// No action in flight for the surface
    Idle,
    /// Blocked by the initial decision, awaiting the host's choice
    PendingDecision,
    /// Applied to the surface; revocable until the revision lands
    Committed,
    /// Discarded or reversed
    RolledBack,
}

/// Result of submitting an action against its initial decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Initial decision blocks: nothing written, host must allow or deny
    AwaitingChoice { generation: u64 },
    /// Optimistically committed pending the revised decision
    Committed { generation: u64 },
}

impl SubmitOutcome {
    /// The generation stamp to pair with `apply_revision`
    pub fn generation(&self) -> u64 {
        match self {
            SubmitOutcome::AwaitingChoice { generation } => *generation,
            SubmitOutcome::Committed { generation } => *generation,
        }
    }
}

/// Boundary for non-fatal engine notices to the host UI
#[async_trait]
pub trait EngineNotifier: Send + Sync {
    /// A compensating rollback could not locate any plausible surface
    async fn rollback_failed(&self, surface_id: &str, reason: &str);
}

/// In-memory notifier that records notices, for testing
#[derive(Default)]
pub struct MemoryNotifier {
    notices: RwLock<Vec<(String, String)>>,
}

impl MemoryNotifier {
    /// Recorded (surface_id, reason) pairs
    pub async fn notices(&self) -> Vec<(String, String)> {
        self.notices.read().await.clone()
    }
}

#[async_trait]
impl EngineNotifier for MemoryNotifier {
    async fn rollback_failed(&self, surface_id: &str, reason: &str) {
        self.notices
            .write()
            .await
            .push((surface_id.to_string(), reason.to_string()));
    }
}

struct InFlight {
    ctx: InsertionContext,
    state: InsertionState,
}

/// Coordinator for the optimistic-insert-then-compensate protocol
pub struct InsertionCoordinator {
    registry: Arc<SurfaceRegistry>,
    notifier: Arc<dyn EngineNotifier>,

    /// At most one in-flight context per surface
    inflight: RwLock<HashMap<String, InFlight>>,
    generation: AtomicU64,
}

impl InsertionCoordinator {
    /// Create a coordinator over a surface registry
    pub fn new(registry: Arc<SurfaceRegistry>, notifier: Arc<dyn EngineNotifier>) -> Self {
        Self {
            registry,
            notifier,
            inflight: RwLock::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Gate a user action with its initial decision
    ///
    /// Captures the insertion context strictly before any mutation. A
    /// blocking initial decision holds the action for the host's choice;
    /// otherwise the action commits optimistically and stays revocable
    /// until [`apply_revision`](Self::apply_revision) consumes it. A
    /// previous in-flight context for the same surface is superseded and
    /// discarded.
    pub async fn submit(
        &self,
        surface: &dyn TargetSurface,
        inserted_value: &str,
        initial: &ScanDecision,
    ) -> SubmitOutcome {
        // Snapshot before any write touches the surface
        let ctx = InsertionContext {
            id: format!("ctx-{}", uuid::Uuid::new_v4()),
            surface_id: surface.id().to_string(),
            anchor: surface.anchor(),
            prior_content: surface.read_content(),
            inserted_value: inserted_value.to_string(),
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
        };
        let generation = ctx.generation;
        let surface_id = ctx.surface_id.clone();

        let mut inflight = self.inflight.write().await;
        if let Some(old) = inflight.remove(&surface_id) {
            tracing::debug!(
                surface = %surface_id,
                superseded = old.ctx.generation,
                "Superseding in-flight insertion context"
            );
        }

        match initial.outcome {
            Outcome::Block => {
                tracing::info!(
                    surface = %surface_id,
                    generation,
                    "Action blocked pending user choice"
                );
                inflight.insert(
                    surface_id,
                    InFlight {
                        ctx,
                        state: InsertionState::PendingDecision,
                    },
                );
                SubmitOutcome::AwaitingChoice { generation }
            }
            Outcome::Warn | Outcome::Clean => {
                surface.write_content(&composed(&ctx));
                inflight.insert(
                    surface_id,
                    InFlight {
                        ctx,
                        state: InsertionState::Committed,
                    },
                );
                SubmitOutcome::Committed { generation }
            }
        }
    }

    /// Resolve a blocked action with the host's allow/deny choice
    ///
    /// Allow commits from the stored context — not a live re-read, since
    /// the surface may have changed while the prompt was up. Deny
    /// discards the context. Both transitions are terminal.
    pub async fn resolve_blocked(&self, surface_id: &str, allow: bool) -> Result<InsertionState> {
        let mut inflight = self.inflight.write().await;
        match inflight.get(surface_id) {
            Some(entry) if entry.state == InsertionState::PendingDecision => {}
            _ => {
                return Err(ShieldError::NotFound(format!(
                    "No blocked action pending for surface '{}'",
                    surface_id
                )))
            }
        }
        let entry = inflight.remove(surface_id).expect("checked above");
        drop(inflight);

        if !allow {
            tracing::info!(surface = %surface_id, "Blocked action denied, context discarded");
            return Ok(InsertionState::RolledBack);
        }

        if let Some(surface) = self.registry.get(surface_id) {
            surface.write_content(&composed(&entry.ctx));
            surface.focus();
            tracing::info!(surface = %surface_id, "Blocked action committed after allow");
        } else {
            tracing::warn!(
                surface = %surface_id,
                "Surface gone before allowed commit, nothing written"
            );
        }
        Ok(InsertionState::Committed)
    }

    /// Apply a late revised decision to the in-flight action
    ///
    /// A stale generation (superseded by a newer action) is a no-op. A
    /// non-blocking revision accepts and destroys the context. A blocking
    /// revision after an optimistic commit triggers the compensating
    /// rollback: the original surface if still attached, else a
    /// best-effort candidate of the same anchor kind, else a non-fatal
    /// notice through the notifier.
    pub async fn apply_revision(&self, surface_id: &str, generation: u64, revised: &ScanDecision) {
        let entry = {
            let mut inflight = self.inflight.write().await;
            match inflight.get(surface_id) {
                None => return,
                Some(entry) => {
                    if entry.ctx.generation != generation {
                        tracing::debug!(
                            surface = %surface_id,
                            generation,
                            current = entry.ctx.generation,
                            "Ignoring revision for superseded action"
                        );
                        return;
                    }
                    // A blocked action's fate belongs to the user prompt,
                    // not the revision
                    if entry.state != InsertionState::Committed {
                        return;
                    }
                }
            }
            inflight.remove(surface_id).expect("checked above")
        };

        if revised.outcome != Outcome::Block {
            tracing::debug!(surface = %surface_id, generation, "Revision accepted commit");
            return;
        }

        let target = self
            .registry
            .get(surface_id)
            .filter(|s| s.is_attached())
            .or_else(|| self.registry.candidate_for(entry.ctx.anchor.kind()));

        match target {
            Some(surface) => {
                surface.write_content(&entry.ctx.prior_content);
                surface.focus();
                tracing::info!(
                    surface = %surface.id(),
                    original = %surface_id,
                    generation,
                    "Compensating rollback applied"
                );
            }
            None => {
                tracing::warn!(
                    surface = %surface_id,
                    generation,
                    "Compensating rollback found no plausible surface"
                );
                self.notifier
                    .rollback_failed(surface_id, "no attached surface of matching kind")
                    .await;
            }
        }
    }

    /// Current state of the surface's in-flight action, `Idle` if none
    pub async fn state_of(&self, surface_id: &str) -> InsertionState {
        let inflight = self.inflight.read().await;
        inflight
            .get(surface_id)
            .map(|entry| entry.state)
            .unwrap_or(InsertionState::Idle)
    }
}

/// Content of the surface after committing the context's insertion
fn composed(ctx: &InsertionContext) -> String {
    format!("{}{}", ctx.prior_content, ctx.inserted_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::MemorySurface;
    use crate::types::Finding;

    fn block_decision() -> ScanDecision {
        ScanDecision::from_partition(vec![Finding::pattern("email", "email", "a@b.co")], vec![])
    }

    fn clean_decision() -> ScanDecision {
        ScanDecision::clean()
    }

    struct Fixture {
        registry: Arc<SurfaceRegistry>,
        notifier: Arc<MemoryNotifier>,
        coordinator: InsertionCoordinator,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(SurfaceRegistry::new());
        let notifier = Arc::new(MemoryNotifier::default());
        let coordinator = InsertionCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&notifier) as Arc<dyn EngineNotifier>,
        );
        Fixture {
            registry,
            notifier,
            coordinator,
        }
    }

    #[tokio::test]
    async fn test_optimistic_commit_writes_composed_content() {
        let f = fixture();
        let surface = Arc::new(MemorySurface::plain_field("input"));
        surface.set_content("draft ");
        f.registry.register(surface.clone());

        let outcome = f
            .coordinator
            .submit(surface.as_ref(), "hello", &clean_decision())
            .await;
        assert!(matches!(outcome, SubmitOutcome::Committed { .. }));
        assert_eq!(surface.read_content(), "draft hello");
        assert_eq!(
            f.coordinator.state_of("input").await,
            InsertionState::Committed
        );
    }

    #[tokio::test]
    async fn test_blocked_action_leaves_surface_untouched() {
        let f = fixture();
        let surface = Arc::new(MemorySurface::plain_field("input"));
        surface.set_content("draft ");
        f.registry.register(surface.clone());

        let outcome = f
            .coordinator
            .submit(surface.as_ref(), "a@b.co", &block_decision())
            .await;
        assert!(matches!(outcome, SubmitOutcome::AwaitingChoice { .. }));
        assert_eq!(surface.read_content(), "draft ");
        assert_eq!(
            f.coordinator.state_of("input").await,
            InsertionState::PendingDecision
        );
    }

    #[tokio::test]
    async fn test_allow_commits_from_stored_context() {
        let f = fixture();
        let surface = Arc::new(MemorySurface::plain_field("input"));
        surface.set_content("draft ");
        f.registry.register(surface.clone());

        f.coordinator
            .submit(surface.as_ref(), "a@b.co", &block_decision())
            .await;

        // Surface content changes while the prompt is up; the stored
        // snapshot governs the commit regardless
        surface.set_content("mutated meanwhile");

        let state = f.coordinator.resolve_blocked("input", true).await.unwrap();
        assert_eq!(state, InsertionState::Committed);
        assert_eq!(surface.read_content(), "draft a@b.co");
        assert_eq!(f.coordinator.state_of("input").await, InsertionState::Idle);
    }

    #[tokio::test]
    async fn test_deny_discards_context() {
        let f = fixture();
        let surface = Arc::new(MemorySurface::plain_field("input"));
        surface.set_content("draft ");
        f.registry.register(surface.clone());

        f.coordinator
            .submit(surface.as_ref(), "a@b.co", &block_decision())
            .await;
        let state = f.coordinator.resolve_blocked("input", false).await.unwrap();
        assert_eq!(state, InsertionState::RolledBack);
        assert_eq!(surface.read_content(), "draft ");
        assert_eq!(f.coordinator.state_of("input").await, InsertionState::Idle);
    }

    #[tokio::test]
    async fn test_resolve_without_pending_action_errors() {
        let f = fixture();
        let result = f.coordinator.resolve_blocked("input", true).await;
        assert!(matches!(result, Err(ShieldError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_late_block_revision_rolls_back() {
        let f = fixture();
        let surface = Arc::new(MemorySurface::plain_field("input"));
        surface.set_content("before|");
        f.registry.register(surface.clone());

        let outcome = f
            .coordinator
            .submit(surface.as_ref(), "john@x.com", &clean_decision())
            .await;
        assert_eq!(surface.read_content(), "before|john@x.com");

        f.coordinator
            .apply_revision("input", outcome.generation(), &block_decision())
            .await;
        assert_eq!(surface.read_content(), "before|");
        assert_eq!(f.coordinator.state_of("input").await, InsertionState::Idle);
    }

    #[tokio::test]
    async fn test_clean_revision_accepts_commit() {
        let f = fixture();
        let surface = Arc::new(MemorySurface::plain_field("input"));
        f.registry.register(surface.clone());

        let outcome = f
            .coordinator
            .submit(surface.as_ref(), "hello", &clean_decision())
            .await;
        f.coordinator
            .apply_revision("input", outcome.generation(), &clean_decision())
            .await;

        assert_eq!(surface.read_content(), "hello");
        assert_eq!(f.coordinator.state_of("input").await, InsertionState::Idle);
    }

    #[tokio::test]
    async fn test_rollback_falls_back_to_candidate_of_same_kind() {
        let f = fixture();
        let original = Arc::new(MemorySurface::plain_field("original"));
        original.set_content("prior");
        f.registry.register(original.clone());

        let outcome = f
            .coordinator
            .submit(original.as_ref(), " inserted", &clean_decision())
            .await;

        // The original node is replaced by the host UI
        original.detach();
        f.registry.unregister("original");
        let replacement = Arc::new(MemorySurface::plain_field("replacement"));
        replacement.set_content("prior inserted");
        f.registry.register(replacement.clone());

        f.coordinator
            .apply_revision("original", outcome.generation(), &block_decision())
            .await;
        assert_eq!(replacement.read_content(), "prior");
    }

    #[tokio::test]
    async fn test_rollback_target_lost_emits_notice() {
        let f = fixture();
        let surface = Arc::new(MemorySurface::plain_field("input"));
        f.registry.register(surface.clone());

        let outcome = f
            .coordinator
            .submit(surface.as_ref(), "text", &clean_decision())
            .await;

        surface.detach();
        f.registry.unregister("input");

        f.coordinator
            .apply_revision("input", outcome.generation(), &block_decision())
            .await;

        let notices = f.notifier.notices().await;
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].0, "input");
    }

    #[tokio::test]
    async fn test_supersession_discards_older_context() {
        let f = fixture();
        let surface = Arc::new(MemorySurface::plain_field("input"));
        f.registry.register(surface.clone());

        let first = f
            .coordinator
            .submit(surface.as_ref(), "first", &clean_decision())
            .await;
        let second = f
            .coordinator
            .submit(surface.as_ref(), " second", &clean_decision())
            .await;
        assert_eq!(surface.read_content(), "first second");

        // The first action's late block revision must trigger nothing
        f.coordinator
            .apply_revision("input", first.generation(), &block_decision())
            .await;
        assert_eq!(surface.read_content(), "first second");
        assert_eq!(
            f.coordinator.state_of("input").await,
            InsertionState::Committed
        );

        // The second action's revision still works
        f.coordinator
            .apply_revision("input", second.generation(), &block_decision())
            .await;
        assert_eq!(surface.read_content(), "first");
    }

    #[tokio::test]
    async fn test_revision_does_not_touch_pending_blocked_action() {
        let f = fixture();
        let surface = Arc::new(MemorySurface::plain_field("input"));
        surface.set_content("draft ");
        f.registry.register(surface.clone());

        let outcome = f
            .coordinator
            .submit(surface.as_ref(), "a@b.co", &block_decision())
            .await;
        f.coordinator
            .apply_revision("input", outcome.generation(), &block_decision())
            .await;

        // Still awaiting the user's choice
        assert_eq!(
            f.coordinator.state_of("input").await,
            InsertionState::PendingDecision
        );
        let state = f.coordinator.resolve_blocked("input", false).await.unwrap();
        assert_eq!(state, InsertionState::RolledBack);
    }
}
