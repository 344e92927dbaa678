//! Target surfaces — the editable regions user actions apply to
//!
//! The engine never touches a UI toolkit directly. It sees a surface as
//! three operations (`read_content`, `write_content`, `focus`) plus a
//! structural anchor captured once at action time. The anchor is a tagged
//! variant chosen at capture — never re-inferred later — so rollback can
//! reason about "a surface of the same shape" even after the original
//! node is gone.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Class of editable surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnchorKind {
    /// Plain editable field (single value, flat text)
    PlainField,
    /// Rich or structured editable region
    RichRegion,
}

/// Structural reference to a surface, captured once at action time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "kind")]
pub enum SurfaceAnchor {
    /// Flat field with a caret/selection position
    PlainField {
        selection_start: usize,
        selection_end: usize,
    },
    /// Structured region addressed by a node path
    RichRegion { node_path: Vec<usize> },
}

impl SurfaceAnchor {
    /// The anchor's kind tag
    pub fn kind(&self) -> AnchorKind {
        match self {
            SurfaceAnchor::PlainField { .. } => AnchorKind::PlainField,
            SurfaceAnchor::RichRegion { .. } => AnchorKind::RichRegion,
        }
    }
}

/// Boundary contract to one editable surface in the host UI
pub trait TargetSurface: Send + Sync {
    /// Stable surface identifier
    fn id(&self) -> &str;

    /// Capture the surface's structural anchor
    fn anchor(&self) -> SurfaceAnchor;

    /// Whether the originally referenced node is still attached
    fn is_attached(&self) -> bool;

    /// Full current content
    fn read_content(&self) -> String;

    /// Replace the full content
    fn write_content(&self, text: &str);

    /// Give the surface input focus
    fn focus(&self);
}

/// Index from surface id and anchor kind to current candidate surfaces
///
/// The host UI refreshes this registry as surfaces appear and disappear;
/// the rollback path consults it instead of holding raw references to
/// possibly-stale nodes.
#[derive(Default)]
pub struct SurfaceRegistry {
    /// Registration order preserved for candidate lookup
    order: RwLock<Vec<Arc<dyn TargetSurface>>>,
    by_id: RwLock<HashMap<String, Arc<dyn TargetSurface>>>,
}

impl SurfaceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a surface, replacing any previous registration of its id
    pub fn register(&self, surface: Arc<dyn TargetSurface>) {
        let id = surface.id().to_string();
        {
            let mut order = self.order.write().expect("registry lock poisoned");
            order.retain(|s| s.id() != id);
            order.push(Arc::clone(&surface));
        }
        self.by_id
            .write()
            .expect("registry lock poisoned")
            .insert(id, surface);
    }

    /// Remove a surface by id
    pub fn unregister(&self, id: &str) {
        self.order
            .write()
            .expect("registry lock poisoned")
            .retain(|s| s.id() != id);
        self.by_id.write().expect("registry lock poisoned").remove(id);
    }

    /// Look up a surface by id
    pub fn get(&self, id: &str) -> Option<Arc<dyn TargetSurface>> {
        self.by_id
            .read()
            .expect("registry lock poisoned")
            .get(id)
            .cloned()
    }

    /// Best-effort candidate of the given kind: the most recently
    /// registered surface of that kind that is still attached
    pub fn candidate_for(&self, kind: AnchorKind) -> Option<Arc<dyn TargetSurface>> {
        self.order
            .read()
            .expect("registry lock poisoned")
            .iter()
            .rev()
            .find(|s| s.is_attached() && s.anchor().kind() == kind)
            .cloned()
    }

    /// Number of registered surfaces
    pub fn len(&self) -> usize {
        self.order.read().expect("registry lock poisoned").len()
    }

    /// True when no surfaces are registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory surface for testing
pub struct MemorySurface {
    id: String,
    anchor: SurfaceAnchor,
    content: Mutex<String>,
    attached: AtomicBool,
    focus_count: AtomicUsize,
}

impl MemorySurface {
    /// Create a plain editable field
    pub fn plain_field(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            anchor: SurfaceAnchor::PlainField {
                selection_start: 0,
                selection_end: 0,
            },
            content: Mutex::new(String::new()),
            attached: AtomicBool::new(true),
            focus_count: AtomicUsize::new(0),
        }
    }

    /// Create a rich editable region
    pub fn rich_region(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            anchor: SurfaceAnchor::RichRegion { node_path: vec![0] },
            content: Mutex::new(String::new()),
            attached: AtomicBool::new(true),
            focus_count: AtomicUsize::new(0),
        }
    }

    /// Set the content directly (simulating user edits)
    pub fn set_content(&self, text: impl Into<String>) {
        *self.content.lock().expect("content lock poisoned") = text.into();
    }

    /// Simulate the node being detached/replaced by the host UI
    pub fn detach(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }

    /// How many times the surface was focused
    pub fn focus_count(&self) -> usize {
        self.focus_count.load(Ordering::SeqCst)
    }
}

impl TargetSurface for MemorySurface {
    fn id(&self) -> &str {
        &self.id
    }

    fn anchor(&self) -> SurfaceAnchor {
        self.anchor.clone()
    }

    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    fn read_content(&self) -> String {
        self.content.lock().expect("content lock poisoned").clone()
    }

    fn write_content(&self, text: &str) {
        *self.content.lock().expect("content lock poisoned") = text.to_string();
    }

    fn focus(&self) {
        self.focus_count.fetch_add(1, Ordering::SeqCst);
    }
}
