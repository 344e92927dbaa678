//! Rule table persistence
//!
//! The engine reads its `PolicyRule` table through a pluggable store.
//! The store is the host's concern — the engine never writes rules during
//! scanning, and a missing or partial table degrades to the fail-safe
//! blocking default at evaluation time rather than failing the load.

use crate::error::{Result, ShieldError};
use crate::policy::RuleTable;
use std::path::{Path, PathBuf};

/// Trait for loading and saving the policy rule table
pub trait RuleStore: Send + Sync {
    /// Load the full rule table
    fn load(&self) -> Result<RuleTable>;

    /// Save the full rule table
    fn save(&self, rules: &RuleTable) -> Result<()>;
}

/// JSON file-based rule store
///
/// Persists the rule table as a JSON file on disk. Atomic writes via
/// temp file + rename to prevent corruption. A missing file loads the
/// default table.
pub struct FileRuleStore {
    path: PathBuf,
}

impl FileRuleStore {
    /// Create a new file rule store at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuleStore for FileRuleStore {
    fn load(&self) -> Result<RuleTable> {
        if !self.path.exists() {
            return Ok(RuleTable::with_defaults());
        }

        let json = std::fs::read_to_string(&self.path).map_err(|e| {
            ShieldError::Config(format!(
                "Failed to read rule file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let rules: RuleTable = serde_json::from_str(&json).map_err(|e| {
            ShieldError::Config(format!(
                "Failed to parse rule file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(
            path = %self.path.display(),
            count = rules.len(),
            "Rules loaded"
        );
        Ok(rules)
    }

    fn save(&self, rules: &RuleTable) -> Result<()> {
        let json = serde_json::to_string_pretty(rules)?;

        // Atomic write: write to temp file, then rename
        let tmp_path = self.path.with_extension("tmp");

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ShieldError::Config(format!(
                    "Failed to create rule directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        std::fs::write(&tmp_path, json).map_err(|e| {
            ShieldError::Config(format!(
                "Failed to write rule file {}: {}",
                tmp_path.display(),
                e
            ))
        })?;

        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            ShieldError::Config(format!(
                "Failed to rename rule file {} → {}: {}",
                tmp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %self.path.display(), "Rules saved");
        Ok(())
    }
}

/// In-memory rule store for testing
///
/// Stores the table in memory — lost on drop, but useful for tests.
#[derive(Default)]
pub struct MemoryRuleStore {
    rules: std::sync::RwLock<RuleTable>,
}

impl MemoryRuleStore {
    /// Create a store pre-populated with a table
    pub fn with_table(rules: RuleTable) -> Self {
        Self {
            rules: std::sync::RwLock::new(rules),
        }
    }
}

impl RuleStore for MemoryRuleStore {
    fn load(&self) -> Result<RuleTable> {
        let rules = self.rules.read().map_err(|e| {
            ShieldError::Config(format!("Failed to acquire rule lock: {}", e))
        })?;
        Ok(rules.clone())
    }

    fn save(&self, rules: &RuleTable) -> Result<()> {
        let mut guard = self.rules.write().map_err(|e| {
            ShieldError::Config(format!("Failed to acquire rule lock: {}", e))
        })?;
        *guard = rules.clone();
        Ok(())
    }
}
