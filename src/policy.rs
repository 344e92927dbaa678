//! Policy evaluation — turn raw findings into a block/warn/allow decision
//!
//! Unknown rule ids fail safe toward protection: a finding whose rule is
//! missing from the table is treated as enabled and blocking, logged as a
//! configuration gap but never surfaced to the caller.

use crate::types::{Finding, PolicyRule, ScanDecision, Severity, SourceLayer};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The configured policy rule table, keyed by rule id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleTable {
    rules: HashMap<String, PolicyRule>,
}

impl RuleTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The default rule set covering the built-in pattern catalogue and
    /// the three entity categories
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        for rule in [
            PolicyRule::new("email", true, true, Severity::High),
            PolicyRule::new("phone_number", true, false, Severity::Medium),
            PolicyRule::new("ssn", true, true, Severity::Critical),
            PolicyRule::new("credit_card", true, true, Severity::Critical),
            PolicyRule::new("ip_address", true, false, Severity::Low),
            PolicyRule::new("credential", true, true, Severity::Critical),
            PolicyRule::new("passport_number", true, true, Severity::High),
            PolicyRule::new("driver_license", true, true, Severity::High),
            PolicyRule::new("medical_record_number", true, true, Severity::Critical),
            PolicyRule::new("person", true, false, Severity::Low).with_confidence_threshold(0.75),
            PolicyRule::new("organization", true, false, Severity::Low)
                .with_confidence_threshold(0.75),
            PolicyRule::new("location", true, false, Severity::Low).with_confidence_threshold(0.75),
        ] {
            table.insert(rule);
        }
        table
    }

    /// Insert or replace a rule
    pub fn insert(&mut self, rule: PolicyRule) {
        self.rules.insert(rule.id.clone(), rule);
    }

    /// Look up a rule by id
    pub fn get(&self, id: &str) -> Option<&PolicyRule> {
        self.rules.get(id)
    }

    /// Number of configured rules
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rules are configured
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterate over all rules
    pub fn iter(&self) -> impl Iterator<Item = &PolicyRule> {
        self.rules.values()
    }
}

/// Evaluate a merged finding set against the rule table
///
/// Per finding: missing rule → fail-safe blocking default; disabled rule
/// → dropped (its `block_on_match` is inert); entity-sourced finding below
/// the rule's confidence threshold → dropped. Survivors are deduplicated
/// by rule id — the first admissible finding in merge order wins — and
/// partitioned by `block_on_match`.
pub fn classify(findings: &[Finding], rules: &RuleTable) -> ScanDecision {
    let mut seen: HashSet<String> = HashSet::new();
    let mut blocking = Vec::new();
    let mut warning = Vec::new();

    for finding in findings {
        let fail_safe;
        let rule = match rules.get(&finding.rule_id) {
            Some(rule) => rule,
            None => {
                tracing::warn!(
                    rule = %finding.rule_id,
                    kind = %finding.kind,
                    "Unknown rule id, applying fail-safe blocking default"
                );
                fail_safe = PolicyRule::fail_safe(finding.rule_id.clone());
                &fail_safe
            }
        };

        if !rule.detect_enabled {
            continue;
        }
        if finding.source_layer == SourceLayer::Entity
            && finding.confidence < rule.confidence_threshold
        {
            continue;
        }
        // First admissible finding per rule wins; an inadmissible first
        // finding does not shadow a later admissible one
        if !seen.insert(finding.rule_id.clone()) {
            continue;
        }

        if rule.block_on_match {
            blocking.push(finding.clone());
        } else {
            warning.push(finding.clone());
        }
    }

    ScanDecision::from_partition(blocking, warning)
}
