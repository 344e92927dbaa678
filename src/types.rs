//! Core data types for the privshield engine
//!
//! All types use camelCase JSON serialization for wire compatibility
//! with the host extension.

use serde::{Deserialize, Serialize};

/// Placeholder stored in place of a raw value when it must not be retained
pub const REDACTED_PLACEHOLDER: &str = "[redacted]";

/// Half-open character offset range `[start, end)` into source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    /// Inclusive start offset
    pub start: usize,

    /// Exclusive end offset
    pub end: usize,
}

impl Span {
    /// Create a new span
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// A span is empty when it covers no characters
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True if this is a non-empty range that fits within `text_len`
    pub fn is_valid_for(&self, text_len: usize) -> bool {
        self.start < self.end && self.end <= text_len
    }
}

/// Which detection layer produced a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceLayer {
    /// Deterministic regex layer — always available, always synchronous
    Pattern,
    /// Probabilistic token-classification layer — available only when
    /// the classifier collaborator is reachable
    Entity,
}

/// Ordered rule severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Entity category emitted by the token classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityCategory {
    Person,
    Organization,
    Location,
    /// Catch-all category — always dropped during aggregation, too ambiguous
    Misc,
}

impl EntityCategory {
    /// The policy rule this category maps to
    pub fn rule_id(&self) -> &'static str {
        match self {
            EntityCategory::Person => "person",
            EntityCategory::Organization => "organization",
            EntityCategory::Location => "location",
            EntityCategory::Misc => "misc",
        }
    }

    /// Finding kind tag for this category
    pub fn kind(&self) -> &'static str {
        self.rule_id()
    }
}

/// BIO tag on a token classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BioTag {
    /// Token begins an entity
    Begin,
    /// Token continues the current entity
    Inside,
    /// Token is not part of any entity
    Outside,
}

/// One token-level classification from the classifier collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenClassification {
    /// BIO position of this token
    pub tag: BioTag,

    /// Entity category the token was classified as
    pub category: EntityCategory,

    /// Raw token text; sub-word continuations carry a `##` marker
    pub text: String,

    /// Character span of the token in the source text
    pub span: Span,

    /// Classifier confidence in `[0, 1]`
    pub confidence: f64,

    /// Whether this token is a sub-word continuation of the previous token
    #[serde(default)]
    pub subword: bool,
}

impl TokenClassification {
    /// Create a token classification
    pub fn new(
        tag: BioTag,
        category: EntityCategory,
        text: impl Into<String>,
        span: Span,
        confidence: f64,
    ) -> Self {
        let text = text.into();
        let subword = text.starts_with("##");
        Self {
            tag,
            category,
            text,
            span,
            confidence,
            subword,
        }
    }
}

/// One detected occurrence, before policy evaluation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    /// Detector rule tag (e.g., "email", "person", "aws_access_key")
    pub kind: String,

    /// Policy rule this finding maps to; many kinds may share one rule
    pub rule_id: String,

    /// Detected substring, or [`REDACTED_PLACEHOLDER`] when raw values
    /// must not be retained
    pub value: String,

    /// Character span of the detection; present for entity findings,
    /// absent for simple presence-test pattern findings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,

    /// Detection confidence in `[0, 1]`; pattern findings are always 1.0
    pub confidence: f64,

    /// Layer that produced this finding
    pub source_layer: SourceLayer,
}

impl Finding {
    /// Create a pattern-layer finding (confidence 1.0, no span)
    pub fn pattern(
        kind: impl Into<String>,
        rule_id: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            rule_id: rule_id.into(),
            value: value.into(),
            span: None,
            confidence: 1.0,
            source_layer: SourceLayer::Pattern,
        }
    }

    /// Create an entity-layer finding
    pub fn entity(category: EntityCategory, value: impl Into<String>, span: Span, confidence: f64) -> Self {
        Self {
            kind: category.kind().to_string(),
            rule_id: category.rule_id().to_string(),
            value: value.into(),
            span: Some(span),
            confidence,
            source_layer: SourceLayer::Entity,
        }
    }

    /// Replace the raw value with the redaction placeholder
    pub fn redacted(mut self) -> Self {
        self.value = REDACTED_PLACEHOLDER.to_string();
        self
    }
}

/// One configurable detection category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    /// Rule identifier findings map to
    pub id: String,

    /// Whether this category is detected at all; when false,
    /// `block_on_match` is inert
    pub detect_enabled: bool,

    /// Block the action on match (true) or warn only (false)
    pub block_on_match: bool,

    /// Rule severity
    pub severity: Severity,

    /// Minimum admissible confidence for entity-sourced findings;
    /// pattern findings (confidence 1.0) are unaffected
    #[serde(default)]
    pub confidence_threshold: f64,
}

impl PolicyRule {
    /// Create a rule
    pub fn new(
        id: impl Into<String>,
        detect_enabled: bool,
        block_on_match: bool,
        severity: Severity,
    ) -> Self {
        Self {
            id: id.into(),
            detect_enabled,
            block_on_match,
            severity,
            confidence_threshold: 0.0,
        }
    }

    /// Set the entity confidence threshold
    pub fn with_confidence_threshold(mut self, threshold: f64) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Fail-safe default for an unknown rule id: enabled and blocking
    pub fn fail_safe(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            detect_enabled: true,
            block_on_match: true,
            severity: Severity::High,
            confidence_threshold: 0.0,
        }
    }
}

/// Outcome of evaluating a merged finding set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    /// No admissible findings
    Clean,
    /// Warn-only findings present
    Warn,
    /// At least one blocking finding present
    Block,
}

/// Decision produced by the policy evaluator
///
/// Invariant: `outcome == Block` iff `blocking_findings` is non-empty;
/// `outcome == Warn` iff blocking is empty and `warning_findings` is not.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanDecision {
    /// Overall outcome
    pub outcome: Outcome,

    /// Findings whose rules block, deduplicated by rule
    pub blocking_findings: Vec<Finding>,

    /// Findings whose rules warn only, deduplicated by rule
    pub warning_findings: Vec<Finding>,
}

impl ScanDecision {
    /// A decision with no findings at all
    pub fn clean() -> Self {
        Self {
            outcome: Outcome::Clean,
            blocking_findings: Vec::new(),
            warning_findings: Vec::new(),
        }
    }

    /// Build a decision from partitioned findings, deriving the outcome
    pub fn from_partition(blocking: Vec<Finding>, warning: Vec<Finding>) -> Self {
        let outcome = if !blocking.is_empty() {
            Outcome::Block
        } else if !warning.is_empty() {
            Outcome::Warn
        } else {
            Outcome::Clean
        };
        Self {
            outcome,
            blocking_findings: blocking,
            warning_findings: warning,
        }
    }

    /// True when the decision blocks the action
    pub fn is_blocking(&self) -> bool {
        self.outcome == Outcome::Block
    }
}

/// Reachability of the asynchronous classification collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReachabilityState {
    /// Nothing known yet
    Unknown,
    /// Collaborator initialization in progress
    Loading,
    /// Collaborator serving requests
    Ready,
    /// Collaborator unreachable; pattern layer carries detection alone
    Unavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_validity() {
        assert!(Span::new(0, 5).is_valid_for(10));
        assert!(Span::new(5, 10).is_valid_for(10));
        assert!(!Span::new(5, 5).is_valid_for(10));
        assert!(!Span::new(6, 5).is_valid_for(10));
        assert!(!Span::new(5, 11).is_valid_for(10));
        assert_eq!(Span::new(2, 7).len(), 5);
        assert!(Span::new(3, 3).is_empty());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_pattern_finding_defaults() {
        let f = Finding::pattern("email", "email", "john@x.com");
        assert_eq!(f.confidence, 1.0);
        assert!(f.span.is_none());
        assert_eq!(f.source_layer, SourceLayer::Pattern);
    }

    #[test]
    fn test_entity_finding() {
        let f = Finding::entity(EntityCategory::Person, "John Doe", Span::new(11, 19), 0.92);
        assert_eq!(f.kind, "person");
        assert_eq!(f.rule_id, "person");
        assert_eq!(f.span.unwrap(), Span::new(11, 19));
        assert_eq!(f.source_layer, SourceLayer::Entity);
    }

    #[test]
    fn test_finding_redaction() {
        let f = Finding::pattern("ssn", "ssn", "123-45-6789").redacted();
        assert_eq!(f.value, REDACTED_PLACEHOLDER);
        assert_eq!(f.kind, "ssn");
    }

    #[test]
    fn test_finding_serialization_camel_case() {
        let f = Finding::entity(EntityCategory::Location, "Boston", Span::new(0, 6), 0.8);
        let json = serde_json::to_string(&f).unwrap();
        assert!(json.contains("\"ruleId\":\"location\""));
        assert!(json.contains("\"sourceLayer\":\"entity\""));
        assert!(json.contains("\"span\":{\"start\":0,\"end\":6}"));

        let parsed: Finding = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.rule_id, "location");
        assert_eq!(parsed.span.unwrap(), Span::new(0, 6));
    }

    #[test]
    fn test_pattern_finding_omits_span() {
        let f = Finding::pattern("email", "email", "a@b.co");
        let json = serde_json::to_string(&f).unwrap();
        assert!(!json.contains("span"));
    }

    #[test]
    fn test_token_classification_subword_detection() {
        let t = TokenClassification::new(
            BioTag::Inside,
            EntityCategory::Person,
            "##son",
            Span::new(4, 7),
            0.8,
        );
        assert!(t.subword);

        let t = TokenClassification::new(
            BioTag::Begin,
            EntityCategory::Person,
            "John",
            Span::new(0, 4),
            0.9,
        );
        assert!(!t.subword);
    }

    #[test]
    fn test_policy_rule_fail_safe_blocks() {
        let rule = PolicyRule::fail_safe("mystery");
        assert!(rule.detect_enabled);
        assert!(rule.block_on_match);
        assert_eq!(rule.severity, Severity::High);
    }

    #[test]
    fn test_policy_rule_serialization() {
        let rule = PolicyRule::new("email", true, true, Severity::High)
            .with_confidence_threshold(0.75);
        let json = serde_json::to_string(&rule).unwrap();
        assert!(json.contains("\"detectEnabled\":true"));
        assert!(json.contains("\"blockOnMatch\":true"));
        assert!(json.contains("\"confidenceThreshold\":0.75"));

        let parsed: PolicyRule = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.confidence_threshold, 0.75);
    }

    #[test]
    fn test_decision_outcome_invariant() {
        let block = ScanDecision::from_partition(
            vec![Finding::pattern("email", "email", "a@b.co")],
            vec![],
        );
        assert_eq!(block.outcome, Outcome::Block);
        assert!(block.is_blocking());

        let warn = ScanDecision::from_partition(
            vec![],
            vec![Finding::pattern("phone_number", "phone_number", "555-123-4567")],
        );
        assert_eq!(warn.outcome, Outcome::Warn);
        assert!(!warn.is_blocking());

        let clean = ScanDecision::from_partition(vec![], vec![]);
        assert_eq!(clean.outcome, Outcome::Clean);
    }

    #[test]
    fn test_reachability_state_serialization() {
        let json = serde_json::to_string(&ReachabilityState::Unavailable).unwrap();
        assert_eq!(json, "\"unavailable\"");
    }
}
