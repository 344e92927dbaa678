//! Entity aggregation — merge token-level BIO classifications into spans
//!
//! The classifier collaborator emits one classification per model token.
//! This module reconstructs whole entities from that stream: sub-word
//! continuations are stitched back together, adjacent same-category tokens
//! merge into one span, and tagging noise (an `Inside` with no opening
//! `Begin`) is treated as an implicit begin rather than dropped.
//!
//! Pure function of its input: aggregating the same stream twice yields
//! identical output.

use crate::types::{BioTag, EntityCategory, Finding, Span, TokenClassification};

/// In-progress entity being assembled from consecutive tokens
struct Accumulator {
    category: EntityCategory,
    value: String,
    start: usize,
    end: usize,
    scores: Vec<f64>,
}

impl Accumulator {
    fn open(token: &TokenClassification) -> Self {
        Self {
            category: token.category,
            value: subword_text(token).to_string(),
            start: token.span.start,
            end: token.span.end,
            scores: vec![token.confidence],
        }
    }

    /// Append a same-category continuation token
    ///
    /// Contiguous spans and gaps of at most one character merge directly;
    /// larger gaps contribute exactly one separating space.
    fn extend(&mut self, token: &TokenClassification) {
        let gap = token.span.start.saturating_sub(self.end);
        if gap > 1 {
            self.value.push(' ');
        }
        self.value.push_str(subword_text(token));
        self.end = token.span.end.max(self.end);
        self.scores.push(token.confidence);
    }

    fn finish(self) -> Finding {
        let value = collapse_whitespace(&self.value);
        let confidence = self.scores.iter().sum::<f64>() / self.scores.len() as f64;
        Finding::entity(self.category, value, Span::new(self.start, self.end), confidence)
    }
}

/// Token text with the sub-word continuation marker stripped
fn subword_text(token: &TokenClassification) -> &str {
    token.text.strip_prefix("##").unwrap_or(&token.text)
}

/// Trim and collapse internal whitespace runs to single spaces
fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Merge a token classification stream into entity findings
///
/// Tokens below `confidence_threshold`, tagged `Outside`, or classified
/// as the ambiguous `Misc` category are dropped up front. The remaining
/// tokens are scanned in order: `Begin` opens a new accumulator; a
/// same-category `Inside` extends the open one; a different category or
/// an orphan `Inside` closes the open accumulator and starts fresh.
/// Finished entities are deduplicated per category, keeping the longest
/// value (ties: first-seen).
pub fn aggregate(tokens: &[TokenClassification], confidence_threshold: f64) -> Vec<Finding> {
    let mut finished: Vec<Finding> = Vec::new();
    let mut current: Option<Accumulator> = None;

    for token in tokens {
        if token.confidence < confidence_threshold
            || token.tag == BioTag::Outside
            || token.category == EntityCategory::Misc
        {
            continue;
        }

        match token.tag {
            BioTag::Begin => {
                if let Some(acc) = current.take() {
                    finished.push(acc.finish());
                }
                current = Some(Accumulator::open(token));
            }
            BioTag::Inside => match current.as_mut() {
                Some(acc) if acc.category == token.category => acc.extend(token),
                _ => {
                    // Orphan inside or category switch: implicit begin —
                    // tagging noise must not lose findings
                    if let Some(acc) = current.take() {
                        finished.push(acc.finish());
                    }
                    current = Some(Accumulator::open(token));
                }
            },
            BioTag::Outside => unreachable!("filtered above"),
        }
    }

    if let Some(acc) = current.take() {
        finished.push(acc.finish());
    }

    dedup_longest_per_category(finished)
}

/// Keep the longest value per category; ties broken by first-seen.
/// The survivor keeps the first-seen position in the output order.
fn dedup_longest_per_category(findings: Vec<Finding>) -> Vec<Finding> {
    let mut result: Vec<Finding> = Vec::new();
    for finding in findings {
        match result
            .iter_mut()
            .find(|existing| existing.rule_id == finding.rule_id)
        {
            Some(existing) => {
                if finding.value.len() > existing.value.len() {
                    *existing = finding;
                }
            }
            None => result.push(finding),
        }
    }
    result
}
