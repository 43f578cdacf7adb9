//! Textual body comparison for duplicate/overlap detection.
//!
//! Pull-up and push-down style refactorings need to decide whether two
//! method or constructor bodies do "the same" work. The comparison here is
//! deliberately textual and order-insensitive: bodies are reduced to
//! unordered sets of trimmed statement strings, and reordering statements
//! within a body counts as equivalent. This trades recall for conservative,
//! explainable matches; it is not semantic equality and is not meant to be.

use std::collections::BTreeSet;

/// Relationship between two bodies' statement sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyOverlap {
    /// Same statements, in any order.
    Equal,
    /// Every statement of the first appears in the second.
    FirstSubsetOfSecond,
    /// Every statement of the second appears in the first.
    SecondSubsetOfFirst,
    /// Some statements shared, some not.
    Partial,
    /// No statements in common.
    Disjoint,
}

/// Reduce a body to its unordered statement set: braces stripped, split on
/// statement terminators, each statement trimmed, empties dropped.
pub fn statement_set(body_text: &str) -> BTreeSet<String> {
    body_text
        .replace(['{', '}'], "")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Classify two bodies by statement-set relationship.
pub fn classify_bodies(first: &str, second: &str) -> BodyOverlap {
    let a = statement_set(first);
    let b = statement_set(second);
    if a == b {
        BodyOverlap::Equal
    } else if a.is_subset(&b) {
        BodyOverlap::FirstSubsetOfSecond
    } else if b.is_subset(&a) {
        BodyOverlap::SecondSubsetOfFirst
    } else if a.is_disjoint(&b) {
        BodyOverlap::Disjoint
    } else {
        BodyOverlap::Partial
    }
}

/// Statements in exactly one of the two bodies, sorted.
pub fn statement_diff(first: &str, second: &str) -> Vec<String> {
    let a = statement_set(first);
    let b = statement_set(second);
    a.symmetric_difference(&b).cloned().collect()
}
