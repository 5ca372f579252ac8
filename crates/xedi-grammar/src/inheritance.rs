//! Grammar inheritance and merge logic

use crate::model::{Grammar, LoopRule, SegmentRule};
use std::collections::HashSet;

/// Tracks inheritance relationships to detect cycles
#[derive(Debug, Default)]
pub struct InheritanceGraph {
    edges: Vec<(String, String)>, // (child, parent)
}

impl InheritanceGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_edge(&mut self, child: impl Into<String>, parent: impl Into<String>) {
        self.edges.push((child.into(), parent.into()));
    }

    /// Detect if adding this edge would create a cycle
    #[must_use]
    pub fn would_create_cycle(&self, child: &str, parent: &str) -> bool {
        if child == parent {
            return true;
        }

        let mut to_visit = vec![parent.to_string()];
        let mut visited = HashSet::new();

        while let Some(current) = to_visit.pop() {
            if current == child {
                return true;
            }
            if visited.insert(current.clone()) {
                for (c, p) in &self.edges {
                    if c == &current {
                        to_visit.push(p.clone());
                    }
                }
            }
        }

        false
    }
}

/// Merge `parent` under `child`; the child wins wherever both define something.
///
/// Segment rules are keyed by tag and loop rules by id. Scalar settings the
/// child leaves unset fall back to the parent.
#[must_use]
pub fn merge_grammars(parent: &Grammar, child: &Grammar) -> Grammar {
    let mut merged = child.clone();

    if merged.version.is_empty() {
        merged.version.clone_from(&parent.version);
    }
    if merged.direction.is_none() {
        merged.direction = parent.direction;
    }
    if merged.transaction_sets.is_empty() {
        merged.transaction_sets.clone_from(&parent.transaction_sets);
    }
    merged.strict_segments = child.strict_segments.or(parent.strict_segments);
    merged.check_control_numbers = child.check_control_numbers.or(parent.check_control_numbers);

    merged.segments = merge_segments(&parent.segments, &child.segments);
    merged.loops = merge_loops(&parent.loops, &child.loops);
    merged
}

fn merge_segments(parent: &[SegmentRule], child: &[SegmentRule]) -> Vec<SegmentRule> {
    let child_tags: HashSet<&str> = child.iter().map(|s| s.tag.as_str()).collect();
    parent
        .iter()
        .filter(|s| !child_tags.contains(s.tag.as_str()))
        .chain(child.iter())
        .cloned()
        .collect()
}

fn merge_loops(parent: &[LoopRule], child: &[LoopRule]) -> Vec<LoopRule> {
    let mut result: Vec<LoopRule> = parent.to_vec();
    for rule in child {
        match result.iter_mut().find(|existing| existing.id == rule.id) {
            Some(existing) => *existing = rule.clone(),
            None => result.push(rule.clone()),
        }
    }
    result
}

/// Apply a chain ordered base first, leaf last
#[must_use]
pub fn apply_inheritance_chain(chain: &[Grammar]) -> Option<Grammar> {
    let (first, rest) = chain.split_first()?;
    let mut result = first.clone();
    for child in rest {
        result = merge_grammars(&result, child);
    }
    result.inheritance_chain = chain.iter().map(|g| g.name.clone()).collect();
    Some(result)
}
