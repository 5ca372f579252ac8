//! Reverse flattener: XEDI document to delimited X12 text
//!
//! The walk follows the envelope structure rather than the document
//! generically: ISA, every functional group (GS, its transaction sets, GE),
//! then IEA. Element positions come from the two-digit suffix of each
//! element name, so elements the forward pass left out are regenerated as
//! bare separators. IEA01, GE01 and SE01 are recomputed from the document
//! and ISA16 is replaced with the output composite separator.

use crate::envelopes::{
    self, ENVELOPE_NODE, FUNC_GROUP_CONTAINER_NODE, TRANSACTION_CONTAINER_NODE, is_loop_name,
    parse_ordinal,
};
use crate::syntax::Separators;
use tracing::{debug, warn};
use xedi_ir::{Cursor, Diagnostic, DiagnosticKind, Diagnostics, EnvelopeTag, GroupArity, XediDocument};

/// Writes XEDI documents as X12 text with configurable separators
#[derive(Debug, Clone, Default)]
pub struct ReverseFlattener {
    separators: Separators,
}

impl ReverseFlattener {
    pub fn new(separators: Separators) -> Self {
        Self { separators }
    }

    pub fn separators(&self) -> &Separators {
        &self.separators
    }

    /// Flatten `doc` to text
    ///
    /// Problems are collected instead of aborting: a malformed element name
    /// ends its segment (or group, or composite) early, and a missing
    /// envelope node is skipped.
    pub fn flatten(&self, doc: &XediDocument) -> (String, Diagnostics) {
        let mut run = Flatten {
            separators: &self.separators,
            out: String::new(),
            diagnostics: Diagnostics::default(),
            group_count: 0,
            transaction_count: 0,
            segment_count: 0,
        };
        run.interchange(&Cursor::new(doc));
        debug!(
            len = run.out.len(),
            problems = run.diagnostics.len(),
            "flattened document"
        );
        (run.out, run.diagnostics)
    }
}

struct Flatten<'s> {
    separators: &'s Separators,
    out: String,
    diagnostics: Diagnostics,
    group_count: usize,
    transaction_count: usize,
    segment_count: usize,
}

impl Flatten<'_> {
    fn interchange(&mut self, root: &Cursor<'_>) {
        let Some(envelope) = self.require(root, ENVELOPE_NODE) else {
            return;
        };
        self.envelope_segment(&envelope, EnvelopeTag::Isa);
        if let Some(groups) = self.require(&envelope, FUNC_GROUP_CONTAINER_NODE) {
            self.group_count = groups.child_count();
            for group in groups.children() {
                self.functional_group(&group);
            }
        }
        self.envelope_segment(&envelope, EnvelopeTag::Iea);
    }

    fn functional_group(&mut self, group: &Cursor<'_>) {
        self.envelope_segment(group, EnvelopeTag::Gs);
        self.transaction_count = 0;
        if let Some(transactions) = self.require(group, TRANSACTION_CONTAINER_NODE) {
            self.transaction_count = transactions.child_count();
            for transaction in transactions.children() {
                self.segment_count = 0;
                self.segments(&transaction);
            }
        }
        self.envelope_segment(group, EnvelopeTag::Ge);
    }

    /// Segments under a transaction set or loop iteration, loops expanded
    fn segments(&mut self, parent: &Cursor<'_>) {
        for child in parent.children() {
            if is_loop_name(child.name()) {
                for iteration in child.children() {
                    self.segments(&iteration);
                }
            } else {
                self.segment_count += 1;
                self.segment(&child);
            }
        }
    }

    fn envelope_segment(&mut self, parent: &Cursor<'_>, tag: EnvelopeTag) {
        if let Some(segment) = self.require(parent, tag.as_str()) {
            self.segment(&segment);
        }
    }

    fn segment(&mut self, segment: &Cursor<'_>) {
        let tag = segment.name();
        let envelope_tag = EnvelopeTag::from_tag(tag);
        self.out.push_str(tag);

        let mut last = 0;
        for child in segment.children() {
            if let Some(arity) = GroupArity::from_container_name(child.name()) {
                last = self.groups(&child, arity, last);
                continue;
            }
            let Some(ordinal) = self.ordinal(&child) else {
                break;
            };
            self.pad(self.separators.element, last, ordinal);
            match envelope_tag.and_then(|t| self.computed(t, ordinal)) {
                Some(value) => self.out.push_str(&value),
                None => self.value(&child),
            }
            last = ordinal;
        }
        self.out.push_str(&self.separators.segment);
    }

    /// Flatten an element group container; returns the running ordinal
    /// after it
    fn groups(&mut self, container: &Cursor<'_>, arity: GroupArity, running: usize) -> usize {
        let size = arity.size();
        let start = container
            .children()
            .flat_map(|group| group.children())
            .filter_map(|element| parse_ordinal(element.name()))
            .min();
        let Some(start) = start else {
            return running;
        };

        let mut last = running;
        let mut count = 0;
        for (position, group) in container.children().enumerate() {
            count += 1;
            for element in group.children() {
                let Some(ordinal) = self.ordinal(&element) else {
                    break;
                };
                let logical = ordinal + position * size;
                self.pad(self.separators.element, last, logical);
                self.value(&element);
                last = logical;
            }
        }
        last.max(start + count * size - 1)
    }

    fn value(&mut self, element: &Cursor<'_>) {
        if element.has_children() {
            self.components(element);
        } else {
            self.out.push_str(element.value().unwrap_or_default());
        }
    }

    fn components(&mut self, element: &Cursor<'_>) {
        let mut last = 1;
        for component in element.children() {
            let Some(ordinal) = self.ordinal(&component) else {
                break;
            };
            self.pad(self.separators.composite, last, ordinal);
            self.out.push_str(component.value().unwrap_or_default());
            last = ordinal;
        }
    }

    /// Values regenerated instead of read from the document
    fn computed(&self, tag: EnvelopeTag, ordinal: usize) -> Option<String> {
        if tag == EnvelopeTag::Isa && ordinal == envelopes::COMPOSITE_SEPARATOR_ORDINAL {
            return Some(self.separators.composite.to_string());
        }
        if !envelopes::is_computed_count(tag, ordinal) {
            return None;
        }
        let count = match tag {
            EnvelopeTag::Iea => self.group_count,
            EnvelopeTag::Ge => self.transaction_count,
            _ => self.segment_count,
        };
        Some(count.to_string())
    }

    fn pad(&mut self, separator: char, from: usize, to: usize) {
        for _ in from..to {
            self.out.push(separator);
        }
    }

    fn ordinal(&mut self, element: &Cursor<'_>) -> Option<usize> {
        let ordinal = parse_ordinal(element.name());
        if ordinal.is_none() {
            let path = element.path();
            warn!(path = %path, name = element.name(), "element name has no ordinal suffix");
            self.diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::OrdinalFormatError,
                    format!("'{}' does not end in a two-digit ordinal", element.name()),
                )
                .with_path(path),
            );
        }
        ordinal
    }

    fn require<'a>(&mut self, parent: &Cursor<'a>, name: &str) -> Option<Cursor<'a>> {
        match parent.child(name) {
            Ok(child) => Some(child),
            Err(e) => {
                warn!(%e, "missing node");
                self.diagnostics.push(
                    Diagnostic::new(DiagnosticKind::MissingNode, e.to_string())
                        .with_path(xedi_ir::path::join(&parent.path(), name)),
                );
                None
            }
        }
    }
}
