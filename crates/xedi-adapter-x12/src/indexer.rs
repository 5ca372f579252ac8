//! Forward indexer: detailed parse tree to XEDI document
//!
//! Walks the tree depth-first. Structural nodes (envelope, groups,
//! transaction sets, loops, segments) are written as `name(i)` with `i` their
//! position among their siblings. Data elements get positional names and
//! compressed indices from a [`VisitorContext`] rebuilt at every segment.
//! A node that cannot be written is reported and skipped.

use crate::context::VisitorContext;
use crate::envelopes;
use tracing::{debug, trace, warn};
use xedi_ir::path::{indexed, join};
use xedi_ir::{
    Diagnostic, DiagnosticKind, Diagnostics, NodeId, NodeKind, ParseTree, Traversal,
    XediDocument, walk,
};

/// Turns a detailed parse tree into an XEDI document
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardIndexer;

impl ForwardIndexer {
    pub fn new() -> Self {
        Self
    }

    /// Index `tree` into a new document
    ///
    /// Every call starts from fresh state, so one indexer can convert any
    /// number of trees.
    pub fn index(&self, tree: &ParseTree) -> (XediDocument, Diagnostics) {
        let mut walker = IndexWalk::default();
        if let Some(root) = tree.root() {
            walk(tree, root, &mut walker);
        }
        debug!(
            nodes = walker.doc.reachable_count(),
            failures = walker.diagnostics.len(),
            "indexed parse tree"
        );
        (walker.doc, walker.diagnostics)
    }
}

#[derive(Default)]
struct IndexWalk {
    doc: XediDocument,
    diagnostics: Diagnostics,
    /// Output paths of the nodes currently entered
    paths: Vec<String>,
    /// Path of the node last visited, pushed if it is entered
    pending: String,
    context: VisitorContext,
}

impl IndexWalk {
    fn parent_path(&self) -> &str {
        self.paths.last().map_or("", String::as_str)
    }

    fn structural_path(
        tree: &ParseTree,
        id: NodeId,
        parent_path: &str,
        ancestors: &[NodeId],
    ) -> Option<String> {
        let name = envelopes::node_name(tree, id)?;
        let position = ancestors
            .last()
            .and_then(|&parent| tree.children(parent).iter().position(|&c| c == id))
            .unwrap_or(0);
        Some(join(parent_path, &indexed(&name, position)))
    }

    fn ensure(&mut self, path: &str) {
        if let Err(e) = self.doc.ensure(path) {
            self.fail(path, &e.to_string());
        }
    }

    fn write(&mut self, path: &str, value: &str) {
        trace!(path, value, "writing value");
        if let Err(e) = self.doc.set_value(path, value) {
            self.fail(path, &e.to_string());
        }
    }

    fn fail(&mut self, path: &str, message: &str) {
        warn!(path, message, "element mapping failed");
        self.diagnostics.push(
            Diagnostic::new(DiagnosticKind::ElementMappingFailed, message).with_path(path),
        );
    }

    fn element(&mut self, tree: &ParseTree, id: NodeId, ancestors: &[NodeId]) {
        let group = ancestors.last().and_then(|&parent| match tree.kind(parent) {
            NodeKind::ElementGroup(arity) => Some(arity),
            _ => None,
        });
        let has_components = tree.has_children(id);
        let is_empty = tree.text(id).is_empty() && !has_components;

        match self.context.enter_element(group, is_empty) {
            Ok(Some(path)) if !has_components => self.write(&path, tree.text(id)),
            Ok(_) => {}
            Err(e) => {
                let at = self.context.segment_path.clone();
                self.fail(&at, &e.to_string());
            }
        }
    }

    fn component(&mut self, tree: &ParseTree, id: NodeId) {
        let value = tree.text(id);
        match self.context.enter_composite(value.is_empty()) {
            Ok(Some(path)) => self.write(&path, value),
            Ok(None) => {}
            Err(e) => {
                let at = self.context.segment_path.clone();
                self.fail(&at, &e.to_string());
            }
        }
    }
}

impl Traversal for IndexWalk {
    fn visit(&mut self, tree: &ParseTree, id: NodeId, ancestors: &[NodeId]) {
        let parent_path = self.parent_path().to_string();
        self.pending.clone_from(&parent_path);

        match tree.kind(id) {
            NodeKind::Element => self.element(tree, id, ancestors),
            NodeKind::CompositeElement => self.component(tree, id),
            NodeKind::ElementGroup(arity) => self.context.enter_element_group(arity),
            NodeKind::ElementGroupContainer(_) => {}
            NodeKind::BadTransaction => {
                if let Some(path) = Self::structural_path(tree, id, &parent_path, ancestors) {
                    self.write(&path, "");
                }
            }
            NodeKind::Segment | NodeKind::Marker(_) => {
                if let Some(path) = Self::structural_path(tree, id, &parent_path, ancestors) {
                    self.context = VisitorContext::for_segment(tree.text(id), path.as_str());
                    self.ensure(&path);
                    self.pending = path;
                }
            }
            NodeKind::Envelope
            | NodeKind::FuncGroupContainer
            | NodeKind::FuncGroup
            | NodeKind::TransactionContainer
            | NodeKind::Transaction
            | NodeKind::Loop
            | NodeKind::LoopIteration => {
                if let Some(path) = Self::structural_path(tree, id, &parent_path, ancestors) {
                    self.ensure(&path);
                    self.pending = path;
                }
            }
        }
    }

    fn enter(&mut self, _tree: &ParseTree, _id: NodeId, _ancestors: &[NodeId]) {
        self.paths.push(self.pending.clone());
    }

    fn leave(&mut self, _tree: &ParseTree, _id: NodeId, _ancestors: &[NodeId]) {
        self.paths.pop();
    }

    fn descend(&self, tree: &ParseTree, id: NodeId) -> bool {
        tree.kind(id) != NodeKind::BadTransaction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use xedi_ir::GroupArity;

    fn segment(tree: &mut ParseTree, parent: NodeId, tag: &str, values: &[&str]) -> NodeId {
        let node = tree.append(parent, NodeKind::Segment, tag);
        for value in values {
            tree.append(node, NodeKind::Element, *value);
        }
        node
    }

    /// envelope > funcgroupContainer > funcgroup > transContainer > trans
    fn skeleton() -> (ParseTree, NodeId) {
        let mut tree = ParseTree::new();
        let envelope = tree.add(NodeKind::Envelope, "envelope");
        tree.set_root(envelope);
        segment(&mut tree, envelope, "ISA", &["00"]);
        let groups = tree.append(envelope, NodeKind::FuncGroupContainer, "");
        let group = tree.append(groups, NodeKind::FuncGroup, "");
        let transactions = tree.append(group, NodeKind::TransactionContainer, "");
        let trans = tree.append(transactions, NodeKind::Transaction, "");
        (tree, trans)
    }

    const TRANS: &str = "envelope(0).funcgroupContainer(1).funcgroup(0).transContainer(0).trans(0)";

    #[test]
    fn test_skipped_elements_keep_ordinal_names() {
        let (mut tree, trans) = skeleton();
        segment(&mut tree, trans, "SEG", &["a", "", "c", "", "e"]);
        let (doc, diagnostics) = ForwardIndexer::new().index(&tree);

        assert!(diagnostics.is_empty());
        let seg = format!("{TRANS}.SEG(0)");
        assert_eq!(doc.child_count(&seg).unwrap(), 3);
        assert_eq!(doc.get_value(&format!("{seg}.SEG01(0)")).unwrap(), Some("a"));
        assert_eq!(doc.get_value(&format!("{seg}.SEG03(1)")).unwrap(), Some("c"));
        assert_eq!(doc.get_value(&format!("{seg}.SEG05(2)")).unwrap(), Some("e"));
    }

    #[test]
    fn test_envelope_segments_are_indexed() {
        let (tree, _) = skeleton();
        let (doc, _) = ForwardIndexer::new().index(&tree);
        assert_eq!(doc.get_value("envelope(0).ISA(0).ISA01(0)").unwrap(), Some("00"));
    }

    #[test]
    fn test_loops_and_iterations() {
        let (mut tree, trans) = skeleton();
        let looped = tree.append(trans, NodeKind::Loop, "N1");
        let first = tree.append(looped, NodeKind::LoopIteration, "");
        segment(&mut tree, first, "N1", &["ST"]);
        let second = tree.append(looped, NodeKind::LoopIteration, "");
        segment(&mut tree, second, "N1", &["BT"]);

        let (doc, _) = ForwardIndexer::new().index(&tree);
        let path = format!("{TRANS}.loopN1(0).iteration(1).N1(0).N101(0)");
        assert_eq!(doc.get_value(&path).unwrap(), Some("BT"));
    }

    #[test]
    fn test_bad_transaction_is_an_empty_leaf() {
        let (mut tree, trans) = skeleton();
        let container = tree.parent(trans).unwrap();
        let bad = tree.append(container, NodeKind::BadTransaction, "ST\u{1d}850");
        tree.append(bad, NodeKind::Element, "ignored");

        let (doc, _) = ForwardIndexer::new().index(&tree);
        let path = "envelope(0).funcgroupContainer(1).funcgroup(0).transContainer(0).badTransaction(1)";
        assert_eq!(doc.get_value(path).unwrap(), Some(""));
        assert_eq!(doc.child_count(path).unwrap(), 0);
    }

    #[test]
    fn test_first_group_empty_lowers_next_group() {
        let (mut tree, trans) = skeleton();
        let seg = segment(&mut tree, trans, "PO1", &["1"]);
        let container = tree.append(seg, NodeKind::ElementGroupContainer(GroupArity::Pair), "");
        let empty = tree.append(container, NodeKind::ElementGroup(GroupArity::Pair), "");
        tree.append(empty, NodeKind::Element, "");
        tree.append(empty, NodeKind::Element, "");
        let full = tree.append(container, NodeKind::ElementGroup(GroupArity::Pair), "");
        tree.append(full, NodeKind::Element, "VP");
        tree.append(full, NodeKind::Element, "123");

        let (doc, diagnostics) = ForwardIndexer::new().index(&tree);
        assert!(diagnostics.is_empty());
        let pairs = format!("{TRANS}.PO1(0).elemPairContainer(1)");
        assert_eq!(doc.child_count(&pairs).unwrap(), 1);
        assert_eq!(
            doc.get_value(&format!("{pairs}.elemPair(0).PO102(0)")).unwrap(),
            Some("VP")
        );
        assert_eq!(
            doc.get_value(&format!("{pairs}.elemPair(0).PO103(1)")).unwrap(),
            Some("123")
        );
    }

    #[test]
    fn test_composite_components() {
        let (mut tree, trans) = skeleton();
        let seg = segment(&mut tree, trans, "REF", &["DP", ""]);
        let element = tree.append(seg, NodeKind::Element, "");
        tree.append(element, NodeKind::CompositeElement, "A");
        tree.append(element, NodeKind::CompositeElement, "");
        tree.append(element, NodeKind::CompositeElement, "C");

        let (doc, _) = ForwardIndexer::new().index(&tree);
        let parent = format!("{TRANS}.REF(0).REF03(1)");
        assert_eq!(doc.get_value(&parent).unwrap(), None);
        assert_eq!(doc.get_value(&format!("{parent}.REF03_01(0)")).unwrap(), Some("A"));
        assert_eq!(doc.get_value(&format!("{parent}.REF03_03(1)")).unwrap(), Some("C"));
    }

    #[test]
    fn test_context_resets_between_segments() {
        let (mut tree, trans) = skeleton();
        segment(&mut tree, trans, "A", &["", "", "x"]);
        segment(&mut tree, trans, "B", &["y"]);
        let (doc, _) = ForwardIndexer::new().index(&tree);
        assert_eq!(doc.get_value(&format!("{TRANS}.B(1).B01(0)")).unwrap(), Some("y"));
        assert_eq!(doc.get_value(&format!("{TRANS}.A(0).A03(0)")).unwrap(), Some("x"));
    }
}
