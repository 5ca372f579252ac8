//! Parse tree arena shared by the coarse and detailed parse stages
#![allow(clippy::must_use_candidate)] // Accessors are plain reads; #[must_use] on each adds noise.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle to a node stored in a [`ParseTree`].
///
/// Ids are only minted by the tree that owns the node, so indexing with an id
/// obtained from the same tree never goes out of bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Width of a repeating element group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupArity {
    /// Two related elements per group
    Pair,
    /// Three related elements per group
    Triple,
}

impl GroupArity {
    /// Number of elements in one group
    pub const fn size(self) -> usize {
        match self {
            Self::Pair => 2,
            Self::Triple => 3,
        }
    }

    /// XEDI name of the container holding all groups of this arity
    pub const fn container_name(self) -> &'static str {
        match self {
            Self::Pair => "elemPairContainer",
            Self::Triple => "elemTripleContainer",
        }
    }

    /// XEDI name of one group of this arity
    pub const fn group_name(self) -> &'static str {
        match self {
            Self::Pair => "elemPair",
            Self::Triple => "elemTriple",
        }
    }

    pub fn from_size(size: usize) -> Option<Self> {
        match size {
            2 => Some(Self::Pair),
            3 => Some(Self::Triple),
            _ => None,
        }
    }

    /// Recognise a group container by its XEDI name
    pub fn from_container_name(name: &str) -> Option<Self> {
        match name {
            "elemPairContainer" => Some(Self::Pair),
            "elemTripleContainer" => Some(Self::Triple),
            _ => None,
        }
    }
}

/// Envelope segments that frame an interchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnvelopeTag {
    Isa,
    Iea,
    Gs,
    Ge,
    St,
    Se,
}

impl EnvelopeTag {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "ISA" => Some(Self::Isa),
            "IEA" => Some(Self::Iea),
            "GS" => Some(Self::Gs),
            "GE" => Some(Self::Ge),
            "ST" => Some(Self::St),
            "SE" => Some(Self::Se),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Isa => "ISA",
            Self::Iea => "IEA",
            Self::Gs => "GS",
            Self::Ge => "GE",
            Self::St => "ST",
            Self::Se => "SE",
        }
    }
}

impl fmt::Display for EnvelopeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of parse nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Interchange root (ISA ... IEA)
    Envelope,

    /// Holds every functional group of the interchange
    FuncGroupContainer,

    /// One functional group (GS ... GE)
    FuncGroup,

    /// Holds every transaction set of a functional group
    TransactionContainer,

    /// One transaction set (ST ... SE)
    Transaction,

    /// Placeholder for a transaction set that failed detailed parsing
    BadTransaction,

    /// Repeating loop of segments
    Loop,

    /// One pass through a loop
    LoopIteration,

    /// A segment; the text is the segment tag
    Segment,

    /// A data element; the text is the element value
    Element,

    /// Holds the repeating groups of one segment
    ElementGroupContainer(GroupArity),

    /// One repeating group of elements
    ElementGroup(GroupArity),

    /// Sub-element of a composite data element
    CompositeElement,

    /// Envelope segment as seen by the coarse tokenizer
    Marker(EnvelopeTag),
}

impl NodeKind {
    /// Segment-like nodes carry their tag as text and elements as children
    pub const fn is_segment_like(self) -> bool {
        matches!(self, Self::Segment | Self::Marker(_))
    }
}

/// A node in the parse tree arena
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseNode {
    pub kind: NodeKind,
    pub text: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// Ordered tree stored as an arena of [`ParseNode`]s
///
/// Edits never move nodes: re-parenting and replacement reassign ids inside
/// child lists, and nodes cut out of the tree simply become unreachable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParseTree {
    nodes: Vec<ParseNode>,
    root: Option<NodeId>,
}

impl ParseTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            root: None,
        }
    }

    /// Allocate a detached node
    pub fn add(&mut self, kind: NodeKind, text: impl Into<String>) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(ParseNode {
            kind,
            text: text.into(),
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Allocate a node and append it as the last child of `parent`
    pub fn append(&mut self, parent: NodeId, kind: NodeKind, text: impl Into<String>) -> NodeId {
        let id = self.add(kind, text);
        self.attach(parent, id);
        id
    }

    /// Append an existing node as the last child of `parent`
    pub fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.nodes[id.index()].parent = None;
        self.root = Some(id);
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn get(&self, id: NodeId) -> Option<&ParseNode> {
        self.nodes.get(id.index())
    }

    pub fn node(&self, id: NodeId) -> &ParseNode {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.index()].kind
    }

    pub fn text(&self, id: NodeId) -> &str {
        &self.nodes[id.index()].text
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn has_children(&self, id: NodeId) -> bool {
        !self.nodes[id.index()].children.is_empty()
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        self.nodes[id.index()].text = text.into();
    }

    pub fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        self.nodes[id.index()].kind = kind;
    }

    /// Put `replacement` at the position `old` holds in its parent's child list.
    ///
    /// Returns `false` when `old` is not attached to a parent. A detached root
    /// is swapped for the tree root instead.
    pub fn replace(&mut self, old: NodeId, replacement: NodeId) -> bool {
        if self.root == Some(old) {
            self.set_root(replacement);
            return true;
        }
        let Some(parent) = self.nodes[old.index()].parent else {
            return false;
        };
        let Some(slot) = self.nodes[parent.index()]
            .children
            .iter()
            .position(|&c| c == old)
        else {
            return false;
        };
        self.nodes[parent.index()].children[slot] = replacement;
        self.nodes[replacement.index()].parent = Some(parent);
        self.nodes[old.index()].parent = None;
        true
    }

    /// Detach and return every child of `id`
    pub fn take_children(&mut self, id: NodeId) -> Vec<NodeId> {
        let children = std::mem::take(&mut self.nodes[id.index()].children);
        for &child in &children {
            self.nodes[child.index()].parent = None;
        }
        children
    }

    /// Number of allocated nodes, reachable or not
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pre-order list of the subtree rooted at `start`
    pub fn preorder(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    /// Every node of `kind` reachable from the root, in document order
    pub fn find_all(&self, kind: NodeKind) -> Vec<NodeId> {
        self.root
            .map(|root| {
                self.preorder(root)
                    .into_iter()
                    .filter(|&id| self.kind(id) == kind)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// First direct child of `id` with the given kind
    pub fn child_of_kind(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&c| self.kind(c) == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (ParseTree, NodeId, NodeId) {
        let mut tree = ParseTree::new();
        let root = tree.add(NodeKind::Envelope, "envelope");
        tree.set_root(root);
        let seg = tree.append(root, NodeKind::Segment, "BEG");
        tree.append(seg, NodeKind::Element, "00");
        tree.append(seg, NodeKind::Element, "");
        tree.append(seg, NodeKind::Element, "PO1");
        (tree, root, seg)
    }

    #[test]
    fn test_append_builds_ordered_children() {
        let (tree, root, seg) = sample();
        assert_eq!(tree.children(root), &[seg]);
        let texts: Vec<&str> = tree.children(seg).iter().map(|&c| tree.text(c)).collect();
        assert_eq!(texts, vec!["00", "", "PO1"]);
        assert_eq!(tree.parent(seg), Some(root));
    }

    #[test]
    fn test_replace_reassigns_slot() {
        let (mut tree, root, seg) = sample();
        let bad = tree.add(NodeKind::BadTransaction, "raw");
        assert!(tree.replace(seg, bad));
        assert_eq!(tree.children(root), &[bad]);
        assert_eq!(tree.parent(bad), Some(root));
        assert_eq!(tree.parent(seg), None);
    }

    #[test]
    fn test_replace_detached_node_fails() {
        let mut tree = ParseTree::new();
        let a = tree.add(NodeKind::Segment, "A");
        let b = tree.add(NodeKind::Segment, "B");
        assert!(!tree.replace(a, b));
    }

    #[test]
    fn test_take_children_detaches() {
        let (mut tree, _, seg) = sample();
        let taken = tree.take_children(seg);
        assert_eq!(taken.len(), 3);
        assert!(!tree.has_children(seg));
        assert!(taken.iter().all(|&c| tree.parent(c).is_none()));
    }

    #[test]
    fn test_preorder_and_find_all() {
        let (tree, root, seg) = sample();
        let order = tree.preorder(root);
        assert_eq!(order[0], root);
        assert_eq!(order[1], seg);
        assert_eq!(order.len(), 5);
        assert_eq!(tree.find_all(NodeKind::Element).len(), 3);
        assert_eq!(tree.find_all(NodeKind::Segment), vec![seg]);
    }

    #[test]
    fn test_group_arity_names() {
        assert_eq!(GroupArity::Pair.size(), 2);
        assert_eq!(GroupArity::Triple.container_name(), "elemTripleContainer");
        assert_eq!(
            GroupArity::from_container_name("elemPairContainer"),
            Some(GroupArity::Pair)
        );
        assert_eq!(GroupArity::from_size(4), None);
    }

    #[test]
    fn test_envelope_tag_round_trip() {
        for tag in ["ISA", "IEA", "GS", "GE", "ST", "SE"] {
            let parsed = EnvelopeTag::from_tag(tag).expect("known tag");
            assert_eq!(parsed.as_str(), tag);
        }
        assert!(EnvelopeTag::from_tag("BEG").is_none());
    }
}
