//! Traversal over parse trees and cursor navigation over XEDI documents

use crate::document::{XediDocument, XediId};
use crate::node::{NodeId, ParseTree};
use crate::{Error, Result};

/// Trait for depth-first traversal of a [`ParseTree`]
pub trait Traversal {
    /// Visit a node; `ancestors` runs from the walk start down to the parent
    fn visit(&mut self, tree: &ParseTree, id: NodeId, ancestors: &[NodeId]);

    /// Called when entering a node with children
    fn enter(&mut self, _tree: &ParseTree, _id: NodeId, _ancestors: &[NodeId]) {}

    /// Called when leaving a node with children
    fn leave(&mut self, _tree: &ParseTree, _id: NodeId, _ancestors: &[NodeId]) {}

    /// Whether the children of `id` should be walked
    fn descend(&self, _tree: &ParseTree, _id: NodeId) -> bool {
        true
    }

    /// Returns true if traversal should continue
    fn should_continue(&self) -> bool {
        true
    }
}

/// Walk the subtree under `start` in pre-order
pub fn walk<T: Traversal>(tree: &ParseTree, start: NodeId, visitor: &mut T) {
    walk_recursive(tree, start, visitor, &mut Vec::new());
}

fn walk_recursive<T: Traversal>(
    tree: &ParseTree,
    id: NodeId,
    visitor: &mut T,
    ancestors: &mut Vec<NodeId>,
) {
    if !visitor.should_continue() {
        return;
    }

    visitor.visit(tree, id, ancestors);

    if tree.has_children(id) && visitor.descend(tree, id) {
        visitor.enter(tree, id, ancestors);
        ancestors.push(id);

        for &child in tree.children(id) {
            walk_recursive(tree, child, visitor, ancestors);
        }

        ancestors.pop();
        visitor.leave(tree, id, ancestors);
    }
}

/// A read-only cursor over an [`XediDocument`]
#[derive(Clone)]
pub struct Cursor<'a> {
    doc: &'a XediDocument,
    id: XediId,
}

impl<'a> Cursor<'a> {
    /// Cursor positioned on the document root
    pub fn new(doc: &'a XediDocument) -> Self {
        Self {
            doc,
            id: doc.root(),
        }
    }

    pub fn at(doc: &'a XediDocument, id: XediId) -> Self {
        Self { doc, id }
    }

    pub fn id(&self) -> XediId {
        self.id
    }

    pub fn name(&self) -> &'a str {
        self.doc.name(self.id)
    }

    pub fn value(&self) -> Option<&'a str> {
        self.doc.value(self.id)
    }

    /// Dotted path of the current element, for error reporting
    pub fn path(&self) -> String {
        self.doc.path_of(self.id)
    }

    pub fn has_children(&self) -> bool {
        !self.doc.children(self.id).is_empty()
    }

    pub fn child_count(&self) -> usize {
        self.doc.children(self.id).len()
    }

    /// First child with the given name
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] when no child has that name.
    pub fn child(&self, name: &str) -> Result<Cursor<'a>> {
        self.doc
            .child_named(self.id, name)
            .map(|id| Cursor { doc: self.doc, id })
            .ok_or_else(|| Error::node_not_found(crate::path::join(&self.path(), name)))
    }

    /// Child at a position
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] when the position is out of range.
    pub fn child_at(&self, index: usize) -> Result<Cursor<'a>> {
        self.doc
            .children(self.id)
            .get(index)
            .map(|&id| Cursor { doc: self.doc, id })
            .ok_or_else(|| Error::node_not_found(format!("{}[{index}]", self.path())))
    }

    /// All children in document order
    pub fn children(&self) -> impl Iterator<Item = Cursor<'a>> + use<'a> {
        let doc = self.doc;
        doc.children(self.id).iter().map(move |&id| Cursor { doc, id })
    }

    /// Follow a `/`-separated chain of child names
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] at the first missing name.
    pub fn navigate(&self, path: &str) -> Result<Cursor<'a>> {
        path.split('/')
            .filter(|name| !name.is_empty())
            .try_fold(self.clone(), |cursor, name| cursor.child(name))
    }
}
