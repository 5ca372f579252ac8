//! XEDI document: the XML-shaped output of the forward conversion
#![allow(clippy::must_use_candidate)] // Accessors are read-only lookups; #[must_use] everywhere adds noise.

use crate::path::{self, PathStep, XediPath};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Name of the document element every XEDI document hangs off
pub const ROOT_NODE: &str = "root";

/// Stable handle to an element of an [`XediDocument`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct XediId(usize);

impl XediId {
    pub const fn index(self) -> usize {
        self.0
    }
}

/// How `name(i)` path components pick a child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lookup {
    /// The child created under index label `i`
    #[default]
    Label,
    /// The i-th child carrying that name, counting same-named siblings only
    Occurrence,
}

#[derive(Debug, Clone)]
struct XediNode {
    name: String,
    value: Option<String>,
    label: Option<usize>,
    parent: Option<XediId>,
    children: Vec<XediId>,
}

/// Metadata recorded alongside a converted document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// EDI version taken from the GS segment
    pub version: Option<String>,

    /// Interchange control number (ISA13)
    pub interchange_control: Option<String>,

    /// Grammar used for detailed parsing
    pub grammar: Option<String>,

    /// Conversion timestamp
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Arena of named, optionally valued XML elements addressed by dotted paths.
///
/// Writes through a path create whatever is missing along it, so element
/// values can be set in any order without building parents first.
#[derive(Debug, Clone)]
pub struct XediDocument {
    nodes: Vec<XediNode>,
    root: XediId,
    pub metadata: DocumentMetadata,
}

impl Default for XediDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl XediDocument {
    /// Create an empty document with a `root` element
    pub fn new() -> Self {
        Self::with_root(ROOT_NODE)
    }

    pub fn with_root(name: impl Into<String>) -> Self {
        Self {
            nodes: vec![XediNode {
                name: name.into(),
                value: None,
                label: None,
                parent: None,
                children: Vec::new(),
            }],
            root: XediId(0),
            metadata: DocumentMetadata::default(),
        }
    }

    pub fn root(&self) -> XediId {
        self.root
    }

    pub fn name(&self, id: XediId) -> &str {
        &self.nodes[id.0].name
    }

    pub fn value(&self, id: XediId) -> Option<&str> {
        self.nodes[id.0].value.as_deref()
    }

    pub fn label(&self, id: XediId) -> Option<usize> {
        self.nodes[id.0].label
    }

    pub fn parent(&self, id: XediId) -> Option<XediId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: XediId) -> &[XediId] {
        &self.nodes[id.0].children
    }

    /// First child of `id` with the given name
    pub fn child_named(&self, id: XediId, name: &str) -> Option<XediId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&c| self.nodes[c.0].name == name)
    }

    /// Append a new element under `parent`
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if `name` is not usable as an XML tag.
    pub fn append_child(
        &mut self,
        parent: XediId,
        name: &str,
        label: Option<usize>,
    ) -> Result<XediId> {
        if !path::is_valid_name(name) {
            return Err(Error::invalid_name(name));
        }
        let id = XediId(self.nodes.len());
        self.nodes.push(XediNode {
            name: name.to_string(),
            value: None,
            label,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    pub fn set_node_value(&mut self, id: XediId, value: impl Into<String>) {
        self.nodes[id.0].value = Some(value.into());
    }

    /// Make sure every element along `path` exists and return the last one
    ///
    /// # Errors
    ///
    /// Fails on a malformed path, an invalid element name, or a positional
    /// component pointing past the existing children.
    pub fn ensure(&mut self, path: &str) -> Result<XediId> {
        let parsed = XediPath::parse(path)?;
        let mut current = self.root;
        for step in parsed.steps() {
            current = match self.select(current, step, Lookup::Label) {
                Some(found) => found,
                None => match step {
                    PathStep::Named { name, index } => self.append_child(current, name, *index)?,
                    PathStep::Position(_) => return Err(Error::node_not_found(path)),
                },
            };
        }
        Ok(current)
    }

    /// Set the value of the element at `path`, creating it if needed
    ///
    /// # Errors
    ///
    /// See [`XediDocument::ensure`].
    pub fn set_value(&mut self, path: &str, value: impl Into<String>) -> Result<XediId> {
        let id = self.ensure(path)?;
        self.set_node_value(id, value);
        Ok(id)
    }

    /// Resolve `path` using index labels
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] if any component does not resolve.
    pub fn find(&self, path: &str) -> Result<XediId> {
        self.find_with(path, Lookup::Label)
    }

    /// Resolve `path` with an explicit lookup mode
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] if any component does not resolve.
    pub fn find_with(&self, path: &str, lookup: Lookup) -> Result<XediId> {
        let parsed = XediPath::parse(path)?;
        let mut current = self.root;
        for step in parsed.steps() {
            current = self
                .select(current, step, lookup)
                .ok_or_else(|| Error::node_not_found(path))?;
        }
        Ok(current)
    }

    /// Value stored at `path`; `None` when the element exists without a value
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] if the element does not exist.
    pub fn get_value(&self, path: &str) -> Result<Option<&str>> {
        let id = self.find(path)?;
        Ok(self.value(id))
    }

    /// Number of children under the element at `path`
    ///
    /// # Errors
    ///
    /// Returns [`Error::NodeNotFound`] if the element does not exist.
    pub fn child_count(&self, path: &str) -> Result<usize> {
        Ok(self.children(self.find(path)?).len())
    }

    pub fn exists(&self, path: &str) -> bool {
        self.find(path).is_ok()
    }

    fn select(&self, parent: XediId, step: &PathStep, lookup: Lookup) -> Option<XediId> {
        let children = self.children(parent);
        match step {
            PathStep::Position(position) => children.get(*position).copied(),
            PathStep::Named { name, index: None } => self.child_named(parent, name),
            PathStep::Named {
                name,
                index: Some(index),
            } => match lookup {
                Lookup::Label => children.iter().copied().find(|&c| {
                    let node = &self.nodes[c.0];
                    node.name == *name && node.label == Some(*index)
                }),
                Lookup::Occurrence => children
                    .iter()
                    .copied()
                    .filter(|&c| self.nodes[c.0].name == *name)
                    .nth(*index),
            },
        }
    }

    /// Swap `id` for a new element called `new_name` that holds a deep copy of
    /// the original children and keeps its value and label.
    ///
    /// The replaced subtree stays in the arena, detached and unreachable from
    /// the root. Nodes are never freed, so the arena only grows; use
    /// [`reachable_count`](Self::reachable_count) for the live size.
    ///
    /// # Errors
    ///
    /// Fails if `id` is the document root or `new_name` is not a valid name.
    pub fn replace_node(&mut self, id: XediId, new_name: &str) -> Result<XediId> {
        if !path::is_valid_name(new_name) {
            return Err(Error::invalid_name(new_name));
        }
        let parent = self
            .parent(id)
            .ok_or_else(|| Error::invalid_path(self.path_of(id), "the document root cannot be replaced"))?;

        tracing::trace!(from = %self.path_of(id), to = new_name, "replacing node");
        let replacement = XediId(self.nodes.len());
        self.nodes.push(XediNode {
            name: new_name.to_string(),
            value: self.nodes[id.0].value.clone(),
            label: self.nodes[id.0].label,
            parent: Some(parent),
            children: Vec::new(),
        });
        let originals = self.nodes[id.0].children.clone();
        for child in originals {
            self.deep_copy(child, replacement);
        }

        if let Some(slot) = self.nodes[parent.0].children.iter_mut().find(|c| **c == id) {
            *slot = replacement;
        }
        self.nodes[id.0].parent = None;
        Ok(replacement)
    }

    fn deep_copy(&mut self, source: XediId, parent: XediId) -> XediId {
        let copy = XediId(self.nodes.len());
        self.nodes.push(XediNode {
            name: self.nodes[source.0].name.clone(),
            value: self.nodes[source.0].value.clone(),
            label: self.nodes[source.0].label,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(copy);
        let children = self.nodes[source.0].children.clone();
        for child in children {
            self.deep_copy(child, copy);
        }
        copy
    }

    /// Dotted path of `id` built from names and labels
    pub fn path_of(&self, id: XediId) -> String {
        let mut steps = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == self.root {
                break;
            }
            let node = &self.nodes[node_id.0];
            steps.push(match node.label {
                Some(label) => path::indexed(&node.name, label),
                None => node.name.clone(),
            });
            current = node.parent;
        }
        steps.reverse();
        steps.join(".")
    }

    /// Number of elements reachable from the root, root included
    pub fn reachable_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            count += 1;
            stack.extend_from_slice(self.children(id));
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_has_root() {
        let doc = XediDocument::new();
        assert_eq!(doc.name(doc.root()), ROOT_NODE);
        assert!(doc.children(doc.root()).is_empty());
    }

    #[test]
    fn test_set_value_creates_path() {
        let mut doc = XediDocument::new();
        doc.set_value("envelope(0).ISA(0).ISA01(0)", "00").unwrap();
        doc.set_value("envelope(0).ISA(0).ISA02(1)", "  ").unwrap();

        let isa = doc.find("envelope(0).ISA(0)").unwrap();
        assert_eq!(doc.children(isa).len(), 2);
        assert_eq!(doc.get_value("envelope(0).ISA(0).ISA01(0)").unwrap(), Some("00"));
        assert_eq!(doc.child_count("envelope(0)").unwrap(), 1);
    }

    #[test]
    fn test_label_lookup_distinguishes_indices() {
        let mut doc = XediDocument::new();
        doc.set_value("a.N1(3).N101(0)", "ST").unwrap();
        doc.set_value("a.N1(4).N101(0)", "BT").unwrap();
        assert_eq!(doc.child_count("a").unwrap(), 2);
        assert_eq!(doc.get_value("a.N1(4).N101(0)").unwrap(), Some("BT"));
        assert!(doc.find("a.N1(0)").is_err());
    }

    #[test]
    fn test_unindexed_component_reuses_first_match() {
        let mut doc = XediDocument::new();
        doc.ensure("envelope(0).funcgroupContainer.funcgroup(0)").unwrap();
        doc.ensure("envelope(0).funcgroupContainer.funcgroup(1)").unwrap();
        assert_eq!(doc.child_count("envelope(0).funcgroupContainer").unwrap(), 2);
        assert_eq!(doc.child_count("envelope(0)").unwrap(), 1);
    }

    #[test]
    fn test_occurrence_lookup_counts_same_names() {
        let mut doc = XediDocument::new();
        doc.ensure("t.badTransaction(0)").unwrap();
        doc.ensure("t.trans(1)").unwrap();
        doc.ensure("t.trans(2)").unwrap();

        let by_occurrence = doc.find_with("t.trans(0)", Lookup::Occurrence).unwrap();
        assert_eq!(doc.label(by_occurrence), Some(1));
        assert!(doc.find("t.trans(0)").is_err());
    }

    #[test]
    fn test_positional_component() {
        let mut doc = XediDocument::new();
        doc.ensure("a.x(0)").unwrap();
        doc.ensure("a.y(1)").unwrap();
        let second = doc.find("a.1").unwrap();
        assert_eq!(doc.name(second), "y");
        assert!(doc.ensure("a.5").is_err());
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut doc = XediDocument::new();
        assert!(matches!(
            doc.ensure("envelope(0).9BAD"),
            Err(Error::InvalidName { .. })
        ));
    }

    #[test]
    fn test_replace_node_copies_children() {
        let mut doc = XediDocument::new();
        doc.set_value("c.trans(0).ST(0).ST01(0)", "850").unwrap();
        doc.set_value("c.trans(0).SE(1).SE01(0)", "2").unwrap();
        doc.ensure("c.trans(1)").unwrap();

        let original = doc.find("c.trans(0)").unwrap();
        let replaced = doc.replace_node(original, "badTransaction").unwrap();

        assert_eq!(doc.name(replaced), "badTransaction");
        assert_eq!(doc.label(replaced), Some(0));
        assert_eq!(doc.children(replaced).len(), 2);
        assert_eq!(
            doc.get_value("c.badTransaction(0).ST(0).ST01(0)").unwrap(),
            Some("850")
        );
        let container = doc.find("c").unwrap();
        assert_eq!(doc.children(container)[0], replaced);
        assert_eq!(doc.children(container).len(), 2);
        assert!(doc.find("c.trans(0)").is_err());
    }

    #[test]
    fn test_replaced_subtree_is_detached() {
        let mut doc = XediDocument::new();
        doc.set_value("c.trans(0).ST(0).ST01(0)", "850").unwrap();
        let before = doc.reachable_count();

        let original = doc.find("c.trans(0)").unwrap();
        doc.replace_node(original, "badTransaction").unwrap();

        assert_eq!(doc.reachable_count(), before);
        assert_eq!(doc.parent(original), None);
        assert_eq!(doc.children(original).len(), 1);
    }

    #[test]
    fn test_replace_root_fails() {
        let mut doc = XediDocument::new();
        let root = doc.root();
        assert!(doc.replace_node(root, "other").is_err());
    }

    #[test]
    fn test_path_of_round_trips() {
        let mut doc = XediDocument::new();
        let id = doc
            .ensure("envelope(0).funcgroupContainer.funcgroup(1).transContainer.trans(0)")
            .unwrap();
        assert_eq!(
            doc.path_of(id),
            "envelope(0).funcgroupContainer.funcgroup(1).transContainer.trans(0)"
        );
        assert_eq!(doc.reachable_count(), 6);
    }
}
