//! Detailed, grammar-driven transaction-set parsing
//!
//! Every transaction set reconstituted by the coarse pass is parsed again on
//! its own with a [`TransactionParser`]. A failure never leaves the set: it
//! is replaced by a `BadTransaction` node holding the raw text, a diagnostic
//! is recorded and the next set is parsed.

use crate::envelopes;
use crate::normalize::denormalize;
use crate::syntax::{COMPOSITE_SENTINEL, DelimiterSet, ELEMENT_SENTINEL, SEGMENT_SENTINEL};
use crate::Result;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace, warn};
use xedi_grammar::{Direction, Grammar, GrammarLoader, LoopRule, VersionTable, is_segment_tag};
use xedi_ir::{
    Diagnostic, DiagnosticKind, Diagnostics, EnvelopeTag, GroupArity, NodeId, NodeKind, ParseTree,
};

/// Why one transaction set could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("transaction set is empty")]
    Empty,

    #[error("transaction set starts with '{found}' instead of ST")]
    MissingHeader { found: String },

    #[error("transaction set ends with '{found}' instead of SE")]
    MissingTrailer { found: String },

    #[error("segment {position} has a malformed tag '{tag}'")]
    MalformedTag { position: usize, tag: String },

    #[error("transaction set '{code}' is not accepted by grammar {grammar}")]
    UnsupportedTransactionSet { code: String, grammar: String },

    #[error("segment {position} ('{tag}') is not defined by grammar {grammar}")]
    UnknownSegment {
        position: usize,
        tag: String,
        grammar: String,
    },

    #[error("segment {position} ('{tag}') has {count} elements, at least {min} required")]
    TooFewElements {
        position: usize,
        tag: String,
        count: usize,
        min: usize,
    },

    #[error("segment {position} ('{tag}') has {count} elements, at most {max} allowed")]
    TooManyElements {
        position: usize,
        tag: String,
        count: usize,
        max: usize,
    },

    #[error("SE02 '{trailer}' does not repeat ST02 '{header}'")]
    ControlNumberMismatch { header: String, trailer: String },
}

/// Parses one sentinel-delimited transaction set into a typed subtree
pub trait TransactionParser: Send + Sync {
    /// Name shown in logs and diagnostics
    fn name(&self) -> &str;

    /// Parse `text` into new nodes of `tree` and return the detached
    /// `Transaction` node
    ///
    /// # Errors
    ///
    /// Returns the [`ParseFailure`] describing the first problem found.
    /// Nodes already added to `tree` are left unattached.
    fn parse(&self, text: &str, tree: &mut ParseTree) -> std::result::Result<NodeId, ParseFailure>;
}

/// [`TransactionParser`] driven by a declarative [`Grammar`]
#[derive(Debug, Clone)]
pub struct GrammarParser {
    grammar: Arc<Grammar>,
}

/// Open loop on the scope stack
struct Frame<'g> {
    rule: &'g LoopRule,
    loop_node: NodeId,
    iteration: NodeId,
}

struct RawSegment<'t> {
    tag: &'t str,
    elements: Vec<&'t str>,
}

impl GrammarParser {
    pub fn new(grammar: Arc<Grammar>) -> Self {
        Self { grammar }
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    fn split(text: &str) -> std::result::Result<Vec<RawSegment<'_>>, ParseFailure> {
        let body = text.strip_suffix(SEGMENT_SENTINEL).unwrap_or(text);
        if body.is_empty() {
            return Err(ParseFailure::Empty);
        }
        Ok(body
            .split(SEGMENT_SENTINEL)
            .map(|segment| {
                let mut parts = segment.split(ELEMENT_SENTINEL);
                let tag = parts.next().unwrap_or_default();
                RawSegment {
                    tag,
                    elements: parts.collect(),
                }
            })
            .collect())
    }

    fn check(&self, segments: &[RawSegment<'_>]) -> std::result::Result<(), ParseFailure> {
        let (Some(first), Some(last)) = (segments.first(), segments.last()) else {
            return Err(ParseFailure::Empty);
        };
        if first.tag != EnvelopeTag::St.as_str() {
            return Err(ParseFailure::MissingHeader {
                found: first.tag.to_string(),
            });
        }
        if segments.len() < 2 || last.tag != EnvelopeTag::Se.as_str() {
            return Err(ParseFailure::MissingTrailer {
                found: last.tag.to_string(),
            });
        }

        let code = first.elements.first().copied().unwrap_or_default();
        if !self.grammar.accepts_transaction_set(code) {
            return Err(ParseFailure::UnsupportedTransactionSet {
                code: code.to_string(),
                grammar: self.grammar.name.clone(),
            });
        }

        for (position, segment) in segments.iter().enumerate() {
            if !is_segment_tag(segment.tag) {
                return Err(ParseFailure::MalformedTag {
                    position,
                    tag: segment.tag.to_string(),
                });
            }
            let Some(rule) = self.grammar.segment(segment.tag) else {
                if self.grammar.is_strict() {
                    return Err(ParseFailure::UnknownSegment {
                        position,
                        tag: segment.tag.to_string(),
                        grammar: self.grammar.name.clone(),
                    });
                }
                continue;
            };
            let count = segment.elements.len();
            if count < rule.min_elements {
                return Err(ParseFailure::TooFewElements {
                    position,
                    tag: segment.tag.to_string(),
                    count,
                    min: rule.min_elements,
                });
            }
            if let Some(max) = rule.max_elements.filter(|&max| count > max) {
                return Err(ParseFailure::TooManyElements {
                    position,
                    tag: segment.tag.to_string(),
                    count,
                    max,
                });
            }
        }

        if self.grammar.checks_control_numbers() {
            let header = first.elements.get(1).copied().unwrap_or_default();
            let trailer = last.elements.get(1).copied().unwrap_or_default();
            if header != trailer {
                return Err(ParseFailure::ControlNumberMismatch {
                    header: header.to_string(),
                    trailer: trailer.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Node a segment tagged `tag` belongs under, opening or closing loops
    /// on the way
    fn place<'g>(
        &'g self,
        tree: &mut ParseTree,
        transaction: NodeId,
        stack: &mut Vec<Frame<'g>>,
        tag: &str,
    ) -> NodeId {
        if EnvelopeTag::from_tag(tag).is_some() {
            stack.clear();
            return transaction;
        }

        for depth in (0..stack.len()).rev() {
            let rule = stack[depth].rule;
            if let Some(nested) = rule.loops.iter().find(|l| l.trigger == tag) {
                stack.truncate(depth + 1);
                let frame = open_loop(tree, stack[depth].iteration, nested);
                let iteration = frame.iteration;
                stack.push(frame);
                return iteration;
            }
            if rule.trigger == tag {
                stack.truncate(depth + 1);
                let iteration = tree.append(
                    stack[depth].loop_node,
                    NodeKind::LoopIteration,
                    envelopes::ITERATION_NODE,
                );
                stack[depth].iteration = iteration;
                return iteration;
            }
            if rule.has_member(tag) {
                stack.truncate(depth + 1);
                return stack[depth].iteration;
            }
        }

        if let Some(rule) = self.grammar.loops.iter().find(|l| l.trigger == tag) {
            stack.clear();
            let frame = open_loop(tree, transaction, rule);
            let iteration = frame.iteration;
            stack.push(frame);
            return iteration;
        }

        if !self.grammar.knows_segment(tag) {
            if let Some(frame) = stack.last() {
                return frame.iteration;
            }
        }
        stack.clear();
        transaction
    }

    fn build_segment(&self, tree: &mut ParseTree, parent: NodeId, segment: &RawSegment<'_>) {
        let node = tree.append(parent, NodeKind::Segment, segment.tag);
        let rule = self.grammar.segment(segment.tag);
        let elements = &segment.elements;

        let mut ordinal = 1;
        while ordinal <= elements.len() {
            if let Some(group) = rule.and_then(|r| r.group_at(ordinal)) {
                let consumed = append_groups(
                    tree,
                    node,
                    group.arity,
                    group.max_repeats,
                    &elements[ordinal - 1..],
                );
                ordinal += consumed;
                if consumed > 0 {
                    continue;
                }
            }
            append_element(tree, node, elements[ordinal - 1]);
            ordinal += 1;
        }
    }
}

impl TransactionParser for GrammarParser {
    fn name(&self) -> &str {
        &self.grammar.name
    }

    fn parse(&self, text: &str, tree: &mut ParseTree) -> std::result::Result<NodeId, ParseFailure> {
        let segments = Self::split(text)?;
        self.check(&segments)?;

        let transaction = tree.add(NodeKind::Transaction, envelopes::TRANSACTION_NODE);
        let mut stack = Vec::new();
        for segment in &segments {
            let parent = self.place(tree, transaction, &mut stack, segment.tag);
            trace!(tag = segment.tag, depth = stack.len(), "placed segment");
            self.build_segment(tree, parent, segment);
        }
        Ok(transaction)
    }
}

fn open_loop<'g>(tree: &mut ParseTree, parent: NodeId, rule: &'g LoopRule) -> Frame<'g> {
    let reusable = tree
        .children(parent)
        .last()
        .copied()
        .filter(|&last| tree.kind(last) == NodeKind::Loop && tree.text(last) == rule.id);
    let loop_node =
        reusable.unwrap_or_else(|| tree.append(parent, NodeKind::Loop, rule.id.as_str()));
    let iteration = tree.append(loop_node, NodeKind::LoopIteration, envelopes::ITERATION_NODE);
    Frame {
        rule,
        loop_node,
        iteration,
    }
}

/// Append groups of `arity` from `values`; returns how many values were used
fn append_groups(
    tree: &mut ParseTree,
    segment: NodeId,
    arity: GroupArity,
    max_repeats: Option<usize>,
    values: &[&str],
) -> usize {
    let limit = max_repeats.unwrap_or(usize::MAX);
    let chunks: Vec<&[&str]> = values.chunks(arity.size()).take(limit).collect();
    if chunks.is_empty() {
        return 0;
    }

    let container = tree.append(
        segment,
        NodeKind::ElementGroupContainer(arity),
        arity.container_name(),
    );
    let mut consumed = 0;
    for chunk in chunks {
        let group = tree.append(container, NodeKind::ElementGroup(arity), arity.group_name());
        for value in chunk {
            append_element(tree, group, value);
        }
        consumed += chunk.len();
    }
    consumed
}

fn append_element(tree: &mut ParseTree, parent: NodeId, value: &str) {
    if !value.contains(COMPOSITE_SENTINEL) {
        tree.append(parent, NodeKind::Element, value);
        return;
    }
    let element = tree.append(parent, NodeKind::Element, "");
    if value.split(COMPOSITE_SENTINEL).all(str::is_empty) {
        return;
    }
    for component in value.split(COMPOSITE_SENTINEL) {
        tree.append(element, NodeKind::CompositeElement, component);
    }
}

/// Picks a [`TransactionParser`] for the version found in the GS segment
///
/// Parsers registered with [`ParserRegistry::register`] win over the
/// grammar table; their key is matched as a substring of the version.
pub struct ParserRegistry {
    table: VersionTable,
    loader: GrammarLoader,
    direction: Direction,
    custom: Vec<(String, Arc<dyn TransactionParser>)>,
}

impl ParserRegistry {
    pub fn new(loader: GrammarLoader, direction: Direction) -> Self {
        Self {
            table: VersionTable::default(),
            loader,
            direction,
            custom: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_table(mut self, table: VersionTable) -> Self {
        self.table = table;
        self
    }

    pub fn register(&mut self, key: impl Into<String>, parser: Arc<dyn TransactionParser>) {
        self.custom.push((key.into(), parser));
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Parser for a GS08 version string
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Grammar`] if the selected grammar cannot be
    /// loaded.
    pub fn resolve(&self, version: &str) -> Result<Arc<dyn TransactionParser>> {
        if let Some((key, parser)) = self.custom.iter().find(|(key, _)| version.contains(key.as_str())) {
            debug!(version, key, parser = parser.name(), "using registered parser");
            return Ok(Arc::clone(parser));
        }
        let name = self.table.grammar_name(version, self.direction);
        let grammar = self.loader.load(&name)?;
        debug!(version, grammar = %name, "resolved grammar");
        Ok(Arc::new(GrammarParser::new(grammar)))
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("table", &self.table)
            .field("direction", &self.direction)
            .field(
                "custom",
                &self.custom.iter().map(|(key, _)| key.as_str()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Build the detailed tree from a reconstituted skeleton
///
/// Envelope markers become segments, and each transaction set is replaced by
/// the parser's subtree or, on failure, by a `BadTransaction` node whose text
/// is the set rendered in the message's own delimiters. Failures are reported
/// as [`DiagnosticKind::TransactionParseFailed`] carrying the same text.
pub fn parse_transaction_sets(
    skeleton: &ParseTree,
    parser: &dyn TransactionParser,
    delimiters: &DelimiterSet,
) -> (ParseTree, Diagnostics) {
    let mut out = ParseTree::with_capacity(skeleton.len());
    let mut diagnostics = Diagnostics::default();
    let Some(root) = skeleton.root() else {
        return (out, diagnostics);
    };

    let mut copier = Copier {
        skeleton,
        parser,
        delimiters,
        out: &mut out,
        diagnostics: &mut diagnostics,
    };
    let root_locator = envelopes::node_name(skeleton, root)
        .map(|name| xedi_ir::path::indexed(&name, 0))
        .unwrap_or_default();
    let new_root = copier.copy(root, None, &root_locator);
    out.set_root(new_root);

    debug!(
        parser = parser.name(),
        failed = diagnostics.count(DiagnosticKind::TransactionParseFailed),
        "detailed parse finished"
    );
    (out, diagnostics)
}

struct Copier<'a> {
    skeleton: &'a ParseTree,
    parser: &'a dyn TransactionParser,
    delimiters: &'a DelimiterSet,
    out: &'a mut ParseTree,
    diagnostics: &'a mut Diagnostics,
}

impl Copier<'_> {
    fn copy(&mut self, id: NodeId, parent: Option<NodeId>, locator: &str) -> NodeId {
        let kind = self.skeleton.kind(id);
        let text = self.skeleton.text(id);

        if kind == NodeKind::Transaction {
            return self.transaction(text, parent, locator);
        }

        let (kind, text) = match kind {
            NodeKind::Marker(tag) => (NodeKind::Segment, tag.as_str()),
            other => (other, text),
        };
        let node = match parent {
            Some(parent) => self.out.append(parent, kind, text),
            None => self.out.add(kind, text),
        };

        for (position, &child) in self.skeleton.children(id).iter().enumerate() {
            let child_locator = match envelopes::node_name(self.skeleton, child) {
                Some(name) => xedi_ir::path::join(locator, &xedi_ir::path::indexed(&name, position)),
                None => locator.to_string(),
            };
            self.copy(child, Some(node), &child_locator);
        }
        node
    }

    fn transaction(&mut self, text: &str, parent: Option<NodeId>, locator: &str) -> NodeId {
        let parsed = self.parser.parse(text, self.out);
        let node = match parsed {
            Ok(node) => node,
            Err(failure) => {
                warn!(at = locator, %failure, "transaction set failed to parse");
                let raw = denormalize(text, self.delimiters).unwrap_or_else(|_| text.to_string());
                self.diagnostics.push(
                    Diagnostic::new(DiagnosticKind::TransactionParseFailed, failure.to_string())
                        .with_path(locator)
                        .with_source_text(raw.clone()),
                );
                self.out.add(NodeKind::BadTransaction, raw)
            }
        };
        match parent {
            Some(parent) => self.out.attach(parent, node),
            None => self.out.set_root(node),
        }
        node
    }
}
