//! Coarse envelope parser and transaction reconstitution
//!
//! The coarse pass only understands the envelope: ISA/IEA, GS/GE and ST/SE.
//! It splits everything on the sentinel separators, so each transaction set
//! comes out as a run of segment and element tokens. [`reconstitute`] then
//! rejoins those tokens into one sentinel-delimited string per transaction
//! set, which is what the detailed parser consumes. Keeping transaction sets
//! as opaque strings lets a malformed one fail on its own.

use crate::syntax::{COMPOSITE_SENTINEL, ELEMENT_SENTINEL, SEGMENT_SENTINEL};
use crate::{Error, Result};
use tracing::{debug, trace, warn};
use xedi_ir::{EnvelopeTag, NodeId, NodeKind, ParseTree};

/// Position of ISA16 among the ISA element children
const ISA_COMPOSITE_ELEMENT: usize = 15;

/// Where the coarse parser is within the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Inside ISA, between functional groups
    Interchange,
    /// Inside GS, between transaction sets
    Group,
    /// Inside ST
    Transaction,
    /// IEA seen
    Closed,
}

/// Delimiter-driven tokenizer producing the envelope skeleton
#[derive(Debug, Clone)]
pub struct CoarseParser {
    composite: char,
}

struct Builder {
    tree: ParseTree,
    envelope: NodeId,
    groups: NodeId,
    group: Option<NodeId>,
    transactions: Option<NodeId>,
    transaction: Option<NodeId>,
    state: State,
}

impl CoarseParser {
    /// `composite` is the message's own composite separator, restored into
    /// ISA16 so the header keeps its literal value.
    pub fn new(composite: char) -> Self {
        Self { composite }
    }

    /// Tokenize a normalized interchange into its skeleton
    ///
    /// # Errors
    ///
    /// Returns [`Error::EnvelopeParseFailed`] when the text is not shaped
    /// like `ISA (GS (ST ... SE)* GE)* IEA`.
    pub fn parse(&self, normalized: &str) -> Result<ParseTree> {
        let segments: Vec<&str> = normalized
            .split(SEGMENT_SENTINEL)
            .map(|s| s.trim_start_matches(['\r', '\n']))
            .filter(|s| !s.is_empty())
            .collect();

        let Some((first, rest)) = segments.split_first() else {
            return Err(Error::envelope(0, "no segments found"));
        };

        let mut builder = self.start(first)?;
        for (offset, segment) in rest.iter().enumerate() {
            builder.push(offset + 1, segment)?;
        }

        match builder.state {
            State::Closed => {}
            State::Interchange => {
                return Err(Error::envelope(segments.len(), "interchange has no IEA trailer"));
            }
            State::Group | State::Transaction => {
                return Err(Error::envelope(segments.len(), "functional group has no GE trailer"));
            }
        }

        debug!(
            segments = segments.len(),
            groups = builder.tree.children(builder.groups).len(),
            "parsed envelope"
        );
        Ok(builder.tree)
    }

    fn start(&self, first: &str) -> Result<Builder> {
        let (tag, elements) = split_segment(first);
        if tag != EnvelopeTag::Isa.as_str() {
            return Err(Error::envelope(0, format!("expected ISA, found '{tag}'")));
        }

        let mut tree = ParseTree::new();
        let envelope = tree.add(NodeKind::Envelope, "envelope");
        tree.set_root(envelope);
        let isa = tree.append(envelope, NodeKind::Marker(EnvelopeTag::Isa), tag);
        for (position, value) in elements.enumerate() {
            let value = if position == ISA_COMPOSITE_ELEMENT {
                value.replace(COMPOSITE_SENTINEL, &self.composite.to_string())
            } else {
                value.to_string()
            };
            tree.append(isa, NodeKind::Element, value);
        }
        let groups = tree.append(envelope, NodeKind::FuncGroupContainer, "funcgroupContainer");

        Ok(Builder {
            tree,
            envelope,
            groups,
            group: None,
            transactions: None,
            transaction: None,
            state: State::Interchange,
        })
    }
}

impl Builder {
    fn push(&mut self, index: usize, segment: &str) -> Result<()> {
        let (tag, _) = split_segment(segment);
        let envelope_tag = EnvelopeTag::from_tag(tag);
        trace!(index, tag, state = ?self.state, "coarse segment");

        match (self.state, envelope_tag) {
            (State::Closed, _) => Err(Error::envelope(index, format!("'{tag}' after IEA"))),

            (State::Interchange, Some(EnvelopeTag::Gs)) => {
                let group = self.tree.append(self.groups, NodeKind::FuncGroup, "funcgroup");
                self.marker(group, EnvelopeTag::Gs, segment);
                let transactions =
                    self.tree.append(group, NodeKind::TransactionContainer, "transContainer");
                self.group = Some(group);
                self.transactions = Some(transactions);
                self.state = State::Group;
                Ok(())
            }
            (State::Interchange, Some(EnvelopeTag::Iea)) => {
                self.marker(self.envelope, EnvelopeTag::Iea, segment);
                self.state = State::Closed;
                Ok(())
            }
            (State::Interchange, _) => Err(Error::envelope(
                index,
                format!("expected GS or IEA, found '{tag}'"),
            )),

            (State::Group | State::Transaction, Some(EnvelopeTag::St)) => {
                if self.state == State::Transaction {
                    warn!(index, "ST before SE; previous transaction set left open");
                }
                let container = self.current_transactions(index)?;
                let transaction = self.tree.append(container, NodeKind::Transaction, "");
                self.marker(transaction, EnvelopeTag::St, segment);
                self.transaction = Some(transaction);
                self.state = State::Transaction;
                Ok(())
            }
            (State::Group | State::Transaction, Some(EnvelopeTag::Ge)) => {
                if self.state == State::Transaction {
                    warn!(index, "GE before SE; transaction set left open");
                }
                let group = self
                    .group
                    .ok_or_else(|| Error::envelope(index, "GE outside a functional group"))?;
                self.marker(group, EnvelopeTag::Ge, segment);
                self.group = None;
                self.transactions = None;
                self.transaction = None;
                self.state = State::Interchange;
                Ok(())
            }
            (State::Group, _) => Err(Error::envelope(
                index,
                format!("expected ST or GE, found '{tag}'"),
            )),

            (State::Transaction, Some(EnvelopeTag::Se)) => {
                let transaction = self.current_transaction(index)?;
                self.marker(transaction, EnvelopeTag::Se, segment);
                self.transaction = None;
                self.state = State::Group;
                Ok(())
            }
            (State::Transaction, Some(EnvelopeTag::Iea | EnvelopeTag::Isa | EnvelopeTag::Gs)) => {
                Err(Error::envelope(
                    index,
                    format!("'{tag}' inside an open transaction set"),
                ))
            }
            (State::Transaction, None) => {
                let transaction = self.current_transaction(index)?;
                let node = self.tree.append(transaction, NodeKind::Segment, tag);
                append_elements(&mut self.tree, node, segment);
                Ok(())
            }
        }
    }

    fn marker(&mut self, parent: NodeId, tag: EnvelopeTag, segment: &str) {
        let node = self.tree.append(parent, NodeKind::Marker(tag), tag.as_str());
        append_elements(&mut self.tree, node, segment);
    }

    fn current_transactions(&self, index: usize) -> Result<NodeId> {
        self.transactions
            .ok_or_else(|| Error::envelope(index, "ST outside a functional group"))
    }

    fn current_transaction(&self, index: usize) -> Result<NodeId> {
        self.transaction
            .ok_or_else(|| Error::envelope(index, "segment outside a transaction set"))
    }
}

/// Split a segment into its tag and element values
fn split_segment(segment: &str) -> (&str, std::str::Split<'_, char>) {
    let mut parts = segment.split(ELEMENT_SENTINEL);
    let tag = parts.next().unwrap_or_default();
    (tag, parts)
}

fn append_elements(tree: &mut ParseTree, parent: NodeId, segment: &str) {
    let (_, elements) = split_segment(segment);
    for value in elements {
        tree.append(parent, NodeKind::Element, value);
    }
}

/// Rejoin each transaction set's tokens into one sentinel-delimited string
///
/// The string is stored as the transaction node's text and its token
/// children are detached. Returns the number of transaction sets rejoined.
pub fn reconstitute(tree: &mut ParseTree) -> usize {
    let transactions = tree.find_all(NodeKind::Transaction);
    for &transaction in &transactions {
        let text = join_transaction(tree, transaction);
        trace!(node = %transaction, len = text.len(), "reconstituted transaction set");
        tree.take_children(transaction);
        tree.set_text(transaction, text);
    }
    debug!(count = transactions.len(), "reconstituted transaction sets");
    transactions.len()
}

fn join_transaction(tree: &ParseTree, transaction: NodeId) -> String {
    let mut text = String::new();
    for &segment in tree.children(transaction) {
        text.push_str(tree.text(segment));
        for &element in tree.children(segment) {
            text.push(ELEMENT_SENTINEL);
            text.push_str(tree.text(element));
        }
        text.push(SEGMENT_SENTINEL);
    }
    text
}
