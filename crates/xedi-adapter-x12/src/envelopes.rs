//! X12 envelope naming and control-number summaries
//!
//! Holds the node names the XEDI document uses for the interchange
//! structure, the ordinals of the trailer counts that are regenerated on the
//! way out, and an [`EnvelopeSummary`] read back from a finished document.

use serde::{Deserialize, Serialize};
use xedi_ir::{Cursor, EnvelopeTag, NodeId, NodeKind, ParseTree, XediDocument};

pub const ENVELOPE_NODE: &str = "envelope";
pub const FUNC_GROUP_CONTAINER_NODE: &str = "funcgroupContainer";
pub const FUNC_GROUP_NODE: &str = "funcgroup";
pub const TRANSACTION_CONTAINER_NODE: &str = "transContainer";
pub const TRANSACTION_NODE: &str = "trans";
pub const BAD_TRANSACTION_NODE: &str = "badTransaction";
pub const LOOP_NODE_PREFIX: &str = "loop";
pub const ITERATION_NODE: &str = "iteration";

/// ISA16 carries the composite separator
pub const COMPOSITE_SEPARATOR_ORDINAL: usize = 16;
/// IEA01 counts functional groups
pub const GROUP_COUNT_ORDINAL: usize = 1;
/// GE01 counts transaction sets
pub const TRANSACTION_COUNT_ORDINAL: usize = 1;
/// SE01 counts segments, ST and SE included
pub const SEGMENT_COUNT_ORDINAL: usize = 1;

/// XEDI element name for a parse node
///
/// Element and composite nodes are named by the indexer from their position,
/// so they have no fixed name here.
pub fn node_name(tree: &ParseTree, id: NodeId) -> Option<String> {
    let name = match tree.kind(id) {
        NodeKind::Envelope => ENVELOPE_NODE.to_string(),
        NodeKind::FuncGroupContainer => FUNC_GROUP_CONTAINER_NODE.to_string(),
        NodeKind::FuncGroup => FUNC_GROUP_NODE.to_string(),
        NodeKind::TransactionContainer => TRANSACTION_CONTAINER_NODE.to_string(),
        NodeKind::Transaction => TRANSACTION_NODE.to_string(),
        NodeKind::BadTransaction => BAD_TRANSACTION_NODE.to_string(),
        NodeKind::Loop => loop_name(tree.text(id)),
        NodeKind::LoopIteration => ITERATION_NODE.to_string(),
        NodeKind::Segment => tree.text(id).to_string(),
        NodeKind::Marker(tag) => tag.as_str().to_string(),
        NodeKind::ElementGroupContainer(arity) => arity.container_name().to_string(),
        NodeKind::ElementGroup(arity) => arity.group_name().to_string(),
        NodeKind::Element | NodeKind::CompositeElement => return None,
    };
    Some(name)
}

/// `loopN1` for loop id `N1`
pub fn loop_name(id: &str) -> String {
    format!("{LOOP_NODE_PREFIX}{id}")
}

pub fn is_loop_name(name: &str) -> bool {
    name.len() > LOOP_NODE_PREFIX.len() && name.starts_with(LOOP_NODE_PREFIX)
}

/// `BEG03` for the third element of `BEG`
pub fn element_name(segment: &str, ordinal: usize) -> String {
    format!("{segment}{ordinal:02}")
}

/// `REF04_02` for the second component of `REF04`
pub fn composite_name(element: &str, ordinal: usize) -> String {
    format!("{element}_{ordinal:02}")
}

/// Ordinal encoded in the last two characters of an element name
pub fn parse_ordinal(name: &str) -> Option<usize> {
    let start = name.len().checked_sub(2)?;
    let suffix = name.get(start..)?;
    if !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Whether an envelope segment's element carries a count regenerated on
/// output
pub fn is_computed_count(tag: EnvelopeTag, ordinal: usize) -> bool {
    match tag {
        EnvelopeTag::Iea => ordinal == GROUP_COUNT_ORDINAL,
        EnvelopeTag::Ge => ordinal == TRANSACTION_COUNT_ORDINAL,
        EnvelopeTag::Se => ordinal == SEGMENT_COUNT_ORDINAL,
        EnvelopeTag::Isa | EnvelopeTag::Gs | EnvelopeTag::St => false,
    }
}

/// Control numbers and counts of one interchange
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeSummary {
    /// Interchange control number (ISA13)
    pub interchange_control: Option<String>,
    /// Group count declared in IEA01
    pub declared_groups: Option<String>,
    pub groups: Vec<GroupSummary>,
}

/// One functional group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    /// Functional identifier code (GS01)
    pub functional_id: Option<String>,
    /// Group control number (GS06)
    pub control_number: Option<String>,
    /// Version (GS08)
    pub version: Option<String>,
    /// Transaction count declared in GE01
    pub declared_transactions: Option<String>,
    pub transactions: Vec<TransactionSummary>,
}

/// One transaction set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSummary {
    /// Transaction set identifier (ST01)
    pub code: Option<String>,
    /// Transaction set control number (ST02)
    pub control_number: Option<String>,
    /// Marked or parsed as a bad transaction
    pub bad: bool,
}

impl EnvelopeSummary {
    /// Read the summary from a document; missing pieces stay `None`
    pub fn from_document(doc: &XediDocument) -> Self {
        let Ok(envelope) = Cursor::new(doc).child(ENVELOPE_NODE) else {
            return Self::default();
        };

        let groups = envelope
            .child(FUNC_GROUP_CONTAINER_NODE)
            .map(|container| container.children().map(|group| summarize_group(&group)).collect())
            .unwrap_or_default();

        Self {
            interchange_control: element_value(&envelope, EnvelopeTag::Isa, 13),
            declared_groups: element_value(&envelope, EnvelopeTag::Iea, GROUP_COUNT_ORDINAL),
            groups,
        }
    }

    pub fn transaction_count(&self) -> usize {
        self.groups.iter().map(|g| g.transactions.len()).sum()
    }

    pub fn bad_transaction_count(&self) -> usize {
        self.groups
            .iter()
            .flat_map(|g| &g.transactions)
            .filter(|t| t.bad)
            .count()
    }

    /// Declared trailer counts that disagree with the document structure
    pub fn count_mismatches(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if let Some(declared) = disagreeing(self.declared_groups.as_deref(), self.groups.len()) {
            problems.push(format!(
                "IEA01 declares {declared} functional groups, found {}",
                self.groups.len()
            ));
        }
        for (index, group) in self.groups.iter().enumerate() {
            let found = group.transactions.len();
            if let Some(declared) = disagreeing(group.declared_transactions.as_deref(), found) {
                problems.push(format!(
                    "GE01 of group {index} declares {declared} transaction sets, found {found}"
                ));
            }
        }
        problems
    }
}

fn disagreeing(declared: Option<&str>, found: usize) -> Option<&str> {
    declared.filter(|d| d.trim().parse::<usize>().ok() != Some(found))
}

fn summarize_group(group: &Cursor<'_>) -> GroupSummary {
    let transactions = group
        .child(TRANSACTION_CONTAINER_NODE)
        .map(|container| {
            container
                .children()
                .map(|transaction| TransactionSummary {
                    code: element_value(&transaction, EnvelopeTag::St, 1),
                    control_number: element_value(&transaction, EnvelopeTag::St, 2),
                    bad: transaction.name() == BAD_TRANSACTION_NODE,
                })
                .collect()
        })
        .unwrap_or_default();

    GroupSummary {
        functional_id: element_value(group, EnvelopeTag::Gs, 1),
        control_number: element_value(group, EnvelopeTag::Gs, 6),
        version: element_value(group, EnvelopeTag::Gs, 8),
        declared_transactions: element_value(group, EnvelopeTag::Ge, TRANSACTION_COUNT_ORDINAL),
        transactions,
    }
}

/// Value of element `ordinal` of the envelope segment `tag` directly under
/// `parent`
fn element_value(parent: &Cursor<'_>, tag: EnvelopeTag, ordinal: usize) -> Option<String> {
    let segment = parent.child(tag.as_str()).ok()?;
    let name = element_name(tag.as_str(), ordinal);
    segment
        .children()
        .find(|child| child.name() == name)
        .and_then(|child| child.value().map(str::to_string))
}
