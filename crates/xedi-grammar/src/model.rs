//! Grammar model definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use xedi_ir::GroupArity;

/// Which side of an exchange a grammar describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Documents sent to a trading partner (850, 810, 856 ...)
    #[default]
    Request,
    /// Documents answering a request (855, 865, 997 ...)
    Response,
}

impl Direction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "request" => Ok(Self::Request),
            "response" => Ok(Self::Response),
            other => Err(format!("unknown direction '{other}'")),
        }
    }
}

/// A complete transaction-set grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grammar {
    pub name: String,
    pub version: String,
    pub parent: Option<String>,
    pub direction: Option<Direction>,
    /// Accepted ST01 codes; empty accepts any
    pub transaction_sets: Vec<String>,
    /// Reject segments the grammar does not mention
    pub strict_segments: Option<bool>,
    /// Require SE02 to repeat ST02
    pub check_control_numbers: Option<bool>,
    pub segments: Vec<SegmentRule>,
    pub loops: Vec<LoopRule>,
    /// Names of the grammars merged into this one, base first
    pub inheritance_chain: Vec<String>,
}

/// Rule for one segment tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRule {
    pub tag: String,
    pub min_elements: usize,
    pub max_elements: Option<usize>,
    pub groups: Vec<GroupRule>,
}

/// A run of repeating element groups inside a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupRule {
    /// 1-based ordinal of the first grouped element
    pub start: usize,
    pub arity: GroupArity,
    /// Upper bound on groups; `None` lets the run absorb every remaining element
    pub max_repeats: Option<usize>,
}

/// A repeating loop opened by a trigger segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopRule {
    pub id: String,
    pub trigger: String,
    /// Tags that may follow the trigger inside one iteration
    pub members: Vec<String>,
    pub loops: Vec<LoopRule>,
}

impl Grammar {
    /// Create an empty grammar
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            parent: None,
            direction: None,
            transaction_sets: Vec::new(),
            strict_segments: None,
            check_control_numbers: None,
            segments: Vec::new(),
            loops: Vec::new(),
            inheritance_chain: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_segments(mut self, segments: Vec<SegmentRule>) -> Self {
        self.segments = segments;
        self
    }

    #[must_use]
    pub fn with_loops(mut self, loops: Vec<LoopRule>) -> Self {
        self.loops = loops;
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict_segments.unwrap_or(false)
    }

    #[must_use]
    pub fn checks_control_numbers(&self) -> bool {
        self.check_control_numbers.unwrap_or(true)
    }

    #[must_use]
    pub fn segment(&self, tag: &str) -> Option<&SegmentRule> {
        self.segments.iter().find(|s| s.tag == tag)
    }

    /// Whether the grammar mentions `tag` anywhere
    #[must_use]
    pub fn knows_segment(&self, tag: &str) -> bool {
        self.segment(tag).is_some() || self.loops.iter().any(|l| l.mentions(tag))
    }

    #[must_use]
    pub fn accepts_transaction_set(&self, code: &str) -> bool {
        self.transaction_sets.is_empty() || self.transaction_sets.iter().any(|c| c == code)
    }
}

impl SegmentRule {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            min_elements: 0,
            max_elements: None,
            groups: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_min(mut self, min: usize) -> Self {
        self.min_elements = min;
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: GroupRule) -> Self {
        self.groups.push(group);
        self
    }

    /// Group run starting at `ordinal`, if any
    #[must_use]
    pub fn group_at(&self, ordinal: usize) -> Option<&GroupRule> {
        self.groups.iter().find(|g| g.start == ordinal)
    }
}

impl GroupRule {
    #[must_use]
    pub fn new(start: usize, arity: GroupArity) -> Self {
        Self {
            start,
            arity,
            max_repeats: None,
        }
    }

    /// Last ordinal the run may cover, when bounded
    #[must_use]
    pub fn end(&self) -> Option<usize> {
        self.max_repeats
            .map(|repeats| self.start + repeats * self.arity.size() - 1)
    }
}

impl LoopRule {
    pub fn new(id: impl Into<String>, trigger: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            trigger: trigger.into(),
            members: Vec::new(),
            loops: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_members(mut self, members: &[&str]) -> Self {
        self.members = members.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn with_loop(mut self, nested: LoopRule) -> Self {
        self.loops.push(nested);
        self
    }

    /// XEDI node name for this loop
    #[must_use]
    pub fn node_name(&self) -> String {
        format!("loop{}", self.id)
    }

    #[must_use]
    pub fn has_member(&self, tag: &str) -> bool {
        self.members.iter().any(|m| m == tag)
    }

    fn mentions(&self, tag: &str) -> bool {
        self.trigger == tag || self.has_member(tag) || self.loops.iter().any(|l| l.mentions(tag))
    }
}
