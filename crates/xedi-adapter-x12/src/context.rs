//! Per-segment indexing state for the forward indexer
//!
//! Empty elements are not written to the XEDI document, so the index an
//! element is written under is not its position in the segment. The context
//! counts empties, element groups and composite components while one
//! segment is walked and turns each populated node into its output path.

use crate::envelopes::{composite_name, element_name};
use thiserror::Error;
use xedi_ir::GroupArity;
use xedi_ir::path::{indexed, join};

/// An index adjustment that would go below zero
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("{what} index underflows in segment {segment}")]
    IndexUnderflow { what: &'static str, segment: String },

    #[error("component outside a data element in segment {segment}")]
    OrphanComponent { segment: String },
}

/// Counters for the segment currently being indexed
///
/// A fresh context is built for every segment with
/// [`VisitorContext::for_segment`]; nothing carries over between segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitorContext {
    pub segment_name: String,
    /// Output path of the segment node
    pub segment_path: String,

    /// Data elements seen so far, empty ones included
    pub last_element_index: usize,
    /// Empty ungrouped elements seen so far
    pub empty_element_count: usize,

    pub in_group: bool,
    pub group_arity: Option<GroupArity>,
    /// Groups entered in the current container
    pub group_count: usize,
    /// Elements seen in the current group
    pub group_element_count: usize,
    /// Ordinal of the first grouped element
    pub group_element_start_index: usize,
    /// Empty elements across all groups of the current container
    pub empty_group_element_count: usize,
    /// Position of the group container among the segment's children
    pub element_group_container_index: usize,

    pub last_composite_element_index: usize,
    pub empty_composite_element_count: usize,

    /// Name of the last populated data element, e.g. `REF04`
    pub element_name: Option<String>,
    /// Output path of the last populated data element
    pub output_path: Option<String>,
}

impl VisitorContext {
    pub fn for_segment(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            segment_name: name.into(),
            segment_path: path.into(),
            ..Self::default()
        }
    }

    /// Start a new element group
    pub fn enter_element_group(&mut self, arity: GroupArity) {
        if !self.in_group {
            self.group_element_start_index = self.last_element_index + 1;
            self.group_count = 0;
            self.empty_group_element_count = 0;
            self.element_group_container_index = self.last_element_index;
        }
        self.in_group = true;
        self.group_arity = Some(arity);
        self.group_count += 1;
        self.group_element_count = 0;
        self.reset_composites();
    }

    /// Account for one data element and return the path its value goes to
    ///
    /// `group` is the arity of the enclosing group, if any. Returns `None`
    /// for an empty element, which is counted but not written.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::IndexUnderflow`] if an adjusted group index
    /// would drop below zero.
    pub fn enter_element(
        &mut self,
        group: Option<GroupArity>,
        is_empty: bool,
    ) -> Result<Option<String>, MappingError> {
        self.in_group = group.is_some();
        if group.is_none() {
            self.group_arity = None;
            self.group_count = 0;
        }

        let path = match (group, is_empty) {
            (None, true) => {
                self.empty_element_count += 1;
                None
            }
            (None, false) => {
                let ordinal = self.last_element_index + 1;
                // Empties before this element compress the index. Grouped
                // elements before it count through the ordinal alone.
                let index = (ordinal + self.group_count)
                    .checked_sub(self.empty_element_count + 1)
                    .ok_or_else(|| self.underflow("element"))?;
                let name = element_name(&self.segment_name, ordinal);
                let path = join(&self.segment_path, &indexed(&name, index));
                self.element_name = Some(name);
                Some(path)
            }
            (Some(_), true) => {
                self.empty_group_element_count += 1;
                None
            }
            (Some(arity), false) => Some(self.grouped_element_path(arity)?),
        };

        if path.is_some() {
            self.output_path.clone_from(&path);
        }
        self.last_element_index += 1;
        self.group_element_count += 1;
        self.reset_composites();
        Ok(path)
    }

    fn grouped_element_path(&mut self, arity: GroupArity) -> Result<String, MappingError> {
        let container_index = self
            .element_group_container_index
            .checked_sub(self.empty_element_count)
            .ok_or_else(|| self.underflow("group container"))?;
        // Entirely empty groups are never written, so later groups close up.
        let group_index = self
            .group_count
            .checked_sub(self.empty_group_element_count / arity.size() + 1)
            .ok_or_else(|| self.underflow("element group"))?;

        let name = element_name(
            &self.segment_name,
            self.group_element_start_index + self.group_element_count,
        );
        let container = indexed(arity.container_name(), container_index);
        let group = indexed(arity.group_name(), group_index);
        let element = indexed(&name, self.group_element_count);
        self.element_name = Some(name);
        Ok(join(
            &join(&join(&self.segment_path, &container), &group),
            &element,
        ))
    }

    /// Account for one component of the current composite element
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::OrphanComponent`] when no populated element
    /// precedes the component, or an underflow when the parent index would
    /// drop below zero.
    pub fn enter_composite(&mut self, is_empty: bool) -> Result<Option<String>, MappingError> {
        let path = if is_empty {
            self.empty_composite_element_count += 1;
            None
        } else {
            let parent = self.composite_parent_path()?;
            let element = self
                .element_name
                .as_deref()
                .ok_or_else(|| self.orphan())?;
            let ordinal = self.last_composite_element_index + 1;
            let index = ordinal - self.empty_composite_element_count - 1;
            let name = composite_name(element, ordinal);
            Some(join(&parent, &indexed(&name, index)))
        };
        self.last_composite_element_index += 1;
        Ok(path)
    }

    /// Path of the element holding the current composite, lowered by the
    /// empty elements before it
    fn composite_parent_path(&self) -> Result<String, MappingError> {
        if self.in_group {
            return self.output_path.clone().ok_or_else(|| self.orphan());
        }
        let element = self.element_name.as_deref().ok_or_else(|| self.orphan())?;
        let index = self
            .last_element_index
            .checked_sub(self.empty_element_count + 1)
            .ok_or_else(|| self.underflow("composite parent"))?;
        Ok(join(&self.segment_path, &indexed(element, index)))
    }

    fn reset_composites(&mut self) {
        self.last_composite_element_index = 0;
        self.empty_composite_element_count = 0;
    }

    fn underflow(&self, what: &'static str) -> MappingError {
        MappingError::IndexUnderflow {
            what,
            segment: self.segment_path.clone(),
        }
    }

    fn orphan(&self) -> MappingError {
        MappingError::OrphanComponent {
            segment: self.segment_path.clone(),
        }
    }
}
