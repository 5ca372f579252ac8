//! Rule-error collections produced by the external rules engine
//!
//! ```xml
//! <Errors>
//!   <ruleerrorcontainer>
//!     <ruleerror>
//!       <RULE_ID value="850-REF-01"/>
//!       <MESSAGE value="REF01 is not a valid qualifier"/>
//!       <CONTEXT value="/root/envelope[1]/funcgroupContainer/funcgroup[1]/transContainer/trans[2]/REF"/>
//!       <CONTEXT_VALUE value="ZZ"/>
//!     </ruleerror>
//!   </ruleerrorcontainer>
//! </Errors>
//! ```
//!
//! Field values are read from the `value` attribute, falling back to the
//! element's text.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Where the converter pipeline looks for rule errors unless configured
/// otherwise
pub const DEFAULT_RULE_ERROR_LOCATION: &str = "EDIRuleErrors";

const CONTAINER: &str = "ruleerrorcontainer";
const ENTRY: &str = "ruleerror";
const RULE_ID: &str = "RULE_ID";
const MESSAGE: &str = "MESSAGE";
const CONTEXT: &str = "CONTEXT";
const CONTEXT_VALUE: &str = "CONTEXT_VALUE";

/// One failed rule
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleError {
    pub rule_id: Option<String>,
    pub message: Option<String>,
    /// XPath of the node the rule failed on; empty when the entry has none
    pub context: String,
    pub context_value: Option<String>,
}

impl RuleError {
    pub fn with_context(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            ..Self::default()
        }
    }
}

/// All rule errors reported for one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleErrorCollection {
    errors: Vec<RuleError>,
}

impl RuleErrorCollection {
    pub fn new(errors: Vec<RuleError>) -> Self {
        Self { errors }
    }

    /// Parse a collection from its XML text
    ///
    /// The container may be the document element or sit anywhere below it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RuleErrorXml`] for malformed XML and
    /// [`Error::MissingContainer`] when no `ruleerrorcontainer` is present.
    pub fn from_xml(text: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(text)?;
        let container = doc
            .descendants()
            .find(|n| n.has_tag_name(CONTAINER))
            .ok_or(Error::MissingContainer)?;

        let errors: Vec<RuleError> = container
            .children()
            .filter(|n| n.has_tag_name(ENTRY))
            .map(|entry| RuleError {
                rule_id: field(entry, RULE_ID),
                message: field(entry, MESSAGE),
                context: field(entry, CONTEXT).unwrap_or_default(),
                context_value: field(entry, CONTEXT_VALUE),
            })
            .collect();
        tracing::debug!(count = errors.len(), "read rule errors");
        Ok(Self { errors })
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RuleError> {
        self.errors.iter()
    }

    pub fn push(&mut self, error: RuleError) {
        self.errors.push(error);
    }
}

impl<'a> IntoIterator for &'a RuleErrorCollection {
    type Item = &'a RuleError;
    type IntoIter = std::slice::Iter<'a, RuleError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

fn field(entry: roxmltree::Node<'_, '_>, name: &str) -> Option<String> {
    let node = entry.children().find(|n| n.has_tag_name(name))?;
    node.attribute("value")
        .or_else(|| node.text())
        .map(|v| v.trim().to_string())
}
