//! Rule-error post-processing of converted documents

use crate::config::ConverterConfig;
use crate::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;
use xedi_ir::{Diagnostics, XediDocument};
use xedi_validation::{BadTransactionMarker, DEFAULT_RULE_ERROR_LOCATION, RuleErrorCollection};

/// Named values handed along with a document, such as the rules engine's
/// error collection
#[derive(Debug, Clone, Default)]
pub struct ConversionContext {
    entries: HashMap<String, String>,
}

impl ConversionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }
}

/// Marks the transaction sets named by a rule-error collection as bad
///
/// The collection is looked up by location: first as a context entry, then
/// as a file path. When neither exists the document is returned unchanged.
#[derive(Debug, Clone)]
pub struct MarkBadProcessor {
    location: String,
    marker: BadTransactionMarker,
}

impl Default for MarkBadProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_RULE_ERROR_LOCATION)
    }
}

impl MarkBadProcessor {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            marker: BadTransactionMarker::new(),
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self::new(config.rule_error_location.clone())
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Apply the rule errors found at the configured location
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] when the location names a file that cannot be
    /// read and [`Error::Validation`] when the collection is not valid XML.
    pub fn process(
        &self,
        document: &XediDocument,
        context: &ConversionContext,
    ) -> Result<(XediDocument, Diagnostics)> {
        let Some(xml) = self.rule_errors(context)? else {
            debug!(location = %self.location, "no rule errors present");
            return Ok((document.clone(), Diagnostics::new()));
        };
        let errors = RuleErrorCollection::from_xml(&xml)?;
        Ok(self.apply(document, &errors))
    }

    /// Apply an already parsed collection; `document` is not modified
    pub fn apply(&self, document: &XediDocument, errors: &RuleErrorCollection) -> (XediDocument, Diagnostics) {
        self.marker.mark(document, errors)
    }

    fn rule_errors(&self, context: &ConversionContext) -> Result<Option<String>> {
        if let Some(xml) = context.get(&self.location) {
            return Ok(Some(xml.to_string()));
        }
        let path = Path::new(&self.location);
        if !path.is_file() {
            return Ok(None);
        }
        std::fs::read_to_string(path)
            .map(Some)
            .map_err(|e| Error::io("read rule errors", self.location.clone(), e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTEXT: &str = "/root/envelope[1]/funcgroupContainer/funcgroup[1]/transContainer/trans[1]/BEG";

    fn document() -> XediDocument {
        let mut doc = XediDocument::new();
        doc.set_value(
            "envelope(0).funcgroupContainer(1).funcgroup(0).transContainer(1).trans(0).ST(0).ST01(0)",
            "850",
        )
        .unwrap();
        doc
    }

    fn collection() -> String {
        format!("<ruleerrorcontainer><ruleerror><CONTEXT value=\"{CONTEXT}\"/></ruleerror></ruleerrorcontainer>")
    }

    #[test]
    fn test_rule_errors_from_context() {
        let mut context = ConversionContext::new();
        context.insert(DEFAULT_RULE_ERROR_LOCATION, collection());
        let (marked, diagnostics) = MarkBadProcessor::default()
            .process(&document(), &context)
            .unwrap();
        assert!(diagnostics.is_empty());
        assert!(marked.exists(
            "envelope(0).funcgroupContainer(1).funcgroup(0).transContainer(1).badTransaction(0)"
        ));
    }

    #[test]
    fn test_missing_rule_errors_leave_document_unchanged() {
        let doc = document();
        let (marked, diagnostics) = MarkBadProcessor::new("Elsewhere")
            .process(&doc, &ConversionContext::new())
            .unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(
            xedi_ir::xml::to_xml(&marked, false),
            xedi_ir::xml::to_xml(&doc, false)
        );
    }

    #[test]
    fn test_malformed_collection_is_an_error() {
        let mut context = ConversionContext::new();
        context.insert("errors", "<ruleerrorcontainer>");
        let result = MarkBadProcessor::new("errors").process(&document(), &context);
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
