//! Conversion reports

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use xedi_adapter_x12::EnvelopeSummary;
use xedi_ir::{DiagnosticKind, Diagnostics, XediDocument};

/// Counts, control numbers and diagnostics of one conversion
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    /// `to-xml`, `to-edi` or `mark-bad`
    pub operation: String,
    pub version: Option<String>,
    pub grammar: Option<String>,
    pub interchange_control: Option<String>,
    pub groups: usize,
    pub transactions: usize,
    pub bad_transactions: usize,
    /// Trailer counts in the document that disagree with its contents
    pub count_mismatches: Vec<String>,
    pub diagnostics: Diagnostics,
    pub created_at: Option<DateTime<Utc>>,
}

impl ConversionReport {
    pub fn from_document(operation: &str, document: &XediDocument, diagnostics: &Diagnostics) -> Self {
        let summary = EnvelopeSummary::from_document(document);
        Self {
            operation: operation.to_string(),
            version: document.metadata.version.clone(),
            grammar: document.metadata.grammar.clone(),
            interchange_control: summary.interchange_control.clone(),
            groups: summary.groups.len(),
            transactions: summary.transaction_count(),
            bad_transactions: summary.bad_transaction_count(),
            count_mismatches: summary.count_mismatches(),
            diagnostics: diagnostics.clone(),
            created_at: document.metadata.created_at,
        }
    }

    /// Whether any diagnostic is an error rather than a warning
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }

    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty() && self.bad_transactions == 0
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.count(kind)
    }

    /// Pretty-printed JSON
    ///
    /// # Errors
    ///
    /// Returns [`Error::Report`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Report {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xedi_ir::Diagnostic;

    fn document() -> XediDocument {
        let mut doc = XediDocument::new();
        doc.set_value("envelope(0).ISA(0).ISA13(12)", "000000042").unwrap();
        let container = "envelope(0).funcgroupContainer(1).funcgroup(0).transContainer(1)";
        doc.set_value(&format!("{container}.trans(0).ST(0).ST01(0)"), "850").unwrap();
        doc.set_value(&format!("{container}.badTransaction(1)"), "").unwrap();
        doc.set_value("envelope(0).IEA(2).IEA01(0)", "1").unwrap();
        doc
    }

    #[test]
    fn test_counts_from_document() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::new(DiagnosticKind::TransactionParseFailed, "missing SE"));
        let report = ConversionReport::from_document("to-xml", &document(), &diagnostics);

        assert_eq!(report.interchange_control.as_deref(), Some("000000042"));
        assert_eq!(report.groups, 1);
        assert_eq!(report.transactions, 2);
        assert_eq!(report.bad_transactions, 1);
        assert_eq!(report.count(DiagnosticKind::TransactionParseFailed), 1);
        assert!(report.has_errors());
        assert!(!report.is_clean());
    }

    #[test]
    fn test_json_rendering() {
        let report = ConversionReport::from_document("to-xml", &document(), &Diagnostics::new());
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["operation"], "to-xml");
        assert_eq!(json["bad_transactions"], 1);
        assert_eq!(json["diagnostics"], serde_json::json!([]));
    }
}
