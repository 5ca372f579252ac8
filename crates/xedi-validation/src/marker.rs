//! Bad transaction marking
//!
//! Every rule error names a transaction set through its context. The marker
//! resolves all of them against the document first and only then renames
//! the targets from `trans` to `badTransaction`, so XPath positions computed
//! by the rules engine stay valid while earlier targets are renamed.

use crate::context::transaction_path;
use crate::rule_errors::{RuleError, RuleErrorCollection};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};
use xedi_ir::{Diagnostic, DiagnosticKind, Diagnostics, Lookup, XediDocument, XediId};

const TRANSACTION_NODE: &str = "trans";
const BAD_TRANSACTION_NODE: &str = "badTransaction";

/// Renames the transaction sets that failed validation
#[derive(Debug, Clone, Copy, Default)]
pub struct BadTransactionMarker;

impl BadTransactionMarker {
    pub fn new() -> Self {
        Self
    }

    /// Mark a copy of `doc`; the input is left untouched
    ///
    /// A rule error whose context cannot be resolved to a transaction set is
    /// reported as [`DiagnosticKind::BadTransactionPathResolutionFailed`]
    /// and skipped. Several errors naming the same transaction set mark it
    /// once.
    pub fn mark(&self, doc: &XediDocument, errors: &RuleErrorCollection) -> (XediDocument, Diagnostics) {
        let mut marked = doc.clone();
        let diagnostics = self.mark_in_place(&mut marked, errors);
        (marked, diagnostics)
    }

    /// Mark `doc` itself
    pub fn mark_in_place(&self, doc: &mut XediDocument, errors: &RuleErrorCollection) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();
        if errors.is_empty() {
            return diagnostics;
        }

        let mut targets = BTreeSet::new();
        for error in errors {
            match resolve(doc, error) {
                Ok(id) => {
                    targets.insert(id);
                }
                Err(message) => {
                    warn!(context = %error.context, %message, "rule error not applied");
                    diagnostics.push(
                        Diagnostic::new(DiagnosticKind::BadTransactionPathResolutionFailed, message)
                            .with_path(error.context.clone()),
                    );
                }
            }
        }

        let mut renamed = 0;
        for id in targets {
            if doc.name(id) == BAD_TRANSACTION_NODE {
                continue;
            }
            let path = doc.path_of(id);
            match doc.replace_node(id, BAD_TRANSACTION_NODE) {
                Ok(_) => {
                    debug!(path = %path, "marked transaction set bad");
                    renamed += 1;
                }
                Err(e) => diagnostics.push(
                    Diagnostic::new(DiagnosticKind::BadTransactionPathResolutionFailed, e.to_string())
                        .with_path(path),
                ),
            }
        }
        info!(
            rule_errors = errors.len(),
            marked = renamed,
            skipped = diagnostics.len(),
            "applied rule errors"
        );
        diagnostics
    }
}

fn resolve(doc: &XediDocument, error: &RuleError) -> Result<XediId, String> {
    let path = transaction_path(&error.context).map_err(|e| e.to_string())?;
    let id = doc
        .find_with(&path, Lookup::Occurrence)
        .map_err(|e| e.to_string())?;
    match doc.name(id) {
        TRANSACTION_NODE | BAD_TRANSACTION_NODE => Ok(id),
        other => Err(format!("'{path}' addresses a {other} node, not a transaction set")),
    }
}
