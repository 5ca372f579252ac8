#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # xedi-validation
//!
//! Acts on the verdicts of an external rules engine. The engine validates
//! the XML form of an XEDI document and reports each failure as a rule
//! error whose context is an XPath such as
//! `/root/envelope[1]/funcgroupContainer/funcgroup[2]/transContainer/trans[1]/REF`.
//! This crate reads those collections and marks the transaction sets they
//! point at as bad, so downstream consumers can tell them apart.
//!
//! ## Example Usage
//!
//! ```rust
//! use xedi_validation::{BadTransactionMarker, RuleErrorCollection};
//! use xedi_ir::XediDocument;
//!
//! let mut doc = XediDocument::new();
//! let trans = "envelope(0).funcgroupContainer(1).funcgroup(0).transContainer(1).trans(0)";
//! doc.set_value(&format!("{trans}.ST(0).ST01(0)"), "850").unwrap();
//!
//! let errors = RuleErrorCollection::from_xml(
//!     r#"<ruleerrorcontainer><ruleerror>
//!          <CONTEXT value="/root/envelope[1]/funcgroupContainer/funcgroup[1]/transContainer/trans[1]/ST"/>
//!        </ruleerror></ruleerrorcontainer>"#,
//! ).unwrap();
//!
//! let (marked, diagnostics) = BadTransactionMarker::new().mark(&doc, &errors);
//! assert!(diagnostics.is_empty());
//! assert!(marked.exists(
//!     "envelope(0).funcgroupContainer(1).funcgroup(0).transContainer(1).badTransaction(0).ST(0)"
//! ));
//! ```

pub mod context;
pub mod marker;
pub mod rule_errors;

pub use context::{ContextError, transaction_path};
pub use marker::BadTransactionMarker;
pub use rule_errors::{DEFAULT_RULE_ERROR_LOCATION, RuleError, RuleErrorCollection};

use thiserror::Error;

/// Errors raised while reading rule-error collections
#[derive(Error, Debug)]
pub enum Error {
    #[error("rule error collection is not well-formed XML: {message}")]
    RuleErrorXml { message: String },

    #[error("rule error collection has no ruleerrorcontainer element")]
    MissingContainer,

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Ir(#[from] xedi_ir::Error),
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Error::RuleErrorXml {
            message: e.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
