#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # xedi-ir
//!
//! Tree structures shared by every stage of the X12 ↔ XEDI codec.
//!
//! Two arenas live here: the [`ParseTree`] produced by the coarse and
//! detailed parse stages, and the [`XediDocument`] produced by the forward
//! indexer and consumed by the reverse flattener. Both address nodes by
//! stable indices, so splicing and renaming never invalidate handles.

/// Recoverable conversion problems and their classification.
pub mod diagnostics;
/// XEDI document arena and metadata.
pub mod document;
/// Parse tree arena and node kinds.
pub mod node;
/// Dotted `name(index)` path parsing and helpers.
pub mod path;
/// Depth-first traversal and document cursors.
pub mod traversal;
/// XML text serialization and parsing for XEDI documents.
pub mod xml;

/// Diagnostics collected during a conversion.
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
/// XEDI document types.
pub use document::{DocumentMetadata, Lookup, ROOT_NODE, XediDocument, XediId};
/// Parse tree primitives.
pub use node::{EnvelopeTag, GroupArity, NodeId, NodeKind, ParseNode, ParseTree};
/// Path types.
pub use path::{PathStep, XediPath};
/// Traversal entry points.
pub use traversal::{Cursor, Traversal, walk};

use thiserror::Error;

/// Errors that can occur when working with the IR
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Node not found at path: {path}")]
    NodeNotFound { path: String },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid element name '{name}'")]
    InvalidName { name: String },

    #[error("XML error: {message}")]
    Xml { message: String },
}

impl Error {
    /// Build a node-not-found error with path context.
    pub fn node_not_found(path: impl Into<String>) -> Self {
        Self::NodeNotFound { path: path.into() }
    }

    /// Build an invalid-path error with input path and parsing reason.
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Build an invalid-name error.
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName { name: name.into() }
    }
}

/// Crate-local result type for IR operations.
pub type Result<T> = std::result::Result<T, Error>;
