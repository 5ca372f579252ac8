#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # xedi-grammar
//!
//! Declarative X12 transaction-set grammars.
//!
//! Grammars are YAML documents with optional `parent` inheritance:
//! baseline → version family (`x12-003070`, `x12-004010`) → direction
//! variant (`-request`, `-response`). The [`VersionTable`] picks the grammar
//! for the version string found in a GS segment.

pub mod inheritance;
pub mod loader;
pub mod model;
pub mod registry;

pub use loader::{GrammarLoader, is_segment_tag};
pub use model::{Direction, Grammar, GroupRule, LoopRule, SegmentRule};
pub use registry::{BASELINE_GRAMMAR, GrammarCache, VersionTable};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when working with grammars
#[derive(Error, Debug)]
pub enum Error {
    #[error("Grammar not found: {name} (searched {searched:?} and the built-ins)")]
    NotFound { name: String, searched: Vec<PathBuf> },

    #[error("Invalid grammar format: {message}")]
    InvalidFormat { message: String },

    #[error("Inheritance error: {message}")]
    Inheritance { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn not_found(name: impl Into<String>, searched: &[PathBuf]) -> Self {
        Self::NotFound {
            name: name.into(),
            searched: searched.to_vec(),
        }
    }

    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    pub fn inheritance(message: impl Into<String>) -> Self {
        Self::Inheritance {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
