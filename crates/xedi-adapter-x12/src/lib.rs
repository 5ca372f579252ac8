#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # xedi-adapter-x12
//!
//! ANSI X12 parsing and serialization for the XEDI codec.
//!
//! The forward direction runs in stages:
//!
//! 1. [`HeaderScanner`] reads the delimiters and version from the ISA/GS header.
//! 2. [`normalize`](normalize::normalize) rewrites them to internal sentinels.
//! 3. [`CoarseParser`] builds the envelope skeleton and [`reconstitute`]
//!    rejoins each transaction set into one string.
//! 4. [`parse_transaction_sets`] re-parses every transaction set with the
//!    grammar picked by [`ParserRegistry`], substituting a bad-transaction
//!    placeholder for any set that fails.
//! 5. [`ForwardIndexer`] names and indexes every node into an [`XediDocument`].
//!
//! [`ReverseFlattener`] goes the other way, from a document to delimited text.
//!
//! [`XediDocument`]: xedi_ir::XediDocument

pub mod context;
pub mod envelopes;
pub mod indexer;
pub mod normalize;
pub mod parser;
pub mod serializer;
pub mod syntax;
pub mod transaction;

pub use context::VisitorContext;
pub use envelopes::{EnvelopeSummary, GroupSummary, TransactionSummary};
pub use indexer::ForwardIndexer;
pub use parser::{CoarseParser, reconstitute};
pub use serializer::ReverseFlattener;
pub use syntax::{DelimiterSet, HeaderError, HeaderScanner, Separators};
pub use transaction::{
    GrammarParser, ParseFailure, ParserRegistry, TransactionParser, parse_transaction_sets,
};

use thiserror::Error;

/// Errors that abort an X12 conversion
#[derive(Error, Debug)]
pub enum Error {
    #[error("Delimiter extraction failed: {source}")]
    DelimiterExtractionFailed {
        #[from]
        source: HeaderError,
    },

    #[error("Envelope parse failed at segment {segment}: {message}")]
    EnvelopeParseFailed { segment: usize, message: String },

    #[error("Normalization error: {message}")]
    Normalization { message: String },

    #[error("Grammar error: {0}")]
    Grammar(#[from] xedi_grammar::Error),

    #[error("Document error: {0}")]
    Ir(#[from] xedi_ir::Error),
}

impl Error {
    pub fn delimiter_extraction(source: HeaderError) -> Self {
        Self::DelimiterExtractionFailed { source }
    }

    pub fn envelope(segment: usize, message: impl Into<String>) -> Self {
        Self::EnvelopeParseFailed {
            segment,
            message: message.into(),
        }
    }

    pub fn normalization(message: impl Into<String>) -> Self {
        Self::Normalization {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
