#![deny(rust_2018_idioms)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

//! # xedi-pipeline
//!
//! End-to-end conversions between X12 text and XEDI documents.
//!
//! [`EdiToXmlConverter`] chains header scanning, normalization, the coarse
//! and detailed parses and forward indexing. [`XmlToEdiConverter`] flattens
//! a document back to text with the configured output separators.
//! [`MarkBadProcessor`] applies rules-engine output to a converted document.
//! All three return their result together with the diagnostics collected on
//! the way; only a broken header or envelope is an error.

pub mod config;
pub mod converter;
pub mod postprocess;
pub mod report;

pub use config::{ConverterConfig, OutputConfig, decode_separator};
pub use converter::{EdiConversion, EdiToXmlConverter, XmlToEdiConverter};
pub use postprocess::{ConversionContext, MarkBadProcessor};
pub use report::ConversionReport;

use thiserror::Error;

/// Errors that abort a conversion
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {message}")]
    Config { message: String },

    #[error("IO error during {operation} for '{path}': {message}")]
    Io {
        operation: String,
        path: String,
        message: String,
    },

    #[error(transparent)]
    Adapter(#[from] xedi_adapter_x12::Error),

    #[error(transparent)]
    Validation(#[from] xedi_validation::Error),

    #[error(transparent)]
    Ir(#[from] xedi_ir::Error),

    #[error("failed to render report: {message}")]
    Report { message: String },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a structured I/O error with operation/path context.
    pub fn io(
        operation: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<xedi_adapter_x12::HeaderError> for Error {
    fn from(e: xedi_adapter_x12::HeaderError) -> Self {
        Self::Adapter(e.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
