//! The two conversion directions

use crate::config::ConverterConfig;
use crate::report::ConversionReport;
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use xedi_adapter_x12::normalize::normalize;
use xedi_adapter_x12::{
    CoarseParser, DelimiterSet, EnvelopeSummary, ForwardIndexer, HeaderScanner, ParserRegistry,
    ReverseFlattener, Separators, TransactionParser, parse_transaction_sets, reconstitute,
};
use xedi_ir::{Diagnostics, DocumentMetadata, XediDocument};

/// Result of one X12 to XEDI conversion
#[derive(Debug, Clone)]
pub struct EdiConversion {
    pub document: XediDocument,
    pub diagnostics: Diagnostics,
    /// Delimiters and version read from the input header
    pub delimiters: DelimiterSet,
}

impl EdiConversion {
    /// XML text of the document
    pub fn to_xml(&self, pretty: bool) -> String {
        xedi_ir::xml::to_xml(&self.document, pretty)
    }

    pub fn report(&self) -> ConversionReport {
        ConversionReport::from_document("to-xml", &self.document, &self.diagnostics)
    }
}

/// Converts X12 interchanges into XEDI documents
#[derive(Debug)]
pub struct EdiToXmlConverter {
    registry: ParserRegistry,
}

impl EdiToXmlConverter {
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            registry: ParserRegistry::new(config.grammar_loader(), config.direction),
        }
    }

    /// Use a custom parser for versions containing `key`
    pub fn register_parser(&mut self, key: impl Into<String>, parser: Arc<dyn TransactionParser>) {
        self.registry.register(key, parser);
    }

    /// Convert one interchange
    ///
    /// Nothing is carried over between calls. Transaction sets that fail to
    /// parse and nodes that cannot be indexed end up in the diagnostics; the
    /// rest of the document is still produced.
    ///
    /// # Errors
    ///
    /// Fails when the header yields no delimiters, the envelope structure is
    /// broken, or the grammar for the interchange version cannot be loaded.
    pub fn convert(&self, raw: &str) -> Result<EdiConversion> {
        let delimiters = HeaderScanner::scan(raw)?;
        let normalized = normalize(raw, &delimiters)?;

        let mut skeleton = CoarseParser::new(delimiters.composite).parse(&normalized)?;
        let transactions = reconstitute(&mut skeleton);
        debug!(transactions, "built envelope skeleton");

        let parser = self.registry.resolve(&delimiters.version)?;
        let (tree, mut diagnostics) = parse_transaction_sets(&skeleton, parser.as_ref(), &delimiters);
        let (mut document, indexing) = ForwardIndexer::new().index(&tree);
        diagnostics.extend(indexing);

        let summary = EnvelopeSummary::from_document(&document);
        document.metadata = DocumentMetadata {
            version: Some(delimiters.version.clone()),
            interchange_control: summary.interchange_control.clone(),
            grammar: Some(parser.name().to_string()),
            created_at: Some(Utc::now()),
        };

        info!(
            version = %delimiters.version,
            grammar = parser.name(),
            groups = summary.groups.len(),
            transactions = summary.transaction_count(),
            bad = summary.bad_transaction_count(),
            diagnostics = diagnostics.len(),
            "converted interchange to XEDI"
        );
        Ok(EdiConversion {
            document,
            diagnostics,
            delimiters,
        })
    }
}

/// Flattens XEDI documents into X12 text
#[derive(Debug, Clone, Default)]
pub struct XmlToEdiConverter {
    flattener: ReverseFlattener,
}

impl XmlToEdiConverter {
    pub fn new(separators: Separators) -> Self {
        Self {
            flattener: ReverseFlattener::new(separators),
        }
    }

    /// Converter writing the separators configured under `output`
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] for unusable separators.
    pub fn from_config(config: &ConverterConfig) -> Result<Self> {
        Ok(Self::new(config.output.separators()?))
    }

    pub fn separators(&self) -> &Separators {
        self.flattener.separators()
    }

    /// Parse XML text and flatten it
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Ir`] when the text is not a well-formed XEDI
    /// document.
    pub fn convert(&self, xml: &str) -> Result<(String, Diagnostics)> {
        let document = xedi_ir::xml::from_xml(xml)?;
        Ok(self.convert_document(&document))
    }

    pub fn convert_document(&self, document: &XediDocument) -> (String, Diagnostics) {
        let (text, diagnostics) = self.flattener.flatten(document);
        info!(
            bytes = text.len(),
            diagnostics = diagnostics.len(),
            "flattened XEDI document"
        );
        (text, diagnostics)
    }
}
