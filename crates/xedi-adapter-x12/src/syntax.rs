//! X12 syntax: delimiters, internal sentinels and the ISA header scanner
//!
//! The ISA segment is fixed-format, so every delimiter can be read from it
//! before anything else is parsed:
//!
//! ```text
//! ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *...*U*00401*000000001*0*P*>~GS*...
//!    ^ element (offset 3)                                                                  ^ composite ^ segment
//! ```

use std::fmt;
use thiserror::Error;

/// Element delimiter inside the pipeline (ASCII group separator)
pub const ELEMENT_SENTINEL: char = '\u{1D}';
/// Composite delimiter inside the pipeline (ASCII unit separator)
pub const COMPOSITE_SENTINEL: char = '\u{1F}';
/// Segment delimiter inside the pipeline (ASCII record separator)
pub const SEGMENT_SENTINEL: char = '\u{1E}';

/// Offset of the element delimiter in the ISA segment
pub const ELEMENT_DELIMITER_OFFSET: usize = 3;
/// Position of ISA16, the composite separator, when the message is split on
/// the element delimiter
pub const COMPOSITE_TOKEN_INDEX: usize = 16;
/// Position of the version (GS08) within the GS segment
pub const VERSION_ELEMENT_INDEX: usize = 8;
/// Longest segment delimiter accepted, e.g. `~\r\n`
pub const MAX_SEGMENT_DELIMITER_LEN: usize = 3;

const GROUP_HEADER: &str = "GS";

/// Reasons a header cannot yield a delimiter set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    #[error("message is shorter than the ISA header ({length} characters)")]
    MalformedHeader { length: usize },

    #[error("ISA16 composite separator token is missing or empty")]
    EmptyCompositeToken,

    #[error("segment delimiter must be 1 to 3 characters, found {length}")]
    SegmentDelimiterLength { length: usize },

    #[error("no GS segment follows the ISA header")]
    MissingGroupHeader,

    #[error("GS segment has no version element")]
    MissingVersion,
}

/// The three separators of a delimited X12 text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Separators {
    pub element: char,
    pub composite: char,
    pub segment: String,
}

impl Separators {
    pub fn new(element: char, composite: char, segment: impl Into<String>) -> Self {
        Self {
            element,
            composite,
            segment: segment.into(),
        }
    }

    /// The fixed separators used between normalization and flattening
    #[must_use]
    pub fn sentinels() -> Self {
        Self::new(ELEMENT_SENTINEL, COMPOSITE_SENTINEL, SEGMENT_SENTINEL.to_string())
    }
}

impl Default for Separators {
    /// `*`, `:` and `~`, the separators most trading partners use
    fn default() -> Self {
        Self::new('*', ':', "~")
    }
}

impl fmt::Display for Separators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "element {:?}, composite {:?}, segment {:?}",
            self.element, self.composite, self.segment
        )
    }
}

/// Delimiters and version discovered from one message header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimiterSet {
    pub element: char,
    pub composite: char,
    pub segment: String,
    /// GS08, e.g. `004010` or `004010X098A1`
    pub version: String,
}

impl DelimiterSet {
    #[must_use]
    pub fn separators(&self) -> Separators {
        Separators::new(self.element, self.composite, self.segment.clone())
    }
}

/// Reads the delimiter set from the fixed positions of the ISA header
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderScanner;

impl HeaderScanner {
    /// Extract delimiters and version from a raw interchange
    ///
    /// # Errors
    ///
    /// Any missing piece aborts the scan with the [`HeaderError`] naming it.
    pub fn scan(message: &str) -> Result<DelimiterSet, HeaderError> {
        let element = message
            .chars()
            .nth(ELEMENT_DELIMITER_OFFSET)
            .ok_or(HeaderError::MalformedHeader {
                length: message.chars().count(),
            })?;

        // Splitting the whole message puts ISA16, the segment delimiter and
        // the start of GS into one token.
        let token = message
            .split(element)
            .nth(COMPOSITE_TOKEN_INDEX)
            .ok_or(HeaderError::MalformedHeader {
                length: message.chars().count(),
            })?;
        let composite = token.chars().next().ok_or(HeaderError::EmptyCompositeToken)?;

        let rest = &token[composite.len_utf8()..];
        let end = rest.find(GROUP_HEADER).ok_or(HeaderError::MissingGroupHeader)?;
        let segment = &rest[..end];
        let length = segment.chars().count();
        if !(1..=MAX_SEGMENT_DELIMITER_LEN).contains(&length) {
            return Err(HeaderError::SegmentDelimiterLength { length });
        }

        let version = message
            .split(segment)
            .nth(1)
            .and_then(|gs| gs.split(element).nth(VERSION_ELEMENT_INDEX))
            .ok_or(HeaderError::MissingVersion)?;

        tracing::debug!(
            element = ?element,
            composite = ?composite,
            segment = ?segment,
            version,
            "extracted delimiters"
        );

        Ok(DelimiterSet {
            element,
            composite,
            segment: segment.to_string(),
            version: version.to_string(),
        })
    }
}

/// Build a minimal ISA/GS header with the given delimiters
///
/// The ISA elements are padded to their fixed widths, so the result has the
/// same offsets as a real interchange header.
#[must_use]
pub fn synthetic_header(separators: &Separators, version: &str) -> String {
    let e = separators.element;
    let s = &separators.segment;
    let c = separators.composite;
    format!(
        "ISA{e}00{e}          {e}00{e}          {e}ZZ{e}SENDER         {e}ZZ{e}RECEIVER       \
         {e}230101{e}1200{e}U{e}00401{e}000000001{e}0{e}P{e}{c}{s}\
         GS{e}PO{e}SENDER{e}RECEIVER{e}20230101{e}1200{e}1{e}X{e}{version}{s}"
    )
}
