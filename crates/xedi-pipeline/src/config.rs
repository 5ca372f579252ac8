//! Converter configuration
//!
//! ```yaml
//! direction: request
//! output:
//!   segment_separator: '\n'
//!   element_separator: '*'
//!   composite_separator: ':'
//! grammar_paths:
//!   - ./grammars
//! rule_error_location: EDIRuleErrors
//! pretty_xml: true
//! ```
//!
//! Every field is optional; missing ones take the [`Default`] values.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use xedi_adapter_x12::Separators;
use xedi_adapter_x12::syntax::MAX_SEGMENT_DELIMITER_LEN;
use xedi_grammar::{Direction, GrammarLoader};
use xedi_validation::DEFAULT_RULE_ERROR_LOCATION;

/// Settings shared by every conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// Grammar variant used for detailed parsing
    pub direction: Direction,
    /// Separators written by the XML to EDI direction
    pub output: OutputConfig,
    /// Directories searched for grammar files before the built-ins
    pub grammar_paths: Vec<PathBuf>,
    /// File path or context entry holding rule errors for mark-bad
    pub rule_error_location: String,
    pub pretty_xml: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            direction: Direction::default(),
            output: OutputConfig::default(),
            grammar_paths: Vec::new(),
            rule_error_location: DEFAULT_RULE_ERROR_LOCATION.to_string(),
            pretty_xml: true,
        }
    }
}

/// Output separators as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub segment_separator: String,
    pub element_separator: String,
    pub composite_separator: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            segment_separator: "~".to_string(),
            element_separator: "*".to_string(),
            composite_separator: ":".to_string(),
        }
    }
}

impl OutputConfig {
    /// Decode and check the configured separators
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] unless the element and composite separators
    /// are single, distinct characters and the segment separator is one to
    /// three characters containing neither of them.
    pub fn separators(&self) -> Result<Separators> {
        let element = single_char("element_separator", &self.element_separator)?;
        let composite = single_char("composite_separator", &self.composite_separator)?;
        let segment = decode_separator(&self.segment_separator);

        let length = segment.chars().count();
        if !(1..=MAX_SEGMENT_DELIMITER_LEN).contains(&length) {
            return Err(Error::config(format!(
                "segment_separator must be 1 to {MAX_SEGMENT_DELIMITER_LEN} characters, got {length}"
            )));
        }
        if element == composite || segment.contains(element) || segment.contains(composite) {
            return Err(Error::config(format!(
                "output separators must be distinct: element {element:?}, composite {composite:?}, segment {segment:?}"
            )));
        }
        Ok(Separators::new(element, composite, segment))
    }
}

impl ConverterConfig {
    /// Parse a configuration from YAML text
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the YAML is malformed or has unknown
    /// values.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::config(e.to_string()))
    }

    /// Load a configuration file
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::Config`] if its contents do not parse.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::io("read config", path.display().to_string(), e.to_string()))?;
        let config = Self::from_yaml_str(&text)?;
        tracing::debug!(path = %path.display(), direction = %config.direction, "loaded configuration");
        Ok(config)
    }

    /// Grammar loader searching the configured paths
    pub fn grammar_loader(&self) -> GrammarLoader {
        GrammarLoader::new(self.grammar_paths.clone())
    }
}

/// Turn the escape text `\n`, `\r` or `\r\n` into the control characters
/// it names; any other value is returned unchanged
pub fn decode_separator(raw: &str) -> String {
    match raw {
        r"\n" => "\n".to_string(),
        r"\r" => "\r".to_string(),
        r"\r\n" => "\r\n".to_string(),
        other => other.to_string(),
    }
}

fn single_char(field: &str, raw: &str) -> Result<char> {
    let decoded = decode_separator(raw);
    let mut chars = decoded.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(Error::config(format!(
            "{field} must be exactly one character, got {raw:?}"
        ))),
    }
}
