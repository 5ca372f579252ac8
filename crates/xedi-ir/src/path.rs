//! Dotted XEDI paths such as `envelope(0).funcgroupContainer.funcgroup(1)`

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// One component of a dotted path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathStep {
    /// `name` or `name(index)`
    Named { name: String, index: Option<usize> },
    /// Bare number: the n-th child regardless of name
    Position(usize),
}

impl PathStep {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named {
            name: name.into(),
            index: None,
        }
    }

    pub fn indexed(name: impl Into<String>, index: usize) -> Self {
        Self::Named {
            name: name.into(),
            index: Some(index),
        }
    }

    fn parse(raw: &str, whole: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::invalid_path(whole, "empty path component"));
        }
        if raw.bytes().all(|b| b.is_ascii_digit()) {
            let position = raw
                .parse()
                .map_err(|_| Error::invalid_path(whole, format!("position '{raw}' out of range")))?;
            return Ok(Self::Position(position));
        }
        let Some(open) = raw.find('(') else {
            return Ok(Self::named(raw));
        };
        if !raw.ends_with(')') {
            return Err(Error::invalid_path(whole, format!("unclosed index in '{raw}'")));
        }
        let name = &raw[..open];
        let digits = &raw[open + 1..raw.len() - 1];
        if name.is_empty() {
            return Err(Error::invalid_path(whole, format!("missing name in '{raw}'")));
        }
        let index = digits
            .parse()
            .map_err(|_| Error::invalid_path(whole, format!("non-numeric index in '{raw}'")))?;
        Ok(Self::indexed(name, index))
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named { name, index: None } => f.write_str(name),
            Self::Named {
                name,
                index: Some(index),
            } => write!(f, "{name}({index})"),
            Self::Position(position) => write!(f, "{position}"),
        }
    }
}

/// A parsed dotted path, relative to the document root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XediPath {
    steps: Vec<PathStep>,
}

impl XediPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a dotted path
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] for empty components, unclosed or
    /// non-numeric indices.
    pub fn parse(path: &str) -> Result<Self> {
        if path.is_empty() {
            return Ok(Self::new());
        }
        let steps = path
            .split('.')
            .map(|raw| PathStep::parse(raw, path))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    pub fn push(&mut self, step: PathStep) {
        self.steps.push(step);
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl FromStr for XediPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for XediPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}

/// Append `addition` to a dotted `base` path
pub fn join(base: &str, addition: &str) -> String {
    match (base.is_empty(), addition.is_empty()) {
        (true, _) => addition.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{base}.{addition}"),
    }
}

/// `name(index)` component text
pub fn indexed(name: &str, index: usize) -> String {
    format!("{name}({index})")
}

/// Check that a name can be used both as an XML tag and a path component
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_path() {
        let path = XediPath::parse("envelope(0).funcgroupContainer.funcgroup(1).3").unwrap();
        assert_eq!(
            path.steps(),
            &[
                PathStep::indexed("envelope", 0),
                PathStep::named("funcgroupContainer"),
                PathStep::indexed("funcgroup", 1),
                PathStep::Position(3),
            ]
        );
        assert_eq!(path.to_string(), "envelope(0).funcgroupContainer.funcgroup(1).3");
    }

    #[test]
    fn test_parse_errors() {
        assert!(XediPath::parse("a..b").is_err());
        assert!(XediPath::parse("a(x)").is_err());
        assert!(XediPath::parse("a(1").is_err());
        assert!(XediPath::parse("(1)").is_err());
    }

    #[test]
    fn test_empty_path_is_root() {
        assert!(XediPath::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_join() {
        assert_eq!(join("", "envelope(0)"), "envelope(0)");
        assert_eq!(join("envelope(0)", ""), "envelope(0)");
        assert_eq!(join("envelope(0)", "ISA(0)"), "envelope(0).ISA(0)");
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("ISA01"));
        assert!(is_valid_name("elemPairContainer"));
        assert!(is_valid_name("SEG02_01"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("1ST"));
        assert!(!is_valid_name("N1.2"));
        assert!(!is_valid_name("A B"));
    }
}
