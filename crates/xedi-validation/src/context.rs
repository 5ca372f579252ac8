//! Translation of rule-error contexts into XEDI paths
//!
//! A context is an XPath over the XML form of the document, rooted at
//! `/root/` and 1-indexed. Only the part up to the transaction set matters:
//! everything after the third `]` (the one closing `trans[k]`) is dropped,
//! the separators are rewritten to dotted form and every index is lowered
//! by one.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const XPATH_ROOT: &str = "/root/";
/// Index brackets up to and including the transaction set's
const RELEVANT_INDEX_COUNT: usize = 3;

static INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^()]*)\)").expect("index pattern is valid"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("context '{context}' does not index a transaction set")]
    MissingTransactionIndex { context: String },

    #[error("context '{context}' is not rooted at /root/")]
    NotRooted { context: String },

    #[error("index '{index}' in '{path}' is not a number")]
    NonNumericIndex { path: String, index: String },

    #[error("index 0 in '{path}' has no 0-based equivalent")]
    ZeroIndex { path: String },
}

/// Dotted, 0-indexed path of the transaction set a context points into
///
/// ```
/// use xedi_validation::transaction_path;
///
/// let path = transaction_path(
///     "/root/envelope[1]/funcgroupContainer/funcgroup[2]/transContainer/trans[1]/REF",
/// ).unwrap();
/// assert_eq!(path, "envelope(0).funcgroupContainer.funcgroup(1).transContainer.trans(0)");
/// ```
///
/// # Errors
///
/// Fails when the context has fewer than three indices, does not start with
/// `/root/`, or carries an index that is not a positive integer.
pub fn transaction_path(context: &str) -> Result<String, ContextError> {
    let truncated = truncate(context)?;
    let dotted = replace_markup(truncated);
    zero_index(&dotted)
}

fn truncate(context: &str) -> Result<&str, ContextError> {
    let end = context
        .match_indices(']')
        .nth(RELEVANT_INDEX_COUNT - 1)
        .map(|(at, _)| at + 1)
        .ok_or_else(|| ContextError::MissingTransactionIndex {
            context: context.to_string(),
        })?;
    context[..end]
        .strip_prefix(XPATH_ROOT)
        .ok_or_else(|| ContextError::NotRooted {
            context: context.to_string(),
        })
}

fn replace_markup(xpath: &str) -> String {
    xpath
        .chars()
        .map(|c| match c {
            '/' => '.',
            '[' => '(',
            ']' => ')',
            other => other,
        })
        .collect()
}

fn zero_index(path: &str) -> Result<String, ContextError> {
    let mut out = String::with_capacity(path.len());
    let mut copied = 0;
    for caps in INDEX.captures_iter(path) {
        let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let index: usize = digits
            .as_str()
            .trim()
            .parse()
            .map_err(|_| ContextError::NonNumericIndex {
                path: path.to_string(),
                index: digits.as_str().to_string(),
            })?;
        let lowered = index.checked_sub(1).ok_or_else(|| ContextError::ZeroIndex {
            path: path.to_string(),
        })?;
        out.push_str(&path[copied..whole.start()]);
        out.push('(');
        out.push_str(&lowered.to_string());
        out.push(')');
        copied = whole.end();
    }
    out.push_str(&path[copied..]);
    tracing::trace!(from = path, to = %out, "lowered context indices");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_tail_after_transaction_is_dropped() {
        let path = transaction_path(
            "/root/envelope[1]/funcgroupContainer/funcgroup[2]/transContainer/trans[1]/loopN1[1]/iteration[2]/N1[1]/N101[1]",
        )
        .unwrap();
        assert_eq!(
            path,
            "envelope(0).funcgroupContainer.funcgroup(1).transContainer.trans(0)"
        );
    }

    #[test]
    fn test_multi_digit_indices() {
        let path = transaction_path("/root/envelope[1]/funcgroupContainer[1]/funcgroup[12]").unwrap();
        assert_eq!(path, "envelope(0).funcgroupContainer(0).funcgroup(11)");
    }

    #[test]
    fn test_fewer_than_three_indices() {
        assert!(matches!(
            transaction_path("/root/envelope[1]/funcgroupContainer/funcgroup[1]"),
            Err(ContextError::MissingTransactionIndex { .. })
        ));
        assert!(matches!(
            transaction_path(""),
            Err(ContextError::MissingTransactionIndex { .. })
        ));
    }

    #[test]
    fn test_non_numeric_index() {
        let err = transaction_path("/root/envelope[1]/funcgroupContainer/funcgroup[last()]/transContainer/trans[1]")
            .unwrap_err();
        assert!(matches!(err, ContextError::NonNumericIndex { .. }), "{err}");
    }

    #[test]
    fn test_zero_index() {
        assert!(matches!(
            transaction_path("/root/envelope[0]/funcgroupContainer/funcgroup[1]/transContainer/trans[1]"),
            Err(ContextError::ZeroIndex { .. })
        ));
    }

    #[test]
    fn test_context_must_be_rooted() {
        assert!(matches!(
            transaction_path("/doc/envelope[1]/funcgroup[1]/trans[1]"),
            Err(ContextError::NotRooted { .. })
        ));
    }
}
