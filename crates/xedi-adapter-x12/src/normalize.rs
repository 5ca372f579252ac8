//! Delimiter normalization
//!
//! Rewrites a message's separators to the internal sentinels so the later
//! stages never depend on which characters a trading partner picked, and
//! drops whatever trails the interchange trailer.

use crate::syntax::{DelimiterSet, Separators};
use crate::{Error, Result};
use regex::Regex;
use std::borrow::Cow;

const INTERCHANGE_TRAILER: &str = "IEA";

/// Replace every separator in `message` with its counterpart in `to`
///
/// All three separators are substituted in one pass, so a target separator
/// that equals a source separator is never rewritten twice. Separators are
/// matched literally; regex metacharacters such as `\` or `|` are escaped.
///
/// # Errors
///
/// Returns [`Error::Normalization`] if the substitution pattern cannot be
/// compiled.
pub fn replace_delimiters(message: &str, from: &Separators, to: &Separators) -> Result<String> {
    let element = from.element.to_string();
    let composite = from.composite.to_string();
    let mut pairs: Vec<(&str, Cow<'_, str>)> = vec![
        (from.segment.as_str(), Cow::Borrowed(to.segment.as_str())),
        (element.as_str(), Cow::Owned(to.element.to_string())),
        (composite.as_str(), Cow::Owned(to.composite.to_string())),
    ];
    // Longest first so a multi-character segment delimiter wins over a
    // single character it starts with.
    pairs.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let pattern = pairs
        .iter()
        .map(|(source, _)| regex::escape(source))
        .collect::<Vec<_>>()
        .join("|");
    let regex = Regex::new(&pattern).map_err(|e| Error::normalization(e.to_string()))?;

    let replaced = regex.replace_all(message, |caps: &regex::Captures<'_>| {
        let matched = &caps[0];
        pairs
            .iter()
            .find(|(source, _)| *source == matched)
            .map_or_else(|| matched.to_string(), |(_, target)| target.to_string())
    });
    Ok(replaced.into_owned())
}

/// Cut `message` just after the segment delimiter that ends the last `IEA`
///
/// Messages without an `IEA`, or without a delimiter after it, are returned
/// unchanged.
#[must_use]
pub fn truncate_after_trailer<'a>(message: &'a str, segment: &str) -> &'a str {
    let Some(trailer) = message.rfind(INTERCHANGE_TRAILER) else {
        return message;
    };
    match message[trailer..].find(segment) {
        Some(offset) => &message[..trailer + offset + segment.len()],
        None => message,
    }
}

/// Rewrite `message` from `from` separators to `to` separators and drop
/// anything after the interchange trailer
///
/// # Errors
///
/// See [`replace_delimiters`].
pub fn normalize_with(message: &str, from: &Separators, to: &Separators) -> Result<String> {
    let replaced = replace_delimiters(message, from, to)?;
    Ok(truncate_after_trailer(&replaced, &to.segment).to_string())
}

/// Rewrite a raw message to the internal sentinels
///
/// # Errors
///
/// See [`replace_delimiters`].
pub fn normalize(message: &str, delimiters: &DelimiterSet) -> Result<String> {
    let normalized = normalize_with(message, &delimiters.separators(), &Separators::sentinels())?;
    tracing::debug!(
        input_len = message.len(),
        output_len = normalized.len(),
        "normalized delimiters"
    );
    Ok(normalized)
}

/// Render sentinel-delimited text with the original delimiters again
///
/// # Errors
///
/// See [`replace_delimiters`].
pub fn denormalize(text: &str, delimiters: &DelimiterSet) -> Result<String> {
    replace_delimiters(text, &Separators::sentinels(), &delimiters.separators())
}
