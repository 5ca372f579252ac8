//! XML text form of XEDI documents
//!
//! Element values travel in a `value` attribute, so `<BEG01 value="00"/>`
//! is the element `BEG01` holding `00`.

use crate::document::{XediDocument, XediId};
use crate::{Error, Result};
use std::borrow::Cow;
use std::fmt::Write as _;

/// Attribute carrying an element's value
pub const VALUE_ATTRIBUTE: &str = "value";

/// Render `doc` as XML text
pub fn to_xml(doc: &XediDocument, pretty: bool) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    if pretty {
        out.push('\n');
    }
    write_element(doc, doc.root(), 0, pretty, &mut out);
    if pretty {
        out.push('\n');
    }
    out
}

fn write_element(doc: &XediDocument, id: XediId, depth: usize, pretty: bool, out: &mut String) {
    if pretty && depth > 0 {
        out.push('\n');
        out.push_str(&"  ".repeat(depth));
    }
    let name = doc.name(id);
    out.push('<');
    out.push_str(name);
    if let Some(value) = doc.value(id) {
        let _ = write!(out, " {VALUE_ATTRIBUTE}=\"{}\"", escape(value));
    }
    let children = doc.children(id);
    if children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for &child in children {
        write_element(doc, child, depth + 1, pretty, out);
    }
    if pretty {
        out.push('\n');
        out.push_str(&"  ".repeat(depth));
    }
    let _ = write!(out, "</{name}>");
}

/// Escape text for use inside a double-quoted attribute
pub fn escape(text: &str) -> Cow<'_, str> {
    if !text
        .chars()
        .any(|c| matches!(c, '<' | '>' | '&' | '"' | '\'') || c.is_control())
    {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c if c.is_control() => {
                let _ = write!(escaped, "&#x{:X};", u32::from(c));
            }
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Parse XML text into an XEDI document
///
/// Each element is labelled with its position among its parent's element
/// children, which is how the forward conversion numbers them.
///
/// # Errors
///
/// Returns [`Error::Xml`] for malformed XML and [`Error::InvalidName`] for
/// element names that cannot be addressed by a dotted path.
pub fn from_xml(text: &str) -> Result<XediDocument> {
    let parsed = roxmltree::Document::parse(text)?;
    let root = parsed.root_element();
    let mut doc = XediDocument::with_root(root.tag_name().name());
    if let Some(value) = root.attribute(VALUE_ATTRIBUTE) {
        let root_id = doc.root();
        doc.set_node_value(root_id, value);
    }
    copy_children(root, doc.root(), &mut doc)?;
    tracing::debug!(elements = doc.reachable_count(), "parsed XEDI document");
    Ok(doc)
}

fn copy_children(source: roxmltree::Node<'_, '_>, target: XediId, doc: &mut XediDocument) -> Result<()> {
    for (position, child) in source.children().filter(roxmltree::Node::is_element).enumerate() {
        let id = doc.append_child(target, child.tag_name().name(), Some(position))?;
        if let Some(value) = child.attribute(VALUE_ATTRIBUTE) {
            doc.set_node_value(id, value);
        }
        copy_children(child, id, doc)?;
    }
    Ok(())
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Error::Xml {
            message: e.to_string(),
        }
    }
}
