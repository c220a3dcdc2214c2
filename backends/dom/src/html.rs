//! HTML serialisation of a [`Document`].

use std::borrow::Cow;

use crate::document::{Document, NodeId, NodeKind};

/// Elements that never have children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

fn escape(value: &str, attribute: bool) -> Cow<'_, str> {
    let needs_escape = |c: char| matches!(c, '&' | '<' | '>') || (attribute && c == '"');
    if !value.contains(needs_escape) {
        return Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 8);
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' if attribute => escaped.push_str("&quot;"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Escapes text content.
#[must_use]
pub fn escape_text(text: &str) -> Cow<'_, str> {
    escape(text, false)
}

/// Escapes an attribute value for use inside double quotes.
#[must_use]
pub fn escape_attribute(value: &str) -> Cow<'_, str> {
    escape(value, true)
}

impl Document {
    /// Serialises `node` and its subtree.
    #[must_use]
    pub fn to_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    /// Serialises the children of `node`.
    #[must_use]
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_node(*child, &mut out);
        }
        out
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        let Some(kind) = self.kind(node) else {
            return;
        };
        match kind {
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Raw(markup) => out.push_str(markup),
            NodeKind::Element {
                tag, attributes, ..
            } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape_attribute(value));
                        out.push('"');
                    }
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for child in self.children(node) {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eddy_core::{Host, Props};

    #[test]
    fn escapes_text_and_attributes() {
        assert_eq!(escape_text("a < b & c"), "a &lt; b &amp; c");
        assert_eq!(escape_attribute("say \"hi\""), "say &quot;hi&quot;");
        assert!(matches!(escape_text("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn void_elements_have_no_closing_tag() {
        let mut document = Document::new();
        let root = document.create_container("p");
        let br = document.create_element("br", None);
        let img = document.create_element("img", None);
        let props = Props::new().with("alt", "<logo>").with("hidden", true);
        document.patch(&img, "img", &props.diff(None));
        document.insert_before(&root, &br, None);
        document.insert_before(&root, &img, None);
        assert_eq!(
            document.to_html(root),
            "<p><br><img alt=\"&lt;logo&gt;\" hidden></p>"
        );
        assert_eq!(document.inner_html(root), "<br><img alt=\"&lt;logo&gt;\" hidden>");
    }

    #[test]
    fn raw_markup_is_not_escaped() {
        let mut document = Document::new();
        let root = document.create_container("div");
        let raw = document.create_raw("<b>&amp;</b>", None);
        document.insert_before(&root, &raw, None);
        assert_eq!(document.inner_html(root), "<b>&amp;</b>");
    }
}
