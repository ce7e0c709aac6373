//! Re-emit a mutated document as HTML text.
//!
//! The walk preserves node order and attribute order exactly as they sit in
//! the tree; nothing is canonicalized or minified, so text in untouched
//! template regions comes back out byte-for-byte.

use ego_tree::{NodeId, NodeRef, Tree};
use scraper::{Html, Node};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

// Text inside these is emitted raw, per the HTML serialization rules.
const RAW_TEXT_ELEMENTS: &[&str] =
    &["script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext"];

pub fn serialize_document(doc: &Html) -> String {
    let mut out = String::new();
    for child in doc.tree.root().children() {
        write_node(child, &mut out, false);
    }
    out
}

/// Serialize a single subtree (used for cloned units in tests).
pub fn serialize_node(tree: &Tree<Node>, id: NodeId) -> String {
    let mut out = String::new();
    if let Some(node) = tree.get(id) {
        write_node(node, &mut out, false);
    }
    out
}

fn write_node(node: NodeRef<Node>, out: &mut String, raw_text: bool) {
    match node.value() {
        Node::Document | Node::Fragment => {
            for child in node.children() {
                write_node(child, out, raw_text);
            }
        }
        Node::Doctype(doctype) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(doctype.name());
            out.push('>');
        }
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
        Node::Text(text) => {
            if raw_text {
                out.push_str(&text.text);
            } else {
                push_escaped_text(out, &text.text);
            }
        }
        Node::Element(el) => {
            out.push('<');
            out.push_str(el.name());
            for (name, value) in el.attrs() {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                push_escaped_attr(out, value);
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&el.name()) {
                return;
            }
            let raw = RAW_TEXT_ELEMENTS.contains(&el.name());
            for child in node.children() {
                write_node(child, out, raw);
            }
            out.push_str("</");
            out.push_str(el.name());
            out.push('>');
        }
        Node::ProcessingInstruction(pi) => {
            out.push_str("<?");
            out.push_str(&pi.target);
            out.push(' ');
            out.push_str(&pi.data);
            out.push('>');
        }
    }
}

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    push_escaped_text(&mut out, text);
    out
}

fn push_escaped_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn push_escaped_attr(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_preserves_structure_and_whitespace() {
        let raw = "<!DOCTYPE html><html><head><title>t</title></head>\
                   <body><p id=\"a\">x &amp; y</p>\n  <span>z</span></body></html>";
        let doc = Html::parse_document(raw);
        assert_eq!(serialize_document(&doc), raw);
    }

    #[test]
    fn void_elements_get_no_closing_tag() {
        let doc = Html::parse_document("<html><body><p>a<br>b</p></body></html>");
        let out = serialize_document(&doc);
        assert!(out.contains("a<br>b"));
        assert!(!out.contains("</br>"));
    }

    #[test]
    fn attribute_values_are_escaped() {
        let doc =
            Html::parse_document("<html><body><a href=\"/x?a=1&amp;b=2\" title=\"say &quot;hi&quot;\">l</a></body></html>");
        let out = serialize_document(&doc);
        assert!(out.contains("href=\"/x?a=1&amp;b=2\""));
        assert!(out.contains("title=\"say &quot;hi&quot;\""));
    }

    #[test]
    fn script_text_is_not_escaped() {
        let doc = Html::parse_document("<html><head><script>if (a < b && c) {}</script></head><body></body></html>");
        let out = serialize_document(&doc);
        assert!(out.contains("if (a < b && c) {}"));
    }

    #[test]
    fn comments_survive() {
        let doc = Html::parse_document("<html><body><!-- keep me --></body></html>");
        assert!(serialize_document(&doc).contains("<!-- keep me -->"));
    }
}
