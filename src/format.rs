//! Free-text formatting: answer reflow into constrained markup, and
//! condensation of raw source snippets into a single display line.

use std::sync::LazyLock;

use ego_tree::{NodeId, Tree};
use regex::Regex;
use scraper::{Html, Node};

use crate::dom;
use crate::serialize::escape_text;

/// Display budget for a condensed snippet, ellipsis included.
pub const SNIPPET_MAX_CHARS: usize = 260;
/// Class carried by every injected answer block (matches the template's own
/// paragraph styling).
pub const PARAGRAPH_CLASS: &str = "T286Pc";
pub const EMPTY_ANSWER_PLACEHOLDER: &str = "(No AI Overview text available for this row.)";

const ELLIPSIS: char = '…';
const HEADING_MAX_CHARS: usize = 80;

static TABLE_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Table_title:\s*(.*?)\s*(?:Table_content:|header:|row:|$)").unwrap());
static TABLE_ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"row:\s*(\|.*?\|)\s*(?:row:|$)").unwrap());
static MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bTable_(?:title|content):\s*").unwrap());
static LABEL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:header|row):\s*").unwrap());
static BLOCK_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n\s*\r?\n").unwrap());
static LINE_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n").unwrap());

// ── Snippet condensation ──

/// Condense a raw source text blob into one display line.
///
/// Blobs scraped from result pages may embed a marked-up table fragment
/// (`Table_title:` / `Table_content:` / `header:` / `row:` with
/// pipe-separated cells). The first row is summarized; a two-cell row whose
/// cells both hold colon-delimited sub-fields is zipped into alternating
/// "key value" pairs. Without a row the markers are simply stripped. The
/// result is whitespace-collapsed and truncated to [`SNIPPET_MAX_CHARS`].
pub fn condense_snippet(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    let s = collapse_ws(raw);
    let title = TABLE_TITLE_RE
        .captures(&s)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();

    let Some(row) = TABLE_ROW_RE.captures(&s) else {
        let out = MARKER_RE.replace_all(&s, "");
        let out = LABEL_RE.replace_all(&out, "");
        let out = collapse_ws(&out.replace('|', " "));
        return truncate_with_ellipsis(&out, SNIPPET_MAX_CHARS);
    };

    let cells: Vec<String> = row[1]
        .trim()
        .trim_matches('|')
        .split('|')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();

    let mut parts: Vec<String> = Vec::new();
    if !title.is_empty() {
        parts.push(title);
    }
    if cells.len() == 2 && cells[0].contains(':') && cells[1].contains(':') {
        let keys: Vec<&str> = cells[0].split(':').map(str::trim).filter(|k| !k.is_empty()).collect();
        let vals: Vec<&str> = cells[1].split(':').map(str::trim).filter(|v| !v.is_empty()).collect();
        for (key, val) in keys.iter().zip(vals.iter()) {
            parts.push((*key).to_string());
            parts.push((*val).to_string());
        }
    } else {
        parts.push(cells.join(" "));
    }

    let out = collapse_ws(&parts.join(" "));
    truncate_with_ellipsis(&out, SNIPPET_MAX_CHARS)
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Budget is in characters; on truncation the final character becomes an
/// ellipsis so the total never exceeds `max`.
pub fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut head: String = s.chars().take(max.saturating_sub(1)).collect();
    head.truncate(head.trim_end().len());
    head.push(ELLIPSIS);
    head
}

// ── Answer reflow ──

/// Expand answer text into the constrained block markup used by the
/// AI-Overview body.
///
/// Blocks are split on blank lines. A lone line of at most 80 characters
/// ending in `:` becomes a bold heading block; anything else becomes a
/// paragraph with `<br>` between its lines. Paragraph lines are inserted
/// unescaped: the input arrives from the upstream reformatting pass, whose
/// contract restricts it to the allowed tag vocabulary, so any tags in a
/// line are markers to be parsed, not prose. The verbatim guarantee covers
/// the visible text ([`visible_text`]), not the raw bytes. Heading text is
/// escaped. Empty input yields a single placeholder paragraph.
pub fn answer_fragment_html(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return format!(
            "<p class=\"{PARAGRAPH_CLASS}\">{}</p>",
            escape_text(EMPTY_ANSWER_PLACEHOLDER)
        );
    }

    let mut out = String::new();
    for block in BLOCK_SPLIT_RE.split(trimmed).map(str::trim).filter(|b| !b.is_empty()) {
        let lines: Vec<&str> = LINE_SPLIT_RE
            .split(block)
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        if lines.len() == 1
            && lines[0].ends_with(':')
            && lines[0].chars().count() <= HEADING_MAX_CHARS
        {
            out.push_str(&format!(
                "<div class=\"{PARAGRAPH_CLASS}\"><strong>{}</strong></div>",
                escape_text(lines[0])
            ));
            continue;
        }

        out.push_str(&format!("<p class=\"{PARAGRAPH_CLASS}\">"));
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                out.push_str("<br>");
            }
            out.push_str(line);
        }
        out.push_str("</p>");
    }
    out
}

// ── Typography inheritance ──

const INHERIT_STYLE: &str = "font-family: inherit; font-size: inherit; font-style: inherit; line-height: inherit; color: inherit;";
const LIST_STYLE: &str = "-webkit-padding-start: 1.25em; padding-inline-start: 1.25em; margin: 0.5em 0; list-style-position: outside;";
const LIST_ITEM_STYLE: &str = "margin: 0.25em 0;";

fn heading_size(tag: &str) -> Option<&'static str> {
    match tag {
        "h1" => Some("1.6em"),
        "h2" => Some("1.4em"),
        "h3" => Some("1.25em"),
        "h4" => Some("1.15em"),
        "h5" => Some("1.05em"),
        "h6" => Some("1.0em"),
        _ => None,
    }
}

/// Force injected markup to inherit typography from its container, give
/// lists a fixed indent and marker style, and size headings. Scripts and
/// style blocks in the fragment are dropped outright.
pub fn annotate_inherited_styles(tree: &mut Tree<Node>, scope: NodeId) {
    for id in dom::element_ids(tree, scope) {
        if matches!(dom::tag_name(tree, id).as_deref(), Some("script") | Some("style")) {
            dom::detach(tree, id);
        }
    }

    for id in dom::element_ids(tree, scope) {
        let Some(tag) = dom::tag_name(tree, id) else { continue };
        match tag.as_str() {
            "ul" | "ol" => {
                dom::append_style(tree, id, INHERIT_STYLE);
                dom::append_style(tree, id, LIST_STYLE);
                let marker = if tag == "ul" { "list-style-type: disc;" } else { "list-style-type: decimal;" };
                dom::append_style(tree, id, marker);
            }
            "li" => dom::append_style(tree, id, LIST_ITEM_STYLE),
            "br" => {}
            _ => {
                dom::append_style(tree, id, INHERIT_STYLE);
                if let Some(size) = heading_size(&tag) {
                    let heading = format!(
                        "margin: 0.6em 0 0.3em; font-size: {size}; font-weight: 700;"
                    );
                    dom::append_style(tree, id, &heading);
                }
            }
        }
    }
}

/// Elements that delimit runs of text the reader perceives as separate.
const BLOCK_BOUNDARY_TAGS: &[&str] =
    &["p", "div", "li", "ul", "ol", "br", "h1", "h2", "h3", "h4", "h5", "h6"];

/// Concatenated non-marker text of an HTML fragment, characters in order,
/// with a line break at each block or `<br>` boundary. Used to check the
/// verbatim-preservation property of reflowed output.
pub fn visible_text(fragment_html: &str) -> String {
    let fragment = Html::parse_fragment(fragment_html);
    let mut out = String::new();
    for node in fragment.tree.root().descendants() {
        match node.value() {
            Node::Element(el) if BLOCK_BOUNDARY_TAGS.contains(&el.name()) => out.push('\n'),
            Node::Text(t) => out.push_str(&t.text),
            _ => {}
        }
    }
    out.trim_matches('\n').to_string()
}

// ── Tests ──
