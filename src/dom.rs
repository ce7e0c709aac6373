//! Small mutation helpers over the parsed HTML tree.
//!
//! `scraper` gives us a permissive html5ever parse into an `ego_tree`; these
//! helpers cover the operations the renderers need on top of it: deep-cloning
//! a subtree (clone-before-mutate), replacing text, and editing attributes.

use ego_tree::{NodeId, Tree};
use scraper::node::Text;
use scraper::{Html, Node};

/// Deep-copy the subtree rooted at `id` into a standalone tree.
/// The source tree is left untouched.
pub fn clone_subtree(tree: &Tree<Node>, id: NodeId) -> Tree<Node> {
    let Some(src_root) = tree.get(id) else {
        return Tree::new(Node::Fragment);
    };
    let mut out = Tree::new(src_root.value().clone());
    let mut stack = vec![(id, out.root().id())];
    while let Some((src_id, dst_id)) = stack.pop() {
        let Some(src) = tree.get(src_id) else { continue };
        let children: Vec<(NodeId, Node)> =
            src.children().map(|c| (c.id(), c.value().clone())).collect();
        for (child_id, value) in children {
            let Some(mut dst) = out.get_mut(dst_id) else { continue };
            let new_id = dst.append(value).id();
            stack.push((child_id, new_id));
        }
    }
    out
}

/// Detach every child of `id` (the node itself stays in place).
pub fn clear_children(tree: &mut Tree<Node>, id: NodeId) {
    let children: Vec<NodeId> = match tree.get(id) {
        Some(node) => node.children().map(|c| c.id()).collect(),
        None => return,
    };
    for child in children {
        if let Some(mut node) = tree.get_mut(child) {
            node.detach();
        }
    }
}

/// Replace the entire content of `id` with a single text node.
pub fn set_text(tree: &mut Tree<Node>, id: NodeId, text: &str) {
    clear_children(tree, id);
    if let Some(mut node) = tree.get_mut(id) {
        node.append(Node::Text(Text { text: text.into() }));
    }
}

/// Rewrite the content of a text node in place.
pub fn set_text_node(tree: &mut Tree<Node>, id: NodeId, text: &str) {
    if let Some(mut node) = tree.get_mut(id) {
        if let Node::Text(t) = node.value() {
            t.text = text.into();
        }
    }
}

pub fn detach(tree: &mut Tree<Node>, id: NodeId) {
    if let Some(mut node) = tree.get_mut(id) {
        node.detach();
    }
}

pub fn get_attr(tree: &Tree<Node>, id: NodeId, name: &str) -> Option<String> {
    tree.get(id)?
        .value()
        .as_element()
        .and_then(|el| el.attr(name))
        .map(str::to_string)
}

/// Set (or overwrite) an attribute. The qualified key is borrowed from a
/// throwaway parsed fragment so it matches what the parser itself produces.
pub fn set_attr(tree: &mut Tree<Node>, id: NodeId, name: &str, value: &str) {
    let probe = Html::parse_fragment(&format!("<i {name}=\"\"></i>"));
    let key = probe
        .tree
        .root()
        .descendants()
        .find_map(|n| n.value().as_element().and_then(|el| el.attrs.first().map(|(k, _)| k.clone())));
    let Some(key) = key else { return };
    if let Some(mut node) = tree.get_mut(id) {
        if let Node::Element(el) = node.value() {
            if let Some((_, existing)) = el.attrs.iter_mut().find(|(k, _)| *k == key) {
                *existing = value.into();
            } else {
                el.attrs.push((key, value.into()));
            }
        }
    }
}

pub fn remove_attr(tree: &mut Tree<Node>, id: NodeId, name: &str) {
    if let Some(mut node) = tree.get_mut(id) {
        if let Node::Element(el) = node.value() {
            el.attrs.retain(|(k, _)| &*k.local != name);
        }
    }
}

/// Append a style declaration, inserting a `;` separator when the existing
/// value does not already end with one.
pub fn append_style(tree: &mut Tree<Node>, id: NodeId, extra: &str) {
    let mut style = get_attr(tree, id, "style").unwrap_or_default().trim_end().to_string();
    if !style.is_empty() && !style.ends_with(';') {
        style.push(';');
    }
    style.push_str(extra);
    set_attr(tree, id, "style", &style);
}

pub fn tag_name(tree: &Tree<Node>, id: NodeId) -> Option<String> {
    tree.get(id)?.value().as_element().map(|el| el.name().to_string())
}

/// Ids of `scope` and every element beneath it, in document order.
pub fn element_ids(tree: &Tree<Node>, scope: NodeId) -> Vec<NodeId> {
    tree.get(scope)
        .map(|node| {
            node.descendants()
                .filter(|d| d.value().is_element())
                .map(|d| d.id())
                .collect()
        })
        .unwrap_or_default()
}

/// Ids of the non-blank text nodes beneath `scope`, in document order.
pub fn text_node_ids(tree: &Tree<Node>, scope: NodeId) -> Vec<NodeId> {
    tree.get(scope)
        .map(|node| {
            node.descendants()
                .filter(|d| d.value().as_text().is_some_and(|t| !t.trim().is_empty()))
                .map(|d| d.id())
                .collect()
        })
        .unwrap_or_default()
}

/// Concatenated text content beneath `id`, markers excluded.
pub fn collect_text(tree: &Tree<Node>, id: NodeId) -> String {
    let mut out = String::new();
    if let Some(node) = tree.get(id) {
        for d in node.descendants() {
            if let Some(t) = d.value().as_text() {
                out.push_str(&t.text);
            }
        }
    }
    out
}

/// Graft a standalone subtree under `parent`, returning the new root id.
pub fn append_subtree(tree: &mut Tree<Node>, parent: NodeId, subtree: Tree<Node>) -> Option<NodeId> {
    let mut node = tree.get_mut(parent)?;
    Some(node.append_subtree(subtree).id())
}

/// Parse an HTML fragment and return its top-level nodes as standalone trees.
pub fn fragment_roots(html: &str) -> Vec<Tree<Node>> {
    let fragment = Html::parse_fragment(html);
    // Fragment parses are wrapped in a synthetic <html> element.
    let Some(wrapper) = fragment.tree.root().children().find(|n| n.value().is_element()) else {
        return Vec::new();
    };
    wrapper
        .children()
        .map(|c| clone_subtree(&fragment.tree, c.id()))
        .collect()
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::serialize_node;

    fn parse(html: &str) -> Html {
        Html::parse_document(html)
    }

    fn find_by_tag(doc: &Html, tag: &str) -> NodeId {
        doc.tree
            .root()
            .descendants()
            .find(|n| n.value().as_element().is_some_and(|el| el.name() == tag))
            .map(|n| n.id())
            .unwrap()
    }

    #[test]
    fn clone_is_independent_of_source() {
        let mut doc = parse("<html><body><p id=\"x\">original</p></body></html>");
        let p = find_by_tag(&doc, "p");
        let copy = clone_subtree(&doc.tree, p);

        set_text(&mut doc.tree, p, "mutated");
        assert_eq!(collect_text(&doc.tree, p), "mutated");
        assert_eq!(collect_text(&copy, copy.root().id()), "original");
    }

    #[test]
    fn set_text_replaces_nested_children() {
        let mut doc = parse("<html><body><div><span>a</span><span>b</span></div></body></html>");
        let div = find_by_tag(&doc, "div");
        set_text(&mut doc.tree, div, "plain");
        assert_eq!(collect_text(&doc.tree, div), "plain");
        assert!(!serialize_node(&doc.tree, div).contains("<span>"));
    }

    #[test]
    fn attr_roundtrip() {
        let mut doc = parse("<html><body><a href=\"old\">x</a></body></html>");
        let a = find_by_tag(&doc, "a");
        assert_eq!(get_attr(&doc.tree, a, "href").as_deref(), Some("old"));
        set_attr(&mut doc.tree, a, "href", "https://example.com");
        assert_eq!(get_attr(&doc.tree, a, "href").as_deref(), Some("https://example.com"));
        remove_attr(&mut doc.tree, a, "href");
        assert_eq!(get_attr(&doc.tree, a, "href"), None);
    }

    #[test]
    fn set_attr_adds_a_missing_attribute() {
        let mut doc = parse("<html><body><a>x</a></body></html>");
        let a = find_by_tag(&doc, "a");
        assert_eq!(get_attr(&doc.tree, a, "href"), None);
        set_attr(&mut doc.tree, a, "href", "https://example.com");
        assert_eq!(get_attr(&doc.tree, a, "href").as_deref(), Some("https://example.com"));
    }

    #[test]
    fn append_style_inserts_separator() {
        let mut doc = parse("<html><body><a style=\"color:red\">x</a></body></html>");
        let a = find_by_tag(&doc, "a");
        append_style(&mut doc.tree, a, "cursor:default;");
        assert_eq!(get_attr(&doc.tree, a, "style").as_deref(), Some("color:red;cursor:default;"));
    }

    #[test]
    fn fragment_roots_returns_top_level_nodes() {
        let roots = fragment_roots("<li class=\"jydCyd\"></li><p>x</p>");
        assert_eq!(roots.len(), 2);
        let li = &roots[0];
        assert_eq!(
            li.root().value().as_element().map(|el| el.name().to_string()).as_deref(),
            Some("li")
        );
    }

    #[test]
    fn text_node_ids_skips_blank_runs() {
        let doc = parse("<html><body><div>  <span>one</span> \n <span>two</span></div></body></html>");
        let div = find_by_tag(&doc, "div");
        let texts = text_node_ids(&doc.tree, div);
        assert_eq!(texts.len(), 2);
    }
}
