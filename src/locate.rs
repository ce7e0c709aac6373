//! Structural pattern matching against the parsed template.
//!
//! Saved result pages carry generated class names and decoy nodes, so anchors
//! are found with a small composable predicate vocabulary instead of
//! hard-coded traversal: tag-equals, id-equals, class-token-contains, and
//! has-descendant-matching. Matching walks depth-first in pre-order and the
//! first hit in document order wins.

use ego_tree::{NodeId, NodeRef, Tree};
use scraper::Node;

use crate::error::RenderError;

/// A structural match predicate. Built in const context and composed with
/// the `with_*` methods.
#[derive(Debug, Clone, Copy)]
pub struct Pred {
    tag: Option<&'static str>,
    id: Option<&'static str>,
    classes: &'static [&'static str],
    descendant: Option<&'static Pred>,
}

impl Pred {
    pub const fn tag(tag: &'static str) -> Self {
        Pred { tag: Some(tag), id: None, classes: &[], descendant: None }
    }

    pub const fn any() -> Self {
        Pred { tag: None, id: None, classes: &[], descendant: None }
    }

    pub const fn with_id(mut self, id: &'static str) -> Self {
        self.id = Some(id);
        self
    }

    pub const fn with_classes(mut self, classes: &'static [&'static str]) -> Self {
        self.classes = classes;
        self
    }

    pub const fn with_descendant(mut self, inner: &'static Pred) -> Self {
        self.descendant = Some(inner);
        self
    }

    pub fn matches(&self, node: NodeRef<Node>) -> bool {
        let Some(el) = node.value().as_element() else {
            return false;
        };
        if let Some(tag) = self.tag {
            if el.name() != tag {
                return false;
            }
        }
        if let Some(id) = self.id {
            if el.attr("id") != Some(id) {
                return false;
            }
        }
        for class in self.classes {
            let has_token = el
                .attr("class")
                .is_some_and(|c| c.split_whitespace().any(|token| token == *class));
            if !has_token {
                return false;
            }
        }
        if let Some(inner) = self.descendant {
            // skip(1): the node itself is not its own descendant
            if !node.descendants().skip(1).any(|d| inner.matches(d)) {
                return false;
            }
        }
        true
    }
}

/// First node below `scope` (exclusive) matching `pred`, in document order.
pub fn find_first(tree: &Tree<Node>, scope: NodeId, pred: &Pred) -> Option<NodeId> {
    let scope = tree.get(scope)?;
    scope.descendants().skip(1).find(|n| pred.matches(*n)).map(|n| n.id())
}

/// All nodes below `scope` (exclusive) matching `pred`, in document order.
pub fn find_all(tree: &Tree<Node>, scope: NodeId, pred: &Pred) -> Vec<NodeId> {
    match tree.get(scope) {
        Some(scope) => scope
            .descendants()
            .skip(1)
            .filter(|n| pred.matches(*n))
            .map(|n| n.id())
            .collect(),
        None => Vec::new(),
    }
}

/// Like [`find_first`] but absence is a fatal structural error.
pub fn require(
    tree: &Tree<Node>,
    scope: NodeId,
    pred: &Pred,
    anchor: &'static str,
) -> Result<NodeId, RenderError> {
    find_first(tree, scope, pred).ok_or(RenderError::MissingAnchor(anchor))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const HTML: &str = "<html><body>\
        <div class=\"outer\">\
          <div class=\"result hidden\"><span>decoy</span></div>\
          <div class=\"result\"><div class=\"inner\">real</div></div>\
          <div class=\"result\"><div class=\"inner\">later</div></div>\
        </div>\
        <p id=\"marker\">here</p>\
        </body></html>";

    fn doc() -> Html {
        Html::parse_document(HTML)
    }

    #[test]
    fn id_match() {
        let doc = doc();
        let root = doc.tree.root().id();
        const MARKER: Pred = Pred::tag("p").with_id("marker");
        let id = find_first(&doc.tree, root, &MARKER).unwrap();
        assert_eq!(crate::dom::collect_text(&doc.tree, id), "here");
    }

    #[test]
    fn class_token_match_ignores_other_tokens() {
        let doc = doc();
        let root = doc.tree.root().id();
        const HIDDEN: Pred = Pred::tag("div").with_classes(&["hidden"]);
        assert!(find_first(&doc.tree, root, &HIDDEN).is_some());
    }

    #[test]
    fn descendant_predicate_skips_decoys_first_match_wins() {
        let doc = doc();
        let root = doc.tree.root().id();
        const INNER: Pred = Pred::tag("div").with_classes(&["inner"]);
        const RESULT: Pred = Pred::tag("div").with_classes(&["result"]).with_descendant(&INNER);
        let id = find_first(&doc.tree, root, &RESULT).unwrap();
        // the decoy has the class but no matching descendant; of the two
        // remaining candidates the first in document order wins
        assert_eq!(crate::dom::collect_text(&doc.tree, id), "real");
    }

    #[test]
    fn absence_is_not_an_error_for_find_first() {
        let doc = doc();
        let root = doc.tree.root().id();
        const MISSING: Pred = Pred::tag("table");
        assert!(find_first(&doc.tree, root, &MISSING).is_none());
    }

    #[test]
    fn require_names_the_missing_anchor() {
        let doc = doc();
        let root = doc.tree.root().id();
        const MISSING: Pred = Pred::tag("div").with_id("rso");
        let err = require(&doc.tree, root, &MISSING, "results container div#rso").unwrap_err();
        assert!(err.to_string().contains("results container div#rso"));
    }

    #[test]
    fn find_all_preserves_document_order() {
        let doc = doc();
        let root = doc.tree.root().id();
        const RESULT: Pred = Pred::tag("div").with_classes(&["result"]);
        let all = find_all(&doc.tree, root, &RESULT);
        assert_eq!(all.len(), 3);
    }
}
