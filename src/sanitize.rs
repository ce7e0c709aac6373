//! Strips tracking instrumentation from cloned template markup and
//! neutralizes navigation so output pages are fully offline-inert.

use ego_tree::{NodeId, Tree};
use scraper::Node;

use crate::dom;
use crate::locate::{find_all, Pred};

/// Origin-specific attributes with no meaning outside the live page.
const TRACKING_ATTRS: &[&str] = &["data-ved", "jsaction", "jscontroller", "jsname", "jsmodel", "jsuid"];

const INERT_STYLE: &str = "pointer-events:none; cursor:default;";

/// Overlay badge injected by the origin's client script; meaningless in a
/// static snapshot.
const BADGE: Pred = Pred::tag("span").with_classes(&["vhJ6Pe"]);

/// Remove client-side instrumentation below (and including) `scope`:
/// overlay badges, `ping` beacons on anchors, and tracking attributes.
pub fn strip_instrumentation(tree: &mut Tree<Node>, scope: NodeId) {
    for id in find_all(tree, scope, &BADGE) {
        dom::detach(tree, id);
    }
    for id in dom::element_ids(tree, scope) {
        if dom::tag_name(tree, id).as_deref() == Some("a") {
            dom::remove_attr(tree, id, "ping");
        }
        for attr in TRACKING_ATTRS {
            dom::remove_attr(tree, id, attr);
        }
    }
}

/// Make every anchor below `scope` inert: drop navigation attributes and
/// suppress pointer interaction. Safe to run over already-disabled markup.
pub fn disable_links(tree: &mut Tree<Node>, scope: NodeId) {
    for id in dom::element_ids(tree, scope) {
        if dom::tag_name(tree, id).as_deref() != Some("a") {
            continue;
        }
        dom::remove_attr(tree, id, "href");
        dom::remove_attr(tree, id, "target");
        dom::remove_attr(tree, id, "rel");
        let already_inert = dom::get_attr(tree, id, "style")
            .is_some_and(|s| s.contains("pointer-events:none"));
        if !already_inert {
            dom::append_style(tree, id, INERT_STYLE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialize::serialize_document;
    use scraper::Html;

    fn doc(html: &str) -> Html {
        Html::parse_document(html)
    }

    #[test]
    fn instrumentation_is_stripped() {
        let mut d = doc(
            "<div data-ved=\"2a\" jsaction=\"click:x\"><a href=\"https://e.com\" \
             ping=\"/track\">link</a><span class=\"vhJ6Pe\">badge</span></div>",
        );
        let root = d.tree.root().id();
        strip_instrumentation(&mut d.tree, root);
        let out = serialize_document(&d);
        assert!(!out.contains("data-ved"));
        assert!(!out.contains("jsaction"));
        assert!(!out.contains("ping"));
        assert!(!out.contains("badge"));
        assert!(out.contains("href=\"https://e.com\""));
    }

    #[test]
    fn anchors_lose_navigation_and_gain_inert_style() {
        let mut d = doc("<a href=\"https://e.com\" target=\"_blank\" rel=\"noopener\">x</a>");
        let root = d.tree.root().id();
        disable_links(&mut d.tree, root);
        let out = serialize_document(&d);
        assert!(!out.contains("href"));
        assert!(!out.contains("target"));
        assert!(!out.contains("rel="));
        assert!(out.contains("pointer-events:none; cursor:default;"));
    }

    #[test]
    fn disable_links_is_idempotent() {
        let mut d = doc("<a href=\"https://e.com\" style=\"color:red\">x</a>");
        let root = d.tree.root().id();
        disable_links(&mut d.tree, root);
        let once = serialize_document(&d);
        disable_links(&mut d.tree, root);
        let twice = serialize_document(&d);
        assert_eq!(once, twice);
        assert!(once.contains("color:red;pointer-events:none; cursor:default;"));
    }
}
