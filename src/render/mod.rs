//! Page renderers. Each takes the rewritten template text, clones its
//! repeating units, and binds record data into the clones.

pub mod aio;
pub mod serp;

use ego_tree::Tree;
use scraper::{Html, Node};

use crate::dom;
use crate::locate::{self, Pred};

/// The search input box shared by every template variant.
const SEARCH_BOX: Pred = Pred::tag("textarea").with_id("APjFqb");
const TITLE_SUFFIX: &str = " - Google Search";

/// Bind the query into the search box and, when the template's title
/// follows the origin's `{query} - Google Search` shape, into the tab
/// title too.
pub fn bind_query(doc: &mut Html, query: &str) {
    let root = doc.tree.root().id();
    if let Some(id) = locate::find_first(&doc.tree, root, &SEARCH_BOX) {
        dom::set_attr(&mut doc.tree, id, "value", query);
        dom::set_text(&mut doc.tree, id, query);
    }
    bind_title(&mut doc.tree, query);
}

fn bind_title(tree: &mut Tree<Node>, query: &str) {
    let root = tree.root().id();
    let title = Pred::tag("title");
    if let Some(id) = locate::find_first(tree, root, &title) {
        if dom::collect_text(tree, id).trim_end().ends_with(TITLE_SUFFIX) {
            dom::set_text(tree, id, &format!("{query}{TITLE_SUFFIX}"));
        }
    }
}
