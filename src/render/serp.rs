//! Classic results page: the template's first organic result unit is the
//! prototype; one clone per source is bound and appended in rank order.

use ego_tree::{NodeId, Tree};
use scraper::Node;

use crate::dom;
use crate::error::RenderError;
use crate::format::condense_snippet;
use crate::input::SourceItem;
use crate::locate::{self, Pred};
use crate::render::bind_query;
use crate::sanitize;
use crate::serialize::serialize_document;
use crate::template;

/// Organic results shown per page, matching the origin's first page.
pub const MAX_RESULTS: usize = 10;

const RESULT_INNER: Pred = Pred::tag("div").with_classes(&["yuRUbf"]);
const RESULT_UNIT: Pred = Pred::tag("div")
    .with_classes(&["MjjYud"])
    .with_descendant(&RESULT_INNER);
const RESULTS_CONTAINER: Pred = Pred::tag("div").with_id("rso");
const TITLE_NODE: Pred = Pred::tag("h3");
const SITE_NAME: Pred = Pred::tag("span").with_classes(&["VuuXrf"]);
const BREADCRUMB: Pred = Pred::tag("div").with_classes(&["TbwUpd"]);
const CITE_NODE: Pred = Pred::tag("cite");
const SNIPPET_NODE: Pred = Pred::tag("div").with_classes(&["VwiC3b"]);

/// A validated results template, ready to render any number of pages.
#[derive(Debug)]
pub struct SerpPage {
    raw: String,
}

impl SerpPage {
    /// Validate the template's structure once up front so a bad template
    /// aborts the run before any page is written.
    pub fn new(raw: String) -> Result<Self, RenderError> {
        let doc = template::parse(&raw);
        let root = doc.tree.root().id();
        let container = locate::require(&doc.tree, root, &RESULTS_CONTAINER, "results container #rso")?;
        locate::require(&doc.tree, container, &RESULT_UNIT, "organic result unit in #rso")?;
        Ok(Self { raw })
    }

    /// Render one page for `query` with the given rank-ordered sources.
    pub fn render(&self, query: &str, sources: &[&SourceItem]) -> Result<String, RenderError> {
        let mut doc = template::parse(&self.raw);
        bind_query(&mut doc, query);

        let root = doc.tree.root().id();
        let container = locate::require(&doc.tree, root, &RESULTS_CONTAINER, "results container #rso")?;
        let unit = locate::require(&doc.tree, container, &RESULT_UNIT, "organic result unit in #rso")?;
        let prototype = dom::clone_subtree(&doc.tree, unit);

        dom::clear_children(&mut doc.tree, container);
        for item in sources.iter().take(MAX_RESULTS) {
            let mut unit = prototype.clone();
            let unit_root = unit.root().id();
            bind_result(&mut unit, unit_root, item);
            dom::append_subtree(&mut doc.tree, container, unit);
        }

        sanitize::disable_links(&mut doc.tree, root);
        Ok(serialize_document(&doc))
    }
}

/// Bind one source into a cloned result unit.
fn bind_result(unit: &mut Tree<Node>, root: NodeId, item: &SourceItem) {
    let url = item.source_url.trim();
    if !url.is_empty() {
        if let Some(inner) = locate::find_first(unit, root, &RESULT_INNER) {
            for id in dom::element_ids(unit, inner) {
                if dom::tag_name(unit, id).as_deref() == Some("a") {
                    dom::set_attr(unit, id, "href", url);
                }
            }
        }
    }

    let title = item.source_title.trim();
    if !title.is_empty() {
        if let Some(id) = locate::find_first(unit, root, &TITLE_NODE) {
            dom::set_text(unit, id, title);
        }
    }

    let display = item.display_name();
    if !display.is_empty() {
        for id in locate::find_all(unit, root, &SITE_NAME) {
            dom::set_text(unit, id, &display);
        }
        // The breadcrumb is rewritten before the cite because clearing it
        // drops the cite nodes nested inside it.
        if let Some(id) = locate::find_first(unit, root, &BREADCRUMB) {
            dom::set_text(unit, id, &display);
        }
        if let Some(id) = locate::find_first(unit, root, &CITE_NODE) {
            dom::set_text(unit, id, &display);
        }
    }

    let snippet = condense_snippet(&item.source_text);
    if !snippet.is_empty() {
        if let Some(id) = locate::find_first(unit, root, &SNIPPET_NODE) {
            dom::set_text(unit, id, &snippet);
        }
    }

    sanitize::strip_instrumentation(unit, root);
}
