//! AI-answer page: the template's answer body is replaced with reflowed
//! answer markup and its source list is rebuilt from cloned cards.

use ego_tree::{NodeId, Tree};
use scraper::{Html, Node};

use crate::dom;
use crate::error::RenderError;
use crate::format::{self, condense_snippet};
use crate::input::SourceItem;
use crate::locate::{self, Pred};
use crate::render::bind_query;
use crate::sanitize;
use crate::serialize::serialize_document;
use crate::template;

/// Source cards shown per answer, matching the origin's carousel.
pub const MAX_SOURCE_CARDS: usize = 8;

const OVERVIEW_CONTAINER: Pred = Pred::any().with_id("eKIzJc");
const ANSWER_BODY: Pred = Pred::tag("div").with_classes(&["mZJni", "Dn7Fzd"]);
const SOURCES_LIST: Pred = Pred::tag("ul").with_classes(&["EJw9bc"]);
const SOURCE_CARD: Pred = Pred::tag("div").with_classes(&["MFrAxb"]);
const CARD_LINK: Pred = Pred::tag("a").with_classes(&["NDNGvf"]);

/// A validated answer-page template.
#[derive(Debug)]
pub struct AioPage {
    raw: String,
}

impl AioPage {
    pub fn new(raw: String) -> Result<Self, RenderError> {
        let doc = template::parse(&raw);
        let root = doc.tree.root().id();
        let container =
            locate::require(&doc.tree, root, &OVERVIEW_CONTAINER, "overview container #eKIzJc")?;
        locate::require(&doc.tree, container, &ANSWER_BODY, "answer body div.mZJni.Dn7Fzd")?;
        locate::require(&doc.tree, container, &SOURCES_LIST, "sources list ul.EJw9bc")?;
        locate::require(&doc.tree, container, &SOURCE_CARD, "source card div.MFrAxb")?;
        Ok(Self { raw })
    }

    pub fn render(
        &self,
        query: &str,
        answer_text: &str,
        sources: &[&SourceItem],
    ) -> Result<String, RenderError> {
        let mut doc = template::parse(&self.raw);
        bind_query(&mut doc, query);

        let root = doc.tree.root().id();
        let container =
            locate::require(&doc.tree, root, &OVERVIEW_CONTAINER, "overview container #eKIzJc")?;
        graft_answer(&mut doc, container, answer_text)?;
        rebuild_sources(&mut doc.tree, container, sources)?;

        sanitize::disable_links(&mut doc.tree, root);
        Ok(serialize_document(&doc))
    }
}

/// Replace the answer body's content with the reflowed answer markup.
fn graft_answer(doc: &mut Html, container: NodeId, answer_text: &str) -> Result<(), RenderError> {
    let body = locate::require(&doc.tree, container, &ANSWER_BODY, "answer body div.mZJni.Dn7Fzd")?;
    dom::clear_children(&mut doc.tree, body);

    let fragment_html = format::answer_fragment_html(answer_text);
    for mut block in dom::fragment_roots(&fragment_html) {
        let block_root = block.root().id();
        format::annotate_inherited_styles(&mut block, block_root);
        dom::append_subtree(&mut doc.tree, body, block);
    }
    Ok(())
}

fn rebuild_sources(
    tree: &mut Tree<Node>,
    container: NodeId,
    sources: &[&SourceItem],
) -> Result<(), RenderError> {
    let list = locate::require(tree, container, &SOURCES_LIST, "sources list ul.EJw9bc")?;
    let card_id = locate::require(tree, container, &SOURCE_CARD, "source card div.MFrAxb")?;
    // Clone the prototype before clearing the list in case it lives inside it.
    let prototype = dom::clone_subtree(tree, card_id);

    dom::clear_children(tree, list);
    for item in sources.iter().take(MAX_SOURCE_CARDS) {
        let mut card = prototype.clone();
        let card_root = card.root().id();
        bind_card(&mut card, card_root, item);

        let Some(li) = dom::fragment_roots("<li class=\"jydCyd\"></li>").into_iter().next() else {
            continue;
        };
        if let Some(li_id) = dom::append_subtree(tree, list, li) {
            dom::append_subtree(tree, li_id, card);
        }
    }
    Ok(())
}

/// Bind one source into a cloned card. The card's first three visible text
/// nodes are, in template order, the title, the snippet, and the site
/// name; each is replaced only when the record provides a value.
fn bind_card(card: &mut Tree<Node>, root: NodeId, item: &SourceItem) {
    sanitize::strip_instrumentation(card, root);

    let url = item.source_url.trim();
    if !url.is_empty() {
        if let Some(id) = locate::find_first(card, root, &CARD_LINK) {
            dom::set_attr(card, id, "href", url);
        }
    }

    let replacements = [
        item.source_title.trim().to_string(),
        condense_snippet(&item.source_text),
        item.display_name(),
    ];
    let text_ids = dom::text_node_ids(card, root);
    for (id, replacement) in text_ids.into_iter().zip(replacements.iter()) {
        if !replacement.is_empty() {
            dom::set_text_node(card, id, replacement);
        }
    }
}
