// src/dom/document.rs
// =============================================================================
// This module defines Document: the parsed tree plus fetch metadata for one
// address.
//
// A Document *has* a scraper::Html tree (composition, not inheritance) and
// exposes only the matching operations the engine needs. It also carries:
// - its absolute address, plus the scheme and base (scheme://host) derived
//   from it, used to resolve relative links found on the page
// - an Rc to the CrawlContext of the run that produced it, so documents it
//   spawns via link-following share the same session and visited registry
// - the fetch elapsed time, when the document came off the network
//
// Documents are created two ways:
// - Document::fetch: network path, honoring the visited registry. A dedup
//   hit or a transport fault yields an *empty* document, never an error -
//   a multi-page crawl keeps going past one bad page.
// - Document::from_markup: direct construction from a string, no I/O.
//   Used by tests and by callers that already have markup in hand.
//
// Matched elements are handed out as NodeHandle values: an Rc to the owning
// Document plus a node id into its tree. Re-resolving the id on demand
// avoids tying element lifetimes to a borrow of the tree, which is what
// lets result sets own documents created lazily mid-stream.
//
// Rust concepts:
// - Rc<T>: Documents are shared by handles and result sets
// - Composition over inheritance: Document has-a Html, not is-a
// =============================================================================

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use std::rc::Rc;
use std::time::Duration;
use url::{Position, Url};

use crate::error::QueryError;
use crate::fetch::{self, CrawlContext, FetchOutcome};
use crate::query::{ResultSet, Value};

/// Parsed tree plus fetch metadata for one address.
#[derive(Debug)]
pub struct Document {
    /// Absolute address this document was fetched from (empty for markup
    /// documents).
    pub address: String,
    /// Scheme of the address, e.g. "https".
    pub scheme: String,
    /// scheme://host[:port] of the address; relative links resolve against
    /// this.
    pub base_address: String,
    /// How long the fetch took, when this document came off the network.
    pub elapsed: Option<Duration>,
    html: Html,
    ctx: Rc<CrawlContext>,
}

impl Document {
    /// Fetches an address into a Document, reusing the given context's
    /// session and registry.
    ///
    /// An address already in the registry, or one that fails to fetch,
    /// yields an empty document - match operations on it simply produce
    /// nothing, and the crawl continues.
    pub fn fetch(address: &str, ctx: Rc<CrawlContext>) -> Rc<Document> {
        let outcome = ctx.fetch(address);
        match outcome {
            FetchOutcome::Fetched { body, elapsed } => {
                Rc::new(Document::build(address, &body, ctx, Some(elapsed)))
            }
            // Dedup hit or transport fault: an empty tree, no error
            FetchOutcome::AlreadyVisited | FetchOutcome::Failed => {
                Rc::new(Document::build(address, "", ctx, None))
            }
        }
    }

    /// Builds a Document from markup directly, with no network I/O.
    ///
    /// The document gets a fresh context of its own; link-following from it
    /// starts a new crawl run.
    pub fn from_markup(markup: &str) -> Rc<Document> {
        Rc::new(Document::build("", markup, CrawlContext::new(), None))
    }

    fn build(
        address: &str,
        markup: &str,
        ctx: Rc<CrawlContext>,
        elapsed: Option<Duration>,
    ) -> Document {
        // Scheme and base come from the address when it parses as an
        // absolute URL; markup documents have neither
        let (scheme, base_address) = match Url::parse(address) {
            Ok(parsed) if parsed.has_host() => (
                parsed.scheme().to_string(),
                parsed[..Position::BeforePath].to_string(),
            ),
            _ => (String::new(), String::new()),
        };

        Document {
            address: address.to_string(),
            scheme,
            base_address,
            elapsed,
            html: Html::parse_document(markup),
            ctx,
        }
    }

    /// Concatenated text of the whole document.
    pub fn text(&self) -> String {
        self.html.root_element().text().collect()
    }
}

/// Operations that hand out handles into a shared document, so they live on
/// `Rc<Document>` rather than on `Document` itself - a matched element keeps
/// its owning document alive.
pub trait DocumentExt {
    /// Runs a CSS selector against this document's tree.
    ///
    /// The selector is parsed eagerly - malformed CSS surfaces here as
    /// `QueryError::Selector` - but the matched elements are streamed
    /// lazily, in document order.
    fn matches(&self, css: &str) -> Result<ResultSet, QueryError>;

    /// Resolves a raw (possibly relative) address against this document and
    /// fetches it with this document's session and registry.
    fn load_address(&self, raw: &str) -> Rc<Document>;
}

impl DocumentExt for Rc<Document> {
    fn matches(&self, css: &str) -> Result<ResultSet, QueryError> {
        let selector = parse_selector(css)?;
        let ids: Vec<NodeId> = self.html.select(&selector).map(|el| el.id()).collect();

        let doc = Rc::clone(self);
        Ok(ResultSet::from_iter(ids.into_iter().map(move |id| {
            Ok(Value::Element(NodeHandle {
                doc: Rc::clone(&doc),
                id,
            }))
        })))
    }

    fn load_address(&self, raw: &str) -> Rc<Document> {
        let absolute = fetch::normalize(raw, &self.scheme, &self.base_address);
        Document::fetch(&absolute, Rc::clone(&self.ctx))
    }
}

/// A matched element, reached through its owning Document.
///
/// Holds the document by Rc and a node id into its tree; the element itself
/// is re-resolved on each access.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    pub doc: Rc<Document>,
    id: NodeId,
}

impl NodeHandle {
    fn element(&self) -> Option<ElementRef<'_>> {
        self.doc.html.tree.get(self.id).and_then(ElementRef::wrap)
    }

    /// Concatenated text content of this element.
    pub fn text(&self) -> String {
        self.element()
            .map(|el| el.text().collect())
            .unwrap_or_default()
    }

    /// Tag name, e.g. "a" or "li".
    pub fn tag_name(&self) -> String {
        self.element()
            .map(|el| el.value().name().to_string())
            .unwrap_or_default()
    }

    /// Value of an attribute, if present.
    pub fn attr(&self, name: &str) -> Option<String> {
        self.element()
            .and_then(|el| el.value().attr(name).map(str::to_string))
    }

    /// Outer HTML of this element.
    pub fn outer_html(&self) -> String {
        self.element().map(|el| el.html()).unwrap_or_default()
    }

    /// Runs a CSS selector against this element's subtree (descendants
    /// only, element itself excluded).
    pub fn matches(&self, css: &str) -> Result<ResultSet, QueryError> {
        let selector = parse_selector(css)?;
        let ids: Vec<NodeId> = match self.element() {
            Some(el) => el.select(&selector).map(|m| m.id()).collect(),
            None => Vec::new(),
        };

        let doc = Rc::clone(&self.doc);
        Ok(ResultSet::from_iter(ids.into_iter().map(move |id| {
            Ok(Value::Element(NodeHandle {
                doc: Rc::clone(&doc),
                id,
            }))
        })))
    }

    /// Follows this element as a hyperlink: its href attribute if it has
    /// one, otherwise its text content taken as a literal address.
    pub fn follow(&self) -> Rc<Document> {
        let target = match self.attr("href") {
            Some(href) => href,
            None => self.text().trim().to_string(),
        };
        self.doc.load_address(&target)
    }
}

fn parse_selector(css: &str) -> Result<Selector, QueryError> {
    Selector::parse(css).map_err(|e| QueryError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKUP: &str = r#"
        <ul class="c1">
          <li class="sup">Item 1</li>
          <li>Item 2</li>
          <li class="sup">Item 3</li>
        </ul>
        <a href="/next">Next</a>
    "#;

    #[test]
    fn test_match_streams_in_document_order() {
        let doc = Document::from_markup(MARKUP);
        let texts: Vec<String> = doc
            .matches("li")
            .unwrap()
            .map(|item| match item.unwrap() {
                Value::Element(h) => h.text(),
                other => panic!("expected element, got {:?}", other),
            })
            .collect();
        assert_eq!(texts, vec!["Item 1", "Item 2", "Item 3"]);
    }

    #[test]
    fn test_class_selector() {
        let doc = Document::from_markup(MARKUP);
        let matched: Vec<_> = doc.matches("li.sup").unwrap().collect();
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn test_malformed_css_is_a_selector_error() {
        let doc = Document::from_markup(MARKUP);
        match doc.matches("li..") {
            Err(QueryError::Selector { selector, .. }) => assert_eq!(selector, "li.."),
            other => panic!("expected selector error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_node_accessors() {
        let doc = Document::from_markup(MARKUP);
        let item = doc.matches("a").unwrap().next().unwrap().unwrap();
        let Value::Element(link) = item else {
            panic!("expected element");
        };
        assert_eq!(link.tag_name(), "a");
        assert_eq!(link.text(), "Next");
        assert_eq!(link.attr("href").as_deref(), Some("/next"));
        assert_eq!(link.attr("title"), None);
    }

    #[test]
    fn test_subtree_match_excludes_self() {
        let doc = Document::from_markup(MARKUP);
        let item = doc.matches("ul.c1").unwrap().next().unwrap().unwrap();
        let Value::Element(list) = item else {
            panic!("expected element");
        };
        assert_eq!(list.matches("li").unwrap().count(), 3);
        assert_eq!(list.matches("ul").unwrap().count(), 0);
    }

    #[test]
    fn test_base_derivation_from_address() {
        // Empty body is fine for checking address bookkeeping; the fetch
        // itself fails fast (nothing listens on port 9) and is absorbed
        let ctx = CrawlContext::new();
        let doc = Document::fetch("http://127.0.0.1:9/a/b?q=1", ctx);
        assert_eq!(doc.scheme, "http");
        assert_eq!(doc.base_address, "http://127.0.0.1:9");
        assert_eq!(doc.address, "http://127.0.0.1:9/a/b?q=1");
    }

    #[test]
    fn test_markup_document_has_no_base() {
        let doc = Document::from_markup(MARKUP);
        assert_eq!(doc.scheme, "");
        assert_eq!(doc.base_address, "");
        assert!(doc.elapsed.is_none());
    }

    #[test]
    fn test_empty_document_matches_nothing() {
        let ctx = CrawlContext::new();
        let doc = Document::fetch("http://127.0.0.1:9/dead", ctx);
        assert_eq!(doc.matches("a").unwrap().count(), 0);
    }
}
