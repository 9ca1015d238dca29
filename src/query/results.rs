// src/query/results.rs
// =============================================================================
// This module defines the lazy result model of the engine:
//
// - Value: the one item type flowing through result streams. Match and load
//   steps produce Element/Page values; projection produces Text/List values.
// - ResultSet: a lazy, ordered, single-pass pull sequence of values.
//
// Laziness is the point: a selector like "ul a@h1" over a page with fifty
// links fetches nothing until the caller pulls, and fetches page by page as
// results are consumed. Indexing into the stream only materializes as much
// as it needs.
//
// Single-pass contract: every chain operator takes the receiver by value
// and returns a new ResultSet. Nothing is mutated in place, and a consumed
// set is gone - these sequences are not restartable, exactly like the
// generator chains they model. The compiler enforces this through moves.
//
// Errors travel *inside* the stream as Err items: a bad rest-selector or a
// failing projection surfaces at the point the affected item is consumed,
// which is what lets everything upstream stay lazy.
//
// Rust concepts:
// - Box<dyn Iterator>: Type-erased lazy sequence, composed by adapters
// - Move semantics: Taking `self` by value enforces single-pass consumption
// =============================================================================

use scraper::Selector;
use std::fmt;
use std::iter;
use std::rc::Rc;

use crate::dom::{Document, DocumentExt, NodeHandle};
use crate::error::QueryError;

/// One item in a result stream.
#[derive(Debug, Clone)]
pub enum Value {
    /// A matched element, reached through its owning document.
    Element(NodeHandle),
    /// A document loaded by link-following.
    Page(Rc<Document>),
    /// A projected string (text content, tag name, attribute value, ...).
    Text(String),
    /// A projected tuple or list of sub-values.
    List(Vec<Value>),
}

impl Value {
    /// Short noun for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Element(_) => "element",
            Value::Page(_) => "document",
            Value::Text(_) => "text",
            Value::List(_) => "list",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // An element prints as its markup, a document as its address -
            // the most useful one-line rendering of each
            Value::Element(handle) => write!(f, "{}", handle.outer_html()),
            Value::Page(doc) => {
                if doc.address.is_empty() {
                    write!(f, "<document>")
                } else {
                    write!(f, "{}", doc.address)
                }
            }
            Value::Text(s) => write!(f, "{}", s),
            Value::List(values) => {
                write!(f, "(")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", value)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A lazy, ordered, single-pass sequence of values.
pub struct ResultSet {
    items: Box<dyn Iterator<Item = Result<Value, QueryError>>>,
}

impl ResultSet {
    /// Wraps any iterator of results into a ResultSet.
    pub fn from_iter<I>(items: I) -> Self
    where
        I: Iterator<Item = Result<Value, QueryError>> + 'static,
    {
        ResultSet {
            items: Box::new(items),
        }
    }

    /// Elementwise match: runs the CSS selector inside every element or
    /// document in the stream and flattens one level.
    ///
    /// The selector is validated eagerly (syntax errors surface here); the
    /// matching itself happens item by item as the stream is pulled.
    pub fn matches(self, css: &str) -> Result<ResultSet, QueryError> {
        // Validate once up front so a typo fails fast instead of per item
        Selector::parse(css).map_err(|e| QueryError::Selector {
            selector: css.to_string(),
            message: e.to_string(),
        })?;

        let css = css.to_string();
        Ok(ResultSet::from_iter(self.items.flat_map(
            move |item| -> Box<dyn Iterator<Item = Result<Value, QueryError>>> {
                match item {
                    Ok(Value::Element(handle)) => match handle.matches(&css) {
                        Ok(matched) => matched.items,
                        Err(e) => Box::new(iter::once(Err(e))),
                    },
                    Ok(Value::Page(doc)) => match doc.matches(&css) {
                        Ok(matched) => matched.items,
                        Err(e) => Box::new(iter::once(Err(e))),
                    },
                    Ok(other) => Box::new(iter::once(Err(QueryError::Projection(format!(
                        "cannot match into a {} value",
                        other.kind()
                    ))))),
                    Err(e) => Box::new(iter::once(Err(e))),
                }
            },
        )))
    }

    /// Elementwise link-following: every element is followed as a hyperlink
    /// (its owning document resolves and fetches the target), turning the
    /// stream from elements into documents.
    ///
    /// This is not a special case of match - it switches the item type.
    /// Documents already in the stream pass through unchanged. Fetching
    /// happens lazily, one page at a time, as the stream is pulled; targets
    /// already in the visited registry come back as empty documents.
    pub fn load(self) -> ResultSet {
        ResultSet::from_iter(self.items.map(|item| match item {
            Ok(Value::Element(handle)) => Ok(Value::Page(handle.follow())),
            Ok(page @ Value::Page(_)) => Ok(page),
            Ok(other) => Err(QueryError::Projection(format!(
                "cannot load a {} value",
                other.kind()
            ))),
            Err(e) => Err(e),
        }))
    }

    /// Consumes just enough of the stream to return the i-th item.
    pub fn index(self, i: usize) -> Option<Result<Value, QueryError>> {
        let mut items = self.items;
        items.nth(i)
    }

    /// A sub-range of the stream, still lazy.
    pub fn slice(self, start: usize, len: usize) -> ResultSet {
        ResultSet::from_iter(self.items.skip(start).take(len))
    }
}

impl Iterator for ResultSet {
    type Item = Result<Value, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.next()
    }
}

impl fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResultSet { .. }")
    }
}
