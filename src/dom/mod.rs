// src/dom/mod.rs
// =============================================================================
// This module owns the document model:
//
// - Document: parsed tree + fetch metadata for one address
// - NodeHandle: a matched element, reached through its owning Document
//
// The underlying HTML parsing and CSS matching come from the scraper crate;
// nothing outside this module touches scraper types directly.
// =============================================================================

mod document;

pub use document::{Document, DocumentExt, NodeHandle};
