// src/error.rs
// =============================================================================
// This module defines the error taxonomy for the query engine.
//
// There are two kinds of faults in this program and they are handled very
// differently:
//
// 1. Transport faults (timeouts, connection errors, HTTP >= 400):
//    These are NOT represented here. A multi-page crawl must be able to
//    continue past one bad page, so the fetch layer absorbs them into empty
//    documents and logs a warning (see src/fetch/context.rs).
//
// 2. Programmer faults (bad CSS syntax, bad projection expression, a
//    pipeline stage referencing an unknown input): these are surfaced
//    immediately as a QueryError and are fatal for that selector/stream.
//
// Rust concepts:
// - thiserror: Derive macro that generates Display and Error impls
// - Enums: Each variant is one failure mode, matched exhaustively by callers
// =============================================================================

use thiserror::Error;

/// Errors surfaced by selector compilation, matching, and projection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    /// The CSS fragment of a selector failed to parse.
    ///
    /// Raised at match time, not at compile time - the compiler only splits
    /// the selector string, it never validates the CSS part itself.
    #[error("invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// The projection (format) expression failed, either to parse or to
    /// evaluate against one item.
    ///
    /// Evaluation failures surface at the point the failing item is
    /// consumed, not up front.
    #[error("projection error: {0}")]
    Projection(String),

    /// A pipeline stage named an input stage that has not been evaluated.
    ///
    /// Stages run in declaration order with no dependency sort, so declaring
    /// a stage before its input is a user error.
    #[error("stage '{stage}' references unknown input '{input}'")]
    UnknownStage { stage: String, input: String },
}
