// src/query/engine.rs
// =============================================================================
// This module executes a compiled SelectorProgram against a document.
//
// Execution order, for a program compiled from CSS['@'REST]['%'FORMAT]:
//
// 1. Match CSS against the document.
// 2. If '@' was present, follow every matched link (the stream switches
//    from elements to documents). If REST is non-empty, compile-and-run it
//    recursively against each fetched document and flatten one level - REST
//    may itself contain '@' and '%', which is how a multi-hop crawl fits in
//    one selector string.
// 3. Apply the format projection last (identity when absent).
//
// Everything composes lazily: no page is fetched and no expression is
// evaluated until the caller pulls the output stream. Execution is strictly
// sequential, so output order always follows document order of the matches,
// page by page, regardless of fetch latency.
// =============================================================================

use std::iter;

use crate::dom::{Document, DocumentExt};
use crate::error::QueryError;
use crate::query::compile::{compile, SelectorProgram};
use crate::query::project::project;
use crate::query::results::{ResultSet, Value};
use std::rc::Rc;

/// Compiles and runs a raw selector string against a document.
pub fn run(doc: &Rc<Document>, raw: &str) -> Result<ResultSet, QueryError> {
    let program = compile(raw);
    let matched = doc.matches(&program.css)?;
    apply(matched, &program)
}

/// Runs an already-compiled program against one value (a document or an
/// element). Used by the recursion below and by pipeline stages, whose
/// inputs are the outputs of earlier stages.
pub fn run_on(value: &Value, program: &SelectorProgram) -> Result<ResultSet, QueryError> {
    let matched = match value {
        Value::Page(doc) => doc.matches(&program.css)?,
        Value::Element(handle) => handle.matches(&program.css)?,
        other => {
            return Err(QueryError::Projection(format!(
                "cannot select into a {} value",
                other.kind()
            )))
        }
    };
    apply(matched, program)
}

// Steps 2 and 3: link-following with optional recursion, then projection.
fn apply(matched: ResultSet, program: &SelectorProgram) -> Result<ResultSet, QueryError> {
    let mut results = matched;

    if program.follow {
        results = results.load();

        if let Some(rest) = program.rest.as_deref() {
            if !rest.is_empty() {
                let rest_program = compile(rest);
                results = ResultSet::from_iter(results.flat_map(
                    move |item| -> Box<dyn Iterator<Item = Result<Value, QueryError>>> {
                        match item {
                            Ok(page @ Value::Page(_)) => match run_on(&page, &rest_program) {
                                Ok(set) => Box::new(set),
                                Err(e) => Box::new(iter::once(Err(e))),
                            },
                            other => Box::new(iter::once(other)),
                        }
                    },
                ));
            }
        }
    }

    project(results, program.format.as_deref())
}
