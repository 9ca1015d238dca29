// src/query/mod.rs
// =============================================================================
// This module is the selector engine:
//
// Submodules:
// - compile: Splits a raw selector string into a SelectorProgram
// - results: The lazy Value/ResultSet stream model
// - engine:  Executes a program (match, follow, recurse, project)
// - project: The '%' format mini-expression evaluator
//
// The typical caller only needs `run`:
//
//     let doc = Document::fetch(address, ctx);
//     for value in query::run(&doc, "ul a@h1%.text")? { ... }
// =============================================================================

mod compile;
mod engine;
mod project;
mod results;

pub use compile::compile;
pub use engine::{run, run_on};
pub use results::{ResultSet, Value};
