// src/pipeline/mod.rs
// =============================================================================
// This module handles the config-driven pipeline mode: a JSON mapping of
// named stages, each applying a selector to the results of an earlier
// stage, evaluated in declaration order.
//
// This is orchestration glue around the query engine, not part of the
// engine itself.
// =============================================================================

mod stages;

pub use stages::run_file;
