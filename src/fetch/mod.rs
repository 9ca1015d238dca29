// src/fetch/mod.rs
// =============================================================================
// This module handles everything network-facing:
//
// Submodules:
// - context: The per-crawl shared state (HTTP session + visited registry)
// - address: Resolving relative addresses against a base address
//
// The rest of the engine never talks to reqwest directly - documents ask the
// CrawlContext to fetch for them, and the context enforces the dedup policy.
// =============================================================================

mod address;
mod context;

// Re-export the public API so callers write `fetch::normalize(...)` instead
// of reaching into submodules
pub use address::normalize;
pub use context::{CrawlContext, FetchOutcome};
