// src/fetch/address.rs
// =============================================================================
// This module resolves possibly-relative addresses against a base address.
//
// A page at https://example.com/list can link to other pages in several
// shapes, and each one resolves differently:
//
//   //cdn.example.com/x   -> https://cdn.example.com/x    (scheme-relative)
//   /about                -> https://example.com/about    (root-relative)
//   https://other.com     -> https://other.com            (already absolute)
//   next.html             -> https://example.com/next.html (path-relative)
//
// The rules are applied in that order; first match wins.
//
// Rust concepts:
// - &str vs String: We borrow the inputs and allocate only for the output
// - format!: String interpolation, like f-strings in Python
// =============================================================================

/// Resolves a raw address against a base (`scheme`, `base_address` where
/// `base_address` is `scheme://host[:port]`), returning an absolute address.
///
/// Known limitation: the path-relative rule joins directly onto the host
/// base, so `a/b.html` linked from a nested page like
/// `https://example.com/level1/index.html` resolves to
/// `https://example.com/a/b.html` rather than under `/level1/`. This is
/// intentional, preserved behavior - see the test below documenting it.
pub fn normalize(raw: &str, scheme: &str, base_address: &str) -> String {
    if let Some(rest) = raw.strip_prefix("//") {
        // Scheme-relative: inherit the scheme of the page that linked here
        format!("{}://{}", scheme, rest)
    } else if raw.starts_with('/') {
        // Root-relative: anchor at the host base
        format!("{}{}", base_address, raw)
    } else if raw.starts_with("http://") || raw.starts_with("https://") {
        // Already absolute
        raw.to_string()
    } else {
        // Path-relative (see limitation note above)
        format!("{}/{}", base_address, raw)
    }
}
