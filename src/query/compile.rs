// src/query/compile.rs
// =============================================================================
// This module compiles a raw selector string into a SelectorProgram.
//
// The selector mini-grammar is:
//
//     raw := CSS ('@' REST)? ('%' FORMAT)?
//
//   "li.item"            match list items
//   "ul a@"              match links, then follow them
//   "ul a@h1"            follow links, then match h1 on each fetched page
//   "li.item%.text"      match list items, emit each one's text
//   "ul a@h1%.text"      follow links, match h1, emit text
//
// The splitting order is load-bearing and must not be reordered:
//
// 1. FORMAT is split off first, at the *rightmost* '%' of the entire raw
//    string. Splitting rightmost means a '%' inside the rest-selector stays
//    with the rest-selector (so a nested program can carry its own format).
//    A literal '%' inside a CSS attribute selector still breaks on this
//    ambiguity - that is a known limitation of the grammar, not something
//    to paper over here.
// 2. The remainder splits at the *leftmost* '@': CSS before, rest-selector
//    after (possibly empty - "a@" means "follow, nothing further").
//
// Splitting cannot fail, so compile is infallible; malformed CSS only
// surfaces later, at match time.
//
// Rust concepts:
// - rfind/find: Rightmost/leftmost byte-position search on &str
// - Option<String>: Absent clauses are None, an empty rest is Some("")
// =============================================================================

/// Compiled form of one selector string. Purely a parse artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorProgram {
    /// The CSS fragment run against the current document.
    pub css: String,
    /// True if the matched elements should be followed as hyperlinks.
    pub follow: bool,
    /// Selector to run against each followed page; None when there was no
    /// '@', Some("") when '@' was present with nothing after it.
    pub rest: Option<String>,
    /// Projection expression, split at the rightmost '%'.
    pub format: Option<String>,
}

/// Parses a raw selector string. Never fails - see the module notes on
/// where CSS errors surface instead.
pub fn compile(raw: &str) -> SelectorProgram {
    // Step 1: rightmost '%' over the whole raw string
    let (head, format) = match raw.rfind('%') {
        Some(pos) => (&raw[..pos], Some(raw[pos + 1..].to_string())),
        None => (raw, None),
    };

    // Step 2: leftmost '@' on what is left
    let (css, follow, rest) = match head.find('@') {
        Some(pos) => (
            head[..pos].to_string(),
            true,
            Some(head[pos + 1..].to_string()),
        ),
        None => (head.to_string(), false, None),
    };

    SelectorProgram {
        css,
        follow,
        rest,
        format,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_css() {
        let program = compile("ul.c1 li");
        assert_eq!(program.css, "ul.c1 li");
        assert!(!program.follow);
        assert_eq!(program.rest, None);
        assert_eq!(program.format, None);
    }

    #[test]
    fn test_follow_with_empty_rest() {
        let program = compile("ul.c2 a@");
        assert_eq!(program.css, "ul.c2 a");
        assert!(program.follow);
        assert_eq!(program.rest.as_deref(), Some(""));
        assert_eq!(program.format, None);
    }

    #[test]
    fn test_format_only() {
        let program = compile("li.sup%.text");
        assert_eq!(program.css, "li.sup");
        assert!(!program.follow);
        assert_eq!(program.format.as_deref(), Some(".text"));
    }

    // '%' splits before '@': "a@rest%expr" must come apart into exactly
    // css="a", rest="rest", format="expr"
    #[test]
    fn test_format_splits_before_follow() {
        let program = compile("a@rest%expr");
        assert_eq!(program.css, "a");
        assert!(program.follow);
        assert_eq!(program.rest.as_deref(), Some("rest"));
        assert_eq!(program.format.as_deref(), Some("expr"));
    }

    // Rightmost '%' wins, so an earlier '%' stays with the rest-selector
    // and is available to a nested compile
    #[test]
    fn test_rightmost_format_split() {
        let program = compile("a@h1%.name%.text");
        assert_eq!(program.css, "a");
        assert_eq!(program.rest.as_deref(), Some("h1%.name"));
        assert_eq!(program.format.as_deref(), Some(".text"));

        let nested = compile(program.rest.as_deref().unwrap());
        assert_eq!(nested.css, "h1");
        assert_eq!(nested.format.as_deref(), Some(".name"));
    }

    // Only the leftmost '@' splits; later ones belong to the rest-selector
    #[test]
    fn test_leftmost_follow_split() {
        let program = compile("ul a@div a@");
        assert_eq!(program.css, "ul a");
        assert_eq!(program.rest.as_deref(), Some("div a@"));
    }

    // Compiling the same string twice yields structurally identical programs
    #[test]
    fn test_compile_is_idempotent() {
        assert_eq!(compile("ul a@h1%.text"), compile("ul a@h1%.text"));
        assert_eq!(compile("li.sup"), compile("li.sup"));
    }
}
