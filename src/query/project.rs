// src/query/project.rs
// =============================================================================
// This module evaluates the optional '%' format clause of a selector
// against each matched item.
//
// The format clause is a deliberately tiny expression language, not a
// second DSL. It exists so selector authors can pull out attributes, text,
// or tuples without another compile pass:
//
//   li.item%.text                 text of each item
//   a%.attr("href")               an attribute of each item
//   a%item["href"]                same thing, index syntax
//   li%(.name, .text)             a tuple per item
//   li%(.text, result[0].text)    current item alongside the whole set
//
// A leading dot is sugar for the implicit binding `item`: before parsing,
// every '.' not preceded by an identifier character, digit, closing
// bracket, or quote is rewritten to 'item.'.
//
// The rewritten string is parsed into a restricted AST and evaluated with
// exactly two names in scope: `item` (the current value) and `result` (the
// whole set). The capability set is closed and enumerated below - there is
// no host-language eval anywhere near user input:
//
//   .text       concatenated text of an element / full text of a page
//   .name       tag name of an element
//   .address    address of a page
//   .attr("x")  attribute value (missing attribute is an error)
//   e["x"]      attribute value, index syntax
//   e[0]        positional index into a list (result[0], tuples)
//   (a, b)      tuple literal        [a, b]  list literal
//   "s" / 's'   string literal
//
// Evaluation is lazy, one item at a time, as the output is consumed. A
// failure for one item (unknown attribute, type mismatch) travels as an
// Err at that item's position and is fatal for the stream - it is not
// pre-validated and not recovered. The one exception to laziness: an
// expression that references `result` forces the set, since the whole
// sequence must exist to be bound.
// =============================================================================

use std::iter;

use crate::error::QueryError;
use crate::query::results::{ResultSet, Value};

/// Applies a format expression to every item of a result set.
///
/// `None` is the identity projection: the set passes through untouched.
pub fn project(results: ResultSet, expr: Option<&str>) -> Result<ResultSet, QueryError> {
    let Some(raw) = expr else {
        return Ok(results);
    };

    let rewritten = bind_item(raw);
    let ast = parse(&rewritten)?;

    if references_result(&ast) {
        // `result` names the whole sequence, so it has to exist before any
        // item is evaluated
        let collected: Result<Vec<Value>, QueryError> = results.collect();
        let collected = match collected {
            Ok(values) => values,
            // An upstream failure stays in-stream, surfacing on first pull
            Err(e) => return Ok(ResultSet::from_iter(iter::once(Err(e)))),
        };

        let whole = Value::List(collected.clone());
        Ok(ResultSet::from_iter(collected.into_iter().map(
            move |item| eval(&ast, &item, Some(&whole)),
        )))
    } else {
        Ok(ResultSet::from_iter(results.map(move |item| {
            let item = item?;
            eval(&ast, &item, None)
        })))
    }
}

/// Rewrites leading-dot member access to explicit access on `item`.
///
/// A dot is "leading" when the character immediately before it is not an
/// identifier character, digit, closing bracket, or quote. The very first
/// character of the expression counts as leading.
fn bind_item(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 8);
    let mut prev: Option<char> = None;

    for c in raw.chars() {
        if c == '.' {
            let glued = matches!(
                prev,
                Some(p) if p.is_alphanumeric() || p == '_' || p == ')' || p == ']' || p == '"' || p == '\''
            );
            if !glued {
                out.push_str("item");
            }
        }
        out.push(c);
        prev = Some(c);
    }

    out
}

// ---------------------------------------------------------------------------
// Restricted AST
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Ident(String),
    Str(String),
    Int(usize),
    Tuple(Vec<Expr>),
    ListLit(Vec<Expr>),
    Member(Box<Expr>, String),
    Call(Box<Expr>, String, Vec<Expr>),
    Index(Box<Expr>, Box<Expr>),
}

fn references_result(expr: &Expr) -> bool {
    match expr {
        Expr::Ident(name) => name == "result",
        Expr::Str(_) | Expr::Int(_) => false,
        Expr::Tuple(items) | Expr::ListLit(items) => items.iter().any(references_result),
        Expr::Member(base, _) => references_result(base),
        Expr::Call(base, _, args) => {
            references_result(base) || args.iter().any(references_result)
        }
        Expr::Index(base, idx) => references_result(base) || references_result(idx),
    }
}

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(usize),
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
}

fn tokenize(input: &str) -> Result<Vec<Token>, QueryError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' => {
                chars.next();
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Token::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Token::RBracket);
            }
            '"' | '\'' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some(ch) => s.push(ch),
                        None => {
                            return Err(QueryError::Projection(
                                "unterminated string literal".to_string(),
                            ))
                        }
                    }
                }
                tokens.push(Token::Str(s));
            }
            _ if c.is_ascii_digit() => {
                let mut n = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() {
                        n.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let parsed = n
                    .parse::<usize>()
                    .map_err(|_| QueryError::Projection(format!("bad number '{}'", n)))?;
                tokens.push(Token::Int(parsed));
            }
            _ if c.is_alphabetic() || c == '_' => {
                let mut s = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        s.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(s));
            }
            other => {
                return Err(QueryError::Projection(format!(
                    "unexpected character '{}' in expression",
                    other
                )))
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser (recursive descent)
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

fn parse(input: &str) -> Result<Expr, QueryError> {
    let mut parser = Parser {
        tokens: tokenize(input)?,
        pos: 0,
    };
    let expr = parser.parse_tuple()?;
    if parser.pos != parser.tokens.len() {
        return Err(QueryError::Projection(format!(
            "trailing input in expression '{}'",
            input
        )));
    }
    Ok(expr)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), QueryError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(QueryError::Projection(format!("expected {}", what)))
        }
    }

    // A top-level comma makes a tuple: ".name, .text"
    fn parse_tuple(&mut self) -> Result<Expr, QueryError> {
        let first = self.parse_postfix()?;
        if self.peek() != Some(&Token::Comma) {
            return Ok(first);
        }

        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            items.push(self.parse_postfix()?);
        }
        Ok(Expr::Tuple(items))
    }

    // Member access, calls, and indexing bind tighter than commas
    fn parse_postfix(&mut self) -> Result<Expr, QueryError> {
        let mut expr = self.parse_atom()?;

        loop {
            if self.eat(&Token::Dot) {
                let name = match self.peek().cloned() {
                    Some(Token::Ident(name)) => {
                        self.pos += 1;
                        name
                    }
                    _ => {
                        return Err(QueryError::Projection(
                            "expected a name after '.'".to_string(),
                        ))
                    }
                };
                if self.eat(&Token::LParen) {
                    let mut args = Vec::new();
                    if self.peek() != Some(&Token::RParen) {
                        args.push(self.parse_postfix()?);
                        while self.eat(&Token::Comma) {
                            args.push(self.parse_postfix()?);
                        }
                    }
                    self.expect(&Token::RParen, "')' after arguments")?;
                    expr = Expr::Call(Box::new(expr), name, args);
                } else {
                    expr = Expr::Member(Box::new(expr), name);
                }
            } else if self.eat(&Token::LBracket) {
                let idx = self.parse_postfix()?;
                self.expect(&Token::RBracket, "']' after index")?;
                expr = Expr::Index(Box::new(expr), Box::new(idx));
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, QueryError> {
        match self.peek().cloned() {
            Some(Token::Ident(name)) => {
                self.pos += 1;
                Ok(Expr::Ident(name))
            }
            Some(Token::Str(s)) => {
                self.pos += 1;
                Ok(Expr::Str(s))
            }
            Some(Token::Int(n)) => {
                self.pos += 1;
                Ok(Expr::Int(n))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.parse_tuple()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                self.pos += 1;
                let mut items = Vec::new();
                if self.peek() != Some(&Token::RBracket) {
                    items.push(self.parse_postfix()?);
                    while self.eat(&Token::Comma) {
                        items.push(self.parse_postfix()?);
                    }
                }
                self.expect(&Token::RBracket, "']'")?;
                Ok(Expr::ListLit(items))
            }
            _ => Err(QueryError::Projection(
                "expected a name, literal, or '('".to_string(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

// `whole` is Some exactly when the expression references `result`; see
// project() above.
fn eval(expr: &Expr, item: &Value, whole: Option<&Value>) -> Result<Value, QueryError> {
    match expr {
        Expr::Ident(name) => match name.as_str() {
            "item" => Ok(item.clone()),
            "result" => whole.cloned().ok_or_else(|| {
                QueryError::Projection("'result' is not available here".to_string())
            }),
            other => Err(QueryError::Projection(format!("unknown name '{}'", other))),
        },
        Expr::Str(s) => Ok(Value::Text(s.clone())),
        Expr::Int(n) => Err(QueryError::Projection(format!(
            "bare number {} is not a value",
            n
        ))),
        Expr::Tuple(items) | Expr::ListLit(items) => {
            let values: Result<Vec<Value>, QueryError> = items
                .iter()
                .map(|sub| eval(sub, item, whole))
                .collect();
            Ok(Value::List(values?))
        }
        Expr::Member(base, name) => {
            let base_val = eval(base, item, whole)?;
            match (&base_val, name.as_str()) {
                (Value::Element(handle), "text") => Ok(Value::Text(handle.text())),
                (Value::Element(handle), "name") => Ok(Value::Text(handle.tag_name())),
                (Value::Page(doc), "text") => Ok(Value::Text(doc.text())),
                (Value::Page(doc), "address") => Ok(Value::Text(doc.address.clone())),
                _ => Err(QueryError::Projection(format!(
                    "unknown member '.{}' on a {}",
                    name,
                    base_val.kind()
                ))),
            }
        }
        Expr::Call(base, method, args) => {
            let base_val = eval(base, item, whole)?;
            match (&base_val, method.as_str()) {
                (Value::Element(handle), "attr") => {
                    let name = single_string_arg(args, item, whole, "attr")?;
                    handle.attr(&name).map(Value::Text).ok_or_else(|| {
                        QueryError::Projection(format!("attribute '{}' not present", name))
                    })
                }
                _ => Err(QueryError::Projection(format!(
                    "unknown method '.{}()' on a {}",
                    method,
                    base_val.kind()
                ))),
            }
        }
        Expr::Index(base, idx) => {
            let base_val = eval(base, item, whole)?;
            // A literal integer indexes positionally; anything else must
            // evaluate to a string and names an attribute
            if let Expr::Int(n) = idx.as_ref() {
                match base_val {
                    Value::List(values) => values.get(*n).cloned().ok_or_else(|| {
                        QueryError::Projection(format!("index {} out of range", n))
                    }),
                    other => Err(QueryError::Projection(format!(
                        "cannot index a {} with a number",
                        other.kind()
                    ))),
                }
            } else {
                let key = match eval(idx, item, whole)? {
                    Value::Text(s) => s,
                    other => {
                        return Err(QueryError::Projection(format!(
                            "cannot index with a {}",
                            other.kind()
                        )))
                    }
                };
                match base_val {
                    Value::Element(handle) => {
                        handle.attr(&key).map(Value::Text).ok_or_else(|| {
                            QueryError::Projection(format!("attribute '{}' not present", key))
                        })
                    }
                    other => Err(QueryError::Projection(format!(
                        "cannot index a {} with a string",
                        other.kind()
                    ))),
                }
            }
        }
    }
}

fn single_string_arg(
    args: &[Expr],
    item: &Value,
    whole: Option<&Value>,
    method: &str,
) -> Result<String, QueryError> {
    if args.len() != 1 {
        return Err(QueryError::Projection(format!(
            ".{}() takes exactly one argument",
            method
        )));
    }
    match eval(&args[0], item, whole)? {
        Value::Text(s) => Ok(s),
        other => Err(QueryError::Projection(format!(
            ".{}() takes a string, got a {}",
            method,
            other.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, DocumentExt};

    const MARKUP: &str = r#"
        <li class="sup">Item 1</li>
        <li>Item 2</li>
        <li class="sup">Item 3</li>
        <a href="/one">first</a>
        <a>bare</a>
    "#;

    fn rendered(set: ResultSet) -> Vec<String> {
        set.map(|item| item.unwrap().to_string()).collect()
    }

    #[test]
    fn test_leading_dot_rewrite() {
        assert_eq!(bind_item(".text"), "item.text");
        assert_eq!(bind_item("item.text"), "item.text");
        assert_eq!(bind_item("(.name, .text)"), "(item.name, item.text)");
        assert_eq!(bind_item("result[0].text"), "result[0].text");
        assert_eq!(bind_item(".attr('href')"), "item.attr('href')");
    }

    #[test]
    fn test_identity_projection() {
        let doc = Document::from_markup(MARKUP);
        let set = project(doc.matches("li").unwrap(), None).unwrap();
        assert_eq!(set.count(), 3);
    }

    #[test]
    fn test_text_projection_in_document_order() {
        let doc = Document::from_markup(MARKUP);
        let set = project(doc.matches("li.sup").unwrap(), Some(".text")).unwrap();
        assert_eq!(rendered(set), vec!["Item 1", "Item 3"]);
    }

    #[test]
    fn test_tuple_projection() {
        let doc = Document::from_markup(MARKUP);
        let set = project(doc.matches("li.sup").unwrap(), Some("(.name, .text)")).unwrap();
        assert_eq!(rendered(set), vec!["(li, Item 1)", "(li, Item 3)"]);
    }

    #[test]
    fn test_attribute_by_method_and_index() {
        let doc = Document::from_markup(MARKUP);
        let by_method =
            project(doc.matches("a[href]").unwrap(), Some(".attr('href')")).unwrap();
        assert_eq!(rendered(by_method), vec!["/one"]);

        let doc = Document::from_markup(MARKUP);
        let by_index =
            project(doc.matches("a[href]").unwrap(), Some("item[\"href\"]")).unwrap();
        assert_eq!(rendered(by_index), vec!["/one"]);
    }

    // Both bindings are visible at once: each item is paired with a value
    // pulled out of the whole set
    #[test]
    fn test_item_and_result_together() {
        let doc = Document::from_markup(MARKUP);
        let set = project(
            doc.matches("li.sup").unwrap(),
            Some("(.text, result[0].text)"),
        )
        .unwrap();
        assert_eq!(rendered(set), vec!["(Item 1, Item 1)", "(Item 3, Item 1)"]);
    }

    // A failing item surfaces as an error at its own position; items before
    // it still come through
    #[test]
    fn test_failure_surfaces_at_consumption() {
        let doc = Document::from_markup(MARKUP);
        let mut set = project(doc.matches("a").unwrap(), Some(".attr('href')")).unwrap();
        assert_eq!(set.next().unwrap().unwrap().to_string(), "/one");
        assert!(matches!(set.next(), Some(Err(QueryError::Projection(_)))));
    }

    #[test]
    fn test_unknown_name_is_an_error() {
        let doc = Document::from_markup(MARKUP);
        let mut set = project(doc.matches("li").unwrap(), Some("other.text")).unwrap();
        assert!(matches!(set.next(), Some(Err(QueryError::Projection(_)))));
    }

    #[test]
    fn test_syntax_error_surfaces_eagerly() {
        let doc = Document::from_markup(MARKUP);
        let result = project(doc.matches("li").unwrap(), Some(".text +"));
        assert!(matches!(result, Err(QueryError::Projection(_))));
    }

    #[test]
    fn test_unknown_member_is_an_error() {
        let doc = Document::from_markup(MARKUP);
        let mut set = project(doc.matches("li").unwrap(), Some(".bogus")).unwrap();
        assert!(matches!(set.next(), Some(Err(QueryError::Projection(_)))));
    }
}
