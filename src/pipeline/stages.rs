// src/pipeline/stages.rs
// =============================================================================
// This module evaluates a config-driven pipeline of selector stages.
//
// The config file is a JSON object mapping stage names to definitions:
//
//     {
//       "start": "https://example.com/",
//       "links":  { "in": "start", "select": "ul.posts a@" },
//       "output": { "in": "links", "select": "h1%.text" }
//     }
//
// - "start" is special: its value is the address of the initial fetch.
// - Every other entry runs its selector against the results of the stage
//   named by "in".
// - Stages are evaluated in declaration order - there is no dependency
//   sort. Referencing a stage that has not been evaluated yet is a user
//   error, surfaced as a lookup failure at run time.
// - The results of the stage named "output" are what the caller prints.
//
// Each stage is materialized into a Vec so later stages can consume it;
// laziness lives inside a stage's evaluation, not between stages.
//
// Rust concepts:
// - serde derive: StageSpec deserializes straight out of the JSON object
// - serde_json with preserve_order: The map iterates in declaration order
// =============================================================================

use anyhow::{Context, Result};
use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value as Json};
use std::collections::HashMap;
use std::fs;

use crate::dom::Document;
use crate::error::QueryError;
use crate::fetch::CrawlContext;
use crate::query::{self, Value};

/// One stage definition: run `select` against the results of stage `in`.
#[derive(Debug, Deserialize)]
pub struct StageSpec {
    #[serde(rename = "in")]
    pub input: String,
    pub select: String,
}

/// Loads a config file and evaluates it, returning the rendered values of
/// the `output` stage.
pub fn run_file(path: &str) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("cannot read config file '{}'", path))?;
    let config: Map<String, Json> =
        serde_json::from_str(&raw).context("config file is not a JSON object")?;
    run_config(&config)
}

/// Evaluates a parsed pipeline config in declaration order.
pub fn run_config(config: &Map<String, Json>) -> Result<Vec<String>> {
    let start_address = config
        .get("start")
        .and_then(Json::as_str)
        .context("config needs a 'start' address")?;

    // One crawl run: every stage shares this session and registry
    let ctx = CrawlContext::new();
    let mut stages: HashMap<String, Vec<Value>> = HashMap::new();
    stages.insert(
        "start".to_string(),
        vec![Value::Page(Document::fetch(start_address, ctx))],
    );

    for (name, entry) in config {
        // Entries that are not objects ("start" itself, or scalar extras)
        // are not stages
        let Some(object) = entry.as_object() else {
            continue;
        };
        let spec: StageSpec = serde_json::from_value(Json::Object(object.clone()))
            .with_context(|| format!("stage '{}' is malformed", name))?;

        debug!("stage {} = {} {}", name, spec.input, spec.select);

        let inputs: Vec<Value> = stages.get(&spec.input).cloned().ok_or_else(|| {
            QueryError::UnknownStage {
                stage: name.clone(),
                input: spec.input.clone(),
            }
        })?;

        let program = query::compile(&spec.select);
        let mut values = Vec::new();
        for input in &inputs {
            for item in query::run_on(input, &program)? {
                values.push(item?);
            }
        }
        stages.insert(name.clone(), values);
    }

    Ok(stages
        .get("output")
        .map(|values| values.iter().map(|v| v.to_string()).collect())
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn serve(routes: &[(&'static str, &'static str)]) -> String {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let routes: HashMap<String, String> = routes
            .iter()
            .map(|(path, body)| (path.to_string(), body.to_string()))
            .collect();

        std::thread::spawn(move || {
            for request in server.incoming_requests() {
                let body = routes.get(request.url()).cloned().unwrap_or_default();
                let _ = request.respond(tiny_http::Response::from_string(body));
            }
        });

        format!("http://127.0.0.1:{}", port)
    }

    #[test]
    fn test_stages_run_in_declaration_order() {
        let base = serve(&[
            ("/", r#"<ul class="posts"><a href="/p1">one</a></ul>"#),
            ("/p1", "<h1>Post One</h1>"),
        ]);

        let config = json!({
            "start": base,
            "pages": { "in": "start", "select": "ul.posts a@" },
            "output": { "in": "pages", "select": "h1%.text" }
        });

        let lines = run_config(config.as_object().unwrap()).unwrap();
        assert_eq!(lines, vec!["Post One"]);
    }

    #[test]
    fn test_stage_before_its_input_is_an_error() {
        let base = serve(&[("/", "<p>hi</p>")]);

        // "output" names "pages", which is declared after it
        let config = json!({
            "start": base,
            "output": { "in": "pages", "select": "p%.text" },
            "pages": { "in": "start", "select": "p" }
        });

        let err = run_config(config.as_object().unwrap()).unwrap_err();
        let query_err = err.downcast::<QueryError>().unwrap();
        assert_eq!(
            query_err,
            QueryError::UnknownStage {
                stage: "output".to_string(),
                input: "pages".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_output_stage_prints_nothing() {
        let base = serve(&[("/", "<p>hi</p>")]);

        let config = json!({
            "start": base,
            "pages": { "in": "start", "select": "p%.text" }
        });

        let lines = run_config(config.as_object().unwrap()).unwrap();
        assert!(lines.is_empty());
    }

    #[test]
    fn test_missing_start_is_an_error() {
        let config = json!({
            "output": { "in": "start", "select": "p" }
        });
        assert!(run_config(config.as_object().unwrap()).is_err());
    }
}
