// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// We use the "derive" API which lets us define the CLI structure using
// Rust structs and attributes. Two subcommands:
//
//   pagepluck run https://example.com "ul.posts a@h1%.text"
//   pagepluck pipeline stages.json
//
// Rust concepts:
// - Derive macros: #[derive(Parser)] generates all the parsing code
// - Enums: One variant per subcommand
// =============================================================================

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "pagepluck",
    version = "0.1.0",
    about = "Extract structured data from web pages with compact selector expressions",
    long_about = "pagepluck fetches a page, applies a CSS-like selector, optionally follows \
                  matched links to fetch further pages, and optionally projects each match \
                  through a small format expression. Selector grammar: CSS ['@' REST] ['%' FORMAT]."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve one selector expression against a starting address
    ///
    /// Example: pagepluck run https://example.com "ul a@h1%.text"
    Run {
        /// Address of the page to start from
        start_address: String,

        /// Selector expression: CSS ['@' rest-selector] ['%' format-expr]
        selector: String,

        /// Enable debug logging (per-fetch and per-stage diagnostics on stderr)
        #[arg(long)]
        debug: bool,
    },

    /// Evaluate a JSON pipeline config of named selector stages
    ///
    /// Example: pagepluck pipeline stages.json
    Pipeline {
        /// Path to the JSON config file
        config_file: String,

        /// Enable debug logging (per-fetch and per-stage diagnostics on stderr)
        #[arg(long)]
        debug: bool,
    },
}
