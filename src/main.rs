// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Initialize logging (warnings by default, everything with --debug)
// 3. Dispatch to the run or pipeline handler
// 4. Print each resulting value on its own line
// 5. Exit with proper code (0 = success, 1 = error)
//
// Transport faults never reach this level - the fetch layer absorbs them
// into empty documents so a crawl can continue past one bad page. What does
// reach this level (and exits nonzero) is a programmer fault: malformed CSS,
// a bad format expression, or a mis-ordered pipeline stage.
// =============================================================================

// Module declarations - tells Rust about our other source files
mod cli;       // src/cli.rs - command-line parsing
mod dom;       // src/dom/ - Document and element handles
mod error;     // src/error.rs - the QueryError taxonomy
mod fetch;     // src/fetch/ - crawl context, registry, address resolution
mod pipeline;  // src/pipeline/ - config-driven stage evaluation
mod query;     // src/query/ - selector compiler, engine, projection

use clap::Parser;
use cli::{Cli, Commands};

// anyhow::Result is like std::result::Result but simpler for applications
// It lets us return any error type with the ? operator
use anyhow::Result;

use dom::Document;
use fetch::CrawlContext;
use log::LevelFilter;

fn main() {
    // Run our application logic and capture the exit code
    let exit_code = match run() {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    std::process::exit(exit_code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            start_address,
            selector,
            debug,
        } => {
            init_logging(debug);
            handle_run(&start_address, &selector)
        }
        Commands::Pipeline { config_file, debug } => {
            init_logging(debug);
            handle_pipeline(&config_file)
        }
    }
}

// Configures env_logger: RUST_LOG still wins if set, --debug raises the
// default from warn to debug, and the HTML parser internals stay quiet.
fn init_logging(debug: bool) {
    let default_level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    env_logger::Builder::from_default_env()
        .filter_level(default_level)
        .filter_module("html5ever", LevelFilter::Error)
        .filter_module("selectors", LevelFilter::Error)
        .filter_module("reqwest", LevelFilter::Info)
        .init();
}

// Handles the 'run' subcommand: one selector against one start address.
fn handle_run(start_address: &str, selector: &str) -> Result<()> {
    // One crawl run = one context (session + visited registry)
    let ctx = CrawlContext::new();
    let doc = Document::fetch(start_address, ctx);

    // The result stream is lazy; pages are fetched and expressions
    // evaluated as we print. An Err item aborts the stream here and the
    // process exits nonzero.
    for item in query::run(&doc, selector)? {
        println!("{}", item?);
    }

    Ok(())
}

// Handles the 'pipeline' subcommand: evaluate a JSON config of stages and
// print the 'output' stage.
fn handle_pipeline(config_file: &str) -> Result<()> {
    for line in pipeline::run_file(config_file)? {
        println!("{}", line);
    }

    Ok(())
}
