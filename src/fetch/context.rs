// src/fetch/context.rs
// =============================================================================
// This module owns the shared state of one crawl run:
//
// - The HTTP session (a reqwest blocking Client), reused across every fetch
//   of the run so connections get pooled.
// - The visited registry, a set of absolute addresses already fetched. An
//   address is registered at most once; a second fetch attempt is
//   short-circuited without touching the network. This is what keeps
//   link-following from looping forever on cyclic link graphs.
//
// One CrawlContext is created per crawl invocation and shared (via Rc) by
// every Document the crawl produces. It is deliberately single-threaded:
// Rc + RefCell instead of Arc + Mutex, because the engine pulls results
// lazily on one thread and fetches pages one at a time.
//
// Transport faults are absorbed here: a timeout, connection error, or
// unreadable body yields FetchOutcome::Failed plus a logged warning, never
// an error. A bad HTTP status (>= 400) is also only a warning - the body is
// still parsed and used.
//
// Rust concepts:
// - Rc<T>: Shared ownership without atomics (single-threaded)
// - RefCell<T>: Interior mutability, borrow-checked at runtime
// - HashSet: To track visited addresses (O(1) lookup)
// =============================================================================

use log::warn;
use reqwest::blocking::Client;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// The fixed identifying header sent with every request.
pub const USER_AGENT: &str = "Mozilla/5.0 (compatible; pagepluck/0.1)";

/// Upper bound on a single blocking fetch.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// The outcome of asking the context to fetch an address.
#[derive(Debug)]
pub enum FetchOutcome {
    /// A fresh fetch: the response body and how long the request took.
    Fetched { body: String, elapsed: Duration },
    /// The address was already in the registry; no request was made.
    /// This is loop prevention, not a failure.
    AlreadyVisited,
    /// Transport fault (timeout, connection error, unreadable body).
    /// Already logged; the caller builds an empty document from this.
    Failed,
}

/// Shared session + visited registry for one crawl run.
#[derive(Debug)]
pub struct CrawlContext {
    client: Client,
    visited: RefCell<HashSet<String>>,
}

impl CrawlContext {
    /// Creates a fresh context with its own session and empty registry.
    pub fn new() -> Rc<Self> {
        // The client settings are fixed for the life of the run
        let client = Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Rc::new(Self {
            client,
            visited: RefCell::new(HashSet::new()),
        })
    }

    /// Fetches an absolute address, honoring the visited registry.
    ///
    /// The address is registered *before* the request goes out, so even a
    /// failed fetch is never retried within this run.
    pub fn fetch(&self, address: &str) -> FetchOutcome {
        if !self.visited.borrow_mut().insert(address.to_string()) {
            return FetchOutcome::AlreadyVisited;
        }

        let started = Instant::now();

        let response = match self.client.get(address).send() {
            Ok(response) => response,
            Err(e) => {
                warn!("fetch failed for {}: {}", address, e);
                return FetchOutcome::Failed;
            }
        };

        // A bad status is worth flagging, but the body is still usable -
        // plenty of sites serve meaningful markup on a 404 page
        let status = response.status();
        if status.as_u16() >= 400 {
            warn!("HTTP {} for {}", status.as_u16(), address);
        }

        match response.text() {
            Ok(body) => FetchOutcome::Fetched {
                body,
                elapsed: started.elapsed(),
            },
            Err(e) => {
                warn!("unreadable response body for {}: {}", address, e);
                FetchOutcome::Failed
            }
        }
    }

    /// True if the address has already been fetched (or attempted) this run.
    pub fn was_visited(&self, address: &str) -> bool {
        self.visited.borrow().contains(address)
    }

    /// Number of distinct addresses fetched (or attempted) this run.
    pub fn visited_count(&self) -> usize {
        self.visited.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // Spins up a local server that answers every request with `body` and
    // counts how many requests it saw. Returns (base_address, hit_counter).
    fn serve(body: &'static str) -> (String, Arc<AtomicUsize>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_inner = Arc::clone(&hits);

        std::thread::spawn(move || {
            for request in server.incoming_requests() {
                hits_inner.fetch_add(1, Ordering::SeqCst);
                let _ = request.respond(tiny_http::Response::from_string(body));
            }
        });

        (format!("http://127.0.0.1:{}", port), hits)
    }

    #[test]
    fn test_fetch_returns_body() {
        let (base, _hits) = serve("<p>hello</p>");
        let ctx = CrawlContext::new();

        match ctx.fetch(&base) {
            FetchOutcome::Fetched { body, .. } => assert!(body.contains("hello")),
            other => panic!("expected Fetched, got {:?}", other),
        }
    }

    // Fetching the same address twice must make exactly one network call;
    // the second attempt is short-circuited by the registry.
    #[test]
    fn test_second_fetch_is_short_circuited() {
        let (base, hits) = serve("<p>once</p>");
        let ctx = CrawlContext::new();

        assert!(matches!(ctx.fetch(&base), FetchOutcome::Fetched { .. }));
        assert!(matches!(ctx.fetch(&base), FetchOutcome::AlreadyVisited));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.visited_count(), 1);
        assert!(ctx.was_visited(&base));
    }

    // A transport fault is absorbed, but the address is still registered so
    // it will not be retried within this run.
    #[test]
    fn test_failed_fetch_is_registered() {
        let ctx = CrawlContext::new();
        // Port 9 (discard) is not listening; connection is refused quickly
        let dead = "http://127.0.0.1:9/nothing";

        assert!(matches!(ctx.fetch(dead), FetchOutcome::Failed));
        assert!(matches!(ctx.fetch(dead), FetchOutcome::AlreadyVisited));
    }

    // Two contexts are independent: each has its own registry, so the same
    // address can be fetched once per context.
    #[test]
    fn test_contexts_are_independent() {
        let (base, hits) = serve("<p>twice</p>");

        let first = CrawlContext::new();
        let second = CrawlContext::new();
        assert!(matches!(first.fetch(&base), FetchOutcome::Fetched { .. }));
        assert!(matches!(second.fetch(&base), FetchOutcome::Fetched { .. }));

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
