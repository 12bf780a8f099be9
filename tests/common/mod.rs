#![allow(dead_code)]

use pxstat::cache::MemoryStore;
use pxstat::{CacheConfig, Error, Response, Result, Session, Transport};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const BASE: &str = "https://ws.cso.ie/public/api.restful";

pub fn fixture(name: &str) -> String {
    let path = format!("{}/tests/fixtures/{name}", env!("CARGO_MANIFEST_DIR"));
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {path}: {e}"))
}

/// Serves fixture files by URL and counts requests.
#[derive(Debug, Default)]
pub struct FixtureTransport {
    pub calls: AtomicUsize,
}

impl FixtureTransport {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transport for FixtureTransport {
    fn get(&self, url: &str) -> Result<Response> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = if url.ends_with("ReadCollection") {
            "collection.json"
        } else if url.contains("/CPM01/") {
            "cpm01.json"
        } else if url.contains("/LRM02/") {
            "lrm02.json"
        } else if url.contains("/VSA32/") {
            "vsa32.json"
        } else {
            return Ok(Response::ok(
                r#"{"jsonrpc":"2.0","error":{"code":-32600,"message":"Invalid matrix"},"id":null}"#,
            ));
        };
        if !url.starts_with(BASE) {
            return Err(Error::remote(url, Some(404), "unexpected host"));
        }
        Ok(Response::ok(fixture(name)))
    }
}

pub fn session() -> (Session, Arc<FixtureTransport>) {
    let transport = Arc::new(FixtureTransport::default());
    let session = Session::from_parts(
        BASE,
        transport.clone(),
        Arc::new(MemoryStore::new()),
        &CacheConfig::default(),
    );
    (session, transport)
}

pub fn assert_close(actual: Option<f64>, expected: f64) {
    let a = actual.unwrap_or_else(|| panic!("expected {expected}, got None"));
    assert!((a - expected).abs() < 1e-9, "expected {expected}, got {a}");
}
