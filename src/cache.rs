//! Response caching.
//!
//! [`CachedFetcher`] sits in front of a [`Transport`] and answers repeated
//! requests from a [`CacheStore`] while the stored copy is fresh. Stores are
//! plain key/value maps; expiry is decided here from [`CacheConfig`] and the
//! response's `Cache-Control` header.

use crate::config::{CacheBackend, CacheConfig};
use crate::error::{Error, Result};
use crate::transport::{Response, Transport};
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// One cached response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub stored_at: DateTime<Utc>,
    /// `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
    pub payload: String,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|t| now < t)
    }
}

/// Key/value storage for cached responses.
pub trait CacheStore: Send + Sync + fmt::Debug {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>>;
    fn put(&self, entry: CacheEntry) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<AHashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(map.get(key).cloned())
    }

    fn put(&self, entry: CacheEntry) -> Result<()> {
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        map.insert(entry.key.clone(), entry);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }
}

// Keep -, _ and . readable in file names; everything else is escaped.
const FILE_SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Use (and create if needed) `dir`.
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| Error::cache(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let name = percent_encoding::utf8_percent_encode(key, FILE_SAFE).to_string();
        self.dir.join(format!("{name}.json"))
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.path_for(key);
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::cache(path, e)),
        };
        match serde_json::from_str::<CacheEntry>(&text) {
            Ok(entry) if entry.key == key => Ok(Some(entry)),
            Ok(_) => Ok(None),
            Err(e) => {
                log::warn!("ignoring corrupt cache entry {}: {e}", path.display());
                Ok(None)
            }
        }
    }

    fn put(&self, entry: CacheEntry) -> Result<()> {
        let path = self.path_for(&entry.key);
        let text = serde_json::to_string(&entry)
            .map_err(|e| Error::cache(&path, std::io::Error::other(e)))?;
        std::fs::write(&path, text).map_err(|e| Error::cache(path, e))
    }

    fn clear(&self) -> Result<()> {
        let rd = std::fs::read_dir(&self.dir).map_err(|e| Error::cache(&self.dir, e))?;
        for item in rd {
            let item = item.map_err(|e| Error::cache(&self.dir, e))?;
            let path = item.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                std::fs::remove_file(&path).map_err(|e| Error::cache(path, e))?;
            }
        }
        Ok(())
    }
}

/// Store that never holds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoStore;

impl CacheStore for NoStore {
    fn get(&self, _key: &str) -> Result<Option<CacheEntry>> {
        Ok(None)
    }

    fn put(&self, _entry: CacheEntry) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }
}

/// Build the store selected by `backend`.
pub fn open_store(backend: &CacheBackend) -> Result<Arc<dyn CacheStore>> {
    Ok(match backend {
        CacheBackend::Memory => Arc::new(MemoryStore::new()),
        CacheBackend::File { path } => {
            Arc::new(FileStore::new(CacheBackend::resolved_dir(path.as_deref()))?)
        }
        CacheBackend::Disabled => Arc::new(NoStore),
    })
}

/// Result of [`CachedFetcher::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub payload: String,
    pub was_cached: bool,
}

/// Directives we act on from a `Cache-Control` header.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Directives {
    no_store: bool,
    max_age: Option<u64>,
}

fn parse_cache_control(header: &str) -> Directives {
    let mut d = Directives::default();
    for part in header.split(',') {
        let part = part.trim().to_ascii_lowercase();
        if part == "no-store" || part == "no-cache" {
            d.no_store = true;
        } else if let Some(v) = part.strip_prefix("max-age=") {
            d.max_age = v.trim_matches('"').parse().ok();
        }
    }
    d
}

/// Transport plus cache store.
#[derive(Debug, Clone)]
pub struct CachedFetcher {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CacheStore>,
    expire_after: Option<Duration>,
    respect_cache_control: bool,
}

impl CachedFetcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<dyn CacheStore>,
        config: &CacheConfig,
    ) -> Self {
        Self {
            transport,
            store,
            expire_after: config.expire_after,
            respect_cache_control: config.respect_cache_control,
        }
    }

    /// Return the payload for `key` (a URL), from cache when fresh.
    ///
    /// ### Errors
    /// - `Transport` when no response was obtained
    /// - `Remote` for non-success statuses (never cached)
    /// - `Cache` when the store fails
    pub fn fetch(&self, key: &str) -> Result<Fetched> {
        let now = Utc::now();
        if let Some(entry) = self.store.get(key)? {
            if entry.is_fresh(now) {
                log::debug!("cache hit: {key}");
                return Ok(Fetched {
                    payload: entry.payload,
                    was_cached: true,
                });
            }
            log::debug!("cache entry stale: {key}");
        } else {
            log::debug!("cache miss: {key}");
        }

        let resp = self.transport.get(key)?;
        if !resp.is_success() {
            return Err(Error::remote(key, Some(resp.status), excerpt(&resp.body)));
        }
        self.store_response(key, &resp, now)?;
        Ok(Fetched {
            payload: resp.body,
            was_cached: false,
        })
    }

    /// Drop every cached response.
    pub fn clear(&self) -> Result<()> {
        log::info!("clearing response cache");
        self.store.clear()
    }

    fn store_response(&self, key: &str, resp: &Response, now: DateTime<Utc>) -> Result<()> {
        let mut ttl = self.expire_after;
        if self.respect_cache_control {
            if let Some(d) = resp.cache_control.as_deref().map(parse_cache_control) {
                if d.no_store {
                    log::debug!("not caching {key}: Cache-Control forbids it");
                    return Ok(());
                }
                if let Some(secs) = d.max_age {
                    ttl = Some(Duration::from_secs(secs));
                }
            }
        }
        let expires_at = match ttl {
            Some(ttl) => {
                let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
                Some(now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC))
            }
            None => None,
        };
        self.store.put(CacheEntry {
            key: key.to_string(),
            stored_at: now,
            expires_at,
            payload: resp.body.clone(),
        })
    }
}

fn excerpt(body: &str) -> String {
    const MAX: usize = 200;
    let body = body.trim();
    match body.char_indices().nth(MAX) {
        Some((i, _)) => format!("{}…", &body[..i]),
        None if body.is_empty() => "empty response body".to_string(),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Scripted {
        response: Response,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(response: Response) -> Arc<Self> {
            Arc::new(Self {
                response,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Transport for Scripted {
        fn get(&self, _url: &str) -> Result<Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    fn config(expire_after: Option<Duration>) -> CacheConfig {
        CacheConfig {
            backend: CacheBackend::Memory,
            expire_after,
            respect_cache_control: true,
        }
    }

    #[test]
    fn second_fetch_is_served_from_cache() {
        let t = Scripted::new(Response::ok("{\"a\":1}"));
        let f = CachedFetcher::new(t.clone(), Arc::new(MemoryStore::new()), &config(None));
        let first = f.fetch("http://x/a").unwrap();
        let second = f.fetch("http://x/a").unwrap();
        assert!(!first.was_cached);
        assert!(second.was_cached);
        assert_eq!(first.payload, second.payload);
        assert_eq!(t.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_ttl_always_refetches() {
        let t = Scripted::new(Response::ok("x"));
        let f = CachedFetcher::new(
            t.clone(),
            Arc::new(MemoryStore::new()),
            &config(Some(Duration::ZERO)),
        );
        f.fetch("k").unwrap();
        assert!(!f.fetch("k").unwrap().was_cached);
        assert_eq!(t.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn no_store_header_is_honoured() {
        let t = Scripted::new(Response {
            status: 200,
            body: "x".into(),
            cache_control: Some("private, no-store".into()),
        });
        let store = Arc::new(MemoryStore::new());
        let f = CachedFetcher::new(t.clone(), store.clone(), &config(None));
        f.fetch("k").unwrap();
        assert!(store.is_empty());

        let ignoring = CacheConfig {
            respect_cache_control: false,
            ..config(None)
        };
        let f = CachedFetcher::new(t, store.clone(), &ignoring);
        f.fetch("k").unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn max_age_sets_expiry() {
        let t = Scripted::new(Response {
            status: 200,
            body: "x".into(),
            cache_control: Some("public, max-age=600".into()),
        });
        let store = Arc::new(MemoryStore::new());
        let f = CachedFetcher::new(t, store.clone(), &config(None));
        f.fetch("k").unwrap();
        let entry = store.get("k").unwrap().unwrap();
        let ttl = entry.expires_at.unwrap() - entry.stored_at;
        assert_eq!(ttl.num_seconds(), 600);
    }

    #[test]
    fn error_status_is_remote_and_not_cached() {
        let t = Scripted::new(Response {
            status: 500,
            body: "boom".into(),
            cache_control: None,
        });
        let store = Arc::new(MemoryStore::new());
        let f = CachedFetcher::new(t, store.clone(), &config(None));
        match f.fetch("k") {
            Err(Error::Remote { status, message, .. }) => {
                assert_eq!(status, Some(500));
                assert_eq!(message, "boom");
            }
            other => panic!("expected remote error, got {other:?}"),
        }
        assert!(store.is_empty());
    }

    #[test]
    fn clear_empties_store() {
        let t = Scripted::new(Response::ok("x"));
        let f = CachedFetcher::new(t.clone(), Arc::new(MemoryStore::new()), &config(None));
        f.fetch("k").unwrap();
        f.clear().unwrap();
        assert!(!f.fetch("k").unwrap().was_cached);
        assert_eq!(t.calls.load(Ordering::SeqCst), 2);
    }

    fn entry(key: &str, payload: &str) -> CacheEntry {
        CacheEntry {
            key: key.into(),
            stored_at: Utc::now(),
            expires_at: None,
            payload: payload.into(),
        }
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested")).unwrap();
        let key = "https://ws.cso.ie/public/api.restful/PxStat.Data.Cube_API.ReadDataset/CPM01/JSON-stat/2.0/en";
        assert_eq!(store.get(key).unwrap(), None);
        store.put(entry(key, "{\"a\":1}")).unwrap();
        let got = store.get(key).unwrap().unwrap();
        assert_eq!(got.key, key);
        assert_eq!(got.payload, "{\"a\":1}");
        assert_eq!(got.expires_at, None);
        // Survives a fresh handle on the same directory.
        let reopened = FileStore::new(store.dir()).unwrap();
        assert_eq!(reopened.get(key).unwrap().map(|e| e.payload).as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn file_store_misses_on_key_mismatch_and_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();

        // An entry file whose recorded key is not the requested key.
        std::fs::write(
            store.path_for("a"),
            serde_json::to_string(&entry("b", "x")).unwrap(),
        )
        .unwrap();
        assert_eq!(store.get("a").unwrap(), None);

        std::fs::write(store.path_for("c"), "{not json").unwrap();
        assert_eq!(store.get("c").unwrap(), None);

        // A corrupt entry is replaced by the next fetch.
        let t = Scripted::new(Response::ok("fresh"));
        let f = CachedFetcher::new(t.clone(), Arc::new(store.clone()), &config(None));
        assert!(!f.fetch("c").unwrap().was_cached);
        assert!(f.fetch("c").unwrap().was_cached);
        assert_eq!(t.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn file_store_clear_only_removes_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path()).unwrap();
        store.put(entry("k1", "x")).unwrap();
        store.put(entry("k2", "y")).unwrap();
        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, "keep me").unwrap();

        store.clear().unwrap();
        assert_eq!(store.get("k1").unwrap(), None);
        assert_eq!(store.get("k2").unwrap(), None);
        assert!(notes.exists());
    }

    #[test]
    fn open_store_follows_backend() {
        let dir = tempfile::tempdir().unwrap();
        let backend = CacheBackend::File {
            path: Some(dir.path().join("px")),
        };
        let store = open_store(&backend).unwrap();
        store.put(entry("k", "v")).unwrap();
        assert!(dir.path().join("px").join("k.json").exists());

        let off = open_store(&CacheBackend::Disabled).unwrap();
        off.put(entry("k", "v")).unwrap();
        assert_eq!(off.get("k").unwrap(), None);
    }

    #[test]
    fn cache_control_parsing() {
        let d = parse_cache_control("Max-Age=30, must-revalidate");
        assert_eq!(d.max_age, Some(30));
        assert!(!d.no_store);
        assert!(parse_cache_control("no-cache").no_store);
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(500);
        let e = excerpt(&body);
        assert!(e.ends_with('…'));
        assert_eq!(e.chars().count(), 201);
    }
}
