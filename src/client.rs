/// Synchronous session for the **CSO PxStat RESTful API**.
///
/// A [`Session`] owns the HTTP transport and the response cache; every
/// accessor (`get_toc`, `get_table`, `monthly_cpi`, `live_register`,
/// `life_table`) goes through it.
///
/// ### Notes
/// - PxStat reports unknown tables through a JSON-RPC `error` member rather
///   than an HTTP status; both surface as [`Error::Remote`].
/// - The ReadCollection endpoint is slow and times out now and then. Nothing
///   here retries; callers retry at the call site.
///
/// Typical usage:
/// ```no_run
/// # use pxstat::{Session, SessionConfig};
/// let cso = Session::new(SessionConfig::default())?;
/// let table = cso.get_table("VSA32")?;
/// println!("{} rows", table.len());
/// # Ok::<(), pxstat::Error>(())
/// ```
use crate::cache::{CacheStore, CachedFetcher, open_store};
use crate::config::{CacheConfig, SessionConfig};
use crate::error::{Error, Result};
use crate::jsonstat::Dataset;
use crate::table::Table;
use crate::transport::{HttpTransport, Transport};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use std::sync::Arc;

const COLLECTION_PATH: &str = "PxStat.Data.Cube_API.ReadCollection";
const DATASET_PATH: &str = "PxStat.Data.Cube_API.ReadDataset";
const DATASET_FORMAT: &str = "JSON-stat/2.0/en";

// Table ids are alphanumeric in practice; escape anything else.
const SAFE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.');

#[derive(Debug, Clone)]
pub struct Session {
    pub base_url: String,
    fetcher: CachedFetcher,
}

impl Session {
    /// Build a session with a `reqwest` transport and the configured cache.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config.request)?);
        let store = open_store(&config.cache.backend)?;
        Ok(Self::from_parts(config.base_url, transport, store, &config.cache))
    }

    /// Build a session from explicit parts.
    pub fn from_parts(
        base_url: impl Into<String>,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CacheStore>,
        cache: &CacheConfig,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            fetcher: CachedFetcher::new(transport, store, cache),
        }
    }

    /// URL of the table-of-contents listing.
    pub fn collection_url(&self) -> String {
        format!("{}/{}", self.base_url, COLLECTION_PATH)
    }

    /// URL of a table's JSON-stat payload.
    pub fn dataset_url(&self, table_id: &str) -> String {
        let id = percent_encoding::utf8_percent_encode(table_id, SAFE);
        format!("{}/{}/{}/{}", self.base_url, DATASET_PATH, id, DATASET_FORMAT)
    }

    /// Fetch `url` through the cache and decode it as JSON.
    ///
    /// A top-level JSON-RPC `error` member becomes [`Error::Remote`].
    pub(crate) fn fetch_json(&self, url: &str, context: &str) -> Result<Value> {
        let fetched = self.fetcher.fetch(url)?;
        let v: Value = serde_json::from_str(&fetched.payload)
            .map_err(|e| Error::parse(context, format!("invalid JSON: {e}")))?;
        if let Some(err) = v.get("error") {
            let message = err
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| err.to_string(), str::to_owned);
            return Err(Error::remote(context, None, message));
        }
        Ok(v)
    }

    /// Fetch a table's raw JSON-stat dataset (long format).
    pub fn get_dataset(&self, table_id: &str) -> Result<Dataset> {
        let id = table_id.trim();
        if id.is_empty() {
            return Err(Error::usage("table id", "must not be empty"));
        }
        let v = self.fetch_json(&self.dataset_url(id), id)?;
        Dataset::from_value(v, id)
    }

    /// Fetch a table and pivot it: one row per observed combination of
    /// categorical dimensions, one column per statistic.
    ///
    /// ### Errors
    /// - `Usage` for an empty id
    /// - `Remote` when PxStat rejects the id
    /// - `Parse` when the payload is not a well-formed JSON-stat dataset
    pub fn get_table(&self, table_id: &str) -> Result<Table> {
        let ds = self.get_dataset(table_id)?;
        Table::from_dataset(table_id.trim(), &ds)
    }

    /// Remove every cached response.
    pub fn clear_cache(&self) -> Result<()> {
        self.fetcher.clear()
    }
}
