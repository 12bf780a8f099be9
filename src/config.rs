//! Session configuration: where to reach PxStat, how to cache, how to request.
//!
//! Every struct is serde-friendly with `#[serde(default)]`, so a JSON config
//! file only needs the keys it wants to change:
//!
//! ```json
//! { "cache": { "backend": { "kind": "memory" }, "expire_after": 3600 },
//!   "request": { "verify_tls": false } }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Public PxStat RESTful endpoint root.
pub const DEFAULT_BASE_URL: &str = "https://ws.cso.ie/public/api.restful";

/// Where cached responses live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheBackend {
    /// Process-local map; gone when the session is dropped.
    Memory,
    /// One JSON file per response. `None` uses the platform cache directory.
    File { path: Option<PathBuf> },
    /// Every request goes to the network.
    Disabled,
}

impl Default for CacheBackend {
    fn default() -> Self {
        CacheBackend::File { path: None }
    }
}

impl CacheBackend {
    /// Resolve the directory used by the file backend.
    pub fn resolved_dir(path: Option<&Path>) -> PathBuf {
        match path {
            Some(p) => p.to_path_buf(),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("pxstat"),
        }
    }
}

/// Cache behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Freshness window. `None` keeps responses until the cache is cleared.
    #[serde(with = "opt_duration_secs")]
    pub expire_after: Option<Duration>,
    /// Honour `Cache-Control: no-store/no-cache/max-age` on responses.
    pub respect_cache_control: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            expire_after: None,
            respect_cache_control: true,
        }
    }
}

/// Options applied to every HTTP request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Disable only behind intercepting proxies.
    pub verify_tls: bool,
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            verify_tls: true,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("pxstat-rs/", env!("CARGO_PKG_VERSION")).into(),
        }
    }
}

/// Everything needed to build a [`crate::Session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub base_url: String,
    pub cache: CacheConfig,
    pub request: RequestConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            cache: CacheConfig::default(),
            request: RequestConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Load a JSON config file. Missing keys fall back to defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::usage("config file", format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::parse(format!("config file {}", path.display()), e.to_string()))
    }

    /// Defaults overridden by `PXSTAT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SessionConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(url) = lookup("PXSTAT_BASE_URL") {
            cfg.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("PXSTAT_VERIFY_TLS") {
            cfg.request.verify_tls = parse_bool("PXSTAT_VERIFY_TLS", &v)?;
        }
        if let Some(kind) = lookup("PXSTAT_CACHE") {
            cfg.cache.backend = match kind.trim().to_ascii_lowercase().as_str() {
                "memory" => CacheBackend::Memory,
                "file" => CacheBackend::File { path: None },
                "off" | "none" | "disabled" => CacheBackend::Disabled,
                other => {
                    return Err(Error::usage(
                        "PXSTAT_CACHE",
                        format!("expected memory, file or off, got `{other}`"),
                    ));
                }
            };
        }
        if let Some(dir) = lookup("PXSTAT_CACHE_DIR") {
            cfg.cache.backend = CacheBackend::File {
                path: Some(PathBuf::from(dir)),
            };
        }
        if let Some(secs) = lookup("PXSTAT_CACHE_EXPIRE_SECS") {
            let secs = secs.trim().parse::<u64>().map_err(|e| {
                Error::usage("PXSTAT_CACHE_EXPIRE_SECS", format!("`{secs}`: {e}"))
            })?;
            cfg.cache.expire_after = Some(Duration::from_secs(secs));
        }
        Ok(cfg)
    }
}

fn parse_bool(name: &'static str, v: &str) -> Result<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::usage(name, format!("expected a boolean, got `{other}`"))),
    }
}

/// Serde helper: `Duration` as whole seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// Serde helper: `Option<Duration>` as whole seconds or `null`.
mod opt_duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|o| o.map(Duration::from_secs))
    }
}
