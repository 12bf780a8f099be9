//! Error types shared by every PxStat operation.
//!
//! Each variant carries the URL, table id or argument that triggered it, so a
//! failure can be diagnosed from its message alone.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while fetching or reshaping PxStat data.
#[derive(Debug, Error)]
pub enum Error {
    /// No response was obtained (DNS, connection, TLS, timeout, ...).
    #[error("network error requesting {url}: {source}")]
    Transport {
        /// The URL that failed.
        url: String,
        /// The underlying client error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The API answered with an error status or a semantically invalid result.
    #[error("PxStat error for {url}{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Remote {
        /// The URL (or table id) the error relates to.
        url: String,
        /// HTTP status, when the error came from a non-success response.
        status: Option<u16>,
        /// Message from the API, or a description of the invalid result.
        message: String,
    },

    /// The payload did not have the expected shape.
    #[error("unexpected payload in {context}: {detail}")]
    Parse {
        /// Where the payload came from (table id, endpoint, ...).
        context: String,
        /// What was wrong with it.
        detail: String,
    },

    /// Invalid argument passed to an accessor.
    #[error("invalid {argument}: {detail}")]
    Usage {
        /// Name of the offending argument.
        argument: &'static str,
        /// Why it was rejected.
        detail: String,
    },

    /// The on-disk cache could not be read or written.
    #[error("cache error at {path}: {source}")]
    Cache {
        /// File or directory involved.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Creates a transport error from any client error.
    pub fn transport(
        url: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Transport {
            url: url.into(),
            source: source.into(),
        }
    }

    /// Creates a remote error.
    pub fn remote(url: impl Into<String>, status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Remote {
            url: url.into(),
            status,
            message: message.into(),
        }
    }

    /// Creates a parse error.
    pub fn parse(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Parse {
            context: context.into(),
            detail: detail.into(),
        }
    }

    /// Creates a usage error.
    pub fn usage(argument: &'static str, detail: impl Into<String>) -> Self {
        Self::Usage {
            argument,
            detail: detail.into(),
        }
    }

    /// Creates a cache IO error.
    pub fn cache(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Cache {
            path: path.into(),
            source,
        }
    }

    /// True for usage errors, i.e. the caller passed something invalid.
    #[must_use]
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage { .. })
    }
}
