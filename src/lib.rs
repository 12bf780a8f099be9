//! pxstat
//!
//! A lightweight Rust client for the Central Statistics Office's PxStat
//! open-data API. Pairs with the `pxstat` CLI.
//!
//! ### Features
//! - Browse the table of contents of every published table
//! - Fetch any table by id as a tidy wide table (one row per category
//!   combination, one column per statistic)
//! - Ready-made accessors for monthly CPI, the Live Register and life tables
//! - Transparent response caching (memory or on-disk) with expiry
//! - Save results as CSV or JSON
//!
//! ### Example
//! ```no_run
//! use pxstat::{CpiOptions, Session, SessionConfig};
//!
//! let cso = Session::new(SessionConfig::default())?;
//! let cpi = cso.monthly_cpi(&CpiOptions::with_groups(["All items", "Clothing and footwear"]))?;
//! pxstat::storage::save_table_csv(&cpi.to_table(), "cpi.csv", false)?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod cpi;
pub mod error;
pub mod jsonstat;
pub mod life_table;
pub mod live_register;
pub mod periods;
pub mod storage;
pub mod table;
pub mod toc;
pub mod transport;

pub use cache::{CacheStore, CachedFetcher, Fetched};
pub use client::Session;
pub use config::{CacheBackend, CacheConfig, RequestConfig, SessionConfig};
pub use cpi::{CpiOptions, CpiSeries};
pub use error::{Error, Result};
pub use life_table::{LifeTable, LifeTableOptions, Vintage};
pub use live_register::{LiveRegister, LiveRegisterOptions, live_register_dates};
pub use table::{Column, Row, Table};
pub use toc::TableDescriptor;
pub use transport::{Response, Transport};
