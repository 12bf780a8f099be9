//! The PxStat table of contents (ReadCollection).

use crate::client::Session;
use crate::error::{Error, Result};
use crate::jsonstat::{CollectionItem, STATISTIC_ID};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

const CONTEXT: &str = "table of contents";

/// Metadata for one available table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    pub id: String,
    /// Not necessarily unique across tables.
    pub name: String,
    pub last_updated: DateTime<Utc>,
    pub copyright: String,
    /// Experimental or irregularly produced table.
    pub is_exceptional: bool,
    /// e.g. "Year", "Month", "Quarter".
    pub frequency: String,
    pub earliest_period: String,
    pub latest_period: String,
    /// Classification variables, excluding time and statistic.
    pub variable_names: Vec<String>,
    pub url: String,
}

impl Session {
    /// Fetch the list of all tables, in API order.
    ///
    /// The endpoint times out intermittently; this surfaces as
    /// [`Error::Transport`] and is worth retrying.
    pub fn get_toc(&self) -> Result<Vec<TableDescriptor>> {
        let v = self.fetch_json(&self.collection_url(), CONTEXT)?;
        parse_collection(&v)
    }
}

/// Parse a ReadCollection document.
pub fn parse_collection(v: &Value) -> Result<Vec<TableDescriptor>> {
    let items = v
        .pointer("/link/item")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::parse(CONTEXT, "missing link.item array"))?;

    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(items.len());
    for (i, raw) in items.iter().enumerate() {
        let item: CollectionItem = serde_json::from_value(raw.clone())
            .map_err(|e| Error::parse(CONTEXT, format!("item {i}: {e}")))?;
        let desc = descriptor(&item).map_err(|detail| {
            Error::parse(CONTEXT, format!("item {i} ({}): {detail}", item.href))
        })?;
        if !seen.insert(desc.id.clone()) {
            return Err(Error::parse(CONTEXT, format!("duplicate table id `{}`", desc.id)));
        }
        out.push(desc);
    }
    Ok(out)
}

fn descriptor(item: &CollectionItem) -> std::result::Result<TableDescriptor, String> {
    let id = table_id_from_href(&item.href).ok_or("cannot find table id in href")?;
    let last_updated = parse_timestamp(&item.updated)
        .ok_or_else(|| format!("bad `updated` timestamp `{}`", item.updated))?;

    let dims = item.ordered_dimensions();
    let (time_id, time) = dims
        .iter()
        .find(|(k, _)| k.contains("TLIST"))
        .ok_or("no TLIST time dimension")?;
    let periods = time.resolve(time_id, CONTEXT).map_err(|e| e.to_string())?;
    let earliest = periods.categories.first().ok_or("time dimension has no periods")?;
    let latest = periods.categories.last().ok_or("time dimension has no periods")?;

    let variable_names = dims
        .iter()
        .filter(|(k, _)| !k.contains("TLIST") && !k.contains(STATISTIC_ID))
        .map(|(_, d)| d.label.clone())
        .collect();

    Ok(TableDescriptor {
        id,
        name: item.label.clone(),
        last_updated,
        copyright: item.extension.copyright.name.clone(),
        is_exceptional: item.extension.exceptional,
        frequency: time.label.clone(),
        earliest_period: earliest.label.clone(),
        latest_period: latest.label.clone(),
        variable_names,
        url: item.href.clone(),
    })
}

/// `.../ReadDataset/VSA32/JSON-stat/2.0/en` → `VSA32`.
fn table_id_from_href(href: &str) -> Option<String> {
    let (_, rest) = href.split_once("ReadDataset/")?;
    let id = rest.split('/').next()?.trim();
    (!id.is_empty()).then(|| id.to_string())
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|t| t.and_utc())
}

/// Find a table by id.
pub fn find<'a>(toc: &'a [TableDescriptor], id: &str) -> Option<&'a TableDescriptor> {
    toc.iter().find(|t| t.id.eq_ignore_ascii_case(id))
}

/// Tables whose name contains `needle`, case-insensitively.
pub fn search<'a>(toc: &'a [TableDescriptor], needle: &str) -> Vec<&'a TableDescriptor> {
    let needle = needle.to_lowercase();
    toc.iter()
        .filter(|t| t.name.to_lowercase().contains(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn href_to_id() {
        assert_eq!(
            table_id_from_href(
                "https://ws.cso.ie/public/api.restful/PxStat.Data.Cube_API.ReadDataset/VSA32/JSON-stat/2.0/en"
            )
            .as_deref(),
            Some("VSA32")
        );
        assert_eq!(table_id_from_href("https://ws.cso.ie/elsewhere"), None);
        assert_eq!(table_id_from_href("x/ReadDataset//JSON-stat"), None);
    }

    #[test]
    fn timestamps() {
        let t = parse_timestamp("2020-09-29T11:00:00Z").unwrap();
        assert_eq!(t.to_rfc3339(), "2020-09-29T11:00:00+00:00");
        assert_eq!(parse_timestamp("2020-09-29T11:00:00"), Some(t));
        assert!(parse_timestamp("yesterday").is_none());
    }
}
