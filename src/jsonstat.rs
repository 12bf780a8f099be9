//! Serde models for the JSON-stat 2.0 documents PxStat serves.
//!
//! Two document classes matter here:
//! - `dataset` (ReadDataset): dimensions plus a flat value array in row-major
//!   order of the `id`/`size` lists.
//! - `collection` (ReadCollection): the table of contents, one dataset-like
//!   item per table without values.
//!
//! Unknown fields are ignored. Category labels and dimension maps are read
//! as ordered pairs so the API's ordering survives deserialization.

use crate::error::{Error, Result};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// PxStat marks suppressed or unavailable cells with this string.
pub const MISSING_MARKER: &str = "..";

/// Key of the statistic dimension in PxStat tables.
pub const STATISTIC_ID: &str = "STATISTIC";

/// A decoded `dataset` document.
#[derive(Debug, Clone, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub label: Option<String>,
    /// Dimension ids in value order.
    #[serde(rename = "id")]
    pub dimension_ids: Vec<String>,
    pub size: Vec<usize>,
    #[serde(deserialize_with = "de_ordered")]
    pub dimension: Vec<(String, Dimension)>,
    pub value: Values,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Dimension {
    pub label: String,
    #[serde(default)]
    pub category: Category,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub index: Option<CategoryIndex>,
    #[serde(default, deserialize_with = "de_ordered")]
    pub label: Vec<(String, String)>,
    #[serde(default)]
    pub unit: HashMap<String, Unit>,
}

/// `category.index` is either an ordered id list or an id → position map.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CategoryIndex {
    List(Vec<String>),
    Positions(HashMap<String, usize>),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Unit {
    #[serde(default)]
    pub label: Option<String>,
}

/// `value` is a dense array or a sparse flat-index → value object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Values {
    Dense(Vec<Value>),
    Sparse(HashMap<String, Value>),
}

/// A dimension after validation, categories in index order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionInfo {
    pub id: String,
    pub label: String,
    pub categories: Vec<CategoryInfo>,
}

impl DimensionInfo {
    /// Whether this is the table's statistic (measure) dimension.
    pub fn is_statistic(&self) -> bool {
        self.id == STATISTIC_ID || self.label.eq_ignore_ascii_case("statistic")
    }

    /// Whether this is a PxStat time dimension (`TLIST(..)`).
    pub fn is_time(&self) -> bool {
        self.id.contains("TLIST")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryInfo {
    pub code: String,
    pub label: String,
    pub unit: Option<String>,
}

/// One cell of the long-format table: category position per dimension, and
/// the value (`None` when missing).
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub categories: Vec<usize>,
    pub value: Option<f64>,
}

impl Dimension {
    /// Validate and order the categories of dimension `id`.
    pub fn resolve(&self, id: &str, context: &str) -> Result<DimensionInfo> {
        let labels: HashMap<&str, &str> = self
            .category
            .label
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        let codes: Vec<String> = match &self.category.index {
            Some(CategoryIndex::List(ids)) => ids.clone(),
            Some(CategoryIndex::Positions(pos)) => {
                let mut v: Vec<(&String, usize)> = pos.iter().map(|(k, p)| (k, *p)).collect();
                v.sort_by_key(|(_, p)| *p);
                if v.iter().enumerate().any(|(i, (_, p))| i != *p) {
                    return Err(Error::parse(
                        context,
                        format!("dimension `{id}` has non-contiguous category positions"),
                    ));
                }
                v.into_iter().map(|(k, _)| k.clone()).collect()
            }
            None => self.category.label.iter().map(|(k, _)| k.clone()).collect(),
        };

        let categories = codes
            .into_iter()
            .map(|code| CategoryInfo {
                label: labels.get(code.as_str()).map_or_else(|| code.clone(), |l| l.to_string()),
                unit: self
                    .category
                    .unit
                    .get(&code)
                    .and_then(|u| u.label.clone()),
                code,
            })
            .collect();

        Ok(DimensionInfo {
            id: id.to_string(),
            label: self.label.clone(),
            categories,
        })
    }
}

impl Dataset {
    /// Parse a ReadDataset payload.
    pub fn from_value(v: Value, context: &str) -> Result<Self> {
        serde_json::from_value(v).map_err(|e| Error::parse(context, e.to_string()))
    }

    /// Dimensions in value order, validated against `size`.
    pub fn dimensions(&self, context: &str) -> Result<Vec<DimensionInfo>> {
        if self.dimension_ids.len() != self.size.len() {
            return Err(Error::parse(
                context,
                format!(
                    "{} dimension ids but {} sizes",
                    self.dimension_ids.len(),
                    self.size.len()
                ),
            ));
        }
        self.dimension_ids
            .iter()
            .zip(&self.size)
            .map(|(id, &size)| {
                let dim = self
                    .dimension
                    .iter()
                    .find(|(k, _)| k == id)
                    .map(|(_, d)| d)
                    .ok_or_else(|| Error::parse(context, format!("dimension `{id}` not described")))?;
                let info = dim.resolve(id, context)?;
                if info.categories.len() != size {
                    return Err(Error::parse(
                        context,
                        format!(
                            "dimension `{id}` has {} categories but size {size}",
                            info.categories.len()
                        ),
                    ));
                }
                Ok(info)
            })
            .collect()
    }

    /// Flatten the value payload into observations, in row-major order.
    ///
    /// Dense arrays produce one observation per cell; sparse objects only for
    /// the cells they list.
    pub fn observations(&self, context: &str) -> Result<Vec<Observation>> {
        let total: usize = self.size.iter().product();
        let cells: Vec<(usize, &Value)> = match &self.value {
            Values::Dense(v) => {
                if v.len() != total {
                    return Err(Error::parse(
                        context,
                        format!("expected {total} values, found {}", v.len()),
                    ));
                }
                v.iter().enumerate().collect()
            }
            Values::Sparse(m) => {
                let mut cells = m
                    .iter()
                    .map(|(k, v)| {
                        let i = k
                            .parse::<usize>()
                            .ok()
                            .filter(|i| *i < total)
                            .ok_or_else(|| {
                                Error::parse(context, format!("invalid value index `{k}`"))
                            })?;
                        Ok((i, v))
                    })
                    .collect::<Result<Vec<_>>>()?;
                cells.sort_by_key(|(i, _)| *i);
                cells
            }
        };

        cells
            .into_iter()
            .map(|(flat, v)| {
                Ok(Observation {
                    categories: unravel(flat, &self.size),
                    value: cell_value(v, context, flat)?,
                })
            })
            .collect()
    }
}

/// Row-major flat index → per-dimension positions.
fn unravel(mut flat: usize, size: &[usize]) -> Vec<usize> {
    let mut pos = vec![0; size.len()];
    for (i, &n) in size.iter().enumerate().rev() {
        pos[i] = flat % n;
        flat /= n;
    }
    pos
}

fn cell_value(v: &Value, context: &str, flat: usize) -> Result<Option<f64>> {
    match v {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::String(s) if s.trim() == MISSING_MARKER => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| Error::parse(context, format!("non-numeric value `{s}` at cell {flat}"))),
        other => Err(Error::parse(
            context,
            format!("unexpected value {other} at cell {flat}"),
        )),
    }
}

/// Serde helper: read a JSON object as ordered `(key, value)` pairs.
fn de_ordered<'de, D, V>(deserializer: D) -> std::result::Result<Vec<(String, V)>, D::Error>
where
    D: Deserializer<'de>,
    V: Deserialize<'de>,
{
    struct OrderedVisitor<V>(PhantomData<V>);

    impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
        type Value = Vec<(String, V)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "a JSON object")
        }

        fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((k, v)) = map.next_entry::<String, V>()? {
                out.push((k, v));
            }
            Ok(out)
        }
    }

    deserializer.deserialize_map(OrderedVisitor(PhantomData))
}

/// `extension` block of a collection item.
#[derive(Debug, Clone, Deserialize)]
pub struct Extension {
    pub copyright: Copyright,
    pub exceptional: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Copyright {
    pub name: String,
}

/// One table in a `collection` document.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionItem {
    pub href: String,
    pub label: String,
    pub updated: String,
    pub extension: Extension,
    #[serde(default, rename = "id")]
    pub dimension_ids: Vec<String>,
    #[serde(deserialize_with = "de_ordered")]
    pub dimension: Vec<(String, Dimension)>,
}

impl CollectionItem {
    /// Dimensions in `id` order when given, otherwise document order.
    pub fn ordered_dimensions(&self) -> Vec<(&str, &Dimension)> {
        if self.dimension_ids.is_empty() {
            return self.dimension.iter().map(|(k, d)| (k.as_str(), d)).collect();
        }
        self.dimension_ids
            .iter()
            .filter_map(|id| {
                self.dimension
                    .iter()
                    .find(|(k, _)| k == id)
                    .map(|(k, d)| (k.as_str(), d))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_by_two(value: Value) -> Dataset {
        Dataset::from_value(
            json!({
                "class": "dataset",
                "id": ["STATISTIC", "TLIST(A1)"],
                "size": [2, 2],
                "dimension": {
                    "STATISTIC": {
                        "label": "Statistic",
                        "category": {
                            "index": ["S1", "S2"],
                            "label": {"S2": "Second", "S1": "First"},
                            "unit": {"S1": {"label": "Number", "decimals": 0}}
                        }
                    },
                    "TLIST(A1)": {
                        "label": "Year",
                        "category": {"index": {"2021": 1, "2020": 0},
                                     "label": {"2020": "2020", "2021": "2021"}}
                    }
                },
                "value": value
            }),
            "TEST",
        )
        .unwrap()
    }

    #[test]
    fn dimensions_follow_index_order() {
        let ds = two_by_two(json!([1, 2, 3, 4]));
        let dims = ds.dimensions("TEST").unwrap();
        assert!(dims[0].is_statistic());
        assert!(dims[1].is_time());
        assert_eq!(dims[0].categories[0].label, "First");
        assert_eq!(dims[0].categories[0].unit.as_deref(), Some("Number"));
        assert_eq!(dims[0].categories[1].unit, None);
        let years: Vec<_> = dims[1].categories.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(years, ["2020", "2021"]);
    }

    #[test]
    fn dense_values_unravel_row_major() {
        let ds = two_by_two(json!([1, null, "..", 4.5]));
        let obs = ds.observations("TEST").unwrap();
        assert_eq!(obs.len(), 4);
        assert_eq!(obs[1].categories, vec![0, 1]);
        assert_eq!(obs[1].value, None);
        assert_eq!(obs[2].categories, vec![1, 0]);
        assert_eq!(obs[2].value, None);
        assert_eq!(obs[3].value, Some(4.5));
    }

    #[test]
    fn sparse_values_only_yield_listed_cells() {
        let ds = two_by_two(json!({"3": 7, "0": 1}));
        let obs = ds.observations("TEST").unwrap();
        assert_eq!(obs.len(), 2);
        assert_eq!(obs[0].categories, vec![0, 0]);
        assert_eq!(obs[1].categories, vec![1, 1]);
    }

    #[test]
    fn wrong_value_count_is_a_parse_error() {
        let ds = two_by_two(json!([1, 2, 3]));
        assert!(matches!(ds.observations("TEST"), Err(Error::Parse { .. })));
    }

    #[test]
    fn garbage_cell_is_a_parse_error() {
        let ds = two_by_two(json!([1, 2, "n/a", 4]));
        let err = ds.observations("TEST").unwrap_err();
        assert!(err.to_string().contains("n/a"));
    }

    #[test]
    fn unravel_matches_strides() {
        assert_eq!(unravel(0, &[2, 3, 4]), vec![0, 0, 0]);
        assert_eq!(unravel(5, &[2, 3, 4]), vec![0, 1, 1]);
        assert_eq!(unravel(23, &[2, 3, 4]), vec![1, 2, 3]);
    }
}
