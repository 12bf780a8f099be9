//! Wide tables built from long-format JSON-stat observations.
//!
//! Observations are grouped by their non-statistic categories; each group
//! becomes one [`Row`] and each statistic category one [`Column`].

use crate::error::{Error, Result};
use crate::jsonstat::{Dataset, DimensionInfo};
use ahash::AHashMap;
use serde::Serialize;

/// Column name used when a table has no statistic dimension.
pub const VALUE_COLUMN: &str = "Value";

/// A measured series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub code: String,
    pub label: String,
    pub unit: Option<String>,
}

impl Column {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            code: label.clone(),
            label,
            unit: None,
        }
    }

    /// Match against either the statistic code or its label.
    pub fn matches(&self, name: &str) -> bool {
        self.code == name || self.label == name
    }
}

/// One combination of index categories and its values, aligned with
/// [`Table::columns`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub key: Vec<String>,
    pub values: Vec<Option<f64>>,
}

/// Tabular dataset: a (possibly multi-level) row index plus value columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub id: String,
    pub label: Option<String>,
    /// Names of the index levels, matching `Row::key`.
    pub index: Vec<String>,
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl Table {
    /// Pivot a decoded dataset.
    pub fn from_dataset(table_id: &str, ds: &Dataset) -> Result<Self> {
        let dims = ds.dimensions(table_id)?;
        let observations = ds.observations(table_id)?;
        let stat_pos = dims.iter().position(DimensionInfo::is_statistic);

        let columns: Vec<Column> = match stat_pos {
            Some(p) => dims[p]
                .categories
                .iter()
                .map(|c| Column {
                    code: c.code.clone(),
                    label: c.label.clone(),
                    unit: c.unit.clone(),
                })
                .collect(),
            None => vec![Column::new(VALUE_COLUMN)],
        };
        let index_dims: Vec<usize> = (0..dims.len()).filter(|&i| Some(i) != stat_pos).collect();

        let mut positions: AHashMap<Vec<usize>, usize> = AHashMap::new();
        let mut rows: Vec<Row> = Vec::new();
        for obs in observations {
            let key: Vec<usize> = index_dims.iter().map(|&d| obs.categories[d]).collect();
            let col = stat_pos.map_or(0, |p| obs.categories[p]);
            let row = *positions.entry(key).or_insert_with_key(|key| {
                rows.push(Row {
                    key: key
                        .iter()
                        .zip(&index_dims)
                        .map(|(&c, &d)| dims[d].categories[c].label.clone())
                        .collect(),
                    values: vec![None; columns.len()],
                });
                rows.len() - 1
            });
            rows[row].values[col] = obs.value;
        }

        Ok(Self {
            id: table_id.to_string(),
            label: ds.label.clone(),
            index: index_dims.iter().map(|&d| dims[d].label.clone()).collect(),
            columns,
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of an index level by name.
    pub fn index_position(&self, name: &str) -> Option<usize> {
        self.index.iter().position(|n| n == name)
    }

    /// Like [`Table::index_position`], failing with a parse error naming the table.
    pub fn require_index(&self, name: &str) -> Result<usize> {
        self.index_position(name).ok_or_else(|| {
            Error::parse(
                &self.id,
                format!("no `{name}` dimension (have: {})", self.index.join(", ")),
            )
        })
    }

    /// Position of a column by code or label.
    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.matches(name))
    }

    /// Distinct categories of an index level, in order of first appearance.
    pub fn categories(&self, level: usize) -> Vec<&str> {
        let mut seen = Vec::new();
        for row in &self.rows {
            let v = row.key[level].as_str();
            if !seen.contains(&v) {
                seen.push(v);
            }
        }
        seen
    }

    /// All values of one column, aligned with `rows`.
    pub fn column_values(&self, col: usize) -> impl Iterator<Item = Option<f64>> + '_ {
        self.rows.iter().map(move |r| r.values[col])
    }

    /// Keep only rows matching `keep`.
    pub fn retain_rows<F>(&mut self, keep: F)
    where
        F: FnMut(&Row) -> bool,
    {
        self.rows.retain(keep);
    }
}
