//! Monthly Consumer Price Index (table CPM01).

use crate::client::Session;
use crate::error::{Error, Result};
use crate::periods;
use crate::table::{Column, Row, Table};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

pub const CPI_TABLE: &str = "CPM01";
pub const DEFAULT_STATISTIC: &str = "Consumer Price Index (Base Dec 2001=100)";
pub const ALL_ITEMS: &str = "All items";
const MONTH: &str = "Month";
const COMMODITY_GROUP: &str = "Commodity Group";

/// Options for [`Session::monthly_cpi`].
#[derive(Debug, Clone, PartialEq)]
pub struct CpiOptions {
    /// Commodity groups to return, one column each.
    pub commodity_groups: Vec<String>,
    /// The statistic to read. Exactly one per call.
    pub statistic: String,
    /// Drop months before this one.
    pub start_month: Option<NaiveDate>,
    /// Divide each series by its value at the latest month.
    pub normalize_to_most_recent: bool,
    /// Value the latest month is re-based to (1.0 or 100.0 usually).
    pub scale: f64,
}

impl Default for CpiOptions {
    fn default() -> Self {
        Self {
            commodity_groups: vec![ALL_ITEMS.into()],
            statistic: DEFAULT_STATISTIC.into(),
            start_month: None,
            normalize_to_most_recent: true,
            scale: 1.0,
        }
    }
}

impl CpiOptions {
    pub fn with_groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            commodity_groups: groups.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

/// One month of CPI values, aligned with [`CpiSeries::groups`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpiRow {
    pub month: NaiveDate,
    pub values: Vec<Option<f64>>,
}

/// Monthly CPI indexed by month (ascending), one column per commodity group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CpiSeries {
    pub statistic: String,
    pub groups: Vec<String>,
    pub rows: Vec<CpiRow>,
}

impl CpiSeries {
    /// The series for one commodity group.
    pub fn group(&self, name: &str) -> Option<Vec<(NaiveDate, Option<f64>)>> {
        let g = self.groups.iter().position(|x| x == name)?;
        Some(self.rows.iter().map(|r| (r.month, r.values[g])).collect())
    }

    pub fn to_table(&self) -> Table {
        Table {
            id: CPI_TABLE.into(),
            label: Some(self.statistic.clone()),
            index: vec![MONTH.into()],
            columns: self.groups.iter().map(Column::new).collect(),
            rows: self
                .rows
                .iter()
                .map(|r| Row {
                    key: vec![r.month.format("%Y-%m").to_string()],
                    values: r.values.clone(),
                })
                .collect(),
        }
    }
}

impl Session {
    /// Monthly CPI from CPM01, one column per requested commodity group.
    ///
    /// ### Errors
    /// - `Usage` for an unknown statistic or commodity group
    /// - `Remote` when re-basing is impossible (no value at the latest month)
    pub fn monthly_cpi(&self, opts: &CpiOptions) -> Result<CpiSeries> {
        validate(opts)?;
        let table = self.get_table(CPI_TABLE)?;
        cpi_from_table(&table, opts)
    }
}

fn validate(opts: &CpiOptions) -> Result<()> {
    if opts.commodity_groups.is_empty() {
        return Err(Error::usage("commodity groups", "at least one is required"));
    }
    if let Some((i, dup)) = opts
        .commodity_groups
        .iter()
        .enumerate()
        .find(|(i, g)| opts.commodity_groups[..*i].contains(*g))
    {
        return Err(Error::usage(
            "commodity groups",
            format!("`{dup}` is listed more than once (position {})", i + 1),
        ));
    }
    if opts.normalize_to_most_recent && !(opts.scale.is_finite() && opts.scale != 0.0) {
        return Err(Error::usage("scale", format!("{} cannot be a re-basing target", opts.scale)));
    }
    Ok(())
}

/// Post-process a CPM01 table.
pub fn cpi_from_table(table: &Table, opts: &CpiOptions) -> Result<CpiSeries> {
    validate(opts)?;
    let stat = table.column_position(&opts.statistic).ok_or_else(|| {
        Error::usage(
            "statistic",
            format!("`{}` is not in {}", opts.statistic, table.id),
        )
    })?;
    let month_lvl = table.require_index(MONTH)?;
    let group_lvl = table.require_index(COMMODITY_GROUP)?;

    let available = table.categories(group_lvl);
    if let Some(missing) = opts
        .commodity_groups
        .iter()
        .find(|g| !available.contains(&g.as_str()))
    {
        return Err(Error::usage(
            "commodity group",
            format!("`{missing}` is not in {}", table.id),
        ));
    }

    let n = opts.commodity_groups.len();
    let mut by_month: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
    for row in &table.rows {
        let Some(g) = opts
            .commodity_groups
            .iter()
            .position(|x| *x == row.key[group_lvl])
        else {
            continue;
        };
        let label = &row.key[month_lvl];
        let month = periods::parse_month(label)
            .ok_or_else(|| Error::parse(&table.id, format!("unrecognised month `{label}`")))?;
        if opts.start_month.is_some_and(|s| month < s) {
            continue;
        }
        by_month.entry(month).or_insert_with(|| vec![None; n])[g] = row.values[stat];
    }

    let mut rows: Vec<CpiRow> = by_month
        .into_iter()
        .map(|(month, values)| CpiRow { month, values })
        .collect();

    if opts.normalize_to_most_recent
        && let Some(latest) = rows.last()
    {
        let month = latest.month;
        let bases = latest
            .values
            .iter()
            .zip(&opts.commodity_groups)
            .map(|(v, g)| match v {
                Some(b) if *b != 0.0 => Ok(*b),
                _ => Err(Error::remote(
                    &table.id,
                    None,
                    format!("cannot re-base `{g}`: no value for {}", month.format("%Y-%m")),
                )),
            })
            .collect::<Result<Vec<f64>>>()?;
        for row in &mut rows {
            for (v, b) in row.values.iter_mut().zip(&bases) {
                *v = v.map(|x| x / b * opts.scale);
            }
        }
    }

    Ok(CpiSeries {
        statistic: table.columns[stat].label.clone(),
        groups: opts.commodity_groups.clone(),
        rows,
    })
}
