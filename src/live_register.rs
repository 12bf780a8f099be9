//! Live Register (table LRM02) with reference and extract dates.
//!
//! The Live Register counts people on the register on a reference date: the
//! last Friday of the month up to April 2015 and the last Thursday since.
//! The underlying administrative extract is taken on the following Sunday.

use crate::client::Session;
use crate::error::{Error, Result};
use crate::periods;
use crate::table::{Column, Row, Table};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

pub const LIVE_REGISTER_TABLE: &str = "LRM02";
const MONTH: &str = "Month";
const AGE_GROUP: &str = "Age Group";
const SEX: &str = "Sex";

/// Options for [`Session::live_register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveRegisterOptions {
    /// Keep months whose first day is on or after this date.
    pub start: Option<NaiveDate>,
    /// Keep months whose first day is on or before this date.
    pub end: Option<NaiveDate>,
    pub age_groups: Vec<String>,
    pub sexes: Vec<String>,
}

impl Default for LiveRegisterOptions {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            age_groups: vec!["All ages".into()],
            sexes: vec!["Both sexes".into()],
        }
    }
}

/// Reference and extract date for one month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LiveRegisterDates {
    pub month: NaiveDate,
    pub reference_date: NaiveDate,
    pub extract_date: NaiveDate,
}

impl LiveRegisterDates {
    pub fn for_month(month: NaiveDate) -> Option<Self> {
        let month = periods::month_start(month.year(), month.month())?;
        let reference_date = periods::reference_date(month)?;
        Some(Self {
            month,
            reference_date,
            extract_date: periods::extract_date(reference_date)?,
        })
    }
}

/// Reference/extract dates for every month from `start` to `end` inclusive.
pub fn live_register_dates(start: NaiveDate, end: NaiveDate) -> Vec<LiveRegisterDates> {
    periods::months_between(start, end)
        .filter_map(LiveRegisterDates::for_month)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveRegisterRow {
    /// First day of the month.
    pub month: NaiveDate,
    pub age_group: String,
    pub sex: String,
    /// Aligned with [`LiveRegister::statistics`].
    pub values: Vec<Option<f64>>,
    pub reference_date: NaiveDate,
    pub extract_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveRegister {
    pub statistics: Vec<Column>,
    pub rows: Vec<LiveRegisterRow>,
}

impl LiveRegister {
    pub fn to_table(&self) -> Table {
        // Dates ride along as extra key levels so the columns stay numeric.
        let index = [MONTH, AGE_GROUP, SEX, "reference_date", "extract_date"]
            .map(String::from)
            .to_vec();
        Table {
            id: LIVE_REGISTER_TABLE.into(),
            label: None,
            index,
            columns: self.statistics.clone(),
            rows: self
                .rows
                .iter()
                .map(|r| Row {
                    key: vec![
                        r.month.format("%Y-%m").to_string(),
                        r.age_group.clone(),
                        r.sex.clone(),
                        r.reference_date.to_string(),
                        r.extract_date.to_string(),
                    ],
                    values: r.values.clone(),
                })
                .collect(),
        }
    }
}

impl Session {
    /// Live Register counts with reference and extract dates attached.
    ///
    /// ### Errors
    /// - `Usage` when `start > end`, a filter list is empty, or an age group /
    ///   sex is not in LRM02
    pub fn live_register(&self, opts: &LiveRegisterOptions) -> Result<LiveRegister> {
        validate(opts)?;
        let table = self.get_table(LIVE_REGISTER_TABLE)?;
        live_register_from_table(&table, opts)
    }
}

fn validate(opts: &LiveRegisterOptions) -> Result<()> {
    if opts.age_groups.is_empty() {
        return Err(Error::usage("age groups", "at least one is required"));
    }
    if opts.sexes.is_empty() {
        return Err(Error::usage("sexes", "at least one is required"));
    }
    if let (Some(s), Some(e)) = (opts.start, opts.end)
        && s > e
    {
        return Err(Error::usage("date range", format!("start {s} is after end {e}")));
    }
    Ok(())
}

fn check_present(
    table: &Table,
    level: usize,
    wanted: &[String],
    argument: &'static str,
) -> Result<()> {
    let available = table.categories(level);
    match wanted.iter().find(|w| !available.contains(&w.as_str())) {
        Some(w) => Err(Error::usage(argument, format!("`{w}` is not in {}", table.id))),
        None => Ok(()),
    }
}

/// Post-process an LRM02 table. Rows keep the table's order.
pub fn live_register_from_table(table: &Table, opts: &LiveRegisterOptions) -> Result<LiveRegister> {
    validate(opts)?;
    let month_lvl = table.require_index(MONTH)?;
    let age_lvl = table.require_index(AGE_GROUP)?;
    let sex_lvl = table.require_index(SEX)?;
    check_present(table, age_lvl, &opts.age_groups, "age group")?;
    check_present(table, sex_lvl, &opts.sexes, "sex")?;

    let mut rows = Vec::new();
    for row in &table.rows {
        if !opts.age_groups.contains(&row.key[age_lvl]) || !opts.sexes.contains(&row.key[sex_lvl]) {
            continue;
        }
        let label = &row.key[month_lvl];
        let month = periods::parse_month(label)
            .ok_or_else(|| Error::parse(&table.id, format!("unrecognised month `{label}`")))?;
        if opts.start.is_some_and(|s| month < s) || opts.end.is_some_and(|e| month > e) {
            continue;
        }
        let dates = LiveRegisterDates::for_month(month)
            .ok_or_else(|| Error::parse(&table.id, format!("no reference date for `{label}`")))?;
        rows.push(LiveRegisterRow {
            month,
            age_group: row.key[age_lvl].clone(),
            sex: row.key[sex_lvl].clone(),
            values: row.values.clone(),
            reference_date: dates.reference_date,
            extract_date: dates.extract_date,
        });
    }

    Ok(LiveRegister {
        statistics: table.columns.clone(),
        rows,
    })
}
