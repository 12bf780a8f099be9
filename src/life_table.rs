//! Period life tables (table VSA32).

use crate::client::Session;
use crate::error::{Error, Result};
use crate::table::{Column, Row, Table};
use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

pub const LIFE_TABLE: &str = "VSA32";
const YEAR: &str = "Year";
const SEX: &str = "Sex";
const AGE: &str = "Age x";

/// Which data vintage (publication year) to return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Vintage {
    #[default]
    MostRecent,
    All,
    Year(String),
}

impl std::str::FromStr for Vintage {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim() {
            "most_recent" | "latest" | "" => Self::MostRecent,
            "all" => Self::All,
            y => Self::Year(y.to_string()),
        })
    }
}

/// Options for [`Session::life_table`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifeTableOptions {
    pub vintage: Vintage,
    /// Statistic codes or labels to keep; `None` keeps all.
    pub statistics: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifeTableRow {
    pub year: String,
    pub sex: String,
    pub age: u32,
    pub values: Vec<Option<f64>>,
}

/// Life table sorted by (year, sex, age).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifeTable {
    /// Whether every vintage was requested.
    pub all_vintages: bool,
    /// The years present; a single entry unless `Vintage::All` was asked for.
    pub years: Vec<String>,
    pub statistics: Vec<Column>,
    pub rows: Vec<LifeTableRow>,
}

impl LifeTable {
    /// Row index levels: (Sex, Age) for one vintage, (Year, Sex, Age) for all.
    pub fn index_names(&self) -> Vec<&'static str> {
        if self.all_vintages {
            vec![YEAR, SEX, AGE]
        } else {
            vec![SEX, AGE]
        }
    }

    pub fn to_table(&self) -> Table {
        let with_year = self.all_vintages;
        Table {
            id: LIFE_TABLE.into(),
            label: None,
            index: self.index_names().into_iter().map(String::from).collect(),
            columns: self.statistics.clone(),
            rows: self
                .rows
                .iter()
                .map(|r| {
                    let mut key = Vec::with_capacity(3);
                    if with_year {
                        key.push(r.year.clone());
                    }
                    key.push(r.sex.clone());
                    key.push(r.age.to_string());
                    Row {
                        key,
                        values: r.values.clone(),
                    }
                })
                .collect(),
        }
    }
}

/// First integer in an age label ("85 years and over" → 85), else 0.
pub fn parse_age(label: &str) -> u32 {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    let re = DIGITS.get_or_init(|| Regex::new(r"\d+").expect("valid age regex"));
    re.find(label)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

impl Session {
    /// Life table from VSA32, most recent vintage unless asked otherwise.
    ///
    /// ### Errors
    /// - `Usage` when the vintage or a statistic is not in VSA32
    pub fn life_table(&self, opts: &LifeTableOptions) -> Result<LifeTable> {
        let table = self.get_table(LIFE_TABLE)?;
        life_table_from_table(&table, opts)
    }
}

/// Post-process a VSA32 table.
pub fn life_table_from_table(table: &Table, opts: &LifeTableOptions) -> Result<LifeTable> {
    let year_lvl = table.require_index(YEAR)?;
    let sex_lvl = table.require_index(SEX)?;
    let age_lvl = table.require_index(AGE)?;

    let cols: Vec<usize> = match &opts.statistics {
        None => (0..table.columns.len()).collect(),
        Some(wanted) if wanted.is_empty() => {
            return Err(Error::usage("statistics", "at least one is required"));
        }
        Some(wanted) => wanted
            .iter()
            .map(|w| {
                table.column_position(w).ok_or_else(|| {
                    Error::usage("statistic", format!("`{w}` is not in {}", table.id))
                })
            })
            .collect::<Result<_>>()?,
    };

    let mut years: Vec<&str> = table.categories(year_lvl);
    years.sort_unstable();
    let selected: Vec<&str> = match &opts.vintage {
        Vintage::All => years,
        Vintage::MostRecent => years.last().copied().into_iter().collect(),
        Vintage::Year(y) => {
            if !years.contains(&y.as_str()) {
                return Err(Error::usage(
                    "vintage",
                    format!("{y} is not in {} (have {})", table.id, years.join(", ")),
                ));
            }
            vec![y.as_str()]
        }
    };

    let mut rows: Vec<LifeTableRow> = table
        .rows
        .iter()
        .filter(|r| selected.contains(&r.key[year_lvl].as_str()))
        .map(|r| LifeTableRow {
            year: r.key[year_lvl].clone(),
            sex: r.key[sex_lvl].clone(),
            age: parse_age(&r.key[age_lvl]),
            values: cols.iter().map(|&c| r.values[c]).collect(),
        })
        .collect();
    rows.sort_by(|a, b| (&a.year, &a.sex, a.age).cmp(&(&b.year, &b.sex, b.age)));

    Ok(LifeTable {
        all_vintages: opts.vintage == Vintage::All,
        years: selected.into_iter().map(String::from).collect(),
        statistics: cols.iter().map(|&c| table.columns[c].clone()).collect(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ages_from_labels() {
        assert_eq!(parse_age("0 years"), 0);
        assert_eq!(parse_age("1 year"), 1);
        assert_eq!(parse_age("85 years and over"), 85);
        assert_eq!(parse_age("Under one year"), 0);
    }

    #[test]
    fn vintage_from_str() {
        assert_eq!("all".parse::<Vintage>().unwrap(), Vintage::All);
        assert_eq!("most_recent".parse::<Vintage>().unwrap(), Vintage::MostRecent);
        assert_eq!("2011".parse::<Vintage>().unwrap(), Vintage::Year("2011".into()));
    }
}
