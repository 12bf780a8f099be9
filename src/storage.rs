use crate::table::Table;
use crate::toc::TableDescriptor;
use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Prefix cells that a spreadsheet would evaluate as a formula.
fn sanitize(cell: &str) -> String {
    match cell.chars().next() {
        Some('=' | '+' | '-' | '@' | '\t' | '\r') => format!("'{cell}"),
        _ => cell.to_string(),
    }
}

fn column_header(table: &Table, with_units: bool) -> Vec<String> {
    table
        .columns
        .iter()
        .map(|c| match (&c.unit, with_units) {
            (Some(u), true) => format!("{} ({u})", c.label),
            _ => c.label.clone(),
        })
        .collect()
}

/// Write a table as CSV: index levels first, then one column per statistic.
/// Missing values are empty cells.
pub fn write_table_csv<W: Write>(table: &Table, writer: W, with_units: bool) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    let header: Vec<String> = table
        .index
        .iter()
        .cloned()
        .chain(column_header(table, with_units))
        .map(|h| sanitize(&h))
        .collect();
    wtr.write_record(&header)?;
    for row in &table.rows {
        let record: Vec<String> = row
            .key
            .iter()
            .map(|k| sanitize(k))
            .chain(row.values.iter().map(|v| v.map(|x| x.to_string()).unwrap_or_default()))
            .collect();
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Save a table as CSV with header.
pub fn save_table_csv<P: AsRef<Path>>(table: &Table, path: P, with_units: bool) -> Result<()> {
    let path = path.as_ref();
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_table_csv(table, f, with_units)
}

/// Write the table of contents as CSV; variables are `;`-joined.
pub fn write_toc_csv<W: Write>(toc: &[TableDescriptor], writer: W) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record([
        "table_id",
        "table_name",
        "last_updated",
        "copyright",
        "exceptional",
        "frequency",
        "earliest",
        "latest",
        "variables",
    ])?;
    for t in toc {
        wtr.write_record([
            sanitize(&t.id),
            sanitize(&t.name),
            t.last_updated.to_rfc3339(),
            sanitize(&t.copyright),
            t.is_exceptional.to_string(),
            sanitize(&t.frequency),
            sanitize(&t.earliest_period),
            sanitize(&t.latest_period),
            sanitize(&t.variable_names.join(";")),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Save any serializable value as pretty JSON.
pub fn save_json<T: Serialize + ?Sized, P: AsRef<Path>>(value: &T, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let s = serde_json::to_string_pretty(value)?;
    f.write_all(s.as_bytes())?;
    Ok(())
}
