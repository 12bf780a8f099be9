mod common;

use common::session;
use pxstat::storage;
use std::fs;

#[test]
fn save_table_as_csv_and_json() {
    let (cso, _) = session();
    let table = cso.get_table("VSA32").unwrap();
    let dir = tempfile::tempdir().unwrap();

    let csv_path = dir.path().join("vsa32.csv");
    storage::save_table_csv(&table, &csv_path, false).unwrap();
    let txt = fs::read_to_string(&csv_path).unwrap();
    assert!(txt.starts_with("Year,Sex,Age x,Ix,e0x\n"));
    assert_eq!(txt.lines().count(), 1 + table.len());
    assert_eq!(txt.lines().nth(1), Some("2005,Male,0 years,100000,76.8"));

    let json_path = dir.path().join("vsa32.json");
    storage::save_json(&table, &json_path).unwrap();
    let v: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(v["rows"].as_array().unwrap().len(), table.len());
    assert_eq!(v["id"], "VSA32");
}

#[test]
fn toc_csv_joins_variables() {
    let (cso, _) = session();
    let toc = cso.get_toc().unwrap();
    let mut buf = Vec::new();
    storage::write_toc_csv(&toc, &mut buf).unwrap();
    let txt = String::from_utf8(buf).unwrap();
    assert!(txt.starts_with("table_id,table_name,"));
    assert!(txt.contains("Age x;Sex"));
    assert_eq!(txt.lines().count(), 4);
}
