//! Row -> [`CellValue`] decoding, one function per driver. Each tries a chain
//! of native Rust types in order and keeps the first that decodes cleanly —
//! simple, and robust against each driver's own dynamic/static typing
//! quirks, without hand-maintaining a type-OID table per engine.

use sqlx::{Column, Row};

use super::cell::{CellValue, ResultSet};

pub fn decode_sqlx_rows<R>(rows: Vec<R>) -> ResultSet
where
    R: Row,
    for<'r> i64: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    for<'r> f64: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    for<'r> bool: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    for<'r> String: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
{
    let columns: Vec<String> = rows
        .first()
        .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let decoded_rows = rows
        .iter()
        .map(|row| {
            (0..row.len())
                .map(|i| decode_cell(row, i))
                .collect::<Vec<_>>()
        })
        .collect();

    ResultSet { columns, rows: decoded_rows }
}

fn decode_cell<R>(row: &R, index: usize) -> CellValue
where
    R: Row,
    for<'r> i64: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    for<'r> f64: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    for<'r> bool: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    for<'r> String: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
{
    if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(index) {
        return CellValue::Int(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<bool>, _>(index) {
        return CellValue::Bool(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(index) {
        return CellValue::Float(v);
    }
    if let Ok(Some(v)) = row.try_get::<Option<String>, _>(index) {
        return CellValue::String(v);
    }
    CellValue::Null
}

#[cfg(feature = "mssql")]
pub fn decode_mssql_rows(rows: Vec<tiberius::Row>) -> ResultSet {
    let columns: Vec<String> = rows
        .first()
        .map(|r| r.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let decoded_rows = rows
        .iter()
        .map(|row| {
            (0..row.len())
                .map(|i| decode_mssql_cell(row, i))
                .collect::<Vec<_>>()
        })
        .collect();

    ResultSet { columns, rows: decoded_rows }
}

#[cfg(feature = "mssql")]
fn decode_mssql_cell(row: &tiberius::Row, index: usize) -> CellValue {
    if let Ok(Some(v)) = row.try_get::<i64, _>(index) {
        return CellValue::Int(v);
    }
    if let Ok(Some(v)) = row.try_get::<i32, _>(index) {
        return CellValue::Int(v as i64);
    }
    if let Ok(Some(v)) = row.try_get::<bool, _>(index) {
        return CellValue::Bool(v);
    }
    if let Ok(Some(v)) = row.try_get::<f64, _>(index) {
        return CellValue::Float(v);
    }
    if let Ok(Some(v)) = row.try_get::<&str, _>(index) {
        return CellValue::String(v.to_string());
    }
    CellValue::Null
}
