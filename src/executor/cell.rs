//! A single decoded result-set cell, normalized across all four drivers
//! (spec.md §4.8 step 4: "normalize driver-specific null sentinels to a
//! single null value").

use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl CellValue {
    pub fn into_json(self) -> JsonValue {
        match self {
            CellValue::String(s) => JsonValue::String(s),
            CellValue::Int(i) => JsonValue::from(i),
            CellValue::Float(f) => JsonValue::from(f),
            CellValue::Bool(b) => JsonValue::Bool(b),
            CellValue::Null => JsonValue::Null,
        }
    }
}

/// One result set: column name -> index, plus rows of cells in column order.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl ResultSet {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}
