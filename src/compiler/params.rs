//! Accumulating parameter collection threaded through compilation (spec.md §4.6).
//!
//! Every SQL literal that could vary with user input becomes a bound
//! parameter here; nothing from a [`FilterValue`] or mutation input is ever
//! interpolated into the generated SQL text (spec.md §8 property 1).

use crate::dialect::Dialect;
use crate::query_tree::FilterValue;

#[derive(Debug, Clone)]
pub struct ParamCollection {
    values: Vec<FilterValue>,
    /// `values.len()` at the start of the statement currently being compiled.
    /// Dialects whose driver binds each statement against only its own slice
    /// of `values` (everything but `tiberius`) need placeholders numbered
    /// 1-based from here, not from the start of the whole request.
    statement_base: usize,
}

impl ParamCollection {
    pub fn new() -> Self {
        Self { values: Vec::new(), statement_base: 0 }
    }

    /// Marks the start of a new statement: subsequent `push` calls number
    /// placeholders relative to this point for non-global dialects.
    pub fn begin_statement(&mut self) {
        self.statement_base = self.values.len();
    }

    /// Append a value and return the placeholder text to splice into SQL.
    pub fn push(&mut self, dialect: &dyn Dialect, value: FilterValue) -> String {
        self.values.push(value);
        let index = if dialect.placeholders_are_global() {
            self.values.len()
        } else {
            self.values.len() - self.statement_base
        };
        dialect.parameter_placeholder(index)
    }

    pub fn values(&self) -> &[FilterValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<FilterValue> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for ParamCollection {
    fn default() -> Self {
        Self::new()
    }
}
