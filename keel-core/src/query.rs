use crate::{Value, truncate_long};
use std::{
    fmt::{self, Display},
    mem,
    sync::Arc,
};

/// SQL text plus its ordered parameter bindings, ready to be sent to an [`crate::Executor`].
///
/// Operand values never appear inside `sql`, they are always bound through `params`
/// in the same left to right order as their markers.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, Vec::new())
    }
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

impl Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", truncate_long!(self.sql))?;
        if !self.params.is_empty() {
            write!(f, " -- {} parameter(s)", self.params.len())?;
        }
        Ok(())
    }
}

impl From<&str> for Statement {
    fn from(value: &str) -> Self {
        Statement::raw(value)
    }
}

impl From<String> for Statement {
    fn from(value: String) -> Self {
        Statement::raw(value)
    }
}

/// Metadata about modify operations (INSERT/UPDATE/DELETE).
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowsAffected {
    /// Total number of rows impacted.
    pub rows_affected: u64,
    /// Backend-specific last inserted / affected identifier when available.
    pub last_affected_id: Option<i64>,
}

/// Shared reference-counted column name list.
pub type RowNames = Arc<[String]>;
/// Owned row value slice matching `RowNames` length.
pub type Row = Box<[Value]>;

/// A result row with its corresponding column labels.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLabeled {
    /// Column names.
    pub labels: RowNames,
    /// Data values (aligned by index with `labels`).
    pub values: Row,
}

impl RowLabeled {
    pub fn new(names: RowNames, values: Row) -> Self {
        Self {
            labels: names,
            values,
        }
    }
    pub fn names(&self) -> &[String] {
        &self.labels
    }
    pub fn values(&self) -> &[Value] {
        &self.values
    }
    pub fn get_column(&self, name: &str) -> Option<&Value> {
        self.position(name).map(|i| &self.values[i])
    }
    /// Moves the value out of the row leaving a NULL in its place.
    pub fn take_column(&mut self, name: &str) -> Option<Value> {
        self.position(name)
            .map(|i| mem::take(&mut self.values[i]))
    }
    fn position(&self, name: &str) -> Option<usize> {
        self.labels
            .iter()
            .position(|v| v == name)
            .or_else(|| self.labels.iter().position(|v| v.eq_ignore_ascii_case(name)))
    }
}

/// Heterogeneous items emitted by `Executor::run` combining rows and modify results.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// A labeled row.
    Row(RowLabeled),
    /// A modify effect aggregation.
    Affected(RowsAffected),
}

impl Extend<RowsAffected> for RowsAffected {
    fn extend<T: IntoIterator<Item = RowsAffected>>(&mut self, iter: T) {
        for elem in iter {
            self.rows_affected += elem.rows_affected;
            if elem.last_affected_id.is_some() {
                self.last_affected_id = elem.last_affected_id;
            }
        }
    }
}

impl From<RowLabeled> for Row {
    fn from(value: RowLabeled) -> Self {
        value.values
    }
}

impl From<RowLabeled> for QueryResult {
    fn from(value: RowLabeled) -> Self {
        QueryResult::Row(value)
    }
}

impl From<RowsAffected> for QueryResult {
    fn from(value: RowsAffected) -> Self {
        QueryResult::Affected(value)
    }
}

/// Result sets of a batch, one entry per statement, in statement order.
pub type ResultSets = Vec<Vec<QueryResult>>;
