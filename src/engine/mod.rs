//! Query engine collaborator.
//!
//! The rewriter only needs one operation from the engine: run a query string
//! and hand back the rows, or the engine's error message. [`QueryEngine`] is
//! that seam; [`http::HttpEngine`] talks to a search daemon over its SQL
//! HTTP endpoint.

pub mod http;

use std::future::Future;

use error_set::error_set;
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

error_set! {
    EngineError := {
        #[display("Query engine error: {message}")]
        Query { message: String },
        #[display("Invalid engine response: {message}")]
        InvalidResponse { message: String },
        Transport(reqwest::Error),
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Executes query text against a search engine.
pub trait QueryEngine {
    fn execute(&self, query: &str) -> impl Future<Output = EngineResult<QueryResult>> + Send;
}

impl<E: QueryEngine + Sync> QueryEngine for &E {
    fn execute(&self, query: &str) -> impl Future<Output = EngineResult<QueryResult>> + Send {
        (**self).execute(query)
    }
}

/// A single cell of a result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ColumnValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for ColumnValue {
    fn from(value: i64) -> Self {
        ColumnValue::Integer(value)
    }
}

impl From<f64> for ColumnValue {
    fn from(value: f64) -> Self {
        ColumnValue::Float(value)
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        ColumnValue::Text(value.to_owned())
    }
}

impl From<String> for ColumnValue {
    fn from(value: String) -> Self {
        ColumnValue::Text(value)
    }
}

/// One result row: columns in the order the engine reported them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, ColumnValue)>,
}

impl Row {
    pub fn first(&self) -> Option<&ColumnValue> {
        self.columns.first().map(|(_, value)| value)
    }

    pub fn get(&self, name: &str) -> Option<&ColumnValue> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|(_, value)| value)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (name, value) in &self.columns {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<N: Into<String>, V: Into<ColumnValue>> FromIterator<(N, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}

/// Rows returned by a successful query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl QueryResult {
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let columns = rows
            .first()
            .map(|row| row.columns().map(|(name, _)| name.to_owned()).collect())
            .unwrap_or_default();

        Self {
            columns,
            rows,
            total: None,
            warning: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
