//! Incoming request payloads and the check deciding whether a query needs
//! sub-select resolution at all.

use serde::Deserialize;

use crate::rewrite::query_has_list_subquery;

/// Body of an incoming request: bare SQL, a JSON string, or a JSON object
/// with a `query` field.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RequestPayload {
    Raw(String),
    Object {
        #[serde(default)]
        query: Option<String>,
    },
}

impl RequestPayload {
    /// Decode `input` as JSON when possible, otherwise take it as raw SQL.
    pub fn parse(input: &str) -> Self {
        serde_json::from_str(input).unwrap_or_else(|_| RequestPayload::Raw(input.to_owned()))
    }

    /// Trimmed query text; empty when the payload carries none.
    pub fn query(&self) -> &str {
        match self {
            RequestPayload::Raw(query) => query.trim(),
            RequestPayload::Object { query } => query.as_deref().map_or("", str::trim),
        }
    }
}

/// A query qualifies when it is a `SELECT` carrying at least one
/// `IN`/`NOT IN` sub-select.
pub fn query_qualifies(query: &str) -> bool {
    query_is_select(query) && query_has_list_subquery(query)
}

fn query_is_select(query: &str) -> bool {
    let bytes = query.trim_start().as_bytes();
    match (bytes.get(..6), bytes.get(6)) {
        (Some(keyword), Some(next)) => {
            keyword.eq_ignore_ascii_case(b"SELECT") && next.is_ascii_whitespace()
        }
        _ => false,
    }
}
