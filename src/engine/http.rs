//! Engine client for the daemon's SQL-over-HTTP endpoint.
//!
//! Queries are POSTed form-encoded to `/sql?mode=raw`. The daemon answers
//! with a JSON array of result sets, or with a bare `{"error": ...}` object
//! when the request could not be processed at all.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::settings::EngineSettings;

use super::{ColumnValue, EngineError, EngineResult, QueryEngine, QueryResult, Row};

const SQL_ENDPOINT: &str = "sql?mode=raw";

#[derive(Debug, Clone)]
pub struct HttpEngine {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEngine {
    pub fn new(settings: &EngineSettings) -> EngineResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: endpoint_build(&settings.url),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl QueryEngine for HttpEngine {
    async fn execute(&self, query: &str) -> EngineResult<QueryResult> {
        trace!("POST {} query={}", self.endpoint, query);

        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("query", query)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!("engine responded {} ({} bytes)", status, body.len());

        status_apply(status, response_parse(&body))
    }
}

/// An undecodable body is blamed on the HTTP status when that status is not
/// a success; engine errors carried in a decoded body pass through.
fn status_apply(
    status: StatusCode,
    parsed: EngineResult<QueryResult>,
) -> EngineResult<QueryResult> {
    match parsed {
        Err(EngineError::InvalidResponse { message }) if !status.is_success() => {
            Err(EngineError::InvalidResponse {
                message: format!("HTTP {status}: {message}"),
            })
        }
        other => other,
    }
}

fn endpoint_build(base_url: &str) -> String {
    format!("{}/{SQL_ENDPOINT}", base_url.trim_end_matches('/'))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SqlResponse {
    ResultSets(Vec<ResultSet>),
    Failure { error: Value },
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    #[serde(default)]
    columns: Vec<Map<String, Value>>,
    #[serde(default)]
    data: Vec<Map<String, Value>>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    error: String,
    #[serde(default)]
    warning: String,
}

/// Decode a raw-mode response body into a [`QueryResult`].
///
/// Only the first result set is used.
pub fn response_parse(body: &str) -> EngineResult<QueryResult> {
    let response: SqlResponse =
        serde_json::from_str(body).map_err(|e| EngineError::InvalidResponse {
            message: e.to_string(),
        })?;

    let result_set = match response {
        SqlResponse::Failure { error } => {
            return Err(EngineError::Query {
                message: error_message(error),
            });
        }
        SqlResponse::ResultSets(sets) => match sets.into_iter().next() {
            Some(set) => set,
            None => return Ok(QueryResult::default()),
        },
    };

    if !result_set.error.is_empty() {
        return Err(EngineError::Query {
            message: result_set.error,
        });
    }

    // column order comes from the header; data objects are keyed by name
    let mut columns: Vec<String> = result_set
        .columns
        .iter()
        .filter_map(|column| column.keys().next().cloned())
        .collect();
    if columns.is_empty()
        && let Some(first) = result_set.data.first()
    {
        columns = first.keys().cloned().collect();
    }

    let rows = result_set
        .data
        .into_iter()
        .map(|mut data| {
            columns
                .iter()
                .map(|name| {
                    let value = data.remove(name).map(value_convert);
                    (name.clone(), value.unwrap_or(ColumnValue::Null))
                })
                .collect::<Row>()
        })
        .collect();

    Ok(QueryResult {
        columns,
        rows,
        total: result_set.total,
        warning: (!result_set.warning.is_empty()).then_some(result_set.warning),
    })
}

fn value_convert(value: Value) -> ColumnValue {
    match value {
        Value::Null => ColumnValue::Null,
        Value::Bool(b) => ColumnValue::Integer(i64::from(b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => ColumnValue::Integer(i),
            // u64 values above i64::MAX keep their exact digits
            None if n.is_u64() => ColumnValue::Text(n.to_string()),
            None => n.as_f64().map_or(ColumnValue::Null, ColumnValue::Float),
        },
        Value::String(s) => ColumnValue::Text(s),
        other @ (Value::Array(_) | Value::Object(_)) => ColumnValue::Text(other.to_string()),
    }
}

fn error_message(error: Value) -> String {
    match error {
        Value::String(s) => s,
        Value::Object(mut obj) => match obj.remove("reason") {
            Some(Value::String(reason)) => reason,
            _ => Value::Object(obj).to_string(),
        },
        other => other.to_string(),
    }
}
