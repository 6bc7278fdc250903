#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;

use subquery_resolver_lib::engine::{
    ColumnValue, EngineError, EngineResult, QueryEngine, QueryResult, Row,
};
use subquery_resolver_lib::rewrite::{RewriteObserver, SubqueryMatch};

enum Answer {
    Rows(QueryResult),
    Failure(String),
}

/// In-memory engine answering from a script keyed by exact query text.
///
/// Unscripted queries get an empty result set. Every query is logged in
/// arrival order.
#[derive(Default)]
pub struct ScriptedEngine {
    script: HashMap<String, Answer>,
    executed: Mutex<Vec<String>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-column rows, one per value.
    pub fn rows(self, query: &str, values: Vec<ColumnValue>) -> Self {
        let rows = values
            .into_iter()
            .map(|value| [("value", value)].into_iter().collect::<Row>())
            .collect();
        self.result(query, QueryResult::from_rows(rows))
    }

    pub fn result(mut self, query: &str, result: QueryResult) -> Self {
        self.script.insert(query.to_owned(), Answer::Rows(result));
        self
    }

    pub fn fail(mut self, query: &str, message: &str) -> Self {
        self.script
            .insert(query.to_owned(), Answer::Failure(message.to_owned()));
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

impl QueryEngine for ScriptedEngine {
    async fn execute(&self, query: &str) -> EngineResult<QueryResult> {
        self.executed.lock().unwrap().push(query.to_owned());
        match self.script.get(query) {
            Some(Answer::Rows(result)) => Ok(result.clone()),
            Some(Answer::Failure(message)) => Err(EngineError::Query {
                message: message.clone(),
            }),
            None => Ok(QueryResult::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    PassStarted { pass: usize, subqueries: usize },
    SubqueryResolved { pass: usize, ordinal: usize, replacement: String },
    SubqueryFailed { pass: usize, ordinal: usize },
    PassesExhausted { max_passes: usize },
    QueryResolved { passes: usize },
    FinalQueryFailed,
}

/// Observer keeping every event for later assertions.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl RewriteObserver for RecordingObserver {
    fn pass_started(&self, pass: usize, _query: &str, matches: &[SubqueryMatch]) {
        self.push(Event::PassStarted {
            pass,
            subqueries: matches.len(),
        });
    }

    fn subquery_resolved(
        &self,
        pass: usize,
        ordinal: usize,
        _subquery: &SubqueryMatch,
        replacement: &str,
        _value_count: usize,
    ) {
        self.push(Event::SubqueryResolved {
            pass,
            ordinal,
            replacement: replacement.to_owned(),
        });
    }

    fn subquery_failed(
        &self,
        pass: usize,
        ordinal: usize,
        _subquery: &SubqueryMatch,
        _error: &EngineError,
    ) {
        self.push(Event::SubqueryFailed { pass, ordinal });
    }

    fn passes_exhausted(&self, max_passes: usize, _query: &str) {
        self.push(Event::PassesExhausted { max_passes });
    }

    fn query_resolved(&self, _query: &str, passes: usize) {
        self.push(Event::QueryResolved { passes });
    }

    fn final_query_failed(&self, _query: &str, _error: &EngineError) {
        self.push(Event::FinalQueryFailed);
    }
}

/// `SELECT * FROM t WHERE a IN (SELECT a FROM t1 WHERE a IN (...))` nested
/// `depth` levels deep; the innermost level is `SELECT a FROM t{depth}`.
pub fn nested_query(depth: usize) -> String {
    let innermost = format!("(SELECT a FROM t{depth})");
    let body = (1..depth).rev().fold(innermost, |inner, level| {
        format!("(SELECT a FROM t{level} WHERE a IN {inner})")
    });
    format!("SELECT * FROM t WHERE a IN {body}")
}
