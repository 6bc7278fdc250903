use tracing::{debug, error, info, trace, warn};

use crate::engine::EngineError;
use crate::metrics::names;
use crate::tracing_utils::query_preview;

use super::detect::SubqueryMatch;

const PREVIEW_CHARS: usize = 200;

/// Receives progress events from [`super::SubqueryResolver`].
///
/// All methods default to doing nothing, so an observer only implements
/// the events it cares about. `()` is the silent observer.
pub trait RewriteObserver {
    fn pass_started(&self, _pass: usize, _query: &str, _matches: &[SubqueryMatch]) {}

    fn subquery_resolved(
        &self,
        _pass: usize,
        _ordinal: usize,
        _subquery: &SubqueryMatch,
        _replacement: &str,
        _value_count: usize,
    ) {
    }

    fn subquery_failed(
        &self,
        _pass: usize,
        _ordinal: usize,
        _subquery: &SubqueryMatch,
        _error: &EngineError,
    ) {
    }

    /// Sub-selects remain after `max_passes` passes; the partial text is
    /// executed anyway.
    fn passes_exhausted(&self, _max_passes: usize, _query: &str) {}

    fn query_resolved(&self, _query: &str, _passes: usize) {}

    fn final_query_failed(&self, _query: &str, _error: &EngineError) {}
}

impl RewriteObserver for () {}

impl<O: RewriteObserver> RewriteObserver for &O {
    fn pass_started(&self, pass: usize, query: &str, matches: &[SubqueryMatch]) {
        (**self).pass_started(pass, query, matches);
    }

    fn subquery_resolved(
        &self,
        pass: usize,
        ordinal: usize,
        subquery: &SubqueryMatch,
        replacement: &str,
        value_count: usize,
    ) {
        (**self).subquery_resolved(pass, ordinal, subquery, replacement, value_count);
    }

    fn subquery_failed(
        &self,
        pass: usize,
        ordinal: usize,
        subquery: &SubqueryMatch,
        error: &EngineError,
    ) {
        (**self).subquery_failed(pass, ordinal, subquery, error);
    }

    fn passes_exhausted(&self, max_passes: usize, query: &str) {
        (**self).passes_exhausted(max_passes, query);
    }

    fn query_resolved(&self, query: &str, passes: usize) {
        (**self).query_resolved(query, passes);
    }

    fn final_query_failed(&self, query: &str, error: &EngineError) {
        (**self).final_query_failed(query, error);
    }
}

/// Emits `tracing` events and `metrics` counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl RewriteObserver for TracingObserver {
    fn pass_started(&self, pass: usize, query: &str, matches: &[SubqueryMatch]) {
        metrics::counter!(names::REWRITE_PASSES).increment(1);
        debug!(
            pass,
            subqueries = matches.len(),
            query = %query_preview(query, PREVIEW_CHARS),
            "pass started"
        );
    }

    fn subquery_resolved(
        &self,
        pass: usize,
        ordinal: usize,
        subquery: &SubqueryMatch,
        replacement: &str,
        value_count: usize,
    ) {
        metrics::counter!(names::SUBQUERIES_EXECUTED).increment(1);
        metrics::histogram!(names::SUBQUERY_VALUES).record(value_count as f64);
        trace!(
            pass,
            ordinal,
            offset = subquery.offset,
            subquery = %query_preview(&subquery.inner, PREVIEW_CHARS),
            "subquery executed"
        );
        debug!(
            pass,
            ordinal,
            values = value_count,
            replacement = %query_preview(replacement, PREVIEW_CHARS),
            "subquery resolved"
        );
    }

    fn subquery_failed(
        &self,
        pass: usize,
        ordinal: usize,
        subquery: &SubqueryMatch,
        error: &EngineError,
    ) {
        metrics::counter!(names::SUBQUERIES_FAILED).increment(1);
        error!(
            pass,
            ordinal,
            subquery = %query_preview(&subquery.inner, PREVIEW_CHARS),
            "subquery failed: {error}"
        );
    }

    fn passes_exhausted(&self, max_passes: usize, query: &str) {
        metrics::counter!(names::REWRITE_PASSES_EXHAUSTED).increment(1);
        warn!(
            max_passes,
            query = %query_preview(query, PREVIEW_CHARS),
            "max passes reached with sub-selects remaining"
        );
    }

    fn query_resolved(&self, query: &str, passes: usize) {
        info!(
            passes,
            query = %query_preview(query, PREVIEW_CHARS),
            "query resolved"
        );
    }

    fn final_query_failed(&self, query: &str, error: &EngineError) {
        metrics::counter!(names::FINAL_QUERIES_FAILED).increment(1);
        error!(
            query = %query_preview(query, PREVIEW_CHARS),
            "final query failed: {error}"
        );
    }
}
