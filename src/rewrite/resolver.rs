use std::time::Instant;

use rootcause::Report;
use tracing::instrument;

use crate::engine::{QueryEngine, QueryResult};
use crate::metrics::names;
use crate::result::ReportExt;

use super::detect::{SubqueryMatch, subquery_matches_find};
use super::literal::{replacement_build, values_collect};
use super::observer::{RewriteObserver, TracingObserver};
use super::{DEFAULT_MAX_PASSES, RewriteError, RewriteResult};

/// Query text after the rewrite loop, before final execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub query: String,
    pub passes: usize,
    /// Sub-selects were still present when the pass limit was reached.
    pub exhausted: bool,
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub rewrite: Rewrite,
    pub result: QueryResult,
}

/// Drives sub-select resolution against a [`QueryEngine`].
#[derive(Debug, Clone)]
pub struct SubqueryResolver<E, O = TracingObserver> {
    engine: E,
    observer: O,
    max_passes: usize,
}

impl<E: QueryEngine> SubqueryResolver<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            observer: TracingObserver,
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

impl<E: QueryEngine, O: RewriteObserver> SubqueryResolver<E, O> {
    pub fn with_observer<P: RewriteObserver>(self, observer: P) -> SubqueryResolver<E, P> {
        SubqueryResolver {
            engine: self.engine,
            observer,
            max_passes: self.max_passes,
        }
    }

    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Rewrite `query` and run the result, returning the engine's rows
    /// untouched.
    #[instrument(skip_all, fields(max_passes = self.max_passes))]
    pub async fn resolve(&self, query: &str) -> RewriteResult<Resolution> {
        let started_at = Instant::now();
        metrics::counter!(names::REWRITES_TOTAL).increment(1);

        let rewrite = self.rewrite(query).await?;
        self.observer.query_resolved(&rewrite.query, rewrite.passes);

        let result = match self.engine.execute(&rewrite.query).await {
            Ok(result) => result,
            Err(error) => {
                self.observer.final_query_failed(&rewrite.query, &error);
                return Err(Report::new(RewriteError::FinalQueryFailed {
                    message: error.to_string(),
                })
                .attach_loc("executing resolved query"));
            }
        };

        metrics::histogram!(names::REWRITE_LATENCY_SECONDS)
            .record(started_at.elapsed().as_secs_f64());

        Ok(Resolution { rewrite, result })
    }

    /// Replace sub-selects with literals until none remain or the pass
    /// limit is hit.
    pub async fn rewrite(&self, query: &str) -> RewriteResult<Rewrite> {
        let mut current = query.to_owned();
        let mut passes = 0;

        let exhausted = loop {
            let matches = subquery_matches_find(&current);
            if matches.is_empty() {
                break false;
            }
            if passes >= self.max_passes {
                self.observer.passes_exhausted(self.max_passes, &current);
                break true;
            }

            passes += 1;
            self.observer.pass_started(passes, &current, &matches);
            current = self
                .pass_run(passes, &current, &matches)
                .await
                .attach_pass(passes)?;
        };

        Ok(Rewrite {
            query: current,
            passes,
            exhausted,
        })
    }

    /// Execute every match of one pass, then splice all replacements into a
    /// fresh copy of `query`.
    async fn pass_run(
        &self,
        pass: usize,
        query: &str,
        matches: &[SubqueryMatch],
    ) -> RewriteResult<String> {
        let mut replacements = Vec::with_capacity(matches.len());

        // rightmost first, so each recorded offset stays valid while the
        // text after it changes length; ordinals count in that order
        for (index, subquery) in matches.iter().rev().enumerate() {
            let ordinal = index + 1;

            let result = match self.engine.execute(&subquery.inner).await {
                Ok(result) => result,
                Err(error) => {
                    self.observer.subquery_failed(pass, ordinal, subquery, &error);
                    return Err(Report::new(RewriteError::SubqueryFailed {
                        pass,
                        ordinal,
                        message: error.to_string(),
                    }));
                }
            };

            let values = values_collect(&result);
            let replacement = replacement_build(subquery, &values);
            self.observer
                .subquery_resolved(pass, ordinal, subquery, &replacement, values.len());

            replacements.push((subquery.span(), replacement));
        }

        let mut rewritten = query.to_owned();
        for (span, replacement) in replacements {
            rewritten.replace_range(span, &replacement);
        }

        Ok(rewritten)
    }
}
