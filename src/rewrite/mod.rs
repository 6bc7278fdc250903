//! Sub-select resolution.
//!
//! Queries reaching this module may carry `IN (SELECT ...)`,
//! `NOT IN (SELECT ...)` or `<op> (SELECT ...)` sub-selects the engine cannot
//! run itself. Each pass finds the innermost sub-selects, runs them, and
//! splices their rows back into the text as literals; passes repeat until the
//! text has no sub-selects left.

mod detect;
mod literal;
mod observer;
mod resolver;

use error_set::error_set;
use rootcause::Report;

error_set! {
    RewriteError := {
        #[display("Subquery #{ordinal} (pass {pass}) failed: {message}")]
        SubqueryFailed { pass: usize, ordinal: usize, message: String },
        #[display("Final query failed: {message}")]
        FinalQueryFailed { message: String },
    }
}

/// Result type with location-tracking error reports for rewrite operations.
pub type RewriteResult<T> = Result<T, Report<RewriteError>>;

/// Upper bound on detect/execute/substitute passes for a single query.
pub const DEFAULT_MAX_PASSES: usize = 10;

pub use detect::{
    ComparisonOp, MatchContext, SubqueryMatch, query_has_list_subquery, subquery_matches_find,
};
pub use literal::{ResolvedValue, list_literal, replacement_build, scalar_literal, values_collect};
pub use observer::{RewriteObserver, TracingObserver};
pub use resolver::{Resolution, Rewrite, SubqueryResolver};
