//! Resolves `IN (SELECT ...)` and scalar `= (SELECT ...)` sub-selects for
//! engines that cannot run them, by executing each sub-select separately and
//! inlining its rows into the enclosing query.

pub mod engine;
pub mod metrics;
pub mod request;
pub mod result;
pub mod rewrite;
pub mod settings;
pub mod tracing_utils;
