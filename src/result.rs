//! Breadcrumbs for `rootcause` reports.
//!
//! A failed sub-select travels up through the pass loop and `resolve`; each
//! hop may note where it passed:
//!
//! ```text
//!  ● Subquery #2 (pass 1) failed: Query engine error: unknown table 't2'
//!  ├ src/rewrite/resolver.rs:151
//!  ╰ in pass 1 at src/rewrite/resolver.rs:122
//! ```

use std::fmt;

use rootcause::Report;
use rootcause::hooks::builtin_hooks::location::Location;

#[derive(Debug, Clone)]
pub struct Breadcrumb {
    pub note: String,
    pub location: Location,
}

impl fmt::Display for Breadcrumb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.note, self.location)
    }
}

fn crumb_attach<C>(report: Report<C>, note: String, location: Location) -> Report<C> {
    report.attach(Breadcrumb { note, location })
}

pub trait ReportExt: Sized {
    /// Note `note` with the caller's file:line.
    fn attach_loc(self, note: impl Into<String>) -> Self;

    #[track_caller]
    fn attach_pass(self, pass: usize) -> Self {
        self.attach_loc(format!("in pass {pass}"))
    }
}

impl<C> ReportExt for Report<C> {
    #[track_caller]
    fn attach_loc(self, note: impl Into<String>) -> Self {
        crumb_attach(self, note.into(), Location::caller())
    }
}

impl<T, C> ReportExt for Result<T, Report<C>> {
    #[track_caller]
    fn attach_loc(self, note: impl Into<String>) -> Self {
        // captured here; inside the closure it would point at map_err
        let location = Location::caller();
        self.map_err(|report| crumb_attach(report, note.into(), location))
    }
}
