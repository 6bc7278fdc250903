use std::fmt;

use crate::engine::{ColumnValue, QueryResult};

use super::detect::{MatchContext, SubqueryMatch};

/// A value from a sub-select's first column, encoded as a SQL literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedValue(String);

impl ResolvedValue {
    /// Numbers stay bare; anything else becomes a quoted string.
    pub fn encode(raw: &str) -> Self {
        let trimmed = raw.trim();
        if is_numeric(trimmed) {
            return Self(trimmed.to_owned());
        }

        let mut quoted = String::with_capacity(raw.len() + 2);
        quoted.push('\'');
        for c in raw.chars() {
            if matches!(c, '\'' | '\\') {
                quoted.push('\\');
            }
            quoted.push(c);
        }
        quoted.push('\'');
        Self(quoted)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Collect literal values from the first column of every row.
///
/// Comma-joined strings (multi-valued attributes) expand into one value per
/// non-empty piece. NULLs contribute nothing.
pub fn values_collect(result: &QueryResult) -> Vec<ResolvedValue> {
    let mut values = Vec::new();

    for value in result.rows.iter().filter_map(|row| row.first()) {
        match value {
            ColumnValue::Null => {}
            ColumnValue::Integer(i) => values.push(ResolvedValue(i.to_string())),
            ColumnValue::Float(f) if f.is_finite() => values.push(ResolvedValue(f.to_string())),
            ColumnValue::Float(_) => {}
            ColumnValue::Text(s) if s.contains(',') => values.extend(
                s.split(',')
                    .map(str::trim)
                    .filter(|piece| !piece.is_empty())
                    .map(ResolvedValue::encode),
            ),
            ColumnValue::Text(s) => values.push(ResolvedValue::encode(s)),
        }
    }

    values
}

/// Parenthesized value list; an empty result becomes `(NULL)`, which no
/// `IN` test matches.
pub fn list_literal(values: &[ResolvedValue]) -> String {
    if values.is_empty() {
        return "(NULL)".to_owned();
    }

    let joined = values
        .iter()
        .map(ResolvedValue::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    format!("({joined})")
}

/// First value, or `NULL` when there is none. Extra values are dropped.
pub fn scalar_literal(values: &[ResolvedValue]) -> String {
    values
        .first()
        .map_or_else(|| "NULL".to_owned(), |value| value.0.clone())
}

/// Text that replaces the whole span of `subquery`.
pub fn replacement_build(subquery: &SubqueryMatch, values: &[ResolvedValue]) -> String {
    match &subquery.context {
        MatchContext::List { keyword } => format!("{keyword} {}", list_literal(values)),
        MatchContext::Scalar(op) => format!("{} {}", op.as_str(), scalar_literal(values)),
    }
}

/// Optional sign, digits with at most one decimal point, optional exponent.
fn is_numeric(s: &str) -> bool {
    let unsigned = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exponent) = match unsigned.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => (mantissa, Some(exponent)),
        None => (unsigned, None),
    };

    let mut digits = 0;
    let mut points = 0;
    for b in mantissa.bytes() {
        match b {
            b'0'..=b'9' => digits += 1,
            b'.' => points += 1,
            _ => return false,
        }
    }
    if digits == 0 || points > 1 {
        return false;
    }

    match exponent {
        None => true,
        Some(exponent) => {
            let exponent = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
            !exponent.is_empty() && exponent.bytes().all(|b| b.is_ascii_digit())
        }
    }
}
