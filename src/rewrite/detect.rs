use std::ops::Range;

/// Comparison operators that may precede a scalar sub-select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    LtGt,
    LtEq,
    GtEq,
    Lt,
    Gt,
}

impl ComparisonOp {
    /// Two-character tokens come first so `<=` is never read as `<` plus a
    /// stray `=`.
    const LONGEST_FIRST: [ComparisonOp; 7] = [
        ComparisonOp::NotEq,
        ComparisonOp::LtGt,
        ComparisonOp::LtEq,
        ComparisonOp::GtEq,
        ComparisonOp::Eq,
        ComparisonOp::Lt,
        ComparisonOp::Gt,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::NotEq => "!=",
            ComparisonOp::LtGt => "<>",
            ComparisonOp::LtEq => "<=",
            ComparisonOp::GtEq => ">=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Gt => ">",
        }
    }

    fn trailing(text: &str) -> Option<ComparisonOp> {
        Self::LONGEST_FIRST
            .into_iter()
            .find(|op| text.ends_with(op.as_str()))
    }
}

/// How the enclosing query consumes a sub-select's rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchContext {
    /// `IN` / `NOT IN`; holds the keyword as written in the query.
    List { keyword: String },
    /// Comparison against a single value.
    Scalar(ComparisonOp),
}

/// A sub-select found in the current query text.
///
/// The span covers the keyword or operator through the closing parenthesis,
/// so the whole span is replaced by the resolved form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubqueryMatch {
    pub offset: usize,
    pub len: usize,
    pub context: MatchContext,
    /// Sub-select body without the wrapping parentheses.
    pub inner: String,
}

impl SubqueryMatch {
    pub fn span(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

#[derive(Debug, Clone, Copy)]
struct ParenGroup {
    open: usize,
    close: usize,
}

impl ParenGroup {
    fn contains(&self, other: &ParenGroup) -> bool {
        self.open < other.open && other.close < self.close
    }
}

/// Find the sub-selects that can be resolved in this pass.
///
/// Only innermost sub-selects are returned: one whose body still holds
/// another `IN`/comparison sub-select waits for a later pass. Matches are
/// ordered by offset and never overlap.
pub fn subquery_matches_find(query: &str) -> Vec<SubqueryMatch> {
    let candidates: Vec<(ParenGroup, SubqueryMatch)> = paren_groups_find(query)
        .into_iter()
        .filter(|group| group_is_select(query, group))
        .filter_map(|group| group_classify(query, group).map(|m| (group, m)))
        .collect();

    let mut matches: Vec<SubqueryMatch> = candidates
        .iter()
        .filter(|(group, _)| !candidates.iter().any(|(other, _)| group.contains(other)))
        .map(|(_, m)| m.clone())
        .collect();

    matches.sort_by_key(|m| m.offset);
    matches
}

/// True if the query holds an `IN (SELECT ...)` or `NOT IN (SELECT ...)`
/// at any depth.
pub fn query_has_list_subquery(query: &str) -> bool {
    paren_groups_find(query)
        .into_iter()
        .filter(|group| group_is_select(query, group))
        .filter_map(|group| group_classify(query, group))
        .any(|m| matches!(m.context, MatchContext::List { .. }))
}

/// Pair up parentheses outside of quoted strings and backtick identifiers.
/// Unmatched parentheses are dropped.
fn paren_groups_find(query: &str) -> Vec<ParenGroup> {
    let bytes = query.as_bytes();
    let mut groups = Vec::new();
    let mut open_stack = Vec::new();

    let mut i = 0;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'\'' | b'"' | b'`' => i = quoted_end(bytes, i),
            b'(' => open_stack.push(i),
            b')' => {
                if let Some(open) = open_stack.pop() {
                    groups.push(ParenGroup { open, close: i });
                }
            }
            _ => {}
        }
        i += 1;
    }

    groups
}

/// Index of the closing quote for the quote at `start`, or the last index of
/// the input for an unterminated literal.
fn quoted_end(bytes: &[u8], start: usize) -> usize {
    let Some(&quote) = bytes.get(start) else {
        return start;
    };

    let mut i = start + 1;
    while let Some(&b) = bytes.get(i) {
        if b == b'\\' && quote != b'`' {
            i += 2;
            continue;
        }
        if b == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i;
        }
        i += 1;
    }

    bytes.len().saturating_sub(1)
}

fn group_is_select(query: &str, group: &ParenGroup) -> bool {
    let Some(body) = query.get(group.open + 1..group.close) else {
        return false;
    };
    let body = body.trim_start().as_bytes();

    const SELECT: &[u8] = b"SELECT";
    match body.get(..SELECT.len()) {
        Some(keyword) if keyword.eq_ignore_ascii_case(SELECT) => body
            .get(SELECT.len())
            .is_none_or(|&b| !is_word_byte(b)),
        _ => false,
    }
}

/// Decide whether the text before `group` makes it a list or scalar
/// sub-select, and build the match covering that prefix.
fn group_classify(query: &str, group: ParenGroup) -> Option<SubqueryMatch> {
    let prefix = query.get(..group.open)?.trim_end();
    let inner = query.get(group.open + 1..group.close)?.trim().to_owned();
    let end = group.close + 1;

    let (offset, context) = if let Some(start) = list_keyword_start(prefix) {
        let keyword = prefix.get(start..)?.to_owned();
        (start, MatchContext::List { keyword })
    } else if let Some(op) = ComparisonOp::trailing(prefix) {
        (prefix.len() - op.as_str().len(), MatchContext::Scalar(op))
    } else {
        // FROM, JOIN, EXISTS, function arguments: left to the engine
        return None;
    };

    Some(SubqueryMatch {
        offset,
        len: end - offset,
        context,
        inner,
    })
}

/// Start of a trailing `IN` or `NOT IN` keyword in `prefix`.
fn list_keyword_start(prefix: &str) -> Option<usize> {
    let (in_start, word) = trailing_word(prefix)?;
    if !word.eq_ignore_ascii_case("IN") {
        return None;
    }

    let before = prefix.get(..in_start)?;
    let trimmed = before.trim_end();
    if trimmed.len() < before.len()
        && let Some((not_start, word)) = trailing_word(trimmed)
        && word.eq_ignore_ascii_case("NOT")
    {
        return Some(not_start);
    }

    Some(in_start)
}

fn trailing_word(text: &str) -> Option<(usize, &str)> {
    let start = text
        .bytes()
        .rposition(|b| !is_word_byte(b))
        .map_or(0, |pos| pos + 1);
    let word = text.get(start..)?;

    (!word.is_empty()).then_some((start, word))
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spanned<'a>(query: &'a str, m: &SubqueryMatch) -> &'a str {
        &query[m.span()]
    }

    #[test]
    fn test_in_subquery() {
        let query = "SELECT * FROM t WHERE id IN (SELECT id FROM t2 WHERE x > 5)";
        let matches = subquery_matches_find(query);

        assert_eq!(matches.len(), 1);
        let m = &matches[0];
        assert_eq!(spanned(query, m), "IN (SELECT id FROM t2 WHERE x > 5)");
        assert_eq!(m.inner, "SELECT id FROM t2 WHERE x > 5");
        assert_eq!(
            m.context,
            MatchContext::List {
                keyword: "IN".to_owned()
            }
        );
    }

    #[test]
    fn test_not_in_subquery_keeps_keyword() {
        let query = "select * from t where id not   in(  select id from banned )";
        let matches = subquery_matches_find(query);

        assert_eq!(matches.len(), 1);
        assert_eq!(
            matches[0].context,
            MatchContext::List {
                keyword: "not   in".to_owned()
            }
        );
        assert_eq!(matches[0].inner, "select id from banned");
        assert_eq!(
            spanned(query, &matches[0]),
            "not   in(  select id from banned )"
        );
    }

    #[test]
    fn test_scalar_subquery_with_function_call() {
        let query = "SELECT * FROM t WHERE price = (SELECT MAX(price) FROM t2)";
        let matches = subquery_matches_find(query);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].context, MatchContext::Scalar(ComparisonOp::Eq));
        assert_eq!(matches[0].inner, "SELECT MAX(price) FROM t2");
        assert_eq!(
            spanned(query, &matches[0]),
            "= (SELECT MAX(price) FROM t2)"
        );
    }

    #[test]
    fn test_operator_longest_match() {
        let cases = [
            ("a <= (SELECT 1)", ComparisonOp::LtEq),
            ("a >= (SELECT 1)", ComparisonOp::GtEq),
            ("a != (SELECT 1)", ComparisonOp::NotEq),
            ("a <> (SELECT 1)", ComparisonOp::LtGt),
            ("a < (SELECT 1)", ComparisonOp::Lt),
            ("a > (SELECT 1)", ComparisonOp::Gt),
            ("a=(SELECT 1)", ComparisonOp::Eq),
        ];

        for (query, expected) in cases {
            let matches = subquery_matches_find(query);
            assert_eq!(matches.len(), 1, "{query}");
            assert_eq!(matches[0].context, MatchContext::Scalar(expected), "{query}");
            assert_eq!(
                spanned(query, &matches[0]),
                query.trim_start_matches('a').trim_start(),
                "{query}"
            );
        }
    }

    #[test]
    fn test_from_subquery_untouched() {
        let query = "SELECT * FROM (SELECT id FROM t WHERE x = 1) AS d WHERE d.id > 3";
        assert!(subquery_matches_find(query).is_empty());
        assert!(!query_has_list_subquery(query));
    }

    #[test]
    fn test_exists_and_join_untouched() {
        assert!(
            subquery_matches_find("SELECT 1 FROM t WHERE EXISTS (SELECT 1 FROM t2)").is_empty()
        );
        assert!(
            subquery_matches_find("SELECT * FROM t JOIN (SELECT id FROM t2) x ON x.id = t.id")
                .is_empty()
        );
        assert!(subquery_matches_find("SELECT * FROM t WHERE a WITHIN (SELECT 1)").is_empty());
    }

    #[test]
    fn test_in_list_without_select_untouched() {
        let query = "SELECT * FROM t WHERE id IN (1, 2, 3) AND name IN ('selection')";
        assert!(subquery_matches_find(query).is_empty());
    }

    #[test]
    fn test_selector_identifier_is_not_select() {
        let query = "SELECT * FROM t WHERE id IN (selector_id)";
        assert!(subquery_matches_find(query).is_empty());
    }

    #[test]
    fn test_quoted_text_ignored() {
        let query = "SELECT * FROM t WHERE title = 'x IN (SELECT y' AND id IN (SELECT id FROM t2 WHERE s = ')')";
        let matches = subquery_matches_find(query);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].inner, "SELECT id FROM t2 WHERE s = ')'");
    }

    #[test]
    fn test_escaped_quotes() {
        let query = r"SELECT * FROM t WHERE a = 'it\'s (' AND b IN (SELECT b FROM t2 WHERE c = 'o''k')";
        let matches = subquery_matches_find(query);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].inner, "SELECT b FROM t2 WHERE c = 'o''k'");
    }

    #[test]
    fn test_unbalanced_group_ignored() {
        let query = "SELECT * FROM t WHERE id IN (SELECT id FROM t2";
        assert!(subquery_matches_find(query).is_empty());
    }

    #[test]
    fn test_multiple_matches_ordered_by_offset() {
        let query = "SELECT * FROM t WHERE a = (SELECT MIN(a) FROM t2) AND b NOT IN (SELECT b FROM t3) OR c IN (SELECT c FROM t4)";
        let matches = subquery_matches_find(query);

        assert_eq!(matches.len(), 3);
        assert!(matches.windows(2).all(|w| w[0].span().end <= w[1].offset));
        assert_eq!(matches[0].context, MatchContext::Scalar(ComparisonOp::Eq));
        assert_eq!(
            matches[1].context,
            MatchContext::List {
                keyword: "NOT IN".to_owned()
            }
        );
        assert_eq!(matches[2].inner, "SELECT c FROM t4");
    }

    #[test]
    fn test_nested_returns_innermost_only() {
        let query = "SELECT * FROM t WHERE a IN (SELECT a FROM t2 WHERE b IN (SELECT b FROM t3 WHERE c > (SELECT AVG(c) FROM t4)))";
        let matches = subquery_matches_find(query);

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].inner, "SELECT AVG(c) FROM t4");
        assert_eq!(matches[0].context, MatchContext::Scalar(ComparisonOp::Gt));
        assert!(query_has_list_subquery(query));
    }

    #[test]
    fn test_sub_select_inside_from_subquery() {
        let query = "SELECT * FROM (SELECT * FROM t WHERE id IN (SELECT id FROM t2)) AS d";
        let matches = subquery_matches_find(query);

        assert_eq!(matches.len(), 1);
        assert_eq!(spanned(query, &matches[0]), "IN (SELECT id FROM t2)");
    }

    #[test]
    fn test_sibling_inner_subqueries_in_one_body() {
        let query = "SELECT * FROM t WHERE a IN (SELECT a FROM t2 WHERE b IN (SELECT b FROM t3) AND c = (SELECT MAX(c) FROM t4))";
        let matches = subquery_matches_find(query);

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].inner, "SELECT b FROM t3");
        assert_eq!(matches[1].inner, "SELECT MAX(c) FROM t4");
    }

    #[test]
    fn test_scalar_only_is_not_list_subquery() {
        let query = "SELECT * FROM t WHERE price >= (SELECT AVG(price) FROM t)";
        assert_eq!(subquery_matches_find(query).len(), 1);
        assert!(!query_has_list_subquery(query));

        // a list sub-select hidden behind a scalar one still counts
        let query = "SELECT * FROM t WHERE a = (SELECT MAX(a) FROM t2 WHERE b IN (SELECT b FROM t3))";
        assert!(query_has_list_subquery(query));
    }

    #[test]
    fn test_plain_query_has_no_matches() {
        let query = "SELECT id, title FROM products WHERE price > 10 ORDER BY id";
        assert!(subquery_matches_find(query).is_empty());
        assert!(!query_has_list_subquery(query));
    }
}
