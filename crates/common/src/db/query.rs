//! List query policy: pagination defaults and search filtering
//!
//! List requests arrive from a browser form, so paging fields may be numbers,
//! numeric strings, or junk. Anything that does not parse to a positive
//! integer falls back to the default.

use crate::db::models::SessionColumn;
use sea_orm::sea_query::{Expr, Func, LikeExpr};
use sea_orm::Condition;
use serde_json::Value;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PER_PAGE: u64 = 25;

/// Largest offset or limit the SQL drivers accept as a bound parameter
pub const MAX_BOUND: u64 = i64::MAX as u64;

const LIKE_ESCAPE: char = '!';

/// How much of the matching set to return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pagination {
    /// Every matching record, no count
    All,
    /// One page plus the total count; `page` is 1-based
    Page { page: u64, per_page: u64 },
}

impl Pagination {
    /// Rows to skip before the page starts, capped at [`MAX_BOUND`]
    pub fn offset(&self) -> u64 {
        match *self {
            Pagination::All => 0,
            Pagination::Page { page, per_page } => page
                .saturating_sub(1)
                .saturating_mul(per_page)
                .min(MAX_BOUND),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Pagination::Page {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

/// Parsed list request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListParams {
    pub pagination: Pagination,
    pub search: Option<String>,
}

impl ListParams {
    /// Build from loosely-typed request fields
    pub fn from_json(
        page: Option<&Value>,
        per_page: Option<&Value>,
        get_all: Option<&Value>,
        search_value: Option<&Value>,
    ) -> Self {
        let pagination = if get_all.is_some_and(is_truthy) {
            Pagination::All
        } else {
            Pagination::Page {
                page: positive_int(page).unwrap_or(DEFAULT_PAGE),
                per_page: positive_int(per_page).unwrap_or(DEFAULT_PER_PAGE),
            }
        };

        let search = search_value.and_then(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
            _ => None,
        });

        Self { pagination, search }
    }

    /// Case-insensitive substring match on name, value or description
    ///
    /// The term is lowercased here and the columns with SQL `LOWER`. SQLite's
    /// `LOWER` only folds ASCII, so on SQLite a non-ASCII term matches only
    /// when the stored text is already lowercase.
    pub fn search_condition(&self) -> Option<Condition> {
        let term = self.search.as_deref()?;
        let pattern = format!("%{}%", escape_like(&term.to_lowercase()));

        let matches = |column: SessionColumn| {
            Expr::expr(Func::lower(Expr::col(column)))
                .like(LikeExpr::new(pattern.clone()).escape(LIKE_ESCAPE))
        };

        Some(
            Condition::any()
                .add(matches(SessionColumn::Name))
                .add(matches(SessionColumn::Value))
                .add(matches(SessionColumn::Description)),
        )
    }
}

/// Make `%`, `_` and the escape character match literally
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// Leading-integer parse of a number or string; `None` unless the result is >= 1
///
/// Oversized values saturate, so the result never exceeds [`MAX_BOUND`].
fn positive_int(value: Option<&Value>) -> Option<u64> {
    let parsed = match value? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => leading_int(s),
        _ => None,
    }?;

    u64::try_from(parsed).ok().filter(|n| *n >= 1)
}

fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let digits = &digits[..end];
    if digits.is_empty() {
        return None;
    }
    // Only overflow can fail on a run of ASCII digits
    let magnitude: i64 = digits.parse().unwrap_or(i64::MAX);

    Some(if negative { -magnitude } else { magnitude })
}

/// JSON truthiness: false, 0, "", and null are falsy
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page_of(page: Value, per_page: Value) -> Pagination {
        ListParams::from_json(Some(&page), Some(&per_page), None, None).pagination
    }

    #[test]
    fn test_defaults_when_absent() {
        let params = ListParams::from_json(None, None, None, None);
        assert_eq!(params, ListParams::default());
        assert_eq!(
            params.pagination,
            Pagination::Page { page: 1, per_page: 25 }
        );
        assert!(params.search_condition().is_none());
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(page_of(json!(2), json!(10)), Pagination::Page { page: 2, per_page: 10 });
        assert_eq!(page_of(json!("3"), json!("5")), Pagination::Page { page: 3, per_page: 5 });
        assert_eq!(page_of(json!("4abc"), json!(7.9)), Pagination::Page { page: 4, per_page: 7 });
    }

    #[test]
    fn test_junk_falls_back_to_defaults() {
        assert_eq!(page_of(json!("abc"), json!(null)), Pagination::default());
        assert_eq!(page_of(json!(0), json!(0)), Pagination::default());
        assert_eq!(page_of(json!(-2), json!("-5")), Pagination::default());
        assert_eq!(page_of(json!(true), json!([10])), Pagination::default());
    }

    #[test]
    fn test_oversized_values_saturate() {
        let max = i64::MAX as u64;
        assert_eq!(
            page_of(json!("99999999999999999999"), json!(25)),
            Pagination::Page { page: max, per_page: 25 }
        );
        assert_eq!(
            page_of(json!(1e300), json!(18446744073709551615u64)),
            Pagination::Page { page: max, per_page: max }
        );
        assert_eq!(page_of(json!("-99999999999999999999"), json!(1)), Pagination::Page { page: 1, per_page: 1 });
    }

    #[test]
    fn test_get_all_truthiness() {
        let all = |v: Value| ListParams::from_json(None, None, Some(&v), None).pagination;
        assert_eq!(all(json!(true)), Pagination::All);
        assert_eq!(all(json!(1)), Pagination::All);
        assert_eq!(all(json!("yes")), Pagination::All);
        assert_eq!(all(json!(false)), Pagination::default());
        assert_eq!(all(json!(0)), Pagination::default());
        assert_eq!(all(json!("")), Pagination::default());
    }

    #[test]
    fn test_search_value_normalisation() {
        let search = |v: Value| ListParams::from_json(None, None, None, Some(&v)).search;
        assert_eq!(search(json!("Foo")), Some("Foo".to_string()));
        assert_eq!(search(json!("")), None);
        assert_eq!(search(json!(42)), Some("42".to_string()));
        assert_eq!(search(json!(null)), None);
    }

    #[test]
    fn test_offset() {
        assert_eq!(Pagination::Page { page: 1, per_page: 25 }.offset(), 0);
        assert_eq!(Pagination::Page { page: 2, per_page: 10 }.offset(), 10);
        assert_eq!(Pagination::All.offset(), 0);
        let far = Pagination::Page { page: 999_999_999_999_999_999, per_page: 25 };
        assert_eq!(far.offset(), MAX_BOUND);
        let huge = Pagination::Page { page: u64::MAX, per_page: u64::MAX };
        assert_eq!(huge.offset(), MAX_BOUND);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50!%!_off");
        assert_eq!(escape_like("hi!"), "hi!!");
        assert_eq!(escape_like("a\\b"), "a\\b");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_search_term_is_lowercased() {
        let params = ListParams::from_json(None, None, None, Some(&json!("ÉTÉ_X")));
        assert_eq!(params.search.as_deref(), Some("ÉTÉ_X"));
        assert!(params.search_condition().is_some());
        assert_eq!(escape_like(&"ÉTÉ_X".to_lowercase()), "été!_x");
    }
}
