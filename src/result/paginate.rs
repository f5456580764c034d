//! Offset (page number) and keyset (cursor) pagination.

use bson::Bson;

use crate::errors::{DbError, DbResult};
use crate::query::{CmpOp, Filter};

use super::spec::QuerySpec;

/// `(offset, limit)` for a 0-indexed page.
#[must_use]
pub fn page_window(page_size: u32, page_number: u32) -> (i64, i64) {
    (i64::from(page_size) * i64::from(page_number), i64::from(page_size))
}

/// `ceil(total / page_size)`, or 1 when pagination is off.
#[must_use]
pub fn total_pages(total_entries: u64, page_size: u32) -> u64 {
    if page_size < 1 {
        return 1;
    }
    total_entries.div_ceil(u64::from(page_size))
}

/// Records a keyset boundary on `spec`. Forward pages select `column > value`,
/// backward pages `column < value`.
///
/// # Errors
/// `DbError::InvalidQuery` when no cursor column has been chosen.
pub(crate) fn set_cursor(spec: &mut QuerySpec, value: Bson, reverse: bool) -> DbResult<()> {
    if spec.cursor_column.is_empty() {
        return Err(DbError::InvalidQuery("cursor pagination requires a cursor column".into()));
    }
    let op = if reverse { CmpOp::Lt } else { CmpOp::Gt };
    spec.cursor_condition = Some(Filter::Cmp { path: spec.cursor_column.clone(), op, value: value.clone() });
    spec.cursor_value = Some(value);
    spec.cursor_reverse_order = reverse;
    Ok(())
}

/// Post-replay step: merges the cursor predicate and sort key, then lets page-size
/// pagination override limit/offset.
pub(crate) fn finish(spec: &mut QuerySpec) {
    if let Some(cond) = spec.cursor_condition.clone() {
        spec.and_conditions(cond);
    }
    if !spec.cursor_column.is_empty() {
        let key = if spec.cursor_reverse_order {
            format!("-{}", spec.cursor_column)
        } else {
            spec.cursor_column.clone()
        };
        spec.sort.push(key);
    }
    if spec.page_size > 0 {
        (spec.offset, spec.limit) = page_window(spec.page_size, spec.page_number);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(95, 10), 10);
        assert_eq!(total_pages(100, 10), 10);
        assert_eq!(total_pages(0, 10), 0);
        assert_eq!(total_pages(95, 0), 1);
    }

    #[test]
    fn page_window_is_zero_indexed() {
        assert_eq!(page_window(10, 0), (0, 10));
        assert_eq!(page_window(10, 3), (30, 10));
    }

    #[test]
    fn cursor_without_column_fails() {
        let mut spec = QuerySpec::default();
        assert!(set_cursor(&mut spec, Bson::Int32(1), false).is_err());
    }

    #[test]
    fn finish_ands_cursor_after_existing_conditions() {
        let existing = Filter::Cmp { path: "a".into(), op: CmpOp::Eq, value: Bson::Int32(1) };
        let mut spec = QuerySpec { cursor_column: "id".into(), ..QuerySpec::default() };
        spec.set_conditions(existing.clone());
        set_cursor(&mut spec, Bson::Int32(7), true).unwrap();
        finish(&mut spec);
        let cursor = Filter::Cmp { path: "id".into(), op: CmpOp::Lt, value: Bson::Int32(7) };
        assert_eq!(spec.conditions, Some(Filter::And(vec![existing, cursor])));
        assert_eq!(spec.sort, vec!["-id".to_string()]);
    }
}
