use bson::{Bson, Document as BsonDocument};

use crate::errors::{DbError, DbResult};
use crate::query::types::{MAX_PROJECTION_FIELDS, MAX_SORT_FIELDS};
use crate::query::{Filter, FindOptions, Projection, SortSpec};

/// Scratch query state produced by folding a frame chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    /// Projection; `*` means "all", a `-` prefix excludes a field.
    pub fields: Vec<String>,
    /// `<= 0` means unlimited.
    pub limit: i64,
    pub offset: i64,
    /// Field names, `-` prefix for descending.
    pub sort: Vec<String>,
    pub conditions: Option<Filter>,
    pub group_by: Vec<Bson>,
    pub page_size: u32,
    /// 0-indexed.
    pub page_number: u32,
    pub cursor_column: String,
    pub cursor_value: Option<Bson>,
    pub cursor_condition: Option<Filter>,
    pub cursor_reverse_order: bool,
}

impl QuerySpec {
    /// Replaces the current conditions.
    pub fn set_conditions(&mut self, filter: Filter) {
        self.conditions = Some(filter);
    }

    /// AND-combines with the current conditions, nesting both trees.
    pub fn and_conditions(&mut self, filter: Filter) {
        self.conditions = Some(match self.conditions.take() {
            Some(prev) => prev.and(filter),
            None => filter,
        });
    }

    #[must_use]
    pub fn filter(&self) -> &Filter {
        self.conditions.as_ref().unwrap_or(&Filter::True)
    }

    /// Grouping has no counterpart on this store's find/count paths.
    ///
    /// # Errors
    /// `DbError::Unsupported` when `group_by` is set.
    pub fn ensure_ungrouped(&self) -> DbResult<()> {
        if self.group_by.is_empty() {
            Ok(())
        } else {
            Err(DbError::Unsupported("group by is not supported by document stores".into()))
        }
    }

    /// # Errors
    /// `DbError::InvalidQuery` for empty field names or too many fields,
    /// `DbError::Unsupported` when inclusions and exclusions are mixed.
    pub fn projection(&self) -> DbResult<Option<Projection>> {
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for field in &self.fields {
            if field == "*" {
                break;
            }
            match field.strip_prefix('-') {
                Some("") => return Err(DbError::InvalidQuery("empty excluded field".into())),
                Some(f) => exclude.push(f.to_string()),
                None if field.is_empty() => {
                    return Err(DbError::InvalidQuery("empty selected field".into()));
                }
                None => include.push(field.clone()),
            }
        }
        if include.len() + exclude.len() > MAX_PROJECTION_FIELDS {
            return Err(DbError::InvalidQuery(format!(
                "{} projected fields exceed the limit of {MAX_PROJECTION_FIELDS}",
                include.len() + exclude.len()
            )));
        }
        match (include.is_empty(), exclude.is_empty()) {
            (true, true) => Ok(None),
            (false, true) => Ok(Some(Projection::Include(include))),
            (true, false) => Ok(Some(Projection::Exclude(exclude))),
            (false, false) => Err(DbError::Unsupported(
                "projection cannot mix included and excluded fields".into(),
            )),
        }
    }

    /// Sort keys for the store. When paging backward every key is inverted so the
    /// store returns the rows closest to the cursor first. The trailing cursor key
    /// owns the cursor column; a caller key on the same column is dropped.
    ///
    /// # Errors
    /// `DbError::InvalidQuery` for an empty sort key or more than
    /// `MAX_SORT_FIELDS` distinct keys.
    pub fn sort_specs(&self) -> DbResult<Vec<SortSpec>> {
        let cursor_key = if self.cursor_column.is_empty() { None } else { self.sort.len().checked_sub(1) };
        let mut out: Vec<SortSpec> = Vec::with_capacity(self.sort.len());
        for (i, raw) in self.sort.iter().enumerate() {
            let mut spec = SortSpec::parse(raw);
            if spec.field.is_empty() {
                return Err(DbError::InvalidQuery(format!("empty sort key {raw:?}")));
            }
            let is_cursor_key = cursor_key == Some(i);
            if cursor_key.is_some() && !is_cursor_key && spec.field == self.cursor_column {
                continue;
            }
            // the trailing cursor key already carries the backward direction
            if self.cursor_reverse_order && !is_cursor_key {
                spec.order = spec.order.reverse();
            }
            if !out.iter().any(|s| s.field == spec.field) {
                out.push(spec);
            }
        }
        if out.len() > MAX_SORT_FIELDS {
            return Err(DbError::InvalidQuery(format!(
                "{} sort keys exceed the limit of {MAX_SORT_FIELDS}",
                out.len()
            )));
        }
        Ok(out)
    }

    /// Compiles everything but the predicate into native find options.
    ///
    /// # Errors
    /// `DbError::Unsupported` for grouping, `DbError::InvalidQuery` for a negative
    /// offset, plus projection and sort errors.
    pub fn find_options(&self) -> DbResult<FindOptions> {
        self.ensure_ungrouped()?;
        if self.offset < 0 {
            return Err(DbError::InvalidQuery(format!("negative offset {}", self.offset)));
        }
        let sort = self.sort_specs()?;
        Ok(FindOptions {
            projection: self.projection()?,
            sort: if sort.is_empty() { None } else { Some(sort) },
            limit: u64::try_from(self.limit).ok().filter(|l| *l > 0),
            skip: u64::try_from(self.offset).ok().filter(|s| *s > 0),
        })
    }

    /// Human-readable rendering of the query for logs. Never used for execution.
    #[must_use]
    pub fn debug_query(&self, collection: &str, action: &str) -> String {
        let mut query = format!("db.{collection}.{action}");
        if let Some(conditions) = &self.conditions {
            query.push_str(&format!(".conds({})", conditions.to_document()));
        }
        if self.limit > 0 {
            query.push_str(&format!(".limit({})", self.limit));
        }
        if self.offset > 0 {
            query.push_str(&format!(".offset({})", self.offset));
        }
        let mut selected = BsonDocument::new();
        for field in self.fields.iter().take_while(|f| *f != "*") {
            match field.strip_prefix('-') {
                Some(f) => selected.insert(f, false),
                None => selected.insert(field.as_str(), true),
            };
        }
        if !selected.is_empty() {
            query.push_str(&format!(".select({selected})"));
        }
        if !self.group_by.is_empty() {
            let escaped: Vec<String> = self.group_by.iter().map(json_or_display).collect();
            query.push_str(&format!(".groupBy({})", escaped.join(", ")));
        }
        if !self.sort.is_empty() {
            let escaped: Vec<String> = self
                .sort
                .iter()
                .map(|s| serde_json::to_string(s).unwrap_or_else(|_| s.clone()))
                .collect();
            query.push_str(&format!(".sort({})", escaped.join(", ")));
        }
        query
    }
}

fn json_or_display(value: &Bson) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{CmpOp, Order};

    #[test]
    fn and_conditions_nests_instead_of_overwriting() {
        let a = Filter::Cmp { path: "a".into(), op: CmpOp::Eq, value: Bson::Int32(1) };
        let b = Filter::Cmp { path: "b".into(), op: CmpOp::Eq, value: Bson::Int32(2) };
        let mut spec = QuerySpec::default();
        spec.and_conditions(a.clone());
        assert_eq!(spec.conditions, Some(a.clone()));
        spec.and_conditions(b.clone());
        assert_eq!(spec.conditions, Some(Filter::And(vec![a, b])));
    }

    #[test]
    fn wildcard_stops_projection() {
        let spec = QuerySpec { fields: vec!["*".into(), "a".into()], ..QuerySpec::default() };
        assert_eq!(spec.projection().unwrap(), None);
        let spec = QuerySpec { fields: vec!["a".into(), "*".into(), "b".into()], ..QuerySpec::default() };
        assert_eq!(spec.projection().unwrap(), Some(Projection::Include(vec!["a".into()])));
    }

    #[test]
    fn mixed_projection_is_unsupported() {
        let spec = QuerySpec { fields: vec!["a".into(), "-b".into()], ..QuerySpec::default() };
        assert!(spec.projection().unwrap_err().is_unsupported());
    }

    #[test]
    fn negative_offset_is_rejected() {
        let spec = QuerySpec { offset: -1, ..QuerySpec::default() };
        assert!(matches!(spec.find_options(), Err(DbError::InvalidQuery(_))));
    }

    #[test]
    fn backward_sort_inverts_caller_keys() {
        let spec = QuerySpec {
            sort: vec!["name".into(), "-id".into()],
            cursor_column: "id".into(),
            cursor_reverse_order: true,
            ..QuerySpec::default()
        };
        let sort = spec.sort_specs().unwrap();
        assert_eq!(sort[0], SortSpec { field: "name".into(), order: Order::Desc });
        assert_eq!(sort[1], SortSpec { field: "id".into(), order: Order::Desc });
    }

    #[test]
    fn debug_query_renders_segments() {
        let spec = QuerySpec {
            conditions: Some(Filter::Cmp { path: "a".into(), op: CmpOp::Gt, value: Bson::Int32(1) }),
            limit: 5,
            offset: 10,
            fields: vec!["a".into()],
            sort: vec!["-a".into()],
            ..QuerySpec::default()
        };
        let q = spec.debug_query("people", "Find.All");
        assert!(q.starts_with("db.people.Find.All.conds("));
        assert!(q.contains("$gt"));
        assert!(q.contains(".limit(5).offset(10).select("));
        assert!(q.ends_with(".sort(\"-a\")"));
    }

    #[test]
    fn cursor_key_owns_its_column() {
        let spec = QuerySpec {
            sort: vec!["-id".into(), "name".into(), "id".into()],
            cursor_column: "id".into(),
            ..QuerySpec::default()
        };
        let sort = spec.sort_specs().unwrap();
        assert_eq!(
            sort,
            vec![
                SortSpec { field: "name".into(), order: Order::Asc },
                SortSpec { field: "id".into(), order: Order::Asc },
            ]
        );
    }

    #[test]
    fn too_many_sort_keys_are_rejected() {
        let mut sort: Vec<String> = (0..MAX_SORT_FIELDS).map(|i| format!("k{i}")).collect();
        sort.push("id".into());
        let spec = QuerySpec { sort, cursor_column: "id".into(), ..QuerySpec::default() };
        assert!(matches!(spec.sort_specs(), Err(DbError::InvalidQuery(_))));
        let spec = QuerySpec { sort: vec!["a".into(); 20], ..QuerySpec::default() };
        assert_eq!(spec.sort_specs().unwrap().len(), 1);
    }

    #[test]
    fn too_many_projected_fields_are_rejected() {
        let fields = (0..=MAX_PROJECTION_FIELDS).map(|i| format!("f{i}")).collect();
        let spec = QuerySpec { fields, ..QuerySpec::default() };
        assert!(matches!(spec.projection(), Err(DbError::InvalidQuery(_))));
    }
}
