use bson::{Bson, Document as BsonDocument};

use crate::errors::{DbError, DbResult};

use super::types::{CmpOp, Filter, MAX_IN_SET};

/// Translates a Mongo-style query fragment into a [`Filter`].
///
/// Supported: `$and`, `$or`, `$nor`, implicit equality, and per-field
/// `$eq`/`$ne`/`$gt`/`$gte`/`$lt`/`$lte`/`$in`/`$nin`/`$exists`/`$not`.
///
/// # Errors
/// Returns `DbError::Unsupported` for any other operator and
/// `DbError::InvalidQuery` for operands of the wrong shape.
pub fn parse_filter_doc(doc: &BsonDocument) -> DbResult<Filter> {
    let mut terms = Vec::with_capacity(doc.len());
    for (key, value) in doc {
        terms.push(match key.as_str() {
            "$and" => Filter::And(parse_clauses(key, value)?),
            "$or" => Filter::Or(parse_clauses(key, value)?),
            "$nor" => Filter::Not(Box::new(Filter::Or(parse_clauses(key, value)?))),
            k if k.starts_with('$') => {
                return Err(DbError::Unsupported(format!("top-level operator {k}")));
            }
            path => parse_field(path, value)?,
        });
    }
    Ok(match terms.len() {
        0 => Filter::True,
        1 => terms.remove(0),
        _ => Filter::And(terms),
    })
}

fn parse_clauses(op: &str, value: &Bson) -> DbResult<Vec<Filter>> {
    let Bson::Array(items) = value else {
        return Err(DbError::InvalidQuery(format!("{op} requires an array")));
    };
    if items.is_empty() {
        return Err(DbError::InvalidQuery(format!("{op} requires a non-empty array")));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(d) => parse_filter_doc(d),
            _ => Err(DbError::InvalidQuery(format!("{op} entries must be documents"))),
        })
        .collect()
}

fn is_operator_doc(value: &Bson) -> Option<&BsonDocument> {
    match value {
        Bson::Document(d) if !d.is_empty() && d.keys().all(|k| k.starts_with('$')) => Some(d),
        _ => None,
    }
}

fn parse_field(path: &str, value: &Bson) -> DbResult<Filter> {
    let Some(ops) = is_operator_doc(value) else {
        return Ok(Filter::Cmp { path: path.to_string(), op: CmpOp::Eq, value: value.clone() });
    };
    let mut terms = Vec::with_capacity(ops.len());
    for (op, operand) in ops {
        let path = path.to_string();
        terms.push(match op.as_str() {
            "$eq" => Filter::Cmp { path, op: CmpOp::Eq, value: operand.clone() },
            "$ne" => Filter::Cmp { path, op: CmpOp::Ne, value: operand.clone() },
            "$gt" => Filter::Cmp { path, op: CmpOp::Gt, value: operand.clone() },
            "$gte" => Filter::Cmp { path, op: CmpOp::Gte, value: operand.clone() },
            "$lt" => Filter::Cmp { path, op: CmpOp::Lt, value: operand.clone() },
            "$lte" => Filter::Cmp { path, op: CmpOp::Lte, value: operand.clone() },
            "$in" => Filter::In { values: in_set(op, operand)?, path },
            "$nin" => Filter::Nin { values: in_set(op, operand)?, path },
            "$exists" => match operand {
                Bson::Boolean(exists) => Filter::Exists { path, exists: *exists },
                _ => return Err(DbError::InvalidQuery("$exists requires a boolean".into())),
            },
            "$not" => match is_operator_doc(operand) {
                Some(_) => Filter::Not(Box::new(parse_field(&path, operand)?)),
                None => return Err(DbError::InvalidQuery("$not requires an operator document".into())),
            },
            other => return Err(DbError::Unsupported(format!("operator {other} on {path}"))),
        });
    }
    Ok(if terms.len() == 1 { terms.remove(0) } else { Filter::And(terms) })
}

pub(crate) fn in_set(op: &str, operand: &Bson) -> DbResult<Vec<Bson>> {
    match operand {
        Bson::Array(values) if values.len() <= MAX_IN_SET => Ok(values.clone()),
        Bson::Array(values) => Err(DbError::InvalidQuery(format!(
            "{op} set too large: {} > {MAX_IN_SET}",
            values.len()
        ))),
        _ => Err(DbError::InvalidQuery(format!("{op} requires an array"))),
    }
}
