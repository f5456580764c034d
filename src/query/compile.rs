use bson::Bson;

use crate::errors::{DbError, DbResult};

use super::cond::{Cond, Op};
use super::parse::{in_set, parse_filter_doc};
use super::types::{CmpOp, Filter};

/// Reduces a list of condition terms to a single predicate tree.
///
/// No terms compile to `Filter::True`, a single term to itself, and several
/// terms to an implicit `$and`.
///
/// # Errors
/// Fails on the first term that cannot be translated.
pub fn compile(terms: &[Cond]) -> DbResult<Filter> {
    let mut compiled = terms.iter().map(compile_term).collect::<DbResult<Vec<_>>>()?;
    Ok(match compiled.len() {
        0 => Filter::True,
        1 => compiled.remove(0),
        _ => Filter::And(compiled),
    })
}

fn compile_term(term: &Cond) -> DbResult<Filter> {
    match term {
        Cond::Field { field, op, value } => compile_field(field, *op, value),
        Cond::And(terms) => Ok(Filter::And(terms.iter().map(compile_term).collect::<DbResult<_>>()?)),
        Cond::Or(terms) if terms.is_empty() => {
            Err(DbError::InvalidQuery("OR requires at least one term".into()))
        }
        Cond::Or(terms) => Ok(Filter::Or(terms.iter().map(compile_term).collect::<DbResult<_>>()?)),
        Cond::Not(inner) => Ok(Filter::Not(Box::new(compile_term(inner)?))),
        Cond::Raw(doc) => parse_filter_doc(doc),
    }
}

fn compile_field(field: &str, op: Op, value: &Bson) -> DbResult<Filter> {
    if field.is_empty() {
        return Err(DbError::InvalidQuery("condition with empty field name".into()));
    }
    let path = field.to_string();
    let cmp = |op: CmpOp| -> DbResult<Filter> {
        Ok(Filter::Cmp { path: field.to_string(), op, value: value.clone() })
    };
    match op {
        Op::Eq => cmp(CmpOp::Eq),
        Op::Ne => cmp(CmpOp::Ne),
        Op::Gt => cmp(CmpOp::Gt),
        Op::Gte => cmp(CmpOp::Gte),
        Op::Lt => cmp(CmpOp::Lt),
        Op::Lte => cmp(CmpOp::Lte),
        Op::In => Ok(Filter::In { values: in_set("IN", value)?, path }),
        Op::Nin => Ok(Filter::Nin { values: in_set("NOT IN", value)?, path }),
        Op::Exists => match value {
            Bson::Boolean(exists) => Ok(Filter::Exists { path, exists: *exists }),
            _ => Err(DbError::InvalidQuery(format!("EXISTS on {field} requires a boolean"))),
        },
    }
}
