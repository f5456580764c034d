//! Condition expressions accepted by `filter` and `and`.

use bson::{Bson, Document as BsonDocument};

use crate::errors::{DbError, DbResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    Exists,
}

/// One condition term.
///
/// `Raw` carries an already-native fragment in Mongo query syntax and is
/// translated by the condition compiler like any other term.
#[derive(Debug, Clone, PartialEq)]
pub enum Cond {
    Field { field: String, op: Op, value: Bson },
    And(Vec<Cond>),
    Or(Vec<Cond>),
    Not(Box<Cond>),
    Raw(BsonDocument),
}

impl Cond {
    pub fn field(field: impl Into<String>, op: Op, value: impl Into<Bson>) -> Self {
        Self::Field { field: field.into(), op, value: value.into() }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::field(field, Op::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::field(field, Op::Ne, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::field(field, Op::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::field(field, Op::Gte, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::field(field, Op::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::field(field, Op::Lte, value)
    }

    pub fn is_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        let values: Vec<Bson> = values.into_iter().map(Into::into).collect();
        Self::field(field, Op::In, values)
    }

    pub fn not_in<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        let values: Vec<Bson> = values.into_iter().map(Into::into).collect();
        Self::field(field, Op::Nin, values)
    }

    pub fn exists(field: impl Into<String>, exists: bool) -> Self {
        Self::field(field, Op::Exists, exists)
    }

    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Builds a term from a `"field operator"` key, e.g. `"age >="` or `"id NOT IN"`.
    /// A bare field name means equality.
    ///
    /// # Errors
    /// Returns `DbError::InvalidQuery` for an empty field or an unknown operator.
    pub fn parse(key: &str, value: impl Into<Bson>) -> DbResult<Self> {
        let key = key.trim();
        let (field, rest) = key.split_once(char::is_whitespace).unwrap_or((key, ""));
        if field.is_empty() {
            return Err(DbError::InvalidQuery(format!("missing field name in {key:?}")));
        }
        let rest = rest.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase();
        let op = match rest.as_str() {
            "" | "=" | "==" => Op::Eq,
            "!=" | "<>" => Op::Ne,
            ">" => Op::Gt,
            ">=" => Op::Gte,
            "<" => Op::Lt,
            "<=" => Op::Lte,
            "IN" => Op::In,
            "NOT IN" => Op::Nin,
            "EXISTS" => Op::Exists,
            other => {
                return Err(DbError::InvalidQuery(format!("unknown operator {other:?} in {key:?}")));
            }
        };
        Ok(Self::field(field, op, value))
    }
}

impl From<BsonDocument> for Cond {
    fn from(doc: BsonDocument) -> Self {
        Self::Raw(doc)
    }
}
