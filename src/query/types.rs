use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};

// Limits on caller-supplied query shapes
pub(crate) const MAX_PATH_DEPTH: usize = 32;
pub(crate) const MAX_IN_SET: usize = 1000;
pub(crate) const MAX_SORT_FIELDS: usize = 8;
pub(crate) const MAX_PROJECTION_FIELDS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    #[must_use]
    pub const fn reverse(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

impl SortSpec {
    /// Parses `field` (ascending) or `-field` (descending).
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        raw.strip_prefix('-').map_or_else(
            || Self { field: raw.to_string(), order: Order::Asc },
            |field| Self { field: field.to_string(), order: Order::Desc },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

/// Native options handed to [`crate::store::DocumentStore::find`].
///
/// Semantics:
/// - Sorting is applied before skip/limit, projection last.
/// - `limit: None` means unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindOptions {
    pub projection: Option<Projection>,
    pub sort: Option<Vec<SortSpec>>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CmpOp {
    #[must_use]
    pub const fn as_operator(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Ne => "$ne",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
        }
    }
}

/// Compiled, store-native predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    True,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Exists { path: String, exists: bool },
    In { path: String, values: Vec<Bson> },
    Nin { path: String, values: Vec<Bson> },
    Cmp { path: String, op: CmpOp, value: Bson },
}

impl Filter {
    /// AND-combines two predicates, keeping both trees intact under a new node.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::And(vec![self, other])
    }

    /// Renders the predicate back into Mongo query syntax. Diagnostics only.
    #[must_use]
    pub fn to_document(&self) -> BsonDocument {
        let mut out = BsonDocument::new();
        match self {
            Self::True => {}
            Self::And(fs) => {
                out.insert("$and", fs.iter().map(|f| Bson::Document(f.to_document())).collect::<Vec<_>>());
            }
            Self::Or(fs) => {
                out.insert("$or", fs.iter().map(|f| Bson::Document(f.to_document())).collect::<Vec<_>>());
            }
            Self::Not(f) => {
                out.insert("$nor", vec![Bson::Document(f.to_document())]);
            }
            Self::Exists { path, exists } => {
                out.insert(path.clone(), bson::doc! { "$exists": *exists });
            }
            Self::In { path, values } => {
                out.insert(path.clone(), bson::doc! { "$in": values.clone() });
            }
            Self::Nin { path, values } => {
                out.insert(path.clone(), bson::doc! { "$nin": values.clone() });
            }
            Self::Cmp { path, op: CmpOp::Eq, value } => {
                out.insert(path.clone(), value.clone());
            }
            Self::Cmp { path, op, value } => {
                let mut inner = BsonDocument::new();
                inner.insert(op.as_operator(), value.clone());
                out.insert(path.clone(), inner);
            }
        }
        out
    }
}

/// `$set`-style partial update applied to every matching document.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateDoc {
    pub set: BsonDocument,
}

impl UpdateDoc {
    #[must_use]
    pub fn to_document(&self) -> BsonDocument {
        bson::doc! { "$set": self.set.clone() }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UpdateReport {
    pub matched: u64,
    pub modified: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub deleted: u64,
}
