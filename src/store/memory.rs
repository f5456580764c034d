use bson::{Bson, Document as BsonDocument};
use parking_lot::RwLock;
use std::collections::VecDeque;
use uuid::Uuid;

use crate::errors::{DbError, DbResult};
use crate::query::eval::{compare_docs, eval_filter, get_path, project_exclude, project_include};
use crate::query::types::{MAX_PROJECTION_FIELDS, MAX_SORT_FIELDS};
use crate::query::{DeleteReport, Filter, FindOptions, Projection, UpdateDoc, UpdateReport};

use super::{DocumentStore, StoreCursor};

/// Insertion-ordered, thread-safe in-memory collection.
pub struct MemoryStore {
    name: String,
    docs: RwLock<Vec<BsonDocument>>,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), docs: RwLock::new(Vec::new()) }
    }

    /// Inserts a document, assigning a UUID `_id` when none is present. Returns the `_id`.
    pub fn insert(&self, mut doc: BsonDocument) -> Bson {
        let id = match doc.get("_id") {
            Some(id) => id.clone(),
            None => {
                let id = Bson::String(Uuid::new_v4().to_string());
                doc.insert("_id", id.clone());
                id
            }
        };
        self.docs.write().push(doc);
        id
    }

    pub fn insert_many<I: IntoIterator<Item = BsonDocument>>(&self, docs: I) -> Vec<Bson> {
        docs.into_iter().map(|d| self.insert(d)).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }
}

impl DocumentStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn find(&self, filter: &Filter, opts: &FindOptions) -> DbResult<Box<dyn StoreCursor>> {
        if let Some(Projection::Include(fields) | Projection::Exclude(fields)) = &opts.projection {
            if fields.len() > MAX_PROJECTION_FIELDS {
                return Err(DbError::InvalidQuery(format!("projection too long: {}", fields.len())));
            }
        }
        let mut docs: Vec<BsonDocument> =
            self.docs.read().iter().filter(|d| eval_filter(d, filter)).cloned().collect();

        if let Some(sort) = &opts.sort {
            if sort.len() > MAX_SORT_FIELDS {
                return Err(DbError::InvalidQuery(format!("sort spec too long: {}", sort.len())));
            }
            docs.sort_by(|a, b| compare_docs(a, b, sort));
        }

        let skip = usize::try_from(opts.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = opts.limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        let mut out: VecDeque<BsonDocument> = docs.into_iter().skip(skip).take(limit).collect();

        match &opts.projection {
            Some(Projection::Include(fields)) => {
                for d in &mut out {
                    *d = project_include(d, fields);
                }
            }
            Some(Projection::Exclude(fields)) => {
                for d in &mut out {
                    *d = project_exclude(d, fields);
                }
            }
            None => {}
        }
        Ok(Box::new(MemoryCursor { docs: out, closed: false }))
    }

    fn count(&self, filter: &Filter) -> DbResult<u64> {
        let n = self.docs.read().iter().filter(|d| eval_filter(d, filter)).count();
        Ok(u64::try_from(n).unwrap_or(u64::MAX))
    }

    fn update_many(&self, filter: &Filter, update: &UpdateDoc) -> DbResult<UpdateReport> {
        if update.set.keys().any(|k| k == "_id" || k.starts_with("_id.")) {
            return Err(DbError::InvalidQuery("_id is immutable".into()));
        }
        let mut report = UpdateReport::default();
        for doc in self.docs.write().iter_mut().filter(|d| eval_filter(d, filter)) {
            report.matched += 1;
            let mut changed = false;
            for (path, val) in &update.set {
                changed |= set_path(doc, path, val.clone());
            }
            if changed {
                report.modified += 1;
            }
        }
        Ok(report)
    }

    fn delete_many(&self, filter: &Filter) -> DbResult<DeleteReport> {
        let mut docs = self.docs.write();
        let before = docs.len();
        docs.retain(|d| !eval_filter(d, filter));
        Ok(DeleteReport { deleted: u64::try_from(before - docs.len()).unwrap_or(u64::MAX) })
    }
}

fn set_path(doc: &mut BsonDocument, path: &str, val: Bson) -> bool {
    let parts: Vec<&str> = path.split('.').collect();
    let Some((last, parents)) = parts.split_last() else { return false };
    let mut cur = doc;
    for key in parents {
        if !matches!(cur.get(*key), Some(Bson::Document(_))) {
            cur.insert((*key).to_string(), Bson::Document(BsonDocument::new()));
        }
        match cur.get_mut(*key) {
            Some(Bson::Document(d)) => cur = d,
            _ => return false,
        }
    }
    let changed = get_path(cur, last).is_none_or(|prev| *prev != val);
    cur.insert((*last).to_string(), val);
    changed
}

/// Cursor over a materialized page of results.
pub struct MemoryCursor {
    docs: VecDeque<BsonDocument>,
    closed: bool,
}

impl StoreCursor for MemoryCursor {
    fn advance(&mut self) -> DbResult<Option<BsonDocument>> {
        if self.closed {
            return Err(DbError::CursorClosed);
        }
        Ok(self.docs.pop_front())
    }

    fn close(&mut self) -> DbResult<()> {
        self.closed = true;
        self.docs.clear();
        Ok(())
    }
}
