//! Immutable result sets: chained query building and lazy execution.
//!
//! Every chaining method returns a new [`ResultSet`] that shares its history with
//! the one it was called on; nothing touches the store until a terminal method
//! (`all`, `one`, `next`, `count`, `exists`, `total_entries`, `total_pages`,
//! `update`, `delete`) runs.
//!
//! Backward cursor pages (`prev_page`) come back in the store's reverse order,
//! i.e. descending on the cursor column, closest row to the cursor first.
//! Reverse the page if ascending presentation is needed.

pub mod frame;
pub mod paginate;
pub mod spec;

mod iter;

use bson::{Bson, Document as BsonDocument};
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::errors::{DbError, DbResult};
use crate::query::telemetry::{self, QueryLogger, QueryStatus, TelemetryConfig};
use crate::query::{Cond, DeleteReport, UpdateDoc, UpdateReport, compile};
use crate::store::{DocumentStore, StoreCursor};

pub use frame::{Frame, materialize};
pub use spec::QuerySpec;

use iter::Iteration;

pub struct ResultSet {
    store: Arc<dyn DocumentStore>,
    logger: Arc<dyn QueryLogger>,
    cfg: Arc<TelemetryConfig>,
    tip: Option<Arc<Frame>>,
    iter: Iteration,
}

impl Clone for ResultSet {
    /// Same chain, fresh iteration state.
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            logger: Arc::clone(&self.logger),
            cfg: Arc::clone(&self.cfg),
            tip: self.tip.clone(),
            iter: Iteration::default(),
        }
    }
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("collection", &self.store.name())
            .field("tip", &self.tip)
            .finish_non_exhaustive()
    }
}

// Store errors keep sentinels and already-wrapped errors as they are.
fn with_op(op: &'static str, e: DbError) -> DbError {
    match e {
        DbError::Store { .. } | DbError::NoMoreRows | DbError::Unsupported(_) | DbError::InvalidQuery(_) => e,
        other => DbError::store(op, other),
    }
}

fn decode<T: DeserializeOwned>(doc: BsonDocument) -> DbResult<T> {
    Ok(bson::deserialize_from_document(doc)?)
}

impl ResultSet {
    pub(crate) fn new(
        store: Arc<dyn DocumentStore>,
        logger: Arc<dyn QueryLogger>,
        cfg: Arc<TelemetryConfig>,
    ) -> Self {
        Self { store, logger, cfg, tip: None, iter: Iteration::default() }
    }

    fn frame<F>(&self, apply: F) -> Self
    where
        F: Fn(&mut QuerySpec) -> DbResult<()> + Send + Sync + 'static,
    {
        Self {
            store: Arc::clone(&self.store),
            logger: Arc::clone(&self.logger),
            cfg: Arc::clone(&self.cfg),
            tip: Some(Frame::chain(self.tip.as_ref(), apply)),
            iter: Iteration::default(),
        }
    }

    /// Replaces the conditions.
    #[must_use]
    pub fn filter<I: IntoIterator<Item = Cond>>(&self, terms: I) -> Self {
        let terms: Vec<Cond> = terms.into_iter().collect();
        self.frame(move |q| {
            q.set_conditions(compile(&terms)?);
            Ok(())
        })
    }

    /// AND-combines with the conditions set so far.
    #[must_use]
    pub fn and<I: IntoIterator<Item = Cond>>(&self, terms: I) -> Self {
        let terms: Vec<Cond> = terms.into_iter().collect();
        self.frame(move |q| {
            q.and_conditions(compile(&terms)?);
            Ok(())
        })
    }

    #[must_use]
    pub fn limit(&self, n: i64) -> Self {
        self.frame(move |q| {
            q.limit = n;
            Ok(())
        })
    }

    #[must_use]
    pub fn offset(&self, n: i64) -> Self {
        self.frame(move |q| {
            q.offset = n;
            Ok(())
        })
    }

    /// Sort fields; a `-` prefix sorts descending.
    #[must_use]
    pub fn order_by<I, S>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        self.frame(move |q| {
            q.sort.clone_from(&fields);
            Ok(())
        })
    }

    /// Fields to return. `*` selects everything, a `-` prefix excludes a field.
    #[must_use]
    pub fn select<I, S>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        self.frame(move |q| {
            q.fields.clone_from(&fields);
            Ok(())
        })
    }

    /// Grouping is recorded but document stores reject it on find and count.
    #[must_use]
    pub fn group_by<I, V>(&self, exprs: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        let exprs: Vec<Bson> = exprs.into_iter().map(Into::into).collect();
        self.frame(move |q| {
            q.group_by.clone_from(&exprs);
            Ok(())
        })
    }

    /// Page size for offset pagination; when non-zero it overrides limit/offset.
    #[must_use]
    pub fn paginate(&self, page_size: u32) -> Self {
        self.frame(move |q| {
            q.page_size = page_size;
            Ok(())
        })
    }

    /// 0-indexed page number.
    #[must_use]
    pub fn page(&self, page_number: u32) -> Self {
        self.frame(move |q| {
            q.page_number = page_number;
            Ok(())
        })
    }

    /// Column used for keyset pagination.
    #[must_use]
    pub fn cursor(&self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.frame(move |q| {
            q.cursor_column.clone_from(&column);
            Ok(())
        })
    }

    /// Rows after `value` on the cursor column, ascending.
    #[must_use]
    pub fn next_page(&self, value: impl Into<Bson>) -> Self {
        let value = value.into();
        self.frame(move |q| paginate::set_cursor(q, value.clone(), false))
    }

    /// Rows before `value` on the cursor column, returned descending.
    #[must_use]
    pub fn prev_page(&self, value: impl Into<Bson>) -> Self {
        let value = value.into();
        self.frame(move |q| paginate::set_cursor(q, value.clone(), true))
    }

    /// Materializes the chain without executing it.
    ///
    /// # Errors
    /// The first frame that fails to apply.
    pub fn spec(&self) -> DbResult<QuerySpec> {
        materialize(self.tip.as_ref())
    }

    fn timed<T>(&self, spec: &QuerySpec, action: &str, run: impl FnOnce() -> DbResult<T>) -> DbResult<T> {
        let start = Utc::now();
        let res = run();
        let end = Utc::now();
        let status = QueryStatus::new(
            spec.debug_query(self.store.name(), action),
            res.as_ref().err().map(ToString::to_string),
            start,
            end,
        );
        telemetry::log_query(self.logger.as_ref(), &self.cfg, status);
        res
    }

    // Opens the cursor for manual iteration; the record brackets the open only.
    fn open_next(&self) -> DbResult<Box<dyn StoreCursor>> {
        let spec = self.spec()?;
        let opts = spec.find_options()?;
        self.timed(&spec, "Find.Next", || self.store.find(spec.filter(), &opts).map_err(|e| with_op("find", e)))
    }

    /// Decodes every matching document. No matches is an empty vector.
    ///
    /// # Errors
    /// Materialization, unsupported grouping, store and decode errors.
    pub fn all<T: DeserializeOwned>(&self) -> DbResult<Vec<T>> {
        let spec = self.spec()?;
        let opts = spec.find_options()?;
        self.timed(&spec, "Find.All", || {
            let mut cursor = self.store.find(spec.filter(), &opts).map_err(|e| with_op("find", e))?;
            let res = drain(cursor.as_mut());
            let closed = cursor.close().map_err(|e| with_op("find", e));
            let out = res?;
            closed?;
            Ok(out)
        })
    }

    /// Decodes the first matching document.
    ///
    /// # Errors
    /// `DbError::NoMoreRows` when nothing matches, otherwise as [`ResultSet::all`].
    pub fn one<T: DeserializeOwned>(&self) -> DbResult<T> {
        let spec = self.spec()?;
        let opts = spec.find_options()?;
        self.timed(&spec, "Find.One", || {
            let mut cursor = self.store.find(spec.filter(), &opts).map_err(|e| with_op("find", e))?;
            let first = cursor.advance().map_err(|e| with_op("find", e));
            let _ = cursor.close();
            match first? {
                Some(doc) => decode(doc),
                None => Err(DbError::NoMoreRows),
            }
        })
    }

    /// Fetches the next document, opening the cursor on first use. Returns `None`
    /// at the end or on failure; check [`ResultSet::err`] afterwards.
    pub fn next<T: DeserializeOwned>(&self) -> Option<T> {
        let doc = self.iter.next_document(|| self.open_next())?;
        match decode(doc) {
            Ok(v) => Some(v),
            Err(e) => {
                self.iter.fail(e);
                None
            }
        }
    }

    /// Iterator over [`ResultSet::next`].
    pub fn iter<T: DeserializeOwned>(&self) -> impl Iterator<Item = T> + '_ {
        std::iter::from_fn(move || self.next())
    }

    /// First error latched by manual iteration.
    #[must_use]
    pub fn err(&self) -> Option<Arc<DbError>> {
        self.iter.err()
    }

    /// Releases the open cursor, if any. Safe to call repeatedly and from other threads.
    ///
    /// # Errors
    /// Errors from the store closing the cursor.
    pub fn close(&self) -> DbResult<()> {
        self.iter.close().map_err(|e| with_op("close", e))
    }

    /// Counts matching documents, ignoring limit and offset.
    ///
    /// # Errors
    /// Materialization, unsupported grouping and store errors.
    pub fn count(&self) -> DbResult<u64> {
        let spec = self.spec()?;
        spec.ensure_ungrouped()?;
        self.timed(&spec, "Count", || self.store.count(spec.filter()).map_err(|e| with_op("count", e)))
    }

    /// # Errors
    /// As [`ResultSet::count`].
    pub fn exists(&self) -> DbResult<bool> {
        Ok(self.count()? > 0)
    }

    /// # Errors
    /// As [`ResultSet::count`].
    pub fn total_entries(&self) -> DbResult<u64> {
        self.count()
    }

    /// # Errors
    /// As [`ResultSet::count`].
    pub fn total_pages(&self) -> DbResult<u64> {
        let total = self.count()?;
        let spec = self.spec()?;
        Ok(paginate::total_pages(total, spec.page_size))
    }

    /// Sets the fields of `src` on every matching document.
    ///
    /// # Errors
    /// Materialization, serialization and store errors.
    pub fn update<S: Serialize>(&self, src: &S) -> DbResult<UpdateReport> {
        let update = UpdateDoc { set: bson::serialize_to_document(src)? };
        let spec = self.spec()?;
        self.timed(&spec, "Update", || {
            self.store.update_many(spec.filter(), &update).map_err(|e| with_op("update", e))
        })
    }

    /// Removes every matching document.
    ///
    /// # Errors
    /// Materialization and store errors.
    pub fn delete(&self) -> DbResult<DeleteReport> {
        let spec = self.spec()?;
        self.timed(&spec, "Remove", || self.store.delete_many(spec.filter()).map_err(|e| with_op("delete", e)))
    }
}

fn drain<T: DeserializeOwned>(cursor: &mut dyn StoreCursor) -> DbResult<Vec<T>> {
    let mut out = Vec::new();
    while let Some(doc) = cursor.advance().map_err(|e| with_op("find", e))? {
        out.push(decode(doc)?);
    }
    Ok(out)
}
