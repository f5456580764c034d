#![allow(dead_code)]

use bson::{Document as BsonDocument, doc};
use docquery::errors::DbResult;
use docquery::query::{DeleteReport, Filter, FindOptions, UpdateDoc, UpdateReport};
use docquery::store::{DocumentStore, MemoryStore, StoreCursor};
use docquery::telemetry::{QueryLogger, QueryStatus, Severity, TelemetryConfig};
use docquery::Collection;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Captures query records in memory.
#[derive(Default)]
pub struct CaptureLogger {
    pub records: Mutex<Vec<(Severity, QueryStatus)>>,
}

impl CaptureLogger {
    pub fn take(&self) -> Vec<(Severity, QueryStatus)> {
        std::mem::take(&mut *self.records.lock())
    }
}

impl QueryLogger for CaptureLogger {
    fn debug(&self, status: &QueryStatus) {
        self.records.lock().push((Severity::Debug, status.clone()));
    }

    fn warn(&self, status: &QueryStatus) {
        self.records.lock().push((Severity::Warn, status.clone()));
    }
}

/// Wraps a store, counting calls and optionally sleeping or failing.
pub struct FaultStore {
    pub inner: MemoryStore,
    pub calls: AtomicUsize,
    pub delay: Option<Duration>,
    pub fail_with: Option<&'static str>,
    /// Fail with a bare error the result set has to wrap itself.
    pub fail_bare: bool,
    /// Sleep before every cursor read.
    pub read_delay: Option<Duration>,
    pub closes: Arc<AtomicUsize>,
}

/// Counts `close` calls on the cursors a `FaultStore` hands out.
pub struct CountingCursor {
    inner: Box<dyn StoreCursor>,
    closes: Arc<AtomicUsize>,
    read_delay: Option<Duration>,
}

impl StoreCursor for CountingCursor {
    fn advance(&mut self) -> DbResult<Option<BsonDocument>> {
        if let Some(d) = self.read_delay {
            std::thread::sleep(d);
        }
        self.inner.advance()
    }

    fn close(&mut self) -> DbResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.inner.close()
    }
}

#[derive(Debug)]
pub struct Transport(pub &'static str);

impl std::fmt::Display for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transport: {}", self.0)
    }
}

impl std::error::Error for Transport {}

impl FaultStore {
    pub fn new(name: &str) -> Self {
        Self {
            inner: MemoryStore::new(name),
            calls: AtomicUsize::new(0),
            delay: None,
            fail_with: None,
            fail_bare: false,
            read_delay: None,
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn enter(&self) -> DbResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(d) = self.delay {
            std::thread::sleep(d);
        }
        if self.fail_bare {
            return Err(docquery::DbError::CursorClosed);
        }
        match self.fail_with {
            Some(msg) => Err(docquery::DbError::store("transport", Transport(msg))),
            None => Ok(()),
        }
    }
}

impl DocumentStore for FaultStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn find(&self, filter: &Filter, opts: &FindOptions) -> DbResult<Box<dyn StoreCursor>> {
        self.enter()?;
        let inner = self.inner.find(filter, opts)?;
        Ok(Box::new(CountingCursor { inner, closes: Arc::clone(&self.closes), read_delay: self.read_delay }))
    }

    fn count(&self, filter: &Filter) -> DbResult<u64> {
        self.enter()?;
        self.inner.count(filter)
    }

    fn update_many(&self, filter: &Filter, update: &UpdateDoc) -> DbResult<UpdateReport> {
        self.enter()?;
        self.inner.update_many(filter, update)
    }

    fn delete_many(&self, filter: &Filter) -> DbResult<DeleteReport> {
        self.enter()?;
        self.inner.delete_many(filter)
    }
}

pub fn quiet_config() -> TelemetryConfig {
    TelemetryConfig { slow_query_ms: 100 }
}

/// Collection over `docs` with a capturing logger.
pub fn collection_with(
    name: &str,
    docs: Vec<BsonDocument>,
) -> (Collection, Arc<FaultStore>, Arc<CaptureLogger>) {
    collection_from(FaultStore::new(name), docs)
}

pub fn collection_from(
    store: FaultStore,
    docs: Vec<BsonDocument>,
) -> (Collection, Arc<FaultStore>, Arc<CaptureLogger>) {
    store.inner.insert_many(docs);
    let store = Arc::new(store);
    let logger = Arc::new(CaptureLogger::default());
    let col = Collection::new(store.clone())
        .with_logger(logger.clone())
        .with_config(quiet_config());
    (col, store, logger)
}

/// `{id: 1..=n, name: "artist-<id>"}` in shuffled insertion order.
pub fn artists(n: i32) -> Vec<BsonDocument> {
    let mut ids: Vec<i32> = (1..=n).collect();
    ids.reverse();
    ids.into_iter().map(|id| doc! {"_id": id, "id": id, "name": format!("artist-{id}")}).collect()
}
