//! Narrow interface to the document-store client the result sets run against.

pub mod memory;

use bson::Document as BsonDocument;

use crate::errors::DbResult;
use crate::query::{DeleteReport, Filter, FindOptions, UpdateDoc, UpdateReport};

pub use memory::{MemoryCursor, MemoryStore};

/// A single collection of a document store.
pub trait DocumentStore: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    /// Transport or server errors from the store.
    fn find(&self, filter: &Filter, opts: &FindOptions) -> DbResult<Box<dyn StoreCursor>>;

    /// Counts matching documents, ignoring limit and skip.
    ///
    /// # Errors
    /// Transport or server errors from the store.
    fn count(&self, filter: &Filter) -> DbResult<u64>;

    /// # Errors
    /// Transport or server errors from the store.
    fn update_many(&self, filter: &Filter, update: &UpdateDoc) -> DbResult<UpdateReport>;

    /// # Errors
    /// Transport or server errors from the store.
    fn delete_many(&self, filter: &Filter) -> DbResult<DeleteReport>;
}

/// Live server-side cursor. Single reader.
pub trait StoreCursor: Send {
    /// Returns the next raw document, `None` at end of data.
    ///
    /// # Errors
    /// Transport errors, or a read after `close`.
    fn advance(&mut self) -> DbResult<Option<BsonDocument>>;

    /// # Errors
    /// Errors releasing the server-side resource.
    fn close(&mut self) -> DbResult<()>;
}
