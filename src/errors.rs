use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// The requested feature is not supported by this store. Callers branch on it.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Single-item fetch found nothing.
    #[error("no more rows in this result set")]
    NoMoreRows,

    #[error("{op}: {source}")]
    Store {
        op: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("BSON: {0}")]
    Bson(#[from] bson::error::Error),

    #[error("Serde JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store cursor closed")]
    CursorClosed,
}

impl DbError {
    /// Wraps a collaborator error with the name of the store operation that produced it.
    pub fn store<E>(op: &'static str, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store { op, source: Box::new(error) }
    }

    #[must_use]
    pub const fn is_no_more_rows(&self) -> bool {
        matches!(self, Self::NoMoreRows)
    }

    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}
