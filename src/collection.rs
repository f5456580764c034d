use std::sync::Arc;

use crate::query::Cond;
use crate::query::telemetry::{LogQueryLogger, QueryLogger, TelemetryConfig};
use crate::result::ResultSet;
use crate::store::DocumentStore;

/// Handle to one store collection; the entry point for building result sets.
#[derive(Clone)]
pub struct Collection {
    store: Arc<dyn DocumentStore>,
    logger: Arc<dyn QueryLogger>,
    cfg: Arc<TelemetryConfig>,
}

impl Collection {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store, logger: Arc::new(LogQueryLogger), cfg: Arc::new(TelemetryConfig::default()) }
    }

    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn QueryLogger>) -> Self {
        self.logger = logger;
        self
    }

    #[must_use]
    pub fn with_config(mut self, cfg: TelemetryConfig) -> Self {
        self.cfg = Arc::new(cfg);
        self
    }

    /// Returns the collection's name.
    pub fn name(&self) -> &str {
        self.store.name()
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// A result set over every document, narrowed by `terms` if any.
    pub fn find<I: IntoIterator<Item = Cond>>(&self, terms: I) -> ResultSet {
        let base = ResultSet::new(Arc::clone(&self.store), Arc::clone(&self.logger), Arc::clone(&self.cfg));
        let terms: Vec<Cond> = terms.into_iter().collect();
        if terms.is_empty() { base } else { base.filter(terms) }
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection").field("name", &self.name()).field("cfg", &self.cfg).finish()
    }
}
