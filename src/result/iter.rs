use bson::Document as BsonDocument;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::errors::{DbError, DbResult};
use crate::store::StoreCursor;

/// `Open -> Active -> Exhausted`, any state `-> Closed`.
enum IterState {
    Open,
    Active(Box<dyn StoreCursor>),
    Exhausted,
    Closed,
}

impl IterState {
    fn name(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Active(_) => "active",
            Self::Exhausted => "exhausted",
            Self::Closed => "closed",
        }
    }
}

/// Manual-iteration state of one result set: the live cursor plus a write-once
/// error latch. The latch has its own lock so `err()` never waits on a fetch.
pub(crate) struct Iteration {
    state: Mutex<IterState>,
    err: Mutex<Option<Arc<DbError>>>,
}

impl Default for Iteration {
    fn default() -> Self {
        Self { state: Mutex::new(IterState::Open), err: Mutex::new(None) }
    }
}

impl Iteration {
    /// Advances one document, opening the cursor with `open` on first use.
    /// End of data and failures both end iteration; failures are latched.
    pub(crate) fn next_document<F>(&self, open: F) -> Option<BsonDocument>
    where
        F: FnOnce() -> DbResult<Box<dyn StoreCursor>>,
    {
        let mut state = self.state.lock();
        if matches!(*state, IterState::Open) {
            match open() {
                Ok(cursor) => *state = IterState::Active(cursor),
                Err(e) => {
                    self.latch(e);
                    *state = IterState::Exhausted;
                    return None;
                }
            }
        }
        let IterState::Active(cursor) = &mut *state else {
            return None;
        };
        match cursor.advance() {
            Ok(Some(doc)) => Some(doc),
            Ok(None) => {
                if let Err(e) = cursor.close() {
                    self.latch(e);
                }
                *state = IterState::Exhausted;
                None
            }
            Err(e) => {
                self.latch(e);
                let _ = cursor.close();
                *state = IterState::Exhausted;
                None
            }
        }
    }

    /// Latches `e` and stops iteration, e.g. after a decode failure.
    pub(crate) fn fail(&self, e: DbError) {
        self.latch(e);
        let mut state = self.state.lock();
        if let IterState::Active(cursor) = &mut *state {
            let _ = cursor.close();
            *state = IterState::Exhausted;
        }
    }

    fn latch(&self, e: DbError) {
        let mut slot = self.err.lock();
        if slot.is_none() {
            log::debug!("result iteration stopped: {e}");
            *slot = Some(Arc::new(e));
        }
    }

    pub(crate) fn err(&self) -> Option<Arc<DbError>> {
        self.err.lock().clone()
    }

    /// Idempotent.
    pub(crate) fn close(&self) -> DbResult<()> {
        let mut state = self.state.lock();
        let prev = std::mem::replace(&mut *state, IterState::Closed);
        log::trace!("closing result iteration in state {}", prev.name());
        match prev {
            IterState::Active(mut cursor) => cursor.close(),
            _ => Ok(()),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        matches!(*self.state.lock(), IterState::Closed)
    }
}

impl Drop for Iteration {
    // releases a live store cursor left open mid-iteration
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::debug!("closing dropped result iteration failed: {e}");
        }
    }
}
