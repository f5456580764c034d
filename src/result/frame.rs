//! Persistent chain of pending query mutations.

use std::sync::Arc;

use crate::errors::DbResult;
use crate::query::Filter;

use super::paginate;
use super::spec::QuerySpec;

pub type ApplyFn = dyn Fn(&mut QuerySpec) -> DbResult<()> + Send + Sync;

/// One immutable link. Branching a chain shares the common prefix.
pub struct Frame {
    prev: Option<Arc<Frame>>,
    apply: Box<ApplyFn>,
}

impl Frame {
    /// Builds a new tip on top of `parent` without touching it.
    pub fn chain<F>(parent: Option<&Arc<Self>>, apply: F) -> Arc<Self>
    where
        F: Fn(&mut QuerySpec) -> DbResult<()> + Send + Sync + 'static,
    {
        Arc::new(Self { prev: parent.cloned(), apply: Box::new(apply) })
    }

    #[must_use]
    pub fn prev(&self) -> Option<&Arc<Self>> {
        self.prev.as_ref()
    }

    /// Number of frames from this one back to the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        std::iter::successors(Some(self), |f| f.prev.as_deref()).count()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame").field("depth", &self.depth()).finish_non_exhaustive()
    }
}

impl Drop for Frame {
    // unlink iteratively; long chains would otherwise recurse once per frame
    fn drop(&mut self) {
        let mut next = self.prev.take();
        while let Some(frame) = next {
            match Arc::try_unwrap(frame) {
                Ok(mut frame) => next = frame.prev.take(),
                Err(_) => break,
            }
        }
    }
}

/// Folds the chain ending at `tip` into a query specification.
///
/// Frames replay oldest first against an empty spec; the first failing frame
/// aborts. Afterwards the cursor predicate and sort key are merged, page-size
/// pagination is applied and unset conditions default to `Filter::True`.
///
/// # Errors
/// The error of the first failing frame.
pub fn materialize(tip: Option<&Arc<Frame>>) -> DbResult<QuerySpec> {
    let frames: Vec<&Frame> = std::iter::successors(tip.map(|t| &**t), |f| f.prev.as_deref()).collect();
    let mut spec = QuerySpec::default();
    for frame in frames.iter().rev() {
        (frame.apply)(&mut spec)?;
    }
    paginate::finish(&mut spec);
    if spec.conditions.is_none() {
        spec.conditions = Some(Filter::True);
    }
    Ok(spec)
}
