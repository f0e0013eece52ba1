//! Places where chain steps run.
//!
//! The chain never runs a step on the thread that appended it; it hands the
//! step to an [`ExecutionContext`] and moves on.
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::pool::{SerialQueue, ThreadPool};

/// A unit of work submitted to a context.
pub type Work = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run work later, off the submitting thread.
///
/// Implementations must start work in submission order; they are free to run
/// several pieces of work at once.
pub trait ExecutionContext: Send + Sync {
    fn enqueue(&self, work: Work);
}

/// Shared handle to an [`ExecutionContext`].
#[derive(Clone)]
pub struct Context {
    inner: Arc<dyn ExecutionContext>,
}

static GLOBAL: OnceLock<Context> = OnceLock::new();
static AGGREGATE: OnceLock<Context> = OnceLock::new();

impl Context {
    pub fn new<C: ExecutionContext + 'static>(context: C) -> Self {
        Self {
            inner: Arc::new(context),
        }
    }

    /// Process-wide pool used whenever no context is given.
    pub fn global() -> Self {
        GLOBAL
            .get_or_init(|| match ThreadPool::builder().name("promise-global").build() {
                Ok(pool) => pool.into(),
                Err(err) => panic!("cannot start the global promise pool: {err}"),
            })
            .clone()
    }

    /// Serial queue that `all` and `race` funnel member completions through.
    pub(crate) fn aggregate() -> Self {
        AGGREGATE
            .get_or_init(|| match SerialQueue::new("promise-aggregate") {
                Ok(queue) => queue.into(),
                Err(err) => panic!("cannot start the promise aggregation queue: {err}"),
            })
            .clone()
    }

    pub fn enqueue<F>(&self, work: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.enqueue(Box::new(work))
    }

    /// True when both handles point at the same context.
    pub fn same_as(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").finish_non_exhaustive()
    }
}

impl From<ThreadPool> for Context {
    fn from(pool: ThreadPool) -> Self {
        Context::new(pool)
    }
}

impl From<SerialQueue> for Context {
    fn from(queue: SerialQueue) -> Self {
        Context::new(queue)
    }
}
