//! Thread-backed execution contexts. Both use a multi-producer channel as
//! their backend: handles clone the sending side, workers share the receiving
//! side.
use std::num::NonZeroUsize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error};

use crate::context::{ExecutionContext, Work};
use crate::Error;

/// Fixed-size pool of worker threads draining one FIFO queue.
///
/// Work starts in submission order but may overlap. Dropping every handle
/// lets the workers finish what is queued and exit.
#[derive(Debug, Clone)]
pub struct ThreadPool {
    sender: Sender<Work>,
    workers: usize,
}

/// Configuration for a [`ThreadPool`].
///
/// # Examples
///
/// ```
/// use promise_chain::{Context, Promise, ThreadPool};
///
/// let pool = ThreadPool::builder().workers(2).name("io").build().unwrap();
/// let context = Context::from(pool);
/// let value = Promise::resolved_on(&context, 3).then(|v| Ok(v + 1)).wait().unwrap();
/// assert_eq!(value, 4);
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    workers: usize,
    name: String,
    stack_size: Option<usize>,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(4),
            name: String::from("promise-worker"),
            stack_size: None,
        }
    }
}

impl Builder {
    /// Number of worker threads; zero is raised to one.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Thread name prefix, workers are named `<prefix>-<index>`.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Stack size of each worker; the platform default when unset.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub fn build(self) -> Result<ThreadPool, Error> {
        let (sender, receiver) = unbounded::<Work>();
        for index in 0..self.workers {
            let mut builder = thread::Builder::new().name(format!("{}-{index}", self.name));
            if let Some(bytes) = self.stack_size {
                builder = builder.stack_size(bytes);
            }
            let receiver = receiver.clone();
            builder.spawn(move || drain(receiver))?;
        }
        Ok(ThreadPool {
            sender,
            workers: self.workers,
        })
    }
}

impl ThreadPool {
    pub fn builder() -> Builder {
        Builder::default()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl ExecutionContext for ThreadPool {
    fn enqueue(&self, work: Work) {
        if self.sender.send(work).is_err() {
            error!("thread pool has no workers left, dropping work");
        }
    }
}

/// A single worker: work runs strictly one at a time, in submission order.
#[derive(Debug, Clone)]
pub struct SerialQueue {
    pool: ThreadPool,
}

impl SerialQueue {
    pub fn new(name: impl Into<String>) -> Result<Self, Error> {
        let pool = ThreadPool::builder().workers(1).name(name).build()?;
        Ok(Self { pool })
    }
}

impl ExecutionContext for SerialQueue {
    fn enqueue(&self, work: Work) {
        self.pool.enqueue(work)
    }
}

fn drain(receiver: Receiver<Work>) {
    let name = thread::current().name().unwrap_or("promise-worker").to_owned();
    debug!(worker = %name, "worker started");
    for work in receiver.iter() {
        if let Err(panic) = catch_unwind(AssertUnwindSafe(work)) {
            error!(worker = %name, message = panic_message(&*panic), "work panicked");
        }
    }
    debug!(worker = %name, "worker stopped");
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
