//! Chained promises with serialized, one-step-at-a-time execution.
//!
//! A [`Promise`] is a handle onto a chain of steps. Every `then`, `catch` or
//! `finally` call appends a step to that chain and hands back a new handle
//! aliasing it. Steps run strictly in the order they were appended, each on
//! the [`Context`] it was bound to, and each one only after the previous
//! step's [`Settlement`] is available.
//!
//! # Examples
//!
//! ```
//! use promise_chain::Promise;
//!
//! let total = Promise::resolved(2)
//!     .then(|v| Ok(v * 10))
//!     .and_then(|v| Ok(Promise::from_fn(move || Ok(v + 5))))
//!     .wait()
//!     .unwrap();
//! assert_eq!(total, 25);
//! ```
//!
//! Awaiting works with any executor:
//!
//! ```
//! use promise_chain::Promise;
//! use futures::executor::block_on;
//!
//! let (a, b) = (Promise::resolved(1), Promise::resolved(2));
//! let values = block_on(async { Promise::all([a, b]).await }).unwrap();
//! assert_eq!(values, vec![1, 2]);
//! ```
mod chain;
mod combinators;
pub mod context;
mod pair;
pub mod pool;
mod promise;
mod resolver;
mod settlement;

pub use context::{Context, ExecutionContext, Work};
pub use pair::Waiter;
pub use pool::{Builder, SerialQueue, ThreadPool};
pub use promise::Promise;
pub use resolver::{Reject, Resolve};
pub use settlement::{Payload, Reason, Settlement};

use thiserror::Error;

/// Recoverable failures produced by the library itself. They travel down a
/// chain as ordinary [`Settlement::Failure`] values.
#[derive(Debug, Error)]
pub enum Error {
    #[error("every resolve and reject handle was dropped before the promise settled")]
    ResolverDropped,
    #[error("settled payload is not a `{expected}`")]
    PayloadType { expected: &'static str },
    #[error("the chain was dropped before the awaited step settled")]
    Abandoned,
    #[error("timed out waiting for the promise to settle")]
    TimedOut,
    #[error("failed to start a worker thread")]
    Spawn(#[from] std::io::Error),
}

/// Programming errors in the way a chain is driven. These are never turned
/// into a [`Settlement::Failure`]: hitting one writes the `Display` text to
/// stderr and aborts the process.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    #[error("Promise is already settled.")]
    AlreadySettled,
    #[error("Cannot race with an empty collection of promises.")]
    EmptyRace,
    #[error("Promise step panicked.")]
    StepPanicked,
}

pub(crate) fn fatal(violation: Violation) -> ! {
    tracing::error!(%violation, "promise protocol violation");
    eprintln!("{violation}");
    std::process::abort()
}

/// `Promise::all` over a fixed list of promises.
///
/// ```
/// use promise_chain::{all, Promise};
///
/// let values = all!(Promise::resolved(1), Promise::resolved(2)).wait().unwrap();
/// assert_eq!(values, vec![1, 2]);
/// ```
#[macro_export]
macro_rules! all {
    ($($promise:expr),+ $(,)?) => {
        $crate::Promise::all([$($promise),+])
    };
}

/// `Promise::race` over a fixed list of promises.
#[macro_export]
macro_rules! race {
    ($($promise:expr),+ $(,)?) => {
        $crate::Promise::race([$($promise),+])
    };
}
