//! Completion handles handed to a resolver body.
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::chain::Completion;
use crate::settlement::{Reason, Settlement};
use crate::{fatal, Error, Violation};

/// Resolves the promise built by [`Promise::new`](crate::Promise::new).
/// Cloneable and callable from any thread; calling it after the promise has
/// settled is a [`Violation::AlreadySettled`] and aborts the process.
pub type Resolve<T> = Arc<dyn Fn(T) + Send + Sync + 'static>;

/// Rejects the promise built by [`Promise::new`](crate::Promise::new). Same
/// rules as [`Resolve`].
pub type Reject = Arc<dyn Fn(Reason) + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Pending,
    Resolved,
    Rejected,
    Thrown,
}

struct Inner {
    outcome: Outcome,
    completion: Option<Completion>,
}

/// Shared settle-once cell behind one pair of handles.
pub(crate) struct Settle {
    inner: Mutex<Inner>,
}

impl Settle {
    fn settle(&self, outcome: Outcome, settlement: Settlement) {
        let completion = {
            let mut inner = self.inner.lock();
            if inner.outcome != Outcome::Pending {
                let previous = inner.outcome;
                drop(inner);
                warn!(?previous, attempted = ?outcome, "second settlement of a resolver body");
                fatal(Violation::AlreadySettled)
            }
            inner.outcome = outcome;
            inner.completion.take()
        };
        if let Some(done) = completion {
            done(settlement)
        }
    }
}

impl Drop for Settle {
    /// Every handle is gone and nobody settled: fail instead of stalling the
    /// chain forever. Handles dropped by a panicking body are left to the
    /// step's panic handling.
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        if let Some(done) = self.inner.get_mut().completion.take() {
            warn!("resolver dropped without settling");
            done(Settlement::failure(Error::ResolverDropped))
        }
    }
}

/// Runs a resolver body against `done`. An `Err` returned by the body counts
/// as a rejection, or as a violation if the body already settled.
pub(crate) fn run<T, F>(body: F, done: Completion)
where
    T: Send + 'static,
    F: FnOnce(Resolve<T>, Reject) -> Result<(), Reason>,
{
    let settle = Arc::new(Settle {
        inner: Mutex::new(Inner {
            outcome: Outcome::Pending,
            completion: Some(done),
        }),
    });
    let resolve: Resolve<T> = {
        let settle = Arc::clone(&settle);
        Arc::new(move |value: T| settle.settle(Outcome::Resolved, Settlement::success(value)))
    };
    let reject: Reject = {
        let settle = Arc::clone(&settle);
        Arc::new(move |reason: Reason| settle.settle(Outcome::Rejected, Settlement::Failure(reason)))
    };
    if let Err(reason) = body(resolve, reject) {
        settle.settle(Outcome::Thrown, Settlement::Failure(reason));
    }
}

#[cfg(test)]
mod tests {
    use super::run;
    use crate::settlement::Settlement;
    use crate::Error;
    use crossbeam_channel::{bounded, Receiver};
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn capture() -> (crate::chain::Completion, Receiver<Settlement>) {
        let (tx, rx) = bounded(2);
        (Box::new(move |s| tx.send(s).unwrap()), rx)
    }

    #[test]
    fn test_resolve_completes_once() {
        let (done, rx) = capture();
        run::<i32, _>(|resolve, _| {
            resolve(1);
            Ok(())
        }, done);
        assert_eq!(rx.recv().unwrap().into_result::<i32>().unwrap(), 1);
    }

    #[test]
    fn test_body_error_rejects() {
        let (done, rx) = capture();
        run::<i32, _>(|_, _| Err("thrown".into()), done);
        assert_eq!(rx.recv().unwrap().into_result::<i32>().unwrap_err().to_string(), "thrown");
    }

    #[test]
    fn test_dropped_handles_reject() {
        let (done, rx) = capture();
        run::<i32, _>(|_, _| Ok(()), done);
        let reason = rx.recv().unwrap().into_result::<i32>().unwrap_err();
        assert!(matches!(reason.downcast_ref::<Error>(), Some(Error::ResolverDropped)));
    }

    #[test]
    fn test_panicking_body_does_not_reject() {
        let (done, rx) = capture();
        let panic = catch_unwind(AssertUnwindSafe(|| {
            run::<i32, _>(|_, _| panic!("bug in body"), done)
        }));
        assert!(panic.is_err());
        assert!(rx.try_recv().is_err());
    }
}
