//! `all` and `race`. Both seed a fresh chain with one step that observes
//! every member on the aggregation queue, so member completions are folded
//! in one at a time.
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::chain::{Chain, Completion};
use crate::context::Context;
use crate::promise::Promise;
use crate::settlement::Settlement;
use crate::{fatal, Violation};

/// Ordered collection of member payloads for `all`.
struct Gather<T> {
    slots: Vec<Option<T>>,
    filled: usize,
    done: Option<Completion>,
}

impl<T: Send + 'static> Gather<T> {
    /// Returns the completion and the settlement to hand it once the
    /// aggregate is decided; every later offer is ignored.
    fn offer(&mut self, index: usize, settled: Settlement) -> Option<(Completion, Settlement)> {
        self.done.as_ref()?;
        match settled.into_result::<T>() {
            Ok(value) => {
                self.slots[index] = Some(value);
                self.filled += 1;
                if self.filled < self.slots.len() {
                    return None;
                }
                let values: Vec<T> = self.slots.drain(..).flatten().collect();
                self.done.take().map(|done| (done, Settlement::success(values)))
            }
            Err(reason) => self.done.take().map(|done| (done, Settlement::Failure(reason))),
        }
    }
}

/// Completion shared by every member of a race; the first taker wins.
type Finish = Arc<Mutex<Option<Completion>>>;

impl<T: Send + 'static> Promise<T> {
    /// Resolves with every member's payload, in member order, once all of
    /// them succeed. The first member to fail decides the failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::Promise;
    ///
    /// let values = Promise::all(vec![
    ///     Promise::resolved(10),
    ///     Promise::from_fn(|| Ok(20)),
    /// ])
    /// .wait()
    /// .unwrap();
    /// assert_eq!(values, vec![10, 20]);
    /// ```
    pub fn all<I>(promises: I) -> Promise<Vec<T>>
    where
        I: IntoIterator<Item = Promise<T>>,
    {
        let promises: Vec<Promise<T>> = promises.into_iter().collect();
        if promises.is_empty() {
            return Promise::resolved(Vec::new());
        }
        let chain = Chain::new(Context::global());
        chain.append(None, move |_, done| {
            let total = promises.len();
            trace!(members = total, "gathering promises");
            let gather = Arc::new(Mutex::new(Gather::<T> {
                slots: (0..total).map(|_| None).collect(),
                filled: 0,
                done: Some(done),
            }));
            let aggregate = Context::aggregate();
            for (index, promise) in promises.into_iter().enumerate() {
                let gather = Arc::clone(&gather);
                promise.on(&aggregate).observe(move |settled| {
                    let decided = gather.lock().offer(index, settled);
                    if let Some((done, settlement)) = decided {
                        done(settlement)
                    }
                    None
                });
            }
        });
        Promise::from_chain(chain)
    }

    /// Settles like whichever member settles first.
    ///
    /// Racing an empty collection is a [`Violation::EmptyRace`] and aborts.
    pub fn race<I>(promises: I) -> Promise<T>
    where
        I: IntoIterator<Item = Promise<T>>,
    {
        let promises: Vec<Promise<T>> = promises.into_iter().collect();
        if promises.is_empty() {
            fatal(Violation::EmptyRace)
        }
        let chain = Chain::new(Context::global());
        chain.append(None, move |_, done| {
            trace!(members = promises.len(), "racing promises");
            let finish: Finish = Arc::new(Mutex::new(Some(done)));
            let aggregate = Context::aggregate();
            for promise in promises {
                let finish = Arc::clone(&finish);
                promise.on(&aggregate).observe(move |settled| {
                    let winner = finish.lock().take();
                    match winner {
                        Some(done) => {
                            done(settled);
                            None
                        }
                        None => Some(settled),
                    }
                });
            }
        });
        Promise::from_chain(chain)
    }
}
