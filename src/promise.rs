use std::any::type_name;
use std::fmt;
use std::future::IntoFuture;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, RecvTimeoutError, SendError};

use crate::chain::{Chain, Completion};
use crate::context::Context;
use crate::pair::{pair, Waiter};
use crate::resolver::{self, Reject, Resolve};
use crate::settlement::{Reason, Settlement};
use crate::Error;

/// A value that will be available later, or a failure explaining why not.
///
/// A `Promise` is a handle onto a chain of steps. `then`, `catch` and
/// `finally` append to that chain and return a new handle onto the same
/// chain, so every handle derived from one factory call observes one strictly
/// ordered pipeline:
///
/// ```
/// use promise_chain::Promise;
///
/// let p = Promise::resolved(1);
/// let q = p.then(|v| Ok(v + 1));
/// // `q` runs after `p`'s step, on whichever context the chain uses.
/// assert_eq!(q.wait().unwrap(), 2);
/// ```
///
/// Handlers fail by returning `Err`; failures skip plain `then` steps until a
/// `catch`, `or_else` or `then_else` picks them up.
pub struct Promise<T> {
    chain: Arc<Chain>,
    context: Option<Context>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            chain: self.chain.clone(),
            context: self.context.clone(),
            _payload: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("payload", &type_name::<T>())
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Promise<T> {
    pub(crate) fn from_chain(chain: Arc<Chain>) -> Self {
        Self {
            chain,
            context: None,
            _payload: PhantomData,
        }
    }

    fn seed<F>(context: &Context, action: F) -> Self
    where
        F: FnOnce(Settlement, Completion) + Send + 'static,
    {
        let chain = Chain::new(context.clone());
        chain.append(None, action);
        Self::from_chain(chain)
    }

    /// Builds a promise from a body that is handed `resolve` and `reject`.
    ///
    /// The body may call one of them once, now or later from another thread.
    /// Returning `Err` rejects. Settling twice, or returning `Err` after
    /// settling, is a [`Violation::AlreadySettled`](crate::Violation) and
    /// aborts the process.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::Promise;
    /// use std::thread;
    ///
    /// let promise = Promise::new(|resolve, _reject| {
    ///     thread::spawn(move || resolve(String::from("Hi")));
    ///     Ok(())
    /// });
    /// assert_eq!(promise.wait().unwrap(), "Hi");
    /// ```
    pub fn new<F>(body: F) -> Self
    where
        F: FnOnce(Resolve<T>, Reject) -> Result<(), Reason> + Send + 'static,
    {
        Self::new_on(&Context::global(), body)
    }

    pub fn new_on<F>(context: &Context, body: F) -> Self
    where
        F: FnOnce(Resolve<T>, Reject) -> Result<(), Reason> + Send + 'static,
    {
        Self::seed(context, move |_, done| resolver::run(body, done))
    }

    /// Builds a promise from a body that returns its value or its failure.
    pub fn from_fn<F>(body: F) -> Self
    where
        F: FnOnce() -> Result<T, Reason> + Send + 'static,
    {
        Self::from_fn_on(&Context::global(), body)
    }

    pub fn from_fn_on<F>(context: &Context, body: F) -> Self
    where
        F: FnOnce() -> Result<T, Reason> + Send + 'static,
    {
        Self::seed(context, move |_, done| done(Settlement::from_result(body())))
    }

    pub fn resolved(value: T) -> Self {
        Self::resolved_on(&Context::global(), value)
    }

    pub fn resolved_on(context: &Context, value: T) -> Self {
        Self::seed(context, move |_, done| done(Settlement::success(value)))
    }

    pub fn rejected(reason: impl Into<Reason>) -> Self {
        Self::rejected_on(&Context::global(), reason)
    }

    pub fn rejected_on(context: &Context, reason: impl Into<Reason>) -> Self {
        let reason = reason.into();
        Self::seed(context, move |_, done| done(Settlement::Failure(reason)))
    }

    /// Returns a handle whose next appended step runs on `context`. Later
    /// steps keep using `context` until another one is chosen.
    pub fn on(&self, context: &Context) -> Self {
        Self {
            chain: self.chain.clone(),
            context: Some(context.clone()),
            _payload: PhantomData,
        }
    }

    fn append<U, F>(&self, action: F) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(Settlement, Completion) + Send + 'static,
    {
        self.chain.append(self.context.clone(), action);
        Promise::from_chain(self.chain.clone())
    }

    /// Appends a step that hands the settled payload to `observer`. Used to
    /// adopt nested promises and to feed `all`, `race` and waiters. Whatever
    /// the observer gives back travels on down the chain; if it keeps the
    /// settlement the chain continues with the empty one.
    pub(crate) fn observe<F>(&self, observer: F)
    where
        F: FnOnce(Settlement) -> Option<Settlement> + Send + 'static,
    {
        let _: Promise<()> = self.append(move |input, done| {
            done(observer(input).unwrap_or_else(Settlement::empty))
        });
    }

    /// Maps the payload; failures pass through untouched.
    pub fn then<U, F>(&self, on_success: F) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U, Reason> + Send + 'static,
    {
        self.append(move |input, done| match input.into_result::<T>() {
            Ok(value) => done(Settlement::from_result(on_success(value))),
            Err(reason) => done(Settlement::Failure(reason)),
        })
    }

    /// Maps the payload with `on_success`, or recovers a failure with
    /// `on_failure`.
    pub fn then_else<U, F, R>(&self, on_success: F, on_failure: R) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U, Reason> + Send + 'static,
        R: FnOnce(Reason) -> Result<U, Reason> + Send + 'static,
    {
        self.append(move |input, done| {
            let outcome = match input.into_result::<T>() {
                Ok(value) => on_success(value),
                Err(reason) => on_failure(reason),
            };
            done(Settlement::from_result(outcome))
        })
    }

    /// Like [`then`](Self::then), but the handler returns a promise whose
    /// settlement becomes this step's settlement.
    pub fn and_then<U, F>(&self, on_success: F) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<Promise<U>, Reason> + Send + 'static,
    {
        self.append(move |input, done| match input.into_result::<T>() {
            Ok(value) => adopt(on_success(value), done),
            Err(reason) => done(Settlement::Failure(reason)),
        })
    }

    pub fn and_then_else<U, F, R>(&self, on_success: F, on_failure: R) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<Promise<U>, Reason> + Send + 'static,
        R: FnOnce(Reason) -> Result<Promise<U>, Reason> + Send + 'static,
    {
        self.append(move |input, done| {
            let nested = match input.into_result::<T>() {
                Ok(value) => on_success(value),
                Err(reason) => on_failure(reason),
            };
            adopt(nested, done)
        })
    }

    /// Recovers from a failure; a success passes through untouched.
    pub fn catch<R>(&self, on_failure: R) -> Promise<T>
    where
        R: FnOnce(Reason) -> Result<T, Reason> + Send + 'static,
    {
        self.append(move |input, done| match input {
            Settlement::Failure(reason) => done(Settlement::from_result(on_failure(reason))),
            success => done(success),
        })
    }

    /// Recovers from a failure with a promise whose settlement is adopted.
    pub fn or_else<R>(&self, on_failure: R) -> Promise<T>
    where
        R: FnOnce(Reason) -> Result<Promise<T>, Reason> + Send + 'static,
    {
        self.append(move |input, done| match input {
            Settlement::Failure(reason) => adopt(on_failure(reason), done),
            success => done(success),
        })
    }

    /// Runs `handler` whatever the outcome, then passes the incoming
    /// settlement on. A failing handler replaces it with its own failure.
    pub fn finally<F>(&self, handler: F) -> Promise<T>
    where
        F: FnOnce() -> Result<(), Reason> + Send + 'static,
    {
        self.append(move |input, done| match handler() {
            Ok(()) => done(input),
            Err(reason) => done(Settlement::Failure(reason)),
        })
    }

    /// Like [`finally`](Self::finally), but waits for the promise the handler
    /// returns. Only its failure is kept; its success payload is discarded.
    pub fn finally_promise<U, F>(&self, handler: F) -> Promise<T>
    where
        U: Send + 'static,
        F: FnOnce() -> Result<Promise<U>, Reason> + Send + 'static,
    {
        self.append(move |input, done| match handler() {
            Ok(nested) => nested.observe(move |settled| {
                match settled {
                    Settlement::Failure(reason) => done(Settlement::Failure(reason)),
                    Settlement::Success(_) => done(input),
                }
                None
            }),
            Err(reason) => done(Settlement::Failure(reason)),
        })
    }

    /// Blocks the calling thread until the chain reaches this handle.
    pub fn wait(self) -> Result<T, Reason> {
        let (tx, rx) = bounded(1);
        self.observe(move |settled| tx.send(settled).err().map(|SendError(settled)| settled));
        match rx.recv() {
            Ok(settled) => settled.into_result(),
            Err(_) => Err(Error::Abandoned.into()),
        }
    }

    /// [`wait`](Self::wait) with an upper bound on how long to block.
    ///
    /// Giving up does not take the settlement away from the chain: when it
    /// arrives later it is passed on to whatever comes next.
    pub fn wait_timeout(self, timeout: Duration) -> Result<T, Reason> {
        let (tx, rx) = bounded(1);
        self.observe(move |settled| tx.send(settled).err().map(|SendError(settled)| settled));
        match rx.recv_timeout(timeout) {
            Ok(settled) => settled.into_result(),
            Err(RecvTimeoutError::Timeout) => Err(Error::TimedOut.into()),
            Err(RecvTimeoutError::Disconnected) => Err(Error::Abandoned.into()),
        }
    }
}

/// Settles `done` with whatever `nested` eventually settles with.
fn adopt<U: Send + 'static>(nested: Result<Promise<U>, Reason>, done: Completion) {
    match nested {
        Ok(promise) => promise.observe(move |settled| {
            done(settled);
            None
        }),
        Err(reason) => done(Settlement::Failure(reason)),
    }
}

impl<T: Send + 'static> IntoFuture for Promise<T> {
    type Output = Result<T, Reason>;
    type IntoFuture = Waiter<T>;

    fn into_future(self) -> Waiter<T> {
        let (producer, waiter) = pair();
        self.observe(move |settled| producer.resolve(settled));
        waiter
    }
}
