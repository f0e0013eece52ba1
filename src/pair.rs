use parking_lot::Mutex;
use std::marker::PhantomData;
use std::sync::Arc;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll, Waker},
};

use crate::settlement::{Reason, Settlement};
use crate::Error;

/// Feeding side of the bridge, held by an observer step.
#[derive(Debug)]
pub(crate) struct Producer {
    inner: Arc<Mutex<Inner>>,
}

/// Resolves to the settlement of the step it was attached behind. This is
/// what `promise.await` polls.
///
/// # Examples
///
/// ```
/// use promise_chain::{Promise, Waiter};
/// use futures::executor::block_on;
/// use std::future::IntoFuture;
/// use std::thread;
///
/// let promise = Promise::resolved(String::from("🍓"));
/// let waiter: Waiter<String> = promise.into_future();
/// let task1 = thread::spawn(move || block_on(async { waiter.await.unwrap() }));
/// assert_eq!(task1.join().expect("The task1 thread has panicked."), "🍓");
/// ```
#[derive(Debug)]
pub struct Waiter<T> {
    inner: Arc<Mutex<Inner>>,
    _payload: PhantomData<fn() -> T>,
}

#[derive(Debug)]
enum WakerState {
    Fresh,
    Tainted,
}

#[derive(Debug)]
struct Inner {
    value: Option<Settlement>,
    waker: Result<Waker, WakerState>,
}

pub(crate) fn pair<T>() -> (Producer, Waiter<T>) {
    let inner = Arc::new(Mutex::new(Inner {
        value: None,
        waker: Err(WakerState::Fresh),
    }));
    (
        Producer {
            inner: inner.clone(),
        },
        Waiter {
            inner,
            _payload: PhantomData,
        },
    )
}

impl Producer {
    /// Hands `settled` to the waiter. Gives it back when the waiter is
    /// already gone.
    pub(crate) fn resolve(self, settled: Settlement) -> Option<Settlement> {
        let mut inner = self.inner.lock();
        if Arc::strong_count(&self.inner) == 1 {
            return Some(settled);
        }
        inner.value = Some(settled);
        if let Ok(waker) = std::mem::replace(&mut inner.waker, Err(WakerState::Tainted)) {
            waker.wake()
        }
        None
    }
}

impl Drop for Producer {
    /// If this is an unresolved producer, wake with error.
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if let Ok(waker) = std::mem::replace(&mut inner.waker, Err(WakerState::Tainted)) {
            waker.wake()
        }
    }
}

impl<T: 'static> Future for Waiter<T> {
    type Output = Result<T, Reason>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.lock();
        match inner.value.take() {
            Some(settled) => Poll::Ready(settled.into_result()),
            None => match std::mem::replace(&mut inner.waker, Ok(cx.waker().clone())) {
                Err(WakerState::Tainted) => Poll::Ready(Err(Error::Abandoned.into())),
                _ => Poll::Pending,
            },
        }
    }
}
