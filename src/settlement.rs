use std::any::{type_name, Any};
use std::fmt;

use crate::Error;

/// Type-erased success payload. Steps of one chain produce different types,
/// so the chain only ever sees boxes; [`Settlement::into_result`] recovers the
/// concrete type at the handle that knows it.
pub type Payload = Box<dyn Any + Send>;

/// Failure reason carried down a chain.
pub type Reason = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Outcome of one step: a success payload or a failure reason.
pub enum Settlement {
    Success(Payload),
    Failure(Reason),
}

impl Settlement {
    pub fn success<T: Send + 'static>(value: T) -> Self {
        Settlement::Success(Box::new(value))
    }

    pub fn failure(reason: impl Into<Reason>) -> Self {
        Settlement::Failure(reason.into())
    }

    /// The "no meaningful value" success, carrying `()`.
    pub fn empty() -> Self {
        Settlement::success(())
    }

    pub fn from_result<T: Send + 'static>(result: Result<T, Reason>) -> Self {
        match result {
            Ok(value) => Settlement::success(value),
            Err(reason) => Settlement::Failure(reason),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Settlement::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    /// Recovers the payload as a `T`. A payload of any other type yields
    /// [`Error::PayloadType`].
    pub fn into_result<T: 'static>(self) -> Result<T, Reason> {
        match self {
            Settlement::Success(payload) => payload.downcast::<T>().map(|value| *value).map_err(|_| {
                Error::PayloadType {
                    expected: type_name::<T>(),
                }
                .into()
            }),
            Settlement::Failure(reason) => Err(reason),
        }
    }
}

impl fmt::Debug for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Settlement::Success(_) => f.write_str("Success(..)"),
            Settlement::Failure(reason) => f.debug_tuple("Failure").field(reason).finish(),
        }
    }
}
