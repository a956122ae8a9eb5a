//! Pipelines of fallible async steps
//!
//! A [`Pipeline`] is a suspended computation producing an [`Envelope`]. It is
//! built with [`Pipeline::start`] (or [`Pipeline::begin`]) and extended step
//! by step. Nothing runs until [`Pipeline::resolve`] is awaited.
//!
//! - [`pass`](Pipeline::pass) short-circuits: once an envelope is not ok,
//!   every later `pass` step is skipped and the failure travels to the end
//!   with an empty value of the right type.
//! - [`map`](Pipeline::map) and [`map_async`](Pipeline::map_async) transform
//!   the value whatever the outcome. Side effects belong behind a `pass`.
//! - A step that panics does not take the process down: `resolve` turns the
//!   panic into an [`ErrorCode::Unknown`](crate::envelope::ErrorCode) envelope.
//!
//! ```rust
//! use podline_domain::{Envelope, Pipeline};
//!
//! # async fn example() {
//! let doubled = Pipeline::start(21u32)
//!     .pass(|n| async move { Envelope::ok(n * 2) })
//!     .resolve()
//!     .await;
//! assert_eq!(*doubled.value(), 42);
//! # }
//! ```

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tracing::{error, info};

use crate::envelope::Envelope;

/// Suspended chain of envelope-producing steps
#[must_use = "a pipeline does nothing until resolved"]
pub struct Pipeline<'a, T> {
    run: BoxFuture<'a, Envelope<T>>,
}

impl<'a, T: Send + 'a> Pipeline<'a, T> {
    /// Start from an ok value
    pub fn start(value: T) -> Self {
        Self::from_envelope(Envelope::ok(value))
    }

    /// Start from an existing envelope, ok or not
    pub fn from_envelope(envelope: Envelope<T>) -> Self {
        Self {
            run: async move { envelope }.boxed(),
        }
    }

    /// Start from a step that is only invoked on resolve
    pub fn begin<F, Fut>(step: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Envelope<T>> + Send + 'a,
    {
        Self {
            run: async move { step().await }.boxed(),
        }
    }

    /// Feed the value to `step` if the envelope so far is ok
    pub fn pass<U, F, Fut>(self, step: F) -> Pipeline<'a, U>
    where
        U: Default + Send + 'a,
        F: FnOnce(T) -> Fut + Send + 'a,
        Fut: Future<Output = Envelope<U>> + Send + 'a,
    {
        let previous = self.run;
        Pipeline {
            run: async move {
                let envelope = previous.await;
                if envelope.is_not_ok() {
                    return Envelope::failure_of(&envelope);
                }
                step(envelope.into_value()).await
            }
            .boxed(),
        }
    }

    /// Transform the value, keeping status, code and message
    pub fn map<U, F>(self, f: F) -> Pipeline<'a, U>
    where
        U: Send + 'a,
        F: FnOnce(T) -> U + Send + 'a,
    {
        let previous = self.run;
        Pipeline {
            run: async move { previous.await.map(f) }.boxed(),
        }
    }

    /// Async variant of [`map`](Self::map)
    pub fn map_async<U, F, Fut>(self, f: F) -> Pipeline<'a, U>
    where
        U: Send + 'a,
        F: FnOnce(T) -> Fut + Send + 'a,
        Fut: Future<Output = U> + Send + 'a,
    {
        let previous = self.run;
        Pipeline {
            run: async move {
                let (header, value) = previous.await.split();
                header.project(f(value).await)
            }
            .boxed(),
        }
    }

    /// Observe the envelope without changing it
    pub fn inspect<F>(self, f: F) -> Self
    where
        F: FnOnce(&Envelope<T>) + Send + 'a,
    {
        let previous = self.run;
        Self {
            run: async move {
                let envelope = previous.await;
                f(&envelope);
                envelope
            }
            .boxed(),
        }
    }

    /// Emit `message` when the chain starts running
    pub fn log(self, message: impl Into<String>) -> Self {
        let message = message.into();
        let previous = self.run;
        Self {
            run: async move {
                info!("{}", message);
                previous.await
            }
            .boxed(),
        }
    }

    /// Wait `delay` before the chain so far starts running
    pub fn delay(self, delay: Duration) -> Self {
        let previous = self.run;
        Self {
            run: async move {
                tokio::time::sleep(delay).await;
                previous.await
            }
            .boxed(),
        }
    }
}

impl<'a, T: Default + Send + 'a> Pipeline<'a, T> {
    /// Run the whole chain and return the final envelope
    pub async fn resolve(self) -> Envelope<T> {
        match AssertUnwindSafe(self.run).catch_unwind().await {
            Ok(envelope) => envelope,
            Err(panic) => {
                let reason = panic_reason(panic.as_ref());
                error!(reason = %reason, "Pipeline step panicked");
                Envelope::unknown(reason)
            }
        }
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown fault".to_string()
    }
}
