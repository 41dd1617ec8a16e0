//! Single-shot calls and their delivery adapters.
//!
//! # Design
//! A [`Call`] is a lazy future resolving to exactly one outcome. It can be
//! awaited directly, or handed to one of the sinks, which run it on the Tokio
//! runtime and invoke the callback on the call's [`DeliveryQueue`]. Sinks
//! return a [`Subscription`]; dropping it cancels the call and guarantees the
//! callback never runs.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use tokio::task::AbortHandle;

use crate::delivery::DeliveryQueue;
use crate::error::ApiError;
use crate::loadable::Loadable;

/// An in-flight API call producing one `Result<T, ApiError>`.
///
/// Nothing runs until the call is polled or sunk.
#[must_use = "calls do nothing unless awaited or sunk"]
pub struct Call<T> {
    future: BoxFuture<'static, Result<T, ApiError>>,
    delivery: DeliveryQueue,
}

impl<T: Send + 'static> Call<T> {
    pub fn new(
        future: impl Future<Output = Result<T, ApiError>> + Send + 'static,
        delivery: DeliveryQueue,
    ) -> Self {
        Self {
            future: future.boxed(),
            delivery,
        }
    }

    /// A call that resolves to `outcome` without doing any work.
    pub fn ready(outcome: Result<T, ApiError>, delivery: DeliveryQueue) -> Self {
        Self::new(future::ready(outcome), delivery)
    }

    pub fn delivery(&self) -> &DeliveryQueue {
        &self.delivery
    }

    /// Hold the outcome back until `interval` has passed since the call was
    /// first polled.
    ///
    /// Outcomes that arrive later than `interval` pass through without extra
    /// delay. Values and errors are delayed alike and never altered.
    pub fn ensure_time_span(self, interval: Duration) -> Self {
        let Call {
            future: source,
            delivery,
        } = self;
        let gated = async move {
            let (outcome, ()) = future::join(source, tokio::time::sleep(interval)).await;
            outcome
        };
        Call::new(gated, delivery)
    }

    /// Run the call and deliver its outcome to `receive` on the delivery
    /// queue. `receive` runs exactly once unless the subscription is
    /// cancelled first.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn sink_to_result<F>(self, receive: F) -> Subscription
    where
        F: FnOnce(Result<T, ApiError>) + Send + 'static,
    {
        self.sink("sink_to_result", receive)
    }

    /// Like [`Call::sink_to_result`], reporting the outcome as a [`Loadable`].
    ///
    /// Never reports [`Loadable::Idle`].
    pub fn sink_to_loadable<F>(self, receive: F) -> Subscription
    where
        F: FnOnce(Loadable<T>) + Send + 'static,
    {
        self.sink("sink_to_loadable", move |outcome| receive(Loadable::from(outcome)))
    }

    fn sink<F>(self, sink: &'static str, deliver: F) -> Subscription
    where
        F: FnOnce(Result<T, ApiError>) + Send + 'static,
    {
        let Call { future, delivery } = self;
        let cancelled = Arc::new(AtomicBool::new(false));
        let gate = Arc::clone(&cancelled);

        let task = tokio::spawn(async move {
            let outcome = future.await;
            if let Err(error) = &outcome {
                tracing::error!(%error, "{sink} failed");
            }
            delivery.dispatch(move || {
                if !gate.load(Ordering::Acquire) {
                    deliver(outcome);
                }
            });
        });

        Subscription {
            task: task.abort_handle(),
            cancelled,
            detached: false,
        }
    }
}

impl<T> Future for Call<T> {
    type Output = Result<T, ApiError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

impl<T> std::fmt::Debug for Call<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("delivery", &self.delivery)
            .finish_non_exhaustive()
    }
}

/// Handle to a sunk call. Cancels the call when dropped.
#[must_use = "dropping a Subscription cancels its call"]
#[derive(Debug)]
pub struct Subscription {
    task: AbortHandle,
    cancelled: Arc<AtomicBool>,
    detached: bool,
}

impl Subscription {
    /// Stop the call. The callback will not run afterwards.
    ///
    /// Only the async side is aborted. A request already handed to a
    /// blocking transport such as [`UreqTransport`](crate::UreqTransport)
    /// finishes on its worker thread, so the server may still observe it;
    /// its response is discarded.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.task.abort();
    }

    /// Whether the call has produced its outcome (or was cancelled).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Let the call run to completion without keeping the handle around.
    pub fn detach(mut self) {
        self.detached = true;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.detached {
            self.cancel();
        }
    }
}
