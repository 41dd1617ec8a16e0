//! The delivery context: a dedicated thread that runs result callbacks.
//!
//! # Design
//! UI toolkits want results on one designated thread. A `DeliveryQueue`
//! owns such a thread and drains a job queue on it, so callbacks run one
//! after another in the order they were dispatched. Pipeline stages check
//! they are *not* running here with [`DeliveryQueue::debug_assert_not_current`].
//!
//! A callback that panics is logged and skipped; later jobs still run. The
//! thread exits once every handle to its queue has been dropped.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};

use crossbeam_channel::Sender;

type Job = Box<dyn FnOnce() + Send + 'static>;

static MAIN: OnceLock<DeliveryQueue> = OnceLock::new();

/// Handle to a delivery thread. Cheap to clone.
#[derive(Clone)]
pub struct DeliveryQueue {
    inner: Arc<Inner>,
}

struct Inner {
    sender: Sender<Job>,
    thread_id: ThreadId,
    label: String,
}

impl DeliveryQueue {
    /// Spawn a new delivery thread named `label`.
    ///
    /// # Panics
    ///
    /// Panics if the OS refuses to create the thread, like
    /// [`std::thread::spawn`].
    pub fn new(label: &str) -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded::<Job>();
        let handle = thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                for job in receiver {
                    // A panicking callback must not take the queue down with it.
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                        tracing::error!(panic = panic_message(&*payload), "delivery callback panicked");
                    }
                }
                tracing::debug!("delivery queue drained");
            })
            .unwrap_or_else(|e| panic!("failed to spawn delivery thread: {e}"));

        Self {
            inner: Arc::new(Inner {
                sender,
                thread_id: handle.thread().id(),
                label: label.to_string(),
            }),
        }
    }

    /// The process-wide delivery queue, started on first use.
    pub fn main() -> &'static DeliveryQueue {
        MAIN.get_or_init(|| DeliveryQueue::new("asyncload-main"))
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Queue `job` to run on the delivery thread.
    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) {
        if self.inner.sender.send(Box::new(job)).is_err() {
            tracing::warn!(queue = %self.inner.label, "delivery thread is gone, dropping job");
        }
    }

    /// Whether the calling thread is this queue's delivery thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.inner.thread_id
    }

    /// Panics in debug builds when called on the delivery thread.
    #[inline]
    pub fn debug_assert_not_current(&self) {
        debug_assert!(
            !self.is_current(),
            "pipeline work must not run on delivery queue `{}`",
            self.inner.label
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

impl std::fmt::Debug for DeliveryQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryQueue")
            .field("label", &self.inner.label)
            .field("thread_id", &self.inner.thread_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn jobs_run_on_the_delivery_thread() {
        let queue = DeliveryQueue::new("test-delivery");
        let (tx, rx) = crossbeam_channel::bounded(1);
        let observer = queue.clone();
        queue.dispatch(move || {
            let name = thread::current().name().map(str::to_string);
            tx.send((observer.is_current(), name)).unwrap();
        });

        let (on_queue, name) = rx.recv_timeout(WAIT).unwrap();
        assert!(on_queue);
        assert_eq!(name.as_deref(), Some("test-delivery"));
        assert!(!queue.is_current());
    }

    #[test]
    fn jobs_run_in_dispatch_order() {
        let queue = DeliveryQueue::new("ordered");
        let (tx, rx) = crossbeam_channel::unbounded();
        for i in 0..10 {
            let tx = tx.clone();
            queue.dispatch(move || tx.send(i).unwrap());
        }
        let seen: Vec<i32> = (0..10).map(|_| rx.recv_timeout(WAIT).unwrap()).collect();
        assert_eq!(seen, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn panicking_job_does_not_stop_the_queue() {
        let queue = DeliveryQueue::new("survivor");
        let (tx, rx) = crossbeam_channel::bounded(1);
        let observer = queue.clone();
        queue.dispatch(|| panic!("callback exploded"));
        queue.dispatch(move || tx.send(observer.is_current()).unwrap());

        assert!(rx.recv_timeout(WAIT).unwrap());
    }

    #[test]
    fn panic_payloads_are_described() {
        let text: Box<dyn Any + Send> = Box::new("static text");
        assert_eq!(panic_message(&*text), "static text");
        let owned: Box<dyn Any + Send> = Box::new(String::from("formatted 7"));
        assert_eq!(panic_message(&*owned), "formatted 7");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*other), "non-string panic payload");
    }

    #[test]
    fn main_queue_is_shared() {
        let a = DeliveryQueue::main();
        let b = DeliveryQueue::main();
        assert!(Arc::ptr_eq(&a.inner, &b.inner));
        assert_eq!(a.label(), "asyncload-main");
    }

    #[test]
    fn assert_passes_off_the_delivery_thread() {
        DeliveryQueue::new("elsewhere").debug_assert_not_current();
    }

    #[test]
    fn assert_fires_on_the_delivery_thread() {
        let queue = DeliveryQueue::new("guarded");
        let (tx, rx) = crossbeam_channel::bounded(1);
        let observer = queue.clone();
        queue.dispatch(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                observer.debug_assert_not_current()
            }));
            tx.send(result.is_err()).unwrap();
        });
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), cfg!(debug_assertions));
    }
}
