//! Bounded work queue for per-image tasks.
//!
//! At most `capacity` tasks run at once. Admission happens inside
//! [`WorkQueue::submit`], which waits for a free slot, so tasks start in the
//! order they were submitted and the submitter gets backpressure instead of
//! an unbounded backlog.
//!
//! Completion is counted separately from the tasks themselves: the caller
//! registers how many images it will account for up front with
//! [`WorkQueue::expect`], and each image resolves exactly one of them, either
//! by finishing a submitted task or through [`WorkQueue::resolve_skipped`].
//! The drained callback runs the moment that count reaches zero.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{watch, AcquireError, Semaphore};
use tokio::task::{JoinError, JoinSet};

type DrainedCallback = Box<dyn FnOnce() + Send>;

struct Tracker {
    outstanding: AtomicUsize,
    on_drained: Mutex<Option<DrainedCallback>>,
    drained_tx: watch::Sender<bool>,
}

impl Tracker {
    fn add(&self, n: usize) {
        self.outstanding.fetch_add(n, Ordering::AcqRel);
    }

    fn complete_one(&self) {
        let previous = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        match previous {
            Ok(1) => self.fire(),
            Ok(_) => {}
            Err(_) => tracing::warn!("Work queue resolved more images than were registered"),
        }
    }

    fn fire(&self) {
        let callback = self
            .on_drained
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(callback) = callback {
            callback();
        }
        self.drained_tx.send_replace(true);
    }
}

/// Resolves one registered completion when dropped, so a panicking task is
/// still accounted for.
struct Completion(Arc<Tracker>);

impl Drop for Completion {
    fn drop(&mut self) {
        self.0.complete_one();
    }
}

/// Handle for awaiting the drained signal.
#[derive(Clone)]
pub struct DrainSignal {
    rx: watch::Receiver<bool>,
}

impl DrainSignal {
    /// Wait until every registered image has been resolved.
    pub async fn wait(mut self) {
        // The sender lives as long as the queue's tracker; if it is gone
        // there is nothing left to wait for.
        let _ = self.rx.wait_for(|drained| *drained).await;
    }

    pub fn is_drained(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Fixed-capacity queue of per-image tasks.
pub struct WorkQueue<T> {
    capacity: usize,
    semaphore: Arc<Semaphore>,
    tasks: JoinSet<T>,
    tracker: Arc<Tracker>,
    submitted: usize,
}

impl<T: Send + 'static> WorkQueue<T> {
    /// Create a queue running at most `capacity` tasks at once (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (drained_tx, _) = watch::channel(false);
        Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity)),
            tasks: JoinSet::new(),
            tracker: Arc::new(Tracker {
                outstanding: AtomicUsize::new(0),
                on_drained: Mutex::new(None),
                drained_tx,
            }),
            submitted: 0,
        }
    }

    /// Set the callback run once, when the last registered image resolves.
    pub fn on_drained<F>(&mut self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self
            .tracker
            .on_drained
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(Box::new(callback));
    }

    /// Register `n` images that will each be resolved exactly once.
    ///
    /// Call before submitting. Registering zero images on an idle queue
    /// drains it immediately.
    pub fn expect(&self, n: usize) {
        if n == 0 {
            if self.tracker.outstanding.load(Ordering::Acquire) == 0 {
                self.tracker.fire();
            }
            return;
        }
        self.tracker.add(n);
    }

    /// Resolve one registered image that needed no task.
    pub fn resolve_skipped(&self) {
        self.tracker.complete_one();
    }

    /// Wait for a free slot, then start `task`.
    ///
    /// # Notes
    ///
    /// - Admission is FIFO: the semaphore queues waiters in order, so
    ///   tasks start in submission order.
    /// - Finishing the task, or panicking, resolves one registered image.
    /// - Fails only if the semaphore has been closed.
    pub async fn submit<F>(&mut self, task: F) -> Result<(), AcquireError>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let permit = self.semaphore.clone().acquire_owned().await?;
        let completion = Completion(self.tracker.clone());
        self.submitted += 1;

        self.tasks.spawn(async move {
            let output = task.await;
            drop(permit);
            drop(completion);
            output
        });
        Ok(())
    }

    /// Tasks currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.semaphore.available_permits()
    }

    /// Images registered but not yet resolved.
    pub fn outstanding(&self) -> usize {
        self.tracker.outstanding.load(Ordering::Acquire)
    }

    /// Tasks submitted so far.
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    pub fn signal(&self) -> DrainSignal {
        DrainSignal {
            rx: self.tracker.drained_tx.subscribe(),
        }
    }

    /// Wait for every submitted task and collect their outputs.
    ///
    /// Outputs arrive in completion order. A panicked task is logged and
    /// its error returned after the remaining tasks have finished.
    pub async fn drain(mut self) -> Result<Vec<T>, JoinError> {
        let mut outputs = Vec::with_capacity(self.submitted);
        let mut first_error = None;

        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(output) => outputs.push(output),
                Err(e) => {
                    tracing::error!("Image task failed: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        let outstanding = self.outstanding();
        if outstanding > 0 {
            tracing::warn!("Work queue finished with {outstanding} registered image(s) unresolved");
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(outputs),
        }
    }
}
