//! Deadline queue that sweeps expired buckets.
//!
//! Every bucket creation arms exactly one deadline tagged with the bucket's
//! generation. A single background thread sleeps until the earliest deadline,
//! then hands each due entry back to its target. The thread only holds a
//! [`Weak`] reference to the target, so pending deadlines never keep a store
//! alive; it exits once the target is gone or the scheduler is dropped.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, trace};

/// Receiver of fired deadlines.
pub(crate) trait Expire: Send + Sync {
    /// Drop the state for `namespace` if it still belongs to `generation`.
    ///
    /// Returns `true` if something was removed.
    fn expire(&self, namespace: &str, generation: u64) -> bool;
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Deadline {
    at: Instant,
    generation: u64,
    namespace: String,
}

#[derive(Default)]
struct Queue {
    deadlines: BinaryHeap<Reverse<Deadline>>,
    shutdown: bool,
}

#[derive(Default)]
struct SchedulerShared {
    queue: Mutex<Queue>,
    wakeup: Condvar,
    running: AtomicBool,
}

/// Handle to the expiry thread.
///
/// Dropping the handle stops the thread; deadlines still queued are discarded.
pub(crate) struct ExpiryScheduler {
    shared: Arc<SchedulerShared>,
}

impl ExpiryScheduler {
    /// Create an idle scheduler. Deadlines may be queued before [`start`](Self::start).
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SchedulerShared::default()),
        }
    }

    /// Spawn the expiry thread, delivering fired deadlines to `target`.
    pub fn start<T: Expire + 'static>(&self, target: Weak<T>) -> io::Result<()> {
        let worker = Arc::clone(&self.shared);
        worker.running.store(true, Ordering::SeqCst);

        let spawned = thread::Builder::new()
            .name("warden-expiry".to_string())
            .spawn(move || worker.run(target));

        if let Err(e) = spawned {
            self.shared.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        debug!("Expiry thread started");
        Ok(())
    }

    /// Arm a one-shot deadline for one bucket generation.
    pub fn schedule(&self, namespace: &str, generation: u64, at: Instant) {
        let mut queue = self.shared.queue.lock();

        // Only an earlier deadline changes how long the thread should sleep.
        let wake = queue
            .deadlines
            .peek()
            .map_or(true, |Reverse(next)| at < next.at);

        queue.deadlines.push(Reverse(Deadline {
            at,
            generation,
            namespace: namespace.to_string(),
        }));
        drop(queue);

        if wake {
            self.shared.wakeup.notify_one();
        }
    }

    /// Number of deadlines that have not fired yet.
    #[cfg(test)]
    pub fn pending(&self) -> usize {
        self.shared.queue.lock().deadlines.len()
    }

    /// Whether the expiry thread is still alive.
    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    fn shutdown(&self) {
        let mut queue = self.shared.queue.lock();
        queue.shutdown = true;
        queue.deadlines.clear();
        drop(queue);

        self.shared.wakeup.notify_all();
    }
}

impl Drop for ExpiryScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl SchedulerShared {
    fn run<T: Expire>(&self, target: Weak<T>) {
        while let Some(due) = self.next_due() {
            let Some(target) = target.upgrade() else {
                break;
            };

            for deadline in due {
                let removed = target.expire(&deadline.namespace, deadline.generation);
                trace!(
                    namespace = %deadline.namespace,
                    generation = deadline.generation,
                    removed = removed,
                    "Deadline fired"
                );
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Expiry thread stopped");
    }

    /// Block until at least one deadline is due, then drain every due entry.
    ///
    /// Returns `None` once the scheduler has been shut down.
    fn next_due(&self) -> Option<Vec<Deadline>> {
        let mut queue = self.queue.lock();

        loop {
            if queue.shutdown {
                return None;
            }

            let next_at = queue.deadlines.peek().map(|Reverse(next)| next.at);
            match next_at {
                None => self.wakeup.wait(&mut queue),
                Some(at) if at > Instant::now() => {
                    self.wakeup.wait_until(&mut queue, at);
                }
                Some(_) => break,
            }
        }

        let now = Instant::now();
        let mut due = Vec::new();
        while queue
            .deadlines
            .peek()
            .is_some_and(|Reverse(next)| next.at <= now)
        {
            if let Some(Reverse(deadline)) = queue.deadlines.pop() {
                due.push(deadline);
            }
        }

        Some(due)
    }
}
