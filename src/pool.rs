//! Process-wide worker-thread pool.
//!
//! A fixed set of worker threads drains a shared, mutex-guarded queue of
//! boxed closures. This is the host the scheduler submits coroutine slices
//! onto; the pool itself knows nothing about coroutines.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::slots::SlotTable;

/// Default worker-thread count, matching the source's `DEFAULT_THREAD`.
pub const DEFAULT_THREAD: usize = 16;

/// Default initial task-queue capacity, matching the source's `DEFAULT_CAP`.
const DEFAULT_CAP: usize = 16;

/// A unit of work: an opaque closure run exactly once by one worker, then
/// dropped. The C source's `(func, ud)` pair collapses into a single boxed
/// closure here — there is no `void *ud` anti-pattern to preserve.
struct Task(Box<dyn FnOnce() + Send + 'static>);

/// Builder for [`Pool`].
///
/// ```
/// use corosched::PoolConfig;
///
/// let config = PoolConfig::new().worker_threads(4).initial_capacity(32);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    worker_threads: usize,
    initial_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            worker_threads: DEFAULT_THREAD,
            initial_capacity: DEFAULT_CAP,
        }
    }
}

impl PoolConfig {
    /// Starts from the default configuration (16 workers, queue capacity 16).
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of worker threads to spawn. Default 16.
    ///
    /// This also bounds the number of coroutines that can be
    /// simultaneously suspended across every scheduler hosted on this
    /// pool, since a suspended coroutine parks the worker that was running
    /// it (see the worker-exhaustion note on [`crate::Scheduler`]).
    pub fn worker_threads(mut self, n: usize) -> Self {
        self.worker_threads = n.max(1);
        self
    }

    /// Initial task-queue capacity. Default 16; doubles on demand.
    pub fn initial_capacity(mut self, cap: usize) -> Self {
        self.initial_capacity = cap.max(1);
        self
    }
}

struct Shared {
    queue: Mutex<SlotTable<Task>>,
    cond: Condvar,
}

/// Fixed-size worker-thread pool draining a shared task queue.
///
/// Cloning a `Pool` shares the same workers and queue; this is how the
/// process-wide singleton in [`crate::scheduler`] is distributed to every
/// `Scheduler` without re-spawning threads.
#[derive(Clone)]
pub struct Pool {
    shared: Arc<Shared>,
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool").finish_non_exhaustive()
    }
}

impl Pool {
    /// Opens a pool with the default configuration (16 workers, queue
    /// capacity 16).
    pub fn open() -> Result<Pool> {
        Pool::with_config(PoolConfig::default())
    }

    /// Opens a pool with a custom worker count and initial queue capacity.
    ///
    /// Spawns every worker thread before returning; never shuts them down.
    pub fn with_config(config: PoolConfig) -> Result<Pool> {
        debug!(
            "opening thread pool: {} workers, queue capacity {}",
            config.worker_threads, config.initial_capacity
        );
        let shared = Arc::new(Shared {
            queue: Mutex::new(SlotTable::with_capacity(config.initial_capacity)),
            cond: Condvar::new(),
        });

        for i in 0..config.worker_threads {
            let shared = shared.clone();
            thread::Builder::new()
                .name(format!("corosched-worker-{i}"))
                .spawn(move || worker_loop(shared))
                .map_err(Error::PoolInit)?;
        }

        Ok(Pool { shared })
    }

    /// Enqueues `task`, doubling the queue if it is at capacity.
    ///
    /// Always succeeds from the caller's point of view: a full queue just
    /// grows rather than blocking or erroring, matching the source's
    /// `pool_push`.
    pub(crate) fn push<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut queue = self.shared.queue.lock().unwrap();
        let before = queue.capacity();
        let id = queue.insert(Task(Box::new(task)));
        if queue.capacity() != before {
            debug!("task queue grown to capacity {}", queue.capacity());
        }
        trace!("task pushed into slot {id}");
        drop(queue);
        self.shared.cond.notify_one();
    }
}

/// One worker's drain loop: take a task, run it, repeat, forever.
///
/// Workers never exit during normal operation — there is no shutdown
/// signal, matching the source's process-lifetime thread pool.
fn worker_loop(shared: Arc<Shared>) {
    loop {
        let Task(func) = take_task(&shared);
        func();
    }
}

/// `pool_take`: block until a task is available, then remove and return it.
///
/// The wait is in a loop (rechecking the predicate after waking) to guard
/// against spurious wakeups, per the source's own comment.
fn take_task(shared: &Shared) -> Task {
    let mut queue = shared.queue.lock().unwrap();
    loop {
        if let Some(task) = queue.take_first() {
            return task;
        }
        queue = shared.cond.wait(queue).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn pushed_tasks_run_on_worker_threads() {
        let pool = Pool::with_config(PoolConfig::new().worker_threads(2)).unwrap();
        let (tx, rx) = mpsc::channel();
        for i in 0..8 {
            let tx = tx.clone();
            pool.push(move || tx.send(i).unwrap());
        }
        let mut got: Vec<i32> = (0..8).map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap()).collect();
        got.sort();
        assert_eq!(got, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn queue_grows_past_initial_capacity() {
        let pool = Pool::with_config(
            PoolConfig::new().worker_threads(1).initial_capacity(2),
        )
        .unwrap();
        let (tx, rx) = mpsc::channel();
        for i in 0..10 {
            let tx = tx.clone();
            pool.push(move || {
                std::thread::sleep(Duration::from_millis(5));
                tx.send(i).unwrap();
            });
        }
        for _ in 0..10 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
    }
}
