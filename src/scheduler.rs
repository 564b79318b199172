//! Coroutine table and the resume/yield rendezvous.
//!
//! This is the part of the crate the specification calls "the heart of the
//! system": a pair of condition variables hand control back and forth
//! between the thread that calls [`Scheduler::resume`] and the worker
//! thread (drawn from the process-wide [`Pool`](crate::pool::Pool))
//! executing the coroutine, such that exactly one of them runs coroutine
//! code at any instant.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex};

use log::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::pool::{Pool, PoolConfig};
use crate::slots::SlotTable;

/// Default initial coroutine-table capacity, matching the source's
/// `DEFAULT_CAP`.
const DEFAULT_CAP: usize = 16;

/// A coroutine's stable identity within its scheduler, valid until the
/// coroutine reaches [`Status::Dead`].
pub type CoroutineId = usize;

/// A coroutine's lifecycle stage.
///
/// Discriminants are fixed by the external contract: `Dead = 0`,
/// `Ready = 1`, `Running = 2`, `Suspend = 3`.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Finished (returned) or never allocated; its slot is free for reuse.
    Dead = 0,
    /// Created but never yet resumed.
    Ready = 1,
    /// Currently executing on a worker thread.
    Running = 2,
    /// Yielded at least once and parked, waiting for its next resume.
    Suspend = 3,
}

type Body = Box<dyn FnOnce(Scheduler) + Send + 'static>;

struct CoroutineState {
    status: Status,
    /// Taken (moved out) the first time this coroutine is resumed.
    body: Option<Body>,
}

/// A coroutine's private mutex + condvar pair, used to park the worker
/// hosting it while SUSPEND and to wake that worker on the next resume.
struct CoroutineSlot {
    state: Mutex<CoroutineState>,
    cond: Condvar,
}

impl CoroutineSlot {
    fn new(body: Body) -> Arc<Self> {
        Arc::new(CoroutineSlot {
            state: Mutex::new(CoroutineState {
                status: Status::Ready,
                body: Some(body),
            }),
            cond: Condvar::new(),
        })
    }
}

struct Inner {
    pool: Pool,
    co: Mutex<SlotTable<Arc<CoroutineSlot>>>,
    /// Doubles as the scheduler's `mutex_wait`: holds the id of the
    /// running coroutine, or `None`. The resumer parks on `cond_wait`
    /// while this is `Some(id)` for the coroutine it just resumed.
    running: Mutex<Option<CoroutineId>>,
    cond_wait: Condvar,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let co = self.co.get_mut().unwrap_or_else(|e| e.into_inner());
        debug_assert!(
            co.len() == 0,
            "Scheduler dropped with {} coroutine(s) not yet DEAD; the caller \
             must drive every coroutine it creates to completion before \
             dropping the Scheduler",
            co.len()
        );
    }
}

/// Owns a group of coroutines and serializes their execution.
///
/// Cheaply `Clone`-able (an `Arc` handle); the clone handed to a
/// coroutine's body is how that coroutine calls [`Scheduler::yield_now`]
/// on itself.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

static GLOBAL_POOL: Mutex<Option<Pool>> = Mutex::new(None);

/// Returns the process-wide pool, lazily spawning it on first use.
///
/// Every `Scheduler` in the process shares this one pool, matching the
/// source's `pool_open()`-on-`pthread_once` singleton.
fn global_pool() -> Result<Pool> {
    let mut slot = GLOBAL_POOL.lock().unwrap();
    if let Some(pool) = slot.as_ref() {
        return Ok(pool.clone());
    }
    let pool = Pool::open()?;
    *slot = Some(pool.clone());
    Ok(pool)
}

/// Configures the process-wide worker pool before it is lazily created.
///
/// Must be called before the first [`Scheduler::open`] (or
/// [`Scheduler::with_capacity`]) anywhere in the process; returns
/// [`Error::PoolAlreadyInitialized`] if the pool already exists. There is
/// only one pool per process — see the "Global pool as process-wide
/// singleton" design note — so this is a one-time configuration knob, not
/// a per-scheduler setting.
pub fn configure_pool(config: PoolConfig) -> Result<()> {
    let mut slot = GLOBAL_POOL.lock().unwrap();
    if slot.is_some() {
        return Err(Error::PoolAlreadyInitialized);
    }
    *slot = Some(Pool::with_config(config)?);
    Ok(())
}

impl Scheduler {
    /// Opens a scheduler backed by the process-wide pool, with the
    /// default initial coroutine-table capacity (16).
    pub fn open() -> Result<Scheduler> {
        Scheduler::with_capacity(DEFAULT_CAP)
    }

    /// Opens a scheduler with a custom initial coroutine-table capacity.
    pub fn with_capacity(capacity: usize) -> Result<Scheduler> {
        let pool = global_pool()?;
        Ok(Scheduler {
            inner: Arc::new(Inner {
                pool,
                co: Mutex::new(SlotTable::with_capacity(capacity)),
                running: Mutex::new(None),
                cond_wait: Condvar::new(),
            }),
        })
    }

    /// Creates a new coroutine in status READY, occupying the
    /// lowest-indexed empty slot (growing the table by doubling if full).
    ///
    /// `body` receives a clone of this `Scheduler`, which it uses to call
    /// [`Scheduler::yield_now`]; anything it needs as "user data" should
    /// simply be captured by the closure rather than threaded through as
    /// a separate argument.
    pub fn add<F>(&self, body: F) -> CoroutineId
    where
        F: FnOnce(Scheduler) + Send + 'static,
    {
        let slot = CoroutineSlot::new(Box::new(body));
        let mut co = self.inner.co.lock().unwrap();
        let id = co.insert(slot);
        trace!("coroutine {id}: created, status READY");
        id
    }

    /// Resumes coroutine `id`, blocking the caller until it yields or
    /// returns.
    ///
    /// No-op if `id`'s slot is empty (already DEAD, or never allocated
    /// within the table's current bounds). Panics if another coroutine on
    /// this scheduler is already RUNNING, or if `id` is out of range for
    /// the table's current capacity — both are programmer errors, not
    /// recoverable conditions, matching the source's `assert()`s.
    pub fn resume(&self, id: CoroutineId) {
        {
            let running = self.inner.running.lock().unwrap();
            assert!(
                running.is_none(),
                "coroutine_resume: scheduler already has a RUNNING coroutine"
            );
        }

        let slot = {
            let co = self.inner.co.lock().unwrap();
            debug_assert!(id < co.capacity(), "coroutine_resume: id {id} out of range");
            match co.get(id) {
                Some(slot) => slot.clone(),
                None => {
                    warn!("resume({id}): slot is empty, ignoring");
                    return;
                }
            }
        };

        let status = slot.state.lock().unwrap().status;
        match status {
            Status::Ready => self.resume_ready(id, slot),
            Status::Suspend => self.resume_suspend(id, slot),
            bad => panic!("coroutine_resume: coroutine {id} has status {bad:?}, not resumable"),
        }
    }

    /// READY -> RUNNING: submit the coroutine's body as a task to the
    /// pool, then block on `cond_wait` until it yields or returns.
    fn resume_ready(&self, id: CoroutineId, slot: Arc<CoroutineSlot>) {
        let body = {
            let mut state = slot.state.lock().unwrap();
            state.status = Status::Running;
            state.body.take().expect("READY coroutine missing its body")
        };
        debug!("coroutine {id}: READY -> RUNNING");

        let mut running = self.inner.running.lock().unwrap();
        *running = Some(id);

        let scheduler = self.clone();
        self.inner
            .pool
            .push(move || trampoline(scheduler, id, slot, body));

        while *running == Some(id) {
            running = self.inner.cond_wait.wait(running).unwrap();
        }
    }

    /// SUSPEND -> RUNNING: wake the worker parked inside this
    /// coroutine's `coroutine_yield`, then block on `cond_wait` until it
    /// yields again or returns.
    fn resume_suspend(&self, id: CoroutineId, slot: Arc<CoroutineSlot>) {
        debug!("coroutine {id}: SUSPEND -> RUNNING");
        let mut running = self.inner.running.lock().unwrap();
        *running = Some(id);

        {
            // Acquiring the coroutine's own lock here blocks until the
            // worker has actually parked on `slot.cond` (see
            // `yield_now`): that ordering is what prevents a lost wakeup.
            let mut state = slot.state.lock().unwrap();
            state.status = Status::Running;
            slot.cond.notify_one();
        }

        while *running == Some(id) {
            running = self.inner.cond_wait.wait(running).unwrap();
        }
    }

    /// Suspends the currently RUNNING coroutine on this scheduler and
    /// parks the calling (worker) thread until the next resume.
    ///
    /// Must be called from the worker thread executing that coroutine's
    /// slice. No-op if no coroutine is currently RUNNING on this
    /// scheduler (defensive, mirrors the source).
    pub fn yield_now(&self) {
        let id = match *self.inner.running.lock().unwrap() {
            Some(id) => id,
            None => return,
        };

        let slot = {
            let co = self.inner.co.lock().unwrap();
            match co.get(id) {
                Some(slot) => slot.clone(),
                None => return,
            }
        };

        let mut state = slot.state.lock().unwrap();
        state.status = Status::Suspend;

        {
            let mut running = self.inner.running.lock().unwrap();
            *running = None;
            self.inner.cond_wait.notify_one();
        }
        debug!("coroutine {id}: RUNNING -> SUSPEND");

        while state.status == Status::Suspend {
            state = slot.cond.wait(state).unwrap();
        }
        debug!("coroutine {id}: resumed, back to RUNNING");
    }

    /// Status of coroutine `id`: DEAD for a cleared or never-allocated
    /// slot, otherwise its current status. `id` must be within the
    /// table's current capacity.
    pub fn status(&self, id: CoroutineId) -> Status {
        let co = self.inner.co.lock().unwrap();
        debug_assert!(id < co.capacity(), "status: id {id} out of range");
        match co.get(id) {
            None => Status::Dead,
            Some(slot) => slot.state.lock().unwrap().status,
        }
    }

    /// Id of the coroutine currently RUNNING on this scheduler, if any.
    pub fn running(&self) -> Option<CoroutineId> {
        *self.inner.running.lock().unwrap()
    }

    /// Drops this handle to the scheduler.
    ///
    /// `Scheduler` is a cheaply-cloned `Arc` handle (a clone is what lets a
    /// coroutine body call [`Scheduler::yield_now`] on itself), so this
    /// only tears down the coroutine table, its lock and condvar once the
    /// *last* outstanding handle goes away — the same teardown `Drop`
    /// performs implicitly at end of scope. The caller is responsible for
    /// ensuring every coroutine it created has reached [`Status::Dead`]
    /// first; see the "`close` does not wait" design note.
    pub fn close(self) {
        drop(self);
    }
}

/// The task body submitted to the pool on a coroutine's first resume:
/// run the coroutine's entry function, then perform the RUNNING -> DEAD
/// transition.
///
/// Unlike the source's `mainfunc`, which re-reads its id from
/// `S->running`, `id` and `slot` arrive as closure captures — there is no
/// need to round-trip them through shared state the way a raw C function
/// pointer + `void *` would have to.
fn trampoline(scheduler: Scheduler, id: CoroutineId, slot: Arc<CoroutineSlot>, body: Body) {
    body(scheduler.clone());

    {
        let mut co = scheduler.inner.co.lock().unwrap();
        co.remove(id);
    }
    drop(slot);
    debug!("coroutine {id}: RUNNING -> DEAD");

    let mut running = scheduler.inner.running.lock().unwrap();
    *running = None;
    scheduler.inner.cond_wait.notify_one();
}
