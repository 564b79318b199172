//! # corosched
//!
//! Symmetric, stackful coroutines with a Lua-style resume/yield API,
//! hosted on a fixed-size worker-thread pool.
//!
//! A coroutine runs to its next cooperative suspension point on whichever
//! worker thread happens to pick it up; the thread that called
//! [`Scheduler::resume`] blocks for the duration of that slice, so from
//! the caller's point of view a coroutine looks single-threaded. Exactly
//! one coroutine per [`Scheduler`] may be RUNNING at a time — this
//! rendezvous, driven by a pair of condition variables, is what this
//! crate actually is.
//!
//! ```
//! use corosched::Scheduler;
//!
//! let sched = Scheduler::open().unwrap();
//! let id = sched.add(|s| {
//!     println!("before yield");
//!     s.yield_now();
//!     println!("resumed");
//! });
//!
//! sched.resume(id); // runs until the yield
//! sched.resume(id); // runs to completion
//! ```
//!
//! ## What this crate does not do
//!
//! There is no preemption, no priorities, no work stealing, and no
//! cancellation: a coroutine body that never yields or returns holds its
//! worker thread forever. Because a parked worker is consumed for every
//! currently-SUSPEND coroutine, the number of coroutines that can be
//! simultaneously suspended across the whole process is bounded by
//! `worker_threads - 1`; exceeding it deadlocks the process. See
//! [`pool::PoolConfig`] to raise the worker count.
#![warn(missing_docs)]

mod error;
mod pool;
mod scheduler;
mod slots;

pub use error::{Error, Result};
pub use pool::{PoolConfig, DEFAULT_THREAD};
pub use scheduler::{configure_pool, CoroutineId, Scheduler, Status};
