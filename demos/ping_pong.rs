//! Minimal ping-pong demo: two coroutines taking turns printing a line,
//! driven by hand from `main` one resume at a time.
//!
//! Run with `cargo run --example ping_pong`.

use corosched::Scheduler;

fn main() {
    env_logger::init();

    let sched = Scheduler::open().expect("open scheduler");

    let ping = sched.add(|s| {
        for i in 0..3 {
            println!("ping {i}");
            s.yield_now();
        }
    });
    let pong = sched.add(|s| {
        for i in 0..3 {
            println!("pong {i}");
            s.yield_now();
        }
    });

    for _ in 0..3 {
        sched.resume(ping);
        sched.resume(pong);
    }
}
