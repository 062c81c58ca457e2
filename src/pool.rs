//! Fixed-size worker pool over a shared queue.
//!
//! Workers pop items from a mutex-guarded queue until it is empty, push each
//! output onto a mutex-guarded collection and bump a completion counter once
//! per item. All threads are scoped and joined before [`run_pool`] returns.
//! Output order follows completion order, not input order.

use std::{
    collections::VecDeque,
    num::NonZeroUsize,
    sync::{Mutex, MutexGuard, PoisonError},
    thread,
};

use log::debug;

/// Workers for `items` units: one per unit, capped at the available
/// parallelism and at `cap` when given. Never zero.
pub fn worker_count(items: usize, cap: Option<usize>) -> usize {
    let available = thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1);
    let limit = cap.filter(|cap| *cap > 0).unwrap_or(available).min(available);
    items.min(limit).max(1)
}

/// Runs `work` over every item on `workers` threads.
///
/// `on_complete(done, total)` is called after each item while holding the
/// counter lock, so observers see `done` strictly increasing.
pub fn run_pool<T, R, W, C>(items: Vec<T>, workers: usize, work: W, on_complete: C) -> Vec<R>
where
    T: Send,
    R: Send,
    W: Fn(T) -> R + Sync,
    C: Fn(usize, usize) + Sync,
{
    let total = items.len();
    let queue = Mutex::new(items.into_iter().collect::<VecDeque<_>>());
    let outputs = Mutex::new(Vec::with_capacity(total));
    let completed = Mutex::new(0usize);
    let workers = workers.clamp(1, total.max(1));
    debug!("Starting {workers} worker(s) for {total} item(s)");

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                loop {
                    let Some(item) = lock(&queue).pop_front() else {
                        break;
                    };
                    let output = work(item);
                    lock(&outputs).push(output);
                    let mut done = lock(&completed);
                    *done += 1;
                    on_complete(*done, total);
                }
            });
        }
    });

    outputs.into_inner().unwrap_or_else(PoisonError::into_inner)
}

// Queue, outputs and counter stay valid if a worker panics mid-item.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
