//! Helpers for running one closure per in-process rank

use meshflow::composite::LocalCommunicator;
use std::thread;

/// Run `f` on every rank of a fresh group of `n` and collect results in rank order.
pub fn run_ranks<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(LocalCommunicator) -> T + Send + Sync + Clone + 'static,
{
    let handles: Vec<_> = LocalCommunicator::group(n)
        .into_iter()
        .map(|comm| {
            let f = f.clone();
            thread::spawn(move || f(comm))
        })
        .collect();
    handles
        .into_iter()
        .map(|h| h.join().expect("rank thread panicked"))
        .collect()
}
