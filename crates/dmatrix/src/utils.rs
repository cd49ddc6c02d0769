//! Common utilities used across the crate.
//!
//! This module provides parallelism configuration, per-operation thread pool
//! setup, work partitioning and deferred error collection for parallel regions.

use std::ops::Range;
use std::sync::Mutex;

use rayon::prelude::*;

// =============================================================================
// Parallelism Configuration
// =============================================================================

/// Whether parallel execution is allowed.
///
/// When `true`, components may use `rayon` parallel iterators.
/// When `false`, components must use sequential iteration.
///
/// The thread pool itself is provisioned per operation by [`run_with_threads`];
/// components only respect this flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Parallelism {
    Sequential,
    Parallel,
}

impl Parallelism {
    /// Create from thread count semantics.
    ///
    /// - 0 = auto (parallel if rayon pool has multiple threads, sequential otherwise)
    /// - 1 = sequential
    /// - >1 = parallel
    #[inline]
    pub fn from_threads(n_threads: usize) -> Self {
        if n_threads == 1 || (n_threads == 0 && rayon::current_num_threads() == 1) {
            Parallelism::Sequential
        } else {
            Parallelism::Parallel
        }
    }

    /// Returns `true` if parallel execution is allowed.
    #[inline]
    pub fn is_parallel(self) -> bool {
        matches!(self, Parallelism::Parallel)
    }

    #[inline]
    pub fn maybe_par_for_each<T, I, F>(self, iter: I, f: F)
    where
        T: Send,
        I: IntoIterator<Item = T> + IntoParallelIterator<Item = T>,
        F: Fn(T) + Sync + Send,
    {
        if self.is_parallel() {
            iter.into_par_iter().for_each(f);
        } else {
            iter.into_iter().for_each(f);
        }
    }

    #[inline]
    pub fn maybe_par_map<T, B, I, F>(self, iter: I, f: F) -> Vec<B>
    where
        T: Send,
        B: Send,
        I: IntoIterator<Item = T> + IntoParallelIterator<Item = T>,
        F: Fn(T) -> B + Sync + Send,
    {
        if self.is_parallel() {
            iter.into_par_iter().map(f).collect()
        } else {
            iter.into_iter().map(f).collect()
        }
    }

    /// Run `f` over disjoint mutable chunks described by `bounds`.
    ///
    /// `bounds` must be non-decreasing and end at `data.len()`; chunk `i`
    /// covers `data[bounds[i]..bounds[i + 1]]`.
    pub fn maybe_par_chunks_for_each<T, F>(self, data: &mut [T], bounds: &[u64], f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Sync + Send,
    {
        let chunks: Vec<_> = split_by_bounds(data, bounds).into_iter().enumerate().collect();
        self.maybe_par_for_each(chunks, |(i, chunk)| f(i, chunk));
    }
}

/// Split `data` into consecutive mutable chunks at the given offsets.
fn split_by_bounds<'a, T>(mut data: &'a mut [T], bounds: &[u64]) -> Vec<&'a mut [T]> {
    let mut chunks = Vec::with_capacity(bounds.len().saturating_sub(1));
    for w in bounds.windows(2) {
        let len = (w[1] - w[0]) as usize;
        let (head, tail) = std::mem::take(&mut data).split_at_mut(len);
        chunks.push(head);
        data = tail;
    }
    chunks
}

// =============================================================================
// Thread Pool Setup
// =============================================================================

/// Number of worker threads to use for `n_threads` (`0` = all cores).
pub fn resolve_threads(n_threads: usize) -> usize {
    if n_threads == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        n_threads
    }
}

/// Run a closure with the appropriate thread pool.
///
/// Thread count semantics:
/// - `0` = auto (use all available cores)
/// - `1` = sequential (no thread pool)
/// - `n > 1` = use exactly `n` threads
///
/// The pool lives only for the duration of `f`. If it cannot be created the
/// closure runs sequentially.
#[inline]
pub fn run_with_threads<T: Send>(n_threads: usize, f: impl FnOnce(Parallelism) -> T + Send) -> T {
    let parallelism = Parallelism::from_threads(n_threads);

    match parallelism {
        Parallelism::Sequential => f(Parallelism::Sequential),
        Parallelism::Parallel => {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(n_threads)
                .build()
            {
                Ok(pool) => pool.install(|| f(Parallelism::Parallel)),
                Err(err) => {
                    tracing::warn!(%err, "failed to create thread pool, running sequentially");
                    f(Parallelism::Sequential)
                }
            }
        }
    }
}

// =============================================================================
// Work Partitioning
// =============================================================================

/// Partition `n_items` into `n_parts` contiguous, ascending ranges.
///
/// Every part but the last gets `n_items / n_parts` items; the last part takes
/// the remainder. Part `i` always precedes part `i + 1` in item order.
pub fn partition(n_items: usize, n_parts: usize) -> Vec<Range<usize>> {
    let n_parts = n_parts.max(1);
    let step = n_items / n_parts;
    (0..n_parts)
        .map(|tid| {
            let begin = tid * step;
            let end = if tid + 1 == n_parts {
                n_items
            } else {
                (tid + 1) * step
            };
            begin..end
        })
        .collect()
}

// =============================================================================
// Deferred Errors
// =============================================================================

/// Collects the first error raised by any worker of a parallel region.
///
/// Workers keep running after an error is recorded; the error is returned
/// once the region has joined, via [`ErrorCollector::finish`].
#[derive(Debug)]
pub struct ErrorCollector<E> {
    first: Mutex<Option<E>>,
}

impl<E> Default for ErrorCollector<E> {
    fn default() -> Self {
        Self {
            first: Mutex::new(None),
        }
    }
}

impl<E> ErrorCollector<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f`, keeping its error if it is the first one seen.
    pub fn run(&self, f: impl FnOnce() -> Result<(), E>) {
        if let Err(err) = f() {
            let mut slot = self.first.lock().unwrap_or_else(|p| p.into_inner());
            if slot.is_none() {
                *slot = Some(err);
            }
        }
    }

    /// Whether an error has been recorded so far.
    pub fn has_error(&self) -> bool {
        self.first
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .is_some()
    }

    /// Consume the collector, returning the first recorded error.
    pub fn finish(self) -> Result<(), E> {
        match self.first.into_inner().unwrap_or_else(|p| p.into_inner()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_parallelism_from_threads() {
        assert!(!Parallelism::from_threads(1).is_parallel());
        assert!(Parallelism::from_threads(2).is_parallel());
        assert!(Parallelism::from_threads(8).is_parallel());
    }

    #[test]
    fn test_run_with_threads_sequential() {
        let result = run_with_threads(1, |par| {
            assert_eq!(par, Parallelism::Sequential);
            42
        });
        assert_eq!(result, 42);
    }

    #[test]
    fn test_run_with_threads_explicit() {
        let result = run_with_threads(3, |_| rayon::current_num_threads());
        assert_eq!(result, 3);
    }

    #[test]
    fn test_maybe_par_map_keeps_order() {
        let result = Parallelism::Parallel.maybe_par_map(0..5usize, |i| i * 2);
        assert_eq!(result, vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn test_partition_remainder_goes_last() {
        let parts = partition(10, 3);
        assert_eq!(parts, vec![0..3, 3..6, 6..10]);
    }

    #[test]
    fn test_partition_more_parts_than_items() {
        let parts = partition(2, 4);
        assert_eq!(parts, vec![0..0, 0..0, 0..0, 0..2]);
    }

    #[test]
    fn test_chunks_for_each_sees_disjoint_chunks() {
        let mut data = vec![0u32; 6];
        Parallelism::Parallel.maybe_par_chunks_for_each(&mut data, &[0, 2, 2, 6], |i, chunk| {
            for v in chunk.iter_mut() {
                *v = i as u32;
            }
        });
        assert_eq!(data, vec![0, 0, 2, 2, 2, 2]);
    }

    #[test]
    fn test_error_collector_keeps_first_and_runs_all() {
        let ran = AtomicUsize::new(0);
        let errors = ErrorCollector::new();
        run_with_threads(4, |par| {
            par.maybe_par_for_each(0..100usize, |i| {
                errors.run(|| {
                    ran.fetch_add(1, Ordering::Relaxed);
                    if i % 10 == 0 {
                        Err(i)
                    } else {
                        Ok(())
                    }
                })
            })
        });
        assert_eq!(ran.load(Ordering::Relaxed), 100);
        let err = errors.finish().unwrap_err();
        assert_eq!(err % 10, 0);
    }
}
