//! Two-pass construction of offset-indexed grouped storage.
//!
//! Elements discovered by several worker threads are placed into one flat
//! `data` buffer partitioned by `offsets`, without locks and without knowing
//! group sizes up front.
//!
//! # Algorithm
//!
//! ```text
//! 1. Budget:  every thread counts its elements per group       (ThreadBudget::add)
//! 2. Storage: counts are laid out group-major, thread-minor     (GroupBuilder::init_storage)
//!             and `data` is allocated once
//! 3. Commit:  every thread writes into its own reserved slots   (ThreadCommitter::push)
//! ```
//!
//! Within a group, the slots of thread `t` precede those of thread `t + 1`,
//! and each thread fills its slots in the order it pushes. When threads are
//! given contiguous, ascending partitions of the input (see
//! [`crate::utils::partition`]), every group therefore keeps source order and
//! the output is identical for any thread count.
//!
//! The split between [`GroupBuilder`] and [`GroupCommitter`] makes it
//! impossible to add budget after storage is allocated, or to commit before.

use std::marker::PhantomData;

/// Wrapper to make raw pointers Send + Sync.
///
/// # Safety
///
/// Each [`ThreadCommitter`] writes only to the slots reserved for its thread,
/// and the reserved ranges of different threads are disjoint.
struct SendSyncPtr<T>(*mut T);

impl<T> Clone for SendSyncPtr<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for SendSyncPtr<T> {}

impl<T> SendSyncPtr<T> {
    #[inline]
    fn ptr(self) -> *mut T {
        self.0
    }
}

// SAFETY: see the type-level comment; slot ranges per thread never overlap.
unsafe impl<T: Send> Send for SendSyncPtr<T> {}
unsafe impl<T: Send> Sync for SendSyncPtr<T> {}

#[inline]
fn add_offset(a: u64, b: u64) -> u64 {
    match a.checked_add(b) {
        Some(v) => v,
        None => panic!("group offset overflow ({a} + {b})"),
    }
}

/// Per-thread element counts, keyed by group.
#[derive(Debug, Clone, Default)]
pub struct ThreadBudget {
    base: usize,
    counts: Vec<u64>,
}

impl ThreadBudget {
    /// Reserve `n` slots in group `key`.
    ///
    /// # Panics
    ///
    /// If `key` is below the builder's base group offset.
    #[inline]
    pub fn add(&mut self, key: usize, n: u64) {
        assert!(
            key >= self.base,
            "group key {key} is below the base offset {}",
            self.base
        );
        let local = key - self.base;
        if self.counts.len() <= local {
            self.counts.resize(local + 1, 0);
        }
        self.counts[local] += n;
    }

    /// Number of local groups this thread has seen so far.
    #[inline]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Budget stage of the builder.
///
/// `offsets` and `data` are extended in place: groups below
/// `base_group_offset` are left untouched, new groups are appended after them.
pub struct GroupBuilder<'a, T> {
    offsets: &'a mut Vec<u64>,
    data: &'a mut Vec<T>,
    base: usize,
    budgets: Vec<ThreadBudget>,
}

impl<'a, T: Copy + Default + Send> GroupBuilder<'a, T> {
    pub fn new(
        offsets: &'a mut Vec<u64>,
        data: &'a mut Vec<T>,
        base_group_offset: usize,
        n_threads: usize,
    ) -> Self {
        let budgets = vec![
            ThreadBudget {
                base: base_group_offset,
                counts: Vec::new(),
            };
            n_threads.max(1)
        ];
        Self {
            offsets,
            data,
            base: base_group_offset,
            budgets,
        }
    }

    /// Pre-size every thread's counters for `groups_per_thread` groups.
    pub fn init_budget(&mut self, groups_per_thread: usize) {
        for b in &mut self.budgets {
            b.counts.clear();
            b.counts.resize(groups_per_thread, 0);
        }
    }

    #[inline]
    pub fn n_threads(&self) -> usize {
        self.budgets.len()
    }

    /// One budget per thread, to be handed to the workers of a parallel region.
    #[inline]
    pub fn budgets_mut(&mut self) -> &mut [ThreadBudget] {
        &mut self.budgets
    }

    #[inline]
    pub fn add_budget(&mut self, key: usize, tid: usize, n: u64) {
        self.budgets[tid].add(key, n);
    }

    /// Lay out the budgets as offsets and allocate `data`.
    ///
    /// Group `g` occupies `offsets[g]..offsets[g + 1]`. Inside a group the
    /// slots reserved by thread 0 come first.
    pub fn init_storage(self) -> GroupCommitter<'a, T> {
        let Self {
            offsets,
            data,
            base,
            budgets,
        } = self;

        if offsets.is_empty() {
            offsets.push(0);
        }
        let fill = offsets.last().copied().unwrap_or(0);
        let max_groups = budgets.iter().map(ThreadBudget::len).max().unwrap_or(0);
        if offsets.len() <= base + max_groups {
            offsets.resize(base + max_groups + 1, fill);
        }

        let mut threads: Vec<Cursors> = budgets
            .iter()
            .map(|b| Cursors {
                next: vec![0; b.len()],
                end: vec![0; b.len()],
            })
            .collect();

        let mut count = 0u64;
        for i in base..offsets.len() - 1 {
            let local = i - base;
            for (budget, cursors) in budgets.iter().zip(threads.iter_mut()) {
                if let Some(&n) = budget.counts.get(local) {
                    let begin = add_offset(count, fill);
                    cursors.next[local] = begin;
                    cursors.end[local] = add_offset(begin, n);
                    count = add_offset(count, n);
                }
            }
            offsets[i + 1] = add_offset(offsets[i + 1], count);
        }

        let total = offsets.last().copied().unwrap_or(0) as usize;
        data.resize(total, T::default());

        GroupCommitter {
            data,
            base,
            threads,
        }
    }
}

#[derive(Debug, Clone)]
struct Cursors {
    next: Vec<u64>,
    end: Vec<u64>,
}

impl Cursors {
    #[inline]
    fn claim(&mut self, local: usize) -> usize {
        let pos = self.next[local];
        assert!(
            pos < self.end[local],
            "push exceeds the budget declared for group {local}"
        );
        self.next[local] = pos + 1;
        pos as usize
    }
}

/// Commit stage of the builder.
pub struct GroupCommitter<'a, T> {
    data: &'a mut Vec<T>,
    base: usize,
    threads: Vec<Cursors>,
}

impl<'a, T: Copy + Send> GroupCommitter<'a, T> {
    #[inline]
    pub fn n_threads(&self) -> usize {
        self.threads.len()
    }

    /// Write `value` into group `key` on behalf of thread `tid`.
    ///
    /// # Panics
    ///
    /// If thread `tid` has already filled the budget it declared for `key`.
    #[inline]
    pub fn push(&mut self, key: usize, value: T, tid: usize) {
        let pos = self.threads[tid].claim(key - self.base);
        self.data[pos] = value;
    }

    /// Split the committer into one independent writer per thread.
    pub fn committers(&mut self) -> Vec<ThreadCommitter<'_, T>> {
        let ptr = SendSyncPtr(self.data.as_mut_ptr());
        let len = self.data.len();
        let base = self.base;
        self.threads
            .iter_mut()
            .map(|cursors| ThreadCommitter {
                ptr,
                len,
                base,
                cursors,
                _marker: PhantomData,
            })
            .collect()
    }
}

/// Writes the elements of one thread into its reserved slots.
pub struct ThreadCommitter<'c, T> {
    ptr: SendSyncPtr<T>,
    len: usize,
    base: usize,
    cursors: &'c mut Cursors,
    _marker: PhantomData<&'c mut [T]>,
}

impl<T> ThreadCommitter<'_, T> {
    /// # Panics
    ///
    /// If this thread has already filled the budget it declared for `key`.
    #[inline]
    pub fn push(&mut self, key: usize, value: T) {
        let pos = self.cursors.claim(key - self.base);
        assert!(pos < self.len);
        // SAFETY: `pos` lies inside this thread's reserved range for the
        // group, which no other committer can claim, and inside `data`.
        unsafe { self.ptr.ptr().add(pos).write(value) };
    }
}
