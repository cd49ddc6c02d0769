//! Sparse pages: offset-indexed blocks of `(index, value)` entries.
//!
//! A [`SparsePage`] stores rows (or, once transposed, columns). Line `i`
//! holds `data[offset[i]..offset[i + 1]]`.
//!
//! # Example
//!
//! ```
//! use dmatrix::adapter::{Adapter, CsrAdapter};
//! use dmatrix::page::SparsePage;
//!
//! let indptr = [0u64, 2, 3, 3];
//! let indices = [0u32, 2, 1];
//! let values = [1.0f32, 3.0, 2.0];
//! let mut adapter = Adapter::Csr(CsrAdapter::new(&indptr, &indices, &values, 3));
//! let batch = adapter.next().unwrap().unwrap();
//!
//! let mut page = SparsePage::new();
//! let n_cols = page.push_batch(&batch, f32::NAN, 2).unwrap();
//! assert_eq!(n_cols, 3);
//! assert_eq!(page.offset, vec![0, 2, 3, 3]);
//! ```

mod format;

pub use format::{read_page, write_page, PAGE_HEADER_SIZE, PAGE_MAGIC};

use std::cmp::Ordering;

use crate::adapter::AdapterBatch;
use crate::error::{DataError, Result};
use crate::group_builder::GroupBuilder;
use crate::utils::{partition, resolve_threads, run_with_threads};

/// One stored coordinate: the column (or row) index and its value.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[repr(C)]
pub struct Entry {
    pub index: u32,
    pub fvalue: f32,
}

impl Entry {
    #[inline]
    pub fn new(index: u32, fvalue: f32) -> Self {
        Self { index, fvalue }
    }

    #[inline]
    pub fn cmp_index(a: &Entry, b: &Entry) -> Ordering {
        a.index.cmp(&b.index)
    }

    #[inline]
    pub fn cmp_value(a: &Entry, b: &Entry) -> Ordering {
        a.fvalue.total_cmp(&b.fvalue)
    }
}

/// Whether `value` is stored, given the `missing` marker.
#[inline]
pub fn is_valid(value: f32, missing: f32) -> bool {
    !value.is_nan() && value != missing
}

#[derive(Clone, Debug, PartialEq)]
pub struct SparsePage {
    /// `offset[i]..offset[i + 1]` delimits line `i`; never empty.
    pub offset: Vec<u64>,
    pub data: Vec<Entry>,
    /// Global index of the first row of this page.
    pub base_rowid: u64,
}

impl Default for SparsePage {
    fn default() -> Self {
        Self::new()
    }
}

impl SparsePage {
    pub fn new() -> Self {
        Self {
            offset: vec![0],
            data: Vec::new(),
            base_rowid: 0,
        }
    }

    /// Number of lines.
    #[inline]
    pub fn size(&self) -> usize {
        self.offset.len().saturating_sub(1)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Total number of stored entries.
    #[inline]
    pub fn num_entries(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn line(&self, i: usize) -> &[Entry] {
        &self.data[self.offset[i] as usize..self.offset[i + 1] as usize]
    }

    pub fn lines(&self) -> impl ExactSizeIterator<Item = &[Entry]> + '_ {
        self.offset
            .windows(2)
            .map(|w| &self.data[w[0] as usize..w[1] as usize])
    }

    pub fn clear(&mut self) {
        self.offset.clear();
        self.offset.push(0);
        self.data.clear();
        self.base_rowid = 0;
    }

    /// Approximate heap footprint in bytes.
    pub fn mem_cost_bytes(&self) -> usize {
        self.offset.len() * std::mem::size_of::<u64>() + self.data.len() * std::mem::size_of::<Entry>()
    }

    /// Append the valid elements of an adapter batch.
    ///
    /// Values that are NaN or equal to `missing` are skipped. An infinite
    /// value is rejected with [`DataError::InfInData`] unless `missing` is
    /// itself infinite; a rejected batch leaves the page unchanged.
    ///
    /// Row-major batches are split across up to `n_threads` threads;
    /// column-major batches are ingested by a single thread.
    ///
    /// Returns the largest column index seen plus one, counting skipped
    /// elements.
    pub fn push_batch(&mut self, batch: &AdapterBatch<'_>, missing: f32, n_threads: usize) -> Result<usize> {
        let n_lines = batch.size();
        if n_lines == 0 {
            return Ok(0);
        }
        let n_threads = if batch.is_row_major() {
            resolve_threads(n_threads).min(n_lines)
        } else {
            1
        };
        let base_rowid = self.base_rowid as usize;
        let builder_base = self.size();
        let check_inf = !missing.is_infinite();
        let parts = partition(n_lines, n_threads);

        let Self { offset, data, .. } = self;
        run_with_threads(n_threads, |par| {
            let mut builder = GroupBuilder::new(offset, data, builder_base, n_threads);
            // Trailing empty rows of a row-major batch still get an offset.
            let last_key = batch
                .line(n_lines - 1)
                .row()
                .and_then(|row| row.checked_sub(base_rowid))
                .filter(|&k| k >= builder_base);
            if let Some(key) = last_key {
                builder.add_budget(key, n_threads - 1, 0);
            }

            let work: Vec<_> = builder.budgets_mut().iter_mut().zip(&parts).collect();
            let per_thread = par.maybe_par_map(work, |(budget, range)| -> Result<usize> {
                let mut max_columns = 0usize;
                let mut inf_found = false;
                for i in range.clone() {
                    let line = batch.line(i);
                    for element in line.elements() {
                        if check_inf && element.value.is_infinite() {
                            inf_found = true;
                        }
                        let key = element
                            .row_idx
                            .checked_sub(base_rowid)
                            .filter(|&k| k >= builder_base)
                            .ok_or_else(|| {
                                DataError::InvalidShape(format!(
                                    "row {} precedes the rows already held by this page",
                                    element.row_idx
                                ))
                            })?;
                        max_columns = max_columns.max(element.column_idx + 1);
                        if is_valid(element.value, missing) {
                            budget.add(key, 1);
                        }
                    }
                }
                if inf_found {
                    return Err(DataError::InfInData);
                }
                Ok(max_columns)
            });
            let max_columns = per_thread
                .into_iter()
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .max()
                .unwrap_or(0);

            let mut commit = builder.init_storage();
            let work: Vec<_> = commit.committers().into_iter().zip(&parts).collect();
            par.maybe_par_for_each(work, |(mut committer, range)| {
                for i in range.clone() {
                    for element in batch.line(i).elements() {
                        if is_valid(element.value, missing) {
                            committer.push(
                                element.row_idx - base_rowid,
                                Entry::new(element.column_idx as u32, element.value),
                            );
                        }
                    }
                }
            });
            Ok(max_columns)
        })
    }

    /// Build the column-major dual of this page with `num_columns` columns.
    ///
    /// Entries of the result carry global row indices (`base_rowid + i`).
    pub fn get_transpose(&self, num_columns: usize, n_threads: usize) -> Result<SparsePage> {
        let mut transpose = SparsePage::new();
        let n_rows = self.size();
        let n_threads = resolve_threads(n_threads).min(n_rows.max(1));
        let parts = partition(n_rows, n_threads);

        if let Some(bad) = self.data.iter().find(|e| e.index as usize >= num_columns) {
            return Err(DataError::InvalidShape(format!(
                "column index {} is out of range for {num_columns} columns",
                bad.index
            )));
        }

        let SparsePage { offset, data, .. } = &mut transpose;
        run_with_threads(n_threads, |par| {
            let mut builder = GroupBuilder::new(offset, data, 0, n_threads);
            builder.init_budget(num_columns);
            let work: Vec<_> = builder.budgets_mut().iter_mut().zip(&parts).collect();
            par.maybe_par_for_each(work, |(budget, range)| {
                for i in range.clone() {
                    for e in self.line(i) {
                        budget.add(e.index as usize, 1);
                    }
                }
            });

            let mut commit = builder.init_storage();
            let work: Vec<_> = commit.committers().into_iter().zip(&parts).collect();
            par.maybe_par_for_each(work, |(mut committer, range)| {
                for i in range.clone() {
                    let row = (self.base_rowid + i as u64) as u32;
                    for e in self.line(i) {
                        committer.push(e.index as usize, Entry::new(row, e.fvalue));
                    }
                }
            });
        });

        if transpose.data.is_empty() {
            transpose.offset = vec![0; num_columns + 1];
        }
        Ok(transpose)
    }

    /// Whether every line is sorted by index.
    pub fn is_indices_sorted(&self, n_threads: usize) -> bool {
        let n_threads = resolve_threads(n_threads).min(self.size().max(1));
        run_with_threads(n_threads, |par| {
            let sorted = par.maybe_par_map(0..self.size(), |i| {
                self.line(i).windows(2).all(|w| w[0].index <= w[1].index)
            });
            sorted.into_iter().all(|s| s)
        })
    }

    /// Sort every line by index.
    pub fn sort_indices(&mut self, n_threads: usize) {
        self.sort_lines_by(n_threads, Entry::cmp_index);
    }

    /// Sort every line by value.
    pub fn sort_rows(&mut self, n_threads: usize) {
        self.sort_lines_by(n_threads, Entry::cmp_value);
    }

    fn sort_lines_by(&mut self, n_threads: usize, cmp: fn(&Entry, &Entry) -> Ordering) {
        let n_threads = resolve_threads(n_threads).min(self.size().max(1));
        let Self { offset, data, .. } = self;
        run_with_threads(n_threads, |par| {
            par.maybe_par_chunks_for_each(&mut data[..], &offset[..], |_, line| line.sort_by(cmp));
        });
    }

    /// Shift every entry's index by `shift`.
    ///
    /// Fails, leaving the page unchanged, if a shifted index would not fit
    /// in `u32`.
    pub fn reindex(&mut self, shift: u64, n_threads: usize) -> Result<()> {
        let max_index = self.data.iter().map(|e| e.index).max().unwrap_or(0);
        let shift = u32::try_from(shift)
            .ok()
            .filter(|&s| max_index.checked_add(s).is_some())
            .ok_or_else(|| {
                DataError::InvalidShape(format!("shifting index {max_index} by {shift} overflows u32"))
            })?;
        run_with_threads(resolve_threads(n_threads), |par| {
            par.maybe_par_for_each(self.data.as_mut_slice(), |e| e.index += shift);
        });
        Ok(())
    }

    /// Append the lines of `other` after the lines of this page.
    pub fn push_page(&mut self, other: &SparsePage) {
        let top = self.offset.last().copied().unwrap_or(0);
        self.data.extend_from_slice(&other.data);
        self.offset
            .extend(other.offset.iter().skip(1).map(|&o| top + o));
    }

    /// Merge a column-major page with the same number of columns into this
    /// one: each column keeps its own entries, followed by those of `other`.
    pub fn push_csc(&mut self, other: &SparsePage) -> Result<()> {
        if other.data.is_empty() {
            return Ok(());
        }
        if self.data.is_empty() {
            self.offset.clone_from(&other.offset);
            self.data.clone_from(&other.data);
            return Ok(());
        }
        if self.offset.len() != other.offset.len() {
            return Err(DataError::ColumnMismatch {
                expected: self.size() as u64,
                got: other.size() as u64,
            });
        }

        let mut offset = Vec::with_capacity(self.offset.len());
        let mut data = Vec::with_capacity(self.data.len() + other.data.len());
        offset.push(0u64);
        for (mine, theirs) in self.lines().zip(other.lines()) {
            data.extend_from_slice(mine);
            data.extend_from_slice(theirs);
            offset.push(data.len() as u64);
        }
        self.offset = offset;
        self.data = data;
        Ok(())
    }
}
