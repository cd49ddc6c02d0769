//! Input adapters.
//!
//! An adapter presents an external data source as a sequence of batches.
//! Each batch is a sequence of [`Line`]s, and each line a sequence of
//! [`CooTuple`] elements with absolute row indices.
//!
//! # Variants
//!
//! | Adapter | Lines are | Batches |
//! |---------|-----------|---------|
//! | [`DenseAdapter`] | rows | one |
//! | [`CsrAdapter`] | rows | one |
//! | [`CscAdapter`] | columns | one |
//! | [`ColumnarAdapter`] | rows | one |
//! | [`FileAdapter`] | rows | one per parsed block |
//!
//! Column-major batches ([`CscAdapter`]) are ingested by a single thread.

mod columnar;
mod csc;
mod csr;
mod dense;
mod file;

pub use columnar::{Column, ColumnarAdapter, ColumnarBatch};
pub use csc::{CscAdapter, CscBatch};
pub use csr::{CsrAdapter, CsrBatch};
pub use dense::{DenseAdapter, DenseBatch};
pub use file::{FileAdapter, FileBatch, RowBlock, RowBlockParser};

use ndarray::ArrayView1;

use crate::cats::CatContainer;
use crate::error::Result;

/// One element of a batch: `(row, column, value)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CooTuple {
    pub row_idx: usize,
    pub column_idx: usize,
    pub value: f32,
}

impl CooTuple {
    #[inline]
    pub fn new(row_idx: usize, column_idx: usize, value: f32) -> Self {
        Self {
            row_idx,
            column_idx,
            value,
        }
    }
}

/// A row (or, for column-major batches, a column) of a batch.
#[derive(Clone, Copy, Debug)]
pub enum Line<'b> {
    Dense {
        row: usize,
        values: ArrayView1<'b, f32>,
    },
    /// A CSR row. Missing `values` means every stored value is `1.0`.
    Sparse {
        row: usize,
        indices: &'b [u32],
        values: Option<&'b [f32]>,
    },
    /// A CSC column; row indices are absolute.
    Column {
        column: usize,
        rows: &'b [u32],
        values: &'b [f32],
    },
    Columnar {
        row: usize,
        columns: &'b [Column<'b>],
    },
}

impl<'b> Line<'b> {
    /// Number of elements on this line.
    #[inline]
    pub fn size(&self) -> usize {
        match self {
            Line::Dense { values, .. } => values.len(),
            Line::Sparse { indices, .. } => indices.len(),
            Line::Column { rows, .. } => rows.len(),
            Line::Columnar { columns, .. } => columns.len(),
        }
    }

    /// Row index of a row line, `None` for a column line.
    #[inline]
    pub fn row(&self) -> Option<usize> {
        match *self {
            Line::Dense { row, .. } | Line::Sparse { row, .. } | Line::Columnar { row, .. } => Some(row),
            Line::Column { .. } => None,
        }
    }

    /// # Panics
    ///
    /// If `j >= self.size()`.
    #[inline]
    pub fn get_element(&self, j: usize) -> CooTuple {
        match *self {
            Line::Dense { row, ref values } => CooTuple::new(row, j, values[j]),
            Line::Sparse {
                row,
                indices,
                values,
            } => CooTuple::new(row, indices[j] as usize, values.map_or(1.0, |v| v[j])),
            Line::Column {
                column,
                rows,
                values,
            } => CooTuple::new(rows[j] as usize, column, values[j]),
            Line::Columnar { row, columns } => CooTuple::new(row, j, columns[j].value(row)),
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = CooTuple> + 'b {
        let line = *self;
        (0..line.size()).map(move |j| line.get_element(j))
    }
}

/// One batch of an adapter.
#[derive(Clone, Copy, Debug)]
pub enum AdapterBatch<'b> {
    Dense(DenseBatch<'b>),
    Csr(CsrBatch<'b>),
    Csc(CscBatch<'b>),
    Columnar(ColumnarBatch<'b>),
    File(FileBatch<'b>),
}

impl<'b> AdapterBatch<'b> {
    /// Number of lines.
    #[inline]
    pub fn size(&self) -> usize {
        match self {
            AdapterBatch::Dense(b) => b.size(),
            AdapterBatch::Csr(b) => b.size(),
            AdapterBatch::Csc(b) => b.size(),
            AdapterBatch::Columnar(b) => b.size(),
            AdapterBatch::File(b) => b.size(),
        }
    }

    #[inline]
    pub fn line(&self, i: usize) -> Line<'b> {
        match self {
            AdapterBatch::Dense(b) => b.line(i),
            AdapterBatch::Csr(b) => b.line(i),
            AdapterBatch::Csc(b) => b.line(i),
            AdapterBatch::Columnar(b) => b.line(i),
            AdapterBatch::File(b) => b.line(i),
        }
    }

    /// Whether lines are rows.
    #[inline]
    pub fn is_row_major(&self) -> bool {
        !matches!(self, AdapterBatch::Csc(_))
    }

    pub fn labels(&self) -> Option<&'b [f32]> {
        match self {
            AdapterBatch::File(b) => b.block().label.as_deref(),
            _ => None,
        }
    }

    pub fn weights(&self) -> Option<&'b [f32]> {
        match self {
            AdapterBatch::File(b) => b.block().weight.as_deref(),
            _ => None,
        }
    }

    pub fn qids(&self) -> Option<&'b [u64]> {
        match self {
            AdapterBatch::File(b) => b.block().qid.as_deref(),
            _ => None,
        }
    }
}

/// A data source, iterated batch by batch.
///
/// ```
/// use dmatrix::adapter::{Adapter, CsrAdapter};
///
/// let indptr = [0u64, 2, 3];
/// let indices = [0u32, 2, 1];
/// let values = [1.0f32, 3.0, 2.0];
/// let mut adapter = Adapter::Csr(CsrAdapter::new(&indptr, &indices, &values, 3));
///
/// let mut n = 0;
/// while let Some(batch) = adapter.next().unwrap() {
///     n += batch.size();
/// }
/// assert_eq!(n, 2);
/// ```
pub enum Adapter<'a> {
    Dense(DenseAdapter<'a>),
    Csr(CsrAdapter<'a>),
    Csc(CscAdapter<'a>),
    Columnar(ColumnarAdapter<'a>),
    File(FileAdapter<'a>),
}

impl Adapter<'_> {
    /// Number of rows, if known before iteration.
    pub fn num_rows(&self) -> Option<usize> {
        match self {
            Adapter::Dense(a) => Some(a.num_rows()),
            Adapter::Csr(a) => Some(a.num_rows()),
            Adapter::Csc(a) => Some(a.num_rows()),
            Adapter::Columnar(a) => Some(a.num_rows()),
            Adapter::File(_) => None,
        }
    }

    /// Number of columns, `0` when unknown.
    pub fn num_columns(&self) -> usize {
        match self {
            Adapter::Dense(a) => a.num_columns(),
            Adapter::Csr(a) => a.num_columns(),
            Adapter::Csc(a) => a.num_columns(),
            Adapter::Columnar(a) => a.num_columns(),
            Adapter::File(a) => a.num_columns(),
        }
    }

    /// Categorical encodings carried by the source.
    pub fn cats(&self) -> Option<CatContainer> {
        match self {
            Adapter::Columnar(a) => a.cats(),
            _ => None,
        }
    }

    /// Rewind to the first batch.
    pub fn before_first(&mut self) -> Result<()> {
        match self {
            Adapter::Dense(a) => a.before_first(),
            Adapter::Csr(a) => a.before_first(),
            Adapter::Csc(a) => a.before_first(),
            Adapter::Columnar(a) => a.before_first(),
            Adapter::File(a) => return a.before_first(),
        }
        Ok(())
    }

    /// Advance to the next batch, `None` once exhausted.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<AdapterBatch<'_>>> {
        Ok(match self {
            Adapter::Dense(a) => a.next().map(AdapterBatch::Dense),
            Adapter::Csr(a) => a.next().map(AdapterBatch::Csr),
            Adapter::Csc(a) => a.next().map(AdapterBatch::Csc),
            Adapter::Columnar(a) => a.next().map(AdapterBatch::Columnar),
            Adapter::File(a) => a.next()?.map(AdapterBatch::File),
        })
    }
}
