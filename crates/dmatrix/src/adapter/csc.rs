//! Compressed sparse column input.

use super::Line;

/// Column `j` holds rows `row_indices[colptr[j]..colptr[j + 1]]`.
#[derive(Clone, Debug)]
pub struct CscAdapter<'a> {
    colptr: &'a [u64],
    row_indices: &'a [u32],
    values: &'a [f32],
    num_rows: usize,
    consumed: bool,
}

impl<'a> CscAdapter<'a> {
    pub fn new(colptr: &'a [u64], row_indices: &'a [u32], values: &'a [f32], num_rows: usize) -> Self {
        Self {
            colptr,
            row_indices,
            values,
            num_rows,
            consumed: false,
        }
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.colptr.len().saturating_sub(1)
    }

    pub(super) fn before_first(&mut self) {
        self.consumed = false;
    }

    pub(super) fn next(&mut self) -> Option<CscBatch<'a>> {
        if std::mem::replace(&mut self.consumed, true) {
            return None;
        }
        Some(CscBatch {
            colptr: self.colptr,
            row_indices: self.row_indices,
            values: self.values,
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CscBatch<'b> {
    colptr: &'b [u64],
    row_indices: &'b [u32],
    values: &'b [f32],
}

impl<'b> CscBatch<'b> {
    /// Number of columns.
    #[inline]
    pub fn size(&self) -> usize {
        self.colptr.len().saturating_sub(1)
    }

    #[inline]
    pub fn line(&self, j: usize) -> Line<'b> {
        let begin = self.colptr[j] as usize;
        let end = self.colptr[j + 1] as usize;
        Line::Column {
            column: j,
            rows: &self.row_indices[begin..end],
            values: &self.values[begin..end],
        }
    }
}
