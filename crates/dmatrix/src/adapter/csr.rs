//! Compressed sparse row input.

use super::Line;

/// Rows `i` holds `indices[indptr[i]..indptr[i + 1]]` with the matching
/// `values`.
#[derive(Clone, Debug)]
pub struct CsrAdapter<'a> {
    indptr: &'a [u64],
    indices: &'a [u32],
    values: &'a [f32],
    num_columns: usize,
    consumed: bool,
}

impl<'a> CsrAdapter<'a> {
    pub fn new(indptr: &'a [u64], indices: &'a [u32], values: &'a [f32], num_columns: usize) -> Self {
        Self {
            indptr,
            indices,
            values,
            num_columns,
            consumed: false,
        }
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.indptr.len().saturating_sub(1)
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    pub(super) fn before_first(&mut self) {
        self.consumed = false;
    }

    pub(super) fn next(&mut self) -> Option<CsrBatch<'a>> {
        if std::mem::replace(&mut self.consumed, true) {
            return None;
        }
        Some(CsrBatch {
            indptr: self.indptr,
            indices: self.indices,
            values: Some(self.values),
            base_rowid: 0,
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CsrBatch<'b> {
    pub(super) indptr: &'b [u64],
    pub(super) indices: &'b [u32],
    pub(super) values: Option<&'b [f32]>,
    pub(super) base_rowid: usize,
}

impl<'b> CsrBatch<'b> {
    #[inline]
    pub fn size(&self) -> usize {
        self.indptr.len().saturating_sub(1)
    }

    #[inline]
    pub fn line(&self, i: usize) -> Line<'b> {
        let begin = self.indptr[i] as usize;
        let end = self.indptr[i + 1] as usize;
        Line::Sparse {
            row: self.base_rowid + i,
            indices: &self.indices[begin..end],
            values: self.values.map(|v| &v[begin..end]),
        }
    }
}
