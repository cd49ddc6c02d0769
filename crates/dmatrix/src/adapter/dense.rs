//! Dense row-major input.

use ndarray::{ArrayView2, Axis};

use super::Line;
use crate::error::{DataError, Result};

/// A `num_rows x num_columns` matrix of values.
///
/// Every cell becomes an element; missing cells are encoded in the values
/// themselves (NaN or the `missing` marker of the ingesting operation).
#[derive(Clone, Debug)]
pub struct DenseAdapter<'a> {
    values: ArrayView2<'a, f32>,
    consumed: bool,
}

impl<'a> DenseAdapter<'a> {
    pub fn new(values: ArrayView2<'a, f32>) -> Self {
        Self {
            values,
            consumed: false,
        }
    }

    /// Wrap a flat row-major buffer of `num_rows * num_columns` values.
    pub fn from_slice(values: &'a [f32], num_rows: usize, num_columns: usize) -> Result<Self> {
        let view = ArrayView2::from_shape((num_rows, num_columns), values).map_err(|err| {
            DataError::InvalidShape(format!(
                "dense buffer of {} values does not match {num_rows}x{num_columns}: {err}",
                values.len()
            ))
        })?;
        Ok(Self::new(view))
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.values.nrows()
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.values.ncols()
    }

    pub(super) fn before_first(&mut self) {
        self.consumed = false;
    }

    pub(super) fn next(&mut self) -> Option<DenseBatch<'_>> {
        if std::mem::replace(&mut self.consumed, true) {
            return None;
        }
        Some(DenseBatch {
            values: self.values.view(),
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct DenseBatch<'b> {
    values: ArrayView2<'b, f32>,
}

impl<'b> DenseBatch<'b> {
    #[inline]
    pub fn size(&self) -> usize {
        self.values.nrows()
    }

    #[inline]
    pub fn line(&self, i: usize) -> Line<'b> {
        Line::Dense {
            row: i,
            values: self.values.index_axis_move(Axis(0), i),
        }
    }
}
