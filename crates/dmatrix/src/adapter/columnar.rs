//! Columnar input: a list of typed columns of equal length.

use super::Line;
use crate::cats::{CatContainer, Categories};
use crate::error::{DataError, Result};

/// A typed column.
///
/// Categorical columns store integer codes into `categories`; a negative
/// code marks a missing value.
#[derive(Clone, Copy, Debug)]
pub enum Column<'a> {
    F32(&'a [f32]),
    F64(&'a [f64]),
    I32(&'a [i32]),
    I64(&'a [i64]),
    U8(&'a [u8]),
    Categorical {
        codes: &'a [i32],
        categories: &'a Categories,
    },
}

impl Column<'_> {
    pub fn len(&self) -> usize {
        match self {
            Column::F32(v) => v.len(),
            Column::F64(v) => v.len(),
            Column::I32(v) => v.len(),
            Column::I64(v) => v.len(),
            Column::U8(v) => v.len(),
            Column::Categorical { codes, .. } => codes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_categorical(&self) -> bool {
        matches!(self, Column::Categorical { .. })
    }

    /// Value of row `i` as `f32`.
    #[inline]
    pub fn value(&self, i: usize) -> f32 {
        match self {
            Column::F32(v) => v[i],
            Column::F64(v) => v[i] as f32,
            Column::I32(v) => v[i] as f32,
            Column::I64(v) => v[i] as f32,
            Column::U8(v) => f32::from(v[i]),
            Column::Categorical { codes, .. } => {
                let code = codes[i];
                if code < 0 {
                    f32::NAN
                } else {
                    code as f32
                }
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ColumnarAdapter<'a> {
    columns: Vec<Column<'a>>,
    num_rows: usize,
    consumed: bool,
}

impl<'a> ColumnarAdapter<'a> {
    /// All columns must have the same length.
    pub fn new(columns: Vec<Column<'a>>) -> Result<Self> {
        let num_rows = columns.first().map_or(0, Column::len);
        if let Some((j, c)) = columns.iter().enumerate().find(|(_, c)| c.len() != num_rows) {
            return Err(DataError::InvalidShape(format!(
                "column {j} has {} rows, expected {num_rows}",
                c.len()
            )));
        }
        Ok(Self {
            columns,
            num_rows,
            consumed: false,
        })
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Encodings of the categorical columns, `None` if there are none.
    pub fn cats(&self) -> Option<CatContainer> {
        if !self.columns.iter().any(Column::is_categorical) {
            return None;
        }
        let features = self
            .columns
            .iter()
            .map(|c| match c {
                Column::Categorical { categories, .. } => (*categories).clone(),
                _ => Categories::Numerical,
            })
            .collect();
        Some(CatContainer::new(features))
    }

    pub(super) fn before_first(&mut self) {
        self.consumed = false;
    }

    pub(super) fn next(&mut self) -> Option<ColumnarBatch<'_>> {
        if std::mem::replace(&mut self.consumed, true) {
            return None;
        }
        Some(ColumnarBatch {
            columns: &self.columns,
            num_rows: self.num_rows,
        })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ColumnarBatch<'b> {
    columns: &'b [Column<'b>],
    num_rows: usize,
}

impl<'b> ColumnarBatch<'b> {
    #[inline]
    pub fn size(&self) -> usize {
        self.num_rows
    }

    #[inline]
    pub fn line(&self, i: usize) -> Line<'b> {
        Line::Columnar {
            row: i,
            columns: self.columns,
        }
    }
}
