//! Batch-at-a-time input for iterator-driven construction.
//!
//! A [`DataIter`] fills a [`DMatrixProxy`] with one batch per call to
//! [`DataIter::next`]. The proxy copies the batch and carries the batch's
//! metadata, which callers set through the usual field protocol.

use ndarray::{Array2, ArrayView2};

use super::simple::SimpleDMatrix;
use crate::adapter::{Adapter, Column, ColumnarAdapter, CsrAdapter, DenseAdapter};
use crate::cats::Categories;
use crate::collective::SingleProcess;
use crate::context::Context;
use crate::error::{DataError, Result};
use crate::meta::{ArrayInterface, DataSplitMode, MetaInfo};

/// A source of batches, consumed in two passes or more.
pub trait DataIter {
    /// Rewind to the first batch.
    fn reset(&mut self) -> Result<()>;

    /// Load the next batch into `proxy`; `false` once exhausted.
    fn next(&mut self, proxy: &mut DMatrixProxy) -> Result<bool>;
}

/// An owned typed column.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnBuffer {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    Categorical { codes: Vec<i32>, categories: Categories },
}

impl ColumnBuffer {
    pub fn view(&self) -> Column<'_> {
        match self {
            ColumnBuffer::F32(v) => Column::F32(v),
            ColumnBuffer::F64(v) => Column::F64(v),
            ColumnBuffer::I32(v) => Column::I32(v),
            ColumnBuffer::I64(v) => Column::I64(v),
            ColumnBuffer::U8(v) => Column::U8(v),
            ColumnBuffer::Categorical { codes, categories } => Column::Categorical { codes, categories },
        }
    }
}

impl From<Column<'_>> for ColumnBuffer {
    fn from(column: Column<'_>) -> Self {
        match column {
            Column::F32(v) => ColumnBuffer::F32(v.to_vec()),
            Column::F64(v) => ColumnBuffer::F64(v.to_vec()),
            Column::I32(v) => ColumnBuffer::I32(v.to_vec()),
            Column::I64(v) => ColumnBuffer::I64(v.to_vec()),
            Column::U8(v) => ColumnBuffer::U8(v.to_vec()),
            Column::Categorical { codes, categories } => ColumnBuffer::Categorical {
                codes: codes.to_vec(),
                categories: categories.clone(),
            },
        }
    }
}

#[derive(Clone, Debug, Default)]
enum ProxyBatch {
    #[default]
    Empty,
    Dense(Array2<f32>),
    Csr {
        indptr: Vec<u64>,
        indices: Vec<u32>,
        values: Vec<f32>,
        num_columns: usize,
    },
    Columnar(Vec<ColumnBuffer>),
}

/// Holds the current batch of a [`DataIter`].
///
/// Setting a batch clears the per-row metadata of the previous one; feature
/// names and types are kept.
#[derive(Clone, Debug, Default)]
pub struct DMatrixProxy {
    batch: ProxyBatch,
    info: MetaInfo,
}

impl DMatrixProxy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_dense(&mut self, values: ArrayView2<'_, f32>) {
        self.info.clear();
        self.info.num_row = values.nrows() as u64;
        self.info.num_col = values.ncols() as u64;
        self.batch = ProxyBatch::Dense(values.to_owned());
    }

    pub fn set_csr(&mut self, indptr: &[u64], indices: &[u32], values: &[f32], num_columns: usize) {
        self.info.clear();
        self.info.num_row = indptr.len().saturating_sub(1) as u64;
        self.info.num_col = num_columns as u64;
        self.batch = ProxyBatch::Csr {
            indptr: indptr.to_vec(),
            indices: indices.to_vec(),
            values: values.to_vec(),
            num_columns,
        };
    }

    pub fn set_columnar(&mut self, columns: &[Column<'_>]) -> Result<()> {
        let num_rows = ColumnarAdapter::new(columns.to_vec())?.num_rows();
        self.info.clear();
        self.info.num_row = num_rows as u64;
        self.info.num_col = columns.len() as u64;
        self.batch = ProxyBatch::Columnar(columns.iter().copied().map(ColumnBuffer::from).collect());
        Ok(())
    }

    /// Set a numeric field of the current batch.
    pub fn set_info(&mut self, key: &str, array: ArrayInterface<'_>) -> Result<()> {
        self.info.set_info(key, array)
    }

    #[inline]
    pub fn info(&self) -> &MetaInfo {
        &self.info
    }

    #[inline]
    pub fn info_mut(&mut self) -> &mut MetaInfo {
        &mut self.info
    }

    pub fn has_batch(&self) -> bool {
        !matches!(self.batch, ProxyBatch::Empty)
    }

    /// An adapter over the current batch.
    pub fn adapter(&self) -> Result<Adapter<'_>> {
        Ok(match &self.batch {
            ProxyBatch::Empty => return Err(DataError::Unsupported("the proxy holds no batch")),
            ProxyBatch::Dense(values) => Adapter::Dense(DenseAdapter::new(values.view())),
            ProxyBatch::Csr {
                indptr,
                indices,
                values,
                num_columns,
            } => Adapter::Csr(CsrAdapter::new(indptr, indices, values, *num_columns)),
            ProxyBatch::Columnar(columns) => {
                Adapter::Columnar(ColumnarAdapter::new(columns.iter().map(ColumnBuffer::view).collect())?)
            }
        })
    }
}

/// Build an in-memory matrix from the proxy's current batch.
///
/// The proxy's metadata is deep-copied; shape and non-missing count come
/// from the ingested batch.
pub fn create_from_proxy(proxy: &DMatrixProxy, missing: f32, ctx: &Context) -> Result<SimpleDMatrix> {
    let mut dmat = SimpleDMatrix::from_adapter(
        proxy.adapter()?,
        missing,
        ctx,
        DataSplitMode::Row,
        &SingleProcess,
    )?;
    let built = dmat.info();
    let mut info = proxy.info().copy();
    info.num_row = built.num_row;
    info.num_col = built.num_col;
    info.num_nonzero = built.num_nonzero;
    if info.cats().is_empty() && !built.cats().is_empty() {
        info.set_cats(built.cats_shared());
    }
    if info.feature_type_names.is_empty() && !built.feature_type_names.is_empty() {
        info.set_feature_info("feature_type", built.feature_type_names.as_slice())?;
    }
    info.validate(ctx.device)?;
    *dmat.info_mut() = info;
    Ok(dmat)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::array;

    /// Yields dense batches labelled with ten times their first column,
    /// or zero where it is missing.
    pub(crate) struct DenseBatches {
        pub batches: Vec<Array2<f32>>,
        pub pos: usize,
    }

    impl DenseBatches {
        pub fn new(batches: Vec<Array2<f32>>) -> Self {
            Self { batches, pos: 0 }
        }
    }

    impl DataIter for DenseBatches {
        fn reset(&mut self) -> Result<()> {
            self.pos = 0;
            Ok(())
        }

        fn next(&mut self, proxy: &mut DMatrixProxy) -> Result<bool> {
            let Some(batch) = self.batches.get(self.pos) else {
                return Ok(false);
            };
            self.pos += 1;
            proxy.set_dense(batch.view());
            let labels: Vec<f32> = batch
                .column(0)
                .iter()
                .map(|v| if v.is_nan() { 0.0 } else { v * 10.0 })
                .collect();
            proxy.set_info("label", ArrayInterface::vector(labels.as_slice()))?;
            Ok(true)
        }
    }

    #[test]
    fn proxy_dense_batch_becomes_matrix() {
        let mut iter = DenseBatches::new(vec![array![[1.0, f32::NAN], [2.0, 3.0]]]);
        let mut proxy = DMatrixProxy::new();
        assert!(!proxy.has_batch());
        assert!(iter.next(&mut proxy).unwrap());

        let dmat = create_from_proxy(&proxy, f32::NAN, &Context::cpu(1)).unwrap();
        assert_eq!(dmat.info().num_row, 2);
        assert_eq!(dmat.info().num_col, 2);
        assert_eq!(dmat.info().num_nonzero, 3);
        assert_eq!(dmat.info().labels, array![[10.0], [20.0]]);
        assert!(!iter.next(&mut proxy).unwrap());
    }

    #[test]
    fn setting_a_batch_clears_labels() {
        let mut proxy = DMatrixProxy::new();
        proxy.set_dense(array![[1.0f32]].view());
        proxy.set_info("label", ArrayInterface::vector(&[1.0f32][..])).unwrap();
        proxy.set_csr(&[0, 1, 1], &[2], &[5.0], 3);
        assert!(proxy.info().labels.is_empty());
        assert_eq!(proxy.info().num_row, 2);

        let dmat = create_from_proxy(&proxy, f32::NAN, &Context::cpu(1)).unwrap();
        assert_eq!(dmat.row_page().offset, vec![0, 1, 1]);
    }

    #[test]
    fn columnar_batch_carries_categories() {
        let categories = Categories::Str(vec!["a".into(), "b".into()]);
        let codes = [1, -1, 0];
        let numbers = [0.5f64, 1.5, 2.5];
        let mut proxy = DMatrixProxy::new();
        proxy
            .set_columnar(&[
                Column::Categorical {
                    codes: &codes,
                    categories: &categories,
                },
                Column::F64(&numbers),
            ])
            .unwrap();
        let dmat = create_from_proxy(&proxy, f32::NAN, &Context::cpu(2)).unwrap();
        assert!(dmat.info().has_categorical());
        assert_eq!(dmat.info().cats().n_categories(0), 2);
        assert_eq!(dmat.info().num_nonzero, 5);
    }

    #[test]
    fn empty_proxy_has_no_adapter() {
        let proxy = DMatrixProxy::new();
        assert!(matches!(proxy.adapter(), Err(DataError::Unsupported(_))));
    }
}
