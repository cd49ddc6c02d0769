//! Matrix storage strategies.
//!
//! Every strategy exposes the same contract: a [`MetaInfo`] and a sequence
//! of row pages. [`create`] picks the strategy from how the data is
//! supplied:
//!
//! | Source | Matrix | Pages |
//! |--------|--------|-------|
//! | [`DMatrixSource::Adapter`] | [`SimpleDMatrix`] | one, in memory |
//! | [`DMatrixSource::Quantile`] | [`QuantileDMatrix`] | one, binned |
//! | [`DMatrixSource::ExternalMemory`] | [`ExtMemDMatrix`] | many, on disk |

use std::borrow::Cow;
use std::path::Path;

use crate::adapter::Adapter;
use crate::collective::SingleProcess;
use crate::context::Context;
use crate::error::{DataError, Result};
use crate::meta::{DataSplitMode, MetaInfo};
use crate::page::SparsePage;

mod cuts;
mod extmem;
mod proxy;
mod quantile;
mod simple;

pub use cuts::BinCuts;
pub use extmem::{ExtMemConfig, ExtMemDMatrix};
pub use proxy::{create_from_proxy, ColumnBuffer, DMatrixProxy, DataIter};
pub use quantile::{QuantileConfig, QuantileDMatrix, QuantileReference, QuantizedPage};
pub use simple::{SimpleDMatrix, DMATRIX_MAGIC};

/// Row pages in row order. Pages held in memory are borrowed; pages read
/// back from disk or rebuilt on demand are owned.
pub type PageIter<'a> = Box<dyn Iterator<Item = Result<Cow<'a, SparsePage>>> + 'a>;

pub trait DMatrix: Send + Sync {
    fn info(&self) -> &MetaInfo;

    fn info_mut(&mut self) -> &mut MetaInfo;

    fn ctx(&self) -> &Context;

    fn num_pages(&self) -> usize;

    fn row_pages(&self) -> PageIter<'_>;

    /// A new matrix holding rows `ridxs`, in that order.
    fn slice(&self, _ridxs: &[usize]) -> Result<Box<dyn DMatrix>> {
        Err(DataError::Unsupported("slicing this matrix type"))
    }
}

/// How the data of a new matrix is supplied.
pub enum DMatrixSource<'a> {
    /// All data at once, ingested in a single pass.
    Adapter { adapter: Adapter<'a>, missing: f32 },
    /// Batches binned into quantiles.
    Quantile {
        iter: &'a mut dyn DataIter,
        config: QuantileConfig,
    },
    /// Batches cached on disk.
    ExternalMemory {
        iter: &'a mut dyn DataIter,
        config: ExtMemConfig,
    },
}

/// Build a matrix from `source`.
///
/// ```
/// use dmatrix::adapter::{Adapter, CsrAdapter};
/// use dmatrix::dmatrix::{create, DMatrixSource};
/// use dmatrix::Context;
///
/// let adapter = Adapter::Csr(CsrAdapter::new(&[0, 2, 3], &[0, 2, 1], &[1.0, 3.0, 2.0], 3));
/// let source = DMatrixSource::Adapter { adapter, missing: f32::NAN };
/// let dmat = create(source, &Context::cpu(1)).unwrap();
/// assert_eq!(dmat.info().num_row, 2);
/// assert_eq!(dmat.num_pages(), 1);
/// ```
pub fn create(source: DMatrixSource<'_>, ctx: &Context) -> Result<Box<dyn DMatrix>> {
    Ok(match source {
        DMatrixSource::Adapter { adapter, missing } => Box::new(SimpleDMatrix::from_adapter(
            adapter,
            missing,
            ctx,
            DataSplitMode::Row,
            &SingleProcess,
        )?),
        DMatrixSource::Quantile { iter, config } => Box::new(QuantileDMatrix::from_iter(iter, &config, ctx)?),
        DMatrixSource::ExternalMemory { iter, config } => Box::new(ExtMemDMatrix::from_iter(iter, &config, ctx)?),
    })
}

/// Load a matrix saved with [`SimpleDMatrix::save`].
pub fn load(path: impl AsRef<Path>, ctx: &Context) -> Result<SimpleDMatrix> {
    SimpleDMatrix::load(path, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::DenseAdapter;
    use crate::dmatrix::proxy::tests::DenseBatches;
    use ndarray::array;

    fn dense_rows(dmat: &dyn DMatrix) -> usize {
        dmat.row_pages().map(|p| p.unwrap().size()).sum()
    }

    #[test]
    fn every_source_exposes_rows() {
        let ctx = Context::cpu(2);
        let values = array![[1.0, 2.0], [3.0, f32::NAN], [5.0, 6.0]];

        let adapter = Adapter::Dense(DenseAdapter::new(values.view()));
        let simple = create(DMatrixSource::Adapter { adapter, missing: f32::NAN }, &ctx).unwrap();
        assert_eq!(dense_rows(simple.as_ref()), 3);

        let mut iter = DenseBatches::new(vec![values.clone()]);
        let quantile = create(
            DMatrixSource::Quantile {
                iter: &mut iter,
                config: QuantileConfig::default(),
            },
            &ctx,
        )
        .unwrap();
        assert_eq!(dense_rows(quantile.as_ref()), 3);
        assert_eq!(quantile.info().num_nonzero, 5);

        let dir = tempfile::tempdir().unwrap();
        let mut iter = DenseBatches::new(vec![values]);
        let extmem = create(
            DMatrixSource::ExternalMemory {
                iter: &mut iter,
                config: ExtMemConfig::builder().cache_prefix(dir.path().join("m")).build(),
            },
            &ctx,
        )
        .unwrap();
        assert_eq!(dense_rows(extmem.as_ref()), 3);
        assert!(matches!(extmem.slice(&[0]), Err(DataError::Unsupported(_))));
    }

    #[test]
    fn saved_matrix_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.dmatrix");
        let values = array![[1.0, 0.0], [f32::NAN, 4.0]];
        let adapter = Adapter::Dense(DenseAdapter::new(values.view()));
        let dmat = SimpleDMatrix::from_adapter(adapter, f32::NAN, &Context::cpu(1), DataSplitMode::Row, &SingleProcess)
            .unwrap();
        dmat.save(&path).unwrap();

        let back = load(&path, &Context::cpu(1)).unwrap();
        assert_eq!(back.info(), dmat.info());
        assert_eq!(back.row_page(), dmat.row_page());
    }
}
