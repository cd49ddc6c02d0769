//! Quantized matrix built from a batch iterator.
//!
//! Construction takes two passes over the iterator. The first pass merges
//! the batch metadata and keeps a bounded sketch of the distinct values of
//! every feature to compute [`BinCuts`]; the second pass bins every batch
//! into one [`QuantizedPage`].
//!
//! A sketch holds at most `max_bin * SKETCH_PER_BIN` distinct values. Cuts
//! are exact while a feature stays under that bound and approximate once
//! its sketch has been thinned.

use std::borrow::Cow;
use std::sync::Arc;

use bon::Builder;

use super::cuts::{category_code, BinCuts};
use super::proxy::{create_from_proxy, DMatrixProxy, DataIter};
use super::{DMatrix, PageIter};
use crate::cats::CatContainer;
use crate::context::Context;
use crate::error::{DataError, Result};
use crate::meta::{FeatureType, MetaInfo};
use crate::page::{Entry, SparsePage};
use crate::utils::{run_with_threads, ErrorCollector};

/// Distinct values kept per bin by the first-pass sketch.
const SKETCH_PER_BIN: usize = 16;

/// Cuts and categories of an existing quantized matrix, for binning new
/// data the same way.
#[derive(Clone, Debug)]
pub struct QuantileReference {
    pub cuts: Arc<BinCuts>,
    pub cats: Arc<CatContainer>,
}

/// Parameters of quantized construction.
///
/// ```
/// use dmatrix::dmatrix::QuantileConfig;
///
/// let config = QuantileConfig::builder().max_bin(64).build();
/// assert_eq!(config.max_bin, 64);
/// assert!(config.missing.is_nan());
/// ```
#[derive(Clone, Debug, Builder)]
pub struct QuantileConfig {
    /// Upper bound on the number of bins per feature.
    #[builder(default = 256)]
    pub max_bin: usize,
    #[builder(default = f32::NAN)]
    pub missing: f32,
    /// Reuse the bins of another matrix instead of computing new ones.
    pub reference: Option<QuantileReference>,
}

impl Default for QuantileConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Rows of global bin ids.
#[derive(Clone, Debug, PartialEq)]
pub struct QuantizedPage {
    pub offset: Vec<u64>,
    pub bins: Vec<u32>,
    pub base_rowid: u64,
}

impl Default for QuantizedPage {
    fn default() -> Self {
        Self::new()
    }
}

impl QuantizedPage {
    pub fn new() -> Self {
        Self {
            offset: vec![0],
            bins: Vec::new(),
            base_rowid: 0,
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.offset.len() - 1
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[u32] {
        &self.bins[self.offset[i] as usize..self.offset[i + 1] as usize]
    }

    /// Bin and append the rows of `page`.
    ///
    /// `recode` maps the categorical codes of `page` onto the encoding the
    /// cuts were built for, one vector per feature. On error nothing is
    /// appended.
    pub fn push_page(
        &mut self,
        page: &SparsePage,
        cuts: &BinCuts,
        recode: Option<&[Vec<i32>]>,
        n_threads: usize,
    ) -> Result<()> {
        let mut bins = vec![0u32; page.data.len()];
        let errors = ErrorCollector::<DataError>::new();
        let n_threads = n_threads.clamp(1, page.size().max(1));
        run_with_threads(n_threads, |par| {
            par.maybe_par_chunks_for_each(bins.as_mut_slice(), &page.offset, |i, out| {
                errors.run(|| {
                    for (slot, e) in out.iter_mut().zip(page.line(i)) {
                        let feature = e.index as usize;
                        let value = match recode.and_then(|r| r.get(feature)).filter(|m| !m.is_empty()) {
                            Some(map) => map[category_code(feature, e.fvalue, map.len())?] as f32,
                            None => e.fvalue,
                        };
                        *slot = cuts.search_bin(feature, value)?;
                    }
                    Ok(())
                });
            });
        });
        errors.finish()?;

        let top = self.offset.last().copied().unwrap_or(0);
        self.offset.extend(page.offset.iter().skip(1).map(|&o| top + o));
        self.bins.extend(bins);
        Ok(())
    }
}

pub struct QuantileDMatrix {
    ctx: Context,
    info: MetaInfo,
    cuts: Arc<BinCuts>,
    page: QuantizedPage,
}

impl QuantileDMatrix {
    /// Build from `iter`, resetting it before each pass.
    pub fn from_iter(iter: &mut dyn DataIter, config: &QuantileConfig, ctx: &Context) -> Result<Self> {
        let n_threads = ctx.threads();
        let mut proxy = DMatrixProxy::new();
        let mut info = MetaInfo::new();
        let mut sketches: Vec<DistinctSketch> = Vec::new();
        let sketch_limit = config.max_bin.saturating_mul(SKETCH_PER_BIN).max(2);
        let mut n_batches = 0usize;

        iter.reset()?;
        while iter.next(&mut proxy)? {
            let batch = create_from_proxy(&proxy, config.missing, ctx)?;
            info.extend(batch.info(), true, true)?;
            if config.reference.is_none() {
                merge_batch(&mut sketches, batch.row_page(), sketch_limit);
            }
            n_batches += 1;
        }
        if n_batches == 0 {
            return Err(DataError::EmptyIterator);
        }

        let num_col = info.num_col as usize;
        let (cuts, target_cats) = match &config.reference {
            Some(reference) => {
                if reference.cuts.num_features() != num_col {
                    return Err(DataError::ColumnMismatch {
                        expected: reference.cuts.num_features() as u64,
                        got: num_col as u64,
                    });
                }
                (Arc::clone(&reference.cuts), Arc::clone(&reference.cats))
            }
            None => {
                sketches.resize_with(num_col, DistinctSketch::default);
                let values: Vec<Vec<f32>> = sketches.into_iter().map(|s| s.values).collect();
                let num_categories = category_counts(&info, &values);
                let cuts = BinCuts::from_values(&values, &num_categories, config.max_bin, n_threads)?;
                (Arc::new(cuts), info.cats_shared())
            }
        };

        let mut page = QuantizedPage::new();
        iter.reset()?;
        while iter.next(&mut proxy)? {
            let batch = create_from_proxy(&proxy, config.missing, ctx)?;
            let batch_cats = batch.info().cats();
            let recode = if batch_cats.is_empty() || target_cats.is_empty() || *batch_cats == *target_cats {
                None
            } else {
                Some(batch_cats.recode_map(&target_cats)?)
            };
            page.push_page(batch.row_page(), &cuts, recode.as_deref(), n_threads)?;
        }
        if page.size() as u64 != info.num_row {
            return Err(DataError::InvalidShape(format!(
                "the iterator yielded {} rows on the second pass and {} on the first",
                page.size(),
                info.num_row
            )));
        }

        info.set_cats(target_cats);
        info.validate(ctx.device)?;
        Ok(Self {
            ctx: ctx.clone(),
            info,
            cuts,
            page,
        })
    }

    #[inline]
    pub fn cuts(&self) -> &BinCuts {
        &self.cuts
    }

    /// Bins and categories for quantizing other data consistently.
    pub fn reference(&self) -> QuantileReference {
        QuantileReference {
            cuts: Arc::clone(&self.cuts),
            cats: self.info.cats_shared(),
        }
    }

    #[inline]
    pub fn quantized_page(&self) -> &QuantizedPage {
        &self.page
    }

    /// Approximate raw rows: every value becomes its bin's representative.
    pub fn to_sparse_page(&self) -> Result<SparsePage> {
        let mut page = SparsePage::new();
        page.base_rowid = self.page.base_rowid;
        page.data.reserve(self.page.bins.len());
        for i in 0..self.page.size() {
            for &bin in self.page.row(i) {
                let (feature, value) = self.cuts.bin_value(bin)?;
                page.data.push(Entry::new(feature as u32, value));
            }
            page.offset.push(page.data.len() as u64);
        }
        Ok(page)
    }
}

/// Sorted distinct values of one feature.
#[derive(Clone, Debug, Default)]
struct DistinctSketch {
    values: Vec<f32>,
}

impl DistinctSketch {
    /// Add `batch`, then thin to `limit` evenly spaced values if needed.
    /// The smallest and largest values always survive thinning.
    fn merge(&mut self, batch: &[f32], limit: usize) {
        self.values.extend(batch.iter().copied().filter(|v| !v.is_nan()));
        self.values.sort_by(f32::total_cmp);
        self.values.dedup();
        let n = self.values.len();
        if n > limit {
            let values = &self.values;
            self.values = (0..limit).map(|i| values[i * (n - 1) / (limit - 1)]).collect();
        }
    }
}

fn merge_batch(sketches: &mut Vec<DistinctSketch>, page: &SparsePage, limit: usize) {
    let mut columns: Vec<Vec<f32>> = Vec::new();
    for e in &page.data {
        let f = e.index as usize;
        if f >= columns.len() {
            columns.resize_with(f + 1, Vec::new);
        }
        columns[f].push(e.fvalue);
    }
    if sketches.len() < columns.len() {
        sketches.resize_with(columns.len(), DistinctSketch::default);
    }
    for (sketch, column) in sketches.iter_mut().zip(&columns) {
        if !column.is_empty() {
            sketch.merge(column, limit);
        }
    }
}

/// `Some(n)` for categorical features: the size of the encoding, or the
/// largest observed code plus one when there is no encoding.
fn category_counts(info: &MetaInfo, values: &[Vec<f32>]) -> Vec<Option<u32>> {
    (0..values.len())
        .map(|f| {
            if info.feature_types.get(f) != Some(&FeatureType::Categorical) {
                return None;
            }
            let known = info.cats().n_categories(f) as u32;
            if known > 0 {
                return Some(known);
            }
            let observed = values[f].iter().copied().filter(|v| v.is_finite()).fold(-1.0f32, f32::max);
            Some((observed + 1.0).max(0.0) as u32)
        })
        .collect()
}

impl DMatrix for QuantileDMatrix {
    fn info(&self) -> &MetaInfo {
        &self.info
    }

    fn info_mut(&mut self) -> &mut MetaInfo {
        &mut self.info
    }

    fn ctx(&self) -> &Context {
        &self.ctx
    }

    fn num_pages(&self) -> usize {
        1
    }

    fn row_pages(&self) -> PageIter<'_> {
        Box::new(std::iter::once(self.to_sparse_page().map(Cow::<SparsePage>::Owned)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::Column;
    use crate::cats::Categories;
    use crate::dmatrix::proxy::tests::DenseBatches;
    use ndarray::array;

    fn two_batches() -> DenseBatches {
        DenseBatches::new(vec![
            array![[1.0, 10.0], [2.0, f32::NAN]],
            array![[3.0, 30.0], [1.0, 20.0], [2.0, 10.0]],
        ])
    }

    #[test]
    fn sketch_thins_to_the_limit_keeping_extremes() {
        let mut sketch = DistinctSketch::default();
        let batch: Vec<f32> = (0..100).map(|i| i as f32).collect();
        sketch.merge(&batch, 1000);
        sketch.merge(&[5.0, f32::NAN, 150.0], 1000);
        assert_eq!(sketch.values.len(), 101);

        sketch.merge(&[], 11);
        assert_eq!(sketch.values.len(), 11);
        assert_eq!(sketch.values.first(), Some(&0.0));
        assert_eq!(sketch.values.last(), Some(&150.0));
        assert!(sketch.values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn many_distinct_values_stay_within_max_bin() {
        let rows: Vec<_> = (0..4)
            .map(|b| ndarray::Array2::from_shape_fn((50, 1), |(i, _)| (b * 50 + i) as f32))
            .collect();
        let mut iter = DenseBatches::new(rows);
        let config = QuantileConfig::builder().max_bin(4).build();
        let dmat = QuantileDMatrix::from_iter(&mut iter, &config, &Context::cpu(2)).unwrap();
        let cuts = dmat.cuts().feature_cuts(0);
        assert!(cuts.len() <= 3);
        assert!(cuts.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(dmat.info().num_row, 200);
    }

    #[test]
    fn two_pass_build() {
        let mut iter = two_batches();
        let dmat = QuantileDMatrix::from_iter(&mut iter, &QuantileConfig::default(), &Context::cpu(2)).unwrap();
        assert_eq!(dmat.info().num_row, 5);
        assert_eq!(dmat.info().num_col, 2);
        assert_eq!(dmat.info().num_nonzero, 9);
        assert_eq!(dmat.info().labels.nrows(), 5);
        assert_eq!(dmat.quantized_page().size(), 5);
        assert_eq!(dmat.quantized_page().row(1).len(), 1);

        // Few distinct values: reconstruction is exact.
        let page = dmat.to_sparse_page().unwrap();
        assert_eq!(page.line(0), &[Entry::new(0, 1.0), Entry::new(1, 10.0)]);
        assert_eq!(page.line(3), &[Entry::new(0, 1.0), Entry::new(1, 20.0)]);
    }

    #[test]
    fn reconstruction_is_lossy_with_few_bins() {
        let rows: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let batch = ndarray::Array2::from_shape_vec((100, 1), rows).unwrap();
        let mut iter = DenseBatches::new(vec![batch]);
        let config = QuantileConfig::builder().max_bin(4).build();
        let dmat = QuantileDMatrix::from_iter(&mut iter, &config, &Context::cpu(1)).unwrap();
        assert!(dmat.cuts().num_bins(0) <= 4);

        let page = dmat.to_sparse_page().unwrap();
        for (i, line) in page.lines().enumerate() {
            assert!(line[0].fvalue >= i as f32);
        }
        assert_eq!(page.line(99)[0].fvalue, 99.0);
    }

    #[test]
    fn reference_cuts_are_reused() {
        let mut iter = two_batches();
        let first = QuantileDMatrix::from_iter(&mut iter, &QuantileConfig::default(), &Context::cpu(1)).unwrap();

        let mut other = DenseBatches::new(vec![array![[2.0, 30.0]]]);
        let config = QuantileConfig::builder().reference(first.reference()).build();
        let second = QuantileDMatrix::from_iter(&mut other, &config, &Context::cpu(1)).unwrap();
        assert_eq!(second.cuts(), first.cuts());

        let mut narrow = DenseBatches::new(vec![array![[2.0]]]);
        let config = QuantileConfig::builder().reference(first.reference()).build();
        assert!(matches!(
            QuantileDMatrix::from_iter(&mut narrow, &config, &Context::cpu(1)),
            Err(DataError::ColumnMismatch { .. })
        ));
    }

    #[test]
    fn empty_iterator_is_an_error() {
        let mut iter = DenseBatches::new(Vec::new());
        assert!(matches!(
            QuantileDMatrix::from_iter(&mut iter, &QuantileConfig::default(), &Context::cpu(1)),
            Err(DataError::EmptyIterator)
        ));
    }

    struct ColumnarBatches {
        encodings: Vec<Categories>,
        codes: Vec<Vec<i32>>,
        pos: usize,
    }

    impl DataIter for ColumnarBatches {
        fn reset(&mut self) -> Result<()> {
            self.pos = 0;
            Ok(())
        }

        fn next(&mut self, proxy: &mut DMatrixProxy) -> Result<bool> {
            if self.pos == self.codes.len() {
                return Ok(false);
            }
            let i = self.pos;
            self.pos += 1;
            proxy.set_columnar(&[Column::Categorical {
                codes: &self.codes[i],
                categories: &self.encodings[i],
            }])?;
            Ok(true)
        }
    }

    #[test]
    fn categories_are_recoded_onto_the_reference() {
        let mut train = ColumnarBatches {
            encodings: vec![Categories::Str(vec!["a".into(), "b".into(), "c".into()])],
            codes: vec![vec![0, 1, 2]],
            pos: 0,
        };
        let first = QuantileDMatrix::from_iter(&mut train, &QuantileConfig::default(), &Context::cpu(1)).unwrap();
        assert!(first.cuts().is_categorical(0));
        assert_eq!(first.quantized_page().bins, vec![0, 1, 2]);

        // "c" and "a" under a different encoding.
        let mut test = ColumnarBatches {
            encodings: vec![Categories::Str(vec!["c".into(), "a".into()])],
            codes: vec![vec![0, 1]],
            pos: 0,
        };
        let config = QuantileConfig::builder().reference(first.reference()).build();
        let second = QuantileDMatrix::from_iter(&mut test, &config, &Context::cpu(1)).unwrap();
        assert_eq!(second.quantized_page().bins, vec![2, 0]);

        let mut unknown = ColumnarBatches {
            encodings: vec![Categories::Str(vec!["z".into()])],
            codes: vec![vec![0]],
            pos: 0,
        };
        let config = QuantileConfig::builder().reference(first.reference()).build();
        assert!(matches!(
            QuantileDMatrix::from_iter(&mut unknown, &config, &Context::cpu(1)),
            Err(DataError::UnknownCategory { .. })
        ));
    }
}
