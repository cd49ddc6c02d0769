//! Bin boundaries for quantized storage.

use rayon::prelude::*;

use crate::error::{DataError, Result};
use crate::utils::run_with_threads;

// ============================================================================
// BinCuts
// ============================================================================

/// Bin boundaries for all features.
///
/// Cut points are stored in a CSR-like layout:
/// - `cut_values`: all cut values concatenated, sorted per feature
/// - `cut_ptrs`: offsets into `cut_values` for each feature
///
/// Bins are numbered globally: feature `f` owns bins
/// `bin_ptrs[f]..bin_ptrs[f + 1]`. Missing values are not stored and have no
/// bin.
///
/// # Numerical features
///
/// With cuts `[c0, c1, c2]` a value lands in:
/// - local bin 0: `v <= c0`
/// - local bin 1: `c0 < v <= c1`
/// - local bin 2: `c1 < v <= c2`
/// - local bin 3: `v > c2`
///
/// # Categorical features
///
/// Category code `k` maps to local bin `k`; there are no cut values.
#[derive(Debug, Clone, PartialEq)]
pub struct BinCuts {
    cut_values: Box<[f32]>,
    cut_ptrs: Box<[u32]>,
    bin_ptrs: Box<[u32]>,
    /// Largest observed value of each feature, used for the top bin.
    max_values: Box<[f32]>,
    is_categorical: Box<[bool]>,
    num_categories: Box<[u32]>,
}

impl BinCuts {
    /// Create bin cuts from pre-computed values.
    ///
    /// `num_categories[f]` is `Some(n)` for a categorical feature with `n`
    /// categories and `None` for a numerical one.
    pub fn new(
        cut_values: Vec<f32>,
        cut_ptrs: Vec<u32>,
        max_values: Vec<f32>,
        num_categories: Vec<Option<u32>>,
    ) -> Result<Self> {
        let num_features = cut_ptrs.len().saturating_sub(1);
        if cut_ptrs.first() != Some(&0)
            || cut_ptrs.last().map(|&p| p as usize) != Some(cut_values.len())
            || cut_ptrs.windows(2).any(|w| w[0] > w[1])
        {
            return Err(DataError::InvalidShape(
                "cut pointers must start at 0, be non-decreasing and end at the number of cuts".into(),
            ));
        }
        if max_values.len() != num_features || num_categories.len() != num_features {
            return Err(DataError::InvalidShape(format!(
                "{num_features} features need as many maxima and category counts, got {} and {}",
                max_values.len(),
                num_categories.len()
            )));
        }

        let mut bin_ptrs = Vec::with_capacity(num_features + 1);
        bin_ptrs.push(0u32);
        let mut total = 0u32;
        for f in 0..num_features {
            let n_bins = match num_categories[f] {
                Some(n) => n,
                None => cut_ptrs[f + 1] - cut_ptrs[f] + 1,
            };
            total = total
                .checked_add(n_bins)
                .ok_or_else(|| DataError::InvalidShape("total number of bins exceeds u32".into()))?;
            bin_ptrs.push(total);
        }

        Ok(Self {
            cut_values: cut_values.into_boxed_slice(),
            cut_ptrs: cut_ptrs.into_boxed_slice(),
            bin_ptrs: bin_ptrs.into_boxed_slice(),
            max_values: max_values.into_boxed_slice(),
            is_categorical: num_categories.iter().map(Option::is_some).collect(),
            num_categories: num_categories.iter().map(|n| n.unwrap_or(0)).collect(),
        })
    }

    /// Exact quantile cuts from every observed value of every feature.
    ///
    /// Each numerical feature gets at most `max_bin - 1` cuts picked at
    /// evenly spaced ranks of its distinct values; a feature with fewer
    /// distinct values than that keeps all of them and is binned losslessly.
    pub fn from_values(
        values: &[Vec<f32>],
        num_categories: &[Option<u32>],
        max_bin: usize,
        n_threads: usize,
    ) -> Result<Self> {
        if values.len() != num_categories.len() {
            return Err(DataError::ColumnMismatch {
                expected: num_categories.len() as u64,
                got: values.len() as u64,
            });
        }
        let max_cuts = max_bin.saturating_sub(1);

        let per_feature: Vec<(Vec<f32>, f32)> = run_with_threads(n_threads, |_| {
            values
                .par_iter()
                .zip(num_categories.par_iter())
                .map(|(column, n_cats)| {
                    if n_cats.is_some() {
                        return (Vec::new(), 0.0);
                    }
                    let mut sorted: Vec<f32> = column.iter().copied().filter(|v| !v.is_nan()).collect();
                    sorted.sort_by(f32::total_cmp);
                    sorted.dedup();
                    let Some(&max_value) = sorted.last() else {
                        return (Vec::new(), 0.0);
                    };

                    let num_cuts = max_cuts.min(sorted.len());
                    let mut cuts = Vec::with_capacity(num_cuts);
                    for i in 1..=num_cuts {
                        let idx = (i * sorted.len() / (num_cuts + 1)).min(sorted.len() - 1);
                        cuts.push(sorted[idx]);
                    }
                    cuts.dedup();
                    (cuts, max_value)
                })
                .collect()
        });

        let mut cut_values = Vec::new();
        let mut cut_ptrs = vec![0u32];
        let mut max_values = Vec::with_capacity(per_feature.len());
        for (cuts, max_value) in per_feature {
            cut_values.extend(cuts);
            cut_ptrs.push(cut_values.len() as u32);
            max_values.push(max_value);
        }
        Self::new(cut_values, cut_ptrs, max_values, num_categories.to_vec())
    }

    #[inline]
    pub fn num_features(&self) -> usize {
        self.bin_ptrs.len() - 1
    }

    #[inline]
    pub fn is_categorical(&self, feature: usize) -> bool {
        self.is_categorical[feature]
    }

    /// Returns 0 for numerical features.
    #[inline]
    pub fn num_categories(&self, feature: usize) -> u32 {
        self.num_categories[feature]
    }

    /// Cut values of one feature; empty for categorical features.
    #[inline]
    pub fn feature_cuts(&self, feature: usize) -> &[f32] {
        let start = self.cut_ptrs[feature] as usize;
        let end = self.cut_ptrs[feature + 1] as usize;
        &self.cut_values[start..end]
    }

    #[inline]
    pub fn num_bins(&self, feature: usize) -> usize {
        (self.bin_ptrs[feature + 1] - self.bin_ptrs[feature]) as usize
    }

    /// Total bins across all features.
    pub fn total_bins(&self) -> usize {
        self.bin_ptrs.last().copied().unwrap_or(0) as usize
    }

    /// Global bin of `value` in `feature`.
    ///
    /// A categorical value must be a known category code.
    pub fn search_bin(&self, feature: usize, value: f32) -> Result<u32> {
        if feature >= self.num_features() {
            return Err(DataError::InvalidShape(format!(
                "feature {feature} is out of range for {} features",
                self.num_features()
            )));
        }
        let local = if self.is_categorical[feature] {
            category_code(feature, value, self.num_categories[feature] as usize)? as u32
        } else {
            let cuts = self.feature_cuts(feature);
            cuts.partition_point(|&c| c < value) as u32
        };
        Ok(self.bin_ptrs[feature] + local)
    }

    /// Feature of a global bin and the value that represents the bin: its
    /// upper cut, the feature maximum for the top bin, or the category code.
    pub fn bin_value(&self, bin: u32) -> Result<(usize, f32)> {
        if bin as usize >= self.total_bins() {
            return Err(DataError::InvalidShape(format!(
                "bin {bin} is out of range for {} bins",
                self.total_bins()
            )));
        }
        let feature = self.bin_ptrs.partition_point(|&p| p <= bin) - 1;
        let local = (bin - self.bin_ptrs[feature]) as usize;
        if self.is_categorical[feature] {
            return Ok((feature, local as f32));
        }
        let cuts = self.feature_cuts(feature);
        let value = cuts.get(local).copied().unwrap_or(self.max_values[feature]);
        Ok((feature, value))
    }
}

/// Validate a categorical value as an index below `n_categories`.
pub(crate) fn category_code(feature: usize, value: f32, n_categories: usize) -> Result<usize> {
    if value >= 0.0 && value.fract() == 0.0 && (value as usize) < n_categories {
        Ok(value as usize)
    } else {
        Err(DataError::UnknownCategory {
            feature,
            category: value.to_string(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
