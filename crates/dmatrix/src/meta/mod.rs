//! Per-dataset metadata.
//!
//! [`MetaInfo`] holds everything about a dataset that is not feature values:
//! shape, labels, weights, query groups, base margins, censoring bounds,
//! feature names and types, and categorical encodings.
//!
//! Fields are either per-row (labels, weights, base margins, bounds),
//! per-group (`group_ptr`, and weights when ranking) or per-column (feature
//! names, types and weights). [`MetaInfo::validate`] checks the three kinds
//! against the row and column counts.

mod binary;
mod feature;
mod field;

pub use binary::{META_VERSION, MIN_META_VERSION, NUM_META_FIELDS};
pub use feature::FeatureType;
pub use field::{ArrayData, ArrayInterface};

use std::sync::Arc;

use ndarray::{concatenate, Array2, Axis};
use rayon::slice::ParallelSliceMut;

use crate::cats::CatContainer;
use crate::collective::{Communicator, ReduceOp};
use crate::context::Device;
use crate::error::{DataError, Result};
use crate::utils::run_with_threads;

/// How a distributed dataset is partitioned across participants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DataSplitMode {
    /// Each participant holds a subset of the rows.
    #[default]
    Row,
    /// Each participant holds a subset of the columns.
    Col,
}

#[derive(Clone, Debug)]
pub struct MetaInfo {
    pub num_row: u64,
    pub num_col: u64,
    pub num_nonzero: u64,
    /// `num_row x n_targets`.
    pub labels: Array2<f32>,
    /// Group boundaries; group `g` covers rows `group_ptr[g]..group_ptr[g + 1]`.
    pub group_ptr: Vec<u32>,
    /// Per-row, or per-group when `weights.len() + 1 == group_ptr.len()`.
    pub weights: Vec<f32>,
    /// `num_row x n_groups`.
    pub base_margin: Array2<f32>,
    pub labels_lower_bound: Vec<f32>,
    pub labels_upper_bound: Vec<f32>,
    pub feature_names: Vec<String>,
    /// Raw type names as given by the user (`int`, `float`, `i`, `q`, `c`).
    pub feature_type_names: Vec<String>,
    pub feature_types: Vec<FeatureType>,
    pub feature_weights: Vec<f32>,
    pub data_split_mode: DataSplitMode,
    has_categorical: bool,
    cats: Arc<CatContainer>,
    device: Device,
    label_order_cache: Vec<usize>,
}

impl Default for MetaInfo {
    fn default() -> Self {
        Self {
            num_row: 0,
            num_col: 0,
            num_nonzero: 0,
            labels: empty_tensor(),
            group_ptr: Vec::new(),
            weights: Vec::new(),
            base_margin: empty_tensor(),
            labels_lower_bound: Vec::new(),
            labels_upper_bound: Vec::new(),
            feature_names: Vec::new(),
            feature_type_names: Vec::new(),
            feature_types: Vec::new(),
            feature_weights: Vec::new(),
            data_split_mode: DataSplitMode::Row,
            has_categorical: false,
            cats: Arc::new(CatContainer::default()),
            device: Device::Cpu,
            label_order_cache: Vec::new(),
        }
    }
}

/// Field-wise equality; caches and device placement are ignored.
impl PartialEq for MetaInfo {
    fn eq(&self, other: &Self) -> bool {
        self.num_row == other.num_row
            && self.num_col == other.num_col
            && self.num_nonzero == other.num_nonzero
            && self.labels == other.labels
            && self.group_ptr == other.group_ptr
            && self.weights == other.weights
            && self.base_margin == other.base_margin
            && self.labels_lower_bound == other.labels_lower_bound
            && self.labels_upper_bound == other.labels_upper_bound
            && self.feature_names == other.feature_names
            && self.feature_type_names == other.feature_type_names
            && self.feature_types == other.feature_types
            && self.feature_weights == other.feature_weights
            && self.data_split_mode == other.data_split_mode
            && self.has_categorical == other.has_categorical
            && *self.cats == *other.cats
    }
}

pub(crate) fn empty_tensor() -> Array2<f32> {
    Array2::zeros((0, 0))
}

impl MetaInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any feature is categorical.
    #[inline]
    pub fn has_categorical(&self) -> bool {
        self.has_categorical
    }

    #[inline]
    pub fn is_column_split(&self) -> bool {
        self.data_split_mode == DataSplitMode::Col
    }

    /// Column split across federated parties.
    pub fn is_vertical_federated(&self, comm: &dyn Communicator) -> bool {
        comm.is_federated() && self.is_column_split()
    }

    /// In vertical federated learning only the first party holds labels.
    pub fn should_have_labels(&self, comm: &dyn Communicator) -> bool {
        !self.is_vertical_federated(comm) || comm.rank() == 0
    }

    /// Where the numeric fields reside.
    #[inline]
    pub fn device(&self) -> Device {
        self.device
    }

    pub fn set_device(&mut self, device: Device) {
        self.device = device;
    }

    #[inline]
    pub fn cats(&self) -> &CatContainer {
        &self.cats
    }

    /// The shared handle to the categorical encodings.
    #[inline]
    pub fn cats_shared(&self) -> Arc<CatContainer> {
        Arc::clone(&self.cats)
    }

    pub fn set_cats(&mut self, cats: Arc<CatContainer>) {
        self.cats = cats;
    }

    /// Reset shape and per-row fields; feature information is kept.
    pub fn clear(&mut self) {
        self.num_row = 0;
        self.num_col = 0;
        self.num_nonzero = 0;
        self.labels = empty_tensor();
        self.group_ptr.clear();
        self.weights.clear();
        self.base_margin = empty_tensor();
        self.labels_lower_bound.clear();
        self.labels_upper_bound.clear();
        self.label_order_cache.clear();
    }

    /// An independent deep copy, categorical encodings included.
    ///
    /// `clone()` instead shares the encodings with the original.
    pub fn copy(&self) -> Self {
        let mut out = self.clone();
        out.cats = Arc::new((*self.cats).clone());
        out
    }

    /// Check every field against the row and column counts, and the field
    /// location against the `device` the caller runs on.
    pub fn validate(&self, device: Device) -> Result<()> {
        if !self.group_ptr.is_empty() && !self.weights.is_empty() {
            if self.weights.len() + 1 != self.group_ptr.len() {
                return Err(DataError::GroupWeightMismatch {
                    groups: self.group_ptr.len() - 1,
                    weights: self.weights.len(),
                });
            }
        } else if let Some(&last) = self.group_ptr.last() {
            if u64::from(last) != self.num_row {
                return Err(DataError::GroupSizeMismatch {
                    expected: self.num_row,
                    got: u64::from(last),
                });
            }
        }

        let per_group_weights = self.weights.len() + 1 == self.group_ptr.len();
        let per_row: [(&'static str, usize); 4] = [
            ("weights", if per_group_weights { 0 } else { self.weights.len() }),
            ("labels", self.labels.nrows()),
            ("labels_lower_bound", self.labels_lower_bound.len()),
            ("labels_upper_bound", self.labels_upper_bound.len()),
        ];
        for (field, len) in per_row {
            check_len(field, len, self.num_row)?;
        }

        if self.labels.iter().any(|v| !v.is_finite()) {
            return Err(DataError::InvalidLabel);
        }
        if self.weights.iter().any(|&w| !(w.is_finite() && w >= 0.0)) {
            return Err(DataError::InvalidWeight);
        }

        if !self.is_column_split() {
            check_len("feature_weights", self.feature_weights.len(), self.num_col)?;
        }

        let capacity = self.num_row.saturating_mul(self.num_col);
        if self.num_nonzero > capacity {
            return Err(DataError::InvalidShape(format!(
                "{} non-missing values exceed a {}x{} matrix",
                self.num_nonzero, self.num_row, self.num_col
            )));
        }

        if !self.base_margin.is_empty()
            && (self.num_row == 0 || self.base_margin.len() as u64 % self.num_row != 0)
        {
            return Err(DataError::InvalidShape(format!(
                "size of base margin ({}) must be a multiple of the number of rows ({})",
                self.base_margin.len(),
                self.num_row
            )));
        }

        if self.has_numeric_fields() && !self.device.is_compatible_with(device) {
            return Err(DataError::DeviceMismatch {
                data: self.device,
                context: device,
            });
        }
        Ok(())
    }

    fn has_numeric_fields(&self) -> bool {
        !self.labels.is_empty()
            || !self.weights.is_empty()
            || !self.base_margin.is_empty()
            || !self.labels_lower_bound.is_empty()
            || !self.labels_upper_bound.is_empty()
            || !self.feature_weights.is_empty()
    }

    /// A new `MetaInfo` holding only rows `ridxs`, in that order.
    ///
    /// Per-row fields are gathered, per-column fields copied. Query groups
    /// are rebuilt from the groups of the selected rows; consecutive rows of
    /// the same group stay in one group. `num_nonzero` is taken from `nnz`.
    pub fn slice(&self, ridxs: &[usize], nnz: u64) -> Result<MetaInfo> {
        let mut out = MetaInfo {
            num_row: ridxs.len() as u64,
            num_col: self.num_col,
            num_nonzero: nnz,
            feature_names: self.feature_names.clone(),
            feature_type_names: self.feature_type_names.clone(),
            feature_types: self.feature_types.clone(),
            feature_weights: self.feature_weights.clone(),
            data_split_mode: self.data_split_mode,
            has_categorical: self.has_categorical,
            cats: Arc::clone(&self.cats),
            device: self.device,
            ..Default::default()
        };

        out.labels = gather_rows("labels", &self.labels, ridxs)?;
        out.base_margin = gather_rows("base_margin", &self.base_margin, ridxs)?;
        out.labels_lower_bound = gather("labels_lower_bound", &self.labels_lower_bound, ridxs)?;
        out.labels_upper_bound = gather("labels_upper_bound", &self.labels_upper_bound, ridxs)?;

        let per_group_weights = self.weights.len() + 1 == self.group_ptr.len();
        if self.group_ptr.len() > 1 {
            let (group_ptr, groups) = slice_groups(&self.group_ptr, ridxs)?;
            out.group_ptr = group_ptr;
            if per_group_weights {
                out.weights = gather("weights", &self.weights, &groups)?;
            }
        }
        if !per_group_weights {
            out.weights = gather("weights", &self.weights, ridxs)?;
        }
        Ok(out)
    }

    /// Append the rows of `that` after the rows of `self`.
    ///
    /// With `accumulate_rows` the row and non-missing counts are summed.
    /// With `check_column` both sides must agree on the column count and on
    /// the types of the columns they both describe. The column count and
    /// feature information are taken from `that` where it provides them.
    ///
    /// Every check runs before anything is written: on error `self` is
    /// unchanged.
    pub fn extend(&mut self, that: &MetaInfo, accumulate_rows: bool, check_column: bool) -> Result<()> {
        if self.num_col != 0 && check_column && self.num_col != that.num_col {
            return Err(DataError::ColumnMismatch {
                expected: self.num_col,
                got: that.num_col,
            });
        }
        if check_column && !self.feature_types.is_empty() && !that.feature_types.is_empty() {
            for (column, (a, b)) in self.feature_types.iter().zip(&that.feature_types).enumerate() {
                if a != b {
                    return Err(DataError::FeatureTypeMismatch {
                        column,
                        expected: a.name(),
                        got: b.name(),
                    });
                }
            }
        }
        let parsed_types = if that.feature_type_names.is_empty() {
            None
        } else {
            Some(feature::load_feature_types(&that.feature_type_names)?)
        };

        let shifted_groups: Vec<u32> = if self.group_ptr.is_empty() || that.group_ptr.is_empty() {
            if !self.group_ptr.is_empty() && that.num_row != 0 {
                return Err(DataError::InvalidGroup(
                    "a batch without query groups follows a batch with groups".into(),
                ));
            }
            Vec::new()
        } else {
            let top = self.group_ptr.last().copied().unwrap_or(0);
            that.group_ptr[1..]
                .iter()
                .map(|&p| {
                    top.checked_add(p)
                        .ok_or_else(|| DataError::InvalidGroup("group boundary exceeds u32 range".into()))
                })
                .collect::<Result<_>>()?
        };
        let labels = stacked("labels", &self.labels, &that.labels)?;
        let base_margin = stacked("base_margin", &self.base_margin, &that.base_margin)?;

        if accumulate_rows {
            self.num_row += that.num_row;
            self.num_nonzero += that.num_nonzero;
        }
        self.num_col = that.num_col;

        if let Some(labels) = labels {
            self.labels = labels;
        }
        if let Some(base_margin) = base_margin {
            self.base_margin = base_margin;
        }
        self.weights.extend_from_slice(&that.weights);
        self.labels_lower_bound.extend_from_slice(&that.labels_lower_bound);
        self.labels_upper_bound.extend_from_slice(&that.labels_upper_bound);

        if self.group_ptr.is_empty() {
            self.group_ptr.clone_from(&that.group_ptr);
        } else {
            self.group_ptr.extend(shifted_groups);
        }

        if !that.feature_names.is_empty() {
            self.feature_names.clone_from(&that.feature_names);
        }
        if let Some((types, has_cat)) = parsed_types {
            self.feature_type_names.clone_from(&that.feature_type_names);
            self.feature_types = types;
            self.has_categorical = has_cat;
        } else if !that.feature_types.is_empty() {
            self.feature_types.clone_from(&that.feature_types);
            self.has_categorical = that.feature_types.contains(&FeatureType::Categorical);
        }
        if !that.feature_weights.is_empty() {
            self.feature_weights.clone_from(&that.feature_weights);
        }
        if !that.cats.is_empty() {
            self.cats = Arc::clone(&that.cats);
        }
        self.label_order_cache.clear();
        Ok(())
    }

    /// Reconcile the column count across participants: summed for column
    /// split, maximum for row split.
    pub fn synchronize_number_of_columns(
        &mut self,
        comm: &dyn Communicator,
        split_mode: DataSplitMode,
    ) -> Result<()> {
        self.data_split_mode = split_mode;
        let op = if self.is_column_split() {
            ReduceOp::Sum
        } else {
            ReduceOp::Max
        };
        let mut n = [self.num_col];
        comm.allreduce_u64(&mut n, op)?;
        self.num_col = n[0];
        Ok(())
    }

    /// Label indices ordered by absolute label value (stable).
    ///
    /// The order is cached until the labels change size.
    pub fn label_abs_sort(&mut self, n_threads: usize) -> &[usize] {
        let n = self.labels.len();
        if self.label_order_cache.len() != n {
            let labels: Vec<f32> = self.labels.iter().map(|l| l.abs()).collect();
            let mut order: Vec<usize> = (0..n).collect();
            run_with_threads(n_threads, |par| {
                let cmp = |a: &usize, b: &usize| labels[*a].total_cmp(&labels[*b]);
                if par.is_parallel() {
                    order.par_sort_by(cmp);
                } else {
                    order.sort_by(cmp);
                }
            });
            self.label_order_cache = order;
        }
        &self.label_order_cache
    }
}

fn check_len(field: &'static str, len: usize, expected: u64) -> Result<()> {
    if len != 0 && len as u64 != expected {
        return Err(DataError::LengthMismatch {
            field,
            expected,
            got: len as u64,
        });
    }
    Ok(())
}

fn out_of_range(field: &str, idx: usize, len: usize) -> DataError {
    DataError::InvalidShape(format!("index {idx} is out of range for {field} of length {len}"))
}

fn gather<T: Copy>(field: &str, src: &[T], idxs: &[usize]) -> Result<Vec<T>> {
    if src.is_empty() {
        return Ok(Vec::new());
    }
    idxs.iter()
        .map(|&i| src.get(i).copied().ok_or_else(|| out_of_range(field, i, src.len())))
        .collect()
}

fn gather_rows(field: &str, src: &Array2<f32>, ridxs: &[usize]) -> Result<Array2<f32>> {
    if src.is_empty() {
        return Ok(empty_tensor());
    }
    if let Some(&bad) = ridxs.iter().find(|&&r| r >= src.nrows()) {
        return Err(out_of_range(field, bad, src.nrows()));
    }
    Ok(src.select(Axis(0), ridxs))
}

/// `src` stacked under `dst`, or `None` when `src` adds nothing.
fn stacked(field: &str, dst: &Array2<f32>, src: &Array2<f32>) -> Result<Option<Array2<f32>>> {
    if src.is_empty() {
        return Ok(None);
    }
    if dst.is_empty() {
        return Ok(Some(src.clone()));
    }
    concatenate(Axis(0), &[dst.view(), src.view()])
        .map(Some)
        .map_err(|err| {
            DataError::InvalidShape(format!(
                "cannot stack {field} of shape {:?} onto {:?}: {err}",
                src.shape(),
                dst.shape()
            ))
        })
}

/// Rebuild group boundaries for the selected rows, returning them together
/// with the source group of every new group.
fn slice_groups(group_ptr: &[u32], ridxs: &[usize]) -> Result<(Vec<u32>, Vec<usize>)> {
    let n_rows = group_ptr.last().copied().unwrap_or(0) as usize;
    let mut ptr = vec![0u32];
    let mut groups: Vec<usize> = Vec::new();
    for (i, &r) in ridxs.iter().enumerate() {
        if r >= n_rows {
            return Err(out_of_range("group_ptr", r, n_rows));
        }
        let g = group_ptr.partition_point(|&p| p as usize <= r) - 1;
        if groups.last() != Some(&g) {
            if i > 0 {
                ptr.push(i as u32);
            }
            groups.push(g);
        }
    }
    if !ridxs.is_empty() {
        ptr.push(ridxs.len() as u32);
    }
    Ok((ptr, groups))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cats::Categories;
    use ndarray::array;

    fn ranked() -> MetaInfo {
        let mut info = MetaInfo::new();
        info.num_row = 5;
        info.num_col = 2;
        info.labels = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        info.group_ptr = vec![0, 2, 5];
        info.weights = vec![0.5, 2.0];
        info
    }

    #[test]
    fn group_weights_must_match_group_count() {
        let mut info = ranked();
        assert!(info.validate(Device::Cpu).is_ok());
        info.weights = vec![1.0, 1.0, 1.0];
        assert!(matches!(
            info.validate(Device::Cpu),
            Err(DataError::GroupWeightMismatch { groups: 2, weights: 3 })
        ));
    }

    #[test]
    fn group_weights_pass_without_row_count() {
        let mut info = MetaInfo::new();
        info.group_ptr = vec![0, 2, 5];
        info.weights = vec![1.0, 1.0];
        assert!(info.validate(Device::Cpu).is_ok());
    }

    #[test]
    fn groups_must_cover_all_rows() {
        let mut info = ranked();
        info.weights.clear();
        info.num_row = 6;
        info.labels = Array2::zeros((6, 1));
        assert!(matches!(
            info.validate(Device::Cpu),
            Err(DataError::GroupSizeMismatch { expected: 6, got: 5 })
        ));
    }

    #[test]
    fn per_row_fields_must_match_rows() {
        let mut info = MetaInfo::new();
        info.num_row = 3;
        info.num_col = 1;
        info.weights = vec![1.0, 1.0];
        assert!(matches!(
            info.validate(Device::Cpu),
            Err(DataError::LengthMismatch { field: "weights", expected: 3, got: 2 })
        ));
    }

    #[test]
    fn feature_weights_deferred_for_column_split() {
        let mut info = MetaInfo::new();
        info.num_col = 4;
        info.feature_weights = vec![1.0, 2.0];
        assert!(info.validate(Device::Cpu).is_err());
        info.data_split_mode = DataSplitMode::Col;
        assert!(info.validate(Device::Cpu).is_ok());
    }

    #[test]
    fn nonzero_and_margin_checks() {
        let mut info = MetaInfo::new();
        info.num_row = 2;
        info.num_col = 2;
        info.num_nonzero = 5;
        assert!(matches!(info.validate(Device::Cpu), Err(DataError::InvalidShape(_))));
        info.num_nonzero = 4;
        info.base_margin = Array2::zeros((1, 3));
        assert!(matches!(info.validate(Device::Cpu), Err(DataError::InvalidShape(_))));
        info.base_margin = Array2::zeros((2, 3));
        assert!(info.validate(Device::Cpu).is_ok());
    }

    #[test]
    fn device_mismatch_is_reported() {
        let mut info = ranked();
        info.set_device(Device::Cuda(1));
        assert!(info.validate(Device::Cpu).is_ok());
        assert!(info.validate(Device::Cuda(1)).is_ok());
        assert!(matches!(
            info.validate(Device::Cuda(0)),
            Err(DataError::DeviceMismatch { .. })
        ));
    }

    #[test]
    fn slice_gathers_rows_and_groups() {
        let info = ranked();
        let out = info.slice(&[1, 3, 4], 6).unwrap();
        assert_eq!(out.num_row, 3);
        assert_eq!(out.num_nonzero, 6);
        assert_eq!(out.labels, array![[2.0], [4.0], [5.0]]);
        assert_eq!(out.group_ptr, vec![0, 1, 3]);
        assert_eq!(out.weights, vec![0.5, 2.0]);
        assert!(out.validate(Device::Cpu).is_ok());
    }

    #[test]
    fn slice_multi_target_labels() {
        let mut info = MetaInfo::new();
        info.num_row = 3;
        info.labels = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0]];
        info.weights = vec![0.1, 0.2, 0.3];
        let out = info.slice(&[2, 0], 0).unwrap();
        assert_eq!(out.labels, array![[3.0, 30.0], [1.0, 10.0]]);
        assert_eq!(out.weights, vec![0.3, 0.1]);
        assert!(info.slice(&[3], 0).is_err());
    }

    #[test]
    fn extend_shifts_groups_and_stacks_labels() {
        let mut a = ranked();
        let mut b = MetaInfo::new();
        b.num_row = 2;
        b.num_col = 2;
        b.labels = array![[6.0], [7.0]];
        b.group_ptr = vec![0, 2];
        b.weights = vec![3.0];
        a.extend(&b, true, true).unwrap();
        assert_eq!(a.num_row, 7);
        assert_eq!(a.group_ptr, vec![0, 2, 5, 7]);
        assert_eq!(a.weights, vec![0.5, 2.0, 3.0]);
        assert_eq!(a.labels.nrows(), 7);
        assert!(a.validate(Device::Cpu).is_ok());
    }

    #[test]
    fn extend_checks_columns() {
        let mut a = ranked();
        let mut b = MetaInfo::new();
        b.num_col = 3;
        assert!(matches!(
            a.extend(&b, true, true),
            Err(DataError::ColumnMismatch { expected: 2, got: 3 })
        ));
        assert!(a.extend(&b, true, false).is_ok());
        assert_eq!(a.num_col, 3);
    }

    #[test]
    fn extend_checks_feature_types() {
        let mut a = MetaInfo::new();
        a.feature_types = vec![FeatureType::Numerical, FeatureType::Categorical];
        let mut b = MetaInfo::new();
        b.feature_types = vec![FeatureType::Numerical, FeatureType::Numerical];
        assert!(matches!(
            a.extend(&b, true, true),
            Err(DataError::FeatureTypeMismatch { column: 1, .. })
        ));
    }

    #[test]
    fn extend_takes_feature_info_from_the_batch() {
        let mut a = MetaInfo::new();
        a.num_col = 1;
        a.set_feature_info("feature_type", &["c"]).unwrap();
        assert!(a.has_categorical());
        let mut b = MetaInfo::new();
        b.num_col = 2;
        b.feature_types = vec![FeatureType::Numerical, FeatureType::Numerical];
        a.extend(&b, true, false).unwrap();
        assert_eq!(a.num_col, 2);
        assert_eq!(a.feature_types, b.feature_types);
        assert!(!a.has_categorical());
    }

    #[test]
    fn copy_is_deep_clone_is_shared() {
        let mut info = ranked();
        info.set_cats(Arc::new(CatContainer::new(vec![Categories::Int(vec![1, 2])])));
        let shared = info.clone();
        let deep = info.copy();
        assert!(Arc::ptr_eq(&info.cats_shared(), &shared.cats_shared()));
        assert!(!Arc::ptr_eq(&info.cats_shared(), &deep.cats_shared()));
        assert_eq!(deep, info);
    }

    #[test]
    fn label_abs_sort_is_stable() {
        let mut info = MetaInfo::new();
        info.labels = array![[-3.0], [1.0], [-1.0], [2.0]];
        assert_eq!(info.label_abs_sort(2), &[1, 2, 3, 0]);
        info.labels = array![[0.5], [-0.1]];
        assert_eq!(info.label_abs_sort(1), &[1, 0]);
    }

    #[test]
    fn clear_keeps_feature_info() {
        let mut info = ranked();
        info.feature_names = vec!["a".into(), "b".into()];
        info.clear();
        assert_eq!(info.num_row, 0);
        assert!(info.labels.is_empty());
        assert!(info.group_ptr.is_empty());
        assert_eq!(info.feature_names.len(), 2);
    }
}
