//! String-keyed numeric field protocol.
//!
//! | Key | Stored in | Input check |
//! |-----|-----------|-------------|
//! | `label` | `labels` | no NaN or infinity |
//! | `weight` | `weights` | non-negative, finite |
//! | `base_margin` | `base_margin` | |
//! | `group` | `group_ptr` | per-group sizes, prefix-summed |
//! | `qid` | `group_ptr` | non-decreasing, run-length encoded |
//! | `label_lower_bound` | `labels_lower_bound` | |
//! | `label_upper_bound` | `labels_upper_bound` | |
//! | `feature_weights` | `feature_weights` | strictly positive |

use std::borrow::Cow;

use ndarray::Array2;

use super::MetaInfo;
use crate::context::Device;
use crate::error::{DataError, Result};

/// Typed, borrowed element buffer.
#[derive(Clone, Copy, Debug)]
pub enum ArrayData<'a> {
    F32(&'a [f32]),
    F64(&'a [f64]),
    I32(&'a [i32]),
    I64(&'a [i64]),
    U32(&'a [u32]),
    U64(&'a [u64]),
}

impl ArrayData<'_> {
    pub fn len(&self) -> usize {
        match self {
            ArrayData::F32(v) => v.len(),
            ArrayData::F64(v) => v.len(),
            ArrayData::I32(v) => v.len(),
            ArrayData::I64(v) => v.len(),
            ArrayData::U32(v) => v.len(),
            ArrayData::U64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            ArrayData::F32(_) => "float32",
            ArrayData::F64(_) => "float64",
            ArrayData::I32(_) => "int32",
            ArrayData::I64(_) => "int64",
            ArrayData::U32(_) => "uint32",
            ArrayData::U64(_) => "uint64",
        }
    }

    fn is_integer(&self) -> bool {
        !matches!(self, ArrayData::F32(_) | ArrayData::F64(_))
    }

    fn to_f32(self) -> Vec<f32> {
        match self {
            ArrayData::F32(v) => v.to_vec(),
            ArrayData::F64(v) => v.iter().map(|&x| x as f32).collect(),
            ArrayData::I32(v) => v.iter().map(|&x| x as f32).collect(),
            ArrayData::I64(v) => v.iter().map(|&x| x as f32).collect(),
            ArrayData::U32(v) => v.iter().map(|&x| x as f32).collect(),
            ArrayData::U64(v) => v.iter().map(|&x| x as f32).collect(),
        }
    }

    /// Integer elements as `i64`; `None` for float buffers or `u64` overflow.
    fn to_i64(self) -> Option<Vec<i64>> {
        match self {
            ArrayData::I32(v) => Some(v.iter().map(|&x| i64::from(x)).collect()),
            ArrayData::I64(v) => Some(v.to_vec()),
            ArrayData::U32(v) => Some(v.iter().map(|&x| i64::from(x)).collect()),
            ArrayData::U64(v) => v.iter().map(|&x| i64::try_from(x).ok()).collect(),
            ArrayData::F32(_) | ArrayData::F64(_) => None,
        }
    }
}

/// A self-describing array handle: data, shape and residency.
///
/// ```
/// use dmatrix::meta::{ArrayInterface, MetaInfo};
///
/// let mut info = MetaInfo::new();
/// info.set_info("label", ArrayInterface::vector(&[1.0f32, 0.0, 1.0][..])).unwrap();
/// assert_eq!(info.labels.shape(), &[3, 1]);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct ArrayInterface<'a> {
    pub data: ArrayData<'a>,
    /// `(rows, columns)`; a vector has one column.
    pub shape: (usize, usize),
    pub device: Device,
}

impl<'a> ArrayInterface<'a> {
    pub fn vector(data: impl Into<ArrayData<'a>>) -> Self {
        let data = data.into();
        Self {
            shape: (data.len(), 1),
            data,
            device: Device::Cpu,
        }
    }

    pub fn matrix(data: impl Into<ArrayData<'a>>, rows: usize, cols: usize) -> Result<Self> {
        let data = data.into();
        if rows * cols != data.len() {
            return Err(DataError::InvalidShape(format!(
                "{} elements cannot form a {rows}x{cols} array",
                data.len()
            )));
        }
        Ok(Self {
            data,
            shape: (rows, cols),
            device: Device::Cpu,
        })
    }

    /// Mark the buffer as resident on `device`.
    pub fn on_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    fn as_vector(&self, key: &str) -> Result<ArrayData<'a>> {
        if self.shape.1 > 1 && self.shape.0 > 1 {
            return Err(DataError::InvalidShape(format!(
                "`{key}` expects a vector, got shape {:?}",
                self.shape
            )));
        }
        Ok(self.data)
    }

    fn as_tensor(&self) -> Result<Array2<f32>> {
        Array2::from_shape_vec(self.shape, self.data.to_f32())
            .map_err(|err| DataError::InvalidShape(err.to_string()))
    }
}

macro_rules! impl_from_slice {
    ($($t:ty => $v:ident),*) => {$(
        impl<'a> From<&'a [$t]> for ArrayData<'a> {
            fn from(s: &'a [$t]) -> Self {
                ArrayData::$v(s)
            }
        }
    )*};
}

impl_from_slice!(f32 => F32, f64 => F64, i32 => I32, i64 => I64, u32 => U32, u64 => U64);

impl MetaInfo {
    /// Set a numeric field from a typed array.
    ///
    /// The whole array is checked before the field is replaced; on error the
    /// field keeps its previous value.
    pub fn set_info(&mut self, key: &str, array: ArrayInterface<'_>) -> Result<()> {
        if array.device.is_cuda() {
            return Err(DataError::GpuUnsupported);
        }
        match key {
            "label" => {
                let labels = self.reshape_to_rows(key, array.as_tensor()?)?;
                if labels.iter().any(|l| !l.is_finite()) {
                    return Err(DataError::InvalidLabel);
                }
                self.labels = labels;
                self.label_order_cache.clear();
            }
            "weight" => {
                let weights = array.as_vector(key)?.to_f32();
                if weights.iter().any(|&w| !(w >= 0.0 && w.is_finite())) {
                    return Err(DataError::InvalidWeight);
                }
                self.weights = weights;
            }
            "base_margin" => {
                self.base_margin = self.reshape_to_rows(key, array.as_tensor()?)?;
            }
            "group" => {
                let sizes = integer_vector(key, &array)?;
                self.group_ptr = group_ptr_from_sizes(&sizes)?;
            }
            "qid" => {
                let qids = integer_vector(key, &array)?;
                self.group_ptr = group_ptr_from_qids(&qids)?;
            }
            "label_lower_bound" => {
                self.labels_lower_bound = array.as_vector(key)?.to_f32();
            }
            "label_upper_bound" => {
                self.labels_upper_bound = array.as_vector(key)?.to_f32();
            }
            "feature_weights" => {
                let weights = array.as_vector(key)?.to_f32();
                if weights.iter().any(|&w| !(w > 0.0)) {
                    return Err(DataError::InvalidFeatureWeight);
                }
                self.feature_weights = weights;
            }
            other => {
                return Err(DataError::UnknownKey {
                    kind: "info",
                    key: other.to_string(),
                })
            }
        }
        Ok(())
    }

    /// A tensor whose row count differs from `num_row` is read as flat
    /// row-major data and reshaped to `(num_row, len / num_row)`.
    fn reshape_to_rows(&self, key: &str, tensor: Array2<f32>) -> Result<Array2<f32>> {
        let n = self.num_row as usize;
        if n == 0 || tensor.is_empty() || tensor.nrows() == n {
            return Ok(tensor);
        }
        if tensor.len() % n != 0 {
            return Err(DataError::InvalidShape(format!(
                "size of {key} ({}) must be a multiple of the number of rows ({n})",
                tensor.len()
            )));
        }
        let width = tensor.len() / n;
        let flat: Vec<f32> = tensor.iter().copied().collect();
        Array2::from_shape_vec((n, width), flat).map_err(|err| DataError::InvalidShape(err.to_string()))
    }

    /// Read a float field: `label`, `weight`, `base_margin`,
    /// `label_lower_bound`, `label_upper_bound` or `feature_weights`.
    ///
    /// Tensors are returned flattened in row-major order.
    pub fn get_float_info(&self, key: &str) -> Result<Cow<'_, [f32]>> {
        Ok(match key {
            "label" => flatten(&self.labels),
            "weight" => Cow::Borrowed(self.weights.as_slice()),
            "base_margin" => flatten(&self.base_margin),
            "label_lower_bound" => Cow::Borrowed(self.labels_lower_bound.as_slice()),
            "label_upper_bound" => Cow::Borrowed(self.labels_upper_bound.as_slice()),
            "feature_weights" => Cow::Borrowed(self.feature_weights.as_slice()),
            "group_ptr" => {
                return Err(DataError::UnsupportedDtype {
                    key: key.to_string(),
                    dtype: "float32",
                })
            }
            other => {
                return Err(DataError::UnknownKey {
                    kind: "float info",
                    key: other.to_string(),
                })
            }
        })
    }

    /// Read an unsigned field: only `group_ptr`.
    pub fn get_uint_info(&self, key: &str) -> Result<&[u32]> {
        match key {
            "group_ptr" => Ok(&self.group_ptr),
            "label" | "weight" | "base_margin" | "label_lower_bound" | "label_upper_bound"
            | "feature_weights" => Err(DataError::UnsupportedDtype {
                key: key.to_string(),
                dtype: "uint32",
            }),
            other => Err(DataError::UnknownKey {
                kind: "uint info",
                key: other.to_string(),
            }),
        }
    }
}

fn flatten(t: &Array2<f32>) -> Cow<'_, [f32]> {
    match t.as_slice() {
        Some(s) => Cow::Borrowed(s),
        None => Cow::Owned(t.iter().copied().collect()),
    }
}

fn integer_vector(key: &str, array: &ArrayInterface<'_>) -> Result<Vec<i64>> {
    let data = array.as_vector(key)?;
    if !data.is_integer() {
        return Err(DataError::UnsupportedDtype {
            key: key.to_string(),
            dtype: data.dtype(),
        });
    }
    data.to_i64().ok_or_else(|| DataError::InvalidGroup(format!("`{key}` exceeds the i64 range")))
}

/// Prefix-sum per-group sizes into strictly increasing boundaries.
fn group_ptr_from_sizes(sizes: &[i64]) -> Result<Vec<u32>> {
    let mut ptr = Vec::with_capacity(sizes.len() + 1);
    ptr.push(0u32);
    let mut total = 0u64;
    for (g, &size) in sizes.iter().enumerate() {
        if size <= 0 {
            return Err(DataError::InvalidGroup(format!(
                "group {g} has size {size}, group sizes must be positive"
            )));
        }
        total += size as u64;
        let bound = u32::try_from(total).map_err(|_| {
            DataError::InvalidGroup(format!("total group size {total} exceeds the u32 range"))
        })?;
        ptr.push(bound);
    }
    Ok(ptr)
}

/// Run-length encode sorted query ids into group boundaries.
fn group_ptr_from_qids(qids: &[i64]) -> Result<Vec<u32>> {
    if let Some(row) = qids.windows(2).position(|w| w[1] < w[0]) {
        return Err(DataError::QidNotSorted { row: row + 1 });
    }
    let to_u32 = |i: usize| {
        u32::try_from(i)
            .map_err(|_| DataError::InvalidGroup(format!("row {i} exceeds the u32 range")))
    };
    let mut ptr = vec![0u32];
    for i in 1..qids.len() {
        if qids[i] != qids[i - 1] {
            ptr.push(to_u32(i)?);
        }
    }
    if !qids.is_empty() {
        ptr.push(to_u32(qids.len())?);
    }
    Ok(ptr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn vec_f32(v: &[f32]) -> ArrayInterface<'_> {
        ArrayInterface::vector(v)
    }

    #[rstest]
    #[case(f32::NAN)]
    #[case(f32::INFINITY)]
    #[case(f32::NEG_INFINITY)]
    fn labels_reject_non_finite(#[case] bad: f32) {
        let mut info = MetaInfo::new();
        let labels = [1.0, bad];
        assert!(matches!(info.set_info("label", vec_f32(&labels)), Err(DataError::InvalidLabel)));
        assert!(info.labels.is_empty());
    }

    #[test]
    fn too_large_label_overflows_to_infinity() {
        let mut info = MetaInfo::new();
        let labels = [1e300f64];
        let err = info.set_info("label", ArrayInterface::vector(&labels[..])).unwrap_err();
        assert!(matches!(err, DataError::InvalidLabel));
    }

    #[test]
    fn multi_target_labels_keep_shape() {
        let mut info = MetaInfo::new();
        let labels = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        info.set_info("label", ArrayInterface::matrix(&labels[..], 3, 2).unwrap()).unwrap();
        assert_eq!(info.labels.shape(), &[3, 2]);
        assert_eq!(info.get_float_info("label").unwrap().as_ref(), &labels);
    }

    #[test]
    fn flat_margin_is_reshaped_to_rows() {
        let mut info = MetaInfo::new();
        info.num_row = 2;
        info.set_info("base_margin", vec_f32(&[10.0, 11.0, 20.0, 21.0])).unwrap();
        assert_eq!(info.base_margin.shape(), &[2, 2]);
        assert!(info.validate(Device::Cpu).is_ok());
        let second = info.slice(&[1], 0).unwrap();
        assert_eq!(second.base_margin.row(0).to_vec(), vec![20.0, 21.0]);
    }

    #[test]
    fn flat_multi_target_labels_are_reshaped_to_rows() {
        let mut info = MetaInfo::new();
        info.num_row = 2;
        info.set_info("label", vec_f32(&[1.0, 2.0, 3.0, 4.0])).unwrap();
        assert_eq!(info.labels.shape(), &[2, 2]);
        assert!(info.validate(Device::Cpu).is_ok());

        let before = info.clone();
        assert!(matches!(
            info.set_info("label", vec_f32(&[1.0, 2.0, 3.0])),
            Err(DataError::InvalidShape(_))
        ));
        assert_eq!(info, before);
    }

    #[rstest]
    #[case(-1.0)]
    #[case(f32::NAN)]
    #[case(f32::INFINITY)]
    fn weights_reject_invalid(#[case] bad: f32) {
        let mut info = MetaInfo::new();
        let w = [1.0, bad];
        assert!(matches!(info.set_info("weight", vec_f32(&w)), Err(DataError::InvalidWeight)));
    }

    #[test]
    fn zero_weight_is_allowed() {
        let mut info = MetaInfo::new();
        info.set_info("weight", vec_f32(&[0.0, 2.0])).unwrap();
        assert_eq!(info.weights, vec![0.0, 2.0]);
    }

    #[test]
    fn feature_weights_must_be_positive() {
        let mut info = MetaInfo::new();
        let err = info.set_info("feature_weights", vec_f32(&[1.0, 0.0])).unwrap_err();
        assert!(matches!(err, DataError::InvalidFeatureWeight));
        info.set_info("feature_weights", vec_f32(&[1.0, 0.5])).unwrap();
    }

    #[test]
    fn group_sizes_are_prefix_summed() {
        let mut info = MetaInfo::new();
        let sizes = [2u32, 3];
        info.set_info("group", ArrayInterface::vector(&sizes[..])).unwrap();
        assert_eq!(info.get_uint_info("group_ptr").unwrap(), &[0, 2, 5]);

        let empty_group = [2i64, 0, 1];
        assert!(matches!(
            info.set_info("group", ArrayInterface::vector(&empty_group[..])),
            Err(DataError::InvalidGroup(_))
        ));
        assert_eq!(info.group_ptr, vec![0, 2, 5]);
    }

    #[test]
    fn float_groups_are_rejected() {
        let mut info = MetaInfo::new();
        assert!(matches!(
            info.set_info("group", vec_f32(&[2.0])),
            Err(DataError::UnsupportedDtype { dtype: "float32", .. })
        ));
    }

    #[test]
    fn qid_is_run_length_encoded() {
        let mut info = MetaInfo::new();
        let qid = [3u64, 3, 5, 5, 5, 9];
        info.set_info("qid", ArrayInterface::vector(&qid[..])).unwrap();
        assert_eq!(info.group_ptr, vec![0, 2, 5, 6]);

        let unsorted = [1i32, 2, 1];
        assert!(matches!(
            info.set_info("qid", ArrayInterface::vector(&unsorted[..])),
            Err(DataError::QidNotSorted { row: 2 })
        ));
    }

    #[test]
    fn device_arrays_are_unsupported() {
        let mut info = MetaInfo::new();
        let labels = [1.0f32];
        let array = ArrayInterface::vector(&labels[..]).on_device(Device::Cuda(0));
        assert!(matches!(info.set_info("label", array), Err(DataError::GpuUnsupported)));
    }

    #[test]
    fn unknown_keys() {
        let mut info = MetaInfo::new();
        assert!(matches!(
            info.set_info("labels", vec_f32(&[1.0])),
            Err(DataError::UnknownKey { kind: "info", .. })
        ));
        assert!(matches!(info.get_float_info("foo"), Err(DataError::UnknownKey { .. })));
        assert!(matches!(info.get_uint_info("label"), Err(DataError::UnsupportedDtype { .. })));
    }

    #[test]
    fn matrix_vector_mismatch() {
        let mut info = MetaInfo::new();
        let w = [1.0f32, 2.0, 3.0, 4.0];
        let array = ArrayInterface::matrix(&w[..], 2, 2).unwrap();
        assert!(matches!(info.set_info("weight", array), Err(DataError::InvalidShape(_))));
    }
}
