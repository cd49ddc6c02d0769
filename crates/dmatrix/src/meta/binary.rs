//! Versioned binary encoding of [`MetaInfo`].
//!
//! # Layout
//!
//! ```text
//! u32 major, u32 minor, u32 patch
//! u64 field count
//! per field:
//!   name      u64 length + UTF-8
//!   type      u8  (1 = f32, 2 = f64, 3 = u32, 4 = u64, 5 = str)
//!   is_scalar u8
//!   scalar:   the value
//!   vector:   u64 rows, u64 cols, u64 length, elements
//! ```
//!
//! Fields are written in a fixed order. A reader accepts extra fields after
//! the known ones and skips them.

use std::io::{Read, Write};
use std::sync::Arc;

use ndarray::Array2;

use super::feature::load_feature_types;
use super::{empty_tensor, MetaInfo};
use crate::cats::CatContainer;
use crate::error::{FormatError, Result};
use crate::stream::{
    read_bool, read_pod, read_string, read_strings, read_vec, write_bool, write_pod, write_string,
    write_strings, write_vec, Pod,
};

/// Format version written by [`MetaInfo::save_binary`].
pub const META_VERSION: (u32, u32, u32) = (1, 1, 0);
/// Oldest `(major, minor)` accepted by [`MetaInfo::load_binary`].
pub const MIN_META_VERSION: (u32, u32) = (1, 1);
/// Number of fields in the current version.
pub const NUM_META_FIELDS: u64 = 13;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum DataType {
    Float32 = 1,
    Double = 2,
    UInt32 = 3,
    UInt64 = 4,
    Str = 5,
}

impl DataType {
    fn from_u8(tag: u8) -> Result<Self, FormatError> {
        match tag {
            1 => Ok(DataType::Float32),
            2 => Ok(DataType::Double),
            3 => Ok(DataType::UInt32),
            4 => Ok(DataType::UInt64),
            5 => Ok(DataType::Str),
            other => Err(FormatError::UnknownType(other)),
        }
    }

    fn size(self) -> Option<usize> {
        match self {
            DataType::Float32 | DataType::UInt32 => Some(4),
            DataType::Double | DataType::UInt64 => Some(8),
            DataType::Str => None,
        }
    }
}

fn kind(is_scalar: bool) -> &'static str {
    if is_scalar {
        "scalar"
    } else {
        "vector"
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

fn write_field_header<W: Write>(w: &mut W, name: &str, ty: DataType, is_scalar: bool) -> Result<()> {
    write_string(w, name)?;
    write_pod(w, ty as u8)?;
    write_bool(w, is_scalar)
}

fn write_scalar<W: Write>(w: &mut W, name: &str, value: u64) -> Result<()> {
    write_field_header(w, name, DataType::UInt64, true)?;
    write_pod(w, value)
}

fn write_vector<W: Write, T: Pod>(
    w: &mut W,
    name: &str,
    ty: DataType,
    shape: (usize, usize),
    values: &[T],
) -> Result<()> {
    write_field_header(w, name, ty, false)?;
    write_pod(w, shape.0 as u64)?;
    write_pod(w, shape.1 as u64)?;
    write_vec(w, values)
}

fn write_tensor<W: Write>(w: &mut W, name: &str, tensor: &Array2<f32>) -> Result<()> {
    let flat: Vec<f32> = tensor.iter().copied().collect();
    write_vector(w, name, DataType::Float32, tensor.dim(), &flat)
}

fn write_string_vector<W: Write>(w: &mut W, name: &str, values: &[String]) -> Result<()> {
    write_field_header(w, name, DataType::Str, false)?;
    write_pod(w, values.len() as u64)?;
    write_pod(w, 1u64)?;
    write_strings(w, values)
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

fn expect_field<R: Read>(r: &mut R, name: &str, ty: DataType, is_scalar: bool) -> Result<()> {
    let got = read_string(r, "field name")?;
    if got != name {
        return Err(FormatError::FieldName {
            expected: name.to_string(),
            got,
        }
        .into());
    }
    let tag: u8 = read_pod(r, "field type")?;
    let got_ty = DataType::from_u8(tag)?;
    if got_ty != ty {
        return Err(FormatError::FieldType {
            field: name.to_string(),
            expected: ty as u8,
            got: tag,
        }
        .into());
    }
    let got_scalar = read_bool(r, "field kind")?;
    if got_scalar != is_scalar {
        return Err(FormatError::FieldKind {
            field: name.to_string(),
            expected: kind(is_scalar),
            got: kind(got_scalar),
        }
        .into());
    }
    Ok(())
}

fn read_scalar<R: Read>(r: &mut R, name: &str) -> Result<u64> {
    expect_field(r, name, DataType::UInt64, true)?;
    read_pod(r, "scalar field")
}

fn read_shape<R: Read>(r: &mut R) -> Result<(usize, usize)> {
    let rows: u64 = read_pod(r, "field shape")?;
    let cols: u64 = read_pod(r, "field shape")?;
    Ok((rows as usize, cols as usize))
}

fn shape_error(name: &str, reason: String) -> FormatError {
    FormatError::FieldShape {
        field: name.to_string(),
        reason,
    }
}

fn check_vector_shape(name: &str, shape: (usize, usize), len: usize) -> Result<()> {
    if shape.1 != 1 {
        return Err(shape_error(name, format!("expected one column, got {}", shape.1)).into());
    }
    if shape.0 != len {
        return Err(shape_error(name, format!("shape declares {} elements, found {len}", shape.0)).into());
    }
    Ok(())
}

fn read_vector<R: Read, T: Pod>(r: &mut R, name: &str, ty: DataType) -> Result<Vec<T>> {
    expect_field(r, name, ty, false)?;
    let shape = read_shape(r)?;
    let values = read_vec(r, "vector field")?;
    check_vector_shape(name, shape, values.len())?;
    Ok(values)
}

fn read_tensor<R: Read>(r: &mut R, name: &str) -> Result<Array2<f32>> {
    expect_field(r, name, DataType::Float32, false)?;
    let shape = read_shape(r)?;
    let values: Vec<f32> = read_vec(r, "tensor field")?;
    if values.is_empty() && shape.0 * shape.1 == 0 {
        return Ok(empty_tensor());
    }
    Array2::from_shape_vec(shape, values)
        .map_err(|err| shape_error(name, err.to_string()).into())
}

fn read_string_vector<R: Read>(r: &mut R, name: &str) -> Result<Vec<String>> {
    expect_field(r, name, DataType::Str, false)?;
    let shape = read_shape(r)?;
    let values = read_strings(r, "string field")?;
    check_vector_shape(name, shape, values.len())?;
    Ok(values)
}

/// Consume one field of any name and type.
fn skip_field<R: Read>(r: &mut R) -> Result<String> {
    let name = read_string(r, "field name")?;
    let ty = DataType::from_u8(read_pod(r, "field type")?)?;
    let is_scalar = read_bool(r, "field kind")?;
    match (ty.size(), is_scalar) {
        (Some(size), true) => {
            let mut buf = [0u8; 8];
            r.read_exact(&mut buf[..size])
                .map_err(crate::stream::truncated("scalar field"))?;
        }
        (None, true) => {
            read_string(r, "scalar field")?;
        }
        (Some(size), false) => {
            read_shape(r)?;
            let len: u64 = read_pod(r, "vector field")?;
            let n = len
                .checked_mul(size as u64)
                .ok_or(FormatError::Truncated("vector field"))?;
            let skipped = std::io::copy(&mut r.by_ref().take(n), &mut std::io::sink())?;
            if skipped != n {
                return Err(FormatError::Truncated("vector field").into());
            }
        }
        (None, false) => {
            read_shape(r)?;
            read_strings(r, "string field")?;
        }
    }
    Ok(name)
}

impl MetaInfo {
    /// Serialize every field in the versioned binary format.
    ///
    /// ```
    /// use dmatrix::meta::MetaInfo;
    ///
    /// let mut info = MetaInfo::new();
    /// info.num_row = 2;
    /// info.weights = vec![1.0, 0.5];
    ///
    /// let mut buf = Vec::new();
    /// info.save_binary(&mut buf).unwrap();
    /// let back = MetaInfo::load_binary(&mut buf.as_slice()).unwrap();
    /// assert_eq!(back, info);
    /// ```
    pub fn save_binary<W: Write>(&self, w: &mut W) -> Result<()> {
        let (major, minor, patch) = META_VERSION;
        write_pod(w, major)?;
        write_pod(w, minor)?;
        write_pod(w, patch)?;
        write_pod(w, NUM_META_FIELDS)?;

        write_scalar(w, "num_row", self.num_row)?;
        write_scalar(w, "num_col", self.num_col)?;
        write_scalar(w, "num_nonzero", self.num_nonzero)?;
        write_tensor(w, "labels", &self.labels)?;
        write_vector(w, "group_ptr", DataType::UInt32, (self.group_ptr.len(), 1), &self.group_ptr)?;
        write_vector(w, "weights", DataType::Float32, (self.weights.len(), 1), &self.weights)?;
        write_tensor(w, "base_margin", &self.base_margin)?;
        write_vector(
            w,
            "labels_lower_bound",
            DataType::Float32,
            (self.labels_lower_bound.len(), 1),
            &self.labels_lower_bound,
        )?;
        write_vector(
            w,
            "labels_upper_bound",
            DataType::Float32,
            (self.labels_upper_bound.len(), 1),
            &self.labels_upper_bound,
        )?;
        write_string_vector(w, "feature_names", &self.feature_names)?;
        write_string_vector(w, "feature_types", &self.feature_type_names)?;
        write_vector(
            w,
            "feature_weights",
            DataType::Float32,
            (self.feature_weights.len(), 1),
            &self.feature_weights,
        )?;

        let json = String::from_utf8(self.cats.to_json()?).map_err(FormatError::from)?;
        write_string_vector(w, "cats", &[json])
    }

    /// Read a `MetaInfo` written by [`MetaInfo::save_binary`].
    ///
    /// Versions older than [`MIN_META_VERSION`] are rejected. Fields after
    /// the known ones are skipped with a warning.
    pub fn load_binary<R: Read>(r: &mut R) -> Result<MetaInfo> {
        let major: u32 = read_pod(r, "version")?;
        let minor: u32 = read_pod(r, "version")?;
        let patch: u32 = read_pod(r, "version")?;
        if (major, minor) < MIN_META_VERSION {
            let (cur_major, cur_minor, cur_patch) = META_VERSION;
            return Err(FormatError::UnsupportedVersion {
                found: format!("{major}.{minor}.{patch}"),
                current: format!("{cur_major}.{cur_minor}.{cur_patch}"),
            }
            .into());
        }

        let n_fields: u64 = read_pod(r, "field count")?;
        if n_fields < NUM_META_FIELDS {
            return Err(FormatError::InsufficientFields {
                expected: NUM_META_FIELDS,
                got: n_fields,
            }
            .into());
        }

        let mut info = MetaInfo::new();
        info.num_row = read_scalar(r, "num_row")?;
        info.num_col = read_scalar(r, "num_col")?;
        info.num_nonzero = read_scalar(r, "num_nonzero")?;
        info.labels = read_tensor(r, "labels")?;
        info.group_ptr = read_vector(r, "group_ptr", DataType::UInt32)?;
        info.weights = read_vector(r, "weights", DataType::Float32)?;
        info.base_margin = read_tensor(r, "base_margin")?;
        info.labels_lower_bound = read_vector(r, "labels_lower_bound", DataType::Float32)?;
        info.labels_upper_bound = read_vector(r, "labels_upper_bound", DataType::Float32)?;
        info.feature_names = read_string_vector(r, "feature_names")?;
        info.feature_type_names = read_string_vector(r, "feature_types")?;
        info.feature_weights = read_vector(r, "feature_weights", DataType::Float32)?;

        let cats = read_string_vector(r, "cats")?;
        let json = cats
            .first()
            .ok_or_else(|| shape_error("cats", "expected one JSON document".into()))?;
        info.cats = Arc::new(CatContainer::from_json(json.as_bytes())?);

        let (types, has_cat) = load_feature_types(&info.feature_type_names)?;
        info.feature_types = types;
        info.has_categorical = has_cat;

        for _ in NUM_META_FIELDS..n_fields {
            let name = skip_field(r)?;
            tracing::warn!(
                field = %name,
                "binary metadata has more fields than expected, ignoring the trailing field"
            );
        }
        Ok(info)
    }
}
