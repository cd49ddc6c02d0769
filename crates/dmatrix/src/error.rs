//! Error types for ingestion, metadata and binary formats.

use std::io;

use crate::context::Device;

/// Errors raised while ingesting data or mutating metadata.
///
/// Every variant names the invariant that was violated. A failing operation
/// leaves no partial result behind: a batch is either accepted as a whole or
/// rejected.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("input data contains `inf` or a value too large, while `missing` is not set to `inf`")]
    InfInData,

    #[error("label contains NaN, infinity or a value too large")]
    InvalidLabel,

    #[error("weights must be non-negative finite values")]
    InvalidWeight,

    #[error("feature weight must be greater than 0")]
    InvalidFeatureWeight,

    #[error(
        "size of weight must equal to the number of query groups when ranking group is used: \
         {groups} groups, {weights} weights"
    )]
    GroupWeightMismatch { groups: usize, weights: usize },

    #[error("invalid query group structure: total group size {got} differs from the {expected} rows given by data")]
    GroupSizeMismatch { expected: u64, got: u64 },

    #[error("size of {field} ({got}) must equal to {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: u64,
        got: u64,
    },

    #[error("invalid group structure: {0}")]
    InvalidGroup(String),

    #[error("`qid` must be sorted in non-decreasing order along with data (row {row})")]
    QidNotSorted { row: usize },

    #[error("unknown {kind} field: `{key}`")]
    UnknownKey { kind: &'static str, key: String },

    #[error("unsupported data type {dtype} for field `{key}`")]
    UnsupportedDtype { key: String, dtype: &'static str },

    #[error("data is associated with device {data} while the context runs on {context}")]
    DeviceMismatch { data: Device, context: Device },

    #[error("device-resident input requires accelerator support, which is not available in this build")]
    GpuUnsupported,

    #[error("all feature_types must be one of {{int, float, i, q, c}}, got `{0}`")]
    InvalidFeatureType(String),

    #[error("number of columns must be consistent across batches: {expected} vs {got}")]
    ColumnMismatch { expected: u64, got: u64 },

    #[error("incorrect feature types at column {column}: {expected} vs {got}")]
    FeatureTypeMismatch {
        column: usize,
        expected: &'static str,
        got: &'static str,
    },

    #[error("found category `{category}` of feature {feature} that is not in the reference encoding")]
    UnknownCategory { feature: usize, category: String },

    #[error("invalid shape: {0}")]
    InvalidShape(String),

    #[error("collective operation failed: {0}")]
    Collective(String),

    #[error("no data was supplied by the iterator")]
    EmptyIterator,

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Errors raised while decoding serialized pages or metadata.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("not a binary {what} (bad magic number)")]
    BadMagic { what: &'static str },

    #[error(
        "binary data generated by version {found} is no longer supported. \
         Please process and save your data in current version: {current} again."
    )]
    UnsupportedVersion { found: String, current: String },

    #[error("invalid format for {expected}: expected field `{expected}`, got `{got}`")]
    FieldName { expected: String, got: String },

    #[error("invalid format for {field}: expected field of type {expected}, got field type {got}")]
    FieldType { field: String, expected: u8, got: u8 },

    #[error("invalid format for {field}: expected a {expected}, got a {got}")]
    FieldKind {
        field: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("invalid format for {field}: {reason}")]
    FieldShape { field: String, reason: String },

    #[error("insufficient number of fields (expected at least {expected} fields, but the binary data only contains {got} fields)")]
    InsufficientFields { expected: u64, got: u64 },

    #[error("unknown field type tag {0}")]
    UnknownType(u8),

    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("data truncated while reading {0}")]
    Truncated(&'static str),

    #[error("invalid UTF-8 in string field")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("categorical encoding: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = DataError> = std::result::Result<T, E>;
