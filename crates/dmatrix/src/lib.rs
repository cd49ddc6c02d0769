//! dmatrix: data storage for gradient boosting.
//!
//! Tabular input of any layout is ingested into compact sparse row pages
//! plus a metadata container describing labels, weights, query groups,
//! margins, feature names and types, and categorical encodings.
//!
//! # Key Types
//!
//! - [`adapter::Adapter`] - Dense, CSR, CSC, columnar and file-backed input
//! - [`SparsePage`] - Offset-indexed rows of [`Entry`] values
//! - [`MetaInfo`] - Per-dataset metadata with a string-keyed field protocol
//! - [`dmatrix::DMatrix`] - In-memory, quantized and external-memory matrices
//! - [`Context`] - Thread budget and device placement
//!
//! # Building a matrix
//!
//! ```
//! use dmatrix::adapter::{Adapter, DenseAdapter};
//! use dmatrix::collective::SingleProcess;
//! use dmatrix::dmatrix::SimpleDMatrix;
//! use dmatrix::meta::{ArrayInterface, DataSplitMode};
//! use dmatrix::Context;
//! use ndarray::array;
//!
//! let values = array![[1.0f32, f32::NAN], [3.0, 4.0]];
//! let ctx = Context::cpu(2);
//! let adapter = Adapter::Dense(DenseAdapter::new(values.view()));
//! let mut dmat = SimpleDMatrix::from_adapter(adapter, f32::NAN, &ctx, DataSplitMode::Row, &SingleProcess).unwrap();
//! dmat.info_mut().set_info("label", ArrayInterface::vector(&[0.0f32, 1.0][..])).unwrap();
//!
//! assert_eq!(dmat.info().num_nonzero, 3);
//! assert_eq!(dmat.row_page().offset, vec![0, 1, 3]);
//! ```

pub mod adapter;
pub mod cats;
pub mod collective;
pub mod context;
pub mod device;
pub mod dmatrix;
pub mod error;
pub mod group_builder;
pub mod meta;
pub mod page;
pub mod stream;
pub mod utils;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use cats::CatContainer;
pub use context::{Context, Device};
pub use error::{DataError, FormatError, Result};
pub use meta::{DataSplitMode, FeatureType, MetaInfo};
pub use page::{Entry, SparsePage};
pub use utils::{run_with_threads, Parallelism};
