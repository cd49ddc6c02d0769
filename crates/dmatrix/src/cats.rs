//! Categorical encodings.
//!
//! A [`CatContainer`] maps raw category values to dense integer codes, one
//! encoding per feature. Numerical features carry no encoding. The container
//! is shared between [`MetaInfo`](crate::meta::MetaInfo) clones through an
//! `Arc` and stored in the binary metadata format as a JSON blob.

use serde::{Deserialize, Serialize};

use crate::error::{DataError, FormatError, Result};

/// Categories of a single feature, ordered by code.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum Categories {
    #[default]
    Numerical,
    Str(Vec<String>),
    Int(Vec<i64>),
}

impl Categories {
    pub fn is_categorical(&self) -> bool {
        !matches!(self, Categories::Numerical)
    }

    pub fn len(&self) -> usize {
        match self {
            Categories::Numerical => 0,
            Categories::Str(v) => v.len(),
            Categories::Int(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn position(&self, raw: CatValue<'_>) -> Option<usize> {
        match (self, raw) {
            (Categories::Str(v), CatValue::Str(s)) => v.iter().position(|c| c == s),
            (Categories::Int(v), CatValue::Int(i)) => v.iter().position(|&c| c == i),
            _ => None,
        }
    }

    fn get(&self, code: usize) -> Option<CatValue<'_>> {
        match self {
            Categories::Numerical => None,
            Categories::Str(v) => v.get(code).map(|s| CatValue::Str(s.as_str())),
            Categories::Int(v) => v.get(code).map(|&i| CatValue::Int(i)),
        }
    }
}

/// A raw category value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatValue<'a> {
    Str(&'a str),
    Int(i64),
}

impl std::fmt::Display for CatValue<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatValue::Str(s) => f.write_str(s),
            CatValue::Int(i) => write!(f, "{i}"),
        }
    }
}

/// Per-feature categorical encodings of a dataset.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CatContainer {
    features: Vec<Categories>,
}

impl CatContainer {
    pub fn new(features: Vec<Categories>) -> Self {
        Self { features }
    }

    #[inline]
    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    /// `true` if no feature carries an encoding.
    pub fn is_empty(&self) -> bool {
        !self.features.iter().any(Categories::is_categorical)
    }

    #[inline]
    pub fn feature(&self, f: usize) -> Option<&Categories> {
        self.features.get(f)
    }

    pub fn n_categories(&self, f: usize) -> usize {
        self.features.get(f).map_or(0, Categories::len)
    }

    /// Code of `raw` in feature `f`, if known.
    pub fn code_of(&self, f: usize, raw: CatValue<'_>) -> Option<i32> {
        self.features
            .get(f)?
            .position(raw)
            .and_then(|p| i32::try_from(p).ok())
    }

    /// Raw value behind `code` in feature `f`.
    pub fn category(&self, f: usize, code: i32) -> Option<CatValue<'_>> {
        let code = usize::try_from(code).ok()?;
        self.features.get(f)?.get(code)
    }

    /// Map every code of this encoding onto the code of the same category
    /// in `reference`.
    ///
    /// The result has one vector per feature; numerical features get an
    /// empty vector.
    pub fn recode_map(&self, reference: &CatContainer) -> Result<Vec<Vec<i32>>> {
        if self.num_features() != reference.num_features() {
            return Err(DataError::ColumnMismatch {
                expected: reference.num_features() as u64,
                got: self.num_features() as u64,
            });
        }
        self.features
            .iter()
            .enumerate()
            .map(|(f, cats)| {
                (0..cats.len())
                    .filter_map(|code| cats.get(code))
                    .map(|raw| {
                        reference
                            .code_of(f, raw)
                            .ok_or_else(|| DataError::UnknownCategory {
                                feature: f,
                                category: raw.to_string(),
                            })
                    })
                    .collect()
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self).map_err(FormatError::from)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes).map_err(FormatError::from)?)
    }
}
