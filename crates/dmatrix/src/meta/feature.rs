//! Per-column string fields: feature names and feature types.

use super::MetaInfo;
use crate::collective::{Communicator, SingleProcess};
use crate::error::{DataError, Result};

/// Kind of a feature column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FeatureType {
    #[default]
    Numerical,
    Categorical,
}

impl FeatureType {
    /// Parse a user-facing type name.
    ///
    /// `int`, `float`, `i` and `q` are numerical; `c` is categorical.
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "int" | "float" | "i" | "q" => Ok(FeatureType::Numerical),
            "c" => Ok(FeatureType::Categorical),
            other => Err(DataError::InvalidFeatureType(other.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FeatureType::Numerical => "numerical",
            FeatureType::Categorical => "categorical",
        }
    }
}

/// Parse type names, reporting whether any feature is categorical.
pub(super) fn load_feature_types(names: &[String]) -> Result<(Vec<FeatureType>, bool)> {
    let types = names
        .iter()
        .map(|n| FeatureType::parse(n))
        .collect::<Result<Vec<_>>>()?;
    let has_cat = types.contains(&FeatureType::Categorical);
    Ok((types, has_cat))
}

impl MetaInfo {
    /// Set `feature_name` or `feature_type` on a dataset that is not
    /// distributed.
    pub fn set_feature_info<S: AsRef<str>>(&mut self, key: &str, values: &[S]) -> Result<()> {
        self.set_feature_info_with(&SingleProcess, key, values)
    }

    /// Set `feature_name` or `feature_type`.
    ///
    /// For column-split data the local values are gathered from every
    /// participant, so all of them end up with the full-width list. Feature
    /// names are prefixed with the participant's rank (`"{rank}.{name}"`).
    pub fn set_feature_info_with<S: AsRef<str>>(
        &mut self,
        comm: &dyn Communicator,
        key: &str,
        values: &[S],
    ) -> Result<()> {
        if !values.is_empty() && self.num_col != 0 && !self.is_column_split() {
            check_width(key, values.len(), self.num_col)?;
        }
        let local: Vec<String> = values.iter().map(|v| v.as_ref().to_string()).collect();

        match key {
            "feature_type" => {
                let names = if self.is_column_split() {
                    let gathered = comm.allgather_strings(&local)?;
                    check_width(key, gathered.len(), self.num_col)?;
                    gathered
                } else {
                    local
                };
                let (types, has_cat) = load_feature_types(&names)?;
                self.feature_type_names = names;
                self.feature_types = types;
                self.has_categorical = has_cat;
            }
            "feature_name" => {
                self.feature_names = if self.is_column_split() {
                    let rank = comm.rank();
                    let prefixed: Vec<String> =
                        local.iter().map(|name| format!("{rank}.{name}")).collect();
                    let gathered = comm.allgather_strings(&prefixed)?;
                    check_width(key, gathered.len(), self.num_col)?;
                    gathered
                } else {
                    local
                };
            }
            other => {
                return Err(DataError::UnknownKey {
                    kind: "feature info",
                    key: other.to_string(),
                })
            }
        }
        Ok(())
    }

    pub fn get_feature_info(&self, key: &str) -> Result<&[String]> {
        match key {
            "feature_type" => Ok(&self.feature_type_names),
            "feature_name" => Ok(&self.feature_names),
            other => Err(DataError::UnknownKey {
                kind: "feature info",
                key: other.to_string(),
            }),
        }
    }
}

fn check_width(key: &str, got: usize, num_col: u64) -> Result<()> {
    if got as u64 != num_col {
        let field = if key == "feature_type" {
            "feature_type"
        } else {
            "feature_name"
        };
        return Err(DataError::LengthMismatch {
            field,
            expected: num_col,
            got: got as u64,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collective::InMemoryCommunicator;
    use crate::meta::DataSplitMode;
    use std::thread;

    #[test]
    fn feature_types_mark_categorical() {
        let mut info = MetaInfo::new();
        info.num_col = 3;
        info.set_feature_info("feature_type", &["int", "c", "q"]).unwrap();
        assert!(info.has_categorical());
        assert_eq!(
            info.feature_types,
            vec![FeatureType::Numerical, FeatureType::Categorical, FeatureType::Numerical]
        );
        assert_eq!(info.get_feature_info("feature_type").unwrap(), ["int", "c", "q"]);
    }

    #[test]
    fn bad_feature_type_is_rejected() {
        let mut info = MetaInfo::new();
        let err = info.set_feature_info("feature_type", &["float", "str"]).unwrap_err();
        assert!(matches!(err, DataError::InvalidFeatureType(ref t) if t == "str"));
    }

    #[test]
    fn width_must_match_columns() {
        let mut info = MetaInfo::new();
        info.num_col = 2;
        let err = info.set_feature_info("feature_name", &["a"]).unwrap_err();
        assert!(matches!(err, DataError::LengthMismatch { expected: 2, got: 1, .. }));
    }

    #[test]
    fn unknown_key() {
        let mut info = MetaInfo::new();
        assert!(matches!(
            info.set_feature_info("feature_color", &["red"]),
            Err(DataError::UnknownKey { .. })
        ));
        assert!(info.get_feature_info("nope").is_err());
    }

    #[test]
    fn column_split_names_are_gathered_with_rank_prefix() {
        let handles: Vec<_> = InMemoryCommunicator::group(2)
            .into_iter()
            .map(|comm| {
                thread::spawn(move || {
                    let mut info = MetaInfo::new();
                    info.data_split_mode = DataSplitMode::Col;
                    info.num_col = 3;
                    let local: Vec<String> = if comm.rank() == 0 {
                        vec!["x".into(), "y".into()]
                    } else {
                        vec!["z".into()]
                    };
                    info.set_feature_info_with(&comm, "feature_name", &local).unwrap();
                    info.feature_names
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), vec!["0.x", "0.y", "1.z"]);
        }
    }
}
