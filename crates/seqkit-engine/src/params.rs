use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use seqkit_domain::DatasetRef;
use serde_yaml::{Mapping, Value};
use tempfile::{Builder, TempPath};

use crate::env::EnvContext;
use crate::error::{EnvError, ParamsError, ResolveError};

/// Key inside a params mapping that names a dataset instead of an input URL.
pub const DATASET_KEY: &str = "dataset";
/// Key that receives the resolved dataset URL.
pub const INPUT_KEY: &str = "input";

/// Resolves a dataset name to its platform URL.
pub trait DatasetLookup {
    /// # Errors
    ///
    /// Returns an error if the dataset cannot be found or the lookup fails.
    fn dataset_url(&mut self, dataset: &DatasetRef) -> Result<String, ResolveError>;
}

/// Temporary params files owned by one run; removed on drop.
#[derive(Debug, Default)]
pub struct ScratchFiles {
    files: Vec<TempPath>,
}

impl ScratchFiles {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Serialize `params` into a new temporary YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write_yaml(&mut self, params: &Mapping) -> Result<PathBuf, ParamsError> {
        let text = serde_yaml::to_string(params).map_err(|source| ParamsError::Serialize { source })?;
        let mut file = Builder::new()
            .prefix("seqkit-params-")
            .suffix(".yaml")
            .tempfile()
            .map_err(|source| ParamsError::Write { source })?;
        file.write_all(text.as_bytes())
            .map_err(|source| ParamsError::Write { source })?;
        let temp_path = file.into_temp_path();
        let path = temp_path.to_path_buf();
        self.files.push(temp_path);
        Ok(path)
    }
}

/// Load a params file; `.json` paths are read as JSON, anything else as YAML.
///
/// # Errors
///
/// Returns an error if the file cannot be read, does not parse, or is not a mapping.
pub fn load_params_file(path: &Path) -> Result<Mapping, ParamsError> {
    let text = fs::read_to_string(path).map_err(|source| ParamsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let is_json = path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
    let value: Value = if is_json {
        serde_json::from_str(&text).map_err(|error| ParamsError::Parse {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?
    } else {
        serde_yaml::from_str(&text).map_err(|error| ParamsError::Parse {
            path: path.to_path_buf(),
            message: error.to_string(),
        })?
    };
    match value {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(mapping) => Ok(mapping),
        _ => Err(ParamsError::NotMapping {
            path: path.to_path_buf(),
        }),
    }
}

/// Overlay inline params on top of a base mapping, then expand environment
/// references in top-level string values.
///
/// # Errors
///
/// Returns an error if a string value references an unset variable.
pub fn merge_params(
    base: Mapping,
    inline: &Mapping,
    env: &EnvContext,
) -> Result<Mapping, EnvError> {
    let mut merged = base;
    for (key, value) in inline {
        merged.insert(key.clone(), value.clone());
    }
    for value in merged.values_mut() {
        if let Value::String(text) = value {
            *text = env.expand(text)?;
        }
    }
    Ok(merged)
}

/// Replace the `dataset` key of a generated params file with `input: <url>`.
///
/// # Errors
///
/// Returns an error if the file cannot be read back or rewritten.
pub fn bind_dataset_url(path: &Path, url: &str) -> Result<(), ParamsError> {
    let mut params = load_params_file(path)?;
    params.remove(DATASET_KEY);
    params.insert(Value::String(INPUT_KEY.to_string()), Value::String(url.to_string()));
    let text = serde_yaml::to_string(&params).map_err(|source| ParamsError::Serialize { source })?;
    fs::write(path, text).map_err(|source| ParamsError::Write { source })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use std::fs;

    use serde_yaml::{Mapping, Value};
    use tempfile::tempdir;

    use super::{ScratchFiles, bind_dataset_url, load_params_file, merge_params};
    use crate::env::EnvContext;

    fn mapping(text: &str) -> Mapping {
        serde_yaml::from_str(text).expect("mapping")
    }

    #[test]
    fn inline_params_overlay_file_params() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("params.json");
        fs::write(&path, r#"{"outdir": "s3://old", "genome": "GRCh38"}"#).expect("write");

        let base = load_params_file(&path).expect("load json");
        let merged = merge_params(
            base,
            &mapping("outdir: s3://new\nmax_cpus: 4\n"),
            &EnvContext::default(),
        )
        .expect("merge");

        assert_eq!(merged.get("outdir").and_then(Value::as_str), Some("s3://new"));
        assert_eq!(merged.get("genome").and_then(Value::as_str), Some("GRCh38"));
        assert_eq!(merged.get("max_cpus").and_then(Value::as_u64), Some(4));
    }

    #[test]
    fn top_level_strings_are_expanded() {
        let env = EnvContext::from_vars([("BUCKET", "s3://bucket")]);
        let merged = merge_params(
            Mapping::new(),
            &mapping("outdir: $BUCKET/results\nnested:\n  path: $BUCKET\n"),
            &env,
        )
        .expect("merge");

        assert_eq!(
            merged.get("outdir").and_then(Value::as_str),
            Some("s3://bucket/results")
        );
        assert_eq!(
            merged
                .get("nested")
                .and_then(|nested| nested.get("path"))
                .and_then(Value::as_str),
            Some("$BUCKET")
        );
    }

    #[test]
    fn scratch_files_are_removed_on_drop() {
        let mut scratch = ScratchFiles::new();
        let path = scratch
            .write_yaml(&mapping("flag: 'true'\ncount: '12'\n"))
            .expect("write params");
        assert!(path.exists());
        assert_eq!(scratch.len(), 1);

        let round_trip = load_params_file(&path).expect("reload");
        assert_eq!(round_trip.get("flag").and_then(Value::as_str), Some("true"));
        assert_eq!(round_trip.get("count").and_then(Value::as_str), Some("12"));

        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn binding_dataset_replaces_reference_with_input() {
        let mut scratch = ScratchFiles::new();
        let path = scratch
            .write_yaml(&mapping("dataset: samples\noutdir: s3://out\n"))
            .expect("write params");

        bind_dataset_url(&path, "https://platform/datasets/1/v/1/n/samples.csv").expect("bind");

        let params = load_params_file(&path).expect("reload");
        assert!(params.get("dataset").is_none());
        assert_eq!(
            params.get("input").and_then(Value::as_str),
            Some("https://platform/datasets/1/v/1/n/samples.csv")
        );
        assert_eq!(params.get("outdir").and_then(Value::as_str), Some("s3://out"));
    }
}
