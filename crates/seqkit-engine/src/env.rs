use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::error::EnvError;

/// Variables resolved on the remote agent and passed through untouched.
const AGENT_VARIABLES: [&str; 1] = ["TW_AGENT_WORK"];

static ENV_REFERENCE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"\\?\$(?:\{(\w+)\}|([A-Za-z_]\w*))"));

fn env_reference() -> Result<&'static Regex, EnvError> {
    ENV_REFERENCE
        .as_ref()
        .map_err(|source| EnvError::Pattern {
            source: source.clone(),
        })
}

/// Variables visible to a run: a process environment snapshot overlaid with
/// any env files. The process environment itself is never modified.
#[derive(Debug, Clone, Default)]
pub struct EnvContext {
    vars: BTreeMap<String, String>,
    file_keys: BTreeSet<String>,
}

impl EnvContext {
    #[must_use]
    pub fn from_process() -> Self {
        let vars = env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect();
        Self {
            vars,
            file_keys: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            file_keys: BTreeSet::new(),
        }
    }

    /// Overlay the entries of a dotenv file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or has a malformed line.
    pub fn load_file(&mut self, path: &Path) -> Result<(), EnvError> {
        let entries = dotenvy::from_path_iter(path).map_err(|source| EnvError::EnvFile {
            path: path.to_path_buf(),
            source,
        })?;
        for entry in entries {
            let (key, value) = entry.map_err(|source| EnvError::EnvFile {
                path: path.to_path_buf(),
                source,
            })?;
            debug!(%key, path = %path.display(), "loaded variable from env file");
            self.file_keys.insert(key.clone());
            self.vars.insert(key, value);
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Non-empty values that came from env files, for redaction.
    #[must_use]
    pub fn sensitive_values(&self) -> BTreeSet<String> {
        self.file_keys
            .iter()
            .filter_map(|key| self.vars.get(key))
            .filter(|value| !value.trim().is_empty())
            .cloned()
            .collect()
    }

    /// Expand `$VAR` and `${VAR}` references.
    ///
    /// `\$VAR` yields a literal `$VAR` and agent variables are kept as written.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first referenced variable that is not set.
    pub fn expand(&self, raw: &str) -> Result<String, EnvError> {
        let pattern = env_reference()?;
        let mut missing = None;
        let expanded = pattern.replace_all(raw, |captures: &Captures<'_>| {
            match self.substitute(captures) {
                Some(value) => value,
                None => {
                    if missing.is_none() {
                        missing = Some(reference_name(captures).to_string());
                    }
                    captures[0].to_string()
                }
            }
        });
        match missing {
            Some(name) => Err(EnvError::Unset { name }),
            None => Ok(expanded.into_owned()),
        }
    }

    /// Expand references, leaving unresolvable ones as written.
    #[must_use]
    pub fn expand_lossy(&self, raw: &str) -> String {
        let Ok(pattern) = env_reference() else {
            return raw.to_string();
        };
        pattern
            .replace_all(raw, |captures: &Captures<'_>| {
                self.substitute(captures)
                    .unwrap_or_else(|| captures[0].to_string())
            })
            .into_owned()
    }

    fn substitute(&self, captures: &Captures<'_>) -> Option<String> {
        let matched = &captures[0];
        if let Some(escaped) = matched.strip_prefix('\\') {
            return Some(escaped.to_string());
        }
        let name = reference_name(captures);
        if AGENT_VARIABLES.contains(&name) {
            return Some(matched.to_string());
        }
        self.vars.get(name).cloned()
    }
}

fn reference_name<'a>(captures: &'a Captures<'_>) -> &'a str {
    captures
        .get(1)
        .or_else(|| captures.get(2))
        .map_or("", |name| name.as_str())
}
