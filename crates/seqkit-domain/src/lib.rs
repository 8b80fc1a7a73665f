use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainValidationError {
    #[error("unknown resource block '{name}' (expected one of: {expected})")]
    UnknownBlock { name: String, expected: String },
    #[error(
        "Invalid on_exists option '{value}'. Valid options are: {}",
        OnExists::VALID_NAMES
    )]
    UnknownOnExists { value: String },
}

/// A category of declarable platform resource, named by its YAML block key.
///
/// Variants are declared in canonical creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BlockKind {
    Organizations,
    Teams,
    Workspaces,
    Labels,
    Members,
    Participants,
    Credentials,
    ComputeEnvs,
    Secrets,
    Actions,
    Datasets,
    Pipelines,
    Launch,
    DataLinks,
    Studios,
}

impl BlockKind {
    pub const ALL: [Self; 15] = [
        Self::Organizations,
        Self::Teams,
        Self::Workspaces,
        Self::Labels,
        Self::Members,
        Self::Participants,
        Self::Credentials,
        Self::ComputeEnvs,
        Self::Secrets,
        Self::Actions,
        Self::Datasets,
        Self::Pipelines,
        Self::Launch,
        Self::DataLinks,
        Self::Studios,
    ];

    /// YAML block key, which is also the `tw` subcommand name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Organizations => "organizations",
            Self::Teams => "teams",
            Self::Workspaces => "workspaces",
            Self::Labels => "labels",
            Self::Members => "members",
            Self::Participants => "participants",
            Self::Credentials => "credentials",
            Self::ComputeEnvs => "compute-envs",
            Self::Secrets => "secrets",
            Self::Actions => "actions",
            Self::Datasets => "datasets",
            Self::Pipelines => "pipelines",
            Self::Launch => "launch",
            Self::DataLinks => "data-links",
            Self::Studios => "studios",
        }
    }

    /// Whether the block triggers remote execution instead of declaring a resource.
    #[must_use]
    pub const fn is_action_only(self) -> bool {
        matches!(self, Self::Launch)
    }

    #[must_use]
    pub fn expected_names() -> String {
        Self::ALL
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for BlockKind {
    type Err = DomainValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| DomainValidationError::UnknownBlock {
                name: value.to_string(),
                expected: Self::expected_names(),
            })
    }
}

impl TryFrom<String> for BlockKind {
    type Error = DomainValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BlockKind> for String {
    fn from(value: BlockKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(formatter)
    }
}

/// Behaviour when a declared resource already exists remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnExists {
    #[default]
    Fail,
    Ignore,
    Overwrite,
}

impl OnExists {
    pub const VALID_NAMES: &'static str = "fail, ignore, overwrite";

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fail => "fail",
            Self::Ignore => "ignore",
            Self::Overwrite => "overwrite",
        }
    }
}

impl FromStr for OnExists {
    type Err = DomainValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "ignore" => Ok(Self::Ignore),
            "overwrite" => Ok(Self::Overwrite),
            _ => Err(DomainValidationError::UnknownOnExists {
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for OnExists {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(formatter)
    }
}

/// Dataset referenced by name from an inline params mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    pub workspace: String,
    pub name: String,
}

/// Params file handed to `tw` through `--params-file`.
///
/// When `dataset` is set the file still carries the `dataset` key; it is rewritten
/// to `input: <url>` right before the owning command runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamsFile {
    pub path: String,
    pub generated: bool,
    pub dataset: Option<DatasetRef>,
}

/// Flat token sequence derived from one declared resource.
///
/// `args` holds positional tokens first, then `--flag [value]` pairs, then the
/// `--params-file` pair if any. `secondary` holds follow-up token sequences (team
/// member additions).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizedCommand {
    pub args: Vec<String>,
    pub secondary: Vec<Vec<String>>,
    pub params: Option<ParamsFile>,
}

impl NormalizedCommand {
    #[must_use]
    pub const fn new(args: Vec<String>) -> Self {
        Self {
            args,
            secondary: Vec::new(),
            params: None,
        }
    }

    /// Value following `--<flag>` in the primary token sequence.
    #[must_use]
    pub fn flag_value(&self, flag: &str) -> Option<&str> {
        flag_value_in(&self.args, flag)
    }

    #[must_use]
    pub fn has_flag(&self, flag: &str) -> bool {
        let wanted = format!("--{flag}");
        self.args.iter().any(|token| *token == wanted)
    }
}

fn flag_value_in<'a>(tokens: &'a [String], flag: &str) -> Option<&'a str> {
    let wanted = format!("--{flag}");
    tokens
        .windows(2)
        .find(|pair| pair[0] == wanted && !pair[1].starts_with("--"))
        .map(|pair| pair[1].as_str())
}

/// Serialization-neutral view of a `tw -o json` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tree {
    Null,
    Scalar(String),
    Sequence(Vec<Tree>),
    Mapping(Vec<(String, Tree)>),
}

impl Tree {
    #[must_use]
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Mapping(entries) => entries
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    #[must_use]
    pub fn map_scalars(self, transform: &impl Fn(String) -> String) -> Self {
        match self {
            Self::Null => Self::Null,
            Self::Scalar(value) => Self::Scalar(transform(value)),
            Self::Sequence(items) => Self::Sequence(
                items
                    .into_iter()
                    .map(|item| item.map_scalars(transform))
                    .collect(),
            ),
            Self::Mapping(entries) => Self::Mapping(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, value.map_scalars(transform)))
                    .collect(),
            ),
        }
    }

    /// Whether any mapping at any depth holds `key` with a scalar equal to `value`.
    #[must_use]
    pub fn contains_pair(&self, key: &str, value: &str) -> bool {
        match self {
            Self::Null | Self::Scalar(_) => false,
            Self::Sequence(items) => items.iter().any(|item| item.contains_pair(key, value)),
            Self::Mapping(entries) => entries.iter().any(|(name, child)| {
                (name == key && child.as_scalar() == Some(value))
                    || child.contains_pair(key, value)
            }),
        }
    }

    /// First mapping, depth first, whose scalar fields match every `(key, value)`
    /// pair; returns that mapping's scalar `field`.
    #[must_use]
    pub fn find_field(&self, matches: &[(&str, &str)], field: &str) -> Option<String> {
        match self {
            Self::Null | Self::Scalar(_) => None,
            Self::Sequence(items) => items.iter().find_map(|item| item.find_field(matches, field)),
            Self::Mapping(entries) => {
                let hit = matches
                    .iter()
                    .all(|(key, value)| self.get(key).and_then(Self::as_scalar) == Some(*value));
                let own = if hit {
                    self.get(field).and_then(Self::as_scalar)
                } else {
                    None
                };
                if let Some(found) = own {
                    return Some(found.to_string());
                }
                entries
                    .iter()
                    .find_map(|(_, child)| child.find_field(matches, field))
            }
        }
    }
}

impl From<serde_json::Value> for Tree {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(flag) => Self::Scalar(flag.to_string()),
            serde_json::Value::Number(number) => Self::Scalar(number.to_string()),
            serde_json::Value::String(text) => Self::Scalar(text),
            serde_json::Value::Array(items) => {
                Self::Sequence(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(entries) => Self::Mapping(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Create,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedOperation {
    pub id: usize,
    pub block: BlockKind,
    pub identity: Option<String>,
    pub intent: Intent,
    pub on_exists: OnExists,
    pub command: NormalizedCommand,
    /// Full `tw` argument vectors (without global options) in execution order.
    pub invocations: Vec<Vec<String>>,
    pub summary: String,
    pub warnings: Vec<String>,
}

impl PlannedOperation {
    #[must_use]
    pub fn label(&self) -> String {
        self.identity.as_ref().map_or_else(
            || self.block.to_string(),
            |identity| format!("{} '{identity}'", self.block),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanReport {
    pub sources: Vec<String>,
    pub block_order: Vec<BlockKind>,
    pub operations: Vec<PlannedOperation>,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl PlanReport {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty() || self.operations.iter().any(|op| !op.warnings.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created,
    Replaced,
    Skipped,
    Deleted,
    Absent,
    Failed,
}

impl Outcome {
    #[must_use]
    pub const fn changed(self) -> bool {
        matches!(self, Self::Created | Self::Replaced | Self::Deleted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub operation_id: usize,
    pub summary: String,
    pub outcome: Outcome,
    /// Commands issued for this operation, as displayed to the user.
    pub commands: Vec<String>,
    pub outputs: Vec<String>,
    pub error: Option<String>,
}

impl OperationResult {
    #[must_use]
    pub const fn success(&self) -> bool {
        !matches!(self.outcome, Outcome::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub plan: PlanReport,
    pub results: Vec<OperationResult>,
    pub errors: Vec<String>,
}

impl RunReport {
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.errors.is_empty() || self.results.iter().any(|result| !result.success())
    }
}
