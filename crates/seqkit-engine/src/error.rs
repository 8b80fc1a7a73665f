use std::io;
use std::path::PathBuf;

use seqkit_domain::{BlockKind, DomainValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Domain(#[from] DomainValidationError),
    #[error("unknown target '{name}' (expected one of: {expected})")]
    UnknownTarget { name: String, expected: String },
    #[error("each {block} entry must be a mapping of fields")]
    ItemNotMapping { block: BlockKind },
    #[error("field names in {block} must be strings")]
    NonStringField { block: BlockKind },
    #[error(
        "Invalid on_exists option '{value}' for {block}. Valid options are: fail, ignore, overwrite"
    )]
    InvalidOnExists { block: BlockKind, value: String },
    #[error("overwrite for {block} must be true or false, got '{value}'")]
    InvalidOverwrite { block: BlockKind, value: String },
    #[error("The '{first}' or '{second}' field is required for {block}")]
    MissingDiscriminator {
        block: BlockKind,
        first: &'static str,
        second: &'static str,
    },
    #[error(
        "Duplicate name key specified in config file for {block}: {identity}. Please specify a unique value."
    )]
    DuplicateIdentity { block: BlockKind, identity: String },
    #[error("field '{field}' in {block} must be a scalar or a list of scalars")]
    UnsupportedValue { block: BlockKind, field: String },
    #[error("field '{field}' is required for {block}")]
    MissingField { block: BlockKind, field: &'static str },
    #[error("failed to parse tw options '{value}'")]
    PassThroughSyntax {
        value: String,
        #[source]
        source: shell_words::ParseError,
    },
    #[error("Dataset '{dataset}' not found in workspace '{workspace}'")]
    DatasetNotFound { dataset: String, workspace: String },
}

#[derive(Debug, Error)]
pub enum EnvError {
    #[error("Environment variable {name} not found!")]
    Unset { name: String },
    #[error("failed to load env file {path}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
    #[error("failed to compile environment reference pattern")]
    Pattern {
        #[source]
        source: regex::Error,
    },
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("binary \"{binary}\" not found on PATH")]
    BinaryNotFound { binary: String },
    #[error("failed to execute command: {binary}")]
    Spawn {
        binary: String,
        #[source]
        source: io::Error,
    },
    #[error("resource already exists: {output}")]
    ResourceExists { output: String },
    #[error("resource not found: {output}")]
    ResourceNotFound { output: String },
    #[error("Resource creation failed: '{output}'. Check your config and try again.")]
    CommandFailed { output: String },
    #[error(
        "Empty string argument found for parameter '{flag}'. Please provide a valid value or remove the argument."
    )]
    EmptyArgument { flag: String },
    #[error("--verbose is not supported as a pass-through option for tw")]
    UnsupportedPassThrough,
    #[error("failed to compile output classification pattern")]
    Pattern {
        #[source]
        source: regex::Error,
    },
    #[error(transparent)]
    Env(#[from] EnvError),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("failed to parse {block} listing as JSON")]
    ListingParse {
        block: BlockKind,
        #[source]
        source: serde_json::Error,
    },
    #[error("could not find {field} for {block} '{identity}'")]
    IdNotFound {
        block: BlockKind,
        identity: String,
        field: &'static str,
    },
    #[error("{block} resources cannot be deleted")]
    NotDeletable { block: BlockKind },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Params(#[from] ParamsError),
    #[error(transparent)]
    Env(#[from] EnvError),
}

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("failed to read params file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse params file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("params file {path} must contain a mapping")]
    NotMapping { path: PathBuf },
    #[error("failed to write params file")]
    Write {
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize params")]
    Serialize {
        #[source]
        source: serde_yaml::Error,
    },
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Params(#[from] ParamsError),
    #[error(transparent)]
    Env(#[from] EnvError),
}

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error(
        "The {block} resource '{identity}' already exists and will not be created. Please set 'on_exists: overwrite' or 'on_exists: ignore' in your config file."
    )]
    AlreadyExists { block: BlockKind, identity: String },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Exec(#[from] ExecError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] seqkit_source::SourceError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Exec(#[from] ExecError),
}
