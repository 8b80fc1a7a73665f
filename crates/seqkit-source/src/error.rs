use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read YAML source {source_name}")]
    Read {
        source_name: String,
        #[source]
        source: io::Error,
    },
    #[error("The file '{source_name}' is empty or does not contain valid data.")]
    Empty { source_name: String },
    #[error("failed to parse YAML source {source_name}")]
    Parse {
        source_name: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("YAML source {source_name} must be a mapping of resource blocks")]
    NotMapping { source_name: String },
    #[error("YAML source {source_name} has a non-string top-level key")]
    NonStringKey { source_name: String },
    #[error("block '{block}' in {source_name} must be a list of resources")]
    BlockNotSequence { source_name: String, block: String },
    #[error("no YAML sources given and stdin is a terminal")]
    NoInput,
}
