mod error;

use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::debug;

pub use error::SourceError;

/// Display name used for configuration piped through standard input.
pub const STDIN_SOURCE: &str = "stdin";

/// Raw YAML text plus the name it is reported under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub name: String,
    pub text: String,
}

/// All resource blocks of every source, merged in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergedDocument {
    pub sources: Vec<String>,
    pub blocks: Vec<MergedBlock>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedBlock {
    pub name: String,
    pub items: Vec<Value>,
}

impl MergedDocument {
    #[must_use]
    pub fn block(&self, name: &str) -> Option<&MergedBlock> {
        self.blocks.iter().find(|block| block.name == name)
    }

    #[must_use]
    pub fn block_names(&self) -> Vec<&str> {
        self.blocks.iter().map(|block| block.name.as_str()).collect()
    }

    fn absorb(&mut self, name: String, items: Vec<Value>) {
        let index = match self.blocks.iter().position(|block| block.name == name) {
            Some(index) => index,
            None => {
                self.blocks.push(MergedBlock {
                    name,
                    items: Vec::new(),
                });
                self.blocks.len() - 1
            }
        };
        let block = &mut self.blocks[index];
        for item in items {
            if block.items.contains(&item) {
                debug!(block = %block.name, "dropping structurally identical resource");
                continue;
            }
            block.items.push(item);
        }
    }
}

/// Read the configuration sources for a run.
///
/// With no paths the configuration is read from stdin, which must not be a
/// terminal.
///
/// # Errors
///
/// Returns an error if a file cannot be read or stdin is an interactive terminal.
pub fn read_sources(paths: &[PathBuf]) -> Result<Vec<SourceDocument>, SourceError> {
    if paths.is_empty() {
        let stdin = io::stdin();
        if stdin.is_terminal() {
            return Err(SourceError::NoInput);
        }
        let mut text = String::new();
        stdin
            .lock()
            .read_to_string(&mut text)
            .map_err(|source| SourceError::Read {
                source_name: STDIN_SOURCE.to_string(),
                source,
            })?;
        return Ok(vec![SourceDocument {
            name: STDIN_SOURCE.to_string(),
            text,
        }]);
    }

    paths.iter().map(|path| read_file(path)).collect()
}

fn read_file(path: &Path) -> Result<SourceDocument, SourceError> {
    let name = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|source| SourceError::Read {
        source_name: name.clone(),
        source,
    })?;
    Ok(SourceDocument { name, text })
}

/// Merge sources into one document.
///
/// Same-named blocks are concatenated in source order and an item that is
/// structurally equal to one already merged is dropped. A block whose value is
/// null counts as an empty list.
///
/// # Errors
///
/// Returns an error naming the source if it is empty, is not valid YAML, is not a
/// mapping, or holds a block that is not a list.
pub fn merge_sources(documents: &[SourceDocument]) -> Result<MergedDocument, SourceError> {
    let mut merged = MergedDocument::default();
    for document in documents {
        let blocks = parse_blocks(document)?;
        merged.sources.push(document.name.clone());
        for (name, items) in blocks {
            merged.absorb(name, items);
        }
    }
    Ok(merged)
}

/// Read and merge sources in one step.
///
/// # Errors
///
/// See [`read_sources`] and [`merge_sources`].
pub fn load_sources(paths: &[PathBuf]) -> Result<MergedDocument, SourceError> {
    let documents = read_sources(paths)?;
    merge_sources(&documents)
}

fn parse_blocks(document: &SourceDocument) -> Result<Vec<(String, Vec<Value>)>, SourceError> {
    let source_name = &document.name;
    if document.text.trim().is_empty() {
        return Err(SourceError::Empty {
            source_name: source_name.clone(),
        });
    }

    let value: Value =
        serde_yaml::from_str(&document.text).map_err(|source| SourceError::Parse {
            source_name: source_name.clone(),
            source,
        })?;

    let mapping = match value {
        Value::Null => {
            return Err(SourceError::Empty {
                source_name: source_name.clone(),
            });
        }
        Value::Mapping(mapping) if mapping.is_empty() => {
            return Err(SourceError::Empty {
                source_name: source_name.clone(),
            });
        }
        Value::Mapping(mapping) => mapping,
        _ => {
            return Err(SourceError::NotMapping {
                source_name: source_name.clone(),
            });
        }
    };

    let mut blocks = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let Value::String(name) = key else {
            return Err(SourceError::NonStringKey {
                source_name: source_name.clone(),
            });
        };
        let items = match value {
            Value::Null => Vec::new(),
            Value::Sequence(items) => items,
            _ => {
                return Err(SourceError::BlockNotSequence {
                    source_name: source_name.clone(),
                    block: name,
                });
            }
        };
        blocks.push((name, items));
    }
    Ok(blocks)
}
