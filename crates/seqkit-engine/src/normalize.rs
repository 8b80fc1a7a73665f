use std::path::Path;

use seqkit_domain::{BlockKind, DatasetRef, NormalizedCommand, ParamsFile};
use serde_yaml::{Mapping, Value};
use tracing::debug;
use url::Url;

use crate::env::EnvContext;
use crate::error::{PlanError, ValidationError};
use crate::item::{ResourceItem, scalar_text};
use crate::params::{DATASET_KEY, ScratchFiles, load_params_file, merge_params};

const PARAMS_FIELD: &str = "params";
const PARAMS_FILE_FIELD: &str = "params-file";
const FILE_PATH_FIELD: &str = "file-path";
const TEAM_FIELDS: [&str; 3] = ["name", "organization", "description"];
const DATASET_FLAGS: [&str; 3] = ["name", "workspace", "description"];

/// Fields emitted as bare positional tokens, in order, ahead of every flag.
#[must_use]
pub const fn priority_fields(block: BlockKind) -> &'static [&'static str] {
    match block {
        BlockKind::Credentials | BlockKind::Actions => &["type"],
        BlockKind::ComputeEnvs => &["type", "config-mode", FILE_PATH_FIELD],
        BlockKind::Datasets => &[FILE_PATH_FIELD],
        BlockKind::Pipelines => &["url", FILE_PATH_FIELD],
        BlockKind::Launch => &["pipeline", "url"],
        _ => &[],
    }
}

/// One of the two fields must be present.
#[must_use]
pub const fn discriminator(block: BlockKind) -> Option<(&'static str, &'static str)> {
    match block {
        BlockKind::ComputeEnvs => Some(("type", FILE_PATH_FIELD)),
        BlockKind::Pipelines => Some(("url", FILE_PATH_FIELD)),
        _ => None,
    }
}

#[must_use]
pub const fn accepts_params(block: BlockKind) -> bool {
    matches!(
        block,
        BlockKind::Actions | BlockKind::Pipelines | BlockKind::Launch
    )
}

#[must_use]
pub const fn accepts_dataset_params(block: BlockKind) -> bool {
    matches!(block, BlockKind::Pipelines | BlockKind::Launch)
}

/// Whether `value` parses as an absolute URL with a host.
#[must_use]
pub fn is_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| url.has_host())
}

pub struct NormalizeContext<'a> {
    pub env: &'a EnvContext,
    pub scratch: &'a mut ScratchFiles,
}

/// Turn one declared resource into its flat `tw` token sequence.
///
/// # Errors
///
/// Returns an error for nested values outside `params`, a missing required
/// field, or a params file that cannot be read or written.
pub fn normalize_item(
    item: &ResourceItem,
    context: &mut NormalizeContext<'_>,
) -> Result<NormalizedCommand, PlanError> {
    let block = item.block;
    if let Some((first, second)) = discriminator(block) {
        if !item.has_field(first) && !item.has_field(second) {
            return Err(ValidationError::MissingDiscriminator {
                block,
                first,
                second,
            }
            .into());
        }
    }

    match block {
        BlockKind::Teams => normalize_team(item),
        BlockKind::Datasets => normalize_dataset(item),
        _ => normalize_generic(item, context),
    }
}

fn normalize_generic(
    item: &ResourceItem,
    context: &mut NormalizeContext<'_>,
) -> Result<NormalizedCommand, PlanError> {
    let block = item.block;
    let priority = priority_fields(block);
    let params_aware = accepts_params(block);

    let mut args = Vec::new();
    for field in priority {
        if let Some(value) = item.field(field) {
            args.push(positional_text(block, field, value)?);
        }
    }

    let mut remaining: Vec<&(String, Value)> = item
        .fields
        .iter()
        .filter(|(name, _)| !priority.contains(&name.as_str()))
        .filter(|(name, _)| !(params_aware && is_params_field(name)))
        .collect();
    remaining.sort_by(|(left, _), (right, _)| left.cmp(right));
    for (name, value) in remaining {
        push_flag(&mut args, block, name, value)?;
    }

    let params = if params_aware {
        externalize_params(item, context)?
    } else {
        None
    };
    if let Some(params) = &params {
        args.push(format!("--{PARAMS_FILE_FIELD}"));
        args.push(params.path.clone());
    }

    Ok(NormalizedCommand {
        args,
        secondary: Vec::new(),
        params,
    })
}

fn normalize_team(item: &ResourceItem) -> Result<NormalizedCommand, PlanError> {
    let block = item.block;
    let mut args = Vec::new();
    for field in TEAM_FIELDS {
        if let Some(value) = item.field(field) {
            push_flag(&mut args, block, field, value)?;
        }
    }

    let mut secondary = Vec::new();
    if let Some(members) = item.field("members") {
        let members = list_items(block, "members", members)?;
        if !members.is_empty() {
            let name = item.text_field("name").ok_or(ValidationError::MissingField {
                block,
                field: "name",
            })?;
            let organization =
                item.text_field("organization")
                    .ok_or(ValidationError::MissingField {
                        block,
                        field: "organization",
                    })?;
            for member in members {
                secondary.push(vec![
                    "--team".to_string(),
                    name.clone(),
                    "--organization".to_string(),
                    organization.clone(),
                    "add".to_string(),
                    "--member".to_string(),
                    member,
                ]);
            }
        }
    }

    Ok(NormalizedCommand {
        args,
        secondary,
        params: None,
    })
}

fn normalize_dataset(item: &ResourceItem) -> Result<NormalizedCommand, PlanError> {
    let block = item.block;
    let mut args = Vec::new();
    if let Some(value) = item.field(FILE_PATH_FIELD) {
        args.push(positional_text(block, FILE_PATH_FIELD, value)?);
    }
    for field in DATASET_FLAGS {
        if let Some(value) = item.field(field) {
            args.push(format!("--{field}"));
            args.push(positional_text(block, field, value)?);
        }
    }
    if matches!(item.field("header"), Some(Value::Bool(true))) {
        args.push("--header".to_string());
    }
    Ok(NormalizedCommand::new(args))
}

fn externalize_params(
    item: &ResourceItem,
    context: &mut NormalizeContext<'_>,
) -> Result<Option<ParamsFile>, PlanError> {
    let block = item.block;
    let params_file = match item.field(PARAMS_FILE_FIELD) {
        Some(value) => Some(positional_text(block, PARAMS_FILE_FIELD, value)?),
        None => None,
    };

    let Some(inline) = item.field(PARAMS_FIELD) else {
        return Ok(params_file.map(|path| ParamsFile {
            path,
            generated: false,
            dataset: None,
        }));
    };
    let Value::Mapping(inline) = inline else {
        return Err(ValidationError::UnsupportedValue {
            block,
            field: PARAMS_FIELD.to_string(),
        }
        .into());
    };

    let base = match &params_file {
        Some(path) => load_params_file(Path::new(&context.env.expand(path)?))?,
        None => Mapping::new(),
    };
    let merged = merge_params(base, inline, context.env)?;
    let dataset = dataset_reference(item, &merged)?;
    let path = context.scratch.write_yaml(&merged)?;
    debug!(block = %block, path = %path.display(), "wrote params file");

    Ok(Some(ParamsFile {
        path: path.display().to_string(),
        generated: true,
        dataset,
    }))
}

fn dataset_reference(
    item: &ResourceItem,
    params: &Mapping,
) -> Result<Option<DatasetRef>, ValidationError> {
    let block = item.block;
    if !accepts_dataset_params(block) {
        return Ok(None);
    }
    let Some(name) = params.get(DATASET_KEY).and_then(scalar_text) else {
        return Ok(None);
    };
    let workspace = item
        .text_field("workspace")
        .ok_or(ValidationError::MissingField {
            block,
            field: "workspace",
        })?;
    Ok(Some(DatasetRef { workspace, name }))
}

fn is_params_field(name: &str) -> bool {
    name == PARAMS_FIELD || name == PARAMS_FILE_FIELD
}

fn push_flag(
    args: &mut Vec<String>,
    block: BlockKind,
    name: &str,
    value: &Value,
) -> Result<(), ValidationError> {
    match value {
        Value::Null | Value::Bool(false) => {}
        Value::Bool(true) => args.push(format!("--{name}")),
        Value::String(_) | Value::Number(_) => {
            args.push(format!("--{name}"));
            args.push(positional_text(block, name, value)?);
        }
        Value::Sequence(_) => {
            let joined = list_items(block, name, value)?.join(",");
            args.push(format!("--{name}"));
            args.push(joined);
        }
        Value::Mapping(_) | Value::Tagged(_) => {
            return Err(ValidationError::UnsupportedValue {
                block,
                field: name.to_string(),
            });
        }
    }
    Ok(())
}

fn positional_text(block: BlockKind, name: &str, value: &Value) -> Result<String, ValidationError> {
    scalar_text(value).ok_or_else(|| ValidationError::UnsupportedValue {
        block,
        field: name.to_string(),
    })
}

fn list_items(block: BlockKind, name: &str, value: &Value) -> Result<Vec<String>, ValidationError> {
    match value {
        Value::Sequence(items) => items
            .iter()
            .map(|entry| positional_text(block, name, entry))
            .collect(),
        other => positional_text(block, name, other).map(|single| vec![single]),
    }
}
