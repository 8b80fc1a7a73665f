use seqkit_domain::{BlockKind, Intent, NormalizedCommand, OnExists, PlanReport, PlannedOperation};
use seqkit_source::MergedDocument;
use tracing::{debug, warn};

use crate::env::EnvContext;
use crate::error::{PlanError, ValidationError};
use crate::existence::deletion_preview;
use crate::item::ResourceItem;
use crate::normalize::{NormalizeContext, is_url, normalize_item};
use crate::order::{block_order, ensure_unique_identities, identity_of};
use crate::params::ScratchFiles;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanOptions {
    pub destroy: bool,
    pub targets: Option<Vec<BlockKind>>,
    pub on_exists: Option<OnExists>,
}

/// Normalize every retained resource into planned operations, in block order.
///
/// Params files written along the way are owned by `scratch` and must outlive
/// execution of the plan.
///
/// # Errors
///
/// Returns an error for unknown blocks, invalid resources, duplicate identities,
/// or params files that cannot be prepared. No command is issued before this
/// succeeds.
pub fn build_plan(
    document: &MergedDocument,
    options: &PlanOptions,
    env: &EnvContext,
    scratch: &mut ScratchFiles,
) -> Result<PlanReport, PlanError> {
    let mut present = Vec::with_capacity(document.blocks.len());
    for block in &document.blocks {
        let kind = block
            .name
            .parse::<BlockKind>()
            .map_err(ValidationError::from)?;
        present.push(kind);
    }

    let order: Vec<BlockKind> = block_order(options.destroy, options.targets.as_deref())
        .into_iter()
        .filter(|kind| present.contains(kind))
        .collect();
    let intent = if options.destroy {
        Intent::Delete
    } else {
        Intent::Create
    };

    let mut report = PlanReport {
        sources: document.sources.clone(),
        block_order: order.clone(),
        ..PlanReport::default()
    };
    let mut context = NormalizeContext { env, scratch };

    for kind in order {
        let Some(block) = document.block(kind.as_str()) else {
            continue;
        };

        let mut planned = Vec::with_capacity(block.items.len());
        for raw in &block.items {
            let item = ResourceItem::parse(kind, raw, options.on_exists)?;
            let command = normalize_item(&item, &mut context)?;
            let identity = identity_of(kind, &command);
            planned.push((item, command, identity));
        }
        ensure_unique_identities(
            kind,
            planned.iter().map(|(_, _, identity)| identity.as_deref()),
        )?;

        for (item, command, identity) in planned {
            let id = report.operations.len() + 1;
            let operation = plan_operation(id, &item, command, identity, intent);
            debug!(id, summary = %operation.summary, "planned operation");
            report.operations.push(operation);
        }
    }

    Ok(report)
}

fn plan_operation(
    id: usize,
    item: &ResourceItem,
    command: NormalizedCommand,
    identity: Option<String>,
    intent: Intent,
) -> PlannedOperation {
    let block = item.block;
    let mut warnings = Vec::new();

    if block == BlockKind::Pipelines {
        if let Some(url) = item.text_field("url") {
            if !url.contains('$') && !is_url(&url) {
                warnings.push(format!(
                    "pipeline url '{url}' is not an absolute URL; tw resolves it as a repository name"
                ));
            }
        }
    }
    if let Some(dataset) = command.params.as_ref().and_then(|params| params.dataset.as_ref()) {
        warnings.push(format!(
            "dataset '{}' is resolved to its URL when the command runs",
            dataset.name
        ));
    }

    let invocations = match intent {
        Intent::Create => creation_invocations(item, &command),
        Intent::Delete => deletion_preview(block, &command).into_iter().collect(),
    };
    let label = identity
        .as_ref()
        .map_or_else(|| block.to_string(), |identity| format!("{block} '{identity}'"));
    let summary = match (intent, block) {
        (Intent::Create, BlockKind::Launch) => format!("launch {}", launch_target(&command)),
        (Intent::Create, _) => format!("create {label}"),
        (Intent::Delete, _) => format!("delete {label}"),
    };
    for warning in &warnings {
        warn!(id, "{warning}");
    }

    PlannedOperation {
        id,
        block,
        identity,
        intent,
        on_exists: item.on_exists,
        command,
        invocations,
        summary,
        warnings,
    }
}

/// `tw` argument vectors that create the resource, in execution order.
#[must_use]
pub fn creation_invocations(item: &ResourceItem, command: &NormalizedCommand) -> Vec<Vec<String>> {
    let block = item.block;
    let with_verb = |verb: &str, args: &[String]| {
        let mut full = vec![block.as_str().to_string(), verb.to_string()];
        full.extend(args.iter().cloned());
        full
    };

    match block {
        BlockKind::Teams => {
            let mut invocations = vec![with_verb("add", &command.args)];
            invocations.extend(
                command
                    .secondary
                    .iter()
                    .map(|secondary| with_verb("members", secondary)),
            );
            invocations
        }
        BlockKind::Participants => {
            let mut invocations = vec![with_verb("add", &without_flag(&command.args, "role"))];
            if command.has_flag("role") {
                invocations.push(with_verb("update", &command.args));
            }
            invocations
        }
        BlockKind::ComputeEnvs | BlockKind::Pipelines => {
            let verb = if item.has_field("file-path") {
                "import"
            } else {
                "add"
            };
            vec![with_verb(verb, &command.args)]
        }
        BlockKind::Launch => {
            let mut full = vec![block.as_str().to_string()];
            full.extend(command.args.iter().cloned());
            vec![full]
        }
        _ => vec![with_verb("add", &command.args)],
    }
}

fn without_flag(args: &[String], flag: &str) -> Vec<String> {
    let wanted = format!("--{flag}");
    let mut kept = Vec::with_capacity(args.len());
    let mut skip_value = false;
    for arg in args {
        if skip_value {
            skip_value = false;
            if !arg.starts_with("--") {
                continue;
            }
        }
        if *arg == wanted {
            skip_value = true;
            continue;
        }
        kept.push(arg.clone());
    }
    kept
}

fn launch_target(command: &NormalizedCommand) -> String {
    command
        .args
        .first()
        .filter(|first| !first.starts_with("--"))
        .cloned()
        .or_else(|| command.flag_value("name").map(str::to_string))
        .unwrap_or_else(|| "pipeline".to_string())
}
