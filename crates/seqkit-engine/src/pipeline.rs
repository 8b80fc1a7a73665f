use std::path::PathBuf;

use seqkit_domain::{Intent, OnExists, PlanReport};
use seqkit_source::load_sources;

use crate::env::EnvContext;
use crate::error::PipelineError;
use crate::params::ScratchFiles;
use crate::plan::{PlanOptions, build_plan};

/// Load the given YAML files (or stdin when none are given) and plan them.
///
/// # Errors
///
/// Returns an error when a source cannot be read or parsed, or the merged
/// document does not describe a valid set of resources.
pub fn plan_from_sources(
    paths: &[PathBuf],
    options: &PlanOptions,
    env: &EnvContext,
    scratch: &mut ScratchFiles,
) -> Result<PlanReport, PipelineError> {
    let document = load_sources(paths)?;
    Ok(build_plan(&document, options, env, scratch)?)
}

/// Whether running the plan may delete remote resources.
#[must_use]
pub fn has_destructive_operations(report: &PlanReport) -> bool {
    report.operations.iter().any(|operation| {
        operation.intent == Intent::Delete || operation.on_exists == OnExists::Overwrite
    })
}
