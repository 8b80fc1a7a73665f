use std::path::Path;
use std::thread;
use std::time::Duration;

use seqkit_domain::{
    BlockKind, Intent, OperationResult, Outcome, PlanReport, PlannedOperation, RunReport,
};
use tracing::{info, warn};

use crate::error::{ApplyError, ExecError, ResolveError};
use crate::existence::{ExistenceResolver, is_checkable};
use crate::params::{DatasetLookup, bind_dataset_url};
use crate::policy::{Decision, decide};
use crate::runner::{Invocation, TW_BINARY, TwCli, TwRunner, display_command};

type ApplyResult<T> = std::result::Result<T, ApplyError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyOptions {
    pub fail_fast: bool,
    /// Ask `tw` for JSON output on resource commands.
    pub json_output: bool,
    /// Pause between consecutive blocks.
    pub block_delay: Duration,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            fail_fast: true,
            json_output: false,
            block_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Default)]
struct Execution {
    commands: Vec<String>,
    outputs: Vec<String>,
}

impl Execution {
    fn run(
        &mut self,
        runner: &dyn TwRunner,
        args: &[String],
        json: bool,
    ) -> Result<(), ExecError> {
        let invocation = Invocation::new(args.iter().cloned()).json(json);
        self.commands.push(display_command(TW_BINARY, &invocation.args));
        let output = runner.execute(&invocation)?;
        if !output.is_empty() {
            self.outputs.push(output);
        }
        Ok(())
    }
}

/// Execute a plan against `tw`, consulting the resolver before every mutation.
///
/// The first failure aborts the run when `fail_fast` is set; failures are
/// reported in the returned report rather than as an error.
#[must_use]
pub fn apply_plan(
    plan: &PlanReport,
    runner: &dyn TwRunner,
    resolver: &mut ExistenceResolver<'_>,
    options: &ApplyOptions,
) -> RunReport {
    let mut results = Vec::with_capacity(plan.operations.len());
    let mut errors = Vec::new();
    let mut previous_block: Option<BlockKind> = None;

    for (index, operation) in plan.operations.iter().enumerate() {
        if previous_block.is_some_and(|block| block != operation.block)
            && !options.block_delay.is_zero()
        {
            info!(
                "Waiting {}s before processing {}",
                options.block_delay.as_secs_f64(),
                operation.block
            );
            thread::sleep(options.block_delay);
        }
        previous_block = Some(operation.block);

        let mut execution = Execution::default();
        let applied = apply_operation(operation, runner, resolver, options, &mut execution);

        match applied {
            Ok(outcome) => {
                results.push(OperationResult {
                    operation_id: operation.id,
                    summary: operation.summary.clone(),
                    outcome,
                    commands: execution.commands,
                    outputs: execution.outputs,
                    error: None,
                });
            }
            Err(error) => {
                let message = error.to_string();
                errors.push(format!("operation {} failed: {message}", operation.id));
                results.push(OperationResult {
                    operation_id: operation.id,
                    summary: operation.summary.clone(),
                    outcome: Outcome::Failed,
                    commands: execution.commands,
                    outputs: execution.outputs,
                    error: Some(message),
                });
                if options.fail_fast {
                    push_fail_fast_abort_message(&mut errors, index, plan.operations.len());
                    break;
                }
            }
        }
    }

    RunReport {
        plan: plan.clone(),
        results,
        errors,
    }
}

fn push_fail_fast_abort_message(errors: &mut Vec<String>, failed_index: usize, total: usize) {
    let remaining = total.saturating_sub(failed_index + 1);
    errors.push(format!(
        "run aborted after first failure ({remaining} operation(s) not attempted)"
    ));
}

fn apply_operation(
    operation: &PlannedOperation,
    runner: &dyn TwRunner,
    resolver: &mut ExistenceResolver<'_>,
    options: &ApplyOptions,
    execution: &mut Execution,
) -> ApplyResult<Outcome> {
    match operation.intent {
        Intent::Create => create(operation, runner, resolver, options, execution),
        Intent::Delete => destroy(operation, runner, resolver, execution),
    }
}

fn create(
    operation: &PlannedOperation,
    runner: &dyn TwRunner,
    resolver: &mut ExistenceResolver<'_>,
    options: &ApplyOptions,
    execution: &mut Execution,
) -> ApplyResult<Outcome> {
    let block = operation.block;
    let decision = if is_checkable(block) {
        let exists = resolver.exists(block, &operation.command)?;
        decide(operation.on_exists, exists)
    } else {
        Decision::Proceed
    };

    let outcome = match decision {
        Decision::Fail => {
            return Err(ApplyError::AlreadyExists {
                block,
                identity: operation.identity.clone().unwrap_or_default(),
            });
        }
        Decision::Skip => {
            info!(
                "{} already exists, skipping creation (on_exists: ignore)",
                operation.label()
            );
            return Ok(Outcome::Skipped);
        }
        Decision::Replace => {
            info!("{} already exists, overwriting", operation.label());
            let delete = resolver.deletion_args(block, &operation.command)?;
            execution.run(runner, &delete, false)?;
            Outcome::Replaced
        }
        Decision::Proceed => Outcome::Created,
    };

    bind_pending_dataset(operation, resolver)?;
    for args in &operation.invocations {
        execution.run(runner, args, options.json_output)?;
    }
    Ok(outcome)
}

fn destroy(
    operation: &PlannedOperation,
    runner: &dyn TwRunner,
    resolver: &mut ExistenceResolver<'_>,
    execution: &mut Execution,
) -> ApplyResult<Outcome> {
    let block = operation.block;
    if !resolver.exists(block, &operation.command)? {
        info!("{} does not exist, nothing to delete", operation.label());
        return Ok(Outcome::Absent);
    }
    let delete = resolver.deletion_args(block, &operation.command)?;
    execution.run(runner, &delete, false)?;
    Ok(Outcome::Deleted)
}

fn bind_pending_dataset(
    operation: &PlannedOperation,
    resolver: &mut ExistenceResolver<'_>,
) -> ApplyResult<()> {
    let Some(params) = &operation.command.params else {
        return Ok(());
    };
    let Some(dataset) = &params.dataset else {
        return Ok(());
    };
    let url = resolver.dataset_url(dataset)?;
    bind_dataset_url(Path::new(&params.path), &url).map_err(ResolveError::from)?;
    Ok(())
}

/// Validate every planned command without executing anything.
///
/// Returns the commands as they would run, with environment references left
/// unexpanded.
///
/// # Errors
///
/// Returns an error on the first command with a blank argument or an unset
/// environment reference.
pub fn preview_plan(
    plan: &PlanReport,
    cli: &TwCli,
    options: &ApplyOptions,
) -> Result<Vec<String>, ExecError> {
    let mut lines = Vec::new();
    for operation in &plan.operations {
        let json = options.json_output && operation.intent == Intent::Create;
        for args in &operation.invocations {
            let shown = cli.preview(&Invocation::new(args.iter().cloned()).json(json))?;
            info!("DRYRUN: Running command {shown}");
            lines.push(shown);
        }
        if operation.command.params.as_ref().is_some_and(|params| params.dataset.is_some()) {
            warn!(
                "{}: dataset reference left unresolved in dry run",
                operation.label()
            );
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests;
