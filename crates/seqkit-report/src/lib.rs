use std::collections::HashMap;
use std::fmt::Write;
use std::io::{self, IsTerminal};

use console::Style;
use serde::Serialize;
use seqkit_domain::{
    BlockKind, Intent, OnExists, OperationResult, Outcome, PlanReport, PlannedOperation, RunReport,
};

mod error;
mod options;
mod redaction;

pub use error::ReportError;
pub use options::{ColorChoice, OutputFormat, RenderOptions};
pub use redaction::redact_sensitive;

/// Render a plan report in the requested output format.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_plan(
    report: &PlanReport,
    format: OutputFormat,
    options: &RenderOptions,
) -> std::result::Result<String, ReportError> {
    match format {
        OutputFormat::Json => to_json(report),
        OutputFormat::Text => Ok(render_plan_text(report, options, None)),
    }
}

#[derive(Serialize)]
struct DryRun<'a> {
    plan: &'a PlanReport,
    commands: &'a [String],
}

/// Render a validated plan together with the commands a run would issue.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_dry_run(
    report: &PlanReport,
    commands: &[String],
    format: OutputFormat,
    options: &RenderOptions,
) -> std::result::Result<String, ReportError> {
    match format {
        OutputFormat::Json => to_json(&DryRun {
            plan: report,
            commands,
        }),
        OutputFormat::Text => Ok(render_plan_text(report, options, Some(commands))),
    }
}

/// Render the results of a run in the requested output format.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn render_run(
    report: &RunReport,
    format: OutputFormat,
    options: &RenderOptions,
) -> std::result::Result<String, ReportError> {
    match format {
        OutputFormat::Json => to_json(report),
        OutputFormat::Text => Ok(render_run_text(report, options)),
    }
}

fn to_json<T: Serialize>(value: &T) -> std::result::Result<String, ReportError> {
    serde_json::to_string_pretty(value).map_err(|source| ReportError::JsonSerialize { source })
}

// ---------------------------------------------------------------------------
// Plan text
// ---------------------------------------------------------------------------

fn render_plan_text(
    report: &PlanReport,
    options: &RenderOptions,
    commands: Option<&[String]>,
) -> String {
    let mut output = String::new();
    let style = TextStyle::new(options.color);
    let command = if commands.is_some() { "dry run" } else { "plan" };

    append_header(&mut output, command, options.target.as_deref(), &style);

    if report.operations.is_empty() {
        let _ = writeln!(output, "  Nothing to do.");
        append_warnings_and_errors(&mut output, &report.warnings, &report.errors, &style);
        return output;
    }

    let _ = writeln!(output);
    append_warnings_and_errors(&mut output, &report.warnings, &report.errors, &style);

    let mut current_block: Option<BlockKind> = None;
    for op in &report.operations {
        if current_block != Some(op.block) {
            let _ = writeln!(output, "  {}", style.block_heading(op.block.as_str()));
            current_block = Some(op.block);
        }
        append_plan_op_line(&mut output, op, options, &style);
    }

    if let Some(commands) = commands {
        let _ = writeln!(output);
        let _ = writeln!(output, "{}", style.tally_label("Commands:"));
        for line in commands {
            let _ = writeln!(output, "  {}", style.dim(line));
        }
    }

    let _ = writeln!(output);
    let tally = PlanTally::from_ops(&report.operations);
    let _ = writeln!(output, "{}", tally.format(&style));

    output
}

// ---------------------------------------------------------------------------
// Run text
// ---------------------------------------------------------------------------

fn render_run_text(report: &RunReport, options: &RenderOptions) -> String {
    let mut output = String::new();
    let style = TextStyle::new(options.color);
    let planned: HashMap<usize, &PlannedOperation> = report
        .plan
        .operations
        .iter()
        .map(|op| (op.id, op))
        .collect();

    append_header(&mut output, "run", options.target.as_deref(), &style);

    if report.results.is_empty() {
        let _ = writeln!(output, "  Nothing to do.");
        append_warnings_and_errors(&mut output, &[], &report.errors, &style);
        return output;
    }

    let _ = writeln!(output);
    append_warnings_and_errors(&mut output, &[], &report.errors, &style);
    for result in &report.results {
        let op = planned.get(&result.operation_id).copied();
        append_run_op_line(&mut output, result, op, options, &style);
    }

    let skipped = report.plan.operations.len().saturating_sub(report.results.len());
    if skipped > 0 {
        let _ = writeln!(output);
        let _ = writeln!(
            output,
            "  {}",
            style.dim(&format!("{skipped} not attempted"))
        );
    }

    let _ = writeln!(output);
    let tally = RunTally::from_results(&report.results);
    let _ = writeln!(output, "{}", tally.format(&style));

    output
}

// ---------------------------------------------------------------------------
// Line renderers
// ---------------------------------------------------------------------------

fn append_header(output: &mut String, command: &str, target: Option<&str>, style: &TextStyle) {
    let _ = write!(output, "{}", style.header_command(command));
    if let Some(target) = target {
        let _ = write!(output, " {}", style.header_target(target));
    }
    let _ = writeln!(output);
}

fn append_plan_op_line(
    output: &mut String,
    op: &PlannedOperation,
    options: &RenderOptions,
    style: &TextStyle,
) {
    let (symbol, label) = plan_symbol_and_label(op, style);
    let _ = writeln!(output, "    {symbol} {label}{}", style.primary_text(&detail(op)));

    if options.verbose {
        let _ = writeln!(
            output,
            "      {}",
            style.dim(&format!("#{} on_exists: {}", op.id, op.on_exists))
        );
        for args in &op.invocations {
            let line =
                shell_words::join(std::iter::once("tw").chain(args.iter().map(String::as_str)));
            let _ = writeln!(output, "      {}", style.dim(&line));
        }
    }

    for warning in &op.warnings {
        let _ = writeln!(output, "      {} {warning}", style.warn_prefix("warn:"));
    }
}

fn append_run_op_line(
    output: &mut String,
    result: &OperationResult,
    planned: Option<&PlannedOperation>,
    options: &RenderOptions,
    style: &TextStyle,
) {
    let (symbol, label) = outcome_symbol_and_label(result.outcome, style);
    let shown = planned.map_or_else(|| result.summary.clone(), detail);
    let _ = writeln!(output, "  {symbol} {label}{}", style.primary_text(&shown));

    if let Some(error) = &result.error {
        let indent = " ".repeat(LABEL_WIDTH + 4);
        let _ = writeln!(output, "{indent}{}", style.error_detail(error));
    }

    if options.verbose {
        for command in &result.commands {
            let _ = writeln!(output, "      {}", style.dim(command));
        }
        for text in &result.outputs {
            for line in text.lines() {
                let _ = writeln!(output, "      {}", style.dim(&format!("| {line}")));
            }
        }
    }
}

fn detail(op: &PlannedOperation) -> String {
    match (op.block, op.identity.as_deref()) {
        (BlockKind::Launch, _) => op
            .summary
            .strip_prefix("launch ")
            .unwrap_or(&op.summary)
            .to_string(),
        (block, Some(identity)) => format!("{block} {identity}"),
        (block, None) => block.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Warnings & Errors
// ---------------------------------------------------------------------------

fn append_warnings_and_errors(
    output: &mut String,
    warnings: &[String],
    errors: &[String],
    style: &TextStyle,
) {
    if warnings.is_empty() && errors.is_empty() {
        return;
    }
    for warning in warnings {
        let _ = writeln!(output, "  {} {warning}", style.warn_prefix("warn:"));
    }
    for error in errors {
        let _ = writeln!(output, "  {} {error}", style.error_prefix("error:"));
    }
    let _ = writeln!(output);
}

// ---------------------------------------------------------------------------
// Symbol + Label helpers
// ---------------------------------------------------------------------------

fn plan_symbol_and_label(op: &PlannedOperation, style: &TextStyle) -> (String, String) {
    match (op.intent, op.block, op.on_exists) {
        (Intent::Delete, _, _) => (
            style.delete_symbol("-"),
            TextStyle::pad_label(&style.delete_label("delete")),
        ),
        (Intent::Create, BlockKind::Launch, _) => (
            style.add_symbol(">"),
            TextStyle::pad_label(&style.add_label("launch")),
        ),
        (Intent::Create, _, OnExists::Overwrite) => (
            style.change_symbol("~"),
            TextStyle::pad_label(&style.change_label("create/replace")),
        ),
        (Intent::Create, _, OnExists::Ignore) => (
            style.add_symbol("+"),
            TextStyle::pad_label(&style.add_label("create/keep")),
        ),
        (Intent::Create, _, OnExists::Fail) => (
            style.add_symbol("+"),
            TextStyle::pad_label(&style.add_label("create")),
        ),
    }
}

fn outcome_symbol_and_label(outcome: Outcome, style: &TextStyle) -> (String, String) {
    match outcome {
        Outcome::Created => (
            style.add_symbol("+"),
            TextStyle::pad_label(&style.add_label("created")),
        ),
        Outcome::Replaced => (
            style.change_symbol("~"),
            TextStyle::pad_label(&style.change_label("replaced")),
        ),
        Outcome::Deleted => (
            style.delete_symbol("-"),
            TextStyle::pad_label(&style.delete_label("deleted")),
        ),
        Outcome::Skipped => (
            style.noop_symbol("="),
            TextStyle::pad_label(&style.noop_label("already exists")),
        ),
        Outcome::Absent => (
            style.noop_symbol("="),
            TextStyle::pad_label(&style.noop_label("not found")),
        ),
        Outcome::Failed => (
            style.error_op_symbol("!"),
            TextStyle::pad_label(&style.error_op_label("failed")),
        ),
    }
}

// ---------------------------------------------------------------------------
// Plan Tally
// ---------------------------------------------------------------------------

#[derive(Default)]
struct PlanTally {
    creates: usize,
    replaceable: usize,
    deletes: usize,
    launches: usize,
}

impl PlanTally {
    fn from_ops(ops: &[PlannedOperation]) -> Self {
        let mut tally = Self::default();
        for op in ops {
            match (op.intent, op.block, op.on_exists) {
                (Intent::Delete, _, _) => tally.deletes += 1,
                (Intent::Create, BlockKind::Launch, _) => tally.launches += 1,
                (Intent::Create, _, OnExists::Overwrite) => tally.replaceable += 1,
                (Intent::Create, _, _) => tally.creates += 1,
            }
        }
        tally
    }

    fn format(&self, style: &TextStyle) -> String {
        let mut parts = Vec::new();
        if self.creates > 0 {
            parts.push(style.add_label(&format!("{} to create", self.creates)));
        }
        if self.replaceable > 0 {
            parts.push(style.change_label(&format!("{} to create or replace", self.replaceable)));
        }
        if self.deletes > 0 {
            parts.push(style.delete_label(&format!("{} to delete", self.deletes)));
        }
        if self.launches > 0 {
            parts.push(style.add_label(&format!("{} to launch", self.launches)));
        }
        if parts.is_empty() {
            format!("{} nothing to do", style.tally_label("Plan:"))
        } else {
            format!("{} {}", style.tally_label("Plan:"), parts.join(", "))
        }
    }
}

// ---------------------------------------------------------------------------
// Run Tally
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RunTally {
    created: usize,
    replaced: usize,
    deleted: usize,
    failed: usize,
    unchanged: usize,
}

impl RunTally {
    fn from_results(results: &[OperationResult]) -> Self {
        let mut tally = Self::default();
        for result in results {
            match result.outcome {
                Outcome::Created => tally.created += 1,
                Outcome::Replaced => tally.replaced += 1,
                Outcome::Deleted => tally.deleted += 1,
                Outcome::Failed => tally.failed += 1,
                Outcome::Skipped | Outcome::Absent => tally.unchanged += 1,
            }
        }
        tally
    }

    fn format(&self, style: &TextStyle) -> String {
        let mut parts = Vec::new();
        if self.created > 0 {
            parts.push(style.add_label(&format!("{} created", self.created)));
        }
        if self.replaced > 0 {
            parts.push(style.change_label(&format!("{} replaced", self.replaced)));
        }
        if self.deleted > 0 {
            parts.push(style.delete_label(&format!("{} deleted", self.deleted)));
        }
        if self.failed > 0 {
            parts.push(style.error_op_label(&format!("{} failed", self.failed)));
        }
        if self.unchanged > 0 {
            parts.push(style.dim(&format!("{} unchanged", self.unchanged)));
        }
        if parts.is_empty() {
            format!("{} nothing to do", style.tally_label("Run:"))
        } else {
            format!("{} {}", style.tally_label("Run:"), parts.join(", "))
        }
    }
}

// ---------------------------------------------------------------------------
// TextStyle
// ---------------------------------------------------------------------------

const LABEL_WIDTH: usize = 16;

#[derive(Debug, Clone)]
struct TextStyle {
    color_enabled: bool,
    add: Style,
    add_symbol: Style,
    change: Style,
    change_symbol: Style,
    delete: Style,
    delete_symbol: Style,
    error: Style,
    error_symbol: Style,
    dim: Style,
    primary: Style,
    heading: Style,
    warn_prefix: Style,
    error_prefix: Style,
}

impl TextStyle {
    fn new(choice: ColorChoice) -> Self {
        Self {
            color_enabled: should_color(choice),
            add: Style::new().green(),
            add_symbol: Style::new().green().bold(),
            change: Style::new().cyan(),
            change_symbol: Style::new().cyan().bold(),
            delete: Style::new().magenta(),
            delete_symbol: Style::new().magenta().bold(),
            error: Style::new().red(),
            error_symbol: Style::new().red().bold(),
            dim: Style::new().dim(),
            primary: Style::new().white(),
            heading: Style::new().white().bold(),
            warn_prefix: Style::new().yellow().bold(),
            error_prefix: Style::new().red().bold(),
        }
    }

    fn paint<T: std::fmt::Display>(&self, style: &Style, text: T) -> String {
        if self.color_enabled {
            style.apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn pad_label(painted: &str) -> String {
        let visible_len = console::measure_text_width(painted);
        if visible_len < LABEL_WIDTH {
            format!("{painted}{}", " ".repeat(LABEL_WIDTH - visible_len))
        } else {
            format!("{painted} ")
        }
    }

    fn add_symbol(&self, s: &str) -> String {
        self.paint(&self.add_symbol, s)
    }
    fn change_symbol(&self, s: &str) -> String {
        self.paint(&self.change_symbol, s)
    }
    fn delete_symbol(&self, s: &str) -> String {
        self.paint(&self.delete_symbol, s)
    }
    fn error_op_symbol(&self, s: &str) -> String {
        self.paint(&self.error_symbol, s)
    }
    fn noop_symbol(&self, s: &str) -> String {
        self.paint(&self.dim, s)
    }

    fn add_label(&self, s: &str) -> String {
        self.paint(&self.add, s)
    }
    fn change_label(&self, s: &str) -> String {
        self.paint(&self.change, s)
    }
    fn delete_label(&self, s: &str) -> String {
        self.paint(&self.delete, s)
    }
    fn error_op_label(&self, s: &str) -> String {
        self.paint(&self.error, s)
    }
    fn noop_label(&self, s: &str) -> String {
        self.paint(&self.dim, s)
    }

    fn primary_text(&self, s: &str) -> String {
        self.paint(&self.primary, s)
    }
    fn dim(&self, s: &str) -> String {
        self.paint(&self.dim, s)
    }
    fn error_detail(&self, s: &str) -> String {
        self.paint(&self.error, s)
    }

    fn header_command(&self, s: &str) -> String {
        self.paint(&self.heading, s)
    }
    fn header_target(&self, s: &str) -> String {
        self.paint(&self.dim, s)
    }
    fn block_heading(&self, s: &str) -> String {
        self.paint(&self.heading, format!("{s}:"))
    }

    fn warn_prefix(&self, s: &str) -> String {
        self.paint(&self.warn_prefix, s)
    }
    fn error_prefix(&self, s: &str) -> String {
        self.paint(&self.error_prefix, s)
    }
    fn tally_label(&self, s: &str) -> String {
        self.paint(&self.heading, s)
    }
}

fn should_color(choice: ColorChoice) -> bool {
    match choice {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => io::stdout().is_terminal(),
    }
}
