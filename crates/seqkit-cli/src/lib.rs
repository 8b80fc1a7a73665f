use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::{Args, Parser, ValueEnum};
use seqkit_domain::OnExists;
use seqkit_engine::{
    ApplyOptions, EnvContext, ExistenceResolver, Invocation, PlanOptions, ScratchFiles, TwCli,
    ValidationError, apply_plan, has_destructive_operations, parse_pass_through, parse_targets,
    plan_from_sources, preview_plan,
};
use seqkit_report::{
    ColorChoice, OutputFormat, RenderOptions, redact_sensitive, render_dry_run, render_plan,
    render_run,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod error;

pub use error::CliError;

#[derive(Debug, Parser)]
#[command(
    name = "seqkit",
    version,
    about = "Create Seqera Platform resources from YAML through the tw CLI"
)]
struct Cli {
    /// YAML files with resource definitions; read from stdin when omitted.
    yaml: Vec<PathBuf>,
    #[arg(
        short = 'l',
        long = "log-level",
        value_enum,
        ignore_case = true,
        default_value_t = LogLevel::Info
    )]
    log_level: LogLevel,
    /// Display Seqera Platform information and exit.
    #[arg(short = 'i', long)]
    info: bool,
    /// Output JSON from tw and render the report as JSON.
    #[arg(short = 'j', long)]
    json: bool,
    /// Print the commands that would be executed.
    #[arg(short = 'd', long)]
    dryrun: bool,
    /// Delete the resources defined in the YAML files.
    #[arg(long)]
    delete: bool,
    /// Extra tw options in shell syntax, e.g. "--url https://tower.example --insecure".
    #[arg(long = "cli", value_name = "ARGS", allow_hyphen_values = true)]
    cli_args: Option<String>,
    /// Comma-separated resource blocks to process.
    #[arg(long, value_name = "BLOCKS")]
    targets: Option<String>,
    /// Dotenv file whose entries are available to $VAR references.
    #[arg(long = "env-file", value_name = "PATH")]
    env_file: Option<PathBuf>,
    /// Policy for every existing resource, overriding on_exists in the YAML.
    #[arg(long = "on-exists", value_name = "POLICY", conflicts_with = "overwrite")]
    on_exists: Option<OnExists>,
    /// Shorthand for --on-exists overwrite.
    #[arg(long)]
    overwrite: bool,
    /// Seconds to wait between resource blocks.
    #[arg(long, value_name = "SECONDS", default_value_t = 0)]
    delay: u64,
    #[command(flatten)]
    render: RenderFlags,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorArg {
    Auto,
    Always,
    Never,
}

#[derive(Debug, Clone, Args)]
struct RenderFlags {
    #[arg(long, value_enum, default_value_t = ColorArg::Auto)]
    color: ColorArg,
    /// Show every command and its output in the report.
    #[arg(long)]
    verbose: bool,
}

impl RenderFlags {
    fn render_options(&self, target: String) -> RenderOptions {
        RenderOptions {
            color: self.color.into(),
            verbose: self.verbose,
            target: Some(target),
        }
    }
}

impl From<ColorArg> for ColorChoice {
    fn from(value: ColorArg) -> Self {
        match value {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

impl Cli {
    fn on_exists(&self) -> Option<OnExists> {
        if self.overwrite {
            Some(OnExists::Overwrite)
        } else {
            self.on_exists
        }
    }

    fn global_args(&self) -> Result<Vec<String>, ValidationError> {
        self.cli_args
            .as_deref()
            .map_or_else(|| Ok(Vec::new()), parse_pass_through)
    }

    const fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Run the CLI using process arguments.
///
/// # Errors
///
/// Returns an error when argument parsing fails (excluding help/version), the
/// configuration is invalid, or a command cannot be run.
pub fn run() -> std::result::Result<i32, CliError> {
    run_from(std::env::args_os())
}

fn run_from<I, T>(args: I) -> std::result::Result<i32, CliError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(parsed) => parsed,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(error.into()),
        },
    };
    init_logging(cli.log_level);

    let mut env = EnvContext::from_process();
    if let Some(path) = &cli.env_file {
        env.load_file(path)?;
        debug!(path = %path.display(), "loaded env file");
    }
    let sensitive_values = env.sensitive_values();
    let tw = TwCli::new(cli.global_args()?, env.clone())?;

    if cli.info {
        let info = Invocation::new(["info"]);
        if cli.dryrun {
            info!("DRYRUN: Running command {}", tw.preview(&info)?);
        } else {
            emit_output(&tw.info()?, &sensitive_values);
        }
        return Ok(0);
    }

    let targets = cli.targets.as_deref().map(parse_targets).transpose()?;
    let plan_options = PlanOptions {
        destroy: cli.delete,
        targets,
        on_exists: cli.on_exists(),
    };
    let mut scratch = ScratchFiles::new();
    let report = plan_from_sources(&cli.yaml, &plan_options, &env, &mut scratch)?;
    debug!(
        operations = report.operations.len(),
        params_files = scratch.len(),
        "plan ready"
    );

    let output_format = cli.output_format();
    let render_options = cli.render.render_options(report.sources.join(", "));
    let apply_options = ApplyOptions {
        fail_fast: true,
        json_output: cli.json,
        block_delay: Duration::from_secs(cli.delay),
    };

    if cli.dryrun {
        let commands = preview_plan(&report, &tw, &apply_options)?;
        let rendered = render_dry_run(&report, &commands, output_format, &render_options)?;
        emit_output(&rendered, &sensitive_values);
        return Ok(0);
    }

    if output_format == OutputFormat::Text && cli.render.verbose {
        let rendered = render_plan(&report, output_format, &render_options)?;
        emit_output(&rendered, &sensitive_values);
    }
    if has_destructive_operations(&report) {
        info!("plan may delete existing resources");
    }
    let mut resolver = ExistenceResolver::new(&tw, tw.env());
    let run_report = apply_plan(&report, &tw, &mut resolver, &apply_options);
    let rendered = render_run(&run_report, output_format, &render_options)?;
    emit_output(&rendered, &sensitive_values);
    Ok(i32::from(run_report.has_failures()))
}

fn init_logging(level: LogLevel) {
    // A second initialisation (repeated in-process runs) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level.directive()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn emit_output(rendered: &str, sensitive_values: &BTreeSet<String>) {
    let redacted = redact_sensitive(rendered, sensitive_values);
    if redacted.ends_with('\n') {
        print!("{redacted}");
    } else {
        println!("{redacted}");
    }
}
