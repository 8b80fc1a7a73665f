use std::process::{Command, Stdio};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::env::EnvContext;
use crate::error::{ExecError, ValidationError};

pub const TW_BINARY: &str = "tw";

static ALREADY_EXISTS: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?i)ERROR: .*already (exists|a participant)"));
static NOT_FOUND: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?i)ERROR: .*not found"));

/// One `tw` call, without the binary name or pass-through options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Invocation {
    pub args: Vec<String>,
    /// Request `-o json` output.
    pub json: bool,
    /// Log at debug level only.
    pub quiet: bool,
}

impl Invocation {
    #[must_use]
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            json: false,
            quiet: false,
        }
    }

    #[must_use]
    pub fn json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    #[must_use]
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }
}

/// Executes `tw` invocations and returns their combined output.
pub trait TwRunner {
    /// # Errors
    ///
    /// Returns an error if the command cannot be built or started, or exits
    /// with a failure.
    fn execute(&self, invocation: &Invocation) -> Result<String, ExecError>;
}

/// Runs the real `tw` binary found on `PATH`.
#[derive(Debug, Clone)]
pub struct TwCli {
    binary: String,
    global_args: Vec<String>,
    env: EnvContext,
}

impl TwCli {
    /// # Errors
    ///
    /// Returns an error if the pass-through options contain `--verbose`.
    pub fn new(global_args: Vec<String>, env: EnvContext) -> Result<Self, ExecError> {
        if global_args.iter().any(|arg| arg == "--verbose") {
            return Err(ExecError::UnsupportedPassThrough);
        }
        Ok(Self {
            binary: TW_BINARY.to_string(),
            global_args,
            env,
        })
    }

    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    #[must_use]
    pub const fn env(&self) -> &EnvContext {
        &self.env
    }

    fn raw_argv(&self, invocation: &Invocation) -> Result<Vec<String>, ExecError> {
        let mut argv = self.global_args.clone();
        if invocation.json {
            argv.push("-o".to_string());
            argv.push("json".to_string());
        }
        argv.extend(invocation.args.iter().cloned());

        if let Some(pair) = argv.windows(2).find(|pair| pair[1].trim().is_empty()) {
            return Err(ExecError::EmptyArgument {
                flag: pair[0].clone(),
            });
        }
        Ok(argv)
    }

    /// Full argument vector for an invocation, environment references expanded.
    ///
    /// # Errors
    ///
    /// Returns an error if a flag is followed by a blank argument or a
    /// referenced variable is unset.
    pub fn command_line(&self, invocation: &Invocation) -> Result<Vec<String>, ExecError> {
        self.raw_argv(invocation)?
            .iter()
            .map(|arg| self.env.expand(arg).map_err(ExecError::from))
            .collect()
    }

    /// Validate an invocation and return it for display, references unexpanded.
    ///
    /// # Errors
    ///
    /// See [`TwCli::command_line`].
    pub fn preview(&self, invocation: &Invocation) -> Result<String, ExecError> {
        self.command_line(invocation)?;
        let argv = self.raw_argv(invocation)?;
        Ok(display_command(&self.binary, &argv))
    }

    /// Run `tw info` and return its output.
    ///
    /// # Errors
    ///
    /// Returns an error if `tw` is missing or the command fails.
    pub fn info(&self) -> Result<String, ExecError> {
        self.execute(&Invocation::new(["info"]))
    }
}

impl TwRunner for TwCli {
    fn execute(&self, invocation: &Invocation) -> Result<String, ExecError> {
        let argv = self.command_line(invocation)?;
        let shown = display_command(&self.binary, &self.raw_argv(invocation)?);
        if invocation.quiet {
            debug!("Running command: {shown}");
        } else {
            info!("Running command: {shown}");
        }

        let binary_path = which::which(&self.binary).map_err(|_| ExecError::BinaryNotFound {
            binary: self.binary.clone(),
        })?;
        let output = Command::new(binary_path)
            .args(&argv)
            .env_clear()
            .envs(self.env.iter())
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ExecError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }
        let combined = combined.trim().to_string();

        if output.status.success() {
            if !invocation.quiet && !invocation.json && !combined.is_empty() {
                info!("Command output: {combined}");
            }
            Ok(combined)
        } else {
            Err(classify_failure(combined)?)
        }
    }
}

/// Map the output of a failed command to an error kind.
///
/// # Errors
///
/// Returns an error only if the classification patterns fail to compile.
pub fn classify_failure(output: String) -> Result<ExecError, ExecError> {
    let pattern = |cell: &'static LazyLock<Result<Regex, regex::Error>>| {
        cell.as_ref().map_err(|source| ExecError::Pattern {
            source: source.clone(),
        })
    };
    if pattern(&ALREADY_EXISTS)?.is_match(&output) {
        return Ok(ExecError::ResourceExists { output });
    }
    if pattern(&NOT_FOUND)?.is_match(&output) {
        return Ok(ExecError::ResourceNotFound { output });
    }
    Ok(ExecError::CommandFailed { output })
}

/// Split a shell-style option line, e.g. `--url 'https://x' --insecure`.
///
/// # Errors
///
/// Returns an error if the line has an unbalanced quote or a trailing escape.
pub fn parse_pass_through(raw: &str) -> Result<Vec<String>, ValidationError> {
    shell_words::split(raw).map_err(|source| ValidationError::PassThroughSyntax {
        value: raw.to_string(),
        source,
    })
}

/// Command line as a shell would accept it.
#[must_use]
pub fn display_command(binary: &str, argv: &[String]) -> String {
    shell_words::join(std::iter::once(binary).chain(argv.iter().map(String::as_str)))
}
