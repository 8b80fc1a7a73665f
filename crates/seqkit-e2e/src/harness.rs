use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

static BUILD_SEQKIT: OnceLock<Result<(), String>> = OnceLock::new();

const CALLS_FILE: &str = "calls.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub command_line: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunResult {
    #[must_use]
    pub fn transcript(&self) -> String {
        format!(
            "$ {}\n[exit: {}]\n[stdout]\n{}[stderr]\n{}",
            self.command_line, self.exit_code, self.stdout, self.stderr
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Response {
    args: String,
    output: String,
    exit_code: i32,
}

/// A scripted stand-in for the `tw` binary.
///
/// Every invocation appends its argument line to a log; invocations whose full
/// argument line matches a registered response print that response.
#[derive(Debug, Clone)]
pub struct FakeTw {
    dir: PathBuf,
    responses: Vec<Response>,
}

impl FakeTw {
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            responses: Vec::new(),
        }
    }

    /// Print `output` and succeed when called with exactly `args`.
    #[must_use]
    pub fn respond(mut self, args: &str, output: &str) -> Self {
        self.responses.push(Response {
            args: args.to_string(),
            output: output.to_string(),
            exit_code: 0,
        });
        self
    }

    /// Print `output` on stderr and exit with `exit_code` when called with `args`.
    #[must_use]
    pub fn fail(mut self, args: &str, output: &str, exit_code: i32) -> Self {
        self.responses.push(Response {
            args: args.to_string(),
            output: output.to_string(),
            exit_code,
        });
        self
    }

    #[must_use]
    pub fn bin_dir(&self) -> &Path {
        &self.dir
    }

    /// Write the executable `tw` script into the fake's directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the script cannot be written or made executable.
    pub fn install(&self) -> std::io::Result<()> {
        let calls = self.dir.join(CALLS_FILE);
        let mut script = String::from("#!/bin/sh\n");
        script.push_str(&format!(
            "printf '%s\\n' \"$*\" >> {}\n",
            shell_quote(&calls.to_string_lossy())
        ));
        script.push_str("case \"$*\" in\n");
        for response in &self.responses {
            let redirect = if response.exit_code == 0 { "" } else { " >&2" };
            script.push_str(&format!(
                "  {})\n    printf '%s\\n' {}{redirect}\n    exit {}\n    ;;\n",
                shell_quote(&response.args),
                shell_quote(&response.output),
                response.exit_code
            ));
        }
        script.push_str("esac\nexit 0\n");

        let path = self.dir.join("tw");
        fs::create_dir_all(&self.dir)?;
        fs::write(&path, script)?;
        make_executable(&path)
    }

    /// Argument lines of every call received so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        fs::read_to_string(self.dir.join(CALLS_FILE))
            .map(|text| text.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(0o755);
    fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Run the `seqkit` binary as an external process.
///
/// When `fake` is given its directory is put first on `PATH`. `stdin` is piped
/// to the process when given, otherwise standard input is closed.
///
/// # Errors
///
/// Returns an error if building or running the `seqkit` binary fails.
pub fn run_seqkit(
    cwd: &Path,
    args: &[&str],
    fake: Option<&FakeTw>,
    stdin: Option<&str>,
) -> Result<RunResult, String> {
    ensure_seqkit_built()?;
    let bin = seqkit_bin()?;

    let mut command = Command::new(bin);
    command.current_dir(cwd);
    command.args(args);
    if let Some(fake) = fake {
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let mut paths = vec![fake.bin_dir().to_path_buf()];
        paths.extend(std::env::split_paths(&inherited));
        let joined = std::env::join_paths(paths)
            .map_err(|error| format!("failed to build PATH: {error}"))?;
        command.env("PATH", joined);
    }
    command.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let mut child = command
        .spawn()
        .map_err(|error| format!("failed to run seqkit: {error}"))?;
    if let Some(input) = stdin {
        let mut pipe = child
            .stdin
            .take()
            .ok_or_else(|| "failed to open seqkit stdin".to_string())?;
        pipe.write_all(input.as_bytes())
            .map_err(|error| format!("failed to write seqkit stdin: {error}"))?;
    }
    let output = child
        .wait_with_output()
        .map_err(|error| format!("failed to wait for seqkit: {error}"))?;

    let mut command_parts = vec!["seqkit".to_string()];
    command_parts.extend(args.iter().map(|arg| (*arg).to_string()));

    Ok(RunResult {
        command_line: command_parts.join(" "),
        exit_code: output.status.code().unwrap_or(1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Write a text file, creating parent directories if needed.
///
/// # Errors
///
/// Returns an error if directories or file contents cannot be written.
pub fn write_file(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)
}

fn ensure_seqkit_built() -> Result<(), String> {
    match BUILD_SEQKIT.get_or_init(|| {
        let status = Command::new("cargo")
            .arg("build")
            .arg("-q")
            .arg("-p")
            .arg("seqkit")
            .status()
            .map_err(|error| format!("failed to build seqkit binary: {error}"))?;

        if status.success() {
            Ok(())
        } else {
            Err(format!(
                "failed to build seqkit binary: cargo exited with status {status}"
            ))
        }
    }) {
        Ok(()) => Ok(()),
        Err(error) => Err(error.clone()),
    }
}

fn seqkit_bin() -> Result<PathBuf, String> {
    let mut path = std::env::current_exe()
        .map_err(|error| format!("failed to determine current executable: {error}"))?;
    if !path.pop() {
        return Err("failed to resolve test executable directory".to_string());
    }
    if path.ends_with("deps") {
        let _ = path.pop();
    }
    Ok(path.join(format!("seqkit{}", std::env::consts::EXE_SUFFIX)))
}
