//! Interpreter process management (dialects, startup, one-shot runs).

use std::{path::Path, process::Stdio, str::FromStr, sync::Arc};

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use crate::{
    codec::HostValue,
    error::{EvalError, Result},
};

pub mod launcher;
pub mod python;
pub mod r;
pub mod shell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpreterType {
    Python,
    R,
    Shell,
}

impl InterpreterType {
    pub fn dialect(self) -> Arc<dyn Dialect> {
        match self {
            InterpreterType::Python => Arc::new(python::Python),
            InterpreterType::R => Arc::new(r::R),
            InterpreterType::Shell => Arc::new(shell::Shell),
        }
    }
}

impl FromStr for InterpreterType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" | "python3" | "py" => Ok(Self::Python),
            "r" | "rscript" => Ok(Self::R),
            "sh" | "shell" | "bash" => Ok(Self::Shell),
            other => Err(format!("unknown interpreter: {}", other)),
        }
    }
}

/// Which pipe a transcript line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Language-specific framing around an otherwise opaque interpreter.
///
/// Every line a dialect produces for session mode must be a complete
/// statement on its own, so the synchronizer can write it without knowing
/// the language.
pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Program and arguments for a one-shot run; the source file path is
    /// appended as the last argument.
    fn oneshot_command(&self) -> (&'static str, Vec<&'static str>);

    /// Program and arguments for a persistent interactive process.
    fn session_command(&self) -> (&'static str, Vec<&'static str>);

    fn source_extension(&self) -> &'static str;

    /// Lines sent once when a session starts.
    fn bootstrap(&self) -> Vec<String> {
        Vec::new()
    }

    /// How an output-mode fragment is written to the session.
    fn session_output_lines(&self, source: &str) -> Vec<String> {
        source.lines().map(str::to_string).collect()
    }

    /// One line that runs `source` with its stdout silenced and writes the
    /// final value to `artifact`.
    fn value_harness(&self, source: &str, artifact: &Path, pp: bool) -> String;

    /// A complete program doing the same as `value_harness` for a fresh
    /// process.
    fn oneshot_value_script(&self, source: &str, artifact: &Path, pp: bool) -> String {
        self.value_harness(source, artifact, pp)
    }

    /// A statement that prints `token` on its own line.
    fn sentinel_line(&self, token: &str) -> String;

    /// Strip prompt/echo noise; `None` drops the line entirely.
    fn clean_line(&self, _stream: Stream, line: String) -> Option<String> {
        Some(line)
    }

    fn literal(&self, value: &HostValue) -> String;

    fn assign(&self, name: &str, literal: &str) -> String;
}

/// A live interactive interpreter with all three pipes taken.
pub struct ProcessHandle {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Start the dialect's interactive process.
pub fn start_interactive(dialect: &dyn Dialect, program: Option<&str>) -> Result<ProcessHandle> {
    let (default_program, args) = dialect.session_command();
    let program = program.unwrap_or(default_program);

    let mut cmd = Command::new(program);
    cmd.args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child: Child = cmd.spawn().map_err(|source| EvalError::ProcessSpawnFailure {
        program: program.to_string(),
        source,
    })?;
    tracing::debug!(program, pid = child.id(), dialect = dialect.name(), "started interactive interpreter");

    let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

    Ok(ProcessHandle { child, stdin, stdout, stderr })
}

fn missing_pipe(which: &str) -> EvalError {
    EvalError::Io(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("no {} on interpreter process", which),
    ))
}

/// Shared escaping for dialects whose string literals accept JSON escapes.
pub(crate) fn quoted(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{}\"", s.escape_default()))
}
