//! One-shot evaluation: a fresh interpreter per fragment.

use std::{io::Write, path::PathBuf, process::Stdio, sync::Arc, time::Duration};

use tokio::{process::Command, time::timeout};

use super::Dialect;
use crate::error::{EvalError, Result};

pub struct Launcher {
    dialect: Arc<dyn Dialect>,
    program: Option<String>,
    limit: Duration,
}

impl Launcher {
    pub fn new(dialect: Arc<dyn Dialect>, program: Option<String>, limit: Duration) -> Self {
        Self { dialect, program, limit }
    }

    /// Run `source` as a file argument and return its stdout.
    pub async fn spawn_external(&self, source: &str) -> Result<String> {
        let mut file = tempfile::Builder::new()
            .prefix("evalblock-")
            .suffix(&format!(".{}", self.dialect.source_extension()))
            .tempfile()?;
        file.write_all(source.as_bytes())?;
        file.flush()?;

        let (default_program, args) = self.dialect.oneshot_command();
        let program = self.program.as_deref().unwrap_or(default_program);

        let mut cmd = Command::new(program);
        cmd.args(&args)
            .arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|source| EvalError::ProcessSpawnFailure {
            program: program.to_string(),
            source,
        })?;
        tracing::debug!(program, pid = child.id(), "started one-shot interpreter");

        // Dropping the wait future on timeout kills the child.
        let out = timeout(self.limit, child.wait_with_output())
            .await
            .map_err(|_| {
                tracing::warn!(waited = ?self.limit, "one-shot interpreter timed out");
                EvalError::OneShotTimeout { waited: self.limit }
            })??;

        let stdout = String::from_utf8_lossy(&out.stdout).into_owned();
        if !out.status.success() {
            let mut stderr = String::from_utf8_lossy(&out.stderr).trim_end().to_string();
            if stderr.is_empty() {
                stderr = stdout.trim_end().to_string();
            }
            return Err(EvalError::NonZeroExit {
                status: out.status.code().unwrap_or(-1),
                stderr,
            });
        }
        Ok(stdout)
    }

    /// Run `source` wrapped in the value harness and return the artifact text.
    pub async fn spawn_external_value(&self, source: &str, pp: bool) -> Result<String> {
        let scratch = Artifact::new()?;
        let script = self.dialect.oneshot_value_script(source, scratch.path(), pp);
        let transcript = self.spawn_external(&script).await?;
        scratch.take(&transcript).await
    }
}

/// Side-channel file a value harness writes into. Lives in its own
/// temporary directory so "never written" is distinguishable from "empty".
pub struct Artifact {
    _dir: tempfile::TempDir,
    path: PathBuf,
}

impl Artifact {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("evalblock-value-").tempdir()?;
        let path = dir.path().join("value.txt");
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Read and remove the artifact. `transcript` becomes the error text
    /// when nothing was written.
    pub async fn take(self, transcript: &str) -> Result<String> {
        let read = tokio::fs::read_to_string(&self.path).await;
        match read {
            Ok(text) => {
                tokio::fs::remove_file(&self.path).await.ok();
                Ok(text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(EvalError::MissingArtifact {
                transcript: transcript.trim().to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}
