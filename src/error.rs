//! Typed failures surfaced by the evaluation engine.

use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EvalError>;

#[derive(Error, Debug)]
pub enum EvalError {
    /// Executable not found or failed to start.
    #[error("failed to start interpreter `{program}`: {source}")]
    ProcessSpawnFailure {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// One-shot process exited with a failure status.
    #[error("interpreter exited with status {status}: {stderr}")]
    NonZeroExit { status: i32, stderr: String },

    /// The sentinel never came back within the configured wait.
    #[error("session `{session}` did not answer within {waited:?}")]
    SessionUnresponsive { session: String, waited: Duration },

    /// Output streams closed before the sentinel was seen.
    #[error("session `{session}` exited while evaluating")]
    SessionExited { session: String },

    #[error("one-shot evaluation did not finish within {waited:?}")]
    OneShotTimeout { waited: Duration },

    /// Value mode finished but the harness wrote nothing; the transcript
    /// normally holds the interpreter's error report.
    #[error("no value was produced: {transcript}")]
    MissingArtifact { transcript: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EvalError {
    /// Short label for the failure kind, used in CLI diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            EvalError::ProcessSpawnFailure { .. } => "spawn",
            EvalError::NonZeroExit { .. } => "exit",
            EvalError::SessionUnresponsive { .. } => "unresponsive",
            EvalError::SessionExited { .. } => "exited",
            EvalError::OneShotTimeout { .. } => "timeout",
            EvalError::MissingArtifact { .. } => "no-value",
            EvalError::Io(_) => "io",
        }
    }

    /// Failures after which the session must be discarded.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            EvalError::SessionUnresponsive { .. } | EvalError::SessionExited { .. }
        )
    }
}
