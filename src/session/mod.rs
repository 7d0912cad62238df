//! Persistent interactive interpreters and the sentinel protocol that
//! delimits one fragment's output from the next.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin},
    sync::mpsc,
    time::{timeout_at, Instant},
};

use crate::{
    error::{EvalError, Result},
    execution::ResultType,
    process::{launcher::Artifact, start_interactive, Dialect, Stream},
};

pub mod registry;
pub mod transcript;

pub use registry::{SessionHandle, SessionLease, SessionRegistry, NO_SESSION};
pub use transcript::Transcript;

/// Marks the end of a fragment in the transcript. Chosen so ordinary
/// program output does not end with it.
pub const SENTINEL: &str = "evalblock_eoe_7f3a";

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub program: Option<String>,
    /// Delay after each written line; zero only yields to the scheduler.
    pub pacing: Duration,
    /// Longest wait for the sentinel.
    pub wait: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { program: None, pacing: Duration::ZERO, wait: Duration::from_secs(30) }
    }
}

pub struct Session {
    id: String,
    dialect: Arc<dyn Dialect>,
    child: Child,
    stdin: ChildStdin,
    lines: mpsc::UnboundedReceiver<(Stream, String)>,
    transcript: Transcript,
    alive: Arc<AtomicBool>,
    options: SessionOptions,
}

impl Session {
    /// Spawn the interpreter and run the dialect bootstrap; whatever the
    /// bootstrap prints is discarded.
    pub async fn start(id: &str, dialect: Arc<dyn Dialect>, options: SessionOptions) -> Result<Self> {
        let handle = start_interactive(dialect.as_ref(), options.program.as_deref())?;
        let alive = Arc::new(AtomicBool::new(true));
        let (tx, rx) = mpsc::unbounded_channel();
        pump(handle.stdout, Stream::Stdout, tx.clone(), alive.clone());
        pump(handle.stderr, Stream::Stderr, tx, alive.clone());

        let mut session = Session {
            id: id.to_string(),
            dialect,
            child: handle.child,
            stdin: handle.stdin,
            lines: rx,
            transcript: Transcript::default(),
            alive,
            options,
        };

        let bootstrap = session.dialect.bootstrap();
        if let Err(e) = session.run_lines(&bootstrap).await {
            session.kill();
            return Err(e);
        }
        tracing::debug!(session = id, "session ready");
        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn transcript_position(&self) -> u64 {
        self.transcript.position()
    }

    pub fn kill(&mut self) {
        self.alive.store(false, Ordering::SeqCst);
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(session = %self.id, error = %e, "kill failed; process already gone");
        }
    }

    /// Evaluate one fragment. Output mode returns the captured transcript;
    /// value mode returns what the harness wrote to its artifact.
    ///
    /// Dropping the returned future before it completes kills the process.
    pub async fn run(&mut self, source: &str, kind: ResultType, pp: bool) -> Result<String> {
        let mut flight = InFlight { session: self, finished: false };
        let res = flight.session.run_inner(source, kind, pp).await;
        flight.finished = true;
        if let Err(e) = &res {
            if e.is_session_fatal() {
                flight.session.kill();
            }
        }
        res
    }

    async fn run_inner(&mut self, source: &str, kind: ResultType, pp: bool) -> Result<String> {
        match kind {
            ResultType::Output => {
                let lines = self.dialect.session_output_lines(source);
                self.run_lines(&lines).await
            }
            ResultType::Value => {
                let artifact = Artifact::new()?;
                let harness = self.dialect.value_harness(source, artifact.path(), pp);
                let transcript = self.run_lines(&[harness]).await?;
                artifact.take(&transcript).await
            }
        }
    }

    /// Write `lines` then the sentinel, and collect output until the
    /// sentinel comes back.
    async fn run_lines(&mut self, lines: &[String]) -> Result<String> {
        let deadline = Instant::now() + self.options.wait;
        let sentinel = self.dialect.sentinel_line(SENTINEL);

        // Writes share the deadline; a stalled reader blocks on a full pipe.
        for line in lines.iter().chain(std::iter::once(&sentinel)) {
            self.write_line(line, deadline).await?;
            if self.options.pacing.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.options.pacing).await;
            }
        }

        loop {
            if let Some(captured) = self.transcript.take_until(SENTINEL) {
                tracing::debug!(session = %self.id, lines = captured.len(), position = self.transcript.position(), "sentinel seen");
                return Ok(captured.join("\n"));
            }
            match timeout_at(deadline, self.lines.recv()).await {
                Err(_) => {
                    tracing::warn!(session = %self.id, waited = ?self.options.wait, "sentinel did not arrive");
                    return Err(self.unresponsive());
                }
                Ok(None) => {
                    tracing::warn!(session = %self.id, unread = %self.transcript.unread(), "interpreter output closed");
                    return Err(EvalError::SessionExited { session: self.id.clone() });
                }
                Ok(Some((stream, line))) => {
                    if let Some(clean) = self.dialect.clean_line(stream, line) {
                        self.transcript.push(clean);
                    }
                }
            }
        }
    }

    async fn write_line(&mut self, line: &str, deadline: Instant) -> Result<()> {
        match timeout_at(deadline, send_line(&mut self.stdin, line)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::debug!(session = %self.id, error = %e, "write to interpreter failed");
                Err(EvalError::SessionExited { session: self.id.clone() })
            }
            Err(_) => {
                tracing::warn!(session = %self.id, waited = ?self.options.wait, "interpreter stopped reading input");
                Err(self.unresponsive())
            }
        }
    }

    fn unresponsive(&self) -> EvalError {
        EvalError::SessionUnresponsive { session: self.id.clone(), waited: self.options.wait }
    }
}

async fn send_line(stdin: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    stdin.write_all(line.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}

/// Kills the session if an evaluation is abandoned mid-flight.
struct InFlight<'a> {
    session: &'a mut Session,
    finished: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(session = %self.session.id, "evaluation cancelled; killing interpreter");
            self.session.kill();
        }
    }
}

/// Forward lines from one pipe into the shared channel. Stdout closing
/// means the interpreter is gone; a bootstrap may close stderr on purpose.
fn pump<R>(reader: R, stream: Stream, tx: mpsc::UnboundedSender<(Stream, String)>, alive: Arc<AtomicBool>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf);
                    let line = text.trim_end_matches(['\n', '\r']).to_string();
                    if tx.send((stream, line)).is_err() {
                        break;
                    }
                }
            }
        }
        if stream == Stream::Stdout {
            alive.store(false, Ordering::SeqCst);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::InterpreterType;

    fn options(wait: Duration) -> SessionOptions {
        SessionOptions { wait, ..Default::default() }
    }

    async fn shell(wait: Duration) -> Session {
        Session::start("t", InterpreterType::Shell.dialect(), options(wait)).await.unwrap()
    }

    #[tokio::test]
    async fn output_excludes_the_sentinel() {
        let mut s = shell(Duration::from_secs(10)).await;
        let out = s.run("echo hello", ResultType::Output, false).await.unwrap();
        assert_eq!(out, "hello");
        assert!(!out.contains(SENTINEL));
    }

    #[tokio::test]
    async fn bindings_persist_and_cursor_only_grows() {
        let mut s = shell(Duration::from_secs(10)).await;
        s.run("x=5", ResultType::Output, false).await.unwrap();
        let before = s.transcript_position();
        let out = s.run("echo $((x + 1))", ResultType::Output, false).await.unwrap();
        assert_eq!(out, "6");
        assert!(s.transcript_position() > before);
    }

    #[tokio::test]
    async fn value_mode_keeps_stdout_off_the_transcript() {
        let mut s = shell(Duration::from_secs(10)).await;
        let v = s.run("echo 21", ResultType::Value, false).await.unwrap();
        assert_eq!(v, "21\n");
        let out = s.run("echo after", ResultType::Output, false).await.unwrap();
        assert_eq!(out, "after");
    }

    #[tokio::test]
    async fn unterminated_output_is_kept() {
        let mut s = shell(Duration::from_secs(10)).await;
        let out = s.run("printf 'no newline'", ResultType::Output, false).await.unwrap();
        assert_eq!(out, "no newline");
    }

    #[tokio::test]
    async fn hang_becomes_unresponsive_and_kills() {
        let mut s = shell(Duration::from_millis(300)).await;
        let started = std::time::Instant::now();
        let err = s.run("sleep 10", ResultType::Output, false).await.unwrap_err();
        assert!(matches!(err, EvalError::SessionUnresponsive { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!s.is_alive());
    }

    #[tokio::test]
    async fn stalled_reader_bounds_large_writes() {
        let mut s = shell(Duration::from_millis(300)).await;
        let source = format!("sleep 20\n: {}", "x".repeat(400_000));
        let started = std::time::Instant::now();
        let res = tokio::time::timeout(Duration::from_secs(5), s.run(&source, ResultType::Output, false)).await;
        let err = res.expect("write loop ignored the deadline").unwrap_err();
        assert!(matches!(err, EvalError::SessionUnresponsive { .. }), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(!s.is_alive());
    }

    #[tokio::test]
    async fn exit_inside_fragment_is_reported() {
        let mut s = shell(Duration::from_secs(10)).await;
        let err = s.run("exit 0", ResultType::Output, false).await.unwrap_err();
        assert!(matches!(err, EvalError::SessionExited { .. }));
        assert!(!s.is_alive());
    }

    #[tokio::test]
    async fn dropped_evaluation_kills_the_process() {
        let mut s = shell(Duration::from_secs(10)).await;
        {
            let fut = s.run("sleep 10", ResultType::Output, false);
            let _ = tokio::time::timeout(Duration::from_millis(100), fut).await;
        }
        assert!(!s.is_alive());
    }
}
