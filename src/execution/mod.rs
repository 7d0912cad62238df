//! Evaluation engine: fragment in, structured result out.

use std::{
    collections::{BTreeSet, HashMap},
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use serde::Serialize;

use crate::{
    codec::{preamble, EvaluationResult, HostValue, TableHeuristic},
    config::Config,
    error::Result,
    process::{launcher::Launcher, Dialect, InterpreterType},
    session::{SessionHandle, SessionOptions, SessionRegistry, NO_SESSION},
};

pub mod extract;

pub use extract::classify_and_decode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    /// What the fragment printed.
    Output,
    /// The fragment's final expression.
    Value,
}

impl FromStr for ResultType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "output" => Ok(Self::Output),
            "value" => Ok(Self::Value),
            other => Err(format!("unknown result type: {}", other)),
        }
    }
}

impl ResultType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultType::Output => "output",
            ResultType::Value => "value",
        }
    }
}

/// One unit of source to evaluate.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub source: String,
    pub vars: HashMap<String, HostValue>,
    pub result_type: ResultType,
    /// Shape hints such as `code`, `pp`, `table`, `output`; others are ignored.
    pub result_params: BTreeSet<String>,
    /// Session identifier, or `"none"` for a one-shot process.
    pub session: String,
    pub colnames: Option<Vec<String>>,
    pub rownames: Option<Vec<String>>,
}

impl Fragment {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            vars: HashMap::new(),
            result_type: ResultType::Value,
            result_params: BTreeSet::new(),
            session: NO_SESSION.to_string(),
            colnames: None,
            rownames: None,
        }
    }

    pub fn session(mut self, id: impl Into<String>) -> Self {
        self.session = id.into();
        self
    }

    pub fn result_type(mut self, ty: ResultType) -> Self {
        self.result_type = ty;
        self
    }

    pub fn param(mut self, p: impl Into<String>) -> Self {
        self.result_params.insert(p.into());
        self
    }

    pub fn var(mut self, name: impl Into<String>, value: HostValue) -> Self {
        self.vars.insert(name.into(), value);
        self
    }

    pub fn has_param(&self, p: &str) -> bool {
        self.result_params.contains(p)
    }
}

/// A result plus the name hints copied through from the fragment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub result: EvaluationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colnames: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rownames: Option<Vec<String>>,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub interpreter: InterpreterType,
    /// Executable override for both one-shot and session processes.
    pub program: Option<String>,
    pub session_wait: Duration,
    pub oneshot_wait: Duration,
    pub pacing: Duration,
    pub table: TableHeuristic,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            interpreter: InterpreterType::Python,
            program: None,
            session_wait: Duration::from_secs(30),
            oneshot_wait: Duration::from_secs(60),
            pacing: Duration::ZERO,
            table: TableHeuristic::default(),
        }
    }
}

impl EngineOptions {
    pub fn from_config(cfg: &Config) -> Self {
        let defaults = Self::default();
        let interpreter = cfg
            .get("EVALBLOCK_INTERPRETER")
            .and_then(|v| match v.parse() {
                Ok(ty) => Some(ty),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring EVALBLOCK_INTERPRETER");
                    None
                }
            })
            .unwrap_or(defaults.interpreter);
        let secs = |key: &str, fallback: Duration| {
            cfg.get_u64(key).map(Duration::from_secs).unwrap_or(fallback)
        };
        let separators = cfg
            .get("EVALBLOCK_TABLE_SEPARATORS")
            .map(|v| parse_separators(&v))
            .filter(|s| !s.is_empty())
            .unwrap_or(defaults.table.separators);

        Self {
            interpreter,
            program: cfg.get("EVALBLOCK_COMMAND").filter(|v| !v.trim().is_empty()),
            session_wait: secs("EVALBLOCK_SESSION_TIMEOUT", defaults.session_wait),
            oneshot_wait: secs("EVALBLOCK_ONESHOT_TIMEOUT", defaults.oneshot_wait),
            pacing: cfg
                .get_u64("EVALBLOCK_LINE_PACING_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.pacing),
            table: TableHeuristic {
                separators,
                multiline_as_column: cfg.get_bool("EVALBLOCK_MULTILINE_AS_COLUMN"),
            },
        }
    }
}

/// `\t` and `\s` escapes are accepted so tabs survive rc files.
fn parse_separators(v: &str) -> Vec<char> {
    let mut out = Vec::new();
    let mut chars = v.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('t') => out.push('\t'),
                Some('s') => out.push(' '),
                Some(other) => out.push(other),
                None => out.push('\\'),
            },
            c => out.push(c),
        }
    }
    out
}

pub struct Engine {
    dialect: Arc<dyn Dialect>,
    launcher: Launcher,
    registry: SessionRegistry,
    table: TableHeuristic,
}

impl Engine {
    pub fn new(options: EngineOptions) -> Self {
        let dialect = options.interpreter.dialect();
        let launcher = Launcher::new(dialect.clone(), options.program.clone(), options.oneshot_wait);
        let registry = SessionRegistry::new(
            dialect.clone(),
            SessionOptions {
                program: options.program,
                pacing: options.pacing,
                wait: options.session_wait,
            },
        );
        Self { dialect, launcher, registry, table: options.table }
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub async fn evaluate(&self, fragment: &Fragment) -> Result<Evaluation> {
        let mut source = preamble(self.dialect.as_ref(), &fragment.vars);
        source.push_str(&fragment.source);
        let pp = fragment.has_param("pp");
        tracing::debug!(
            session = %fragment.session,
            result_type = fragment.result_type.as_str(),
            vars = fragment.vars.len(),
            "evaluating fragment"
        );

        let raw = match self.registry.resolve(&fragment.session).await? {
            SessionHandle::OneShot => match fragment.result_type {
                ResultType::Output => {
                    let out = self.launcher.spawn_external(&source).await?;
                    out.trim_end_matches(['\n', '\r']).to_string()
                }
                ResultType::Value => self.launcher.spawn_external_value(&source, pp).await?,
            },
            SessionHandle::Interactive(mut lease) => {
                match lease.run(&source, fragment.result_type, pp).await {
                    Ok(raw) => raw,
                    Err(e) => {
                        if e.is_session_fatal() {
                            self.registry.discard(lease);
                        }
                        return Err(e);
                    }
                }
            }
        };

        Ok(Evaluation {
            result: classify_and_decode(&raw, fragment.result_type, &fragment.result_params, &self.table),
            colnames: fragment.colnames.clone(),
            rownames: fragment.rownames.clone(),
        })
    }

    /// Evaluate fragments in order, stopping at the first failure.
    pub async fn evaluate_all(&self, fragments: &[Fragment]) -> Result<Vec<Evaluation>> {
        let mut out = Vec::with_capacity(fragments.len());
        for f in fragments {
            out.push(self.evaluate(f).await?);
        }
        Ok(out)
    }

    pub async fn close_session(&self, id: &str) -> bool {
        self.registry.close(id).await
    }

    pub async fn close_all(&self) {
        self.registry.close_all().await
    }

    pub fn sessions(&self) -> Vec<String> {
        self.registry.sessions()
    }
}
