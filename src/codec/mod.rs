//! Value codec: host values to interpreter literals, raw text back to
//! scalars and tables.

use serde::{Deserialize, Serialize};

use crate::process::Dialect;

/// A value supplied by the caller for injection before a fragment runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<HostValue>),
}

impl HostValue {
    /// Parse a command-line value: JSON when it parses, a bare string otherwise.
    pub fn parse_lenient(text: &str) -> Self {
        serde_json::from_str(text).unwrap_or_else(|_| HostValue::Str(text.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Scalar {
    pub fn parse(cell: &str) -> Self {
        let cell = cell.trim();
        if cell.is_empty() {
            return Scalar::Null;
        }
        if let Ok(i) = cell.parse::<i64>() {
            return Scalar::Int(i);
        }
        if let Ok(f) = cell.parse::<f64>() {
            // Rust accepts "inf"/"nan" spellings; only take them when they look numeric.
            if f.is_finite() || cell.chars().any(|c| c.is_ascii_digit()) {
                return Scalar::Float(f);
            }
        }
        match cell {
            "true" | "True" | "TRUE" => Scalar::Bool(true),
            "false" | "False" | "FALSE" => Scalar::Bool(false),
            _ => Scalar::Str(cell.to_string()),
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(x) => write!(f, "{}", x),
            Scalar::Str(s) => f.write_str(s),
        }
    }
}

/// What an evaluation hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EvaluationResult {
    Raw(String),
    Scalar(Scalar),
    Table(Vec<Vec<Scalar>>),
}

/// Decides when raw text is a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct TableHeuristic {
    /// Column separators, tried in order; the first one that yields a
    /// consistent grid wins.
    pub separators: Vec<char>,
    /// Treat several separator-free lines as a one-column table.
    pub multiline_as_column: bool,
}

impl Default for TableHeuristic {
    fn default() -> Self {
        Self { separators: vec!['\t'], multiline_as_column: false }
    }
}

/// `name = <literal>` in the dialect's assignment syntax.
pub fn encode(dialect: &dyn Dialect, name: &str, value: &HostValue) -> String {
    dialect.assign(name, &dialect.literal(value))
}

/// Assignment lines for every variable, sorted by name so the preamble is
/// stable regardless of map order.
pub fn preamble<'a, I>(dialect: &dyn Dialect, vars: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a HostValue)>,
{
    let mut vars: Vec<_> = vars.into_iter().collect();
    vars.sort_by(|a, b| a.0.cmp(b.0));
    let mut out = String::new();
    for (name, value) in vars {
        out.push_str(&encode(dialect, name, value));
        out.push('\n');
    }
    out
}

pub fn decode(raw: &str, heuristic: &TableHeuristic) -> EvaluationResult {
    match parse_grid(raw, heuristic) {
        Some(rows) => EvaluationResult::Table(rows),
        None => {
            tracing::debug!(len = raw.len(), "raw text is not a grid; decoding as scalar");
            EvaluationResult::Scalar(Scalar::parse(raw))
        }
    }
}

fn parse_grid(raw: &str, heuristic: &TableHeuristic) -> Option<Vec<Vec<Scalar>>> {
    let lines: Vec<&str> = raw
        .trim_matches(|c| c == '\n' || c == '\r')
        .lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .collect();
    if lines.is_empty() {
        return None;
    }

    for &sep in &heuristic.separators {
        if !lines.iter().any(|l| l.contains(sep)) {
            continue;
        }
        let width = lines[0].split(sep).count();
        if lines.iter().all(|l| l.split(sep).count() == width) {
            return Some(
                lines
                    .iter()
                    .map(|l| l.split(sep).map(Scalar::parse).collect())
                    .collect(),
            );
        }
    }

    if heuristic.multiline_as_column && lines.len() > 1 {
        return Some(lines.iter().map(|l| vec![Scalar::parse(l)]).collect());
    }
    None
}
