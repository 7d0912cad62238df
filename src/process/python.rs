//! Python dialect: `python3 -i` sessions and a value helper built on `ast`.

use std::path::Path;

use super::{quoted, Dialect, Stream};
use crate::codec::HostValue;

/// Defined once per process. Runs every statement with stdout redirected to
/// a discarded buffer, evaluates a trailing expression and writes it to
/// `path` (rows by newline, cells by tab).
const VALUE_HELPER: &str = r#"def __evalblock_value(src, path, pp=False):
    import ast, contextlib, io, pprint
    tree = ast.parse(src)
    tail = None
    if tree.body and isinstance(tree.body[-1], ast.Expr):
        tail = ast.Expression(tree.body.pop().value)
    g = globals()
    with contextlib.redirect_stdout(io.StringIO()):
        exec(compile(tree, "<fragment>", "exec"), g)
        value = eval(compile(tail, "<fragment>", "eval"), g) if tail is not None else None
    cell = lambda c: "" if c is None else str(c)
    if pp:
        text = pprint.pformat(value)
    elif value is None:
        text = ""
    elif isinstance(value, (list, tuple)):
        if all(isinstance(r, (list, tuple)) for r in value):
            text = "\n".join("\t".join(cell(c) for c in r) for r in value)
        else:
            text = "\t".join(cell(c) for c in value)
    else:
        text = cell(value)
    with open(path, "w") as f:
        f.write(text)
"#;

pub struct Python;

impl Python {
    fn call(source: &str, artifact: &Path, pp: bool) -> String {
        format!(
            "__evalblock_value({}, {}, {})",
            quoted(source),
            quoted(&artifact.to_string_lossy()),
            if pp { "True" } else { "False" }
        )
    }
}

impl Dialect for Python {
    fn name(&self) -> &'static str {
        "python"
    }

    fn oneshot_command(&self) -> (&'static str, Vec<&'static str>) {
        ("python3", vec![])
    }

    fn session_command(&self) -> (&'static str, Vec<&'static str>) {
        ("python3", vec!["-i", "-q", "-u"])
    }

    fn source_extension(&self) -> &'static str {
        "py"
    }

    fn bootstrap(&self) -> Vec<String> {
        vec![
            r#"import sys; sys.stderr = sys.stdout; sys.ps1 = ""; sys.ps2 = """#.to_string(),
            format!("exec({})", quoted(VALUE_HELPER)),
        ]
    }

    // The REPL needs a blank line after compound statements; running the
    // whole fragment through one exec() sidesteps that.
    fn session_output_lines(&self, source: &str) -> Vec<String> {
        vec![format!(
            "exec(compile({}, \"<fragment>\", \"exec\"), globals())",
            quoted(source)
        )]
    }

    fn value_harness(&self, source: &str, artifact: &Path, pp: bool) -> String {
        Self::call(source, artifact, pp)
    }

    fn oneshot_value_script(&self, source: &str, artifact: &Path, pp: bool) -> String {
        format!("{}\n{}\n", VALUE_HELPER, Self::call(source, artifact, pp))
    }

    fn sentinel_line(&self, token: &str) -> String {
        format!("print({})", quoted(token))
    }

    fn clean_line(&self, stream: Stream, line: String) -> Option<String> {
        if stream == Stream::Stdout {
            return Some(line);
        }
        let mut rest = line.as_str();
        let mut stripped = false;
        while let Some(r) = rest.strip_prefix(">>> ").or_else(|| rest.strip_prefix("... ")) {
            rest = r;
            stripped = true;
        }
        if stripped && rest.is_empty() {
            return None;
        }
        Some(rest.to_string())
    }

    fn literal(&self, value: &HostValue) -> String {
        match value {
            HostValue::Null => "None".into(),
            HostValue::Bool(true) => "True".into(),
            HostValue::Bool(false) => "False".into(),
            HostValue::Int(i) => i.to_string(),
            HostValue::Float(f) if f.is_nan() => "float(\"nan\")".into(),
            HostValue::Float(f) if f.is_infinite() => {
                if *f > 0.0 { "float(\"inf\")".into() } else { "float(\"-inf\")".into() }
            }
            HostValue::Float(f) => format!("{:?}", f),
            HostValue::Str(s) => quoted(s),
            HostValue::List(items) => {
                let inner: Vec<String> = items.iter().map(|v| self.literal(v)).collect();
                format!("[{}]", inner.join(", "))
            }
        }
    }

    fn assign(&self, name: &str, literal: &str) -> String {
        format!("{} = {}", name, literal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_use_python_spelling() {
        let p = Python;
        assert_eq!(p.literal(&HostValue::Null), "None");
        assert_eq!(p.literal(&HostValue::Bool(false)), "False");
        assert_eq!(p.literal(&HostValue::Float(1.0)), "1.0");
        assert_eq!(p.literal(&HostValue::Float(f64::NEG_INFINITY)), "float(\"-inf\")");
        assert_eq!(
            p.literal(&HostValue::List(vec![
                HostValue::List(vec![HostValue::Int(1), HostValue::Int(2)]),
                HostValue::Str("a'b".into()),
            ])),
            "[[1, 2], \"a'b\"]"
        );
    }

    #[test]
    fn output_fragment_becomes_one_exec_line() {
        let lines = Python.session_output_lines("for i in range(2):\n    print(i)\nprint('x')");
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("exec(compile(\"for i in range(2):\\n"));
    }

    #[test]
    fn prompts_on_stderr_are_noise() {
        let p = Python;
        assert_eq!(p.clean_line(Stream::Stderr, ">>> >>> ".into()), None);
        assert_eq!(p.clean_line(Stream::Stderr, ">>> Traceback".into()), Some("Traceback".into()));
        assert_eq!(p.clean_line(Stream::Stdout, ">>> kept".into()), Some(">>> kept".into()));
    }

    #[test]
    fn value_harness_is_single_line() {
        let line = Python.value_harness("x = 1\nx + 1", Path::new("/tmp/v.txt"), false);
        assert!(!line.contains('\n'));
        assert!(line.ends_with("\"/tmp/v.txt\", False)"));
    }
}
