//! POSIX shell dialect. The value of a shell fragment is its stdout.

use std::path::Path;

use super::Dialect;
use crate::codec::HostValue;

pub struct Shell;

/// Single-quote for sh: nothing inside is special except the quote itself.
pub(crate) fn single_quoted(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

fn plain(value: &HostValue) -> String {
    match value {
        HostValue::Null => String::new(),
        HostValue::Bool(b) => b.to_string(),
        HostValue::Int(i) => i.to_string(),
        HostValue::Float(f) => f.to_string(),
        HostValue::Str(s) => s.clone(),
        HostValue::List(items) => {
            if items.iter().any(|v| matches!(v, HostValue::List(_))) {
                items
                    .iter()
                    .map(|row| match row {
                        HostValue::List(cells) => cells.iter().map(plain).collect::<Vec<_>>().join("\t"),
                        other => plain(other),
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            } else {
                items.iter().map(plain).collect::<Vec<_>>().join("\n")
            }
        }
    }
}

impl Dialect for Shell {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn oneshot_command(&self) -> (&'static str, Vec<&'static str>) {
        ("sh", vec![])
    }

    fn session_command(&self) -> (&'static str, Vec<&'static str>) {
        ("sh", vec![])
    }

    fn source_extension(&self) -> &'static str {
        "sh"
    }

    fn bootstrap(&self) -> Vec<String> {
        vec!["exec 2>&1".to_string()]
    }

    fn value_harness(&self, source: &str, artifact: &Path, _pp: bool) -> String {
        format!(
            "eval {} > {}",
            single_quoted(source),
            single_quoted(&artifact.to_string_lossy())
        )
    }

    fn sentinel_line(&self, token: &str) -> String {
        format!("printf '%s\\n' {}", single_quoted(token))
    }

    fn literal(&self, value: &HostValue) -> String {
        match value {
            HostValue::Int(i) => i.to_string(),
            other => single_quoted(&plain(other)),
        }
    }

    fn assign(&self, name: &str, literal: &str) -> String {
        format!("{}={}", name, literal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_survive_single_quoting() {
        assert_eq!(single_quoted("it's"), "'it'\\''s'");
    }

    #[test]
    fn nested_lists_become_tab_grids() {
        let v = HostValue::List(vec![
            HostValue::List(vec![HostValue::Int(1), HostValue::Int(2)]),
            HostValue::List(vec![HostValue::Int(3), HostValue::Int(4)]),
        ]);
        assert_eq!(Shell.literal(&v), "'1\t2\n3\t4'");
        assert_eq!(Shell.assign("t", &Shell.literal(&v)), "t='1\t2\n3\t4'");
    }

    #[test]
    fn sentinel_prints_token_verbatim() {
        assert_eq!(Shell.sentinel_line("eoe"), "printf '%s\\n' 'eoe'");
    }
}
