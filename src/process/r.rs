//! R dialect.

use std::path::Path;

use super::{quoted, Dialect};
use crate::codec::HostValue;

pub struct R;

impl Dialect for R {
    fn name(&self) -> &'static str {
        "r"
    }

    fn oneshot_command(&self) -> (&'static str, Vec<&'static str>) {
        ("Rscript", vec!["--vanilla"])
    }

    fn session_command(&self) -> (&'static str, Vec<&'static str>) {
        ("R", vec!["--no-save", "--no-restore", "--no-echo", "--interactive"])
    }

    fn source_extension(&self) -> &'static str {
        "R"
    }

    fn bootstrap(&self) -> Vec<String> {
        vec!["options(width = 10000, warn = 1)".to_string()]
    }

    fn value_harness(&self, source: &str, artifact: &Path, pp: bool) -> String {
        let path = quoted(&artifact.to_string_lossy());
        let write = if pp {
            format!("writeLines(utils::capture.output(print(.v)), {path})")
        } else {
            format!(
                "if (is.data.frame(.v) || is.matrix(.v)) utils::write.table(.v, file = {path}, sep = \"\\t\", quote = FALSE, row.names = FALSE, col.names = FALSE) \
                 else if (is.list(.v)) writeLines(vapply(.v, function(r) paste(r, collapse = \"\\t\"), \"\"), {path}) \
                 else writeLines(paste(as.character(.v), collapse = \"\\t\"), {path})"
            )
        };
        format!(
            "invisible(local({{ .z <- file(nullfile(), open = \"wt\"); sink(.z); .v <- tryCatch(eval(parse(text = {src}), envir = globalenv()), finally = {{ sink(); close(.z) }}); {write} }}))",
            src = quoted(source),
        )
    }

    fn sentinel_line(&self, token: &str) -> String {
        format!("cat({}, \"\\n\", sep = \"\")", quoted(token))
    }

    fn literal(&self, value: &HostValue) -> String {
        match value {
            HostValue::Null => "NULL".into(),
            HostValue::Bool(true) => "TRUE".into(),
            HostValue::Bool(false) => "FALSE".into(),
            HostValue::Int(i) => i.to_string(),
            HostValue::Float(f) if f.is_nan() => "NaN".into(),
            HostValue::Float(f) if f.is_infinite() => {
                if *f > 0.0 { "Inf".into() } else { "-Inf".into() }
            }
            HostValue::Float(f) => format!("{:?}", f),
            HostValue::Str(s) => quoted(s),
            HostValue::List(items) => {
                let nested = items.iter().any(|v| matches!(v, HostValue::List(_)));
                let inner: Vec<String> = items.iter().map(|v| self.literal(v)).collect();
                if nested {
                    format!("list({})", inner.join(", "))
                } else {
                    format!("c({})", inner.join(", "))
                }
            }
        }
    }

    fn assign(&self, name: &str, literal: &str) -> String {
        format!("{} <- {}", name, literal)
    }
}
