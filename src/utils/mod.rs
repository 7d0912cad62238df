//! Input helpers for the command-line front end.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::codec::HostValue;

/// Line separating fragments when several arrive on stdin.
pub const FRAGMENT_DELIMITER: &str = "__evalblock__eof__";

/// Read one source file.
pub fn read_source(file_path: &str) -> Result<String> {
    let path = Path::new(file_path);

    if !path.exists() {
        bail!("Source file '{}' does not exist", file_path);
    }
    if !path.is_file() {
        bail!("'{}' is not a file", file_path);
    }

    fs::read_to_string(path).with_context(|| format!("Failed to read file '{}'", file_path))
}

/// Split stdin text into fragments on delimiter lines. Blank fragments
/// are dropped.
pub fn split_fragments(text: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut current = String::new();
    for line in text.lines() {
        if line.trim() == FRAGMENT_DELIMITER {
            fragments.push(std::mem::take(&mut current));
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    fragments.push(current);
    fragments.retain(|f| !f.trim().is_empty());
    fragments
}

/// Parse `NAME=VALUE`; the value is JSON when it parses, a string otherwise.
pub fn parse_var(text: &str) -> Result<(String, HostValue)> {
    let Some((name, value)) = text.split_once('=') else {
        bail!("variable '{}' must look like NAME=VALUE", text);
    };
    let name = name.trim();
    if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
        bail!("invalid variable name '{}'", name);
    }
    Ok((name.to_string(), HostValue::parse_lenient(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdin_splits_on_delimiter_lines() {
        let text = "x = 5\n__evalblock__eof__\nx + 1\n__evalblock__eof__\n\n";
        assert_eq!(split_fragments(text), vec!["x = 5\n".to_string(), "x + 1\n".to_string()]);
    }

    #[test]
    fn single_fragment_without_delimiter() {
        assert_eq!(split_fragments("print(1)"), vec!["print(1)\n".to_string()]);
    }

    #[test]
    fn vars_parse_json_or_text() {
        assert_eq!(parse_var("n=3").unwrap(), ("n".to_string(), HostValue::Int(3)));
        assert_eq!(
            parse_var("msg=hello there").unwrap(),
            ("msg".to_string(), HostValue::Str("hello there".into()))
        );
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("bad name=1").is_err());
    }

    #[test]
    fn missing_source_is_an_error() {
        assert!(read_source("/nonexistent/evalblock/source.py").is_err());
    }
}
