use std::{
    collections::HashMap,
    env,
    fs,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use directories::BaseDirs;

#[derive(Debug, Clone)]
pub struct Config {
    inner: HashMap<String, String>,
    pub config_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        Self::load_from(&default_config_path())
    }

    /// Defaults, then the rc file at `path`, then `EVALBLOCK_*` environment
    /// variables.
    pub fn load_from(path: &Path) -> Self {
        let mut map = default_map();

        if path.exists() {
            match fs::File::open(path) {
                Ok(file) => {
                    let reader = BufReader::new(file);
                    for line in reader.lines().map_while(Result::ok) {
                        let line = line.trim();
                        if line.is_empty() || line.starts_with('#') {
                            continue;
                        }
                        if let Some((k, v)) = line.split_once('=') {
                            map.insert(k.trim().to_string(), v.trim().to_string());
                        }
                    }
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "cannot read config file"),
            }
        }

        for (k, v) in env::vars() {
            if is_config_key(&k) {
                map.insert(k, v);
            }
        }

        Self { inner: map, config_path: path.to_path_buf() }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key).cloned()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.inner.insert(key.to_string(), value.into());
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key)
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse::<u64>().ok())
    }
}

fn is_config_key(k: &str) -> bool {
    k.starts_with("EVALBLOCK_")
}

fn default_config_path() -> PathBuf {
    let base = BaseDirs::new()
        .map(|b| b.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("~/.config"));
    base.join("evalblock").join(".evalblockrc")
}

fn default_map() -> HashMap<String, String> {
    let mut m = HashMap::new();

    // Strings
    m.insert("EVALBLOCK_INTERPRETER".into(), "python".into());
    m.insert("EVALBLOCK_TABLE_SEPARATORS".into(), "\\t".into());

    // Numbers
    m.insert("EVALBLOCK_SESSION_TIMEOUT".into(), "30".into());
    m.insert("EVALBLOCK_ONESHOT_TIMEOUT".into(), "60".into());
    m.insert("EVALBLOCK_LINE_PACING_MS".into(), "0".into());

    // Bools as strings
    m.insert("EVALBLOCK_MULTILINE_AS_COLUMN".into(), "false".into());
    m.insert("EVALBLOCK_PRETTIFY".into(), "true".into());

    m
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::execution::EngineOptions;
    use crate::process::InterpreterType;

    #[test]
    fn rc_file_overrides_defaults() {
        let mut rc = tempfile::NamedTempFile::new().unwrap();
        writeln!(rc, "# comment").unwrap();
        writeln!(rc, "EVALBLOCK_INTERPRETER = shell").unwrap();
        writeln!(rc, "EVALBLOCK_SESSION_TIMEOUT=5").unwrap();
        writeln!(rc, "EVALBLOCK_TABLE_SEPARATORS=\\t,").unwrap();

        let cfg = Config::load_from(rc.path());
        if env::var("EVALBLOCK_INTERPRETER").is_err() {
            assert_eq!(cfg.get("EVALBLOCK_INTERPRETER").as_deref(), Some("shell"));
        }
        assert!(cfg.get_bool("EVALBLOCK_PRETTIFY") || env::var("EVALBLOCK_PRETTIFY").is_ok());
        assert_eq!(cfg.get("MISSING"), None);
    }

    #[test]
    fn typed_options_follow_the_map() {
        let mut cfg = Config::load_from(Path::new("/nonexistent/evalblockrc"));
        cfg.set("EVALBLOCK_INTERPRETER", "r");
        cfg.set("EVALBLOCK_SESSION_TIMEOUT", "7");
        cfg.set("EVALBLOCK_LINE_PACING_MS", "15");
        cfg.set("EVALBLOCK_TABLE_SEPARATORS", "\\t,");
        cfg.set("EVALBLOCK_MULTILINE_AS_COLUMN", "TRUE");
        cfg.set("EVALBLOCK_COMMAND", "");

        let opts = EngineOptions::from_config(&cfg);
        assert_eq!(opts.interpreter, InterpreterType::R);
        assert_eq!(opts.session_wait, std::time::Duration::from_secs(7));
        assert_eq!(opts.pacing, std::time::Duration::from_millis(15));
        assert_eq!(opts.table.separators, vec!['\t', ',']);
        assert!(opts.table.multiline_as_column);
        assert_eq!(opts.program, None);
    }

    #[test]
    fn bad_interpreter_falls_back_to_default() {
        let mut cfg = Config::load_from(Path::new("/nonexistent/evalblockrc"));
        cfg.set("EVALBLOCK_INTERPRETER", "cobol");
        assert_eq!(EngineOptions::from_config(&cfg).interpreter, InterpreterType::Python);
    }
}
