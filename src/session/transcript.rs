//! Line buffer over a session's output with a cursor that only moves forward.

use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct Transcript {
    pending: VecDeque<String>,
    consumed: u64,
}

impl Transcript {
    pub fn push(&mut self, line: String) {
        self.pending.push_back(line);
    }

    /// Absolute number of lines handed out so far.
    pub fn position(&self) -> u64 {
        self.consumed
    }

    /// Text buffered past the cursor, for error reports.
    pub fn unread(&self) -> String {
        self.pending.iter().cloned().collect::<Vec<_>>().join("\n")
    }

    /// If a buffered line ends with `token`, consume everything up to and
    /// including it and return the lines before it. Text preceding the
    /// token on its own line is output that lacked a trailing newline.
    pub fn take_until(&mut self, token: &str) -> Option<Vec<String>> {
        let idx = self.pending.iter().position(|l| l.ends_with(token))?;
        let mut captured: Vec<String> = self.pending.drain(..=idx).collect();
        self.consumed += captured.len() as u64;

        if let Some(last) = captured.pop() {
            let prefix = &last[..last.len() - token.len()];
            if !prefix.is_empty() {
                captured.push(prefix.to_string());
            }
        }
        Some(captured)
    }
}
