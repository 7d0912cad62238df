//! Printers: plain text and markdown (termimad).

use owo_colors::OwoColorize;
use termimad::MadSkin;
use unicode_width::UnicodeWidthStr;

use crate::{
    codec::{EvaluationResult, Scalar},
    execution::Evaluation,
};

/// Cells with row names prepended and a header when column names exist.
fn layout(eval: &Evaluation, rows: &[Vec<Scalar>]) -> (Option<Vec<String>>, Vec<Vec<String>>) {
    let mut body: Vec<Vec<String>> = rows
        .iter()
        .map(|r| r.iter().map(|c| c.to_string()).collect())
        .collect();
    let mut header = eval.colnames.clone();

    if let Some(names) = &eval.rownames {
        for (i, row) in body.iter_mut().enumerate() {
            row.insert(0, names.get(i).cloned().unwrap_or_default());
        }
        if let Some(h) = header.as_mut() {
            h.insert(0, String::new());
        }
    }
    (header, body)
}

pub struct TextPrinter {
    pub color: Option<&'static str>,
}

impl TextPrinter {
    pub fn render(&self, eval: &Evaluation) -> String {
        match &eval.result {
            EvaluationResult::Raw(text) => text.clone(),
            EvaluationResult::Scalar(s) => s.to_string(),
            EvaluationResult::Table(rows) => {
                let (header, body) = layout(eval, rows);
                let columns = body
                    .iter()
                    .chain(header.iter())
                    .map(|r| r.len())
                    .max()
                    .unwrap_or(0);
                let mut widths = vec![0usize; columns];
                for row in body.iter().chain(header.iter()) {
                    for (i, cell) in row.iter().enumerate() {
                        widths[i] = widths[i].max(UnicodeWidthStr::width(cell.as_str()));
                    }
                }
                let line = |row: &[String]| {
                    row.iter()
                        .enumerate()
                        .map(|(i, c)| pad(c, widths[i]))
                        .collect::<Vec<_>>()
                        .join("  ")
                        .trim_end()
                        .to_string()
                };

                let mut out = Vec::new();
                if let Some(h) = &header {
                    let text = line(h.as_slice());
                    out.push(match self.color {
                        Some("cyan") => format!("{}", text.cyan()),
                        Some("green") => format!("{}", text.green()),
                        Some("magenta") => format!("{}", text.magenta()),
                        _ => text,
                    });
                }
                out.extend(body.iter().map(|r| line(r.as_slice())));
                out.join("\n")
            }
        }
    }

    pub fn print(&self, eval: &Evaluation) {
        println!("{}", self.render(eval));
    }
}

fn pad(cell: &str, width: usize) -> String {
    let w = UnicodeWidthStr::width(cell);
    format!("{}{}", cell, " ".repeat(width.saturating_sub(w)))
}

pub struct MarkdownPrinter {
    pub skin: MadSkin,
}

impl Default for MarkdownPrinter {
    fn default() -> Self {
        Self { skin: MadSkin::default() }
    }
}

impl MarkdownPrinter {
    /// Markdown source for a table result; `None` for anything else.
    pub fn markdown(eval: &Evaluation) -> Option<String> {
        let EvaluationResult::Table(rows) = &eval.result else {
            return None;
        };
        let (header, body) = layout(eval, rows);
        let columns = body.iter().map(|r| r.len()).max().unwrap_or(0);
        let header = header.unwrap_or_else(|| vec![String::new(); columns]);

        let row = |cells: &[String]| {
            format!("|{}|", cells.iter().map(|c| c.replace('|', "\\|")).collect::<Vec<_>>().join("|"))
        };
        let mut md = vec![row(header.as_slice()), format!("|{}|", vec!["-"; header.len()].join("|"))];
        md.extend(body.iter().map(|r| row(r.as_slice())));
        Some(md.join("\n"))
    }

    pub fn print(&self, eval: &Evaluation) {
        match Self::markdown(eval) {
            Some(md) => {
                self.skin.print_text(&md);
            }
            None => TextPrinter { color: None }.print(eval),
        }
    }
}
