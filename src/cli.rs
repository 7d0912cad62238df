use clap::{ArgGroup, Parser};

#[derive(Parser, Debug, Clone)]
#[command(name = "evalblock", about = "Evaluate code fragments in an external interpreter", version)]
#[command(group(ArgGroup::new("md_switch").args(["md", "no_md"]).multiple(false)))]
pub struct Cli {
    /// Source file to evaluate. Reads stdin when omitted.
    #[arg(value_name = "FILE")]
    pub file: Option<String>,

    /// Interpreter dialect (python|r|shell).
    #[arg(short = 'i', long)]
    pub interpreter: Option<String>,

    /// Executable to launch instead of the dialect default.
    #[arg(long)]
    pub command: Option<String>,

    /// Session identifier; "none" runs each fragment in a fresh process.
    #[arg(short = 's', long, default_value = "none")]
    pub session: String,

    /// Capture printed output or the final value.
    #[arg(short = 'r', long, default_value = "value", value_parser = ["output", "value"])]
    pub results: String,

    /// Result shape hints (code, pp, table, output). Repeatable.
    #[arg(short = 'p', long = "param", action = clap::ArgAction::Append)]
    pub params: Vec<String>,

    /// Variable injected before the fragment runs, as NAME=JSON. Repeatable.
    #[arg(long = "var", action = clap::ArgAction::Append)]
    pub vars: Vec<String>,

    /// Column names for table results, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub colnames: Option<Vec<String>>,

    /// Row names for table results, comma separated.
    #[arg(long, value_delimiter = ',')]
    pub rownames: Option<Vec<String>>,

    /// Seconds to wait for a session or one-shot process before giving up.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Render tables as markdown.
    #[arg(long)]
    pub md: bool,
    /// Print tables as aligned plain text.
    #[arg(long = "no-md")]
    pub no_md: bool,

    /// Print the result as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
