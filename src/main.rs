mod cli;

use std::io::{self, Read};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use evalblock::{
    config::Config,
    printer::{MarkdownPrinter, TextPrinter},
    utils, Engine, EngineOptions, EvalError, Fragment, ResultType,
};

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries results; logs go to stderr (RUST_LOG controls level)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<EvalError>() {
                Some(eval) => eprintln!("{} [{}] {:#}", "error".red(), eval.kind(), e),
                None => eprintln!("{} {:#}", "error".red(), e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let args = cli::Cli::parse();
    let cfg = Config::load();
    let mut options = EngineOptions::from_config(&cfg);

    if let Some(name) = args.interpreter.as_deref() {
        options.interpreter = name.parse().map_err(|e: String| anyhow!(e))?;
    }
    if let Some(program) = &args.command {
        options.program = Some(program.clone());
    }
    if let Some(secs) = args.timeout {
        options.session_wait = Duration::from_secs(secs);
        options.oneshot_wait = Duration::from_secs(secs);
    }

    // Source: file argument, else stdin (several fragments allowed)
    let sources = match args.file.as_deref() {
        Some(path) => vec![utils::read_source(path)?],
        None => {
            if io::stdin().is_terminal() {
                bail!("Provide a source file or pipe fragments on stdin");
            }
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            utils::split_fragments(&buf)
        }
    };
    if sources.is_empty() {
        bail!("Nothing to evaluate");
    }

    let result_type: ResultType = args.results.parse().map_err(|e: String| anyhow!(e))?;
    let mut vars = Vec::new();
    for raw in &args.vars {
        vars.push(utils::parse_var(raw)?);
    }

    let md = if args.no_md {
        false
    } else if args.md {
        true
    } else {
        cfg.get_bool("EVALBLOCK_PRETTIFY") && io::stdout().is_terminal()
    };

    let engine = Engine::new(options);
    let outcome = evaluate_sources(&engine, &args, &sources, result_type, &vars, md).await;
    engine.close_all().await;
    outcome
}

async fn evaluate_sources(
    engine: &Engine,
    args: &cli::Cli,
    sources: &[String],
    result_type: ResultType,
    vars: &[(String, evalblock::HostValue)],
    md: bool,
) -> Result<()> {
    for (i, source) in sources.iter().enumerate() {
        let mut fragment = Fragment::new(source.as_str())
            .session(args.session.as_str())
            .result_type(result_type)
            .param(result_type.as_str());
        for p in &args.params {
            fragment = fragment.param(p.as_str());
        }
        for (name, value) in vars {
            fragment = fragment.var(name.as_str(), value.clone());
        }
        fragment.colnames = args.colnames.clone();
        fragment.rownames = args.rownames.clone();

        let eval = engine
            .evaluate(&fragment)
            .await
            .with_context(|| format!("fragment {} failed", i + 1))?;

        if args.json {
            println!("{}", serde_json::to_string(&eval)?);
        } else if md {
            MarkdownPrinter::default().print(&eval);
        } else {
            let color = io::stdout().is_terminal().then_some("cyan");
            TextPrinter { color }.print(&eval);
        }
    }
    Ok(())
}
