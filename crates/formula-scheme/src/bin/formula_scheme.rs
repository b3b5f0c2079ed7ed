use std::io::{self, BufRead, Write};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use formula_scheme::{make_root_environment_with_options, parse, EvalOptions, Value};

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(about = "Evaluate s-expression or algebraic expressions against lazily defined parameters.")]
struct Args {
    /// Expressions to evaluate. Reads one expression per non-blank stdin line when omitted.
    expressions: Vec<String>,

    /// Lazy definition `NAME=EXPR` (repeatable). Definitions may refer to each other in any order.
    #[arg(long = "define", value_name = "NAME=EXPR")]
    definitions: Vec<String>,

    /// Parameter value `NAME=EXPR` (repeatable), evaluated immediately and bound as a value.
    #[arg(long = "set", value_name = "NAME=EXPR")]
    values: Vec<String>,

    /// Maximum evaluation nesting depth.
    #[arg(long, default_value_t = formula_scheme::DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

fn split_assignment(arg: &str) -> Result<(&str, &str)> {
    let (name, expr) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("expected NAME=EXPR, got {arg:?}"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("missing name in {arg:?}"));
    }
    Ok((name, expr.trim()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let env = make_root_environment_with_options(
        EvalOptions::default().with_max_depth(args.max_depth),
    );

    for definition in &args.definitions {
        let (name, text) = split_assignment(definition)?;
        let expr = parse(text).with_context(|| format!("parsing definition of {name}"))?;
        env.define(name, expr);
    }

    // Values are bound one at a time so later ones may refer to earlier ones.
    for assignment in &args.values {
        let (name, text) = split_assignment(assignment)?;
        let expr = parse(text).with_context(|| format!("parsing value of {name}"))?;
        let value = env
            .evaluate(&expr)
            .with_context(|| format!("evaluating value of {name}"))?;
        env.add(name, value);
    }

    let expressions = if args.expressions.is_empty() {
        io::stdin()
            .lock()
            .lines()
            .collect::<io::Result<Vec<_>>>()
            .context("reading expressions from stdin")?
            .into_iter()
            .filter(|line| !line.trim().is_empty())
            .collect()
    } else {
        args.expressions
    };

    let mut results: Vec<(String, Value)> = Vec::with_capacity(expressions.len());
    for text in expressions {
        let expr = parse(&text).with_context(|| format!("parsing {text:?}"))?;
        let value = env
            .evaluate(&expr)
            .with_context(|| format!("evaluating {text:?}"))?;
        results.push((text, value));
    }

    match write_results(&results, &args.format) {
        // A consumer such as `head` closed the pipe early.
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other.context("writing results"),
    }
}

fn write_results(results: &[(String, Value)], format: &OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Text => {
            for (_, value) in results {
                if *value != Value::Unspecified {
                    writeln!(out, "{value}")?;
                }
            }
        }
        OutputFormat::Json => {
            let json: Vec<serde_json::Value> = results
                .iter()
                .map(|(expression, value)| {
                    serde_json::json!({ "expression": expression, "value": value })
                })
                .collect();
            serde_json::to_writer_pretty(&mut out, &json)?;
            writeln!(out)?;
        }
    }
    out.flush()
}
