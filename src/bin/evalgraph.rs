use anyhow::{Context, Result};
use clap::Parser;
use evalgraph_core::display::trace;
use evalgraph_core::{builder, EvaluationContext};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Evaluate named expressions of an XML formula graph.
#[derive(Parser, Debug)]
#[command(name = "evalgraph", version)]
struct Cli {
    /// XML graph document
    file: PathBuf,

    /// Expressions to print (all of them, in declaration order, when omitted)
    names: Vec<String>,

    /// Input assignment; may be repeated
    #[arg(short, long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    set: Vec<(String, f64)>,

    /// Print an audit trace of every requested expression
    #[arg(long)]
    trace: bool,

    /// Print results as a JSON object
    #[arg(long)]
    json: bool,

    /// Print cache telemetry to stderr
    #[arg(long)]
    stats: bool,

    /// Log graph construction and recomputation passes
    #[arg(short, long)]
    verbose: bool,
}

fn parse_assignment(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid value for '{}': {e}", name.trim()))?;
    Ok((name.trim().to_string(), value))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "evalgraph_core=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli, ctx: &mut EvaluationContext) -> Result<Vec<(String, f64)>> {
    for (name, value) in &cli.set {
        ctx.set_variable(name, *value);
    }

    let names: Vec<String> = if cli.names.is_empty() {
        ctx.expression_names().map(str::to_string).collect()
    } else {
        cli.names.clone()
    };

    names
        .into_iter()
        .map(|name| {
            let value = ctx
                .evaluate(&name)
                .with_context(|| format!("cannot evaluate '{name}'"))?;
            Ok((name, value))
        })
        .collect()
}

/// JSON has no NaN or infinities; those are written as the strings `"NaN"`, `"inf"` and `"-inf"`.
fn json_number(value: f64) -> serde_json::Value {
    serde_json::Number::from_f64(value)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| serde_json::Value::String(value.to_string()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut ctx = builder::from_path(&cli.file)
        .with_context(|| format!("failed to build graph from {}", cli.file.display()))?;
    let results = run(&cli, &mut ctx)?;

    if cli.json {
        let object: serde_json::Map<String, serde_json::Value> = results
            .iter()
            .map(|(name, value)| (name.clone(), json_number(*value)))
            .collect();
        println!("{}", serde_json::to_string_pretty(&object)?);
    } else {
        for (name, value) in &results {
            println!("{name} = {value}");
        }
    }

    if cli.trace {
        for (name, _) in &results {
            println!("{}", trace::format_trace(&ctx, name));
        }
    }
    if cli.stats {
        eprintln!("{}", ctx.telemetry());
    }
    Ok(())
}
