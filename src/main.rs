use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing::{info, warn};

use mutation_approx::config::{ConfigOverrides, MutationConfig};
use mutation_approx::driver::{self, GenerateOptions, OperatorSummary, Selection, SourceUnit};
use mutation_approx::OperatorRegistry;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Rust source file to mutate.
    #[arg(short, long, required_unless_present = "list")]
    input: Option<PathBuf>,

    /// Root of the mutant tree: `<output-dir>/<operator>/<index>/`.
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Operator to apply (repeatable). Defaults to every registered operator.
    #[arg(long = "operator")]
    operators: Vec<String>,

    /// TOML file with defaults for the options above.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// List the registered operators and exit.
    #[arg(long, default_value_t = false)]
    list: bool,

    /// Force a particular mutant index (0-based) of each operator's plan.
    /// If out of range, a random mutant is picked instead.
    #[arg(long, conflicts_with = "sample")]
    index: Option<usize>,

    /// Seed for random mutant selection.
    #[arg(long)]
    seed: Option<u64>,

    /// Generate at most N randomly chosen mutants per operator.
    #[arg(long)]
    sample: Option<usize>,

    /// Re-format mutants with prettyplease.
    #[arg(long, default_value_t = false)]
    pretty: bool,

    /// Print a JSON summary of the run to stdout.
    #[arg(long, default_value_t = false)]
    emit_summary: bool,

    /// Debug logging (overridden by RUST_LOG).
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose { "mutation_approx=debug,warn" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    init_logging(args.verbose);

    let registry = OperatorRegistry::builtin();
    if args.list {
        for op in registry.iter() {
            let kind = if op.is_composite() { "composite" } else { "first-order" };
            println!("{:<24} {:<12} {}", op.name(), kind, op.description());
            for m in op.mutators() {
                println!("    {:<20} {}", m.name(), m.description());
            }
        }
        return Ok(());
    }

    let file_config = match &args.config {
        Some(path) => MutationConfig::load_from_file(path)?,
        None => MutationConfig::default(),
    };
    let config = file_config.with_overrides(ConfigOverrides {
        operators: args.operators.clone(),
        output_dir: args.output_dir.clone(),
        pretty: args.pretty,
        sample: args.sample,
        seed: args.seed,
    });

    let input = args.input.context("--input is required")?;
    let unit = SourceUnit::read(&input).with_context(|| format!("failed to read {}", input.display()))?;
    let operators = registry.select(&config.operators)?;

    let selection = match (args.index, config.sample) {
        (Some(i), _) => Selection::Index(i),
        (None, Some(n)) => Selection::Sample(n),
        (None, None) => Selection::All,
    };
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let options = GenerateOptions { pretty: config.pretty };

    let mut summaries: Vec<OperatorSummary> = Vec::new();
    for operator in operators {
        let summary = driver::run_operator(&unit, operator, &config.output_dir, selection, options, &mut rng)
            .with_context(|| format!("operator {} failed on {}", operator.name(), input.display()))?;
        info!(
            operator = operator.name(),
            planned = summary.planned,
            generated = summary.generated.len(),
            failed = summary.failed.len(),
            "operator done"
        );
        for failure in &summary.failed {
            warn!("{failure}");
        }
        summaries.push(summary);
    }

    let generated: usize = summaries.iter().map(|s| s.generated.len()).sum();
    let failed: usize = summaries.iter().map(|s| s.failed.len()).sum();
    if args.emit_summary {
        let payload = serde_json::json!({
            "input": input,
            "output_dir": config.output_dir,
            "generated": generated,
            "failed": failed,
            "operators": summaries,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        eprintln!("{generated} mutant(s) written to {}, {failed} skipped.", config.output_dir.display());
    }
    Ok(())
}
