//! kvsim-compare: Cost the same input under every orchestration mode.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use serde::Serialize;

use kvcache_sim::cli;
use kvcache_sim::engine::comparison::COMPARISON_SALT;
use kvcache_sim::engine::rng::seeded_source;
use kvcache_sim::engine::ComparisonStats;
use kvcache_sim::tokenizer::{Tokenizer, WordTokenizer};
use kvcache_sim::{ComputationComparison, OrchestrationMode, SimulationConfig};

#[derive(Parser)]
#[command(name = "kvsim-compare", about = "Compare cached and uncached cost across modes")]
struct Args {
    /// Input text
    #[arg(short = 'p', long, conflicts_with_all = ["file", "stdin"])]
    prompt: Option<String>,

    /// Read input from file
    #[arg(short = 'f', long, conflicts_with = "stdin")]
    file: Option<PathBuf>,

    /// Read input from stdin
    #[arg(long)]
    stdin: bool,

    /// Only cost these modes (repeatable)
    #[arg(short = 'm', long = "mode", value_parser = cli::parse_mode)]
    modes: Vec<OrchestrationMode>,

    /// Random seed for simulated shared-cache hits
    #[arg(short = 's', long)]
    seed: Option<u64>,

    /// Output format: text or json
    #[arg(long, default_value = "text", value_parser = cli::validate_output_format)]
    output_format: String,

    /// Suppress all logging
    #[arg(long)]
    log_disable: bool,
}

#[derive(Serialize)]
struct ModeResult {
    mode: OrchestrationMode,
    stats: ComparisonStats,
}

#[derive(Serialize)]
struct JsonOutput {
    tokens: usize,
    seed: Option<u64>,
    results: Vec<ModeResult>,
}

fn main() {
    let args = Args::parse();
    cli::init_logging(args.log_disable);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let input = cli::read_input(args.prompt.as_deref(), args.file.as_deref(), args.stdin)?;
    let tokens = WordTokenizer.tokenize(input.trim());
    if tokens.is_empty() {
        return Err("Input is empty".into());
    }

    let modes = if args.modes.is_empty() {
        OrchestrationMode::ALL.to_vec()
    } else {
        args.modes.clone()
    };

    let config = SimulationConfig::default();
    let results: Vec<ModeResult> = modes
        .into_iter()
        .map(|mode| {
            // Every mode replays the same hit stream.
            let rng = seeded_source(args.seed, COMPARISON_SALT);
            let mut comparison = ComputationComparison::new(rng, config.comparison_delay());
            comparison.start_comparison(&tokens, mode.as_str());
            ModeResult {
                mode,
                stats: comparison.run_to_end(),
            }
        })
        .collect();

    match args.output_format.as_str() {
        "json" => {
            let json = JsonOutput {
                tokens: tokens.len(),
                seed: args.seed,
                results,
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            println!("{} tokens\n", tokens.len());
            println!(
                "{:<16} {:>10} {:>10} {:>8} {:>7}",
                "mode", "uncached", "cached", "reused", "saved"
            );
            for result in &results {
                let uncached = result.stats.without_cache.computations;
                let cached = result.stats.with_cache.computations;
                let saved = 100.0 * uncached.saturating_sub(cached) as f64 / uncached as f64;
                println!(
                    "{:<16} {:>10} {:>10} {:>8} {:>6.1}%",
                    result.mode.as_str(),
                    uncached,
                    cached,
                    result.stats.with_cache.cached,
                    saved
                );
            }
        }
    }

    Ok(())
}
