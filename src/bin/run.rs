//! kvsim-run: Feed text through the attention heads under one orchestration mode.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use serde::Serialize;

use kvcache_sim::cli;
use kvcache_sim::cli::report::RunReport;
use kvcache_sim::engine::scheduler::{Clock, RunSummary, SystemClock, VirtualClock};
use kvcache_sim::engine::{CooperativeScheduler, StepOutcome, TokenPipeline};
use kvcache_sim::events::{EventSink, RecordingSink, SimEvent, TracingSink};
use kvcache_sim::tokenizer::NormalizingTokenizer;
use kvcache_sim::{OrchestrationMode, SimulationConfig};

#[derive(Parser)]
#[command(name = "kvsim-run", about = "Run the KV-cache attention simulation")]
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

    /// Orchestration mode: basic, self-attention, cross-head, shared-cache, dynamic, hierarchical
    #[arg(short = 'm', long, value_parser = cli::parse_mode)]
    mode: Option<OrchestrationMode>,

    /// JSON config file; command-line flags override its fields
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Delay between pipeline advances, in milliseconds
    #[arg(long)]
    speed: Option<u64>,

    /// Delay between comparison advances, in milliseconds
    #[arg(long)]
    comparison_speed: Option<u64>,

    /// Random seed for embeddings and simulated cache hits
    #[arg(short = 's', long)]
    seed: Option<u64>,

    /// Step through this many tokens manually instead of running continuously
    #[arg(short = 'n', long)]
    steps: Option<usize>,

    /// Skip real delays; advance a virtual clock instead
    #[arg(long)]
    instant: bool,

    /// Include every emitted event in the output
    #[arg(long)]
    events: bool,

    /// NFC-normalize input before tokenizing
    #[arg(long)]
    nfc: bool,

    /// Output format: text or json
    #[arg(long, default_value = "text", value_parser = cli::validate_output_format)]
    output_format: String,

    /// Suppress all logging
    #[arg(long)]
    log_disable: bool,
}

#[derive(Serialize)]
struct JsonOutput {
    input: String,
    #[serde(flatten)]
    report: RunReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    schedule: Option<RunSummary>,
    wall_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    events: Option<Vec<SimEvent>>,
}

fn main() {
    let args = Args::parse();
    cli::init_logging(args.log_disable);

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn build_config(args: &Args) -> Result<SimulationConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_json_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(ms) = args.speed {
        config.processing_delay_ms = ms;
    }
    if let Some(ms) = args.comparison_speed {
        config.comparison_delay_ms = ms;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate()?;
    Ok(config)
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let input = cli::read_input(args.prompt.as_deref(), args.file.as_deref(), args.stdin)?;
    let config = build_config(&args)?;

    let recorder = Arc::new(RecordingSink::new());
    let sink: Arc<dyn EventSink> = if args.events {
        recorder.clone() as Arc<dyn EventSink>
    } else {
        Arc::new(TracingSink)
    };

    let mut pipeline = TokenPipeline::from_config(&config, sink)?;
    if args.nfc {
        pipeline.set_tokenizer(Box::new(NormalizingTokenizer));
    }
    let start = Instant::now();

    let schedule = match args.steps {
        Some(steps) => {
            pipeline.set_input(input.clone());
            pipeline.select_mode(config.mode.as_str());
            for _ in 0..steps {
                match pipeline.step() {
                    StepOutcome::Advanced(_) => {}
                    StepOutcome::Exhausted => break,
                    StepOutcome::NoInput => return Err("Input is empty".into()),
                }
            }
            None
        }
        None => {
            if !pipeline.process_input(&input, config.mode.as_str()) {
                return Err("Input is empty".into());
            }
            let mut clock: Box<dyn Clock> = if args.instant {
                Box::new(VirtualClock::new())
            } else {
                Box::new(SystemClock::new())
            };
            let mut scheduler = CooperativeScheduler::new();
            Some(scheduler.run(&mut pipeline, &mut *clock))
        }
    };

    let wall_ms = start.elapsed().as_secs_f64() * 1000.0;
    let report = RunReport::from_pipeline(&pipeline);

    match args.output_format.as_str() {
        "json" => {
            let json = JsonOutput {
                input,
                report,
                schedule,
                wall_ms,
                events: args.events.then(|| recorder.take()),
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            if args.events {
                for event in recorder.take() {
                    println!("{}", serde_json::to_string(&event)?);
                }
                println!();
            }
            print!("{}", report.render_text());
            if let Some(summary) = schedule {
                println!(
                    "\n{} pipeline ticks, {} comparison ticks, {} ms simulated",
                    summary.pipeline_ticks, summary.comparison_ticks, summary.elapsed_ms
                );
            }
        }
    }

    Ok(())
}
