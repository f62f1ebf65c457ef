//! kvsim-tokenize: Show how the simulator splits text into tokens.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use serde::Serialize;

use kvcache_sim::cli;
use kvcache_sim::head::lexicon::semantic_group;
use kvcache_sim::tokenizer::{NormalizingTokenizer, Tokenizer, WordTokenizer};

#[derive(Parser)]
#[command(name = "kvsim-tokenize", about = "Tokenize text the way the simulator does")]
struct Args {
    /// Text to tokenize
    #[arg(short = 'p', long, conflicts_with_all = ["file", "stdin"])]
    prompt: Option<String>,

    /// Read text from file
    #[arg(short = 'f', long, conflicts_with = "stdin")]
    file: Option<PathBuf>,

    /// Read text from stdin
    #[arg(long)]
    stdin: bool,

    /// Print the semantic group of each token
    #[arg(long)]
    groups: bool,

    /// Print total token count
    #[arg(long)]
    show_count: bool,

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
struct TokenEntry {
    position: usize,
    text: String,
    group: &'static str,
}

#[derive(Serialize)]
struct JsonOutput {
    tokens: Vec<TokenEntry>,
    count: usize,
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
    let tokenizer: Box<dyn Tokenizer> = if args.nfc {
        Box::new(NormalizingTokenizer)
    } else {
        Box::new(WordTokenizer)
    };
    let tokens = tokenizer.tokenize(input.trim());

    match args.output_format.as_str() {
        "json" => {
            let entries: Vec<TokenEntry> = tokens
                .iter()
                .enumerate()
                .map(|(position, text)| TokenEntry {
                    position,
                    group: semantic_group(text),
                    text: text.clone(),
                })
                .collect();
            let output = JsonOutput {
                count: entries.len(),
                tokens: entries,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            for (position, text) in tokens.iter().enumerate() {
                if args.groups {
                    println!("{:>5} -> '{}' ({})", position, text, semantic_group(text));
                } else {
                    println!("{:>5} -> '{}'", position, text);
                }
            }

            if args.show_count {
                println!("Total number of tokens: {}", tokens.len());
            }
        }
    }

    Ok(())
}
