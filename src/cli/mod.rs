//! Shared CLI utilities for the kvsim binary tools.

pub mod report;

use std::io::Read;
use std::path::Path;

use crate::orchestration::OrchestrationMode;

/// Initialize tracing/logging to stderr.
///
/// If `disable` is true, no output is produced.
/// Otherwise respects `RUST_LOG` env var, defaulting to WARN.
pub fn init_logging(disable: bool) {
    use tracing_subscriber::EnvFilter;

    if disable {
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read input text from one of: prompt string, file path, or stdin.
///
/// Returns an error message string if no input source is provided.
pub fn read_input(
    prompt: Option<&str>,
    file: Option<&Path>,
    use_stdin: bool,
) -> Result<String, String> {
    if let Some(text) = prompt {
        return Ok(text.to_string());
    }

    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read file '{}': {}", path.display(), e));
    }

    if use_stdin {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("Failed to read stdin: {}", e))?;
        return Ok(buf);
    }

    Err("No input provided. Use --prompt, --file, or --stdin".to_string())
}

/// Clap value parser for `--output-format`.
pub fn validate_output_format(s: &str) -> Result<String, String> {
    match s {
        "text" | "json" => Ok(s.to_string()),
        _ => Err(format!("Unknown output format '{}'. Options: text, json", s)),
    }
}

/// Clap value parser for `--mode`.
pub fn parse_mode(s: &str) -> Result<OrchestrationMode, String> {
    s.parse::<OrchestrationMode>().map_err(|e| e.to_string())
}
