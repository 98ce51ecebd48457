//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod annotate;
mod connection;
mod split;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;

use reqvector::config::Settings;

#[derive(Parser)]
#[command(name = "reqvector")]
#[command(about = "Generate per-domain requirement vectors for teaching-resource spreadsheets")]
#[command(version)]
pub struct Cli {
    /// Config file path (default: ./reqvector.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Score every row of a spreadsheet and write requirement vectors
    Annotate {
        /// Input spreadsheet (xlsx)
        input: PathBuf,
        /// Output spreadsheet (default: <input>_with_vectors.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// API key (default: DEEPSEEK_API_KEY from the environment or .env)
        #[arg(short = 'k', long, env = "DEEPSEEK_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
        /// Row to start from; ignored when the output already has progress
        #[arg(short, long, default_value = "0")]
        start: usize,
        /// Maximum number of rows to process in this run
        #[arg(short, long)]
        max_rows: Option<usize>,
        /// Rows per API call (default: 10)
        #[arg(short, long)]
        batch_size: Option<usize>,
        /// Seconds to wait between API calls (default: 0.5)
        #[arg(short, long)]
        delay: Option<f64>,
        /// Chat API endpoint (e.g., https://api.deepseek.com)
        #[arg(long)]
        endpoint: Option<String>,
        /// Model name (e.g., deepseek-chat)
        #[arg(long)]
        model: Option<String>,
    },

    /// Check that the chat API is reachable with the configured key
    TestConnection {
        /// API key (default: DEEPSEEK_API_KEY from the environment or .env)
        #[arg(short = 'k', long, env = "DEEPSEEK_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Split the last column of a sheet on '、' into one row per knowledge point
    Split {
        /// Input spreadsheet (default: label_before.xlsx)
        input: Option<PathBuf>,
        /// Output spreadsheet (default: output.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{} {}", style("✗").red(), e);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Annotate {
            input,
            output,
            api_key,
            start,
            max_rows,
            batch_size,
            delay,
            endpoint,
            model,
        } => {
            let args = annotate::AnnotateArgs {
                input,
                output,
                api_key,
                start,
                max_rows,
                batch_size,
                delay,
                endpoint,
                model,
            };
            annotate::cmd_annotate(&settings, args).await
        }
        Commands::TestConnection { api_key } => {
            if !connection::cmd_test_connection(&settings, api_key).await {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Split { input, output } => split::cmd_split(input, output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_annotate_flags() {
        let cli = Cli::try_parse_from([
            "reqvector", "annotate", "data.xlsx", "-o", "out.xlsx", "-s", "37", "-m", "5", "-b",
            "4", "-d", "0",
        ])
        .unwrap();
        match cli.command {
            Commands::Annotate {
                input,
                output,
                start,
                max_rows,
                batch_size,
                delay,
                ..
            } => {
                assert_eq!(input, PathBuf::from("data.xlsx"));
                assert_eq!(output, Some(PathBuf::from("out.xlsx")));
                assert_eq!(start, 37);
                assert_eq!(max_rows, Some(5));
                assert_eq!(batch_size, Some(4));
                assert_eq!(delay, Some(0.0));
            }
            _ => panic!("expected annotate"),
        }
    }

    #[test]
    fn test_split_defaults() {
        let cli = Cli::try_parse_from(["reqvector", "split"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Split {
                input: None,
                output: None
            }
        ));
    }
}
