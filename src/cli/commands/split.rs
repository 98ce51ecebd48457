//! Knowledge-point split command.

use std::path::PathBuf;

use console::style;

use reqvector::services::{split_file, DEFAULT_SPLIT_INPUT, DEFAULT_SPLIT_OUTPUT};

pub fn cmd_split(input: Option<PathBuf>, output: Option<PathBuf>) -> anyhow::Result<()> {
    let input = input.unwrap_or_else(|| PathBuf::from(DEFAULT_SPLIT_INPUT));
    let output = output.unwrap_or_else(|| PathBuf::from(DEFAULT_SPLIT_OUTPUT));

    if !input.exists() {
        println!("{} File not found: {}", style("✗").red(), input.display());
        println!("  Run from the directory containing the sheet, or pass its path");
        anyhow::bail!("input file not found");
    }

    let summary = split_file(&input, &output)?;

    println!(
        "{} Done: {} rows -> {} rows",
        style("✓").green(),
        summary.input_rows,
        summary.output_rows
    );
    println!("  {} Saved to {}", style("→").dim(), output.display());
    Ok(())
}
