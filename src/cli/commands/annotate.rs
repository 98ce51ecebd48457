//! Requirement-vector annotation command.

use std::path::PathBuf;
use std::time::Duration;

use console::style;
use tokio::sync::mpsc;

use reqvector::config::Settings;
use reqvector::llm::LlmClient;
use reqvector::services::{
    default_output_path, AnnotationEvent, AnnotationService, RunOptions, XlsxCheckpoint,
};

use crate::cli::helpers::{format_delay, progress_bar};

/// Arguments of the `annotate` subcommand.
pub struct AnnotateArgs {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub api_key: Option<String>,
    pub start: usize,
    pub max_rows: Option<usize>,
    pub batch_size: Option<usize>,
    pub delay: Option<f64>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
}

/// Annotate a spreadsheet with requirement vectors.
pub async fn cmd_annotate(settings: &Settings, args: AnnotateArgs) -> anyhow::Result<()> {
    let mut llm_config = settings.llm.clone();
    if let Some(key) = args.api_key {
        llm_config = llm_config.with_api_key(key);
    }
    if let Some(ref ep) = args.endpoint {
        llm_config = llm_config.with_endpoint(ep);
    }
    if let Some(ref m) = args.model {
        llm_config = llm_config.with_model(m);
    }

    let client = match LlmClient::new(llm_config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{} {}", style("✗").red(), e);
            std::process::exit(1);
        }
    };

    let batch_size = args.batch_size.unwrap_or(settings.annotate.batch_size);
    let delay_secs = args.delay.unwrap_or(settings.annotate.delay_secs);
    let delay = Duration::try_from_secs_f64(delay_secs)
        .map_err(|_| anyhow::anyhow!("Invalid delay: {}", delay_secs))?;
    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.input));

    println!(
        "{} Processing {} (model: {}, {} rows per request)",
        style("→").cyan(),
        args.input.display(),
        client.config().model,
        batch_size
    );

    let llm_config = client.config().clone();
    let service = AnnotationService::new(Box::new(client), llm_config);
    let store = XlsxCheckpoint::new(&output);
    let options = RunOptions {
        start_row: args.start,
        max_rows: args.max_rows,
        batch_size,
        delay,
    };

    // Create event channel for progress tracking
    let (event_tx, mut event_rx) = mpsc::channel::<AnnotationEvent>(100);

    // Spawn event handler for UI
    let event_handler = tokio::spawn(async move {
        let mut pb = None;
        while let Some(event) = event_rx.recv().await {
            match event {
                AnnotationEvent::Resumed { start_row } => {
                    println!(
                        "{} Existing output found, continuing from row {}",
                        style("↻").cyan(),
                        start_row + 1
                    );
                }
                AnnotationEvent::Started {
                    start_row,
                    end_row,
                    total_batches,
                } => {
                    if total_batches == 0 {
                        println!("{} No rows left to process", style("!").yellow());
                        continue;
                    }
                    let progress = progress_bar((end_row - start_row) as u64);
                    progress.set_message(format!("{} batches", total_batches));
                    pb = Some(progress);
                }
                AnnotationEvent::BatchStarted {
                    batch,
                    total_batches,
                    first_row,
                    end_row,
                } => {
                    if let Some(ref progress) = pb {
                        progress.set_message(format!(
                            "batch {}/{}: rows {}-{}",
                            batch,
                            total_batches,
                            first_row + 1,
                            end_row
                        ));
                    }
                }
                AnnotationEvent::BatchCompleted {
                    batch,
                    rows,
                    diagnostics,
                } => {
                    if let Some(ref progress) = pb {
                        for d in &diagnostics {
                            progress.println(format!(
                                "  {} batch {}: {}",
                                style("!").yellow(),
                                batch,
                                d
                            ));
                        }
                        progress.inc(rows as u64);
                    }
                }
                AnnotationEvent::BatchFailed { batch, rows, error } => {
                    if let Some(ref progress) = pb {
                        progress.println(format!(
                            "{} batch {} failed, using neutral vectors: {}",
                            style("✗").red(),
                            batch,
                            error
                        ));
                        progress.inc(rows as u64);
                    }
                }
                AnnotationEvent::Checkpointed { processed, total } => {
                    if let Some(ref progress) = pb {
                        progress.set_message(format!("saved {}/{}", processed, total));
                    }
                }
                AnnotationEvent::Waiting { delay } => {
                    if let Some(ref progress) = pb {
                        progress.set_message(format!("waiting {}", format_delay(delay)));
                    }
                }
                AnnotationEvent::Complete { .. } => {
                    if let Some(progress) = pb.take() {
                        progress.finish_and_clear();
                    }
                }
            }
        }
    });

    // Run service
    let result = service
        .run_pipeline(&args.input, &store, &options, event_tx)
        .await;

    // Wait for event handler to finish
    let _ = event_handler.await;

    let result = result?;

    println!(
        "{} All done: {} rows, {} API calls",
        style("✓").green(),
        result.processed_rows,
        result.api_calls
    );
    if result.failed_batches > 0 {
        println!(
            "  {} {} batches fell back to neutral vectors",
            style("!").yellow(),
            result.failed_batches
        );
    }
    if result.repaired_batches > 0 {
        println!(
            "  {} {} batches needed response repairs",
            style("→").dim(),
            result.repaired_batches
        );
    }
    println!(
        "  {} Results: {}",
        style("→").dim(),
        store.path().display()
    );

    Ok(())
}
