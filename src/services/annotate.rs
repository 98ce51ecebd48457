//! Batch annotation service.
//!
//! Scores table rows in fixed-size batches through a [`ChatService`], writes
//! one serialized vector per row and checkpoints the whole table after every
//! batch. Separated from UI concerns - emits events for progress tracking.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::repair::{parse_and_repair, RepairDiagnostic};
use crate::llm::{build_vector_prompt, ChatRequest, ChatService, LlmConfig, LlmError};
use crate::models::{Cell, Record, RequirementVector, Table};
use crate::storage::{load_table, save_table, TableError};

/// Output column holding the serialized requirement vector.
pub const VECTOR_COLUMN: &str = "requirementVector";

/// Errors that abort an annotation run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("Invalid run options: {0}")]
    InvalidOptions(String),
}

/// Events emitted during annotation.
#[derive(Debug, Clone)]
pub enum AnnotationEvent {
    /// Existing output found; earlier rows are kept
    Resumed { start_row: usize },
    /// Run started
    Started {
        start_row: usize,
        end_row: usize,
        total_batches: usize,
    },
    /// Batch request about to be sent (rows are 0-based, end exclusive)
    BatchStarted {
        batch: usize,
        total_batches: usize,
        first_row: usize,
        end_row: usize,
    },
    /// Batch scored; `diagnostics` lists repairs made to the response
    BatchCompleted {
        batch: usize,
        rows: usize,
        diagnostics: Vec<RepairDiagnostic>,
    },
    /// Service call failed; batch filled with neutral vectors
    BatchFailed {
        batch: usize,
        rows: usize,
        error: String,
    },
    /// Table written to the output file
    Checkpointed { processed: usize, total: usize },
    /// Pausing before the next batch
    Waiting { delay: Duration },
    /// Run complete
    Complete {
        processed_rows: usize,
        api_calls: usize,
    },
}

/// Result of an annotation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationResult {
    /// First row scored in this run (0-based)
    pub start_row: usize,
    /// One past the last row scored in this run
    pub end_row: usize,
    pub processed_rows: usize,
    pub api_calls: usize,
    /// Per-batch checkpoint writes (the final save is not counted)
    pub checkpoints: usize,
    /// Batches whose service call failed
    pub failed_batches: usize,
    /// Batches whose response needed repairs
    pub repaired_batches: usize,
}

/// Vectors for one batch, with what went wrong getting them.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub vectors: Vec<RequirementVector>,
    pub diagnostics: Vec<RepairDiagnostic>,
    /// Set when the service call itself failed and neutral vectors were used.
    pub service_error: Option<String>,
}

/// Options for one annotation run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    /// Row to start from when no existing output says otherwise
    pub start_row: usize,
    /// Cap on rows scored in this run
    pub max_rows: Option<usize>,
    pub batch_size: usize,
    /// Pause between batches (not after the last one)
    pub delay: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            start_row: 0,
            max_rows: None,
            batch_size: 10,
            delay: Duration::from_millis(500),
        }
    }
}

/// Where checkpoints go, and where a previous run's progress is read from.
pub trait CheckpointStore {
    /// The previously written output table, if there is one.
    fn load_existing(&self) -> Result<Option<Table>, TableError>;
    /// Replace the stored table in full.
    fn save(&self, table: &Table) -> Result<(), TableError>;
}

/// Checkpoints to an xlsx file.
#[derive(Debug, Clone)]
pub struct XlsxCheckpoint {
    path: PathBuf,
}

impl XlsxCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CheckpointStore for XlsxCheckpoint {
    fn load_existing(&self) -> Result<Option<Table>, TableError> {
        if self.path.exists() {
            load_table(&self.path).map(Some)
        } else {
            Ok(None)
        }
    }

    fn save(&self, table: &Table) -> Result<(), TableError> {
        save_table(table, &self.path)
    }
}

/// Default output path: `<input stem>_with_vectors.xlsx` next to the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!("{}_with_vectors.xlsx", stem))
}

/// Row to resume from.
///
/// With an existing output that has a vector column, that is the number of
/// rows already holding a vector; otherwise the caller's start row.
pub fn resolve_output_cursor(existing: Option<&Table>, start_row: usize) -> usize {
    existing
        .and_then(|t| t.column_index(VECTOR_COLUMN).map(|col| t.count_filled(col)))
        .unwrap_or(start_row)
}

/// Copy vectors already present in `existing` into blank cells of `table`,
/// so a resumed run does not drop earlier results when it rewrites the file.
fn carry_over_vectors(table: &mut Table, existing: &Table) -> usize {
    let Some(src_col) = existing.column_index(VECTOR_COLUMN) else {
        return 0;
    };
    let dst_col = table.ensure_column(VECTOR_COLUMN);

    let mut copied = 0;
    for row in 0..table.len().min(existing.len()) {
        let (Some(src), Some(dst)) = (existing.cell(row, src_col), table.cell(row, dst_col)) else {
            continue;
        };
        if !src.is_blank() && dst.is_blank() {
            let value = src.clone();
            table.set_cell(row, dst_col, value);
            copied += 1;
        }
    }
    copied
}

/// Service for scoring table rows with an LLM.
pub struct AnnotationService {
    chat: Box<dyn ChatService>,
    llm_config: LlmConfig,
}

impl AnnotationService {
    /// Create a new annotation service.
    pub fn new(chat: Box<dyn ChatService>, llm_config: LlmConfig) -> Self {
        Self { chat, llm_config }
    }

    /// Send one scoring prompt and return the raw reply text.
    pub async fn request_vectors(&self, prompt: String) -> Result<String, LlmError> {
        let request = ChatRequest::scoring(prompt, &self.llm_config);
        let completion = self.chat.complete(&request).await?;
        if let Some(usage) = completion.usage {
            debug!(
                "Tokens: {} prompt + {} completion",
                usage.prompt_tokens, usage.completion_tokens
            );
        }
        Ok(completion.content)
    }

    /// Score a batch. Never fails: a service fault yields neutral vectors.
    pub async fn process_batch(&self, batch: &[Record<'_>]) -> BatchOutcome {
        let expected = batch.len();
        let prompt = build_vector_prompt(batch);

        match self.request_vectors(prompt).await {
            Ok(raw) => {
                let outcome = parse_and_repair(&raw, expected);
                if outcome.is_clean() {
                    debug!("Response for {} rows used as returned", expected);
                }
                for diagnostic in &outcome.diagnostics {
                    if diagnostic.is_fatal_to_batch() {
                        warn!("{}; all {} rows set to neutral vectors", diagnostic, expected);
                    } else {
                        warn!("{}", diagnostic);
                    }
                }
                BatchOutcome {
                    vectors: outcome.vectors,
                    diagnostics: outcome.diagnostics,
                    service_error: None,
                }
            }
            Err(e) => {
                warn!("API call failed: {}", e);
                BatchOutcome {
                    vectors: vec![RequirementVector::neutral(); expected],
                    diagnostics: Vec::new(),
                    service_error: Some(e.to_string()),
                }
            }
        }
    }

    /// Annotate `input`, checkpointing to `store`.
    ///
    /// If the store already holds output, scoring resumes after the rows that
    /// have a vector and those vectors are kept.
    pub async fn run_pipeline(
        &self,
        input: &Path,
        store: &dyn CheckpointStore,
        options: &RunOptions,
        event_tx: mpsc::Sender<AnnotationEvent>,
    ) -> Result<AnnotationResult, PipelineError> {
        let mut table = load_table(input)?;
        info!("Read {} rows from {}", table.len(), input.display());

        let existing = store.load_existing()?;
        let start_row = resolve_output_cursor(existing.as_ref(), options.start_row);
        if let Some(existing) = existing {
            let kept = carry_over_vectors(&mut table, &existing);
            info!(
                "Existing output found: resuming at row {} ({} vectors kept)",
                start_row + 1,
                kept
            );
            let _ = event_tx.send(AnnotationEvent::Resumed { start_row }).await;
        }

        let options = RunOptions {
            start_row,
            ..options.clone()
        };
        self.annotate_table(&mut table, store, &options, event_tx)
            .await
    }

    /// Score rows of an in-memory table starting at `options.start_row`.
    pub async fn annotate_table(
        &self,
        table: &mut Table,
        store: &dyn CheckpointStore,
        options: &RunOptions,
        event_tx: mpsc::Sender<AnnotationEvent>,
    ) -> Result<AnnotationResult, PipelineError> {
        if options.batch_size == 0 {
            return Err(PipelineError::InvalidOptions(
                "batch size must be at least 1".to_string(),
            ));
        }

        let vector_col = table.ensure_column(VECTOR_COLUMN);
        let end_row = match options.max_rows {
            Some(max) => options.start_row.saturating_add(max).min(table.len()),
            None => table.len(),
        };
        let start_row = options.start_row.min(end_row);
        let total_rows = end_row - start_row;
        let total_batches = total_rows.div_ceil(options.batch_size);

        info!(
            "Scoring rows {}-{} in {} batches of up to {}",
            start_row + 1,
            end_row,
            total_batches,
            options.batch_size
        );
        let _ = event_tx
            .send(AnnotationEvent::Started {
                start_row,
                end_row,
                total_batches,
            })
            .await;

        let mut result = AnnotationResult {
            start_row,
            end_row,
            processed_rows: 0,
            api_calls: 0,
            checkpoints: 0,
            failed_batches: 0,
            repaired_batches: 0,
        };

        for (batch_idx, batch_start) in (start_row..end_row).step_by(options.batch_size).enumerate()
        {
            let batch_end = (batch_start + options.batch_size).min(end_row);
            let batch_num = batch_idx + 1;
            let rows = batch_end - batch_start;

            let _ = event_tx
                .send(AnnotationEvent::BatchStarted {
                    batch: batch_num,
                    total_batches,
                    first_row: batch_start,
                    end_row: batch_end,
                })
                .await;

            let outcome = {
                let batch: Vec<Record<'_>> = (batch_start..batch_end)
                    .filter_map(|row| table.record(row))
                    .collect();
                self.process_batch(&batch).await
            };
            result.api_calls += 1;

            for (offset, vector) in outcome.vectors.iter().enumerate() {
                table.set_cell(
                    batch_start + offset,
                    vector_col,
                    Cell::Text(vector.to_json_string()),
                );
            }
            result.processed_rows += rows;

            let event = match outcome.service_error {
                Some(error) => {
                    result.failed_batches += 1;
                    AnnotationEvent::BatchFailed {
                        batch: batch_num,
                        rows,
                        error,
                    }
                }
                None => {
                    if !outcome.diagnostics.is_empty() {
                        result.repaired_batches += 1;
                    }
                    AnnotationEvent::BatchCompleted {
                        batch: batch_num,
                        rows,
                        diagnostics: outcome.diagnostics,
                    }
                }
            };
            let _ = event_tx.send(event).await;

            store.save(table)?;
            result.checkpoints += 1;
            debug!(
                "Checkpoint saved ({}/{} rows)",
                result.processed_rows, total_rows
            );
            let _ = event_tx
                .send(AnnotationEvent::Checkpointed {
                    processed: result.processed_rows,
                    total: total_rows,
                })
                .await;

            if batch_end < end_row && !options.delay.is_zero() {
                let _ = event_tx
                    .send(AnnotationEvent::Waiting {
                        delay: options.delay,
                    })
                    .await;
                tokio::time::sleep(options.delay).await;
            }
        }

        store.save(table)?;

        info!(
            "Done: {} rows, {} API calls",
            result.processed_rows, result.api_calls
        );
        let _ = event_tx
            .send(AnnotationEvent::Complete {
                processed_rows: result.processed_rows,
                api_calls: result.api_calls,
            })
            .await;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatCompletion, LlmError};
    use crate::models::Category;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Replies with `n` vectors where `n` is read from the prompt.
    struct EchoService {
        calls: Arc<Mutex<Vec<ChatRequest>>>,
        fail_on_call: Option<usize>,
    }

    fn reply_for(prompt: &str) -> String {
        let n = prompt.matches("资源 ").count();
        let obj: serde_json::Map<String, serde_json::Value> = Category::ALL
            .iter()
            .map(|c| (c.as_str().to_string(), serde_json::json!(0.8)))
            .collect();
        serde_json::Value::Array(vec![serde_json::Value::Object(obj); n]).to_string()
    }

    #[async_trait]
    impl ChatService for EchoService {
        async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, LlmError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(request.clone());
                calls.len()
            };
            if self.fail_on_call == Some(call) {
                return Err(LlmError::Connection("connection reset".to_string()));
            }
            Ok(ChatCompletion {
                content: reply_for(&request.messages[1].content),
                usage: None,
            })
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        existing: Option<Table>,
        saved: Mutex<Vec<Table>>,
    }

    impl CheckpointStore for MemoryStore {
        fn load_existing(&self) -> Result<Option<Table>, TableError> {
            Ok(self.existing.clone())
        }

        fn save(&self, table: &Table) -> Result<(), TableError> {
            self.saved.lock().unwrap().push(table.clone());
            Ok(())
        }
    }

    fn input_table(rows: usize) -> Table {
        Table::from_rows(
            vec!["资源名称".into(), "科技领域".into()],
            (0..rows)
                .map(|i| vec![Cell::text(format!("资源{}", i)), Cell::text("物理")])
                .collect(),
        )
    }

    fn service(fail_on_call: Option<usize>) -> (AnnotationService, Arc<Mutex<Vec<ChatRequest>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let chat = EchoService {
            calls: calls.clone(),
            fail_on_call,
        };
        (
            AnnotationService::new(Box::new(chat), LlmConfig::default()),
            calls,
        )
    }

    fn options(batch_size: usize) -> RunOptions {
        RunOptions {
            batch_size,
            delay: Duration::ZERO,
            ..RunOptions::default()
        }
    }

    #[test]
    fn test_resolve_output_cursor() {
        assert_eq!(resolve_output_cursor(None, 7), 7);

        let without_column = input_table(3);
        assert_eq!(resolve_output_cursor(Some(&without_column), 2), 2);

        let mut with_column = input_table(50);
        let col = with_column.ensure_column(VECTOR_COLUMN);
        for row in 0..37 {
            with_column.set_cell(row, col, Cell::text("{}"));
        }
        assert_eq!(resolve_output_cursor(Some(&with_column), 0), 37);
    }

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("data/资源.xlsx")),
            PathBuf::from("data/资源_with_vectors.xlsx")
        );
        assert_eq!(
            default_output_path(Path::new("rows.xls")),
            PathBuf::from("rows_with_vectors.xlsx")
        );
    }

    #[test]
    fn test_carry_over_keeps_existing_vectors() {
        let mut existing = input_table(3);
        let col = existing.ensure_column(VECTOR_COLUMN);
        existing.set_cell(0, col, Cell::text("{\"a\":1}"));

        let mut table = input_table(3);
        assert_eq!(carry_over_vectors(&mut table, &existing), 1);
        let dst = table.column_index(VECTOR_COLUMN).unwrap();
        assert_eq!(table.cell(0, dst), Some(&Cell::text("{\"a\":1}")));
        assert_eq!(table.cell(1, dst), Some(&Cell::Empty));
    }

    #[tokio::test]
    async fn test_batches_and_checkpoints() {
        let (service, calls) = service(None);
        let store = MemoryStore::default();
        let mut table = input_table(23);
        let (tx, mut rx) = mpsc::channel(100);

        let result = service
            .annotate_table(&mut table, &store, &options(10), tx)
            .await
            .unwrap();

        assert_eq!(result.api_calls, 3);
        assert_eq!(result.checkpoints, 3);
        assert_eq!(result.processed_rows, 23);

        let sizes: Vec<usize> = calls
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.messages[1].content.matches("资源 ").count())
            .collect();
        assert_eq!(sizes, vec![10, 10, 3]);

        // Three checkpoints plus the final save
        let saved = store.saved.lock().unwrap();
        assert_eq!(saved.len(), 4);
        let col = table.column_index(VECTOR_COLUMN).unwrap();
        assert_eq!(saved[0].count_filled(col), 10);
        assert_eq!(saved[3].count_filled(col), 23);

        let mut completes = 0;
        while let Ok(event) = rx.try_recv() {
            if let AnnotationEvent::Complete { api_calls, .. } = event {
                assert_eq!(api_calls, 3);
                completes += 1;
            }
        }
        assert_eq!(completes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_only_between_batches() {
        let (service, _) = service(None);
        let store = MemoryStore::default();
        let mut table = input_table(23);
        let (tx, mut rx) = mpsc::channel(100);
        let opts = RunOptions {
            delay: Duration::from_millis(500),
            ..options(10)
        };

        let started = tokio::time::Instant::now();
        service
            .annotate_table(&mut table, &store, &opts, tx)
            .await
            .unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(1) && elapsed < Duration::from_millis(1500));

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        let waits: Vec<usize> = events
            .iter()
            .enumerate()
            .filter(|(_, e)| matches!(e, AnnotationEvent::Waiting { .. }))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(waits.len(), 2);
        assert!(events.iter().all(|e| match e {
            AnnotationEvent::Waiting { delay } => *delay == Duration::from_millis(500),
            _ => true,
        }));

        let last_checkpoint = events
            .iter()
            .rposition(|e| matches!(e, AnnotationEvent::Checkpointed { .. }))
            .unwrap();
        assert!(waits.iter().all(|&i| i < last_checkpoint));
    }

    #[tokio::test]
    async fn test_failed_batch_gets_neutral_vectors() {
        let (service, _) = service(Some(2));
        let store = MemoryStore::default();
        let mut table = input_table(6);
        let (tx, _rx) = mpsc::channel(100);

        let result = service
            .annotate_table(&mut table, &store, &options(2), tx)
            .await
            .unwrap();

        assert_eq!(result.api_calls, 3);
        assert_eq!(result.failed_batches, 1);

        let col = table.column_index(VECTOR_COLUMN).unwrap();
        let neutral = Cell::Text(RequirementVector::neutral().to_json_string());
        let scored = Cell::Text(RequirementVector::filled(0.8).to_json_string());
        assert_eq!(table.cell(1, col), Some(&scored));
        assert_eq!(table.cell(2, col), Some(&neutral));
        assert_eq!(table.cell(3, col), Some(&neutral));
        assert_eq!(table.cell(4, col), Some(&scored));
    }

    #[tokio::test]
    async fn test_max_rows_limits_range() {
        let (service, calls) = service(None);
        let store = MemoryStore::default();
        let mut table = input_table(30);
        let (tx, _rx) = mpsc::channel(100);
        let opts = RunOptions {
            start_row: 5,
            max_rows: Some(7),
            ..options(4)
        };

        let result = service
            .annotate_table(&mut table, &store, &opts, tx)
            .await
            .unwrap();

        assert_eq!((result.start_row, result.end_row), (5, 12));
        assert_eq!(calls.lock().unwrap().len(), 2);
        let col = table.column_index(VECTOR_COLUMN).unwrap();
        assert_eq!(table.count_filled(col), 7);
        assert!(table.cell(4, col).unwrap().is_blank());
        assert!(table.cell(12, col).unwrap().is_blank());
    }

    #[tokio::test]
    async fn test_zero_batch_size_rejected() {
        let (service, _) = service(None);
        let (tx, _rx) = mpsc::channel(100);
        let err = service
            .annotate_table(&mut input_table(2), &MemoryStore::default(), &options(0), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidOptions(_)));
    }
}
