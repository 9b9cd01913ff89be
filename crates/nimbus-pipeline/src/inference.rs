//! Batched LLM inference over a dataset.
//!
//! Executes one model request per row (or per conversation group)
//! concurrently on a semaphore-bounded worker pool. Results are always
//! reassembled in input order regardless of completion order, one failing
//! item is isolated into an empty-output placeholder instead of aborting
//! the batch, and an optional slice size bounds how many requests are in
//! flight by running sequential sub-batches.

use crate::error::{PipelineError, PipelineResult};
use anyhow::anyhow;
use futures::StreamExt;
use nimbus_abstraction::{ChatMessage, Model, ModelError};
use nimbus_dataset::{Dataset, Row, PACK_COLUMN};
use nimbus_models::continuation::{
    generate_with_continuation, stream_with_continuation, DEFAULT_MAX_ROUNDS,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Column names carried on the inference result dataset.
pub const EVAL_INPUT_COLUMN: &str = "eval_input";
pub const EVAL_OUTPUT_COLUMN: &str = "llm_output";
pub const REFERENCE_COLUMN: &str = "reference";
pub const LATENCY_COLUMN: &str = "latency";
pub const FIRST_TOKEN_LATENCY_COLUMN: &str = "first_token_latency";

/// Tuning knobs for a batch inference run.
#[derive(Debug, Clone)]
pub struct BatchInferenceConfig {
    /// Maximum concurrent in-flight requests.
    pub concurrency: usize,
    /// When set, the dataset is split into sequential sub-batches of this
    /// size; slice `k + 1` does not start until slice `k` has fully
    /// completed.
    pub slice_size: Option<usize>,
    /// Optional prompt template with `{column}` placeholders for the
    /// completion path.
    pub prompt_template: Option<String>,
    /// Round cap forwarded to the truncation-continuation loop.
    pub max_continuation_rounds: usize,
    /// Stream chat requests to capture first-token latency.
    pub streaming: bool,
}

impl Default for BatchInferenceConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            slice_size: None,
            prompt_template: None,
            max_continuation_rounds: DEFAULT_MAX_ROUNDS,
            streaming: false,
        }
    }
}

enum InferenceRequest {
    /// Flat prompt for a completion-style model.
    Prompt(String),
    /// Reconstructed multi-turn history for a chat-style model.
    Chat(Vec<ChatMessage>),
}

struct InferenceItem {
    index: usize,
    rendered_input: String,
    request: InferenceRequest,
    reference: Option<String>,
}

struct ItemResult {
    index: usize,
    rendered_input: String,
    output: String,
    reference: Option<String>,
    latency_secs: f64,
    first_token_latency_secs: Option<f64>,
}

/// Runs batched inference against one model, producing a result dataset
/// with explicit input/output/reference column metadata for evaluation.
pub struct BatchInferenceRunner {
    model: Arc<dyn Model>,
    config: BatchInferenceConfig,
}

impl BatchInferenceRunner {
    #[must_use]
    pub fn new(model: Arc<dyn Model>, config: BatchInferenceConfig) -> Self {
        Self { model, config }
    }

    /// Executes the batch and reassembles results in input order.
    pub async fn run(&self, dataset: &Dataset) -> PipelineResult<Dataset> {
        let items = self.build_items(dataset)?;
        let total = items.len();
        debug!(total, concurrency = self.config.concurrency, "starting batch inference");

        let mut results: Vec<ItemResult> = Vec::with_capacity(total);
        match self.config.slice_size {
            Some(slice_size) if slice_size > 0 && slice_size < total => {
                let mut remaining = items;
                while !remaining.is_empty() {
                    let take = slice_size.min(remaining.len());
                    let slice: Vec<InferenceItem> = remaining.drain(..take).collect();
                    results.extend(self.run_slice(slice).await?);
                }
            }
            _ => results.extend(self.run_slice(items).await?),
        }
        results.sort_by_key(|result| result.index);

        Ok(assemble_dataset(results, self.config.streaming))
    }

    async fn run_slice(&self, items: Vec<InferenceItem>) -> PipelineResult<Vec<ItemResult>> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut handles = Vec::with_capacity(items.len());
        for item in items {
            let model = Arc::clone(&self.model);
            let semaphore = Arc::clone(&semaphore);
            let max_rounds = self.config.max_continuation_rounds;
            let streaming = self.config.streaming;
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await;
                execute_item(model, item, max_rounds, streaming).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let result =
                handle.await.map_err(|e| PipelineError::Other(anyhow!("worker panicked: {e}")))?;
            results.push(result);
        }
        Ok(results)
    }

    fn build_items(&self, dataset: &Dataset) -> PipelineResult<Vec<InferenceItem>> {
        if dataset.is_packed() || dataset.is_grouped() {
            self.build_chat_items(dataset)
        } else {
            self.build_prompt_items(dataset)
        }
    }

    /// Completion path: render each row's input columns into one flat
    /// string, optionally through the prompt template.
    fn build_prompt_items(&self, dataset: &Dataset) -> PipelineResult<Vec<InferenceItem>> {
        let input_columns: Vec<String> = if dataset.input_columns().is_empty() {
            match dataset.table().column_names().first() {
                Some(first) => vec![(*first).to_string()],
                None => {
                    return Err(PipelineError::InvalidArgument(
                        "dataset has no columns to infer on".to_string(),
                    ));
                }
            }
        } else {
            dataset.input_columns().to_vec()
        };

        let mut items = Vec::with_capacity(dataset.row_count());
        for (index, row) in dataset.table().rows().enumerate() {
            let rendered = render_prompt(&row, &input_columns, self.config.prompt_template.as_deref())?;
            let reference = dataset
                .reference_column()
                .and_then(|column| row.get(column))
                .and_then(Value::as_str)
                .map(str::to_string);
            items.push(InferenceItem {
                index,
                rendered_input: rendered.clone(),
                request: InferenceRequest::Prompt(rendered),
                reference,
            });
        }
        Ok(items)
    }

    /// Chat path: rebuild each group's alternating user/assistant turns;
    /// the last record's reference is held back as ground truth.
    fn build_chat_items(&self, dataset: &Dataset) -> PipelineResult<Vec<InferenceItem>> {
        let groups = packed_groups(dataset)?;
        let input_column = dataset
            .input_columns()
            .first()
            .cloned()
            .unwrap_or_else(|| "prompt".to_string());
        let reference_column =
            dataset.reference_column().map_or_else(|| "response".to_string(), str::to_string);

        let mut items = Vec::with_capacity(groups.len());
        for (index, records) in groups.into_iter().enumerate() {
            let mut messages = Vec::with_capacity(records.len() * 2);
            let mut reference = None;
            let mut rendered_input = String::new();
            let last = records.len().saturating_sub(1);
            for (position, record) in records.iter().enumerate() {
                let prompt = record.get(&input_column).and_then(Value::as_str).ok_or_else(|| {
                    PipelineError::InvalidArgument(format!(
                        "group {index} record {position} is missing input column '{input_column}'"
                    ))
                })?;
                messages.push(ChatMessage::user(prompt));
                let response = record.get(&reference_column).and_then(Value::as_str);
                if position == last {
                    rendered_input = prompt.to_string();
                    reference = response.map(str::to_string);
                } else {
                    let response = response.ok_or_else(|| {
                        PipelineError::InvalidArgument(format!(
                            "group {index} record {position} is missing reference column \
                             '{reference_column}' needed for an assistant turn"
                        ))
                    })?;
                    messages.push(ChatMessage::assistant(response));
                }
            }
            items.push(InferenceItem {
                index,
                rendered_input,
                request: InferenceRequest::Chat(messages),
                reference,
            });
        }
        Ok(items)
    }
}

/// Extracts one record list per conversation group.
fn packed_groups(dataset: &Dataset) -> PipelineResult<Vec<Vec<Row>>> {
    let mut table = dataset.table().clone();
    if table.is_grouped() && !table.pack() {
        return Err(PipelineError::InvalidArgument(
            "grouped dataset could not be packed for chat inference".to_string(),
        ));
    }
    let cells = table.column(PACK_COLUMN).ok_or_else(|| {
        PipelineError::InvalidArgument("dataset is not packed or grouped".to_string())
    })?;
    let mut groups = Vec::with_capacity(cells.len());
    for cell in cells.values() {
        let Value::Array(records) = cell else {
            return Err(PipelineError::InvalidArgument(
                "packed cell is not a record list".to_string(),
            ));
        };
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let Value::Object(fields) = record else {
                return Err(PipelineError::InvalidArgument(
                    "packed record is not an object".to_string(),
                ));
            };
            rows.push(fields.clone());
        }
        groups.push(rows);
    }
    Ok(groups)
}

fn render_prompt(
    row: &Row,
    input_columns: &[String],
    template: Option<&str>,
) -> PipelineResult<String> {
    let cell_text = |column: &String| -> PipelineResult<String> {
        let value = row.get(column).ok_or_else(|| {
            PipelineError::InvalidArgument(format!("row is missing input column '{column}'"))
        })?;
        Ok(match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
    };

    if let Some(template) = template {
        let mut rendered = template.to_string();
        for column in input_columns {
            let placeholder = format!("{{{column}}}");
            if rendered.contains(&placeholder) {
                rendered = rendered.replace(&placeholder, &cell_text(column)?);
            }
        }
        return Ok(rendered);
    }

    let mut parts = Vec::with_capacity(input_columns.len());
    for column in input_columns {
        parts.push(cell_text(column)?);
    }
    Ok(parts.join("\n"))
}

/// Runs one item, converting its failure into an empty-output placeholder
/// so a single bad input cannot abort the batch.
async fn execute_item(
    model: Arc<dyn Model>,
    item: InferenceItem,
    max_rounds: usize,
    streaming: bool,
) -> ItemResult {
    let started = Instant::now();
    let outcome = match item.request {
        InferenceRequest::Prompt(prompt) => {
            model.generate_text(&prompt, None).await.map(|response| (response.content, None))
        }
        InferenceRequest::Chat(messages) => {
            if streaming {
                collect_stream(model, messages, max_rounds, started).await
            } else {
                generate_with_continuation(model.as_ref(), &messages, None, max_rounds)
                    .await
                    .map(|response| (response.content, None))
            }
        }
    };
    let latency_secs = started.elapsed().as_secs_f64();
    match outcome {
        Ok((output, first_token_latency_secs)) => ItemResult {
            index: item.index,
            rendered_input: item.rendered_input,
            output,
            reference: item.reference,
            latency_secs,
            first_token_latency_secs,
        },
        Err(e) => {
            warn!(index = item.index, error = %e, "inference item failed; emitting empty output");
            ItemResult {
                index: item.index,
                rendered_input: item.rendered_input,
                output: String::new(),
                reference: item.reference,
                latency_secs,
                first_token_latency_secs: None,
            }
        }
    }
}

async fn collect_stream(
    model: Arc<dyn Model>,
    messages: Vec<ChatMessage>,
    max_rounds: usize,
    started: Instant,
) -> Result<(String, Option<f64>), ModelError> {
    let mut stream = stream_with_continuation(model, messages, None, max_rounds);
    let mut content = String::new();
    let mut first_token = None;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if first_token.is_none() && !chunk.delta.is_empty() {
            first_token = Some(started.elapsed().as_secs_f64());
        }
        content.push_str(&chunk.delta);
    }
    Ok((content, first_token))
}

fn assemble_dataset(results: Vec<ItemResult>, streaming: bool) -> Dataset {
    let has_reference = results.iter().any(|result| result.reference.is_some());
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        let mut row = Row::new();
        row.insert(EVAL_INPUT_COLUMN.to_string(), json!(result.rendered_input));
        row.insert(EVAL_OUTPUT_COLUMN.to_string(), json!(result.output));
        if has_reference {
            row.insert(
                REFERENCE_COLUMN.to_string(),
                result.reference.map_or(Value::Null, Value::from),
            );
        }
        row.insert(LATENCY_COLUMN.to_string(), json!(result.latency_secs));
        if streaming {
            row.insert(
                FIRST_TOKEN_LATENCY_COLUMN.to_string(),
                result.first_token_latency_secs.map_or(Value::Null, Value::from),
            );
        }
        rows.push(row);
    }

    let mut dataset = Dataset::from_rows(rows);
    dataset.set_input_columns(vec![EVAL_INPUT_COLUMN.to_string()]);
    dataset.set_eval_input_column(Some(EVAL_INPUT_COLUMN.to_string()));
    dataset.set_eval_output_column(Some(EVAL_OUTPUT_COLUMN.to_string()));
    if has_reference {
        dataset.set_reference_column(Some(REFERENCE_COLUMN.to_string()));
    }
    dataset
}
