//! Source-aware dataset over the table engine.
//!
//! A [`Dataset`] owns a [`Table`] plus the bookkeeping that makes it useful
//! to the rest of the SDK: the source it was loaded from (and will save
//! to), an optional validation schema, and the input/reference column
//! names batch inference and evaluation read and write.

use crate::error::{DatasetError, DatasetResult};
use crate::format::{self, FormatType, ParsedContent};
use crate::schema::Schema;
use crate::source::{
    BlobDataSource, BlobLocation, DataSource, FileDataSource, ObjectStore, RawContent, SourceKind,
};
use crate::table::{Row, Table, GROUP_COLUMN, PACK_COLUMN};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// How a cross-source save is carried out, looked up by
/// `(source kind, destination kind)`. Adding a backend means extending
/// this table, not editing the save method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveStrategy {
    /// Local write-through; the in-memory table stays canonical.
    DirectWrite,
    /// Destination-native save followed by a canonical re-load.
    SaveThenReload,
    /// Server-side import pulling straight from the source's blob location.
    ImportFromBlob,
    /// Transition not supported by the backends involved.
    Unsupported,
    /// Best-effort save-then-reload with failures wrapped uniformly.
    Generic,
}

fn save_strategy(from: SourceKind, to: SourceKind) -> SaveStrategy {
    use SourceKind::{Blob, File, Managed};
    match (from, to) {
        (File, File) => SaveStrategy::DirectWrite,
        (Managed, Blob) => SaveStrategy::Unsupported,
        (Blob, Managed) => SaveStrategy::ImportFromBlob,
        (File, _) | (_, File) => SaveStrategy::SaveThenReload,
        (Blob | Managed, _) => SaveStrategy::Generic,
    }
}

/// Options for [`Dataset::load`]. Exactly one source bundle must be set.
#[derive(Default)]
pub struct LoadOptions {
    source: Option<Arc<dyn DataSource>>,
    data_file: Option<PathBuf>,
    blob: Option<(Arc<dyn ObjectStore>, BlobLocation)>,
    schema: Option<Arc<dyn Schema>>,
    organize_data_as_group: bool,
}

impl LoadOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads from an already constructed source.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Loads from a local file path.
    #[must_use]
    pub fn with_data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_file = Some(path.into());
        self
    }

    /// Loads from an object-store location.
    #[must_use]
    pub fn with_blob(mut self, store: Arc<dyn ObjectStore>, location: BlobLocation) -> Self {
        self.blob = Some((store, location));
        self
    }

    /// Validates the loaded table against a schema.
    #[must_use]
    pub fn with_schema(mut self, schema: Arc<dyn Schema>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Loads nested conversation content as a grouped table (a `_group`
    /// column) instead of the packed representation.
    #[must_use]
    pub fn organize_data_as_group(mut self, organize: bool) -> Self {
        self.organize_data_as_group = organize;
        self
    }
}

/// Options for [`Dataset::save`].
#[derive(Default)]
pub struct SaveOptions {
    destination: Option<Arc<dyn DataSource>>,
    data_file: Option<PathBuf>,
    blob: Option<(Arc<dyn ObjectStore>, BlobLocation)>,
    schema: Option<Arc<dyn Schema>>,
    replace_source: bool,
}

impl SaveOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves to an already constructed source.
    #[must_use]
    pub fn with_destination(mut self, destination: Arc<dyn DataSource>) -> Self {
        self.destination = Some(destination);
        self
    }

    /// Saves to a local file path.
    #[must_use]
    pub fn with_data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_file = Some(path.into());
        self
    }

    /// Saves to an object-store location.
    #[must_use]
    pub fn with_blob(mut self, store: Arc<dyn ObjectStore>, location: BlobLocation) -> Self {
        self.blob = Some((store, location));
        self
    }

    /// Re-validates against a schema before saving.
    #[must_use]
    pub fn with_schema(mut self, schema: Arc<dyn Schema>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Makes the returned dataset adopt the destination as its source.
    #[must_use]
    pub fn replace_source(mut self, replace: bool) -> Self {
        self.replace_source = replace;
        self
    }
}

/// A table with source awareness and model I/O column bookkeeping.
#[derive(Clone)]
pub struct Dataset {
    table: Table,
    source_cache: Option<Arc<dyn DataSource>>,
    schema_cache: Option<Arc<dyn Schema>>,
    input_columns: Vec<String>,
    reference_column: Option<String>,
    eval_input_column: Option<String>,
    eval_output_column: Option<String>,
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("rows", &self.table.row_count())
            .field("columns", &self.table.column_names())
            .field("source", &self.source_cache.as_ref().map(|s| s.kind()))
            .field("input_columns", &self.input_columns)
            .field("reference_column", &self.reference_column)
            .finish_non_exhaustive()
    }
}

impl Dataset {
    /// Wraps an existing table with no source attached.
    #[must_use]
    pub fn from_table(table: Table) -> Self {
        Self {
            table,
            source_cache: None,
            schema_cache: None,
            input_columns: Vec::new(),
            reference_column: None,
            eval_input_column: None,
            eval_output_column: None,
        }
    }

    /// Builds an in-memory dataset from row mappings.
    #[must_use]
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self::from_table(Table::from_rows(rows))
    }

    /// Builds an in-memory dataset from `(name, cells)` pairs.
    pub fn from_columns(columns: Vec<(String, Vec<Value>)>) -> DatasetResult<Self> {
        Ok(Self::from_table(Table::from_columns(columns)?))
    }

    /// Builds a grouped dataset from one row list per group.
    #[must_use]
    pub fn from_grouped_rows(groups: Vec<Vec<Row>>) -> Self {
        Self::from_table(grouped_table(groups))
    }

    /// Loads a dataset from exactly one of the source bundles in
    /// `options`, parses it per the source's format, optionally validates
    /// it, and infers default I/O columns from the source's metadata.
    pub async fn load(options: LoadOptions) -> DatasetResult<Self> {
        let source = resolve_source(options.source, options.data_file, options.blob)?;
        let raw = source.fetch().await?;
        let table = assemble_table(raw, source.format_type(), options.organize_data_as_group)?;
        if let Some(schema) = &options.schema {
            if !schema.validate(&table) {
                return Err(DatasetError::SchemaValidation(schema.describe()));
            }
        }
        let mut dataset = Self::from_table(table);
        if let Some(inference) = source.inferred_columns() {
            dataset.input_columns = inference.input_columns;
            dataset.reference_column = inference.reference_column;
        }
        info!(
            rows = dataset.table.row_count(),
            source = %source.kind(),
            "dataset loaded"
        );
        dataset.source_cache = Some(source);
        dataset.schema_cache = options.schema;
        Ok(dataset)
    }

    /// Saves the dataset to exactly one destination bundle (or back to its
    /// own source when none is given), returning the post-save dataset.
    ///
    /// Cross-source transitions are resolved through a strategy table: a
    /// local write-through for file-to-file, destination-native save plus
    /// canonical re-load when a local end is involved, a server-side
    /// import for blob-to-managed, a typed error for managed-to-blob, and
    /// a best-effort save-then-reload (with failures wrapped uniformly)
    /// for the rest.
    pub async fn save(&self, options: SaveOptions) -> DatasetResult<Self> {
        let destination = match (options.destination, options.data_file, options.blob) {
            (None, None, None) => self.source_cache.clone().ok_or_else(|| {
                DatasetError::InvalidArgument(
                    "save needs a destination: the dataset has no source attached".to_string(),
                )
            })?,
            (destination, data_file, blob) => resolve_source(destination, data_file, blob)?,
        };

        let schema = options.schema.as_ref().or(self.schema_cache.as_ref());
        if let Some(schema) = schema {
            if !schema.validate(&self.table) {
                return Err(DatasetError::SchemaValidation(schema.describe()));
            }
        }

        let from = self.source_cache.as_ref().map_or(SourceKind::File, |source| source.kind());
        let to = destination.kind();
        let strategy = save_strategy(from, to);
        debug!(%from, %to, ?strategy, "saving dataset");

        let saved = match strategy {
            SaveStrategy::Unsupported => {
                return Err(DatasetError::UnsupportedSave { from, to });
            }
            SaveStrategy::DirectWrite => {
                let content = format::serialize(&self.table, destination.format_type())?;
                if !destination.save(&content).await? {
                    return Err(DatasetError::Save(format!(
                        "{to} destination reported failure"
                    )));
                }
                self.clone()
            }
            SaveStrategy::SaveThenReload => {
                let content = format::serialize(&self.table, destination.format_type())?;
                if !destination.save(&content).await? {
                    return Err(DatasetError::Save(format!(
                        "{to} destination reported failure"
                    )));
                }
                self.reload_from(Arc::clone(&destination)).await?
            }
            SaveStrategy::ImportFromBlob => {
                let location = self
                    .source_cache
                    .as_ref()
                    .and_then(|source| source.blob_location())
                    .ok_or_else(|| {
                        DatasetError::InvalidArgument(
                            "blob-to-managed save needs the source's blob location".to_string(),
                        )
                    })?;
                if !destination.import_from_blob(location).await? {
                    return Err(DatasetError::Save("managed import reported failure".to_string()));
                }
                self.clone()
            }
            SaveStrategy::Generic => {
                let result: DatasetResult<Self> = async {
                    let content = format::serialize(&self.table, destination.format_type())?;
                    if !destination.save(&content).await? {
                        return Err(DatasetError::Save(format!(
                            "{to} destination reported failure"
                        )));
                    }
                    self.reload_from(Arc::clone(&destination)).await
                }
                .await;
                result.map_err(|e| match e {
                    wrapped @ DatasetError::Save(_) => wrapped,
                    other => DatasetError::Save(other.to_string()),
                })?
            }
        };

        let mut saved = saved;
        if options.replace_source {
            saved.source_cache = Some(destination);
        } else {
            saved.source_cache = self.source_cache.clone();
        }
        Ok(saved)
    }

    async fn reload_from(&self, source: Arc<dyn DataSource>) -> DatasetResult<Self> {
        let raw = source.fetch().await?;
        let table = assemble_table(raw, source.format_type(), self.table.is_grouped())?;
        let mut reloaded = self.clone();
        reloaded.table = table;
        Ok(reloaded)
    }

    /// The underlying table.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// The source the dataset was loaded from or last saved to.
    pub fn source(&self) -> Option<&Arc<dyn DataSource>> {
        self.source_cache.as_ref()
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    /// Whether the table is in packed mode.
    pub fn is_packed(&self) -> bool {
        self.table.is_packed()
    }

    /// Whether the table is in grouped mode.
    pub fn is_grouped(&self) -> bool {
        self.table.is_grouped()
    }

    /// Columns treated as model input.
    pub fn input_columns(&self) -> &[String] {
        &self.input_columns
    }

    /// Sets the columns treated as model input.
    pub fn set_input_columns(&mut self, columns: Vec<String>) {
        self.input_columns = columns;
    }

    /// Column holding ground-truth references, if any.
    pub fn reference_column(&self) -> Option<&str> {
        self.reference_column.as_deref()
    }

    /// Sets the reference column.
    pub fn set_reference_column(&mut self, column: Option<String>) {
        self.reference_column = column;
    }

    /// Column holding the rendered inference input, on evaluation output
    /// datasets.
    pub fn eval_input_column(&self) -> Option<&str> {
        self.eval_input_column.as_deref()
    }

    /// Sets the rendered-inference-input column.
    pub fn set_eval_input_column(&mut self, column: Option<String>) {
        self.eval_input_column = column;
    }

    /// Column holding model output, on evaluation output datasets.
    pub fn eval_output_column(&self) -> Option<&str> {
        self.eval_output_column.as_deref()
    }

    /// Sets the model-output column.
    pub fn set_eval_output_column(&mut self, column: Option<String>) {
        self.eval_output_column = column;
    }

    /// Overrides the internal batch size used by `map` and `pack`.
    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.table.set_batch_size(batch_size);
    }

    /// Rejects random-access table operations while the dataset is backed
    /// by a source without locally materialized content.
    fn ensure_random_access(&self, op: &str) -> DatasetResult<()> {
        if let Some(source) = &self.source_cache {
            if !source.supports_random_access() {
                return Err(DatasetError::UnsupportedOperation { op: op.to_string() });
            }
        }
        Ok(())
    }

    /// Applies `op` to every row; see [`Table::map`].
    pub fn map<F>(&self, op: F) -> DatasetResult<Self>
    where
        F: FnMut(Row) -> Option<Row>,
    {
        self.ensure_random_access("map")?;
        let mut mapped = self.clone();
        mapped.table = self.table.map(op);
        Ok(mapped)
    }

    /// Keeps the rows `op` accepts; see [`Table::filter`].
    pub fn filter<F>(&self, op: F) -> DatasetResult<Self>
    where
        F: FnMut(&Row) -> bool,
    {
        self.ensure_random_access("filter")?;
        let mut filtered = self.clone();
        filtered.table = self.table.filter(op);
        Ok(filtered)
    }

    /// Appends a row.
    pub fn append(&mut self, row: Row) -> DatasetResult<()> {
        self.ensure_random_access("append")?;
        self.table.append(row)
    }

    /// Inserts a row at `index`.
    pub fn insert(&mut self, row: Row, index: usize) -> DatasetResult<()> {
        self.ensure_random_access("insert")?;
        self.table.insert(row, index)
    }

    /// Inserts a run of rows at `index`.
    pub fn insert_rows(&mut self, rows: Vec<Row>, index: usize) -> DatasetResult<()> {
        self.ensure_random_access("insert_rows")?;
        self.table.insert_rows(rows, index)
    }

    /// Deletes the row at `index`.
    pub fn delete(&mut self, index: usize) -> DatasetResult<()> {
        self.ensure_random_access("delete")?;
        self.table.delete(index)
    }

    /// Collapses the grouped table into packed mode; see [`Table::pack`].
    pub fn pack(&mut self) -> DatasetResult<bool> {
        self.ensure_random_access("pack")?;
        Ok(self.table.pack())
    }

    /// Expands the packed table into grouped mode; see [`Table::unpack`].
    pub fn unpack(&mut self) -> DatasetResult<bool> {
        self.ensure_random_access("unpack")?;
        Ok(self.table.unpack())
    }

    /// Appends another dataset's rows.
    pub fn concat(&mut self, other: &Dataset) -> DatasetResult<()> {
        self.ensure_random_access("concat")?;
        self.table.concat(&other.table)
    }

    /// Appends a new column.
    pub fn col_append(&mut self, name: impl Into<String>, values: Vec<Value>) -> DatasetResult<()> {
        self.ensure_random_access("col_append")?;
        self.table.col_append(name, values)
    }

    /// Inserts a new column at a position.
    pub fn col_insert(
        &mut self,
        name: impl Into<String>,
        values: Vec<Value>,
        position: usize,
    ) -> DatasetResult<()> {
        self.ensure_random_access("col_insert")?;
        self.table.col_insert(name, values, position)
    }

    /// Removes a column by name.
    pub fn col_delete(&mut self, name: &str) -> DatasetResult<crate::table::Column> {
        self.ensure_random_access("col_delete")?;
        self.table.col_delete(name)
    }

    /// Applies `op` to every cell of one column.
    pub fn col_map<F>(&mut self, name: &str, op: F) -> DatasetResult<()>
    where
        F: FnMut(&Value) -> Value,
    {
        self.ensure_random_access("col_map")?;
        self.table.col_map(name, op)
    }

    /// Renames columns; see [`Table::col_renames`].
    pub fn col_renames(&mut self, renames: &[(&str, &str)]) -> DatasetResult<()> {
        self.ensure_random_access("col_renames")?;
        self.table.col_renames(renames)
    }
}

fn resolve_source(
    source: Option<Arc<dyn DataSource>>,
    data_file: Option<PathBuf>,
    blob: Option<(Arc<dyn ObjectStore>, BlobLocation)>,
) -> DatasetResult<Arc<dyn DataSource>> {
    match (source, data_file, blob) {
        (Some(source), None, None) => Ok(source),
        (None, Some(path), None) => Ok(Arc::new(FileDataSource::new(path)?)),
        (None, None, Some((store, location))) => Ok(Arc::new(BlobDataSource::new(store, location))),
        (source, data_file, blob) => {
            let supplied = usize::from(source.is_some())
                + usize::from(data_file.is_some())
                + usize::from(blob.is_some());
            Err(DatasetError::InvalidArgument(format!(
                "exactly one source bundle must be supplied, got {supplied}"
            )))
        }
    }
}

fn grouped_table(groups: Vec<Vec<Row>>) -> Table {
    let mut rows = Vec::new();
    for (group_id, group) in groups.into_iter().enumerate() {
        for mut row in group {
            row.insert(GROUP_COLUMN.to_string(), Value::from(group_id as i64));
            rows.push(row);
        }
    }
    let hint = vec![GROUP_COLUMN.to_string()];
    Table::from_rows_ordered(rows, &hint)
}

fn packed_table(groups: Vec<Vec<Row>>) -> Table {
    let cells: Vec<Value> = groups
        .into_iter()
        .map(|group| Value::Array(group.into_iter().map(Value::Object).collect()))
        .collect();
    Table::from_rows_ordered(
        cells
            .into_iter()
            .map(|cell| {
                let mut row = Row::new();
                row.insert(PACK_COLUMN.to_string(), cell);
                row
            })
            .collect(),
        &[],
    )
}

fn assemble_table(
    raw: RawContent,
    format: FormatType,
    organize_data_as_group: bool,
) -> DatasetResult<Table> {
    let mut flat: Vec<Row> = Vec::new();
    let mut groups: Vec<Vec<Row>> = Vec::new();
    for part in raw.into_parts() {
        match format::parse(format, &part)? {
            ParsedContent::Flat(rows) => flat.extend(rows),
            ParsedContent::Grouped(parsed) => groups.extend(parsed),
        }
    }
    if !groups.is_empty() && !flat.is_empty() {
        return Err(DatasetError::Format(
            "source mixes grouped and flat records".to_string(),
        ));
    }
    if groups.is_empty() {
        Ok(Table::from_rows(flat))
    } else if organize_data_as_group {
        Ok(grouped_table(groups))
    } else {
        Ok(packed_table(groups))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnSchema;
    use crate::test_support::MemoryObjectStore;
    use serde_json::json;

    fn write_jsonl(dir: &std::path::Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[tokio::test]
    async fn test_load_requires_exactly_one_bundle() {
        let err = Dataset::load(LoadOptions::new()).await.unwrap_err();
        assert!(matches!(err, DatasetError::InvalidArgument(_)));

        let dir = tempfile::tempdir().unwrap();
        let path = write_jsonl(dir.path(), "a.jsonl", "{\"prompt\": \"x\"}");
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::default());
        let err = Dataset::load(
            LoadOptions::new()
                .with_data_file(&path)
                .with_blob(store, BlobLocation::new("b", "k.jsonl")),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DatasetError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_load_flat_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path =
            write_jsonl(dir.path(), "a.jsonl", "{\"prompt\": \"x\"}\n{\"prompt\": \"y\"}");
        let dataset = Dataset::load(LoadOptions::new().with_data_file(path)).await.unwrap();
        assert_eq!(dataset.row_count(), 2);
        assert!(!dataset.is_grouped());
    }

    #[tokio::test]
    async fn test_load_nested_jsonl_as_group_or_packed() {
        let dir = tempfile::tempdir().unwrap();
        let content = "[{\"prompt\": \"a\"}, {\"prompt\": \"b\"}]\n[{\"prompt\": \"c\"}]";
        let path = write_jsonl(dir.path(), "conv.jsonl", content);

        let grouped = Dataset::load(
            LoadOptions::new().with_data_file(&path).organize_data_as_group(true),
        )
        .await
        .unwrap();
        assert!(grouped.is_grouped());
        assert_eq!(grouped.row_count(), 3);

        let packed = Dataset::load(LoadOptions::new().with_data_file(&path)).await.unwrap();
        assert!(packed.is_packed());
        assert_eq!(packed.row_count(), 2);
    }

    #[tokio::test]
    async fn test_load_schema_validation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_jsonl(dir.path(), "a.jsonl", "{\"prompt\": \"x\"}");
        let schema = Arc::new(ColumnSchema::new(vec!["response".to_string()]));
        let err = Dataset::load(LoadOptions::new().with_data_file(path).with_schema(schema))
            .await
            .unwrap_err();
        assert!(matches!(err, DatasetError::SchemaValidation(_)));
    }

    #[tokio::test]
    async fn test_random_access_guard_on_blob_source() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::default());
        store.put_object("bucket", "k.jsonl", b"{\"prompt\": \"x\"}").await.unwrap();
        let dataset = Dataset::load(
            LoadOptions::new().with_blob(store, BlobLocation::new("bucket", "k.jsonl")),
        )
        .await
        .unwrap();
        let err = dataset.map(Some).unwrap_err();
        assert!(matches!(err, DatasetError::UnsupportedOperation { .. }));
        let mut dataset = dataset;
        let err = dataset.delete(0).unwrap_err();
        assert!(matches!(err, DatasetError::UnsupportedOperation { .. }));
    }

    #[tokio::test]
    async fn test_save_file_to_file_direct_write() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_jsonl(dir.path(), "in.jsonl", "{\"prompt\": \"x\"}");
        let dataset = Dataset::load(LoadOptions::new().with_data_file(source)).await.unwrap();
        let out = dir.path().join("out.jsonl");
        let saved =
            dataset.save(SaveOptions::new().with_data_file(&out).replace_source(true)).await.unwrap();
        assert_eq!(saved.source().unwrap().kind(), SourceKind::File);
        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.contains("\"prompt\""));
    }

    #[tokio::test]
    async fn test_save_keeps_original_source_without_replace() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_jsonl(dir.path(), "in.jsonl", "{\"prompt\": \"x\"}");
        let dataset =
            Dataset::load(LoadOptions::new().with_data_file(&source)).await.unwrap();
        let out = dir.path().join("out.jsonl");
        let saved = dataset.save(SaveOptions::new().with_data_file(&out)).await.unwrap();
        // Source is unchanged; the write still happened.
        assert!(std::fs::metadata(&out).is_ok());
        assert!(saved.source().is_some());
    }

    #[tokio::test]
    async fn test_save_blob_to_file_reloads_canonical_table() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::default());
        store.put_object("bucket", "k.jsonl", b"{\"prompt\": \"x\"}").await.unwrap();
        let dataset = Dataset::load(
            LoadOptions::new().with_blob(store, BlobLocation::new("bucket", "k.jsonl")),
        )
        .await
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.jsonl");
        let saved = dataset
            .save(SaveOptions::new().with_data_file(&out).replace_source(true))
            .await
            .unwrap();
        assert_eq!(saved.row_count(), 1);
        assert_eq!(saved.source().unwrap().kind(), SourceKind::File);
    }

    #[test]
    fn test_save_strategy_table() {
        use SourceKind::{Blob, File, Managed};
        assert_eq!(save_strategy(File, File), SaveStrategy::DirectWrite);
        assert_eq!(save_strategy(Managed, Blob), SaveStrategy::Unsupported);
        assert_eq!(save_strategy(Blob, Managed), SaveStrategy::ImportFromBlob);
        assert_eq!(save_strategy(File, Managed), SaveStrategy::SaveThenReload);
        assert_eq!(save_strategy(Managed, File), SaveStrategy::SaveThenReload);
        assert_eq!(save_strategy(Blob, Blob), SaveStrategy::Generic);
        assert_eq!(save_strategy(Managed, Managed), SaveStrategy::Generic);
    }

    #[test]
    fn test_from_grouped_rows() {
        let mut row_a = Row::new();
        row_a.insert("x".to_string(), json!("a"));
        let mut row_b = Row::new();
        row_b.insert("x".to_string(), json!("b"));
        let dataset = Dataset::from_grouped_rows(vec![vec![row_a, row_b.clone()], vec![row_b]]);
        assert!(dataset.is_grouped());
        assert_eq!(dataset.row_count(), 3);
    }
}
