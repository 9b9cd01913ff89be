//! Managed dataset source.
//!
//! A managed dataset's authoritative storage and lifecycle (release, export,
//! import) are owned by the remote platform. Fetching goes through a local
//! cache directory keyed by the dataset's `(group, id, version)` triple;
//! the cache is refreshed by driving a server-side export task to a
//! terminal state, downloading the resulting archive, and extracting it
//! behind a maximum-uncompressed-size guard.

use crate::error::{DatasetError, DatasetResult};
use crate::format::FormatType;
use crate::poll::Poller;
use crate::source::{
    BlobLocation, ColumnInference, DataSource, ObjectStore, RawContent, SourceKind,
    TrainingSource,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

/// Identity of a managed dataset version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedDatasetId {
    pub group_id: u64,
    pub dataset_id: u64,
    pub version: u32,
}

impl ManagedDatasetId {
    #[must_use]
    pub fn new(group_id: u64, dataset_id: u64, version: u32) -> Self {
        Self { group_id, dataset_id, version }
    }
}

impl fmt::Display for ManagedDatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/v{}", self.group_id, self.dataset_id, self.version)
    }
}

/// Data template declared on the remote dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemplateType {
    /// Multi-turn conversations without a fixed turn order.
    NonSortedConversation,
    /// Multi-turn conversations with a fixed turn order.
    SortedConversation,
    /// Single-turn prompts without references.
    QuerySet,
    /// Free-form text records.
    GenericText,
}

impl TemplateType {
    /// Default I/O columns implied by the template, if any.
    #[must_use]
    pub fn inferred_columns(self) -> Option<ColumnInference> {
        match self {
            Self::NonSortedConversation | Self::SortedConversation => Some(ColumnInference {
                input_columns: vec!["prompt".to_string()],
                reference_column: Some("response".to_string()),
            }),
            Self::QuerySet => Some(ColumnInference {
                input_columns: vec!["prompt".to_string()],
                reference_column: None,
            }),
            Self::GenericText => None,
        }
    }
}

/// Whether the remote set is intended for training or evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetKind {
    Train,
    Evaluation,
}

/// Metadata reported by the platform for a managed dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteDatasetInfo {
    pub template_type: TemplateType,
    pub set_kind: SetKind,
    pub format: FormatType,
    /// Bucket/prefix where import payloads for this dataset are staged.
    pub storage: BlobLocation,
    /// Last server-side modification time.
    pub modified_at: DateTime<Utc>,
    pub released: bool,
}

/// Status of a server-side export task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportStatus {
    Running,
    Finished { download_url: String, finished_at: DateTime<Utc> },
    Failed,
}

/// A previously requested export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRecord {
    pub export_id: String,
    pub status: ExportStatus,
}

/// Status of a server-side import task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    Running,
    Finished,
    Failed,
}

/// Release state of a managed dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStatus {
    NotReleased,
    Running,
    Released,
    Failed,
}

/// Remote console collaborator for managed dataset lifecycle operations.
///
/// Endpoint bodies live outside this crate; tests script the trait.
#[async_trait]
pub trait DatasetBackend: Send + Sync {
    /// Reads the dataset's current metadata.
    async fn dataset_info(&self, id: &ManagedDatasetId) -> DatasetResult<RemoteDatasetInfo>;

    /// Lists exports previously requested for the dataset.
    async fn list_exports(&self, id: &ManagedDatasetId) -> DatasetResult<Vec<ExportRecord>>;

    /// Requests a new server-side export, returning its id.
    async fn create_export(&self, id: &ManagedDatasetId) -> DatasetResult<String>;

    /// Reads an export task's status.
    async fn export_status(
        &self,
        id: &ManagedDatasetId,
        export_id: &str,
    ) -> DatasetResult<ExportStatus>;

    /// Streams an export archive to `dest`, returning the byte count.
    async fn download_export(&self, url: &str, dest: &Path) -> DatasetResult<u64>;

    /// Creates an import task pulling from the given blob location.
    async fn create_import(
        &self,
        id: &ManagedDatasetId,
        location: &BlobLocation,
    ) -> DatasetResult<String>;

    /// Reads an import task's status.
    async fn import_status(
        &self,
        id: &ManagedDatasetId,
        import_id: &str,
    ) -> DatasetResult<ImportStatus>;

    /// Requests the dataset be released for training use.
    async fn release(&self, id: &ManagedDatasetId) -> DatasetResult<()>;

    /// Reads the dataset's release state.
    async fn release_status(&self, id: &ManagedDatasetId) -> DatasetResult<ReleaseStatus>;
}

/// Sidecar metadata written next to extracted cache content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheInfo {
    /// When the server finished producing the cached export.
    pub export_finished_at: DateTime<Utc>,
    /// When this client downloaded and extracted it.
    pub downloaded_at: DateTime<Utc>,
}

/// Tuning knobs for a managed source.
#[derive(Debug, Clone)]
pub struct ManagedSourceConfig {
    /// Root of the local cache tree.
    pub cache_root: PathBuf,
    /// Interval between remote status checks.
    pub poll_interval: Duration,
    /// Upper bound on any single remote wait.
    pub poll_deadline: Option<Duration>,
    /// Maximum allowed uncompressed archive size.
    pub max_unpacked_bytes: u64,
    /// Eagerly materialize the local cache at connect time.
    pub download_when_init: bool,
    /// Cooperative cancellation for remote waits.
    pub cancellation: CancellationToken,
}

impl Default for ManagedSourceConfig {
    fn default() -> Self {
        Self {
            cache_root: std::env::temp_dir().join("nimbus_dataset_cache"),
            poll_interval: Duration::from_secs(2),
            poll_deadline: Some(Duration::from_secs(600)),
            max_unpacked_bytes: 1024 * 1024 * 1024,
            download_when_init: false,
            cancellation: CancellationToken::new(),
        }
    }
}

/// A dataset source backed by the platform's managed dataset service.
#[derive(Clone)]
pub struct ManagedDataSource {
    id: ManagedDatasetId,
    backend: Arc<dyn DatasetBackend>,
    store: Arc<dyn ObjectStore>,
    config: ManagedSourceConfig,
    template_type: TemplateType,
    set_kind: SetKind,
    format: FormatType,
    storage: BlobLocation,
}

impl fmt::Debug for ManagedDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedDataSource")
            .field("id", &self.id)
            .field("template_type", &self.template_type)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl ManagedDataSource {
    /// Connects to a managed dataset, reading its metadata; with
    /// `download_when_init` set, the local cache is materialized eagerly.
    pub async fn connect(
        id: ManagedDatasetId,
        backend: Arc<dyn DatasetBackend>,
        store: Arc<dyn ObjectStore>,
        config: ManagedSourceConfig,
    ) -> DatasetResult<Self> {
        let remote = backend.dataset_info(&id).await?;
        let source = Self {
            id,
            backend,
            store,
            config,
            template_type: remote.template_type,
            set_kind: remote.set_kind,
            format: remote.format,
            storage: remote.storage,
        };
        if source.config.download_when_init {
            source.ensure_local_cache().await?;
        }
        Ok(source)
    }

    /// The dataset identity triple.
    pub fn id(&self) -> ManagedDatasetId {
        self.id
    }

    /// The remote template type.
    pub fn template_type(&self) -> TemplateType {
        self.template_type
    }

    /// Whether the set is a training or evaluation set.
    pub fn set_kind(&self) -> SetKind {
        self.set_kind
    }

    fn poller(&self) -> Poller {
        let mut poller = Poller::new(self.config.poll_interval)
            .with_cancellation(self.config.cancellation.clone());
        if let Some(deadline) = self.config.poll_deadline {
            poller = poller.with_deadline(deadline);
        }
        poller
    }

    fn cache_dir(&self) -> PathBuf {
        self.config
            .cache_root
            .join(self.id.group_id.to_string())
            .join(self.id.dataset_id.to_string())
            .join(self.id.version.to_string())
    }

    fn content_dir(&self) -> PathBuf {
        self.cache_dir().join("content")
    }

    fn info_path(&self) -> PathBuf {
        self.cache_dir().join("info.json")
    }

    fn archive_path(&self) -> PathBuf {
        self.cache_dir().join("export.tar.gz")
    }

    fn cached_info(&self) -> Option<CacheInfo> {
        let raw = std::fs::read_to_string(self.info_path()).ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// Makes sure the cache holds an extraction of an export at least as
    /// new as the dataset's last remote modification, refreshing it when
    /// absent or stale. Returns the content directory.
    pub async fn ensure_local_cache(&self) -> DatasetResult<PathBuf> {
        let remote = self.backend.dataset_info(&self.id).await?;
        if let Some(cached) = self.cached_info() {
            if cached.export_finished_at >= remote.modified_at && self.content_dir().exists() {
                debug!(dataset = %self.id, "local cache is fresh");
                return Ok(self.content_dir());
            }
        }

        let (download_url, finished_at) = self.resolve_export(remote.modified_at).await?;
        let archive = self.archive_path();
        tokio::fs::create_dir_all(self.cache_dir()).await?;
        let bytes = self.backend.download_export(&download_url, &archive).await?;
        info!(dataset = %self.id, bytes, "downloaded export archive");

        let unpacked = archive_unpacked_size(&archive)?;
        if unpacked > self.config.max_unpacked_bytes {
            return Err(DatasetError::ArchiveTooLarge {
                size: unpacked,
                limit: self.config.max_unpacked_bytes,
            });
        }

        let content = self.content_dir();
        if content.exists() {
            tokio::fs::remove_dir_all(&content).await?;
        }
        tokio::fs::create_dir_all(&content).await?;
        extract_archive(&archive, &content)?;

        let sidecar = CacheInfo { export_finished_at: finished_at, downloaded_at: Utc::now() };
        tokio::fs::write(self.info_path(), serde_json::to_string_pretty(&sidecar)?).await?;
        Ok(content)
    }

    /// Picks a usable finished export newer than `modified_at`, requesting
    /// and polling a fresh one when none exists.
    async fn resolve_export(
        &self,
        modified_at: DateTime<Utc>,
    ) -> DatasetResult<(String, DateTime<Utc>)> {
        for record in self.backend.list_exports(&self.id).await? {
            if let ExportStatus::Finished { download_url, finished_at } = record.status {
                if finished_at >= modified_at {
                    debug!(dataset = %self.id, export = %record.export_id, "reusing finished export");
                    return Ok((download_url, finished_at));
                }
            }
        }

        let export_id = self.backend.create_export(&self.id).await?;
        info!(dataset = %self.id, export = %export_id, "requested dataset export");
        let result = self
            .poller()
            .run(|| {
                let export_id = export_id.clone();
                async move {
                    match self.backend.export_status(&self.id, &export_id).await? {
                        ExportStatus::Running => Ok(None),
                        ExportStatus::Finished { download_url, finished_at } => {
                            Ok(Some((download_url, finished_at)))
                        }
                        ExportStatus::Failed => Err(DatasetError::RemoteTask {
                            task: "export".to_string(),
                            status: "Failed".to_string(),
                        }),
                    }
                }
            })
            .await?;
        Ok(result)
    }

    /// Releases the dataset if it is not yet released, waiting for the
    /// release to reach a terminal state.
    pub async fn ensure_released(&self) -> DatasetResult<()> {
        match self.backend.release_status(&self.id).await? {
            ReleaseStatus::Released => return Ok(()),
            ReleaseStatus::Failed => {
                return Err(DatasetError::RemoteTask {
                    task: "release".to_string(),
                    status: "Failed".to_string(),
                });
            }
            ReleaseStatus::NotReleased => {
                info!(dataset = %self.id, "releasing dataset");
                self.backend.release(&self.id).await?;
            }
            ReleaseStatus::Running => {}
        }
        self.poller()
            .run(|| async move {
                match self.backend.release_status(&self.id).await? {
                    ReleaseStatus::Released => Ok(Some(())),
                    ReleaseStatus::Running | ReleaseStatus::NotReleased => Ok(None),
                    ReleaseStatus::Failed => Err(DatasetError::RemoteTask {
                        task: "release".to_string(),
                        status: "Failed".to_string(),
                    }),
                }
            })
            .await
            .map_err(DatasetError::from)
    }

    async fn run_import(&self, location: &BlobLocation) -> DatasetResult<bool> {
        let import_id = self.backend.create_import(&self.id, location).await?;
        info!(dataset = %self.id, import = %import_id, "created import task");
        let finished = self
            .poller()
            .run(|| {
                let import_id = import_id.clone();
                async move {
                    match self.backend.import_status(&self.id, &import_id).await? {
                        ImportStatus::Running => Ok::<_, DatasetError>(None),
                        ImportStatus::Finished => Ok(Some(true)),
                        ImportStatus::Failed => Ok(Some(false)),
                    }
                }
            })
            .await?;
        if !finished {
            warn!(dataset = %self.id, import = %import_id, "import task failed");
        }
        Ok(finished)
    }
}

#[async_trait]
impl DataSource for ManagedDataSource {
    async fn fetch(&self) -> DatasetResult<RawContent> {
        let content_dir = self.ensure_local_cache().await?;
        let mut files: Vec<PathBuf> = WalkDir::new(&content_dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(DatasetError::Format(format!(
                "export of dataset {} contained no files",
                self.id
            )));
        }
        let mut parts = Vec::with_capacity(files.len());
        for file in &files {
            parts.push(tokio::fs::read_to_string(file).await?);
        }
        if parts.len() == 1 {
            Ok(RawContent::Single(parts.remove(0)))
        } else {
            Ok(RawContent::Many(parts))
        }
    }

    async fn save(&self, content: &str) -> DatasetResult<bool> {
        let key = format!(
            "{}/data_{}.{}",
            self.storage.key.trim_end_matches('/'),
            Uuid::new_v4(),
            self.format.extension()
        );
        self.store.put_object(&self.storage.bucket, &key, content.as_bytes()).await?;
        debug!(dataset = %self.id, key = %key, "uploaded import payload");
        let location =
            BlobLocation { bucket: self.storage.bucket.clone(), key, region: self.storage.region.clone() };
        self.run_import(&location).await
    }

    fn format_type(&self) -> FormatType {
        self.format
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Managed
    }

    fn supports_random_access(&self) -> bool {
        self.content_dir().exists()
    }

    async fn import_from_blob(&self, location: &BlobLocation) -> DatasetResult<bool> {
        self.run_import(location).await
    }

    fn inferred_columns(&self) -> Option<ColumnInference> {
        self.template_type.inferred_columns()
    }

    /// A managed dataset must be released before a training job can
    /// reference it.
    async fn training_descriptor(&self) -> DatasetResult<Option<TrainingSource>> {
        self.ensure_released().await?;
        Ok(Some(TrainingSource { kind: SourceKind::Managed, reference: self.id.to_string() }))
    }
}

fn archive_unpacked_size(path: &Path) -> DatasetResult<u64> {
    let file = std::fs::File::open(path)?;
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
    let mut total = 0_u64;
    for entry in archive.entries()? {
        total = total.saturating_add(entry?.size());
    }
    Ok(total)
}

fn extract_archive(path: &Path, dest: &Path) -> DatasetResult<()> {
    let file = std::fs::File::open(path)?;
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
    archive.unpack(dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryObjectStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    fn gzip_tar(files: &[(&str, &str)]) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, content.as_bytes()).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    struct ScriptedBackend {
        archive: Vec<u8>,
        modified_at: DateTime<Utc>,
        export_polls_until_finish: usize,
        export_polls: AtomicUsize,
        exports_created: AtomicUsize,
        import_result: ImportStatus,
        release_states: Mutex<Vec<ReleaseStatus>>,
        released: AtomicUsize,
    }

    impl ScriptedBackend {
        fn new(archive: Vec<u8>) -> Self {
            Self {
                archive,
                modified_at: Utc::now(),
                export_polls_until_finish: 1,
                export_polls: AtomicUsize::new(0),
                exports_created: AtomicUsize::new(0),
                import_result: ImportStatus::Finished,
                release_states: Mutex::new(vec![ReleaseStatus::Released]),
                released: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DatasetBackend for ScriptedBackend {
        async fn dataset_info(&self, _id: &ManagedDatasetId) -> DatasetResult<RemoteDatasetInfo> {
            Ok(RemoteDatasetInfo {
                template_type: TemplateType::SortedConversation,
                set_kind: SetKind::Train,
                format: FormatType::Jsonl,
                storage: BlobLocation::new("bucket", "staging/"),
                modified_at: self.modified_at,
                released: false,
            })
        }

        async fn list_exports(&self, _id: &ManagedDatasetId) -> DatasetResult<Vec<ExportRecord>> {
            Ok(Vec::new())
        }

        async fn create_export(&self, _id: &ManagedDatasetId) -> DatasetResult<String> {
            self.exports_created.fetch_add(1, Ordering::SeqCst);
            Ok("export-1".to_string())
        }

        async fn export_status(
            &self,
            _id: &ManagedDatasetId,
            _export_id: &str,
        ) -> DatasetResult<ExportStatus> {
            let polls = self.export_polls.fetch_add(1, Ordering::SeqCst);
            if polls + 1 >= self.export_polls_until_finish {
                Ok(ExportStatus::Finished {
                    download_url: "https://exports/export-1".to_string(),
                    finished_at: Utc::now(),
                })
            } else {
                Ok(ExportStatus::Running)
            }
        }

        async fn download_export(&self, _url: &str, dest: &Path) -> DatasetResult<u64> {
            tokio::fs::write(dest, &self.archive).await?;
            Ok(self.archive.len() as u64)
        }

        async fn create_import(
            &self,
            _id: &ManagedDatasetId,
            _location: &BlobLocation,
        ) -> DatasetResult<String> {
            Ok("import-1".to_string())
        }

        async fn import_status(
            &self,
            _id: &ManagedDatasetId,
            _import_id: &str,
        ) -> DatasetResult<ImportStatus> {
            Ok(self.import_result)
        }

        async fn release(&self, _id: &ManagedDatasetId) -> DatasetResult<()> {
            self.released.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn release_status(&self, _id: &ManagedDatasetId) -> DatasetResult<ReleaseStatus> {
            let mut states = self.release_states.lock().await;
            if states.len() > 1 {
                Ok(states.remove(0))
            } else {
                Ok(states[0])
            }
        }
    }

    fn test_config(root: &Path) -> ManagedSourceConfig {
        ManagedSourceConfig {
            cache_root: root.to_path_buf(),
            poll_interval: Duration::from_millis(5),
            poll_deadline: Some(Duration::from_secs(5)),
            ..ManagedSourceConfig::default()
        }
    }

    async fn connect(
        backend: Arc<ScriptedBackend>,
        config: ManagedSourceConfig,
    ) -> ManagedDataSource {
        ManagedDataSource::connect(
            ManagedDatasetId::new(1, 2, 3),
            backend,
            Arc::new(MemoryObjectStore::default()),
            config,
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_exports_downloads_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let archive = gzip_tar(&[("data.jsonl", "{\"prompt\": \"q\"}")]);
        let backend = Arc::new(ScriptedBackend::new(archive));
        let source = connect(Arc::clone(&backend), test_config(dir.path())).await;

        assert!(!source.supports_random_access());
        let content = source.fetch().await.unwrap();
        assert_eq!(content, RawContent::Single("{\"prompt\": \"q\"}".to_string()));
        assert!(source.supports_random_access());
        assert_eq!(backend.exports_created.load(Ordering::SeqCst), 1);

        // Second fetch is served from the cache without a new export.
        source.fetch().await.unwrap();
        assert_eq!(backend.exports_created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_archive_size_guard() {
        let dir = tempfile::tempdir().unwrap();
        let archive = gzip_tar(&[("data.jsonl", "{\"prompt\": \"a long payload here\"}")]);
        let backend = Arc::new(ScriptedBackend::new(archive));
        let mut config = test_config(dir.path());
        config.max_unpacked_bytes = 4;
        let source = connect(backend, config).await;
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, DatasetError::ArchiveTooLarge { .. }));
    }

    #[tokio::test]
    async fn test_save_uploads_and_imports() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(ScriptedBackend::new(gzip_tar(&[("d.jsonl", "{}")])));
        let store = Arc::new(MemoryObjectStore::default());
        let source = ManagedDataSource::connect(
            ManagedDatasetId::new(1, 2, 3),
            Arc::clone(&backend) as Arc<dyn DatasetBackend>,
            Arc::clone(&store) as Arc<dyn ObjectStore>,
            test_config(dir.path()),
        )
        .await
        .unwrap();

        assert!(source.save("{\"prompt\": \"q\"}").await.unwrap());
        assert_eq!(store.object_count().await, 1);
        let keys = store.list_objects("bucket", "staging/").await.unwrap();
        assert!(keys[0].ends_with(".jsonl"), "suffix follows the declared format: {keys:?}");
    }

    #[tokio::test]
    async fn test_save_reports_failed_import() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = ScriptedBackend::new(gzip_tar(&[("d.jsonl", "{}")]));
        backend.import_result = ImportStatus::Failed;
        let source = connect(Arc::new(backend), test_config(dir.path())).await;
        assert!(!source.save("{}").await.unwrap());
    }

    #[tokio::test]
    async fn test_ensure_released_triggers_and_polls() {
        let dir = tempfile::tempdir().unwrap();
        let backend = ScriptedBackend {
            release_states: Mutex::new(vec![
                ReleaseStatus::NotReleased,
                ReleaseStatus::Running,
                ReleaseStatus::Released,
            ]),
            ..ScriptedBackend::new(gzip_tar(&[("d.jsonl", "{}")]))
        };
        let backend = Arc::new(backend);
        let source = connect(Arc::clone(&backend), test_config(dir.path())).await;
        source.ensure_released().await.unwrap();
        assert_eq!(backend.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_template_column_inference() {
        let sorted = TemplateType::SortedConversation.inferred_columns().unwrap();
        assert_eq!(sorted.input_columns, vec!["prompt"]);
        assert_eq!(sorted.reference_column.as_deref(), Some("response"));

        let query = TemplateType::QuerySet.inferred_columns().unwrap();
        assert!(query.reference_column.is_none());

        assert!(TemplateType::GenericText.inferred_columns().is_none());
    }
}
