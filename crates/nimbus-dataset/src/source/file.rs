//! Local file and directory data source.

use crate::error::{DatasetError, DatasetResult};
use crate::format::FormatType;
use crate::source::{DataSource, RawContent, SourceKind};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;
use walkdir::WalkDir;

/// A source bound to a local path, either a single file or a directory of
/// files sharing one format.
#[derive(Debug, Clone)]
pub struct FileDataSource {
    path: PathBuf,
    format: FormatType,
}

impl FileDataSource {
    /// Creates a source for a file path, inferring the format from the
    /// suffix.
    pub fn new(path: impl Into<PathBuf>) -> DatasetResult<Self> {
        let path = path.into();
        let format = FormatType::from_path(&path).ok_or_else(|| {
            DatasetError::InvalidArgument(format!(
                "cannot infer a format from path {}",
                path.display()
            ))
        })?;
        Ok(Self { path, format })
    }

    /// Creates a source with an explicit format (required for directories,
    /// which carry no suffix).
    #[must_use]
    pub fn with_format(path: impl Into<PathBuf>, format: FormatType) -> Self {
        Self { path: path.into(), format }
    }

    /// The bound path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn matching_files(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.path)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| FormatType::from_path(entry.path()) == Some(self.format))
            .map(|entry| entry.into_path())
            .collect()
    }
}

#[async_trait]
impl DataSource for FileDataSource {
    async fn fetch(&self) -> DatasetResult<RawContent> {
        if self.path.is_dir() {
            let mut parts = Vec::new();
            for file in self.matching_files() {
                parts.push(tokio::fs::read_to_string(&file).await?);
            }
            debug!(path = %self.path.display(), files = parts.len(), "fetched directory source");
            Ok(RawContent::Many(parts))
        } else {
            Ok(RawContent::Single(tokio::fs::read_to_string(&self.path).await?))
        }
    }

    async fn save(&self, content: &str) -> DatasetResult<bool> {
        // A directory destination always gets a fresh uniquely named file; an
        // explicit file path overwrites.
        let target = if self.path.is_dir() {
            self.path.join(format!("data_{}.{}", Uuid::new_v4(), self.format.extension()))
        } else {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            self.path.clone()
        };
        tokio::fs::write(&target, content).await?;
        debug!(path = %target.display(), bytes = content.len(), "saved file source");
        Ok(true)
    }

    fn format_type(&self) -> FormatType {
        self.format
    }

    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    fn supports_random_access(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_inference_from_suffix() {
        let source = FileDataSource::new("data/train.jsonl").unwrap();
        assert_eq!(source.format_type(), FormatType::Jsonl);
        assert!(FileDataSource::new("data/train.bin").is_err());
    }

    #[tokio::test]
    async fn test_fetch_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("set.jsonl");
        tokio::fs::write(&path, "{\"a\": 1}").await.unwrap();
        let source = FileDataSource::new(&path).unwrap();
        assert_eq!(source.fetch().await.unwrap(), RawContent::Single("{\"a\": 1}".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_directory_collects_matching_files() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a.jsonl"), "{\"a\": 1}").await.unwrap();
        tokio::fs::write(dir.path().join("b.jsonl"), "{\"a\": 2}").await.unwrap();
        tokio::fs::write(dir.path().join("ignored.csv"), "a\n1").await.unwrap();
        let source = FileDataSource::with_format(dir.path(), FormatType::Jsonl);
        match source.fetch().await.unwrap() {
            RawContent::Many(parts) => assert_eq!(parts.len(), 2),
            RawContent::Single(_) => panic!("expected one payload per file"),
        }
    }

    #[tokio::test]
    async fn test_save_into_directory_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileDataSource::with_format(dir.path(), FormatType::Jsonl);
        assert!(source.save("{\"a\": 1}").await.unwrap());
        assert!(source.save("{\"a\": 2}").await.unwrap());
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 2);
    }

    #[tokio::test]
    async fn test_save_to_explicit_path_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");
        let source = FileDataSource::new(&path).unwrap();
        source.save("first").await.unwrap();
        source.save("second").await.unwrap();
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "second");
    }
}
