//! Local filesystem storage implementation.
//!
//! Record streams are opened in append mode and never rewritten, so a crash
//! can at worst leave a torn last line, which readers skip. The visited-set
//! and progress files are replaced atomically (write to temp, then rename),
//! so they always hold the result of a completed write.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{PathsConfig, Progress, Record, VisitedSet};
use crate::storage::{ProgressStore, RecordScan, RecordSink, VisitedStore};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
    paths: PathsConfig,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory with default file names.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self::with_paths(root_dir, PathsConfig::default())
    }

    /// Create a LocalStorage with custom file names.
    pub fn with_paths(root_dir: impl Into<PathBuf>, paths: PathsConfig) -> Self {
        Self {
            root_dir: root_dir.into(),
            paths,
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Path of a category's record stream.
    pub fn stream_path(&self, category: &str) -> PathBuf {
        self.root_dir
            .join(&self.paths.records_dir)
            .join(format!("{category}_all.jsonl"))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(&self.path(key)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(|e| {
                AppError::crawl(key, format!("corrupt state file: {e}"))
            })?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RecordSink for LocalStorage {
    async fn append(&self, category: &str, records: &[Record]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let path = self.stream_path(category);
        self.ensure_dir(&path).await?;

        let mut buf = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&buf).await?;
        file.flush().await?;

        log::debug!("Appended {} records to {}", records.len(), path.display());
        Ok(())
    }

    async fn read_records(&self, category: &str) -> Result<RecordScan> {
        let path = self.stream_path(category);
        let Some(bytes) = self.read_bytes(&path).await? else {
            return Ok(RecordScan::default());
        };

        let mut scan = RecordScan::default();
        for line in bytes.split(|b| *b == b'\n') {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<Record>(line) {
                Ok(record) => scan.records.push(record),
                Err(e) => {
                    scan.skipped_lines += 1;
                    log::debug!("Skipping unparsable line in {}: {}", path.display(), e);
                }
            }
        }
        Ok(scan)
    }

    async fn stream_size(&self, category: &str) -> Result<Option<u64>> {
        match tokio::fs::metadata(self.stream_path(category)).await {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn remove_stream(&self, category: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.stream_path(category)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl VisitedStore for LocalStorage {
    async fn load_visited(&self) -> Result<VisitedSet> {
        Ok(self
            .read_json::<VisitedSet>(&self.paths.visited_file)
            .await?
            .unwrap_or_default())
    }

    async fn merge_visited(&self, ids: &[String]) -> Result<VisitedSet> {
        let mut visited = self.load_visited().await?;
        visited.extend(ids.iter().cloned());
        self.write_json(&self.paths.visited_file, &visited).await?;
        Ok(visited)
    }

    async fn remove_visited(&self, ids: &BTreeSet<String>) -> Result<usize> {
        let mut visited = self.load_visited().await?;
        let before = visited.len();
        visited.retain(|id| !ids.contains(id));
        let removed = before - visited.len();
        if removed > 0 {
            self.write_json(&self.paths.visited_file, &visited).await?;
        }
        Ok(removed)
    }
}

#[async_trait]
impl ProgressStore for LocalStorage {
    async fn load_progress(&self) -> Result<Progress> {
        Ok(self
            .read_json::<Progress>(&self.paths.progress_file)
            .await?
            .unwrap_or_default())
    }

    async fn save_progress(&self, progress: &Progress) -> Result<()> {
        self.write_json(&self.paths.progress_file, progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordMetadata;
    use tempfile::TempDir;

    fn record(id: &str, text: &str) -> Record {
        Record {
            id: id.to_string(),
            text: text.to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            source: "reddit".to_string(),
            metadata: RecordMetadata {
                category: "recruiting".to_string(),
                thread_id: Some("t1".to_string()),
                thread_title: "Title".to_string(),
                url: "https://www.reddit.com/r/recruiting/comments/t1/title/".to_string(),
            },
        }
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.write_bytes("test.txt", b"hello").await.unwrap();
        let data = storage.read_bytes(&tmp.path().join("test.txt")).await.unwrap();
        assert_eq!(data, Some(b"hello".to_vec()));
        assert!(!tmp.path().join("test.tmp").exists());
    }

    #[tokio::test]
    async fn test_append_accumulates_across_calls() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.append("recruiting", &[record("a", "one")]).await.unwrap();
        storage
            .append("recruiting", &[record("b", "two"), record("c", "three")])
            .await
            .unwrap();

        let scan = storage.read_records("recruiting").await.unwrap();
        let got: Vec<&str> = scan.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(got, vec!["a", "b", "c"]);
        assert_eq!(scan.skipped_lines, 0);

        let content = std::fs::read_to_string(storage.stream_path("recruiting")).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_torn_last_line_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage.append("recruiting", &[record("a", "one")]).await.unwrap();

        let path = storage.stream_path("recruiting");
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str(r#"{"id":"b","text":"cut of"#);
        std::fs::write(&path, content).unwrap();

        let scan = storage.read_records("recruiting").await.unwrap();
        assert_eq!(scan.records.len(), 1);
        assert_eq!(scan.skipped_lines, 1);
    }

    #[tokio::test]
    async fn test_missing_stream() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        assert!(storage.read_records("none").await.unwrap().records.is_empty());
        assert_eq!(storage.stream_size("none").await.unwrap(), None);
        assert!(!storage.remove_stream("none").await.unwrap());
    }

    #[tokio::test]
    async fn test_merge_is_a_union() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let mut previous = storage.load_visited().await.unwrap();
        assert!(previous.is_empty());

        for batch in [ids(&["a", "b"]), ids(&["b"]), ids(&[]), ids(&["c", "a"])] {
            let merged = storage.merge_visited(&batch).await.unwrap();
            assert!(merged.is_superset(&previous));
            assert!(batch.iter().all(|id| merged.contains(id)));
            previous = merged;
        }

        let on_disk = storage.load_visited().await.unwrap();
        assert_eq!(on_disk, previous);
        assert_eq!(on_disk.len(), 3);
    }

    #[tokio::test]
    async fn test_merge_keeps_ids_written_by_another_run() {
        let tmp = TempDir::new().unwrap();
        let first = LocalStorage::new(tmp.path());
        let second = LocalStorage::new(tmp.path());

        first.merge_visited(&ids(&["x"])).await.unwrap();
        let merged = second.merge_visited(&ids(&["y"])).await.unwrap();

        assert!(merged.contains("x"));
        assert!(merged.contains("y"));
    }

    #[tokio::test]
    async fn test_corrupt_visited_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        std::fs::write(tmp.path().join("seen_posts.json"), "[\"a\", ").unwrap();

        assert!(storage.load_visited().await.is_err());
        assert!(storage.merge_visited(&ids(&["b"])).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_visited() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage.merge_visited(&ids(&["a", "b", "c"])).await.unwrap();

        let drop: BTreeSet<String> = ids(&["b", "zz"]).into_iter().collect();
        assert_eq!(storage.remove_visited(&drop).await.unwrap(), 1);

        let left = storage.load_visited().await.unwrap();
        assert_eq!(left.into_iter().collect::<Vec<_>>(), ids(&["a", "c"]));
    }

    #[tokio::test]
    async fn test_progress_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        assert_eq!(storage.load_progress().await.unwrap(), Progress::default());

        let mut progress = Progress::default();
        progress.add(12, 340, 1_000);
        progress.mark_completed("recruiting", "AI hiring");
        storage.save_progress(&progress).await.unwrap();

        assert_eq!(storage.load_progress().await.unwrap(), progress);
    }
}
