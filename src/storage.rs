//! Filesystem store for raw document bytes and processing records.
//!
//! Layout under the data directory:
//! - `raw/{hash[0..2]}/{hash[0..8]}.{ext}` for the submitted bytes
//! - `records/{document_id}.json` for the final record

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::pipeline::{DocumentInput, ProcessingRecord, RecordSink};
use crate::utils::mime::extension_for;

const RAW_SUBDIR: &str = "raw";
const RECORDS_SUBDIR: &str = "records";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Rejected(String),
}

/// SHA-256 of the content, hex encoded.
pub fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Construct the storage path for raw content.
///
/// Two-level layout keyed by hash prefix:
/// `{raw_dir}/{hash[0..2]}/{hash[0..8]}.{extension}`
pub fn content_storage_path(raw_dir: &Path, content_hash: &str, extension: &str) -> PathBuf {
    raw_dir
        .join(&content_hash[..2])
        .join(format!("{}.{}", &content_hash[..8], extension))
}

/// Keep document ids usable as file names.
fn sanitize_id(document_id: &str) -> String {
    document_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Writes raw bytes and JSON records beneath one data directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join(RAW_SUBDIR)
    }

    pub fn records_dir(&self) -> PathBuf {
        self.root.join(RECORDS_SUBDIR)
    }

    pub fn record_path(&self, document_id: &str) -> PathBuf {
        self.records_dir()
            .join(format!("{}.json", sanitize_id(document_id)))
    }

    pub async fn load_record(&self, document_id: &str) -> Result<ProcessingRecord, StorageError> {
        let path = self.record_path(document_id);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(document_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&contents)?)
    }
}

#[async_trait]
impl RecordSink for FsStore {
    async fn store_raw(&self, input: &DocumentInput) -> Result<String, StorageError> {
        let content_hash = compute_hash(&input.image.data);
        let path = content_storage_path(
            &self.raw_dir(),
            &content_hash,
            extension_for(&input.image.media_type),
        );

        if tokio::fs::try_exists(&path).await? {
            debug!("Raw content already stored at {}", path.display());
        } else {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, &input.image.data).await?;
            debug!("Stored {} bytes at {}", input.image.len(), path.display());
        }
        Ok(path.display().to_string())
    }

    async fn store_record(&self, record: &ProcessingRecord) -> Result<(), StorageError> {
        let path = self.record_path(&record.document_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(record)?;
        tokio::fs::write(&path, json).await?;
        debug!("Wrote {} record to {}", record.status.as_str(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::{ExtractionError, HandwritingDensity, TriageResult};
    use crate::model::DocumentImage;
    use crate::pipeline::RecordStatus;
    use tempfile::tempdir;

    fn input() -> DocumentInput {
        DocumentInput::with_id(
            "doc-1",
            "scan.png",
            DocumentImage::new(b"\x89PNG fake".to_vec(), "image/png"),
        )
    }

    #[test]
    fn test_content_storage_path() {
        let raw_dir = Path::new("/data/raw");
        let hash = "abcdef1234567890abcdef1234567890";
        let path = content_storage_path(raw_dir, hash, "pdf");
        assert_eq!(path, PathBuf::from("/data/raw/ab/abcdef12.pdf"));
    }

    #[test]
    fn test_compute_hash() {
        assert_eq!(
            compute_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_record_path_sanitizes_id() {
        let store = FsStore::new("/data");
        assert_eq!(
            store.record_path("../etc/passwd"),
            PathBuf::from("/data/records/___etc_passwd.json")
        );
    }

    #[tokio::test]
    async fn test_store_raw_writes_hashed_path() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let input = input();

        let location = store.store_raw(&input).await.unwrap();
        let hash = compute_hash(&input.image.data);
        let expected = content_storage_path(&store.raw_dir(), &hash, "png");
        assert_eq!(location, expected.display().to_string());
        assert_eq!(std::fs::read(&expected).unwrap(), input.image.data);

        // Second write of identical content is a no-op.
        assert_eq!(store.store_raw(&input).await.unwrap(), location);
    }

    #[tokio::test]
    async fn test_record_round_trip() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let input = input();
        let triage = TriageResult {
            lane_id: "17".into(),
            path_id: "ammo".into(),
            confidence: 0.7,
            handwriting_density: HandwritingDensity::None,
        };
        let error = ExtractionError::malformed("not json", "oops");
        let record = ProcessingRecord::failed(&input, Some(&triage), &error);

        store.store_record(&record).await.unwrap();
        let loaded = store.load_record("doc-1").await.unwrap();
        assert_eq!(loaded.status, RecordStatus::Error);
        assert_eq!(loaded.triage, Some(triage));
        assert_eq!(loaded.file_name, "scan.png");
        assert!(loaded.error.unwrap().contains("not json"));
    }

    #[tokio::test]
    async fn test_load_missing_record() {
        let dir = tempdir().unwrap();
        let store = FsStore::new(dir.path());
        assert!(matches!(
            store.load_record("nope").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
