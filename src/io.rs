use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs::{create_dir_all, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};

/// Where collections live between runs.
///
/// A collection is always read and written as one blob holding the full
/// sequence; there are no partial writes.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// `Ok(None)` when the collection was never saved.
    async fn load(&self, collection: &str) -> anyhow::Result<Option<Vec<u8>>>;

    async fn save(&self, collection: &str, bytes: Vec<u8>) -> anyhow::Result<()>;
}

/// One `<collection>.json` file per collection under `root`.
#[derive(Debug, Clone)]
pub struct DiskGateway {
    root: PathBuf,
}

impl DiskGateway {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn path_of(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{}.json", collection))
    }

    pub async fn prepare(&self) -> anyhow::Result<()> {
        create_dir_all(&self.root)
            .await
            .with_context(|| format!("creating data directory {}", self.root.display()))
    }
}

#[async_trait]
impl Gateway for DiskGateway {
    async fn load(&self, collection: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let path = self.path_of(collection);
        log::info!("{} path: {} (exists: {})", collection, path.display(), path.exists());
        if !path.exists() {
            return Ok(None);
        }
        let mut bytes = Vec::new();
        BufReader::new(File::open(&path).await?)
            .read_to_end(&mut bytes)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(Some(bytes))
    }

    async fn save(&self, collection: &str, bytes: Vec<u8>) -> anyhow::Result<()> {
        let path = self.path_of(collection);
        if let Some(parent) = path.parent() {
            create_dir_all(parent).await?;
        }
        let file = File::create(&path)
            .await
            .with_context(|| format!("creating {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Keeps collections in memory only. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with(collection: &str, bytes: impl Into<Vec<u8>>) -> Self {
        let gateway = Self::new();
        gateway.put(collection, bytes.into());
        gateway
    }

    fn put(&self, collection: &str, bytes: Vec<u8>) {
        let mut blobs = self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        blobs.insert(collection.to_string(), bytes);
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn load(&self, collection: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let blobs = self.blobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(blobs.get(collection).cloned())
    }

    async fn save(&self, collection: &str, bytes: Vec<u8>) -> anyhow::Result<()> {
        self.put(collection, bytes);
        Ok(())
    }
}

pub fn encode<T: Serialize>(records: &[T]) -> anyhow::Result<Vec<u8>> {
    serde_json::to_vec_pretty(records).context("serializing collection")
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> anyhow::Result<Vec<T>> {
    serde_json::from_slice(bytes).context("parsing collection")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = DiskGateway::new(dir.path());
        assert!(gateway.load("teachers").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn disk_save_then_load_returns_same_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = DiskGateway::new(dir.path().join("nested"));
        gateway.save("courses", b"[1,2,3]".to_vec()).await.unwrap();

        assert!(dir.path().join("nested/courses.json").exists());
        let bytes = gateway.load("courses").await.unwrap().unwrap();
        assert_eq!(bytes, b"[1,2,3]");
    }

    #[tokio::test]
    async fn save_rewrites_the_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = DiskGateway::new(dir.path());
        gateway.save("tests", b"[1,2,3,4,5]".to_vec()).await.unwrap();
        gateway.save("tests", b"[]".to_vec()).await.unwrap();
        assert_eq!(gateway.load("tests").await.unwrap().unwrap(), b"[]");
    }

    #[tokio::test]
    async fn memory_gateway_keeps_collections_apart() {
        let gateway = MemoryGateway::with("students", "[]");
        gateway.save("teachers", b"[{}]".to_vec()).await.unwrap();
        assert_eq!(gateway.load("students").await.unwrap().unwrap(), b"[]");
        assert_eq!(gateway.load("teachers").await.unwrap().unwrap(), b"[{}]");
        assert!(gateway.load("courses").await.unwrap().is_none());
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode::<u64>(b"{not json").is_err());
        assert_eq!(decode::<u64>(b"[4, 5]").unwrap(), vec![4, 5]);
    }
}
