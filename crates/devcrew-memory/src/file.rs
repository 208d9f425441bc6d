use crate::client::{InMemoryClient, MemoryClient};
use async_trait::async_trait;
use devcrew_core::{DevcrewError, DevcrewResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Serialize, Deserialize)]
struct LongTermRecord {
    key: String,
    value: Value,
}

/// Memory backend whose long-term partition is appended to a JSONL file.
///
/// Short-term memory and world state stay in process. On creation every record
/// in the file is replayed in order, so the last write per key wins.
pub struct FileMemoryClient {
    path: PathBuf,
    inner: InMemoryClient,
    append: Mutex<()>,
}

impl FileMemoryClient {
    /// Open (or create) the long-term log at `path`.
    pub async fn new(path: PathBuf) -> DevcrewResult<Self> {
        let inner = InMemoryClient::new();

        if path.exists() {
            let data = tokio::fs::read_to_string(&path).await.map_err(|e| {
                DevcrewError::Memory(format!("Failed to read long-term log: {e}"))
            })?;
            let mut loaded = 0usize;
            for line in data.lines() {
                if line.trim().is_empty() {
                    continue;
                }
                let record: LongTermRecord = serde_json::from_str(line).map_err(|e| {
                    DevcrewError::Memory(format!("Invalid long-term record: {e}"))
                })?;
                inner.store_long_term(&record.key, record.value).await?;
                loaded += 1;
            }
            info!(path = %path.display(), records = loaded, "Loaded long-term memory");
        } else if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DevcrewError::Memory(format!("Failed to create dir: {e}")))?;
        }

        Ok(Self {
            path,
            inner,
            append: Mutex::new(()),
        })
    }

    async fn append_to_file(&self, key: &str, value: &Value) -> DevcrewResult<()> {
        use tokio::io::AsyncWriteExt;
        let mut line = serde_json::to_string(&LongTermRecord {
            key: key.to_string(),
            value: value.clone(),
        })?;
        line.push('\n');

        let _guard = self.append.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| DevcrewError::Memory(format!("Failed to open long-term log: {e}")))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| DevcrewError::Memory(format!("Failed to write record: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl MemoryClient for FileMemoryClient {
    async fn store_short_term(
        &self,
        key: &str,
        value: Value,
        ttl: Duration,
        lock: bool,
    ) -> DevcrewResult<()> {
        self.inner.store_short_term(key, value, ttl, lock).await
    }

    async fn get_short_term(&self, key: &str) -> DevcrewResult<Option<Value>> {
        self.inner.get_short_term(key).await
    }

    async fn store_long_term(&self, key: &str, value: Value) -> DevcrewResult<()> {
        self.append_to_file(key, &value).await?;
        self.inner.store_long_term(key, value).await
    }

    async fn get_long_term(&self, key: &str) -> DevcrewResult<Option<Value>> {
        self.inner.get_long_term(key).await
    }

    async fn update_world_state(&self, key: &str, value: Value) -> DevcrewResult<()> {
        self.inner.update_world_state(key, value).await
    }

    async fn get_world_state(&self, key: &str) -> DevcrewResult<Option<Value>> {
        self.inner.get_world_state(key).await
    }

    async fn world_state_version(&self, key: &str) -> DevcrewResult<u64> {
        self.inner.world_state_version(key).await
    }

    async fn search_short_term(&self, query: &str, limit: usize) -> DevcrewResult<Vec<Value>> {
        self.inner.search_short_term(query, limit).await
    }

    async fn search_long_term(&self, query: &str, limit: usize) -> DevcrewResult<Vec<Value>> {
        self.inner.search_long_term(query, limit).await
    }
}
