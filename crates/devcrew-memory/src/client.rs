use async_trait::async_trait;
use devcrew_core::{DevcrewError, DevcrewResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Default time-to-live for short-term entries.
pub const DEFAULT_SHORT_TERM_TTL: Duration = Duration::from_secs(3600);

/// Contract of the memory collaborator.
///
/// Three partitions: short-lived scratch memory with a TTL, durable long-term
/// memory, and the shared world state agents and the orchestrator use to
/// signal each other.
#[async_trait]
pub trait MemoryClient: Send + Sync {
    /// Store a value in short-term memory. A `lock`ed entry rejects overwrites
    /// until it expires.
    async fn store_short_term(
        &self,
        key: &str,
        value: Value,
        ttl: Duration,
        lock: bool,
    ) -> DevcrewResult<()>;

    /// Get a live (non-expired) short-term value.
    async fn get_short_term(&self, key: &str) -> DevcrewResult<Option<Value>>;

    /// Store a value in long-term memory.
    async fn store_long_term(&self, key: &str, value: Value) -> DevcrewResult<()>;

    /// Get a long-term value.
    async fn get_long_term(&self, key: &str) -> DevcrewResult<Option<Value>>;

    /// Replace a world-state value, bumping its version.
    async fn update_world_state(&self, key: &str, value: Value) -> DevcrewResult<()>;

    /// Get the current world-state value.
    async fn get_world_state(&self, key: &str) -> DevcrewResult<Option<Value>>;

    /// Number of writes seen by a world-state key (0 if never written).
    async fn world_state_version(&self, key: &str) -> DevcrewResult<u64>;

    /// Case-insensitive substring search over short-term values.
    async fn search_short_term(&self, query: &str, limit: usize) -> DevcrewResult<Vec<Value>>;

    /// Case-insensitive substring search over long-term values.
    async fn search_long_term(&self, query: &str, limit: usize) -> DevcrewResult<Vec<Value>>;
}

struct ShortTermEntry {
    value: Value,
    expires_at: Instant,
    locked: bool,
}

impl ShortTermEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

struct WorldStateEntry {
    value: Value,
    version: u64,
}

/// In-process memory backend. Nothing survives the process.
pub struct InMemoryClient {
    short_term: RwLock<BTreeMap<String, ShortTermEntry>>,
    long_term: RwLock<BTreeMap<String, Value>>,
    world_state: RwLock<BTreeMap<String, WorldStateEntry>>,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self {
            short_term: RwLock::new(BTreeMap::new()),
            long_term: RwLock::new(BTreeMap::new()),
            world_state: RwLock::new(BTreeMap::new()),
        }
    }

    /// Drop expired short-term entries. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.short_term.write().await;
        purge(&mut entries, now)
    }
}

fn purge(entries: &mut BTreeMap<String, ShortTermEntry>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, e| e.is_live(now));
    before - entries.len()
}

impl Default for InMemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryClient for InMemoryClient {
    async fn store_short_term(
        &self,
        key: &str,
        value: Value,
        ttl: Duration,
        lock: bool,
    ) -> DevcrewResult<()> {
        let now = Instant::now();
        let mut entries = self.short_term.write().await;
        if let Some(existing) = entries.get(key) {
            if existing.locked && existing.is_live(now) {
                return Err(DevcrewError::Memory(format!(
                    "short-term key '{key}' is locked"
                )));
            }
        }
        // Expired entries are only filtered on read; drop them on every write.
        let purged = purge(&mut entries, now);
        if purged > 0 {
            debug!(purged, "Purged expired short-term entries");
        }
        entries.insert(
            key.to_string(),
            ShortTermEntry {
                value,
                expires_at: now + ttl,
                locked: lock,
            },
        );
        debug!(key, "Stored in short-term memory");
        Ok(())
    }

    async fn get_short_term(&self, key: &str) -> DevcrewResult<Option<Value>> {
        let now = Instant::now();
        let entries = self.short_term.read().await;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn store_long_term(&self, key: &str, value: Value) -> DevcrewResult<()> {
        let mut entries = self.long_term.write().await;
        entries.insert(key.to_string(), value);
        debug!(key, "Stored in long-term memory");
        Ok(())
    }

    async fn get_long_term(&self, key: &str) -> DevcrewResult<Option<Value>> {
        let entries = self.long_term.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn update_world_state(&self, key: &str, value: Value) -> DevcrewResult<()> {
        let mut entries = self.world_state.write().await;
        let version = entries.get(key).map_or(0, |e| e.version) + 1;
        entries.insert(key.to_string(), WorldStateEntry { value, version });
        debug!(key, version, "Updated world state");
        Ok(())
    }

    async fn get_world_state(&self, key: &str) -> DevcrewResult<Option<Value>> {
        let entries = self.world_state.read().await;
        Ok(entries.get(key).map(|e| e.value.clone()))
    }

    async fn world_state_version(&self, key: &str) -> DevcrewResult<u64> {
        let entries = self.world_state.read().await;
        Ok(entries.get(key).map_or(0, |e| e.version))
    }

    async fn search_short_term(&self, query: &str, limit: usize) -> DevcrewResult<Vec<Value>> {
        let now = Instant::now();
        let entries = self.short_term.read().await;
        Ok(search(
            entries
                .iter()
                .filter(|(_, e)| e.is_live(now))
                .map(|(k, e)| (k.as_str(), &e.value)),
            query,
            limit,
        ))
    }

    async fn search_long_term(&self, query: &str, limit: usize) -> DevcrewResult<Vec<Value>> {
        let entries = self.long_term.read().await;
        Ok(search(
            entries.iter().map(|(k, v)| (k.as_str(), v)),
            query,
            limit,
        ))
    }
}

/// Substring search shared by the partitions.
///
/// Objects match when any field value contains the query (strings compared
/// directly, anything else by its JSON text) and are returned as-is. Bare
/// strings match on their content and come back as `{"key", "content"}`.
/// Other value kinds never match.
pub(crate) fn search<'a, I>(entries: I, query: &str, limit: usize) -> Vec<Value>
where
    I: IntoIterator<Item = (&'a str, &'a Value)>,
{
    let needle = query.to_lowercase();
    let mut results = Vec::new();
    if limit == 0 {
        return results;
    }

    for (key, value) in entries {
        match value {
            Value::Object(fields) => {
                let hit = fields.values().any(|field| match field {
                    Value::String(s) => s.to_lowercase().contains(&needle),
                    other => other.to_string().to_lowercase().contains(&needle),
                });
                if hit {
                    results.push(value.clone());
                }
            }
            Value::String(s) if s.to_lowercase().contains(&needle) => {
                results.push(serde_json::json!({ "key": key, "content": s }));
            }
            _ => {}
        }
        if results.len() >= limit {
            break;
        }
    }
    results
}
