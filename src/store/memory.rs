use crate::error::{ClientError, ClientResult};
use crate::store::traits::DocumentStore;
use crate::store::types::{segments, ETag, Versioned};
use anyhow::Context;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// In-process document tree, used offline and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    root: RwLock<Value>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_root(Value::Object(Map::new()))
    }

    pub fn with_root(root: Value) -> Self {
        Self {
            root: RwLock::new(root),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Load the whole tree from a JSON export.
    pub async fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        let root: Value = serde_json::from_str(&raw).context("Seed file is not valid JSON")?;
        info!("Loaded in-memory store from {}", path.display());
        Ok(Self::with_root(root))
    }

    /// Make every subsequent write fail, as an unreachable backend would.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> Value {
        self.root.read().await.clone()
    }

    fn check_writable(&self) -> ClientResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ClientError::store("store unreachable"));
        }
        Ok(())
    }
}

fn is_empty_node(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn lookup<'a>(mut node: &'a Value, path: &str) -> Option<&'a Value> {
    for segment in segments(path) {
        node = match node {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    (!is_empty_node(node)).then_some(node)
}

/// Arrays are addressed by index, so writing below one turns it into an object.
fn into_object(node: Value) -> Map<String, Value> {
    match node {
        Value::Object(map) => map,
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Map::new(),
    }
}

fn write(node: &mut Value, parts: &[&str], value: Value) {
    let Some((head, rest)) = parts.split_first() else {
        *node = value;
        return;
    };
    let mut map = into_object(node.take());
    if rest.is_empty() {
        if is_empty_node(&value) {
            map.remove(*head);
        } else {
            map.insert(head.to_string(), value);
        }
    } else {
        let child = map.entry(head.to_string()).or_insert(Value::Null);
        write(child, rest, value);
        if is_empty_node(child) {
            map.remove(*head);
        }
    }
    *node = Value::Object(map);
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &str) -> ClientResult<Option<Value>> {
        let root = self.root.read().await;
        Ok(lookup(&root, path).cloned())
    }

    async fn set(&self, path: &str, value: Value) -> ClientResult<()> {
        self.check_writable()?;
        let parts: Vec<&str> = segments(path).collect();
        let mut root = self.root.write().await;
        write(&mut root, &parts, value);
        debug!("memory store: wrote {}", path);
        Ok(())
    }

    async fn get_versioned(&self, path: &str) -> ClientResult<Versioned> {
        let root = self.root.read().await;
        let value = lookup(&root, path).cloned();
        let etag = ETag::of(value.as_ref());
        Ok(Versioned { value, etag })
    }

    async fn set_if(&self, path: &str, value: Value, etag: &ETag) -> ClientResult<bool> {
        self.check_writable()?;
        let parts: Vec<&str> = segments(path).collect();
        // Compare and write under one lock so no other writer can slip in between.
        let mut root = self.root.write().await;
        if ETag::of(lookup(&root, path)) != *etag {
            debug!("memory store: version mismatch on {}", path);
            return Ok(false);
        }
        write(&mut root, &parts, value);
        Ok(true)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
