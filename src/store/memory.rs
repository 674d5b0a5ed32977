use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{BlobStore, Fields, RecordKind, RecordStore, Row, row_id};
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOp {
    Insert,
    Update,
    Delete,
}

/// One successful write, as recorded by [`MemoryStore::writes`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteRecord {
    pub op: WriteOp,
    pub kind: RecordKind,
    pub id: String,
}

#[derive(Debug, Default)]
struct FailurePlan {
    /// Writes still allowed before every further write fails.
    writes_before_failure: Option<usize>,
    failing_kinds: HashSet<RecordKind>,
}

/// In-process [`RecordStore`] keeping rows per kind in insertion order.
///
/// Failures can be injected to exercise rollback: [`MemoryStore::fail_after`]
/// lets a number of writes through and then fails every write,
/// [`MemoryStore::fail_kind`] fails writes of one kind, and
/// [`MemoryStore::set_unavailable`] fails reads and writes alike.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<RecordKind, Vec<Row>>>,
    plan: Mutex<FailurePlan>,
    unavailable: AtomicBool,
    writes: Mutex<Vec<WriteRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds rows before the store is shared.
    pub fn with_rows(mut self, kind: RecordKind, rows: impl IntoIterator<Item = Row>) -> Self {
        self.tables.get_mut().entry(kind).or_default().extend(rows);
        self
    }

    pub fn with_record<T: Serialize>(self, kind: RecordKind, record: &T) -> Result<Self, StoreError> {
        let row = super::encode_row(kind, record)?;
        Ok(self.with_rows(kind, [row]))
    }

    pub fn fail_after(&self, writes: usize) {
        self.plan().writes_before_failure = Some(writes);
    }

    pub fn fail_kind(&self, kind: RecordKind) {
        self.plan().failing_kinds.insert(kind);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Clears every injected failure.
    pub fn heal(&self) {
        *self.plan() = FailurePlan::default();
        self.set_unavailable(false);
    }

    /// Successful writes so far, oldest first.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn clear_writes(&self) {
        self.writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub async fn rows(&self, kind: RecordKind) -> Vec<Row> {
        self.tables.read().await.get(&kind).cloned().unwrap_or_default()
    }

    fn plan(&self) -> std::sync::MutexGuard<'_, FailurePlan> {
        self.plan.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked unavailable".to_string()));
        }
        Ok(())
    }

    fn check_write(&self, kind: RecordKind) -> Result<(), StoreError> {
        self.check_available()?;
        let mut plan = self.plan();
        if plan.failing_kinds.contains(&kind) {
            return Err(StoreError::Unavailable(format!("writes to {} are failing", kind.table())));
        }
        match plan.writes_before_failure.as_mut() {
            Some(0) => Err(StoreError::Unavailable("injected write failure".to_string())),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn record_write(&self, op: WriteOp, kind: RecordKind, id: &str) {
        self.writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(WriteRecord {
                op,
                kind,
                id: id.to_string(),
            });
    }
}

fn field_eq(row: &Row, field: &str, value: &str) -> bool {
    row.get(field).and_then(Value::as_str) == Some(value)
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read_all(&self, kind: RecordKind, roadmap_id: &str) -> Result<Vec<Row>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(&kind) else {
            return Ok(Vec::new());
        };
        let matching = if kind == RecordKind::Roadmap {
            rows.iter().filter(|row| field_eq(row, "id", roadmap_id)).cloned().collect()
        } else if kind.is_node_scoped() {
            let node_ids: HashSet<&str> = tables
                .get(&RecordKind::Node)
                .into_iter()
                .flatten()
                .filter(|node| field_eq(node, "roadmap_id", roadmap_id))
                .filter_map(row_id)
                .collect();
            rows.iter()
                .filter(|row| {
                    row.get("node_id")
                        .and_then(Value::as_str)
                        .is_some_and(|node_id| node_ids.contains(node_id))
                })
                .cloned()
                .collect()
        } else {
            rows.iter()
                .filter(|row| field_eq(row, "roadmap_id", roadmap_id))
                .cloned()
                .collect()
        };
        Ok(matching)
    }

    async fn fetch(&self, kind: RecordKind, id: &str) -> Result<Option<Row>, StoreError> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .get(&kind)
            .and_then(|rows| rows.iter().find(|row| row_id(row) == Some(id)))
            .cloned())
    }

    async fn insert(&self, kind: RecordKind, row: Row) -> Result<Row, StoreError> {
        self.check_write(kind)?;
        let id = row_id(&row)
            .ok_or_else(|| StoreError::Unavailable(format!("{kind} row has no id")))?
            .to_string();
        let mut tables = self.tables.write().await;
        let rows = tables.entry(kind).or_default();
        if rows.iter().any(|existing| row_id(existing) == Some(id.as_str())) {
            return Err(StoreError::Conflict { kind, id });
        }
        rows.push(row.clone());
        drop(tables);
        self.record_write(WriteOp::Insert, kind, &id);
        Ok(row)
    }

    async fn update(&self, kind: RecordKind, id: &str, fields: Fields) -> Result<(), StoreError> {
        self.check_write(kind)?;
        let mut tables = self.tables.write().await;
        let row = tables
            .get_mut(&kind)
            .and_then(|rows| rows.iter_mut().find(|row| row_id(row) == Some(id)))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| StoreError::NotFound {
                kind,
                id: id.to_string(),
            })?;
        for (key, value) in fields {
            row.insert(key, value);
        }
        drop(tables);
        self.record_write(WriteOp::Update, kind, id);
        Ok(())
    }

    async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), StoreError> {
        self.check_write(kind)?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(kind).or_default();
        let Some(pos) = rows.iter().position(|row| row_id(row) == Some(id)) else {
            return Err(StoreError::NotFound {
                kind,
                id: id.to_string(),
            });
        };
        rows.remove(pos);
        drop(tables);
        self.record_write(WriteOp::Delete, kind, id);
        Ok(())
    }
}

/// In-process [`BlobStore`] serving objects under a fixed base URL.
#[derive(Debug)]
pub struct MemoryBlobStore {
    base_url: String,
    objects: RwLock<HashMap<String, (Vec<u8>, String)>>,
    failing: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            objects: RwLock::new(HashMap::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Bytes and content type stored under `key`.
    pub async fn object(&self, key: &str) -> Option<(Vec<u8>, String)> {
        self.objects.read().await.get(key).cloned()
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new("memory://attachments")
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Blob(format!("upload of {key} rejected")));
        }
        self.objects
            .write()
            .await
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(self.public_url(key))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key.replace(' ', "%20"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node_row(id: &str, roadmap: &str) -> Row {
        json!({
            "id": id,
            "roadmap_id": roadmap,
            "title": id,
            "position_x": 254.0,
            "position_y": 76.0,
        })
    }

    #[tokio::test]
    async fn node_scoped_rows_follow_their_node() {
        let store = MemoryStore::new()
            .with_rows(RecordKind::Node, [node_row("a", "r1"), node_row("b", "r2")])
            .with_rows(
                RecordKind::Dependency,
                [
                    json!({ "id": "d1", "node_id": "a", "depends_on_node_id": "b" }),
                    json!({ "id": "d2", "node_id": "b", "depends_on_node_id": "a" }),
                ],
            );
        let deps = store.read_all(RecordKind::Dependency, "r1").await.unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(row_id(&deps[0]), Some("d1"));
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let store = MemoryStore::new().with_rows(RecordKind::Node, [node_row("a", "r1")]);
        let fields = super::super::fields([("position_x", json!(614.0))]);
        store.update(RecordKind::Node, "a", fields).await.unwrap();
        let row = store.fetch(RecordKind::Node, "a").await.unwrap().unwrap();
        assert_eq!(row["position_x"], json!(614.0));
        assert_eq!(row["position_y"], json!(76.0));
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_insert_conflicts() {
        let store = MemoryStore::new();
        store.insert(RecordKind::Node, node_row("a", "r1")).await.unwrap();
        let err = store.insert(RecordKind::Node, node_row("a", "r1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn injected_failures_trip_after_budget() {
        let store = MemoryStore::new();
        store.fail_after(1);
        store.insert(RecordKind::Node, node_row("a", "r1")).await.unwrap();
        let err = store.insert(RecordKind::Node, node_row("b", "r1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        store.heal();
        store.insert(RecordKind::Node, node_row("b", "r1")).await.unwrap();
        assert_eq!(store.rows(RecordKind::Node).await.len(), 2);
    }

    #[tokio::test]
    async fn unavailable_store_fails_reads() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(store.read_all(RecordKind::Lane, "r1").await.is_err());
    }

    #[tokio::test]
    async fn blob_put_returns_public_url() {
        let blobs = MemoryBlobStore::new("https://files.example/");
        let url = blobs.put("1700000000000-launch brief.pdf", vec![1, 2, 3], "application/pdf").await.unwrap();
        assert_eq!(url, "https://files.example/1700000000000-launch%20brief.pdf");
        let (bytes, content_type) = blobs.object("1700000000000-launch brief.pdf").await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(content_type, "application/pdf");
    }
}
