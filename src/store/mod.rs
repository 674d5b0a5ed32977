//! Persistence seam.
//!
//! The engine never talks to a database directly: a [`RecordStore`] handle is
//! constructed by the caller and passed into the session. Rows cross the seam
//! as loosely typed JSON and are decoded into the record structs of
//! [`crate::model`] right here, so a row missing a required field fails with
//! [`StoreError::Decode`] instead of surfacing later as a bad position.

pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreError;

pub use memory::{MemoryBlobStore, MemoryStore};

pub type Row = Value;
pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Roadmap,
    Lane,
    Column,
    Node,
    Dependency,
    Note,
    Attachment,
}

impl RecordKind {
    pub const ALL: [RecordKind; 7] = [
        RecordKind::Roadmap,
        RecordKind::Lane,
        RecordKind::Column,
        RecordKind::Node,
        RecordKind::Dependency,
        RecordKind::Note,
        RecordKind::Attachment,
    ];

    pub fn table(self) -> &'static str {
        match self {
            Self::Roadmap => "roadmaps",
            Self::Lane => "lanes",
            Self::Column => "columns",
            Self::Node => "nodes",
            Self::Dependency => "dependencies",
            Self::Note => "notes",
            Self::Attachment => "attachments",
        }
    }

    /// Kinds whose rows point at a node instead of carrying `roadmap_id`.
    pub fn is_node_scoped(self) -> bool {
        matches!(self, Self::Dependency | Self::Attachment)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Roadmap => "roadmap",
            Self::Lane => "lane",
            Self::Column => "column",
            Self::Node => "node",
            Self::Dependency => "dependency",
            Self::Note => "note",
            Self::Attachment => "attachment",
        };
        f.write_str(name)
    }
}

/// Create / read / update / delete keyed by record id.
///
/// `read_all` returns the rows belonging to one roadmap. Dependency and
/// attachment rows have no `roadmap_id` of their own; they belong to the
/// roadmap of the node they reference. Implementations must return rows in
/// insertion order: dependency order decides arrow channels.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn read_all(&self, kind: RecordKind, roadmap_id: &str) -> Result<Vec<Row>, StoreError>;

    async fn fetch(&self, kind: RecordKind, id: &str) -> Result<Option<Row>, StoreError>;

    /// Stores a new row and returns it as persisted.
    async fn insert(&self, kind: RecordKind, row: Row) -> Result<Row, StoreError>;

    /// Overwrites the given fields of an existing row.
    async fn update(&self, kind: RecordKind, id: &str, fields: Fields) -> Result<(), StoreError>;

    async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), StoreError>;
}

/// External object storage for attachment bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads `bytes` under `key` and returns the public URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StoreError>;

    fn public_url(&self, key: &str) -> String;
}

pub fn decode_row<T: DeserializeOwned>(kind: RecordKind, row: Row) -> Result<T, StoreError> {
    serde_json::from_value(row).map_err(|source| StoreError::Decode { kind, source })
}

pub fn decode_rows<T: DeserializeOwned>(kind: RecordKind, rows: Vec<Row>) -> Result<Vec<T>, StoreError> {
    rows.into_iter().map(|row| decode_row(kind, row)).collect()
}

pub fn encode_row<T: Serialize>(kind: RecordKind, record: &T) -> Result<Row, StoreError> {
    serde_json::to_value(record).map_err(|source| StoreError::Encode { kind, source })
}

/// Field map for an update, from `(name, value)` pairs.
pub fn fields<I, K>(pairs: I) -> Fields
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(key, value)| (key.into(), value)).collect()
}

/// Id of a row, if it has a string `id`.
pub fn row_id(row: &Row) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}
