use thiserror::Error;

use crate::store::RecordKind;

/// A mutation was rejected before anything changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("node {0} cannot depend on itself")]
    SelfDependency(String),

    #[error("a dependency between {from} and {to} already exists")]
    DuplicateDependency { from: String, to: String },

    #[error("unknown node {0}")]
    UnknownNode(String),

    #[error("unknown lane {0}")]
    UnknownLane(String),

    #[error("unknown column {0}")]
    UnknownColumn(String),

    #[error("unknown note {0}")]
    UnknownNote(String),

    #[error("unknown dependency {0}")]
    UnknownDependency(String),

    #[error("lane {0} cannot move further in that direction")]
    LaneAtBoundary(String),

    #[error("column index {index} is out of range for {len} columns")]
    ColumnIndexOutOfRange { index: usize, len: usize },

    #[error("cell (row {row}, column {col}) is outside the grid")]
    CellOutOfRange { row: usize, col: usize },

    #[error("cell (row {row}, column {col}) already holds a node")]
    CellOccupied { row: usize, col: usize },

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("{0:?} is not a #rrggbb colour")]
    InvalidColor(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("{kind} record {id} not found")]
    NotFound { kind: RecordKind, id: String },

    #[error("{kind} record {id} conflicts with an existing record")]
    Conflict { kind: RecordKind, id: String },

    #[error("failed to decode {kind} record: {source}")]
    Decode {
        kind: RecordKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode {kind} record: {source}")]
    Encode {
        kind: RecordKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("blob store error: {0}")]
    Blob(String),
}

impl StoreError {
    /// Whether retrying the same call later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Conflict { .. } | Self::Blob(_))
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Local state has already been rolled back when this is returned.
    #[error("{operation} failed and was rolled back: {source}")]
    Persistence {
        operation: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("failed to load roadmap {roadmap_id}: {source}")]
    Load {
        roadmap_id: String,
        #[source]
        source: StoreError,
    },

    #[error("no blob store configured for attachments")]
    NoBlobStore,
}

impl SessionError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Persistence { source, .. } | Self::Load { source, .. } => source.is_retryable(),
            Self::Validation(_) | Self::NoBlobStore => false,
        }
    }
}
