//! Optimistic editing session over one roadmap.
//!
//! Every mutation is computed as a [`Patch`], applied to the local state at
//! once, then persisted edit by edit. The first store failure applies the
//! inverse patch, so the local state is back to its pre-mutation snapshot
//! when [`SessionError::Persistence`] is returned. Writes that already reached
//! the store before the failure are reverted with compensating writes, and
//! replayed inserts and deletes are accepted as already applied, so a failed
//! mutation can be retried. [`RoadmapSession::reload`] resynchronises when
//! compensation itself fails.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;

use crate::config::Config;
use crate::edit::patch::{Edit, Patch, Record};
use crate::edit::{self, LaneDirection, LaneUpdate, NewNode, NodeUpdate};
use crate::error::{SessionError, StoreError, ValidationError};
use crate::grid::{self, CellPos, GridLayout, ViewOptions};
use crate::interaction::Intent;
use crate::model::{Attachment, Column, Lane, RoadmapState};
use crate::notepad;
use crate::store::{self, BlobStore, RecordKind, RecordStore, Row};

/// Lanes created for a roadmap that has none: name and colour.
pub const DEFAULT_LANES: [(&str, &str); 3] = [
    ("Core Features", "#3b82f6"),
    ("Infrastructure", "#10b981"),
    ("User Experience", "#f59e0b"),
];

/// Column labels created for a roadmap that has no columns.
pub const DEFAULT_COLUMNS: [&str; 8] = ["Q1 2025", "", "", "Q2 2025", "", "", "Q3 2025", ""];

pub struct RoadmapSession {
    store: Arc<dyn RecordStore>,
    blobs: Option<Arc<dyn BlobStore>>,
    config: Arc<Config>,
    state: RoadmapState,
}

impl std::fmt::Debug for RoadmapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoadmapSession")
            .field("roadmap", &self.state.roadmap.id)
            .field("has_blob_store", &self.blobs.is_some())
            .finish_non_exhaustive()
    }
}

impl RoadmapSession {
    /// Loads a roadmap and seeds default lanes and columns if it has none.
    pub async fn open(
        store: Arc<dyn RecordStore>,
        roadmap_id: &str,
        config: Arc<Config>,
    ) -> Result<Self, SessionError> {
        let state = load_state(store.as_ref(), roadmap_id)
            .await
            .map_err(|source| SessionError::Load {
                roadmap_id: roadmap_id.to_string(),
                source,
            })?;
        tracing::debug!(
            roadmap = roadmap_id,
            lanes = state.lanes.len(),
            columns = state.columns.len(),
            nodes = state.nodes.len(),
            "loaded roadmap"
        );
        let mut session = Self {
            store,
            blobs: None,
            config,
            state,
        };
        let seed = session.default_records();
        if !seed.is_empty() {
            tracing::info!(roadmap = roadmap_id, edits = seed.len(), "seeding default lanes and columns");
            session.commit(seed).await?;
        }
        Ok(session)
    }

    pub fn with_blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn state(&self) -> &RoadmapState {
        &self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self, view: ViewOptions) -> GridLayout {
        grid::compute_grid_layout(&self.state, view, &self.config)
    }

    pub fn pinned_scroll_x(&self) -> Option<f32> {
        grid::pinned_scroll_x(&self.state, &self.config)
    }

    /// Replaces the local state with what the store holds now.
    pub async fn reload(&mut self) -> Result<(), SessionError> {
        let roadmap_id = self.state.roadmap.id.clone();
        self.state = load_state(self.store.as_ref(), &roadmap_id)
            .await
            .map_err(|source| SessionError::Load { roadmap_id, source })?;
        Ok(())
    }

    fn default_records(&self) -> Patch {
        let mut patch = Patch::new("seed defaults");
        let roadmap_id = &self.state.roadmap.id;
        if self.state.lanes.is_empty() {
            for (idx, (name, color)) in DEFAULT_LANES.iter().enumerate() {
                patch.push(Edit::Insert {
                    index: idx,
                    record: Record::Lane(Lane {
                        id: edit::new_record_id(),
                        roadmap_id: roadmap_id.clone(),
                        name: name.to_string(),
                        color: color.to_string(),
                        description: None,
                        expanded: false,
                        order_index: idx as i64,
                    }),
                });
            }
        }
        if self.state.columns.is_empty() {
            for (idx, label) in DEFAULT_COLUMNS.iter().enumerate() {
                patch.push(Edit::Insert {
                    index: idx,
                    record: Record::Column(Column {
                        id: edit::new_record_id(),
                        roadmap_id: roadmap_id.clone(),
                        name: (!label.is_empty()).then(|| label.to_string()),
                        order_index: idx as i64,
                    }),
                });
            }
        }
        patch
    }

    /// Applies `patch` locally, persists it, and rolls back on failure.
    /// Returns the committed patch so callers can undo it later.
    ///
    /// On a store failure the edits the store already accepted are reverted
    /// there too, newest first, before the local state is rolled back, so
    /// the same mutation can simply be issued again.
    pub async fn commit(&mut self, patch: Patch) -> Result<Patch, SessionError> {
        if patch.is_empty() {
            return Ok(patch);
        }
        patch.apply(&mut self.state);
        let roadmap_id = self.state.roadmap.id.clone();
        for (accepted, edit) in patch.edits().iter().enumerate() {
            if let Err(source) = persist(self.store.as_ref(), &roadmap_id, edit).await {
                tracing::warn!(
                    operation = patch.label,
                    error = %source,
                    retryable = source.is_retryable(),
                    accepted,
                    "persisting failed, rolling back"
                );
                revert(self.store.as_ref(), &roadmap_id, &patch.edits()[..accepted]).await;
                patch.inverse().apply(&mut self.state);
                return Err(SessionError::Persistence {
                    operation: patch.label,
                    source,
                });
            }
        }
        tracing::info!(operation = patch.label, edits = patch.len(), "committed");
        Ok(patch)
    }

    /// Commits the inverse of a previously committed patch.
    pub async fn undo(&mut self, committed: &Patch) -> Result<Patch, SessionError> {
        self.commit(committed.inverse()).await
    }

    // ── Nodes ───────────────────────────────────────────────────────

    pub async fn move_node(&mut self, node_id: &str, cell: CellPos) -> Result<Patch, SessionError> {
        let patch = edit::move_node_to_cell(&self.state, &self.config.grid, node_id, cell)?;
        self.commit(patch).await
    }

    /// Drops a node at a free position; it snaps to the nearest cell.
    pub async fn drop_node_at(&mut self, node_id: &str, x: f32, y: f32) -> Result<Patch, SessionError> {
        let patch = edit::move_node_to_point(&self.state, &self.config.grid, node_id, x, y)?;
        self.commit(patch).await
    }

    pub async fn add_node(&mut self, cell: CellPos, node: NewNode) -> Result<Patch, SessionError> {
        let patch = edit::add_node(&self.state, &self.config.grid, cell, node)?;
        self.commit(patch).await
    }

    pub async fn update_node(&mut self, node_id: &str, update: NodeUpdate) -> Result<Patch, SessionError> {
        let patch = edit::update_node(&self.state, node_id, update)?;
        self.commit(patch).await
    }

    pub async fn delete_node(&mut self, node_id: &str) -> Result<Patch, SessionError> {
        let patch = edit::delete_node(&self.state, node_id)?;
        self.commit(patch).await
    }

    // ── Lanes ───────────────────────────────────────────────────────

    pub async fn add_lane(&mut self, name: Option<&str>) -> Result<Patch, SessionError> {
        let patch = edit::add_lane(&self.state, &self.config.theme, name);
        self.commit(patch).await
    }

    pub async fn reorder_lane(
        &mut self,
        lane_id: &str,
        direction: LaneDirection,
    ) -> Result<Patch, SessionError> {
        let patch = edit::reorder_lane(&self.state, &self.config.grid, lane_id, direction)?;
        self.commit(patch).await
    }

    pub async fn update_lane(&mut self, lane_id: &str, update: LaneUpdate) -> Result<Patch, SessionError> {
        let patch = edit::update_lane(&self.state, lane_id, update)?;
        self.commit(patch).await
    }

    pub async fn toggle_lane_expanded(&mut self, lane_id: &str) -> Result<Patch, SessionError> {
        let patch = edit::toggle_lane_expanded(&self.state, lane_id)?;
        self.commit(patch).await
    }

    pub async fn delete_lane(&mut self, lane_id: &str) -> Result<Patch, SessionError> {
        let patch = edit::delete_lane(&self.state, &self.config.grid, lane_id)?;
        self.commit(patch).await
    }

    // ── Columns ─────────────────────────────────────────────────────

    pub async fn insert_column(&mut self, index: usize, name: Option<String>) -> Result<Patch, SessionError> {
        let patch = edit::insert_column(&self.state, &self.config.grid, index, name)?;
        self.commit(patch).await
    }

    pub async fn delete_column(&mut self, column_id: &str) -> Result<Patch, SessionError> {
        let index = self
            .state
            .column_index(column_id)
            .ok_or_else(|| ValidationError::UnknownColumn(column_id.to_string()))?;
        let patch = edit::delete_column(&self.state, &self.config.grid, index)?;
        self.commit(patch).await
    }

    pub async fn rename_column(&mut self, column_id: &str, name: Option<String>) -> Result<Patch, SessionError> {
        let patch = edit::rename_column(&self.state, column_id, name)?;
        self.commit(patch).await
    }

    pub async fn pin_column(&mut self, column_id: Option<&str>) -> Result<Patch, SessionError> {
        let patch = edit::pin_column(&self.state, column_id)?;
        self.commit(patch).await
    }

    // ── Dependencies ────────────────────────────────────────────────

    pub async fn add_dependency(&mut self, from: &str, to: &str) -> Result<Patch, SessionError> {
        let patch = edit::add_dependency(&self.state, from, to)?;
        self.commit(patch).await
    }

    pub async fn remove_dependency(&mut self, dependency_id: &str) -> Result<Patch, SessionError> {
        let patch = edit::remove_dependency(&self.state, dependency_id)?;
        self.commit(patch).await
    }

    // ── Notepad ─────────────────────────────────────────────────────

    pub async fn add_note(
        &mut self,
        lane_id: Option<&str>,
        title: &str,
        description: Option<String>,
    ) -> Result<Patch, SessionError> {
        let patch = notepad::add_note(&self.state, lane_id, title, description)?;
        self.commit(patch).await
    }

    pub async fn move_note(
        &mut self,
        note_id: &str,
        target_lane: Option<&str>,
        before_note: Option<&str>,
    ) -> Result<Patch, SessionError> {
        let patch = notepad::move_note(&self.state, note_id, target_lane, before_note)?;
        self.commit(patch).await
    }

    pub async fn update_note(
        &mut self,
        note_id: &str,
        title: Option<String>,
        description: Option<Option<String>>,
    ) -> Result<Patch, SessionError> {
        let patch = notepad::update_note(&self.state, note_id, title, description)?;
        self.commit(patch).await
    }

    pub async fn delete_note(&mut self, note_id: &str) -> Result<Patch, SessionError> {
        let patch = notepad::delete_note(&self.state, note_id)?;
        self.commit(patch).await
    }

    // ── Interaction ─────────────────────────────────────────────────

    /// Carries out a pointer intent. Panning is view-only and commits nothing.
    ///
    /// A dependency drawn onto its own source, onto a node that has vanished
    /// or between already connected nodes is dropped without error.
    pub async fn apply_intent(&mut self, intent: Intent) -> Result<Option<Patch>, SessionError> {
        match intent {
            Intent::MoveNode { node_id, cell } => self.move_node(&node_id, cell).await.map(Some),
            Intent::CreateDependency { from, to } => match self.add_dependency(&from, &to).await {
                Ok(patch) => Ok(Some(patch)),
                Err(SessionError::Validation(
                    err @ (ValidationError::SelfDependency(_)
                    | ValidationError::DuplicateDependency { .. }
                    | ValidationError::UnknownNode(_)),
                )) => {
                    tracing::debug!(%from, %to, reason = %err, "ignoring dependency drop");
                    Ok(None)
                }
                Err(err) => Err(err),
            },
            Intent::Pan { .. } => Ok(None),
        }
    }

    // ── Attachments ─────────────────────────────────────────────────

    /// Uploads a file for a node and records its metadata.
    ///
    /// The blob is stored under `{unix_millis}-{file_name}`. If recording the
    /// metadata fails the uploaded blob stays in the blob store.
    pub async fn attach_file(
        &mut self,
        node_id: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<Attachment, SessionError> {
        let blobs = self.blobs.clone().ok_or(SessionError::NoBlobStore)?;
        if self.state.node(node_id).is_none() {
            return Err(ValidationError::UnknownNode(node_id.to_string()).into());
        }
        if file_name.trim().is_empty() {
            return Err(ValidationError::EmptyField("file name").into());
        }
        let key = format!("{}-{}", Utc::now().timestamp_millis(), file_name);
        let size = bytes.len() as u64;
        let url = blobs
            .put(&key, bytes, content_type)
            .await
            .map_err(|source| SessionError::Persistence {
                operation: "upload attachment",
                source,
            })?;
        let attachment = Attachment {
            id: edit::new_record_id(),
            node_id: node_id.to_string(),
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            size,
            key,
            url,
        };
        let mut patch = Patch::new("attach file");
        patch.push(Edit::Insert {
            index: self.state.attachments.len(),
            record: Record::Attachment(attachment.clone()),
        });
        self.commit(patch).await?;
        Ok(attachment)
    }

    pub fn attachments_for(&self, node_id: &str) -> impl Iterator<Item = &Attachment> {
        self.state
            .attachments
            .iter()
            .filter(move |attachment| attachment.node_id == node_id)
    }
}

/// Reads and decodes every record of one roadmap.
pub async fn load_state(store: &dyn RecordStore, roadmap_id: &str) -> Result<RoadmapState, StoreError> {
    let roadmap = store
        .fetch(RecordKind::Roadmap, roadmap_id)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            kind: RecordKind::Roadmap,
            id: roadmap_id.to_string(),
        })?;
    let mut state = RoadmapState::new(store::decode_row(RecordKind::Roadmap, roadmap)?);
    state.lanes = read_kind(store, RecordKind::Lane, roadmap_id).await?;
    state.columns = read_kind(store, RecordKind::Column, roadmap_id).await?;
    state.nodes = read_kind(store, RecordKind::Node, roadmap_id).await?;
    state.dependencies = read_kind(store, RecordKind::Dependency, roadmap_id).await?;
    state.notes = read_kind(store, RecordKind::Note, roadmap_id).await?;
    state.attachments = read_kind(store, RecordKind::Attachment, roadmap_id).await?;
    state.normalize_order();
    Ok(state)
}

async fn read_kind<T: serde::de::DeserializeOwned>(
    store: &dyn RecordStore,
    kind: RecordKind,
    roadmap_id: &str,
) -> Result<Vec<T>, StoreError> {
    let rows = store.read_all(kind, roadmap_id).await?;
    store::decode_rows(kind, rows)
}

fn record_row(record: &Record) -> Result<Row, StoreError> {
    let kind = record.kind();
    match record {
        Record::Lane(lane) => store::encode_row(kind, lane),
        Record::Column(column) => store::encode_row(kind, column),
        Record::Node(node) => store::encode_row(kind, node),
        Record::Dependency(dep) => store::encode_row(kind, dep),
        Record::Note(note) => store::encode_row(kind, note),
        Record::Attachment(attachment) => store::encode_row(kind, attachment),
    }
}

async fn persist(store: &dyn RecordStore, roadmap_id: &str, edit: &Edit) -> Result<(), StoreError> {
    match edit {
        Edit::NodePosition { id, after, .. } => {
            let fields = store::fields([("position_x", json!(after.x)), ("position_y", json!(after.y))]);
            store.update(RecordKind::Node, id, fields).await
        }
        Edit::NodeContent { id, after, .. } => {
            let fields = store::fields([
                ("title", json!(after.title)),
                ("description", json!(after.description)),
                ("status", json!(after.status)),
            ]);
            store.update(RecordKind::Node, id, fields).await
        }
        Edit::LaneOrder { id, after, .. } => {
            let fields = store::fields([("order_index", json!(after))]);
            store.update(RecordKind::Lane, id, fields).await
        }
        Edit::LaneContent { id, after, .. } => {
            let fields = store::fields([
                ("name", json!(after.name)),
                ("color", json!(after.color)),
                ("description", json!(after.description)),
                ("expanded", json!(after.expanded)),
            ]);
            store.update(RecordKind::Lane, id, fields).await
        }
        Edit::ColumnOrder { id, after, .. } => {
            let fields = store::fields([("order_index", json!(after))]);
            store.update(RecordKind::Column, id, fields).await
        }
        Edit::ColumnName { id, after, .. } => {
            let fields = store::fields([("name", json!(after))]);
            store.update(RecordKind::Column, id, fields).await
        }
        Edit::PinnedColumn { after, .. } => {
            let fields = store::fields([("pinned_column_id", json!(after))]);
            store.update(RecordKind::Roadmap, roadmap_id, fields).await
        }
        Edit::NotePlacement { id, after, .. } => {
            let fields = store::fields([
                ("lane_id", json!(after.lane_id)),
                ("order_index", json!(after.order_index)),
                ("updated_at", json!(after.updated_at)),
            ]);
            store.update(RecordKind::Note, id, fields).await
        }
        Edit::NoteContent { id, after, .. } => {
            let fields = store::fields([
                ("title", json!(after.title)),
                ("description", json!(after.description)),
                ("updated_at", json!(after.updated_at)),
            ]);
            store.update(RecordKind::Note, id, fields).await
        }
        Edit::Insert { record, .. } => {
            let row = record_row(record)?;
            match store.insert(record.kind(), row.clone()).await {
                Ok(_) => Ok(()),
                Err(StoreError::Conflict { kind, id }) => {
                    // A replay of an insert that already landed.
                    let existing = store.fetch(kind, &id).await?;
                    if existing.as_ref().is_some_and(|existing| row_matches(existing, &row)) {
                        tracing::debug!(%kind, %id, "insert already applied");
                        Ok(())
                    } else {
                        Err(StoreError::Conflict { kind, id })
                    }
                }
                Err(err) => Err(err),
            }
        }
        Edit::Remove { record, .. } => match store.delete(record.kind(), record.id()).await {
            Err(StoreError::NotFound { kind, id }) => {
                tracing::debug!(%kind, %id, "delete already applied");
                Ok(())
            }
            other => other,
        },
    }
}

/// True when every field of `row` has the same value in `existing`.
fn row_matches(existing: &Row, row: &Row) -> bool {
    match (existing.as_object(), row.as_object()) {
        (Some(existing), Some(row)) => row.iter().all(|(key, value)| existing.get(key) == Some(value)),
        _ => existing == row,
    }
}

/// Undoes edits the store accepted before a failure, newest first.
///
/// Best effort: a compensating write that fails is logged and skipped, and
/// [`RoadmapSession::reload`] resynchronises.
async fn revert(store: &dyn RecordStore, roadmap_id: &str, accepted: &[Edit]) {
    for edit in accepted.iter().rev() {
        if let Err(err) = persist(store, roadmap_id, &edit.inverse()).await {
            tracing::warn!(error = %err, "could not revert an accepted write");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn roadmap_row() -> Row {
        json!({ "id": "r1", "title": "Platform" })
    }

    #[tokio::test]
    async fn empty_roadmap_is_seeded() {
        let store = Arc::new(MemoryStore::new().with_rows(RecordKind::Roadmap, [roadmap_row()]));
        let session = RoadmapSession::open(store.clone(), "r1", Arc::new(Config::default()))
            .await
            .unwrap();
        let names: Vec<&str> = session.state().lanes.iter().map(|lane| lane.name.as_str()).collect();
        assert_eq!(names, vec!["Core Features", "Infrastructure", "User Experience"]);
        assert_eq!(session.state().columns.len(), 8);
        assert_eq!(session.state().columns[3].label(), Some("Q2 2025"));
        assert_eq!(session.state().columns[1].name, None);
        assert_eq!(store.rows(RecordKind::Lane).await.len(), 3);
        assert_eq!(store.rows(RecordKind::Column).await.len(), 8);
    }

    #[tokio::test]
    async fn missing_roadmap_fails_to_load() {
        let store = Arc::new(MemoryStore::new());
        let err = RoadmapSession::open(store, "nope", Arc::new(Config::default()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Load {
                source: StoreError::NotFound { kind: RecordKind::Roadmap, .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn malformed_row_fails_to_load() {
        let store = Arc::new(
            MemoryStore::new()
                .with_rows(RecordKind::Roadmap, [roadmap_row()])
                .with_rows(RecordKind::Node, [json!({ "id": "n1", "roadmap_id": "r1", "title": "x" })]),
        );
        let err = RoadmapSession::open(store, "r1", Arc::new(Config::default()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::Load {
                source: StoreError::Decode { kind: RecordKind::Node, .. },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn persistence_failure_rolls_back() {
        let store = Arc::new(MemoryStore::new().with_rows(RecordKind::Roadmap, [roadmap_row()]));
        let mut session = RoadmapSession::open(store.clone(), "r1", Arc::new(Config::default()))
            .await
            .unwrap();
        let snapshot = session.state().clone();
        store.fail_kind(RecordKind::Lane);
        let err = session.add_lane(Some("Ops")).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(session.state(), &snapshot);
    }

    #[tokio::test]
    async fn pan_commits_nothing() {
        let store = Arc::new(MemoryStore::new().with_rows(RecordKind::Roadmap, [roadmap_row()]));
        let mut session = RoadmapSession::open(store.clone(), "r1", Arc::new(Config::default()))
            .await
            .unwrap();
        store.clear_writes();
        let result = session.apply_intent(Intent::Pan { dx: 4.0, dy: 2.0 }).await.unwrap();
        assert!(result.is_none());
        assert!(store.writes().is_empty());
    }
}
