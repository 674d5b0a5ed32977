use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::grid::Point;
use crate::model::{Attachment, Column, Dependency, Lane, Node, NodeStatus, Note, RoadmapState};
use crate::store::RecordKind;

/// A whole record, as inserted or removed by an [`Edit`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum Record {
    Lane(Lane),
    Column(Column),
    Node(Node),
    Dependency(Dependency),
    Note(Note),
    Attachment(Attachment),
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Lane(_) => RecordKind::Lane,
            Self::Column(_) => RecordKind::Column,
            Self::Node(_) => RecordKind::Node,
            Self::Dependency(_) => RecordKind::Dependency,
            Self::Note(_) => RecordKind::Note,
            Self::Attachment(_) => RecordKind::Attachment,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Lane(lane) => &lane.id,
            Self::Column(column) => &column.id,
            Self::Node(node) => &node.id,
            Self::Dependency(dep) => &dep.id,
            Self::Note(note) => &note.id,
            Self::Attachment(attachment) => &attachment.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeContent {
    pub title: String,
    pub description: Option<String>,
    pub status: NodeStatus,
}

impl NodeContent {
    pub fn of(node: &Node) -> Self {
        Self {
            title: node.title.clone(),
            description: node.description.clone(),
            status: node.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaneContent {
    pub name: String,
    pub color: String,
    pub description: Option<String>,
    pub expanded: bool,
}

impl LaneContent {
    pub fn of(lane: &Lane) -> Self {
        Self {
            name: lane.name.clone(),
            color: lane.color.clone(),
            description: lane.description.clone(),
            expanded: lane.expanded,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteContent {
    pub title: String,
    pub description: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotePlacement {
    pub lane_id: Option<String>,
    pub order_index: i64,
    pub updated_at: Option<DateTime<Utc>>,
}

/// One invertible change to a [`RoadmapState`]. Field edits carry both
/// values; inserts and removals carry the record and its index in the
/// owning list at the time the edit applies.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Edit {
    NodePosition {
        id: String,
        before: Point,
        after: Point,
    },
    NodeContent {
        id: String,
        before: NodeContent,
        after: NodeContent,
    },
    LaneOrder {
        id: String,
        before: i64,
        after: i64,
    },
    LaneContent {
        id: String,
        before: LaneContent,
        after: LaneContent,
    },
    ColumnOrder {
        id: String,
        before: i64,
        after: i64,
    },
    ColumnName {
        id: String,
        before: Option<String>,
        after: Option<String>,
    },
    PinnedColumn {
        before: Option<String>,
        after: Option<String>,
    },
    NotePlacement {
        id: String,
        before: NotePlacement,
        after: NotePlacement,
    },
    NoteContent {
        id: String,
        before: NoteContent,
        after: NoteContent,
    },
    Insert {
        index: usize,
        record: Record,
    },
    Remove {
        index: usize,
        record: Record,
    },
}

impl Edit {
    pub fn inverse(&self) -> Edit {
        match self.clone() {
            Self::NodePosition { id, before, after } => Self::NodePosition {
                id,
                before: after,
                after: before,
            },
            Self::NodeContent { id, before, after } => Self::NodeContent {
                id,
                before: after,
                after: before,
            },
            Self::LaneOrder { id, before, after } => Self::LaneOrder {
                id,
                before: after,
                after: before,
            },
            Self::LaneContent { id, before, after } => Self::LaneContent {
                id,
                before: after,
                after: before,
            },
            Self::ColumnOrder { id, before, after } => Self::ColumnOrder {
                id,
                before: after,
                after: before,
            },
            Self::ColumnName { id, before, after } => Self::ColumnName {
                id,
                before: after,
                after: before,
            },
            Self::PinnedColumn { before, after } => Self::PinnedColumn {
                before: after,
                after: before,
            },
            Self::NotePlacement { id, before, after } => Self::NotePlacement {
                id,
                before: after,
                after: before,
            },
            Self::NoteContent { id, before, after } => Self::NoteContent {
                id,
                before: after,
                after: before,
            },
            Self::Insert { index, record } => Self::Remove { index, record },
            Self::Remove { index, record } => Self::Insert { index, record },
        }
    }

    fn apply(&self, state: &mut RoadmapState) {
        match self {
            Self::NodePosition { id, after, .. } => {
                if let Some(node) = find_mut(&mut state.nodes, id, |n| &n.id) {
                    node.position_x = after.x;
                    node.position_y = after.y;
                }
            }
            Self::NodeContent { id, after, .. } => {
                if let Some(node) = find_mut(&mut state.nodes, id, |n| &n.id) {
                    node.title = after.title.clone();
                    node.description = after.description.clone();
                    node.status = after.status;
                }
            }
            Self::LaneOrder { id, after, .. } => {
                if let Some(lane) = find_mut(&mut state.lanes, id, |l| &l.id) {
                    lane.order_index = *after;
                }
            }
            Self::LaneContent { id, after, .. } => {
                if let Some(lane) = find_mut(&mut state.lanes, id, |l| &l.id) {
                    lane.name = after.name.clone();
                    lane.color = after.color.clone();
                    lane.description = after.description.clone();
                    lane.expanded = after.expanded;
                }
            }
            Self::ColumnOrder { id, after, .. } => {
                if let Some(column) = find_mut(&mut state.columns, id, |c| &c.id) {
                    column.order_index = *after;
                }
            }
            Self::ColumnName { id, after, .. } => {
                if let Some(column) = find_mut(&mut state.columns, id, |c| &c.id) {
                    column.name = after.clone();
                }
            }
            Self::PinnedColumn { after, .. } => {
                state.roadmap.pinned_column_id = after.clone();
            }
            Self::NotePlacement { id, after, .. } => {
                if let Some(note) = find_mut(&mut state.notes, id, |n| &n.id) {
                    note.lane_id = after.lane_id.clone();
                    note.order_index = after.order_index;
                    note.updated_at = after.updated_at;
                }
            }
            Self::NoteContent { id, after, .. } => {
                if let Some(note) = find_mut(&mut state.notes, id, |n| &n.id) {
                    note.title = after.title.clone();
                    note.description = after.description.clone();
                    note.updated_at = after.updated_at;
                }
            }
            Self::Insert { index, record } => match record {
                Record::Lane(lane) => insert_at(&mut state.lanes, *index, lane.clone()),
                Record::Column(column) => insert_at(&mut state.columns, *index, column.clone()),
                Record::Node(node) => insert_at(&mut state.nodes, *index, node.clone()),
                Record::Dependency(dep) => insert_at(&mut state.dependencies, *index, dep.clone()),
                Record::Note(note) => insert_at(&mut state.notes, *index, note.clone()),
                Record::Attachment(attachment) => {
                    insert_at(&mut state.attachments, *index, attachment.clone())
                }
            },
            Self::Remove { index, record } => match record {
                Record::Lane(lane) => remove_at(&mut state.lanes, *index, &lane.id, |l| &l.id),
                Record::Column(column) => {
                    remove_at(&mut state.columns, *index, &column.id, |c| &c.id)
                }
                Record::Node(node) => remove_at(&mut state.nodes, *index, &node.id, |n| &n.id),
                Record::Dependency(dep) => {
                    remove_at(&mut state.dependencies, *index, &dep.id, |d| &d.id)
                }
                Record::Note(note) => remove_at(&mut state.notes, *index, &note.id, |n| &n.id),
                Record::Attachment(attachment) => {
                    remove_at(&mut state.attachments, *index, &attachment.id, |a| &a.id)
                }
            },
        }
    }
}

fn find_mut<'a, T>(items: &'a mut [T], id: &str, key: impl Fn(&T) -> &String) -> Option<&'a mut T> {
    let found = items.iter_mut().find(|item| key(item) == id);
    if found.is_none() {
        tracing::debug!(id, "edit target not present in local state");
    }
    found
}

fn insert_at<T>(items: &mut Vec<T>, index: usize, item: T) {
    let index = index.min(items.len());
    items.insert(index, item);
}

fn remove_at<T>(items: &mut Vec<T>, index: usize, id: &str, key: impl Fn(&T) -> &String) {
    if items.get(index).is_some_and(|item| key(item) == id) {
        items.remove(index);
    } else if let Some(pos) = items.iter().position(|item| key(item) == id) {
        items.remove(pos);
    } else {
        tracing::debug!(id, index, "removed record not present in local state");
    }
}

/// An ordered, invertible set of edits produced by one user action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Patch {
    pub label: &'static str,
    edits: Vec<Edit>,
}

impl Patch {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            edits: Vec::new(),
        }
    }

    pub fn push(&mut self, edit: Edit) {
        self.edits.push(edit);
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Edits undoing this patch, in reverse order.
    pub fn inverse(&self) -> Patch {
        Patch {
            label: self.label,
            edits: self.edits.iter().rev().map(Edit::inverse).collect(),
        }
    }

    pub fn apply(&self, state: &mut RoadmapState) {
        for edit in &self.edits {
            edit.apply(state);
        }
        state.normalize_order();
    }

    /// Records inserted by this patch, e.g. to learn a generated id.
    pub fn inserted(&self) -> impl Iterator<Item = &Record> {
        self.edits.iter().filter_map(|edit| match edit {
            Edit::Insert { record, .. } => Some(record),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Roadmap;

    fn state_with_nodes() -> RoadmapState {
        let mut state = RoadmapState::new(Roadmap {
            id: "r1".to_string(),
            title: "Roadmap".to_string(),
            description: None,
            pinned_column_id: None,
        });
        for id in ["a", "b", "c"] {
            state.nodes.push(Node {
                id: id.to_string(),
                roadmap_id: "r1".to_string(),
                title: id.to_string(),
                description: None,
                status: NodeStatus::Planned,
                position_x: 254.0,
                position_y: 76.0,
            });
        }
        state
    }

    #[test]
    fn inverse_restores_removed_record_at_its_index() {
        let mut state = state_with_nodes();
        let original = state.clone();
        let removed = state.nodes[1].clone();
        let mut patch = Patch::new("delete node");
        patch.push(Edit::Remove {
            index: 1,
            record: Record::Node(removed),
        });
        patch.push(Edit::NodePosition {
            id: "c".to_string(),
            before: Point::new(254.0, 76.0),
            after: Point::new(614.0, 76.0),
        });
        patch.apply(&mut state);
        assert_eq!(state.nodes.len(), 2);
        assert_eq!(state.nodes[1].position_x, 614.0);
        patch.inverse().apply(&mut state);
        assert_eq!(state, original);
    }

    #[test]
    fn double_inverse_is_identity() {
        let mut patch = Patch::new("pin");
        patch.push(Edit::PinnedColumn {
            before: None,
            after: Some("c1".to_string()),
        });
        assert_eq!(patch.inverse().inverse(), patch);
    }

    #[test]
    fn removing_a_missing_record_is_ignored() {
        let mut state = state_with_nodes();
        let mut ghost = state.nodes[0].clone();
        ghost.id = "ghost".to_string();
        let mut patch = Patch::new("delete node");
        patch.push(Edit::Remove {
            index: 0,
            record: Record::Node(ghost),
        });
        patch.apply(&mut state);
        assert_eq!(state.nodes.len(), 3);
    }
}
