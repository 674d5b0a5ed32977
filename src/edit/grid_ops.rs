use serde::{Deserialize, Serialize};

use super::dependency::remove_edges_touching;
use super::new_record_id;
use super::patch::{Edit, LaneContent, NodeContent, NotePlacement, Patch, Record};
use crate::config::GridConfig;
use crate::error::ValidationError;
use crate::grid::coords::{self, CellPos, Point};
use crate::model::{Column, Lane, Node, NodeStatus, RoadmapState};
use crate::theme::{Theme, parse_hex_color};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaneDirection {
    Up,
    Down,
}

/// Lane fields to change; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaneUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeUpdate {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<NodeStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewNode {
    pub title: String,
    pub description: Option<String>,
    pub status: NodeStatus,
}

impl Default for NewNode {
    fn default() -> Self {
        Self {
            title: "New Node".to_string(),
            description: None,
            status: NodeStatus::Planned,
        }
    }
}

fn stored_position(node: &Node) -> Point {
    Point::new(node.position_x, node.position_y)
}

fn cell_of(grid: &GridConfig, node: &Node) -> CellPos {
    coords::decode(grid, node.position_x, node.position_y)
}

/// Position edit for `node`, or nothing when it would not move.
fn move_edit(node: &Node, after: Point) -> Option<Edit> {
    let before = stored_position(node);
    (before != after).then(|| Edit::NodePosition {
        id: node.id.clone(),
        before,
        after,
    })
}

fn shifted(node: &Node, dx: f32, dy: f32) -> Option<Edit> {
    move_edit(node, Point::new(node.position_x + dx, node.position_y + dy))
}

fn lane_position(state: &RoadmapState, lane_id: &str) -> Result<usize, ValidationError> {
    state
        .lane_index(lane_id)
        .ok_or_else(|| ValidationError::UnknownLane(lane_id.to_string()))
}

fn node_position(state: &RoadmapState, node_id: &str) -> Result<usize, ValidationError> {
    state
        .nodes
        .iter()
        .position(|node| node.id == node_id)
        .ok_or_else(|| ValidationError::UnknownNode(node_id.to_string()))
}

// ── Lanes ───────────────────────────────────────────────────────────

/// Swaps a lane with its neighbour and moves the nodes of both lanes along.
///
/// Stored positions always use collapsed lanes, so nodes shift by whole base
/// `cell_height`s whatever the lanes' expansion; the swap is exactly undone by
/// the opposite move. Nodes stored below the last lane are drawn in it and
/// travel with it. Lane ordinals are rewritten to positions, which also heals
/// duplicate ordinals.
pub fn reorder_lane(
    state: &RoadmapState,
    grid: &GridConfig,
    lane_id: &str,
    direction: LaneDirection,
) -> Result<Patch, ValidationError> {
    let current = lane_position(state, lane_id)?;
    let target = match direction {
        LaneDirection::Up => current.checked_sub(1),
        LaneDirection::Down => Some(current + 1).filter(|next| *next < state.lanes.len()),
    }
    .ok_or_else(|| ValidationError::LaneAtBoundary(lane_id.to_string()))?;
    let last = state.lanes.len() - 1;

    let mut patch = Patch::new("reorder lane");
    for node in &state.nodes {
        let stored_row = cell_of(grid, node).row;
        let destination = match stored_row.min(last) {
            row if row == current => target,
            row if row == target => current,
            _ => continue,
        };
        let dy = (destination as f32 - stored_row as f32) * grid.cell_height;
        if let Some(edit) = shifted(node, 0.0, dy) {
            patch.push(edit);
        }
    }

    for (position, lane) in state.lanes.iter().enumerate() {
        let after = (match position {
            p if p == current => target,
            p if p == target => current,
            p => p,
        }) as i64;
        if lane.order_index != after {
            patch.push(Edit::LaneOrder {
                id: lane.id.clone(),
                before: lane.order_index,
                after,
            });
        }
    }
    Ok(patch)
}

/// Appends a lane named `Lane N` (unless a name is given) with the next
/// palette colour.
pub fn add_lane(state: &RoadmapState, theme: &Theme, name: Option<&str>) -> Patch {
    let count = state.lanes.len();
    let order_index = state
        .lanes
        .iter()
        .map(|lane| lane.order_index)
        .max()
        .map_or(0, |max| max + 1);
    let name = name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map_or_else(|| format!("Lane {}", count + 1), str::to_string);
    let lane = Lane {
        id: new_record_id(),
        roadmap_id: state.roadmap.id.clone(),
        name,
        color: theme.lane_color(count),
        description: None,
        expanded: false,
        order_index,
    };
    let mut patch = Patch::new("add lane");
    patch.push(Edit::Insert {
        index: count,
        record: Record::Lane(lane),
    });
    patch
}

pub fn update_lane(
    state: &RoadmapState,
    lane_id: &str,
    update: LaneUpdate,
) -> Result<Patch, ValidationError> {
    let lane = &state.lanes[lane_position(state, lane_id)?];
    let before = LaneContent::of(lane);
    let mut after = before.clone();
    if let Some(name) = update.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyField("lane name"));
        }
        after.name = name.to_string();
    }
    if let Some(color) = update.color {
        if parse_hex_color(&color).is_none() {
            return Err(ValidationError::InvalidColor(color));
        }
        after.color = color;
    }
    if let Some(description) = update.description {
        after.description = description.filter(|text| !text.trim().is_empty());
    }
    let mut patch = Patch::new("update lane");
    if after != before {
        patch.push(Edit::LaneContent {
            id: lane.id.clone(),
            before,
            after,
        });
    }
    Ok(patch)
}

/// Expansion is a stored lane flag but never moves stored node positions.
pub fn toggle_lane_expanded(state: &RoadmapState, lane_id: &str) -> Result<Patch, ValidationError> {
    let lane = &state.lanes[lane_position(state, lane_id)?];
    let before = LaneContent::of(lane);
    let after = LaneContent {
        expanded: !before.expanded,
        ..before.clone()
    };
    let mut patch = Patch::new("toggle lane");
    patch.push(Edit::LaneContent {
        id: lane.id.clone(),
        before,
        after,
    });
    Ok(patch)
}

/// Deletes a lane with its nodes, their edges and attachments.
///
/// Nodes in later lanes move up one base lane height so they keep their lane.
/// When the last lane goes, nodes stored below it (drawn in it) go as well.
/// The lane's notes move to the end of the notepad column.
pub fn delete_lane(
    state: &RoadmapState,
    grid: &GridConfig,
    lane_id: &str,
) -> Result<Patch, ValidationError> {
    let row = lane_position(state, lane_id)?;
    let is_last = row + 1 == state.lanes.len();
    let doomed = |node: &Node| {
        let node_row = cell_of(grid, node).row;
        node_row == row || (is_last && node_row > row)
    };
    let removed: Vec<&Node> = state.nodes.iter().filter(|&node| doomed(node)).collect();
    let removed_ids: Vec<&str> = removed.iter().map(|node| node.id.as_str()).collect();

    let mut patch = Patch::new("delete lane");
    remove_edges_touching(state, &removed_ids, &mut patch);
    remove_attachments_of(state, &removed_ids, &mut patch);

    let mut gone = 0;
    for (index, node) in state.nodes.iter().enumerate() {
        if doomed(node) {
            patch.push(Edit::Remove {
                index: index - gone,
                record: Record::Node(node.clone()),
            });
            gone += 1;
        } else if cell_of(grid, node).row > row {
            if let Some(edit) = shifted(node, 0.0, -grid.cell_height) {
                patch.push(edit);
            }
        }
    }

    let mut next_index = state
        .notes
        .iter()
        .filter(|note| note.lane_id.is_none())
        .map(|note| note.order_index + 1)
        .max()
        .unwrap_or(0);
    for note in state.notes.iter().filter(|note| note.lane_id.as_deref() == Some(lane_id)) {
        patch.push(Edit::NotePlacement {
            id: note.id.clone(),
            before: NotePlacement {
                lane_id: note.lane_id.clone(),
                order_index: note.order_index,
                updated_at: note.updated_at,
            },
            after: NotePlacement {
                lane_id: None,
                order_index: next_index,
                updated_at: Some(chrono::Utc::now()),
            },
        });
        next_index += 1;
    }

    patch.push(Edit::Remove {
        index: row,
        record: Record::Lane(state.lanes[row].clone()),
    });
    Ok(patch)
}

fn remove_attachments_of(state: &RoadmapState, node_ids: &[&str], patch: &mut Patch) {
    let mut removed = 0;
    for (index, attachment) in state.attachments.iter().enumerate() {
        if node_ids.contains(&attachment.node_id.as_str()) {
            patch.push(Edit::Remove {
                index: index - removed,
                record: Record::Attachment(attachment.clone()),
            });
            removed += 1;
        }
    }
}

// ── Columns ─────────────────────────────────────────────────────────

/// Inserts a column at position `index` (`index == len` appends). Nodes at or
/// right of it move one column right; ordinals are renumbered to positions.
pub fn insert_column(
    state: &RoadmapState,
    grid: &GridConfig,
    index: usize,
    name: Option<String>,
) -> Result<Patch, ValidationError> {
    let len = state.columns.len();
    if index > len {
        return Err(ValidationError::ColumnIndexOutOfRange { index, len });
    }
    let mut patch = Patch::new("insert column");
    for node in &state.nodes {
        if cell_of(grid, node).col >= index {
            if let Some(edit) = shifted(node, grid.cell_width, 0.0) {
                patch.push(edit);
            }
        }
    }
    for (position, column) in state.columns.iter().enumerate() {
        let after = (if position < index { position } else { position + 1 }) as i64;
        if column.order_index != after {
            patch.push(Edit::ColumnOrder {
                id: column.id.clone(),
                before: column.order_index,
                after,
            });
        }
    }
    let column = Column {
        id: new_record_id(),
        roadmap_id: state.roadmap.id.clone(),
        name: name.filter(|name| !name.trim().is_empty()),
        order_index: index as i64,
    };
    patch.push(Edit::Insert {
        index,
        record: Record::Column(column),
    });
    Ok(patch)
}

/// Deletes the column at position `index`.
///
/// Nodes right of it move one column left. Nodes in the deleted column keep
/// their stored x and so fall into the column that slides into its place;
/// when the last column is deleted they move left into the new last column.
/// A pin on the deleted column is cleared.
pub fn delete_column(
    state: &RoadmapState,
    grid: &GridConfig,
    index: usize,
) -> Result<Patch, ValidationError> {
    let len = state.columns.len();
    if index >= len {
        return Err(ValidationError::ColumnIndexOutOfRange { index, len });
    }
    let last_with_neighbour = index + 1 == len && index > 0;
    let mut patch = Patch::new("delete column");
    for node in &state.nodes {
        let col = cell_of(grid, node).col;
        if col > index || (col == index && last_with_neighbour) {
            if let Some(edit) = shifted(node, -grid.cell_width, 0.0) {
                patch.push(edit);
            }
        }
    }
    for (position, column) in state.columns.iter().enumerate() {
        if position == index {
            continue;
        }
        let after = (if position < index { position } else { position - 1 }) as i64;
        if column.order_index != after {
            patch.push(Edit::ColumnOrder {
                id: column.id.clone(),
                before: column.order_index,
                after,
            });
        }
    }
    let column = &state.columns[index];
    if state.roadmap.pinned_column_id.as_deref() == Some(column.id.as_str()) {
        patch.push(Edit::PinnedColumn {
            before: Some(column.id.clone()),
            after: None,
        });
    }
    patch.push(Edit::Remove {
        index,
        record: Record::Column(column.clone()),
    });
    Ok(patch)
}

pub fn rename_column(
    state: &RoadmapState,
    column_id: &str,
    name: Option<String>,
) -> Result<Patch, ValidationError> {
    let column = state
        .column_index(column_id)
        .map(|index| &state.columns[index])
        .ok_or_else(|| ValidationError::UnknownColumn(column_id.to_string()))?;
    let after = name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    let mut patch = Patch::new("rename column");
    if column.name != after {
        patch.push(Edit::ColumnName {
            id: column.id.clone(),
            before: column.name.clone(),
            after,
        });
    }
    Ok(patch)
}

/// Pins `column_id`, or clears the pin with `None`.
pub fn pin_column(state: &RoadmapState, column_id: Option<&str>) -> Result<Patch, ValidationError> {
    if let Some(id) = column_id {
        if state.column_index(id).is_none() {
            return Err(ValidationError::UnknownColumn(id.to_string()));
        }
    }
    let before = state.roadmap.pinned_column_id.clone();
    let after = column_id.map(str::to_string);
    let mut patch = Patch::new("pin column");
    if before != after {
        patch.push(Edit::PinnedColumn { before, after });
    }
    Ok(patch)
}

// ── Nodes ───────────────────────────────────────────────────────────

/// Creates a node in an empty cell of the grid.
pub fn add_node(
    state: &RoadmapState,
    grid: &GridConfig,
    cell: CellPos,
    new_node: NewNode,
) -> Result<Patch, ValidationError> {
    if cell.row >= state.lanes.len() || cell.col >= state.columns.len() {
        return Err(ValidationError::CellOutOfRange {
            row: cell.row,
            col: cell.col,
        });
    }
    if state.nodes.iter().any(|node| cell_of(grid, node) == cell) {
        return Err(ValidationError::CellOccupied {
            row: cell.row,
            col: cell.col,
        });
    }
    let title = new_node.title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyField("node title"));
    }
    let position = coords::encode(grid, cell);
    let node = Node {
        id: new_record_id(),
        roadmap_id: state.roadmap.id.clone(),
        title: title.to_string(),
        description: new_node.description,
        status: new_node.status,
        position_x: position.x,
        position_y: position.y,
    };
    let mut patch = Patch::new("add node");
    patch.push(Edit::Insert {
        index: state.nodes.len(),
        record: Record::Node(node),
    });
    Ok(patch)
}

pub fn move_node_to_cell(
    state: &RoadmapState,
    grid: &GridConfig,
    node_id: &str,
    cell: CellPos,
) -> Result<Patch, ValidationError> {
    let node = &state.nodes[node_position(state, node_id)?];
    let mut patch = Patch::new("move node");
    if let Some(edit) = move_edit(node, coords::encode(grid, cell)) {
        patch.push(edit);
    }
    Ok(patch)
}

/// Moves a node to wherever a free pixel position snaps.
pub fn move_node_to_point(
    state: &RoadmapState,
    grid: &GridConfig,
    node_id: &str,
    x: f32,
    y: f32,
) -> Result<Patch, ValidationError> {
    move_node_to_cell(state, grid, node_id, coords::decode(grid, x, y))
}

pub fn update_node(
    state: &RoadmapState,
    node_id: &str,
    update: NodeUpdate,
) -> Result<Patch, ValidationError> {
    let node = &state.nodes[node_position(state, node_id)?];
    let before = NodeContent::of(node);
    let mut after = before.clone();
    if let Some(title) = update.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyField("node title"));
        }
        after.title = title.to_string();
    }
    if let Some(description) = update.description {
        after.description = description.filter(|text| !text.trim().is_empty());
    }
    if let Some(status) = update.status {
        after.status = status;
    }
    let mut patch = Patch::new("update node");
    if after != before {
        patch.push(Edit::NodeContent {
            id: node.id.clone(),
            before,
            after,
        });
    }
    Ok(patch)
}

/// Deletes a node together with its edges and attachment records.
pub fn delete_node(state: &RoadmapState, node_id: &str) -> Result<Patch, ValidationError> {
    let index = node_position(state, node_id)?;
    let mut patch = Patch::new("delete node");
    remove_edges_touching(state, &[node_id], &mut patch);
    remove_attachments_of(state, &[node_id], &mut patch);
    patch.push(Edit::Remove {
        index,
        record: Record::Node(state.nodes[index].clone()),
    });
    Ok(patch)
}
