pub mod coords;
pub mod geometry;
pub mod routing;
pub(crate) mod types;

pub use coords::{CellPos, Point, decode, encode, snap};
pub use geometry::{LaneGeometry, Rect, ViewOptions};
pub use routing::{assign_channels, channel_index, compute_path, renderable_edges, route_dependencies};
pub use types::*;

use crate::config::Config;
use crate::model::RoadmapState;

/// Screen layout of a whole roadmap for one view.
///
/// Nodes whose stored row is past the last lane are drawn in the last lane;
/// with no lanes at all, nodes and edges are omitted.
pub fn compute_grid_layout(state: &RoadmapState, view: ViewOptions, config: &Config) -> GridLayout {
    let grid = &config.grid;
    let geometry = LaneGeometry::new(grid, &state.lanes, view);
    let pinned = state.roadmap.pinned_column_id.as_deref();

    let lanes = state
        .lanes
        .iter()
        .enumerate()
        .map(|(row, lane)| LaneLayout {
            id: lane.id.clone(),
            name: lane.name.clone(),
            description: lane.description.clone(),
            color: lane.color.clone(),
            row,
            y: geometry.lane_y_offset(row),
            height: geometry.lane_height(row),
            expanded: lane.expanded && !view.compact,
        })
        .collect();

    let columns = state
        .columns
        .iter()
        .enumerate()
        .map(|(col, column)| ColumnLayout {
            id: column.id.clone(),
            label: column.label().map(str::to_string),
            col,
            x: geometry.column_x(col),
            width: grid.cell_width,
            pinned: pinned == Some(column.id.as_str()),
        })
        .collect();

    let mut nodes = Vec::with_capacity(state.nodes.len());
    for node in &state.nodes {
        let mut cell = decode(grid, node.position_x, node.position_y);
        let Some(row) = geometry.clamp_row(cell.row) else {
            continue;
        };
        if row != cell.row {
            tracing::debug!(node = %node.id, stored_row = cell.row, row, "clamping node into last lane");
        }
        cell.row = row;
        let lane = &state.lanes[row];
        let rect = geometry.node_rect(cell);
        nodes.push(NodeLayout {
            id: node.id.clone(),
            title: node.title.clone(),
            description: node.description.clone(),
            status: node.status,
            cell,
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            lane_color: lane.color.clone(),
            lane_expanded: lane.expanded && !view.compact,
            attachments: state.attachment_count(&node.id),
        });
    }

    let edges = route_dependencies(&state.nodes, &state.dependencies, &geometry, &config.routing);

    GridLayout {
        width: geometry.total_width(state.columns.len()),
        height: geometry.total_height(),
        compact: view.compact,
        lanes,
        columns,
        nodes,
        edges,
    }
}

/// Horizontal scroll offset that brings the pinned column to the left edge
/// of the scrollable area, if a pinned column exists.
pub fn pinned_scroll_x(state: &RoadmapState, config: &Config) -> Option<f32> {
    let pinned = state.roadmap.pinned_column_id.as_deref()?;
    let col = state.column_index(pinned)?;
    Some(col as f32 * config.grid.cell_width)
}
