use serde::Serialize;

use super::coords::CellPos;
use crate::model::NodeStatus;

#[derive(Debug, Clone, Serialize)]
pub struct LaneLayout {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub row: usize,
    pub y: f32,
    pub height: f32,
    pub expanded: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnLayout {
    pub id: String,
    pub label: Option<String>,
    pub col: usize,
    pub x: f32,
    pub width: f32,
    pub pinned: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeLayout {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: NodeStatus,
    /// Logical cell decoded from the stored position (row clamped to the lanes).
    pub cell: CellPos,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub lane_color: String,
    pub lane_expanded: bool,
    pub attachments: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EdgeLayout {
    pub id: String,
    /// Depended-upon node; the arrow starts here.
    pub from: String,
    /// Dependent node; the arrow ends here.
    pub to: String,
    pub channel: i32,
    pub points: Vec<(f32, f32)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridLayout {
    pub width: f32,
    pub height: f32,
    pub compact: bool,
    pub lanes: Vec<LaneLayout>,
    pub columns: Vec<ColumnLayout>,
    pub nodes: Vec<NodeLayout>,
    pub edges: Vec<EdgeLayout>,
}

impl GridLayout {
    pub fn node(&self, id: &str) -> Option<&NodeLayout> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&EdgeLayout> {
        self.edges.iter().find(|edge| edge.id == id)
    }

    pub fn nodes_in_cell(&self, cell: CellPos) -> impl Iterator<Item = &NodeLayout> {
        self.nodes.iter().filter(move |node| node.cell == cell)
    }
}
