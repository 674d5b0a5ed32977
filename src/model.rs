use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NodeStatus {
    #[default]
    Planned,
    InProgress,
    Completed,
    Blocked,
}

impl NodeStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Planned => "Planned",
            Self::InProgress => "In Progress",
            Self::Completed => "Complete",
            Self::Blocked => "Blocked",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "planned" => Some(Self::Planned),
            "in-progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roadmap {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pinned_column_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    pub id: String,
    pub roadmap_id: String,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub expanded: bool,
    pub order_index: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub roadmap_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub order_index: i64,
}

impl Column {
    /// Label shown in the header, `None` for blank columns.
    pub fn label(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// A planning item. `position_x`/`position_y` are always encoded in base
/// geometry; see [`crate::grid::coords`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub roadmap_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: NodeStatus,
    pub position_x: f32,
    pub position_y: f32,
}

/// `node_id` depends on `depends_on_node_id`; the arrow is drawn from the
/// depended-upon node to the dependent one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: String,
    pub node_id: String,
    pub depends_on_node_id: String,
}

impl Dependency {
    pub fn connects(&self, a: &str, b: &str) -> bool {
        (self.node_id == a && self.depends_on_node_id == b)
            || (self.node_id == b && self.depends_on_node_id == a)
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.node_id == node_id || self.depends_on_node_id == node_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub roadmap_id: String,
    /// `None` places the note in the free notepad column.
    #[serde(default)]
    pub lane_id: Option<String>,
    pub order_index: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub node_id: String,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    pub key: String,
    pub url: String,
}

/// Everything loaded for one roadmap. Lanes, columns and notes are kept sorted
/// by `order_index`; a lane's row is its index in `lanes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapState {
    pub roadmap: Roadmap,
    #[serde(default)]
    pub lanes: Vec<Lane>,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl RoadmapState {
    pub fn new(roadmap: Roadmap) -> Self {
        Self {
            roadmap,
            lanes: Vec::new(),
            columns: Vec::new(),
            nodes: Vec::new(),
            dependencies: Vec::new(),
            notes: Vec::new(),
            attachments: Vec::new(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn lane_index(&self, id: &str) -> Option<usize> {
        self.lanes.iter().position(|lane| lane.id == id)
    }

    pub fn column_index(&self, id: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.id == id)
    }

    pub fn attachment_count(&self, node_id: &str) -> usize {
        self.attachments
            .iter()
            .filter(|attachment| attachment.node_id == node_id)
            .count()
    }

    /// Restores the ordinal ordering invariants after records were edited.
    pub fn normalize_order(&mut self) {
        self.lanes.sort_by_key(|lane| lane.order_index);
        self.columns.sort_by_key(|column| column.order_index);
        self.notes.sort_by(|a, b| {
            a.lane_id
                .is_some()
                .cmp(&b.lane_id.is_some())
                .then_with(|| a.lane_id.cmp(&b.lane_id))
                .then_with(|| a.order_index.cmp(&b.order_index))
        });
    }
}
