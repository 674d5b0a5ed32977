//! Pointer drag handling as an explicit state machine.
//!
//! Exactly one of node drag, canvas pan or dependency drawing is active at a
//! time. [`DragMachine::handle`] consumes pointer events and yields at most
//! one [`Intent`] per event; intents are turned into patches by the caller.

use serde::Serialize;

use crate::grid::{CellPos, GridLayout, LaneGeometry, Point};

/// What the pointer went down on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PressTarget {
    Node { node_id: String },
    /// The connector handle on a node's right edge.
    Handle { node_id: String },
    Background,
}

/// What the pointer was released over.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DropTarget {
    Cell { cell: CellPos },
    Node { node_id: String },
    Outside,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerEvent {
    Down { target: PressTarget, at: Point },
    Move { at: Point },
    Up { target: DropTarget },
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    DraggingNode {
        node_id: String,
        origin: Point,
        /// Pointer travel since the press, for drawing the dragged card.
        offset: Point,
    },
    Panning {
        last: Point,
    },
    DrawingDependency {
        source: String,
        cursor: Point,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    MoveNode { node_id: String, cell: CellPos },
    /// `to` starts depending on `from`.
    CreateDependency { from: String, to: String },
    Pan { dx: f32, dy: f32 },
}

#[derive(Debug, Clone, Default)]
pub struct DragMachine {
    state: DragState,
}

impl DragMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == DragState::Idle
    }

    pub fn handle(&mut self, event: PointerEvent) -> Option<Intent> {
        let state = std::mem::take(&mut self.state);
        let (next, intent) = transition(state, event);
        self.state = next;
        intent
    }

    /// Resolves what lies under a screen point for the drag in progress.
    ///
    /// A dragged node is dropped into cells (the card under the pointer is
    /// the node itself); a dependency is dropped onto nodes.
    pub fn drop_target(&self, layout: &GridLayout, geometry: &LaneGeometry<'_>, at: Point) -> DropTarget {
        match &self.state {
            DragState::DraggingNode { .. } => cell_under(layout, geometry, at),
            DragState::DrawingDependency { .. } => node_under(layout, at),
            DragState::Idle | DragState::Panning { .. } => match node_under(layout, at) {
                DropTarget::Outside => cell_under(layout, geometry, at),
                target => target,
            },
        }
    }
}

fn node_under(layout: &GridLayout, at: Point) -> DropTarget {
    layout
        .nodes
        .iter()
        .rev()
        .find(|node| {
            at.x >= node.x && at.x < node.x + node.width && at.y >= node.y && at.y < node.y + node.height
        })
        .map_or(DropTarget::Outside, |node| DropTarget::Node {
            node_id: node.id.clone(),
        })
}

fn cell_under(layout: &GridLayout, geometry: &LaneGeometry<'_>, at: Point) -> DropTarget {
    geometry
        .cell_at(at.x, at.y, layout.columns.len())
        .map_or(DropTarget::Outside, |cell| DropTarget::Cell { cell })
}

fn transition(state: DragState, event: PointerEvent) -> (DragState, Option<Intent>) {
    match (state, event) {
        (_, PointerEvent::Cancel) => (DragState::Idle, None),

        (DragState::Idle, PointerEvent::Down { target, at }) => {
            let next = match target {
                PressTarget::Node { node_id } => DragState::DraggingNode {
                    node_id,
                    origin: at,
                    offset: Point::new(0.0, 0.0),
                },
                PressTarget::Handle { node_id } => DragState::DrawingDependency {
                    source: node_id,
                    cursor: at,
                },
                PressTarget::Background => DragState::Panning { last: at },
            };
            (next, None)
        }

        (DragState::DraggingNode { node_id, origin, .. }, PointerEvent::Move { at }) => {
            let offset = Point::new(at.x - origin.x, at.y - origin.y);
            (DragState::DraggingNode { node_id, origin, offset }, None)
        }
        (DragState::DraggingNode { node_id, .. }, PointerEvent::Up { target }) => match target {
            DropTarget::Cell { cell } => (DragState::Idle, Some(Intent::MoveNode { node_id, cell })),
            _ => (DragState::Idle, None),
        },

        (DragState::DrawingDependency { source, .. }, PointerEvent::Move { at }) => {
            (DragState::DrawingDependency { source, cursor: at }, None)
        }
        (DragState::DrawingDependency { source, .. }, PointerEvent::Up { target }) => match target {
            DropTarget::Node { node_id } if node_id != source => (
                DragState::Idle,
                Some(Intent::CreateDependency {
                    from: source,
                    to: node_id,
                }),
            ),
            _ => (DragState::Idle, None),
        },

        (DragState::Panning { last }, PointerEvent::Move { at }) => {
            let intent = Intent::Pan {
                dx: at.x - last.x,
                dy: at.y - last.y,
            };
            (DragState::Panning { last: at }, Some(intent))
        }
        (DragState::Panning { .. }, PointerEvent::Up { .. }) => (DragState::Idle, None),

        (state, event) => {
            tracing::trace!(?state, ?event, "ignoring pointer event");
            (state, None)
        }
    }
}
