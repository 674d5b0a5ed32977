//! Grid mutations.
//!
//! Every operation reads the current [`RoadmapState`](crate::model::RoadmapState)
//! and returns a [`Patch`] describing the change, or a
//! [`ValidationError`](crate::error::ValidationError) before anything changed.
//! Nothing here touches storage; the session applies and persists patches.

pub mod dependency;
pub mod grid_ops;
pub mod patch;

pub use dependency::{add_dependency, remove_dependency, validate_dependency};
pub use grid_ops::{
    LaneDirection, LaneUpdate, NewNode, NodeUpdate, add_lane, add_node, delete_column, delete_lane,
    delete_node, insert_column, move_node_to_cell, move_node_to_point, pin_column, rename_column,
    reorder_lane, toggle_lane_expanded, update_lane, update_node,
};
pub use patch::{Edit, LaneContent, NodeContent, NoteContent, NotePlacement, Patch, Record};

pub(crate) fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
