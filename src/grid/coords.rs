//! Storage coordinates.
//!
//! A node's `(position_x, position_y)` is a pixel offset encoded against the
//! *base* grid: collapsed lanes of `cell_height`, normal (non-compact) view.
//! [`decode`] and [`encode`] never look at lane expansion or compact mode, so
//! a node keeps its logical cell whatever view is active when it is read.
//! Display offsets live in [`super::geometry`].

use serde::{Deserialize, Serialize};

use crate::config::GridConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPos {
    pub row: usize,
    pub col: usize,
}

impl CellPos {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Rounds a fractional cell index, clamping negatives and NaN to zero.
fn cell_index(value: f32) -> usize {
    let rounded = value.round();
    if rounded.is_nan() || rounded <= 0.0 {
        0
    } else {
        rounded as usize
    }
}

/// Logical cell of a stored position.
pub fn decode(config: &GridConfig, x: f32, y: f32) -> CellPos {
    let col = (x - config.lane_header_width - config.centering_offset()) / config.cell_width;
    let row = (y - config.column_header_height - config.node_padding) / config.cell_height;
    CellPos {
        row: cell_index(row),
        col: cell_index(col),
    }
}

/// Stored position of a node centered in `cell`.
pub fn encode(config: &GridConfig, cell: CellPos) -> Point {
    Point {
        x: config.lane_header_width
            + cell.col as f32 * config.cell_width
            + config.centering_offset(),
        y: config.column_header_height + cell.row as f32 * config.cell_height + config.node_padding,
    }
}

/// Normalizes an arbitrary drop point to the canonical position of its cell.
pub fn snap(config: &GridConfig, x: f32, y: f32) -> Point {
    encode(config, decode(config, x, y))
}

/// Whether `(x, y)` is already the canonical encoding of its cell.
pub fn is_canonical(config: &GridConfig, x: f32, y: f32) -> bool {
    snap(config, x, y) == Point::new(x, y)
}
