use serde::{Deserialize, Serialize};

use super::coords::{CellPos, Point};
use crate::config::GridConfig;
use crate::model::Lane;

/// View-only state: never stored, never used to interpret a stored position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewOptions {
    pub compact: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.height / 2.0
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// Rendered lane heights and their prefix sums for one render pass.
///
/// Built from the ordered lane list; rebuild whenever the lanes, their
/// expansion or the compact flag change. Row arguments must already be
/// clamped with [`LaneGeometry::clamp_row`].
#[derive(Debug, Clone)]
pub struct LaneGeometry<'a> {
    config: &'a GridConfig,
    view: ViewOptions,
    heights: Vec<f32>,
    offsets: Vec<f32>,
}

impl<'a> LaneGeometry<'a> {
    pub fn new(config: &'a GridConfig, lanes: &[Lane], view: ViewOptions) -> Self {
        let heights: Vec<f32> = lanes
            .iter()
            .map(|lane| rendered_lane_height(config, lane.expanded, view))
            .collect();
        let mut offsets = Vec::with_capacity(heights.len() + 1);
        let mut y = config.column_header_height;
        offsets.push(y);
        for height in &heights {
            y += height;
            offsets.push(y);
        }
        Self {
            config,
            view,
            heights,
            offsets,
        }
    }

    pub fn config(&self) -> &GridConfig {
        self.config
    }

    pub fn view(&self) -> ViewOptions {
        self.view
    }

    pub fn lane_count(&self) -> usize {
        self.heights.len()
    }

    /// Last valid row for `row`, or `None` when there are no lanes.
    pub fn clamp_row(&self, row: usize) -> Option<usize> {
        if self.heights.is_empty() {
            None
        } else {
            Some(row.min(self.heights.len() - 1))
        }
    }

    pub fn lane_height(&self, row: usize) -> f32 {
        self.heights[row]
    }

    /// Top edge of lane `row`. `row == lane_count()` gives the bottom of the
    /// last lane.
    pub fn lane_y_offset(&self, row: usize) -> f32 {
        self.offsets[row]
    }

    pub fn node_height(&self, row: usize) -> f32 {
        self.lane_height(row) - self.config.node_padding * 2.0
    }

    pub fn column_x(&self, col: usize) -> f32 {
        self.config.lane_header_width + col as f32 * self.config.cell_width
    }

    /// Display position of a node in `cell`; x matches the storage encoding,
    /// y follows the rendered lane offsets.
    pub fn render_position(&self, cell: CellPos) -> Point {
        Point {
            x: self.column_x(cell.col) + self.config.centering_offset(),
            y: self.lane_y_offset(cell.row) + self.config.node_padding,
        }
    }

    pub fn node_rect(&self, cell: CellPos) -> Rect {
        let origin = self.render_position(cell);
        Rect {
            x: origin.x,
            y: origin.y,
            width: self.config.node_width,
            height: self.node_height(cell.row),
        }
    }

    pub fn cell_rect(&self, cell: CellPos) -> Rect {
        Rect {
            x: self.column_x(cell.col),
            y: self.lane_y_offset(cell.row),
            width: self.config.cell_width,
            height: self.lane_height(cell.row),
        }
    }

    pub fn body_height(&self) -> f32 {
        self.offsets[self.heights.len()]
    }

    pub fn total_width(&self, columns: usize) -> f32 {
        self.column_x(columns) + self.config.trailing_gutter
    }

    pub fn total_height(&self) -> f32 {
        self.body_height() + self.config.trailing_gutter
    }

    /// Cell under a screen point, or `None` over headers, gutters or outside
    /// the `columns` wide grid body.
    pub fn cell_at(&self, x: f32, y: f32, columns: usize) -> Option<CellPos> {
        if x < self.config.lane_header_width || y < self.config.column_header_height {
            return None;
        }
        let col = ((x - self.config.lane_header_width) / self.config.cell_width).floor();
        if !col.is_finite() || col as usize >= columns {
            return None;
        }
        // offsets is sorted; the lane is the last offset not above y.
        let row = self.offsets.partition_point(|offset| *offset <= y);
        if row == 0 || row > self.heights.len() {
            return None;
        }
        Some(CellPos::new(row - 1, col as usize))
    }
}

fn rendered_lane_height(config: &GridConfig, expanded: bool, view: ViewOptions) -> f32 {
    if view.compact {
        config.compact_lane_height
    } else if expanded {
        config.cell_height * 2.0
    } else {
        config.cell_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lanes(expanded: &[bool]) -> Vec<Lane> {
        expanded
            .iter()
            .enumerate()
            .map(|(idx, expanded)| Lane {
                id: format!("lane-{idx}"),
                roadmap_id: "r1".to_string(),
                name: format!("Lane {}", idx + 1),
                color: "#3b82f6".to_string(),
                description: None,
                expanded: *expanded,
                order_index: idx as i64,
            })
            .collect()
    }

    #[test]
    fn expanded_lane_doubles_height_and_pushes_following_lanes() {
        let config = GridConfig::default();
        let lanes = lanes(&[false, true, false]);
        let geometry = LaneGeometry::new(&config, &lanes, ViewOptions::default());
        assert_eq!(geometry.lane_height(0), 360.0);
        assert_eq!(geometry.lane_height(1), 720.0);
        assert_eq!(geometry.lane_y_offset(0), 52.0);
        assert_eq!(geometry.lane_y_offset(2), 52.0 + 360.0 + 720.0);
        assert_eq!(
            geometry.render_position(CellPos::new(2, 1)),
            Point::new(614.0, 1132.0 + 24.0)
        );
        assert_eq!(geometry.node_height(1), 672.0);
    }

    #[test]
    fn compact_mode_ignores_expansion() {
        let config = GridConfig::default();
        let lanes = lanes(&[true, true]);
        let geometry = LaneGeometry::new(&config, &lanes, ViewOptions { compact: true });
        assert_eq!(geometry.lane_height(0), 200.0);
        assert_eq!(geometry.lane_y_offset(1), 252.0);
        assert_eq!(geometry.node_height(1), 152.0);
        assert_eq!(geometry.total_height(), 52.0 + 400.0 + 48.0);
    }

    #[test]
    fn clamp_row_saturates_at_last_lane() {
        let config = GridConfig::default();
        let lanes = lanes(&[false, false]);
        let geometry = LaneGeometry::new(&config, &lanes, ViewOptions::default());
        assert_eq!(geometry.clamp_row(7), Some(1));
        let empty = LaneGeometry::new(&config, &[], ViewOptions::default());
        assert_eq!(empty.clamp_row(0), None);
    }

    #[test]
    fn hit_test_follows_rendered_lanes() {
        let config = GridConfig::default();
        let lanes = lanes(&[true, false]);
        let geometry = LaneGeometry::new(&config, &lanes, ViewOptions::default());
        // Inside the expanded first lane, below where a collapsed lane would end.
        assert_eq!(geometry.cell_at(300.0, 600.0, 4), Some(CellPos::new(0, 0)));
        assert_eq!(geometry.cell_at(600.0, 800.0, 4), Some(CellPos::new(1, 1)));
        assert_eq!(geometry.cell_at(100.0, 600.0, 4), None);
        assert_eq!(geometry.cell_at(300.0, 10.0, 4), None);
        assert_eq!(geometry.cell_at(300.0, 52.0 + 1080.0, 4), None);
        assert_eq!(geometry.cell_at(200.0 + 4.0 * 360.0, 100.0, 4), None);
    }
}
