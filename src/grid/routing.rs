use std::collections::{HashMap, HashSet};

use super::coords::{self, Point};
use super::geometry::{LaneGeometry, Rect};
use super::types::EdgeLayout;
use crate::config::RoutingConfig;
use crate::model::{Dependency, Node};

// ── Anchors ─────────────────────────────────────────────────────────

/// On-screen card of a node, with its row clamped to the existing lanes.
/// `None` when the grid has no lanes to render into.
pub fn node_screen_rect(node: &Node, geometry: &LaneGeometry<'_>) -> Option<Rect> {
    let mut cell = coords::decode(geometry.config(), node.position_x, node.position_y);
    cell.row = geometry.clamp_row(cell.row)?;
    Some(geometry.node_rect(cell))
}

/// Where arrows leave a node: middle of its right edge.
pub fn source_anchor(rect: &Rect) -> Point {
    Point::new(rect.right(), rect.center_y())
}

/// Where arrows enter a node: middle of its left edge.
pub fn target_anchor(rect: &Rect) -> Point {
    Point::new(rect.x, rect.center_y())
}

// ── Channels ────────────────────────────────────────────────────────

/// Signed channel of `edges[edge_index]` among the edges sharing its target.
///
/// With `n` edges into one target, the edge at position `p` (in edge-list
/// order) gets `p - n / 2`, so three edges use -1, 0, 1 and a lone edge uses 0.
pub fn channel_index(edges: &[Dependency], edge_index: usize) -> i32 {
    let Some(edge) = edges.get(edge_index) else {
        return 0;
    };
    let mut total = 0usize;
    let mut position = 0usize;
    for (idx, other) in edges.iter().enumerate() {
        if other.node_id != edge.node_id {
            continue;
        }
        if idx < edge_index {
            position += 1;
        }
        total += 1;
    }
    if total <= 1 {
        return 0;
    }
    position as i32 - (total / 2) as i32
}

/// Channels for a whole edge list in one pass, keyed by edge index.
pub fn assign_channels(edges: &[Dependency]) -> Vec<i32> {
    let mut totals: HashMap<&str, usize> = HashMap::new();
    for edge in edges {
        *totals.entry(edge.node_id.as_str()).or_insert(0) += 1;
    }
    let mut seen: HashMap<&str, usize> = HashMap::new();
    edges
        .iter()
        .map(|edge| {
            let total = totals.get(edge.node_id.as_str()).copied().unwrap_or(1);
            let position = seen.entry(edge.node_id.as_str()).or_insert(0);
            let channel = if total <= 1 {
                0
            } else {
                *position as i32 - (total / 2) as i32
            };
            *position += 1;
            channel
        })
        .collect()
}

// ── Paths ───────────────────────────────────────────────────────────

/// Six-point orthogonal path between two cards on a given channel.
pub fn orthogonal_path(
    source: &Rect,
    target: &Rect,
    channel: i32,
    routing: &RoutingConfig,
) -> Vec<(f32, f32)> {
    let start = source_anchor(source);
    let end = target_anchor(target);
    let exit_x = start.x + routing.exit_distance;
    let entry_x = end.x - routing.entry_distance;
    let route_y = (start.y + end.y) / 2.0 + channel as f32 * routing.channel_spacing;
    vec![
        (start.x, start.y),
        (exit_x, start.y),
        (exit_x, route_y),
        (entry_x, route_y),
        (entry_x, end.y),
        (end.x, end.y),
    ]
}

/// Dependencies whose endpoints both exist in `nodes`, in list order.
///
/// Channels are counted among these edges only: an edge left behind by a
/// deleted node neither draws nor shifts its siblings.
pub fn renderable_edges(nodes: &[Node], edges: &[Dependency]) -> Vec<Dependency> {
    let ids: HashSet<&str> = nodes.iter().map(|node| node.id.as_str()).collect();
    edges
        .iter()
        .filter(|edge| {
            let live = ids.contains(edge.depends_on_node_id.as_str()) && ids.contains(edge.node_id.as_str());
            if !live {
                tracing::debug!(
                    edge = %edge.id,
                    from = %edge.depends_on_node_id,
                    to = %edge.node_id,
                    "skipping dependency with a missing endpoint"
                );
            }
            live
        })
        .cloned()
        .collect()
}

/// Routes `edges[edge_index]` from its depended-upon node to its dependent.
///
/// Returns `None` when either endpoint is missing from `nodes` or there are
/// no lanes to place nodes in. Gives the same path as
/// [`route_dependencies`] for the same inputs.
pub fn compute_path(
    nodes: &[Node],
    edges: &[Dependency],
    edge_index: usize,
    geometry: &LaneGeometry<'_>,
    routing: &RoutingConfig,
) -> Option<Vec<(f32, f32)>> {
    let edge = edges.get(edge_index)?;
    let source = nodes.iter().find(|node| node.id == edge.depends_on_node_id)?;
    let target = nodes.iter().find(|node| node.id == edge.node_id)?;
    let source_rect = node_screen_rect(source, geometry)?;
    let target_rect = node_screen_rect(target, geometry)?;

    // The edge is renderable, so its position among renderable edges is the
    // number of renderable edges listed before it.
    let position = renderable_edges(nodes, &edges[..edge_index]).len();
    let live = renderable_edges(nodes, edges);
    let channel = channel_index(&live, position);
    Some(orthogonal_path(&source_rect, &target_rect, channel, routing))
}

/// Routes every renderable dependency.
///
/// Edges whose endpoints are missing from `nodes` are skipped rather than
/// failing: a node may be deleted before its edges are reconciled. Channels
/// are assigned among the renderable edges only.
pub fn route_dependencies(
    nodes: &[Node],
    edges: &[Dependency],
    geometry: &LaneGeometry<'_>,
    routing: &RoutingConfig,
) -> Vec<EdgeLayout> {
    let by_id: HashMap<&str, &Node> = nodes.iter().map(|node| (node.id.as_str(), node)).collect();
    let renderable = renderable_edges(nodes, edges);
    let channels = assign_channels(&renderable);
    let mut routed = Vec::with_capacity(renderable.len());
    for (edge, channel) in renderable.iter().zip(channels) {
        let source = by_id[edge.depends_on_node_id.as_str()];
        let target = by_id[edge.node_id.as_str()];
        let (Some(source_rect), Some(target_rect)) = (
            node_screen_rect(source, geometry),
            node_screen_rect(target, geometry),
        ) else {
            continue;
        };
        routed.push(EdgeLayout {
            id: edge.id.clone(),
            from: edge.depends_on_node_id.clone(),
            to: edge.node_id.clone(),
            channel,
            points: orthogonal_path(&source_rect, &target_rect, channel, routing),
        });
    }
    routed
}

pub fn path_length(points: &[(f32, f32)]) -> f32 {
    points
        .windows(2)
        .map(|pair| {
            let dx = pair[1].0 - pair[0].0;
            let dy = pair[1].1 - pair[0].1;
            (dx * dx + dy * dy).sqrt()
        })
        .sum()
}

pub fn is_orthogonal(points: &[(f32, f32)]) -> bool {
    points
        .windows(2)
        .all(|pair| pair[0].0 == pair[1].0 || pair[0].1 == pair[1].1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;
    use crate::grid::coords::{CellPos, encode};
    use crate::grid::geometry::ViewOptions;
    use crate::model::{Lane, NodeStatus};

    fn lane(idx: usize, expanded: bool) -> Lane {
        Lane {
            id: format!("lane-{idx}"),
            roadmap_id: "r1".to_string(),
            name: format!("Lane {idx}"),
            color: "#10b981".to_string(),
            description: None,
            expanded,
            order_index: idx as i64,
        }
    }

    fn node_at(config: &GridConfig, id: &str, row: usize, col: usize) -> Node {
        let pos = encode(config, CellPos::new(row, col));
        Node {
            id: id.to_string(),
            roadmap_id: "r1".to_string(),
            title: id.to_string(),
            description: None,
            status: NodeStatus::Planned,
            position_x: pos.x,
            position_y: pos.y,
        }
    }

    fn dep(id: &str, from: &str, to: &str) -> Dependency {
        Dependency {
            id: id.to_string(),
            node_id: to.to_string(),
            depends_on_node_id: from.to_string(),
        }
    }

    #[test]
    fn three_edges_into_one_target_spread_around_zero() {
        let edges = vec![dep("d1", "a", "t"), dep("d2", "b", "t"), dep("d3", "c", "t")];
        let channels: Vec<i32> = (0..3).map(|idx| channel_index(&edges, idx)).collect();
        assert_eq!(channels, vec![-1, 0, 1]);
        assert_eq!(channels.iter().sum::<i32>(), 0);
        assert_eq!(assign_channels(&edges), channels);
    }

    #[test]
    fn channels_are_grouped_per_target() {
        let edges = vec![
            dep("d1", "a", "t"),
            dep("d2", "a", "u"),
            dep("d3", "b", "t"),
        ];
        assert_eq!(assign_channels(&edges), vec![-1, 0, 0]);
        assert_eq!(channel_index(&edges, 2), 0);
        assert_eq!(channel_index(&edges, 9), 0);
    }

    #[test]
    fn single_edge_path_exits_right_and_enters_left() {
        let config = GridConfig::default();
        let lanes = vec![lane(0, false), lane(1, false)];
        let geometry = LaneGeometry::new(&config, &lanes, ViewOptions::default());
        let a = node_at(&config, "a", 0, 0);
        let b = node_at(&config, "b", 1, 2);
        let edges = vec![dep("d1", "a", "b")];
        let nodes = vec![a, b];
        let path = compute_path(&nodes, &edges, 0, &geometry, &RoutingConfig::default()).unwrap();
        // Source card: x 254..506, y 76..388 with node height 312.
        let start = (506.0, 76.0 + 156.0);
        let end = (200.0 + 720.0 + 54.0, 436.0 + 156.0);
        let mid = (start.1 + end.1) / 2.0;
        assert_eq!(
            path,
            vec![
                start,
                (546.0, start.1),
                (546.0, mid),
                (end.0 - 40.0, mid),
                (end.0 - 40.0, end.1),
                end,
            ]
        );
        assert!(is_orthogonal(&path));
    }

    #[test]
    fn expanded_lane_moves_anchor_not_logical_row() {
        let config = GridConfig::default();
        let lanes = vec![lane(0, true), lane(1, false)];
        let geometry = LaneGeometry::new(&config, &lanes, ViewOptions::default());
        let b = node_at(&config, "b", 1, 0);
        let rect = node_screen_rect(&b, &geometry).unwrap();
        assert_eq!(rect.y, 52.0 + 720.0 + 24.0);
        assert_eq!(rect.height, 312.0);
    }

    #[test]
    fn rows_beyond_last_lane_are_clamped() {
        let config = GridConfig::default();
        let lanes = vec![lane(0, false)];
        let geometry = LaneGeometry::new(&config, &lanes, ViewOptions::default());
        let stray = node_at(&config, "stray", 4, 1);
        let rect = node_screen_rect(&stray, &geometry).unwrap();
        assert_eq!(rect.y, 76.0);
        assert!(node_screen_rect(&stray, &LaneGeometry::new(&config, &[], ViewOptions::default())).is_none());
    }

    #[test]
    fn edges_with_missing_endpoints_are_skipped() {
        let config = GridConfig::default();
        let lanes = vec![lane(0, false)];
        let geometry = LaneGeometry::new(&config, &lanes, ViewOptions::default());
        let nodes = vec![node_at(&config, "a", 0, 0), node_at(&config, "b", 0, 1)];
        let edges = vec![
            dep("ghost", "deleted", "b"),
            dep("d1", "a", "b"),
            dep("orphan", "a", "gone"),
        ];
        let routed = route_dependencies(&nodes, &edges, &geometry, &RoutingConfig::default());
        assert_eq!(routed.len(), 1);
        assert_eq!(routed[0].id, "d1");
        // The skipped edge does not take a channel.
        assert_eq!(routed[0].channel, 0);
    }

    #[test]
    fn dangling_edge_does_not_shift_live_siblings() {
        let config = GridConfig::default();
        let routing = RoutingConfig::default();
        let lanes = vec![lane(0, false), lane(1, false)];
        let geometry = LaneGeometry::new(&config, &lanes, ViewOptions::default());
        let nodes = vec![
            node_at(&config, "a", 0, 0),
            node_at(&config, "b", 1, 0),
            node_at(&config, "t", 0, 2),
        ];
        let edges = vec![
            dep("d1", "a", "t"),
            dep("ghost", "deleted", "t"),
            dep("d2", "b", "t"),
        ];
        let routed = route_dependencies(&nodes, &edges, &geometry, &routing);
        let channels: Vec<i32> = routed.iter().map(|edge| edge.channel).collect();
        assert_eq!(channels, vec![-1, 0]);

        for (idx, edge) in edges.iter().enumerate() {
            let path = compute_path(&nodes, &edges, idx, &geometry, &routing);
            let expected = routed.iter().find(|routed| routed.id == edge.id).map(|routed| routed.points.clone());
            assert_eq!(path, expected, "edge {}", edge.id);
        }

        // Listing the dangling edge first changes nothing either.
        let reordered = vec![edges[1].clone(), edges[0].clone(), edges[2].clone()];
        let again = route_dependencies(&nodes, &reordered, &geometry, &routing);
        assert_eq!(again.iter().map(|edge| edge.channel).collect::<Vec<_>>(), channels);
        assert_eq!(
            compute_path(&nodes, &reordered, 1, &geometry, &routing),
            Some(routed[0].points.clone())
        );
        assert_eq!(renderable_edges(&nodes, &reordered).len(), 2);
    }

    #[test]
    fn channel_offsets_separate_horizontal_runs() {
        let config = GridConfig::default();
        let lanes = vec![lane(0, false), lane(1, false), lane(2, false)];
        let geometry = LaneGeometry::new(&config, &lanes, ViewOptions::default());
        let nodes = vec![
            node_at(&config, "a", 0, 0),
            node_at(&config, "b", 1, 0),
            node_at(&config, "c", 2, 0),
            node_at(&config, "t", 1, 2),
        ];
        let edges = vec![dep("d1", "a", "t"), dep("d2", "b", "t"), dep("d3", "c", "t")];
        let routed = route_dependencies(&nodes, &edges, &geometry, &RoutingConfig::default());
        let route_ys: Vec<f32> = routed.iter().map(|edge| edge.points[2].1).collect();
        let mids: Vec<f32> = routed
            .iter()
            .map(|edge| (edge.points[0].1 + edge.points[5].1) / 2.0)
            .collect();
        assert_eq!(route_ys[0], mids[0] - 30.0);
        assert_eq!(route_ys[1], mids[1]);
        assert_eq!(route_ys[2], mids[2] + 30.0);
        assert!(path_length(&routed[0].points) > 0.0);
    }
}
