use crate::config::{Config, RenderConfig};
use crate::grid::{GridLayout, NodeLayout};
use crate::model::NodeStatus;
use crate::text_metrics::{clamp_lines, wrap_text};
use crate::theme::{Theme, blend_with_white, status_border_color, status_style, status_text_color};
use anyhow::Result;
use std::path::Path;

/// Opacity of a lane's colour in its node cards.
const CARD_TINT: f32 = 0.12;
/// Opacity of a lane's colour in its header cell.
const LANE_HEADER_TINT: f32 = 0.08;
/// Opacity of the in-progress cell highlight.
const IN_PROGRESS_TINT: f32 = 0.06;
const CARD_INSET: f32 = 14.0;
const STATUS_CHIP_HEIGHT: f32 = 22.0;

pub fn render_svg(layout: &GridLayout, config: &Config) -> String {
    let theme = &config.theme;
    let grid = &config.grid;
    let mut svg = String::new();
    let width = layout.width;
    let height = layout.height;

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    ));
    svg.push_str("<defs>");
    svg.push_str(&format!(
        "<marker id=\"arrow\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" markerWidth=\"8\" markerHeight=\"8\" orient=\"auto\"><path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"{}\"/></marker>",
        theme.line_color
    ));
    svg.push_str("</defs>");

    let body_right = grid.lane_header_width + layout.columns.len() as f32 * grid.cell_width;

    // ── Cells ──
    for lane in &layout.lanes {
        for column in &layout.columns {
            let in_progress = layout
                .nodes
                .iter()
                .any(|node| node.cell.row == lane.row && node.cell.col == column.col && node.status == NodeStatus::InProgress);
            let fill = if in_progress {
                blend_with_white(&lane.color, IN_PROGRESS_TINT)
            } else if (lane.row + column.col) % 2 == 0 {
                theme.cell_background.clone()
            } else {
                theme.cell_background_alt.clone()
            };
            svg.push_str(&format!(
                "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1\"/>",
                column.x, lane.y, column.width, lane.height, fill, theme.grid_line_color
            ));
        }
    }

    // ── Column headers ──
    svg.push_str(&format!(
        "<rect x=\"0\" y=\"0\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\"/>",
        body_right, grid.column_header_height, theme.header_background
    ));
    for column in &layout.columns {
        let center_x = column.x + column.width / 2.0;
        let text_y = grid.column_header_height / 2.0 + theme.font_size * 0.35;
        if let Some(label) = &column.label {
            svg.push_str(&format!(
                "<text x=\"{center_x:.2}\" y=\"{text_y:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" font-weight=\"600\" fill=\"{}\">{}</text>",
                theme.font_family,
                theme.font_size,
                theme.text_color,
                escape_xml(label)
            ));
        }
        if column.pinned {
            svg.push_str(&format!(
                "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"4\" fill=\"{}\"/>",
                column.x + column.width - 14.0,
                grid.column_header_height / 2.0,
                theme.preview_line_color
            ));
        }
        svg.push_str(&format!(
            "<line x1=\"{x:.2}\" y1=\"0\" x2=\"{x:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"1\"/>",
            grid.column_header_height,
            theme.grid_line_color,
            x = column.x
        ));
    }

    // ── Lane headers ──
    for lane in &layout.lanes {
        svg.push_str(&format!(
            "<rect x=\"0\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1\"/>",
            lane.y,
            grid.lane_header_width,
            lane.height,
            blend_with_white(&lane.color, LANE_HEADER_TINT),
            theme.grid_line_color
        ));
        svg.push_str(&format!(
            "<rect x=\"0\" y=\"{:.2}\" width=\"4\" height=\"{:.2}\" fill=\"{}\"/>",
            lane.y, lane.height, lane.color
        ));
        let text_width = grid.lane_header_width - 32.0;
        let name_lines = clamp_lines(
            wrap_text(&lane.name, text_width, theme.font_size, &theme.font_family),
            2,
            text_width,
            theme.font_size,
            &theme.font_family,
        );
        let mut cursor_y = lane.y + 16.0;
        svg.push_str(&text_lines_svg(
            16.0,
            cursor_y,
            &name_lines,
            theme,
            config.render.title_line_height,
            &theme.text_color,
            "600",
        ));
        cursor_y += name_lines.len() as f32 * theme.font_size * config.render.title_line_height + 8.0;
        if lane.expanded
            && let Some(description) = &lane.description
        {
            let lines = clamp_lines(
                wrap_text(description, text_width, theme.font_size * 0.85, &theme.font_family),
                config.render.max_description_lines,
                text_width,
                theme.font_size * 0.85,
                &theme.font_family,
            );
            svg.push_str(&text_lines_svg(
                16.0,
                cursor_y,
                &lines,
                &Theme {
                    font_size: theme.font_size * 0.85,
                    ..theme.clone()
                },
                config.render.title_line_height,
                &theme.muted_text_color,
                "400",
            ));
        }
    }

    // ── Dependency arrows ──
    for edge in &layout.edges {
        svg.push_str(&format!(
            "<path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"2\" marker-end=\"url(#arrow)\" data-edge=\"{}\"/>",
            points_to_path(&edge.points),
            theme.line_color,
            escape_xml(&edge.id)
        ));
    }

    // ── Nodes ──
    for node in &layout.nodes {
        svg.push_str(&node_svg(node, layout.compact, config));
    }

    svg.push_str("</svg>");
    svg
}

fn node_svg(node: &NodeLayout, compact: bool, config: &Config) -> String {
    let theme = &config.theme;
    let style = status_style(node.status);
    let stroke = if style.lane_border {
        blend_with_white(&node.lane_color, style.border_alpha)
    } else {
        status_border_color(node.status).to_string()
    };
    let dash = if style.dashed { " stroke-dasharray=\"8 5\"" } else { "" };
    let mut out = String::new();
    out.push_str(&format!(
        "<g data-node=\"{}\"><rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"12\" ry=\"12\" fill=\"{}\" stroke=\"{}\" stroke-width=\"{}\"{dash}/>",
        escape_xml(&node.id),
        node.x,
        node.y,
        node.width,
        node.height,
        blend_with_white(&node.lane_color, CARD_TINT),
        stroke,
        style.border_width
    ));

    let inner_width = node.width - CARD_INSET * 2.0;
    let max_title_lines = if compact {
        config.render.max_title_lines_compact
    } else {
        config.render.max_title_lines
    };
    let title_size = theme.font_size * 1.1;
    let title_lines = clamp_lines(
        wrap_text(&node.title, inner_width, title_size, &theme.font_family),
        max_title_lines,
        inner_width,
        title_size,
        &theme.font_family,
    );
    let title_theme = Theme {
        font_size: title_size,
        ..theme.clone()
    };
    let mut cursor_y = node.y + CARD_INSET;
    out.push_str(&text_lines_svg(
        node.x + CARD_INSET,
        cursor_y,
        &title_lines,
        &title_theme,
        config.render.title_line_height,
        &theme.text_color,
        "600",
    ));
    cursor_y += title_lines.len() as f32 * title_size * config.render.title_line_height + 8.0;

    let footer_y = node.y + node.height - CARD_INSET - STATUS_CHIP_HEIGHT;
    if !compact
        && let Some(description) = &node.description
    {
        let line_height = theme.font_size * config.render.title_line_height;
        let room = ((footer_y - cursor_y - 8.0) / line_height).floor().max(0.0) as usize;
        let max_lines = room.min(config.render.max_description_lines);
        if max_lines > 0 {
            let lines = clamp_lines(
                wrap_text(description, inner_width, theme.font_size, &theme.font_family),
                max_lines,
                inner_width,
                theme.font_size,
                &theme.font_family,
            );
            out.push_str(&text_lines_svg(
                node.x + CARD_INSET,
                cursor_y,
                &lines,
                theme,
                config.render.title_line_height,
                &theme.muted_text_color,
                "400",
            ));
        }
    }

    out.push_str(&status_chip_svg(node.x + CARD_INSET, footer_y, node.status, theme));
    if node.attachments > 0 {
        out.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"end\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{} file{}</text>",
            node.x + node.width - CARD_INSET,
            footer_y + STATUS_CHIP_HEIGHT * 0.7,
            theme.font_family,
            theme.font_size * 0.85,
            theme.muted_text_color,
            node.attachments,
            if node.attachments == 1 { "" } else { "s" }
        ));
    }
    // Connector handle for drawing dependencies.
    out.push_str(&format!(
        "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"5\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1.5\"/>",
        node.x + node.width,
        node.y + node.height / 2.0,
        theme.background,
        theme.line_color
    ));
    out.push_str("</g>");
    out
}

fn status_chip_svg(x: f32, y: f32, status: NodeStatus, theme: &Theme) -> String {
    let label = status.label();
    let size = theme.font_size * 0.8;
    let width = label.chars().count() as f32 * size * 0.62 + 16.0;
    let color = status_text_color(status);
    format!(
        "<rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{width:.2}\" height=\"{STATUS_CHIP_HEIGHT}\" rx=\"11\" ry=\"11\" fill=\"{}\"/><text x=\"{:.2}\" y=\"{:.2}\" font-family=\"{}\" font-size=\"{size}\" font-weight=\"600\" fill=\"{color}\">{}</text>",
        blend_with_white(color, 0.12),
        x + 8.0,
        y + STATUS_CHIP_HEIGHT * 0.68,
        theme.font_family,
        escape_xml(label)
    )
}

fn text_lines_svg(
    x: f32,
    top: f32,
    lines: &[String],
    theme: &Theme,
    line_height: f32,
    fill: &str,
    weight: &str,
) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let first_y = top + theme.font_size;
    let mut text = String::new();
    text.push_str(&format!(
        "<text x=\"{x:.2}\" y=\"{first_y:.2}\" font-family=\"{}\" font-size=\"{}\" font-weight=\"{weight}\" fill=\"{fill}\">",
        theme.font_family, theme.font_size
    ));
    for (idx, line) in lines.iter().enumerate() {
        let dy = if idx == 0 { 0.0 } else { theme.font_size * line_height };
        text.push_str(&format!("<tspan x=\"{x:.2}\" dy=\"{dy:.2}\">{}</tspan>", escape_xml(line)));
    }
    text.push_str("</text>");
    text
}

fn points_to_path(points: &[(f32, f32)]) -> String {
    if points.is_empty() {
        return String::new();
    }
    let mut d = String::new();
    d.push_str(&format!("M {:.2} {:.2}", points[0].0, points[0].1));
    for point in points.iter().skip(1) {
        d.push_str(&format!(" L {:.2} {:.2}", point.0, point.1));
    }
    d
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig, theme: &Theme) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = theme
        .font_family
        .split(',')
        .next()
        .map(|family| family.trim().trim_matches('"').to_string())
        .unwrap_or_else(|| "sans-serif".to_string());
    opt.fontdb_mut().load_system_fonts();
    if let Some(size) = usvg::Size::from_wh(render_cfg.width, render_cfg.height) {
        opt.default_size = size;
    }

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;
    if let Some(color) = crate::theme::parse_hex_color(&render_cfg.background) {
        pixmap.fill(resvg::tiny_skia::Color::from_rgba8(color.0, color.1, color.2, 255));
    }

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path, _render_cfg: &RenderConfig, _theme: &Theme) -> Result<()> {
    Err(anyhow::anyhow!("PNG output requires the `png` feature"))
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{CellPos, ViewOptions, compute_grid_layout, encode};
    use crate::model::{Attachment, Column, Dependency, Lane, Node, Roadmap, RoadmapState};

    fn sample() -> (RoadmapState, Config) {
        let config = Config::default();
        let mut state = RoadmapState::new(Roadmap {
            id: "r1".to_string(),
            title: "Platform".to_string(),
            description: None,
            pinned_column_id: Some("c0".to_string()),
        });
        state.lanes.push(Lane {
            id: "l0".to_string(),
            roadmap_id: "r1".to_string(),
            name: "Core <Features>".to_string(),
            color: "#3b82f6".to_string(),
            description: Some("Search and storage".to_string()),
            expanded: true,
            order_index: 0,
        });
        for idx in 0..2 {
            state.columns.push(Column {
                id: format!("c{idx}"),
                roadmap_id: "r1".to_string(),
                name: (idx == 0).then(|| "Q1 2025".to_string()),
                order_index: idx,
            });
        }
        for (id, col, status) in [("a", 0, NodeStatus::Completed), ("b", 1, NodeStatus::InProgress)] {
            let pos = encode(&config.grid, CellPos::new(0, col));
            state.nodes.push(Node {
                id: id.to_string(),
                roadmap_id: "r1".to_string(),
                title: format!("Node {id}"),
                description: Some("Details".to_string()),
                status,
                position_x: pos.x,
                position_y: pos.y,
            });
        }
        state.dependencies.push(Dependency {
            id: "d1".to_string(),
            node_id: "b".to_string(),
            depends_on_node_id: "a".to_string(),
        });
        state.attachments.push(Attachment {
            id: "f1".to_string(),
            node_id: "a".to_string(),
            file_name: "design.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size: 3,
            key: "1-design.pdf".to_string(),
            url: "memory://attachments/1-design.pdf".to_string(),
        });
        (state, config)
    }

    #[test]
    fn render_svg_draws_grid_nodes_and_arrows() {
        let (state, config) = sample();
        let layout = compute_grid_layout(&state, ViewOptions::default(), &config);
        let svg = render_svg(&layout, &config);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert!(svg.contains("Q1 2025"));
        assert!(svg.contains("Core &lt;Features&gt;"));
        assert!(svg.contains("storage"));
        assert!(svg.contains("data-edge=\"d1\""));
        assert!(svg.contains("marker-end=\"url(#arrow)\""));
        assert!(svg.contains("In Progress"));
        assert!(svg.contains("1 file<"));
    }

    #[test]
    fn compact_view_hides_descriptions() {
        let (state, config) = sample();
        let layout = compute_grid_layout(&state, ViewOptions { compact: true }, &config);
        let svg = render_svg(&layout, &config);
        assert!(!svg.contains("Details"));
        assert!(!svg.contains("storage"));
    }

    #[test]
    fn path_uses_move_then_lines() {
        assert_eq!(points_to_path(&[(0.0, 1.0), (2.0, 1.0)]), "M 0.00 1.00 L 2.00 1.00");
        assert_eq!(points_to_path(&[]), "");
    }
}
