use crate::model::NodeStatus;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#?([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("valid hex color regex"));

/// Colors handed out to new lanes, cycling.
const DEFAULT_LANE_PALETTE: [&str; 8] = [
    "#3b82f6", "#10b981", "#f59e0b", "#ef4444", "#8b5cf6", "#ec4899", "#06b6d4", "#84cc16",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub text_color: String,
    pub muted_text_color: String,
    pub line_color: String,
    pub preview_line_color: String,
    pub grid_line_color: String,
    pub header_background: String,
    pub cell_background: String,
    pub cell_background_alt: String,
    pub background: String,
    pub fallback_lane_color: String,
    pub lane_palette: Vec<String>,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 14.0,
            text_color: "#1e293b".to_string(),
            muted_text_color: "#475569".to_string(),
            line_color: "#64748b".to_string(),
            preview_line_color: "#3b82f6".to_string(),
            grid_line_color: "#e2e8f0".to_string(),
            header_background: "#f8fafc".to_string(),
            cell_background: "#ffffff".to_string(),
            cell_background_alt: "#f8fafc".to_string(),
            background: "#FFFFFF".to_string(),
            fallback_lane_color: "#64748b".to_string(),
            lane_palette: DEFAULT_LANE_PALETTE.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Theme {
    pub fn slate() -> Self {
        Self {
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 13.0,
            text_color: "#0f172a".to_string(),
            muted_text_color: "#334155".to_string(),
            line_color: "#475569".to_string(),
            grid_line_color: "#cbd5e1".to_string(),
            header_background: "#f1f5f9".to_string(),
            cell_background_alt: "#f1f5f9".to_string(),
            ..Self::default()
        }
    }

    /// Palette color for the `index`-th lane created in a roadmap.
    pub fn lane_color(&self, index: usize) -> String {
        if self.lane_palette.is_empty() {
            return self.fallback_lane_color.clone();
        }
        self.lane_palette[index % self.lane_palette.len()].clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusStyle {
    pub border_width: f32,
    pub dashed: bool,
    /// Use the lane color (with `border_alpha`) instead of a fixed stroke.
    pub lane_border: bool,
    pub border_alpha: f32,
}

pub fn status_style(status: NodeStatus) -> StatusStyle {
    match status {
        NodeStatus::Planned => StatusStyle {
            border_width: 2.0,
            dashed: true,
            lane_border: true,
            border_alpha: 0.38,
        },
        NodeStatus::InProgress => StatusStyle {
            border_width: 4.0,
            dashed: false,
            lane_border: true,
            border_alpha: 0.8,
        },
        NodeStatus::Completed => StatusStyle {
            border_width: 3.0,
            dashed: false,
            lane_border: false,
            border_alpha: 1.0,
        },
        NodeStatus::Blocked => StatusStyle {
            border_width: 3.0,
            dashed: true,
            lane_border: false,
            border_alpha: 1.0,
        },
    }
}

/// Fixed stroke for statuses that do not take the lane color.
pub fn status_border_color(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Completed => "#64748b",
        NodeStatus::Blocked => "#b91c1c",
        _ => "#000000",
    }
}

pub fn status_text_color(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Planned => "#475569",
        NodeStatus::InProgress => "#047857",
        NodeStatus::Completed => "#334155",
        NodeStatus::Blocked => "#b91c1c",
    }
}

pub fn parse_hex_color(color: &str) -> Option<(u8, u8, u8)> {
    let caps = HEX_COLOR_RE.captures(color.trim())?;
    let hex = caps.get(1)?.as_str();
    let expanded: String = if hex.len() == 3 {
        hex.chars().flat_map(|ch| [ch, ch]).collect()
    } else {
        hex.to_string()
    };
    let r = u8::from_str_radix(&expanded[0..2], 16).ok()?;
    let g = u8::from_str_radix(&expanded[2..4], 16).ok()?;
    let b = u8::from_str_radix(&expanded[4..6], 16).ok()?;
    Some((r, g, b))
}

/// Opaque equivalent of `color` drawn at `opacity` over white, so grid cells
/// do not show through node cards.
pub fn blend_with_white(color: &str, opacity: f32) -> String {
    let Some((r, g, b)) = parse_hex_color(color) else {
        return "#ffffff".to_string();
    };
    let opacity = opacity.clamp(0.0, 1.0);
    let mix = |channel: u8| (channel as f32 * opacity + 255.0 * (1.0 - opacity)).round() as u8;
    format!("rgb({}, {}, {})", mix(r), mix(g), mix(b))
}
