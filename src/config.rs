use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Base cell geometry. Stored node positions are always encoded against these
/// values, whatever lane expansion or compact mode is active.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridConfig {
    pub cell_width: f32,
    pub cell_height: f32,
    pub node_width: f32,
    pub lane_header_width: f32,
    pub column_header_height: f32,
    pub node_padding: f32,
    pub compact_lane_height: f32,
    /// Width of the add-column strip and height of the add-lane strip.
    pub trailing_gutter: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_width: 360.0,
            cell_height: 360.0,
            node_width: 252.0,
            lane_header_width: 200.0,
            column_header_height: 52.0,
            node_padding: 24.0,
            compact_lane_height: 200.0,
            trailing_gutter: 48.0,
        }
    }
}

impl GridConfig {
    /// Horizontal inset that centers a node card inside its cell.
    pub fn centering_offset(&self) -> f32 {
        (self.cell_width - self.node_width) / 2.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Horizontal run out of the source before the first bend.
    pub exit_distance: f32,
    /// Horizontal run into the target after the last bend.
    pub entry_distance: f32,
    /// Vertical distance between neighbouring channels.
    pub channel_spacing: f32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            exit_distance: 40.0,
            entry_distance: 40.0,
            channel_spacing: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
    pub title_line_height: f32,
    pub max_title_lines: usize,
    pub max_title_lines_compact: usize,
    pub max_description_lines: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            background: "#FFFFFF".to_string(),
            title_line_height: 1.3,
            max_title_lines: 3,
            max_title_lines_compact: 4,
            max_description_lines: 4,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub theme: Theme,
    pub grid: GridConfig,
    pub routing: RoutingConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridConfigFile {
    cell_width: Option<f32>,
    cell_height: Option<f32>,
    node_width: Option<f32>,
    lane_header_width: Option<f32>,
    column_header_height: Option<f32>,
    node_padding: Option<f32>,
    compact_lane_height: Option<f32>,
    trailing_gutter: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutingConfigFile {
    exit_distance: Option<f32>,
    entry_distance: Option<f32>,
    channel_spacing: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    text_color: Option<String>,
    muted_text_color: Option<String>,
    line_color: Option<String>,
    preview_line_color: Option<String>,
    grid_line_color: Option<String>,
    header_background: Option<String>,
    cell_background: Option<String>,
    cell_background_alt: Option<String>,
    background: Option<String>,
    lane_palette: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    grid: Option<GridConfigFile>,
    routing: Option<RoutingConfigFile>,
    max_title_lines: Option<usize>,
    max_title_lines_compact: Option<usize>,
}

/// Loads a JSON (or JSON5) config file of optional overrides on top of the
/// defaults. `None` returns the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let Some(path) = path else {
        return Ok(config);
    };

    let contents = std::fs::read_to_string(path)?;
    let parsed: ConfigFile = json5::from_str(&contents)?;
    apply_config_file(&mut config, parsed);
    validate_grid(&config.grid)?;
    Ok(config)
}

fn apply_config_file(config: &mut Config, parsed: ConfigFile) {
    if let Some(theme_name) = parsed.theme.as_deref() {
        if theme_name == "slate" {
            config.theme = Theme::slate();
        } else if theme_name == "default" || theme_name == "base" {
            config.theme = Theme::default();
        }
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.text_color {
            config.theme.text_color = v;
        }
        if let Some(v) = vars.muted_text_color {
            config.theme.muted_text_color = v;
        }
        if let Some(v) = vars.line_color {
            config.theme.line_color = v;
        }
        if let Some(v) = vars.preview_line_color {
            config.theme.preview_line_color = v;
        }
        if let Some(v) = vars.grid_line_color {
            config.theme.grid_line_color = v;
        }
        if let Some(v) = vars.header_background {
            config.theme.header_background = v;
        }
        if let Some(v) = vars.cell_background {
            config.theme.cell_background = v;
        }
        if let Some(v) = vars.cell_background_alt {
            config.theme.cell_background_alt = v;
        }
        if let Some(v) = vars.background {
            config.render.background = v.clone();
            config.theme.background = v;
        }
        if let Some(v) = vars.lane_palette.filter(|palette| !palette.is_empty()) {
            config.theme.lane_palette = v;
        }
    }

    if let Some(grid) = parsed.grid {
        let target = &mut config.grid;
        if let Some(v) = grid.cell_width {
            target.cell_width = v;
        }
        if let Some(v) = grid.cell_height {
            target.cell_height = v;
        }
        if let Some(v) = grid.node_width {
            target.node_width = v;
        }
        if let Some(v) = grid.lane_header_width {
            target.lane_header_width = v;
        }
        if let Some(v) = grid.column_header_height {
            target.column_header_height = v;
        }
        if let Some(v) = grid.node_padding {
            target.node_padding = v;
        }
        if let Some(v) = grid.compact_lane_height {
            target.compact_lane_height = v;
        }
        if let Some(v) = grid.trailing_gutter {
            target.trailing_gutter = v;
        }
    }

    if let Some(routing) = parsed.routing {
        if let Some(v) = routing.exit_distance {
            config.routing.exit_distance = v;
        }
        if let Some(v) = routing.entry_distance {
            config.routing.entry_distance = v;
        }
        if let Some(v) = routing.channel_spacing {
            config.routing.channel_spacing = v;
        }
    }

    if let Some(v) = parsed.max_title_lines {
        config.render.max_title_lines = v.max(1);
    }
    if let Some(v) = parsed.max_title_lines_compact {
        config.render.max_title_lines_compact = v.max(1);
    }
}

fn validate_grid(grid: &GridConfig) -> anyhow::Result<()> {
    let dimensions = [
        grid.cell_width,
        grid.cell_height,
        grid.node_width,
        grid.lane_header_width,
        grid.column_header_height,
        grid.node_padding,
        grid.compact_lane_height,
        grid.trailing_gutter,
    ];
    if dimensions.iter().any(|value| !value.is_finite()) {
        anyhow::bail!("grid dimensions must be finite numbers");
    }
    if grid.cell_width <= 0.0 || grid.cell_height <= 0.0 {
        anyhow::bail!("grid cell dimensions must be positive");
    }
    if grid.node_width > grid.cell_width {
        anyhow::bail!(
            "node width {} exceeds cell width {}",
            grid.node_width,
            grid.cell_width
        );
    }
    if grid.node_padding * 2.0 >= grid.compact_lane_height.min(grid.cell_height) {
        anyhow::bail!("node padding leaves no room for a node card");
    }
    Ok(())
}
