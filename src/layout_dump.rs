use crate::config::Config;
use crate::grid::{GridLayout, ViewOptions, compute_grid_layout, pinned_scroll_x};
use crate::model::RoadmapState;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Machine-readable snapshot of one rendered view, for tooling and tests.
#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub roadmap_id: String,
    pub title: String,
    pub view: ViewOptions,
    pub pinned_scroll_x: Option<f32>,
    pub layout: GridLayout,
    pub stored: Vec<StoredNodeDump>,
}

/// A node's stored position next to the cell it decodes to.
#[derive(Debug, Serialize)]
pub struct StoredNodeDump {
    pub id: String,
    pub position: [f32; 2],
    pub row: usize,
    pub col: usize,
}

impl LayoutDump {
    pub fn from_state(state: &RoadmapState, view: ViewOptions, config: &Config) -> Self {
        let stored = state
            .nodes
            .iter()
            .map(|node| {
                let cell = crate::grid::decode(&config.grid, node.position_x, node.position_y);
                StoredNodeDump {
                    id: node.id.clone(),
                    position: [node.position_x, node.position_y],
                    row: cell.row,
                    col: cell.col,
                }
            })
            .collect();
        LayoutDump {
            roadmap_id: state.roadmap.id.clone(),
            title: state.roadmap.title.clone(),
            view,
            pinned_scroll_x: pinned_scroll_x(state, config),
            layout: compute_grid_layout(state, view, config),
            stored,
        }
    }
}

pub fn write_layout_dump(
    output: Option<&Path>,
    state: &RoadmapState,
    view: ViewOptions,
    config: &Config,
) -> anyhow::Result<()> {
    let dump = LayoutDump::from_state(state, view, config);
    match output {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, &dump)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            serde_json::to_writer_pretty(&mut writer, &dump)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, NodeStatus, Roadmap};

    #[test]
    fn dump_reports_decoded_cells() {
        let mut state = RoadmapState::new(Roadmap {
            id: "r1".to_string(),
            title: "Platform".to_string(),
            description: None,
            pinned_column_id: None,
        });
        state.nodes.push(Node {
            id: "a".to_string(),
            roadmap_id: "r1".to_string(),
            title: "A".to_string(),
            description: None,
            status: NodeStatus::Planned,
            position_x: 614.0,
            position_y: 436.0,
        });
        let dump = LayoutDump::from_state(&state, ViewOptions::default(), &Config::default());
        assert_eq!(dump.stored[0].row, 1);
        assert_eq!(dump.stored[0].col, 1);
        // No lanes: nothing to draw the node in.
        assert!(dump.layout.nodes.is_empty());
        let json = serde_json::to_value(&dump).unwrap();
        assert_eq!(json["roadmap_id"], "r1");
        assert_eq!(json["view"]["compact"], false);
    }
}
