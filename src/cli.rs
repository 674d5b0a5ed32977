use crate::config::{Config, load_config};
use crate::grid::{ViewOptions, compute_grid_layout, snap};
use crate::layout_dump::write_layout_dump;
use crate::model::RoadmapState;
use crate::render::{render_svg, write_output_png, write_output_svg};
use crate::session::RoadmapSession;
use crate::store::{MemoryStore, RecordKind};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rmgrid", version, about = "Render roadmap grids with routed dependency arrows")]
pub struct Args {
    /// Roadmap snapshot (JSON) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for SVG and JSON if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON/JSON5 file (grid, routing and theme overrides)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Render lanes at the compact height
    #[arg(long)]
    pub compact: bool,

    /// Expand a lane for this render (repeatable)
    #[arg(long = "expand", value_name = "LANE_ID")]
    pub expand: Vec<String>,

    /// Print the stored position a drop at X,Y snaps to, then exit
    #[arg(long = "snap", value_name = "X,Y", value_parser = parse_point)]
    pub snap: Option<(f32, f32)>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
    Json,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing();
    let config = load_config(args.config.as_deref())?;

    if let Some((x, y)) = args.snap {
        let snapped = snap(&config.grid, x, y);
        println!("{} {}", snapped.x, snapped.y);
        return Ok(());
    }

    let input = read_input(args.input.as_deref())?;
    let snapshot: RoadmapState =
        serde_json::from_str(&input).context("input is not a roadmap snapshot")?;
    let mut state = open_snapshot(snapshot, config.clone())?;
    apply_expansion(&mut state, &args.expand);
    let view = ViewOptions {
        compact: args.compact,
    };

    match args.output_format {
        OutputFormat::Json => write_layout_dump(args.output.as_deref(), &state, view, &config)?,
        OutputFormat::Svg => {
            let svg = render_svg(&compute_grid_layout(&state, view, &config), &config);
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Png => {
            let output = ensure_output(args.output.as_deref(), "png")?;
            let svg = render_svg(&compute_grid_layout(&state, view, &config), &config);
            write_output_png(&svg, &output, &config.render, &config.theme)?;
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Loads a snapshot through an in-memory store so it is decoded and seeded
/// exactly like a stored roadmap.
fn open_snapshot(snapshot: RoadmapState, config: Config) -> Result<RoadmapState> {
    let roadmap_id = snapshot.roadmap.id.clone();
    let store = MemoryStore::new()
        .with_record(RecordKind::Roadmap, &snapshot.roadmap)?
        .with_rows(RecordKind::Lane, encode_all(RecordKind::Lane, &snapshot.lanes)?)
        .with_rows(RecordKind::Column, encode_all(RecordKind::Column, &snapshot.columns)?)
        .with_rows(RecordKind::Node, encode_all(RecordKind::Node, &snapshot.nodes)?)
        .with_rows(
            RecordKind::Dependency,
            encode_all(RecordKind::Dependency, &snapshot.dependencies)?,
        )
        .with_rows(RecordKind::Note, encode_all(RecordKind::Note, &snapshot.notes)?)
        .with_rows(
            RecordKind::Attachment,
            encode_all(RecordKind::Attachment, &snapshot.attachments)?,
        );

    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    let session = runtime.block_on(RoadmapSession::open(
        Arc::new(store),
        &roadmap_id,
        Arc::new(config),
    ))?;
    Ok(session.state().clone())
}

fn encode_all<T: serde::Serialize>(kind: RecordKind, records: &[T]) -> Result<Vec<serde_json::Value>> {
    records
        .iter()
        .map(|record| crate::store::encode_row(kind, record).map_err(anyhow::Error::from))
        .collect()
}

fn apply_expansion(state: &mut RoadmapState, expand: &[String]) {
    for id in expand {
        match state.lanes.iter_mut().find(|lane| &lane.id == id) {
            Some(lane) => lane.expanded = true,
            None => tracing::warn!(lane = %id, "--expand names an unknown lane"),
        }
    }
}

fn parse_point(value: &str) -> Result<(f32, f32), String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got {value:?}"))?;
    let x: f32 = x.trim().parse().map_err(|_| format!("invalid x coordinate {x:?}"))?;
    let y: f32 = y.trim().parse().map_err(|_| format!("invalid y coordinate {y:?}"))?;
    Ok((x, y))
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()));
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn ensure_output(output: Option<&Path>, ext: &str) -> Result<PathBuf> {
    output
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow::anyhow!("Output path required for {} output", ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Lane, Roadmap};

    #[test]
    fn parses_snap_points() {
        assert_eq!(parse_point("600,500"), Ok((600.0, 500.0)));
        assert_eq!(parse_point(" 1.5 , 2 "), Ok((1.5, 2.0)));
        assert!(parse_point("600").is_err());
        assert!(parse_point("a,b").is_err());
    }

    #[test]
    fn args_accept_repeated_expand() {
        let args = Args::try_parse_from([
            "rmgrid", "-i", "-", "-e", "json", "--compact", "--expand", "l1", "--expand", "l2",
        ])
        .unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
        assert!(args.compact);
        assert_eq!(args.expand, vec!["l1".to_string(), "l2".to_string()]);
        assert_eq!(args.input.as_deref(), Some(Path::new("-")));
    }

    #[test]
    fn snapshot_without_lanes_is_seeded() {
        let snapshot = RoadmapState::new(Roadmap {
            id: "r1".to_string(),
            title: "Platform".to_string(),
            description: None,
            pinned_column_id: None,
        });
        let state = open_snapshot(snapshot, Config::default()).unwrap();
        assert_eq!(state.lanes.len(), 3);
        assert_eq!(state.columns.len(), 8);
    }

    #[test]
    fn expansion_override_marks_lanes() {
        let mut state = RoadmapState::new(Roadmap {
            id: "r1".to_string(),
            title: "Platform".to_string(),
            description: None,
            pinned_column_id: None,
        });
        state.lanes.push(Lane {
            id: "l1".to_string(),
            roadmap_id: "r1".to_string(),
            name: "Core".to_string(),
            color: "#3b82f6".to_string(),
            description: None,
            expanded: false,
            order_index: 0,
        });
        apply_expansion(&mut state, &["l1".to_string(), "missing".to_string()]);
        assert!(state.lanes[0].expanded);
    }
}
