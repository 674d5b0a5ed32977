use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use roadmap_grid::config::Config;
use roadmap_grid::grid::{CellPos, LaneGeometry, ViewOptions, compute_grid_layout, encode, route_dependencies};
use roadmap_grid::model::{Column, Dependency, Lane, Node, NodeStatus, Roadmap, RoadmapState};
use roadmap_grid::render::render_svg;
use std::hint::black_box;

fn dense_roadmap(lanes: usize, columns: usize, fan_in: usize) -> RoadmapState {
    let config = Config::default();
    let mut state = RoadmapState::new(Roadmap {
        id: "bench".to_string(),
        title: "Bench".to_string(),
        description: None,
        pinned_column_id: None,
    });
    for row in 0..lanes {
        state.lanes.push(Lane {
            id: format!("l{row}"),
            roadmap_id: "bench".to_string(),
            name: format!("Lane {row}"),
            color: "#3b82f6".to_string(),
            description: Some("Lane description".to_string()),
            expanded: row % 3 == 0,
            order_index: row as i64,
        });
    }
    for col in 0..columns {
        state.columns.push(Column {
            id: format!("c{col}"),
            roadmap_id: "bench".to_string(),
            name: (col % 3 == 0).then(|| format!("Q{}", col / 3 + 1)),
            order_index: col as i64,
        });
    }
    for row in 0..lanes {
        for col in 0..columns {
            let pos = encode(&config.grid, CellPos::new(row, col));
            state.nodes.push(Node {
                id: format!("n{row}_{col}"),
                roadmap_id: "bench".to_string(),
                title: format!("Milestone {row}.{col} with a longer title"),
                description: Some("Some words describing the work in this cell".to_string()),
                status: NodeStatus::InProgress,
                position_x: pos.x,
                position_y: pos.y,
            });
        }
    }
    let mut next = 0usize;
    for row in 0..lanes {
        for col in 1..columns {
            for k in 0..fan_in.min(col) {
                let from_row = (row + k) % lanes;
                state.dependencies.push(Dependency {
                    id: format!("d{next}"),
                    node_id: format!("n{row}_{col}"),
                    depends_on_node_id: format!("n{from_row}_{}", col - 1 - k),
                });
                next += 1;
            }
        }
    }
    state
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("grid_layout");
    let config = Config::default();
    for (lanes, columns) in [(3usize, 8usize), (10, 24), (30, 48)] {
        let state = dense_roadmap(lanes, columns, 1);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{lanes}x{columns}")),
            &state,
            |b, state| {
                b.iter(|| {
                    let layout = compute_grid_layout(black_box(state), ViewOptions::default(), &config);
                    black_box(layout.nodes.len());
                });
            },
        );
    }
    group.finish();
}

fn bench_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("dependency_routing");
    let config = Config::default();
    for fan_in in [1usize, 4, 8] {
        let state = dense_roadmap(10, 24, fan_in);
        let geometry = LaneGeometry::new(&config.grid, &state.lanes, ViewOptions::default());
        group.bench_with_input(BenchmarkId::new("fan_in", fan_in), &state, |b, state| {
            b.iter(|| {
                let edges = route_dependencies(
                    black_box(&state.nodes),
                    black_box(&state.dependencies),
                    &geometry,
                    &config.routing,
                );
                black_box(edges.len());
            });
        });
    }
    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_svg");
    let config = Config::default();
    for compact in [false, true] {
        let state = dense_roadmap(10, 24, 2);
        let layout = compute_grid_layout(&state, ViewOptions { compact }, &config);
        let name = if compact { "compact" } else { "normal" };
        group.bench_with_input(BenchmarkId::from_parameter(name), &layout, |b, layout| {
            b.iter(|| {
                let svg = render_svg(black_box(layout), &config);
                black_box(svg.len());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_layout, bench_routing, bench_render);
criterion_main!(benches);
