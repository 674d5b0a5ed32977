#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod edit;
pub mod error;
pub mod grid;
pub mod interaction;
pub mod layout_dump;
pub mod model;
pub mod notepad;
pub mod render;
pub mod session;
pub mod store;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, load_config};
pub use error::{SessionError, StoreError, ValidationError};
pub use grid::{CellPos, GridLayout, LaneGeometry, Point, ViewOptions, compute_grid_layout};
pub use model::RoadmapState;
pub use session::RoadmapSession;
