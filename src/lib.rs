//! Myocard - excitable-media simulation of two-dimensional cardiac tissue.
//!
//! Cells on a dense lattice fire an action potential when the excitation
//! gathered from nearby firing neighbours exceeds a threshold, then sit out
//! a refractory period; pacemaker cells fire on their own. The neighbour
//! excitation is a weighted sum over a directional kernel, computed as one
//! FFT-based circular convolution per anisotropy orientation per tick, and
//! the per-cell transition runs as a vectorised, striped parallel update.
//!
//! # Architecture
//!
//! - `schema`: configuration, cell and grid types
//! - `compute`: kernels, transforms, neighbour counting, the update rule and
//!   the engine that strings them together
//! - `snapshot`: the binary grid format
//! - `runtime`: the simulation thread and the host control surface
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use myocard::{
//!     compute::{EditOp, Engine},
//!     runtime::Simulation,
//!     schema::{Grid, SimConfig},
//! };
//!
//! let config = SimConfig {
//!     width: 256,
//!     height: 256,
//!     ..Default::default()
//! };
//! let mut grid = Grid::uniform(config.width, config.height);
//! grid.seed_pacemaker_patch(128, 128, 2);
//!
//! let engine = Engine::new(grid, &config).expect("valid configuration");
//! let sim = Simulation::spawn(engine, Duration::from_millis(config.frame_time_ms));
//!
//! sim.edit_cell(10, 10, EditOp::Excite);
//! println!("{}", sim.cell_status(10, 10));
//! sim.shutdown();
//! ```
//!
//! The renderer reads the grid under the engine lock: a cell is visible when
//! `state > 0` and it is not refractory, with pacemakers in their own
//! colour. The engine makes no other rendering decisions.

pub mod compute;
pub mod runtime;
pub mod schema;
pub mod snapshot;

// Re-export commonly used types
pub use compute::{EditOp, Engine, EngineError, NeighbourCounter};
pub use runtime::Simulation;
pub use schema::{Cell, CellType, Grid, GridStats, Orientation, SimConfig};
