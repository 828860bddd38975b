//! Tick orchestration and the host-facing edit operations.

use std::path::Path;
use std::time::Instant;

use log::{debug, info, warn};

use crate::schema::{Cell, CellType, ConfigError, Grid, GridStats, SimConfig};
use crate::snapshot::{self, SnapshotError};

use super::{advance_cells, NeighbourCounter, UpdateParams};

/// Fatal construction and reload errors.
///
/// Precondition and resource failures have no retry path: they mean the
/// configured problem size is infeasible. Snapshot failures are reported to
/// the host and leave the running grid untouched.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Search radius must be a non-zero even integer, got {0}")]
    InvalidSearchRadius(usize),
    #[error("Search radius {radius} does not fit a {width}x{height} grid")]
    KernelTooLarge {
        radius: usize,
        width: usize,
        height: usize,
    },
    #[error("Grid carries no orientations")]
    NoOrientations,
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Host edit operations on cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    /// Start an action potential on a non-refractory cell, mirrored into the
    /// excitation field.
    Excite,
    /// Zero the state counter of a non-refractory cell.
    Quench,
    /// Flip a cell between plain tissue and refractory tissue. Pacemakers
    /// are left alone.
    ToggleResting,
}

/// The simulation engine: one grid, its excitation field, and the neighbour
/// counter bound to them.
///
/// The engine holds no process-wide state; the host decides how it is
/// shared (see the runtime module for the reference arrangement).
pub struct Engine {
    grid: Grid,
    /// Excitation emitted by each cell, feeding the next tick's
    /// convolutions. Written by the update kernel and by edits.
    state_array: Vec<f64>,
    counter: NeighbourCounter,
    params: UpdateParams,
    stripes: usize,
    ticks: u64,
}

impl Engine {
    /// Build an engine around an existing grid. The configuration supplies
    /// the kernel radius, rule constants and stripe count; the grid supplies
    /// its own dimensions.
    pub fn new(grid: Grid, config: &SimConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let counter = NeighbourCounter::new(&grid, config.search_radius)?;
        let state_array = initial_state_array(&grid);

        info!(
            "engine ready: {}x{} cells, {} orientation(s), kernel radius {}",
            grid.width(),
            grid.height(),
            grid.num_orientations(),
            config.search_radius,
        );

        Ok(Self {
            grid,
            state_array,
            counter,
            params: UpdateParams::from(config),
            stripes: config.update_stripes,
            ticks: 0,
        })
    }

    /// Advance the simulation one tick: neighbour counts first, then the
    /// striped cell update, which also writes the next excitation field.
    pub fn tick(&mut self) {
        let started = Instant::now();

        self.counter.accumulate(&self.state_array);
        advance_cells(
            &mut self.grid.cells,
            &mut self.state_array,
            self.counter.neighbour_table(),
            self.counter.num_orientations(),
            &self.params,
            self.stripes,
        );

        self.ticks += 1;
        debug!("tick {} computed in {:?}", self.ticks, started.elapsed());
    }

    #[inline]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[inline]
    pub fn state_array(&self) -> &[f64] {
        &self.state_array
    }

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn stats(&self) -> GridStats {
        GridStats::from_grid(&self.grid)
    }

    /// Status line for a selected cell, in the form the host displays:
    /// `"Cell type: <name>  Cell state: <n>"`.
    pub fn cell_status(&self, x: usize, y: usize) -> String {
        let cell = self.grid.get(x, y);
        format!(
            "Cell type: {}  Cell state: {}",
            cell.cell_type.display_name(),
            cell.state
        )
    }

    /// Apply an edit to a single cell. Out-of-range coordinates are logged
    /// and ignored; the host is expected to validate before calling.
    pub fn edit_cell(&mut self, x: usize, y: usize, op: EditOp) {
        if x >= self.grid.width() || y >= self.grid.height() {
            warn!("edit at ({}, {}) outside the grid, ignored", x, y);
            return;
        }
        let idx = self.grid.index(x, y);
        apply_edit(
            &mut self.grid.cells[idx],
            &mut self.state_array[idx],
            op,
            self.params.ap_duration,
        );
    }

    /// Apply an edit to every cell in the axis-aligned rectangle spanned by
    /// the two corners (inclusive, any corner order, clamped to the grid).
    pub fn edit_rect(&mut self, x0: usize, y0: usize, x1: usize, y1: usize, op: EditOp) {
        let (x_lo, x_hi) = (x0.min(x1), x0.max(x1).min(self.grid.width() - 1));
        let (y_lo, y_hi) = (y0.min(y1), y0.max(y1).min(self.grid.height() - 1));
        for y in y_lo..=y_hi {
            for x in x_lo..=x_hi {
                let idx = self.grid.index(x, y);
                apply_edit(
                    &mut self.grid.cells[idx],
                    &mut self.state_array[idx],
                    op,
                    self.params.ap_duration,
                );
            }
        }
    }

    /// Defibrillate: restart the action potential of every non-refractory
    /// cell. The excitation slots are zeroed, not mirrored; a shocked cell
    /// radiates only as its counter runs down, like a normally fired one.
    pub fn shock_all(&mut self) {
        for (cell, slot) in self.grid.cells.iter_mut().zip(self.state_array.iter_mut()) {
            if cell.cell_type != CellType::RestingTissue {
                cell.state = self.params.ap_duration;
                *slot = 0.0;
            }
        }
        info!("shock applied to all non-refractory cells");
    }

    /// Write the grid to a snapshot file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SnapshotError> {
        snapshot::save(&self.grid, path)
    }

    /// Replace the grid from a snapshot file. All-or-nothing: on any error
    /// the running grid is left untouched.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<(), EngineError> {
        let grid = snapshot::load(path)?;
        self.replace_grid(grid)
    }

    /// Swap in a new grid and rebind the neighbour counter to it.
    pub fn replace_grid(&mut self, grid: Grid) -> Result<(), EngineError> {
        // Geometry is checked before anything is replaced so a failure
        // leaves the engine on the old grid.
        NeighbourCounter::check_geometry(&grid, self.counter.search_radius())?;
        self.grid = grid;
        self.counter.reinitialize(&self.grid)?;
        self.state_array = initial_state_array(&self.grid);
        info!(
            "grid replaced: {}x{}, {} orientation(s)",
            self.grid.width(),
            self.grid.height(),
            self.grid.num_orientations()
        );
        Ok(())
    }
}

fn initial_state_array(grid: &Grid) -> Vec<f64> {
    grid.cells.iter().map(|c| c.emitted_excitation()).collect()
}

fn apply_edit(cell: &mut Cell, slot: &mut f64, op: EditOp, ap_duration: u32) {
    match op {
        EditOp::Excite => {
            if cell.cell_type != CellType::RestingTissue {
                cell.state = ap_duration;
                *slot = ap_duration as f64;
            }
        }
        EditOp::Quench => {
            if cell.cell_type != CellType::RestingTissue {
                cell.state = 0;
                *slot = 0.0;
            }
        }
        EditOp::ToggleResting => match cell.cell_type {
            CellType::Tissue => {
                cell.cell_type = CellType::RestingTissue;
                *slot = 0.0;
            }
            CellType::RestingTissue => {
                cell.cell_type = CellType::Tissue;
                *slot = cell.state as f64;
            }
            CellType::Pacemaker => {}
        },
    }
}
