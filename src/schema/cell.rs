//! Cell-level types for the tissue lattice.

use serde::{Deserialize, Serialize};

/// Kind of heart cell occupying a lattice site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum CellType {
    /// Auto-oscillating cell that restarts its action potential on expiry.
    Pacemaker = 0,
    /// Ordinary tissue; excitable when its state counter is zero.
    Tissue = 1,
    /// Tissue in its refractory period; cannot fire and emits no excitation.
    RestingTissue = 2,
}

impl CellType {
    /// Decode the on-disk representation.
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(CellType::Pacemaker),
            1 => Some(CellType::Tissue),
            2 => Some(CellType::RestingTissue),
            _ => None,
        }
    }

    /// Human-readable name used by the host status line.
    pub fn display_name(self) -> &'static str {
        match self {
            CellType::Pacemaker => "Pacemaker Cell",
            CellType::Tissue => "Normal Cell",
            CellType::RestingTissue => "Resting Cell",
        }
    }
}

/// A single lattice site.
///
/// `state` counts remaining action-potential ticks for Pacemaker/Tissue cells
/// and remaining refractory ticks for RestingTissue cells; zero means the
/// countdown has expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub cell_type: CellType,
    pub state: u32,
    /// Index into the grid's orientation table.
    pub orientation: u32,
}

impl Cell {
    /// Quiescent tissue cell pointing at orientation 0.
    pub fn quiescent() -> Self {
        Self {
            cell_type: CellType::Tissue,
            state: 0,
            orientation: 0,
        }
    }

    /// True when the cell emits excitation proportional to its state.
    #[inline]
    pub fn emits_excitation(&self) -> bool {
        matches!(self.cell_type, CellType::Pacemaker | CellType::Tissue)
    }

    /// The cell's contribution to the excitation field this tick.
    #[inline]
    pub fn emitted_excitation(&self) -> f64 {
        if self.emits_excitation() {
            self.state as f64
        } else {
            0.0
        }
    }
}

/// Anisotropy direction shared by a set of cells.
///
/// The direction components need not form a unit vector; the kernel builder
/// normalises by the vector magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub x_dir: f32,
    pub y_dir: f32,
    /// Number of cells pointing at this orientation. Bookkeeping only; the
    /// engine core never reads it, but the on-disk format carries it.
    pub cell_count: u32,
}

impl Orientation {
    pub fn new(x_dir: f32, y_dir: f32) -> Self {
        Self {
            x_dir,
            y_dir,
            cell_count: 0,
        }
    }
}
