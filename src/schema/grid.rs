//! The tissue lattice: a dense row-major grid of cells plus the orientation
//! table they index into.

use super::{Cell, CellType, Orientation};

/// Dense rectangular lattice of cells.
///
/// Cells are stored in one contiguous row-major buffer indexed as
/// `row * width + col`. Dimensions are fixed for the lifetime of a grid;
/// a reload replaces the whole value.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    width: usize,
    height: usize,
    pub cells: Vec<Cell>,
    pub orientations: Vec<Orientation>,
}

impl Grid {
    /// Build a quiescent grid: all tissue, state zero, one orientation.
    pub fn uniform(width: usize, height: usize) -> Self {
        Self::with_orientations(width, height, vec![Orientation::new(1.0, 0.0)])
    }

    /// Build a quiescent grid with a caller-supplied orientation table.
    /// All cells point at orientation 0.
    pub fn with_orientations(
        width: usize,
        height: usize,
        mut orientations: Vec<Orientation>,
    ) -> Self {
        assert!(width > 0 && height > 0, "grid dimensions must be non-zero");
        assert!(!orientations.is_empty(), "at least one orientation required");
        for o in orientations.iter_mut() {
            o.cell_count = 0;
        }
        orientations[0].cell_count = (width * height) as u32;
        Self {
            width,
            height,
            cells: vec![Cell::quiescent(); width * height],
            orientations,
        }
    }

    /// Assemble a grid from deserialised parts. Buffer lengths must match
    /// the dimensions; cell contents are the caller's to validate.
    pub fn from_parts(
        width: usize,
        height: usize,
        cells: Vec<Cell>,
        orientations: Vec<Orientation>,
    ) -> Self {
        assert_eq!(cells.len(), width * height);
        assert!(!orientations.is_empty());
        Self {
            width,
            height,
            cells,
            orientations,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn num_orientations(&self) -> usize {
        self.orientations.len()
    }

    /// Flat index of the cell at `(x, y)`.
    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y * self.width + x
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> &Cell {
        &self.cells[self.index(x, y)]
    }

    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize) -> &mut Cell {
        let idx = self.index(x, y);
        &mut self.cells[idx]
    }

    /// Stamp a square pacemaker patch centred on `(cx, cy)` with the given
    /// half-width. Cells in the patch start at state 0 and fire on the next
    /// tick. Coordinates outside the grid are skipped.
    pub fn seed_pacemaker_patch(&mut self, cx: usize, cy: usize, half_width: usize) {
        let x0 = cx.saturating_sub(half_width);
        let y0 = cy.saturating_sub(half_width);
        let x1 = (cx + half_width).min(self.width - 1);
        let y1 = (cy + half_width).min(self.height - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let cell = self.get_mut(x, y);
                cell.cell_type = CellType::Pacemaker;
                cell.state = 0;
            }
        }
    }

    /// Recount how many cells point at each orientation. The counts are
    /// derived data; this is run after deserialisation rather than trusting
    /// the stored values.
    pub fn rebuild_orientation_counts(&mut self) {
        for o in self.orientations.iter_mut() {
            o.cell_count = 0;
        }
        for cell in &self.cells {
            self.orientations[cell.orientation as usize].cell_count += 1;
        }
    }

    /// Check the global invariants: buffer sizes match the dimensions and
    /// every cell's orientation index is in range.
    pub fn check_invariants(&self) -> bool {
        if self.cells.len() != self.width * self.height || self.orientations.is_empty() {
            return false;
        }
        self.cells
            .iter()
            .all(|c| (c.orientation as usize) < self.orientations.len())
    }
}

/// Aggregate census of a grid, for the CLI and the host status display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GridStats {
    pub pacemaker: usize,
    pub tissue: usize,
    pub resting: usize,
    /// Cells with a non-zero state counter.
    pub active: usize,
}

impl GridStats {
    pub fn from_grid(grid: &Grid) -> Self {
        let mut stats = Self::default();
        for cell in &grid.cells {
            match cell.cell_type {
                CellType::Pacemaker => stats.pacemaker += 1,
                CellType::Tissue => stats.tissue += 1,
                CellType::RestingTissue => stats.resting += 1,
            }
            if cell.state != 0 {
                stats.active += 1;
            }
        }
        stats
    }
}
