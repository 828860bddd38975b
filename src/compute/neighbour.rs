//! FFT-based neighbour-excitation counting.
//!
//! One circular convolution per anisotropy orientation per tick: the shared
//! excitation field is transformed once per orientation into a scratch
//! spectrum, multiplied in place by the orientation's precomputed kernel
//! spectrum, inverted, and the per-orientation results gathered into one
//! interleaved cell-major table for the update kernel.

use num_complex::Complex;
use rayon::prelude::*;

use crate::schema::{Grid, Orientation};

use super::{multiply_spectra, DirectionalKernel, EngineError, SpectralPlan};

/// Per-orientation convolution state for one grid geometry.
///
/// Owns the kernel spectra (computed once per (re)initialisation), the
/// per-orientation scratch spectra and output buffers, and the shared FFT
/// plans. Buffer allocation and plan creation happen at construction; the
/// per-tick path allocates nothing beyond the plans' internal scratch.
pub struct NeighbourCounter {
    width: usize,
    height: usize,
    search_radius: usize,
    num_orientations: usize,
    plan: SpectralPlan,
    /// Frequency-domain kernels, one per orientation.
    kernel_spectra: Vec<Vec<Complex<f64>>>,
    /// Scratch spectra of the excitation field, one per orientation so the
    /// convolutions can run in parallel.
    state_spectra: Vec<Vec<Complex<f64>>>,
    /// Inverse-transform output per orientation.
    per_orientation: Vec<Vec<f64>>,
    /// Interleaved result: `[cell * num_orientations + orientation]`.
    neighbour_table: Vec<f64>,
}

impl NeighbourCounter {
    /// Build kernels and plans for a grid.
    ///
    /// Fails when the kernel radius is odd, zero, or does not fit the grid
    /// on its torus; those are startup errors with no recovery path.
    pub fn new(grid: &Grid, search_radius: usize) -> Result<Self, EngineError> {
        Self::check_geometry(grid, search_radius)?;

        let width = grid.width();
        let height = grid.height();
        let mut counter = Self {
            width,
            height,
            search_radius,
            num_orientations: 0,
            plan: SpectralPlan::new(width, height),
            kernel_spectra: Vec::new(),
            state_spectra: Vec::new(),
            per_orientation: Vec::new(),
            neighbour_table: Vec::new(),
        };
        counter.allocate(grid.num_orientations());
        counter.build_kernels(&grid.orientations);
        Ok(counter)
    }

    /// Validate the radius-versus-grid preconditions without allocating.
    pub fn check_geometry(grid: &Grid, search_radius: usize) -> Result<(), EngineError> {
        if search_radius == 0 || search_radius % 2 != 0 {
            return Err(EngineError::InvalidSearchRadius(search_radius));
        }
        if search_radius > grid.width().min(grid.height()) {
            return Err(EngineError::KernelTooLarge {
                radius: search_radius,
                width: grid.width(),
                height: grid.height(),
            });
        }
        if grid.num_orientations() == 0 {
            return Err(EngineError::NoOrientations);
        }
        Ok(())
    }

    fn allocate(&mut self, num_orientations: usize) {
        self.num_orientations = num_orientations;
        let spectrum_len = self.plan.spectrum_len();
        let grid_len = self.width * self.height;

        self.kernel_spectra =
            vec![vec![Complex::new(0.0, 0.0); spectrum_len]; num_orientations];
        self.state_spectra =
            vec![vec![Complex::new(0.0, 0.0); spectrum_len]; num_orientations];
        self.per_orientation = vec![vec![0.0f64; grid_len]; num_orientations];
        self.neighbour_table = vec![0.0f64; grid_len * num_orientations];
    }

    /// Recompute every kernel spectrum from the orientation table.
    fn build_kernels(&mut self, orientations: &[Orientation]) {
        let mut padded = vec![0.0f64; self.width * self.height];
        for (orientation, spectrum) in orientations.iter().zip(self.kernel_spectra.iter_mut()) {
            let kernel = DirectionalKernel::build(orientation, self.search_radius);
            kernel.shift_into(self.width, self.height, &mut padded);
            self.plan.forward(&padded, spectrum);
        }
    }

    /// Rebind to a reloaded grid.
    ///
    /// Re-plans when the dimensions changed, reallocates the per-orientation
    /// buffers when the orientation count changed, and always rebuilds the
    /// kernels from the current orientation table.
    pub fn reinitialize(&mut self, grid: &Grid) -> Result<(), EngineError> {
        Self::check_geometry(grid, self.search_radius)?;

        if grid.width() != self.width || grid.height() != self.height {
            self.width = grid.width();
            self.height = grid.height();
            self.plan = SpectralPlan::new(self.width, self.height);
            self.allocate(grid.num_orientations());
        } else if grid.num_orientations() != self.num_orientations {
            self.allocate(grid.num_orientations());
        }
        self.build_kernels(&grid.orientations);
        Ok(())
    }

    /// One convolution pass per orientation, gathered into the interleaved
    /// table. Called once per tick with the current excitation field.
    pub fn accumulate(&mut self, state_array: &[f64]) {
        assert_eq!(state_array.len(), self.width * self.height);

        let plan = &self.plan;
        let norm = (self.width * self.height) as f64;

        self.state_spectra
            .par_iter_mut()
            .zip(self.kernel_spectra.par_iter())
            .zip(self.per_orientation.par_iter_mut())
            .for_each(|((spectrum, kernel), output)| {
                plan.forward(state_array, spectrum);
                multiply_spectra(spectrum, kernel, norm);
                plan.inverse(spectrum, output);
            });

        let n = self.num_orientations;
        for (o, output) in self.per_orientation.iter().enumerate() {
            for (i, value) in output.iter().enumerate() {
                self.neighbour_table[i * n + o] = *value;
            }
        }
    }

    /// The interleaved neighbour table from the last `accumulate` call.
    #[inline]
    pub fn neighbour_table(&self) -> &[f64] {
        &self.neighbour_table
    }

    /// Raw per-orientation convolution output, mostly for inspection.
    #[inline]
    pub fn orientation_output(&self, orientation: usize) -> &[f64] {
        &self.per_orientation[orientation]
    }

    #[inline]
    pub fn num_orientations(&self) -> usize {
        self.num_orientations
    }

    #[inline]
    pub fn search_radius(&self) -> usize {
        self.search_radius
    }
}
