//! Packed 2D real-to-complex FFT on cached rustfft plans.
//!
//! The excitation field and the coupling kernels are real-valued, so only the
//! non-redundant half of the row spectrum is kept: a `width x height` real
//! buffer transforms into `(width/2 + 1) x height` complex bins. Rows are
//! transformed first and truncated, then the packed columns; the inverse
//! rebuilds full rows through Hermitian symmetry.

use std::sync::Arc;

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};

/// Cached forward/inverse plans for one grid geometry.
///
/// Plans are expensive to create and are reused for the lifetime of the
/// value. Neither direction normalises; a forward/inverse round trip scales
/// by `width * height`, which the caller compensates for in the frequency
/// domain.
pub struct SpectralPlan {
    width: usize,
    height: usize,
    /// Complex bins kept per row: `width / 2 + 1`.
    spectrum_width: usize,
    fft_row: Arc<dyn Fft<f64>>,
    fft_col: Arc<dyn Fft<f64>>,
    ifft_row: Arc<dyn Fft<f64>>,
    ifft_col: Arc<dyn Fft<f64>>,
}

impl SpectralPlan {
    /// Plan transforms for the given grid dimensions.
    pub fn new(width: usize, height: usize) -> Self {
        assert!(width > 0 && height > 0, "transform dimensions must be non-zero");
        let mut planner = FftPlanner::new();
        let fft_row = planner.plan_fft_forward(width);
        let fft_col = planner.plan_fft_forward(height);
        let ifft_row = planner.plan_fft_inverse(width);
        let ifft_col = planner.plan_fft_inverse(height);

        Self {
            width,
            height,
            spectrum_width: width / 2 + 1,
            fft_row,
            fft_col,
            ifft_row,
            ifft_col,
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

    /// Number of complex bins in a packed spectrum.
    #[inline]
    pub fn spectrum_len(&self) -> usize {
        self.spectrum_width * self.height
    }

    /// Forward transform of a real buffer into a packed spectrum.
    pub fn forward(&self, input: &[f64], spectrum: &mut [Complex<f64>]) {
        assert_eq!(input.len(), self.width * self.height);
        assert_eq!(spectrum.len(), self.spectrum_len());

        let sw = self.spectrum_width;

        // Row transforms, truncated to the non-redundant bins.
        let mut row_buffer = vec![Complex::new(0.0, 0.0); self.width];
        for y in 0..self.height {
            for (x, slot) in row_buffer.iter_mut().enumerate() {
                *slot = Complex::new(input[y * self.width + x], 0.0);
            }
            self.fft_row.process(&mut row_buffer);
            spectrum[y * sw..(y + 1) * sw].copy_from_slice(&row_buffer[..sw]);
        }

        // Column transforms over the packed columns.
        let mut col_buffer = vec![Complex::new(0.0, 0.0); self.height];
        for x in 0..sw {
            for y in 0..self.height {
                col_buffer[y] = spectrum[y * sw + x];
            }
            self.fft_col.process(&mut col_buffer);
            for y in 0..self.height {
                spectrum[y * sw + x] = col_buffer[y];
            }
        }
    }

    /// Inverse transform of a packed spectrum into a real buffer.
    ///
    /// The spectrum is consumed as scratch, matching the in-place multiply
    /// that precedes it in the convolution pipeline.
    pub fn inverse(&self, spectrum: &mut [Complex<f64>], output: &mut [f64]) {
        assert_eq!(spectrum.len(), self.spectrum_len());
        assert_eq!(output.len(), self.width * self.height);

        let sw = self.spectrum_width;

        // Column inverse transforms.
        let mut col_buffer = vec![Complex::new(0.0, 0.0); self.height];
        for x in 0..sw {
            for y in 0..self.height {
                col_buffer[y] = spectrum[y * sw + x];
            }
            self.ifft_col.process(&mut col_buffer);
            for y in 0..self.height {
                spectrum[y * sw + x] = col_buffer[y];
            }
        }

        // Row inverse transforms: rebuild the redundant bins from the kept
        // half (row spectra of real signals are Hermitian), then transform.
        let mut row_buffer = vec![Complex::new(0.0, 0.0); self.width];
        for y in 0..self.height {
            row_buffer[..sw].copy_from_slice(&spectrum[y * sw..(y + 1) * sw]);
            for x in sw..self.width {
                row_buffer[x] = spectrum[y * sw + (self.width - x)].conj();
            }
            self.ifft_row.process(&mut row_buffer);
            for x in 0..self.width {
                output[y * self.width + x] = row_buffer[x].re;
            }
        }
    }
}
