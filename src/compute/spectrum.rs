//! Frequency-domain spectrum products.
//!
//! The per-tick hot path multiplies the excitation spectrum by each kernel
//! spectrum in place. The vector path processes four double-precision bins
//! per iteration; the scalar path is the normative semantics and produces
//! identical results lane for lane.

use num_complex::Complex;

/// Elementwise complex multiply of `dst` by `kernel`, dividing by `norm`.
///
/// `norm` is `width * height`: the forward and inverse transforms are both
/// unnormalised, so folding the factor into this product returns the inverse
/// transform on the same numeric scale as a direct spatial convolution.
pub fn multiply_spectra(dst: &mut [Complex<f64>], kernel: &[Complex<f64>], norm: f64) {
    assert_eq!(dst.len(), kernel.len());

    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx") {
            // Safety: AVX support verified at runtime.
            unsafe { multiply_spectra_avx(dst, kernel, norm) };
            return;
        }
    }

    multiply_spectra_scalar(dst, kernel, norm);
}

/// Scalar reference implementation.
pub fn multiply_spectra_scalar(dst: &mut [Complex<f64>], kernel: &[Complex<f64>], norm: f64) {
    for (a, b) in dst.iter_mut().zip(kernel.iter()) {
        let re = (a.re * b.re - a.im * b.im) / norm;
        let im = (a.re * b.im + a.im * b.re) / norm;
        *a = Complex::new(re, im);
    }
}

/// AVX path: four complex products per iteration, remainder bins scalar.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx")]
unsafe fn multiply_spectra_avx(dst: &mut [Complex<f64>], kernel: &[Complex<f64>], norm: f64) {
    use std::arch::x86_64::{
        _mm256_add_pd, _mm256_div_pd, _mm256_mul_pd, _mm256_set1_pd, _mm256_set_pd,
        _mm256_storeu_pd, _mm256_sub_pd,
    };

    let norm_factor = _mm256_set1_pd(norm);
    let full = dst.len() - dst.len() % 4;
    let mut re_out = [0.0f64; 4];
    let mut im_out = [0.0f64; 4];

    for i in (0..full).step_by(4) {
        let a_re = _mm256_set_pd(dst[i + 3].re, dst[i + 2].re, dst[i + 1].re, dst[i].re);
        let a_im = _mm256_set_pd(dst[i + 3].im, dst[i + 2].im, dst[i + 1].im, dst[i].im);
        let b_re = _mm256_set_pd(
            kernel[i + 3].re,
            kernel[i + 2].re,
            kernel[i + 1].re,
            kernel[i].re,
        );
        let b_im = _mm256_set_pd(
            kernel[i + 3].im,
            kernel[i + 2].im,
            kernel[i + 1].im,
            kernel[i].im,
        );

        let re = _mm256_sub_pd(_mm256_mul_pd(a_re, b_re), _mm256_mul_pd(a_im, b_im));
        let im = _mm256_add_pd(_mm256_mul_pd(a_re, b_im), _mm256_mul_pd(a_im, b_re));
        let re = _mm256_div_pd(re, norm_factor);
        let im = _mm256_div_pd(im, norm_factor);

        _mm256_storeu_pd(re_out.as_mut_ptr(), re);
        _mm256_storeu_pd(im_out.as_mut_ptr(), im);
        for j in 0..4 {
            dst[i + j] = Complex::new(re_out[j], im_out[j]);
        }
    }

    multiply_spectra_scalar(&mut dst[full..], &kernel[full..], norm);
}
