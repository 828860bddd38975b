//! Compute module - kernels, transforms and the tick pipeline.

mod engine;
mod fft;
mod kernel;
mod neighbour;
mod spectrum;
mod update;

pub use engine::*;
pub use fft::*;
pub use kernel::*;
pub use neighbour::*;
pub use spectrum::*;
pub use update::*;
