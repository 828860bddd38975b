//! Schema module - Configuration and lattice data types.

mod cell;
mod config;
mod grid;

pub use cell::*;
pub use config::*;
pub use grid::*;
