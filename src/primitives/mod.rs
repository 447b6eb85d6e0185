//! Core compute primitives (Vector, Matrix).
//!
//! These types provide the foundation for all ML algorithms.
//! Row-major and `f32`-first, matching what the training loop needs.

mod matrix;
mod vector;

pub use matrix::Matrix;
pub use vector::Vector;
