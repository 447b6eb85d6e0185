//! Weight initialization functions.
//!
//! Layers draw from a caller-owned [`StdRng`] so a whole network is
//! reproducible from one seed.
//!
//! # References
//!
//! - He, K., et al. (2015). Delving deep into rectifiers: Surpassing human-level
//!   performance on `ImageNet` classification. ICCV.

use crate::primitives::Matrix;
use rand::rngs::StdRng;
use rand::Rng;

/// Default fully connected initialization.
///
/// Samples from U(-bound, bound) where bound = 1 / sqrt(`fan_in`). This is
/// Kaiming uniform with a = sqrt(5), the scheme used for both weights and
/// biases of a freshly constructed dense layer.
#[must_use]
pub fn linear_default(rows: usize, cols: usize, fan_in: usize, rng: &mut StdRng) -> Matrix<f32> {
    let bound = if fan_in == 0 {
        0.0
    } else {
        1.0 / (fan_in as f32).sqrt()
    };
    uniform(rows, cols, -bound, bound, rng)
}

/// Uniform distribution initialization.
///
/// Samples from U(low, high). A degenerate range yields `low` everywhere.
pub(crate) fn uniform(rows: usize, cols: usize, low: f32, high: f32, rng: &mut StdRng) -> Matrix<f32> {
    let data: Vec<f32> = (0..rows * cols)
        .map(|_| if high > low { rng.gen_range(low..high) } else { low })
        .collect();
    Matrix::from_vec(rows, cols, data).unwrap_or_else(|_| Matrix::zeros(rows, cols))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_linear_default_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let w = linear_default(40, 23, 23, &mut rng);
        let bound = 1.0 / 23.0_f32.sqrt();
        for &val in w.as_slice() {
            assert!(
                (-bound..=bound).contains(&val),
                "Value {val} out of bounds [-{bound}, {bound}]"
            );
        }
    }

    #[test]
    fn test_linear_default_reproducible() {
        let a = linear_default(10, 10, 10, &mut StdRng::seed_from_u64(7));
        let b = linear_default(10, 10, 10, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_fan_in_gives_zeros() {
        let mut rng = StdRng::seed_from_u64(1);
        let w = linear_default(2, 0, 0, &mut rng);
        assert_eq!(w.shape(), (2, 0));
    }
}
