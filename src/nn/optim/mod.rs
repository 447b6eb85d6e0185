//! Optimizers for neural network training.
//!
//! # Example
//!
//! ```
//! use cohortml::nn::optim::{Adam, Optimizer};
//! use cohortml::nn::Parameter;
//! use cohortml::primitives::Matrix;
//!
//! let mut p = Parameter::new("w", Matrix::filled(1, 2, 1.0));
//! let mut adam = Adam::new(0.01);
//! adam.step(vec![&mut p]);
//! assert_eq!(adam.lr(), 0.01);
//! ```
//!
//! # References
//!
//! - Kingma, D. P., & Ba, J. (2015). Adam: A method for stochastic optimization. ICLR.

use super::module::Parameter;

/// Common trait for all optimizers.
pub trait Optimizer: Send {
    /// Perform a single optimization step using the accumulated gradients.
    ///
    /// Parameters must be passed in the same order on every call.
    fn step(&mut self, params: Vec<&mut Parameter>);

    /// Get current learning rate.
    fn lr(&self) -> f32;
}

/// Adam optimizer (Kingma & Ba, 2015).
///
/// Update rule:
/// ```text
/// m_t = β₁ * m_{t-1} + (1 - β₁) * grad
/// v_t = β₂ * v_{t-1} + (1 - β₂) * grad²
/// m̂_t = m_t / (1 - β₁ᵗ)
/// v̂_t = v_t / (1 - β₂ᵗ)
/// param = param - lr * m̂_t / (√v̂_t + ε)
/// ```
#[derive(Debug, Clone)]
pub struct Adam {
    lr: f32,
    beta1: f32,
    beta2: f32,
    eps: f32,
    /// First moment estimates
    m: Vec<Vec<f32>>,
    /// Second moment estimates
    v: Vec<Vec<f32>>,
    /// Current timestep for bias correction
    pub(crate) t: usize,
}

impl Adam {
    /// Create a new Adam optimizer with default hyperparameters.
    ///
    /// Default: β₁=0.9, β₂=0.999, ε=1e-8
    #[must_use]
    pub fn new(lr: f32) -> Self {
        Self {
            lr,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            m: Vec::new(),
            v: Vec::new(),
            t: 0,
        }
    }

    fn update_param(&mut self, param: &mut Parameter, idx: usize) {
        if idx >= self.m.len() {
            self.m.resize(idx + 1, Vec::new());
            self.v.resize(idx + 1, Vec::new());
        }
        if self.m[idx].len() != param.numel() {
            self.m[idx] = vec![0.0; param.numel()];
            self.v[idx] = vec![0.0; param.numel()];
        }

        let m = &mut self.m[idx];
        let v = &mut self.v[idx];

        let bias_correction1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias_correction2 = 1.0 - self.beta2.powi(self.t as i32);

        let (data, grad) = param.data_and_grad_mut();
        for i in 0..data.len() {
            let g = grad[i];
            m[i] = self.beta1 * m[i] + (1.0 - self.beta1) * g;
            v[i] = self.beta2 * v[i] + (1.0 - self.beta2) * g * g;

            let m_hat = m[i] / bias_correction1;
            let v_hat = v[i] / bias_correction2;

            data[i] -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: Vec<&mut Parameter>) {
        self.t += 1;
        for (idx, param) in params.into_iter().enumerate() {
            self.update_param(param, idx);
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }
}

#[cfg(test)]
mod tests;
