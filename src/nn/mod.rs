//! Neural network modules.
//!
//! The nn module is organized around the [`Module`] trait. Gradients are
//! propagated explicitly layer by layer: each module's `backward` takes the
//! input it saw in `forward` and the gradient of the loss with respect to its
//! output.
//!
//! - **Layers**: [`Linear`]
//! - **Activations**: [`ReLU`], [`Sigmoid`]
//! - **Containers**: [`Sequential`]
//! - **Losses**: [`BCEWithLogitsLoss`], [`MSELoss`]
//! - **Optimizers**: [`optim::Adam`]
//! - **Networks**: [`FeedForwardNet`]
//!
//! # Example
//!
//! ```
//! use cohortml::nn::{Criterion, FeedForwardNet, MSELoss};
//! use cohortml::nn::optim::{Adam, Optimizer};
//! use cohortml::primitives::Matrix;
//! use cohortml::traits::Model;
//!
//! let mut net = FeedForwardNet::new(2, 4, 1, 7);
//! let x = Matrix::from_vec(2, 2, vec![0.0, 1.0, 1.0, 0.0]).expect("2x2");
//! let y = [1.0, -1.0];
//! let mut adam = Adam::new(1e-2);
//!
//! net.zero_grad();
//! let out = net.forward(&x).expect("forward");
//! let grad = MSELoss.gradient(&out, &y).expect("gradient");
//! net.backward(&x, &grad).expect("backward");
//! adam.step(net.parameters_mut());
//! ```
//!
//! # References
//!
//! - Paszke, A., et al. (2019). `PyTorch`: An imperative style, high-performance
//!   deep learning library. `NeurIPS`.

mod activation;
mod container;
mod feedforward;
mod init;
mod linear;
pub mod loss;
mod module;
pub mod optim;

pub use activation::{sigmoid, ReLU, Sigmoid};
pub use container::Sequential;
pub use feedforward::{Architecture, FeedForwardNet};
pub use init::linear_default;
pub use linear::Linear;
pub use loss::{BCEWithLogitsLoss, Criterion, MSELoss};
pub use module::{LayerSpec, Module, Parameter};
