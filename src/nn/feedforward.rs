//! Fixed-topology feed-forward network used by the pipeline.
//!
//! `in → [Linear → ReLU] × hidden_layers → Linear(1)`.

use super::container::Sequential;
use super::linear::Linear;
use super::activation::ReLU;
use super::module::{LayerSpec, Module, Parameter};
use crate::error::{PipelineError, Result};
use crate::primitives::Matrix;
use crate::traits::Model;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Shape of a [`FeedForwardNet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Architecture {
    /// Input width
    pub n_features: usize,
    /// Width of every hidden layer
    pub hidden_size: usize,
    /// Number of hidden `Linear → ReLU` blocks
    pub hidden_layers: usize,
}

impl Architecture {
    /// Widths of each linear layer as `(in, out)` pairs.
    #[must_use]
    pub fn linear_shapes(&self) -> Vec<(usize, usize)> {
        let mut shapes = Vec::with_capacity(self.hidden_layers + 1);
        let mut width = self.n_features;
        for _ in 0..self.hidden_layers {
            shapes.push((width, self.hidden_size));
            width = self.hidden_size;
        }
        shapes.push((width, 1));
        shapes
    }
}

/// Multi-layer perceptron with a single output unit.
///
/// # Example
///
/// ```
/// use cohortml::nn::FeedForwardNet;
/// use cohortml::primitives::Matrix;
/// use cohortml::traits::Model;
///
/// let net = FeedForwardNet::new(23, 40, 3, 1534);
/// let out = net.forward(&Matrix::zeros(5, 23)).expect("23 features");
/// assert_eq!(out.shape(), (5, 1));
/// ```
#[derive(Debug)]
pub struct FeedForwardNet {
    architecture: Architecture,
    layers: Sequential,
}

impl FeedForwardNet {
    /// Build a freshly initialised network. Same seed, same weights.
    #[must_use]
    pub fn new(n_features: usize, hidden_size: usize, hidden_layers: usize, seed: u64) -> Self {
        let architecture = Architecture {
            n_features,
            hidden_size,
            hidden_layers,
        };
        let mut rng = StdRng::seed_from_u64(seed);
        let linears = architecture
            .linear_shapes()
            .into_iter()
            .map(|(i, o)| Linear::with_rng(i, o, &mut rng))
            .collect();
        Self::assemble(architecture, linears)
    }

    /// Rebuild a network from stored `(weight, bias)` pairs.
    ///
    /// # Errors
    ///
    /// Returns `Format` if the number or shape of the tensors does not match
    /// `architecture`.
    pub fn from_weights(
        architecture: Architecture,
        weights: Vec<(Matrix<f32>, Matrix<f32>)>,
    ) -> Result<Self> {
        let shapes = architecture.linear_shapes();
        if shapes.len() != weights.len() {
            return Err(PipelineError::Format {
                message: format!(
                    "expected {} linear layers, found {}",
                    shapes.len(),
                    weights.len()
                ),
            });
        }
        let mut linears = Vec::with_capacity(weights.len());
        for (idx, ((fan_in, fan_out), (w, b))) in shapes.into_iter().zip(weights).enumerate() {
            if w.shape() != (fan_out, fan_in) {
                return Err(PipelineError::Format {
                    message: format!(
                        "layer {idx} weight is {}x{}, expected {fan_out}x{fan_in}",
                        w.n_rows(),
                        w.n_cols()
                    ),
                });
            }
            linears.push(Linear::from_parts(w, b)?);
        }
        Ok(Self::assemble(architecture, linears))
    }

    fn assemble(architecture: Architecture, linears: Vec<Linear>) -> Self {
        let n = linears.len();
        let mut layers = Sequential::new();
        for (idx, linear) in linears.into_iter().enumerate() {
            layers = layers.add(linear);
            if idx + 1 < n {
                layers = layers.add(ReLU::new());
            }
        }
        let mut net = Self {
            architecture,
            layers,
        };
        // Parameter names follow the layer position: layers.{i}.weight / layers.{i}.bias
        let specs = net.layers.specs();
        let linear_positions: Vec<usize> = specs
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, LayerSpec::Linear { .. }))
            .map(|(i, _)| i)
            .collect();
        for (k, p) in net.layers.parameters_mut().into_iter().enumerate() {
            let pos = linear_positions.get(k / 2).copied().unwrap_or(k / 2);
            let suffix = if k % 2 == 0 { "weight" } else { "bias" };
            p.rename(format!("layers.{pos}.{suffix}"));
        }
        net
    }

    /// Network shape.
    #[must_use]
    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    /// `(weight, bias)` of every linear layer in order.
    #[must_use]
    pub fn linear_weights(&self) -> Vec<(&Matrix<f32>, &Matrix<f32>)> {
        self.layers
            .parameters()
            .chunks_exact(2)
            .map(|pair| (pair[0].value(), pair[1].value()))
            .collect()
    }
}

impl Model for FeedForwardNet {
    fn train(&mut self) {
        self.layers.train();
    }

    fn eval(&mut self) {
        self.layers.eval();
    }

    fn is_training(&self) -> bool {
        self.layers.training()
    }

    fn n_features(&self) -> usize {
        self.architecture.n_features
    }

    fn forward(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        self.layers.forward(x)
    }

    fn backward(&mut self, x: &Matrix<f32>, grad_output: &Matrix<f32>) -> Result<()> {
        self.layers.backward(x, grad_output).map(|_| ())
    }

    fn input_gradient(&self, x: &Matrix<f32>, grad_output: &Matrix<f32>) -> Result<Matrix<f32>> {
        self.layers.input_gradient(x, grad_output)
    }

    fn parameters(&self) -> Vec<&Parameter> {
        self.layers.parameters()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        self.layers.parameters_mut()
    }

    fn layers(&self) -> Vec<LayerSpec> {
        self.layers.specs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_topology() {
        let net = FeedForwardNet::new(23, 40, 3, 0);
        let specs = net.layers();
        assert_eq!(specs.len(), 7);
        assert_eq!(
            specs[0],
            LayerSpec::Linear {
                in_features: 23,
                out_features: 40
            }
        );
        assert_eq!(specs[1], LayerSpec::Relu);
        assert_eq!(
            specs[6],
            LayerSpec::Linear {
                in_features: 40,
                out_features: 1
            }
        );
    }

    #[test]
    fn test_parameter_names() {
        let net = FeedForwardNet::new(4, 3, 2, 0);
        let names: Vec<&str> = net.parameters().iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec![
                "layers.0.weight",
                "layers.0.bias",
                "layers.2.weight",
                "layers.2.bias",
                "layers.4.weight",
                "layers.4.bias"
            ]
        );
    }

    #[test]
    fn test_same_seed_same_weights() {
        let a = FeedForwardNet::new(5, 8, 3, 99);
        let b = FeedForwardNet::new(5, 8, 3, 99);
        let c = FeedForwardNet::new(5, 8, 3, 100);
        let values = |n: &FeedForwardNet| -> Vec<f32> {
            n.parameters()
                .iter()
                .flat_map(|p| p.value().as_slice().to_vec())
                .collect()
        };
        assert_eq!(values(&a), values(&b));
        assert_ne!(values(&a), values(&c));
    }

    #[test]
    fn test_from_weights_round_trip() {
        let net = FeedForwardNet::new(3, 4, 2, 5);
        let weights = net
            .linear_weights()
            .into_iter()
            .map(|(w, b)| (w.clone(), b.clone()))
            .collect();
        let rebuilt = FeedForwardNet::from_weights(net.architecture(), weights).expect("shapes match");
        let x = Matrix::filled(2, 3, 0.25);
        assert_eq!(
            net.forward(&x).expect("forward"),
            rebuilt.forward(&x).expect("forward")
        );
    }

    #[test]
    fn test_from_weights_rejects_wrong_count() {
        let arch = Architecture {
            n_features: 3,
            hidden_size: 4,
            hidden_layers: 2,
        };
        assert!(matches!(
            FeedForwardNet::from_weights(arch, Vec::new()),
            Err(PipelineError::Format { .. })
        ));
    }

    #[test]
    fn test_eval_mode_toggle() {
        let mut net = FeedForwardNet::new(2, 2, 1, 0);
        net.eval();
        assert!(!net.is_training());
        net.train();
        assert!(net.is_training());
    }
}
