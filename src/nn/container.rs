//! Container modules for composing neural networks.

use super::module::{LayerSpec, Module, Parameter};
use crate::error::Result;
use crate::primitives::Matrix;

/// Sequential container for chaining modules.
///
/// Modules are executed in order, with each module's output
/// becoming the next module's input.
///
/// # Example
///
/// ```
/// use cohortml::nn::{Linear, Module, ReLU, Sequential};
/// use cohortml::primitives::Matrix;
/// use rand::SeedableRng;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(0);
/// let model = Sequential::new()
///     .add(Linear::with_rng(8, 4, &mut rng))
///     .add(ReLU::new())
///     .add(Linear::with_rng(4, 1, &mut rng));
///
/// let y = model.forward(&Matrix::zeros(16, 8)).expect("widths chain");
/// assert_eq!(y.shape(), (16, 1));
/// ```
pub struct Sequential {
    modules: Vec<Box<dyn Module>>,
    training: bool,
}

impl Sequential {
    /// Create an empty Sequential container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            training: true,
        }
    }

    /// Add a module to the sequence.
    ///
    /// Returns self for method chaining.
    #[allow(clippy::should_implement_trait)]
    #[must_use]
    pub fn add<M: Module + 'static>(mut self, module: M) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    /// Get the number of modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if the container is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Layer descriptions in execution order.
    #[must_use]
    pub fn specs(&self) -> Vec<LayerSpec> {
        self.modules.iter().map(|m| m.spec()).collect()
    }

    /// Run the forward pass keeping every intermediate input.
    ///
    /// Element `i` of the returned trace is the input to module `i`; the last
    /// element is the network output.
    fn forward_trace(&self, input: &Matrix<f32>) -> Result<Vec<Matrix<f32>>> {
        let mut trace = Vec::with_capacity(self.modules.len() + 1);
        trace.push(input.clone());
        for module in &self.modules {
            let next = match trace.last() {
                Some(x) => module.forward(x)?,
                None => input.clone(),
            };
            trace.push(next);
        }
        Ok(trace)
    }
}

impl Default for Sequential {
    fn default() -> Self {
        Self::new()
    }
}

impl Module for Sequential {
    fn forward(&self, input: &Matrix<f32>) -> Result<Matrix<f32>> {
        self.modules
            .iter()
            .try_fold(input.clone(), |x, module| module.forward(&x))
    }

    fn backward(&mut self, input: &Matrix<f32>, grad_output: &Matrix<f32>) -> Result<Matrix<f32>> {
        let trace = self.forward_trace(input)?;
        let mut grad = grad_output.clone();
        for (module, x) in self.modules.iter_mut().zip(&trace).rev() {
            grad = module.backward(x, &grad)?;
        }
        Ok(grad)
    }

    fn input_gradient(&self, input: &Matrix<f32>, grad_output: &Matrix<f32>) -> Result<Matrix<f32>> {
        let trace = self.forward_trace(input)?;
        let mut grad = grad_output.clone();
        for (module, x) in self.modules.iter().zip(&trace).rev() {
            grad = module.input_gradient(x, &grad)?;
        }
        Ok(grad)
    }

    fn spec(&self) -> LayerSpec {
        // A container has no single kind; report its output layer.
        self.modules.last().map_or(LayerSpec::Relu, |m| m.spec())
    }

    fn parameters(&self) -> Vec<&Parameter> {
        self.modules.iter().flat_map(|m| m.parameters()).collect()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        self.modules
            .iter_mut()
            .flat_map(|m| m.parameters_mut())
            .collect()
    }

    fn train(&mut self) {
        self.training = true;
        for module in &mut self.modules {
            module.train();
        }
    }

    fn eval(&mut self) {
        self.training = false;
        for module in &mut self.modules {
            module.eval();
        }
    }

    fn training(&self) -> bool {
        self.training
    }
}

impl std::fmt::Debug for Sequential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequential")
            .field("num_modules", &self.modules.len())
            .field("training", &self.training)
            .finish()
    }
}
