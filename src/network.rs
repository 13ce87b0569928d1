//! Fully connected feed-forward networks.
//!
//! The trainable parameters of a [`Network`] are exposed as one flat vector
//! `$\vec\theta$` in a fixed canonical order: for every hidden layer its
//! weight matrix (row-major, `outputs × inputs`) followed by its bias vector,
//! then the output layer's weights and bias. For one hidden layer with scalar
//! input and output this is `$[\vec w_1, \vec b_1, \vec w_2, b_2]$`.
use core::str::FromStr;

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::tape::{Tape, Var};
use crate::{Error, Result};

/// Non-linearity applied after every hidden layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Activation {
    Tanh,
    Sigmoid,
    Relu,
    Identity,
}

impl Activation {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => 1. / (1. + (-x).exp()),
            Activation::Relu => x.max(0.),
            Activation::Identity => x,
        }
    }

    /// Derivative at `x`. For `Relu` the derivative at zero is taken as zero.
    pub fn derivative(self, x: f64) -> f64 {
        match self {
            Activation::Tanh => 1. - x.tanh().powi(2),
            Activation::Sigmoid => {
                let s = self.apply(x);
                s * (1. - s)
            }
            Activation::Relu => {
                if x > 0. {
                    1.
                } else {
                    0.
                }
            }
            Activation::Identity => 1.,
        }
    }
}

/// Weight initialization scheme.
///
/// Weights are drawn from a standard normal distribution and scaled by a
/// factor depending on the fan-in of the layer; biases start at zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Initialization {
    /// Scale `$\sqrt{2/\mathrm{fan\_in}}$`.
    He,
    /// Scale `$\sqrt{1/\mathrm{fan\_in}}$`.
    Xavier,
    /// Scale `0.01`.
    Random,
}

impl Initialization {
    pub fn scale(self, fan_in: usize) -> f64 {
        match self {
            Initialization::He => (2. / fan_in as f64).sqrt(),
            Initialization::Xavier => (1. / fan_in as f64).sqrt(),
            Initialization::Random => 0.01,
        }
    }
}

impl FromStr for Initialization {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "he" => Ok(Initialization::He),
            "xavier" => Ok(Initialization::Xavier),
            "random" => Ok(Initialization::Random),
            _ => Err(Error::UnknownInitialization(name.into())),
        }
    }
}

/// Shape of a network.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Architecture {
    pub input_dim: usize,
    pub hidden_layers: usize,
    /// Number of units in every hidden layer.
    pub width: usize,
    pub output_dim: usize,
    pub activation: Activation,
}

impl Architecture {
    pub fn new(
        input_dim: usize,
        hidden_layers: usize,
        width: usize,
        output_dim: usize,
        activation: Activation,
    ) -> Self {
        Self {
            input_dim,
            hidden_layers,
            width,
            output_dim,
            activation,
        }
    }

    /// `(outputs, inputs)` of every layer, output layer last.
    pub fn layer_shapes(&self) -> Vec<(usize, usize)> {
        let mut shapes = Vec::with_capacity(self.hidden_layers + 1);
        shapes.push((self.width, self.input_dim));
        shapes.extend((1..self.hidden_layers).map(|_| (self.width, self.width)));
        shapes.push((self.output_dim, self.width));
        shapes
    }

    pub fn parameter_count(&self) -> usize {
        self.layer_shapes()
            .iter()
            .map(|&(outputs, inputs)| outputs * (inputs + 1))
            .sum()
    }

    fn validate(&self) -> Result<()> {
        if self.input_dim == 0 {
            return Err(Error::InvalidArchitecture("input dimension is zero"));
        }
        if self.hidden_layers == 0 {
            return Err(Error::InvalidArchitecture("no hidden layer"));
        }
        if self.width == 0 {
            return Err(Error::InvalidArchitecture("hidden width is zero"));
        }
        if self.output_dim == 0 {
            return Err(Error::InvalidArchitecture("output dimension is zero"));
        }
        Ok(())
    }
}

/// Affine map `$\vec x \mapsto \mathbf{W}\vec x + \vec b$`.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub weights: DMatrix<f64>,
    pub biases: DVector<f64>,
}

impl Layer {
    pub fn zeros(outputs: usize, inputs: usize) -> Self {
        Self {
            weights: DMatrix::zeros(outputs, inputs),
            biases: DVector::zeros(outputs),
        }
    }

    pub fn inputs(&self) -> usize {
        self.weights.ncols()
    }

    pub fn outputs(&self) -> usize {
        self.weights.nrows()
    }

    fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}

/// Fully connected network with one shared hidden activation and a linear
/// output layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Network {
    hidden: Vec<Layer>,
    output: Layer,
    activation: Activation,
}

impl Network {
    /// A network with every parameter set to zero.
    pub fn zeros(architecture: Architecture) -> Result<Self> {
        architecture.validate()?;
        let mut shapes = architecture.layer_shapes();
        let (outputs, inputs) = shapes.pop().unwrap_or_default();
        Ok(Self {
            hidden: shapes
                .into_iter()
                .map(|(outputs, inputs)| Layer::zeros(outputs, inputs))
                .collect(),
            output: Layer::zeros(outputs, inputs),
            activation: architecture.activation,
        })
    }

    /// Draw the weights from `rng` according to `init`.
    ///
    /// The generator is passed in explicitly, so seeding it makes the
    /// initialization reproducible.
    pub fn initialized<R: Rng + ?Sized>(
        architecture: Architecture,
        init: Initialization,
        rng: &mut R,
    ) -> Result<Self> {
        let mut network = Self::zeros(architecture)?;
        for layer in network.layers_mut() {
            let scale = init.scale(layer.inputs());
            layer.weights = DMatrix::from_fn(layer.outputs(), layer.inputs(), |_, _| {
                let z: f64 = StandardNormal.sample(rng);
                z * scale
            });
        }
        Ok(network)
    }

    /// Build a network from a flat parameter vector in canonical order.
    pub fn from_parameters(architecture: Architecture, parameters: &[f64]) -> Result<Self> {
        let mut network = Self::zeros(architecture)?;
        network.set_parameters(parameters)?;
        Ok(network)
    }

    /// Assemble a network from explicit layers, checking that shapes chain.
    pub fn from_layers(hidden: Vec<Layer>, output: Layer, activation: Activation) -> Result<Self> {
        if hidden.is_empty() {
            return Err(Error::InvalidArchitecture("no hidden layer"));
        }
        let mut previous = hidden[0].inputs();
        for layer in hidden.iter().chain(Some(&output)) {
            if layer.inputs() != previous {
                return Err(Error::ShapeMismatch {
                    expected: previous,
                    actual: layer.inputs(),
                });
            }
            if layer.biases.len() != layer.outputs() {
                return Err(Error::ShapeMismatch {
                    expected: layer.outputs(),
                    actual: layer.biases.len(),
                });
            }
            previous = layer.outputs();
        }
        let width = hidden[0].outputs();
        if hidden.iter().any(|layer| layer.outputs() != width) {
            return Err(Error::InvalidArchitecture("hidden layers differ in width"));
        }
        Ok(Self {
            hidden,
            output,
            activation,
        })
    }

    pub fn architecture(&self) -> Architecture {
        Architecture {
            input_dim: self.input_dim(),
            hidden_layers: self.hidden.len(),
            width: self.width(),
            output_dim: self.output_dim(),
            activation: self.activation,
        }
    }

    pub fn input_dim(&self) -> usize {
        self.hidden[0].inputs()
    }

    /// Hidden width `$r$`.
    pub fn width(&self) -> usize {
        self.hidden[0].outputs()
    }

    pub fn output_dim(&self) -> usize {
        self.output.outputs()
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn hidden_layers(&self) -> &[Layer] {
        &self.hidden
    }

    pub fn output_layer(&self) -> &Layer {
        &self.output
    }

    /// All layers in canonical order, output layer last.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.hidden.iter().chain(core::iter::once(&self.output))
    }

    fn layers_mut(&mut self) -> impl Iterator<Item = &mut Layer> {
        self.hidden
            .iter_mut()
            .chain(core::iter::once(&mut self.output))
    }

    pub fn parameter_count(&self) -> usize {
        self.layers().map(Layer::parameter_count).sum()
    }

    /// Flatten all parameters into `$\vec\theta$`.
    pub fn parameters(&self) -> DVector<f64> {
        let mut theta = Vec::with_capacity(self.parameter_count());
        for layer in self.layers() {
            // nalgebra is column-major, the canonical order is row-major
            theta.extend(layer.weights.transpose().iter());
            theta.extend(layer.biases.iter());
        }
        DVector::from_vec(theta)
    }

    /// Overwrite all parameters from `$\vec\theta$`.
    ///
    /// Values are copied verbatim, so `set_parameters(&net.parameters())`
    /// leaves the network bit-for-bit unchanged.
    pub fn set_parameters(&mut self, theta: &[f64]) -> Result<()> {
        let expected = self.parameter_count();
        if theta.len() != expected {
            return Err(Error::ParameterCount {
                expected,
                actual: theta.len(),
            });
        }
        let mut offset = 0;
        for layer in self.layers_mut() {
            let (rows, cols) = layer.weights.shape();
            layer.weights =
                DMatrix::from_row_slice(rows, cols, &theta[offset..offset + rows * cols]);
            offset += rows * cols;
            layer.biases.copy_from_slice(&theta[offset..offset + rows]);
            offset += rows;
        }
        Ok(())
    }

    /// Evaluate the network at one input point.
    ///
    /// # Panics
    ///
    /// Panics if `x.len()` is not the input dimension.
    pub fn forward(&self, x: &[f64]) -> DVector<f64> {
        assert_eq!(x.len(), self.input_dim(), "input dimension mismatch");
        let mut activations = DVector::from_column_slice(x);
        for layer in &self.hidden {
            activations = (&layer.weights * activations + &layer.biases)
                .map(|z| self.activation.apply(z));
        }
        &self.output.weights * activations + &self.output.biases
    }

    /// Register `$\vec\theta$` on `tape` as independent variables in canonical order.
    pub fn record_parameters(&self, tape: &mut Tape) -> Vec<Var> {
        self.parameters()
            .iter()
            .map(|&value| tape.variable(value))
            .collect()
    }

    /// Record the forward pass at `x` on `tape`.
    ///
    /// `parameters` must come from [`record_parameters`](#method.record_parameters)
    /// on the same tape.
    pub fn forward_on_tape(&self, tape: &mut Tape, parameters: &[Var], x: &[f64]) -> Vec<Var> {
        debug_assert_eq!(parameters.len(), self.parameter_count());
        let mut activations: Vec<Var> = x.iter().map(|&value| tape.constant(value)).collect();
        let mut offset = 0;
        for (index, layer) in self.layers().enumerate() {
            let (rows, cols) = layer.weights.shape();
            let weights = &parameters[offset..offset + rows * cols];
            let biases = &parameters[offset + rows * cols..offset + rows * cols + rows];
            offset += rows * cols + rows;
            let is_output = index == self.hidden.len();
            let next: Vec<Var> = (0..rows)
                .map(|row| {
                    let row_weights = &weights[row * cols..(row + 1) * cols];
                    let z = tape.affine(row_weights, &activations, biases[row]);
                    if is_output {
                        z
                    } else {
                        tape.activate(z, self.activation)
                    }
                })
                .collect();
            activations = next;
        }
        activations
    }
}
