//! Fully connected layer.

use ndarray::{Array1, Array2};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Element-wise activation applied after the affine transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Hyperbolic tangent.
    #[default]
    Tanh,
    /// Logistic sigmoid.
    Sigmoid,
    /// Rectified linear unit.
    Relu,
}

impl Activation {
    /// Applies the activation to a single value.
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Relu => x.max(0.0),
        }
    }
}

/// A single dense layer of a [`super::NeuralNetwork`].
#[derive(Debug, Clone)]
pub struct Dense {
    /// Weight matrix (`output_size` × `input_size`).
    pub weights: Array2<f32>,
    /// Bias vector (`output_size`).
    pub biases: Array1<f32>,
    /// Activation applied to every output.
    pub activation: Activation,
    last_input: Option<Array1<f32>>,
    last_output: Option<Array1<f32>>,
}

impl Dense {
    /// Creates a layer from explicit parameters.
    ///
    /// Returns `None` when the bias length does not match the weight rows.
    pub fn new(weights: Array2<f32>, biases: Array1<f32>, activation: Activation) -> Option<Self> {
        (weights.nrows() == biases.len()).then_some(Self {
            weights,
            biases,
            activation,
            last_input: None,
            last_output: None,
        })
    }

    /// Creates a layer with weights and biases drawn from `[-scale, scale]`.
    pub fn new_random<R: Rng>(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        scale: f32,
        rng: &mut R,
    ) -> Self {
        let scale = scale.abs();
        Self {
            weights: Array2::from_shape_simple_fn((output_size, input_size), || {
                rng.random_range(-scale..=scale)
            }),
            biases: Array1::from_shape_simple_fn(output_size, || rng.random_range(-scale..=scale)),
            activation,
            last_input: None,
            last_output: None,
        }
    }

    /// Number of inputs the layer expects.
    pub fn input_size(&self) -> usize {
        self.weights.ncols()
    }

    /// Number of outputs the layer produces.
    pub fn output_size(&self) -> usize {
        self.weights.nrows()
    }

    /// Computes `activation(W·x + b)` and caches the input and output.
    #[inline]
    pub fn forward(&mut self, inputs: &Array1<f32>) -> Array1<f32> {
        let mut output = self.weights.dot(inputs);
        output += &self.biases;

        let activation = self.activation;
        output.mapv_inplace(|x| activation.apply(x));

        self.last_input = Some(inputs.clone());
        self.last_output = Some(output.clone());
        output
    }

    /// Input seen by the most recent [`Dense::forward`] call.
    pub fn last_input(&self) -> Option<&Array1<f32>> {
        self.last_input.as_ref()
    }

    /// Output produced by the most recent [`Dense::forward`] call.
    pub fn last_output(&self) -> Option<&Array1<f32>> {
        self.last_output.as_ref()
    }

    /// Adds uniform noise from `[-rate, rate]` to every weight and bias.
    pub fn mutate<R: Rng>(&mut self, rate: f32, rng: &mut R) {
        let rate = rate.abs();
        self.weights
            .mapv_inplace(|w| w + rng.random_range(-rate..=rate));
        self.biases
            .mapv_inplace(|b| b + rng.random_range(-rate..=rate));
    }

    /// Creates a new layer by averaging two parent layers of the same shape.
    pub(crate) fn average(parent1: &Dense, parent2: &Dense) -> Self {
        Self {
            weights: &parent1.weights * 0.5 + &parent2.weights * 0.5,
            biases: &parent1.biases * 0.5 + &parent2.biases * 0.5,
            activation: parent1.activation,
            last_input: None,
            last_output: None,
        }
    }
}
