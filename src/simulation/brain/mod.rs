//! Feed-forward neural network used as a car's brain.
//!
//! The network is evolved rather than trained: it supports forward inference,
//! in-place mutation, crossover and lossless persistence of its parameters.

use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2, Ix1, Ix2};
use rand::Rng;
use thiserror::Error;

pub mod checkpoint;
pub mod dense;

pub use checkpoint::Checkpoint;
pub use dense::{Activation, Dense};

/// Errors raised by network construction and persistence.
#[derive(Debug, Error)]
pub enum BrainError {
    /// Parameters do not fit the network topology.
    #[error("shape mismatch for {key}: expected {expected:?}, found {actual:?}")]
    ShapeMismatch {
        /// Tensor or layer the mismatch was found in.
        key: String,
        /// Shape required by the receiving network.
        expected: Vec<usize>,
        /// Shape actually supplied.
        actual: Vec<usize>,
    },
    /// A layer has no entry in the checkpoint.
    #[error("checkpoint has no tensor named {0}")]
    MissingTensor(String),
    /// A network needs at least one layer.
    #[error("network must contain at least one layer")]
    EmptyNetwork,
    /// No persisted parameters exist at the given location.
    #[error("no saved network at {}", .0.display())]
    NotFound(PathBuf),
    /// Reading or writing the checkpoint failed.
    #[error("checkpoint i/o failed: {0}")]
    Io(#[from] std::io::Error),
    /// The checkpoint could not be encoded or decoded.
    #[error("checkpoint serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// An ordered stack of dense layers.
#[derive(Debug, Clone)]
pub struct NeuralNetwork {
    layers: Vec<Dense>,
}

impl NeuralNetwork {
    /// Creates a network with random parameters in `[-scale, scale]`.
    ///
    /// `layer_sizes` lists the width of every layer including the input, so
    /// `[32, 24, 5]` yields two dense layers.
    pub fn new_random<R: Rng>(
        layer_sizes: &[usize],
        activation: Activation,
        scale: f32,
        rng: &mut R,
    ) -> Result<Self, BrainError> {
        if layer_sizes.len() < 2 {
            return Err(BrainError::EmptyNetwork);
        }
        let layers = layer_sizes
            .windows(2)
            .map(|pair| Dense::new_random(pair[0], pair[1], activation, scale, rng))
            .collect();

        Ok(Self { layers })
    }

    /// Wraps explicit layers, checking that consecutive layers chain.
    pub fn from_layers(layers: Vec<Dense>) -> Result<Self, BrainError> {
        if layers.is_empty() {
            return Err(BrainError::EmptyNetwork);
        }
        for (index, pair) in layers.windows(2).enumerate() {
            if pair[0].output_size() != pair[1].input_size() {
                return Err(BrainError::ShapeMismatch {
                    key: format!("layer{}", index + 1),
                    expected: vec![pair[0].output_size()],
                    actual: vec![pair[1].input_size()],
                });
            }
        }
        Ok(Self { layers })
    }

    /// Builds a network directly from the tensors of a checkpoint.
    ///
    /// Layers are read in index order until no `layer{i}_weights` entry is
    /// left; every layer uses `activation`.
    pub fn from_checkpoint(
        checkpoint: &Checkpoint,
        activation: Activation,
    ) -> Result<Self, BrainError> {
        let mut layers = Vec::new();

        for index in 0.. {
            let weights_key = Checkpoint::weights_key(index);
            let Ok(weights) = checkpoint.get(&weights_key) else {
                break;
            };
            let weights = weights
                .clone()
                .into_dimensionality::<Ix2>()
                .map_err(|_| shape_mismatch(&weights_key, &[], weights.shape()))?;

            let biases_key = Checkpoint::biases_key(index);
            let biases = checkpoint.get(&biases_key)?;
            let biases = biases
                .clone()
                .into_dimensionality::<Ix1>()
                .map_err(|_| shape_mismatch(&biases_key, &[weights.nrows()], biases.shape()))?;

            let (rows, actual) = (weights.nrows(), biases.len());
            let layer = Dense::new(weights, biases, activation)
                .ok_or_else(|| shape_mismatch(&biases_key, &[rows], &[actual]))?;
            layers.push(layer);
        }

        Self::from_layers(layers)
    }

    /// Runs a forward pass through every layer.
    #[inline]
    pub fn forward(&mut self, inputs: &Array1<f32>) -> Array1<f32> {
        let mut output = inputs.clone();
        for layer in &mut self.layers {
            output = layer.forward(&output);
        }
        output
    }

    /// Perturbs every parameter with uniform noise from `[-rate, rate]`.
    pub fn mutate<R: Rng>(&mut self, rate: f32, rng: &mut R) {
        for layer in &mut self.layers {
            layer.mutate(rate, rng);
        }
    }

    /// Creates a new network by averaging this one with `other`.
    pub fn crossover(&self, other: &NeuralNetwork) -> Result<Self, BrainError> {
        if self.layers.len() != other.layers.len() {
            return Err(BrainError::ShapeMismatch {
                key: "layers".to_string(),
                expected: vec![self.layers.len()],
                actual: vec![other.layers.len()],
            });
        }

        let layers = self
            .layers
            .iter()
            .zip(&other.layers)
            .enumerate()
            .map(|(index, (mine, theirs))| {
                if mine.weights.dim() == theirs.weights.dim() {
                    Ok(Dense::average(mine, theirs))
                } else {
                    Err(BrainError::ShapeMismatch {
                        key: Checkpoint::weights_key(index),
                        expected: mine.weights.shape().to_vec(),
                        actual: theirs.weights.shape().to_vec(),
                    })
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { layers })
    }

    /// Snapshots every layer's parameters.
    pub fn to_checkpoint(&self) -> Checkpoint {
        let mut checkpoint = Checkpoint::default();
        for (index, layer) in self.layers.iter().enumerate() {
            checkpoint.insert(
                Checkpoint::weights_key(index),
                layer.weights.clone().into_dyn(),
            );
            checkpoint.insert(
                Checkpoint::biases_key(index),
                layer.biases.clone().into_dyn(),
            );
        }
        checkpoint
    }

    /// Overwrites all parameters from a checkpoint of identical topology.
    ///
    /// The network is left untouched when any tensor is missing or has the
    /// wrong shape.
    pub fn load_checkpoint(&mut self, checkpoint: &Checkpoint) -> Result<(), BrainError> {
        let mut restored = Vec::with_capacity(self.layers.len());

        for (index, layer) in self.layers.iter().enumerate() {
            let weights_key = Checkpoint::weights_key(index);
            let weights: Array2<f32> = checked_tensor(checkpoint, &weights_key, layer.weights.shape())?
                .into_dimensionality::<Ix2>()
                .map_err(|_| shape_mismatch(&weights_key, layer.weights.shape(), &[]))?;

            let biases_key = Checkpoint::biases_key(index);
            let biases: Array1<f32> = checked_tensor(checkpoint, &biases_key, layer.biases.shape())?
                .into_dimensionality::<Ix1>()
                .map_err(|_| shape_mismatch(&biases_key, layer.biases.shape(), &[]))?;

            restored.push((weights, biases));
        }

        let extra = Checkpoint::weights_key(self.layers.len());
        if checkpoint.get(&extra).is_ok() {
            return Err(BrainError::ShapeMismatch {
                key: "layers".to_string(),
                expected: vec![self.layers.len()],
                actual: vec![checkpoint.len() / 2],
            });
        }

        for (layer, (weights, biases)) in self.layers.iter_mut().zip(restored) {
            layer.weights = weights;
            layer.biases = biases;
        }
        Ok(())
    }

    /// Persists every layer's parameters to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), BrainError> {
        self.to_checkpoint().save_to_file(path)
    }

    /// Restores parameters previously written by [`NeuralNetwork::save`].
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), BrainError> {
        let checkpoint = Checkpoint::load_from_file(path)?;
        self.load_checkpoint(&checkpoint)
    }

    /// Layers from input to output.
    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    /// Width of every layer including the input.
    pub fn layer_sizes(&self) -> Vec<usize> {
        std::iter::once(self.input_size())
            .chain(self.layers.iter().map(Dense::output_size))
            .collect()
    }

    /// Number of inputs the network expects.
    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, Dense::input_size)
    }

    /// Number of outputs the network produces.
    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, Dense::output_size)
    }

    /// Total number of weights and biases.
    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|layer| layer.weights.len() + layer.biases.len())
            .sum()
    }

    /// Flattens all weights and biases into a single vector.
    pub fn to_flat_vector(&self) -> Vec<f32> {
        let mut flat = Vec::with_capacity(self.parameter_count());
        for layer in &self.layers {
            flat.extend(layer.weights.iter().copied());
            flat.extend(layer.biases.iter().copied());
        }
        flat
    }
}

fn checked_tensor(
    checkpoint: &Checkpoint,
    key: &str,
    expected: &[usize],
) -> Result<ndarray::ArrayD<f32>, BrainError> {
    let tensor = checkpoint.get(key)?;
    if tensor.shape() != expected {
        return Err(shape_mismatch(key, expected, tensor.shape()));
    }
    Ok(tensor.clone())
}

fn shape_mismatch(key: &str, expected: &[usize], actual: &[usize]) -> BrainError {
    BrainError::ShapeMismatch {
        key: key.to_string(),
        expected: expected.to_vec(),
        actual: actual.to_vec(),
    }
}
