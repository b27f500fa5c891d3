//! Keyed parameter snapshot of a network.
//!
//! Every layer contributes two named arrays, `layer{i}_weights` and
//! `layer{i}_biases`. The arrays carry their own shape so a snapshot can be
//! checked against the topology it is loaded into.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use super::BrainError;

/// Named numeric arrays describing every layer of a network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    tensors: BTreeMap<String, ArrayD<f32>>,
}

impl Checkpoint {
    /// Key of the weight matrix of layer `index`.
    pub fn weights_key(index: usize) -> String {
        format!("layer{index}_weights")
    }

    /// Key of the bias vector of layer `index`.
    pub fn biases_key(index: usize) -> String {
        format!("layer{index}_biases")
    }

    /// Stores an array under `key`, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, tensor: ArrayD<f32>) {
        self.tensors.insert(key.into(), tensor);
    }

    /// Returns the array stored under `key`.
    pub fn get(&self, key: &str) -> Result<&ArrayD<f32>, BrainError> {
        self.tensors
            .get(key)
            .ok_or_else(|| BrainError::MissingTensor(key.to_string()))
    }

    /// Iterates over all stored arrays in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArrayD<f32>)> {
        self.tensors.iter().map(|(key, tensor)| (key.as_str(), tensor))
    }

    /// Number of stored arrays.
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    /// Returns `true` when nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Writes the checkpoint as JSON, creating parent directories as needed.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), BrainError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reads a checkpoint written by [`Checkpoint::save_to_file`].
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, BrainError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => BrainError::NotFound(path.to_path_buf()),
            _ => BrainError::Io(e),
        })?;
        Ok(serde_json::from_str(&json)?)
    }
}
