//! Storage port for the champion network.
//!
//! The population writes the best brain seen so far through a
//! [`ChampionStore`] and reads it back when a new generation is spawned. Only
//! the most recent write is kept.

use std::path::{Path, PathBuf};

use super::brain::{BrainError, Checkpoint};

/// Read/write access to the persisted champion parameters.
pub trait ChampionStore {
    /// Replaces the stored champion.
    fn store(&mut self, checkpoint: &Checkpoint) -> Result<(), BrainError>;

    /// Returns the most recently stored champion.
    ///
    /// Fails with [`BrainError::NotFound`] when nothing has been stored yet.
    fn fetch(&self) -> Result<Checkpoint, BrainError>;
}

/// Champion kept as a JSON file on disk.
#[derive(Debug, Clone)]
pub struct FileChampionStore {
    path: PathBuf,
}

impl FileChampionStore {
    /// Creates a store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the champion file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChampionStore for FileChampionStore {
    fn store(&mut self, checkpoint: &Checkpoint) -> Result<(), BrainError> {
        checkpoint.save_to_file(&self.path)
    }

    fn fetch(&self) -> Result<Checkpoint, BrainError> {
        Checkpoint::load_from_file(&self.path)
    }
}

/// Champion kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryChampionStore {
    champion: Option<Checkpoint>,
    writes: usize,
}

impl MemoryChampionStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds a champion.
    pub fn with_champion(checkpoint: Checkpoint) -> Self {
        Self {
            champion: Some(checkpoint),
            writes: 0,
        }
    }

    /// Number of times a champion has been written.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl ChampionStore for MemoryChampionStore {
    fn store(&mut self, checkpoint: &Checkpoint) -> Result<(), BrainError> {
        self.champion = Some(checkpoint.clone());
        self.writes += 1;
        Ok(())
    }

    fn fetch(&self) -> Result<Checkpoint, BrainError> {
        self.champion
            .clone()
            .ok_or_else(|| BrainError::NotFound(PathBuf::from("<memory>")))
    }
}
