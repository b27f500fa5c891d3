//! # Neurodrive - Neuroevolution Racing
//!
//! A population of cars learns to drive around a track. Every car is steered
//! by a small feed-forward neural network; networks are evolved, not trained,
//! by cloning and mutating the fittest car of all generations so far.
//!
//! ## Features
//!
//! - Ray-cast distance sensors against a binary collision mask
//! - Neural network brains (dense layers with tanh activation)
//! - Simple car physics with throttle, friction and speed-dependent steering
//! - Path-length fitness with stall and collision culling
//! - Elitist generational loop with a pluggable champion store
//! - Parallel per-tick car updates
//!
//! ## Core Modules
//!
//! - [`simulation::track`] - Collision surface
//! - [`simulation::brain`] - Neural network implementation
//! - [`simulation::car`] - Car sensing, decisions and physics
//! - [`simulation::population`] - Generational loop
//! - [`simulation::persistence`] - Champion storage

/// Core simulation logic and data structures.
pub mod simulation {
    /// Neural network implementation for car brains.
    pub mod brain;
    /// Car state, sensors, controls and physics.
    pub mod car;
    /// Geometric utility functions for the car body and movement.
    pub mod geometric_utils;
    /// Simulation parameters.
    pub mod params;
    /// Champion storage port and its file/memory implementations.
    pub mod persistence;
    /// Population of cars and the generational loop.
    pub mod population;
    /// Binary collision surface the cars drive on.
    pub mod track;
}

pub use simulation::brain::{Activation, BrainError, Checkpoint, NeuralNetwork};
pub use simulation::car::{Car, Controls, Longitudinal, StartPose, Steering};
pub use simulation::params::{Params, ParamsError};
pub use simulation::persistence::{ChampionStore, FileChampionStore, MemoryChampionStore};
pub use simulation::population::{
    GenerationState, Population, PopulationError, PopulationSummary, StepReport,
};
pub use simulation::track::{Track, TrackError};
