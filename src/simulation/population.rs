//! Generational loop: per-tick updates, culling, champion selection and
//! respawning.
//!
//! A generation lasts until every car has crashed or stalled. The brain of
//! the fittest car seen so far is written to a [`ChampionStore`]; the next
//! generation is built from mutated copies of it plus one unmutated elite.

use std::sync::Arc;

use log::{debug, info, warn};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::brain::{BrainError, Checkpoint, NeuralNetwork};
use super::car::{Car, StartPose};
use super::params::{Params, ParamsError};
use super::persistence::ChampionStore;
use super::track::Track;

/// Errors raised by the generational loop.
#[derive(Debug, Error)]
pub enum PopulationError {
    /// The parameters are not usable.
    #[error(transparent)]
    Params(#[from] ParamsError),
    /// Building, storing or restoring a brain failed.
    #[error(transparent)]
    Brain(#[from] BrainError),
    /// A generation ended without any champion having been stored.
    #[error("no champion stored when spawning generation {generation}")]
    MissingChampion {
        /// Generation that was being spawned.
        generation: u32,
        /// Why the store could not provide a champion.
        #[source]
        source: BrainError,
    },
}

/// Phase of the current generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationState {
    /// At least one car is still driving.
    Active,
    /// Every car has been removed.
    Done,
}

/// What happened during a single [`Population::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StepReport {
    /// Cars removed this tick.
    pub removed: usize,
    /// Whether the champion was overwritten this tick.
    pub champion_updated: bool,
    /// Whether the tick ended the generation and spawned the next one.
    pub advanced: bool,
}

/// Read-only snapshot of the population for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationSummary {
    /// Current generation, starting at 1.
    pub generation: u32,
    /// Cars still driving.
    pub alive: usize,
    /// Cars spawned per generation.
    pub population_size: usize,
    /// Best fitness seen in any generation.
    pub best_fitness: f32,
    /// Best fitness seen in the current generation.
    pub best_current_fitness: f32,
    /// Best fitness of every finished generation, oldest first.
    pub history: Vec<f32>,
}

/// The set of cars of the current generation and the evolution bookkeeping.
pub struct Population {
    params: Params,
    track: Arc<Track>,
    start: StartPose,
    cars: Vec<Car>,
    generation: u32,
    best_fitness: f32,
    best_current_fitness: f32,
    history: Vec<f32>,
    store: Box<dyn ChampionStore>,
    rng: Xoshiro256PlusPlus,
}

impl Population {
    /// Creates generation 1.
    ///
    /// Cars get random brains unless `params.resume_from_champion` is set and
    /// the store already holds a champion.
    pub fn new(
        params: Params,
        track: Arc<Track>,
        start: StartPose,
        store: Box<dyn ChampionStore>,
    ) -> Result<Self, PopulationError> {
        params.validate()?;

        let rng = match params.seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_rng(&mut rand::rng()),
        };

        let mut population = Self {
            params,
            track,
            start,
            cars: Vec::new(),
            generation: 1,
            best_fitness: f32::NEG_INFINITY,
            best_current_fitness: f32::NEG_INFINITY,
            history: Vec::new(),
            store,
            rng,
        };

        population.cars = if population.params.resume_from_champion {
            match population.store.fetch() {
                Ok(checkpoint) => {
                    info!("Resuming from stored champion");
                    population.spawn_from_champion(&checkpoint)?
                }
                Err(BrainError::NotFound(path)) => {
                    warn!(
                        "No champion at {}, starting from random brains",
                        path.display()
                    );
                    population.spawn_random()?
                }
                Err(e) => return Err(e.into()),
            }
        } else {
            population.spawn_random()?
        };

        Ok(population)
    }

    /// Advances every live car by `dt` and runs the selection policy.
    ///
    /// When the last car is removed the generation's best fitness is appended
    /// to the history and the next generation is spawned.
    ///
    /// A failed champion write is reported only after failed cars have been
    /// removed; `best_fitness` then keeps the last value that was persisted.
    pub fn step(&mut self, dt: f32) -> Result<StepReport, PopulationError> {
        let params = &self.params;

        // cars only touch their own state and the shared track
        self.cars
            .par_iter_mut()
            .for_each(|car| car.update(params, dt));

        let mut report = StepReport::default();
        let mut candidate: Option<(usize, f32)> = None;

        for index in 0..self.cars.len() {
            let fitness = self.cars[index].fitness;
            if fitness > self.best_current_fitness {
                self.best_current_fitness = fitness;
                if fitness > self.best_fitness {
                    candidate = Some((index, fitness));
                }
            }
            let leading = fitness >= self.best_current_fitness;
            self.cars[index].set_leading(leading);
        }

        // snapshot before culling, the candidate may crash this tick
        let champion = candidate
            .map(|(index, fitness)| (self.cars[index].brain.to_checkpoint(), fitness));

        let before = self.cars.len();
        let survivors: Vec<Car> = std::mem::take(&mut self.cars)
            .into_iter()
            .filter(|car| !car.has_failed(&self.params))
            .collect();
        self.cars = survivors;
        report.removed = before - self.cars.len();

        if let Some((checkpoint, fitness)) = champion {
            self.store.store(&checkpoint)?;
            self.best_fitness = fitness;
            report.champion_updated = true;
            debug!(
                "New champion in generation {} with fitness {:.2}",
                self.generation, fitness
            );
        }

        if self.cars.is_empty() {
            self.advance_generation()?;
            report.advanced = true;
        }

        Ok(report)
    }

    /// Ends the current generation and spawns the next one.
    ///
    /// Any cars still driving are discarded. The next generation consists of
    /// `population_size - 1` mutated copies of the stored champion followed by
    /// one unmutated copy.
    pub fn advance_generation(&mut self) -> Result<(), PopulationError> {
        let next_generation = self.generation + 1;
        let checkpoint = self.store.fetch().map_err(|e| match e {
            BrainError::NotFound(_) => PopulationError::MissingChampion {
                generation: next_generation,
                source: e,
            },
            other => PopulationError::Brain(other),
        })?;
        let cars = self.spawn_from_champion(&checkpoint)?;

        self.history.push(self.best_current_fitness);
        info!(
            "Generation {} finished: best {:.2}, best ever {:.2}",
            self.generation, self.best_current_fitness, self.best_fitness
        );

        self.cars = cars;
        self.generation = next_generation;
        self.best_current_fitness = f32::NEG_INFINITY;

        Ok(())
    }

    fn spawn_random(&mut self) -> Result<Vec<Car>, PopulationError> {
        (0..self.params.population_size)
            .map(|_| {
                let brain = NeuralNetwork::new_random(
                    &self.params.layer_sizes,
                    self.params.activation,
                    self.params.init_scale,
                    &mut self.rng,
                )?;
                Ok(Car::new(Arc::clone(&self.track), &self.start, brain))
            })
            .collect()
    }

    fn spawn_from_champion(&mut self, checkpoint: &Checkpoint) -> Result<Vec<Car>, PopulationError> {
        let champion = NeuralNetwork::from_checkpoint(checkpoint, self.params.activation)?;
        let layer_sizes = champion.layer_sizes();
        if layer_sizes != self.params.layer_sizes {
            return Err(BrainError::ShapeMismatch {
                key: "layers".to_string(),
                expected: self.params.layer_sizes.clone(),
                actual: layer_sizes,
            }
            .into());
        }

        let mut cars = Vec::with_capacity(self.params.population_size);
        for _ in 1..self.params.population_size {
            let mut brain = champion.clone();
            brain.mutate(self.params.mutation_rate, &mut self.rng);
            cars.push(Car::new(Arc::clone(&self.track), &self.start, brain));
        }
        cars.push(Car::new(Arc::clone(&self.track), &self.start, champion));

        Ok(cars)
    }

    /// Phase of the current generation.
    pub fn state(&self) -> GenerationState {
        if self.cars.is_empty() {
            GenerationState::Done
        } else {
            GenerationState::Active
        }
    }

    /// Cars still driving in the current generation.
    pub fn cars(&self) -> &[Car] {
        &self.cars
    }

    /// Current generation, starting at 1.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Best fitness ever observed.
    pub fn best_fitness(&self) -> f32 {
        self.best_fitness
    }

    /// Best fitness observed in the current generation.
    pub fn best_current_fitness(&self) -> f32 {
        self.best_current_fitness
    }

    /// Best fitness of every finished generation.
    pub fn history(&self) -> &[f32] {
        &self.history
    }

    /// Cars spawned per generation.
    pub fn population_size(&self) -> usize {
        self.params.population_size
    }

    /// Parameters the population runs with.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The track shared by every car.
    pub fn track(&self) -> &Arc<Track> {
        &self.track
    }

    /// Pose every car starts from.
    pub fn start(&self) -> StartPose {
        self.start
    }

    /// Storage holding the champion brain.
    pub fn champion_store(&self) -> &dyn ChampionStore {
        self.store.as_ref()
    }

    /// Snapshot of the values shown by a UI.
    pub fn summary(&self) -> PopulationSummary {
        PopulationSummary {
            generation: self.generation,
            alive: self.cars.len(),
            population_size: self.params.population_size,
            best_fitness: self.best_fitness,
            best_current_fitness: self.best_current_fitness,
            history: self.history.clone(),
        }
    }
}
