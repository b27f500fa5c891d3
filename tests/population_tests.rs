#![allow(missing_docs)]
#![allow(clippy::float_cmp)]

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use neurodrive::simulation::brain::{Activation, BrainError, Checkpoint, NeuralNetwork};
use neurodrive::simulation::car::StartPose;
use neurodrive::simulation::params::{Params, ParamsError};
use neurodrive::simulation::persistence::{
    ChampionStore, FileChampionStore, MemoryChampionStore,
};
use neurodrive::simulation::population::{GenerationState, Population, PopulationError};
use neurodrive::simulation::track::Track;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

fn create_test_params() -> Params {
    Params {
        population_size: 4,
        layer_sizes: vec![32, 8, 5],
        seed: Some(42),
        ..Params::default()
    }
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("neurodrive_{}_{}.json", name, std::process::id()))
}

fn open_track() -> Arc<Track> {
    Arc::new(Track::from_fn(600, 600, |_, _| false).unwrap())
}

fn walled_track() -> Arc<Track> {
    Arc::new(Track::from_fn(600, 600, |_, _| true).unwrap())
}

/// Open square with a solid border.
fn arena_track() -> Arc<Track> {
    Arc::new(
        Track::from_fn(600, 600, |x, y| x < 20 || y < 20 || x >= 580 || y >= 580).unwrap(),
    )
}

fn start() -> StartPose {
    StartPose::new(280.0, 280.0, 0.0)
}

fn create_population(params: Params, track: Arc<Track>) -> Population {
    Population::new(params, track, start(), Box::new(MemoryChampionStore::new()))
        .expect("valid population")
}

fn network_from(checkpoint: &Checkpoint) -> NeuralNetwork {
    NeuralNetwork::from_checkpoint(checkpoint, Activation::Tanh).unwrap()
}

/// Store that accepts writes but never keeps them.
struct ForgetfulStore;

impl ChampionStore for ForgetfulStore {
    fn store(&mut self, _checkpoint: &Checkpoint) -> Result<(), BrainError> {
        Ok(())
    }

    fn fetch(&self) -> Result<Checkpoint, BrainError> {
        Err(BrainError::NotFound(PathBuf::from("nowhere")))
    }
}

#[test]
fn test_population_creation() {
    let population = create_population(create_test_params(), open_track());

    assert_eq!(population.generation(), 1);
    assert_eq!(population.cars().len(), 4);
    assert_eq!(population.population_size(), 4);
    assert_eq!(population.state(), GenerationState::Active);
    assert!(population.history().is_empty());
    assert_eq!(population.best_fitness(), f32::NEG_INFINITY);

    for car in population.cars() {
        assert_eq!(car.pos.to_vec(), vec![280.0, 280.0]);
        assert_eq!(car.brain.layer_sizes(), vec![32, 8, 5]);
    }
}

#[test]
fn test_invalid_params_are_rejected() {
    let params = Params {
        population_size: 0,
        ..create_test_params()
    };
    let result = Population::new(
        params,
        open_track(),
        start(),
        Box::new(MemoryChampionStore::new()),
    );
    assert!(matches!(
        result,
        Err(PopulationError::Params(ParamsError::Invalid {
            name: "population_size",
            ..
        }))
    ));
}

#[test]
fn test_generation_advances_when_all_cars_crash() {
    let mut population = create_population(create_test_params(), walled_track());

    let report = population.step(1.0).unwrap();

    assert_eq!(report.removed, 4);
    assert!(report.champion_updated);
    assert!(report.advanced);
    assert_eq!(population.generation(), 2);
    assert_eq!(population.cars().len(), 4);
    assert_eq!(population.state(), GenerationState::Active);
    assert_eq!(population.history().len(), 1);
    assert_eq!(population.history()[0], population.best_fitness());
    assert_eq!(population.best_current_fitness(), f32::NEG_INFINITY);
}

#[test]
fn test_next_generation_keeps_unmutated_elite() {
    let mut population = create_population(create_test_params(), walled_track());

    population.step(1.0).unwrap();

    let checkpoint = population.champion_store().fetch().unwrap();
    let champion = network_from(&checkpoint).to_flat_vector();

    let cars = population.cars();
    let (elite, mutants) = cars.split_last().unwrap();
    assert_eq!(elite.brain.to_flat_vector(), champion);
    for car in mutants {
        let flat = car.brain.to_flat_vector();
        assert_ne!(flat, champion);
        // mutation stays within the rate around the champion
        for (mutated, original) in flat.iter().zip(&champion) {
            assert!((mutated - original).abs() <= 0.3 + 1e-5);
        }
    }
}

#[test]
fn test_champion_is_fittest_car() {
    let mut population = create_population(create_test_params(), open_track());

    population.step(1.0).unwrap();

    let best = population
        .cars()
        .iter()
        .map(|car| car.fitness)
        .fold(f32::NEG_INFINITY, f32::max);
    assert_eq!(population.best_fitness(), best);
    assert_eq!(population.best_current_fitness(), best);
    assert!(population.cars().iter().any(|car| car.is_leading()));

    let checkpoint = population.champion_store().fetch().unwrap();
    let leader = population
        .cars()
        .iter()
        .find(|car| car.fitness == best)
        .unwrap();
    assert_eq!(leader.brain.to_checkpoint(), checkpoint);
}

#[test]
fn test_stalled_generation_ends_after_limit() {
    let params = create_test_params();
    let stall_limit = params.stall_limit;
    let mut population = create_population(params, open_track());

    for _ in 0..stall_limit {
        let report = population.step(0.0).unwrap();
        assert_eq!(report.removed, 0);
        assert!(!report.advanced);
    }
    assert_eq!(population.generation(), 1);
    assert_eq!(population.cars().len(), 4);

    let report = population.step(0.0).unwrap();
    assert_eq!(report.removed, 4);
    assert!(report.advanced);
    assert_eq!(population.generation(), 2);
}

#[test]
fn test_history_tracks_finished_generations() {
    let mut population = create_population(create_test_params(), walled_track());

    for _ in 0..5 {
        population.step(1.0).unwrap();
        assert_eq!(
            population.history().len() as u32,
            population.generation() - 1
        );
        assert!(population.history().iter().all(|&f| f <= population.best_fitness()));
    }
    assert_eq!(population.generation(), 6);
}

/// Store whose writes always fail.
struct BrokenStore;

impl ChampionStore for BrokenStore {
    fn store(&mut self, _checkpoint: &Checkpoint) -> Result<(), BrainError> {
        Err(BrainError::Io(std::io::Error::other("disk full")))
    }

    fn fetch(&self) -> Result<Checkpoint, BrainError> {
        Err(BrainError::NotFound(PathBuf::from("nowhere")))
    }
}

#[test]
fn test_failed_champion_write_still_culls_cars() {
    let mut population = Population::new(
        create_test_params(),
        walled_track(),
        start(),
        Box::new(BrokenStore),
    )
    .unwrap();

    let err = population.step(1.0).unwrap_err();

    assert!(matches!(err, PopulationError::Brain(BrainError::Io(_))));
    // every car sits on an obstacle and must be gone despite the error
    assert!(population.cars().is_empty());
    assert_eq!(population.state(), GenerationState::Done);
    // nothing was persisted, so the best-ever fitness is unchanged
    assert_eq!(population.best_fitness(), f32::NEG_INFINITY);
    assert_eq!(population.generation(), 1);
    assert!(population.history().is_empty());
}

#[test]
fn test_failed_champion_write_finishes_bookkeeping() {
    let mut population = Population::new(
        create_test_params(),
        open_track(),
        start(),
        Box::new(BrokenStore),
    )
    .unwrap();

    assert!(population.step(1.0).is_err());

    assert_eq!(population.cars().len(), 4);
    assert_eq!(population.best_fitness(), f32::NEG_INFINITY);
    let best = population.best_current_fitness();
    // flags are set for every car, including those after the champion
    assert!(
        population
            .cars()
            .iter()
            .filter(|car| car.fitness == best)
            .all(|car| car.is_leading())
    );
}

#[test]
fn test_missing_champion_is_fatal() {
    let result = Population::new(
        create_test_params(),
        walled_track(),
        start(),
        Box::new(ForgetfulStore),
    );
    let mut population = result.unwrap();

    let err = population.step(1.0).unwrap_err();
    assert!(matches!(
        err,
        PopulationError::MissingChampion { generation: 2, .. }
    ));
    assert_eq!(population.generation(), 1);
    assert!(population.history().is_empty());
}

#[test]
fn test_file_store_persists_champion() {
    let path = temp_path("population_champion");
    fs::remove_file(&path).ok();

    let mut population = Population::new(
        create_test_params(),
        walled_track(),
        start(),
        Box::new(FileChampionStore::new(&path)),
    )
    .unwrap();
    population.step(1.0).unwrap();

    assert!(path.exists());
    let checkpoint = Checkpoint::load_from_file(&path).unwrap();
    let elite = population.cars().last().unwrap();
    assert_eq!(elite.brain.to_checkpoint(), checkpoint);

    fs::remove_file(&path).ok();
}

#[test]
fn test_resume_without_champion_starts_random() {
    let params = Params {
        resume_from_champion: true,
        ..create_test_params()
    };
    let population = create_population(params, open_track());

    assert_eq!(population.generation(), 1);
    assert_eq!(population.cars().len(), 4);
}

#[test]
fn test_resume_from_stored_champion() {
    let params = Params {
        resume_from_champion: true,
        ..create_test_params()
    };
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(9);
    let champion =
        NeuralNetwork::new_random(&params.layer_sizes, Activation::Tanh, 1.0, &mut rng).unwrap();
    let store = MemoryChampionStore::with_champion(champion.to_checkpoint());

    let population = Population::new(params, open_track(), start(), Box::new(store)).unwrap();

    let elite = population.cars().last().unwrap();
    assert_eq!(elite.brain.to_flat_vector(), champion.to_flat_vector());
    assert_eq!(population.generation(), 1);
}

#[test]
fn test_resume_rejects_champion_of_other_topology() {
    let params = Params {
        resume_from_champion: true,
        ..create_test_params()
    };
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(9);
    let champion =
        NeuralNetwork::new_random(&[32, 6, 5], Activation::Tanh, 1.0, &mut rng).unwrap();
    let store = MemoryChampionStore::with_champion(champion.to_checkpoint());

    let result = Population::new(params, open_track(), start(), Box::new(store));

    assert!(matches!(
        result,
        Err(PopulationError::Brain(BrainError::ShapeMismatch { .. }))
    ));
}

#[test]
fn test_forced_advance() {
    let mut population = create_population(create_test_params(), open_track());

    population.step(1.0).unwrap();
    let best = population.best_current_fitness();
    population.advance_generation().unwrap();

    assert_eq!(population.generation(), 2);
    assert_eq!(population.cars().len(), 4);
    assert_eq!(population.history(), &[best]);
    assert!(population.cars().iter().all(|car| car.fitness == 0.0));
}

#[test]
fn test_same_seed_is_deterministic() {
    let mut first = create_population(create_test_params(), arena_track());
    let mut second = create_population(create_test_params(), arena_track());

    for _ in 0..150 {
        first.step(1.0).unwrap();
        second.step(1.0).unwrap();
    }

    assert_eq!(first.summary(), second.summary());
    let first_brains: Vec<_> = first.cars().iter().map(|c| c.brain.to_flat_vector()).collect();
    let second_brains: Vec<_> = second.cars().iter().map(|c| c.brain.to_flat_vector()).collect();
    assert_eq!(first_brains, second_brains);
}

#[test]
fn test_summary_reflects_state() {
    let mut population = create_population(create_test_params(), walled_track());
    population.step(1.0).unwrap();

    let summary = population.summary();
    assert_eq!(summary.generation, 2);
    assert_eq!(summary.alive, 4);
    assert_eq!(summary.population_size, 4);
    assert_eq!(summary.history, population.history().to_vec());
    assert_eq!(summary.best_fitness, population.best_fitness());
}

#[test]
fn test_default_params_are_valid() {
    let params = Params::default();
    assert!(params.validate().is_ok());
    assert_eq!(params.population_size, 250);
    assert_eq!(params.layer_sizes, vec![32, 24, 16, 12, 8, 5]);
    assert_eq!(params.stall_limit, 75);
}

#[test]
fn test_params_reject_mismatched_layers() {
    let wrong_input = Params {
        layer_sizes: vec![30, 5],
        ..Params::default()
    };
    assert!(matches!(
        wrong_input.validate(),
        Err(ParamsError::Invalid { name: "layer_sizes", .. })
    ));

    let wrong_output = Params {
        layer_sizes: vec![32, 4],
        ..Params::default()
    };
    assert!(wrong_output.validate().is_err());

    let single = Params {
        layer_sizes: vec![32],
        ..Params::default()
    };
    assert!(single.validate().is_err());
}

#[test]
fn test_params_reject_negative_or_non_finite_values() {
    let cases = [
        ("friction", Params { friction: -0.2, ..Params::default() }),
        ("acceleration", Params { acceleration: -0.3, ..Params::default() }),
        ("steering_factor", Params { steering_factor: -0.01, ..Params::default() }),
        ("mutation_rate", Params { mutation_rate: -0.3, ..Params::default() }),
        ("mutation_rate", Params { mutation_rate: f32::NAN, ..Params::default() }),
        ("init_scale", Params { init_scale: f32::INFINITY, ..Params::default() }),
        ("init_scale", Params { init_scale: -1.0, ..Params::default() }),
    ];

    for (field, params) in cases {
        match params.validate() {
            Err(ParamsError::Invalid { name, .. }) => assert_eq!(name, field),
            other => panic!("{field} should be rejected, got {other:?}"),
        }
    }

    let zero_rate = Params {
        mutation_rate: 0.0,
        friction: 0.0,
        ..Params::default()
    };
    assert!(zero_rate.validate().is_ok());
}

#[test]
fn test_params_save_and_load() {
    let path = temp_path("params_round_trip");
    let params = Params {
        mutation_rate: 0.15,
        seed: Some(3),
        ..create_test_params()
    };

    params.save_to_file(&path).unwrap();
    let loaded = Params::load_from_file(&path).unwrap();
    assert_eq!(loaded, params);

    fs::remove_file(&path).ok();
}

#[test]
fn test_partial_params_file_uses_defaults() {
    let path = temp_path("params_partial");
    fs::write(&path, r#"{ "population_size": 10, "mutation_rate": 0.5 }"#).unwrap();

    let loaded = Params::load_from_file(&path).unwrap();
    assert_eq!(loaded.population_size, 10);
    assert_eq!(loaded.mutation_rate, 0.5);
    assert_eq!(loaded.layer_sizes, Params::default().layer_sizes);

    fs::remove_file(&path).ok();
}
