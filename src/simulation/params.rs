use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::brain::Activation;
use super::car::ACTION_WIDTH;

/// Errors raised when loading or validating [`Params`].
#[derive(Debug, Error)]
pub enum ParamsError {
    /// A parameter value is outside its valid range.
    #[error("invalid parameter {name}: {reason}")]
    Invalid {
        /// Parameter name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// Reading or writing the parameter file failed.
    #[error("parameter file i/o failed: {0}")]
    Io(#[from] std::io::Error),
    /// The parameter file is not valid JSON for [`Params`].
    #[error("parameter file is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Simulation parameters that control car behavior and evolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Number of cars spawned every generation.
    pub population_size: usize,
    /// Neural network layer dimensions, input first.
    pub layer_sizes: Vec<usize>,
    /// Activation used by every layer.
    pub activation: Activation,
    /// Random brains draw parameters from `[-init_scale, init_scale]`.
    pub init_scale: f32,
    /// Number of sensor rays cast around the car.
    pub num_rays: usize,
    /// Distance between consecutive samples along a ray.
    pub ray_step: f32,
    /// Maximum distance a ray travels.
    pub max_depth: f32,
    /// Maximum speed magnitude.
    pub max_velocity: f32,
    /// Velocity change per tick when accelerating or braking.
    pub acceleration: f32,
    /// Speed lost to friction every tick.
    pub friction: f32,
    /// Heading change per unit of velocity and time when steering.
    pub steering_factor: f32,
    /// Fitness deducted every tick the car chooses to go backward.
    pub backward_penalty: f32,
    /// Car body width.
    pub car_width: f32,
    /// Car body length (along the direction of travel).
    pub car_length: f32,
    /// Displacement below which a tick counts as stalled.
    pub stall_displacement: f32,
    /// A car is removed once its stalled tick count exceeds this.
    pub stall_limit: u32,
    /// Perturbation range applied to champion clones.
    pub mutation_rate: f32,
    /// Seed of the population's random source. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Seed generation 1 from the stored champion instead of random brains.
    pub resume_from_champion: bool,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            population_size: 250,
            layer_sizes: vec![32, 24, 16, 12, 8, ACTION_WIDTH],
            activation: Activation::Tanh,
            init_scale: 1.0,
            num_rays: 32,
            ray_step: 5.0,
            max_depth: 500.0,
            max_velocity: 12.0,
            acceleration: 0.3,
            friction: 0.2,
            steering_factor: 0.01,
            backward_penalty: 100.0,
            car_width: 16.0,
            car_length: 32.0,
            stall_displacement: 2.0,
            stall_limit: 75,
            mutation_rate: 0.3,
            seed: None,
            resume_from_champion: false,
        }
    }
}

impl Params {
    /// Checks that the parameters describe a runnable simulation.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.population_size == 0 {
            return Err(invalid("population_size", "must be at least 1"));
        }
        if self.layer_sizes.len() < 2 {
            return Err(invalid(
                "layer_sizes",
                "needs an input and an output layer",
            ));
        }
        if self.layer_sizes.contains(&0) {
            return Err(invalid("layer_sizes", "layers must not be empty"));
        }
        if self.layer_sizes[0] != self.num_rays {
            return Err(invalid(
                "layer_sizes",
                format!(
                    "input width {} must equal num_rays {}",
                    self.layer_sizes[0], self.num_rays
                ),
            ));
        }
        if self.layer_sizes.last() != Some(&ACTION_WIDTH) {
            return Err(invalid(
                "layer_sizes",
                format!("output width must be {ACTION_WIDTH}"),
            ));
        }
        if !is_positive(self.ray_step) {
            return Err(invalid("ray_step", "must be positive"));
        }
        if !is_positive(self.max_depth) {
            return Err(invalid("max_depth", "must be positive"));
        }
        if !is_positive(self.max_velocity) {
            return Err(invalid("max_velocity", "must be positive"));
        }
        if !is_positive(self.car_width) || !is_positive(self.car_length) {
            return Err(invalid("car_width/car_length", "must be positive"));
        }

        let non_negative = [
            ("init_scale", self.init_scale),
            ("acceleration", self.acceleration),
            ("friction", self.friction),
            ("steering_factor", self.steering_factor),
            ("backward_penalty", self.backward_penalty),
            ("stall_displacement", self.stall_displacement),
            ("mutation_rate", self.mutation_rate),
        ];
        for (name, value) in non_negative {
            if !is_non_negative(value) {
                return Err(invalid(name, "must be finite and not negative"));
            }
        }
        Ok(())
    }

    /// Angle between two neighbouring sensor rays, in radians.
    pub fn ray_angle_step(&self) -> f32 {
        std::f32::consts::TAU / self.num_rays as f32
    }

    /// Saves the parameters to a JSON file.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ParamsError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Loads and validates parameters from a JSON file.
    ///
    /// Missing fields take their default value.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ParamsError> {
        let json = fs::read_to_string(path)?;
        let params: Self = serde_json::from_str(&json)?;
        params.validate()?;
        Ok(params)
    }
}

fn is_positive(value: f32) -> bool {
    value.is_finite() && value > 0.0
}

fn is_non_negative(value: f32) -> bool {
    value.is_finite() && value >= 0.0
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ParamsError {
    ParamsError::Invalid {
        name,
        reason: reason.into(),
    }
}
