//! A single simulated car: state, physics and fitness.

use std::sync::Arc;

use geo::Polygon;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::super::brain::NeuralNetwork;
use super::super::geometric_utils::{
    car_silhouette, displacement, overlaps_obstacle, silhouette_center,
};
use super::super::params::Params;
use super::super::track::Track;
use super::controls::{Controls, Longitudinal, Steering};
use super::sensors;

/// Where and in which direction every car of a generation starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartPose {
    /// Start x coordinate (top-left of the car's bounding box).
    pub x: f32,
    /// Start y coordinate (top-left of the car's bounding box).
    pub y: f32,
    /// Start heading in radians.
    pub heading: f32,
}

impl StartPose {
    /// Creates a start pose.
    pub fn new(x: f32, y: f32, heading: f32) -> Self {
        Self { x, y, heading }
    }
}

/// A car driven by a neural network brain.
///
/// Each tick the car:
/// - casts its sensor rays against the track
/// - feeds the readings to its brain and decodes the chosen controls
/// - applies throttle, friction and steering, then moves
/// - adds the distance travelled to its fitness
#[derive(Debug, Clone)]
pub struct Car {
    /// Top-left corner of the body's bounding box.
    pub pos: Array1<f32>,
    /// Heading in radians.
    pub heading: f32,
    /// Signed speed. Driving forward makes it negative.
    pub velocity: f32,
    /// Accumulated path length minus penalties.
    pub fitness: f32,
    /// Ticks in which the car barely moved. Never reset.
    pub stalled_frames: u32,
    /// Neural network that controls the car.
    pub brain: NeuralNetwork,
    track: Arc<Track>,
    prev_pos: Array1<f32>,
    last_sensors: Array1<f32>,
    last_controls: Controls,
    leading: bool,
}

impl Car {
    /// Places a new car at `start` on `track`.
    pub fn new(track: Arc<Track>, start: &StartPose, brain: NeuralNetwork) -> Self {
        let pos = Array1::from_vec(vec![start.x, start.y]);
        Self {
            prev_pos: pos.clone(),
            pos,
            heading: start.heading,
            velocity: 0.0,
            fitness: 0.0,
            stalled_frames: 0,
            last_sensors: Array1::zeros(brain.input_size()),
            brain,
            track,
            last_controls: Controls::default(),
            leading: false,
        }
    }

    /// Runs one full tick: sense, decide, move, score.
    pub fn update(&mut self, params: &Params, dt: f32) {
        let sensors = self.sense(params);
        let controls = self.decide(&sensors);
        self.last_sensors = sensors;
        self.drive(controls, params, dt);
    }

    /// Reads every sensor ray from the centre of the car.
    pub fn sense(&self, params: &Params) -> Array1<f32> {
        sensors::cast_rays(&self.track, &self.center(params), self.heading, params)
    }

    /// Asks the brain which controls to apply for the given sensor readings.
    pub fn decide(&mut self, sensors: &Array1<f32>) -> Controls {
        let outputs = self.brain.forward(sensors);
        let controls = Controls::decode(outputs.view());
        self.last_controls = controls;
        controls
    }

    /// Applies `controls` for `dt` and accounts fitness and stalling.
    pub fn drive(&mut self, controls: Controls, params: &Params, dt: f32) {
        self.prev_pos.assign(&self.pos);

        if self.velocity.abs() > params.max_velocity {
            self.velocity = params.max_velocity.copysign(self.velocity);
        } else {
            match controls.longitudinal {
                Longitudinal::Forward => self.velocity -= params.acceleration,
                Longitudinal::Backward => {
                    self.velocity += params.acceleration;
                    self.fitness -= params.backward_penalty;
                }
            }
            self.velocity = self
                .velocity
                .clamp(-params.max_velocity, params.max_velocity);
        }

        if self.velocity.abs() > 0.0 {
            let slowed = self.velocity.abs() - params.friction;
            self.velocity = slowed.max(0.0).copysign(self.velocity);
            self.steer(controls.steering, params, dt);
        }

        // speeds are kept at two decimals
        self.velocity = (self.velocity * 100.0).round() / 100.0;

        self.pos[0] += self.heading.sin() * self.velocity * dt;
        self.pos[1] += self.heading.cos() * self.velocity * dt;

        let moved = displacement(&self.prev_pos, &self.pos);
        self.fitness += moved;
        if moved < params.stall_displacement {
            self.stalled_frames += 1;
        }
    }

    fn steer(&mut self, steering: Steering, params: &Params, dt: f32) {
        let delta = self.velocity * params.steering_factor * dt;
        match steering {
            Steering::Left => self.heading -= delta,
            Steering::Right => self.heading += delta,
            Steering::Straight => {}
        }
    }

    /// Returns `true` if the body touches an obstacle or the car left the track.
    pub fn has_collided(&self, params: &Params) -> bool {
        self.track.is_obstacle(self.pos[0], self.pos[1])
            || overlaps_obstacle(&self.silhouette(params), &self.track)
    }

    /// Returns `true` once the car has stalled for longer than allowed.
    pub fn is_stalled(&self, params: &Params) -> bool {
        self.stalled_frames > params.stall_limit
    }

    /// Returns `true` if the car must be removed from the live set.
    pub fn has_failed(&self, params: &Params) -> bool {
        self.has_collided(params) || self.is_stalled(params)
    }

    /// The rotated body of the car.
    pub fn silhouette(&self, params: &Params) -> Polygon<f32> {
        car_silhouette(&self.pos, self.heading, params.car_width, params.car_length)
    }

    /// Centre of the car's body, where sensor rays start.
    pub fn center(&self, params: &Params) -> Array1<f32> {
        silhouette_center(&self.silhouette(params)).unwrap_or_else(|| self.pos.clone())
    }

    /// Position before the most recent tick.
    pub fn prev_pos(&self) -> &Array1<f32> {
        &self.prev_pos
    }

    /// Sensor readings of the most recent tick.
    pub fn last_sensors(&self) -> &Array1<f32> {
        &self.last_sensors
    }

    /// Controls chosen in the most recent tick.
    pub fn last_controls(&self) -> Controls {
        self.last_controls
    }

    /// Whether the car is at the front of its generation. Rendering hint only.
    pub fn is_leading(&self) -> bool {
        self.leading
    }

    pub(crate) fn set_leading(&mut self, leading: bool) {
        self.leading = leading;
    }

    /// The track the car drives on.
    pub fn track(&self) -> &Track {
        &self.track
    }
}
