//! Discrete driving actions decoded from the brain's outputs.

use ndarray::{ArrayView1, s};
use serde::{Deserialize, Serialize};

/// Width of the brain's output vector: two longitudinal units followed by
/// three steering units.
pub const ACTION_WIDTH: usize = LONGITUDINAL_UNITS + STEERING_UNITS;

const LONGITUDINAL_UNITS: usize = 2;
const STEERING_UNITS: usize = 3;

/// Throttle choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Longitudinal {
    /// Accelerate in the direction of travel.
    #[default]
    Forward,
    /// Brake or reverse. Penalised in the fitness.
    Backward,
}

/// Steering choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Steering {
    /// Turn left.
    Left,
    /// Turn right.
    Right,
    /// Keep the current heading.
    #[default]
    Straight,
}

/// One tick's worth of driving input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Controls {
    /// Throttle choice.
    pub longitudinal: Longitudinal,
    /// Steering choice.
    pub steering: Steering,
}

impl Controls {
    /// Creates controls from explicit choices.
    pub fn new(longitudinal: Longitudinal, steering: Steering) -> Self {
        Self {
            longitudinal,
            steering,
        }
    }

    /// Decodes brain outputs by taking the argmax of each action group.
    ///
    /// Ties resolve to the first unit of the group. Missing units decode as
    /// `Forward` / `Straight`.
    pub fn decode(outputs: ArrayView1<'_, f32>) -> Self {
        if outputs.len() < ACTION_WIDTH {
            return Self::default();
        }

        let longitudinal = match argmax(outputs.slice(s![..LONGITUDINAL_UNITS])) {
            0 => Longitudinal::Forward,
            _ => Longitudinal::Backward,
        };
        let steering = match argmax(outputs.slice(s![LONGITUDINAL_UNITS..ACTION_WIDTH])) {
            0 => Steering::Left,
            1 => Steering::Right,
            _ => Steering::Straight,
        };

        Self {
            longitudinal,
            steering,
        }
    }
}

fn argmax(values: ArrayView1<'_, f32>) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, best_value), (index, &value)| {
            if value > best_value {
                (index, value)
            } else {
                (best, best_value)
            }
        })
        .0
}
