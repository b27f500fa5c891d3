//! Car module containing car state, sensing, and driving controls.

mod car;
mod controls;
mod sensors;

// Re-export everything from the car module
pub use car::*;

pub use controls::{ACTION_WIDTH, Controls, Longitudinal, Steering};
pub use sensors::{cast_ray, cast_rays};
