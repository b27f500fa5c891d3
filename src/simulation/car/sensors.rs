//! Ray-cast distance sensors.
//!
//! Rays fan out evenly around the car starting at its heading. Each ray is
//! sampled at a fixed step until it hits an obstacle, leaves the track or
//! reaches the maximum depth.

use ndarray::Array1;

use super::super::params::Params;
use super::super::track::Track;

/// Casts `params.num_rays` rays from `center` and returns one proximity
/// value per ray: `1 - depth / max_depth` for the first obstacle hit, `0`
/// when nothing is hit.
pub fn cast_rays(track: &Track, center: &Array1<f32>, heading: f32, params: &Params) -> Array1<f32> {
    let angle_step = params.ray_angle_step();
    Array1::from_shape_fn(params.num_rays, |ray| {
        cast_ray(track, center, heading + ray as f32 * angle_step, params)
    })
}

/// Casts a single ray at `angle` radians.
pub fn cast_ray(track: &Track, center: &Array1<f32>, angle: f32, params: &Params) -> f32 {
    let (dir_x, dir_y) = (-angle.sin(), angle.cos());

    let mut depth = 0.0;
    while depth < params.max_depth {
        let x = center[0] + dir_x * depth;
        let y = center[1] + dir_y * depth;

        match track.probe(x, y) {
            Ok(true) => return 1.0 - depth / params.max_depth,
            Ok(false) => {}
            // rays that leave the map read as open road
            Err(_) => return 0.0,
        }
        depth += params.ray_step;
    }
    0.0
}
