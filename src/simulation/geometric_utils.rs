//! Geometric helpers for the car body and its movement.

use geo::algorithm::Distance;
use geo::{BoundingRect, Contains, Euclidean, Point, Polygon, Rect, Rotate, Translate, coord};
use ndarray::Array1;

use super::track::Track;

/// Euclidean distance between two positions.
pub fn displacement(from: &Array1<f32>, to: &Array1<f32>) -> f32 {
    Euclidean.distance(Point::new(from[0], from[1]), Point::new(to[0], to[1]))
}

/// Builds the rotated rectangular body of a car.
///
/// The body is `width × length` with its length along the direction of
/// travel `(sin heading, cos heading)`. After rotation it is translated so
/// the top-left corner of its bounding box sits at `anchor`.
pub fn car_silhouette(anchor: &Array1<f32>, heading: f32, width: f32, length: f32) -> Polygon<f32> {
    let body = Rect::new(
        coord! { x: -width / 2.0, y: -length / 2.0 },
        coord! { x: width / 2.0, y: length / 2.0 },
    )
    .to_polygon()
    .rotate_around_point(-heading.to_degrees(), Point::new(0.0, 0.0));

    match body.bounding_rect() {
        Some(bounds) => body.translate(anchor[0] - bounds.min().x, anchor[1] - bounds.min().y),
        None => body.translate(anchor[0], anchor[1]),
    }
}

/// Centre of a silhouette's bounding box.
pub fn silhouette_center(silhouette: &Polygon<f32>) -> Option<Array1<f32>> {
    silhouette
        .bounding_rect()
        .map(|bounds| Array1::from_vec(vec![bounds.center().x, bounds.center().y]))
}

/// Returns `true` if any obstacle pixel of `track` lies under `silhouette`.
///
/// Only the part of the body that is over the track is tested; pixels of the
/// body that hang off the map never count as an overlap.
pub fn overlaps_obstacle(silhouette: &Polygon<f32>, track: &Track) -> bool {
    let Some(bounds) = silhouette.bounding_rect() else {
        return false;
    };

    let x_range = bounds.min().x.floor() as i64..=bounds.max().x.ceil() as i64;
    let y_range = bounds.min().y.floor() as i64..=bounds.max().y.ceil() as i64;

    y_range.clone().any(|py| {
        x_range.clone().any(|px| {
            track.pixel(px, py) == Some(true)
                && silhouette.contains(&Point::new(px as f32 + 0.5, py as f32 + 0.5))
        })
    })
}
