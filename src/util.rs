/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::geometry::{GeometryCoordinate, TilePoint, TileRect, TileSize};

/// Axis-aligned bounding rect of a set of tile coordinates.
pub fn bounding_rect(points: &[GeometryCoordinate]) -> Option<TileRect> {
    let first = match points.first() {
        Some(p) => p,
        None => return None,
    };

    let mut min_x = first.x as f32;
    let mut min_y = first.y as f32;
    let mut max_x = min_x;
    let mut max_y = min_y;

    for point in &points[1..] {
        let (x, y) = (point.x as f32, point.y as f32);
        if x < min_x {
            min_x = x;
        }
        if x > max_x {
            max_x = x;
        }
        if y < min_y {
            min_y = y;
        }
        if y > max_y {
            max_y = y;
        }
    }

    Some(rect_from_bounds(min_x, min_y, max_x, max_y))
}

#[inline]
pub fn rect_from_bounds(x0: f32, y0: f32, x1: f32, y1: f32) -> TileRect {
    TileRect::new(TilePoint::new(x0, y0), TileSize::new(x1 - x0, y1 - y0))
}

/// Grow a rect by `d` on every side.
#[inline]
pub fn inflate_rect(rect: &TileRect, d: f32) -> TileRect {
    rect_from_bounds(
        rect.origin.x - d,
        rect.origin.y - d,
        rect.origin.x + rect.size.width + d,
        rect.origin.y + rect.size.height + d,
    )
}
