/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::geometry::{TilePoint, TileRect, TileUnit, EXTENT};
use crate::internal_types::PlacementConfig;
use crate::util::rect_from_bounds;
use euclid::{Angle, TypedTransform2D};
use smallvec::SmallVec;

const GRID_CELLS: usize = 8;

/// One screen-aligned box a symbol claims, relative to its anchor.
///
/// The extents are in glyph pixels; the anchor is in tile units. Rotation
/// and pitch stretching are applied at placement time, so boxes themselves
/// are viewport independent and survive across placement runs.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CollisionBox {
    pub anchor: TilePoint,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl CollisionBox {
    pub fn new(anchor: TilePoint, x1: f32, y1: f32, x2: f32, y2: f32) -> CollisionBox {
        CollisionBox {
            anchor,
            x1,
            y1,
            x2,
            y2,
        }
    }
}

/// The boxes one symbol part (its text or its icon) claims.
#[derive(Clone, Debug, Default)]
pub struct CollisionFeature {
    pub boxes: SmallVec<[CollisionBox; 2]>,
}

/// Collision state for one placement run.
///
/// Constructed from a `PlacementConfig` and consumed once: symbols are
/// placed in symbol-order, each either claiming its boxes or losing to the
/// ones already placed. Bearing rotates boxes into viewport alignment and
/// pitch stretches them vertically, which is why a new configuration needs
/// a new run.
pub struct CollisionTile {
    pub config: PlacementConfig,
    rotation: TypedTransform2D<f32, TileUnit, TileUnit>,
    y_stretch: f32,
    cells: Vec<Vec<TileRect>>,
    /// Every candidate box and whether it was placed; only recorded when
    /// `config.debug` is set, for the collision debug overlay.
    pub debug_boxes: Vec<(TileRect, bool)>,
}

impl CollisionTile {
    pub fn new(config: PlacementConfig) -> CollisionTile {
        let rotation = TypedTransform2D::create_rotation(Angle::radians(-config.angle));
        let y_stretch = 1.0 / config.pitch.cos().max(0.1);
        CollisionTile {
            config,
            rotation,
            y_stretch,
            cells: vec![Vec::new(); GRID_CELLS * GRID_CELLS],
            debug_boxes: Vec::new(),
        }
    }

    /// Try to claim every box of `feature`. Returns whether the feature
    /// fits; its boxes are inserted into the grid only when it does (or
    /// when overlap is allowed, in which case it always fits).
    pub fn place_feature(&mut self, feature: &CollisionFeature, allow_overlap: bool) -> bool {
        let projected: SmallVec<[TileRect; 2]> = feature
            .boxes
            .iter()
            .map(|collision_box| self.project(collision_box))
            .collect();

        let fits = allow_overlap
            || !projected
                .iter()
                .any(|rect| self.query(rect));

        if fits {
            for rect in &projected {
                self.insert(*rect);
            }
        }
        if self.config.debug {
            for rect in &projected {
                self.debug_boxes.push((*rect, fits));
            }
        }
        fits
    }

    /// Rotate the anchor into viewport alignment and stretch the box for
    /// pitch.
    fn project(&self, collision_box: &CollisionBox) -> TileRect {
        let anchor = self.rotation.transform_point(&collision_box.anchor);
        rect_from_bounds(
            anchor.x + collision_box.x1,
            anchor.y + collision_box.y1 * self.y_stretch,
            anchor.x + collision_box.x2,
            anchor.y + collision_box.y2 * self.y_stretch,
        )
    }

    fn query(&self, rect: &TileRect) -> bool {
        for cell in covered_cells(rect) {
            for placed in &self.cells[cell] {
                if placed.intersects(rect) {
                    return true;
                }
            }
        }
        false
    }

    fn insert(&mut self, rect: TileRect) {
        for cell in covered_cells(&rect) {
            self.cells[cell].push(rect);
        }
    }
}

/// Rotated anchors can land outside the tile extent, so cells clamp.
fn covered_cells(rect: &TileRect) -> impl Iterator<Item = usize> {
    let cell_size = EXTENT as f32 / GRID_CELLS as f32;
    let clamp = |v: f32| -> usize {
        let cell = (v / cell_size).floor();
        if cell < 0.0 {
            0
        } else if cell >= GRID_CELLS as f32 {
            GRID_CELLS - 1
        } else {
            cell as usize
        }
    };
    let x0 = clamp(rect.origin.x.min(rect.origin.x + rect.size.width));
    let x1 = clamp(rect.origin.x.max(rect.origin.x + rect.size.width));
    let y0 = clamp(rect.origin.y.min(rect.origin.y + rect.size.height));
    let y1 = clamp(rect.origin.y.max(rect.origin.y + rect.size.height));

    (y0..=y1).flat_map(move |y| (x0..=x1).map(move |x| y * GRID_CELLS + x))
}
