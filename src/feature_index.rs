/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::geometry::{GeometryCollection, TileRect, EXTENT};
use crate::internal_types::{FastHashMap, FastHashSet};
use crate::util::{bounding_rect, inflate_rect};

const GRID_CELLS: usize = 16;

/// Padding applied to query geometry so that hit tests against degenerate
/// boxes (point features) still intersect.
const QUERY_PADDING: f32 = 1.0;

/// A feature recorded for hit-testing: which feature of which source layer
/// it was, and which bucket leader it was rendered under.
#[derive(Clone, Debug, PartialEq)]
pub struct IndexedFeature {
    /// Insertion order; query results are sorted by this, which matches
    /// the order features were added to their buckets.
    pub sort_index: u32,
    pub feature_index: usize,
    pub source_layer_id: String,
    pub bucket_leader_id: String,
}

/// Per-tile spatial index over the features that made it into buckets,
/// plus the leader-to-members mapping of each layout group.
///
/// The index is a uniform grid over the tile extent: features insert one
/// bounding box per geometry primitive, queries walk the cells their own
/// bounding box covers.
pub struct FeatureIndex {
    features: Vec<IndexedFeature>,
    boxes: Vec<(TileRect, u32)>,
    cells: Vec<Vec<u32>>,
    bucket_layer_ids: FastHashMap<String, Vec<String>>,
}

impl FeatureIndex {
    pub fn new() -> FeatureIndex {
        FeatureIndex {
            features: Vec::new(),
            boxes: Vec::new(),
            cells: vec![Vec::new(); GRID_CELLS * GRID_CELLS],
            bucket_layer_ids: FastHashMap::default(),
        }
    }

    /// Record that hits on `leader`'s bucket stand for all of `layer_ids`.
    pub fn set_bucket_layer_ids(&mut self, leader: &str, layer_ids: Vec<String>) {
        self.bucket_layer_ids.insert(leader.to_string(), layer_ids);
    }

    pub fn bucket_layer_ids(&self, leader: &str) -> Option<&[String]> {
        self.bucket_layer_ids.get(leader).map(|ids| &ids[..])
    }

    pub fn insert(
        &mut self,
        geometries: &GeometryCollection,
        feature_index: usize,
        source_layer_id: &str,
        bucket_leader_id: &str,
    ) {
        let slot = self.features.len() as u32;
        self.features.push(IndexedFeature {
            sort_index: slot,
            feature_index,
            source_layer_id: source_layer_id.to_string(),
            bucket_leader_id: bucket_leader_id.to_string(),
        });

        for ring in geometries {
            if let Some(rect) = bounding_rect(ring) {
                let box_index = self.boxes.len() as u32;
                self.boxes.push((rect, slot));
                for cell in covered_cells(&rect) {
                    self.cells[cell].push(box_index);
                }
            }
        }
    }

    /// Features whose bounding boxes intersect the query geometry, in
    /// insertion order. The caller refines against exact geometry if it
    /// needs to.
    pub fn query(&self, geometries: &GeometryCollection) -> Vec<&IndexedFeature> {
        let mut seen: FastHashSet<u32> = FastHashSet::default();
        let mut slots: Vec<u32> = Vec::new();

        for ring in geometries {
            let query_rect = match bounding_rect(ring) {
                Some(rect) => inflate_rect(&rect, QUERY_PADDING),
                None => continue,
            };
            for cell in covered_cells(&query_rect) {
                for &box_index in &self.cells[cell] {
                    let (ref rect, slot) = self.boxes[box_index as usize];
                    if rect.intersects(&query_rect) && seen.insert(slot) {
                        slots.push(slot);
                    }
                }
            }
        }

        slots.sort();
        slots
            .into_iter()
            .map(|slot| &self.features[slot as usize])
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }
}

/// Indices of the grid cells a rect covers, clamped to the tile; features
/// may legitimately poke past the extent into the tile buffer region.
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
    let x0 = clamp(rect.origin.x);
    let x1 = clamp(rect.origin.x + rect.size.width);
    let y0 = clamp(rect.origin.y);
    let y1 = clamp(rect.origin.y + rect.size.height);

    (y0..=y1).flat_map(move |y| (x0..=x1).map(move |x| y * GRID_CELLS + x))
}
