/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::buckets::Bucket;
use crate::feature_index::FeatureIndex;
use crate::glyphs::GlyphDependencies;
use crate::internal_types::{FastHashMap, TileData, TileError};
use crate::layers::{group_by_layout, BucketParameters, Layer};
use crate::sprite::IconDependencies;
use crate::symbol_layout::SymbolLayout;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Outcome of one layout run.
pub enum LayoutRun {
    /// The obsolete flag was observed; nothing may be emitted.
    Aborted,
    Finished {
        buckets: FastHashMap<String, Arc<dyn Bucket>>,
        feature_index: FeatureIndex,
        /// Symbol layouts in back-to-front draw order, ready for
        /// placement once their dependencies are satisfied.
        symbol_layouts: Vec<SymbolLayout>,
        glyph_dependencies: GlyphDependencies,
        icon_dependencies: IconDependencies,
    },
}

/// Turn features into buckets and symbol layouts.
///
/// Layers are grouped by layout compatibility and each group's features
/// are iterated once: non-symbol groups fill a shared bucket and the
/// feature index, symbol groups capture a `SymbolLayout` and report the
/// glyph/icon dependencies shaping will need. An empty tile
/// (`TileData::Empty`) produces an empty but complete run.
pub fn run_layout(
    data: &TileData,
    layers: &[Layer],
    params: &BucketParameters,
    obsolete: &AtomicBool,
) -> Result<LayoutRun, TileError> {
    if obsolete.load(Ordering::Relaxed) {
        return Ok(LayoutRun::Aborted);
    }

    // Back-to-front order for symbol placement: the topmost layer places
    // first and wins collisions.
    let symbol_order: Vec<String> = layers
        .iter()
        .rev()
        .filter(|layer| layer.is_symbol())
        .map(|layer| layer.id.clone())
        .collect();

    let mut symbol_layout_map: FastHashMap<String, SymbolLayout> = FastHashMap::default();
    let mut buckets: FastHashMap<String, Arc<dyn Bucket>> = FastHashMap::default();
    let mut feature_index = FeatureIndex::new();
    let mut glyph_dependencies = GlyphDependencies::new();
    let mut icon_dependencies = IconDependencies::default();

    for group in group_by_layout(layers) {
        if obsolete.load(Ordering::Relaxed) {
            return Ok(LayoutRun::Aborted);
        }

        let data = match *data {
            TileData::Empty => continue,
            TileData::Loaded(ref data) => data,
        };

        let leader = group[0];
        let geometry_layer = match data.layer(&leader.source_layer)? {
            Some(layer) => layer,
            None => continue,
        };

        let layer_ids: Vec<String> = group.iter().map(|layer| layer.id.clone()).collect();
        feature_index.set_bucket_layer_ids(&leader.id, layer_ids);

        if leader.is_symbol() {
            let symbol_layout = SymbolLayout::new(
                params,
                &group,
                geometry_layer,
                &mut glyph_dependencies,
                &mut icon_dependencies,
            );
            symbol_layout_map.insert(leader.id.clone(), symbol_layout);
        } else {
            let mut bucket = match leader.create_bucket(params) {
                Some(bucket) => bucket,
                None => continue,
            };

            for index in 0..geometry_layer.feature_count() {
                if obsolete.load(Ordering::Relaxed) {
                    return Ok(LayoutRun::Aborted);
                }
                let feature = geometry_layer.feature(index);
                let lookup = |key: &str| feature.value(key);
                if !leader
                    .filter
                    .evaluate(feature.feature_type(), feature.id().as_ref(), &lookup)
                {
                    continue;
                }

                let geometries = feature.geometries();
                bucket.add_feature(feature, &geometries)?;
                feature_index.insert(&geometries, index, &leader.source_layer, &leader.id);
            }

            if !bucket.has_data() {
                continue;
            }
            let shared: Arc<dyn Bucket> = Arc::from(bucket);
            for layer in &group {
                buckets.insert(layer.id.clone(), shared.clone());
            }
        }
    }

    // Materialize symbol layouts in the captured order. Groups whose
    // source layer was missing have no entry.
    let mut symbol_layouts = Vec::with_capacity(symbol_layout_map.len());
    for id in &symbol_order {
        if let Some(symbol_layout) = symbol_layout_map.remove(id) {
            symbol_layouts.push(symbol_layout);
        }
    }

    Ok(LayoutRun::Finished {
        buckets,
        feature_index,
        symbol_layouts,
        glyph_dependencies,
        icon_dependencies,
    })
}
