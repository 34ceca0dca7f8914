/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::buckets::Bucket;
use crate::collision::CollisionTile;
use crate::glyphs::GlyphPositionMap;
use crate::internal_types::{FastHashMap, PlacementConfig, TileError};
use crate::sprite::IconAtlasMap;
use crate::symbol_layout::{SymbolLayout, SymbolLayoutState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Run collision placement over prepared symbol layouts.
///
/// Shaping (`prepare`) happens at most once per layout, on the first
/// placement after its dependencies arrived; subsequent placements for new
/// configurations reuse the prepared instances. Returns `None` when the
/// obsolete flag cut the run short.
pub fn run_placement(
    symbol_layouts: &mut [SymbolLayout],
    config: &PlacementConfig,
    glyphs: &GlyphPositionMap,
    icons: &IconAtlasMap,
    obsolete: &AtomicBool,
) -> Result<Option<(FastHashMap<String, Arc<dyn Bucket>>, CollisionTile)>, TileError> {
    if obsolete.load(Ordering::Relaxed) {
        return Ok(None);
    }

    let mut collision_tile = CollisionTile::new(config.clone());
    let mut buckets: FastHashMap<String, Arc<dyn Bucket>> = FastHashMap::default();

    for symbol_layout in symbol_layouts.iter_mut() {
        if obsolete.load(Ordering::Relaxed) {
            return Ok(None);
        }

        if symbol_layout.state == SymbolLayoutState::Pending {
            symbol_layout.prepare(glyphs, icons);
        }
        symbol_layout.state = SymbolLayoutState::Placed;

        if !symbol_layout.has_symbol_instances() {
            continue;
        }

        let bucket = symbol_layout.place(&mut collision_tile)?;
        let shared: Arc<dyn Bucket> = Arc::new(bucket);
        for &(ref layer_id, _) in &symbol_layout.layer_paint_properties {
            buckets.insert(layer_id.clone(), shared.clone());
        }
    }

    Ok(Some((buckets, collision_tile)))
}
