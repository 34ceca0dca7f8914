/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::buckets::Bucket;
use crate::collision::CollisionTile;
use crate::feature_index::FeatureIndex;
use crate::geometry::GeometryTileData;
use crate::glyphs::{GlyphDependencies, GlyphPositionMap};
use crate::layers::Layer;
use crate::sprite::{IconAtlasMap, IconDependencies};
use fxhash::FxHasher;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::BuildHasherDefault;
use std::sync::Arc;

pub type FastHashMap<K, V> = HashMap<K, V, BuildHasherDefault<FxHasher>>;
pub type FastHashSet<K> = HashSet<K, BuildHasherDefault<FxHasher>>;

/// The canonical coordinate of a tile in the quad tree.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

/// A tile coordinate plus the zoom level its data is rendered at.
///
/// Past the source's maximum zoom the same canonical tile is reused for
/// deeper view zooms; `overscaled_z >= coord.z` always holds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct OverscaledTileCoord {
    pub coord: TileCoord,
    pub overscaled_z: u8,
}

impl OverscaledTileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> OverscaledTileCoord {
        OverscaledTileCoord {
            coord: TileCoord { z, x, y },
            overscaled_z: z,
        }
    }

    /// Scale factor between the overscaled zoom and the canonical zoom.
    pub fn overscale_factor(&self) -> u32 {
        1 << (self.overscaled_z - self.coord.z)
    }
}

impl fmt::Display for OverscaledTileCoord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}@{}",
            self.coord.z, self.coord.x, self.coord.y, self.overscaled_z
        )
    }
}

/// Tag associating an output with the most recent input that produced it.
///
/// Chosen by the parent, monotonically increasing. The worker stamps every
/// `LayoutResult` / `PlacementResult` with the highest id it has observed,
/// which lets the parent discard results that no longer match its state.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CorrelationId(pub u64);

/// How the map consuming this tile is being rendered.
///
/// Still-image rendering wants every label of the final frame in place with
/// no fade animations; the mode travels with the symbol buckets so the
/// renderer can tell the difference.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MapMode {
    Continuous,
    Still,
}

/// Decoded geometry for one tile, as delivered by `set_data`.
///
/// `Empty` is a valid terminal state: the tile is known to contain nothing,
/// and layout over it produces empty results. This is distinct from data
/// never having been set at all (`Option<TileData>::None` inside the
/// worker), which suppresses layout entirely.
pub enum TileData {
    Empty,
    Loaded(Box<dyn GeometryTileData>),
}

/// View parameters a placement run resolves collisions for.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacementConfig {
    pub zoom: f32,
    /// Map bearing in radians.
    pub angle: f32,
    /// Map pitch in radians.
    pub pitch: f32,
    /// Record every collision box and its verdict for the debug overlay.
    pub debug: bool,
}

impl PlacementConfig {
    pub fn new(zoom: f32, angle: f32, pitch: f32) -> PlacementConfig {
        PlacementConfig {
            zoom,
            angle,
            pitch,
            debug: false,
        }
    }
}

/// The worker's mailbox. `Coalesced` is only ever posted by the worker to
/// itself to mark the end of the message burst that triggered the current
/// unit of work; everything else comes from the parent tile.
pub enum WorkerMsg {
    SetData(TileData, CorrelationId),
    SetLayers(Vec<Layer>, CorrelationId),
    SetPlacementConfig(PlacementConfig, CorrelationId),
    GlyphsAvailable(GlyphPositionMap),
    IconsAvailable(IconAtlasMap),
    Coalesced,
    Stop,
}

/// Messages from the worker to its parent tile.
///
/// Within one handling pass the ordering is: dependency requests first (if
/// any), then `Layout`, then possibly `Placement`.
pub enum ResultMsg {
    /// Request the glyphs current symbol layouts need. Exactly one
    /// `GlyphsAvailable` response is expected, asynchronously.
    GetGlyphs(GlyphDependencies),
    /// Request the sprite atlases current symbol layouts need.
    GetIcons(IconDependencies),
    Layout(LayoutResult),
    Placement(PlacementResult),
    Error(TileError),
}

pub struct LayoutResult {
    pub buckets: FastHashMap<String, Arc<dyn Bucket>>,
    pub feature_index: FeatureIndex,
    /// A clone of the tile data the layout ran over, or `None` for an
    /// empty tile. The parent hands this to hit-testing queries.
    pub data: Option<Box<dyn GeometryTileData>>,
    pub correlation_id: CorrelationId,
    pub layout_time_ns: u64,
}

pub struct PlacementResult {
    pub buckets: FastHashMap<String, Arc<dyn Bucket>>,
    pub collision_tile: CollisionTile,
    pub correlation_id: CorrelationId,
    pub placement_time_ns: u64,
}

/// Failures reported to the parent as `ResultMsg::Error`.
///
/// Predictable absences (no data yet, no layers, no placement config,
/// unknown source layer, unsatisfied dependencies) are not errors; the
/// worker simply performs no work for them.
#[derive(Clone, Debug, PartialEq)]
pub enum TileError {
    /// The data source failed to produce a geometry layer.
    Data(String),
    /// A single feature exceeded the 16-bit vertex index space of its
    /// bucket segment.
    BucketOverflow { layer: String },
}

impl fmt::Display for TileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            TileError::Data(ref msg) => write!(f, "tile data error: {}", msg),
            TileError::BucketOverflow { ref layer } => {
                write!(f, "vertex index overflow in bucket for layer {:?}", layer)
            }
        }
    }
}

impl std::error::Error for TileError {}
