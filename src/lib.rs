/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Background layout and placement engine for vector map tiles.
//!
//! For each visible tile, a `TileWorker` actor consumes decoded geometry,
//! an ordered list of style layers and a placement configuration, and
//! produces the artifacts the renderer draws from: per-layer vertex/index
//! buckets with a spatial feature index (layout), and collision-resolved
//! symbol buckets for a specific view configuration (placement).
//!
//! The worker runs on its own thread and communicates with its parent tile
//! exclusively by message. Bursts of input changes are coalesced so that a
//! fast-zooming map produces at most one layout and one placement per
//! burst; see the state diagram in the `worker` module.

#[macro_use]
extern crate log;

pub mod api;
pub mod buckets;
pub mod collision;
pub mod dependencies;
pub mod feature_index;
pub mod filter;
pub mod geometry;
pub mod glyphs;
pub mod internal_types;
pub mod layers;
pub mod layout;
pub mod placement;
pub mod sprite;
pub mod symbol_layout;
pub mod util;
pub mod worker;

pub use crate::api::{spawn_tile_worker, TileWorkerApi};
pub use crate::internal_types::{
    CorrelationId, LayoutResult, MapMode, OverscaledTileCoord, PlacementConfig, PlacementResult,
    ResultMsg, TileCoord, TileData, TileError, WorkerMsg,
};
pub use crate::worker::TileWorker;
