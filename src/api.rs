/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::glyphs::GlyphPositionMap;
use crate::internal_types::{
    CorrelationId, MapMode, OverscaledTileCoord, PlacementConfig, ResultMsg, TileData, WorkerMsg,
};
use crate::layers::Layer;
use crate::sprite::IconAtlasMap;
use crate::worker::TileWorker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

/// The parent tile's handle to its worker.
///
/// All sends are fire-and-forget; a worker that has already stopped
/// silently drops them. The handle is also the single writer of the
/// obsolescence flag the worker polls during long runs.
#[derive(Clone)]
pub struct TileWorkerApi {
    tx: Sender<WorkerMsg>,
    obsolete: Arc<AtomicBool>,
}

impl TileWorkerApi {
    pub fn set_data(&self, data: TileData, correlation_id: CorrelationId) {
        let _ = self.tx.send(WorkerMsg::SetData(data, correlation_id));
    }

    pub fn set_layers(&self, layers: Vec<Layer>, correlation_id: CorrelationId) {
        let _ = self.tx.send(WorkerMsg::SetLayers(layers, correlation_id));
    }

    pub fn set_placement_config(&self, config: PlacementConfig, correlation_id: CorrelationId) {
        let _ = self
            .tx
            .send(WorkerMsg::SetPlacementConfig(config, correlation_id));
    }

    /// Deliver the response to a `ResultMsg::GetGlyphs` request.
    pub fn glyphs_available(&self, positions: GlyphPositionMap) {
        let _ = self.tx.send(WorkerMsg::GlyphsAvailable(positions));
    }

    /// Deliver the response to a `ResultMsg::GetIcons` request.
    pub fn icons_available(&self, icons: IconAtlasMap) {
        let _ = self.tx.send(WorkerMsg::IconsAvailable(icons));
    }

    /// Tell in-flight work to bail out at its next check. One-way: the
    /// flag never resets for this worker's lifetime.
    pub fn mark_obsolete(&self) {
        self.obsolete.store(true, Ordering::Relaxed);
    }

    pub fn is_obsolete(&self) -> bool {
        self.obsolete.load(Ordering::Relaxed)
    }

    /// Shut the worker thread down. Queued messages ahead of the stop are
    /// still handled.
    pub fn stop(&self) {
        let _ = self.tx.send(WorkerMsg::Stop);
    }
}

/// Spawn a worker on its own thread, paired with one tile for its
/// lifetime. Results arrive on `parent_tx`.
pub fn spawn_tile_worker(
    coord: OverscaledTileCoord,
    mode: MapMode,
    parent_tx: Sender<ResultMsg>,
) -> TileWorkerApi {
    let obsolete = Arc::new(AtomicBool::new(false));
    let (mut worker, tx) = TileWorker::new(coord, mode, obsolete.clone(), parent_tx);

    thread::Builder::new()
        .name(format!("TileWorker {}", coord))
        .spawn(move || {
            worker.run();
        })
        .unwrap();

    TileWorkerApi { tx, obsolete }
}
