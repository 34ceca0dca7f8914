/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::dependencies::DependencyTracker;
use crate::glyphs::GlyphPositionMap;
use crate::internal_types::{
    CorrelationId, LayoutResult, MapMode, OverscaledTileCoord, PlacementConfig, PlacementResult,
    ResultMsg, TileData, TileError, WorkerMsg,
};
use crate::layers::{BucketParameters, Layer};
use crate::layout::{self, LayoutRun};
use crate::placement;
use crate::sprite::IconAtlasMap;
use crate::symbol_layout::SymbolLayout;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use time::precise_time_ns;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum State {
    Idle,
    Coalescing,
    NeedLayout,
    NeedPlacement,
}

/// The per-tile background worker: a single-threaded actor owning all of
/// its state, fed by its parent tile and by itself.
///
/// State machine:
///
/// ```text
///                  [Idle] <---------------------------------.
///                    |                                      |
///         set_data / set_layers / set_placement_config      |
///                    |                                      |
///   (layout and/or placement; self-post Coalesced)          |
///                    v                                      |
///               [Coalescing] ---- Coalesced ----------------'
///                  |      |
///     set_data/set_layers set_placement_config
///                  v      v
///         [NeedLayout]   [NeedPlacement]
///                  \      /
///          Coalesced / dependency arrival / first config
///                    |
///     (layout or placement; self-post Coalesced; -> Coalescing)
/// ```
///
/// While layout or placement runs, further `set_*` messages pile up in the
/// mailbox; the self-posted `Coalesced` marker tells the worker when that
/// burst has been drained, at which point at most one more layout (which
/// wins over placement, because a completed layout triggers placement
/// itself) or one more placement runs. Results carry the correlation id of
/// the newest input they observed.
///
/// Layout defers to `NeedPlacement` without posting `Coalesced` when the
/// placement config is still missing or symbol dependencies are
/// outstanding; the first config or the dependency response resumes the
/// machine from there.
pub struct TileWorker {
    rx: Receiver<WorkerMsg>,
    self_tx: Sender<WorkerMsg>,
    parent_tx: Sender<ResultMsg>,
    coord: OverscaledTileCoord,
    mode: MapMode,
    /// Owned by the parent, read-only here, checked at every loop
    /// boundary of layout and placement.
    obsolete: Arc<AtomicBool>,

    state: State,
    correlation_id: CorrelationId,
    data: Option<TileData>,
    layers: Option<Vec<Layer>>,
    placement_config: Option<PlacementConfig>,
    dependencies: DependencyTracker,
    symbol_layouts: Vec<SymbolLayout>,
}

impl TileWorker {
    pub fn new(
        coord: OverscaledTileCoord,
        mode: MapMode,
        obsolete: Arc<AtomicBool>,
        parent_tx: Sender<ResultMsg>,
    ) -> (TileWorker, Sender<WorkerMsg>) {
        let (tx, rx) = channel();
        (
            TileWorker {
                rx,
                self_tx: tx.clone(),
                parent_tx,
                coord,
                mode,
                obsolete,
                state: State::Idle,
                correlation_id: CorrelationId::default(),
                data: None,
                layers: None,
                placement_config: None,
                dependencies: DependencyTracker::new(),
                symbol_layouts: Vec::new(),
            },
            tx,
        )
    }

    /// The worker thread's event loop. Returns when a `Stop` arrives or
    /// every outside sender is gone.
    pub fn run(&mut self) {
        loop {
            match self.rx.recv() {
                Ok(WorkerMsg::Stop) | Err(_) => break,
                Ok(msg) => self.handle(msg),
            }
        }
        debug!("tile worker {} stopped", self.coord);
    }

    /// Drain every message already in the mailbox without blocking, for
    /// embedders that drive the worker from their own scheduler instead of
    /// a dedicated thread.
    pub fn process_queued(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(WorkerMsg::Stop) => break,
                Ok(msg) => self.handle(msg),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn handle(&mut self, msg: WorkerMsg) {
        match msg {
            WorkerMsg::SetData(data, correlation_id) => self.set_data(data, correlation_id),
            WorkerMsg::SetLayers(layers, correlation_id) => self.set_layers(layers, correlation_id),
            WorkerMsg::SetPlacementConfig(config, correlation_id) => {
                self.set_placement_config(config, correlation_id)
            }
            WorkerMsg::GlyphsAvailable(positions) => self.on_glyphs_available(positions),
            WorkerMsg::IconsAvailable(icons) => self.on_icons_available(icons),
            WorkerMsg::Coalesced => self.coalesced(),
            WorkerMsg::Stop => {}
        }
    }

    pub fn set_data(&mut self, data: TileData, correlation_id: CorrelationId) {
        self.data = Some(data);
        self.correlation_id = correlation_id;

        match self.state {
            State::Idle => self.try_layout(),
            State::Coalescing | State::NeedPlacement => self.state = State::NeedLayout,
            State::NeedLayout => {}
        }
    }

    pub fn set_layers(&mut self, layers: Vec<Layer>, correlation_id: CorrelationId) {
        self.layers = Some(layers);
        self.correlation_id = correlation_id;

        match self.state {
            State::Idle => self.try_layout(),
            State::Coalescing | State::NeedPlacement => self.state = State::NeedLayout,
            State::NeedLayout => {}
        }
    }

    pub fn set_placement_config(&mut self, config: PlacementConfig, correlation_id: CorrelationId) {
        let first_placement = self.placement_config.is_none();
        self.placement_config = Some(config);
        self.correlation_id = correlation_id;

        match self.state {
            State::Idle => self.try_placement(),
            State::Coalescing => self.state = State::NeedPlacement,
            // The one-shot first-config rule: layout/placement may have
            // parked waiting for a configuration that only now exists.
            State::NeedPlacement => {
                if first_placement {
                    self.try_placement();
                }
            }
            State::NeedLayout => {
                if first_placement && !self.dependencies.has_pending() {
                    self.try_layout();
                }
            }
        }
    }

    pub fn on_glyphs_available(&mut self, positions: GlyphPositionMap) {
        self.dependencies.glyphs_available(positions);
        self.symbol_dependencies_changed();
    }

    pub fn on_icons_available(&mut self, icons: IconAtlasMap) {
        self.dependencies.icons_available(icons);
        self.symbol_dependencies_changed();
    }

    fn symbol_dependencies_changed(&mut self) {
        match self.state {
            State::NeedPlacement => self.try_placement(),
            State::NeedLayout => {
                if !self.dependencies.has_pending() {
                    self.try_layout();
                }
            }
            // Dependencies are only ever requested by a layout that then
            // parked in NeedPlacement (or was superseded into NeedLayout);
            // a response in any other state is a protocol violation.
            State::Idle | State::Coalescing => {
                debug_assert!(false, "dependency response in state {:?}", self.state);
                warn!(
                    "tile worker {}: unexpected dependency response in {:?}",
                    self.coord, self.state
                );
            }
        }
    }

    fn coalesced(&mut self) {
        match self.state {
            State::Idle => {
                debug_assert!(false, "coalesced marker in Idle");
                warn!("tile worker {}: stray coalesced marker", self.coord);
            }
            State::Coalescing => self.state = State::Idle,
            State::NeedLayout => {
                // Don't relayout while symbol dependencies are
                // outstanding: the rerun would invalidate the outstanding
                // request, but its response would still be treated as
                // valid when it arrives.
                if !self.dependencies.has_pending() {
                    self.try_layout();
                }
            }
            State::NeedPlacement => self.try_placement(),
        }
    }

    fn try_layout(&mut self) {
        if let Err(error) = self.redo_layout() {
            warn!("tile worker {}: layout failed: {}", self.coord, error);
            let _ = self.parent_tx.send(ResultMsg::Error(error));
        }
    }

    fn try_placement(&mut self) {
        if let Err(error) = self.attempt_placement() {
            warn!("tile worker {}: placement failed: {}", self.coord, error);
            let _ = self.parent_tx.send(ResultMsg::Error(error));
        }
    }

    /// Rebuild buckets, feature index and symbol layouts from the current
    /// data and layers. No-op (and no transition) while either is missing;
    /// silent return when obsolete. On completion either chains straight
    /// into placement or parks in `NeedPlacement`.
    fn redo_layout(&mut self) -> Result<(), TileError> {
        let start_time = precise_time_ns();
        let run = {
            let (data, layers) = match (&self.data, &self.layers) {
                (&Some(ref data), &Some(ref layers)) => (data, layers),
                _ => return Ok(()),
            };
            let params = BucketParameters {
                coord: self.coord,
                mode: self.mode,
            };
            layout::run_layout(data, layers, &params, &self.obsolete)?
        };

        let (buckets, feature_index, symbol_layouts, glyph_dependencies, icon_dependencies) =
            match run {
                LayoutRun::Aborted => {
                    debug!("tile worker {}: layout aborted, obsolete", self.coord);
                    return Ok(());
                }
                LayoutRun::Finished {
                    buckets,
                    feature_index,
                    symbol_layouts,
                    glyph_dependencies,
                    icon_dependencies,
                } => (
                    buckets,
                    feature_index,
                    symbol_layouts,
                    glyph_dependencies,
                    icon_dependencies,
                ),
            };

        self.symbol_layouts = symbol_layouts;

        if !self.dependencies.has_glyph_dependencies(&glyph_dependencies) {
            self.dependencies.begin_glyph_wait();
            let _ = self.parent_tx.send(ResultMsg::GetGlyphs(glyph_dependencies));
        }
        if !self.dependencies.has_icon_dependencies(&icon_dependencies) {
            self.dependencies.begin_icon_wait();
            let _ = self.parent_tx.send(ResultMsg::GetIcons(icon_dependencies));
        }

        let data = match self.data {
            Some(TileData::Loaded(ref data)) => Some(data.clone_data()),
            _ => None,
        };
        let layout_time_ns = precise_time_ns() - start_time;
        debug!(
            "tile worker {}: layout of {} buckets took {}us",
            self.coord,
            buckets.len(),
            layout_time_ns / 1000
        );
        let _ = self.parent_tx.send(ResultMsg::Layout(LayoutResult {
            buckets,
            feature_index,
            data,
            correlation_id: self.correlation_id,
            layout_time_ns,
        }));

        if self.placement_config.is_none() || self.dependencies.has_pending() {
            self.state = State::NeedPlacement;
            Ok(())
        } else {
            self.attempt_placement()
        }
    }

    /// Run collision placement over the current symbol layouts. No-op
    /// while data, layers or config are missing or a dependency request is
    /// outstanding; silent return when obsolete. On completion enters
    /// `Coalescing` and posts the burst-end marker to itself.
    fn attempt_placement(&mut self) -> Result<(), TileError> {
        if self.data.is_none() || self.layers.is_none() {
            return Ok(());
        }
        let config = match self.placement_config {
            Some(ref config) => config.clone(),
            None => return Ok(()),
        };
        if self.dependencies.has_pending() {
            return Ok(());
        }

        let start_time = precise_time_ns();
        let outcome = placement::run_placement(
            &mut self.symbol_layouts,
            &config,
            self.dependencies.glyph_positions(),
            self.dependencies.icons(),
            &self.obsolete,
        )?;
        let (buckets, collision_tile) = match outcome {
            Some(outcome) => outcome,
            None => {
                debug!("tile worker {}: placement aborted, obsolete", self.coord);
                return Ok(());
            }
        };

        let placement_time_ns = precise_time_ns() - start_time;
        debug!(
            "tile worker {}: placement of {} buckets took {}us",
            self.coord,
            buckets.len(),
            placement_time_ns / 1000
        );
        let _ = self.parent_tx.send(ResultMsg::Placement(PlacementResult {
            buckets,
            collision_tile,
            correlation_id: self.correlation_id,
            placement_time_ns,
        }));

        self.state = State::Coalescing;
        let _ = self.self_tx.send(WorkerMsg::Coalesced);
        Ok(())
    }
}
