/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! End-to-end scenarios for the tile worker actor: message coalescing,
//! correlation stamping, dependency waits, obsolescence and error
//! forwarding. The worker is driven through its public handlers and the
//! mailbox is drained explicitly, which makes the interleavings exact.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;

use vectile::buckets::Bucket;
use vectile::filter::Filter;
use vectile::geometry::{
    FeatureType, GeometryCoordinate, GeometryTileData, GeometryTileLayer, MemoryTileData,
    MemoryTileFeature, MemoryTileLayer, PropertyValue,
};
use vectile::glyphs::{GlyphMetrics, GlyphPosition, GlyphPositionMap};
use vectile::internal_types::{
    CorrelationId, FastHashMap, MapMode, OverscaledTileCoord, PlacementConfig, ResultMsg,
    TileData, TileError, WorkerMsg,
};
use vectile::layers::{Layer, LayerType, LineLayout, PaintProperties, SymbolLayoutProperties};
use vectile::worker::TileWorker;

fn new_worker() -> (TileWorker, Receiver<ResultMsg>, Sender<WorkerMsg>, Arc<AtomicBool>) {
    let obsolete = Arc::new(AtomicBool::new(false));
    let (parent_tx, parent_rx) = channel();
    let (worker, worker_tx) = TileWorker::new(
        OverscaledTileCoord::new(14, 8602, 5675),
        MapMode::Continuous,
        obsolete.clone(),
        parent_tx,
    );
    (worker, parent_rx, worker_tx, obsolete)
}

fn drain(rx: &Receiver<ResultMsg>) -> Vec<ResultMsg> {
    let mut messages = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        messages.push(msg);
    }
    messages
}

fn polygon(points: &[(i16, i16)]) -> MemoryTileFeature {
    MemoryTileFeature {
        feature_type: FeatureType::Polygon,
        id: None,
        properties: FastHashMap::default(),
        geometries: vec![points
            .iter()
            .map(|&(x, y)| GeometryCoordinate::new(x, y))
            .collect()],
    }
}

fn named_point(name: &str, x: i16, y: i16) -> MemoryTileFeature {
    let mut properties = FastHashMap::default();
    properties.insert("name".to_string(), PropertyValue::String(name.to_string()));
    MemoryTileFeature {
        feature_type: FeatureType::Point,
        id: None,
        properties,
        geometries: vec![vec![GeometryCoordinate::new(x, y)]],
    }
}

fn tile_data() -> MemoryTileData {
    MemoryTileData {
        layers: vec![
            MemoryTileLayer {
                name: "water".to_string(),
                features: vec![
                    polygon(&[(0, 0), (1000, 0), (1000, 1000), (0, 1000)]),
                    polygon(&[(2000, 2000), (3000, 2000), (3000, 3000)]),
                ],
            },
            MemoryTileLayer {
                name: "poi".to_string(),
                features: vec![named_point("AB", 4096, 4096)],
            },
        ],
    }
}

fn fill_layer(id: &str) -> Layer {
    Layer {
        id: id.to_string(),
        source_layer: "water".to_string(),
        filter: Filter::default(),
        layer_type: LayerType::Fill,
        paint: PaintProperties::default(),
    }
}

fn line_layer(id: &str) -> Layer {
    Layer {
        id: id.to_string(),
        source_layer: "water".to_string(),
        filter: Filter::default(),
        layer_type: LayerType::Line(LineLayout::default()),
        paint: PaintProperties::default(),
    }
}

fn symbol_layer(id: &str) -> Layer {
    Layer {
        id: id.to_string(),
        source_layer: "poi".to_string(),
        filter: Filter::default(),
        layer_type: LayerType::Symbol(SymbolLayoutProperties {
            text_field: Some("{name}".to_string()),
            ..SymbolLayoutProperties::default()
        }),
        paint: PaintProperties::default(),
    }
}

fn loaded() -> TileData {
    TileData::Loaded(Box::new(tile_data()))
}

fn glyph_positions(font: &str, text: &str) -> GlyphPositionMap {
    let mut per_font = FastHashMap::default();
    for ch in text.chars() {
        per_font.insert(
            ch as u16,
            GlyphPosition {
                rect: euclid::TypedRect::new(
                    euclid::TypedPoint2D::new(0, 0),
                    euclid::TypedSize2D::new(16, 20),
                ),
                metrics: GlyphMetrics {
                    width: 14,
                    height: 18,
                    left: 1,
                    top: 14,
                    advance: 15,
                },
            },
        );
    }
    let mut map = GlyphPositionMap::default();
    map.insert(font.to_string(), per_font);
    map
}

// S1: a single burst produces exactly one layout followed by exactly one
// placement. The layout begins while correlation 2 is the newest observed
// input; the placement observes 3.
#[test]
fn single_burst() {
    let (mut worker, parent_rx, _tx, _obsolete) = new_worker();

    worker.set_data(loaded(), CorrelationId(1));
    worker.set_layers(vec![fill_layer("water")], CorrelationId(2));
    worker.set_placement_config(PlacementConfig::new(14.0, 0.0, 0.0), CorrelationId(3));
    worker.process_queued();

    let messages = drain(&parent_rx);
    assert_eq!(messages.len(), 2);
    match messages[0] {
        ResultMsg::Layout(ref result) => {
            assert_eq!(result.correlation_id, CorrelationId(2));
            assert_eq!(result.buckets.len(), 1);
            assert!(result.buckets["water"].has_data());
            assert!(result.data.is_some());
            assert!(!result.feature_index.is_empty());
        }
        _ => panic!("expected layout first"),
    }
    match messages[1] {
        ResultMsg::Placement(ref result) => {
            assert_eq!(result.correlation_id, CorrelationId(3));
        }
        _ => panic!("expected placement second"),
    }
}

// S2: a storm of placement configs coalesces. The config that arrives
// during placement work is superseded by the next one before the burst
// marker is consumed; only the first and last produce output.
#[test]
fn placement_storm() {
    let (mut worker, parent_rx, _tx, _obsolete) = new_worker();

    worker.set_data(loaded(), CorrelationId(1));
    worker.set_layers(vec![fill_layer("water")], CorrelationId(2));
    worker.set_placement_config(PlacementConfig::new(14.0, 0.0, 0.0), CorrelationId(3));
    // These two arrive while the Coalesced marker from placement #1 is
    // still queued.
    worker.set_placement_config(PlacementConfig::new(14.5, 0.1, 0.0), CorrelationId(4));
    worker.set_placement_config(PlacementConfig::new(15.0, 0.2, 0.0), CorrelationId(5));
    worker.process_queued();

    let messages = drain(&parent_rx);
    let placements: Vec<&ResultMsg> = messages
        .iter()
        .filter(|msg| match msg {
            ResultMsg::Placement(..) => true,
            _ => false,
        })
        .collect();
    let layouts = messages
        .iter()
        .filter(|msg| match msg {
            ResultMsg::Layout(..) => true,
            _ => false,
        })
        .count();

    // One layout (for the data/layers), two placements (P1 and P3; P2 was
    // coalesced away).
    assert_eq!(layouts, 1);
    assert_eq!(placements.len(), 2);
    match placements[0] {
        &ResultMsg::Placement(ref result) => {
            assert_eq!(result.correlation_id, CorrelationId(3))
        }
        _ => unreachable!(),
    }
    match placements[1] {
        &ResultMsg::Placement(ref result) => {
            assert_eq!(result.correlation_id, CorrelationId(5));
            assert_eq!(result.collision_tile.config.zoom, 15.0);
        }
        _ => unreachable!(),
    }
}

// S3: when both a placement config and a layer change are queued behind
// the burst marker, the next unit of work is a layout (which then chains
// its own placement).
#[test]
fn layout_wins_over_placement() {
    let (mut worker, parent_rx, _tx, _obsolete) = new_worker();

    worker.set_data(loaded(), CorrelationId(1));
    worker.set_layers(vec![fill_layer("water")], CorrelationId(2));
    worker.set_placement_config(PlacementConfig::new(14.0, 0.0, 0.0), CorrelationId(3));
    worker.process_queued();
    drain(&parent_rx);

    // From Idle: the config change triggers an immediate placement, and
    // before its burst marker is handled a layer change arrives.
    worker.set_placement_config(PlacementConfig::new(15.0, 0.0, 0.0), CorrelationId(4));
    worker.set_layers(
        vec![fill_layer("water"), line_layer("shore")],
        CorrelationId(5),
    );
    worker.process_queued();

    let messages = drain(&parent_rx);
    assert_eq!(messages.len(), 3);
    match messages[0] {
        ResultMsg::Placement(ref result) => {
            assert_eq!(result.correlation_id, CorrelationId(4))
        }
        _ => panic!("expected the immediate placement first"),
    }
    match messages[1] {
        ResultMsg::Layout(ref result) => {
            assert_eq!(result.correlation_id, CorrelationId(5));
            assert_eq!(result.buckets.len(), 2);
        }
        _ => panic!("expected the coalesced work to be a layout"),
    }
    match messages[2] {
        ResultMsg::Placement(ref result) => {
            assert_eq!(result.correlation_id, CorrelationId(5))
        }
        _ => panic!("expected the layout to chain a placement"),
    }
}

// S4: symbol layers make layout request glyphs; placement holds until the
// response arrives.
#[test]
fn glyph_wait_gates_placement() {
    let (mut worker, parent_rx, _tx, _obsolete) = new_worker();

    worker.set_data(loaded(), CorrelationId(1));
    worker.set_layers(vec![symbol_layer("labels")], CorrelationId(2));

    let messages = drain(&parent_rx);
    assert_eq!(messages.len(), 2);
    match messages[0] {
        ResultMsg::GetGlyphs(ref deps) => {
            let required: Vec<u16> = deps
                .iter()
                .flat_map(|(_, glyphs)| glyphs.iter().cloned())
                .collect();
            assert_eq!(required.len(), 2); // 'A' and 'B'
            assert!(required.contains(&(b'A' as u16)));
            assert!(required.contains(&(b'B' as u16)));
        }
        _ => panic!("expected the glyph request before the layout result"),
    }
    match messages[1] {
        ResultMsg::Layout(ref result) => {
            // Symbol buckets don't exist until placement.
            assert!(result.buckets.is_empty());
            assert_eq!(result.correlation_id, CorrelationId(2));
        }
        _ => panic!("expected a layout result"),
    }

    // A config alone cannot unblock placement while glyphs are pending.
    worker.set_placement_config(PlacementConfig::new(14.0, 0.0, 0.0), CorrelationId(3));
    worker.process_queued();
    assert!(drain(&parent_rx).is_empty());

    worker.on_glyphs_available(glyph_positions("Open Sans Regular", "AB"));
    worker.process_queued();

    let messages = drain(&parent_rx);
    assert_eq!(messages.len(), 1);
    match messages[0] {
        ResultMsg::Placement(ref result) => {
            assert_eq!(result.correlation_id, CorrelationId(3));
            assert_eq!(result.buckets.len(), 1);
            assert!(result.buckets["labels"].has_data());
        }
        _ => panic!("expected a placement after the glyph response"),
    }
}

// Data wrapper that flips the obsolete flag the moment layout starts
// reading it, simulating the parent abandoning the tile mid-layout.
struct ObsoletingData {
    inner: MemoryTileData,
    obsolete: Arc<AtomicBool>,
}

impl GeometryTileData for ObsoletingData {
    fn layer(&self, name: &str) -> Result<Option<&dyn GeometryTileLayer>, TileError> {
        self.obsolete.store(true, Ordering::Relaxed);
        self.inner.layer(name)
    }

    fn clone_data(&self) -> Box<dyn GeometryTileData> {
        Box::new(ObsoletingData {
            inner: self.inner.clone(),
            obsolete: self.obsolete.clone(),
        })
    }
}

// S5: an obsolete flag observed mid-layout suppresses the result, and the
// worker stays silent from then on.
#[test]
fn obsolete_suppresses_all_output() {
    let (mut worker, parent_rx, _tx, obsolete) = new_worker();

    worker.set_data(
        TileData::Loaded(Box::new(ObsoletingData {
            inner: tile_data(),
            obsolete: obsolete.clone(),
        })),
        CorrelationId(1),
    );
    worker.set_layers(vec![fill_layer("water")], CorrelationId(2));
    worker.process_queued();
    assert!(drain(&parent_rx).is_empty());

    // Everything after the flag flips is silent too.
    worker.set_placement_config(PlacementConfig::new(14.0, 0.0, 0.0), CorrelationId(3));
    worker.set_layers(vec![fill_layer("water")], CorrelationId(4));
    worker.process_queued();
    assert!(drain(&parent_rx).is_empty());
}

// S6: data and layers complete a layout that parks waiting for the first
// placement config; its late arrival triggers placement immediately.
#[test]
fn first_config_after_layout() {
    let (mut worker, parent_rx, _tx, _obsolete) = new_worker();

    worker.set_data(loaded(), CorrelationId(1));
    worker.set_layers(vec![fill_layer("water")], CorrelationId(2));
    worker.process_queued();

    let messages = drain(&parent_rx);
    assert_eq!(messages.len(), 1);
    match messages[0] {
        ResultMsg::Layout(..) => {}
        _ => panic!("expected only the layout before a config exists"),
    }

    worker.set_placement_config(PlacementConfig::new(14.0, 0.0, 0.0), CorrelationId(3));
    worker.process_queued();

    let messages = drain(&parent_rx);
    assert_eq!(messages.len(), 1);
    match messages[0] {
        ResultMsg::Placement(ref result) => {
            assert_eq!(result.correlation_id, CorrelationId(3))
        }
        _ => panic!("expected an immediate placement"),
    }
}

// Boundary: an empty layer list still produces a (trivial) layout result.
#[test]
fn empty_layer_list() {
    let (mut worker, parent_rx, _tx, _obsolete) = new_worker();

    worker.set_data(loaded(), CorrelationId(1));
    worker.set_layers(Vec::new(), CorrelationId(2));
    worker.process_queued();

    let messages = drain(&parent_rx);
    assert_eq!(messages.len(), 1);
    match messages[0] {
        ResultMsg::Layout(ref result) => {
            assert!(result.buckets.is_empty());
            assert!(result.feature_index.is_empty());
            assert!(result.data.is_some());
            assert_eq!(result.correlation_id, CorrelationId(2));
        }
        _ => panic!("expected an empty layout"),
    }
}

// Boundary: a tile known to be empty lays out to empty buckets and no
// data clone.
#[test]
fn empty_tile_with_layers() {
    let (mut worker, parent_rx, _tx, _obsolete) = new_worker();

    worker.set_data(TileData::Empty, CorrelationId(1));
    worker.set_layers(vec![fill_layer("water"), symbol_layer("labels")], CorrelationId(2));
    worker.process_queued();

    let messages = drain(&parent_rx);
    assert_eq!(messages.len(), 1);
    match messages[0] {
        ResultMsg::Layout(ref result) => {
            assert!(result.buckets.is_empty());
            assert!(result.data.is_none());
            assert_eq!(result.correlation_id, CorrelationId(2));
        }
        _ => panic!("expected an empty layout"),
    }
}

// No layout happens until both data and layers exist.
#[test]
fn layout_needs_data_and_layers() {
    let (mut worker, parent_rx, _tx, _obsolete) = new_worker();

    worker.set_layers(vec![fill_layer("water")], CorrelationId(1));
    worker.process_queued();
    assert!(drain(&parent_rx).is_empty());

    worker.set_placement_config(PlacementConfig::new(14.0, 0.0, 0.0), CorrelationId(2));
    worker.process_queued();
    assert!(drain(&parent_rx).is_empty());

    worker.set_data(loaded(), CorrelationId(3));
    worker.process_queued();

    let messages = drain(&parent_rx);
    assert_eq!(messages.len(), 2);
    match messages[0] {
        ResultMsg::Layout(ref result) => {
            assert_eq!(result.correlation_id, CorrelationId(3))
        }
        _ => panic!("expected a layout once inputs completed"),
    }
    match messages[1] {
        ResultMsg::Placement(ref result) => {
            assert_eq!(result.correlation_id, CorrelationId(3))
        }
        _ => panic!("expected the chained placement"),
    }
}

// Grouped layers share one bucket and the feature index maps the leader
// to the whole group; hit-testing round-trips feature indices in
// insertion order.
#[test]
fn grouped_layers_and_feature_index() {
    let (mut worker, parent_rx, _tx, _obsolete) = new_worker();

    let mut styled = fill_layer("water-shadow");
    styled
        .paint
        .values
        .insert("fill-color".to_string(), PropertyValue::String("#001830".to_string()));

    worker.set_data(loaded(), CorrelationId(1));
    worker.set_layers(vec![styled, fill_layer("water")], CorrelationId(2));
    worker.process_queued();

    let messages = drain(&parent_rx);
    match messages[0] {
        ResultMsg::Layout(ref result) => {
            assert_eq!(result.buckets.len(), 2);
            // Same bucket behind both ids.
            assert!(Arc::ptr_eq(
                &result.buckets["water-shadow"],
                &result.buckets["water"]
            ));

            let ids = result
                .feature_index
                .bucket_layer_ids("water-shadow")
                .expect("leader registered");
            assert_eq!(ids, &["water-shadow".to_string(), "water".to_string()][..]);

            // Both water polygons are found, in insertion order.
            let query = vec![vec![
                GeometryCoordinate::new(0, 0),
                GeometryCoordinate::new(4000, 4000),
            ]];
            let hits = result.feature_index.query(&query);
            assert_eq!(hits.len(), 2);
            assert_eq!(hits[0].feature_index, 0);
            assert_eq!(hits[1].feature_index, 1);
            assert_eq!(hits[0].bucket_leader_id, "water-shadow");
        }
        _ => panic!("expected a layout"),
    }
}

struct FailingData;

impl GeometryTileData for FailingData {
    fn layer(&self, _name: &str) -> Result<Option<&dyn GeometryTileLayer>, TileError> {
        Err(TileError::Data("corrupt layer directory".to_string()))
    }

    fn clone_data(&self) -> Box<dyn GeometryTileData> {
        Box::new(FailingData)
    }
}

// A failing data source becomes an error message, and the worker keeps
// working once good data replaces it.
#[test]
fn data_errors_are_forwarded() {
    let (mut worker, parent_rx, _tx, _obsolete) = new_worker();

    worker.set_data(TileData::Loaded(Box::new(FailingData)), CorrelationId(1));
    worker.set_layers(vec![fill_layer("water")], CorrelationId(2));
    worker.process_queued();

    let messages = drain(&parent_rx);
    assert_eq!(messages.len(), 1);
    match messages[0] {
        ResultMsg::Error(TileError::Data(ref msg)) => {
            assert_eq!(msg, "corrupt layer directory")
        }
        _ => panic!("expected the decode failure to be forwarded"),
    }

    worker.set_data(loaded(), CorrelationId(3));
    worker.process_queued();

    let messages = drain(&parent_rx);
    assert_eq!(messages.len(), 1);
    match messages[0] {
        ResultMsg::Layout(ref result) => {
            assert_eq!(result.correlation_id, CorrelationId(3));
            assert_eq!(result.buckets.len(), 1);
        }
        _ => panic!("expected recovery after good data"),
    }
}

// A second layout rebuilds symbol layouts from scratch and re-requests
// glyphs when the dependency set changes.
#[test]
fn relayout_replaces_dependencies() {
    let (mut worker, parent_rx, _tx, _obsolete) = new_worker();

    worker.set_data(loaded(), CorrelationId(1));
    worker.set_layers(vec![symbol_layer("labels")], CorrelationId(2));
    worker.on_glyphs_available(glyph_positions("Open Sans Regular", "AB"));
    worker.set_placement_config(PlacementConfig::new(14.0, 0.0, 0.0), CorrelationId(3));
    worker.process_queued();
    drain(&parent_rx);

    // New data renames the label; its glyphs are not in the delivered set,
    // so the layout must request again.
    let mut data = tile_data();
    data.layers[1].features = vec![named_point("XY", 4096, 4096)];
    worker.set_data(TileData::Loaded(Box::new(data)), CorrelationId(4));
    worker.process_queued();

    let messages = drain(&parent_rx);
    assert_eq!(messages.len(), 2);
    match messages[0] {
        ResultMsg::GetGlyphs(ref deps) => {
            let required: Vec<u16> = deps
                .iter()
                .flat_map(|(_, glyphs)| glyphs.iter().cloned())
                .collect();
            assert!(required.contains(&(b'X' as u16)));
        }
        _ => panic!("expected a fresh glyph request"),
    }
    match messages[1] {
        ResultMsg::Layout(ref result) => {
            assert_eq!(result.correlation_id, CorrelationId(4))
        }
        _ => panic!("expected the layout result"),
    }

    // Placement waits for the new glyphs even though a config exists.
    worker.process_queued();
    assert!(drain(&parent_rx).is_empty());

    worker.on_glyphs_available(glyph_positions("Open Sans Regular", "XY"));
    worker.process_queued();
    let messages = drain(&parent_rx);
    assert_eq!(messages.len(), 1);
    match messages[0] {
        ResultMsg::Placement(ref result) => {
            assert_eq!(result.correlation_id, CorrelationId(4))
        }
        _ => panic!("expected placement after the new glyphs"),
    }
}
