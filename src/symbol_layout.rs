/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::buckets::{SymbolBucket, SymbolQuad};
use crate::collision::{CollisionBox, CollisionFeature, CollisionTile};
use crate::geometry::{
    FeatureType, GeometryCollection, GeometryCoordinate, GeometryTileLayer, PropertyValue,
    TilePoint, TileSize, TileRect,
};
use crate::glyphs::{GlyphDependencies, GlyphPositionMap, GLYPH_RENDER_SIZE};
use crate::internal_types::TileError;
use crate::layers::{BucketParameters, Layer, LayerType, PaintProperties, SymbolLayoutProperties};
use crate::sprite::{IconAtlasMap, IconDependencies};
use smallvec::SmallVec;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SymbolLayoutState {
    /// Features captured, waiting for glyphs/icons.
    Pending,
    /// Shaped into quads and collision boxes; reusable across placements.
    Prepared,
    /// Has been through at least one placement run.
    Placed,
}

/// A feature that survived the filter, reduced to what symbol shaping
/// needs: its geometry and its resolved text/icon strings.
struct SymbolFeature {
    feature_type: FeatureType,
    geometries: GeometryCollection,
    text: Option<String>,
    icon: Option<String>,
}

/// One anchor's worth of shaped symbol: quads to draw if placement lets
/// it, boxes to claim when it does.
struct SymbolInstance {
    anchor: GeometryCoordinate,
    text_quads: Vec<SymbolQuad>,
    icon_quad: Option<SymbolQuad>,
    text_collision: CollisionFeature,
    icon_collision: CollisionFeature,
}

/// Two-phase layout of one symbol layer group.
///
/// Construction (during layout) captures filtered features and reports the
/// glyphs and atlases they will need. `prepare` (during the first
/// placement after dependencies arrived) shapes them into quads once;
/// `place` runs per placement configuration. A `SymbolLayout` is never
/// reused across layout runs.
pub struct SymbolLayout {
    pub state: SymbolLayoutState,
    params: BucketParameters,
    leader_id: String,
    layout: SymbolLayoutProperties,
    /// Every layer sharing this layout keeps its own paint; they all share
    /// the one bucket `place` produces.
    pub layer_paint_properties: Vec<(String, PaintProperties)>,
    features: Vec<SymbolFeature>,
    instances: Vec<SymbolInstance>,
}

impl SymbolLayout {
    pub fn new(
        params: &BucketParameters,
        group: &[&Layer],
        geometry_layer: &dyn GeometryTileLayer,
        glyph_dependencies: &mut GlyphDependencies,
        icon_dependencies: &mut IconDependencies,
    ) -> SymbolLayout {
        let leader = group[0];
        debug_assert!(leader.is_symbol());
        let layout = match leader.layer_type {
            LayerType::Symbol(ref layout) => layout.clone(),
            _ => SymbolLayoutProperties::default(),
        };

        let layer_paint_properties = group
            .iter()
            .map(|layer| (layer.id.clone(), layer.paint.clone()))
            .collect();

        let mut features = Vec::new();
        for index in 0..geometry_layer.feature_count() {
            let feature = geometry_layer.feature(index);
            let lookup = |key: &str| feature.value(key);
            if !leader
                .filter
                .evaluate(feature.feature_type(), feature.id().as_ref(), &lookup)
            {
                continue;
            }

            let text = layout
                .text_field
                .as_ref()
                .map(|template| replace_tokens(template, &lookup))
                .and_then(non_empty);
            let icon = layout
                .icon_image
                .as_ref()
                .map(|template| replace_tokens(template, &lookup))
                .and_then(non_empty);

            if text.is_none() && icon.is_none() {
                continue;
            }

            if let Some(ref text) = text {
                glyph_dependencies.add_glyphs(&layout.text_font, text);
            }
            if icon.is_some() {
                if let Some(atlas) = layout.icon_atlas {
                    icon_dependencies.insert(atlas);
                }
            }

            features.push(SymbolFeature {
                feature_type: feature.feature_type(),
                geometries: feature.geometries(),
                text,
                icon,
            });
        }

        SymbolLayout {
            state: SymbolLayoutState::Pending,
            params: *params,
            leader_id: leader.id.clone(),
            layout,
            layer_paint_properties,
            features,
            instances: Vec::new(),
        }
    }

    /// Shape captured features into symbol instances. Runs exactly once
    /// per layout: repeated placements reuse the prepared instances, and a
    /// call in any state but `Pending` is a no-op.
    pub fn prepare(&mut self, glyphs: &GlyphPositionMap, icons: &IconAtlasMap) {
        if self.state != SymbolLayoutState::Pending {
            return;
        }

        for feature in &self.features {
            let text_quads = match feature.text {
                Some(ref text) => shape_text(
                    text,
                    &self.layout.text_font,
                    self.layout.text_size,
                    glyphs,
                ),
                None => Vec::new(),
            };
            let icon_quad = match (feature.icon.as_ref(), self.layout.icon_atlas) {
                (Some(name), Some(atlas)) => icons
                    .get(&atlas)
                    .and_then(|atlas| atlas.icons.get(name))
                    .map(|icon| {
                        let width = icon.width / icon.pixel_ratio;
                        let height = icon.height / icon.pixel_ratio;
                        SymbolQuad {
                            offset_rect: TileRect::new(
                                TilePoint::new(-width / 2.0, -height / 2.0),
                                TileSize::new(width, height),
                            ),
                            tex_rect: icon.tex_rect,
                        }
                    }),
                _ => None,
            };

            if text_quads.is_empty() && icon_quad.is_none() {
                continue;
            }

            let text_bounds = quad_bounds(&text_quads, self.layout.text_padding);
            let icon_bounds = icon_quad
                .as_ref()
                .map(|quad| pad_rect(&quad.offset_rect, self.layout.icon_padding));

            for anchor in anchors_for(feature) {
                let anchor_point = TilePoint::new(anchor.x as f32, anchor.y as f32);
                let mut text_collision = CollisionFeature::default();
                if let Some((x1, y1, x2, y2)) = text_bounds {
                    text_collision
                        .boxes
                        .push(CollisionBox::new(anchor_point, x1, y1, x2, y2));
                }
                let mut icon_collision = CollisionFeature::default();
                if let Some((x1, y1, x2, y2)) = icon_bounds {
                    icon_collision
                        .boxes
                        .push(CollisionBox::new(anchor_point, x1, y1, x2, y2));
                }

                self.instances.push(SymbolInstance {
                    anchor,
                    text_quads: text_quads.clone(),
                    icon_quad: icon_quad.clone(),
                    text_collision,
                    icon_collision,
                });
            }
        }

        self.state = SymbolLayoutState::Prepared;
    }

    pub fn has_symbol_instances(&self) -> bool {
        !self.instances.is_empty()
    }

    /// Resolve collisions against `collision_tile` and emit the surviving
    /// quads. One bucket serves every layer in the group.
    pub fn place(&self, collision_tile: &mut CollisionTile) -> Result<SymbolBucket, TileError> {
        let mut bucket = SymbolBucket::new(&self.params, &self.leader_id);

        for instance in &self.instances {
            if !instance.text_quads.is_empty() {
                let placed = collision_tile
                    .place_feature(&instance.text_collision, self.layout.text_allow_overlap);
                if placed {
                    for quad in &instance.text_quads {
                        bucket.add_text_quad(instance.anchor, quad)?;
                    }
                }
            }

            if let Some(ref quad) = instance.icon_quad {
                let placed = collision_tile
                    .place_feature(&instance.icon_collision, self.layout.icon_allow_overlap);
                if placed {
                    bucket.add_icon_quad(instance.anchor, quad)?;
                }
            }
        }

        Ok(bucket)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Substitute `{token}` references from feature properties. Unknown
/// tokens resolve to the empty string; a brace without a closing partner
/// is literal.
fn replace_tokens<F>(template: &str, lookup: &F) -> String
where
    F: Fn(&str) -> Option<PropertyValue>,
{
    let mut result = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        result.push_str(&rest[..open]);
        match rest[open..].find('}') {
            Some(close) => {
                let token = &rest[open + 1..open + close];
                if let Some(value) = lookup(token) {
                    result.push_str(&value.to_string());
                }
                rest = &rest[open + close + 1..];
            }
            None => {
                result.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);
    result
}

/// One anchor per symbol occurrence: every point of a point feature, the
/// midpoint vertex of a line, the ring centroid of a polygon.
fn anchors_for(feature: &SymbolFeature) -> SmallVec<[GeometryCoordinate; 1]> {
    let mut anchors = SmallVec::new();
    match feature.feature_type {
        FeatureType::Point => {
            for ring in &feature.geometries {
                for point in ring {
                    anchors.push(*point);
                }
            }
        }
        FeatureType::LineString => {
            if let Some(line) = feature.geometries.first() {
                if !line.is_empty() {
                    anchors.push(line[line.len() / 2]);
                }
            }
        }
        FeatureType::Polygon => {
            if let Some(ring) = feature.geometries.first() {
                if !ring.is_empty() {
                    let (mut x, mut y) = (0i64, 0i64);
                    for point in ring {
                        x += i64::from(point.x);
                        y += i64::from(point.y);
                    }
                    anchors.push(GeometryCoordinate::new(
                        (x / ring.len() as i64) as i16,
                        (y / ring.len() as i64) as i16,
                    ));
                }
            }
        }
    }
    anchors
}

/// Shape one horizontal line of text, centered on the anchor, baseline at
/// y = 0. Glyphs missing from the delivered positions are skipped.
fn shape_text(
    text: &str,
    font: &str,
    size: f32,
    glyphs: &GlyphPositionMap,
) -> Vec<SymbolQuad> {
    let font_glyphs = match glyphs.get(font) {
        Some(font_glyphs) => font_glyphs,
        None => return Vec::new(),
    };
    let scale = size / GLYPH_RENDER_SIZE;

    let mut quads = Vec::new();
    let mut pen = 0.0f32;
    for ch in text.chars() {
        let code_point = ch as u32;
        if code_point > u32::from(u16::max_value()) {
            continue;
        }
        let position = match font_glyphs.get(&(code_point as u16)) {
            Some(position) => position,
            None => continue,
        };
        let metrics = position.metrics;
        quads.push(SymbolQuad {
            offset_rect: TileRect::new(
                TilePoint::new(
                    (pen + metrics.left as f32) * scale,
                    -(metrics.top as f32) * scale,
                ),
                TileSize::new(
                    metrics.width as f32 * scale,
                    metrics.height as f32 * scale,
                ),
            ),
            tex_rect: position.rect,
        });
        pen += metrics.advance as f32;
    }

    // Center the line on the anchor.
    let shift = pen * scale / 2.0;
    for quad in &mut quads {
        quad.offset_rect.origin.x -= shift;
    }
    quads
}

fn quad_bounds(quads: &[SymbolQuad], padding: f32) -> Option<(f32, f32, f32, f32)> {
    let first = quads.first()?;
    let mut x1 = first.offset_rect.origin.x;
    let mut y1 = first.offset_rect.origin.y;
    let mut x2 = x1 + first.offset_rect.size.width;
    let mut y2 = y1 + first.offset_rect.size.height;
    for quad in &quads[1..] {
        x1 = x1.min(quad.offset_rect.origin.x);
        y1 = y1.min(quad.offset_rect.origin.y);
        x2 = x2.max(quad.offset_rect.origin.x + quad.offset_rect.size.width);
        y2 = y2.max(quad.offset_rect.origin.y + quad.offset_rect.size.height);
    }
    Some((x1 - padding, y1 - padding, x2 + padding, y2 + padding))
}

fn pad_rect(rect: &TileRect, padding: f32) -> (f32, f32, f32, f32) {
    (
        rect.origin.x - padding,
        rect.origin.y - padding,
        rect.origin.x + rect.size.width + padding,
        rect.origin.y + rect.size.height + padding,
    )
}
