/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::buckets::{Bucket, FillBucket, LineBucket};
use crate::filter::Filter;
use crate::geometry::PropertyValue;
use crate::internal_types::{FastHashMap, MapMode, OverscaledTileCoord};
use crate::sprite::SpriteAtlasId;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LineCap {
    Butt,
    Round,
    Square,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LineJoin {
    Miter,
    Bevel,
    Round,
}

/// Layout-affecting properties of a line layer.
#[derive(Clone, Debug, PartialEq)]
pub struct LineLayout {
    pub cap: LineCap,
    pub join: LineJoin,
    pub miter_limit: f32,
    pub round_limit: f32,
}

impl Default for LineLayout {
    fn default() -> LineLayout {
        LineLayout {
            cap: LineCap::Butt,
            join: LineJoin::Miter,
            miter_limit: 2.0,
            round_limit: 1.05,
        }
    }
}

/// Layout-affecting properties of a symbol layer.
///
/// `text_field` and `icon_image` are templates: `{token}` references are
/// substituted from feature properties before shaping.
#[derive(Clone, Debug, PartialEq)]
pub struct SymbolLayoutProperties {
    pub text_field: Option<String>,
    pub text_font: String,
    pub text_size: f32,
    pub text_padding: f32,
    pub text_allow_overlap: bool,
    pub icon_image: Option<String>,
    pub icon_atlas: Option<SpriteAtlasId>,
    pub icon_padding: f32,
    pub icon_allow_overlap: bool,
}

impl Default for SymbolLayoutProperties {
    fn default() -> SymbolLayoutProperties {
        SymbolLayoutProperties {
            text_field: None,
            text_font: "Open Sans Regular".to_string(),
            text_size: 16.0,
            text_padding: 2.0,
            text_allow_overlap: false,
            icon_image: None,
            icon_atlas: None,
            icon_padding: 2.0,
            icon_allow_overlap: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LayerType {
    Fill,
    Line(LineLayout),
    Symbol(SymbolLayoutProperties),
}

/// Paint properties owned by a layer, carried opaquely into its bucket.
///
/// Vertex packing of these values is the renderer's concern; the worker
/// only moves them around so that layers sharing a layout (and therefore a
/// bucket) keep their distinct paints.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PaintProperties {
    pub values: FastHashMap<String, PropertyValue>,
}

/// A style layer descriptor, as produced by the (out of scope) style
/// parser. Order within the style's layer list is draw order.
#[derive(Clone, Debug)]
pub struct Layer {
    pub id: String,
    pub source_layer: String,
    pub filter: Filter,
    pub layer_type: LayerType,
    pub paint: PaintProperties,
}

impl Layer {
    pub fn is_symbol(&self) -> bool {
        match self.layer_type {
            LayerType::Symbol(..) => true,
            _ => false,
        }
    }

    pub fn symbol_layout(&self) -> Option<&SymbolLayoutProperties> {
        match self.layer_type {
            LayerType::Symbol(ref layout) => Some(layout),
            _ => None,
        }
    }

    /// True when `other` would produce identical vertex data: same kind,
    /// same source layer, same filter, same layout properties. Id and
    /// paint are deliberately ignored.
    pub fn layout_eq(&self, other: &Layer) -> bool {
        self.source_layer == other.source_layer
            && self.filter == other.filter
            && self.layer_type == other.layer_type
    }

    /// Bucket factory for the non-symbol kinds. Symbol layers build their
    /// buckets through placement instead.
    pub fn create_bucket(&self, params: &BucketParameters) -> Option<Box<dyn Bucket>> {
        match self.layer_type {
            LayerType::Fill => Some(Box::new(FillBucket::new(params, &self.id))),
            LayerType::Line(ref layout) => {
                Some(Box::new(LineBucket::new(params, &self.id, layout.clone())))
            }
            LayerType::Symbol(..) => None,
        }
    }
}

/// Everything a bucket needs to know about the tile it is built for.
#[derive(Copy, Clone, Debug)]
pub struct BucketParameters {
    pub coord: OverscaledTileCoord,
    pub mode: MapMode,
}

/// Group layers that are layout-compatible, preserving style order both
/// across groups and within each group. The first member of a group is its
/// leader: the group shares the bucket built for the leader, which is what
/// amortizes filtering and feature iteration across duplicated layers.
pub fn group_by_layout(layers: &[Layer]) -> Vec<Vec<&Layer>> {
    let mut groups: Vec<Vec<&Layer>> = Vec::new();
    for layer in layers {
        match groups.iter().position(|group| group[0].layout_eq(layer)) {
            Some(i) => groups[i].push(layer),
            None => groups.push(vec![layer]),
        }
    }
    groups
}
