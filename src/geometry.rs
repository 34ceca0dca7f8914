/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::internal_types::{FastHashMap, TileError};
use euclid::{TypedPoint2D, TypedRect, TypedSize2D, TypedVector2D};
use std::fmt;

/// Geometric unit for coordinates within a tile.
///
/// One tile spans `[0, EXTENT)` in both axes regardless of its zoom level;
/// features may extend slightly past the edges to stitch up with their
/// neighbours.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TileUnit;

/// Texel unit for rectangles inside a glyph or icon atlas texture.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TexelUnit;

pub type TilePoint = TypedPoint2D<f32, TileUnit>;
pub type TileSize = TypedSize2D<f32, TileUnit>;
pub type TileRect = TypedRect<f32, TileUnit>;
pub type TileVector = TypedVector2D<f32, TileUnit>;
pub type TexRect = TypedRect<u16, TexelUnit>;

/// Coordinate span of one tile.
pub const EXTENT: i16 = 8192;

pub type GeometryCoordinate = TypedPoint2D<i16, TileUnit>;
pub type GeometryRing = Vec<GeometryCoordinate>;
pub type GeometryCollection = Vec<GeometryRing>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FeatureType {
    Point,
    LineString,
    Polygon,
}

impl FeatureType {
    pub fn name(&self) -> &'static str {
        match *self {
            FeatureType::Point => "Point",
            FeatureType::LineString => "LineString",
            FeatureType::Polygon => "Polygon",
        }
    }
}

/// A property value attached to a feature.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            PropertyValue::Null => Ok(()),
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Number(v) => {
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    write!(f, "{}", v as i64)
                } else {
                    write!(f, "{}", v)
                }
            }
            PropertyValue::String(ref v) => write!(f, "{}", v),
        }
    }
}

/// One decoded feature within a geometry layer.
pub trait GeometryTileFeature {
    fn feature_type(&self) -> FeatureType;
    fn id(&self) -> Option<PropertyValue>;
    fn value(&self, key: &str) -> Option<PropertyValue>;
    fn geometries(&self) -> GeometryCollection;
}

/// One named layer of features within a tile.
pub trait GeometryTileLayer {
    fn name(&self) -> &str;
    fn feature_count(&self) -> usize;
    fn feature(&self, index: usize) -> &dyn GeometryTileFeature;
}

/// Decoded tile contents, looked up by source-layer name.
///
/// Implemented by the (out of scope) tile decoders; lazy implementations
/// may surface decode failures from `layer`, which the worker forwards to
/// the parent as an error.
pub trait GeometryTileData: Send {
    fn layer(&self, name: &str) -> Result<Option<&dyn GeometryTileLayer>, TileError>;
    fn clone_data(&self) -> Box<dyn GeometryTileData>;
}

/// Fully materialized tile data.
///
/// The production representation for pre-decoded tiles (e.g. GeoJSON
/// sources) and the fixture every test builds on.
#[derive(Clone, Default)]
pub struct MemoryTileData {
    pub layers: Vec<MemoryTileLayer>,
}

#[derive(Clone, Default)]
pub struct MemoryTileLayer {
    pub name: String,
    pub features: Vec<MemoryTileFeature>,
}

#[derive(Clone)]
pub struct MemoryTileFeature {
    pub feature_type: FeatureType,
    pub id: Option<PropertyValue>,
    pub properties: FastHashMap<String, PropertyValue>,
    pub geometries: GeometryCollection,
}

impl GeometryTileData for MemoryTileData {
    fn layer(&self, name: &str) -> Result<Option<&dyn GeometryTileLayer>, TileError> {
        Ok(self
            .layers
            .iter()
            .find(|layer| layer.name == name)
            .map(|layer| layer as &dyn GeometryTileLayer))
    }

    fn clone_data(&self) -> Box<dyn GeometryTileData> {
        Box::new(self.clone())
    }
}

impl GeometryTileLayer for MemoryTileLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_count(&self) -> usize {
        self.features.len()
    }

    fn feature(&self, index: usize) -> &dyn GeometryTileFeature {
        &self.features[index]
    }
}

impl GeometryTileFeature for MemoryTileFeature {
    fn feature_type(&self) -> FeatureType {
        self.feature_type
    }

    fn id(&self) -> Option<PropertyValue> {
        self.id.clone()
    }

    fn value(&self, key: &str) -> Option<PropertyValue> {
        self.properties.get(key).cloned()
    }

    fn geometries(&self) -> GeometryCollection {
        self.geometries.clone()
    }
}
