/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::geometry::{
    GeometryCollection, GeometryCoordinate, GeometryTileFeature, TexRect, TileRect,
};
use crate::internal_types::{MapMode, OverscaledTileCoord, TileError};
use crate::layers::{BucketParameters, LineLayout};

/// Vertex indices are u16, so a draw segment can address at most this many
/// vertices. Buckets open a new segment when a feature would not fit.
pub const MAX_SEGMENT_VERTICES: usize = 65536;

/// A renderable vertex/index container for one layout group of style
/// layers within one tile. Buckets are built once on the worker and then
/// moved to the renderer; empty buckets are discarded before that.
pub trait Bucket: Send + Sync {
    fn add_feature(
        &mut self,
        feature: &dyn GeometryTileFeature,
        geometries: &GeometryCollection,
    ) -> Result<(), TileError>;

    fn has_data(&self) -> bool;
}

/// One draw call's worth of a bucket's buffers. Indices within a segment
/// are relative to `vertex_offset`.
#[derive(Clone, Debug)]
pub struct Segment {
    pub vertex_offset: usize,
    pub index_offset: usize,
    pub num_vertices: usize,
    pub num_indices: usize,
}

impl Segment {
    fn new(vertex_offset: usize, index_offset: usize) -> Segment {
        Segment {
            vertex_offset,
            index_offset,
            num_vertices: 0,
            num_indices: 0,
        }
    }
}

fn ensure_segment(
    segments: &mut Vec<Segment>,
    vertex_len: usize,
    index_len: usize,
    extra_vertices: usize,
    layer_id: &str,
) -> Result<(), TileError> {
    if extra_vertices > MAX_SEGMENT_VERTICES {
        return Err(TileError::BucketOverflow {
            layer: layer_id.to_string(),
        });
    }
    let need_new = match segments.last() {
        Some(segment) => segment.num_vertices + extra_vertices > MAX_SEGMENT_VERTICES,
        None => true,
    };
    if need_new {
        segments.push(Segment::new(vertex_len, index_len));
    }
    Ok(())
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FillVertex {
    pub x: i16,
    pub y: i16,
}

/// Triangulated polygon interiors.
pub struct FillBucket {
    pub coord: OverscaledTileCoord,
    pub layer_id: String,
    pub vertices: Vec<FillVertex>,
    pub indices: Vec<u16>,
    pub segments: Vec<Segment>,
}

impl FillBucket {
    pub fn new(params: &BucketParameters, layer_id: &str) -> FillBucket {
        FillBucket {
            coord: params.coord,
            layer_id: layer_id.to_string(),
            vertices: Vec::new(),
            indices: Vec::new(),
            segments: Vec::new(),
        }
    }
}

impl Bucket for FillBucket {
    fn add_feature(
        &mut self,
        _feature: &dyn GeometryTileFeature,
        geometries: &GeometryCollection,
    ) -> Result<(), TileError> {
        for ring in geometries {
            if ring.len() < 3 {
                continue;
            }

            // A ring is triangulated as a fan and must stay within one
            // segment.
            ensure_segment(
                &mut self.segments,
                self.vertices.len(),
                self.indices.len(),
                ring.len(),
                &self.layer_id,
            )?;
            let segment = self.segments.last_mut().expect("BUG: no segment after ensure_segment");
            let base = segment.num_vertices as u16;

            for point in ring {
                self.vertices.push(FillVertex {
                    x: point.x,
                    y: point.y,
                });
            }
            for i in 2..ring.len() {
                self.indices.push(base);
                self.indices.push(base + i as u16 - 1);
                self.indices.push(base + i as u16);
            }

            segment.num_vertices += ring.len();
            segment.num_indices += 3 * (ring.len() - 2);
        }
        Ok(())
    }

    fn has_data(&self) -> bool {
        !self.indices.is_empty()
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LineVertex {
    pub x: i16,
    pub y: i16,
    /// Unit normal the vertex is extruded along; the shader scales it by
    /// the line width.
    pub nx: f32,
    pub ny: f32,
}

/// Lines extruded into quads along their normals.
pub struct LineBucket {
    pub coord: OverscaledTileCoord,
    pub layer_id: String,
    pub layout: LineLayout,
    pub vertices: Vec<LineVertex>,
    pub indices: Vec<u16>,
    pub segments: Vec<Segment>,
}

impl LineBucket {
    pub fn new(params: &BucketParameters, layer_id: &str, layout: LineLayout) -> LineBucket {
        LineBucket {
            coord: params.coord,
            layer_id: layer_id.to_string(),
            layout,
            vertices: Vec::new(),
            indices: Vec::new(),
            segments: Vec::new(),
        }
    }

    fn add_line(&mut self, line: &[GeometryCoordinate]) -> Result<(), TileError> {
        for window in line.windows(2) {
            let (p0, p1) = (window[0], window[1]);
            let dx = (p1.x - p0.x) as f32;
            let dy = (p1.y - p0.y) as f32;
            let length = (dx * dx + dy * dy).sqrt();
            if length == 0.0 {
                continue;
            }
            let nx = -dy / length;
            let ny = dx / length;

            ensure_segment(
                &mut self.segments,
                self.vertices.len(),
                self.indices.len(),
                4,
                &self.layer_id,
            )?;
            let segment = self.segments.last_mut().expect("BUG: no segment after ensure_segment");
            let base = segment.num_vertices as u16;

            for &(point, flip) in &[(p0, 1.0), (p0, -1.0), (p1, -1.0), (p1, 1.0)] {
                self.vertices.push(LineVertex {
                    x: point.x,
                    y: point.y,
                    nx: nx * flip,
                    ny: ny * flip,
                });
            }
            for &i in &[0, 1, 2, 0, 2, 3] {
                self.indices.push(base + i);
            }

            segment.num_vertices += 4;
            segment.num_indices += 6;
        }
        Ok(())
    }
}

impl Bucket for LineBucket {
    fn add_feature(
        &mut self,
        _feature: &dyn GeometryTileFeature,
        geometries: &GeometryCollection,
    ) -> Result<(), TileError> {
        for line in geometries {
            if line.len() >= 2 {
                self.add_line(line)?;
            }
        }
        Ok(())
    }

    fn has_data(&self) -> bool {
        !self.indices.is_empty()
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SymbolVertex {
    /// Anchor position in tile units.
    pub anchor_x: i16,
    pub anchor_y: i16,
    /// Corner offset from the anchor, in glyph pixels; applied in screen
    /// space so labels keep their size under zoom.
    pub offset_x: f32,
    pub offset_y: f32,
    pub tex_x: u16,
    pub tex_y: u16,
}

/// A screen-space quad relative to a symbol anchor.
#[derive(Clone, Debug, PartialEq)]
pub struct SymbolQuad {
    pub offset_rect: TileRect,
    pub tex_rect: TexRect,
}

/// Collision-resolved text and icon quads for a group of symbol layers.
///
/// Unlike the other buckets this one is produced by placement: features
/// were already captured by the symbol layout, so `add_feature` has
/// nothing to do.
pub struct SymbolBucket {
    pub coord: OverscaledTileCoord,
    pub layer_id: String,
    pub mode: MapMode,
    pub text_vertices: Vec<SymbolVertex>,
    pub text_indices: Vec<u16>,
    pub icon_vertices: Vec<SymbolVertex>,
    pub icon_indices: Vec<u16>,
}

impl SymbolBucket {
    pub fn new(params: &BucketParameters, layer_id: &str) -> SymbolBucket {
        SymbolBucket {
            coord: params.coord,
            layer_id: layer_id.to_string(),
            mode: params.mode,
            text_vertices: Vec::new(),
            text_indices: Vec::new(),
            icon_vertices: Vec::new(),
            icon_indices: Vec::new(),
        }
    }

    pub fn add_text_quad(
        &mut self,
        anchor: GeometryCoordinate,
        quad: &SymbolQuad,
    ) -> Result<(), TileError> {
        push_quad(
            &mut self.text_vertices,
            &mut self.text_indices,
            anchor,
            quad,
            &self.layer_id,
        )
    }

    pub fn add_icon_quad(
        &mut self,
        anchor: GeometryCoordinate,
        quad: &SymbolQuad,
    ) -> Result<(), TileError> {
        push_quad(
            &mut self.icon_vertices,
            &mut self.icon_indices,
            anchor,
            quad,
            &self.layer_id,
        )
    }
}

fn push_quad(
    vertices: &mut Vec<SymbolVertex>,
    indices: &mut Vec<u16>,
    anchor: GeometryCoordinate,
    quad: &SymbolQuad,
    layer_id: &str,
) -> Result<(), TileError> {
    if vertices.len() + 4 > MAX_SEGMENT_VERTICES {
        return Err(TileError::BucketOverflow {
            layer: layer_id.to_string(),
        });
    }
    let base = vertices.len() as u16;

    let x0 = quad.offset_rect.origin.x;
    let y0 = quad.offset_rect.origin.y;
    let x1 = x0 + quad.offset_rect.size.width;
    let y1 = y0 + quad.offset_rect.size.height;
    let u0 = quad.tex_rect.origin.x;
    let v0 = quad.tex_rect.origin.y;
    let u1 = u0 + quad.tex_rect.size.width;
    let v1 = v0 + quad.tex_rect.size.height;

    for &(ox, oy, u, v) in &[(x0, y0, u0, v0), (x1, y0, u1, v0), (x1, y1, u1, v1), (x0, y1, u0, v1)]
    {
        vertices.push(SymbolVertex {
            anchor_x: anchor.x,
            anchor_y: anchor.y,
            offset_x: ox,
            offset_y: oy,
            tex_x: u,
            tex_y: v,
        });
    }
    for &i in &[0, 1, 2, 0, 2, 3] {
        indices.push(base + i);
    }
    Ok(())
}

impl Bucket for SymbolBucket {
    fn add_feature(
        &mut self,
        _feature: &dyn GeometryTileFeature,
        _geometries: &GeometryCollection,
    ) -> Result<(), TileError> {
        // Symbol features are captured by the symbol layout during layout
        // and turned into quads by placement.
        Ok(())
    }

    fn has_data(&self) -> bool {
        !self.text_vertices.is_empty() || !self.icon_vertices.is_empty()
    }
}
