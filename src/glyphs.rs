/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::geometry::TexRect;
use crate::internal_types::{FastHashMap, FastHashSet};

/// A font stack name, e.g. "Open Sans Regular".
pub type FontStack = String;

/// A glyph code point. Code points outside the basic multilingual plane
/// are skipped when dependencies are collected.
pub type GlyphId = u16;

/// The size glyph bitmaps are rasterized at; quads are scaled from this to
/// the layer's text size.
pub const GLYPH_RENDER_SIZE: f32 = 24.0;

/// Placement metrics of one rasterized glyph, in render-size pixels
/// relative to the pen position on the baseline.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GlyphMetrics {
    pub width: u32,
    pub height: u32,
    pub left: i32,
    pub top: i32,
    pub advance: u32,
}

/// One rasterized glyph: where it sits in the glyph atlas and how to place
/// it against the baseline.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GlyphPosition {
    pub rect: TexRect,
    pub metrics: GlyphMetrics,
}

pub type GlyphPositionMap = FastHashMap<FontStack, FastHashMap<GlyphId, GlyphPosition>>;

/// The set of (font, glyph) pairs the symbol layouts of one layout run
/// require. Rebuilt from scratch on every layout; never merged.
#[derive(Clone, Debug, Default)]
pub struct GlyphDependencies {
    glyphs: FastHashMap<FontStack, FastHashSet<GlyphId>>,
}

impl GlyphDependencies {
    pub fn new() -> GlyphDependencies {
        GlyphDependencies::default()
    }

    /// Record every BMP code point of `text` as required from `font`.
    pub fn add_glyphs(&mut self, font: &str, text: &str) {
        if text.is_empty() {
            return;
        }
        let entry = self
            .glyphs
            .entry(font.to_string())
            .or_insert_with(FastHashSet::default);
        for ch in text.chars() {
            let code_point = ch as u32;
            if code_point <= u32::from(u16::max_value()) {
                entry.insert(code_point as GlyphId);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FontStack, &FastHashSet<GlyphId>)> {
        self.glyphs.iter()
    }
}
