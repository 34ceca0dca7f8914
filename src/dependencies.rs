/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::glyphs::{GlyphDependencies, GlyphPositionMap};
use crate::sprite::{IconAtlasMap, IconDependencies};

/// Tracks which glyphs and sprite atlases are required versus present.
///
/// This is not a wait-group: a fresh layout replaces the requirement set
/// wholesale. Before a new request is sent the current positions are
/// cleared (`begin_*_wait`), so stale partial deliveries can never satisfy
/// a new requirement by accident.
pub struct DependencyTracker {
    waiting_for_glyphs: bool,
    waiting_for_icons: bool,
    glyph_positions: GlyphPositionMap,
    icons: IconAtlasMap,
}

impl DependencyTracker {
    pub fn new() -> DependencyTracker {
        DependencyTracker {
            waiting_for_glyphs: false,
            waiting_for_icons: false,
            glyph_positions: GlyphPositionMap::default(),
            icons: IconAtlasMap::default(),
        }
    }

    /// True iff every (font, glyph) pair in `required` is present.
    pub fn has_glyph_dependencies(&self, required: &GlyphDependencies) -> bool {
        required.iter().all(|(font, glyphs)| {
            match self.glyph_positions.get(font) {
                Some(present) => glyphs.iter().all(|glyph| present.contains_key(glyph)),
                None => glyphs.is_empty(),
            }
        })
    }

    /// True iff every required atlas is present.
    pub fn has_icon_dependencies(&self, required: &IconDependencies) -> bool {
        required.iter().all(|atlas| self.icons.contains_key(atlas))
    }

    /// An unanswered `get_glyphs` or `get_icons` is outstanding.
    pub fn has_pending(&self) -> bool {
        self.waiting_for_glyphs || self.waiting_for_icons
    }

    pub fn waiting_for_glyphs(&self) -> bool {
        self.waiting_for_glyphs
    }

    pub fn waiting_for_icons(&self) -> bool {
        self.waiting_for_icons
    }

    /// Discard current positions and mark a glyph request outstanding.
    pub fn begin_glyph_wait(&mut self) {
        self.glyph_positions.clear();
        self.waiting_for_glyphs = true;
    }

    /// Discard current atlases and mark an icon request outstanding.
    pub fn begin_icon_wait(&mut self) {
        self.icons.clear();
        self.waiting_for_icons = true;
    }

    pub fn glyphs_available(&mut self, positions: GlyphPositionMap) {
        debug_assert!(
            self.waiting_for_glyphs,
            "glyph response without an outstanding request"
        );
        self.glyph_positions = positions;
        self.waiting_for_glyphs = false;
    }

    pub fn icons_available(&mut self, icons: IconAtlasMap) {
        debug_assert!(
            self.waiting_for_icons,
            "icon response without an outstanding request"
        );
        self.icons = icons;
        self.waiting_for_icons = false;
    }

    pub fn glyph_positions(&self) -> &GlyphPositionMap {
        &self.glyph_positions
    }

    pub fn icons(&self) -> &IconAtlasMap {
        &self.icons
    }
}
