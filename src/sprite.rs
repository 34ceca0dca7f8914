/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::geometry::TexRect;
use crate::internal_types::{FastHashMap, FastHashSet};

/// Identifies one sprite atlas.
///
/// Allocated by the embedder and compared by value; an atlas rebuilt with
/// new contents gets a new id. We never reuse ids, so a u64 is safe.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SpriteAtlasId(pub u64);

/// One packed sprite image within an atlas.
#[derive(Clone, Debug, PartialEq)]
pub struct IconPosition {
    pub tex_rect: TexRect,
    /// Display size in CSS pixels.
    pub width: f32,
    pub height: f32,
    pub pixel_ratio: f32,
}

/// A packed sprite texture plus per-image rectangles.
#[derive(Clone, Debug, Default)]
pub struct IconAtlas {
    pub width: u32,
    pub height: u32,
    pub icons: FastHashMap<String, IconPosition>,
}

pub type IconAtlasMap = FastHashMap<SpriteAtlasId, IconAtlas>;

/// The sprite atlases the symbol layouts of one layout run require.
pub type IconDependencies = FastHashSet<SpriteAtlasId>;
