//! Glyph cache and texture atlas.
//!
//! Rasterized glyphs and shapes live in one shared atlas [`Bitmap`]. A small
//! open-addressing table maps a [`GlyphKey`] to the atlas rect holding its
//! pixels. Entries are never removed one by one: when the atlas or the table
//! fills up, the whole cache is [`reset`](GlyphCache::reset) and rebuilt on
//! demand.

use std::sync::Arc;

use common::{Color, IRect};

use crate::rasterizer::Bitmap;

// ─────────────────────────────────────────────────────────────────────────────
// AtlasAllocator
// ─────────────────────────────────────────────────────────────────────────────

/// Shelf packer: rects go left to right along a shelf; a rect that does not
/// fit the remaining width starts a new shelf below the tallest one so far.
#[derive(Clone, Debug)]
pub struct AtlasAllocator {
    width: i32,
    height: i32,
    x: i32,
    y: i32,
    y_max: i32,
}

impl AtlasAllocator {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: i32::try_from(width).unwrap_or(i32::MAX),
            height: i32::try_from(height).unwrap_or(i32::MAX),
            x: 0,
            y: 0,
            y_max: 0,
        }
    }

    /// Reserve a `width × height` rect, or `None` once the atlas is exhausted.
    /// A failed call leaves the cursor untouched.
    pub fn allocate(&mut self, width: u32, height: u32) -> Option<IRect> {
        let w = i32::try_from(width).ok()?;
        let h = i32::try_from(height).ok()?;
        if w > self.width || h > self.height {
            return None;
        }
        // The cursor never passes the atlas edges, so the differences below
        // cannot overflow.
        let (mut x, mut y) = (self.x, self.y);
        if w > self.width - x {
            x = 0;
            y = self.y_max;
        }
        if h > self.height - y {
            return None;
        }
        self.x = x + w;
        self.y = y;
        self.y_max = self.y_max.max(y + h);
        Some(IRect::from_xywh(x, y, w, h))
    }

    pub fn reset(&mut self) {
        self.x = 0;
        self.y = 0;
        self.y_max = 0;
    }

    /// `(x, y, y_max)` of the shelf cursor.
    pub fn cursor(&self) -> (i32, i32, i32) {
        (self.x, self.y, self.y_max)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GlyphKey / CacheEntry
// ─────────────────────────────────────────────────────────────────────────────

/// Cache key. `id` is a font id, or 0 for vector shapes; `scale` and the
/// subpixel offsets are already quantized by the caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphKey {
    pub id: u32,
    pub codepoint: u32,
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl GlyphKey {
    pub fn new(id: u32, codepoint: u32, scale: f32, offset_x: f32, offset_y: f32) -> Self {
        Self { id, codepoint, scale, offset_x, offset_y }
    }
}

/// Where a cached glyph lives in the atlas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    /// Atlas rect; empty for glyphs without pixels (e.g. space).
    pub rect: IRect,
    /// Offset from the pen position to the rect's top-left corner.
    pub bearing_x: i32,
    pub bearing_y: i32,
}

// ─────────────────────────────────────────────────────────────────────────────
// GlyphCache
// ─────────────────────────────────────────────────────────────────────────────

pub struct GlyphCache {
    slots: Vec<Option<(GlyphKey, CacheEntry)>>,
    len: usize,
    allocator: AtlasAllocator,
    texture: Arc<Bitmap>,
    dirty: IRect,
}

impl GlyphCache {
    /// `capacity` is rounded up to a power of two.
    pub fn new(capacity: usize, atlas_width: u32, atlas_height: u32) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        Self {
            slots: vec![None; capacity],
            len: 0,
            allocator: AtlasAllocator::new(atlas_width, atlas_height),
            texture: Arc::new(Bitmap::new(atlas_width, atlas_height)),
            dirty: IRect::EMPTY,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    /// Slots in probe order for `codepoint`.
    fn probe(&self, codepoint: u32) -> impl Iterator<Item = usize> + '_ {
        let mask = self.mask();
        let start = (codepoint | 1) as usize & mask;
        (0..self.slots.len()).map(move |i| (start + i) & mask)
    }

    pub fn find(&self, key: &GlyphKey) -> Option<CacheEntry> {
        for i in self.probe(key.codepoint) {
            match &self.slots[i] {
                None => return None,
                Some((k, entry)) if k == key => return Some(*entry),
                Some(_) => {}
            }
        }
        None
    }

    /// Insert at the first empty probe slot.
    ///
    /// An existing entry for `key` is kept and returned. Returns `None` when
    /// the table is at its load limit; the caller resets and retries.
    pub fn put(&mut self, key: GlyphKey, entry: CacheEntry) -> Option<CacheEntry> {
        let mut empty = None;
        for i in self.probe(key.codepoint) {
            match &self.slots[i] {
                None => {
                    empty = Some(i);
                    break;
                }
                Some((k, existing)) if *k == key => return Some(*existing),
                Some(_) => {}
            }
        }
        if (self.len + 1) * 4 > self.capacity() * 3 {
            log::warn!("glyph cache full ({} entries)", self.len);
            return None;
        }
        let i = empty?;
        self.slots[i] = Some((key, entry));
        self.len += 1;
        Some(entry)
    }

    /// Drop every entry, rewind the atlas, and clear its pixels.
    pub fn reset(&mut self) {
        log::debug!("glyph cache reset ({} entries)", self.len);
        self.slots.fill(None);
        self.len = 0;
        self.allocator.reset();
        let texture = Arc::make_mut(&mut self.texture);
        texture.clear(Color::TRANSPARENT);
        self.dirty = texture.bounds();
    }

    /// Reserve atlas space for new pixels; the rect is marked dirty.
    pub fn allocate_texture(&mut self, width: u32, height: u32) -> Option<IRect> {
        let rect = self.allocator.allocate(width, height)?;
        self.dirty = self.dirty.union(rect);
        Some(rect)
    }

    pub fn allocator(&self) -> &AtlasAllocator {
        &self.allocator
    }

    /// The atlas, shared read-only with renders in flight.
    pub fn texture(&self) -> &Arc<Bitmap> {
        &self.texture
    }

    /// Mutable atlas access. Copies the pixels first if a render still holds
    /// the previous texture.
    pub fn texture_mut(&mut self) -> &mut Bitmap {
        Arc::make_mut(&mut self.texture)
    }

    /// Region written since the last call, for renderers that upload the
    /// atlas to a separate texture.
    pub fn take_dirty(&mut self) -> IRect {
        std::mem::replace(&mut self.dirty, IRect::EMPTY)
    }
}

impl std::fmt::Debug for GlyphCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlyphCache")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .field("allocator", &self.allocator)
            .field("texture", &self.texture)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
