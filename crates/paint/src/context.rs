//! # Render Context
//!
//! Owns everything the draw layer needs between frames: loaded fonts, the
//! glyph cache with its atlas, the renderer, and the UI scale. Draw calls
//! append primitives to a [`CommandBuffer`]; [`RenderContext::end_frame`]
//! hands the buffer to the renderer.
//!
//! Text and shapes are rasterized once per (id, codepoint, scale, subpixel
//! offset) into the atlas and drawn as textured rects afterwards.

use std::fmt;
use std::path::{Path, PathBuf};

use common::{Color, IRect, Mat3x2, PathCommand};
use font::{FontFile, FontFormatError};

use crate::cache::{CacheEntry, GlyphCache, GlyphKey};
use crate::command::{Command, CommandBuffer};
use crate::compositor::TileCompositor;
use crate::config::RenderConfig;
use crate::path::{Edge, edge_bounds, flatten};
use crate::rasterizer::fill_clipped;
use crate::renderer::{Renderer, SoftwareRenderer};

/// Subpixel positions are snapped to this fraction of a pixel.
pub const SUBPIXEL_STEPS: f32 = 4.0;

/// Cache id reserved for vector shapes.
const SHAPE_ID: u32 = 0;

// ─────────────────────────────────────────────────────────────────────────────
// Handles & errors
// ─────────────────────────────────────────────────────────────────────────────

/// A loaded font file. Ids start at 1; 0 is the shape cache id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FontId(u32);

impl FontId {
    /// This face at an em size of `px` logical pixels.
    pub fn sized(self, px: f32) -> Font {
        Font { face: self, size: px }
    }
}

/// A font face at a given pixel size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Font {
    pub face: FontId,
    pub size: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("failed to read font {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse font: {0}")]
    Font(#[from] FontFormatError),
    #[error("none of {0} candidate fonts could be loaded")]
    NoFontLoaded(usize),
    #[error("unknown font {0:?}")]
    UnknownFont(FontId),
    #[error("failed to start tile workers: {0}")]
    Workers(#[source] std::io::Error),
}

/// Snap `v` to the subpixel grid; returns the integer pixel and the fraction.
fn split_subpixel(v: f32) -> (i32, f32) {
    let whole = v.floor();
    let frac = ((v - whole) * SUBPIXEL_STEPS).round() / SUBPIXEL_STEPS;
    if frac >= 1.0 {
        (whole as i32 + 1, 0.0)
    } else {
        (whole as i32, frac)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RenderContext
// ─────────────────────────────────────────────────────────────────────────────

pub struct RenderContext<R: Renderer = SoftwareRenderer> {
    config: RenderConfig,
    fonts: Vec<FontFile>,
    cache: GlyphCache,
    renderer: R,
    ui_scale: f32,
}

impl RenderContext<SoftwareRenderer> {
    /// A context drawing into a `width × height` software bitmap.
    pub fn new(config: RenderConfig, width: u32, height: u32) -> Result<Self, ContextError> {
        let compositor = TileCompositor::new(config.queue_capacity, config.worker_count())
            .map_err(ContextError::Workers)?;
        let renderer = SoftwareRenderer::new(width, height, compositor);
        Ok(Self::with_renderer(config, renderer))
    }
}

impl<R: Renderer> RenderContext<R> {
    pub fn with_renderer(config: RenderConfig, renderer: R) -> Self {
        let cache = GlyphCache::new(config.cache_capacity, config.atlas_width, config.atlas_height);
        Self {
            config,
            fonts: Vec::new(),
            cache,
            renderer,
            ui_scale: 1.0,
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn cache(&self) -> &GlyphCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut GlyphCache {
        &mut self.cache
    }

    // ── fonts ──

    pub fn load_font(&mut self, bytes: Vec<u8>) -> Result<FontId, FontFormatError> {
        let file = FontFile::parse(bytes)?;
        self.fonts.push(file);
        let id = FontId(self.fonts.len() as u32);
        log::info!("loaded font {id:?} ({} glyphs)", self.fonts[self.fonts.len() - 1].glyph_count());
        Ok(id)
    }

    pub fn load_font_file(&mut self, path: impl AsRef<Path>) -> Result<FontId, ContextError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ContextError::Io { path: path.to_path_buf(), source })?;
        let id = self.load_font(bytes)?;
        log::info!("font {id:?} from {}", path.display());
        Ok(id)
    }

    /// Load the first font in `paths` that reads and parses.
    pub fn load_first_font<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<FontId, ContextError> {
        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                log::debug!("font {} not found", path.display());
                continue;
            }
            match self.load_font_file(path) {
                Ok(id) => return Ok(id),
                Err(e) => log::warn!("skipping font {}: {e}", path.display()),
            }
        }
        Err(ContextError::NoFontLoaded(paths.len()))
    }

    /// Load the first usable font from the configured preference list.
    pub fn load_configured_font(&mut self) -> Result<FontId, ContextError> {
        let paths = self.config.font_paths.clone();
        self.load_first_font(&paths)
    }

    pub fn font(&self, id: FontId) -> Result<&FontFile, ContextError> {
        (id.0 as usize)
            .checked_sub(1)
            .and_then(|i| self.fonts.get(i))
            .ok_or(ContextError::UnknownFont(id))
    }

    // ── scale ──

    pub fn ui_scale(&self) -> f32 {
        self.ui_scale
    }

    /// Change the logical-to-physical scale. Cached glyphs are dropped since
    /// they were rasterized at the old scale.
    pub fn set_ui_scale(&mut self, scale: f32) {
        if scale != self.ui_scale {
            log::debug!("ui scale {} -> {scale}", self.ui_scale);
            self.ui_scale = scale;
            self.cache.reset();
        }
    }

    fn physical_rect(&self, rect: IRect) -> IRect {
        if self.ui_scale == 1.0 {
            return rect;
        }
        let s = self.ui_scale;
        IRect::new(
            (rect.min_x as f32 * s).round() as i32,
            (rect.min_y as f32 * s).round() as i32,
            (rect.max_x as f32 * s).round() as i32,
            (rect.max_y as f32 * s).round() as i32,
        )
    }

    // ── frames ──

    pub fn begin_frame(&mut self) -> CommandBuffer {
        self.renderer.begin_command_buffer()
    }

    /// Upload atlas changes and render `commands` over `redraw` (physical
    /// pixels).
    pub fn end_frame(&mut self, commands: CommandBuffer, redraw: IRect) {
        let dirty = self.cache.take_dirty();
        if !dirty.is_empty() {
            self.renderer.update_texture(self.cache.texture(), dirty);
        }
        self.renderer.render(commands, redraw, self.cache.texture());
    }

    // ── draw calls ──

    pub fn set_clip_rect(&self, cb: &mut CommandBuffer, rect: IRect) {
        cb.push(Command::Clip(self.physical_rect(rect)));
    }

    pub fn fill_rect(&self, cb: &mut CommandBuffer, rect: IRect, color: Color) {
        cb.push(Command::SolidRect { rect: self.physical_rect(rect), color });
    }

    /// Draw `text` with its baseline starting at `(x, y)`. Returns the pen x
    /// after the last glyph.
    pub fn fill_string(
        &mut self,
        cb: &mut CommandBuffer,
        font: Font,
        x: f32,
        y: f32,
        text: &str,
        color: Color,
    ) -> Result<f32, ContextError> {
        let face = self.font(font.face)?;
        let scale = face.scale_for_pixel_height(font.size * self.ui_scale);
        let (iy, fy) = split_subpixel(y * self.ui_scale);
        let mut pen = x * self.ui_scale;

        for ch in text.chars() {
            let face = self.font(font.face)?;
            let glyph = face.get_glyph_index(ch as u32);
            let advance = face.get_glyph_advance(glyph) as f32 * scale;

            let (ix, fx) = split_subpixel(pen);
            let key = GlyphKey::new(font.face.0, ch as u32, scale, fx, fy);
            let entry = match self.cache.find(&key) {
                Some(entry) => Some(entry),
                None => {
                    let outline = match face.get_glyph_outline(glyph, Mat3x2::font_to_pixels(scale, fx, fy)) {
                        Ok(outline) => outline,
                        Err(e) => {
                            log::warn!("glyph {glyph} of {:?}: {e}", font.face);
                            Vec::new()
                        }
                    };
                    self.rasterize(key, &outline)
                }
            };
            if let Some(entry) = entry {
                push_textured(cb, entry, ix, iy, color);
            }
            pen += advance;
        }
        Ok(pen / self.ui_scale)
    }

    /// Draw a vector path whose coordinates are relative to `(x, y)`.
    /// `shape_id` identifies the path in the cache; reuse it only for the
    /// same path.
    pub fn fill_shape(
        &mut self,
        cb: &mut CommandBuffer,
        shape_id: u32,
        x: f32,
        y: f32,
        path: &[PathCommand],
        color: Color,
    ) {
        let (ix, fx) = split_subpixel(x * self.ui_scale);
        let (iy, fy) = split_subpixel(y * self.ui_scale);
        let key = GlyphKey::new(SHAPE_ID, shape_id, self.ui_scale, fx, fy);
        let entry = match self.cache.find(&key) {
            Some(entry) => Some(entry),
            None => {
                let m = Mat3x2::translate(fx, fy) * Mat3x2::scale(self.ui_scale, self.ui_scale);
                let commands: Vec<PathCommand> =
                    path.iter().map(|c| c.transformed_uniform(m, self.ui_scale)).collect();
                self.rasterize(key, &commands)
            }
        };
        if let Some(entry) = entry {
            push_textured(cb, entry, ix, iy, color);
        }
    }

    /// Advance width of `text` in logical pixels.
    pub fn measure_string(&self, font: Font, text: &str) -> Result<f32, ContextError> {
        let face = self.font(font.face)?;
        let scale = face.scale_for_pixel_height(font.size);
        Ok(text
            .chars()
            .map(|ch| face.get_glyph_advance(face.get_glyph_index(ch as u32)) as f32 * scale)
            .sum())
    }

    /// Baseline-to-baseline distance in logical pixels.
    pub fn line_height(&self, font: Font) -> Result<f32, ContextError> {
        let face = self.font(font.face)?;
        Ok(face.line_height(face.scale_for_pixel_height(font.size)))
    }

    // ── cache fill ──

    /// Rasterize pixel-space `commands` into the atlas and cache them under
    /// `key`. On a full atlas or table the cache is reset and the insert
    /// retried once. `None` if the shape cannot fit even an empty atlas.
    fn rasterize(&mut self, key: GlyphKey, commands: &[PathCommand]) -> Option<CacheEntry> {
        let edges = flatten(commands);
        let Some((min, max)) = edge_bounds(&edges) else {
            let entry = CacheEntry { rect: IRect::EMPTY, bearing_x: 0, bearing_y: 0 };
            return self.insert_empty(key, entry);
        };
        let (x0, y0) = (min.x.floor() as i32, min.y.floor() as i32);
        let (x1, y1) = (max.x.ceil() as i32, max.y.ceil() as i32);
        let (w, h) = ((x1 - x0).max(1) as u32, (y1 - y0).max(1) as u32);

        for attempt in 0..2 {
            if attempt > 0 {
                log::warn!("glyph atlas full, resetting cache");
                self.cache.reset();
            }
            let Some(rect) = self.cache.allocate_texture(w, h) else {
                continue;
            };
            let (dx, dy) = ((rect.min_x - x0) as f32, (rect.min_y - y0) as f32);
            let placed: Vec<Edge> = edges
                .iter()
                .map(|e| Edge { x0: e.x0 + dx, y0: e.y0 + dy, x1: e.x1 + dx, y1: e.y1 + dy, positive: e.positive })
                .collect();
            fill_clipped(self.cache.texture_mut(), rect, &placed, Color::WHITE);

            let entry = CacheEntry { rect, bearing_x: x0, bearing_y: y0 };
            if self.cache.put(key, entry).is_some() {
                log::debug!("rasterized {key:?} into {rect:?}");
                return Some(entry);
            }
        }
        log::warn!("{key:?} ({w}×{h}) does not fit the glyph atlas");
        None
    }

    fn insert_empty(&mut self, key: GlyphKey, entry: CacheEntry) -> Option<CacheEntry> {
        if let Some(e) = self.cache.put(key, entry) {
            return Some(e);
        }
        self.cache.reset();
        self.cache.put(key, entry)
    }
}

fn push_textured(cb: &mut CommandBuffer, entry: CacheEntry, x: i32, y: i32, color: Color) {
    if entry.rect.is_empty() {
        return;
    }
    cb.push(Command::TexturedRect {
        dst: IRect::from_xywh(x + entry.bearing_x, y + entry.bearing_y, entry.rect.width(), entry.rect.height()),
        src_x: entry.rect.min_x,
        src_y: entry.rect.min_y,
        color,
    });
}

impl<R: Renderer + fmt::Debug> fmt::Debug for RenderContext<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("fonts", &self.fonts.len())
            .field("cache", &self.cache)
            .field("renderer", &self.renderer)
            .field("ui_scale", &self.ui_scale)
            .finish()
    }
}
