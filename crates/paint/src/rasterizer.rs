//! # Scanline Rasterizer
//!
//! Analytic antialiased coverage rasterization into a premultiplied
//! [`Bitmap`].
//!
//! Pixel format: **premultiplied ARGB** (`0xAARRGGBB`), which is BGRA8 byte
//! order in memory on little-endian targets.
//!
//! Coverage for a pixel is the signed sum, over every edge crossing the
//! pixel's row, of the exact area inside the pixel cell lying to the right of
//! that edge. Edges that ran toward decreasing y contribute negatively, so the
//! sum is a nonzero-winding style fill once its magnitude is clamped to 1.

use std::fmt;

use common::{Color, IRect};

use crate::path::{Edge, edge_bounds};

// ─────────────────────────────────────────────────────────────────────────────
// Blending
// ─────────────────────────────────────────────────────────────────────────────

/// Composite premultiplied `src` over the premultiplied pixel `dst`.
#[inline]
pub fn blend(dst: u32, src: Color) -> u32 {
    if src.a == 255 {
        return src.to_argb();
    }
    if src == Color::TRANSPARENT {
        return dst;
    }
    let inv = 255 - src.a as u32;
    let d = Color::from_argb(dst);
    let over = |s: u8, d: u8| (s as u32 + (d as u32 * inv + 127) / 255).min(255) as u8;
    Color::rgba(over(src.r, d.r), over(src.g, d.g), over(src.b, d.b), over(src.a, d.a)).to_argb()
}

// ─────────────────────────────────────────────────────────────────────────────
// Bitmap
// ─────────────────────────────────────────────────────────────────────────────

/// A premultiplied ARGB pixel buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub pixels: Vec<u32>,
    pub width: u32,
    pub height: u32,
}

impl Bitmap {
    /// Create a fully transparent bitmap.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Color::TRANSPARENT)
    }

    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        Self {
            pixels: vec![color.to_argb(); width as usize * height as usize],
            width,
            height,
        }
    }

    /// The rectangle `[0, width) × [0, height)`.
    #[inline]
    pub fn bounds(&self) -> IRect {
        IRect::new(0, 0, self.width as i32, self.height as i32)
    }

    pub fn clear(&mut self, color: Color) {
        self.pixels.fill(color.to_argb());
    }

    /// Zero the pixels inside `rect`.
    pub fn clear_rect(&mut self, rect: IRect) {
        let rect = rect.intersect(self.bounds());
        for y in rect.min_y..rect.max_y {
            let row = self.row_range(y, rect.min_x, rect.max_x);
            self.pixels[row].fill(0);
        }
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    #[inline]
    fn row_range(&self, y: i32, x0: i32, x1: i32) -> std::ops::Range<usize> {
        let start = y as usize * self.width as usize;
        start + x0 as usize..start + x1 as usize
    }

    /// Read a pixel; `None` outside the bitmap.
    #[inline]
    pub fn pixel(&self, x: i32, y: i32) -> Option<Color> {
        self.index(x, y).map(|i| Color::from_argb(self.pixels[i]))
    }

    /// Overwrite a pixel without blending.
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Color) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = color.to_argb();
        }
    }

    /// Source-over a single pixel.
    #[inline]
    pub fn blend_pixel(&mut self, x: i32, y: i32, color: Color) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = blend(self.pixels[i], color);
        }
    }

    /// Source-over `color` onto every pixel of `rect` (clamped to the bitmap).
    pub fn fill_rect(&mut self, rect: IRect, color: Color) {
        if color == Color::TRANSPARENT {
            return;
        }
        let rect = rect.intersect(self.bounds());
        let opaque = color.a == 255;
        let argb = color.to_argb();
        for y in rect.min_y..rect.max_y {
            let row = self.row_range(y, rect.min_x, rect.max_x);
            if opaque {
                self.pixels[row].fill(argb);
            } else {
                for p in &mut self.pixels[row] {
                    *p = blend(*p, color);
                }
            }
        }
    }

    /// Copy `src_rect` of `src` to `(dst_x, dst_y)` without blending.
    /// Both sides are clipped to their bitmaps.
    pub fn copy_from(&mut self, src: &Bitmap, src_rect: IRect, dst_x: i32, dst_y: i32) {
        let src_rect = src_rect.intersect(src.bounds());
        let (dx, dy) = (dst_x - src_rect.min_x, dst_y - src_rect.min_y);
        let dst_rect = src_rect.translate(dx, dy).intersect(self.bounds());
        if dst_rect.is_empty() {
            return;
        }
        for y in dst_rect.min_y..dst_rect.max_y {
            let from = src.row_range(y - dy, dst_rect.min_x - dx, dst_rect.max_x - dx);
            let to = self.row_range(y, dst_rect.min_x, dst_rect.max_x);
            self.pixels[to].copy_from_slice(&src.pixels[from]);
        }
    }

    /// Raw pixel bytes (BGRA8 on little-endian) for platform upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bitmap({}×{})", self.width, self.height)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Coverage
// ─────────────────────────────────────────────────────────────────────────────

/// Area of the cell column `[cx, cx + 1)` to the right of `e`, between
/// heights `ya < yb`.
///
/// The integrand `clamp(cx + 1 - x(y), 0, 1)` is linear between the heights
/// where the edge crosses the column's sides, so a trapezoid per piece is
/// exact.
fn area_right_of(e: &Edge, cx: f32, ya: f32, yb: f32) -> f32 {
    let (xa, xb) = (e.x_at(ya), e.x_at(yb));
    if xa.max(xb) <= cx {
        return yb - ya;
    }
    if xa.min(xb) >= cx + 1.0 {
        return 0.0;
    }

    let mut ys = [ya, yb, 0.0, 0.0];
    let mut n = 2;
    for side in [cx, cx + 1.0] {
        if (xa - side) * (xb - side) < 0.0 {
            ys[n] = ya + (side - xa) / (xb - xa) * (yb - ya);
            n += 1;
        }
    }
    let ys = &mut ys[..n];
    ys.sort_by(f32::total_cmp);

    let right = |y: f32| {
        let x = xa + (y - ya) / (yb - ya) * (xb - xa);
        (cx + 1.0 - x).clamp(0.0, 1.0)
    };
    ys.windows(2)
        .map(|w| (right(w[0]) + right(w[1])) * 0.5 * (w[1] - w[0]))
        .sum()
}

/// Coverage of the unit cell at column `cx` for the edges of one row.
fn cell_coverage(row_edges: &[&Edge], cx: f32, top: f32, bottom: f32) -> f32 {
    let mut acc = 0.0;
    for e in row_edges {
        let ya = e.y0.max(top);
        let yb = e.y1.min(bottom);
        if yb <= ya {
            continue;
        }
        let a = area_right_of(e, cx, ya, yb);
        acc += if e.positive { a } else { -a };
    }
    acc.abs().min(1.0)
}

/// Visit every pixel of `clip` with nonzero coverage.
///
/// Rows and columns outside the edges' bounding box are skipped: to the left
/// no edge has started, to the right every closed contour has cancelled out.
fn for_each_coverage(edges: &[Edge], clip: IRect, mut visit: impl FnMut(i32, i32, f32)) {
    let Some((min, max)) = edge_bounds(edges) else {
        return;
    };
    let area = IRect::new(
        min.x.floor() as i32,
        min.y.floor() as i32,
        max.x.ceil() as i32,
        max.y.ceil() as i32,
    )
    .intersect(clip);

    let mut row_edges: Vec<&Edge> = Vec::with_capacity(edges.len());
    for y in area.min_y..area.max_y {
        let (top, bottom) = (y as f32, y as f32 + 1.0);
        row_edges.clear();
        row_edges.extend(edges.iter().filter(|e| e.y0 < bottom && e.y1 > top));
        if row_edges.is_empty() {
            continue;
        }
        for x in area.min_x..area.max_x {
            let cov = cell_coverage(&row_edges, x as f32, top, bottom);
            if cov > 0.0 {
                visit(x, y, cov);
            }
        }
    }
}

/// Fill `edges` with `color` over the whole bitmap.
pub fn fill(bitmap: &mut Bitmap, edges: &[Edge], color: Color) {
    let clip = bitmap.bounds();
    fill_clipped(bitmap, clip, edges, color);
}

/// Fill `edges` with `color`, touching only pixels inside `clip`.
///
/// Coverage inside the clip is the same as for an unclipped fill.
pub fn fill_clipped(bitmap: &mut Bitmap, clip: IRect, edges: &[Edge], color: Color) {
    if color == Color::TRANSPARENT {
        return;
    }
    let clip = clip.intersect(bitmap.bounds());
    if clip.is_empty() {
        return;
    }
    for_each_coverage(edges, clip, |x, y, cov| bitmap.blend_pixel(x, y, color.scale(cov)));
}

/// Raw row-major coverage in `[0, 1]` for a `width × height` grid.
pub fn rasterize_coverage(width: u32, height: u32, edges: &[Edge]) -> Vec<f32> {
    let mut out = vec![0.0; width as usize * height as usize];
    let clip = IRect::new(0, 0, width as i32, height as i32);
    for_each_coverage(edges, clip, |x, y, cov| {
        out[y as usize * width as usize + x as usize] = cov;
    });
    out
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::flatten;
    use common::{PathCommand, Vec2};

    fn rect_path(x0: f32, y0: f32, x1: f32, y1: f32) -> Vec<PathCommand> {
        vec![
            PathCommand::MoveTo(Vec2::new(x0, y0)),
            PathCommand::LineTo(Vec2::new(x1, y0)),
            PathCommand::LineTo(Vec2::new(x1, y1)),
            PathCommand::LineTo(Vec2::new(x0, y1)),
            PathCommand::ClosePath,
        ]
    }

    #[test]
    fn bitmap_new_is_transparent() {
        let bm = Bitmap::new(10, 5);
        assert_eq!(bm.pixels.len(), 50);
        assert!(bm.pixels.iter().all(|&p| p == 0));
        assert_eq!(bm.as_bytes().len(), 200);
    }

    #[test]
    fn as_bytes_is_bgra_on_little_endian() {
        let bm = Bitmap::filled(1, 1, Color::rgba(0x11, 0x22, 0x33, 0xFF));
        if cfg!(target_endian = "little") {
            assert_eq!(bm.as_bytes(), &[0x33, 0x22, 0x11, 0xFF]);
        }
    }

    #[test]
    fn fill_rect_clamps_to_bounds() {
        let mut bm = Bitmap::filled(10, 10, Color::BLACK);
        bm.fill_rect(IRect::new(-2, -2, 3, 3), Color::RED);
        assert_eq!(bm.pixel(0, 0), Some(Color::RED));
        assert_eq!(bm.pixel(2, 2), Some(Color::RED));
        assert_eq!(bm.pixel(3, 0), Some(Color::BLACK));
        assert_eq!(bm.pixel(0, 3), Some(Color::BLACK));
        assert_eq!(bm.pixel(10, 0), None);
    }

    #[test]
    fn blend_is_premultiplied_source_over() {
        // Half-transparent red over opaque white.
        let src = Color::from_straight(255, 0, 0, 128);
        assert_eq!(src.r, 128);
        let out = Color::from_argb(blend(Color::WHITE.to_argb(), src));
        assert_eq!(out.a, 255);
        assert_eq!(out.r, 255);
        assert_eq!(out.g, 127);
        assert_eq!(out.b, 127);

        // Opaque replaces, transparent is a no-op.
        assert_eq!(blend(0x1234_5678, Color::BLUE), Color::BLUE.to_argb());
        assert_eq!(blend(0x1234_5678, Color::TRANSPARENT), 0x1234_5678);
    }

    #[test]
    fn copy_from_clips_both_sides() {
        let mut src = Bitmap::new(4, 4);
        src.fill_rect(IRect::new(0, 0, 4, 4), Color::GREEN);
        let mut dst = Bitmap::new(6, 6);
        dst.copy_from(&src, IRect::new(1, 1, 4, 4), 4, 4);
        assert_eq!(dst.pixel(4, 4), Some(Color::GREEN));
        assert_eq!(dst.pixel(5, 5), Some(Color::GREEN));
        assert_eq!(dst.pixel(3, 3), Some(Color::TRANSPARENT));
    }

    #[test]
    fn clear_rect_only_touches_rect() {
        let mut bm = Bitmap::filled(4, 4, Color::WHITE);
        bm.clear_rect(IRect::new(1, 1, 3, 3));
        assert_eq!(bm.pixel(0, 0), Some(Color::WHITE));
        assert_eq!(bm.pixel(1, 1), Some(Color::TRANSPARENT));
        assert_eq!(bm.pixel(2, 2), Some(Color::TRANSPARENT));
        assert_eq!(bm.pixel(3, 3), Some(Color::WHITE));
    }

    #[test]
    fn aligned_square_has_exact_coverage() {
        let edges = flatten(&rect_path(2.0, 2.0, 6.0, 6.0));
        let cov = rasterize_coverage(8, 8, &edges);
        for y in 0..8 {
            for x in 0..8 {
                let inside = (2..6).contains(&x) && (2..6).contains(&y);
                let expected = if inside { 1.0 } else { 0.0 };
                assert_eq!(cov[y * 8 + x], expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn fractional_square_area_is_preserved() {
        let edges = flatten(&rect_path(1.5, 1.25, 5.25, 4.75));
        let cov = rasterize_coverage(8, 8, &edges);
        let total: f32 = cov.iter().sum();
        assert!((total - 3.75 * 3.5).abs() < 1e-3, "total = {total}");
        assert_eq!(cov[2 * 8 + 2], 1.0);
        assert!((cov[8 + 1] - 0.5 * 0.75).abs() < 1e-5);
    }

    #[test]
    fn winding_direction_does_not_change_coverage() {
        let cw = flatten(&rect_path(1.0, 1.0, 3.5, 3.5));
        let ccw = flatten(&rect_path(3.5, 1.0, 1.0, 3.5));
        assert_eq!(rasterize_coverage(5, 5, &cw), rasterize_coverage(5, 5, &ccw));
    }

    #[test]
    fn diagonal_edge_splits_pixel() {
        // Right triangle with the hypotenuse through pixel centers.
        let edges = flatten(&[
            PathCommand::MoveTo(Vec2::new(0.0, 0.0)),
            PathCommand::LineTo(Vec2::new(4.0, 4.0)),
            PathCommand::LineTo(Vec2::new(0.0, 4.0)),
            PathCommand::ClosePath,
        ]);
        let cov = rasterize_coverage(4, 4, &edges);
        for i in 0..4 {
            assert!((cov[i * 4 + i] - 0.5).abs() < 1e-5, "diagonal pixel {i}");
        }
        assert_eq!(cov[3 * 4], 1.0);
        assert_eq!(cov[3], 0.0);
        let total: f32 = cov.iter().sum();
        assert!((total - 8.0).abs() < 1e-4);
    }

    #[test]
    fn opposite_winding_hole_is_empty() {
        let inner = [
            PathCommand::MoveTo(Vec2::new(2.0, 2.0)),
            PathCommand::LineTo(Vec2::new(2.0, 4.0)),
            PathCommand::LineTo(Vec2::new(4.0, 4.0)),
            PathCommand::LineTo(Vec2::new(4.0, 2.0)),
            PathCommand::ClosePath,
        ];
        let mut commands = rect_path(0.0, 0.0, 6.0, 6.0);
        commands.extend(inner);
        let cov = rasterize_coverage(6, 6, &flatten(&commands));
        assert_eq!(cov[3 * 6 + 3], 0.0);
        assert_eq!(cov[6 + 1], 1.0);
    }

    #[test]
    fn fill_clipped_matches_full_fill_inside_clip() {
        let edges = flatten(&rect_path(0.5, 0.5, 7.5, 5.25));
        let mut full = Bitmap::new(8, 8);
        fill(&mut full, &edges, Color::BLUE);

        let mut clipped = Bitmap::new(8, 8);
        let clip = IRect::new(3, 2, 6, 8);
        fill_clipped(&mut clipped, clip, &edges, Color::BLUE);

        for y in 0..8 {
            for x in 0..8 {
                let expected = if clip.contains(x, y) { full.pixel(x, y) } else { Some(Color::TRANSPARENT) };
                assert_eq!(clipped.pixel(x, y), expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn partial_coverage_scales_color() {
        let edges = flatten(&rect_path(0.0, 0.0, 0.5, 1.0));
        let mut bm = Bitmap::new(1, 1);
        fill(&mut bm, &edges, Color::WHITE);
        assert_eq!(bm.pixel(0, 0), Some(Color::rgba(128, 128, 128, 128)));
    }
}
