//! # Common Foundation Crate
//!
//! Shared byte utilities, error types and geometry primitives for the glyph
//! pipeline: a bounds-checked reader for big-endian font tables, a writer used
//! to encode command buffers, premultiplied colors, integer pixel rects, affine
//! transforms and the path command vocabulary shared by fonts and shapes.

#![forbid(unsafe_code)]

use core::fmt;
use std::ops::{Add, Mul, Neg, Sub};

// ─────────────────────────────────────────────────────────────────────────────
// Endian
// ─────────────────────────────────────────────────────────────────────────────

/// Byte order for multi-byte integer encoding/decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endian {
    Little,
    Big,
}

// ─────────────────────────────────────────────────────────────────────────────
// ParseError
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur when decoding binary data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Tried to read past the end of the buffer.
    #[error("unexpected end of input")]
    UnexpectedEof,
    /// A parsed value is not valid in context.
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
    /// A length or offset field points outside the data it describes.
    #[error("length out of range: {0}")]
    LengthOutOfRange(&'static str),
}

// ─────────────────────────────────────────────────────────────────────────────
// Cursor — endian-aware byte buffer reader
// ─────────────────────────────────────────────────────────────────────────────

/// A zero-copy, endian-aware byte-buffer reader.
///
/// Every read is checked against the buffer length; running off the end is
/// reported as [`ParseError::UnexpectedEof`] instead of panicking.
#[derive(Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    off: usize,
    pub endian: Endian,
}

impl<'a> Cursor<'a> {
    /// Create a new cursor at offset 0.
    #[inline]
    pub fn new(buf: &'a [u8], endian: Endian) -> Self {
        Self { buf, off: 0, endian }
    }

    /// Create a cursor positioned at `pos`.
    #[inline]
    pub fn at(buf: &'a [u8], pos: usize, endian: Endian) -> Result<Self, ParseError> {
        let mut c = Self::new(buf, endian);
        c.set_position(pos)?;
        Ok(c)
    }

    /// Current read position (byte offset).
    #[inline]
    pub fn position(&self) -> usize {
        self.off
    }

    /// Number of bytes remaining from the current position.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.off)
    }

    /// Returns `true` if there are no more bytes to read.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Set the read position. Returns an error if out of bounds.
    #[inline]
    pub fn set_position(&mut self, pos: usize) -> Result<(), ParseError> {
        if pos > self.buf.len() {
            return Err(ParseError::UnexpectedEof);
        }
        self.off = pos;
        Ok(())
    }

    // ── internal ──

    #[inline]
    fn take(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        let end = self.off.checked_add(n).ok_or(ParseError::UnexpectedEof)?;
        let slice = self.buf.get(self.off..end).ok_or(ParseError::UnexpectedEof)?;
        self.off = end;
        Ok(slice)
    }

    #[inline]
    fn array<const N: usize>(&mut self) -> Result<[u8; N], ParseError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    // ── primitive readers ──

    /// Read a single byte.
    #[inline]
    pub fn u8(&mut self) -> Result<u8, ParseError> {
        Ok(self.take(1)?[0])
    }

    /// Read a single signed byte.
    #[inline]
    pub fn i8(&mut self) -> Result<i8, ParseError> {
        Ok(self.u8()? as i8)
    }

    /// Read a `u16` in the cursor's endianness.
    #[inline]
    pub fn u16(&mut self) -> Result<u16, ParseError> {
        let b = self.array::<2>()?;
        Ok(match self.endian {
            Endian::Big => u16::from_be_bytes(b),
            Endian::Little => u16::from_le_bytes(b),
        })
    }

    /// Read an `i16` in the cursor's endianness.
    #[inline]
    pub fn i16(&mut self) -> Result<i16, ParseError> {
        Ok(self.u16()? as i16)
    }

    /// Read a `u32` in the cursor's endianness.
    #[inline]
    pub fn u32(&mut self) -> Result<u32, ParseError> {
        let b = self.array::<4>()?;
        Ok(match self.endian {
            Endian::Big => u32::from_be_bytes(b),
            Endian::Little => u32::from_le_bytes(b),
        })
    }

    /// Read an `i32` in the cursor's endianness.
    #[inline]
    pub fn i32(&mut self) -> Result<i32, ParseError> {
        Ok(self.u32()? as i32)
    }

    /// Read a 2.14 fixed-point number (TrueType `F2DOT14`).
    #[inline]
    pub fn f2dot14(&mut self) -> Result<f32, ParseError> {
        Ok(self.i16()? as f32 / 16384.0)
    }

    /// Read a 4-byte tag.
    #[inline]
    pub fn tag(&mut self) -> Result<[u8; 4], ParseError> {
        self.array::<4>()
    }

    /// Read exactly `n` bytes as a slice.
    #[inline]
    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8], ParseError> {
        self.take(n)
    }

    /// Skip `n` bytes.
    #[inline]
    pub fn skip(&mut self, n: usize) -> Result<(), ParseError> {
        self.take(n).map(|_| ())
    }
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("off", &self.off)
            .field("len", &self.buf.len())
            .field("endian", &self.endian)
            .finish()
    }
}

/// Read a big-endian `u16` at an absolute offset.
#[inline]
pub fn read_u16_be(buf: &[u8], pos: usize) -> Result<u16, ParseError> {
    Cursor::at(buf, pos, Endian::Big)?.u16()
}

// ─────────────────────────────────────────────────────────────────────────────
// BufWriter — endian-aware byte buffer writer
// ─────────────────────────────────────────────────────────────────────────────

/// A growable, endian-aware byte buffer writer.
#[derive(Clone)]
pub struct BufWriter {
    pub out: Vec<u8>,
    pub endian: Endian,
}

impl BufWriter {
    /// Create an empty writer.
    #[inline]
    pub fn new(endian: Endian) -> Self {
        Self {
            out: Vec::new(),
            endian,
        }
    }

    /// Create a writer with pre-allocated capacity.
    #[inline]
    pub fn with_capacity(endian: Endian, cap: usize) -> Self {
        Self {
            out: Vec::with_capacity(cap),
            endian,
        }
    }

    /// Current length of the written data.
    #[inline]
    pub fn len(&self) -> usize {
        self.out.len()
    }

    /// Returns `true` if no bytes have been written.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.out.is_empty()
    }

    /// Drop all written bytes, keeping the allocation.
    #[inline]
    pub fn clear(&mut self) {
        self.out.clear();
    }

    /// Write a single byte.
    #[inline]
    pub fn u8(&mut self, v: u8) {
        self.out.push(v);
    }

    /// Write a `u16` in the writer's endianness.
    #[inline]
    pub fn u16(&mut self, v: u16) {
        match self.endian {
            Endian::Big => self.out.extend_from_slice(&v.to_be_bytes()),
            Endian::Little => self.out.extend_from_slice(&v.to_le_bytes()),
        }
    }

    /// Write an `i16` in the writer's endianness.
    #[inline]
    pub fn i16(&mut self, v: i16) {
        self.u16(v as u16);
    }

    /// Write a `u32` in the writer's endianness.
    #[inline]
    pub fn u32(&mut self, v: u32) {
        match self.endian {
            Endian::Big => self.out.extend_from_slice(&v.to_be_bytes()),
            Endian::Little => self.out.extend_from_slice(&v.to_le_bytes()),
        }
    }

    /// Write an `i32` in the writer's endianness.
    #[inline]
    pub fn i32(&mut self, v: i32) {
        self.u32(v as u32);
    }

    /// Write a raw byte slice.
    #[inline]
    pub fn bytes(&mut self, b: &[u8]) {
        self.out.extend_from_slice(b);
    }

    /// Pad with zero bytes until the length is a multiple of 4.
    #[inline]
    pub fn pad4(&mut self) {
        while self.out.len() % 4 != 0 {
            self.out.push(0);
        }
    }

    /// Consume the writer and return the underlying buffer.
    #[inline]
    pub fn finish(self) -> Vec<u8> {
        self.out
    }
}

impl fmt::Debug for BufWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufWriter")
            .field("len", &self.out.len())
            .field("endian", &self.endian)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Color
// ─────────────────────────────────────────────────────────────────────────────

/// An RGBA color with 8 bits per channel and **premultiplied** alpha.
///
/// Every color channel is already scaled by `a`, so `r, g, b <= a` holds for
/// values built through [`Color::from_straight`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    // ── named constants ──

    pub const BLACK: Self = Self { r: 0, g: 0, b: 0, a: 255 };
    pub const WHITE: Self = Self { r: 255, g: 255, b: 255, a: 255 };
    pub const RED: Self = Self { r: 255, g: 0, b: 0, a: 255 };
    pub const GREEN: Self = Self { r: 0, g: 128, b: 0, a: 255 };
    pub const BLUE: Self = Self { r: 0, g: 0, b: 255, a: 255 };
    pub const TRANSPARENT: Self = Self { r: 0, g: 0, b: 0, a: 0 };

    /// Create a fully-opaque color.
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Create a color from channels that are already premultiplied.
    #[inline]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create a color from straight (non-premultiplied) channels.
    pub fn from_straight(r: u8, g: u8, b: u8, a: u8) -> Self {
        let pm = |c: u8| ((c as u32 * a as u32 + 127) / 255) as u8;
        Self { r: pm(r), g: pm(g), b: pm(b), a }
    }

    /// Scale every channel by `coverage` in `[0, 1]`.
    #[inline]
    pub fn scale(self, coverage: f32) -> Self {
        let k = coverage.clamp(0.0, 1.0);
        let mul = |c: u8| (c as f32 * k + 0.5) as u8;
        Self {
            r: mul(self.r),
            g: mul(self.g),
            b: mul(self.b),
            a: mul(self.a),
        }
    }

    /// Pack into a `u32` as `0xAARRGGBB` (BGRA8 byte order in little-endian memory).
    #[inline]
    pub const fn to_argb(self) -> u32 {
        (self.a as u32) << 24 | (self.r as u32) << 16 | (self.g as u32) << 8 | (self.b as u32)
    }

    /// Unpack from a `0xAARRGGBB` pixel.
    #[inline]
    pub const fn from_argb(v: u32) -> Self {
        Self {
            a: (v >> 24) as u8,
            r: (v >> 16) as u8,
            g: (v >> 8) as u8,
            b: v as u8,
        }
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Color(#{:02x}{:02x}{:02x}{:02x})", self.r, self.g, self.b, self.a)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Vec2 — 2D vector / point
// ─────────────────────────────────────────────────────────────────────────────

/// A 2D vector (or point) with `f32` components.
#[derive(Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Dot product.
    #[inline]
    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y
    }

    /// Squared length (avoids a `sqrt`).
    #[inline]
    pub fn length_sq(self) -> f32 {
        self.dot(self)
    }

    /// Point halfway between `self` and `other`.
    #[inline]
    pub fn midpoint(self, other: Self) -> Self {
        Self {
            x: (self.x + other.x) * 0.5,
            y: (self.y + other.y) * 0.5,
        }
    }
}

impl fmt::Debug for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vec2({}, {})", self.x, self.y)
    }
}

impl Add for Vec2 {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Sub for Vec2 {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: f32) -> Self {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

impl Neg for Vec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// IRect — integer pixel rectangle
// ─────────────────────────────────────────────────────────────────────────────

/// A half-open pixel rectangle `[min_x, max_x) × [min_y, max_y)`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IRect {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl IRect {
    pub const EMPTY: Self = Self { min_x: 0, min_y: 0, max_x: 0, max_y: 0 };

    #[inline]
    pub const fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Create from origin and size.
    #[inline]
    pub const fn from_xywh(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { min_x: x, min_y: y, max_x: x + w, max_y: y + h }
    }

    #[inline]
    pub fn width(self) -> i32 {
        self.max_x - self.min_x
    }

    #[inline]
    pub fn height(self) -> i32 {
        self.max_y - self.min_y
    }

    /// True if width or height is ≤ 0.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.max_x <= self.min_x || self.max_y <= self.min_y
    }

    /// Does the rectangle contain the pixel `(x, y)`?
    #[inline]
    pub fn contains(self, x: i32, y: i32) -> bool {
        x >= self.min_x && y >= self.min_y && x < self.max_x && y < self.max_y
    }

    /// Does `self` fully contain `other`?
    #[inline]
    pub fn contains_rect(self, other: Self) -> bool {
        other.min_x >= self.min_x
            && other.min_y >= self.min_y
            && other.max_x <= self.max_x
            && other.max_y <= self.max_y
    }

    /// Compute the intersection of two rectangles.
    /// Returns `IRect::EMPTY` if they don't overlap.
    pub fn intersect(self, other: Self) -> Self {
        let r = Self {
            min_x: self.min_x.max(other.min_x),
            min_y: self.min_y.max(other.min_y),
            max_x: self.max_x.min(other.max_x),
            max_y: self.max_y.min(other.max_y),
        };
        if r.is_empty() { Self::EMPTY } else { r }
    }

    /// Smallest rectangle containing both; empty inputs are ignored.
    pub fn union(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Translate the rectangle by `(dx, dy)`.
    #[inline]
    pub fn translate(self, dx: i32, dy: i32) -> Self {
        Self {
            min_x: self.min_x + dx,
            min_y: self.min_y + dy,
            max_x: self.max_x + dx,
            max_y: self.max_y + dy,
        }
    }
}

impl fmt::Debug for IRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IRect([{}, {}) × [{}, {}))", self.min_x, self.max_x, self.min_y, self.max_y)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mat3x2 — 2D affine transformation matrix
// ─────────────────────────────────────────────────────────────────────────────

/// A 3×2 affine transformation matrix for 2D graphics.
///
/// ```text
/// | a  b  0 |
/// | c  d  0 |
/// | e  f  1 |
/// ```
///
/// Transforming a point `(x, y)`:
/// ```text
/// x' = a*x + c*y + e
/// y' = b*x + d*y + f
/// ```
///
/// This is the same layout TrueType uses for composite glyph components, so a
/// component's `(xscale, scale01, scale10, yscale, dx, dy)` maps onto
/// `(a, b, c, d, e, f)` directly.
#[derive(Clone, Copy, PartialEq)]
pub struct Mat3x2 {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Mat3x2 {
    /// The identity matrix (no transformation).
    pub const IDENTITY: Self = Self {
        a: 1.0, b: 0.0,
        c: 0.0, d: 1.0,
        e: 0.0, f: 0.0,
    };

    /// Create a translation matrix.
    #[inline]
    pub const fn translate(tx: f32, ty: f32) -> Self {
        Self {
            a: 1.0, b: 0.0,
            c: 0.0, d: 1.0,
            e: tx, f: ty,
        }
    }

    /// Create a uniform or non-uniform scaling matrix.
    #[inline]
    pub const fn scale(sx: f32, sy: f32) -> Self {
        Self {
            a: sx, b: 0.0,
            c: 0.0, d: sy,
            e: 0.0, f: 0.0,
        }
    }

    /// Font units (y up) to pixels (y down): scale by `scale`, flip y, then
    /// move the origin to `(origin_x, baseline_y)`.
    #[inline]
    pub const fn font_to_pixels(scale: f32, origin_x: f32, baseline_y: f32) -> Self {
        Self {
            a: scale, b: 0.0,
            c: 0.0, d: -scale,
            e: origin_x, f: baseline_y,
        }
    }

    /// Transform a point.
    #[inline]
    pub fn transform_point(self, p: Vec2) -> Vec2 {
        Vec2 {
            x: self.a * p.x + self.c * p.y + self.e,
            y: self.b * p.x + self.d * p.y + self.f,
        }
    }

    /// Multiply two matrices: `self * rhs` (apply `rhs` first, then `self`).
    #[inline]
    pub fn multiply(self, rhs: Self) -> Self {
        Self {
            a: self.a * rhs.a + self.c * rhs.b,
            b: self.b * rhs.a + self.d * rhs.b,
            c: self.a * rhs.c + self.c * rhs.d,
            d: self.b * rhs.c + self.d * rhs.d,
            e: self.a * rhs.e + self.c * rhs.f + self.e,
            f: self.b * rhs.e + self.d * rhs.f + self.f,
        }
    }
}

impl Default for Mat3x2 {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Debug for Mat3x2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mat3x2 [{}, {}; {}, {}; {}, {}]",
            self.a, self.b, self.c, self.d, self.e, self.f
        )
    }
}

impl Mul for Mat3x2 {
    type Output = Self;
    #[inline]
    fn mul(self, rhs: Self) -> Self {
        self.multiply(rhs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PathCommand
// ─────────────────────────────────────────────────────────────────────────────

/// One drawing command of a path. Coordinates are in whatever space the
/// producer transformed them into (pixels, for everything the rasterizer sees).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCommand {
    MoveTo(Vec2),
    LineTo(Vec2),
    QuadraticCurveTo {
        ctrl: Vec2,
        to: Vec2,
    },
    CubicCurveTo {
        ctrl1: Vec2,
        ctrl2: Vec2,
        to: Vec2,
    },
    /// SVG-style elliptical arc from the current point to `to`.
    ArcTo {
        radii: Vec2,
        /// Rotation of the ellipse's x axis, in radians.
        x_rotation: f32,
        large_arc: bool,
        sweep: bool,
        to: Vec2,
    },
    ClosePath,
}

impl PathCommand {
    /// Apply an affine transform to every point the command carries.
    ///
    /// Arc radii and rotation are left untouched, so only translations and
    /// uniform scales (with radii pre-scaled by the caller) are exact for arcs.
    pub fn transformed(self, m: Mat3x2) -> Self {
        match self {
            Self::MoveTo(p) => Self::MoveTo(m.transform_point(p)),
            Self::LineTo(p) => Self::LineTo(m.transform_point(p)),
            Self::QuadraticCurveTo { ctrl, to } => Self::QuadraticCurveTo {
                ctrl: m.transform_point(ctrl),
                to: m.transform_point(to),
            },
            Self::CubicCurveTo { ctrl1, ctrl2, to } => Self::CubicCurveTo {
                ctrl1: m.transform_point(ctrl1),
                ctrl2: m.transform_point(ctrl2),
                to: m.transform_point(to),
            },
            Self::ArcTo { radii, x_rotation, large_arc, sweep, to } => Self::ArcTo {
                radii,
                x_rotation,
                large_arc,
                sweep,
                to: m.transform_point(to),
            },
            Self::ClosePath => Self::ClosePath,
        }
    }

    /// [`transformed`](Self::transformed) for a matrix whose linear part is a
    /// uniform scale by `scale`; arc radii are scaled along with the points.
    pub fn transformed_uniform(self, m: Mat3x2, scale: f32) -> Self {
        match self.transformed(m) {
            Self::ArcTo { radii, x_rotation, large_arc, sweep, to } => Self::ArcTo {
                radii: radii * scale.abs(),
                x_rotation,
                large_arc,
                sweep,
                to,
            },
            cmd => cmd,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Cursor ──

    #[test]
    fn cursor_u8() {
        let data = [0xAB];
        let mut c = Cursor::new(&data, Endian::Big);
        assert_eq!(c.u8().unwrap(), 0xAB);
        assert!(c.u8().is_err());
    }

    #[test]
    fn cursor_u16_big_endian() {
        let data = [0x01, 0x02];
        let mut c = Cursor::new(&data, Endian::Big);
        assert_eq!(c.u16().unwrap(), 0x0102);
    }

    #[test]
    fn cursor_u16_little_endian() {
        let data = [0x01, 0x02];
        let mut c = Cursor::new(&data, Endian::Little);
        assert_eq!(c.u16().unwrap(), 0x0201);
    }

    #[test]
    fn cursor_i16_and_i8() {
        let data = [0xFF, 0xFE, 0x80];
        let mut c = Cursor::new(&data, Endian::Big);
        assert_eq!(c.i16().unwrap(), -2);
        assert_eq!(c.i8().unwrap(), -128);
    }

    #[test]
    fn cursor_u32_big_endian() {
        let data = [0x00, 0x01, 0x00, 0x00];
        let mut c = Cursor::new(&data, Endian::Big);
        assert_eq!(c.u32().unwrap(), 0x0001_0000);
    }

    #[test]
    fn cursor_f2dot14() {
        let mut data = Vec::new();
        data.extend_from_slice(&0x4000i16.to_be_bytes()); // 1.0
        data.extend_from_slice(&(-0x2000i16).to_be_bytes()); // -0.5
        let mut c = Cursor::new(&data, Endian::Big);
        assert_eq!(c.f2dot14().unwrap(), 1.0);
        assert_eq!(c.f2dot14().unwrap(), -0.5);
    }

    #[test]
    fn cursor_tag() {
        let mut c = Cursor::new(b"glyfloca", Endian::Big);
        assert_eq!(&c.tag().unwrap(), b"glyf");
        assert_eq!(&c.tag().unwrap(), b"loca");
        assert!(c.tag().is_err());
    }

    #[test]
    fn cursor_bytes_and_skip() {
        let data = [1, 2, 3, 4, 5, 6];
        let mut c = Cursor::new(&data, Endian::Big);
        c.skip(2).unwrap();
        assert_eq!(c.position(), 2);
        let b = c.bytes(3).unwrap();
        assert_eq!(b, &[3, 4, 5]);
        assert_eq!(c.remaining(), 1);
    }

    #[test]
    fn cursor_at_and_set_position() {
        let data = [10, 20, 30];
        let mut c = Cursor::at(&data, 2, Endian::Big).unwrap();
        assert_eq!(c.u8().unwrap(), 30);
        assert!(c.is_empty());
        assert!(c.set_position(4).is_err());
        assert!(Cursor::at(&data, 4, Endian::Big).is_err());
    }

    #[test]
    fn cursor_huge_skip_is_eof_not_overflow() {
        let data = [0u8; 4];
        let mut c = Cursor::new(&data, Endian::Big);
        c.skip(1).unwrap();
        assert_eq!(c.skip(usize::MAX), Err(ParseError::UnexpectedEof));
    }

    #[test]
    fn absolute_readers() {
        let data = [0x00, 0x12, 0x34, 0x56, 0x78];
        assert_eq!(read_u16_be(&data, 1).unwrap(), 0x1234);
        assert!(read_u16_be(&data, 4).is_err());
    }

    // ── BufWriter ──

    #[test]
    fn bufwriter_basic() {
        let mut w = BufWriter::new(Endian::Big);
        w.u8(0xFF);
        w.u16(0x0102);
        w.u32(0x03040506);
        w.i16(-1);
        assert_eq!(w.out, [0xFF, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0xFF, 0xFF]);
    }

    #[test]
    fn bufwriter_bytes_and_pad4() {
        let mut w = BufWriter::new(Endian::Big);
        w.bytes(&[1, 2, 3, 4, 5]);
        w.pad4();
        assert_eq!(w.len(), 8);
        w.clear();
        assert!(w.is_empty());
    }

    #[test]
    fn cursor_reads_what_bufwriter_wrote() {
        let mut w = BufWriter::new(Endian::Little);
        w.i32(-7);
        w.i16(-300);
        let bytes = w.finish();
        let mut c = Cursor::new(&bytes, Endian::Little);
        assert_eq!(c.i32().unwrap(), -7);
        assert_eq!(c.i16().unwrap(), -300);
    }

    #[test]
    fn parse_error_display() {
        assert_eq!(ParseError::UnexpectedEof.to_string(), "unexpected end of input");
        assert_eq!(ParseError::InvalidValue("bad tag").to_string(), "invalid value: bad tag");
        assert_eq!(
            ParseError::LengthOutOfRange("loca").to_string(),
            "length out of range: loca"
        );
    }

    // ── Color ──

    #[test]
    fn color_premultiply() {
        let c = Color::from_straight(255, 128, 0, 128);
        assert_eq!(c.a, 128);
        assert_eq!(c.r, 128);
        assert_eq!(c.g, 64);
        assert_eq!(c.b, 0);
        assert_eq!(Color::from_straight(10, 20, 30, 255), Color::rgb(10, 20, 30));
    }

    #[test]
    fn color_argb_packing() {
        let c = Color::rgba(0x11, 0x22, 0x33, 0x44);
        assert_eq!(c.to_argb(), 0x4411_2233);
        assert_eq!(Color::from_argb(0x4411_2233), c);
    }

    #[test]
    fn color_scale_by_coverage() {
        assert_eq!(Color::WHITE.scale(1.0), Color::WHITE);
        assert_eq!(Color::WHITE.scale(0.0), Color::TRANSPARENT);
        assert_eq!(Color::WHITE.scale(0.5), Color::rgba(128, 128, 128, 128));
        assert_eq!(Color::WHITE.scale(7.0), Color::WHITE);
    }

    // ── Vec2 ──

    #[test]
    fn vec2_ops() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(3.0, 6.0);
        assert_eq!(a + b, Vec2::new(4.0, 8.0));
        assert_eq!(b - a, Vec2::new(2.0, 4.0));
        assert_eq!(a * 2.0, Vec2::new(2.0, 4.0));
        assert_eq!(-a, Vec2::new(-1.0, -2.0));
        assert_eq!(a.midpoint(b), Vec2::new(2.0, 4.0));
        assert_eq!(b.length_sq(), 45.0);
    }

    // ── IRect ──

    #[test]
    fn irect_intersect_and_union() {
        let a = IRect::new(0, 0, 10, 10);
        let b = IRect::new(5, 5, 20, 20);
        assert_eq!(a.intersect(b), IRect::new(5, 5, 10, 10));
        assert_eq!(a.union(b), IRect::new(0, 0, 20, 20));
        assert_eq!(a.intersect(IRect::new(10, 0, 12, 5)), IRect::EMPTY);
        assert_eq!(IRect::EMPTY.union(b), b);
    }

    #[test]
    fn irect_queries() {
        let r = IRect::from_xywh(2, 3, 4, 5);
        assert_eq!(r, IRect::new(2, 3, 6, 8));
        assert_eq!(r.width(), 4);
        assert_eq!(r.height(), 5);
        assert!(r.contains(2, 3));
        assert!(!r.contains(6, 3));
        assert!(r.contains_rect(IRect::new(3, 4, 6, 8)));
        assert!(!r.contains_rect(IRect::new(1, 4, 6, 8)));
        assert_eq!(r.translate(-2, -3), IRect::new(0, 0, 4, 5));
        assert!(IRect::new(4, 0, 4, 10).is_empty());
    }

    // ── Mat3x2 ──

    #[test]
    fn mat3x2_identity() {
        let p = Vec2::new(3.0, 7.0);
        assert_eq!(Mat3x2::IDENTITY.transform_point(p), p);
        assert_eq!(Mat3x2::default(), Mat3x2::IDENTITY);
    }

    #[test]
    fn mat3x2_translate_then_scale() {
        let s = Mat3x2::scale(2.0, 2.0);
        let t = Mat3x2::translate(10.0, 10.0);
        // t * s means: apply s first, then t
        let result = (t * s).transform_point(Vec2::new(1.0, 1.0));
        assert!((result.x - 12.0).abs() < 1e-6);
        assert!((result.y - 12.0).abs() < 1e-6);
    }

    #[test]
    fn mat3x2_font_to_pixels_flips_y() {
        let m = Mat3x2::font_to_pixels(0.5, 10.0, 100.0);
        assert_eq!(m.transform_point(Vec2::new(0.0, 0.0)), Vec2::new(10.0, 100.0));
        assert_eq!(m.transform_point(Vec2::new(20.0, 40.0)), Vec2::new(20.0, 80.0));
    }

    #[test]
    fn path_command_transformed() {
        let m = Mat3x2::translate(1.0, 2.0);
        let cmd = PathCommand::QuadraticCurveTo {
            ctrl: Vec2::new(0.0, 0.0),
            to: Vec2::new(4.0, 4.0),
        };
        assert_eq!(
            cmd.transformed(m),
            PathCommand::QuadraticCurveTo {
                ctrl: Vec2::new(1.0, 2.0),
                to: Vec2::new(5.0, 6.0),
            }
        );
        assert_eq!(PathCommand::ClosePath.transformed(m), PathCommand::ClosePath);
    }

    #[test]
    fn uniform_transform_scales_arc_radii() {
        let m = Mat3x2::translate(0.5, 0.25) * Mat3x2::scale(2.0, 2.0);
        let arc = PathCommand::ArcTo {
            radii: Vec2::new(20.0, 10.0),
            x_rotation: 0.3,
            large_arc: true,
            sweep: false,
            to: Vec2::new(30.0, 0.0),
        };
        assert_eq!(
            arc.transformed_uniform(m, 2.0),
            PathCommand::ArcTo {
                radii: Vec2::new(40.0, 20.0),
                x_rotation: 0.3,
                large_arc: true,
                sweep: false,
                to: Vec2::new(60.5, 0.25),
            }
        );
        let line = PathCommand::LineTo(Vec2::new(1.0, 1.0));
        assert_eq!(line.transformed_uniform(m, 2.0), line.transformed(m));
    }
}
