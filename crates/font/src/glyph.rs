//! Glyph outline parsing from the `glyf` table.
//!
//! Handles both simple glyphs (contour points) and composite glyphs
//! (references to other glyphs with transforms), and converts decoded
//! contours into [`PathCommand`]s.

use common::{Cursor, Endian, Mat3x2, ParseError, PathCommand, Vec2};

// ─────────────────────────────────────────────────────────────────────────────
// OutlinePoint / Contour / GlyphOutline
// ─────────────────────────────────────────────────────────────────────────────

/// A single point in a glyph outline, in font units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutlinePoint {
    pub x: i32,
    pub y: i32,
    pub on_curve: bool,
}

impl OutlinePoint {
    pub const fn on(x: i32, y: i32) -> Self {
        Self { x, y, on_curve: true }
    }

    pub const fn off(x: i32, y: i32) -> Self {
        Self { x, y, on_curve: false }
    }
}

/// A closed contour (sequence of points).
#[derive(Clone, Debug, PartialEq)]
pub struct Contour {
    pub points: Vec<OutlinePoint>,
}

/// A simple glyph outline consisting of contours.
#[derive(Clone, Debug)]
pub struct GlyphOutline {
    pub contours: Vec<Contour>,
}

// ─────────────────────────────────────────────────────────────────────────────
// CompositeComponent
// ─────────────────────────────────────────────────────────────────────────────

/// A component of a composite glyph.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositeComponent {
    pub glyph_id: u16,
    pub dx: i16,
    pub dy: i16,
    /// Scale factors (if present). Default is identity (1.0, 0.0, 0.0, 1.0).
    pub scale_x: f32,
    pub scale_01: f32,
    pub scale_10: f32,
    pub scale_y: f32,
}

impl CompositeComponent {
    pub fn identity(glyph_id: u16, dx: i16, dy: i16) -> Self {
        Self {
            glyph_id, dx, dy,
            scale_x: 1.0, scale_01: 0.0,
            scale_10: 0.0, scale_y: 1.0,
        }
    }

    /// The component's placement as an affine transform in the parent's
    /// font-unit space.
    pub fn transform(&self) -> Mat3x2 {
        Mat3x2 {
            a: self.scale_x,
            b: self.scale_01,
            c: self.scale_10,
            d: self.scale_y,
            e: self.dx as f32,
            f: self.dy as f32,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// GlyphDesc
// ─────────────────────────────────────────────────────────────────────────────

/// Description of a glyph: empty, simple outline, or composite.
#[derive(Clone, Debug)]
pub enum GlyphDesc {
    /// Glyph has no outline (e.g., space character).
    Empty,
    /// Simple glyph with contour data.
    Simple(GlyphOutline),
    /// Composite glyph referencing other glyphs.
    Composite(Vec<CompositeComponent>),
}

// ─────────────────────────────────────────────────────────────────────────────
// Flag bits
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) const ON_CURVE_POINT: u8 = 0x01;
pub(crate) const X_SHORT_VECTOR: u8 = 0x02;
pub(crate) const Y_SHORT_VECTOR: u8 = 0x04;
pub(crate) const REPEAT_FLAG: u8 = 0x08;
pub(crate) const X_IS_SAME_OR_POSITIVE_SHORT: u8 = 0x10;
pub(crate) const Y_IS_SAME_OR_POSITIVE_SHORT: u8 = 0x20;

// Composite glyph flags
pub(crate) const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
pub(crate) const ARGS_ARE_XY_VALUES: u16 = 0x0002;
pub(crate) const WE_HAVE_A_SCALE: u16 = 0x0008;
pub(crate) const MORE_COMPONENTS: u16 = 0x0020;
pub(crate) const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
pub(crate) const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

/// Parse a glyph from its `glyf` slice (as delimited by `loca`).
pub fn parse_glyph(data: &[u8]) -> Result<GlyphDesc, ParseError> {
    if data.is_empty() {
        return Ok(GlyphDesc::Empty);
    }

    let mut c = Cursor::new(data, Endian::Big);
    let num_contours = c.i16()?;
    c.skip(8)?; // bounding box

    if num_contours >= 0 {
        parse_simple_glyph(&mut c, num_contours as u16)
    } else {
        parse_composite_glyph(&mut c)
    }
}

fn parse_simple_glyph(c: &mut Cursor<'_>, num_contours: u16) -> Result<GlyphDesc, ParseError> {
    if num_contours == 0 {
        return Ok(GlyphDesc::Empty);
    }

    let mut end_pts = Vec::with_capacity(num_contours as usize);
    for _ in 0..num_contours {
        end_pts.push(c.u16()?);
    }
    let num_points = end_pts.last().map_or(0, |&e| e as usize + 1);

    // Skip instructions
    let instruction_len = c.u16()? as usize;
    c.skip(instruction_len)?;

    // Read flags
    let mut flags = Vec::with_capacity(num_points);
    while flags.len() < num_points {
        let flag = c.u8()?;
        flags.push(flag);
        if flag & REPEAT_FLAG != 0 {
            let repeat_count = c.u8()? as usize;
            let n = repeat_count.min(num_points - flags.len());
            flags.extend(std::iter::repeat_n(flag, n));
        }
    }

    let xs = read_coords(c, &flags, X_SHORT_VECTOR, X_IS_SAME_OR_POSITIVE_SHORT)?;
    let ys = read_coords(c, &flags, Y_SHORT_VECTOR, Y_IS_SAME_OR_POSITIVE_SHORT)?;

    let mut contours = Vec::with_capacity(num_contours as usize);
    let mut start = 0usize;
    for &end in &end_pts {
        let end = end as usize;
        if end < start || end >= num_points {
            return Err(ParseError::InvalidValue("contour end points are not ascending"));
        }
        let points = (start..=end)
            .map(|j| OutlinePoint {
                x: xs[j],
                y: ys[j],
                on_curve: flags[j] & ON_CURVE_POINT != 0,
            })
            .collect();
        contours.push(Contour { points });
        start = end + 1;
    }

    Ok(GlyphDesc::Simple(GlyphOutline { contours }))
}

/// Delta-decode one coordinate axis.
fn read_coords(c: &mut Cursor<'_>, flags: &[u8], short: u8, same_or_positive: u8) -> Result<Vec<i32>, ParseError> {
    let mut coords = Vec::with_capacity(flags.len());
    let mut v: i32 = 0;
    for &flag in flags {
        if flag & short != 0 {
            let d = c.u8()? as i32;
            if flag & same_or_positive != 0 {
                v += d;
            } else {
                v -= d;
            }
        } else if flag & same_or_positive == 0 {
            v += c.i16()? as i32;
        }
        coords.push(v);
    }
    Ok(coords)
}

fn parse_composite_glyph(c: &mut Cursor<'_>) -> Result<GlyphDesc, ParseError> {
    let mut components = Vec::new();

    loop {
        let flags = c.u16()?;
        let glyph_id = c.u16()?;

        let (arg1, arg2) = if flags & ARG_1_AND_2_ARE_WORDS != 0 {
            (c.i16()?, c.i16()?)
        } else {
            (c.i8()? as i16, c.i8()? as i16)
        };

        let (dx, dy) = if flags & ARGS_ARE_XY_VALUES != 0 {
            (arg1, arg2)
        } else {
            // Point-matching anchors would need the parent's points; place the
            // component at the parent origin instead.
            log::debug!("composite component {glyph_id} uses point matching ({arg1}, {arg2}); placing at origin");
            (0, 0)
        };

        let mut comp = CompositeComponent::identity(glyph_id, dx, dy);

        if flags & WE_HAVE_A_SCALE != 0 {
            let scale = c.f2dot14()?;
            comp.scale_x = scale;
            comp.scale_y = scale;
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            comp.scale_x = c.f2dot14()?;
            comp.scale_y = c.f2dot14()?;
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            comp.scale_x = c.f2dot14()?;
            comp.scale_01 = c.f2dot14()?;
            comp.scale_10 = c.f2dot14()?;
            comp.scale_y = c.f2dot14()?;
        }

        components.push(comp);

        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }

    Ok(GlyphDesc::Composite(components))
}

// ─────────────────────────────────────────────────────────────────────────────
// Contour → PathCommand
// ─────────────────────────────────────────────────────────────────────────────

/// Append the commands tracing one contour, transformed by `m`.
///
/// Consecutive off-curve points get an implied on-curve point halfway
/// between them. The contour starts at its first on-curve point; when the
/// first point is off-curve the last point is used if it is on-curve,
/// otherwise the midpoint of the first and last points.
pub fn push_contour(points: &[OutlinePoint], m: Mat3x2, out: &mut Vec<PathCommand>) {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return;
    };
    let map = |p: &OutlinePoint| m.transform_point(Vec2::new(p.x as f32, p.y as f32));

    let (start, rest) = if first.on_curve {
        (map(first), &points[1..])
    } else if last.on_curve {
        (map(last), &points[..points.len() - 1])
    } else {
        (map(first).midpoint(map(last)), points)
    };

    out.push(PathCommand::MoveTo(start));
    let mut ctrl: Option<Vec2> = None;
    for p in rest {
        let v = map(p);
        if p.on_curve {
            out.push(match ctrl.take() {
                Some(ctrl) => PathCommand::QuadraticCurveTo { ctrl, to: v },
                None => PathCommand::LineTo(v),
            });
        } else {
            if let Some(prev) = ctrl {
                out.push(PathCommand::QuadraticCurveTo { ctrl: prev, to: prev.midpoint(v) });
            }
            ctrl = Some(v);
        }
    }
    if let Some(ctrl) = ctrl {
        out.push(PathCommand::QuadraticCurveTo { ctrl, to: start });
    }
    out.push(PathCommand::ClosePath);
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f32, y: f32) -> Vec2 {
        Vec2::new(x, y)
    }

    #[test]
    fn empty_glyph() {
        assert!(matches!(parse_glyph(&[]), Ok(GlyphDesc::Empty)));
    }

    #[test]
    fn composite_component_identity() {
        let c = CompositeComponent::identity(42, 10, 20);
        assert_eq!(c.glyph_id, 42);
        assert_eq!(c.transform(), Mat3x2::translate(10.0, 20.0));
    }

    #[test]
    fn simple_glyph_triangle() {
        // 1 contour, 3 on-curve points: (0,0), (500,0), (250,500)
        let mut data = Vec::new();
        data.extend_from_slice(&1i16.to_be_bytes());
        for v in [0i16, 0, 500, 500] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        data.extend_from_slice(&2u16.to_be_bytes()); // endPtsOfContours[0]
        data.extend_from_slice(&0u16.to_be_bytes()); // instructionLength
        data.push(ON_CURVE_POINT | X_IS_SAME_OR_POSITIVE_SHORT | Y_IS_SAME_OR_POSITIVE_SHORT);
        data.push(ON_CURVE_POINT | Y_IS_SAME_OR_POSITIVE_SHORT);
        data.push(ON_CURVE_POINT);
        data.extend_from_slice(&500i16.to_be_bytes());
        data.extend_from_slice(&(-250i16).to_be_bytes());
        data.extend_from_slice(&500i16.to_be_bytes());

        let GlyphDesc::Simple(outline) = parse_glyph(&data).unwrap() else {
            panic!("expected Simple glyph");
        };
        assert_eq!(outline.contours.len(), 1);
        assert_eq!(
            outline.contours[0].points,
            [OutlinePoint::on(0, 0), OutlinePoint::on(500, 0), OutlinePoint::on(250, 500)]
        );
    }

    #[test]
    fn simple_glyph_repeat_and_short_vectors() {
        // 4 points sharing one repeated flag: short positive x, short negative y.
        let mut data = Vec::new();
        data.extend_from_slice(&1i16.to_be_bytes());
        data.extend_from_slice(&[0; 8]);
        data.extend_from_slice(&3u16.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.push(ON_CURVE_POINT | X_SHORT_VECTOR | Y_SHORT_VECTOR | X_IS_SAME_OR_POSITIVE_SHORT | REPEAT_FLAG);
        data.push(3);
        data.extend_from_slice(&[10, 10, 10, 10]);
        data.extend_from_slice(&[1, 2, 3, 4]);

        let GlyphDesc::Simple(outline) = parse_glyph(&data).unwrap() else {
            panic!("expected Simple glyph");
        };
        let pts = &outline.contours[0].points;
        assert_eq!(pts[3], OutlinePoint::on(40, -10));
    }

    #[test]
    fn simple_glyph_truncated_is_error() {
        let mut data = Vec::new();
        data.extend_from_slice(&1i16.to_be_bytes());
        data.extend_from_slice(&[0; 8]);
        data.extend_from_slice(&5u16.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.push(ON_CURVE_POINT);
        assert_eq!(parse_glyph(&data).unwrap_err(), ParseError::UnexpectedEof);
    }

    #[test]
    fn simple_glyph_descending_end_points_rejected() {
        let mut data = Vec::new();
        data.extend_from_slice(&2i16.to_be_bytes());
        data.extend_from_slice(&[0; 8]);
        data.extend_from_slice(&2u16.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&[ON_CURVE_POINT | 0x30, ON_CURVE_POINT | 0x30]);
        assert!(matches!(parse_glyph(&data), Err(ParseError::InvalidValue(_))));
    }

    #[test]
    fn composite_glyph_scales_and_point_matching() {
        let mut data = Vec::new();
        data.extend_from_slice(&(-1i16).to_be_bytes());
        data.extend_from_slice(&[0; 8]);
        // Component 1: word xy args + x/y scale.
        let flags = ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES | WE_HAVE_AN_X_AND_Y_SCALE | MORE_COMPONENTS;
        data.extend_from_slice(&flags.to_be_bytes());
        data.extend_from_slice(&3u16.to_be_bytes());
        data.extend_from_slice(&(-300i16).to_be_bytes());
        data.extend_from_slice(&40i16.to_be_bytes());
        data.extend_from_slice(&0x2000i16.to_be_bytes()); // 0.5
        data.extend_from_slice(&0x4000i16.to_be_bytes()); // 1.0
        // Component 2: byte point-matching args.
        data.extend_from_slice(&0u16.to_be_bytes());
        data.extend_from_slice(&4u16.to_be_bytes());
        data.extend_from_slice(&[2, 5]);

        let GlyphDesc::Composite(components) = parse_glyph(&data).unwrap() else {
            panic!("expected Composite glyph");
        };
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].glyph_id, 3);
        assert_eq!((components[0].dx, components[0].dy), (-300, 40));
        assert_eq!(components[0].scale_x, 0.5);
        assert_eq!(components[0].scale_y, 1.0);
        assert_eq!(components[1], CompositeComponent::identity(4, 0, 0));
    }

    #[test]
    fn contour_all_on_curve() {
        let mut out = Vec::new();
        let pts = [OutlinePoint::on(0, 0), OutlinePoint::on(10, 0), OutlinePoint::on(10, 10)];
        push_contour(&pts, Mat3x2::IDENTITY, &mut out);
        assert_eq!(
            out,
            [
                PathCommand::MoveTo(v(0.0, 0.0)),
                PathCommand::LineTo(v(10.0, 0.0)),
                PathCommand::LineTo(v(10.0, 10.0)),
                PathCommand::ClosePath,
            ]
        );
    }

    #[test]
    fn contour_implied_midpoints() {
        let mut out = Vec::new();
        let pts = [OutlinePoint::on(0, 0), OutlinePoint::off(10, 0), OutlinePoint::off(10, 10)];
        push_contour(&pts, Mat3x2::IDENTITY, &mut out);
        assert_eq!(
            out,
            [
                PathCommand::MoveTo(v(0.0, 0.0)),
                PathCommand::QuadraticCurveTo { ctrl: v(10.0, 0.0), to: v(10.0, 5.0) },
                PathCommand::QuadraticCurveTo { ctrl: v(10.0, 10.0), to: v(0.0, 0.0) },
                PathCommand::ClosePath,
            ]
        );
    }

    #[test]
    fn contour_starting_off_curve_uses_last_on_curve() {
        let mut out = Vec::new();
        let pts = [OutlinePoint::off(10, 0), OutlinePoint::on(10, 10), OutlinePoint::on(0, 0)];
        push_contour(&pts, Mat3x2::IDENTITY, &mut out);
        assert_eq!(out[0], PathCommand::MoveTo(v(0.0, 0.0)));
        assert_eq!(
            out[1],
            PathCommand::QuadraticCurveTo { ctrl: v(10.0, 0.0), to: v(10.0, 10.0) }
        );
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn contour_all_off_curve_starts_at_midpoint() {
        let mut out = Vec::new();
        let pts = [
            OutlinePoint::off(0, 0),
            OutlinePoint::off(10, 0),
            OutlinePoint::off(10, 10),
            OutlinePoint::off(0, 10),
        ];
        push_contour(&pts, Mat3x2::IDENTITY, &mut out);
        assert_eq!(out[0], PathCommand::MoveTo(v(0.0, 5.0)));
        // One quad per off-curve point, then ClosePath.
        assert_eq!(out.len(), 6);
        assert_eq!(
            out[4],
            PathCommand::QuadraticCurveTo { ctrl: v(0.0, 10.0), to: v(0.0, 5.0) }
        );
    }

    #[test]
    fn contour_applies_transform() {
        let mut out = Vec::new();
        let pts = [OutlinePoint::on(100, 200), OutlinePoint::on(300, 200)];
        push_contour(&pts, Mat3x2::font_to_pixels(0.5, 5.0, 10.0), &mut out);
        assert_eq!(out[0], PathCommand::MoveTo(v(55.0, -90.0)));
        assert_eq!(out[1], PathCommand::LineTo(v(155.0, -90.0)));
    }
}
