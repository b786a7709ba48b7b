//! Minimal sfnt writer.
//!
//! Produces TrueType files containing exactly the tables [`crate::FontFile`]
//! reads. Used for the built-in fallback face and for synthetic fonts in tests.

use common::{BufWriter, Cursor, Endian, Vec2};

use crate::glyph::{
    CompositeComponent, OutlinePoint, ARGS_ARE_XY_VALUES, ARG_1_AND_2_ARE_WORDS, MORE_COMPONENTS,
    ON_CURVE_POINT, REPEAT_FLAG, WE_HAVE_AN_X_AND_Y_SCALE, WE_HAVE_A_SCALE, WE_HAVE_A_TWO_BY_TWO,
    X_IS_SAME_OR_POSITIVE_SHORT, X_SHORT_VECTOR, Y_IS_SAME_OR_POSITIVE_SHORT, Y_SHORT_VECTOR,
};
use crate::tables::{LocaFormat, TableTag, SFNT_VERSION_TRUETYPE};

#[derive(Clone, Debug)]
enum GlyphData {
    Empty,
    Simple(Vec<Vec<OutlinePoint>>),
    Composite(Vec<CompositeComponent>),
    Raw(Vec<u8>),
}

/// Builds a TrueType font in memory.
#[derive(Clone, Debug)]
pub struct FontBuilder {
    units_per_em: u16,
    ascent: i16,
    descent: i16,
    line_gap: i16,
    loca_format: LocaFormat,
    glyphs: Vec<GlyphData>,
    advances: Vec<u16>,
    long_metrics: Option<u16>,
    mapping: Vec<(u32, u16)>,
    cmap_subtables: Vec<(u16, u16, u16)>,
}

impl FontBuilder {
    /// Start a font with an empty `.notdef` glyph 0.
    pub fn new(units_per_em: u16) -> Self {
        Self {
            units_per_em,
            ascent: (units_per_em as i32 * 4 / 5) as i16,
            descent: -((units_per_em as i32 / 5) as i16),
            line_gap: 0,
            loca_format: LocaFormat::Long,
            glyphs: vec![GlyphData::Empty],
            advances: vec![units_per_em / 2],
            long_metrics: None,
            mapping: Vec::new(),
            cmap_subtables: Vec::new(),
        }
    }

    /// Set the `hhea` vertical metrics.
    pub fn metrics(mut self, ascent: i16, descent: i16, line_gap: i16) -> Self {
        self.ascent = ascent;
        self.descent = descent;
        self.line_gap = line_gap;
        self
    }

    pub fn loca_format(mut self, format: LocaFormat) -> Self {
        self.loca_format = format;
        self
    }

    /// Write only the first `count` advances as long metrics; later glyphs
    /// share the last one.
    pub fn long_metrics(mut self, count: u16) -> Self {
        self.long_metrics = Some(count);
        self
    }

    /// Add a cmap subtable of `format` (0, 4 or 12) under the given platform
    /// and encoding. Without any, a `(3, 1)` format 4 subtable is written.
    pub fn cmap_subtable(mut self, platform_id: u16, encoding_id: u16, format: u16) -> Self {
        self.cmap_subtables.push((platform_id, encoding_id, format));
        self
    }

    /// Map `codepoint` to `glyph` in every cmap subtable.
    pub fn map(&mut self, codepoint: u32, glyph: u16) -> &mut Self {
        self.mapping.push((codepoint, glyph));
        self
    }

    pub fn add_empty_glyph(&mut self, advance: u16) -> u16 {
        self.push_glyph(GlyphData::Empty, advance)
    }

    pub fn add_simple_glyph(&mut self, contours: &[Vec<OutlinePoint>], advance: u16) -> u16 {
        self.push_glyph(GlyphData::Simple(contours.to_vec()), advance)
    }

    pub fn add_composite_glyph(&mut self, components: &[CompositeComponent], advance: u16) -> u16 {
        self.push_glyph(GlyphData::Composite(components.to_vec()), advance)
    }

    /// Add a glyph whose `glyf` bytes are written verbatim.
    pub fn add_raw_glyph(&mut self, bytes: &[u8], advance: u16) -> u16 {
        self.push_glyph(GlyphData::Raw(bytes.to_vec()), advance)
    }

    /// Replace the outline of an existing glyph, e.g. to build reference cycles.
    pub fn set_composite_glyph(&mut self, glyph: u16, components: &[CompositeComponent]) {
        if let Some(slot) = self.glyphs.get_mut(glyph as usize) {
            *slot = GlyphData::Composite(components.to_vec());
        }
    }

    fn push_glyph(&mut self, data: GlyphData, advance: u16) -> u16 {
        self.glyphs.push(data);
        self.advances.push(advance);
        (self.glyphs.len() - 1) as u16
    }

    /// Serialize the font.
    pub fn build(&self) -> Vec<u8> {
        let (glyf, loca, bbox) = self.glyf_and_loca();
        let tables: [(TableTag, Vec<u8>); 7] = [
            (TableTag::CMAP, self.cmap()),
            (TableTag::GLYF, glyf),
            (TableTag::HEAD, self.head(bbox)),
            (TableTag::HHEA, self.hhea()),
            (TableTag::HMTX, self.hmtx()),
            (TableTag::LOCA, loca),
            (TableTag::MAXP, self.maxp()),
        ];

        let num_tables = tables.len() as u16;
        let entry_selector = 15 - num_tables.leading_zeros() as u16;
        let search_range = (1u16 << entry_selector) * 16;

        let mut w = BufWriter::new(Endian::Big);
        w.u32(SFNT_VERSION_TRUETYPE);
        w.u16(num_tables);
        w.u16(search_range);
        w.u16(entry_selector);
        w.u16(num_tables * 16 - search_range);

        let mut offset = 12 + 16 * tables.len();
        for (tag, body) in &tables {
            w.bytes(&tag.0);
            w.u32(checksum(body));
            w.u32(offset as u32);
            w.u32(body.len() as u32);
            offset += body.len().next_multiple_of(4);
        }
        for (_, body) in &tables {
            w.bytes(body);
            w.pad4();
        }
        w.finish()
    }

    fn glyf_and_loca(&self) -> (Vec<u8>, Vec<u8>, [i16; 4]) {
        let mut glyf = BufWriter::new(Endian::Big);
        let mut offsets = Vec::with_capacity(self.glyphs.len() + 1);
        let mut font_box: Option<[i32; 4]> = None;

        for (index, glyph) in self.glyphs.iter().enumerate() {
            offsets.push(glyf.len() as u32);
            let bbox = self.glyph_bbox(index, 0);
            font_box = union_box(font_box, bbox);
            let header = bbox.unwrap_or_default().map(|v| v as i16);
            match glyph {
                GlyphData::Empty => {}
                GlyphData::Simple(contours) => encode_simple(&mut glyf, contours, header),
                GlyphData::Composite(components) => encode_composite(&mut glyf, components, header),
                GlyphData::Raw(bytes) => glyf.bytes(bytes),
            }
            glyf.pad4();
        }
        offsets.push(glyf.len() as u32);

        let mut loca = BufWriter::new(Endian::Big);
        for off in offsets {
            match self.loca_format {
                LocaFormat::Short => loca.u16((off / 2) as u16),
                LocaFormat::Long => loca.u32(off),
            }
        }
        let font_box = font_box.unwrap_or_default().map(|v| v as i16);
        (glyf.finish(), loca.finish(), font_box)
    }

    /// Bounding box of a glyph in font units; composites take the union of
    /// their transformed component boxes.
    fn glyph_bbox(&self, index: usize, depth: u32) -> Option<[i32; 4]> {
        match self.glyphs.get(index)? {
            GlyphData::Empty => None,
            GlyphData::Simple(contours) => contours.iter().flatten().fold(None, |acc, p| {
                union_box(acc, Some([p.x, p.y, p.x, p.y]))
            }),
            GlyphData::Composite(components) if depth < 8 => {
                components.iter().fold(None, |acc, comp| {
                    let Some([x0, y0, x1, y1]) = self.glyph_bbox(comp.glyph_id as usize, depth + 1) else {
                        return acc;
                    };
                    let m = comp.transform();
                    [(x0, y0), (x1, y0), (x0, y1), (x1, y1)].into_iter().fold(acc, |acc, (x, y)| {
                        let p = m.transform_point(Vec2::new(x as f32, y as f32));
                        let (px, py) = (p.x.round() as i32, p.y.round() as i32);
                        union_box(acc, Some([px, py, px, py]))
                    })
                })
            }
            GlyphData::Composite(_) => None,
            GlyphData::Raw(bytes) => {
                let mut c = Cursor::at(bytes, 2, Endian::Big).ok()?;
                let b = [c.i16().ok()?, c.i16().ok()?, c.i16().ok()?, c.i16().ok()?];
                Some(b.map(i32::from))
            }
        }
    }

    fn head(&self, bbox: [i16; 4]) -> Vec<u8> {
        let mut w = BufWriter::with_capacity(Endian::Big, 54);
        w.u32(0x0001_0000); // version
        w.u32(0x0001_0000); // fontRevision
        w.u32(0); // checksumAdjustment
        w.u32(0x5F0F_3CF5); // magic
        w.u16(0); // flags
        w.u16(self.units_per_em);
        w.bytes(&[0; 16]); // created, modified
        for v in bbox {
            w.i16(v);
        }
        w.u16(0); // macStyle
        w.u16(8); // lowestRecPPEM
        w.i16(2); // fontDirectionHint
        w.i16(match self.loca_format {
            LocaFormat::Short => 0,
            LocaFormat::Long => 1,
        });
        w.i16(0); // glyphDataFormat
        w.finish()
    }

    fn hhea(&self) -> Vec<u8> {
        let mut w = BufWriter::with_capacity(Endian::Big, 36);
        w.u32(0x0001_0000);
        w.i16(self.ascent);
        w.i16(self.descent);
        w.i16(self.line_gap);
        w.u16(self.advances.iter().copied().max().unwrap_or(0));
        w.bytes(&[0; 22]);
        w.u16(self.num_long_metrics());
        w.finish()
    }

    fn num_long_metrics(&self) -> u16 {
        let total = self.advances.len() as u16;
        self.long_metrics.map_or(total, |n| n.clamp(1, total))
    }

    fn hmtx(&self) -> Vec<u8> {
        let long = self.num_long_metrics() as usize;
        let mut w = BufWriter::new(Endian::Big);
        for (i, &advance) in self.advances.iter().enumerate() {
            if i < long {
                w.u16(advance);
            }
            w.i16(0); // left side bearing
        }
        w.finish()
    }

    fn maxp(&self) -> Vec<u8> {
        let mut w = BufWriter::with_capacity(Endian::Big, 6);
        w.u32(0x0000_5000);
        w.u16(self.glyphs.len() as u16);
        w.finish()
    }

    fn cmap(&self) -> Vec<u8> {
        let default = [(3, 1, 4)];
        let subtables: &[(u16, u16, u16)] = if self.cmap_subtables.is_empty() {
            &default
        } else {
            &self.cmap_subtables
        };

        let mut mapping = self.mapping.clone();
        mapping.sort_unstable();
        mapping.dedup_by_key(|m| m.0);

        let bodies: Vec<Vec<u8>> = subtables
            .iter()
            .map(|&(_, _, format)| match format {
                0 => cmap_format0(&mapping),
                12 => cmap_format12(&mapping),
                _ => cmap_format4(&mapping),
            })
            .collect();

        let mut w = BufWriter::new(Endian::Big);
        w.u16(0);
        w.u16(subtables.len() as u16);
        let mut offset = 4 + 8 * subtables.len();
        for (&(platform, encoding, _), body) in subtables.iter().zip(&bodies) {
            w.u16(platform);
            w.u16(encoding);
            w.u32(offset as u32);
            offset += body.len();
        }
        for body in &bodies {
            w.bytes(body);
        }
        w.finish()
    }
}

fn union_box(a: Option<[i32; 4]>, b: Option<[i32; 4]>) -> Option<[i32; 4]> {
    match (a, b) {
        (Some(a), Some(b)) => Some([a[0].min(b[0]), a[1].min(b[1]), a[2].max(b[2]), a[3].max(b[3])]),
        (a, None) => a,
        (None, b) => b,
    }
}

fn encode_simple(w: &mut BufWriter, contours: &[Vec<OutlinePoint>], bbox: [i16; 4]) {
    let points: Vec<OutlinePoint> = contours.iter().flatten().copied().collect();

    w.i16(contours.len() as i16);
    for v in bbox {
        w.i16(v);
    }
    let mut end = 0u16;
    for contour in contours {
        end += contour.len() as u16;
        w.u16(end.wrapping_sub(1));
    }
    w.u16(0); // instructionLength

    let mut flags = Vec::with_capacity(points.len());
    let mut xs = BufWriter::new(Endian::Big);
    let mut ys = BufWriter::new(Endian::Big);
    let (mut px, mut py) = (0i32, 0i32);
    for p in &points {
        let mut flag = if p.on_curve { ON_CURVE_POINT } else { 0 };
        flag |= encode_delta(&mut xs, p.x - px, X_SHORT_VECTOR, X_IS_SAME_OR_POSITIVE_SHORT);
        flag |= encode_delta(&mut ys, p.y - py, Y_SHORT_VECTOR, Y_IS_SAME_OR_POSITIVE_SHORT);
        flags.push(flag);
        (px, py) = (p.x, p.y);
    }

    let mut i = 0;
    while i < flags.len() {
        let flag = flags[i];
        let run = flags[i + 1..].iter().take(255).take_while(|&&f| f == flag).count();
        if run > 0 {
            w.u8(flag | REPEAT_FLAG);
            w.u8(run as u8);
        } else {
            w.u8(flag);
        }
        i += run + 1;
    }
    w.bytes(&xs.finish());
    w.bytes(&ys.finish());
}

fn encode_delta(w: &mut BufWriter, d: i32, short: u8, same_or_positive: u8) -> u8 {
    if d == 0 {
        same_or_positive
    } else if d.unsigned_abs() < 256 {
        w.u8(d.unsigned_abs() as u8);
        if d > 0 { short | same_or_positive } else { short }
    } else {
        w.i16(d as i16);
        0
    }
}

fn encode_composite(w: &mut BufWriter, components: &[CompositeComponent], bbox: [i16; 4]) {
    w.i16(-1);
    for v in bbox {
        w.i16(v);
    }
    for (i, comp) in components.iter().enumerate() {
        let mut flags = ARG_1_AND_2_ARE_WORDS | ARGS_ARE_XY_VALUES;
        if i + 1 < components.len() {
            flags |= MORE_COMPONENTS;
        }
        let scale = if comp.scale_01 != 0.0 || comp.scale_10 != 0.0 {
            flags |= WE_HAVE_A_TWO_BY_TWO;
            vec![comp.scale_x, comp.scale_01, comp.scale_10, comp.scale_y]
        } else if comp.scale_x != comp.scale_y {
            flags |= WE_HAVE_AN_X_AND_Y_SCALE;
            vec![comp.scale_x, comp.scale_y]
        } else if comp.scale_x != 1.0 {
            flags |= WE_HAVE_A_SCALE;
            vec![comp.scale_x]
        } else {
            Vec::new()
        };

        w.u16(flags);
        w.u16(comp.glyph_id);
        w.i16(comp.dx);
        w.i16(comp.dy);
        for s in scale {
            w.i16((s * 16384.0).round() as i16);
        }
    }
}

fn cmap_format0(mapping: &[(u32, u16)]) -> Vec<u8> {
    let mut ids = [0u8; 256];
    for &(cp, gid) in mapping {
        if let (Ok(cp), Ok(gid)) = (u8::try_from(cp), u8::try_from(gid)) {
            ids[cp as usize] = gid;
        }
    }
    let mut w = BufWriter::new(Endian::Big);
    w.u16(0);
    w.u16(262);
    w.u16(0);
    w.bytes(&ids);
    w.finish()
}

/// Runs of consecutive codepoints mapped to consecutive glyphs.
fn sequential_runs(mapping: &[(u32, u16)]) -> Vec<(u32, u32, u16)> {
    let mut runs: Vec<(u32, u32, u16)> = Vec::new();
    for &(cp, gid) in mapping {
        match runs.last_mut() {
            Some((start, end, first))
                if cp == *end + 1 && gid as u32 == *first as u32 + (cp - *start) =>
            {
                *end = cp;
            }
            _ => runs.push((cp, cp, gid)),
        }
    }
    runs
}

fn cmap_format4(mapping: &[(u32, u16)]) -> Vec<u8> {
    let bmp: Vec<(u32, u16)> = mapping.iter().copied().filter(|&(cp, _)| cp < 0xFFFF).collect();
    let mut segments: Vec<(u16, u16, i16)> = sequential_runs(&bmp)
        .into_iter()
        .map(|(start, end, gid)| (start as u16, end as u16, gid.wrapping_sub(start as u16) as i16))
        .collect();
    segments.push((0xFFFF, 0xFFFF, 1));

    let seg_count = segments.len() as u16;
    let entry_selector = 15 - seg_count.leading_zeros() as u16;
    let search_range = 2 * (1u16 << entry_selector);

    let mut w = BufWriter::new(Endian::Big);
    w.u16(4);
    w.u16(16 + 8 * seg_count);
    w.u16(0);
    w.u16(seg_count * 2);
    w.u16(search_range);
    w.u16(entry_selector);
    w.u16(seg_count * 2 - search_range);
    for &(_, end, _) in &segments {
        w.u16(end);
    }
    w.u16(0);
    for &(start, _, _) in &segments {
        w.u16(start);
    }
    for &(_, _, delta) in &segments {
        w.i16(delta);
    }
    for _ in &segments {
        w.u16(0);
    }
    w.finish()
}

fn cmap_format12(mapping: &[(u32, u16)]) -> Vec<u8> {
    let runs = sequential_runs(mapping);
    let mut w = BufWriter::new(Endian::Big);
    w.u16(12);
    w.u16(0);
    w.u32(16 + 12 * runs.len() as u32);
    w.u32(0);
    w.u32(runs.len() as u32);
    for (start, end, gid) in runs {
        w.u32(start);
        w.u32(end);
        w.u32(gid as u32);
    }
    w.finish()
}

fn checksum(data: &[u8]) -> u32 {
    data.chunks(4).fold(0u32, |sum, chunk| {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        sum.wrapping_add(u32::from_be_bytes(word))
    })
}
