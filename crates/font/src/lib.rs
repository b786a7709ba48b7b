//! # Font
//!
//! TrueType font file parsing for the glyph pipeline.
//!
//! - `tables`: sfnt table directory, head, hhea, maxp, cmap, loca, hmtx
//! - `glyph`: simple and composite glyph outlines from the `glyf` table
//! - `builder`: in-memory sfnt writer for synthetic fonts
//!
//! [`FontFile`] ties them together: it is parsed once, owns the font bytes,
//! and answers per-glyph queries without failing on bad glyph data.

use std::ops::Range;

use common::{Mat3x2, ParseError, PathCommand};

pub mod builder;
pub mod error;
pub mod glyph;
pub mod tables;

pub use builder::FontBuilder;
pub use error::FontFormatError;
pub use glyph::{CompositeComponent, OutlinePoint};
pub use tables::{HMetric, LocaFormat, TableTag};

use glyph::GlyphDesc;
use tables::{CmapSubtable, HeadTable, HheaTable, MaxpTable, TableDirectory};

/// Maximum nesting of composite glyphs before outline extraction gives up.
pub const MAX_COMPOSITE_DEPTH: u32 = 8;

// ─────────────────────────────────────────────────────────────────────────────
// BoundingBox
// ─────────────────────────────────────────────────────────────────────────────

/// A glyph or font bounding box in font units (y up).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoundingBox {
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
}

impl BoundingBox {
    pub const EMPTY: Self = Self { x_min: 0, y_min: 0, x_max: 0, y_max: 0 };

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x_max <= self.x_min || self.y_max <= self.y_min
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.x_max as i32 - self.x_min as i32
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.y_max as i32 - self.y_min as i32
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// FontFile
// ─────────────────────────────────────────────────────────────────────────────

/// A parsed TrueType font.
///
/// Table ranges are resolved and validated at parse time; the file is never
/// mutated afterwards.
#[derive(Clone)]
pub struct FontFile {
    data: Vec<u8>,
    glyf: Range<usize>,
    loca: Range<usize>,
    hmtx: Range<usize>,
    cmap: CmapSubtable,
    units_per_em: u16,
    bounding_box: BoundingBox,
    ascent: i16,
    descent: i16,
    line_gap: i16,
    glyph_count: u16,
    hmetrics_count: u16,
    loca_format: LocaFormat,
}

impl FontFile {
    /// Parse a font file, taking ownership of its bytes.
    pub fn parse(data: Vec<u8>) -> Result<Self, FontFormatError> {
        let directory = TableDirectory::parse(&data)?;

        for tag in TableTag::REQUIRED {
            directory.require(tag)?;
        }
        let cmap = directory.require(TableTag::CMAP)?;
        let glyf = directory.require(TableTag::GLYF)?;
        let head = directory.require(TableTag::HEAD)?;
        let hhea = directory.require(TableTag::HHEA)?;
        let hmtx = directory.require(TableTag::HMTX)?;
        let loca = directory.require(TableTag::LOCA)?;
        let maxp = directory.require(TableTag::MAXP)?;

        let head = HeadTable::parse(&data[head])?;
        let loca_format = LocaFormat::from_head(head.index_to_loc_format)?;
        let hhea = HheaTable::parse(&data[hhea])?;
        let maxp = MaxpTable::parse(&data[maxp])?;
        let cmap = tables::parse_cmap(&data[cmap])?;

        let loca_entry = match loca_format {
            LocaFormat::Short => 2,
            LocaFormat::Long => 4,
        };
        if loca.len() < (maxp.num_glyphs as usize + 1) * loca_entry {
            return Err(ParseError::LengthOutOfRange("loca is shorter than maxp.numGlyphs").into());
        }
        if hmtx.len() < hhea.num_h_metrics as usize * 4 {
            return Err(ParseError::LengthOutOfRange("hmtx is shorter than hhea.numberOfHMetrics").into());
        }

        log::debug!(
            "parsed font: {} glyphs, {} units/em, cmap format {}, {:?} loca",
            maxp.num_glyphs,
            head.units_per_em,
            cmap.format(),
            loca_format
        );

        Ok(FontFile {
            glyf,
            loca,
            hmtx,
            cmap,
            units_per_em: head.units_per_em,
            bounding_box: BoundingBox {
                x_min: head.x_min,
                y_min: head.y_min,
                x_max: head.x_max,
                y_max: head.y_max,
            },
            ascent: hhea.ascender,
            descent: hhea.descender,
            line_gap: hhea.line_gap,
            glyph_count: maxp.num_glyphs,
            hmetrics_count: hhea.num_h_metrics,
            loca_format,
            data,
        })
    }

    // ── metrics ──

    pub fn ascent(&self) -> i16 {
        self.ascent
    }

    pub fn descent(&self) -> i16 {
        self.descent
    }

    pub fn line_gap(&self) -> i16 {
        self.line_gap
    }

    pub fn glyph_count(&self) -> u16 {
        self.glyph_count
    }

    pub fn hmetrics_count(&self) -> u16 {
        self.hmetrics_count
    }

    pub fn loca_format(&self) -> LocaFormat {
        self.loca_format
    }

    pub fn units_per_em(&self) -> u16 {
        self.units_per_em
    }

    /// Font-wide bounding box from `head`.
    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    /// Format of the cmap subtable chosen at parse time.
    pub fn cmap_format(&self) -> u16 {
        self.cmap.format()
    }

    /// Scale factor mapping font units to pixels for a given em size.
    pub fn scale_for_pixel_height(&self, pixels: f32) -> f32 {
        pixels / self.units_per_em as f32
    }

    /// Baseline-to-baseline distance in pixels at `scale`.
    pub fn line_height(&self, scale: f32) -> f32 {
        (self.ascent as f32 - self.descent as f32 + self.line_gap as f32) * scale
    }

    // ── per-glyph queries ──

    /// Map a Unicode codepoint to a glyph index; unmapped codepoints give 0.
    pub fn get_glyph_index(&self, codepoint: u32) -> u16 {
        self.cmap.lookup(codepoint)
    }

    /// Horizontal advance of a glyph in font units.
    pub fn get_glyph_advance(&self, glyph: u16) -> u16 {
        self.get_glyph_hmetric(glyph).advance_width
    }

    /// Advance width and left side bearing of a glyph in font units.
    pub fn get_glyph_hmetric(&self, glyph: u16) -> HMetric {
        tables::get_hmetric(&self.data[self.hmtx.clone()], glyph, self.hmetrics_count)
            .unwrap_or_else(|e| {
                log::warn!("hmtx lookup for glyph {glyph} failed: {e}");
                HMetric::default()
            })
    }

    /// Bounding box of a glyph in font units. Empty glyphs, out-of-range
    /// indices and malformed entries all give [`BoundingBox::EMPTY`].
    pub fn get_glyph_bounding_box(&self, glyph: u16) -> BoundingBox {
        let bbox = self.glyph_data(glyph).and_then(|data| {
            if data.is_empty() {
                return Ok(BoundingBox::EMPTY);
            }
            let mut c = common::Cursor::at(data, 2, common::Endian::Big)?;
            Ok(BoundingBox {
                x_min: c.i16()?,
                y_min: c.i16()?,
                x_max: c.i16()?,
                y_max: c.i16()?,
            })
        });
        bbox.unwrap_or_else(|e| {
            log::warn!("glyph {glyph} has a malformed header: {e}");
            BoundingBox::EMPTY
        })
    }

    /// Extract a glyph outline as path commands, every point mapped through
    /// `transform` (font units in, caller space out).
    ///
    /// Empty and out-of-range glyphs give an empty list. Composite glyphs
    /// nested deeper than [`MAX_COMPOSITE_DEPTH`] (including reference
    /// cycles) fail with [`FontFormatError::CompositeTooDeep`].
    pub fn get_glyph_outline(&self, glyph: u16, transform: Mat3x2) -> Result<Vec<PathCommand>, FontFormatError> {
        let mut out = Vec::new();
        self.append_outline(glyph, transform, 0, &mut out)?;
        Ok(out)
    }

    fn append_outline(
        &self,
        glyph: u16,
        transform: Mat3x2,
        depth: u32,
        out: &mut Vec<PathCommand>,
    ) -> Result<(), FontFormatError> {
        match glyph::parse_glyph(self.glyph_data(glyph)?)? {
            GlyphDesc::Empty => {}
            GlyphDesc::Simple(outline) => {
                for contour in &outline.contours {
                    glyph::push_contour(&contour.points, transform, out);
                }
            }
            GlyphDesc::Composite(components) => {
                if depth >= MAX_COMPOSITE_DEPTH {
                    return Err(FontFormatError::CompositeTooDeep(glyph));
                }
                for comp in components {
                    let combined = transform * comp.transform();
                    self.append_outline(comp.glyph_id, combined, depth + 1, out)?;
                }
            }
        }
        Ok(())
    }

    /// The `glyf` bytes of one glyph; out-of-range glyphs have none.
    fn glyph_data(&self, glyph: u16) -> Result<&[u8], ParseError> {
        if glyph >= self.glyph_count {
            log::debug!("glyph {glyph} is out of range (font has {})", self.glyph_count);
            return Ok(&[]);
        }
        let (start, end) = tables::get_glyph_offset(&self.data[self.loca.clone()], glyph, self.loca_format)?;
        let glyf = &self.data[self.glyf.clone()];
        glyf.get(start as usize..end as usize)
            .ok_or(ParseError::LengthOutOfRange("glyph data outside glyf"))
    }
}

impl core::fmt::Debug for FontFile {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FontFile")
            .field("len", &self.data.len())
            .field("glyph_count", &self.glyph_count)
            .field("units_per_em", &self.units_per_em)
            .field("cmap_format", &self.cmap.format())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
