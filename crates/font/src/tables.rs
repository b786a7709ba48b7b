//! TrueType table parsing.
//!
//! Parses the sfnt table directory and the tables the glyph pipeline needs:
//! `head`, `hhea`, `maxp`, `cmap` (formats 0, 4 and 12), `loca` and `hmtx`.

use std::ops::Range;

use common::{Cursor, Endian, ParseError};

use crate::error::FontFormatError;

// ─────────────────────────────────────────────────────────────────────────────
// TableTag
// ─────────────────────────────────────────────────────────────────────────────

/// A 4-byte table tag identifying a TrueType table.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableTag(pub [u8; 4]);

impl TableTag {
    pub const HEAD: Self = Self(*b"head");
    pub const CMAP: Self = Self(*b"cmap");
    pub const GLYF: Self = Self(*b"glyf");
    pub const LOCA: Self = Self(*b"loca");
    pub const HHEA: Self = Self(*b"hhea");
    pub const HMTX: Self = Self(*b"hmtx");
    pub const MAXP: Self = Self(*b"maxp");

    /// Tables a font must carry to be usable by the glyph pipeline.
    pub const REQUIRED: [Self; 7] = [
        Self::CMAP,
        Self::GLYF,
        Self::HEAD,
        Self::HHEA,
        Self::HMTX,
        Self::LOCA,
        Self::MAXP,
    ];
}

impl core::fmt::Debug for TableTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = core::str::from_utf8(&self.0).unwrap_or("????");
        write!(f, "TableTag('{s}')")
    }
}

impl core::fmt::Display for TableTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = core::str::from_utf8(&self.0).unwrap_or("????");
        write!(f, "{s}")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TableDirectory
// ─────────────────────────────────────────────────────────────────────────────

/// sfnt version for TrueType outlines.
pub const SFNT_VERSION_TRUETYPE: u32 = 0x0001_0000;
/// Apple's `'true'` sfnt version.
pub const SFNT_VERSION_APPLE: u32 = 0x7472_7565;
/// `'OTTO'`, CFF-flavoured OpenType.
pub const SFNT_VERSION_OTTO: u32 = 0x4F54_544F;

/// A single entry in the sfnt table directory.
#[derive(Clone, Copy, Debug)]
pub struct TableRecord {
    pub tag: TableTag,
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

impl TableRecord {
    /// The byte range this table occupies in the font file.
    pub fn range(&self) -> Range<usize> {
        let start = self.offset as usize;
        start..start + self.length as usize
    }
}

/// The parsed sfnt table directory.
#[derive(Clone, Debug)]
pub struct TableDirectory {
    pub sfnt_version: u32,
    pub tables: Vec<TableRecord>,
}

impl TableDirectory {
    /// Parse the sfnt header and table directory.
    ///
    /// Every record must describe a range inside `data`.
    pub fn parse(data: &[u8]) -> Result<Self, FontFormatError> {
        let mut c = Cursor::new(data, Endian::Big);

        let sfnt_version = c.u32()?;
        if !matches!(
            sfnt_version,
            SFNT_VERSION_TRUETYPE | SFNT_VERSION_APPLE | SFNT_VERSION_OTTO
        ) {
            return Err(FontFormatError::UnknownVersion(sfnt_version));
        }

        let num_tables = c.u16()?;
        let _search_range = c.u16()?;
        let _entry_selector = c.u16()?;
        let _range_shift = c.u16()?;

        let mut tables = Vec::with_capacity(num_tables as usize);
        for _ in 0..num_tables {
            let tag = TableTag(c.tag()?);
            let checksum = c.u32()?;
            let offset = c.u32()?;
            let length = c.u32()?;
            let end = (offset as u64) + (length as u64);
            if end > data.len() as u64 {
                return Err(ParseError::LengthOutOfRange("table record outside font data").into());
            }
            tables.push(TableRecord { tag, checksum, offset, length });
        }

        Ok(TableDirectory { sfnt_version, tables })
    }

    /// Find a table record by tag.
    pub fn find(&self, tag: TableTag) -> Option<&TableRecord> {
        self.tables.iter().find(|t| t.tag == tag)
    }

    /// Byte range of a required table.
    pub fn require(&self, tag: TableTag) -> Result<Range<usize>, FontFormatError> {
        self.find(tag)
            .map(TableRecord::range)
            .ok_or(FontFormatError::MissingTable(tag))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HeadTable
// ─────────────────────────────────────────────────────────────────────────────

/// Parsed `head` table.
#[derive(Clone, Debug)]
pub struct HeadTable {
    pub units_per_em: u16,
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
    pub index_to_loc_format: i16, // 0 = short (u16), 1 = long (u32)
}

impl HeadTable {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut c = Cursor::new(data, Endian::Big);
        let _major_version = c.u16()?;
        let _minor_version = c.u16()?;
        let _font_revision = c.u32()?; // Fixed
        let _checksum_adjust = c.u32()?;
        let _magic = c.u32()?;
        let _flags = c.u16()?;
        let units_per_em = c.u16()?;
        c.skip(16)?; // created + modified (LONGDATETIME × 2)
        let x_min = c.i16()?;
        let y_min = c.i16()?;
        let x_max = c.i16()?;
        let y_max = c.i16()?;
        let _mac_style = c.u16()?;
        let _lowest_rec_ppem = c.u16()?;
        let _font_direction_hint = c.i16()?;
        let index_to_loc_format = c.i16()?;

        if units_per_em == 0 {
            return Err(ParseError::InvalidValue("head.unitsPerEm is zero"));
        }

        Ok(HeadTable {
            units_per_em,
            x_min, y_min, x_max, y_max,
            index_to_loc_format,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HheaTable
// ─────────────────────────────────────────────────────────────────────────────

/// Parsed `hhea` (horizontal header) table.
#[derive(Clone, Debug)]
pub struct HheaTable {
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    pub num_h_metrics: u16,
}

impl HheaTable {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut c = Cursor::new(data, Endian::Big);
        let _major = c.u16()?;
        let _minor = c.u16()?;
        let ascender = c.i16()?;
        let descender = c.i16()?;
        let line_gap = c.i16()?;
        let _advance_width_max = c.u16()?;
        c.skip(22)?; // min/max extents, caret fields, reserved
        let num_h_metrics = c.u16()?;

        if num_h_metrics == 0 {
            return Err(ParseError::InvalidValue("hhea.numberOfHMetrics is zero"));
        }

        Ok(HheaTable { ascender, descender, line_gap, num_h_metrics })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MaxpTable
// ─────────────────────────────────────────────────────────────────────────────

/// Parsed `maxp` table.
#[derive(Clone, Debug)]
pub struct MaxpTable {
    pub num_glyphs: u16,
}

impl MaxpTable {
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut c = Cursor::new(data, Endian::Big);
        let _version = c.u32()?;
        let num_glyphs = c.u16()?;
        Ok(MaxpTable { num_glyphs })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// cmap
// ─────────────────────────────────────────────────────────────────────────────

/// Format 4 segment mapping (BMP).
#[derive(Clone, Debug)]
pub struct CmapFormat4 {
    pub seg_count: u16,
    pub end_code: Vec<u16>,
    pub start_code: Vec<u16>,
    pub id_delta: Vec<i16>,
    pub id_range_offset: Vec<u16>,
    pub glyph_id_array: Vec<u16>,
}

impl CmapFormat4 {
    /// Parse a format 4 subtable; `data` starts at the format field and runs
    /// to the end of the `cmap` table.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut c = Cursor::new(data, Endian::Big);
        let _format = c.u16()?;
        let length = c.u16()? as usize;
        let _language = c.u16()?;
        let seg_count_x2 = c.u16()?;
        if seg_count_x2 % 2 != 0 {
            return Err(ParseError::InvalidValue("cmap format 4 segCountX2 is odd"));
        }
        let seg_count = seg_count_x2 / 2;
        let _search_range = c.u16()?;
        let _entry_selector = c.u16()?;
        let _range_shift = c.u16()?;

        let end_code = read_u16s(&mut c, seg_count)?;
        let _reserved_pad = c.u16()?;
        let start_code = read_u16s(&mut c, seg_count)?;
        let id_delta = read_u16s(&mut c, seg_count)?
            .into_iter()
            .map(|v| v as i16)
            .collect();
        let id_range_offset = read_u16s(&mut c, seg_count)?;

        // The declared length wraps for large subtables; fall back to the
        // end of the cmap table when it is not usable.
        let end = if length > c.position() && length <= data.len() {
            length
        } else {
            data.len()
        };
        // Glyph indices into the array are 16-bit, so entries past
        // u16::MAX are unreachable.
        let glyph_count = ((end - c.position()) / 2).min(u16::MAX as usize) as u16;
        let glyph_id_array = read_u16s(&mut c, glyph_count)?;

        Ok(CmapFormat4 {
            seg_count,
            end_code,
            start_code,
            id_delta,
            id_range_offset,
            glyph_id_array,
        })
    }

    /// Look up a glyph ID for a BMP codepoint.
    pub fn lookup(&self, codepoint: u16) -> u16 {
        // Segments are sorted by end code; the first one ending at or after
        // the codepoint is the only candidate.
        let Some(i) = self.end_code.iter().position(|&end| end >= codepoint) else {
            return 0;
        };
        if self.start_code[i] > codepoint {
            return 0;
        }

        let delta = self.id_delta[i];
        let range_offset = self.id_range_offset[i];
        if range_offset == 0 {
            return codepoint.wrapping_add(delta as u16);
        }

        // idRangeOffset is relative to its own slot in the idRangeOffset
        // array, which sits right before glyphIdArray.
        let idx = (range_offset / 2) as usize + (codepoint - self.start_code[i]) as usize;
        let Some(array_idx) = idx.checked_sub(self.seg_count as usize - i) else {
            return 0;
        };
        match self.glyph_id_array.get(array_idx) {
            Some(&gid) if gid != 0 => gid.wrapping_add(delta as u16),
            _ => 0,
        }
    }
}

/// One `(start, end, start_glyph)` group of a format 12 subtable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SequentialMapGroup {
    pub start_char: u32,
    pub end_char: u32,
    pub start_glyph: u32,
}

/// A parsed cmap subtable.
#[derive(Clone, Debug)]
pub enum CmapSubtable {
    /// Byte encoding table: codepoints 0–255 only.
    Format0(Vec<u8>),
    /// Segment mapping to delta values.
    Format4(CmapFormat4),
    /// Segmented coverage over the full Unicode range.
    Format12(Vec<SequentialMapGroup>),
}

impl CmapSubtable {
    /// Parse the subtable at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self, ParseError> {
        let mut c = Cursor::new(data, Endian::Big);
        match c.u16()? {
            0 => {
                let _length = c.u16()?;
                let _language = c.u16()?;
                Ok(Self::Format0(c.bytes(256)?.to_vec()))
            }
            4 => Ok(Self::Format4(CmapFormat4::parse(data)?)),
            12 => {
                let _reserved = c.u16()?;
                let _length = c.u32()?;
                let _language = c.u32()?;
                let num_groups = c.u32()? as usize;
                if num_groups.saturating_mul(12) > c.remaining() {
                    return Err(ParseError::LengthOutOfRange("cmap format 12 groups"));
                }
                let mut groups = Vec::with_capacity(num_groups);
                for _ in 0..num_groups {
                    let start_char = c.u32()?;
                    let end_char = c.u32()?;
                    let start_glyph = c.u32()?;
                    if end_char < start_char {
                        return Err(ParseError::InvalidValue("cmap format 12 group end < start"));
                    }
                    groups.push(SequentialMapGroup { start_char, end_char, start_glyph });
                }
                Ok(Self::Format12(groups))
            }
            _ => Err(ParseError::InvalidValue("unsupported cmap subtable format")),
        }
    }

    /// Subtable format number.
    pub fn format(&self) -> u16 {
        match self {
            Self::Format0(_) => 0,
            Self::Format4(_) => 4,
            Self::Format12(_) => 12,
        }
    }

    /// Map a codepoint to a glyph index; unmapped codepoints give 0.
    pub fn lookup(&self, codepoint: u32) -> u16 {
        match self {
            Self::Format0(ids) => ids.get(codepoint as usize).copied().unwrap_or(0) as u16,
            Self::Format4(table) => match u16::try_from(codepoint) {
                Ok(cp) => table.lookup(cp),
                Err(_) => 0,
            },
            Self::Format12(groups) => {
                let found = groups.binary_search_by(|g| {
                    if g.end_char < codepoint {
                        core::cmp::Ordering::Less
                    } else if g.start_char > codepoint {
                        core::cmp::Ordering::Greater
                    } else {
                        core::cmp::Ordering::Equal
                    }
                });
                match found {
                    Ok(i) => {
                        let g = groups[i];
                        let gid = g.start_glyph as u64 + (codepoint - g.start_char) as u64;
                        u16::try_from(gid).unwrap_or(0)
                    }
                    Err(_) => 0,
                }
            }
        }
    }
}

/// Preference rank of a `(platform, encoding)` pair; lower is better.
fn encoding_rank(platform_id: u16, encoding_id: u16) -> Option<u8> {
    match (platform_id, encoding_id) {
        // Full-repertoire Unicode.
        (3, 10) | (0, 4) | (0, 6) => Some(0),
        // Windows BMP.
        (3, 1) => Some(1),
        (0, _) => Some(2),
        _ => None,
    }
}

/// Select and parse the best usable subtable of a `cmap` table. Candidates
/// are tried by rank, then directory order; one that fails to parse is
/// skipped in favor of the next.
pub fn parse_cmap(data: &[u8]) -> Result<CmapSubtable, FontFormatError> {
    let mut c = Cursor::new(data, Endian::Big);
    let _version = c.u16()?;
    let num_tables = c.u16()?;

    let mut candidates: Vec<(u8, u16, u16, usize)> = Vec::new();
    for _ in 0..num_tables {
        let platform_id = c.u16()?;
        let encoding_id = c.u16()?;
        let offset = c.u32()? as usize;

        let Some(rank) = encoding_rank(platform_id, encoding_id) else {
            continue;
        };
        let Ok(format) = common::read_u16_be(data, offset) else {
            log::warn!("cmap subtable ({platform_id}, {encoding_id}) points outside the table");
            continue;
        };
        if !matches!(format, 0 | 4 | 12) {
            log::debug!("skipping cmap subtable ({platform_id}, {encoding_id}) with format {format}");
            continue;
        }
        candidates.push((rank, platform_id, encoding_id, offset));
    }
    candidates.sort_by_key(|&(rank, ..)| rank);

    for (_, platform_id, encoding_id, offset) in candidates {
        let Some(subtable) = data.get(offset..) else {
            continue;
        };
        match CmapSubtable::parse(subtable) {
            Ok(cmap) => return Ok(cmap),
            Err(e) => log::warn!("skipping cmap subtable ({platform_id}, {encoding_id}): {e}"),
        }
    }
    Err(FontFormatError::NoUsableCmap)
}

fn read_u16s(c: &mut Cursor<'_>, count: u16) -> Result<Vec<u16>, ParseError> {
    (0..count).map(|_| c.u16()).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Loca table
// ─────────────────────────────────────────────────────────────────────────────

/// Width of the offsets stored in `loca`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocaFormat {
    /// u16 offsets divided by two.
    Short,
    /// u32 offsets.
    Long,
}

impl LocaFormat {
    pub fn from_head(value: i16) -> Result<Self, FontFormatError> {
        match value {
            0 => Ok(Self::Short),
            1 => Ok(Self::Long),
            other => Err(FontFormatError::UnsupportedLocaFormat(other)),
        }
    }
}

/// Get the `[start, end)` byte range of a glyph within the `glyf` table.
pub fn get_glyph_offset(
    loca_data: &[u8],
    glyph_id: u16,
    format: LocaFormat,
) -> Result<(u32, u32), ParseError> {
    let (offset, next_offset) = match format {
        LocaFormat::Short => {
            let mut c = Cursor::at(loca_data, glyph_id as usize * 2, Endian::Big)?;
            (c.u16()? as u32 * 2, c.u16()? as u32 * 2)
        }
        LocaFormat::Long => {
            let mut c = Cursor::at(loca_data, glyph_id as usize * 4, Endian::Big)?;
            (c.u32()?, c.u32()?)
        }
    };

    if next_offset < offset {
        return Err(ParseError::InvalidValue("loca offsets are not ascending"));
    }
    Ok((offset, next_offset))
}

// ─────────────────────────────────────────────────────────────────────────────
// Hmtx table
// ─────────────────────────────────────────────────────────────────────────────

/// Horizontal metrics for a glyph.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HMetric {
    pub advance_width: u16,
    pub left_side_bearing: i16,
}

/// Get horizontal metrics for a glyph.
///
/// Glyphs past `num_h_metrics` share the last advance width and read their
/// bearing from the trailing `leftSideBearing` array.
pub fn get_hmetric(hmtx_data: &[u8], glyph_id: u16, num_h_metrics: u16) -> Result<HMetric, ParseError> {
    if num_h_metrics == 0 {
        return Err(ParseError::InvalidValue("hhea.numberOfHMetrics is zero"));
    }

    if glyph_id < num_h_metrics {
        let mut c = Cursor::at(hmtx_data, glyph_id as usize * 4, Endian::Big)?;
        let advance_width = c.u16()?;
        let left_side_bearing = c.i16()?;
        return Ok(HMetric { advance_width, left_side_bearing });
    }

    let last = num_h_metrics as usize - 1;
    let advance_width = common::read_u16_be(hmtx_data, last * 4)?;
    let lsb_offset = num_h_metrics as usize * 4 + (glyph_id - num_h_metrics) as usize * 2;
    // Fonts may omit the trailing bearings; the advance alone is still useful.
    let left_side_bearing = common::read_u16_be(hmtx_data, lsb_offset).map_or(0, |v| v as i16);
    Ok(HMetric { advance_width, left_side_bearing })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
