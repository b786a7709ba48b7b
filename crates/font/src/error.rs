use common::ParseError;

use crate::tables::TableTag;

/// Reasons a font file cannot be loaded or a glyph outline cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FontFormatError {
    #[error("unknown sfnt version 0x{0:08x}")]
    UnknownVersion(u32),
    #[error("required table '{0}' is missing")]
    MissingTable(TableTag),
    #[error("unsupported loca index format {0}")]
    UnsupportedLocaFormat(i16),
    #[error("no usable cmap subtable")]
    NoUsableCmap,
    #[error("composite glyph {0} nests deeper than the supported limit")]
    CompositeTooDeep(u16),
    #[error("malformed font data: {0}")]
    Malformed(#[from] ParseError),
}
