//! Command buffer: the draw layer's output, replayed by the compositor.
//!
//! Primitives are encoded back to back into a little-endian byte arena; a
//! flat list of offsets indexes them. The buffer is append-only until
//! [`CommandBuffer::clear`].

use common::{BufWriter, Color, Cursor, Endian, IRect, ParseError};

const TAG_CLIP: u8 = 1;
const TAG_SOLID_RECT: u8 = 2;
const TAG_TEXTURED_RECT: u8 = 3;

/// A decoded primitive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Clip every following primitive to `rect`.
    Clip(IRect),
    /// Source-over a solid color.
    SolidRect { rect: IRect, color: Color },
    /// Draw the atlas texels starting at `(src_x, src_y)` into `dst`, using
    /// texel alpha as coverage for `color`.
    TexturedRect { dst: IRect, src_x: i32, src_y: i32, color: Color },
}

pub struct CommandBuffer {
    arena: BufWriter,
    offsets: Vec<u32>,
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self {
            arena: BufWriter::new(Endian::Little),
            offsets: Vec::new(),
        }
    }

    /// Number of primitives.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn clear(&mut self) {
        self.arena.clear();
        self.offsets.clear();
    }

    /// Encoded primitives.
    pub fn as_bytes(&self) -> &[u8] {
        &self.arena.out
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    fn rect(&mut self, r: IRect) {
        self.arena.i32(r.min_x);
        self.arena.i32(r.min_y);
        self.arena.i32(r.max_x);
        self.arena.i32(r.max_y);
    }

    pub fn push(&mut self, cmd: Command) {
        self.offsets.push(self.arena.len() as u32);
        match cmd {
            Command::Clip(rect) => {
                self.arena.u8(TAG_CLIP);
                self.rect(rect);
            }
            Command::SolidRect { rect, color } => {
                self.arena.u8(TAG_SOLID_RECT);
                self.rect(rect);
                self.arena.u32(color.to_argb());
            }
            Command::TexturedRect { dst, src_x, src_y, color } => {
                self.arena.u8(TAG_TEXTURED_RECT);
                self.rect(dst);
                self.arena.i32(src_x);
                self.arena.i32(src_y);
                self.arena.u32(color.to_argb());
            }
        }
    }

    /// Decode the primitive at `index`.
    pub fn get(&self, index: usize) -> Result<Command, ParseError> {
        let offset = *self
            .offsets
            .get(index)
            .ok_or(ParseError::InvalidValue("command index out of range"))?;
        let mut c = Cursor::at(&self.arena.out, offset as usize, Endian::Little)?;
        let tag = c.u8()?;
        let cmd = match tag {
            TAG_CLIP => Command::Clip(read_rect(&mut c)?),
            TAG_SOLID_RECT => Command::SolidRect {
                rect: read_rect(&mut c)?,
                color: Color::from_argb(c.u32()?),
            },
            TAG_TEXTURED_RECT => Command::TexturedRect {
                dst: read_rect(&mut c)?,
                src_x: c.i32()?,
                src_y: c.i32()?,
                color: Color::from_argb(c.u32()?),
            },
            _ => return Err(ParseError::InvalidValue("unknown command tag")),
        };
        Ok(cmd)
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<Command, ParseError>> + '_ {
        (0..self.len()).map(|i| self.get(i))
    }
}

fn read_rect(c: &mut Cursor<'_>) -> Result<IRect, ParseError> {
    Ok(IRect::new(c.i32()?, c.i32()?, c.i32()?, c.i32()?))
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CommandBuffer({} commands, {} bytes)", self.len(), self.arena.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_decode_in_order() {
        let mut cb = CommandBuffer::new();
        let cmds = [
            Command::Clip(IRect::new(0, 0, 100, 50)),
            Command::SolidRect { rect: IRect::new(-5, 2, 7, 9), color: Color::RED },
            Command::TexturedRect {
                dst: IRect::from_xywh(10, 12, 8, 9),
                src_x: 30,
                src_y: 40,
                color: Color::from_straight(10, 20, 30, 128),
            },
        ];
        for c in cmds {
            cb.push(c);
        }
        assert_eq!(cb.len(), 3);
        assert_eq!(cb.offsets(), &[0, 17, 38]);
        let decoded: Vec<Command> = cb.iter().collect::<Result<_, _>>().unwrap();
        assert_eq!(decoded, cmds);
    }

    #[test]
    fn clear_empties_buffer() {
        let mut cb = CommandBuffer::new();
        cb.push(Command::Clip(IRect::EMPTY));
        cb.clear();
        assert!(cb.is_empty());
        assert!(cb.as_bytes().is_empty());
        assert!(cb.get(0).is_err());
    }
}
