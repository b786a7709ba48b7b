//! Renderer backends.
//!
//! The draw layer fills a [`CommandBuffer`]; a [`Renderer`] turns it into
//! pixels. Only the software backend lives here. GPU backends implement the
//! same trait elsewhere and upload the atlas through
//! [`Renderer::update_texture`].

use std::sync::Arc;

use common::{Color, IRect};

use crate::command::CommandBuffer;
use crate::compositor::{TileCompositor, redraw_region};
use crate::rasterizer::Bitmap;

pub trait Renderer {
    /// An empty command buffer for the next frame.
    fn begin_command_buffer(&mut self) -> CommandBuffer;

    /// Draw a finished command buffer over `redraw`.
    fn render(&mut self, commands: CommandBuffer, redraw: IRect, texture: &Arc<Bitmap>);

    /// Atlas pixels changed inside `dirty`.
    fn update_texture(&mut self, _texture: &Bitmap, _dirty: IRect) {}
}

/// CPU backend: tile-parallel replay into an owned [`Bitmap`].
#[derive(Debug)]
pub struct SoftwareRenderer {
    target: Bitmap,
    compositor: TileCompositor,
    clear_color: Option<Color>,
    spare: Option<CommandBuffer>,
}

impl SoftwareRenderer {
    pub fn new(width: u32, height: u32, compositor: TileCompositor) -> Self {
        Self {
            target: Bitmap::new(width, height),
            compositor,
            clear_color: None,
            spare: None,
        }
    }

    /// Fill the redraw region with `color` before each frame's commands.
    pub fn with_clear_color(mut self, color: Color) -> Self {
        self.clear_color = Some(color);
        self
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.target
    }

    pub fn into_bitmap(self) -> Bitmap {
        self.target
    }

    pub fn compositor(&self) -> &TileCompositor {
        &self.compositor
    }

    /// Replace the target with a transparent bitmap of the new size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) != (self.target.width, self.target.height) {
            self.target = Bitmap::new(width, height);
        }
    }
}

impl Renderer for SoftwareRenderer {
    fn begin_command_buffer(&mut self) -> CommandBuffer {
        let mut cb = self.spare.take().unwrap_or_default();
        cb.clear();
        cb
    }

    fn render(&mut self, commands: CommandBuffer, redraw: IRect, texture: &Arc<Bitmap>) {
        if let Some(color) = self.clear_color {
            let region = redraw_region(self.target.bounds(), redraw);
            self.target.clear_rect(region);
            self.target.fill_rect(region, color);
        }
        let commands = Arc::new(commands);
        self.compositor.render(&mut self.target, &commands, redraw, texture);
        // Every tile job has dropped its handle by now.
        self.spare = Arc::try_unwrap(commands).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;

    #[test]
    fn renders_and_recycles_buffers() {
        let mut r = SoftwareRenderer::new(32, 32, TileCompositor::new(16, 1).unwrap())
            .with_clear_color(Color::WHITE);
        let texture = Arc::new(Bitmap::new(1, 1));

        let mut cb = r.begin_command_buffer();
        cb.push(Command::SolidRect { rect: IRect::new(4, 4, 8, 8), color: Color::BLACK });
        r.render(cb, IRect::new(0, 0, 32, 32), &texture);
        assert_eq!(r.bitmap().pixel(0, 0), Some(Color::WHITE));
        assert_eq!(r.bitmap().pixel(5, 5), Some(Color::BLACK));

        let cb = r.begin_command_buffer();
        assert!(cb.is_empty());
        r.render(cb, IRect::new(0, 0, 32, 32), &texture);
        assert_eq!(r.bitmap().pixel(5, 5), Some(Color::WHITE));
    }

    #[test]
    fn resize_replaces_target() {
        let mut r = SoftwareRenderer::new(8, 8, TileCompositor::new(16, 0).unwrap());
        r.resize(20, 10);
        assert_eq!(r.bitmap().bounds(), IRect::new(0, 0, 20, 10));
        let bm = r.into_bitmap();
        assert_eq!(bm.pixels.len(), 200);
    }
}
