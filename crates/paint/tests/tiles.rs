//! Tiled rendering against the single-pass reference.

use std::sync::Arc;

use common::{Color, IRect, PathCommand, Vec2};
use paint::{Bitmap, Command, CommandBuffer, TileCompositor, fill_clipped, flatten, render_untiled};
use test_log::test;

/// Atlas with a soft-edged triangle at (0, 0) and a solid block at (32, 0).
fn atlas() -> Arc<Bitmap> {
    let mut texture = Bitmap::new(64, 32);
    let triangle = flatten(&[
        PathCommand::MoveTo(Vec2::new(0.5, 0.25)),
        PathCommand::LineTo(Vec2::new(29.75, 15.5)),
        PathCommand::LineTo(Vec2::new(3.25, 30.0)),
        PathCommand::ClosePath,
    ]);
    fill_clipped(&mut texture, IRect::new(0, 0, 32, 32), &triangle, Color::WHITE);
    texture.fill_rect(IRect::new(32, 0, 48, 16), Color::WHITE);
    Arc::new(texture)
}

fn scene() -> CommandBuffer {
    let mut cb = CommandBuffer::new();
    cb.push(Command::SolidRect { rect: IRect::new(0, 0, 200, 120), color: Color::from_straight(40, 60, 200, 90) });
    cb.push(Command::TexturedRect { dst: IRect::from_xywh(13, 9, 32, 32), src_x: 0, src_y: 0, color: Color::BLACK });
    cb.push(Command::TexturedRect {
        dst: IRect::from_xywh(70, 40, 32, 32),
        src_x: 0,
        src_y: 0,
        color: Color::from_straight(255, 0, 0, 160),
    });
    cb.push(Command::Clip(IRect::new(50, 30, 150, 100)));
    cb.push(Command::SolidRect { rect: IRect::new(40, 20, 160, 60), color: Color::from_straight(0, 255, 0, 100) });
    cb.push(Command::TexturedRect { dst: IRect::from_xywh(140, 85, 16, 16), src_x: 32, src_y: 0, color: Color::BLUE });
    cb.push(Command::Clip(IRect::new(0, 0, 1000, 1000)));
    for i in 0..12 {
        cb.push(Command::TexturedRect {
            dst: IRect::from_xywh(i * 17 - 5, 80 + (i % 3) * 7, 32, 32),
            src_x: 0,
            src_y: 0,
            color: Color::from_straight(20 * i as u8, 255 - 20 * i as u8, 128, 200),
        });
    }
    cb.push(Command::SolidRect { rect: IRect::new(97, 0, 99, 120), color: Color::WHITE });
    cb
}

fn background() -> Bitmap {
    let mut bm = Bitmap::new(200, 120);
    for y in 0..120 {
        for x in 0..200 {
            bm.set_pixel(x, y, Color::from_straight((x * 5 % 256) as u8, (y * 3 % 256) as u8, 90, 255));
        }
    }
    bm
}

#[test]
fn tiled_matches_untiled() {
    let texture = atlas();
    let commands = Arc::new(scene());
    let redraws = [
        IRect::new(0, 0, 200, 120),
        IRect::new(37, 5, 190, 101),
        IRect::new(3, 3, 5, 4),
        IRect::new(-50, 60, 500, 500),
        IRect::new(150, 0, 151, 120),
    ];

    for workers in [0, 1, 4, 16] {
        let compositor = TileCompositor::new(64, workers).unwrap();
        for redraw in redraws {
            let mut tiled = background();
            let tiles = compositor.render(&mut tiled, &commands, redraw, &texture);
            assert!(tiles >= 1 && tiles <= 16);

            let mut reference = background();
            render_untiled(&mut reference, &commands, redraw, &texture);

            assert!(
                tiled == reference,
                "tiled and untiled renders differ for {redraw:?} with {workers} workers"
            );
        }
    }
}

#[test]
fn each_tile_renders_exactly_once() {
    // A translucent fill shows whether a pixel was blended zero, one, or two
    // times.
    let mut cb = CommandBuffer::new();
    let veil = Color::from_straight(255, 255, 255, 100);
    cb.push(Command::SolidRect { rect: IRect::new(0, 0, 256, 128), color: veil });
    let commands = Arc::new(cb);
    let texture = Arc::new(Bitmap::new(1, 1));

    for workers in [1, 4, 16] {
        let compositor = TileCompositor::new(16, workers).unwrap();
        assert_eq!(compositor.workers(), workers);

        let mut bm = Bitmap::filled(256, 128, Color::BLACK);
        let expected = {
            let mut one = Bitmap::filled(1, 1, Color::BLACK);
            one.blend_pixel(0, 0, veil);
            one.pixels[0]
        };
        for _ in 0..3 {
            bm.clear(Color::BLACK);
            let tiles = compositor.render(&mut bm, &commands, IRect::new(0, 0, 256, 128), &texture);
            assert_eq!(tiles, 16);
            assert!(bm.pixels.iter().all(|&p| p == expected), "{workers} workers");
        }
        assert!(compositor.queue().is_empty());
    }
}

#[test]
fn render_outside_bitmap_is_a_no_op() {
    let compositor = TileCompositor::new(16, 2).unwrap();
    let mut cb = CommandBuffer::new();
    cb.push(Command::SolidRect { rect: IRect::new(0, 0, 64, 64), color: Color::RED });
    let mut bm = Bitmap::new(32, 32);
    let tiles = compositor.render(&mut bm, &Arc::new(cb), IRect::new(40, 40, 80, 80), &Arc::new(Bitmap::new(1, 1)));
    assert_eq!(tiles, 0);
    assert!(bm.pixels.iter().all(|&p| p == 0));
}
