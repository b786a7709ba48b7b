//! Glyph engine demo: renders a line of text and a few shapes into a PNG.
//!
//! ```text
//! glyph_engine [--config render.json] [--out glyph_demo.png] [TEXT]
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use common::{Color, IRect, PathCommand, Vec2};
use font::{FontBuilder, OutlinePoint};
use log::{info, warn};
use paint::{FontId, RenderConfig, RenderContext};

const WIDTH: u32 = 640;
const HEIGHT: u32 = 200;

struct Args {
    config: Option<PathBuf>,
    out: PathBuf,
    text: String,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config: None,
        out: PathBuf::from("glyph_demo.png"),
        text: String::from("Hello, glyphs!"),
    };
    let mut words = Vec::new();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = Some(it.next().context("--config needs a path")?.into()),
            "--out" => args.out = it.next().context("--out needs a path")?.into(),
            s if s.starts_with("--") => bail!("unknown option {s}"),
            _ => words.push(arg),
        }
    }
    if !words.is_empty() {
        args.text = words.join(" ");
    }
    Ok(args)
}

/// Block-letter face used when no system font is found. Every printable
/// ASCII character gets a box with a round hole.
fn fallback_font() -> Vec<u8> {
    let mut b = FontBuilder::new(1000).metrics(800, -200, 100);
    let space = b.add_empty_glyph(300);
    b.map(' ' as u32, space);
    let block = b.add_simple_glyph(
        &[
            vec![
                OutlinePoint::on(80, 0),
                OutlinePoint::on(80, 700),
                OutlinePoint::on(520, 700),
                OutlinePoint::on(520, 0),
            ],
            vec![
                OutlinePoint::on(200, 350),
                OutlinePoint::off(300, 150),
                OutlinePoint::on(400, 350),
                OutlinePoint::off(300, 550),
            ],
        ],
        600,
    );
    for ch in '!'..='~' {
        b.map(ch as u32, block);
    }
    b.build()
}

fn circle(r: f32) -> Vec<PathCommand> {
    let radii = Vec2::new(r, r);
    vec![
        PathCommand::MoveTo(Vec2::new(0.0, r)),
        PathCommand::ArcTo { radii, x_rotation: 0.0, large_arc: false, sweep: true, to: Vec2::new(2.0 * r, r) },
        PathCommand::ArcTo { radii, x_rotation: 0.0, large_arc: false, sweep: true, to: Vec2::new(0.0, r) },
        PathCommand::ClosePath,
    ]
}

fn star(r: f32) -> Vec<PathCommand> {
    let mut path = Vec::with_capacity(6);
    for i in 0..5 {
        let a = std::f32::consts::PI * (i as f32 * 0.8 - 0.5);
        let p = Vec2::new(r + r * a.cos(), r + r * a.sin());
        path.push(if i == 0 { PathCommand::MoveTo(p) } else { PathCommand::LineTo(p) });
    }
    path.push(PathCommand::ClosePath);
    path
}

/// Convert premultiplied `0xAARRGGBB` pixels to straight RGBA bytes.
fn to_rgba(pixels: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len() * 4);
    for &p in pixels {
        let c = Color::from_argb(p);
        let unpm = |v: u8| match c.a {
            0 => 0,
            a => ((v as u32 * 255 + a as u32 / 2) / a as u32).min(255) as u8,
        };
        out.extend_from_slice(&[unpm(c.r), unpm(c.g), unpm(c.b), c.a]);
    }
    out
}

fn write_png(path: &std::path::Path, width: u32, height: u32, rgba: &[u8]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header().context("writing PNG header")?;
    writer.write_image_data(rgba).context("writing PNG data")?;
    Ok(())
}

fn load_font(cx: &mut RenderContext) -> Result<FontId> {
    match cx.load_configured_font() {
        Ok(id) => Ok(id),
        Err(e) => {
            warn!("{e}; using the built-in block font");
            Ok(cx.load_font(fallback_font())?)
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => RenderConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => RenderConfig::default(),
    };
    info!("{} tile workers, {}x{} atlas", config.worker_count(), config.atlas_width, config.atlas_height);

    let mut cx = RenderContext::new(config, WIDTH, HEIGHT)?;
    let face = load_font(&mut cx)?;

    let mut cb = cx.begin_frame();
    let all = IRect::new(0, 0, WIDTH as i32, HEIGHT as i32);
    cx.fill_rect(&mut cb, all, Color::rgb(250, 248, 240));
    cx.fill_rect(&mut cb, IRect::new(0, 0, WIDTH as i32, 6), Color::rgb(40, 90, 160));

    let mut y = 40.0;
    for size in [14.0, 24.0, 40.0] {
        let font = face.sized(size);
        let end = cx.fill_string(&mut cb, font, 20.0, y, &args.text, Color::rgb(20, 20, 30))?;
        info!("{size}px: {:.1}px wide", end - 20.0);
        y += cx.line_height(font)?;
    }

    cx.fill_shape(&mut cb, 1, 480.0, 30.0, &circle(30.0), Color::from_straight(200, 40, 40, 200));
    cx.fill_shape(&mut cb, 2, 510.0, 60.0, &star(40.0), Color::from_straight(40, 120, 200, 160));

    // Clipped caption at the bottom.
    cx.set_clip_rect(&mut cb, IRect::new(20, 160, 220, 190));
    cx.fill_rect(&mut cb, IRect::new(0, 160, WIDTH as i32, 190), Color::rgb(230, 230, 225));
    cx.fill_string(&mut cb, face.sized(28.0), 24.0, 186.0, &args.text, Color::from_straight(0, 0, 0, 180))?;
    cx.set_clip_rect(&mut cb, all);

    cx.end_frame(cb, all);

    let bitmap = cx.renderer().bitmap();
    write_png(&args.out, bitmap.width, bitmap.height, &to_rgba(&bitmap.pixels))?;
    info!("wrote {} ({} glyphs cached)", args.out.display(), cx.cache().len());
    Ok(())
}
