//! # Tile Compositor
//!
//! Replays a [`CommandBuffer`] into a [`Bitmap`]. The redraw region is split
//! into a fixed 4×4 grid and each tile becomes one job on the shared
//! [`WorkQueue`]. A job renders into its own tile-sized buffer, so workers
//! never touch the same pixels; the caller copies the tiles back once the
//! batch has joined.

use std::sync::{Arc, mpsc};

use common::IRect;
use scheduler::{CompletionState, WorkQueue, WorkerPool};

use crate::command::{Command, CommandBuffer};
use crate::rasterizer::Bitmap;

/// Tiles per side of the redraw grid.
pub const TILE_GRID: i32 = 4;
/// Left edges of the redraw region and of tile columns fall on multiples of
/// this many pixels.
pub const TILE_ALIGN: i32 = 16;

#[inline]
fn align_down(v: i32) -> i32 {
    v & !(TILE_ALIGN - 1)
}

#[inline]
fn align_up(v: i32) -> i32 {
    (v + TILE_ALIGN - 1) & !(TILE_ALIGN - 1)
}

/// Clamp `redraw` to `bounds` and align its left edge down.
pub fn redraw_region(bounds: IRect, redraw: IRect) -> IRect {
    let r = redraw.intersect(bounds);
    if r.is_empty() {
        return IRect::EMPTY;
    }
    IRect { min_x: align_down(r.min_x).max(bounds.min_x), ..r }
}

/// Split an aligned region into the 4×4 grid, dropping empty tiles.
pub fn tile_grid(region: IRect) -> Vec<IRect> {
    if region.is_empty() {
        return Vec::new();
    }
    let (w, h) = (region.width(), region.height());
    let xs: Vec<i32> = (0..=TILE_GRID)
        .map(|i| (region.min_x + align_up(w * i / TILE_GRID)).min(region.max_x))
        .collect();
    let ys: Vec<i32> = (0..=TILE_GRID).map(|i| region.min_y + h * i / TILE_GRID).collect();

    let mut tiles = Vec::with_capacity((TILE_GRID * TILE_GRID) as usize);
    for row in ys.windows(2) {
        for col in xs.windows(2) {
            let tile = IRect::new(col[0], row[0], col[1], row[1]);
            if !tile.is_empty() {
                tiles.push(tile);
            }
        }
    }
    tiles
}

/// Replay `commands` into `target`, which holds the pixels of `region`
/// starting at its top-left corner. Nothing outside `region` is written.
pub fn replay(target: &mut Bitmap, region: IRect, commands: &CommandBuffer, texture: &Bitmap) {
    let (ox, oy) = (region.min_x, region.min_y);
    let mut clip = region;
    for cmd in commands.iter() {
        let cmd = match cmd {
            Ok(cmd) => cmd,
            Err(e) => {
                log::warn!("command buffer decode failed: {e}");
                return;
            }
        };
        match cmd {
            Command::Clip(rect) => clip = rect.intersect(region),
            Command::SolidRect { rect, color } => {
                target.fill_rect(rect.intersect(clip).translate(-ox, -oy), color);
            }
            Command::TexturedRect { dst, src_x, src_y, color } => {
                let r = dst.intersect(clip);
                let (sx, sy) = (src_x - dst.min_x, src_y - dst.min_y);
                for y in r.min_y..r.max_y {
                    for x in r.min_x..r.max_x {
                        let Some(texel) = texture.pixel(x + sx, y + sy) else {
                            continue;
                        };
                        if texel.a != 0 {
                            target.blend_pixel(x - ox, y - oy, color.scale(texel.a as f32 / 255.0));
                        }
                    }
                }
            }
        }
    }
}

/// Replay the aligned redraw region in one pass on the calling thread.
pub fn render_untiled(bitmap: &mut Bitmap, commands: &CommandBuffer, redraw: IRect, texture: &Bitmap) {
    let region = redraw_region(bitmap.bounds(), redraw);
    if region.is_empty() {
        return;
    }
    if region == bitmap.bounds() {
        replay(bitmap, region, commands, texture);
        return;
    }
    let mut scratch = Bitmap::new(region.width() as u32, region.height() as u32);
    scratch.copy_from(bitmap, region, 0, 0);
    replay(&mut scratch, region, commands, texture);
    bitmap.copy_from(&scratch, scratch.bounds(), region.min_x, region.min_y);
}

// ─────────────────────────────────────────────────────────────────────────────
// TileCompositor
// ─────────────────────────────────────────────────────────────────────────────

pub struct TileCompositor {
    queue: Arc<WorkQueue>,
    pool: Option<WorkerPool>,
}

impl TileCompositor {
    /// `workers == 0` renders every tile on the calling thread.
    pub fn new(queue_capacity: usize, workers: usize) -> std::io::Result<Self> {
        let queue = Arc::new(WorkQueue::new(queue_capacity.max((TILE_GRID * TILE_GRID) as usize)));
        let pool = match workers {
            0 => None,
            n => Some(WorkerPool::new(Arc::clone(&queue), n)?),
        };
        Ok(Self { queue, pool })
    }

    /// Background threads servicing the queue.
    pub fn workers(&self) -> usize {
        self.pool.as_ref().map_or(0, WorkerPool::size)
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    /// Render `commands` into the redraw region of `bitmap`, one job per tile.
    ///
    /// Blocks until every tile job has run; the calling thread services the
    /// queue while it waits. Returns the number of tiles rendered.
    pub fn render(
        &self,
        bitmap: &mut Bitmap,
        commands: &Arc<CommandBuffer>,
        redraw: IRect,
        texture: &Arc<Bitmap>,
    ) -> usize {
        let region = redraw_region(bitmap.bounds(), redraw);
        let tiles = tile_grid(region);
        if tiles.is_empty() {
            return 0;
        }

        let state = CompletionState::new();
        let (tx, rx) = mpsc::channel::<(usize, Bitmap)>();
        for (index, &tile) in tiles.iter().enumerate() {
            let mut pixels = Bitmap::new(tile.width() as u32, tile.height() as u32);
            pixels.copy_from(bitmap, tile, 0, 0);
            let commands = Arc::clone(commands);
            let texture = Arc::clone(texture);
            let tx = tx.clone();
            self.queue.push(
                Box::new(move || {
                    replay(&mut pixels, tile, &commands, &texture);
                    // The receiver outlives the batch.
                    let _ = tx.send((index, pixels));
                }),
                &state,
            );
        }
        drop(tx);
        self.queue.wait(&state);

        let mut done = 0;
        for (index, pixels) in rx.try_iter() {
            let tile = tiles[index];
            bitmap.copy_from(&pixels, pixels.bounds(), tile.min_x, tile.min_y);
            done += 1;
        }
        if done != tiles.len() {
            log::warn!("{} of {} tiles failed to render", tiles.len() - done, tiles.len());
        }
        log::trace!("rendered {region:?} as {done} tiles");
        done
    }
}

impl std::fmt::Debug for TileCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCompositor")
            .field("queue", &self.queue)
            .field("workers", &self.workers())
            .finish()
    }
}
