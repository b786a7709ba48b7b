//! # Paint Crate
//!
//! Turns outlines into pixels. Paths are flattened into edges
//! ([`path`]), rasterized with exact area coverage ([`rasterizer`]), cached
//! in a shared atlas ([`cache`]), and drawn by replaying a
//! [`CommandBuffer`] tile by tile across the worker pool ([`compositor`]).
//! [`RenderContext`] ties fonts, cache, and renderer together for the draw
//! layer.

#![forbid(unsafe_code)]

pub mod cache;
pub mod command;
pub mod compositor;
pub mod config;
pub mod context;
pub mod path;
pub mod rasterizer;
pub mod renderer;

pub use cache::{AtlasAllocator, CacheEntry, GlyphCache, GlyphKey};
pub use command::{Command, CommandBuffer};
pub use compositor::{TileCompositor, render_untiled};
pub use config::{ConfigError, RenderConfig};
pub use context::{ContextError, Font, FontId, RenderContext};
pub use path::{Edge, Flattener, flatten};
pub use rasterizer::{Bitmap, fill, fill_clipped, rasterize_coverage};
pub use renderer::{Renderer, SoftwareRenderer};
