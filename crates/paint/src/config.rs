//! Render settings, loaded from JSON with per-field defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// System font locations tried in order when no font is configured.
pub const DEFAULT_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans-fonts/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/google-droid-sans-fonts/DroidSans.ttf",
    "/usr/share/fonts/truetype/ubuntu/Ubuntu-R.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Rendering settings for a [`RenderContext`](crate::RenderContext).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Glyph atlas texture size in pixels.
    pub atlas_width: u32,
    pub atlas_height: u32,
    /// Glyph cache slots, rounded up to a power of two.
    pub cache_capacity: usize,
    /// Work queue slots; must hold at least one full tile grid.
    pub queue_capacity: usize,
    /// Upper bound on background tile workers.
    pub max_workers: usize,
    /// Exact worker count, overriding the core-count default.
    pub worker_threads: Option<usize>,
    /// Font files tried in order by `load_first_font`.
    pub font_paths: Vec<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            atlas_width: 2048,
            atlas_height: 2048,
            cache_capacity: 4096,
            queue_capacity: 256,
            max_workers: 8,
            worker_threads: None,
            font_paths: DEFAULT_FONT_PATHS.iter().map(PathBuf::from).collect(),
        }
    }
}

impl RenderConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Background tile workers to start.
    pub fn worker_count(&self) -> usize {
        match self.worker_threads {
            Some(n) => n.min(self.max_workers),
            None => scheduler::default_worker_count(self.max_workers),
        }
    }
}
